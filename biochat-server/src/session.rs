use std::{collections::HashMap, sync::Arc};

use biochat_rag::ChatSession;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::protocol::SessionId;

/// Live sessions keyed by id.
///
/// Each session sits behind its own mutex, so one session handles one request
/// at a time while different sessions proceed independently.
#[derive(Debug, Default, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Mutex<ChatSession>>>>>,
}

impl SessionManager {
    pub async fn create_session(&self) -> SessionId {
        let session_id = Uuid::new_v4().to_string();
        let state = Arc::new(Mutex::new(ChatSession::new()));
        self.sessions.write().await.insert(session_id.clone(), state);
        session_id
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<ChatSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Drop a session together with its workspace and upload directory.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// End every session. Returns how many were open.
    pub async fn close_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }
}
