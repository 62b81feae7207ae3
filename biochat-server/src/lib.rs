//! `biochat-server` serves the BioChat single-page UI and its JSON API.
//! Each browser session gets its own workspace and transcript.

pub mod protocol;
pub mod server;
pub mod session;

pub use server::{AppState, ServerConfig, app_router, build_pipeline, run_server, serve};
