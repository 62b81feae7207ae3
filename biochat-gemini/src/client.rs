use crate::{
    embedding::{
        BatchContentEmbeddingResponse, BatchEmbedContentsRequest, ContentEmbeddingResponse,
        EmbedBuilder, EmbedContentRequest,
    },
    generation::{ContentBuilder, GenerateContentRequest, GenerationResponse},
};
use reqwest::{
    Client, ClientBuilder, Response,
    header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu};
use std::{
    fmt::{self, Formatter},
    sync::{Arc, LazyLock},
    time::Duration,
};
use tracing::{debug, warn};
use url::Url;

static DEFAULT_BASE_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://generativelanguage.googleapis.com/v1beta/")
        .expect("unreachable error: failed to parse default base URL")
});

/// First backoff delay; doubled on every further attempt.
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Model {
    #[default]
    #[serde(rename = "models/gemini-1.5-flash")]
    Gemini15Flash,
    #[serde(rename = "models/embedding-001")]
    Embedding001,
    #[serde(untagged)]
    Custom(String),
}

impl Model {
    pub fn as_str(&self) -> &str {
        match self {
            Model::Gemini15Flash => "models/gemini-1.5-flash",
            Model::Embedding001 => "models/embedding-001",
            Model::Custom(model) => model,
        }
    }
}

impl From<String> for Model {
    /// Accepts both `gemini-1.5-flash` and `models/gemini-1.5-flash`.
    fn from(model: String) -> Self {
        let qualified =
            if model.starts_with("models/") { model } else { format!("models/{model}") };
        match qualified.as_str() {
            "models/gemini-1.5-flash" => Model::Gemini15Flash,
            "models/embedding-001" => Model::Embedding001,
            _ => Model::Custom(qualified),
        }
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Self::from(model.to_string())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("failed to parse API key"))]
    InvalidApiKey { source: InvalidHeaderValue },

    #[snafu(display("failed to build HTTP client"))]
    BuildClient { source: reqwest::Error },

    #[snafu(display("failed to construct URL (probably incorrect model name): {suffix}"))]
    ConstructUrl { source: url::ParseError, suffix: String },

    #[snafu(display("failed to perform request to '{url}'"))]
    PerformRequest { source: reqwest::Error, url: Url },

    #[snafu(display(
        "bad response from server; code {code}; description: {}",
        description.as_deref().unwrap_or("none")
    ))]
    BadResponse {
        /// HTTP status code
        code: u16,
        /// HTTP error description
        description: Option<String>,
    },

    #[snafu(display("failed to decode response"))]
    DecodeResponse { source: reqwest::Error },

    #[snafu(display("response contained no {what}"))]
    EmptyResponse { what: String },
}

impl Error {
    /// Transport failures, rate limiting and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::PerformRequest { .. } => true,
            Error::BadResponse { code, .. } => *code == 429 || (500..600).contains(code),
            _ => false,
        }
    }
}

/// Internal client for making requests to the Gemini API
pub struct GeminiClient {
    http_client: Client,
    pub model: Model,
    base_url: Url,
    retry_base_delay: Duration,
}

impl GeminiClient {
    fn new(
        client_builder: ClientBuilder,
        model: Model,
        base_url: Url,
        api_key: &str,
        retry_base_delay: Duration,
    ) -> Result<Self, Error> {
        let headers = HeaderMap::from_iter([(
            HeaderName::from_static("x-goog-api-key"),
            HeaderValue::from_str(api_key).context(InvalidApiKeySnafu)?,
        )]);

        let http_client =
            client_builder.default_headers(headers).build().context(BuildClientSnafu)?;

        Ok(Self { http_client, model, base_url, retry_base_delay })
    }

    /// Check the response status code and return an error if it is not successful
    #[tracing::instrument(skip_all, err)]
    async fn check_response(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if !status.is_success() {
            let description = response.text().await.ok();
            BadResponseSnafu { code: status.as_u16(), description }.fail()
        } else {
            Ok(response)
        }
    }

    async fn post_json<Req: Serialize, Res: DeserializeOwned>(
        &self,
        url: Url,
        body: &Req,
    ) -> Result<Res, Error> {
        let response = self
            .http_client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .context(PerformRequestSnafu { url })?;
        let response = Self::check_response(response).await?;
        response.json().await.context(DecodeResponseSnafu)
    }

    /// POST with exponential backoff: `base, 2*base, 4*base, ...` for at most
    /// `max_retries` additional attempts. Only retryable errors are retried.
    async fn post_json_with_retry<Req: Serialize, Res: DeserializeOwned>(
        &self,
        url: Url,
        body: &Req,
        max_retries: u32,
    ) -> Result<Res, Error> {
        let mut attempt = 0;
        loop {
            match self.post_json(url.clone(), body).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_retries && e.is_retryable() => {
                    let delay = self.retry_base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying Gemini request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) async fn generate_content_raw(
        &self,
        request: GenerateContentRequest,
        max_retries: u32,
    ) -> Result<GenerationResponse, Error> {
        let url = self.build_url("generateContent")?;
        debug!(model = %self.model, contents = request.contents.len(), "generateContent");
        self.post_json_with_retry(url, &request, max_retries).await
    }

    pub(crate) async fn embed_content(
        &self,
        request: EmbedContentRequest,
    ) -> Result<ContentEmbeddingResponse, Error> {
        let url = self.build_url("embedContent")?;
        self.post_json(url, &request).await
    }

    pub(crate) async fn embed_content_batch(
        &self,
        request: BatchEmbedContentsRequest,
    ) -> Result<BatchContentEmbeddingResponse, Error> {
        let url = self.build_url("batchEmbedContents")?;
        debug!(model = %self.model, batch_size = request.requests.len(), "batchEmbedContents");
        self.post_json(url, &request).await
    }

    fn build_url(&self, endpoint: &str) -> Result<Url, Error> {
        let suffix = format!("{}:{endpoint}", self.model.as_str());
        self.base_url.join(&suffix).context(ConstructUrlSnafu { suffix })
    }
}

/// Builder for a [`Gemini`] client.
///
/// ```rust,ignore
/// let client = GeminiBuilder::new(api_key)
///     .with_model(Model::Embedding001)
///     .with_base_url("http://127.0.0.1:9000/v1beta/".parse()?)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct GeminiBuilder {
    key: String,
    model: Model,
    base_url: Url,
    retry_base_delay: Duration,
}

impl GeminiBuilder {
    pub fn new<K: Into<String>>(key: K) -> Self {
        Self {
            key: key.into(),
            model: Model::default(),
            base_url: DEFAULT_BASE_URL.clone(),
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    pub fn with_model<M: Into<Model>>(mut self, model: M) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn build(self) -> Result<Gemini, Error> {
        let client = GeminiClient::new(
            ClientBuilder::default(),
            self.model,
            self.base_url,
            &self.key,
            self.retry_base_delay,
        )?;
        Ok(Gemini { client: Arc::new(client) })
    }
}

/// Client for the Gemini API
#[derive(Clone)]
pub struct Gemini {
    client: Arc<GeminiClient>,
}

impl Gemini {
    /// Create a new client with the specified model
    pub fn with_model<K: AsRef<str>, M: Into<Model>>(api_key: K, model: M) -> Result<Self, Error> {
        GeminiBuilder::new(api_key.as_ref()).with_model(model).build()
    }

    pub fn model(&self) -> &Model {
        &self.client.model
    }

    /// Start building a content generation request
    pub fn generate_content(&self) -> ContentBuilder {
        ContentBuilder::new(self.client.clone())
    }

    /// Start building an embedding request
    pub fn embed_content(&self) -> EmbedBuilder {
        EmbedBuilder::new(self.client.clone())
    }
}
