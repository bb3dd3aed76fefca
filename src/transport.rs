/// HTTP client for the answer-generation backend.
///
/// One request, one response: no retries, no backoff. Callers decide what a
/// failure means; the conversation layer turns every failure into a fixed
/// fallback message.
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::models::{
    CaseResponse, ChatRequest, ChatResponse, HealthStatus, SearchRequest, SearchResponse,
};

/// Errors raised by the HTTP transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid backend URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("backend returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response body: {0}")]
    Decode(String),
}

/// Anything that can answer a chat request.
///
/// Implemented by [`HttpTransport`]; tests substitute scripted backends.
pub trait ChatTransport {
    fn send_message(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, TransportError>> + Send;
}

/// Fetches the full document behind a cited source.
pub trait CaseLookup {
    /// All chunks of `case_uid` (a source's `doc_id`), in document order.
    fn get_case(
        &self,
        case_uid: &str,
    ) -> impl Future<Output = Result<CaseResponse, TransportError>> + Send;
}

/// `reqwest`-backed client for `/chat`, `/health`, `/search` and `/case`.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a client for `base_url`.
    ///
    /// Without a `timeout` a hung request waits indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let invalid = |message: String| TransportError::InvalidUrl {
            url: base_url.to_string(),
            message,
        };

        // A trailing slash keeps `join` from replacing the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", base_url.scheme())));
        }

        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(TransportError::Request)?;

        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                message: e.to_string(),
            })
    }

    /// `case/{case_uid}`, with the id percent-encoded as one path segment.
    fn case_endpoint(&self, case_uid: &str) -> Result<Url, TransportError> {
        let mut url = self.endpoint("case")?;
        url.path_segments_mut()
            .map_err(|()| TransportError::InvalidUrl {
                url: self.base_url.to_string(),
                message: "base URL cannot carry a path".to_string(),
            })?
            .push(case_uid);
        Ok(url)
    }

    /// `GET /health`.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn health_check(&self) -> Result<HealthStatus, TransportError> {
        let url = self.endpoint("health")?;
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(TransportError::Request)?;
        decode(resp).await
    }

    /// `POST /search`: retrieval only, without answer generation.
    #[instrument(skip(self, request), fields(base_url = %self.base_url))]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        self.post_json("search", request).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!("POST {url}");
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(TransportError::Request)?;
        decode(resp).await
    }
}

impl ChatTransport for HttpTransport {
    #[instrument(skip(self, request), fields(base_url = %self.base_url))]
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
        let response: ChatResponse = self.post_json("chat", request).await?;
        debug!(
            model = %response.model,
            chunks_used = response.chunks_used,
            sources = response.sources.len(),
            "chat response received"
        );
        Ok(response)
    }
}

impl CaseLookup for HttpTransport {
    /// `GET /case/{case_uid}`. An unknown case is a `Status` error (404).
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn get_case(&self, case_uid: &str) -> Result<CaseResponse, TransportError> {
        let url = self.case_endpoint(case_uid)?;
        debug!("GET {url}");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(TransportError::Request)?;
        decode(resp).await
    }
}

/// Check the status, then decode the JSON body.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, TransportError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TransportError::Status { status, body });
    }

    let bytes = resp.bytes().await.map_err(TransportError::Request)?;
    serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
}

// ── Tests ────────────────────────────────────────────────────────────
