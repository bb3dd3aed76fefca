/// Wire and conversation data types.
///
/// The `/chat`, `/health`, `/search` and `/case` payloads use the backend's
/// snake_case field names verbatim. Fields the backend is known to omit
/// decode to defaults rather than failing the whole response.
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

// ── Backend payloads ─────────────────────────────────────────────────

/// Metadata for one retrieved document chunk backing an answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMetadata {
    pub doc_id: String,
    pub chunk_id: String,
    /// Free-form category label (e.g. `decision`, `reasoning`).
    pub chunk_type: String,
    pub source_org: String,
    pub url: Option<String>,
    pub decision_date: Option<String>,
    pub collected_at: Option<String>,
    pub doc_title: String,
    /// Similarity score in `[0, 1]`.
    pub similarity: f64,
}

/// Request body for `POST /chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agencies: Option<Vec<String>>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Response body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    pub chunks_used: usize,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub sources: Vec<SourceMetadata>,
    #[serde(default = "default_true")]
    pub has_sufficient_evidence: bool,
    #[serde(default)]
    pub clarifying_questions: Vec<String>,
}

impl ChatResponse {
    /// Whether this response takes the insufficient-evidence branch.
    ///
    /// A missing-evidence flag without any questions falls back to the
    /// regular answer rendering, since there is nothing to ask the user.
    #[must_use]
    pub fn needs_clarification(&self) -> bool {
        !self.has_sufficient_evidence && !self.clarifying_questions.is_empty()
    }
}

/// Response body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Request body for `POST /search` (retrieval only, no answer generation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agencies: Option<Vec<String>>,
}

/// Response body of `POST /search`. Result rows are passed through untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    #[serde(default)]
    pub results_count: usize,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// One chunk of a case document, as returned by `GET /case/{case_uid}`.
///
/// Chunks arrive in document order (`seq`). `case_no` carries the document
/// title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseChunk {
    pub chunk_uid: String,
    pub case_uid: String,
    pub chunk_type: String,
    pub text: String,
    pub seq: i64,
    pub case_no: String,
    pub decision_date: Option<String>,
    pub agency: String,
}

/// Response body of `GET /case/{case_uid}`: every chunk of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResponse {
    pub case_uid: String,
    #[serde(default)]
    pub chunks_count: usize,
    #[serde(default)]
    pub chunks: Vec<CaseChunk>,
}

// ── Conversation types ───────────────────────────────────────────────

/// A `[N]` marker resolved against the source list of one answer.
///
/// `id` is the 1-based number shown in the text, `source_index` the 0-based
/// position in the source list; `id == source_index + 1` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub id: usize,
    pub source_index: usize,
    pub source: SourceMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(rename = "ai")]
    Assistant,
}

impl Role {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "나",
            Role::Assistant => "똑소리",
        }
    }
}

/// One entry of the conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub citations: Vec<Citation>,
    /// Set when the backend asked for more details instead of answering.
    pub has_safety_warning: bool,
    pub clarifying_questions: Vec<String>,
}

impl Message {
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// Resolve a clicked marker number against this message's citations.
    ///
    /// `None` means the marker could not be resolved and nothing should open.
    #[must_use]
    pub fn find_citation(&self, id: usize) -> Option<&Citation> {
        self.citations.iter().find(|c| c.id == id)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
