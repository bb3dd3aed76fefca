/// Conversation state and the send/receive controller.
///
/// [`ConversationState`] is an append-only list of messages; the only way to
/// change it is to add a message. [`ChatSession`] drives one request at a time
/// through a [`ChatTransport`] and records the outcome in the state.
use chrono::Local;
use thiserror::Error;
use tracing::{info, warn};

use crate::citation::{count_citations, extract_citations};
use crate::models::{ChatRequest, ChatResponse, Citation, Message, Role};
use crate::transport::ChatTransport;

/// Shown in place of an answer whenever the backend call fails.
pub const FALLBACK_MESSAGE: &str =
    "죄송합니다. 답변을 가져오는 중 오류가 발생했습니다. 잠시 후 다시 시도해 주세요.";

// ── Conversation state ───────────────────────────────────────────────

/// Ordered messages of one session. Append-only.
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    next_id: u64,
}

impl ConversationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain message and return it.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> &Message {
        self.push(role, content.into(), Vec::new(), Vec::new())
    }

    /// Append an assistant answer with its resolved citations.
    pub fn add_answer(&mut self, content: impl Into<String>, citations: Vec<Citation>) -> &Message {
        self.push(Role::Assistant, content.into(), citations, Vec::new())
    }

    /// Append an insufficient-evidence warning carrying the backend's questions.
    pub fn add_warning(&mut self, content: impl Into<String>, questions: Vec<String>) -> &Message {
        self.push(Role::Assistant, content.into(), Vec::new(), questions)
    }

    fn push(
        &mut self,
        role: Role,
        content: String,
        citations: Vec<Citation>,
        clarifying_questions: Vec<String>,
    ) -> &Message {
        self.next_id += 1;
        self.messages.push(Message {
            id: self.next_id,
            role,
            content,
            timestamp: Local::now(),
            citations,
            has_safety_warning: !clarifying_questions.is_empty(),
            clarifying_questions,
        });
        &self.messages[self.messages.len() - 1]
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent assistant message, if any.
    #[must_use]
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_assistant())
    }
}

// ── Request state ────────────────────────────────────────────────────

/// Lifecycle of the single outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight,
    /// The last request failed and the fallback message was shown.
    FallbackShown,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("a request is already in flight")]
    Busy,
}

/// Filters forwarded with every question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub top_k: Option<usize>,
    pub chunk_types: Option<Vec<String>>,
    pub agencies: Option<Vec<String>>,
}

impl RequestOptions {
    fn build(&self, message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            top_k: self.top_k,
            chunk_types: self.chunk_types.clone(),
            agencies: self.agencies.clone(),
        }
    }
}

// ── Session controller ───────────────────────────────────────────────

/// Owns the conversation and sends user questions through `T`.
pub struct ChatSession<T> {
    transport: T,
    options: RequestOptions,
    state: ConversationState,
    request_state: RequestState,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T, options: RequestOptions) -> Self {
        Self {
            transport,
            options,
            state: ConversationState::new(),
            request_state: RequestState::Idle,
        }
    }

    #[must_use]
    pub fn conversation(&self) -> &ConversationState {
        &self.state
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn request_state(&self) -> RequestState {
        self.request_state
    }

    /// Whether a new question may be sent right now.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.request_state != RequestState::InFlight
    }

    /// Send `input` and append the reply.
    ///
    /// Blank input is ignored (`Ok(None)`). Transport failures never surface
    /// here: they append [`FALLBACK_MESSAGE`] and move to
    /// [`RequestState::FallbackShown`]. Returns the appended reply.
    pub async fn send(&mut self, input: &str) -> Result<Option<&Message>, SessionError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        if !self.can_send() {
            return Err(SessionError::Busy);
        }

        self.state.add_message(Role::User, input);
        self.request_state = RequestState::InFlight;

        let request = self.options.build(input);
        let result = self.transport.send_message(&request).await;

        let reply = match result {
            Ok(response) => {
                self.request_state = RequestState::Idle;
                Self::record_response(&mut self.state, response)
            }
            Err(e) => {
                warn!("Chat request failed: {e}");
                self.request_state = RequestState::FallbackShown;
                self.state.add_message(Role::Assistant, FALLBACK_MESSAGE)
            }
        };

        Ok(Some(reply))
    }

    fn record_response(state: &mut ConversationState, response: ChatResponse) -> &Message {
        if response.needs_clarification() {
            info!(
                questions = response.clarifying_questions.len(),
                "Backend reported insufficient evidence"
            );
            return state.add_warning(response.answer, response.clarifying_questions);
        }

        let citations = extract_citations(&response.answer, &response.sources);
        info!(
            model = %response.model,
            sources = response.sources.len(),
            markers = count_citations(&response.answer),
            citations = citations.len(),
            "Answer received"
        );
        state.add_answer(response.answer, citations)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMetadata;
    use crate::transport::TransportError;
    use std::sync::Mutex;

    /// Replays canned results and records the requests it saw.
    struct ScriptedTransport {
        replies: Mutex<Vec<Result<ChatResponse, TransportError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<ChatResponse, TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatTransport for ScriptedTransport {
        async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(TransportError::Decode("script exhausted".to_string())))
        }
    }

    fn source(title: &str) -> SourceMetadata {
        SourceMetadata {
            doc_id: title.to_string(),
            doc_title: title.to_string(),
            similarity: 0.9,
            ..SourceMetadata::default()
        }
    }

    fn answer(text: &str, sources: Vec<SourceMetadata>) -> ChatResponse {
        ChatResponse {
            answer: text.to_string(),
            chunks_used: sources.len(),
            model: "test-model".to_string(),
            sources,
            has_sufficient_evidence: true,
            clarifying_questions: Vec::new(),
        }
    }

    #[test]
    fn test_state_is_append_only_with_increasing_ids() {
        let mut state = ConversationState::new();
        assert!(state.is_empty());
        let first = state.add_message(Role::User, "hi").id;
        let second = state.add_message(Role::Assistant, "hello").id;
        assert!(second > first);
        assert_eq!(state.len(), 2);
        assert_eq!(state.messages()[0].content, "hi");
        assert_eq!(state.last_assistant().map(|m| m.id), Some(second));
    }

    #[test]
    fn test_add_warning_sets_flag() {
        let mut state = ConversationState::new();
        let msg = state.add_warning("need more", vec!["언제 구매하셨나요?".to_string()]);
        assert!(msg.has_safety_warning);
        assert!(msg.citations.is_empty());
        assert_eq!(msg.clarifying_questions.len(), 1);
    }

    #[tokio::test]
    async fn test_send_records_answer_with_citations() {
        let transport = ScriptedTransport::new(vec![Ok(answer(
            "환불 가능합니다 [1]. 근거 [2][1] 그리고 [5].",
            vec![source("a"), source("b")],
        ))]);
        let mut session = ChatSession::new(transport, RequestOptions::default());

        let reply = session.send("환불 되나요?").await.unwrap().unwrap();
        assert!(reply.is_assistant());
        assert!(!reply.has_safety_warning);
        let ids: Vec<usize> = reply.citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert_eq!(session.conversation().len(), 2);
        assert_eq!(session.conversation().messages()[0].role, Role::User);
        assert_eq!(session.request_state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_send_forwards_request_options() {
        let transport = ScriptedTransport::new(vec![Ok(answer("ok", Vec::new()))]);
        let options = RequestOptions {
            top_k: Some(3),
            chunk_types: Some(vec!["decision".to_string()]),
            agencies: Some(vec!["kca".to_string(), "ecmc".to_string()]),
        };
        let mut session = ChatSession::new(transport, options);
        session.send("질문").await.unwrap();

        let seen = session.transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message, "질문");
        assert_eq!(seen[0].top_k, Some(3));
        assert_eq!(seen[0].agencies.as_ref().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_send_blank_input_is_ignored() {
        let transport = ScriptedTransport::new(Vec::new());
        let mut session = ChatSession::new(transport, RequestOptions::default());
        assert!(session.send("   ").await.unwrap().is_none());
        assert!(session.conversation().is_empty());
        assert!(session.transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_appends_fallback() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Decode(
            "expected value".to_string(),
        ))]);
        let mut session = ChatSession::new(transport, RequestOptions::default());

        let reply = session.send("hello").await.unwrap().unwrap();
        assert_eq!(reply.content, FALLBACK_MESSAGE);
        assert!(reply.citations.is_empty());
        assert_eq!(session.request_state(), RequestState::FallbackShown);
        assert!(session.can_send());
    }

    #[tokio::test]
    async fn test_send_recovers_after_fallback() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Decode("boom".to_string())),
            Ok(answer("fine", Vec::new())),
        ]);
        let mut session = ChatSession::new(transport, RequestOptions::default());
        session.send("one").await.unwrap();
        let reply = session.send("two").await.unwrap().unwrap();
        assert_eq!(reply.content, "fine");
        assert_eq!(session.request_state(), RequestState::Idle);
        assert_eq!(session.conversation().len(), 4);
    }

    #[tokio::test]
    async fn test_send_insufficient_evidence_takes_warning_branch() {
        let mut response = answer("판단하기 어렵습니다 [1].", vec![source("a")]);
        response.has_sufficient_evidence = false;
        response.clarifying_questions = vec![
            "구매일이 언제인가요?".to_string(),
            "구매 금액은 얼마인가요?".to_string(),
        ];
        let transport = ScriptedTransport::new(vec![Ok(response)]);
        let mut session = ChatSession::new(transport, RequestOptions::default());

        let reply = session.send("환불").await.unwrap().unwrap();
        assert!(reply.has_safety_warning);
        assert_eq!(reply.clarifying_questions.len(), 2);
        assert!(reply.citations.is_empty());
        assert_eq!(session.request_state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_insufficient_evidence_without_questions_renders_normally() {
        let mut response = answer("근거 [1]", vec![source("a")]);
        response.has_sufficient_evidence = false;
        let transport = ScriptedTransport::new(vec![Ok(response)]);
        let mut session = ChatSession::new(transport, RequestOptions::default());

        let reply = session.send("q").await.unwrap().unwrap();
        assert!(!reply.has_safety_warning);
        assert_eq!(reply.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_send_while_in_flight_is_rejected() {
        let transport = ScriptedTransport::new(Vec::new());
        let mut session = ChatSession::new(transport, RequestOptions::default());
        session.request_state = RequestState::InFlight;

        assert_eq!(session.send("hello").await.unwrap_err(), SessionError::Busy);
        assert!(session.conversation().is_empty());
    }
}
