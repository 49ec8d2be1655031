//! The assistant behind `/invocations`.
//!
//! [`AnthropicAssistant`] streams a Messages API reply and concatenates its
//! text deltas. Each session id keeps its own transcript.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::connection::ConnectionManager;
use crate::error::InvocationError;

pub const SYSTEM_PROMPT: &str =
    "You are a friendly and helpful assistant. Be concise in your responses.";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Everything one invocation carries besides its prompt.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Runtime session id, exactly as received
    pub session_id: String,
    pub request_timestamp: DateTime<Utc>,
    pub connection: Arc<ConnectionManager>,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Answer `prompt` within the context's session.
    async fn respond(&self, ctx: &InvocationContext, prompt: &str)
        -> Result<String, InvocationError>;
}

// ---------------------------------------------------------------------------
// Transcripts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

/// Sessions kept before the least recently used one is dropped.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Messages kept per session; older exchanges are dropped first.
pub const DEFAULT_MAX_MESSAGES: usize = 100;

#[derive(Debug, Default)]
struct Session {
    messages: Vec<Message>,
    last_used: u64,
    /// Held for the whole of a turn so calls on one session run in order.
    turn: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Debug, Default)]
struct SessionTable {
    sessions: HashMap<String, Session>,
    clock: u64,
}

impl SessionTable {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Conversation history per session id, bounded in sessions and in
/// messages per session.
#[derive(Debug)]
pub struct Transcripts {
    table: Mutex<SessionTable>,
    max_sessions: usize,
    max_messages: usize,
}

impl Default for Transcripts {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_SESSIONS, DEFAULT_MAX_MESSAGES)
    }
}

impl Transcripts {
    /// `max_messages` is rounded down to whole exchanges, at least one.
    pub fn with_limits(max_sessions: usize, max_messages: usize) -> Self {
        Self {
            table: Mutex::new(SessionTable::default()),
            max_sessions: max_sessions.max(1),
            max_messages: (max_messages / 2).max(1) * 2,
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, SessionTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.table()
            .sessions
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// The lock serialising turns on `session_id`, creating the session if
    /// needed.
    pub fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = self.table();
        let now = table.tick();
        if !table.sessions.contains_key(session_id) {
            self.evict(&mut table);
        }
        let session = table.sessions.entry(session_id.to_string()).or_default();
        session.last_used = now;
        session.turn.clone()
    }

    /// Record a completed exchange.
    pub fn commit(&self, session_id: &str, prompt: &str, reply: &str) {
        let mut table = self.table();
        let now = table.tick();
        if !table.sessions.contains_key(session_id) {
            self.evict(&mut table);
        }
        let session = table.sessions.entry(session_id.to_string()).or_default();
        session.last_used = now;
        session.messages.push(Message::user(prompt));
        session.messages.push(Message::assistant(reply));
        let excess = session.messages.len().saturating_sub(self.max_messages);
        session.messages.drain(..excess);
    }

    /// Sessions with at least one recorded exchange.
    pub fn session_count(&self) -> usize {
        self.table()
            .sessions
            .values()
            .filter(|s| !s.messages.is_empty())
            .count()
    }

    /// Make room for one more session by dropping the least recently used
    /// idle one. Sessions with a turn in flight are never dropped.
    fn evict(&self, table: &mut SessionTable) {
        while table.sessions.len() >= self.max_sessions {
            let victim = table
                .sessions
                .iter()
                .filter(|(_, s)| Arc::strong_count(&s.turn) == 1)
                .min_by_key(|(_, s)| s.last_used)
                .map(|(id, _)| id.clone());
            let Some(id) = victim else {
                return;
            };
            debug!(session_id = %id, "evicting idle session transcript");
            table.sessions.remove(&id);
        }
    }
}

// ---------------------------------------------------------------------------
// Server-sent events
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: StreamErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

/// Accumulates text deltas from an SSE byte stream split at arbitrary points.
#[derive(Debug, Default)]
pub struct SseText {
    buffer: Vec<u8>,
    text: String,
    stopped: bool,
}

impl SseText {
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), InvocationError> {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.line(&String::from_utf8_lossy(&line))?;
        }
        Ok(())
    }

    /// Flush any trailing line and return the concatenated text.
    ///
    /// A stream that ended without `message_stop` was cut off and is a
    /// `Stream` error.
    pub fn finish(mut self) -> Result<String, InvocationError> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.line(&String::from_utf8_lossy(&rest))?;
        }
        if !self.stopped {
            return Err(InvocationError::Stream(
                "stream ended before message_stop".to_string(),
            ));
        }
        Ok(self.text)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn line(&mut self, line: &str) -> Result<(), InvocationError> {
        let Some(data) = line.trim().strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return Ok(());
        }
        // Unknown payloads are skipped, like unknown event types.
        let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
            return Ok(());
        };
        match event {
            StreamEvent::ContentBlockDelta {
                delta: Delta::TextDelta { text },
            } => self.text.push_str(&text),
            StreamEvent::MessageStop => self.stopped = true,
            StreamEvent::Error { error } => return Err(InvocationError::Stream(error.message)),
            _ => {}
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AnthropicAssistant
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug)]
pub struct AnthropicAssistant {
    api_key: Option<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    transcripts: Transcripts,
}

impl AnthropicAssistant {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            max_tokens: config.max_tokens,
            transcripts: Transcripts::default(),
        }
    }

    pub fn transcripts(&self) -> &Transcripts {
        &self.transcripts
    }

    async fn stream_reply(
        &self,
        ctx: &InvocationContext,
        api_key: &str,
        messages: Vec<Message>,
    ) -> Result<String, InvocationError> {
        let client = ctx.connection.client().await?;
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages,
            stream: true,
        };

        let response = match client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                ctx.connection.mark_disconnected(&e.to_string()).await;
                return Err(InvocationError::Connection(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error body: {}", e));
            return Err(InvocationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let mut sse = SseText::default();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    ctx.connection.mark_disconnected(&e.to_string()).await;
                    return Err(InvocationError::Stream(e.to_string()));
                }
            };
            sse.push(&chunk)?;
            if sse.is_stopped() {
                break;
            }
        }
        sse.finish()
    }
}

#[async_trait]
impl Assistant for AnthropicAssistant {
    async fn respond(
        &self,
        ctx: &InvocationContext,
        prompt: &str,
    ) -> Result<String, InvocationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(InvocationError::Connection(
                "ANTHROPIC_API_KEY is not set".to_string(),
            ));
        };

        let turn = self.transcripts.turn_lock(&ctx.session_id);
        let _turn = turn.lock().await;

        let mut messages = self.transcripts.history(&ctx.session_id);
        messages.push(Message::user(prompt));
        debug!(session_id = %ctx.session_id, turns = messages.len(), "calling assistant");

        let reply = self.stream_reply(ctx, api_key, messages).await?;
        self.transcripts.commit(&ctx.session_id, prompt, &reply);
        info!(session_id = %ctx.session_id, response_len = reply.len(), "assistant replied");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\", Alice!\"}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );

    #[test]
    fn test_text_deltas_concatenate() {
        let mut sse = SseText::default();
        sse.push(STREAM.as_bytes()).unwrap();
        assert!(sse.is_stopped());
        assert_eq!(sse.finish().unwrap(), "Hello, Alice!");
    }

    #[test]
    fn test_stream_without_message_stop_is_cut_off() {
        let mut sse = SseText::default();
        sse.push(b"data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n")
            .unwrap();
        assert!(!sse.is_stopped());
        let err = sse.finish().unwrap_err();
        assert_eq!(err.kind(), "stream");
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let mut sse = SseText::default();
        for chunk in STREAM.as_bytes().chunks(7) {
            sse.push(chunk).unwrap();
        }
        assert_eq!(sse.finish().unwrap(), "Hello, Alice!");
    }

    #[test]
    fn test_error_event_is_stream_error() {
        let mut sse = SseText::default();
        let err = sse
            .push(b"data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n")
            .unwrap_err();
        assert!(matches!(err, InvocationError::Stream(m) if m == "Overloaded"));
    }

    #[test]
    fn test_transcripts_are_per_session() {
        let transcripts = Transcripts::default();
        transcripts.commit("session-a", "My name is Alice", "Hi Alice");
        assert_eq!(transcripts.history("session-a").len(), 2);
        assert!(transcripts.history("session-b").is_empty());
        assert!(transcripts.history("Session-A").is_empty());
        assert_eq!(transcripts.session_count(), 1);
    }

    #[test]
    fn test_history_keeps_latest_exchanges() {
        let transcripts = Transcripts::with_limits(8, 4);
        for i in 0..3 {
            transcripts.commit("s", &format!("q{}", i), &format!("a{}", i));
        }
        let history = transcripts.history("s");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], Message::user("q1"));
        assert_eq!(history[3], Message::assistant("a2"));
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let transcripts = Transcripts::with_limits(2, 10);
        transcripts.commit("a", "q", "r");
        transcripts.commit("b", "q", "r");
        transcripts.commit("a", "q2", "r2");
        transcripts.commit("c", "q", "r");

        assert_eq!(transcripts.session_count(), 2);
        assert!(transcripts.history("b").is_empty());
        assert_eq!(transcripts.history("a").len(), 4);
        assert_eq!(transcripts.history("c").len(), 2);
    }

    #[test]
    fn test_session_with_turn_in_flight_is_kept() {
        let transcripts = Transcripts::with_limits(1, 10);
        transcripts.commit("a", "q", "r");
        let held = transcripts.turn_lock("a");
        transcripts.commit("b", "q", "r");

        assert_eq!(transcripts.history("a").len(), 2);
        assert_eq!(transcripts.history("b").len(), 2);
        drop(held);
        transcripts.commit("c", "q", "r");
        assert_eq!(transcripts.session_count(), 1);
        assert_eq!(transcripts.history("c").len(), 2);
    }

    #[tokio::test]
    async fn test_turns_on_one_session_are_serialised() {
        let transcripts = Transcripts::default();
        let lock = transcripts.turn_lock("s");
        let _first = lock.lock().await;
        assert!(transcripts.turn_lock("s").try_lock().is_err());
        assert!(transcripts.turn_lock("other").try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_missing_api_key_is_connection_error() {
        let config = AgentConfig::from_lookup(|_| None).unwrap();
        let assistant = AnthropicAssistant::new(&config);
        let ctx = InvocationContext {
            session_id: "default".to_string(),
            request_timestamp: Utc::now(),
            connection: Arc::new(ConnectionManager::new(config.connection_max_age)),
        };
        let err = assistant.respond(&ctx, "hi").await.unwrap_err();
        assert_eq!(err.kind(), "connection");
        assert_eq!(assistant.transcripts().session_count(), 0);
    }
}
