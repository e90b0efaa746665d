use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Agent label reserved for orchestrator-level events.
pub const SYSTEM_AGENT: &str = "System";

// ── EntryKind ─────────────────────────────────────────────────────────────────

/// Category of a transcript line.
///
/// Kinds the orchestrator may add later are kept verbatim in [`EntryKind::Other`]
/// so that new event types still show up in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    Thought,
    Action,
    Output,
    System,
    Error,
    Stream,
    Other(String),
}

impl EntryKind {
    /// Wire spelling of the kind (e.g. `"THOUGHT"`).
    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Thought => "THOUGHT",
            EntryKind::Action => "ACTION",
            EntryKind::Output => "OUTPUT",
            EntryKind::System => "SYSTEM",
            EntryKind::Error => "ERROR",
            EntryKind::Stream => "STREAM",
            EntryKind::Other(raw) => raw,
        }
    }
}

impl From<&str> for EntryKind {
    fn from(raw: &str) -> Self {
        match raw {
            "THOUGHT" => EntryKind::Thought,
            "ACTION" => EntryKind::Action,
            "OUTPUT" => EntryKind::Output,
            "SYSTEM" => EntryKind::System,
            "ERROR" => EntryKind::Error,
            "STREAM" => EntryKind::Stream,
            other => EntryKind::Other(other.to_string()),
        }
    }
}

impl From<String> for EntryKind {
    fn from(raw: String) -> Self {
        EntryKind::from(raw.as_str())
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// Body of a transcript entry.
///
/// Text payloads may be extended by stream consolidation; structured payloads
/// are only ever displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
    Structured(Value),
}

impl Payload {
    /// The text body, or `None` for structured payloads.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Structured(_) => None,
        }
    }

    /// Render the payload as a single display string.
    ///
    /// Structured values are serialised as compact JSON.
    pub fn to_display_string(&self) -> String {
        match self {
            Payload::Text(text) => text.clone(),
            Payload::Structured(value) => value.to_string(),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Payload::Text(text),
            other => Payload::Structured(other),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

// ── LogEntry ──────────────────────────────────────────────────────────────────

/// One line of the mission transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Wall-clock time the underlying frame was received.
    pub timestamp: DateTime<Utc>,
    /// Emitting agent; [`SYSTEM_AGENT`] for orchestrator-level events.
    pub agent_label: String,
    /// Entry category.
    pub kind: EntryKind,
    /// Entry body.
    pub payload: Payload,
    /// Set only on entries tied to an intervention request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl LogEntry {
    /// Build an entry stamped with the current time.
    pub fn new(agent_label: impl Into<String>, kind: EntryKind, payload: impl Into<Payload>) -> Self {
        Self {
            timestamp: Utc::now(),
            agent_label: agent_label.into(),
            kind,
            payload: payload.into(),
            request_id: None,
        }
    }

    /// Shorthand for a SYSTEM entry from the reserved system agent.
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(SYSTEM_AGENT, EntryKind::System, Payload::Text(message.into()))
    }

    /// Shorthand for an ERROR entry from the reserved system agent.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(SYSTEM_AGENT, EntryKind::Error, Payload::Text(message.into()))
    }

    /// Attach the intervention request this entry belongs to.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

// ── TokenUsage ────────────────────────────────────────────────────────────────

/// Latest token and cost totals as reported by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Cumulative cost in US dollars.
    pub total_cost: f64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

// ── InterventionRequest ───────────────────────────────────────────────────────

/// A decision the orchestrator is blocked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRequest {
    /// Must be echoed back verbatim in the response.
    pub request_id: String,
    /// What is being asked, usually a question string.
    pub content: Value,
    #[serde(default)]
    pub resolved: bool,
}

impl InterventionRequest {
    pub fn new(request_id: impl Into<String>, content: Value) -> Self {
        Self {
            request_id: request_id.into(),
            content,
            resolved: false,
        }
    }

    /// The question text, falling back to compact JSON for structured prompts.
    pub fn prompt(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

// ── Decision ──────────────────────────────────────────────────────────────────

/// The operator's answer to an intervention request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Retry,
    Ignore,
    Cancel,
    /// Free-text answer forwarded as-is.
    Reply(String),
}

impl Decision {
    /// Token sent to the orchestrator as the response `content`.
    pub fn as_token(&self) -> &str {
        match self {
            Decision::Proceed => "proceed",
            Decision::Retry => "retry",
            Decision::Ignore => "ignore",
            Decision::Cancel => "cancel",
            Decision::Reply(text) => text,
        }
    }
}

impl FromStr for Decision {
    type Err = std::convert::Infallible;

    /// Keywords match case-insensitively; anything else becomes a reply.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_lowercase().as_str() {
            "proceed" | "p" => Decision::Proceed,
            "retry" | "r" => Decision::Retry,
            "ignore" | "i" => Decision::Ignore,
            "cancel" | "c" => Decision::Cancel,
            _ => Decision::Reply(trimmed.to_string()),
        })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}
