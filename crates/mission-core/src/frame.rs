//! Wire protocol: JSON frames exchanged with the orchestrator.
//!
//! Inbound frames are discriminated by their `type` field, outbound frames by
//! their `action` field. Parsing is strict about the fields each recognised
//! kind needs and lenient about everything else, so unknown event kinds pass
//! through as plain transcript events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MissionError, Result};
use crate::mission::MissionSpec;
use crate::models::{EntryKind, InterventionRequest, Payload, TokenUsage};

// ── Discriminants ─────────────────────────────────────────────────────────────

pub const MISSION_STARTED: &str = "MISSION_STARTED";
pub const HUMAN_INPUT_REQUEST: &str = "HUMAN_INPUT_REQUEST";
pub const USAGE: &str = "USAGE";

// ── InboundFrame ──────────────────────────────────────────────────────────────

/// A parsed frame received from the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// The orchestrator assigned an identifier to the mission.
    MissionStarted {
        mission_id: String,
        goal: Option<String>,
    },
    /// The orchestrator is blocked on a human decision.
    HumanInputRequest(InterventionRequest),
    /// Authoritative cumulative usage totals.
    Usage(TokenUsage),
    /// Any transcript-bearing frame: `OUTPUT`, `STREAM`, `THOUGHT`, `ACTION`,
    /// `SYSTEM`, `ERROR` or a kind this client does not know yet.
    Event {
        kind: EntryKind,
        agent_name: Option<String>,
        content: Payload,
    },
}

impl InboundFrame {
    /// Parse a raw text frame.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    /// Classify an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(MissionError::MalformedFrame(
                "frame is not a JSON object".to_string(),
            ));
        };

        let kind = match map.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(_) => {
                return Err(MissionError::MalformedFrame(
                    "field 'type' must be a string".to_string(),
                ))
            }
            None => {
                return Err(MissionError::MalformedFrame(
                    "missing discriminant field 'type'".to_string(),
                ))
            }
        };

        match kind.as_str() {
            MISSION_STARTED => {
                let mission_id = map
                    .remove("mission_id")
                    .and_then(opaque_id)
                    .ok_or_else(|| missing(&kind, "mission_id"))?;
                let goal = match map.remove("goal") {
                    Some(Value::String(goal)) => Some(goal),
                    _ => None,
                };
                Ok(InboundFrame::MissionStarted { mission_id, goal })
            }
            HUMAN_INPUT_REQUEST => {
                let request_id = map
                    .remove("requestId")
                    .and_then(opaque_id)
                    .ok_or_else(|| missing(&kind, "requestId"))?;
                let content = required_content(&mut map, &kind)?;
                Ok(InboundFrame::HumanInputRequest(InterventionRequest::new(
                    request_id, content,
                )))
            }
            USAGE => {
                let content = required_content(&mut map, &kind)?;
                let usage: TokenUsage = serde_json::from_value(content)?;
                if !usage.total_cost.is_finite() || usage.total_cost < 0.0 {
                    return Err(MissionError::MalformedFrame(format!(
                        "USAGE totalCost must be a non-negative number, got {}",
                        usage.total_cost
                    )));
                }
                Ok(InboundFrame::Usage(usage))
            }
            _ => {
                let content = required_content(&mut map, &kind)?;
                let agent_name = match map.remove("agentName") {
                    Some(Value::String(name)) if !name.is_empty() => Some(name),
                    _ => None,
                };
                Ok(InboundFrame::Event {
                    kind: EntryKind::from(kind.as_str()),
                    agent_name,
                    content: Payload::from(content),
                })
            }
        }
    }
}

/// Identifiers are opaque; the orchestrator sends them as strings or integers.
fn opaque_id(value: Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn required_content(map: &mut Map<String, Value>, kind: &str) -> Result<Value> {
    match map.remove("content") {
        Some(Value::Null) | None => Err(missing(kind, "content")),
        Some(content) => Ok(content),
    }
}

fn missing(kind: &str, field: &'static str) -> MissionError {
    MissionError::MissingField {
        kind: kind.to_string(),
        field,
    }
}

// ── OutboundFrame ─────────────────────────────────────────────────────────────

/// A frame sent to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundFrame {
    /// Sent once per session, right after the channel opens.
    StartMission { payload: MissionSpec },
    /// Answer to a resolved intervention request.
    HumanResponse {
        #[serde(rename = "requestId")]
        request_id: String,
        content: String,
    },
}

impl OutboundFrame {
    /// Serialise to the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name of the action, for logging.
    pub fn action(&self) -> &'static str {
        match self {
            OutboundFrame::StartMission { .. } => "START_MISSION",
            OutboundFrame::HumanResponse { .. } => "HUMAN_RESPONSE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::{AgentSpec, PlanStep, ProcessType};
    use serde_json::json;

    // ── MISSION_STARTED ───────────────────────────────────────────────────

    #[test]
    fn test_parse_mission_started_numeric_id() {
        let frame = InboundFrame::parse(r#"{"type":"MISSION_STARTED","mission_id":7}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::MissionStarted {
                mission_id: "7".to_string(),
                goal: None
            }
        );
    }

    #[test]
    fn test_parse_mission_started_with_goal() {
        let frame = InboundFrame::parse(
            r#"{"type":"MISSION_STARTED","mission_id":"m-42","goal":"Q3 review"}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            InboundFrame::MissionStarted {
                mission_id: "m-42".to_string(),
                goal: Some("Q3 review".to_string())
            }
        );
    }

    #[test]
    fn test_parse_mission_started_without_id_is_rejected() {
        let err = InboundFrame::parse(r#"{"type":"MISSION_STARTED"}"#).unwrap_err();
        assert!(matches!(
            err,
            MissionError::MissingField {
                field: "mission_id",
                ..
            }
        ));
    }

    // ── HUMAN_INPUT_REQUEST ───────────────────────────────────────────────

    #[test]
    fn test_parse_human_input_request() {
        let frame = InboundFrame::parse(
            r#"{"type":"HUMAN_INPUT_REQUEST","requestId":"req_1","content":"Approve?"}"#,
        )
        .unwrap();
        let InboundFrame::HumanInputRequest(request) = frame else {
            panic!("expected intervention request");
        };
        assert_eq!(request.request_id, "req_1");
        assert_eq!(request.content, json!("Approve?"));
        assert!(!request.resolved);
    }

    #[test]
    fn test_parse_human_input_request_without_request_id() {
        let err =
            InboundFrame::parse(r#"{"type":"HUMAN_INPUT_REQUEST","content":"Approve?"}"#).unwrap_err();
        assert!(matches!(
            err,
            MissionError::MissingField {
                field: "requestId",
                ..
            }
        ));
    }

    // ── USAGE ─────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_usage() {
        let frame = InboundFrame::parse(
            r#"{"type":"USAGE","content":{"inputTokens":120,"outputTokens":340,"totalCost":0.0021}}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            InboundFrame::Usage(TokenUsage {
                input_tokens: 120,
                output_tokens: 340,
                total_cost: 0.0021
            })
        );
    }

    #[test]
    fn test_parse_usage_negative_cost_rejected() {
        let err = InboundFrame::parse(
            r#"{"type":"USAGE","content":{"inputTokens":1,"outputTokens":1,"totalCost":-0.5}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, MissionError::MalformedFrame(_)));
    }

    #[test]
    fn test_parse_usage_missing_content() {
        let err = InboundFrame::parse(r#"{"type":"USAGE"}"#).unwrap_err();
        assert!(matches!(err, MissionError::MissingField { field: "content", .. }));
    }

    // ── Events ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_stream_event() {
        let frame =
            InboundFrame::parse(r#"{"type":"STREAM","agentName":"Alice","content":"Hel"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Event {
                kind: EntryKind::Stream,
                agent_name: Some("Alice".to_string()),
                content: Payload::Text("Hel".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_error_event_without_agent() {
        let frame = InboundFrame::parse(r#"{"type":"ERROR","content":"Missing API Key"}"#).unwrap();
        let InboundFrame::Event { kind, agent_name, .. } = frame else {
            panic!("expected event");
        };
        assert_eq!(kind, EntryKind::Error);
        assert!(agent_name.is_none());
    }

    #[test]
    fn test_parse_unknown_kind_preserved() {
        let frame = InboundFrame::parse(
            r#"{"type":"TOOL_RESULT","agentName":"Bob","content":{"rows":3}}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            InboundFrame::Event {
                kind: EntryKind::Other("TOOL_RESULT".to_string()),
                agent_name: Some("Bob".to_string()),
                content: Payload::Structured(json!({"rows": 3})),
            }
        );
    }

    // ── Malformed ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_invalid_json() {
        let err = InboundFrame::parse("{not json").unwrap_err();
        assert!(matches!(err, MissionError::JsonParse(_)));
    }

    #[test]
    fn test_parse_non_object() {
        let err = InboundFrame::parse("[1,2,3]").unwrap_err();
        assert!(matches!(err, MissionError::MalformedFrame(_)));
    }

    #[test]
    fn test_parse_missing_type() {
        let err = InboundFrame::parse(r#"{"content":"orphan"}"#).unwrap_err();
        assert!(matches!(err, MissionError::MalformedFrame(_)));
    }

    // ── OutboundFrame ─────────────────────────────────────────────────────

    #[test]
    fn test_outbound_human_response_shape() {
        let frame = OutboundFrame::HumanResponse {
            request_id: "req_9".to_string(),
            content: "proceed".to_string(),
        };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"action": "HUMAN_RESPONSE", "requestId": "req_9", "content": "proceed"})
        );
        assert_eq!(frame.action(), "HUMAN_RESPONSE");
    }

    #[test]
    fn test_outbound_start_mission_shape() {
        let spec = MissionSpec {
            goal: None,
            agents: vec![AgentSpec {
                id: "a1".to_string(),
                role: "Researcher".to_string(),
                goal: "Find facts".to_string(),
                backstory: String::new(),
                tool_ids: vec!["search".to_string()],
                human_input: true,
            }],
            plan: vec![PlanStep {
                id: "s1".to_string(),
                agent_id: "a1".to_string(),
                instruction: "Research".to_string(),
                training_iterations: None,
            }],
            files: vec![],
            process_type: ProcessType::Hierarchical,
        };
        let frame = OutboundFrame::StartMission { payload: spec };
        let value: Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(value["action"], json!("START_MISSION"));
        assert_eq!(value["payload"]["processType"], json!("hierarchical"));
        assert_eq!(value["payload"]["agents"][0]["toolIds"], json!(["search"]));
        assert_eq!(value["payload"]["plan"][0]["agentId"], json!("a1"));
    }
}
