//! Mission specification: the agents, ordered plan and execution topology
//! sent to the orchestrator when a mission is launched.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MissionError, Result};

// ── ProcessType ───────────────────────────────────────────────────────────────

/// How the orchestrator schedules the plan across agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    /// Plan steps run one after another in the given order.
    #[default]
    Sequential,
    /// A manager agent delegates steps to the others.
    Hierarchical,
}

// ── AgentSpec / PlanStep ──────────────────────────────────────────────────────

/// One agent taking part in the mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub tool_ids: Vec<String>,
    /// Whether the agent may raise intervention requests.
    #[serde(default)]
    pub human_input: bool,
}

/// One ordered step of the mission plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub id: String,
    /// The [`AgentSpec::id`] assigned to this step.
    pub agent_id: String,
    pub instruction: String,
    /// Optional training passes run before the mission proper.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_iterations: Option<u32>,
}

// ── MissionSpec ───────────────────────────────────────────────────────────────

/// The complete payload of a `START_MISSION` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub agents: Vec<AgentSpec>,
    pub plan: Vec<PlanStep>,
    /// Server-side paths of previously uploaded files.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub process_type: ProcessType,
}

impl MissionSpec {
    /// Read and validate a mission spec from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| MissionError::SpecRead {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: MissionSpec = serde_json::from_str(&content)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check the mission is launchable.
    ///
    /// The plan and agent list must be non-empty and every step must be
    /// assigned to a declared agent.
    pub fn validate(&self) -> Result<()> {
        if self.agents.is_empty() {
            return Err(MissionError::InvalidSpec("no agents declared".to_string()));
        }
        if self.plan.is_empty() {
            return Err(MissionError::InvalidSpec("plan is empty".to_string()));
        }

        let known: HashSet<&str> = self.agents.iter().map(|a| a.id.as_str()).collect();
        if let Some(step) = self.plan.iter().find(|s| !known.contains(s.agent_id.as_str())) {
            return Err(MissionError::InvalidSpec(format!(
                "plan step '{}' references unknown agent '{}'",
                step.id, step.agent_id
            )));
        }

        Ok(())
    }

    /// The largest requested training pass count across the plan, if any.
    pub fn training_iterations(&self) -> Option<u32> {
        self.plan
            .iter()
            .filter_map(|s| s.training_iterations)
            .filter(|n| *n > 0)
            .max()
    }

    /// Short label for logs: the explicit goal, else the first instruction.
    pub fn label(&self) -> String {
        if let Some(goal) = self.goal.as_deref().filter(|g| !g.trim().is_empty()) {
            return goal.to_string();
        }
        self.plan
            .first()
            .map(|s| s.instruction.chars().take(100).collect())
            .unwrap_or_else(|| "Mission".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn agent(id: &str) -> AgentSpec {
        AgentSpec {
            id: id.to_string(),
            role: "Analyst".to_string(),
            goal: String::new(),
            backstory: String::new(),
            tool_ids: vec![],
            human_input: false,
        }
    }

    fn step(id: &str, agent_id: &str) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            agent_id: agent_id.to_string(),
            instruction: "Summarise the quarterly report".to_string(),
            training_iterations: None,
        }
    }

    fn spec() -> MissionSpec {
        MissionSpec {
            goal: None,
            agents: vec![agent("a1")],
            plan: vec![step("s1", "a1")],
            files: vec![],
            process_type: ProcessType::Sequential,
        }
    }

    // ── validate ──────────────────────────────────────────────────────────

    #[test]
    fn test_validate_accepts_minimal_spec() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_plan() {
        let mut s = spec();
        s.plan.clear();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("plan is empty"));
    }

    #[test]
    fn test_validate_rejects_no_agents() {
        let mut s = spec();
        s.agents.clear();
        assert!(matches!(s.validate(), Err(MissionError::InvalidSpec(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_agent_reference() {
        let mut s = spec();
        s.plan.push(step("s2", "ghost"));
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    // ── serde ─────────────────────────────────────────────────────────────

    #[test]
    fn test_wire_field_names() {
        let mut s = spec();
        s.process_type = ProcessType::Hierarchical;
        s.files = vec!["uploads/q3.pdf".to_string()];
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["processType"], json!("hierarchical"));
        assert_eq!(value["plan"][0]["agentId"], json!("a1"));
        assert_eq!(value["agents"][0]["humanInput"], json!(false));
        assert_eq!(value["files"][0], json!("uploads/q3.pdf"));
        assert!(value.get("goal").is_none());
    }

    #[test]
    fn test_process_type_defaults_to_sequential() {
        let s: MissionSpec = serde_json::from_value(json!({
            "agents": [{"id": "a1", "role": "Writer"}],
            "plan": [{"id": "s1", "agentId": "a1", "instruction": "Draft"}]
        }))
        .unwrap();
        assert_eq!(s.process_type, ProcessType::Sequential);
        assert!(s.files.is_empty());
    }

    // ── helpers ───────────────────────────────────────────────────────────

    #[test]
    fn test_training_iterations_takes_max() {
        let mut s = spec();
        s.plan[0].training_iterations = Some(2);
        let mut extra = step("s2", "a1");
        extra.training_iterations = Some(5);
        s.plan.push(extra);
        assert_eq!(s.training_iterations(), Some(5));
        assert_eq!(spec().training_iterations(), None);
    }

    #[test]
    fn test_label_prefers_goal() {
        let mut s = spec();
        assert_eq!(s.label(), "Summarise the quarterly report");
        s.goal = Some("Q3 review".to_string());
        assert_eq!(s.label(), "Q3 review");
    }

    // ── load_from ─────────────────────────────────────────────────────────

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("mission.json");
        std::fs::write(&path, serde_json::to_string(&spec()).unwrap()).unwrap();

        let loaded = MissionSpec::load_from(&path).expect("load");
        assert_eq!(loaded, spec());
    }

    #[test]
    fn test_load_from_missing_file() {
        let tmp = TempDir::new().expect("tempdir");
        let err = MissionSpec::load_from(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MissionError::SpecRead { .. }));
    }

    #[test]
    fn test_load_from_invalid_spec() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("mission.json");
        std::fs::write(&path, r#"{"agents": [], "plan": []}"#).unwrap();
        assert!(matches!(
            MissionSpec::load_from(&path),
            Err(MissionError::InvalidSpec(_))
        ));
    }
}
