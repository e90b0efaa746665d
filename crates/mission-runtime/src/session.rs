//! Live mission state.
//!
//! A [`Session`] owns the transcript, the usage snapshot and the intervention
//! coordinator of one mission run. It is mutated only by the session loop in
//! [`crate::connection`]; observers receive cloned [`SessionSnapshot`]s.

use mission_core::frame::OutboundFrame;
use mission_core::intervention::{InterventionCoordinator, InterventionState, OfferOutcome};
use mission_core::models::{Decision, InterventionRequest, LogEntry, TokenUsage};
use mission_core::transcript::{AppendOutcome, Transcript, TranscriptView};
use mission_core::usage::UsageAccumulator;

pub const CONNECTION_CLOSED: &str = "Connection closed.";
pub const CONNECTION_ERROR: &str = "Connection error.";
pub const MISSION_CANCELLED: &str = "Mission cancelled.";

// ── SessionSnapshot ───────────────────────────────────────────────────────────

/// Point-in-time copy of a session, published after every state change.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub mission_id: Option<String>,
    pub goal: Option<String>,
    pub running: bool,
    pub final_artifact: Option<String>,
    pub usage: TokenUsage,
    /// Usage reports received this run.
    pub usage_updates: u64,
    /// Shares settled history with the live transcript.
    pub entries: TranscriptView,
    pub pending_intervention: Option<InterventionRequest>,
    /// Transcript revision; changes on every append or merge.
    pub revision: u64,
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Session {
    mission_id: Option<String>,
    goal: Option<String>,
    running: bool,
    final_artifact: Option<String>,
    transcript: Transcript,
    usage: UsageAccumulator,
    intervention: InterventionCoordinator,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear everything left over from a previous run and mark the session
    /// running.
    pub fn start(&mut self) {
        self.reset();
        self.running = true;
    }

    /// Return to the pristine, not-running state.
    pub fn reset(&mut self) {
        self.mission_id = None;
        self.goal = None;
        self.running = false;
        self.final_artifact = None;
        self.transcript.clear();
        self.usage.reset();
        self.intervention.reset();
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn mission_id(&self) -> Option<&str> {
        self.mission_id.as_deref()
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn final_artifact(&self) -> Option<&str> {
        self.final_artifact.as_deref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage.current()
    }

    pub fn intervention_state(&self) -> InterventionState {
        self.intervention.state()
    }

    pub fn pending_intervention(&self) -> Option<&InterventionRequest> {
        self.intervention.pending()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mission_id: self.mission_id.clone(),
            goal: self.goal.clone(),
            running: self.running,
            final_artifact: self.final_artifact.clone(),
            usage: self.usage.current(),
            usage_updates: self.usage.updates(),
            entries: self.transcript.entries().clone(),
            pending_intervention: self.intervention.pending().cloned(),
            revision: self.transcript.revision(),
        }
    }

    // ── Mutators used by the router and the session loop ──────────────────

    pub(crate) fn set_mission(&mut self, mission_id: String, goal: Option<String>) {
        self.mission_id = Some(mission_id);
        if goal.is_some() {
            self.goal = goal;
        }
    }

    /// Record the mission's final artifact, replacing any earlier one.
    ///
    /// The orchestrator reports every tool result as a `System` output and
    /// sends the mission result last, so the latest value is the one that
    /// counts. Returns the value it replaced.
    pub(crate) fn set_final_artifact(&mut self, artifact: String) -> Option<String> {
        self.final_artifact.replace(artifact)
    }

    pub(crate) fn append(&mut self, entry: LogEntry) -> AppendOutcome {
        self.transcript.append(entry)
    }

    pub(crate) fn replace_usage(&mut self, snapshot: TokenUsage) {
        self.usage.replace(snapshot);
    }

    pub(crate) fn offer_intervention(&mut self, request: InterventionRequest) -> OfferOutcome {
        self.intervention.offer(request)
    }

    /// Apply an operator decision; returns the frame to transmit, if any.
    pub fn resolve_intervention(
        &mut self,
        request_id: &str,
        decision: &Decision,
    ) -> Option<OutboundFrame> {
        self.intervention
            .resolve(request_id, decision, &mut self.transcript)
    }

    /// A decision could not be handed to the channel. The request stays
    /// pending and the transcript says so.
    pub(crate) fn record_undelivered(&mut self, request_id: &str, decision: &Decision) {
        self.transcript.append(
            LogEntry::error(format!(
                "Decision '{}' for {request_id} was not delivered: connection lost.",
                decision.as_token()
            ))
            .with_request_id(request_id),
        );
    }

    /// The channel closed. Appends the notice only on the first teardown.
    pub(crate) fn mark_closed(&mut self) {
        self.stop_with(LogEntry::system(CONNECTION_CLOSED));
    }

    /// The channel failed.
    pub(crate) fn mark_error(&mut self) {
        self.stop_with(LogEntry::error(CONNECTION_ERROR));
    }

    /// The operator cancelled the mission locally.
    pub(crate) fn mark_cancelled(&mut self) {
        self.stop_with(LogEntry::system(MISSION_CANCELLED));
    }

    fn stop_with(&mut self, notice: LogEntry) {
        if !self.running {
            return;
        }
        self.running = false;
        self.transcript.append(notice);
    }
}
