//! Human-in-the-loop arbitration.
//!
//! At most one intervention request is unresolved at any time. A second
//! request offered while one is pending is rejected, and a decision naming
//! anything but the pending request is ignored.

use tracing::{debug, warn};

use crate::frame::OutboundFrame;
use crate::models::{Decision, InterventionRequest, LogEntry};
use crate::transcript::Transcript;

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterventionState {
    Idle,
    AwaitingDecision,
}

/// Result of [`InterventionCoordinator::offer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    /// Another request is still waiting for a decision.
    Rejected { pending_request_id: String },
}

#[derive(Debug, Clone, Default)]
pub struct InterventionCoordinator {
    pending: Option<InterventionRequest>,
}

impl InterventionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> InterventionState {
        if self.pending.is_some() {
            InterventionState::AwaitingDecision
        } else {
            InterventionState::Idle
        }
    }

    /// The request currently awaiting a decision.
    pub fn pending(&self) -> Option<&InterventionRequest> {
        self.pending.as_ref()
    }

    /// Hold `request` for a decision. Only accepted while idle.
    pub fn offer(&mut self, mut request: InterventionRequest) -> OfferOutcome {
        if let Some(pending) = &self.pending {
            warn!(
                request_id = %request.request_id,
                pending_request_id = %pending.request_id,
                "intervention request rejected: another request is pending"
            );
            return OfferOutcome::Rejected {
                pending_request_id: pending.request_id.clone(),
            };
        }

        debug!(request_id = %request.request_id, "awaiting operator decision");
        request.resolved = false;
        self.pending = Some(request);
        OfferOutcome::Accepted
    }

    /// Resolve the pending request with the operator's `decision`.
    ///
    /// Returns the response frame to transmit and records the decision in the
    /// transcript. Returns `None` and changes nothing when `request_id` does
    /// not name the pending request.
    pub fn resolve(
        &mut self,
        request_id: &str,
        decision: &Decision,
        transcript: &mut Transcript,
    ) -> Option<OutboundFrame> {
        if self.pending.as_ref().map(|p| p.request_id.as_str()) != Some(request_id) {
            warn!(request_id, "ignoring decision for unknown or stale intervention request");
            return None;
        }
        let request = self.pending.take()?;

        let token = decision.as_token().to_string();
        transcript.append(
            LogEntry::system(format!("User intervention: {token}"))
                .with_request_id(request.request_id.clone()),
        );

        Some(OutboundFrame::HumanResponse {
            request_id: request.request_id,
            content: token,
        })
    }

    /// Return to idle, forgetting any pending request.
    pub fn reset(&mut self) {
        self.pending = None;
    }
}
