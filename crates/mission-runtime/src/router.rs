//! Inbound frame classification and dispatch.
//!
//! Every raw frame goes through [`MessageRouter::dispatch`], which parses it
//! and applies exactly one of the routing rules below to the [`Session`]:
//!
//! 1. `MISSION_STARTED` sets the mission id.
//! 2. `HUMAN_INPUT_REQUEST` is offered to the intervention coordinator.
//! 3. `USAGE` replaces the usage snapshot.
//! 4. `OUTPUT` from the `System` agent records the final artifact and is also
//!    appended to the transcript.
//! 5. `STREAM` is appended with consolidation.
//! 6. Anything else is appended as-is.
//!
//! Frames that fail to parse are dropped with a warning and leave the session
//! untouched.

use mission_core::frame::InboundFrame;
use mission_core::intervention::OfferOutcome;
use mission_core::models::{EntryKind, LogEntry, SYSTEM_AGENT};
use mission_core::transcript::AppendOutcome;
use tracing::{debug, warn};

use crate::session::Session;

/// What the router did with a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    MissionStarted,
    InterventionOffered,
    /// A second request arrived while one was pending and was dropped.
    InterventionRejected,
    UsageReplaced,
    /// The final artifact was recorded and the entry appended.
    FinalArtifact,
    Appended,
    /// A stream fragment was merged into the previous entry.
    Merged,
    /// The frame was malformed and ignored.
    Dropped,
}

/// Consumer of raw inbound frames, registered with
/// [`crate::connection::ConnectionManager::on_frame`].
pub trait FrameHandler: Send + Sync {
    fn handle(&self, session: &mut Session, raw: &str) -> Dispatch;
}

/// The default [`FrameHandler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        Self
    }

    /// Parse `raw` and route it.
    pub fn dispatch(&self, session: &mut Session, raw: &str) -> Dispatch {
        match InboundFrame::parse(raw) {
            Ok(frame) => self.route(session, frame),
            Err(e) => {
                warn!(error = %e, frame_len = raw.len(), "dropping inbound frame");
                Dispatch::Dropped
            }
        }
    }

    /// Route an already-parsed frame.
    pub fn route(&self, session: &mut Session, frame: InboundFrame) -> Dispatch {
        match frame {
            InboundFrame::MissionStarted { mission_id, goal } => {
                debug!(%mission_id, "mission started");
                session.set_mission(mission_id, goal);
                Dispatch::MissionStarted
            }
            InboundFrame::HumanInputRequest(request) => {
                let request_id = request.request_id.clone();
                match session.offer_intervention(request) {
                    OfferOutcome::Accepted => Dispatch::InterventionOffered,
                    OfferOutcome::Rejected { pending_request_id } => {
                        session.append(LogEntry::system(format!(
                            "Intervention request {request_id} dropped: still awaiting a decision on {pending_request_id}."
                        )));
                        Dispatch::InterventionRejected
                    }
                }
            }
            InboundFrame::Usage(usage) => {
                debug!(
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    total_cost = usage.total_cost,
                    "usage updated"
                );
                session.replace_usage(usage);
                Dispatch::UsageReplaced
            }
            InboundFrame::Event {
                kind,
                agent_name,
                content,
            } => {
                let agent = agent_name.unwrap_or_else(|| SYSTEM_AGENT.to_string());

                if kind == EntryKind::Output && agent == SYSTEM_AGENT {
                    if let Some(previous) = session.set_final_artifact(content.to_display_string())
                    {
                        debug!(
                            replaced_len = previous.len(),
                            "later System output supersedes the final artifact"
                        );
                    }
                    session.append(LogEntry::new(agent, kind, content));
                    return Dispatch::FinalArtifact;
                }

                match session.append(LogEntry::new(agent, kind, content)) {
                    AppendOutcome::Appended(_) => Dispatch::Appended,
                    AppendOutcome::Merged(_) => Dispatch::Merged,
                }
            }
        }
    }
}

impl FrameHandler for MessageRouter {
    fn handle(&self, session: &mut Session, raw: &str) -> Dispatch {
        self.dispatch(session, raw)
    }
}
