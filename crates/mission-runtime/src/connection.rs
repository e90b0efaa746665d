//! Connection lifecycle for mission sessions.
//!
//! [`ConnectionManager::launch`] opens one channel per session, sends the
//! `START_MISSION` frame and spawns a session loop that owns the [`Session`]
//! exclusively. The loop feeds inbound frames to the registered
//! [`FrameHandler`] in receipt order, applies operator commands between
//! frames, and publishes a [`SessionSnapshot`] after every change.
//!
//! There is no reconnection: once the channel closes or fails the session is
//! over and a fresh `launch` is required.

use std::sync::Arc;

use mission_core::error::{MissionError, Result};
use mission_core::frame::OutboundFrame;
use mission_core::mission::MissionSpec;
use mission_core::models::Decision;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::router::{FrameHandler, MessageRouter};
use crate::session::{Session, SessionSnapshot};
use crate::transport::{Connector, Transport, TransportEvent};

// ── Commands ──────────────────────────────────────────────────────────────────

/// Operator input delivered to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Resolve {
        request_id: String,
        decision: Decision,
    },
    Cancel,
}

// ── SessionHandle ─────────────────────────────────────────────────────────────

/// Caller-side handle to a launched mission.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    updates: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Submit a decision for the pending intervention request.
    ///
    /// Returns `false` if the session has already ended. A decision for a
    /// request that is no longer pending is ignored by the session.
    pub async fn resolve(&self, request_id: impl Into<String>, decision: Decision) -> bool {
        self.commands
            .send(SessionCommand::Resolve {
                request_id: request_id.into(),
                decision,
            })
            .await
            .is_ok()
    }

    /// Tear the session down. Calling this on an ended session does nothing.
    pub async fn cancel(&self) {
        let _ = self.commands.send(SessionCommand::Cancel).await;
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.updates.borrow().clone()
    }

    /// Wait for the next published snapshot.
    ///
    /// Returns `None` after the session loop has exited and its final snapshot
    /// has been observed.
    pub async fn changed(&mut self) -> Option<SessionSnapshot> {
        match self.updates.changed().await {
            Ok(()) => Some(self.updates.borrow_and_update().clone()),
            Err(_) => None,
        }
    }
}

// ── ConnectionManager ─────────────────────────────────────────────────────────

struct ActiveSession {
    commands: mpsc::Sender<SessionCommand>,
    task: JoinHandle<Session>,
}

/// Owns the streaming channel of at most one running session.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    url: String,
    handler: Arc<dyn FrameHandler>,
    active: Option<ActiveSession>,
    /// A session that ended before its loop was spawned (failed launch).
    finished: Option<Session>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, url: impl Into<String>) -> Self {
        Self {
            connector,
            url: url.into(),
            handler: Arc::new(MessageRouter::new()),
            active: None,
            finished: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Register the consumer of inbound frames for subsequent launches.
    pub fn on_frame(&mut self, handler: Arc<dyn FrameHandler>) {
        self.handler = handler;
    }

    /// Whether a session loop is still running.
    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }

    /// Open a channel and start `spec` on it.
    ///
    /// Fails with [`MissionError::SessionActive`] if a session is still
    /// running, leaving it untouched. A connection failure yields
    /// [`MissionError::Transport`]; the failed session, with its
    /// `"Connection error."` entry, is available from [`Self::join`].
    pub async fn launch(&mut self, spec: MissionSpec) -> Result<SessionHandle> {
        if self.is_running() {
            warn!("launch rejected: a mission session is already running");
            return Err(MissionError::SessionActive);
        }
        // Reap a loop that ended on its own.
        if let Some(previous) = self.active.take() {
            previous.task.abort();
        }
        self.finished = None;

        let mut session = Session::new();
        session.start();

        let transport = match self.connector.connect(&self.url).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!(url = %self.url, error = %e, "failed to open mission channel");
                session.mark_error();
                self.finished = Some(session);
                return Err(e);
            }
        };

        info!(url = %self.url, mission = %spec.label(), "launching mission");
        let start = OutboundFrame::StartMission { payload: spec };
        if transport.outbound.send(start).await.is_err() {
            session.mark_error();
            self.finished = Some(session);
            return Err(MissionError::Transport(
                "channel closed before the mission could start".to_string(),
            ));
        }

        let (command_tx, command_rx) = mpsc::channel(32);
        let (update_tx, update_rx) = watch::channel(session.snapshot());

        let session_loop = SessionLoop {
            session,
            transport,
            commands: command_rx,
            updates: update_tx,
            handler: Arc::clone(&self.handler),
        };
        let task = tokio::spawn(session_loop.run());

        self.active = Some(ActiveSession {
            commands: command_tx.clone(),
            task,
        });

        Ok(SessionHandle {
            commands: command_tx,
            updates: update_rx,
        })
    }

    /// Close the channel of the running session, if any.
    pub async fn cancel(&self) {
        if let Some(active) = &self.active {
            let _ = active.commands.send(SessionCommand::Cancel).await;
        }
    }

    /// Wait for the current session to end and take its final state.
    pub async fn join(&mut self) -> Option<Session> {
        if let Some(active) = self.active.take() {
            match active.task.await {
                Ok(session) => return Some(session),
                Err(e) => {
                    warn!(error = %e, "session loop did not finish cleanly");
                    return None;
                }
            }
        }
        self.finished.take()
    }
}

// ── SessionLoop ───────────────────────────────────────────────────────────────

struct SessionLoop {
    session: Session,
    transport: Transport,
    commands: mpsc::Receiver<SessionCommand>,
    updates: watch::Sender<SessionSnapshot>,
    handler: Arc<dyn FrameHandler>,
}

impl SessionLoop {
    async fn run(mut self) -> Session {
        loop {
            tokio::select! {
                // Operator commands first so a cancel is never stuck behind a
                // burst of frames.
                biased;

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Resolve { request_id, decision }) => {
                        self.resolve(&request_id, &decision).await;
                    }
                    Some(SessionCommand::Cancel) | None => {
                        info!("mission cancelled by operator");
                        self.session.mark_cancelled();
                        break;
                    }
                },

                event = self.transport.inbound.recv() => match event {
                    Some(TransportEvent::Frame(raw)) => {
                        let outcome = self.handler.handle(&mut self.session, &raw);
                        debug!(?outcome, "frame dispatched");
                    }
                    Some(TransportEvent::Error(reason)) => {
                        warn!(%reason, "mission channel failed");
                        self.session.mark_error();
                        break;
                    }
                    Some(TransportEvent::Closed) | None => {
                        info!("mission channel closed");
                        self.session.mark_closed();
                        break;
                    }
                },
            }
            self.publish();
        }

        self.publish();
        self.session
    }

    /// Commit a decision only once the channel has room for its reply, so the
    /// transcript never records an intervention the orchestrator did not get.
    async fn resolve(&mut self, request_id: &str, decision: &Decision) {
        let is_pending = self
            .session
            .pending_intervention()
            .is_some_and(|r| r.request_id == request_id);
        if !is_pending {
            // Stale or unknown; the coordinator logs and ignores it.
            self.session.resolve_intervention(request_id, decision);
            return;
        }

        let Ok(permit) = self.transport.outbound.reserve().await else {
            warn!(request_id, "channel gone before the decision could be sent");
            self.session.record_undelivered(request_id, decision);
            return;
        };
        if let Some(frame) = self.session.resolve_intervention(request_id, decision) {
            info!(request_id, decision = %decision, "intervention resolved");
            permit.send(frame);
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.session.snapshot());
    }
}
