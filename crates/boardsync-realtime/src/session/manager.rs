//! Session manager — explicit owner of per-session collaboration state.
//!
//! The application constructs and injects a manager; nothing lives at
//! module scope. Teardown is explicit ([`SessionManager::shutdown`]) or
//! via drop, and a fresh manager per test is cheap.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use boardsync_core::CollabResult;
use boardsync_core::config::AppConfig;
use boardsync_core::config::collab::CollabConfig;
use boardsync_core::error::CollabError;
use boardsync_core::types::id::{ParticipantId, SessionId};

use crate::broadcast::broadcaster::ChangeBroadcaster;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::presence::participant::ParticipantState;
use crate::presence::registry::PresenceRegistry;
use crate::transport::{self, SessionTransport};

use super::handle::SessionHandle;
use super::lifecycle::{ControllerContext, LifecycleController, LifecycleState};
use super::session::Session;

/// Owns the `SessionId → Session` map and wires up attachments.
#[derive(Debug)]
pub struct SessionManager {
    config: CollabConfig,
    transport: Arc<dyn SessionTransport>,
    registry: Arc<PresenceRegistry>,
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
    metrics: Arc<EngineMetrics>,
    shutdown: CancellationToken,
}

impl SessionManager {
    /// Creates a manager over the given transport and starts the session
    /// sweeper.
    pub fn new(config: CollabConfig, transport: Arc<dyn SessionTransport>) -> Self {
        let manager = Self {
            config,
            transport,
            registry: Arc::new(PresenceRegistry::new()),
            sessions: Arc::new(DashMap::new()),
            metrics: Arc::new(EngineMetrics::new()),
            shutdown: CancellationToken::new(),
        };

        tokio::spawn(run_sweeper(
            manager.sessions.clone(),
            manager.registry.clone(),
            manager.metrics.clone(),
            Duration::from_secs(manager.config.session_grace_seconds),
            manager.shutdown.clone(),
        ));

        info!("session manager initialized");
        manager
    }

    /// Convenience constructor: builds the configured transport too.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.collab.clone(), transport::from_config(config))
    }

    /// Attaches a new participant to a session.
    ///
    /// Suspends until the transport handshake completes or times out.
    /// Returns [`ErrorKind::SessionUnavailable`] when the session layer
    /// cannot be reached.
    ///
    /// [`ErrorKind::SessionUnavailable`]: boardsync_core::error::ErrorKind::SessionUnavailable
    pub async fn join(
        &self,
        session_id: SessionId,
        display_name: &str,
    ) -> CollabResult<SessionHandle> {
        if self.shutdown.is_cancelled() {
            return Err(CollabError::closed("session manager is shut down"));
        }

        let participant_id = ParticipantId::new();
        let (state_tx, state_rx) = watch::channel(LifecycleState::Connecting);

        let hello = ParticipantState::new(participant_id, display_name);
        let attach_timeout = Duration::from_secs(self.config.attach_timeout_seconds);
        let link = match time::timeout(
            attach_timeout,
            self.transport.attach(session_id, hello),
        )
        .await
        {
            Ok(Ok(link)) => link,
            Ok(Err(err)) => return Err(err),
            Err(_) => {
                return Err(CollabError::session_unavailable(format!(
                    "attach to session {session_id} timed out after {attach_timeout:?}"
                )));
            }
        };
        state_tx.send_replace(LifecycleState::Connected);

        // Transport is up: register presence and go visible. There is no
        // deliberate invisible phase between these steps.
        let local = self.registry.join(session_id, participant_id, display_name);

        let session = self
            .sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(Session::new(session_id)))
            .clone();
        session.attach();

        let broadcaster = Arc::new(ChangeBroadcaster::new(participant_id, self.metrics.clone()));
        broadcaster.bind(link.sender());

        let (events_tx, _) = broadcast::channel(self.config.channel_buffer_size);
        let (commands_tx, commands_rx) = mpsc::channel(self.config.channel_buffer_size);
        let cancel = self.shutdown.child_token();

        state_tx.send_replace(LifecycleState::Active);
        self.metrics.attachment_opened();

        let controller = LifecycleController::new(
            ControllerContext {
                session_id,
                local,
                config: self.config.clone(),
                transport: self.transport.clone(),
                registry: self.registry.clone(),
                broadcaster: broadcaster.clone(),
                events: events_tx.clone(),
                metrics: self.metrics.clone(),
                session,
            },
            link,
            commands_rx,
            state_tx,
            cancel.clone(),
        );
        let task = tokio::spawn(controller.run());

        info!(%session_id, %participant_id, display_name, "participant attached");

        Ok(SessionHandle::new(
            session_id,
            participant_id,
            self.registry.clone(),
            broadcaster,
            events_tx,
            commands_tx,
            state_rx,
            cancel,
            task,
        ))
    }

    /// Full participant list for a session right now.
    pub fn snapshot(&self, session_id: SessionId) -> Vec<ParticipantState> {
        self.registry.snapshot(session_id)
    }

    /// The shared presence registry.
    pub fn registry(&self) -> Arc<PresenceRegistry> {
        self.registry.clone()
    }

    /// Engine counters snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of sessions with live bookkeeping (attached or in grace).
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Tears down every attachment and the sweeper. Joining afterwards
    /// fails with [`ErrorKind::Closed`].
    ///
    /// [`ErrorKind::Closed`]: boardsync_core::error::ErrorKind::Closed
    pub fn shutdown(&self) {
        info!("session manager shutting down");
        self.shutdown.cancel();
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Removes sessions whose grace period has elapsed since the last detach.
async fn run_sweeper(
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
    registry: Arc<PresenceRegistry>,
    metrics: Arc<EngineMetrics>,
    grace: Duration,
    shutdown: CancellationToken,
) {
    let period = (grace / 2).max(Duration::from_secs(1));
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let sweepable: Vec<SessionId> = sessions
                    .iter()
                    .filter(|entry| entry.value().sweepable(grace))
                    .map(|entry| *entry.key())
                    .collect();

                for session_id in sweepable {
                    // Re-check under the map entry: a reattach may have
                    // raced the sweep.
                    if sessions
                        .remove_if(&session_id, |_, session| session.sweepable(grace))
                        .is_some()
                    {
                        registry.remove_session(session_id);
                        metrics.session_swept();
                        debug!(%session_id, "session swept after grace period");
                    }
                }
            }
        }
    }
}
