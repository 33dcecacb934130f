//! Auto-continuation poller.
//!
//! A fixed-interval driver that keeps auto-flagged conversations
//! self-sustaining: each tick advances at most one such session through the
//! scheduler. The poller holds no lock of its own; overlap protection comes
//! entirely from the scheduler's single-flight slot, so a tick landing while
//! a generation is pending degrades to a no-op.

use crate::scheduler::TurnScheduler;
use salon_core::session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct AutoContinuationPoller {
    scheduler: Arc<TurnScheduler>,
    store: Arc<dyn SessionStore>,
    interval: Duration,
}

impl AutoContinuationPoller {
    pub fn new(scheduler: Arc<TurnScheduler>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            scheduler,
            store,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Starts the polling loop as a background task.
    pub fn spawn(self) -> PollerHandle {
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // Generations routinely outlast the tick interval; don't burst
            // to catch up afterwards.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                target: "auto_chat",
                "poller started ({:?} interval)",
                self.interval
            );

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(session_id) = self.store.first_auto_session().await {
                            let outcome =
                                self.scheduler.try_advance(&session_id, false).await;
                            tracing::debug!(
                                target: "auto_chat",
                                session = %session_id,
                                ?outcome,
                                "tick"
                            );
                        }
                    }
                }
            }

            tracing::info!(target: "auto_chat", "poller stopped");
        });

        PollerHandle { token, handle }
    }
}

/// Handle for stopping the background loop.
pub struct PollerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Requests shutdown; the loop exits at its next select point.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Waits for the loop to finish.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}
