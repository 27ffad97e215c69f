//! Background dashboard refresh
//!
//! Periodically reloads the dashboard and sweeps expired cache entries in
//! background tasks, using tokio channels to hand results to the caller.

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::dashboard::{fill_range, load_dashboard, DashboardSnapshot};
use crate::data::{FetchOptions, SeriesClient, Transport};

/// Messages sent from the background tasks
#[derive(Debug, Clone)]
pub enum RefreshMessage {
    /// A reload cycle is starting
    RefreshStarted,
    /// A reload cycle finished
    SnapshotReady(Box<DashboardSnapshot>),
    /// A cleanup sweep removed this many expired entries
    CacheSwept(usize),
}

/// Shortest period either task ticks at
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Configuration for refresh intervals
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between dashboard reloads
    pub interval: Duration,
    /// Interval between expired-entry sweeps
    pub cleanup_interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),          // 5 minutes
            cleanup_interval: Duration::from_secs(1800), // 30 minutes
            enabled: true,
        }
    }
}

/// What the reload task fetches on every tick
///
/// Open bounds are filled in on each reload, so a watch without `--end`
/// keeps following the current date.
#[derive(Debug, Clone)]
pub struct RefreshTarget {
    pub series: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub options: FetchOptions,
}

impl RefreshTarget {
    /// The range a reload on `today` covers
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        fill_range(self.start, self.end, today)
    }
}

/// Handle for controlling the background refresh tasks
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: watch::Sender<bool>,
}

impl RefreshHandle {
    /// Spawns the reload and cleanup tasks
    ///
    /// Neither task fires immediately; the first reload happens one
    /// `interval` after spawning. Periods below one second are raised to one
    /// second.
    ///
    /// # Arguments
    /// * `config` - Refresh intervals
    /// * `client` - Shared fetch client; its cache is the one swept
    /// * `target` - Series and range reloaded on each tick
    ///
    /// # Returns
    /// A RefreshHandle that receives updates via the `receiver` channel
    pub fn spawn<T>(
        config: RefreshConfig,
        client: Arc<SeriesClient<T>>,
        target: RefreshTarget,
    ) -> Self
    where
        T: Transport + 'static,
    {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if config.enabled {
            let tx = msg_tx.clone();
            let reload_client = Arc::clone(&client);
            let mut shutdown = shutdown_rx.clone();
            let period = config.interval.max(MIN_PERIOD);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if tx.send(RefreshMessage::RefreshStarted).await.is_err() {
                                break;
                            }
                            let (start, end) = target.range(Local::now().date_naive());
                            let snapshot = load_dashboard(
                                reload_client.as_ref(),
                                &target.series,
                                start,
                                end,
                                target.options,
                            )
                            .await;
                            let message = RefreshMessage::SnapshotReady(Box::new(snapshot));
                            if tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
                debug!("reload task stopped");
            });

            let tx = msg_tx;
            let mut shutdown = shutdown_rx;
            let period = config.cleanup_interval.max(MIN_PERIOD);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let removed = client.cache().cleanup();
                            if tx.send(RefreshMessage::CacheSwept(removed)).await.is_err() {
                                break;
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
                debug!("cleanup task stopped");
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Waits for the next message; `None` once both tasks have stopped
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Stops the background tasks
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Checks for pending refresh messages without blocking
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}
