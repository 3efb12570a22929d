//! Background maintenance: trend recompute, release notifications, cleanup.
//!
//! Each task runs on its own interval in its own tokio task. A failing or
//! panicking run is logged and the task waits for its next tick; the other
//! tasks are unaffected. All tasks stop when [`SchedulerHandle::shutdown`]
//! is called.

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::ApiError;
use crate::gateway::handler::publish_notification;
use crate::AppState;

/// Handle to the running background tasks.
pub struct SchedulerHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop every task and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(?e, "scheduler task did not stop cleanly");
            }
        }
        tracing::info!("scheduler stopped");
    }
}

/// Spawn the three periodic tasks with the intervals from the config.
pub fn start(state: AppState) -> SchedulerHandle {
    let (shutdown_tx, _) = broadcast::channel(1);
    let config = state.config.clone();

    let tasks = vec![
        spawn_periodic(
            "trends",
            config.trend_interval,
            state.clone(),
            shutdown_tx.subscribe(),
            recompute_trends,
        ),
        spawn_periodic(
            "notifications",
            config.notification_interval,
            state.clone(),
            shutdown_tx.subscribe(),
            sweep_release_notifications,
        ),
        spawn_periodic(
            "cleanup",
            config.cleanup_interval,
            state,
            shutdown_tx.subscribe(),
            cleanup_stale_data,
        ),
    ];

    tracing::info!(
        trend_secs = config.trend_interval.as_secs(),
        notification_secs = config.notification_interval.as_secs(),
        cleanup_secs = config.cleanup_interval.as_secs(),
        "scheduler started"
    );

    SchedulerHandle { shutdown_tx, tasks }
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    state: AppState,
    mut shutdown_rx: broadcast::Receiver<()>,
    job: F,
) -> JoinHandle<()>
where
    F: Fn(AppState) -> Fut + Send + 'static,
    Fut: Future<Output = Result<usize, ApiError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await; // First tick fires immediately; skip it.

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Run each pass in its own task so a panic is contained.
                    match tokio::spawn(job(state.clone())).await {
                        Ok(Ok(affected)) => {
                            tracing::info!(task = name, affected, "scheduled task finished");
                        }
                        Ok(Err(err)) => {
                            tracing::error!(task = name, %err, "scheduled task failed");
                        }
                        Err(err) => {
                            tracing::error!(task = name, ?err, "scheduled task panicked");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::debug!(task = name, "scheduled task stopping");
                    break;
                }
            }
        }
    })
}

/// Full trend recompute, pushed to every connection. Returns the table length.
pub async fn recompute_trends(state: AppState) -> Result<usize, ApiError> {
    Ok(state.refresh_trends(None).trends.len())
}

/// Notify subscribers about the latest episode of each subscribed content.
///
/// A `(user, content, episode)` triple is notified once; later sweeps skip it.
/// A failed catalog lookup skips only that subscription; the sweep finishes
/// and then reports the failures. Returns how many notifications were sent.
pub async fn sweep_release_notifications(state: AppState) -> Result<usize, ApiError> {
    let mut sent = 0;
    let mut failed = 0;
    for (user_id, content_id) in state.subscriptions.pairs() {
        let episode = match state.catalog.latest_episode(&content_id).await {
            Ok(Some(episode)) => episode,
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!(%user_id, %content_id, %err, "catalog lookup failed");
                failed += 1;
                continue;
            }
        };

        if let Some(notification) = state.notifications.send_release_once(
            &user_id,
            &content_id,
            &episode.id,
            "New episode available!".to_string(),
            format!("{} is now available", episode.title),
        ) {
            publish_notification(&state, notification);
            sent += 1;
        }
    }

    if failed > 0 {
        return Err(ApiError::internal(format!(
            "{failed} catalog lookups failed, {sent} notifications sent"
        )));
    }
    Ok(sent)
}

/// Drop watch history past the retention window. Returns entries removed.
pub async fn cleanup_stale_data(state: AppState) -> Result<usize, ApiError> {
    let days = state.config.history_retention_days;
    let retention = chrono::Duration::try_days(days)
        .filter(|_| days > 0)
        .ok_or_else(|| ApiError::internal(format!("invalid history retention: {days} days")))?;
    Ok(state.history.prune_older_than(chrono::Utc::now() - retention))
}
