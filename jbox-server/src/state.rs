//! Shared jukebox state
//!
//! The queue engine, quota limiter and user directory each sit behind their
//! own RwLock. Mutations hold the write lock for the whole operation, so every
//! mutation is atomic with respect to the others; snapshots take the read lock.
//!
//! Lock order when more than one is needed: quota, then queue, then users.

use jbox_common::TomlConfig;
use tokio::sync::{broadcast, RwLock};

use crate::events::JukeboxEvent;
use crate::queue::{QueueEngine, QueueSnapshot};
use crate::quota::QuotaLimiter;
use crate::users::UserDirectory;

/// Shared state accessible by all request handlers
pub struct SharedState {
    pub queue: RwLock<QueueEngine>,
    pub quota: RwLock<QuotaLimiter>,
    pub users: RwLock<UserDirectory>,

    /// Event broadcaster for SSE observers
    pub event_tx: broadcast::Sender<JukeboxEvent>,
}

impl SharedState {
    /// Build state from loaded configuration
    pub fn from_config(config: &TomlConfig) -> Self {
        Self::with_parts(
            QueueEngine::with_limits(config.history_limit, config.promote_history_limit),
            QuotaLimiter::new(config.quota_rules()),
            config.event_buffer,
        )
    }

    pub fn with_parts(queue: QueueEngine, quota: QuotaLimiter, event_buffer: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));
        Self {
            queue: RwLock::new(queue),
            quota: RwLock::new(quota),
            users: RwLock::new(UserDirectory::new()),
            event_tx,
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: JukeboxEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.event_tx.subscribe()
    }

    pub async fn queue_snapshot(&self) -> QueueSnapshot {
        self.queue.read().await.snapshot()
    }

    /// Broadcast the current queue snapshot
    pub async fn broadcast_queue_state(&self) {
        let snapshot = self.queue_snapshot().await;
        self.broadcast_event(JukeboxEvent::queue_updated(snapshot));
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::from_config(&TomlConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{EnqueueRequest, TrackInfo};

    fn track(name: &str) -> TrackInfo {
        TrackInfo {
            id: name.to_string(),
            name: name.to_string(),
            artists: String::new(),
            album: None,
            album_pic: None,
            duration_ms: None,
        }
    }

    #[tokio::test]
    async fn test_broadcast_queue_state_reaches_subscribers() {
        let state = SharedState::default();
        let mut rx = state.subscribe_events();

        state
            .queue
            .write()
            .await
            .enqueue(EnqueueRequest::new(track("A"), "alice", "10.0.0.2"));
        state.broadcast_queue_state().await;

        match rx.recv().await.unwrap() {
            JukeboxEvent::QueueUpdated { state, .. } => assert_eq!(state.queue_length, 1),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let state = SharedState::default();
        state.broadcast_queue_state().await;
        assert_eq!(state.queue_snapshot().await.current_index, -1);
    }

    #[tokio::test]
    async fn test_from_config_applies_limits() {
        let config = TomlConfig::from_toml_str("[quota.song]\nwindow_secs = 10\nmax_operations = 7").unwrap();
        let state = SharedState::from_config(&config);
        let quota = state.quota.read().await;
        assert_eq!(quota.config()[&jbox_common::OperationKind::Song].max_operations, 7);
    }
}
