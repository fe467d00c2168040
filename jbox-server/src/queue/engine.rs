//! Queue Engine
//!
//! Owns the pending request list, the now-playing slot, played history and
//! the promotion audit log.
//!
//! The current item is held outside `pending`:
//! - `advance()`: current -> history, `pending[0]` -> current
//! - `retreat()`: current -> front of `pending`, newest history item -> current
//!
//! `current_index` in snapshots is derived from the slot (0 or -1).
//!
//! All operations are synchronous and allocation-light; callers serialize
//! mutations (see `state::SharedState`).

use std::collections::VecDeque;

use tracing::{debug, info};
use uuid::Uuid;

use super::types::{
    EnqueueRequest, PromoteOutcome, PromoteRecord, QueueError, QueueItem, QueueSnapshot,
};

/// Default cap on the promotion audit log
pub const DEFAULT_PROMOTE_HISTORY_LIMIT: usize = 100;

/// Default cap on played history
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Default number of records returned by [`QueueEngine::promote_history`] callers
pub const DEFAULT_PROMOTE_HISTORY_PAGE: usize = 50;

pub struct QueueEngine {
    /// Not yet played, in play order
    pending: VecDeque<QueueItem>,

    /// Now playing
    current: Option<QueueItem>,

    /// Played items, oldest first
    history: VecDeque<QueueItem>,

    /// Promotion audit log, newest first
    promote_history: VecDeque<PromoteRecord>,

    history_limit: usize,
    promote_history_limit: usize,
}

impl QueueEngine {
    /// Create an empty queue with default retention limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_HISTORY_LIMIT, DEFAULT_PROMOTE_HISTORY_LIMIT)
    }

    /// Create an empty queue
    ///
    /// `history_limit == 0` disables "previous"; the promote log always keeps
    /// at least one record.
    pub fn with_limits(history_limit: usize, promote_history_limit: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            history: VecDeque::new(),
            promote_history: VecDeque::new(),
            history_limit,
            promote_history_limit: promote_history_limit.max(1),
        }
    }

    /// Append a request to the tail of the queue
    pub fn enqueue(&mut self, request: EnqueueRequest) -> QueueItem {
        let item = QueueItem {
            track: request.track,
            queue_id: Uuid::new_v4(),
            requested_by: request.requested_by,
            requested_ip: request.requested_ip,
            added_at: jbox_common::time::now(),
            played: false,
            promoted_by: None,
            promoted_at: None,
        };

        info!(
            "Enqueued '{}' ({}) requested by {}",
            item.track.name, item.queue_id, item.requested_by
        );
        self.pending.push_back(item.clone());
        item
    }

    /// Append several requests, preserving their order
    pub fn enqueue_many(&mut self, requests: impl IntoIterator<Item = EnqueueRequest>) -> Vec<QueueItem> {
        requests.into_iter().map(|r| self.enqueue(r)).collect()
    }

    /// Remove a pending request wherever it sits
    pub fn dequeue_by_queue_id(&mut self, queue_id: Uuid) -> Result<QueueItem, QueueError> {
        let index = self.position(queue_id).ok_or(QueueError::NotFound(queue_id))?;
        let removed = self
            .pending
            .remove(index)
            .ok_or(QueueError::NotFound(queue_id))?;

        info!("Removed '{}' ({}) from queue", removed.track.name, queue_id);
        Ok(removed)
    }

    /// Play next
    ///
    /// The current item (if any) is marked played and archived; the head of the
    /// pending queue becomes current. Returns the new current item.
    pub fn advance(&mut self) -> Option<QueueItem> {
        if let Some(mut finished) = self.current.take() {
            finished.played = true;
            self.push_history(finished);
        }

        self.current = self.pending.pop_front();

        match &self.current {
            Some(item) => info!("Now playing '{}' ({})", item.track.name, item.queue_id),
            None => info!("Queue exhausted, nothing playing"),
        }
        self.current.clone()
    }

    /// Play previous
    ///
    /// Returns None (and changes nothing) when history is empty. Otherwise the
    /// current item is put back at the front of the pending queue and the most
    /// recently played item becomes current again.
    pub fn retreat(&mut self) -> Option<QueueItem> {
        let mut previous = self.history.pop_back()?;
        previous.played = false;

        if let Some(current) = self.current.take() {
            self.pending.push_front(current);
        }

        info!("Back to '{}' ({})", previous.track.name, previous.queue_id);
        self.current = Some(previous);
        self.current.clone()
    }

    /// Drop every pending request and stop the current one
    ///
    /// History and the promotion log are kept.
    pub fn clear(&mut self) {
        let dropped = self.pending.len() + usize::from(self.current.is_some());
        self.pending.clear();
        self.current = None;
        info!("Queue cleared ({} items dropped)", dropped);
    }

    /// Reorder the pending queue (drag and drop)
    pub fn move_song(&mut self, from_index: usize, to_index: usize) -> Result<(), QueueError> {
        let len = self.pending.len();
        if from_index >= len || to_index >= len {
            return Err(QueueError::IndexOutOfRange {
                from: from_index,
                to: to_index,
                len,
            });
        }
        if from_index == to_index {
            return Ok(());
        }

        if let Some(item) = self.pending.remove(from_index) {
            debug!("Moving '{}' from {} to {}", item.track.name, from_index, to_index);
            self.pending.insert(to_index, item);
        }
        Ok(())
    }

    /// Move a pending request to play immediately after the current one
    ///
    /// An item already at the head of the queue is left in place and no audit
    /// record is written.
    pub fn promote_song(&mut self, queue_id: Uuid, promoted_by: &str) -> Result<PromoteOutcome, QueueError> {
        let index = self.position(queue_id).ok_or(QueueError::NotFound(queue_id))?;

        if index == 0 {
            let item = self.pending[0].clone();
            debug!("'{}' is already next, promote ignored", item.track.name);
            return Ok(PromoteOutcome::AlreadyNext(item));
        }

        let mut item = self
            .pending
            .remove(index)
            .ok_or(QueueError::NotFound(queue_id))?;
        let promoted_at = jbox_common::time::now();
        item.promoted_by = Some(promoted_by.to_string());
        item.promoted_at = Some(promoted_at);

        self.promote_history.push_front(PromoteRecord {
            song_id: item.track.id.clone(),
            song_name: item.track.name.clone(),
            artist: item.track.artists.clone(),
            album_pic: item.track.album_pic.clone(),
            promoted_by: promoted_by.to_string(),
            promoted_at,
            queue_id,
        });
        self.promote_history.truncate(self.promote_history_limit);

        info!("Promoted '{}' ({}) by {}", item.track.name, queue_id, promoted_by);
        self.pending.push_front(item.clone());
        Ok(PromoteOutcome::Promoted(item))
    }

    /// Snapshot for observers
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            queue: self.pending.iter().cloned().collect(),
            current_song: self.current.clone(),
            current_index: self.current_index(),
            queue_length: self.pending.len(),
            history_length: self.history.len(),
        }
    }

    /// 0 while something is playing, -1 otherwise
    pub fn current_index(&self) -> i64 {
        if self.current.is_some() {
            0
        } else {
            -1
        }
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> &VecDeque<QueueItem> {
        &self.pending
    }

    /// Played items, oldest first
    pub fn history(&self) -> &VecDeque<QueueItem> {
        &self.history
    }

    /// Locate a pending item by queue id
    pub fn find(&self, queue_id: Uuid) -> Option<&QueueItem> {
        self.pending.iter().find(|item| item.queue_id == queue_id)
    }

    /// Most recent promotion records, newest first
    pub fn promote_history(&self, limit: usize) -> Vec<PromoteRecord> {
        self.promote_history.iter().take(limit).cloned().collect()
    }

    pub fn clear_promote_history(&mut self) {
        self.promote_history.clear();
        info!("Promote history cleared");
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.current.is_none()
    }

    fn position(&self, queue_id: Uuid) -> Option<usize> {
        self.pending.iter().position(|item| item.queue_id == queue_id)
    }

    fn push_history(&mut self, item: QueueItem) {
        if self.history_limit == 0 {
            return;
        }
        self.history.push_back(item);
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }
}

impl Default for QueueEngine {
    fn default() -> Self {
        Self::new()
    }
}
