//! Queue data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Track metadata supplied by the music catalog
///
/// Passed through untouched; the queue only relies on `id` and `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Catalog identifier
    pub id: String,
    /// Song title
    pub name: String,
    /// Artist display string
    #[serde(default)]
    pub artists: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Album art URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_pic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// A song request waiting in, playing from, or played out of the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(flatten)]
    pub track: TrackInfo,

    /// Identity of this request, unique for the process lifetime
    pub queue_id: Uuid,

    /// Display name of the requester
    pub requested_by: String,

    /// Network origin of the requester
    pub requested_ip: String,

    pub added_at: DateTime<Utc>,

    /// Set once the item has been moved into history
    pub played: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_at: Option<DateTime<Utc>>,
}

/// Input to [`QueueEngine::enqueue`](super::QueueEngine::enqueue)
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub track: TrackInfo,
    pub requested_by: String,
    pub requested_ip: String,
}

impl EnqueueRequest {
    pub fn new(track: TrackInfo, requested_by: impl Into<String>, requested_ip: impl Into<String>) -> Self {
        Self {
            track,
            requested_by: requested_by.into(),
            requested_ip: requested_ip.into(),
        }
    }
}

/// Audit entry written by every effective promotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoteRecord {
    pub song_id: String,
    pub song_name: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_pic: Option<String>,
    pub promoted_by: String,
    pub promoted_at: DateTime<Utc>,
    pub queue_id: Uuid,
}

/// Read-only view of the queue broadcast to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Pending items in play order
    pub queue: Vec<QueueItem>,
    /// Now playing
    pub current_song: Option<QueueItem>,
    /// 0 while something is playing, -1 otherwise
    pub current_index: i64,
    pub queue_length: usize,
    pub history_length: usize,
}

/// Result of a successful promote call
#[derive(Debug, Clone, PartialEq)]
pub enum PromoteOutcome {
    /// Item moved to the front of the pending queue
    Promoted(QueueItem),
    /// Item was already next; nothing changed
    AlreadyNext(QueueItem),
}

impl PromoteOutcome {
    pub fn item(&self) -> &QueueItem {
        match self {
            PromoteOutcome::Promoted(item) | PromoteOutcome::AlreadyNext(item) => item,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, PromoteOutcome::Promoted(_))
    }
}

/// Queue operation failures; the queue is unchanged whenever one is returned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue entry {0} not found")]
    NotFound(Uuid),

    #[error("index out of range: from={from} to={to} len={len}")]
    IndexOutOfRange { from: usize, to: usize, len: usize },
}
