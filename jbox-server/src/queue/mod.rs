//! Shared play queue
//!
//! Pending requests, the now-playing slot, played history and the promotion
//! audit log. See [`engine::QueueEngine`].

pub mod engine;
pub mod types;

pub use engine::{QueueEngine, DEFAULT_PROMOTE_HISTORY_LIMIT};
pub use types::{
    EnqueueRequest, PromoteOutcome, PromoteRecord, QueueError, QueueItem, QueueSnapshot, TrackInfo,
};
