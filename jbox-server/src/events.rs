//! Events broadcast to connected observers over SSE

use chrono::{DateTime, Utc};
use jbox_common::{OperationKind, QuotaRule};
use serde::{Deserialize, Serialize};

use crate::queue::{QueueItem, QueueSnapshot};

/// Which way the now-playing slot moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayDirection {
    Next,
    Previous,
}

/// Jukebox event types
///
/// Serialized with a `type` tag; the same name is used as the SSE event field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum JukeboxEvent {
    /// Full queue snapshot, sent after every successful queue mutation
    QueueUpdated {
        state: QueueSnapshot,
        timestamp: DateTime<Utc>,
    },

    /// Play next / play previous moved the now-playing slot
    NowPlayingChanged {
        direction: PlayDirection,
        current_song: Option<QueueItem>,
        /// Pending items after the change
        queue: Vec<QueueItem>,
        timestamp: DateTime<Utc>,
    },

    /// Heartbeat from the host's player page, relayed verbatim
    PlayerStatus {
        status: serde_json::Value,
        timestamp: DateTime<Utc>,
    },

    /// Host changed a quota rule
    QuotaConfigChanged {
        operation: OperationKind,
        rule: QuotaRule,
        timestamp: DateTime<Utc>,
    },
}

impl JukeboxEvent {
    pub fn queue_updated(state: QueueSnapshot) -> Self {
        Self::QueueUpdated {
            state,
            timestamp: jbox_common::time::now(),
        }
    }

    pub fn now_playing_changed(direction: PlayDirection, snapshot: QueueSnapshot) -> Self {
        Self::NowPlayingChanged {
            direction,
            current_song: snapshot.current_song,
            queue: snapshot.queue,
            timestamp: jbox_common::time::now(),
        }
    }

    pub fn player_status(status: serde_json::Value) -> Self {
        Self::PlayerStatus {
            status,
            timestamp: jbox_common::time::now(),
        }
    }

    pub fn quota_config_changed(operation: OperationKind, rule: QuotaRule) -> Self {
        Self::QuotaConfigChanged {
            operation,
            rule,
            timestamp: jbox_common::time::now(),
        }
    }

    /// SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            JukeboxEvent::QueueUpdated { .. } => "QueueUpdated",
            JukeboxEvent::NowPlayingChanged { .. } => "NowPlayingChanged",
            JukeboxEvent::PlayerStatus { .. } => "PlayerStatus",
            JukeboxEvent::QuotaConfigChanged { .. } => "QuotaConfigChanged",
        }
    }
}
