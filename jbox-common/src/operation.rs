//! Quota operation kinds and window rules
//!
//! Supporting types shared by the quota limiter and the configuration loader.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Longest quota window accepted from config or the admin API (30 days)
pub const MAX_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

/// Guest actions that are subject to a sliding-window quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Adding a song to the queue
    Song,
    /// Skipping to the next song
    Skip,
    /// Promoting a queued song to play next
    Promote,
}

impl OperationKind {
    /// Every kind known to the workspace, in registry order
    pub const ALL: [OperationKind; 3] = [OperationKind::Song, OperationKind::Skip, OperationKind::Promote];

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Song => "song",
            OperationKind::Skip => "skip",
            OperationKind::Promote => "promote",
        }
    }

    /// Human readable label used in denial messages
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Song => "Song requests",
            OperationKind::Skip => "Skips",
            OperationKind::Promote => "Promotions",
        }
    }

    /// Rule applied when the configuration does not override this kind
    pub fn default_rule(&self) -> QuotaRule {
        match self {
            OperationKind::Song => QuotaRule::new(60, 3),
            OperationKind::Skip => QuotaRule::new(300, 2),
            OperationKind::Promote => QuotaRule::new(120, 1),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "song" => Ok(OperationKind::Song),
            "skip" => Ok(OperationKind::Skip),
            "promote" => Ok(OperationKind::Promote),
            other => Err(Error::InvalidInput(format!("unknown operation kind: {}", other))),
        }
    }
}

/// Sliding-window limit for one operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRule {
    /// Window length in seconds
    pub window_secs: u64,
    /// Maximum operations admitted inside one window
    pub max_operations: u32,
}

impl QuotaRule {
    pub const fn new(window_secs: u64, max_operations: u32) -> Self {
        Self {
            window_secs,
            max_operations,
        }
    }

    /// Both fields positive and the window no longer than [`MAX_WINDOW_SECS`]
    pub fn is_valid(&self) -> bool {
        self.window_secs > 0 && self.window_secs <= MAX_WINDOW_SECS && self.max_operations > 0
    }
}
