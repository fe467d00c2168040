//! Quota Limiter
//!
//! Exact sliding-window admission control. Every admitted operation is
//! recorded as a timestamped event per `(actor, kind)`; a check counts the
//! events in `(now - window, now]` against the kind's limit.
//!
//! Stored events are compacted to `2 x window` on every record and by the
//! periodic [`QuotaLimiter::cleanup`] sweep, which the composition root drives
//! from a timer.
//!
//! Every time-dependent operation has an `*_at` form taking an explicit
//! `now`; the plain form uses the wall clock.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use jbox_common::time::{ceil_secs, now, seconds_before, secs};
use jbox_common::{OperationKind, QuotaRule, MAX_WINDOW_SECS};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// One recorded operation
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaEvent {
    pub at: DateTime<Utc>,
    /// Opaque context, e.g. the catalog id of a requested song
    pub payload: Option<String>,
}

/// Successful admission check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Admission {
    pub operation: OperationKind,
    pub privileged: bool,
    /// Operations left in the current window, counting the one being admitted.
    /// None for privileged actors.
    pub remaining: Option<u32>,
    pub window_secs: u64,
}

/// Quota snapshot for one actor and kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub operation: OperationKind,
    pub privileged: bool,
    pub unlimited: bool,
    /// Events inside the current window
    pub current: u32,
    pub max: u32,
    pub remaining: u32,
    pub window_secs: u64,
}

/// Result of a cleanup sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub actors_removed: usize,
    pub events_removed: usize,
    pub actors_remaining: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("quota window of {window_secs}s exceeds the {max_secs}s maximum")]
    WindowTooLong { window_secs: u64, max_secs: u64 },

    #[error("{label} too frequent: at most {max} per {window_secs}s, retry in {wait_secs}s")]
    Exceeded {
        operation: OperationKind,
        label: &'static str,
        current: u32,
        max: u32,
        window_secs: u64,
        /// Seconds until the oldest event in the window expires
        wait_secs: u64,
    },
}

pub struct QuotaLimiter {
    config: BTreeMap<OperationKind, QuotaRule>,
    events: HashMap<String, HashMap<OperationKind, Vec<QuotaEvent>>>,
}

impl QuotaLimiter {
    /// Create a limiter for the given operation registry
    ///
    /// Only kinds present in `config` can be checked, recorded or configured.
    pub fn new(config: BTreeMap<OperationKind, QuotaRule>) -> Self {
        Self {
            config,
            events: HashMap::new(),
        }
    }

    /// Limiter with the compiled default rule for every known kind
    pub fn with_defaults() -> Self {
        Self::new(OperationKind::ALL.iter().map(|k| (*k, k.default_rule())).collect())
    }

    /// Resolve an operation name against the registry
    pub fn parse_kind(&self, name: &str) -> Result<OperationKind, QuotaError> {
        name.parse::<OperationKind>()
            .ok()
            .filter(|kind| self.config.contains_key(kind))
            .ok_or_else(|| QuotaError::UnknownOperation(name.to_string()))
    }

    /// Current rule table
    pub fn config(&self) -> &BTreeMap<OperationKind, QuotaRule> {
        &self.config
    }

    pub fn rule(&self, kind: OperationKind) -> Result<QuotaRule, QuotaError> {
        self.config
            .get(&kind)
            .copied()
            .ok_or_else(|| QuotaError::UnknownOperation(kind.to_string()))
    }

    /// Update a rule in place
    ///
    /// Absent or zero values keep the previous setting. Takes effect on the
    /// next check, including for windows already in progress. A window longer
    /// than [`MAX_WINDOW_SECS`] is rejected and nothing changes.
    pub fn configure(
        &mut self,
        kind: OperationKind,
        window_secs: Option<u64>,
        max_operations: Option<u32>,
    ) -> Result<QuotaRule, QuotaError> {
        if let Some(window) = window_secs.filter(|w| *w > MAX_WINDOW_SECS) {
            return Err(QuotaError::WindowTooLong {
                window_secs: window,
                max_secs: MAX_WINDOW_SECS,
            });
        }

        let rule = self
            .config
            .get_mut(&kind)
            .ok_or_else(|| QuotaError::UnknownOperation(kind.to_string()))?;

        if let Some(window) = window_secs.filter(|w| *w > 0) {
            rule.window_secs = window;
        }
        if let Some(max) = max_operations.filter(|m| *m > 0) {
            rule.max_operations = max;
        }

        info!(
            "Quota for {} updated: {} per {}s",
            kind, rule.max_operations, rule.window_secs
        );
        Ok(*rule)
    }

    pub fn check(&self, actor: &str, kind: OperationKind, privileged: bool) -> Result<Admission, QuotaError> {
        self.check_at(actor, kind, privileged, now())
    }

    /// Admission decision at `now`; never mutates state
    pub fn check_at(
        &self,
        actor: &str,
        kind: OperationKind,
        privileged: bool,
        now: DateTime<Utc>,
    ) -> Result<Admission, QuotaError> {
        if privileged {
            return Ok(Admission {
                operation: kind,
                privileged: true,
                remaining: None,
                window_secs: self.config.get(&kind).map(|r| r.window_secs).unwrap_or(0),
            });
        }

        let rule = self.rule(kind)?;
        let window = secs(rule.window_secs);
        let (count, oldest) = self.window_stats(actor, kind, rule, now);

        if count >= rule.max_operations {
            let wait_secs = oldest
                .map(|oldest| ceil_secs(window - (now - oldest)))
                .unwrap_or(rule.window_secs);
            info!(
                "Quota exceeded: {} {} ({}/{} in {}s, wait {}s)",
                actor, kind, count, rule.max_operations, rule.window_secs, wait_secs
            );
            return Err(QuotaError::Exceeded {
                operation: kind,
                label: kind.label(),
                current: count,
                max: rule.max_operations,
                window_secs: rule.window_secs,
                wait_secs,
            });
        }

        Ok(Admission {
            operation: kind,
            privileged: false,
            remaining: Some(rule.max_operations - count),
            window_secs: rule.window_secs,
        })
    }

    pub fn record(&mut self, actor: &str, kind: OperationKind, payload: Option<String>) -> Result<(), QuotaError> {
        self.record_at(actor, kind, payload, now())
    }

    /// Store one event and compact that actor/kind history to `2 x window`
    pub fn record_at(
        &mut self,
        actor: &str,
        kind: OperationKind,
        payload: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), QuotaError> {
        let rule = self.rule(kind)?;
        let horizon = seconds_before(now, rule.window_secs.saturating_mul(2));

        let events = self
            .events
            .entry(actor.to_string())
            .or_default()
            .entry(kind)
            .or_default();
        events.push(QuotaEvent { at: now, payload });
        events.retain(|e| e.at > horizon);

        debug!("Recorded {} for {} ({} retained)", kind, actor, events.len());
        Ok(())
    }

    pub fn status(&self, actor: &str, kind: OperationKind, privileged: bool) -> Result<QuotaStatus, QuotaError> {
        self.status_at(actor, kind, privileged, now())
    }

    pub fn status_at(
        &self,
        actor: &str,
        kind: OperationKind,
        privileged: bool,
        now: DateTime<Utc>,
    ) -> Result<QuotaStatus, QuotaError> {
        let rule = self.rule(kind)?;

        if privileged {
            return Ok(QuotaStatus {
                operation: kind,
                privileged: true,
                unlimited: true,
                current: 0,
                max: rule.max_operations,
                remaining: rule.max_operations,
                window_secs: rule.window_secs,
            });
        }

        let (current, _) = self.window_stats(actor, kind, rule, now);
        Ok(QuotaStatus {
            operation: kind,
            privileged: false,
            unlimited: false,
            current,
            max: rule.max_operations,
            remaining: rule.max_operations.saturating_sub(current),
            window_secs: rule.window_secs,
        })
    }

    pub fn status_all(&self, actor: &str, privileged: bool) -> BTreeMap<OperationKind, QuotaStatus> {
        self.status_all_at(actor, privileged, now())
    }

    /// Status for every registered kind
    pub fn status_all_at(
        &self,
        actor: &str,
        privileged: bool,
        now: DateTime<Utc>,
    ) -> BTreeMap<OperationKind, QuotaStatus> {
        self.config
            .keys()
            .filter_map(|kind| {
                self.status_at(actor, *kind, privileged, now)
                    .ok()
                    .map(|status| (*kind, status))
            })
            .collect()
    }

    pub fn cleanup(&mut self) -> CleanupReport {
        self.cleanup_at(now())
    }

    /// Compact every history to `2 x window` and forget idle actors
    pub fn cleanup_at(&mut self, now: DateTime<Utc>) -> CleanupReport {
        let config = &self.config;
        let before = self.events.len();
        let mut events_removed = 0;

        self.events.retain(|_, per_kind| {
            per_kind.retain(|kind, events| {
                let Some(rule) = config.get(kind) else {
                    events_removed += events.len();
                    return false;
                };
                let horizon = seconds_before(now, rule.window_secs.saturating_mul(2));
                let len = events.len();
                events.retain(|e| e.at > horizon);
                events_removed += len - events.len();
                !events.is_empty()
            });
            !per_kind.is_empty()
        });

        let report = CleanupReport {
            actors_removed: before - self.events.len(),
            events_removed,
            actors_remaining: self.events.len(),
        };
        debug!(
            "Quota cleanup: {} actors removed, {} events removed, {} actors tracked",
            report.actors_removed, report.events_removed, report.actors_remaining
        );
        report
    }

    /// Number of actors with retained events
    pub fn tracked_actors(&self) -> usize {
        self.events.len()
    }

    /// Retained events for one actor and kind, oldest first
    pub fn events(&self, actor: &str, kind: OperationKind) -> &[QuotaEvent] {
        self.events
            .get(actor)
            .and_then(|per_kind| per_kind.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Count of events in `(now - window, now]` plus the oldest such timestamp
    fn window_stats(
        &self,
        actor: &str,
        kind: OperationKind,
        rule: QuotaRule,
        now: DateTime<Utc>,
    ) -> (u32, Option<DateTime<Utc>>) {
        let lower = seconds_before(now, rule.window_secs);
        let mut count = 0u32;
        let mut oldest: Option<DateTime<Utc>> = None;

        for event in self.events(actor, kind) {
            if event.at > lower && event.at <= now {
                count = count.saturating_add(1);
                oldest = Some(oldest.map_or(event.at, |o| o.min(event.at)));
            }
        }
        (count, oldest)
    }
}

impl Default for QuotaLimiter {
    fn default() -> Self {
        Self::with_defaults()
    }
}
