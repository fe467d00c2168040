//! Per-actor, per-operation sliding-window quotas
//!
//! See [`limiter::QuotaLimiter`].

pub mod limiter;

pub use limiter::{Admission, CleanupReport, QuotaError, QuotaEvent, QuotaLimiter, QuotaStatus};
