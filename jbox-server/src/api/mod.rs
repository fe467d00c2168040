//! HTTP and SSE interface
//!
//! Resolves the caller, consults quotas, forwards to the queue engine and
//! broadcasts the resulting state.

pub mod handlers;
pub mod identity;
pub mod server;
pub mod sse;

pub use identity::{Caller, HostIdentity};
pub use server::{build_router, run, AppContext};
