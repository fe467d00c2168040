//! # Jukebox Server Library (jbox-server)
//!
//! Shared party jukebox: guests on the LAN request songs, skip, and promote
//! requests to play next, all under per-guest sliding-window quotas. The
//! host machine plays the music and administers the queue.
//!
//! **Architecture:** in-memory queue engine and quota limiter behind async
//! locks, exposed over HTTP with an SSE stream for live queue updates.

pub mod api;
pub mod error;
pub mod events;
pub mod queue;
pub mod quota;
pub mod state;
pub mod users;

pub use error::{Error, Result};
pub use state::SharedState;
