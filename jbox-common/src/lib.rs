//! # Jukebox Common Library
//!
//! Shared code for the jukebox workspace:
//! - Error type and `Result` alias
//! - Quota operation kinds and rules
//! - TOML configuration loading and resolution
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod operation;
pub mod time;

pub use config::{CompiledDefaults, ConfigResolver, TomlConfig};
pub use error::{Error, Result};
pub use operation::{OperationKind, QuotaRule, MAX_WINDOW_SECS};
