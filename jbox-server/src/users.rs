//! Display names chosen by guests, keyed by IP
//!
//! Memory only; names are forgotten on restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use jbox_common::{Error, Result};
use serde::Serialize;
use tracing::info;

/// Longest accepted display name, in characters
pub const MAX_USERNAME_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub username: String,
    pub ip: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: HashMap<String, UserRecord>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(&self, ip: &str) -> Option<&str> {
        self.users.get(ip).map(|u| u.username.as_str())
    }

    /// Assign or rename the display name for `ip`
    ///
    /// Names are trimmed, must be non-empty, at most [`MAX_USERNAME_CHARS`]
    /// characters, and not held by another IP.
    pub fn set_username(&mut self, ip: &str, username: &str) -> Result<UserRecord> {
        let name = username.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("username must not be empty".to_string()));
        }
        if name.chars().count() > MAX_USERNAME_CHARS {
            return Err(Error::InvalidInput(format!(
                "username must be at most {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        if self.users.values().any(|u| u.ip != ip && u.username == name) {
            return Err(Error::InvalidInput(format!("username '{}' is already taken", name)));
        }

        let record = UserRecord {
            username: name.to_string(),
            ip: ip.to_string(),
            last_updated: jbox_common::time::now(),
        };
        self.users.insert(ip.to_string(), record.clone());
        info!("{} is now known as '{}'", ip, name);
        Ok(record)
    }

    /// Every named client, ordered by IP
    pub fn all(&self) -> Vec<UserRecord> {
        let mut users: Vec<_> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.ip.cmp(&b.ip));
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_rename() {
        let mut users = UserDirectory::new();
        users.set_username("10.0.0.2", "  alice ").unwrap();
        assert_eq!(users.username("10.0.0.2"), Some("alice"));

        users.set_username("10.0.0.2", "alicia").unwrap();
        assert_eq!(users.username("10.0.0.2"), Some("alicia"));
        assert_eq!(users.all().len(), 1);
    }

    #[test]
    fn test_all_is_sorted_by_ip() {
        let mut users = UserDirectory::new();
        users.set_username("10.0.0.9", "zed").unwrap();
        users.set_username("10.0.0.2", "amy").unwrap();

        let names: Vec<_> = users.all().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["amy", "zed"]);
    }

    #[test]
    fn test_rejects_empty_and_long_names() {
        let mut users = UserDirectory::new();
        assert!(users.set_username("10.0.0.2", "   ").is_err());
        assert!(users.set_username("10.0.0.2", &"x".repeat(21)).is_err());
        // Multi-byte characters count once each
        assert!(users.set_username("10.0.0.2", &"点".repeat(20)).is_ok());
    }

    #[test]
    fn test_rejects_name_held_by_other_ip() {
        let mut users = UserDirectory::new();
        users.set_username("10.0.0.2", "alice").unwrap();
        assert!(users.set_username("10.0.0.3", "alice").is_err());
        // Same IP may re-submit its own name
        assert!(users.set_username("10.0.0.2", "alice").is_ok());
    }
}
