//! State lock records
//!
//! A lock is a lease: it names the operation holding the state and stops
//! protecting it once `expires` has passed, so a crashed `cirrus apply`
//! never blocks the workspace for longer than the lease.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lease taken by a mutating command, in seconds
pub const DEFAULT_LEASE_SECS: i64 = 900;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// Command holding the lock, e.g. `apply` or `state rm`
    pub operation: String,
    /// `user@host`
    pub who: String,
    /// Cirrus version of the holder
    #[serde(default)]
    pub version: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::leased_for(operation, Duration::seconds(DEFAULT_LEASE_SECS))
    }

    pub fn leased_for(operation: impl Into<String>, lease: Duration) -> Self {
        let created = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who: holder(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created,
            expires: created + lease,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} by {} since {} (lock ID {}, expires {})",
            self.operation,
            self.who,
            self.created.format("%Y-%m-%d %H:%M:%S UTC"),
            self.id,
            self.expires.format("%H:%M:%S UTC"),
        )
    }
}

fn holder() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_lock_holds_for_the_default_lease() {
        let lock = LockInfo::new("apply");
        assert_eq!((lock.expires - lock.created).num_seconds(), DEFAULT_LEASE_SECS);
        assert!(!lock.is_expired());
        assert!(lock.who.contains('@'));
        assert_eq!(lock.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn lease_ends_at_expiry() {
        let lock = LockInfo::leased_for("destroy", Duration::seconds(30));
        assert!(!lock.is_expired_at(lock.created + Duration::seconds(29)));
        assert!(lock.is_expired_at(lock.expires));
    }

    #[test]
    fn each_lock_gets_its_own_id() {
        assert_ne!(LockInfo::new("apply").id, LockInfo::new("apply").id);
    }

    #[test]
    fn display_names_holder_and_id() {
        let lock = LockInfo::new("state rm");
        let shown = lock.to_string();
        assert!(shown.starts_with("state rm by "));
        assert!(shown.contains(&lock.id));
    }

    #[test]
    fn reads_locks_written_without_version() {
        let json = r#"{
            "id": "abc",
            "operation": "apply",
            "who": "ci@runner",
            "created": "2026-01-01T00:00:00Z",
            "expires": "2026-01-01T00:15:00Z"
        }"#;
        let lock: LockInfo = serde_json::from_str(json).unwrap();
        assert_eq!(lock.id, "abc");
        assert!(lock.version.is_empty());
        assert!(lock.is_expired());
    }
}
