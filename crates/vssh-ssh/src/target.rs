// ABOUTME: Parsing of the [user@]host connection target.
// ABOUTME: The user part doubles as the identity name for certificate lookup.

use crate::error::{Result, SshError};
use std::fmt;

/// Where to connect and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
}

impl SshTarget {
    /// Parse `[user@]host`, falling back to `$USER` when no user is given.
    pub fn parse(target: &str) -> Result<Self> {
        Self::parse_with_default(target, std::env::var("USER").ok())
    }

    /// Parse `[user@]host` with an explicit fallback user.
    pub fn parse_with_default(target: &str, default_user: Option<String>) -> Result<Self> {
        let invalid = |reason: &str| SshError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = target.trim();
        let (user, host) = match trimmed.split_once('@') {
            Some((user, host)) => {
                if host.contains('@') {
                    return Err(invalid("expected at most one '@'"));
                }
                if user.is_empty() {
                    return Err(invalid("user is empty"));
                }
                (user.to_string(), host)
            }
            None => {
                let user = default_user
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| invalid("no user given and $USER is not set"))?;
                (user, trimmed)
            }
        };

        if host.is_empty() {
            return Err(invalid("host is empty"));
        }

        Ok(Self {
            user,
            host: host.to_string(),
        })
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_and_host() {
        let t = SshTarget::parse_with_default("alice@db1.internal", None).unwrap();
        assert_eq!(t.user, "alice");
        assert_eq!(t.host, "db1.internal");
        assert_eq!(t.to_string(), "alice@db1.internal");
    }

    #[test]
    fn test_parse_host_only_uses_default_user() {
        let t = SshTarget::parse_with_default("web01", Some("bob".to_string())).unwrap();
        assert_eq!(t.user, "bob");
        assert_eq!(t.host, "web01");
    }

    #[test]
    fn test_parse_host_only_without_default_fails() {
        let err = SshTarget::parse_with_default("web01", None).unwrap_err();
        assert!(err.to_string().contains("$USER"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for target in ["@host", "alice@", "a@b@c", "", "   "] {
            let result = SshTarget::parse_with_default(target, Some("bob".to_string()));
            assert!(
                matches!(result, Err(SshError::InvalidTarget { .. })),
                "{target:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_keeps_dotted_names() {
        let t = SshTarget::parse_with_default("first.last-1@10.0.0.5", None).unwrap();
        assert_eq!(t.user, "first.last-1");
        assert_eq!(t.host, "10.0.0.5");
    }
}
