// ABOUTME: Parsed OpenSSH certificates and the validity predicate.
// ABOUTME: The validity window is extracted once at parse time.

use crate::error::{Result, SshError};
use chrono::{DateTime, Utc};
use ssh_key::Certificate;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A certificate must stay valid at least this long to be reused.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// The fields of a signed certificate that decide whether it can be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    not_before: u64,
    not_after: u64,
    key_id: String,
    principals: Vec<String>,
}

impl SignedCertificate {
    /// Parse OpenSSH certificate text (`<type>-cert-v01@openssh.com <base64> [comment]`).
    pub fn parse(text: &str) -> std::result::Result<Self, ssh_key::Error> {
        let cert = Certificate::from_openssh(text.trim())?;
        Ok(Self {
            not_before: cert.valid_after(),
            not_after: cert.valid_before(),
            key_id: cert.key_id().to_string(),
            principals: cert.valid_principals().to_vec(),
        })
    }

    /// Read and parse a certificate file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SshError::ReadCertificate {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text).map_err(|e| SshError::ParseCertificate {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn not_before(&self) -> u64 {
        self.not_before
    }

    pub fn not_after(&self) -> u64 {
        self.not_after
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn principals(&self) -> &[String] {
        &self.principals
    }

    /// Time left before expiry at `now` (unix seconds), or `None` if outside the window.
    pub fn remaining_at(&self, now: u64) -> Option<Duration> {
        if now < self.not_before || now >= self.not_after {
            return None;
        }
        Some(Duration::from_secs(self.not_after - now))
    }

    /// Usable when already valid and at least [`SAFETY_MARGIN`] from expiry.
    pub fn is_usable_at(&self, now: u64) -> bool {
        self.remaining_at(now)
            .is_some_and(|remaining| remaining >= SAFETY_MARGIN)
    }

    /// Expiry as a timestamp; `None` for certificates that never expire.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.not_after).ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// Current time as unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
