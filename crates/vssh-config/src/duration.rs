// ABOUTME: Go-style duration strings ("4h", "1h30m", "90s") for config values.
// ABOUTME: Provides parse/format plus a serde adapter accepting strings or integer seconds.

use crate::error::{ConfigError, Result};
use std::time::Duration;

/// Parse a duration such as `4h`, `1h30m`, `90s`, `500ms` or a bare number of seconds.
pub fn parse(value: &str) -> Result<Duration> {
    let s = value.trim();
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if s.is_empty() {
        return Err(invalid("empty duration"));
    }

    if s.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = s.parse().map_err(|_| invalid("number out of range"))?;
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(invalid("expected a number"));
        }
        let (num_str, tail) = rest.split_at(digits);
        let unit_len = tail.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        if unit_len == 0 {
            return Err(invalid("missing unit"));
        }
        let (unit, tail) = tail.split_at(unit_len);

        let num: u64 = num_str.parse().map_err(|_| invalid("number out of range"))?;
        let part = match unit {
            "ms" => Duration::from_millis(num),
            "s" => Duration::from_secs(num),
            "m" => Duration::from_secs(num.saturating_mul(60)),
            "h" => Duration::from_secs(num.saturating_mul(60 * 60)),
            "d" => Duration::from_secs(num.saturating_mul(24 * 60 * 60)),
            other => return Err(invalid(&format!("unknown unit {other:?}"))),
        };
        total = total
            .checked_add(part)
            .ok_or_else(|| invalid("duration overflow"))?;
        rest = tail;
    }

    Ok(total)
}

/// Format a duration the way [`parse`] reads it back, e.g. `4h`, `1h30m`, `1m30s`.
pub fn format(d: Duration) -> String {
    let secs = d.as_secs();
    if secs == 0 {
        let millis = d.subsec_millis();
        return if millis > 0 {
            format!("{millis}ms")
        } else {
            "0s".to_string()
        };
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

/// Serde adapter: `#[serde(with = "crate::duration::serde_format")]`.
pub mod serde_format {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration like \"4h\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            super::parse(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration cannot be negative"))
        }
    }
}
