//! Helpers for reading back-end settings.
//!
//! Back-ends are configured from a flat string map (`FTP_SERVER_URL`, `OSS_BUCKETNAME`, ...),
//! the way the admin system stores its site configuration. Missing or malformed values are
//! reported as [`ErrorKind::Configuration`] at construction time.

use crate::storage::{Error, ErrorKind, Result};
use std::{collections::BTreeMap, str::FromStr};

/// Per back-end configuration values keyed by setting name.
pub type Settings = BTreeMap<String, String>;

/// Returns the trimmed value of `key`, failing when it is absent or blank.
pub fn required<'a>(settings: &'a Settings, key: &str) -> Result<&'a str> {
    optional(settings, key).ok_or_else(|| Error::new(ErrorKind::Configuration, format!("missing required setting {}", key)))
}

/// Returns the trimmed value of `key` unless it is absent or blank.
pub fn optional<'a>(settings: &'a Settings, key: &str) -> Option<&'a str> {
    settings.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Parses the value of `key`, falling back to `default` when it is absent or blank.
pub fn parse_or<T>(settings: &Settings, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(settings, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| Error::new(ErrorKind::Configuration, format!("invalid value {:?} for setting {}: {}", raw, key, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn blank_values_count_as_missing() {
        let s = settings(&[("A", "  "), ("B", " x ")]);
        assert_eq!(optional(&s, "A"), None);
        assert_eq!(optional(&s, "B"), Some("x"));
        assert_eq!(required(&s, "A").unwrap_err().kind(), ErrorKind::Configuration);
        assert_eq!(required(&s, "C").unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn parse_with_default() {
        let s = settings(&[("PORT", "2121"), ("BAD", "abc"), ("ZERO", "0")]);
        assert_eq!(parse_or(&s, "PORT", 21u16).unwrap(), 2121);
        assert_eq!(parse_or(&s, "MISSING", 21u16).unwrap(), 21);
        assert_eq!(parse_or(&s, "ZERO", 5u64).unwrap(), 0);
        let err = parse_or(&s, "BAD", 21u16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("BAD"));
    }
}
