//! Shared helpers for resolving configuration from the environment.

use std::str::FromStr;

use crate::error::ConfigError;

/// Read an optional environment variable. Empty values count as unset.
pub fn optional_env(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if v.trim().is_empty() => None,
        Ok(v) => Some(v),
        Err(_) => None,
    }
}

/// Read a required environment variable, with a hint for the error message.
pub fn require_env(key: &str, hint: &str) -> Result<String, ConfigError> {
    optional_env(key).ok_or_else(|| ConfigError::MissingRequired {
        key: key.to_string(),
        hint: hint.to_string(),
    })
}

/// Parse an optional environment variable, falling back to a default.
pub fn parse_optional_env<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{}", e),
        }),
        None => Ok(default),
    }
}

/// Parse an optional boolean environment variable (accepts 1/0, true/false, yes/no).
pub fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(key) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{}'", other),
            }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_counts_as_unset() {
        // SAFETY: tests run single-threaded per process start for env setup.
        unsafe { std::env::set_var("SWITCHBOARD_TEST_EMPTY", "") };
        assert!(optional_env("SWITCHBOARD_TEST_EMPTY").is_none());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        unsafe { std::env::set_var("SWITCHBOARD_TEST_BOOL", "yes") };
        assert!(parse_bool_env("SWITCHBOARD_TEST_BOOL", false).unwrap());
        unsafe { std::env::set_var("SWITCHBOARD_TEST_BOOL", "off") };
        assert!(!parse_bool_env("SWITCHBOARD_TEST_BOOL", true).unwrap());
    }

    #[test]
    fn parse_bool_rejects_garbage() {
        unsafe { std::env::set_var("SWITCHBOARD_TEST_BOOL_BAD", "maybe") };
        assert!(parse_bool_env("SWITCHBOARD_TEST_BOOL_BAD", false).is_err());
    }

    #[test]
    fn parse_optional_env_uses_default_when_unset() {
        assert_eq!(
            parse_optional_env("SWITCHBOARD_TEST_UNSET_NUMBER", 42u32).unwrap(),
            42
        );
    }
}
