use log::{debug, warn};
use std::env;

const ENV_PREFIX: &str = "COREMS_";

/// Read an environment variable with fallback to a default value
///
/// The unprefixed name wins over the `COREMS_` prefixed one.
///
/// Arguments:
/// * `key` - The environment variable name without any prefix
/// * `default` - The default value to use if the variable is not found
///
/// Returns:
/// The environment variable value or the default
pub fn read_env(key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Read an optional environment variable, honouring the prefix fallback
pub fn read_env_opt(key: &str) -> Option<String> {
    lookup(key)
}

/// Read an environment variable with boolean conversion
///
/// "true", "1", "yes", "y" are considered true, anything else false.
pub fn read_env_bool(key: &str, default: bool) -> bool {
    match lookup(key) {
        Some(value) => parse_bool(&value),
        None => default,
    }
}

/// Read an environment variable as an unsigned integer
///
/// Unparsable values fall back to the default with a warning.
pub fn read_env_u64(key: &str, default: u64) -> u64 {
    match lookup(key) {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Environment variable {} has non-numeric value '{}', using {}", key, value, default);
            default
        }),
        None => default,
    }
}

fn lookup(key: &str) -> Option<String> {
    let value = env::var(key)
        .or_else(|_| env::var(format!("{}{}", ENV_PREFIX, key)))
        .ok()
        .filter(|v| !v.trim().is_empty());

    debug!("Environment variable {} resolved to: {:?}", key, value);
    value
}

fn parse_bool(value: &str) -> bool {
    let lower_value = value.trim().to_lowercase();
    lower_value == "true" || lower_value == "1" || lower_value == "yes" || lower_value == "y"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_missing_variable_uses_default() {
        assert_eq!(read_env("COREMS_TEST_SURELY_UNSET_VARIABLE", "fallback"), "fallback");
        assert_eq!(read_env_u64("COREMS_TEST_SURELY_UNSET_VARIABLE", 7), 7);
        assert!(read_env_bool("COREMS_TEST_SURELY_UNSET_VARIABLE", true));
        assert!(read_env_opt("COREMS_TEST_SURELY_UNSET_VARIABLE").is_none());
    }
}
