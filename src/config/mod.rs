//! # Configuration
//!
//! Rotator, database setter and logging settings.
//!
//! Every struct has a `Default` implementation built from [`crate::constants`]
//! and a `from_env()` constructor that overrides the defaults from environment
//! variables (populated from the Lambda/Deployment environment).

mod logging;
mod rotator;
mod setter;

pub use logging::{LogFormat, LoggingConfig};
pub use rotator::RotatorConfig;
pub use setter::SetterConfig;

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read optional environment variable, treating an empty value as unset
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.trim().to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        for value in ["true", "TRUE", "1", "yes", "On", " true "] {
            assert!(parse_bool(value), "{value} should parse as true");
        }
        for value in ["false", "0", "no", "off", "", "maybe"] {
            assert!(!parse_bool(value), "{value} should parse as false");
        }
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        // Key is unique to this test so parallel tests cannot interfere.
        std::env::set_var("PASSWORD_ROTATION_TEST_GARBAGE_U32", "not-a-number");
        assert_eq!(
            env_var_or_default("PASSWORD_ROTATION_TEST_GARBAGE_U32", 7_u32),
            7
        );
        std::env::remove_var("PASSWORD_ROTATION_TEST_GARBAGE_U32");
    }

    #[test]
    fn test_env_var_opt_ignores_blank_values() {
        std::env::set_var("PASSWORD_ROTATION_TEST_BLANK", "  ");
        assert_eq!(env_var_opt("PASSWORD_ROTATION_TEST_BLANK"), None);
        std::env::remove_var("PASSWORD_ROTATION_TEST_BLANK");
    }
}
