//! Mapper configuration.

use std::env;

/// Process-wide defaults for marshalling.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Check wire values against the schema when reading items.
    pub type_check: bool,
    /// Drop expired items when reading (models with `expires` only).
    pub check_expiry: bool,
    /// Default `saveUnknown` for schemas that do not set one.
    pub save_unknown_by_default: bool,
}

impl MapperConfig {
    /// Create configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            type_check: env_bool("DYNAMAP_TYPE_CHECK", defaults.type_check),
            check_expiry: env_bool("DYNAMAP_CHECK_EXPIRY", defaults.check_expiry),
            save_unknown_by_default: env_bool(
                "DYNAMAP_SAVE_UNKNOWN",
                defaults.save_unknown_by_default,
            ),
        }
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            type_check: true,
            check_expiry: true,
            save_unknown_by_default: false,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key).map_or(default, |v| parse_bool(&v).unwrap_or(default))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" | "TRUE" | "YES" => Some(true),
        "0" | "false" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}
