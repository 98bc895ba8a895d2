//! Monitor configuration.
//!
//! Priority: `config.toml` `[pins]` table > environment variables > defaults.
//!
//! ```toml
//! [pins]
//! default_system = "phys"
//! fallback_pin = 13
//! layout = "rev2"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;
use crate::pins::{BoardLayout, PinResolver, PinSystem, DEFAULT_FALLBACK_PIN};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable names.
pub mod env_vars {
    /// Scheme for identifiers without a suffix (`gpio`, `phys`, `wpi`, `virtual`).
    pub const DEFAULT_PIN_SYSTEM: &str = "ARSM_DEFAULT_PIN_SYSTEM";
    /// Ordinal used when an identifier has no number.
    pub const FALLBACK_PIN: &str = "ARSM_FALLBACK_PIN";
    /// Header layout (`rev1`, `rev2`).
    pub const BOARD_LAYOUT: &str = "ARSM_BOARD_LAYOUT";
    /// Emit JSON logs.
    pub const LOG_JSON: &str = "ARSM_LOG_JSON";
}

/// Pin resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub default_system: PinSystem,
    pub fallback_pin: i32,
    /// Header layout. `None` means not configured; callers may detect it.
    pub layout: Option<BoardLayout>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            default_system: PinSystem::Gpio,
            fallback_pin: DEFAULT_FALLBACK_PIN,
            layout: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    pins: Option<MonitorConfig>,
}

impl MonitorConfig {
    /// Load from `config.toml` if present, otherwise from the environment.
    pub fn load() -> Self {
        match Self::from_file(CONFIG_FILE) {
            Ok(Some(config)) => config,
            Ok(None) => Self::from_env(),
            Err(e) => {
                warn!(category = "config", path = CONFIG_FILE, error = %e, "Ignoring unreadable config file");
                Self::from_env()
            }
        }
    }

    /// Read the `[pins]` table of a TOML file.
    ///
    /// Returns `Ok(None)` if the file does not exist or has no `[pins]` table.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse_toml(&content)?;
        if let Some(config) = &config {
            info!(category = "config", path = %path.display(), default_system = %config.default_system, fallback_pin = config.fallback_pin, "Loaded pin config from file");
        }
        Ok(config)
    }

    /// Parse TOML configuration.
    pub fn parse_toml(content: &str) -> Result<Option<Self>> {
        let config: TomlConfig = toml::from_str(content)?;
        Ok(config.pins)
    }

    /// Defaults overridden by environment variables. Unparsable values are
    /// ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(env_vars::DEFAULT_PIN_SYSTEM) {
            match value.parse() {
                Ok(system) => config.default_system = system,
                Err(e) => warn!(category = "config", var = env_vars::DEFAULT_PIN_SYSTEM, error = %e, "Ignoring invalid value"),
            }
        }

        if let Some(value) = lookup(env_vars::FALLBACK_PIN) {
            match value.trim().parse() {
                Ok(pin) => config.fallback_pin = pin,
                Err(_) => warn!(category = "config", var = env_vars::FALLBACK_PIN, value = %value, "Ignoring invalid value"),
            }
        }

        if let Some(value) = lookup(env_vars::BOARD_LAYOUT) {
            match value.parse() {
                Ok(layout) => config.layout = Some(layout),
                Err(e) => warn!(category = "config", var = env_vars::BOARD_LAYOUT, error = %e, "Ignoring invalid value"),
            }
        }

        config
    }

    /// Build a resolver, using `detected` when no layout is configured.
    pub fn resolver(&self, detected: Option<BoardLayout>) -> PinResolver {
        let layout = self.layout.or(detected).unwrap_or_default();
        PinResolver::new(layout)
            .with_default_system(self.default_system)
            .with_fallback_pin(self.fallback_pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.default_system, PinSystem::Gpio);
        assert_eq!(config.fallback_pin, 2);
        assert_eq!(config.layout, None);
    }

    #[test]
    fn test_from_env_overrides() {
        let config = MonitorConfig::from_lookup(lookup(&[
            (env_vars::DEFAULT_PIN_SYSTEM, "wpi"),
            (env_vars::FALLBACK_PIN, " 7 "),
            (env_vars::BOARD_LAYOUT, "rev1"),
        ]));
        assert_eq!(config.default_system, PinSystem::WiringPi);
        assert_eq!(config.fallback_pin, 7);
        assert_eq!(config.layout, Some(BoardLayout::Rev1));
    }

    #[test]
    fn test_from_env_ignores_invalid() {
        let config = MonitorConfig::from_lookup(lookup(&[
            (env_vars::DEFAULT_PIN_SYSTEM, "bcm2"),
            (env_vars::FALLBACK_PIN, "seven"),
        ]));
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let config = MonitorConfig::parse_toml(
            "[pins]\ndefault_system = \"phys\"\nfallback_pin = 13\nlayout = \"rev2\"\n",
        )
        .unwrap()
        .unwrap();
        assert_eq!(config.default_system, PinSystem::Phys);
        assert_eq!(config.fallback_pin, 13);
        assert_eq!(config.layout, Some(BoardLayout::Rev2));
    }

    #[test]
    fn test_parse_toml_partial_and_missing() {
        let config = MonitorConfig::parse_toml("[pins]\ndefault_system = \"sys\"\n")
            .unwrap()
            .unwrap();
        assert_eq!(config.default_system, PinSystem::Virtual);
        assert_eq!(config.fallback_pin, DEFAULT_FALLBACK_PIN);

        assert_eq!(MonitorConfig::parse_toml("[other]\nx = 1\n").unwrap(), None);
        assert!(MonitorConfig::parse_toml("[pins\n").is_err());
    }

    #[test]
    fn test_resolver_layout_priority() {
        let config = MonitorConfig::default();
        assert_eq!(config.resolver(None).layout(), BoardLayout::Rev2);
        assert_eq!(config.resolver(Some(BoardLayout::Rev1)).layout(), BoardLayout::Rev1);

        let pinned = MonitorConfig {
            layout: Some(BoardLayout::Rev2),
            ..MonitorConfig::default()
        };
        assert_eq!(pinned.resolver(Some(BoardLayout::Rev1)).layout(), BoardLayout::Rev2);
    }
}
