//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod collab;
pub mod logging;
pub mod transport;

use serde::{Deserialize, Serialize};

use self::collab::CollabConfig;
use self::logging::LoggingConfig;
use self::transport::TransportConfig;

use crate::error::CollabError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Collaboration engine settings.
    #[serde(default)]
    pub collab: CollabConfig,
    /// Transport substrate settings.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `BOARDSYNC_`.
    pub fn load(env: &str) -> Result<Self, CollabError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("BOARDSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CollabError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| CollabError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_on_empty_input() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.collab.heartbeat_interval_seconds, 30);
        assert_eq!(cfg.collab.liveness_multiplier, 2);
        assert_eq!(cfg.transport.mode, transport::TransportMode::Memory);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"collab": {"heartbeat_interval_seconds": 10}}"#).unwrap();
        assert_eq!(cfg.collab.heartbeat_interval_seconds, 10);
        assert_eq!(cfg.collab.reconnect.max_attempts, 5);
    }
}
