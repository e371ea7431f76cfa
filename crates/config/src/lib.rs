use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "intercom.toml",
    "config/intercom.toml",
    "crates/config/intercom.toml",
    "../intercom.toml",
    "../config/intercom.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://intercom.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Tuning for the ephemeral-state timers of the coordinator.
///
/// All values are milliseconds. `offline_grace_ms` is how long a
/// disconnected identity may stay silent before it is announced offline;
/// `typing_ttl_ms` is how long a typing signal stays live without a
/// refresh; `typing_sweep_interval_ms` is how often stale typing entries
/// are collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "RealtimeConfig::default_offline_grace")]
    pub offline_grace_ms: u64,
    #[serde(default = "RealtimeConfig::default_typing_ttl")]
    pub typing_ttl_ms: u64,
    #[serde(default = "RealtimeConfig::default_sweep_interval")]
    pub typing_sweep_interval_ms: u64,
}

impl RealtimeConfig {
    const fn default_offline_grace() -> u64 {
        5_000
    }

    const fn default_typing_ttl() -> u64 {
        5_000
    }

    const fn default_sweep_interval() -> u64 {
        10_000
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            offline_grace_ms: Self::default_offline_grace(),
            typing_ttl_ms: Self::default_typing_ttl(),
            typing_sweep_interval_ms: Self::default_sweep_interval(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and
/// environment overrides.
///
/// ```
/// use intercom_config::load;
///
/// std::env::remove_var("INTERCOM_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder();
    builder = builder
        .set_default("http.address", defaults.http.address.clone())
        .unwrap()
        .set_default("http.port", i64::from(defaults.http.port))
        .unwrap()
        .set_default("database.url", defaults.database.url.clone())
        .unwrap()
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )
        .unwrap()
        .set_default(
            "realtime.offline_grace_ms",
            defaults.realtime.offline_grace_ms as i64,
        )
        .unwrap()
        .set_default(
            "realtime.typing_ttl_ms",
            defaults.realtime.typing_ttl_ms as i64,
        )
        .unwrap()
        .set_default(
            "realtime.typing_sweep_interval_ms",
            defaults.realtime.typing_sweep_interval_ms as i64,
        )
        .unwrap();

    let environment_overrides = config::Environment::with_prefix("INTERCOM").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("INTERCOM_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via INTERCOM_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    debug!(?config, "loaded relay configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "INTERCOM_CONFIG",
            "INTERCOM__HTTP__ADDRESS",
            "INTERCOM__HTTP__PORT",
            "INTERCOM__DATABASE__URL",
            "INTERCOM__DATABASE__MAX_CONNECTIONS",
            "INTERCOM__REALTIME__OFFLINE_GRACE_MS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn load_uses_defaults_without_file_or_env() {
        clear_env();

        let config = load().expect("defaults should load");
        assert_eq!(config.http.port, 7070);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.realtime.offline_grace_ms, 5_000);
        assert_eq!(config.realtime.typing_sweep_interval_ms, 10_000);
    }

    #[test]
    #[serial]
    fn environment_overrides_take_precedence() {
        clear_env();
        std::env::set_var("INTERCOM__HTTP__PORT", "9999");
        std::env::set_var("INTERCOM__REALTIME__OFFLINE_GRACE_MS", "250");

        let config = load().expect("env overrides should load");
        assert_eq!(config.http.port, 9999);
        assert_eq!(config.realtime.offline_grace_ms, 250);

        clear_env();
    }
}
