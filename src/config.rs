use crate::core::db::connection::{ConnectParams, Connection};
use crate::core::db::features::Feature;
use crate::core::error::{DbError, Result};
use crate::drivers::Backend;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub features: Option<FeaturesConfig>,
}

/// Which backend to use and how to reach it.
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    pub backend: Backend,
    pub server: Option<String>,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    /// Handshake timeout in seconds
    pub connect_timeout: Option<u64>,
}

/// Feature switches applied after connecting. Unset entries keep the
/// backend's defaults.
#[derive(Debug, Default, Deserialize)]
pub struct FeaturesConfig {
    pub cursor: Option<bool>,
    pub transactions: Option<bool>,
    pub auto_trim: Option<bool>,
}

impl ConnectionConfig {
    pub fn to_params(&self) -> ConnectParams {
        let mut params = ConnectParams::new(self.database.clone())
            .with_server(self.server.clone().unwrap_or_default())
            .with_credentials(
                self.user.clone().unwrap_or_default(),
                self.password.clone().unwrap_or_default(),
            )
            .with_port(self.port.unwrap_or(0));
        if let Some(secs) = self.connect_timeout {
            params = params.with_timeout(Duration::from_secs(secs));
        }
        params
    }
}

impl FeaturesConfig {
    /// Applies the switches to `conn`; unsupported features are skipped.
    pub fn apply(&self, conn: &Connection) {
        let switches = [
            (Feature::Cursor, self.cursor),
            (Feature::Transactions, self.transactions),
            (Feature::AutoTrim, self.auto_trim),
        ];
        for (feature, switch) in switches {
            match switch {
                Some(true) => {
                    if !conn.set_feature(feature) {
                        warn!(?feature, "Ignoring feature switch the backend does not support");
                    }
                }
                Some(false) => conn.clear_feature(feature),
                None => {}
            }
        }
    }
}

impl Config {
    /// Creates a connection for the configured backend, connects it and
    /// applies the feature switches.
    pub fn open(&self) -> Result<Connection> {
        let mut conn = Connection::new(self.connection.backend);
        conn.connect_with(self.connection.to_params())?;
        if let Some(features) = &self.features {
            features.apply(&conn);
        }
        Ok(conn)
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = rowbind::config::load_config("rowbind.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    debug!("Loading configuration from {:?}", path);
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    if config.connection.database.trim().is_empty() {
        return Err(DbError::Config("connection.database must not be empty".to_string()));
    }
    Ok(config)
}

/// Default configuration file location, `<config dir>/rowbind/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rowbind").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CONFIG: &str = r#"
[connection]
backend = "postgres"
server = "db.internal"
database = "inventory"
user = "reporter"
password = "secret"
port = 5433
connect_timeout = 10

[features]
auto_trim = true
cursor = false
"#;

    #[test]
    fn test_load_config_from_str() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.connection.backend, Backend::Postgres);
        let params = config.connection.to_params();
        assert_eq!(params.server, "db.internal");
        assert_eq!(params.database, "inventory");
        assert_eq!(params.user, "reporter");
        assert_eq!(params.port, 5433);
        assert_eq!(params.connect_timeout, Some(Duration::from_secs(10)));
        if let Some(features) = config.features {
            assert_eq!(features.auto_trim, Some(true));
            assert_eq!(features.cursor, Some(false));
            assert_eq!(features.transactions, None);
        } else {
            panic!("Features configuration not found");
        }
    }

    #[test]
    fn test_minimal_sqlite_config() {
        let config: Config = toml::from_str(
            r#"
[connection]
backend = "sqlite"
database = ":memory:"
"#,
        )
        .unwrap();
        assert!(config.features.is_none());
        let conn = config.open().unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.port(), 0);
    }

    #[test]
    fn test_feature_switches_skip_unsupported() {
        let config: Config = toml::from_str(
            r#"
[connection]
backend = "sqlite"
database = ":memory:"

[features]
cursor = true
auto_trim = true
transactions = false
"#,
        )
        .unwrap();
        let conn = config.open().unwrap();
        assert!(!conn.is_feature_on(Feature::Cursor));
        assert!(conn.is_feature_on(Feature::AutoTrim));
        assert!(!conn.is_feature_on(Feature::Transactions));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let parsed: std::result::Result<Config, _> = toml::from_str(
            r#"
[connection]
backend = "oracle"
database = "x"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_load_config_rejects_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowbind.toml");
        fs::write(&path, "[connection]\nbackend = \"sqlite\"\ndatabase = \"\"\n").unwrap();
        match load_config(&path) {
            Err(DbError::Config(message)) => assert!(message.contains("database")),
            other => panic!("Expected config error, got {:?}", other),
        }
        assert!(matches!(load_config(dir.path().join("missing.toml")), Err(DbError::Io(_))));
    }
}
