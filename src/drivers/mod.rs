/// Backend Drivers Module
///
/// One adapter per database backend, each implementing the native session and
/// cursor traits over its client library. [`Backend::driver`] is the factory;
/// SQLite is always available and the other backends are behind Cargo
/// features of the same name.
use crate::core::db::connection::ConnectParams;
use crate::core::db::decode::{FieldDecoder, NumericBoolDecoder};
use crate::core::db::driver::{Driver, NativeSession};
use crate::core::db::features::FeatureSet;
use crate::core::error::NativeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "firebird")]
pub mod firebird;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "odbc")]
pub mod odbc;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;

/// Database backends with a driver adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Postgres = 1,
    #[serde(rename = "mysql")]
    MySql = 2,
    Odbc = 3,
    Sqlite = 4,
    /// SQL Server, reached through its ODBC driver
    #[serde(rename = "mssql")]
    MsSql = 5,
    Firebird = 6,
}

impl Backend {
    pub const ALL: [Backend; 6] = [
        Backend::Postgres,
        Backend::MySql,
        Backend::Odbc,
        Backend::Sqlite,
        Backend::MsSql,
        Backend::Firebird,
    ];

    /// Stable numeric id of the backend.
    pub fn type_id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Backend::Postgres => "postgres",
            Backend::MySql => "mysql",
            Backend::Odbc => "odbc",
            Backend::Sqlite => "sqlite",
            Backend::MsSql => "mssql",
            Backend::Firebird => "firebird",
        }
    }

    /// Cargo feature that compiles this backend in.
    fn cargo_feature(self) -> &'static str {
        match self {
            Backend::MsSql => "odbc",
            other => other.name(),
        }
    }

    /// Builds the driver for this backend.
    pub fn driver(self) -> Box<dyn Driver> {
        match self {
            Backend::Sqlite => Box::new(sqlite::SqliteDriver),
            #[cfg(feature = "postgres")]
            Backend::Postgres => Box::new(postgres::PostgresDriver::new()),
            #[cfg(feature = "mysql")]
            Backend::MySql => Box::new(mysql::MySqlDriver::new()),
            #[cfg(feature = "odbc")]
            Backend::Odbc => Box::new(odbc::OdbcDriver::new(Backend::Odbc)),
            #[cfg(feature = "odbc")]
            Backend::MsSql => Box::new(odbc::OdbcDriver::new(Backend::MsSql)),
            #[cfg(feature = "firebird")]
            Backend::Firebird => Box::new(firebird::FirebirdDriver::new()),
            #[allow(unreachable_patterns)]
            other => Box::new(UnavailableDriver { backend: other }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgsql" => Ok(Backend::Postgres),
            "mysql" | "mariadb" => Ok(Backend::MySql),
            "odbc" => Ok(Backend::Odbc),
            "sqlite" | "sqlite3" => Ok(Backend::Sqlite),
            "mssql" | "sqlserver" => Ok(Backend::MsSql),
            "firebird" => Ok(Backend::Firebird),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Stand-in for a backend that was not compiled in. Its environment setup
/// always fails, so a connection over it stays uninitialized.
#[derive(Debug)]
pub struct UnavailableDriver {
    backend: Backend,
}

impl UnavailableDriver {
    fn missing(&self) -> NativeError {
        NativeError::Other(format!(
            "{} support is not compiled in; enable the `{}` feature",
            self.backend,
            self.backend.cargo_feature()
        ))
    }
}

impl Driver for UnavailableDriver {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::EMPTY
    }

    fn decoder(&self) -> &dyn FieldDecoder {
        &NumericBoolDecoder
    }

    fn init(&self) -> Result<(), NativeError> {
        Err(self.missing())
    }

    fn open(&self, _params: &ConnectParams) -> Result<Box<dyn NativeSession>, NativeError> {
        Err(self.missing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::Connection;
    use crate::core::error::ErrorCode;

    #[test]
    fn test_backend_names_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(backend.name().parse::<Backend>().unwrap(), backend);
        }
        assert_eq!("PostgreSQL".parse::<Backend>().unwrap(), Backend::Postgres);
        assert!("oracle".parse::<Backend>().is_err());
    }

    #[test]
    fn test_type_ids_are_stable() {
        assert_eq!(Backend::Postgres.type_id(), 1);
        assert_eq!(Backend::Sqlite.type_id(), 4);
        assert_eq!(Backend::Firebird.type_id(), 6);
    }

    #[cfg(not(feature = "firebird"))]
    #[test]
    fn test_missing_backend_disables_connection() {
        let mut conn = Connection::new(Backend::Firebird);
        assert_eq!(conn.last_error(), ErrorCode::InitFailure);
        assert!(conn.error_description().contains("`firebird` feature"));
        let err = conn
            .connect_with(ConnectParams::new("employee").with_server("localhost"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotInitialized);
    }
}
