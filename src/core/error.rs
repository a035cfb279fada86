/// Rowbind Error Module
///
/// This module defines the closed set of numeric error codes shared by every
/// backend, the registry of their descriptions, and the structured error types
/// returned by fallible operations.
use std::fmt;
use thiserror::Error;

/// Numeric error codes recorded on a connection after each operation.
///
/// The numeric ids are stable and can be stored or compared by callers that
/// only keep the integer (see [`ErrorCode::id`] and [`ErrorCode::from_id`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum ErrorCode {
    /// The last operation succeeded
    #[default]
    Success = 0,
    /// Unknown or unmapped failure
    Undefined = 1,
    /// Server or database identifier missing
    EmptyParameters = 3,
    /// The native handshake failed
    ConnectionFailure = 4,
    /// Operation attempted without a live session
    NotConnected = 5,
    /// A transaction is already open on this connection
    TransactionActive = 6,
    /// Commit or rollback without an open transaction
    NoTransaction = 7,
    /// A row set query failed to execute
    QueryFailure = 8,
    /// A row set query was issued with no bound fields
    MissingBindings = 9,
    /// The connection was never initialized, or its driver environment failed
    NotInitialized = 11,
    /// The bound type tag is invalid or does not fit the destination
    UnsupportedConversion = 14,
    /// INSERT, UPDATE or DELETE failed
    ModifyFailure = 18,
    /// A scalar helper query failed
    ExecuteFailure = 19,
    /// Advancing the native cursor failed
    FetchFailure = 20,
    /// CREATE, DROP or ALTER failed
    DdlFailure = 21,
    /// The backend cannot report the id of the last insert
    InsertIdUnavailable = 22,
    /// The driver environment or connection parameters could not be set up
    InitFailure = 23,
    /// Bind was called while a query result is still attached
    BindAfterQuery = 24,
}

/// Registry of every code with its description, in id order.
const REGISTRY: &[(ErrorCode, &str)] = &[
    (ErrorCode::Success, "Success"),
    (ErrorCode::Undefined, "Undefined error number"),
    (
        ErrorCode::EmptyParameters,
        "DB - Connect: empty or incorrect connection parameters.",
    ),
    (
        ErrorCode::ConnectionFailure,
        "DB - Connect: Connection failure. Check the initialization parameters.",
    ),
    (
        ErrorCode::NotConnected,
        "DB - Attempt to use member functions without a connection to the database.",
    ),
    (
        ErrorCode::TransactionActive,
        "DB - Transaction start: Transaction is already on.",
    ),
    (
        ErrorCode::NoTransaction,
        "DB - Commit/RollBack: The transaction has not been started.",
    ),
    (ErrorCode::QueryFailure, "Rowset - Query function unsuccessful."),
    (
        ErrorCode::MissingBindings,
        "Rowset - Query called without bound variables.",
    ),
    (
        ErrorCode::NotInitialized,
        "DB - Connect: Attempt to connect when database has not been initialized successfully.",
    ),
    (
        ErrorCode::UnsupportedConversion,
        "Rowset - Requested data conversion is not supported.",
    ),
    (
        ErrorCode::ModifyFailure,
        "DB - Modify (INSERT, UPDATE or DELETE) function was unsuccessful.",
    ),
    (
        ErrorCode::ExecuteFailure,
        "DB - Execute query function was unsuccessful.",
    ),
    (ErrorCode::FetchFailure, "Rowset - GetNext function was unsuccessful."),
    (
        ErrorCode::DdlFailure,
        "DB - Update structure (CREATE, DROP, ALTER TABLE or VIEW) command was unsuccessful.",
    ),
    (
        ErrorCode::InsertIdUnavailable,
        "DB - GetInsertId failed. Operation not supported or last statement was not an INSERT command.",
    ),
    (ErrorCode::InitFailure, "DB - Initialization failure."),
    (
        ErrorCode::BindAfterQuery,
        "Rowset - Bind called while a query result is attached. Clear the bindings first.",
    ),
];

impl ErrorCode {
    /// Returns the stable numeric id of this code.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Looks up a code by numeric id. Unknown ids map to [`ErrorCode::Undefined`].
    pub fn from_id(id: u16) -> Self {
        REGISTRY
            .iter()
            .find(|(code, _)| code.id() == id)
            .map(|(code, _)| *code)
            .unwrap_or(ErrorCode::Undefined)
    }

    /// Human-readable description from the registry.
    pub fn description(self) -> &'static str {
        describe(self.id())
    }

    pub fn is_success(self) -> bool {
        self == ErrorCode::Success
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Returns the registry description for a raw numeric id.
pub fn describe(id: u16) -> &'static str {
    REGISTRY
        .iter()
        .find(|(code, _)| code.id() == id)
        .or_else(|| REGISTRY.iter().find(|(code, _)| *code == ErrorCode::Undefined))
        .map(|(_, text)| *text)
        .unwrap_or("Undefined error number")
}

/// Errors raised by a native client library, before normalization.
///
/// Each backend's own error type converts into this enum at the driver
/// boundary; callers only ever see it wrapped inside [`DbError::Native`].
#[derive(Error, Debug)]
pub enum NativeError {
    /// Errors from the bundled SQLite library
    #[error("SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL: {0}")]
    Postgres(#[from] postgres::Error),

    #[cfg(feature = "mysql")]
    #[error("MySQL: {0}")]
    MySql(#[from] mysql::Error),

    #[cfg(feature = "odbc")]
    #[error("ODBC: {0}")]
    Odbc(#[from] odbc_api::Error),

    #[cfg(feature = "firebird")]
    #[error("Firebird: {0}")]
    Firebird(#[from] rsfbclient::FbError),

    /// Failures raised by the driver glue itself
    #[error("{0}")]
    Other(String),
}

/// Error type returned by every fallible rowbind operation.
#[derive(Error, Debug)]
pub enum DbError {
    /// A failure identified by its code alone
    #[error("{0}")]
    Code(ErrorCode),

    /// A failure carrying the backend's own diagnostic
    #[error("{code}\n{source}")]
    Native {
        code: ErrorCode,
        #[source]
        source: NativeError,
    },

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// The error code this failure was recorded under.
    pub fn code(&self) -> ErrorCode {
        match self {
            DbError::Code(code) => *code,
            DbError::Native { code, .. } => *code,
            DbError::Config(_) | DbError::Io(_) => ErrorCode::Undefined,
        }
    }
}

impl From<ErrorCode> for DbError {
    fn from(code: ErrorCode) -> Self {
        DbError::Code(code)
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::Config(err.to_string())
    }
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
