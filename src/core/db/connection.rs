/// Connection Management Module
///
/// This module provides one session to one database: parameter validation,
/// the connect/disconnect lifecycle, the single transaction slot, the scalar
/// and modify helpers, and the error code bookkeeping shared with row sets.
///
/// State lives in cells so that row sets can borrow the connection shared
/// while still recording errors on it. Operations that replace the native
/// session (`connect`, `disconnect`, `reset_connection`) take `&mut self`, so
/// they cannot run while a row set is alive.
use super::binding::Timestamp;
use super::decode::DecodeContext;
use super::driver::{Driver, NativeCursor, NativeSession};
use super::features::{Feature, FeatureSet};
use super::rowset::RowSet;
use super::scalar::ScalarValue;
use crate::core::error::{DbError, ErrorCode, NativeError, Result};
use crate::core::locale::NumericLocale;
use crate::core::scratch::ScratchBuffer;
use crate::drivers::Backend;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shown in place of server and database names while disconnected.
pub const NO_CONNECTION: &str = "<No connection>";

/// Parameters identifying the database to connect to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    /// `0` selects the backend's default port
    pub port: u16,
    /// Applies to the handshake only
    pub connect_timeout: Option<Duration>,
}

impl ConnectParams {
    pub fn new(database: impl Into<String>) -> Self {
        ConnectParams {
            database: database.into(),
            ..ConnectParams::default()
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// One session to one database.
pub struct Connection {
    driver: Box<dyn Driver>,
    params: ConnectParams,
    session: RefCell<Option<Box<dyn NativeSession>>>,
    supported: FeatureSet,
    enabled: Cell<FeatureSet>,
    environment_ok: bool,
    initialized: bool,
    connected: Cell<bool>,
    transaction: Cell<bool>,
    last_error: Cell<ErrorCode>,
    diagnostic: RefCell<Option<String>>,
    locale: NumericLocale,
    scratch: RefCell<ScratchBuffer>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &self.backend())
            .field("database", &self.params.database)
            .field("initialized", &self.initialized)
            .field("connected", &self.connected.get())
            .field("transaction", &self.transaction.get())
            .field("last_error", &self.last_error.get())
            .finish()
    }
}

impl Connection {
    /// Creates an uninitialized connection for `backend`.
    pub fn new(backend: Backend) -> Self {
        Connection::with_driver(backend.driver())
    }

    /// Creates an uninitialized connection over a specific driver.
    ///
    /// The driver environment is set up here; if that fails the connection
    /// stays uninitialized for its whole life.
    pub fn with_driver(driver: Box<dyn Driver>) -> Self {
        let supported = driver.supported_features();
        let enabled = driver.default_features();
        let mut conn = Connection {
            driver,
            params: ConnectParams::default(),
            session: RefCell::new(None),
            supported,
            enabled: Cell::new(enabled.intersection(supported)),
            environment_ok: true,
            initialized: false,
            connected: Cell::new(false),
            transaction: Cell::new(false),
            last_error: Cell::new(ErrorCode::Success),
            diagnostic: RefCell::new(None),
            locale: NumericLocale::process(),
            scratch: RefCell::new(ScratchBuffer::new()),
        };
        if let Err(e) = conn.driver.init() {
            error!(backend = %conn.backend(), "Driver environment initialization failed: {}", e);
            conn.environment_ok = false;
            let _ = conn.fail_native(ErrorCode::InitFailure, e);
        }
        conn
    }

    /// Replaces the numeric locale detected from the process environment.
    pub fn with_locale(mut self, locale: NumericLocale) -> Self {
        self.locale = locale;
        self
    }

    /// Validates and stores connection parameters.
    pub fn initialize(&mut self, params: ConnectParams) -> Result<()> {
        if !self.environment_ok || self.connected.get() {
            return Err(self.fail(ErrorCode::InitFailure));
        }
        self.validate(&params)?;
        self.params = params;
        self.initialized = true;
        self.succeed();
        Ok(())
    }

    /// Opens a session with the stored parameters.
    pub fn connect(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(self.fail(ErrorCode::NotInitialized));
        }
        if self.connected.get() {
            debug!(database = %self.params.database, "Already connected");
            self.succeed();
            return Ok(());
        }
        self.validate(&self.params)?;

        let session = self
            .driver
            .open(&self.params)
            .map_err(|e| self.fail_native(ErrorCode::ConnectionFailure, e))?;
        *self.session.get_mut() = Some(session);
        self.connected.set(true);
        self.transaction.set(false);
        info!(
            backend = %self.backend(),
            server = %self.params.server,
            database = %self.params.database,
            "Connected"
        );
        self.succeed();
        Ok(())
    }

    /// Initializes with `params` and connects.
    pub fn connect_with(&mut self, params: ConnectParams) -> Result<()> {
        if !self.environment_ok {
            return Err(self.fail(ErrorCode::NotInitialized));
        }
        self.initialize(params)?;
        self.connect()
    }

    /// Closes the session. An open transaction is rolled back first.
    ///
    /// Succeeds when already disconnected.
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.get_mut().take() {
            if self.transaction.get() {
                warn!(database = %self.params.database, "Disconnecting with an open transaction; rolling back");
                if let Err(e) = session.rollback() {
                    error!("Rollback before disconnect failed: {}", e);
                }
            }
            if let Err(e) = session.close() {
                error!("Closing native session failed: {}", e);
            }
            info!(database = %self.params.database, "Disconnected");
        }
        self.connected.set(false);
        self.transaction.set(false);
        self.succeed();
        Ok(())
    }

    /// Whether the live session still answers.
    pub fn is_connect_ok(&self) -> bool {
        if !self.connected.get() {
            return false;
        }
        match self.session.try_borrow_mut() {
            Ok(mut slot) => slot.as_mut().map(|session| session.ping()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Closes and re-opens the session with the stored parameters.
    pub fn reset_connection(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(self.fail(ErrorCode::NotInitialized));
        }
        info!(database = %self.params.database, "Resetting connection");
        self.disconnect()?;
        self.connect()
    }

    /// Creates a row set on this connection.
    pub fn create_row_set<'a>(&self) -> Result<RowSet<'_, 'a>> {
        if !self.connected.get() {
            return Err(self.fail(ErrorCode::NotConnected));
        }
        self.succeed();
        Ok(RowSet::new(self))
    }

    pub fn start_transaction(&self) -> Result<()> {
        self.require_connected()?;
        if self.transaction.get() {
            return Err(self.fail(ErrorCode::TransactionActive));
        }
        self.with_session(ErrorCode::ExecuteFailure, |session| session.begin())?;
        self.transaction.set(true);
        debug!("Transaction started");
        self.succeed();
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.require_connected()?;
        if !self.transaction.get() {
            return Err(self.fail(ErrorCode::NoTransaction));
        }
        self.with_session(ErrorCode::ExecuteFailure, |session| session.commit())?;
        self.transaction.set(false);
        debug!("Transaction committed");
        self.succeed();
        Ok(())
    }

    pub fn roll_back(&self) -> Result<()> {
        self.require_connected()?;
        if !self.transaction.get() {
            return Err(self.fail(ErrorCode::NoTransaction));
        }
        self.with_session(ErrorCode::ExecuteFailure, |session| session.rollback())?;
        self.transaction.set(false);
        debug!("Transaction rolled back");
        self.succeed();
        Ok(())
    }

    /// Runs a query expected to yield one row with one column.
    ///
    /// `Ok(None)` when the query yields no rows or the value is NULL.
    pub fn execute_scalar<T: ScalarValue>(&self, query: &str) -> Result<Option<T>> {
        if query.trim().is_empty() {
            return Err(self.fail(ErrorCode::ExecuteFailure));
        }
        debug!(sql = %query, "Executing scalar query");
        let mut cursor = self.with_session(ErrorCode::ExecuteFailure, |session| session.query(query))?;
        let value = match cursor.fetch() {
            Ok(true) => {
                let ctx = self.decode_context();
                cursor.column(0).map(|raw| T::from_column(raw, &ctx))
            }
            Ok(false) => None,
            Err(e) => {
                cursor.close();
                return Err(self.fail_native(ErrorCode::ExecuteFailure, e));
            }
        };
        cursor.close();
        self.succeed();
        Ok(value)
    }

    pub fn execute_int(&self, query: &str) -> Result<Option<u32>> {
        self.execute_scalar(query)
    }

    pub fn execute_long(&self, query: &str) -> Result<Option<u64>> {
        self.execute_scalar(query)
    }

    pub fn execute_double(&self, query: &str) -> Result<Option<f64>> {
        self.execute_scalar(query)
    }

    pub fn execute_bool(&self, query: &str) -> Result<Option<bool>> {
        self.execute_scalar(query)
    }

    pub fn execute_str(&self, query: &str) -> Result<Option<String>> {
        self.execute_scalar(query)
    }

    pub fn execute_date(&self, query: &str) -> Result<Option<Timestamp>> {
        self.execute_scalar(query)
    }

    /// Runs an INSERT, UPDATE or DELETE and returns the affected row count.
    pub fn execute_modify(&self, query: &str) -> Result<u64> {
        if query.trim().is_empty() {
            return Err(self.fail(ErrorCode::ModifyFailure));
        }
        debug!(sql = %query, "Executing modify statement");
        let affected = self.with_session(ErrorCode::ModifyFailure, |session| session.execute(query))?;
        self.succeed();
        Ok(affected)
    }

    /// Runs a CREATE, ALTER or DROP statement.
    pub fn update_structure(&self, ddl: &str) -> Result<()> {
        if ddl.trim().is_empty() {
            return Err(self.fail(ErrorCode::DdlFailure));
        }
        debug!(sql = %ddl, "Updating structure");
        self.with_session(ErrorCode::DdlFailure, |session| session.batch(ddl))?;
        self.succeed();
        Ok(())
    }

    /// Id generated by the last INSERT on this session.
    pub fn insert_id(&self) -> Result<u64> {
        match self.with_session(ErrorCode::InsertIdUnavailable, |session| session.last_insert_id())? {
            Some(id) => {
                self.succeed();
                Ok(id)
            }
            None => Err(self.fail(ErrorCode::InsertIdUnavailable)),
        }
    }

    /// Doubles quotes and strips carriage returns.
    ///
    /// The cleaning helpers share one buffer. Each returns a view of it that
    /// must be dropped before the next cleaning call.
    ///
    /// # Panics
    ///
    /// Panics if a view returned by an earlier cleaning call is still held.
    pub fn clean_string(&self, text: &str) -> Ref<'_, str> {
        self.scratch.borrow_mut().clean_sql(text);
        self.scratch_view()
    }

    /// Doubles quotes only.
    pub fn clean_html(&self, text: &str) -> Ref<'_, str> {
        self.scratch.borrow_mut().clean_html(text);
        self.scratch_view()
    }

    /// Reverses backslash escapes.
    pub fn clean_reverse(&self, text: &str) -> Ref<'_, str> {
        self.scratch.borrow_mut().unescape(text);
        self.scratch_view()
    }

    fn scratch_view(&self) -> Ref<'_, str> {
        Ref::map(self.scratch.borrow(), ScratchBuffer::as_str)
    }

    /// Renders `value` as an SQL numeric literal.
    pub fn print_number(&self, value: f64) -> String {
        self.locale.print_number(value)
    }

    pub fn print_number_fixed(&self, value: f64, decimals: usize) -> String {
        self.locale.print_number_fixed(value, decimals)
    }

    pub fn supports_feature(&self, feature: Feature) -> bool {
        self.supported.contains(feature)
    }

    /// Switches a feature on. Returns `false` if the backend lacks it.
    pub fn set_feature(&self, feature: Feature) -> bool {
        if !self.supports_feature(feature) {
            warn!(backend = %self.backend(), ?feature, "Feature not supported by backend");
            return false;
        }
        self.enabled.set(self.enabled.get().with(feature));
        true
    }

    pub fn clear_feature(&self, feature: Feature) {
        self.enabled.set(self.enabled.get().without(feature));
    }

    pub fn is_feature_on(&self, feature: Feature) -> bool {
        self.enabled.get().contains(feature)
    }

    pub fn last_error(&self) -> ErrorCode {
        self.last_error.get()
    }

    /// Registry text of the last error, followed by the backend diagnostic
    /// when there is one.
    pub fn error_description(&self) -> String {
        let code = self.last_error.get();
        match self.diagnostic.borrow().as_deref() {
            Some(detail) => format!("{}\n{}", code.description(), detail),
            None => code.description().to_string(),
        }
    }

    pub fn server_name(&self) -> &str {
        if self.connected.get() {
            &self.params.server
        } else {
            NO_CONNECTION
        }
    }

    pub fn database_name(&self) -> &str {
        if self.connected.get() {
            &self.params.database
        } else {
            NO_CONNECTION
        }
    }

    pub fn port(&self) -> u16 {
        self.params.port
    }

    pub fn locale(&self) -> NumericLocale {
        self.locale
    }

    pub fn is_comma_decimal(&self) -> bool {
        self.locale.is_comma_decimal()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn is_transaction(&self) -> bool {
        self.transaction.get()
    }

    pub fn backend(&self) -> Backend {
        self.driver.backend()
    }

    fn validate(&self, params: &ConnectParams) -> Result<()> {
        let missing_server = self.driver.requires_server() && params.server.trim().is_empty();
        if params.database.trim().is_empty() || missing_server {
            return Err(self.fail(ErrorCode::EmptyParameters));
        }
        Ok(())
    }

    fn require_connected(&self) -> Result<()> {
        if self.connected.get() {
            Ok(())
        } else {
            Err(self.fail(ErrorCode::NotConnected))
        }
    }

    /// Records `code` as the last error and returns it as an error value.
    pub(crate) fn fail(&self, code: ErrorCode) -> DbError {
        self.last_error.set(code);
        *self.diagnostic.borrow_mut() = None;
        debug!(code = code.id(), "{}", code);
        DbError::Code(code)
    }

    /// Records `code` with the backend's own diagnostic.
    pub(crate) fn fail_native(&self, code: ErrorCode, source: NativeError) -> DbError {
        self.last_error.set(code);
        *self.diagnostic.borrow_mut() = Some(source.to_string());
        error!(code = code.id(), backend = %self.backend(), "{}: {}", code, source);
        DbError::Native { code, source }
    }

    pub(crate) fn succeed(&self) {
        self.last_error.set(ErrorCode::Success);
        *self.diagnostic.borrow_mut() = None;
    }

    /// Runs `op` against the live session, mapping native failures to `code`.
    pub(crate) fn with_session<T>(
        &self,
        code: ErrorCode,
        op: impl FnOnce(&mut dyn NativeSession) -> std::result::Result<T, NativeError>,
    ) -> Result<T> {
        self.require_connected()?;
        let outcome = {
            let mut slot = self
                .session
                .try_borrow_mut()
                .map_err(|_| self.fail(ErrorCode::Undefined))?;
            match slot.as_mut() {
                Some(session) => op(session.as_mut()),
                None => return Err(self.fail(ErrorCode::NotConnected)),
            }
        };
        outcome.map_err(|e| self.fail_native(code, e))
    }

    pub(crate) fn open_cursor(&self, sql: &str) -> Result<Box<dyn NativeCursor>> {
        self.with_session(ErrorCode::QueryFailure, |session| session.query(sql))
    }

    pub(crate) fn decode_context(&self) -> DecodeContext<'_> {
        DecodeContext {
            decoder: self.driver.decoder(),
            locale: self.locale,
            auto_trim: self.is_feature_on(Feature::AutoTrim),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            if self.transaction.get() {
                warn!(
                    database = %self.params.database,
                    "Connection dropped with an open transaction; it is neither committed nor rolled back"
                );
            }
            if let Err(e) = session.close() {
                error!("Closing native session failed: {}", e);
            }
        }
    }
}
