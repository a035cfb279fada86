/// # Test Utilities Module
///
/// Shared testing infrastructure for rowbind.
///
/// This module provides:
/// - A scripted in-memory driver that records every native call
/// - SQLite fixtures with the demo table used across the test suite
/// - Error code assertion helpers
use crate::core::db::connection::{ConnectParams, Connection};
use crate::core::db::decode::{FieldDecoder, NumericBoolDecoder};
use crate::core::db::driver::{BufferedCursor, Driver, NativeCursor, NativeRow, NativeSession};
use crate::core::db::features::{Feature, FeatureSet};
use crate::core::error::NativeError;
use crate::drivers::Backend;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ScriptState {
    calls: Vec<String>,
    results: VecDeque<Vec<NativeRow>>,
    affected: u64,
    insert_id: Option<u64>,
    query_error: Option<String>,
    fetch_failure_after: Option<usize>,
}

/// Shared view of what a scripted driver was asked to do.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    state: Arc<Mutex<ScriptState>>,
}

impl CallLog {
    /// Native calls in the order they were made.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Affected row count reported by every following modify statement.
    pub fn set_affected(&self, affected: u64) {
        self.state.lock().unwrap().affected = affected;
    }

    fn record(&self, call: &str) {
        self.state.lock().unwrap().calls.push(call.to_string());
    }
}

/// Driver whose sessions replay queued results instead of talking to a
/// database.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    log: CallLog,
    refuse: Option<String>,
    environment_fails: bool,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        ScriptedDriver::default()
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Queues one result; each query consumes the oldest queued result.
    pub fn with_result(self, rows: &[&[Option<&str>]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|value| value.map(|text| text.as_bytes().to_vec()))
                    .collect()
            })
            .collect();
        self.log.state.lock().unwrap().results.push_back(rows);
        self
    }

    pub fn with_insert_id(self, id: u64) -> Self {
        self.log.state.lock().unwrap().insert_id = Some(id);
        self
    }

    pub fn fail_queries(self, message: &str) -> Self {
        self.log.state.lock().unwrap().query_error = Some(message.to_string());
        self
    }

    /// Every result fails on the fetch that follows its first `rows` rows.
    pub fn fail_fetch_after(self, rows: usize) -> Self {
        self.log.state.lock().unwrap().fetch_failure_after = Some(rows);
        self
    }

    pub fn refuse_connections(mut self, message: &str) -> Self {
        self.refuse = Some(message.to_string());
        self
    }

    pub fn fail_environment(mut self) -> Self {
        self.environment_fails = true;
        self
    }
}

impl Driver for ScriptedDriver {
    fn backend(&self) -> Backend {
        Backend::Odbc
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Transactions, Feature::AutoTrim])
    }

    fn default_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Transactions])
    }

    fn decoder(&self) -> &dyn FieldDecoder {
        &NumericBoolDecoder
    }

    fn init(&self) -> Result<(), NativeError> {
        if self.environment_fails {
            return Err(NativeError::Other("driver manager unavailable".to_string()));
        }
        Ok(())
    }

    fn open(&self, _params: &ConnectParams) -> Result<Box<dyn NativeSession>, NativeError> {
        if let Some(message) = &self.refuse {
            return Err(NativeError::Other(message.clone()));
        }
        self.log.record("open");
        Ok(Box::new(ScriptedSession {
            log: self.log.clone(),
        }))
    }
}

struct ScriptedSession {
    log: CallLog,
}

impl NativeSession for ScriptedSession {
    fn query(&mut self, _sql: &str) -> Result<Box<dyn NativeCursor>, NativeError> {
        self.log.record("query");
        let mut state = self.log.state.lock().unwrap();
        if let Some(message) = &state.query_error {
            return Err(NativeError::Other(message.clone()));
        }
        let rows = state.results.pop_front().unwrap_or_default();
        let columns = rows.first().map(Vec::len).unwrap_or(1);
        Ok(Box::new(ScriptedCursor {
            inner: BufferedCursor::new(columns, rows),
            log: self.log.clone(),
            fail_after: state.fetch_failure_after,
            fetched: 0,
            open: true,
        }))
    }

    fn execute(&mut self, _sql: &str) -> Result<u64, NativeError> {
        self.log.record("execute");
        Ok(self.log.state.lock().unwrap().affected)
    }

    fn batch(&mut self, _sql: &str) -> Result<(), NativeError> {
        self.log.record("batch");
        Ok(())
    }

    fn begin(&mut self) -> Result<(), NativeError> {
        self.log.record("begin");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        self.log.record("commit");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        self.log.record("rollback");
        Ok(())
    }

    fn last_insert_id(&mut self) -> Result<Option<u64>, NativeError> {
        self.log.record("insert_id");
        Ok(self.log.state.lock().unwrap().insert_id)
    }

    fn ping(&mut self) -> bool {
        self.log.record("ping");
        true
    }

    fn close(self: Box<Self>) -> Result<(), NativeError> {
        self.log.record("close");
        Ok(())
    }
}

/// Buffered cursor that records its release and can fail part way through.
struct ScriptedCursor {
    inner: BufferedCursor,
    log: CallLog,
    fail_after: Option<usize>,
    fetched: usize,
    open: bool,
}

impl NativeCursor for ScriptedCursor {
    fn column_count(&self) -> usize {
        self.inner.column_count()
    }

    fn row_count(&self) -> Option<u64> {
        self.inner.row_count()
    }

    fn fetch(&mut self) -> Result<bool, NativeError> {
        if self.fail_after == Some(self.fetched) {
            return Err(NativeError::Other("connection reset while fetching".to_string()));
        }
        self.fetched += 1;
        self.inner.fetch()
    }

    fn column(&self, index: usize) -> Option<&[u8]> {
        self.inner.column(index)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.log.record("close_cursor");
        }
        self.inner.close();
    }
}

/// Connects a scripted driver and hands back its call log.
pub fn scripted_connection(driver: ScriptedDriver) -> (Connection, CallLog) {
    let log = driver.log();
    let mut conn = Connection::with_driver(Box::new(driver));
    conn.connect_with(ConnectParams::new("scripted").with_server("localhost"))
        .unwrap();
    (conn, log)
}

/// Demo table used by the SQLite fixtures.
pub const DEMO_TABLE: &str = "CREATE TABLE ddb_demo (
    id INTEGER PRIMARY KEY,
    ts TIMESTAMP,
    data VARCHAR(255),
    tf BOOLEAN,
    price REAL,
    grade CHAR(1)
)";

/// In-memory SQLite connection with an empty demo table.
pub fn sqlite_memory() -> Connection {
    let mut conn = Connection::new(Backend::Sqlite);
    conn.connect_with(ConnectParams::new(":memory:")).unwrap();
    conn.update_structure(DEMO_TABLE).unwrap();
    conn
}

/// In-memory SQLite connection with three demo rows, one of them all NULL.
pub fn sqlite_with_sample_data() -> Connection {
    let conn = sqlite_memory();
    conn.update_structure(
        "INSERT INTO ddb_demo (id, ts, data, tf, price, grade) VALUES
            (1, '2024-01-15 08:30:00', 'Test item 1', 1, 12.5, 'A'),
            (2, '2024-02-29 23:59:59', 'Test item 2   ', 0, 0.25, 'B');
         INSERT INTO ddb_demo (id) VALUES (3);",
    )
    .unwrap();
    conn
}

/// Error code assertions
pub mod error_testing {
    use crate::core::error::{DbError, ErrorCode};
    use crate::core::db::Connection;

    /// Asserts that `result` failed with `code` and that the connection
    /// recorded the same code.
    pub fn assert_code<T: std::fmt::Debug>(
        conn: &Connection,
        result: Result<T, DbError>,
        code: ErrorCode,
    ) {
        match result {
            Ok(value) => panic!("Expected {:?}, got Ok({:?})", code, value),
            Err(e) => assert_eq!(e.code(), code, "unexpected error: {}", e),
        }
        assert_eq!(conn.last_error(), code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_results_are_consumed_in_order() {
        let driver = ScriptedDriver::new()
            .with_result(&[&[Some("1")]])
            .with_result(&[&[Some("2")]]);
        let (conn, log) = scripted_connection(driver);
        assert_eq!(conn.execute_int("first").unwrap(), Some(1));
        assert_eq!(conn.execute_int("second").unwrap(), Some(2));
        assert_eq!(conn.execute_int("third").unwrap(), None);
        assert_eq!(
            log.calls(),
            vec!["open", "query", "close_cursor", "query", "close_cursor", "query", "close_cursor"]
        );
    }

    #[test]
    fn test_sample_data_fixture() {
        let conn = sqlite_with_sample_data();
        assert_eq!(conn.execute_int("SELECT COUNT(*) FROM ddb_demo").unwrap(), Some(3));
    }
}
