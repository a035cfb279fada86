/// Driver Boundary Module
///
/// The traits each backend implements to reach its native client library, and
/// the buffered cursor for drivers whose protocol delivers the whole result
/// at once.
///
/// ## Layers
///
/// - [`Driver`]: stateless factory for one backend, owned by a connection
/// - [`NativeSession`]: one open native session
/// - [`NativeCursor`]: one result being walked row by row
use super::connection::ConnectParams;
use super::decode::FieldDecoder;
use super::features::FeatureSet;
use crate::core::error::NativeError;
use crate::drivers::Backend;
use std::collections::VecDeque;

/// Column values of one native row; `None` is SQL NULL.
pub type NativeRow = Vec<Option<Vec<u8>>>;

/// A result handle walked one row at a time.
pub trait NativeCursor {
    fn column_count(&self) -> usize;

    /// Total rows, when the backend knows it before the first fetch.
    fn row_count(&self) -> Option<u64>;

    /// Advances to the next row. `Ok(false)` means the result is exhausted.
    fn fetch(&mut self) -> Result<bool, NativeError>;

    /// Text of column `index` in the current row, `None` for NULL or for an
    /// index past the last column.
    fn column(&self, index: usize) -> Option<&[u8]>;

    /// Releases the native result. Idempotent.
    fn close(&mut self);
}

/// One live session with a backend.
pub trait NativeSession {
    /// Runs a row-returning statement.
    fn query(&mut self, sql: &str) -> Result<Box<dyn NativeCursor>, NativeError>;

    /// Runs a statement and reports the number of affected rows.
    fn execute(&mut self, sql: &str) -> Result<u64, NativeError>;

    /// Runs statements that produce no result.
    fn batch(&mut self, sql: &str) -> Result<(), NativeError>;

    fn begin(&mut self) -> Result<(), NativeError> {
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        self.batch("ROLLBACK")
    }

    /// Id generated by the last INSERT, `None` when the backend has none.
    fn last_insert_id(&mut self) -> Result<Option<u64>, NativeError>;

    /// Whether the session still answers.
    fn ping(&mut self) -> bool;

    fn close(self: Box<Self>) -> Result<(), NativeError>;
}

/// Factory for sessions of one backend.
pub trait Driver {
    fn backend(&self) -> Backend;

    fn supported_features(&self) -> FeatureSet;

    /// Features switched on for a fresh connection.
    fn default_features(&self) -> FeatureSet {
        FeatureSet::EMPTY
    }

    fn decoder(&self) -> &dyn FieldDecoder;

    /// Whether a server identifier is needed to connect.
    fn requires_server(&self) -> bool {
        true
    }

    /// Sets up the native client environment. A failure disables the
    /// connection for good.
    fn init(&self) -> Result<(), NativeError> {
        Ok(())
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn NativeSession>, NativeError>;
}

/// Cursor over rows already pulled from the backend.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    columns: usize,
    total: Option<u64>,
    pending: VecDeque<NativeRow>,
    current: Option<NativeRow>,
}

impl BufferedCursor {
    /// A cursor that reports its row count up front.
    pub fn new(columns: usize, rows: Vec<NativeRow>) -> Self {
        BufferedCursor {
            columns,
            total: Some(rows.len() as u64),
            pending: rows.into(),
            current: None,
        }
    }
}

impl NativeCursor for BufferedCursor {
    fn column_count(&self) -> usize {
        self.columns
    }

    fn row_count(&self) -> Option<u64> {
        self.total
    }

    fn fetch(&mut self) -> Result<bool, NativeError> {
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn column(&self, index: usize) -> Option<&[u8]> {
        self.current.as_ref()?.get(index)?.as_deref()
    }

    fn close(&mut self) {
        self.pending.clear();
        self.current = None;
    }
}
