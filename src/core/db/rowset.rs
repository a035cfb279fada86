/// Row Set Module
///
/// A row set holds one query result plus the ordered list of destinations its
/// columns are written into. The protocol is: bind once per expected column in
/// SELECT order, query, then call [`RowSet::get_next`] until it reports
/// [`Fetch::End`].
///
/// ## States
///
/// `Unbound` → `Bound` → `Querying` → `Exhausted`, back to `Querying` on a new
/// query, or `Closed` after [`RowSet::quit_query`] or a failed re-query. Only
/// [`RowSet::clear_bindings`] makes a queried row set bindable again.
use super::binding::{BoundField, FieldBindings, FieldType, Target};
use super::connection::Connection;
use super::driver::NativeCursor;
use crate::core::error::{ErrorCode, Result};
use tracing::{debug, trace};

/// Where a row set is in its bind/query/fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSetState {
    /// No fields bound yet
    Unbound,
    /// At least one field bound, no result attached
    Bound,
    /// A result is attached and rows may remain
    Querying,
    /// The result was read to the end and released
    Exhausted,
    /// The result was released early
    Closed,
}

/// Outcome of one [`RowSet::get_next`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// A row was read; `converted` fields received a non-NULL value.
    Row { converted: usize },
    /// No more rows.
    End,
}

impl Fetch {
    pub fn is_row(&self) -> bool {
        matches!(self, Fetch::Row { .. })
    }

    /// Number of non-NULL fields, `0` at the end of the result.
    pub fn converted(&self) -> usize {
        match self {
            Fetch::Row { converted } => *converted,
            Fetch::End => 0,
        }
    }
}

/// One query result bound to caller-owned storage.
///
/// `'c` is the borrow of the connection and `'a` the borrow of the bound
/// destinations.
pub struct RowSet<'c, 'a> {
    conn: &'c Connection,
    bindings: FieldBindings<'a>,
    cursor: Option<Box<dyn NativeCursor>>,
    query: String,
    columns: usize,
    rows: Option<u64>,
    position: u64,
    queried: bool,
    state: RowSetState,
}

impl std::fmt::Debug for RowSet<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowSet")
            .field("state", &self.state)
            .field("fields", &self.bindings.len())
            .field("query", &self.query)
            .field("position", &self.position)
            .field("rows", &self.rows)
            .finish()
    }
}

impl<'c, 'a> RowSet<'c, 'a> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        RowSet {
            conn,
            bindings: FieldBindings::new(),
            cursor: None,
            query: String::new(),
            columns: 0,
            rows: None,
            position: 0,
            queried: false,
            state: RowSetState::Unbound,
        }
    }

    /// Appends a destination for the next result column.
    pub fn bind<T: Into<Target<'a>>>(&mut self, field_type: FieldType, target: T) -> Result<()> {
        if !matches!(self.state, RowSetState::Unbound | RowSetState::Bound) {
            return Err(self.conn.fail(ErrorCode::BindAfterQuery));
        }
        let field = BoundField::new(field_type, target.into())
            .ok_or_else(|| self.conn.fail(ErrorCode::UnsupportedConversion))?;
        self.bindings.push(field);
        self.state = RowSetState::Bound;
        self.conn.succeed();
        Ok(())
    }

    /// Like [`bind`](Self::bind), with the type given by its numeric tag.
    pub fn bind_tag<T: Into<Target<'a>>>(&mut self, tag: i16, target: T) -> Result<()> {
        match FieldType::from_tag(tag) {
            Some(field_type) => self.bind(field_type, target),
            None => Err(self.conn.fail(ErrorCode::UnsupportedConversion)),
        }
    }

    /// Runs `sql` and attaches its result.
    pub fn query(&mut self, sql: &str) -> Result<()> {
        if self.bindings.is_empty() {
            return Err(self.conn.fail(ErrorCode::MissingBindings));
        }
        if sql.trim().is_empty() {
            return Err(self.conn.fail(ErrorCode::QueryFailure));
        }
        self.release();
        self.reset_counters();
        self.query = sql.to_string();
        debug!(sql = %sql, fields = self.bindings.len(), "Running row set query");

        match self.conn.open_cursor(sql) {
            Ok(cursor) => {
                self.columns = cursor.column_count();
                self.rows = cursor.row_count();
                self.cursor = Some(cursor);
                self.queried = true;
                self.state = RowSetState::Querying;
                self.conn.succeed();
                Ok(())
            }
            Err(e) => {
                self.state = if self.queried {
                    RowSetState::Closed
                } else {
                    RowSetState::Bound
                };
                Err(e)
            }
        }
    }

    /// Reads the next row into the bound destinations.
    ///
    /// Fields are filled in binding order up to the smaller of the bound field
    /// count and the result column count. Once the end is reached the result is
    /// released, and further calls return [`Fetch::End`] without touching any
    /// destination.
    pub fn get_next(&mut self) -> Result<Fetch> {
        if self.state != RowSetState::Querying {
            return Ok(Fetch::End);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            self.state = RowSetState::Exhausted;
            return Ok(Fetch::End);
        };

        match cursor.fetch() {
            Ok(true) => {}
            Ok(false) => {
                trace!(rows = self.position, "Row set exhausted");
                self.release();
                self.state = RowSetState::Exhausted;
                return Ok(Fetch::End);
            }
            Err(e) => {
                self.release();
                self.state = RowSetState::Exhausted;
                return Err(self.conn.fail_native(ErrorCode::FetchFailure, e));
            }
        }

        self.position += 1;
        let ctx = self.conn.decode_context();
        let limit = self.bindings.len().min(cursor.column_count());
        let mut converted = 0;
        for (index, field) in self.bindings.iter().take(limit).enumerate() {
            if field.assign(cursor.column(index), &ctx) {
                converted += 1;
            }
        }
        self.conn.succeed();
        Ok(Fetch::Row { converted })
    }

    /// Releases the result before it is read to the end. Idempotent.
    pub fn quit_query(&mut self) {
        self.release();
        self.reset_counters();
        if matches!(self.state, RowSetState::Querying | RowSetState::Exhausted) {
            self.state = RowSetState::Closed;
        }
    }

    /// Releases the result and forgets every binding.
    pub fn clear_bindings(&mut self) {
        self.release();
        self.reset_counters();
        self.query.clear();
        self.bindings.clear();
        self.queried = false;
        self.state = RowSetState::Unbound;
    }

    /// Number of bound fields.
    pub fn field_count(&self) -> usize {
        self.bindings.len()
    }

    /// Number of columns in the attached result.
    pub fn column_count(&self) -> usize {
        self.columns
    }

    /// Total rows of the result, when the backend reports it up front.
    pub fn row_count(&self) -> Option<u64> {
        self.rows
    }

    /// Rows read so far from the current result.
    pub fn current_row(&self) -> u64 {
        self.position
    }

    pub fn query_text(&self) -> &str {
        &self.query
    }

    pub fn state(&self) -> RowSetState {
        self.state
    }

    pub fn is_result_cleared(&self) -> bool {
        self.cursor.is_none()
    }

    fn release(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
            trace!("Released native result");
        }
    }

    fn reset_counters(&mut self) {
        self.columns = 0;
        self.rows = None;
        self.position = 0;
    }
}

impl Drop for RowSet<'_, '_> {
    fn drop(&mut self) {
        self.release();
    }
}
