//! SQLite driver over the bundled `rusqlite` library.
//!
//! The database identifier is a file path, or `:memory:`. No server is
//! involved, so the server name may be left empty. Results are stepped one
//! row per fetch, so errors raised while stepping surface as fetch errors.
use crate::core::db::connection::ConnectParams;
use crate::core::db::decode::{FieldDecoder, NumericBoolDecoder};
use crate::core::db::driver::{Driver, NativeCursor, NativeRow, NativeSession};
use crate::core::db::features::{Feature, FeatureSet};
use crate::core::db::stream::{ClientSlot, RowSink};
use crate::core::error::NativeError;
use crate::drivers::Backend;
use rusqlite::types::ValueRef;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn backend(&self) -> Backend {
        Backend::Sqlite
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

    fn requires_server(&self) -> bool {
        false
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn NativeSession>, NativeError> {
        let conn = rusqlite::Connection::open(&params.database)?;
        if let Some(timeout) = params.connect_timeout {
            conn.busy_timeout(timeout)?;
        }
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!(path = %params.database, "Opened SQLite database");
        Ok(Box::new(SqliteSession {
            slot: ClientSlot::new(conn),
        }))
    }
}

struct SqliteSession {
    slot: ClientSlot<rusqlite::Connection>,
}

/// Renders a SQLite value as the text the row set decodes.
fn value_text(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
        ValueRef::Text(text) => Some(text.to_vec()),
        ValueRef::Blob(blob) => Some(blob.to_vec()),
    }
}

fn stream_rows(conn: &mut rusqlite::Connection, sql: &str, sink: &mut RowSink) -> Result<(), NativeError> {
    let mut stmt = conn.prepare(sql)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([])?;
    sink.start(columns);
    while sink.wants_row() {
        let Some(row) = rows.next()? else {
            break;
        };
        let mut values: NativeRow = Vec::with_capacity(columns);
        for index in 0..columns {
            values.push(value_text(row.get_ref(index)?));
        }
        sink.push(values);
    }
    Ok(())
}

impl NativeSession for SqliteSession {
    fn query(&mut self, sql: &str) -> Result<Box<dyn NativeCursor>, NativeError> {
        self.slot.stream(sql, stream_rows)
    }

    fn execute(&mut self, sql: &str) -> Result<u64, NativeError> {
        Ok(self.slot.client()?.execute(sql, [])? as u64)
    }

    fn batch(&mut self, sql: &str) -> Result<(), NativeError> {
        Ok(self.slot.client()?.execute_batch(sql)?)
    }

    fn last_insert_id(&mut self) -> Result<Option<u64>, NativeError> {
        let id = self.slot.client()?.last_insert_rowid();
        Ok((id > 0).then_some(id as u64))
    }

    fn ping(&mut self) -> bool {
        match self.slot.client() {
            Ok(conn) => conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok(),
            Err(_) => false,
        }
    }

    fn close(self: Box<Self>) -> Result<(), NativeError> {
        match self.slot.into_client() {
            Some(conn) => conn.close().map_err(|(_, e)| NativeError::Sqlite(e)),
            None => Ok(()),
        }
    }
}
