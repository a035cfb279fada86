//! ODBC driver over `odbc-api`, also used to reach SQL Server.
//!
//! The ODBC environment is process-wide and created on first use. For plain
//! ODBC the database identifier is a DSN, or a full connection string when it
//! contains `=`.
use crate::core::db::connection::ConnectParams;
use crate::core::db::decode::FieldDecoder;
use crate::core::db::driver::{Driver, NativeCursor, NativeRow, NativeSession};
use crate::core::db::features::{Feature, FeatureSet};
use crate::core::db::stream::{ClientSlot, RowSink};
use crate::core::error::NativeError;
use crate::drivers::Backend;
use once_cell::sync::OnceCell;
use odbc_api::{ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use tracing::debug;

static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

fn environment() -> Result<&'static Environment, odbc_api::Error> {
    ENVIRONMENT.get_or_try_init(Environment::new)
}

/// ODBC drivers disagree on how they render booleans.
#[derive(Debug, Default)]
pub struct OdbcDecoder;

impl FieldDecoder for OdbcDecoder {
    fn true_literal(&self) -> u8 {
        b't'
    }

    fn decode_bool(&self, raw: &[u8]) -> bool {
        matches!(raw.first(), Some(b't' | b'T' | b'1'))
    }
}

#[derive(Debug)]
pub struct OdbcDriver {
    backend: Backend,
    decoder: OdbcDecoder,
}

impl OdbcDriver {
    pub fn new(backend: Backend) -> Self {
        OdbcDriver {
            backend,
            decoder: OdbcDecoder,
        }
    }

    fn connection_string(&self, params: &ConnectParams) -> String {
        if self.backend == Backend::MsSql {
            let server = if params.port != 0 {
                format!("{},{}", params.server, params.port)
            } else {
                params.server.clone()
            };
            return format!(
                "Driver={{ODBC Driver 18 for SQL Server}};Server={};Database={};UID={};PWD={};TrustServerCertificate=yes;",
                server, params.database, params.user, params.password
            );
        }
        if params.database.contains('=') {
            params.database.clone()
        } else {
            format!(
                "DSN={};UID={};PWD={};",
                params.database, params.user, params.password
            )
        }
    }
}

impl Driver for OdbcDriver {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Cursor, Feature::Transactions, Feature::AutoTrim])
    }

    fn default_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Transactions])
    }

    fn decoder(&self) -> &dyn FieldDecoder {
        &self.decoder
    }

    fn requires_server(&self) -> bool {
        self.backend == Backend::MsSql
    }

    fn init(&self) -> Result<(), NativeError> {
        environment()?;
        Ok(())
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn NativeSession>, NativeError> {
        let options = ConnectionOptions {
            login_timeout_sec: params.connect_timeout.map(|t| t.as_secs() as u32),
            ..ConnectionOptions::default()
        };
        let conn = environment()?.connect_with_connection_string(&self.connection_string(params), options)?;
        debug!(backend = %self.backend, database = %params.database, "Opened ODBC session");
        Ok(Box::new(OdbcSession {
            backend: self.backend,
            slot: ClientSlot::new(conn),
        }))
    }
}

struct OdbcSession {
    backend: Backend,
    slot: ClientSlot<odbc_api::Connection<'static>>,
}

fn stream_rows(conn: &mut odbc_api::Connection<'static>, sql: &str, sink: &mut RowSink) -> Result<(), NativeError> {
    let Some(mut cursor) = conn.execute(sql, (), None)? else {
        return Ok(());
    };
    let columns = cursor.num_result_cols()?.max(0) as usize;
    sink.start(columns);
    let mut buf = Vec::new();
    while sink.wants_row() {
        let Some(mut row) = cursor.next_row()? else {
            break;
        };
        let mut values: NativeRow = Vec::with_capacity(columns);
        for index in 1..=columns {
            buf.clear();
            let present = row.get_text(index as u16, &mut buf)?;
            values.push(present.then(|| buf.clone()));
        }
        sink.push(values);
    }
    Ok(())
}

impl NativeSession for OdbcSession {
    fn query(&mut self, sql: &str) -> Result<Box<dyn NativeCursor>, NativeError> {
        self.slot.stream(sql, stream_rows)
    }

    fn execute(&mut self, sql: &str) -> Result<u64, NativeError> {
        let mut statement = self.slot.client()?.preallocate()?;
        statement.execute(sql, ())?;
        Ok(statement.row_count()?.unwrap_or(0) as u64)
    }

    fn batch(&mut self, sql: &str) -> Result<(), NativeError> {
        self.slot.client()?.execute(sql, (), None)?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), NativeError> {
        Ok(self.slot.client()?.set_autocommit(false)?)
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        let conn = self.slot.client()?;
        conn.commit()?;
        Ok(conn.set_autocommit(true)?)
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        let conn = self.slot.client()?;
        conn.rollback()?;
        Ok(conn.set_autocommit(true)?)
    }

    fn last_insert_id(&mut self) -> Result<Option<u64>, NativeError> {
        if self.backend != Backend::MsSql {
            return Ok(None);
        }
        let mut cursor = self.query("SELECT CAST(@@IDENTITY AS BIGINT)")?;
        if !cursor.fetch()? {
            return Ok(None);
        }
        let id = cursor
            .column(0)
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .and_then(|text| text.trim().parse::<u64>().ok());
        cursor.close();
        Ok(id)
    }

    fn ping(&mut self) -> bool {
        match self.slot.client() {
            Ok(conn) => conn.is_dead().map(|dead| !dead).unwrap_or(false),
            Err(_) => false,
        }
    }

    fn close(self: Box<Self>) -> Result<(), NativeError> {
        drop(self.slot.into_client());
        Ok(())
    }
}
