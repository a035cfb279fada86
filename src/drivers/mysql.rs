//! MySQL and MariaDB driver over the synchronous `mysql` client.
//!
//! Results are read over the text protocol, one row per fetch, so the cursor
//! does not report a row count up front. The connection cannot run another
//! statement until a result is read to the end; using the session while a
//! result is open reads the remaining rows into that result's backlog.
use crate::core::db::connection::ConnectParams;
use crate::core::db::decode::{FieldDecoder, NumericBoolDecoder};
use crate::core::db::driver::{Driver, NativeCursor, NativeRow, NativeSession};
use crate::core::db::features::{Feature, FeatureSet};
use crate::core::db::stream::{ClientSlot, RowSink};
use crate::core::error::NativeError;
use crate::drivers::Backend;
use mysql::prelude::Queryable;
use mysql::{Conn, OptsBuilder, Value};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MySqlDriver {
    decoder: NumericBoolDecoder,
}

impl MySqlDriver {
    pub fn new() -> Self {
        MySqlDriver::default()
    }
}

impl Driver for MySqlDriver {
    fn backend(&self) -> Backend {
        Backend::MySql
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Transactions, Feature::AutoTrim])
    }

    fn default_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Transactions])
    }

    fn decoder(&self) -> &dyn FieldDecoder {
        &self.decoder
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn NativeSession>, NativeError> {
        let mut opts = OptsBuilder::new()
            .ip_or_hostname(Some(params.server.as_str()))
            .db_name(Some(params.database.as_str()))
            .user((!params.user.is_empty()).then_some(params.user.as_str()))
            .pass((!params.password.is_empty()).then_some(params.password.as_str()))
            .tcp_connect_timeout(params.connect_timeout);
        if params.port != 0 {
            opts = opts.tcp_port(params.port);
        }
        let conn = Conn::new(opts)?;
        debug!(server = %params.server, database = %params.database, "Opened MySQL session");
        Ok(Box::new(MySqlSession {
            slot: ClientSlot::new(conn),
        }))
    }
}

struct MySqlSession {
    slot: ClientSlot<Conn>,
}

/// Renders a MySQL value as the text the row set decodes.
fn value_text(value: &Value) -> Option<Vec<u8>> {
    let text = match value {
        Value::NULL => return None,
        Value::Bytes(bytes) => return Some(bytes.clone()),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Date(year, month, day, hour, minute, second, _) => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hour, minute, second
        ),
        Value::Time(negative, days, hours, minutes, seconds, _) => format!(
            "{}{:02}:{:02}:{:02}",
            if *negative { "-" } else { "" },
            *days * 24 + u32::from(*hours),
            minutes,
            seconds
        ),
    };
    Some(text.into_bytes())
}

fn stream_rows(conn: &mut Conn, sql: &str, sink: &mut RowSink) -> Result<(), NativeError> {
    let mut result = conn.query_iter(sql)?;
    let columns = result.columns().as_ref().len();
    sink.start(columns);
    while sink.wants_row() {
        let Some(row) = result.next() else {
            break;
        };
        let row = row?;
        let values: NativeRow = (0..row.len())
            .map(|index| row.as_ref(index).and_then(value_text))
            .collect();
        sink.push(values);
    }
    Ok(())
}

impl NativeSession for MySqlSession {
    fn query(&mut self, sql: &str) -> Result<Box<dyn NativeCursor>, NativeError> {
        self.slot.stream(sql, stream_rows)
    }

    fn execute(&mut self, sql: &str) -> Result<u64, NativeError> {
        let conn = self.slot.client()?;
        conn.query_drop(sql)?;
        Ok(conn.affected_rows())
    }

    fn batch(&mut self, sql: &str) -> Result<(), NativeError> {
        Ok(self.slot.client()?.query_drop(sql)?)
    }

    fn begin(&mut self) -> Result<(), NativeError> {
        self.batch("START TRANSACTION")
    }

    fn last_insert_id(&mut self) -> Result<Option<u64>, NativeError> {
        let id = self.slot.client()?.last_insert_id();
        Ok((id > 0).then_some(id))
    }

    fn ping(&mut self) -> bool {
        match self.slot.client() {
            Ok(conn) => conn.query_drop("SELECT 1").is_ok(),
            Err(_) => false,
        }
    }

    fn close(self: Box<Self>) -> Result<(), NativeError> {
        drop(self.slot.into_client());
        Ok(())
    }
}
