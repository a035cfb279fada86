//! Firebird driver over `rsfbclient` with its pure Rust wire client.
//!
//! Rows are fetched from the server one per fetch.
use crate::core::db::connection::ConnectParams;
use crate::core::db::decode::{FieldDecoder, NumericBoolDecoder};
use crate::core::db::driver::{Driver, NativeCursor, NativeRow, NativeSession};
use crate::core::db::features::{Feature, FeatureSet};
use crate::core::db::stream::{ClientSlot, RowSink};
use crate::core::error::NativeError;
use crate::drivers::Backend;
use rsfbclient::{Execute, Queryable, Row, SqlType};
use rsfbclient_core::FirebirdClient;
use tracing::debug;

#[derive(Debug, Default)]
pub struct FirebirdDriver {
    decoder: NumericBoolDecoder,
}

impl FirebirdDriver {
    pub fn new() -> Self {
        FirebirdDriver::default()
    }
}

impl Driver for FirebirdDriver {
    fn backend(&self) -> Backend {
        Backend::Firebird
    }

    fn supported_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Transactions, Feature::AutoTrim])
    }

    fn default_features(&self) -> FeatureSet {
        FeatureSet::of(&[Feature::Transactions, Feature::AutoTrim])
    }

    fn decoder(&self) -> &dyn FieldDecoder {
        &self.decoder
    }

    fn open(&self, params: &ConnectParams) -> Result<Box<dyn NativeSession>, NativeError> {
        let mut builder = rsfbclient::builder_pure_rust();
        builder
            .host(&params.server)
            .db_name(&params.database)
            .user(&params.user)
            .pass(&params.password);
        if params.port != 0 {
            builder.port(params.port);
        }
        let conn = builder.connect()?;
        debug!(server = %params.server, database = %params.database, "Opened Firebird session");
        Ok(Box::new(FirebirdSession {
            slot: ClientSlot::new(conn),
        }))
    }
}

struct FirebirdSession<C: FirebirdClient + Send + 'static> {
    slot: ClientSlot<rsfbclient::Connection<C>>,
}

/// Renders a Firebird value as the text the row set decodes.
fn value_text(value: &SqlType) -> Option<Vec<u8>> {
    let text = match value {
        SqlType::Null => return None,
        SqlType::Text(text) => text.clone(),
        SqlType::Binary(bytes) => return Some(bytes.clone()),
        SqlType::Integer(i) => i.to_string(),
        SqlType::Floating(f) => f.to_string(),
        SqlType::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        SqlType::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
    };
    Some(text.into_bytes())
}

fn stream_rows<C: FirebirdClient>(
    conn: &mut rsfbclient::Connection<C>,
    sql: &str,
    sink: &mut RowSink,
) -> Result<(), NativeError> {
    let mut rows = conn.query_iter::<(), Row>(sql, ())?;
    // The wire client only describes columns alongside the first row.
    let first = rows.next().transpose()?;
    sink.start(first.as_ref().map(|row| row.cols.len()).unwrap_or(0));
    let mut pending = first;
    while sink.wants_row() {
        let row = match pending.take() {
            Some(row) => row,
            None => match rows.next() {
                Some(row) => row?,
                None => break,
            },
        };
        sink.push(row.cols.iter().map(|col| value_text(&col.value)).collect::<NativeRow>());
    }
    Ok(())
}

impl<C: FirebirdClient + Send + 'static> NativeSession for FirebirdSession<C> {
    fn query(&mut self, sql: &str) -> Result<Box<dyn NativeCursor>, NativeError> {
        self.slot.stream(sql, stream_rows::<C>)
    }

    fn execute(&mut self, sql: &str) -> Result<u64, NativeError> {
        Ok(self.slot.client()?.execute(sql, ())? as u64)
    }

    fn batch(&mut self, sql: &str) -> Result<(), NativeError> {
        self.slot.client()?.execute(sql, ())?;
        Ok(())
    }

    fn begin(&mut self) -> Result<(), NativeError> {
        Ok(self.slot.client()?.begin_transaction()?)
    }

    fn commit(&mut self) -> Result<(), NativeError> {
        Ok(self.slot.client()?.commit()?)
    }

    fn rollback(&mut self) -> Result<(), NativeError> {
        Ok(self.slot.client()?.rollback()?)
    }

    fn last_insert_id(&mut self) -> Result<Option<u64>, NativeError> {
        Ok(None)
    }

    fn ping(&mut self) -> bool {
        let Ok(conn) = self.slot.client() else {
            return false;
        };
        let ping: Result<Vec<(i32,)>, _> = conn.query("SELECT 1 FROM RDB$DATABASE", ());
        ping.is_ok()
    }

    fn close(self: Box<Self>) -> Result<(), NativeError> {
        match self.slot.into_client() {
            Some(conn) => Ok(conn.close()?),
            None => Ok(()),
        }
    }
}
