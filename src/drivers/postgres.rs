//! PostgreSQL driver over the synchronous `postgres` client.
//!
//! Queries go through the simple query protocol, so every value arrives as
//! text and the whole result is materialized before the first fetch.
use crate::core::db::connection::ConnectParams;
use crate::core::db::decode::{FieldDecoder, LetterBoolDecoder};
use crate::core::db::driver::{BufferedCursor, Driver, NativeCursor, NativeRow, NativeSession};
use crate::core::db::features::{Feature, FeatureSet};
use crate::core::error::NativeError;
use crate::drivers::Backend;
use postgres::error::SqlState;
use postgres::{Client, NoTls, SimpleQueryMessage};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct PostgresDriver {
    decoder: LetterBoolDecoder,
}

impl PostgresDriver {
    pub fn new() -> Self {
        PostgresDriver::default()
    }
}

impl Driver for PostgresDriver {
    fn backend(&self) -> Backend {
        Backend::Postgres
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
        let mut config = postgres::Config::new();
        config.host(&params.server).dbname(&params.database);
        if !params.user.is_empty() {
            config.user(&params.user);
        }
        if !params.password.is_empty() {
            config.password(&params.password);
        }
        if params.port != 0 {
            config.port(params.port);
        }
        if let Some(timeout) = params.connect_timeout {
            config.connect_timeout(timeout);
        }
        config.notice_callback(|notice| warn!(severity = %notice.severity(), "{}", notice.message()));

        let client = config.connect(NoTls)?;
        debug!(server = %params.server, database = %params.database, "Opened PostgreSQL session");
        Ok(Box::new(PostgresSession { client }))
    }
}

struct PostgresSession {
    client: Client,
}

impl NativeSession for PostgresSession {
    fn query(&mut self, sql: &str) -> Result<Box<dyn NativeCursor>, NativeError> {
        let mut columns = 0;
        let mut rows: Vec<NativeRow> = Vec::new();
        for message in self.client.simple_query(sql)? {
            if let SimpleQueryMessage::Row(row) = message {
                columns = row.len();
                rows.push(
                    (0..row.len())
                        .map(|index| row.get(index).map(|text| text.as_bytes().to_vec()))
                        .collect(),
                );
            }
        }
        Ok(Box::new(BufferedCursor::new(columns, rows)))
    }

    fn execute(&mut self, sql: &str) -> Result<u64, NativeError> {
        let mut affected = 0;
        for message in self.client.simple_query(sql)? {
            if let SimpleQueryMessage::CommandComplete(count) = message {
                affected = count;
            }
        }
        Ok(affected)
    }

    fn batch(&mut self, sql: &str) -> Result<(), NativeError> {
        Ok(self.client.batch_execute(sql)?)
    }

    fn last_insert_id(&mut self) -> Result<Option<u64>, NativeError> {
        match self.client.query_one("SELECT lastval()", &[]) {
            Ok(row) => Ok(u64::try_from(row.get::<_, i64>(0)).ok()),
            Err(e) if e.code() == Some(&SqlState::OBJECT_NOT_IN_PREREQUISITE_STATE) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn ping(&mut self) -> bool {
        self.client.is_valid(Duration::from_secs(5)).is_ok()
    }

    fn close(self: Box<Self>) -> Result<(), NativeError> {
        Ok(self.client.close()?)
    }
}
