/// Database Module
///
/// This module provides the backend-independent half of rowbind: connections,
/// row sets and the field binding protocol that connects them to caller-owned
/// storage.
///
/// ## Architecture
///
/// - **Connection** (`connection.rs`): session lifecycle, transactions, scalar helpers
/// - **Row sets** (`rowset.rs`): bind/query/fetch state machine
/// - **Bindings** (`binding.rs`, `decode.rs`): type tags, destinations and text conversion
/// - **Driver boundary** (`driver.rs`): traits each backend adapter implements
/// - **Streaming** (`stream.rs`): lazy cursors over clients lent to a worker thread
///
/// ## Error Handling
///
/// All operations return `DbError` and record the same `ErrorCode` on the
/// connection, retrievable through `Connection::last_error`.
pub mod binding;
pub mod connection;
pub mod decode;
pub mod driver;
pub mod features;
pub mod rowset;
pub mod scalar;
pub mod slot;
pub mod stream;

pub use binding::{FieldType, Target, Timestamp};
pub use connection::{ConnectParams, Connection};
pub use features::{Feature, FeatureSet};
pub use rowset::{Fetch, RowSet, RowSetState};
