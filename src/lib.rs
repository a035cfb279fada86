// Core infrastructure modules
pub mod core;

// Backend adapters and configuration
pub mod config;
pub mod drivers;

pub use crate::core::db::{
    ConnectParams, Connection, Feature, Fetch, FieldType, RowSet, RowSetState, Target, Timestamp,
};
pub use crate::core::{DbError, ErrorCode, Result};
pub use crate::drivers::Backend;

#[cfg(test)]
mod test_utils;
