/// Core Module for rowbind
///
/// This module contains the backend-independent components: the row set
/// protocol, error codes, numeric locale handling and the string cleaning
/// scratch buffer.

pub mod db;
pub mod error;
pub mod locale;
pub mod scratch;

// Re-export commonly used types for convenience
pub use error::{DbError, ErrorCode, Result};
