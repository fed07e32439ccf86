//! Pieces shared between a prepared statement and the session executing it.

pub mod execution_profile;

pub mod prepared_cache;
pub use prepared_cache::PreparedStatementCache;
