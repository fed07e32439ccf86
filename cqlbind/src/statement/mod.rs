//! Prepared statements and the statements bound from them.
//!
//! A [`PreparedStatement`](prepared::PreparedStatement) is created once per
//! PREPARE response and shared. [`bind`](prepared::PreparedStatement::bind)
//! encodes values against its variable metadata and produces an immutable
//! [`BoundStatement`](bound::BoundStatement), ready to be executed.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;

use crate::client::execution_profile::ExecutionProfileHandle;
use crate::routing::Token;

pub mod bound;
pub mod prepared;
pub mod reprepare;
pub mod values;

pub use cqlbind_cql::frame::request::query::PagingState;
pub use cqlbind_cql::frame::types::{Consistency, SerialConsistency};

/// Custom payload sent along with a request, in the `[bytes map]` format.
pub type CustomPayload = HashMap<String, Bytes>;

/// Defaults a prepared statement hands to every statement bound from it.
/// A bound statement starts from a copy and may override each of them.
#[derive(Debug, Clone, Default)]
pub(crate) struct StatementConfig {
    pub(crate) execution_profile_handle: Option<ExecutionProfileHandle>,

    pub(crate) paging_state: PagingState,
    pub(crate) page_size: Option<PageSize>,

    pub(crate) routing_keyspace: Option<String>,
    pub(crate) routing_key: Option<Bytes>,
    pub(crate) routing_token: Option<Token>,

    pub(crate) custom_payload: CustomPayload,

    pub(crate) serial_consistency: Option<SerialConsistency>,
    pub(crate) is_idempotent: Option<bool>,
    pub(crate) tracing: bool,
    pub(crate) timestamp: Option<i64>,
}

impl StatementConfig {
    /// Determines the page size of a request: the statement's own, then the
    /// one of its execution profile, then the default.
    #[must_use]
    pub(crate) fn determine_page_size(&self) -> PageSize {
        self.page_size
            .or_else(|| {
                self.execution_profile_handle
                    .as_ref()
                    .map(|handle| handle.access().page_size)
            })
            .unwrap_or_default()
    }
}

/// A page size of a paged request. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageSize(i32);

impl PageSize {
    /// Default page size, used when neither the statement nor its
    /// execution profile sets one.
    pub const DEFAULT: PageSize = PageSize(5000);

    /// Creates a new page size, failing for non-positive values.
    #[inline]
    pub fn new(size: i32) -> Result<Self, InvalidPageSize> {
        if size > 0 {
            Ok(Self(size))
        } else {
            Err(InvalidPageSize(size))
        }
    }

    /// Returns the page size as the protocol carries it.
    #[inline]
    pub fn inner(&self) -> i32 {
        self.0
    }
}

impl Default for PageSize {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i32> for PageSize {
    type Error = InvalidPageSize;

    #[inline]
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PageSize> for i32 {
    #[inline]
    fn from(page_size: PageSize) -> Self {
        page_size.inner()
    }
}

/// A page size was not positive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Invalid page size provided: {0}; valid values are [1, i32::MAX]")]
pub struct InvalidPageSize(pub i32);
