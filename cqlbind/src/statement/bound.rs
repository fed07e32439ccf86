//! Statements with their values bound, ready to be executed.

use std::borrow::Cow;

use bytes::Bytes;
use cqlbind_cql::frame::request::execute::Execute;
use cqlbind_cql::frame::request::query::QueryParameters;
use cqlbind_cql::frame::types::RawValue;
use cqlbind_cql::serialize::row::SerializedValues;
use tracing::trace;

use super::prepared::PreparedStatement;
use super::values::BindValue;
use super::{Consistency, CustomPayload, PageSize, PagingState, SerialConsistency, StatementConfig};
use crate::client::execution_profile::ExecutionProfileHandle;
use crate::errors::BindError;
use crate::routing::partitioner::Partitioner;
use crate::routing::{Routing, Token};

/// A prepared statement with all of its values bound.
///
/// Immutable: obtain a [`BoundStatementBuilder`] with
/// [`into_builder`](BoundStatement::into_builder) to derive a modified copy.
/// The routing of the statement is decided when it is built.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    prepared: PreparedStatement,
    values: SerializedValues,
    config: StatementConfig,
    routing: Routing,
}

impl BoundStatement {
    /// The statement the values were bound to.
    pub fn prepared(&self) -> &PreparedStatement {
        &self.prepared
    }

    /// Encoded values, one per bind marker.
    pub fn values(&self) -> &SerializedValues {
        &self.values
    }

    /// Encoded value at position `index`.
    pub fn value(&self, index: usize) -> Option<RawValue<'_>> {
        self.values.get(index)
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    /// The routing key: explicit, or derived from the bound partition key.
    pub fn routing_key(&self) -> Option<&Bytes> {
        self.routing.key()
    }

    /// The token the statement is routed by: the explicit one, or the
    /// routing key hashed with the statement's partitioner.
    pub fn token(&self) -> Option<Token> {
        match &self.routing {
            Routing::Key(key) => Some(self.prepared.get_partitioner_name().hash_one(key)),
            Routing::Token(token) => Some(*token),
            Routing::Unrouted => None,
        }
    }

    /// Keyspace used for routing: the explicit one, then the keyspace of
    /// the table the statement operates on.
    pub fn get_routing_keyspace(&self) -> Option<&str> {
        self.config.routing_keyspace.as_deref().or_else(|| {
            self.prepared
                .get_table_spec()
                .map(|table_spec| table_spec.ks_name())
        })
    }

    /// Whether the statement may be retried or speculatively executed.
    /// Unknown idempotence counts as not idempotent.
    pub fn is_idempotent(&self) -> bool {
        self.config.is_idempotent == Some(true)
    }

    pub fn get_is_idempotent(&self) -> Option<bool> {
        self.config.is_idempotent
    }

    pub fn get_tracing(&self) -> bool {
        self.config.tracing
    }

    pub fn get_timestamp(&self) -> Option<i64> {
        self.config.timestamp
    }

    pub fn get_page_size(&self) -> Option<PageSize> {
        self.config.page_size
    }

    /// The page size requests are sent with: the statement's own, then the one
    /// of its execution profile, then the default.
    pub fn effective_page_size(&self) -> PageSize {
        self.config.determine_page_size()
    }

    pub fn get_paging_state(&self) -> &PagingState {
        &self.config.paging_state
    }

    pub fn get_serial_consistency(&self) -> Option<SerialConsistency> {
        self.config.serial_consistency
    }

    pub fn get_custom_payload(&self) -> &CustomPayload {
        &self.config.custom_payload
    }

    pub fn get_execution_profile_handle(&self) -> Option<&ExecutionProfileHandle> {
        self.config.execution_profile_handle.as_ref()
    }

    /// Builds the EXECUTE request body.
    ///
    /// The result metadata id is read from the prepared statement now, so a
    /// statement bound before a metadata change is executed with the new id.
    pub fn to_execute(&self, consistency: Consistency) -> Execute<'_> {
        let result_metadata = self.prepared.get_result_metadata();
        let version = self.prepared.get_protocol_version();

        Execute {
            id: self.prepared.get_id().clone(),
            result_metadata_id: result_metadata.id().cloned(),
            parameters: QueryParameters {
                consistency,
                serial_consistency: self.config.serial_consistency,
                timestamp: self.config.timestamp,
                page_size: Some(self.effective_page_size().inner()),
                paging_state: self.config.paging_state.clone(),
                skip_metadata: version.supports_result_metadata_id(),
                values: Cow::Borrowed(&self.values),
            },
        }
    }

    /// Turns the statement back into a builder, keeping values and settings.
    pub fn into_builder(self) -> BoundStatementBuilder {
        BoundStatementBuilder {
            prepared: self.prepared,
            values: self.values,
            config: self.config,
        }
    }
}

/// Collects the settings of a statement being bound.
///
/// Starts from the values given to
/// [`bound_statement_builder`](PreparedStatement::bound_statement_builder) and the
/// defaults of the prepared statement. Values can be replaced one by one;
/// a replacement that fails leaves the builder unchanged.
#[derive(Debug, Clone)]
pub struct BoundStatementBuilder {
    prepared: PreparedStatement,
    values: SerializedValues,
    config: StatementConfig,
}

impl BoundStatementBuilder {
    pub(crate) fn new(prepared: PreparedStatement, values: SerializedValues) -> Self {
        let config = prepared.config().clone();
        Self {
            prepared,
            values,
            config,
        }
    }

    /// Replaces the value bound at position `index`.
    pub fn set_value(&mut self, index: usize, value: impl Into<BindValue>) -> Result<(), BindError> {
        self.values = self
            .prepared
            .encoder()
            .replace_cell(&self.values, index, &value.into())?;
        Ok(())
    }

    /// Replaces the value bound to the marker called `name`.
    /// If several markers share the name, the first one is replaced.
    pub fn set_value_by_name(
        &mut self,
        name: &str,
        value: impl Into<BindValue>,
    ) -> Result<(), BindError> {
        let index = self.prepared.encoder().position_of(name)?;
        self.set_value(index, value)
    }

    /// Leaves the value at position `index` unset.
    pub fn unset(&mut self, index: usize) -> Result<(), BindError> {
        self.set_value(index, BindValue::Unset)
    }

    /// Associates the statement with execution profile referred by the provided handle.
    pub fn execution_profile_handle(mut self, handle: Option<ExecutionProfileHandle>) -> Self {
        self.config.execution_profile_handle = handle;
        self
    }

    /// Page size of the request. `None` falls back to the execution profile.
    pub fn page_size(mut self, page_size: Option<PageSize>) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Resumes paging from the given state.
    pub fn paging_state(mut self, paging_state: PagingState) -> Self {
        self.config.paging_state = paging_state;
        self
    }

    pub fn routing_keyspace(mut self, keyspace: Option<String>) -> Self {
        self.config.routing_keyspace = keyspace;
        self
    }

    /// Routes the statement by this key, whatever values are bound.
    pub fn routing_key(mut self, key: Option<Bytes>) -> Self {
        self.config.routing_key = key;
        self
    }

    /// Routes the statement by this token unless a routing key is set.
    pub fn routing_token(mut self, token: Option<Token>) -> Self {
        self.config.routing_token = token;
        self
    }

    pub fn custom_payload(mut self, custom_payload: CustomPayload) -> Self {
        self.config.custom_payload = custom_payload;
        self
    }

    /// Sets the idempotence of this statement. `None` means unknown.
    pub fn is_idempotent(mut self, is_idempotent: Option<bool>) -> Self {
        self.config.is_idempotent = is_idempotent;
        self
    }

    /// Enable or disable CQL Tracing for this statement.
    pub fn tracing(mut self, should_trace: bool) -> Self {
        self.config.tracing = should_trace;
        self
    }

    /// Sets the default timestamp for this statement in microseconds.
    /// `None` lets the server assign one.
    pub fn timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.config.timestamp = timestamp;
        self
    }

    pub fn serial_consistency(mut self, sc: Option<SerialConsistency>) -> Self {
        self.config.serial_consistency = sc;
        self
    }

    /// Freezes the statement, deciding how it is routed.
    pub fn build(self) -> BoundStatement {
        let routing = self.determine_routing();
        trace!(
            statement_id = ?self.prepared.get_id(),
            ?routing,
            "Bound statement built"
        );
        BoundStatement {
            prepared: self.prepared,
            values: self.values,
            config: self.config,
            routing,
        }
    }

    fn determine_routing(&self) -> Routing {
        if let Some(key) = &self.config.routing_key {
            return Routing::Key(key.clone());
        }
        if let Some(token) = self.config.routing_token {
            return Routing::Token(token);
        }
        match self.prepared.derive_routing_key(&self.values) {
            Some(key) => Routing::Key(key),
            None => Routing::Unrouted,
        }
    }
}

#[cfg(test)]
#[path = "bound_tests.rs"]
mod tests;
