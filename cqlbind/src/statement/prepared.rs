//! Defines the [`PreparedStatement`] type, which represents a statement
//! that has been prepared in advance on the server.

use bytes::{BufMut, Bytes, BytesMut};
use cqlbind_cql::codec::CodecRegistry;
use cqlbind_cql::frame::frame_errors::ResultMetadataParseError;
use cqlbind_cql::frame::response::result::{
    deser_prepared, ColumnSpec, PartitionKeyIndex, Prepared, PreparedMetadata, ResultMetadata,
    RowsMetadata, TableSpec,
};
use cqlbind_cql::frame::types::RawValue;
use cqlbind_cql::serialize::row::SerializedValues;
use cqlbind_cql::ProtocolVersion;
use smallvec::{smallvec, SmallVec};
use std::ops::Deref;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::debug;

use arc_swap::ArcSwap;

use super::bound::{BoundStatement, BoundStatementBuilder};
use super::reprepare::RepreparePayload;
use super::values::{BindValues, ValueEncoder};
use super::{CustomPayload, PageSize, PagingState, SerialConsistency, StatementConfig};
use crate::client::execution_profile::ExecutionProfileHandle;
use crate::errors::{BindError, PrepareError};
use crate::routing::partitioner::{
    write_partition_key, Partitioner, PartitionerHasher, PartitionerName,
};
use crate::routing::Token;

/// Represents a statement prepared on the server.
///
/// A prepared statement is built once from a PREPARE response, with
/// [`PreparedStatement::builder`], and then shared by everything that executes it.
/// [`bind`](PreparedStatement::bind) checks the values against the bind markers
/// and produces an immutable [`BoundStatement`].
///
/// # Clone implementation
/// Cloning a prepared statement is a cheap operation. It only
/// requires copying an [Arc] pointer; all clones share the same
/// result metadata.
///
/// # Result metadata
/// The columns the statement returns may change when the schema is altered.
/// The statement keeps them, together with the result metadata id assigned by
/// the server (protocol v5), in a slot that is replaced as a whole with
/// [`set_result_metadata`](PreparedStatement::set_result_metadata). Readers
/// always see a matching id and metadata. Statements bound earlier keep
/// working and pick the new metadata up when they are turned into a request.
///
/// # Statement repreparation
/// When the server forgets the statement, it can be prepared again from the
/// data returned by [`get_reprepare_payload`](PreparedStatement::get_reprepare_payload).
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    inner: Arc<PreparedStatementShared>,
}

#[derive(Debug)]
pub(crate) struct PreparedStatementShared {
    reprepare: RepreparePayload,
    metadata: PreparedMetadata,
    result_metadata: ArcSwap<ResultMetadataSnapshot>,
    config: StatementConfig,
    codecs: Arc<CodecRegistry>,
    protocol_version: ProtocolVersion,
    partitioner_name: PartitionerName,
    is_confirmed_lwt: bool,
}

/// The result metadata id and the result metadata, always read together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMetadataSnapshot {
    id: Option<Bytes>,
    metadata: ResultMetadata,
}

impl ResultMetadataSnapshot {
    /// Id of the result metadata. Only protocol v5 assigns one.
    #[inline]
    pub fn id(&self) -> Option<&Bytes> {
        self.id.as_ref()
    }

    #[inline]
    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    #[inline]
    pub fn col_specs(&self) -> &[ColumnSpec] {
        self.metadata.col_specs()
    }
}

/// Column specs of the statement's result, kept alive by the snapshot they
/// were read from.
#[derive(Debug, Clone)]
pub struct ResultColumnSpecs(Arc<ResultMetadataSnapshot>);

impl Deref for ResultColumnSpecs {
    type Target = [ColumnSpec];

    fn deref(&self) -> &Self::Target {
        self.0.col_specs()
    }
}

impl PreparedStatement {
    /// Starts building a prepared statement from a decoded PREPARE response
    /// and the CQL text that was prepared.
    pub fn builder(prepared: Prepared, statement: impl Into<String>) -> PreparedStatementBuilder {
        PreparedStatementBuilder::new(prepared, statement.into())
    }

    pub(crate) fn from_shared(inner: Arc<PreparedStatementShared>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<PreparedStatementShared> {
        Arc::downgrade(&self.inner)
    }

    /// Binds the values, one per bind marker, and builds the statement.
    ///
    /// ```
    /// # use cqlbind::statement::prepared::PreparedStatement;
    /// # fn example(prepared: &PreparedStatement) -> Result<(), Box<dyn std::error::Error>> {
    /// let bound = prepared.bind((42_i32, "hello", None::<i64>))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn bind(&self, values: impl BindValues) -> Result<BoundStatement, BindError> {
        Ok(self.bound_statement_builder(values)?.build())
    }

    /// Binds the values and returns a builder, which allows overriding the
    /// statement defaults and individual values before building.
    pub fn bound_statement_builder(
        &self,
        values: impl BindValues,
    ) -> Result<BoundStatementBuilder, BindError> {
        let values = self.encoder().encode_row(&values.into_bind_values())?;
        Ok(BoundStatementBuilder::new(self.clone(), values))
    }

    pub(crate) fn encoder(&self) -> ValueEncoder<'_> {
        ValueEncoder::new(
            &self.inner.codecs,
            self.inner.protocol_version,
            &self.inner.metadata.col_specs,
        )
    }

    pub(crate) fn config(&self) -> &StatementConfig {
        &self.inner.config
    }

    /// Replaces the result metadata id and the result metadata at once.
    ///
    /// Concurrent readers see either the previous pair or the new one.
    /// Statements that were already bound are not affected.
    pub fn set_result_metadata(&self, id: Option<Bytes>, metadata: ResultMetadata) {
        debug!(
            statement_id = ?self.inner.reprepare.id(),
            result_metadata_id = ?id,
            columns = metadata.col_count(),
            "Replacing result metadata"
        );
        self.inner
            .result_metadata
            .store(Arc::new(ResultMetadataSnapshot { id, metadata }));
    }

    /// Stores the result metadata carried by a RESULT::Rows response if the
    /// server marked it as changed. Returns whether anything was replaced.
    pub fn apply_rows_metadata(&self, rows: &RowsMetadata) -> bool {
        match &rows.new_metadata_id {
            Some(new_id) => {
                self.set_result_metadata(Some(new_id.clone()), rows.metadata.clone());
                true
            }
            None => false,
        }
    }

    /// Returns what is needed to prepare this statement again.
    pub fn get_reprepare_payload(&self) -> &RepreparePayload {
        &self.inner.reprepare
    }

    pub fn get_id(&self) -> &Bytes {
        self.inner.reprepare.id()
    }

    pub fn get_statement(&self) -> &str {
        self.inner.reprepare.statement()
    }

    /// Keyspace the statement was prepared in, if any.
    pub fn get_keyspace(&self) -> Option<&str> {
        self.inner.reprepare.keyspace()
    }

    /// Access column specifications of the bind variables of this statement
    pub fn get_variable_col_specs(&self) -> &[ColumnSpec] {
        &self.inner.metadata.col_specs
    }

    /// Access info about partition key indexes of the bind variables of this statement
    pub fn get_variable_pk_indexes(&self) -> &[PartitionKeyIndex] {
        &self.inner.metadata.pk_indexes
    }

    pub(crate) fn get_prepared_metadata(&self) -> &PreparedMetadata {
        &self.inner.metadata
    }

    /// Id of the current result metadata. Only protocol v5 assigns one.
    pub fn get_result_metadata_id(&self) -> Option<Bytes> {
        self.inner.result_metadata.load().id.clone()
    }

    /// Access column specifications of the result set returned after the execution of this statement
    pub fn get_result_set_col_specs(&self) -> ResultColumnSpecs {
        ResultColumnSpecs(self.inner.result_metadata.load_full())
    }

    /// Returns the current result metadata id together with the metadata it identifies.
    pub fn get_result_metadata(&self) -> Arc<ResultMetadataSnapshot> {
        self.inner.result_metadata.load_full()
    }

    /// Returns true if the prepared statement has necessary information
    /// to be routed in a token-aware manner. If false, the statement
    /// is never routed.
    pub fn is_token_aware(&self) -> bool {
        !self.get_variable_pk_indexes().is_empty()
    }

    /// Returns true if it is known that the prepared statement contains
    /// a Lightweight Transaction.
    pub fn is_confirmed_lwt(&self) -> bool {
        self.inner.is_confirmed_lwt
    }

    /// Returns the name of the table this statement operates on.
    pub fn get_table_spec(&self) -> Option<&TableSpec> {
        self.get_variable_col_specs()
            .first()
            .map(|spec| spec.table_spec())
    }

    /// Get the name of the partitioner used for this statement.
    pub fn get_partitioner_name(&self) -> &PartitionerName {
        &self.inner.partitioner_name
    }

    /// Protocol version values are encoded for.
    pub fn get_protocol_version(&self) -> ProtocolVersion {
        self.inner.protocol_version
    }

    pub fn get_codec_registry(&self) -> &Arc<CodecRegistry> {
        &self.inner.codecs
    }

    /// Computes the routing key the given values would produce, or `None`
    /// if they leave a part of the partition key null or unset.
    pub fn compute_partition_key(
        &self,
        values: impl BindValues,
    ) -> Result<Option<Bytes>, PartitionKeyError> {
        let values = self.encoder().encode_row(&values.into_bind_values())?;
        let partition_key = PartitionKey::new(self.get_prepared_metadata(), &values)?;
        Ok(partition_key.to_routing_key()?)
    }

    /// Calculates the token for given values.
    ///
    /// Returns `Ok(None)` if the statement is not token-aware or the values
    /// leave a part of the partition key null or unset.
    pub fn calculate_token(
        &self,
        values: impl BindValues,
    ) -> Result<Option<Token>, PartitionKeyError> {
        if !self.is_token_aware() {
            return Ok(None);
        }
        let values = self.encoder().encode_row(&values.into_bind_values())?;
        let partition_key = PartitionKey::new(self.get_prepared_metadata(), &values)?;
        if !partition_key.is_complete() {
            return Ok(None);
        }
        Ok(Some(
            partition_key.calculate_token(self.get_partitioner_name())?,
        ))
    }

    /// Derives the routing key from already encoded values.
    pub(crate) fn derive_routing_key(&self, values: &SerializedValues) -> Option<Bytes> {
        if !self.is_token_aware() {
            return None;
        }
        let derived = PartitionKey::new(self.get_prepared_metadata(), values)
            .map_err(PartitionKeyError::from)
            .and_then(|pk| pk.to_routing_key().map_err(PartitionKeyError::from));
        match derived {
            Ok(key) => key,
            Err(err) => {
                debug!(
                    statement_id = ?self.get_id(),
                    error = %err,
                    "Could not derive the routing key, the statement is unrouted"
                );
                None
            }
        }
    }

    pub fn get_page_size(&self) -> Option<PageSize> {
        self.inner.config.page_size
    }

    pub fn get_timestamp(&self) -> Option<i64> {
        self.inner.config.timestamp
    }

    /// Whether statements bound from this one are idempotent by default.
    /// `None` means unknown, which is treated as not idempotent.
    pub fn get_is_idempotent(&self) -> Option<bool> {
        self.inner.config.is_idempotent
    }

    pub fn get_tracing(&self) -> bool {
        self.inner.config.tracing
    }

    pub fn get_serial_consistency(&self) -> Option<SerialConsistency> {
        self.inner.config.serial_consistency
    }

    pub fn get_custom_payload(&self) -> &CustomPayload {
        &self.inner.config.custom_payload
    }

    pub fn get_paging_state(&self) -> &PagingState {
        &self.inner.config.paging_state
    }

    pub fn get_routing_keyspace(&self) -> Option<&str> {
        self.inner.config.routing_keyspace.as_deref()
    }

    pub fn get_routing_key(&self) -> Option<&Bytes> {
        self.inner.config.routing_key.as_ref()
    }

    pub fn get_routing_token(&self) -> Option<Token> {
        self.inner.config.routing_token
    }

    /// Gets the default execution profile handle associated with this statement.
    pub fn get_execution_profile_handle(&self) -> Option<&ExecutionProfileHandle> {
        self.inner.config.execution_profile_handle.as_ref()
    }
}

/// Builds a [`PreparedStatement`] from a PREPARE response.
///
/// The defaults set here are applied to every statement bound from the
/// prepared one, unless overridden on its [`BoundStatementBuilder`].
#[derive(Debug)]
pub struct PreparedStatementBuilder {
    prepared: Prepared,
    statement: String,
    keyspace: Option<String>,
    custom_payload: CustomPayload,
    codecs: Option<Arc<CodecRegistry>>,
    protocol_version: ProtocolVersion,
    partitioner_name: PartitionerName,
    is_confirmed_lwt: bool,
    config: StatementConfig,
}

impl PreparedStatementBuilder {
    fn new(prepared: Prepared, statement: String) -> Self {
        Self {
            prepared,
            statement,
            keyspace: None,
            custom_payload: CustomPayload::new(),
            codecs: None,
            protocol_version: ProtocolVersion::default(),
            partitioner_name: PartitionerName::default(),
            is_confirmed_lwt: false,
            config: StatementConfig::default(),
        }
    }

    /// Decodes the body of a RESULT::Prepared response (without the result kind)
    /// and starts building a statement from it.
    pub fn from_raw_result(
        mut body: &[u8],
        version: ProtocolVersion,
        statement: impl Into<String>,
    ) -> Result<Self, PrepareError> {
        let prepared = deser_prepared(&mut body, version)?;
        Ok(Self::new(prepared, statement.into()).protocol_version(version))
    }

    /// Keyspace the statement was prepared in.
    pub fn keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = Some(keyspace.into());
        self
    }

    /// Custom payload that was sent with the PREPARE request; kept for repreparation.
    pub fn prepare_custom_payload(mut self, custom_payload: CustomPayload) -> Self {
        self.custom_payload = custom_payload;
        self
    }

    /// Registry used to encode bound values. Defaults to the built-in codecs.
    pub fn codec_registry(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = Some(codecs);
        self
    }

    /// Protocol version negotiated on the connection. Defaults to v4.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Partitioner of the table the statement operates on.
    pub fn partitioner(mut self, partitioner_name: PartitionerName) -> Self {
        self.partitioner_name = partitioner_name;
        self
    }

    pub fn is_confirmed_lwt(mut self, is_confirmed_lwt: bool) -> Self {
        self.is_confirmed_lwt = is_confirmed_lwt;
        self
    }

    /// Associates the statement with execution profile referred by the provided handle.
    pub fn execution_profile_handle(mut self, handle: Option<ExecutionProfileHandle>) -> Self {
        self.config.execution_profile_handle = handle;
        self
    }

    pub fn page_size(mut self, page_size: PageSize) -> Self {
        self.config.page_size = Some(page_size);
        self
    }

    /// Sets the default timestamp for this statement in microseconds.
    pub fn timestamp(mut self, timestamp: Option<i64>) -> Self {
        self.config.timestamp = timestamp;
        self
    }

    /// Sets the idempotence of this statement.
    /// A query is idempotent if it can be applied multiple times without changing the result of the initial application.
    pub fn is_idempotent(mut self, is_idempotent: bool) -> Self {
        self.config.is_idempotent = Some(is_idempotent);
        self
    }

    /// Enable or disable CQL Tracing for this statement.
    pub fn tracing(mut self, should_trace: bool) -> Self {
        self.config.tracing = should_trace;
        self
    }

    /// Sets the serial consistency to be used when executing this statement.
    pub fn serial_consistency(mut self, sc: Option<SerialConsistency>) -> Self {
        self.config.serial_consistency = sc;
        self
    }

    /// Custom payload sent with every execution of the statement.
    pub fn custom_payload(mut self, custom_payload: CustomPayload) -> Self {
        self.config.custom_payload = custom_payload;
        self
    }

    pub fn paging_state(mut self, paging_state: PagingState) -> Self {
        self.config.paging_state = paging_state;
        self
    }

    pub fn routing_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.config.routing_keyspace = Some(keyspace.into());
        self
    }

    /// Routing key used for every bound statement, instead of deriving it
    /// from the partition key values.
    pub fn routing_key(mut self, key: Bytes) -> Self {
        self.config.routing_key = Some(key);
        self
    }

    /// Token used for every bound statement that has no explicit routing key.
    pub fn routing_token(mut self, token: Token) -> Self {
        self.config.routing_token = Some(token);
        self
    }

    /// Checks the metadata and builds the statement.
    pub fn build(self) -> Result<PreparedStatement, PrepareError> {
        let Prepared {
            id,
            result_metadata_id,
            prepared_metadata,
            result_metadata,
        } = self.prepared;

        validate_pk_indexes(&prepared_metadata)?;
        if self.protocol_version.supports_result_metadata_id() && result_metadata_id.is_none() {
            return Err(PrepareError::MissingResultMetadataId(self.protocol_version));
        }

        debug!(
            statement_id = ?id,
            statement = %self.statement,
            variables = prepared_metadata.col_count,
            protocol_version = %self.protocol_version,
            "Prepared statement built"
        );

        Ok(PreparedStatement {
            inner: Arc::new(PreparedStatementShared {
                reprepare: RepreparePayload::new(
                    id,
                    self.statement,
                    self.keyspace,
                    self.custom_payload,
                ),
                metadata: prepared_metadata,
                result_metadata: ArcSwap::from_pointee(ResultMetadataSnapshot {
                    id: result_metadata_id,
                    metadata: result_metadata,
                }),
                config: self.config,
                codecs: self
                    .codecs
                    .unwrap_or_else(|| Arc::new(CodecRegistry::new())),
                protocol_version: self.protocol_version,
                partitioner_name: self.partitioner_name,
                is_confirmed_lwt: self.is_confirmed_lwt,
            }),
        })
    }
}

// PartitionKey walks the bound values once, so indexes must be strictly
// increasing and every sequence number must name its own slot.
fn validate_pk_indexes(metadata: &PreparedMetadata) -> Result<(), PrepareError> {
    let col_count = metadata.col_specs.len();
    let pk_count = metadata.pk_indexes.len();
    let mut seen_sequences = vec![false; pk_count];
    let mut previous: Option<u16> = None;
    for pk_index in &metadata.pk_indexes {
        if pk_index.index as usize >= col_count {
            return Err(ResultMetadataParseError::PkIndexOutOfRange {
                index: pk_index.index,
                col_count,
            }
            .into());
        }
        match previous {
            Some(prev) if prev == pk_index.index => {
                return Err(ResultMetadataParseError::DuplicatePkIndex { index: prev }.into());
            }
            Some(prev) if prev > pk_index.index => {
                return Err(PrepareError::UnsortedPkIndexes {
                    previous: prev,
                    index: pk_index.index,
                });
            }
            _ => previous = Some(pk_index.index),
        }
        match seen_sequences.get_mut(pk_index.sequence as usize) {
            None => {
                return Err(PrepareError::InvalidPkSequence {
                    sequence: pk_index.sequence,
                    pk_count,
                });
            }
            Some(true) => {
                return Err(PrepareError::DuplicatePkSequence {
                    sequence: pk_index.sequence,
                });
            }
            Some(seen) => *seen = true,
        }
    }
    Ok(())
}

/// Error when extracting partition key from bound values.
#[derive(Clone, Debug, Error, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum PartitionKeyExtractionError {
    /// No value with given partition key index was found in bound values.
    #[error("No value with given pk_index! pk_index: {0}, values.len(): {1}")]
    NoPkIndexValue(u16, u16),
}

/// Error when calculating token from partition key values.
#[derive(Clone, Debug, Error, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum TokenCalculationError {
    /// Value was too long to be used in partition key.
    #[error("Value bytes too long to create partition key, max 65 535 allowed! value.len(): {0}")]
    ValueTooLong(usize),
}

/// An error returned by [`PreparedStatement::compute_partition_key()`].
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum PartitionKeyError {
    /// Failed to extract partition key.
    #[error(transparent)]
    PartitionKeyExtraction(#[from] PartitionKeyExtractionError),

    /// Failed to calculate token.
    #[error(transparent)]
    TokenCalculation(#[from] TokenCalculationError),

    /// Failed to bind values required to compute partition key.
    #[error(transparent)]
    Bind(#[from] BindError),
}

pub(crate) type PartitionKeyValue<'ps> = (&'ps [u8], &'ps ColumnSpec);

/// Partition key components of a bound row, in partition key order.
/// A component that is null or unset is missing.
#[derive(Debug)]
pub(crate) struct PartitionKey<'ps> {
    pk_values: SmallVec<[Option<PartitionKeyValue<'ps>>; PartitionKey::SMALLVEC_ON_STACK_SIZE]>,
}

impl<'ps> PartitionKey<'ps> {
    const SMALLVEC_ON_STACK_SIZE: usize = 8;

    pub(crate) fn new(
        prepared_metadata: &'ps PreparedMetadata,
        bound_values: &'ps SerializedValues,
    ) -> Result<Self, PartitionKeyExtractionError> {
        // pk_indexes are sorted by index, so the values are walked once;
        // sequence gives the place of each component in the key.
        let mut pk_values: SmallVec<[_; PartitionKey::SMALLVEC_ON_STACK_SIZE]> =
            smallvec![None; prepared_metadata.pk_indexes.len()];
        let mut values_iter = bound_values.iter();
        let mut values_iter_offset = 0;
        for pk_index in prepared_metadata.pk_indexes.iter().copied() {
            let missing = || {
                PartitionKeyExtractionError::NoPkIndexValue(
                    pk_index.index,
                    bound_values.element_count(),
                )
            };
            let skip = pk_index
                .index
                .checked_sub(values_iter_offset)
                .ok_or_else(missing)?;
            let next_val = values_iter.nth(skip as usize).ok_or_else(missing)?;
            if let (RawValue::Value(v), Some(slot)) =
                (next_val, pk_values.get_mut(pk_index.sequence as usize))
            {
                let spec = &prepared_metadata.col_specs[pk_index.index as usize];
                *slot = Some((v, spec));
            }
            values_iter_offset = pk_index.index + 1;
        }
        Ok(Self { pk_values })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = PartitionKeyValue<'ps>> + Clone + '_ {
        self.pk_values.iter().flatten().copied()
    }

    /// Whether every component holds a value.
    pub(crate) fn is_complete(&self) -> bool {
        !self.pk_values.is_empty() && self.pk_values.iter().all(Option::is_some)
    }

    fn write_encoded_partition_key(
        &self,
        writer: &mut impl FnMut(&[u8]),
    ) -> Result<(), TokenCalculationError> {
        write_partition_key(self.iter().map(|(val, _spec)| val), writer)
    }

    /// The serialized partition key, or `None` if a component is missing.
    pub(crate) fn to_routing_key(&self) -> Result<Option<Bytes>, TokenCalculationError> {
        if !self.is_complete() {
            return Ok(None);
        }
        let mut buf = BytesMut::new();
        self.write_encoded_partition_key(&mut |chunk: &[u8]| buf.put_slice(chunk))?;
        Ok(Some(buf.freeze()))
    }

    pub(crate) fn calculate_token(
        &self,
        partitioner_name: &PartitionerName,
    ) -> Result<Token, TokenCalculationError> {
        let mut partitioner_hasher = partitioner_name.build_hasher();
        let mut writer = |chunk: &[u8]| partitioner_hasher.write(chunk);

        self.write_encoded_partition_key(&mut writer)?;

        Ok(partitioner_hasher.finish())
    }
}

#[cfg(test)]
#[path = "prepared_tests.rs"]
mod tests;
