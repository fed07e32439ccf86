//! CQL protocol-level representation of an `EXECUTE` request.

use std::num::TryFromIntError;

use bytes::Bytes;
use thiserror::Error;

use crate::frame::frame_errors::CqlRequestSerializationError;
use crate::frame::ProtocolVersion;

use crate::{
    frame::request::{query, RequestOpcode, SerializableRequest},
    frame::types,
};

use super::{
    query::{QueryParameters, QueryParametersSerializationError},
    DeserializableRequest, RequestDeserializationError,
};

/// CQL protocol-level representation of an `EXECUTE` request,
/// used to execute a single prepared statement.
#[cfg_attr(test, derive(Debug, PartialEq, Eq))]
pub struct Execute<'a> {
    /// ID of the prepared statement to execute.
    pub id: Bytes,

    /// ID of the result metadata the client holds. Required by protocol v5,
    /// ignored by older versions.
    pub result_metadata_id: Option<Bytes>,

    /// Various parameters controlling the execution of the statement.
    pub parameters: query::QueryParameters<'a>,
}

impl SerializableRequest for Execute<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::Execute;

    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), CqlRequestSerializationError> {
        // Serializing statement id
        types::write_short_bytes(&self.id[..], buf)
            .map_err(ExecuteSerializationError::StatementIdSerialization)?;

        if version.supports_result_metadata_id() {
            let result_metadata_id = self
                .result_metadata_id
                .as_ref()
                .ok_or(ExecuteSerializationError::MissingResultMetadataId)?;
            types::write_short_bytes(&result_metadata_id[..], buf)
                .map_err(ExecuteSerializationError::ResultMetadataIdSerialization)?;
        }

        // Serializing params
        self.parameters
            .serialize(version, buf)
            .map_err(ExecuteSerializationError::QueryParametersSerialization)?;
        Ok(())
    }
}

impl DeserializableRequest for Execute<'_> {
    fn deserialize(
        buf: &mut &[u8],
        version: ProtocolVersion,
    ) -> Result<Self, RequestDeserializationError> {
        let id = types::read_short_bytes(buf)?.to_vec().into();
        let result_metadata_id = if version.supports_result_metadata_id() {
            Some(types::read_short_bytes(buf)?.to_vec().into())
        } else {
            None
        };
        let parameters = QueryParameters::deserialize(buf, version)?;

        Ok(Self {
            id,
            result_metadata_id,
            parameters,
        })
    }
}

/// An error type returned when serialization of EXECUTE request fails.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ExecuteSerializationError {
    /// Failed to serialize query parameters.
    #[error("Malformed query parameters: {0}")]
    QueryParametersSerialization(QueryParametersSerializationError),

    /// Failed to serialize prepared statement id.
    #[error("Malformed statement id: {0}")]
    StatementIdSerialization(TryFromIntError),

    /// Failed to serialize result metadata id.
    #[error("Malformed result metadata id: {0}")]
    ResultMetadataIdSerialization(TryFromIntError),

    /// The protocol version requires a result metadata id, but none is known.
    #[error("Protocol v5 EXECUTE requires a result metadata id, but none was provided")]
    MissingResultMetadataId,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bytes::Bytes;

    use super::{Execute, ExecuteSerializationError};
    use crate::frame::frame_errors::CqlRequestSerializationError;
    use crate::frame::request::SerializableRequest;
    use crate::frame::ProtocolVersion;

    #[test]
    fn v5_requires_result_metadata_id() {
        let execute = Execute {
            id: Bytes::from_static(&[1, 2]),
            result_metadata_id: None,
            parameters: Default::default(),
        };

        execute.to_bytes(ProtocolVersion::V4).unwrap();
        assert_matches!(
            execute.to_bytes(ProtocolVersion::V5),
            Err(CqlRequestSerializationError::ExecuteSerialization(
                ExecuteSerializationError::MissingResultMetadataId
            ))
        );
    }
}
