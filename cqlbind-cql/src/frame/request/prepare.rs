//! CQL protocol-level representation of a `PREPARE` request.

use std::num::TryFromIntError;

use bytes::BufMut;
use thiserror::Error;

use crate::frame::frame_errors::CqlRequestSerializationError;
use crate::frame::ProtocolVersion;

use crate::{
    frame::request::{RequestOpcode, SerializableRequest},
    frame::types,
};

// Prepare flags (v5)
const FLAG_WITH_KEYSPACE: u32 = 0x01;

/// CQL protocol-level representation of a `PREPARE` request,
/// used to prepare a single statement for further execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prepare<'a> {
    /// CQL statement string to prepare.
    pub query: &'a str,

    /// Keyspace the statement is prepared in.
    ///
    /// Only protocol v5 carries it on the wire; older versions rely on the
    /// connection's current keyspace and the field is not written.
    pub keyspace: Option<&'a str>,
}

impl SerializableRequest for Prepare<'_> {
    const OPCODE: RequestOpcode = RequestOpcode::Prepare;

    fn serialize(
        &self,
        version: ProtocolVersion,
        buf: &mut Vec<u8>,
    ) -> Result<(), CqlRequestSerializationError> {
        types::write_long_string(self.query, buf)
            .map_err(PrepareSerializationError::StatementStringSerialization)?;

        if version.query_flags_are_int() {
            match self.keyspace {
                Some(keyspace) => {
                    buf.put_u32(FLAG_WITH_KEYSPACE);
                    types::write_string(keyspace, buf)
                        .map_err(PrepareSerializationError::KeyspaceSerialization)?;
                }
                None => buf.put_u32(0),
            }
        }
        Ok(())
    }
}

/// An error type returned when serialization of PREPARE request fails.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum PrepareSerializationError {
    /// Failed to serialize the CQL statement string.
    #[error("Failed to serialize statement contents: {0}")]
    StatementStringSerialization(TryFromIntError),

    /// Failed to serialize the keyspace name.
    #[error("Failed to serialize keyspace name: {0}")]
    KeyspaceSerialization(TryFromIntError),
}
