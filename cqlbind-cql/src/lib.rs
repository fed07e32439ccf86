//! Defines CQL protocol-level types used to bind values to prepared statements.
//!
//! Mainly intended to be used by the `cqlbind` crate, but can also be useful for other
//! applications that need to encode or decode CQL values on their own:
//! - [`frame`] holds the in-wire primitives, the protocol version model, and the
//!   PREPARE/EXECUTE request bodies and RESULT decoders,
//! - [`value`] holds [`CqlValue`](value::CqlValue), the closed representation of every
//!   value this crate knows how to encode,
//! - [`serialize`] holds the cell/row writers that enforce `[value]` framing,
//! - [`codec`] holds the [`Codec`](codec::Codec) trait, the built-in codecs and the
//!   [`CodecRegistry`](codec::CodecRegistry).

pub mod codec;
pub mod frame;
pub mod serialize;
pub mod value;

pub use crate::frame::types::Consistency;
pub use crate::frame::ProtocolVersion;
