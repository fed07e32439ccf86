//! Prepared statements for clients of databases speaking the CQL binary protocol
//! (Apache Cassandra®, ScyllaDB).
//!
//! This crate covers what happens between a PREPARE response and an EXECUTE request:
//! - [`PreparedStatement`] keeps the id, the bind marker metadata and the result
//!   metadata the server returned, and the defaults of every execution,
//! - [`bind`](PreparedStatement::bind) encodes values through a
//!   [`CodecRegistry`](codec::CodecRegistry) and freezes them into a [`BoundStatement`],
//! - the bound statement knows how it is routed (routing key or token) and
//!   produces the EXECUTE request body.
//!
//! Network I/O, connection handling and load balancing are left to the caller.
//!
//! ### Binding values
//! ```rust
//! # use cqlbind::frame::response::result::{ColumnSpec, ColumnType, Prepared, PreparedMetadata, ResultMetadata, TableSpec};
//! # use cqlbind::{Consistency, PreparedStatement};
//! # fn check_only_compiles() -> Result<(), Box<dyn std::error::Error>> {
//! let table = TableSpec::new("ks", "users");
//! let prepared = Prepared {
//!     id: bytes::Bytes::from_static(b"\x01\x02"),
//!     result_metadata_id: None,
//!     prepared_metadata: PreparedMetadata::new(
//!         vec![
//!             ColumnSpec::new("id", ColumnType::Int, table.clone()),
//!             ColumnSpec::new("name", ColumnType::Text, table),
//!         ],
//!         &[0],
//!     )?,
//!     result_metadata: ResultMetadata::mock_empty(),
//! };
//! let statement = PreparedStatement::builder(prepared, "INSERT INTO ks.users (id, name) VALUES (?, ?)")
//!     .build()?;
//!
//! let bound = statement.bind((7_i32, "alice"))?;
//! assert_eq!(bound.routing_key().map(|key| &key[..]), Some(&[0, 0, 0, 7][..]));
//!
//! let request = bound.to_execute(Consistency::LocalQuorum);
//! # Ok(())
//! # }
//! ```
//!
//! ### Schema changes
//! When the server reports new result metadata, it is stored with
//! [`PreparedStatement::set_result_metadata`]; all clones of the statement
//! observe it, and the id and metadata are always read as a pair.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod frame {
    pub use cqlbind_cql::frame::{frame_errors, ProtocolVersion, UnsupportedProtocolVersion};

    pub mod types {
        pub use cqlbind_cql::frame::types::{Consistency, RawValue, SerialConsistency};
    }

    pub mod request {
        pub use cqlbind_cql::frame::request::{
            execute::Execute, prepare::Prepare, query::QueryParameters, SerializableRequest,
        };
    }

    pub mod response {
        pub mod result {
            pub use cqlbind_cql::frame::response::result::{
                deser_prepared, deser_rows_metadata, ColumnSpec, ColumnType, PartitionKeyIndex,
                Prepared, PreparedMetadata, ResultMetadata, RowsMetadata, TableSpec,
            };
        }
    }
}

/// Encoding values into cells and decoding them back.
pub mod codec {
    pub use cqlbind_cql::codec::*;
}

/// Values that can be bound to a statement.
pub mod value {
    pub use cqlbind_cql::value::*;
}

/// Writing encoded cells and rows.
pub mod serialize {
    pub use cqlbind_cql::serialize::*;
}

pub mod client;
pub mod errors;
pub mod routing;
pub mod statement;

pub(crate) mod utils;

#[cfg(test)]
pub(crate) use utils::test_utils;

pub use client::execution_profile::{ExecutionProfile, ExecutionProfileHandle};
pub use client::PreparedStatementCache;
pub use frame::types::{Consistency, SerialConsistency};
pub use frame::ProtocolVersion;
pub use routing::{Routing, Token};
pub use statement::bound::{BoundStatement, BoundStatementBuilder};
pub use statement::prepared::PreparedStatement;
pub use statement::values::{BindValue, BindValues};
