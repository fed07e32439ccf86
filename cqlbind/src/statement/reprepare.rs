//! What a prepared statement keeps in order to be prepared again.

use bytes::Bytes;
use cqlbind_cql::frame::request::prepare::Prepare;

use super::CustomPayload;

/// The data needed to reissue PREPARE for a statement the server forgot
/// (e.g. after an UNPREPARED error), and to look it up in a cache by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepreparePayload {
    id: Bytes,
    statement: String,
    keyspace: Option<String>,
    custom_payload: CustomPayload,
}

impl RepreparePayload {
    pub(crate) fn new(
        id: Bytes,
        statement: String,
        keyspace: Option<String>,
        custom_payload: CustomPayload,
    ) -> Self {
        Self {
            id,
            statement,
            keyspace,
            custom_payload,
        }
    }

    /// Id the server assigned to the statement.
    #[inline]
    pub fn id(&self) -> &Bytes {
        &self.id
    }

    /// The CQL text that was prepared.
    #[inline]
    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Keyspace the statement was prepared in, if any.
    #[inline]
    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    /// Custom payload sent with the original PREPARE request.
    #[inline]
    pub fn custom_payload(&self) -> &CustomPayload {
        &self.custom_payload
    }

    /// Builds the PREPARE request body. The keyspace is only put on the wire
    /// by protocol v5; older versions rely on the connection keyspace.
    pub fn to_prepare(&self) -> Prepare<'_> {
        Prepare {
            query: &self.statement,
            keyspace: self.keyspace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::RepreparePayload;
    use crate::statement::CustomPayload;

    #[test]
    fn prepare_request_carries_query_and_keyspace() {
        let mut custom_payload = CustomPayload::new();
        custom_payload.insert("tenant".to_owned(), Bytes::from_static(b"a"));
        let payload = RepreparePayload::new(
            Bytes::from_static(b"\x01\x02"),
            "SELECT v FROM t WHERE k = ?".to_owned(),
            Some("ks".to_owned()),
            custom_payload,
        );

        let prepare = payload.to_prepare();
        assert_eq!(prepare.query, "SELECT v FROM t WHERE k = ?");
        assert_eq!(prepare.keyspace, Some("ks"));
        assert_eq!(&payload.id()[..], b"\x01\x02");
        assert_eq!(
            payload.custom_payload().get("tenant"),
            Some(&Bytes::from_static(b"a"))
        );
    }
}
