//! A cache of prepared statements keyed by their id, which does not keep
//! the statements alive.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::Weak;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::statement::prepared::{PreparedStatement, PreparedStatementShared};
use crate::statement::reprepare::RepreparePayload;

/// Maps statement ids to the prepared statements that currently exist.
///
/// The cache holds weak handles only: an entry can be resolved exactly as long
/// as some caller still holds the [`PreparedStatement`] (or one of its clones).
/// Entries of dropped statements are removed lazily, on lookup, or all at once
/// with [`purge`](PreparedStatementCache::purge).
///
/// A session layer uses it to find the statement named by an UNPREPARED error
/// and reissue PREPARE from its [`RepreparePayload`].
pub struct PreparedStatementCache<S = RandomState>
where
    S: Clone + BuildHasher,
{
    cache: DashMap<Bytes, Weak<PreparedStatementShared>, S>,
}

impl<S> fmt::Debug for PreparedStatementCache<S>
where
    S: Clone + BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedStatementCache")
            .field("len", &self.cache.len())
            .finish()
    }
}

impl PreparedStatementCache {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }
}

impl Default for PreparedStatementCache {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> PreparedStatementCache<S>
where
    S: Clone + BuildHasher,
{
    /// Creates a cache that hashes statement ids with the given hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            cache: DashMap::with_hasher(hasher),
        }
    }

    /// Registers the statement under its id, replacing any previous entry.
    pub fn insert(&self, statement: &PreparedStatement) {
        let id = statement.get_id().clone();
        trace!(statement_id = ?id, "Caching prepared statement");
        self.cache.insert(id, statement.downgrade());
    }

    /// Returns the statement with the given id, if it is still alive.
    pub fn get(&self, id: &[u8]) -> Option<PreparedStatement> {
        // The shard lock must be released before a dead entry is removed.
        let upgraded = self.cache.get(id).map(|entry| entry.value().upgrade());
        match upgraded {
            Some(Some(shared)) => Some(PreparedStatement::from_shared(shared)),
            Some(None) => {
                self.cache.remove_if(id, |_, weak| weak.strong_count() == 0);
                debug!(statement_id = ?id, "Dropped cache entry of a released statement");
                None
            }
            None => None,
        }
    }

    /// Returns what is needed to prepare the statement with the given id again.
    pub fn get_reprepare_payload(&self, id: &[u8]) -> Option<RepreparePayload> {
        self.get(id)
            .map(|statement| statement.get_reprepare_payload().clone())
    }

    /// Removes the entries of statements that are no longer held by anyone.
    /// Returns the number of removed entries.
    pub fn purge(&self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, weak| weak.strong_count() > 0);
        let removed = before.saturating_sub(self.cache.len());
        if removed > 0 {
            debug!(removed, "Purged released prepared statements");
        }
        removed
    }

    /// Number of entries, including those not purged yet.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use cqlbind_cql::frame::response::result::ColumnType;

    use super::PreparedStatementCache;
    use crate::statement::prepared::PreparedStatement;
    use crate::test_utils::{prepared, setup_tracing};

    fn statement_with_id(id: &'static [u8]) -> PreparedStatement {
        let mut prepared = prepared(&[("k", ColumnType::Int)], &[0]);
        prepared.id = Bytes::from_static(id);
        PreparedStatement::builder(prepared, "SELECT v FROM ks.t WHERE k = ?")
            .keyspace("ks")
            .build()
            .unwrap()
    }

    #[test]
    fn entry_lives_as_long_as_the_statement() {
        setup_tracing();
        let cache = PreparedStatementCache::new();
        let statement = statement_with_id(b"one");
        cache.insert(&statement);

        let clone = statement.clone();
        drop(statement);
        let found = cache.get(b"one").unwrap();
        assert_eq!(found.get_statement(), "SELECT v FROM ks.t WHERE k = ?");
        assert_eq!(
            cache.get_reprepare_payload(b"one").unwrap().keyspace(),
            Some("ks")
        );

        drop(found);
        drop(clone);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(b"one").is_none());
        assert!(cache.is_empty());
        assert!(cache.get_reprepare_payload(b"one").is_none());
    }

    #[test]
    fn purge_removes_released_statements_only() {
        setup_tracing();
        let cache = PreparedStatementCache::default();
        let kept = statement_with_id(b"kept");
        let released = statement_with_id(b"released");
        cache.insert(&kept);
        cache.insert(&released);
        drop(released);

        assert_eq!(cache.purge(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(b"kept").is_some());
        assert_eq!(cache.purge(), 0);
    }

    #[test]
    fn cached_statement_shares_result_metadata() {
        setup_tracing();
        let cache = PreparedStatementCache::new();
        let statement = statement_with_id(b"shared");
        cache.insert(&statement);

        let found = cache.get(b"shared").unwrap();
        found.set_result_metadata(
            Some(Bytes::from_static(b"m")),
            statement.get_result_metadata().metadata().clone(),
        );
        assert_eq!(
            statement.get_result_metadata_id(),
            Some(Bytes::from_static(b"m"))
        );
    }
}
