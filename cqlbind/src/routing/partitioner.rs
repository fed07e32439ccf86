//! Token computation for serialized partition keys.
//!
//! The only partitioner is Murmur3, the default of Cassandra and ScyllaDB.
//! It hashes the key with the x64 128-bit variant of MurmurHash3 and keeps
//! the lower half, reading trailing bytes as signed like the Java original.

use bytes::Buf;
use cqlbind_cql::serialize::row::SerializedValues;

use crate::routing::Token;
use crate::statement::prepared::TokenCalculationError;

/// The partitioner a table is distributed with.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[non_exhaustive]
pub enum PartitionerName {
    #[default]
    Murmur3,
}

impl PartitionerName {
    /// Recognizes a partitioner by its (possibly fully qualified) class name,
    /// as reported in the schema.
    pub fn from_class_name(name: &str) -> Option<Self> {
        name.ends_with("Murmur3Partitioner")
            .then_some(PartitionerName::Murmur3)
    }
}

impl Partitioner for PartitionerName {
    type Hasher = Murmur3PartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher {
        match self {
            PartitionerName::Murmur3 => Murmur3Partitioner.build_hasher(),
        }
    }
}

/// Creates the hashers that compute tokens, like `BuildHasher` does for `Hasher`.
pub trait Partitioner {
    type Hasher: PartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher;

    fn hash_one(&self, data: &[u8]) -> Token {
        let mut hasher = self.build_hasher();
        hasher.write(data);
        hasher.finish()
    }
}

/// Incremental token computation over the bytes of a partition key.
///
/// Feeding the key in any number of pieces gives the same token as feeding
/// it at once. `finish` does not consume the state.
pub trait PartitionerHasher {
    fn write(&mut self, pk_part: &[u8]);
    fn finish(&self) -> Token;
}

pub struct Murmur3Partitioner;

impl Partitioner for Murmur3Partitioner {
    type Hasher = Murmur3PartitionerHasher;

    fn build_hasher(&self) -> Self::Hasher {
        Murmur3PartitionerHasher {
            h1: 0,
            h2: 0,
            len: 0,
            pending: [0; BLOCK_LEN],
            pending_len: 0,
        }
    }
}

const BLOCK_LEN: usize = 16;
const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

fn scramble_k1(k1: u64) -> u64 {
    k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2)
}

fn scramble_k2(k2: u64) -> u64 {
    k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1)
}

fn fmix(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^ (k >> 33)
}

// Little-endian word of up to 8 tail bytes, each sign-extended before it is
// shifted into place.
fn tail_word(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0, |k, &b| (k << 8) ^ (b as i8 as i64 as u64))
}

pub struct Murmur3PartitionerHasher {
    h1: u64,
    h2: u64,
    len: usize,
    // Bytes not yet hashed, always fewer than a block.
    pending: [u8; BLOCK_LEN],
    pending_len: usize,
}

impl Murmur3PartitionerHasher {
    fn mix_block(&mut self, mut block: &[u8]) {
        let k1 = block.get_u64_le();
        let k2 = block.get_u64_le();

        self.h1 ^= scramble_k1(k1);
        self.h1 = self
            .h1
            .rotate_left(27)
            .wrapping_add(self.h2)
            .wrapping_mul(5)
            .wrapping_add(0x52dc_e729);

        self.h2 ^= scramble_k2(k2);
        self.h2 = self
            .h2
            .rotate_left(31)
            .wrapping_add(self.h1)
            .wrapping_mul(5)
            .wrapping_add(0x3849_5ab5);
    }
}

impl PartitionerHasher for Murmur3PartitionerHasher {
    fn write(&mut self, mut pk_part: &[u8]) {
        self.len += pk_part.len();

        if self.pending_len > 0 {
            let take = pk_part.len().min(BLOCK_LEN - self.pending_len);
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&pk_part[..take]);
            self.pending_len += take;
            pk_part = &pk_part[take..];
            if self.pending_len < BLOCK_LEN {
                return;
            }
            let block = self.pending;
            self.mix_block(&block);
            self.pending_len = 0;
        }

        let mut blocks = pk_part.chunks_exact(BLOCK_LEN);
        for block in &mut blocks {
            self.mix_block(block);
        }
        let rest = blocks.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    fn finish(&self) -> Token {
        let mut h1 = self.h1;
        let mut h2 = self.h2;
        let tail = &self.pending[..self.pending_len];

        if tail.len() > 8 {
            h2 ^= scramble_k2(tail_word(&tail[8..]));
        }
        if !tail.is_empty() {
            h1 ^= scramble_k1(tail_word(&tail[..tail.len().min(8)]));
        }

        h1 ^= self.len as u64;
        h2 ^= self.len as u64;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix(h1);
        h2 = fmix(h2);
        h1 = h1.wrapping_add(h2);

        Token::new(h1 as i64)
    }
}

/// Calculates the token for given partitioner and serialized partition key.
///
/// The ordinary way to calculate token is through a bound statement.
/// Knowing the partition key columns in their `CREATE TABLE` order and the
/// table's partitioner is enough to do it without one.
///
/// NOTE: the provided values must completely constitute partition key
/// and be in the order defined in CREATE TABLE statement.
pub fn calculate_token_for_partition_key(
    serialized_partition_key_values: &SerializedValues,
    partitioner: &PartitionerName,
) -> Result<Token, TokenCalculationError> {
    let mut partitioner_hasher = partitioner.build_hasher();
    write_partition_key(
        serialized_partition_key_values
            .iter()
            .filter_map(|rv| rv.as_value()),
        &mut |chunk: &[u8]| partitioner_hasher.write(chunk),
    )?;
    Ok(partitioner_hasher.finish())
}

/// Writes partition key components the way partitioners expect them: a single
/// component as is, each of several as `[u16 length][bytes][0x00]`.
pub(crate) fn write_partition_key<'a>(
    mut components: impl Iterator<Item = &'a [u8]>,
    out: &mut impl FnMut(&[u8]),
) -> Result<(), TokenCalculationError> {
    let Some(first) = components.next() else {
        return Ok(());
    };
    let Some(second) = components.next() else {
        out(first);
        return Ok(());
    };
    for component in [first, second].into_iter().chain(components) {
        let len: u16 = component
            .len()
            .try_into()
            .map_err(|_| TokenCalculationError::ValueTooLong(component.len()))?;
        out(&len.to_be_bytes());
        out(component);
        out(&[0u8]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand_pcg::Pcg32;

    use crate::test_utils::setup_tracing;

    use cqlbind_cql::serialize::row::SerializedValues;

    use super::{
        calculate_token_for_partition_key, Murmur3Partitioner, Partitioner, PartitionerHasher,
        PartitionerName,
    };

    #[test]
    fn murmur3_matches_known_tokens() {
        setup_tracing();
        for (key, token) in [
            ("test", -6017608668500074083),
            ("xd", 4507812186440344727),
            ("primary_key", -1632642444691073360),
            ("kremówki", 4354931215268080151),
        ] {
            assert_eq!(Murmur3Partitioner.hash_one(key.as_bytes()).value(), token);
        }
    }

    // Splits `data` at random points into `pieces` consecutive chunks.
    fn random_chunks<'a>(rng: &mut impl Rng, data: &'a [u8], pieces: usize) -> Vec<&'a [u8]> {
        let mut cuts: Vec<usize> = (1..pieces).map(|_| rng.random_range(0..=data.len())).collect();
        cuts.push(0);
        cuts.push(data.len());
        cuts.sort_unstable();
        cuts.windows(2).map(|w| &data[w[0]..w[1]]).collect()
    }

    #[test]
    fn token_does_not_depend_on_how_the_key_is_fed() {
        setup_tracing();
        let inputs: &[&[u8]] = &[
            b"",
            b"0",
            b"exactly sixteen!",
            "Ala ma kota, a kota ma Ala.".as_bytes(),
            "Zażółć gęślą jaźń. Wsiadł rycerz Szaławiła na bułanego konia. Litwo, ojczyzno moja, ...".as_bytes(),
        ];
        let mut rng = Pcg32::new(0x2137, 0);

        for input in inputs {
            let expected = Murmur3Partitioner.hash_one(input);
            for pieces in [2, 3, 5, 17] {
                for _ in 0..200 {
                    let mut hasher = Murmur3Partitioner.build_hasher();
                    for chunk in random_chunks(&mut rng, input, pieces) {
                        hasher.write(chunk);
                    }
                    assert_eq!(hasher.finish(), expected);
                }
            }
        }
    }

    #[test]
    fn finish_leaves_the_hasher_usable() {
        let mut hasher = Murmur3Partitioner.build_hasher();
        hasher.write(b"prim");
        let partial = hasher.finish();
        assert_eq!(partial, Murmur3Partitioner.hash_one(b"prim"));

        hasher.write(b"ary_key");
        assert_eq!(hasher.finish().value(), -1632642444691073360);
    }

    #[test]
    fn partitioner_names_are_recognized_by_class_name() {
        assert_eq!(
            PartitionerName::from_class_name("org.apache.cassandra.dht.Murmur3Partitioner"),
            Some(PartitionerName::Murmur3)
        );
        assert_eq!(
            PartitionerName::from_class_name("org.apache.cassandra.dht.RandomPartitioner"),
            None
        );
        assert_eq!(
            PartitionerName::default().hash_one(b"test"),
            Murmur3Partitioner.hash_one(b"test")
        );
    }

    #[test]
    fn composite_partition_key_is_framed_per_component() {
        setup_tracing();
        let (values, ()) = SerializedValues::from_closure(|writer| {
            writer.make_cell_writer().set_value(b"ab")?;
            writer.make_cell_writer().set_value(&[0, 0, 0, 7])?;
            Ok(())
        })
        .unwrap();

        let token = calculate_token_for_partition_key(&values, &PartitionerName::Murmur3).unwrap();
        let framed: &[u8] = &[0, 2, b'a', b'b', 0, 0, 4, 0, 0, 0, 7, 0];
        assert_eq!(token, Murmur3Partitioner.hash_one(framed));

        let (single, ()) = SerializedValues::from_closure(|writer| {
            writer.make_cell_writer().set_value(b"test")?;
            Ok(())
        })
        .unwrap();
        let token = calculate_token_for_partition_key(&single, &PartitionerName::Murmur3).unwrap();
        assert_eq!(token.value(), -6017608668500074083);
    }
}
