//! This module holds entities whose goal is to enable routing requests optimally,
//! that is, choosing a target node such that it is a replica for given token.
//!
//! This includes:
//! - token representation,
//! - partitioners, which compute token based on a partition key,
//! - [`Routing`], the routing decision attached to every bound statement.
//!

use bytes::Bytes;

pub mod partitioner;

/// Token is a result of computing a hash of a primary key
///
/// It is basically an i64 with one caveat: i64::MIN is not
/// a valid token. It is used to represent infinity.
/// For this reason tokens are normalized - i64::MIN
/// is replaced with i64::MAX.
///
/// This struct is a wrapper over i64 that performs this normalization
/// when initialized using `new()` method.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Token {
    value: i64,
}

impl Token {
    /// Creates a new token with given value, normalizing the value if necessary
    #[inline]
    pub fn new(value: i64) -> Self {
        Self {
            value: if value == i64::MIN { i64::MAX } else { value },
        }
    }

    #[inline]
    pub fn value(&self) -> i64 {
        self.value
    }
}

/// How a bound statement is routed.
///
/// Decided once, when the statement is built, in this order: an explicit
/// routing key, then an explicit token, then the key derived from the bound
/// partition key values. A statement whose partition key is not fully bound
/// (null or unset components) is unrouted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    /// Routed by a serialized partition key, either explicit or derived.
    Key(Bytes),

    /// Routed by a token given explicitly; no key is derived.
    Token(Token),

    /// No routing information; any node may coordinate the request.
    Unrouted,
}

impl Routing {
    /// Returns the routing key, if routing is key based.
    #[inline]
    pub fn key(&self) -> Option<&Bytes> {
        match self {
            Routing::Key(key) => Some(key),
            _ => None,
        }
    }

    #[inline]
    pub fn is_routed(&self) -> bool {
        !matches!(self, Routing::Unrouted)
    }
}

#[cfg(test)]
mod tests {
    use super::Token;

    #[test]
    fn token_min_is_normalized() {
        assert_eq!(Token::new(i64::MIN).value(), i64::MAX);
        assert_eq!(Token::new(-1).value(), -1);
    }
}
