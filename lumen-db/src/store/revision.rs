//! Revision tokens for optimistic concurrency control.
//!
//! A revision is a `<generation>-<digest>` pair, rendered as a string like
//! `"3-9f2a6c01d4e8b770"`. The generation counts successful mutations of a
//! document id and is strictly increasing; the digest is derived from the
//! generation and the payload bytes, so two revisions created independently
//! at the same generation remain distinguishable.
//!
//! Tokens serialize as strings, so callers that round-trip documents through
//! JSON see the familiar `"_rev": "2-..."` shape.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A document revision token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Revision {
    generation: u64,
    digest: u64,
}

impl Revision {
    /// First revision of a freshly created document.
    pub fn first(payload: &[u8]) -> Self {
        Self::at_generation(1, payload)
    }

    /// Successor revision after a successful mutation.
    pub fn next(&self, payload: &[u8]) -> Self {
        Self::at_generation(self.generation + 1, payload)
    }

    /// Revision at an explicit generation, digesting the payload.
    pub fn at_generation(generation: u64, payload: &[u8]) -> Self {
        Self {
            generation,
            digest: digest(generation, payload),
        }
    }

    /// The mutation count encoded in this token.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// FNV-1a fold over the generation and payload bytes.
///
/// Not cryptographic; it only has to disambiguate sibling revisions at the
/// same generation.
fn digest(generation: u64, payload: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for byte in generation.to_be_bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    for byte in payload {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:016x}", self.generation, self.digest)
    }
}

/// Error returned when a revision string does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRevisionError(String);

impl fmt::Display for ParseRevisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid revision token: {:?}", self.0)
    }
}

impl std::error::Error for ParseRevisionError {}

impl FromStr for Revision {
    type Err = ParseRevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (gen_part, digest_part) = s
            .split_once('-')
            .ok_or_else(|| ParseRevisionError(s.to_string()))?;
        let generation: u64 = gen_part
            .parse()
            .map_err(|_| ParseRevisionError(s.to_string()))?;
        if generation == 0 || digest_part.len() != 16 {
            return Err(ParseRevisionError(s.to_string()));
        }
        let digest = u64::from_str_radix(digest_part, 16)
            .map_err(|_| ParseRevisionError(s.to_string()))?;
        Ok(Self { generation, digest })
    }
}

impl Serialize for Revision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_roundtrip() {
        let rev = Revision::first(b"hello");
        let parsed: Revision = rev.to_string().parse().unwrap();
        assert_eq!(parsed, rev);
    }

    #[test]
    fn test_generation_increments() {
        let r1 = Revision::first(b"a");
        let r2 = r1.next(b"b");
        let r3 = r2.next(b"c");
        assert_eq!(r1.generation(), 1);
        assert_eq!(r2.generation(), 2);
        assert_eq!(r3.generation(), 3);
    }

    #[test]
    fn test_same_generation_different_content_differs() {
        let a = Revision::first(b"payload one");
        let b = Revision::first(b"payload two");
        assert_eq!(a.generation(), b.generation());
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Revision>().is_err());
        assert!("3".parse::<Revision>().is_err());
        assert!("abc-def".parse::<Revision>().is_err());
        assert!("0-0000000000000000".parse::<Revision>().is_err());
        assert!("2-zzzz".parse::<Revision>().is_err());
    }

    #[test]
    fn test_serde_string_form() {
        let rev = Revision::first(b"doc");
        let json = serde_json::to_string(&rev).unwrap();
        assert!(json.starts_with("\"1-"));
        let back: Revision = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rev);
    }
}
