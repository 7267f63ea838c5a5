//! Short shareable match codes.

use derive_more::Display;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of a match code.
pub const MATCH_ID_LEN: usize = 6;

/// Symbols a match code is drawn from.
pub const MATCH_ID_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A six-symbol match code such as `K7Q2ZD`.
///
/// Uniqueness is probabilistic; the store's create-if-absent write is what
/// actually rejects a collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchId(String);

impl MatchId {
    /// Draws a fresh code uniformly from the alphabet.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let alphabet = MATCH_ID_ALPHABET.as_bytes();
        let code = (0..MATCH_ID_LEN)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
            .collect();
        Self(code)
    }

    /// Validates an untrusted code.
    pub fn parse(value: &str) -> Result<Self, MatchIdError> {
        let found = value.chars().count();
        if found != MATCH_ID_LEN {
            return Err(MatchIdError::InvalidLength {
                expected: MATCH_ID_LEN,
                found,
            });
        }
        if let Some((index, ch)) = value
            .chars()
            .enumerate()
            .find(|(_, ch)| !MATCH_ID_ALPHABET.contains(*ch))
        {
            return Err(MatchIdError::InvalidCharacter { ch, index });
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the record is stored.
    pub fn storage_key(&self) -> String {
        format!("game:{}", self.0)
    }
}

impl std::str::FromStr for MatchId {
    type Err = MatchIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for MatchId {
    type Error = MatchIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MatchId> for String {
    fn from(id: MatchId) -> Self {
        id.0
    }
}

/// A string that is not a valid match code.
#[derive(Debug, Clone, PartialEq, Eq, Display, derive_more::Error)]
pub enum MatchIdError {
    /// Wrong number of symbols.
    #[display("match id must be {expected} chars, got {found}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Actual length.
        found: usize,
    },
    /// A symbol outside the alphabet.
    #[display("invalid character '{ch}' at position {index}")]
    InvalidCharacter {
        /// Offending symbol.
        ch: char,
        /// Its index.
        index: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generated_ids_parse() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let id = MatchId::generate(&mut rng);
            assert_eq!(MatchId::parse(id.as_str()), Ok(id));
        }
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            MatchId::parse("ABC12"),
            Err(MatchIdError::InvalidLength { found: 5, .. })
        ));
        assert!(matches!(
            MatchId::parse("abc123"),
            Err(MatchIdError::InvalidCharacter { ch: 'a', index: 0 })
        ));
    }

    #[test]
    fn test_storage_key() {
        let id = MatchId::parse("Z9Z9Z9").unwrap();
        assert_eq!(id.storage_key(), "game:Z9Z9Z9");
    }
}
