use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 128-bit random chunk identifier, rendered as a hyphenated UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(Uuid);

impl ChunkId {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for ChunkId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ChunkId)
    }
}

/// Mints chunk identifiers.
///
/// Ids are not checked against the store; collisions are left to the
/// birthday bound of 122 random bits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChunkIdentity;

impl ChunkIdentity {
    pub fn new() -> Self {
        Self
    }

    pub fn mint(&self) -> ChunkId {
        ChunkId(Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mint_unique() {
        let identity = ChunkIdentity::new();
        let ids: HashSet<ChunkId> = (0..1000).map(|_| identity.mint()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_text_form_parses_back() {
        let id = ChunkIdentity::new().mint();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(text.parse::<ChunkId>().unwrap(), id);
        assert!("not-a-chunk".parse::<ChunkId>().is_err());
    }
}
