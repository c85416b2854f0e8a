//! Snapshot schema version.

use serde::{Deserialize, Serialize};

/// Semantic version stamped on persisted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (backwards-compatible additions)
    pub minor: u16,
    /// Patch version (bug fixes)
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Layout of the saved board snapshot.
    pub const GAME_SNAPSHOT: Self = Self::new(1, 0, 0);

    /// Whether a snapshot written as `data_version` can be loaded. Minor and
    /// patch bumps only add optional fields.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::GAME_SNAPSHOT
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(SchemaVersion::new(1, 2, 3).to_string(), "1.2.3");
    }

    #[test]
    fn test_can_read_same_major() {
        let current = SchemaVersion::GAME_SNAPSHOT;
        assert!(current.can_read(&SchemaVersion::new(1, 4, 0)));
        assert!(!current.can_read(&SchemaVersion::new(2, 0, 0)));
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&SchemaVersion::GAME_SNAPSHOT).expect("serialize");
        let back: SchemaVersion = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, SchemaVersion::GAME_SNAPSHOT);
    }
}
