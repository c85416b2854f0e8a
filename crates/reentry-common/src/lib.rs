//! # Reentry Common
//!
//! Common types, utilities, and shared abstractions for Reentry.
//!
//! This crate provides foundational types used across all Reentry subsystems:
//! - Cell coordinates on the square game board
//! - Schema version information for persisted snapshots
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::version::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_coord_index_roundtrip() {
        let coord = CellCoord::new(3, 2);
        let index = coord.to_index(4);

        assert_eq!(index, 11);
        assert_eq!(CellCoord::from_index(index, 4), coord);
    }

    #[test]
    fn test_version_compatibility() {
        let v1 = SchemaVersion::new(1, 0, 0);
        let v2 = SchemaVersion::new(1, 1, 0);
        let v3 = SchemaVersion::new(2, 0, 0);

        // v2 can read v1 data (newer version reading older data)
        assert!(v2.can_read(&v1));
        // Different major versions are incompatible
        assert!(!v1.can_read(&v3));
    }
}
