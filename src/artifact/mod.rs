//! # Artifact Storage
//!
//! Persistence of generated explanation artifacts (rendered images, HTML
//! tables) with deterministic, collision-free names and externally
//! resolvable URLs. Uniqueness, not locking, is the collision discipline:
//! names are pre-partitioned by request identity plus a random token, so
//! concurrent requests never contend.

pub mod errors;
pub mod json;
pub mod store;

pub use errors::{ArtifactError, ArtifactResult};
pub use json::canonical;
pub use store::{ArtifactBackend, ArtifactRecord, ArtifactSlot, ArtifactStore, LocalBackend, MimeKind};
