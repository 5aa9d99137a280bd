//! Persistent storage for trained model artifacts.

mod artifacts;

pub use artifacts::{ArtifactKind, ArtifactStore, Stored};
