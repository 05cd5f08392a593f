//! Fingerprint-based cache for Carthage builds
//!
//! Decides whether the `Carthage/Build` outputs of a previous bootstrap can
//! be reused, keyed by a digest of the project's dependency state.
//!
//! # Fingerprint inputs (in order)
//!
//! | Input | Missing |
//! |-------|---------|
//! | `Cartfile` | folded in as absent |
//! | `Cartfile.resolved` | folded in as absent |
//! | xcconfig override | folded in as absent |
//! | `swift -version` text | always present |
//!
//! # Decision
//!
//! | Prior state | Payload | Status |
//! |-------------|---------|--------|
//! | none | any | Miss |
//! | different fingerprint | any | Miss |
//! | same fingerprint | missing or damaged | Miss |
//! | same fingerprint | restorable | Hit |

pub mod artifact;
pub mod engine;
pub mod fingerprint;
pub mod project;
pub mod state;

pub use artifact::{ArtifactCache, DirArtifactCache};
pub use engine::{CacheEngine, CacheStatus, Decision, MissReason};
pub use fingerprint::{build_fingerprint, Fingerprint, FingerprintInputs};
pub use project::Project;
pub use state::{FileStateStore, PersistedState, StateStore};
