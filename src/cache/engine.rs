//! Cache decision engine
//!
//! Decides once per run whether the cached Carthage build can be reused.
//! A hit needs both a persisted fingerprint equal to the current one and a
//! payload the artifact cache confirms is restorable; a matching fingerprint
//! alone is never enough.

use crate::cache::artifact::ArtifactCache;
use crate::cache::fingerprint::Fingerprint;
use crate::cache::project::Project;
use crate::cache::state::{PersistedState, StateStore};
use crate::error::StepResult;
use std::fmt;
use tracing::{debug, info};

/// Outcome of the cache decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No prior state has been consulted yet
    Unknown,
    /// Cached build is valid; skip the external build
    Hit,
    /// Cached build is absent or stale; run the external build
    Miss,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Hit => write!(f, "hit"),
            Self::Miss => write!(f, "miss"),
        }
    }
}

/// Why a miss was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No persisted state for this project
    NoPriorState,
    /// Persisted fingerprint differs from the current one
    FingerprintChanged,
    /// Fingerprint matches but the payload is gone or damaged
    PayloadUnavailable,
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPriorState => write!(f, "no previous cache state"),
            Self::FingerprintChanged => write!(f, "dependencies or toolchain changed"),
            Self::PayloadUnavailable => write!(f, "cached build outputs missing or damaged"),
        }
    }
}

/// The decision for one run; never mutated after it is made
#[derive(Debug, Clone)]
pub struct Decision {
    pub key: String,
    pub fingerprint: Fingerprint,
    pub prior: Option<PersistedState>,
    pub status: CacheStatus,
    pub miss_reason: Option<MissReason>,
}

impl Decision {
    pub fn is_hit(&self) -> bool {
        self.status == CacheStatus::Hit
    }

    fn hit(key: String, fingerprint: Fingerprint, prior: PersistedState) -> Self {
        Self {
            key,
            fingerprint,
            prior: Some(prior),
            status: CacheStatus::Hit,
            miss_reason: None,
        }
    }

    fn miss(
        key: String,
        fingerprint: Fingerprint,
        prior: Option<PersistedState>,
        reason: MissReason,
    ) -> Self {
        Self {
            key,
            fingerprint,
            prior,
            status: CacheStatus::Miss,
            miss_reason: Some(reason),
        }
    }
}

/// Reads and writes cache state around a Carthage build
pub struct CacheEngine<'a> {
    states: &'a dyn StateStore,
    artifacts: &'a dyn ArtifactCache,
}

impl<'a> CacheEngine<'a> {
    pub fn new(states: &'a dyn StateStore, artifacts: &'a dyn ArtifactCache) -> Self {
        Self { states, artifacts }
    }

    /// Decide hit or miss for `project` given its current fingerprint
    pub async fn decide(&self, project: &Project, fingerprint: Fingerprint) -> StepResult<Decision> {
        let key = project.state_key();
        let prior = self.states.load(&key).await?;
        debug!(
            "Cache state {} for {}: prior={}",
            CacheStatus::Unknown,
            key,
            prior
                .as_ref()
                .map(|p| p.fingerprint.short().to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        let Some(prior) = prior else {
            return Ok(Decision::miss(key, fingerprint, None, MissReason::NoPriorState));
        };

        if prior.fingerprint != fingerprint {
            return Ok(Decision::miss(
                key,
                fingerprint,
                Some(prior),
                MissReason::FingerprintChanged,
            ));
        }

        if !self.artifacts.is_restorable(&key, &fingerprint).await? {
            return Ok(Decision::miss(
                key,
                fingerprint,
                Some(prior),
                MissReason::PayloadUnavailable,
            ));
        }

        Ok(Decision::hit(key, fingerprint, prior))
    }

    /// Re-materialize build outputs for a hit, replacing whatever is on disk
    pub async fn restore(&self, project: &Project, decision: &Decision) -> StepResult<usize> {
        debug_assert!(decision.is_hit());
        let restored = self
            .artifacts
            .restore(&decision.key, project.root(), &project.build_outputs())
            .await?;
        info!("Restored {} cached build entries", restored);
        Ok(restored)
    }

    /// Record a successful build for a miss.
    ///
    /// The payload is registered before the state is written, so a persisted
    /// fingerprint never points at a payload that was not stored.
    pub async fn commit(&self, project: &Project, decision: &Decision) -> StepResult<()> {
        debug_assert!(!decision.is_hit());
        let registered = self
            .artifacts
            .register(
                &decision.key,
                &decision.fingerprint,
                project.root(),
                &project.build_outputs(),
            )
            .await?;

        self.states
            .save(&PersistedState::new(
                decision.key.clone(),
                decision.fingerprint.clone(),
            ))
            .await?;

        if registered == 0 {
            info!("No build outputs found, next run will build again");
        } else {
            info!(
                "Cached {} build entries for fingerprint {}",
                registered,
                decision.fingerprint.short()
            );
        }
        Ok(())
    }
}
