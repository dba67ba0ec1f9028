//! Configuration knobs for normalization and the probability fixpoint.
//!
//! Mirrors the teacher's `Config`/`InternalConfig` split: a small, `serde`-derived
//! surface a caller can load from a config file, even though this crate has no
//! wire format of its own.
use displaydoc::Display;
use serde::{Deserialize, Serialize};

/// Which behavior the CNF normalizer's DEL step uses when splitting a production
/// on a nullable occurrence into a "with" and a "without" variant.
///
/// See `DESIGN.md` for the full discussion: the reference algorithm this crate is
/// modeled on multiplies the "without" variant's weight by `p_null` and leaves the
/// "with" variant at its original weight (not `1 - p_null`), which double counts
/// probability mass. [`NullateMode::Preserved`] keeps that behavior, matching the
/// reference probabilities worked out by hand for the integration tests;
/// [`NullateMode::Corrected`] weights the "with" variant by `1 - p_null` instead.
#[derive(Debug, Display, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum NullateMode {
    /// Preserve the original (known-approximate) weighting. Default.
    #[default]
    Preserved,
    /// Correct the "with" variant's weight to `1 - p_null`.
    Corrected,
}

/// Tunable knobs for the probability fixpoint iteration over an SPPF.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FixpointConfig {
    /// Absolute tolerance: a pass converges once no node's estimate decreased by
    /// more than this amount. Defaults to `1e-15`.
    pub tolerance: f64,
    /// An upper bound on the number of passes. Hitting this cap is logged as a
    /// warning (it would mean the documented convergence guarantee did not hold)
    /// but never panics, since a caller may legitimately want a bounded amount of
    /// work out of a pathological forest.
    pub max_iterations: usize,
}

impl Default for FixpointConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-15,
            max_iterations: 10_000,
        }
    }
}

/// The configuration of the core engine. This should suffice for most scenarios.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// How the CNF normalizer's nullable-splitting step weights its two variants.
    pub nullate_mode: NullateMode,
    /// Tunables for the probability fixpoint.
    pub fixpoint: FixpointConfig,
}
