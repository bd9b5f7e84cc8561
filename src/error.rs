//! Errors returned at the configuration and snapshot boundaries.
//!
//! Nothing in the tick loop returns these: congestion and dangling
//! references are states to be queried, not errors.

use crate::vehicle::VehicleKind;
use thiserror::Error;

/// An invalid demand or simulation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A rate below zero was supplied for a vehicle class.
    #[error("negative {kind} rate: {value} vehicles/hour")]
    NegativeRate { kind: VehicleKind, value: i64 },

    /// A rate too large to be stored was supplied for a vehicle class.
    #[error("rate for {kind} exceeds {max} vehicles/hour: {value}")]
    RateTooLarge { kind: VehicleKind, value: i64, max: u32 },

    /// The demand multiplier was negative or not finite.
    #[error("invalid demand multiplier: {0}")]
    InvalidMultiplier(f64),

    /// The configuration document could not be parsed.
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// A failure to save or load a simulation snapshot.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The snapshot was written by a newer build.
    #[error("snapshot from future version {0} (this build supports up to {max})", max = crate::save::SAVE_VERSION)]
    FutureVersion(u32),

    /// The snapshot document could not be parsed.
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot parsed, but its contents contradict each other.
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}
