//! Kinematic-wave router constants.

/// Exponent of the storage relation `A = alpha * Q^beta`.
pub const BETA: f64 = 0.6;

/// Exponent of the wetted perimeter in `alpha`.
pub const ALPHA_POWER: f64 = 2.0 / 3.0 * BETA;

/// Smallest discharge the Newton iteration works with [m3/s].
pub const MIN_FLUX: f64 = 1.0e-12;

/// Newton residual tolerance [m2].
pub const NEWTON_TOLERANCE: f64 = 1.0e-12;

pub const MAX_NEWTON_ITERATIONS: usize = 3000;

/// Steepness of the reservoir minimum-release curve around the target
/// minimum fill.
pub const MIN_RELEASE_STEEPNESS: f64 = 30.0;

/// Simulated discharge below which a gauge ratio is not formed [m3/s].
pub const MIN_SIMULATED_DISCHARGE: f64 = 1.0e-9;

pub const MM_TO_M: f64 = 0.001;

// -- River width estimation defaults --

/// Width-to-depth shape factor.
pub const DEFAULT_WIDTH_ALF: f64 = 60.0;

/// Annual discharge at the largest contributing area [m3/s].
pub const DEFAULT_ANNUAL_DISCHARGE: f64 = 300.0;
