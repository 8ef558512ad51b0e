//! Run controls.
//!
//! Everything that used to be module-level switches lives here and is handed
//! to [`crate::Catchment::new`] once. Unspecified fields take the defaults
//! below when deserialized.
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Seconds in the base (daily) timestep that per-day rates refer to.
pub const BASE_TIMESTEP_SECS: f64 = 86_400.0;

/// Scalar controls for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Timestep length [s].
    #[serde(default = "default_timestep_secs")]
    pub timestep_secs: f64,

    /// Number of kinematic-wave sub-steps per timestep.
    #[serde(default = "default_kinematic_substeps")]
    pub kinematic_substeps: usize,

    /// Abstraction loop stops once the supply changes less than this [m3/s].
    #[serde(default = "default_supply_tolerance")]
    pub supply_tolerance: f64,

    /// Upper bound on abstraction loop iterations.
    #[serde(default = "default_max_supply_iterations")]
    pub max_supply_iterations: usize,

    // -- Sub-model switches --
    #[serde(default)]
    pub snow: bool,

    /// Gravity transport of dry snow downslope. Needs `snow`.
    #[serde(default)]
    pub mass_wasting: bool,

    #[serde(default = "default_true")]
    pub reservoirs: bool,

    /// Honour negative inflows as withdrawal requests.
    #[serde(default = "default_true")]
    pub abstractions: bool,

    /// Let channel water infiltrate back into the unsaturated store.
    #[serde(default)]
    pub reinfiltration: bool,

    #[serde(default = "default_true")]
    pub lateral_subsurface_flow: bool,

    /// Sigmoid saturated-area runoff. Needs subgrid parameters.
    #[serde(default)]
    pub subgrid_runoff: bool,

    /// Treat the whole unsaturated store as available to roots.
    #[serde(default)]
    pub whole_ustore_available: bool,

    /// Withdraw the transpiration deficit of irrigation areas at their
    /// intakes. Needs irrigation parameters.
    #[serde(default)]
    pub irrigation: bool,

    // -- Cold start --
    #[serde(default = "default_initial_saturation_fraction")]
    pub initial_saturation_fraction: f64,

    #[serde(default = "default_initial_soil_temperature")]
    pub initial_soil_temperature: f64,

    /// Largest acceptable closure residual [mm].
    #[serde(default = "default_mass_balance_tolerance")]
    pub mass_balance_tolerance: f64,

    /// Run the per-cell column phases on the rayon pool.
    #[serde(default = "default_true")]
    pub parallel: bool,

    #[serde(default)]
    pub assimilation: Option<AssimilationConfig>,
}

fn default_timestep_secs() -> f64 {
    BASE_TIMESTEP_SECS
}
fn default_kinematic_substeps() -> usize {
    1
}
fn default_supply_tolerance() -> f64 {
    1.0e-4
}
fn default_max_supply_iterations() -> usize {
    5
}
fn default_true() -> bool {
    true
}
fn default_initial_saturation_fraction() -> f64 {
    0.85
}
fn default_initial_soil_temperature() -> f64 {
    10.0
}
fn default_mass_balance_tolerance() -> f64 {
    1.0e-6
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timestep_secs: default_timestep_secs(),
            kinematic_substeps: default_kinematic_substeps(),
            supply_tolerance: default_supply_tolerance(),
            max_supply_iterations: default_max_supply_iterations(),
            snow: false,
            mass_wasting: false,
            reservoirs: true,
            abstractions: true,
            reinfiltration: false,
            lateral_subsurface_flow: true,
            subgrid_runoff: false,
            whole_ustore_available: false,
            irrigation: false,
            initial_saturation_fraction: default_initial_saturation_fraction(),
            initial_soil_temperature: default_initial_soil_temperature(),
            mass_balance_tolerance: default_mass_balance_tolerance(),
            parallel: true,
            assimilation: None,
        }
    }
}

impl RunConfig {
    /// Timestep length as a fraction of a day, used to scale per-day rates.
    pub fn day_fraction(&self) -> f64 {
        self.timestep_secs / BASE_TIMESTEP_SECS
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.timestep_secs.is_finite() && self.timestep_secs > 0.0) {
            return Err(ConfigError::invalid(
                "timestep_secs",
                self.timestep_secs,
                "must be positive",
            ));
        }
        if self.kinematic_substeps == 0 {
            return Err(ConfigError::invalid(
                "kinematic_substeps",
                self.kinematic_substeps,
                "must be at least 1",
            ));
        }
        if self.max_supply_iterations == 0 {
            return Err(ConfigError::invalid(
                "max_supply_iterations",
                self.max_supply_iterations,
                "must be at least 1",
            ));
        }
        if !(self.supply_tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                "supply_tolerance",
                self.supply_tolerance,
                "must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.initial_saturation_fraction) {
            return Err(ConfigError::invalid(
                "initial_saturation_fraction",
                self.initial_saturation_fraction,
                "must lie in [0, 1]",
            ));
        }
        if !self.initial_soil_temperature.is_finite() {
            return Err(ConfigError::invalid(
                "initial_soil_temperature",
                self.initial_soil_temperature,
                "must be finite",
            ));
        }
        if !(self.mass_balance_tolerance > 0.0) {
            return Err(ConfigError::invalid(
                "mass_balance_tolerance",
                self.mass_balance_tolerance,
                "must be positive",
            ));
        }
        if self.mass_wasting && !self.snow {
            return Err(ConfigError::invalid(
                "mass_wasting",
                self.mass_wasting,
                "requires the snow sub-model",
            ));
        }
        if let Some(assim) = &self.assimilation {
            assim.validate()?;
        }
        Ok(())
    }
}

/// What to do with an observed discharge of exactly zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroObservationPolicy {
    /// Treat it like a missing observation.
    #[default]
    Skip,
    /// Use ratio 0, which the multiplier bounds clip to `min_multiplier`.
    Apply,
}

/// Observed-discharge nudging of discharge and unsaturated storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssimilationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Gauge cells, in the column order of the observed-discharge forcing.
    pub gauge_cells: Vec<usize>,

    /// Along-network distance beyond which discharge is left untouched [m].
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,

    #[serde(default = "default_min_multiplier")]
    pub min_multiplier: f64,

    #[serde(default = "default_max_multiplier")]
    pub max_multiplier: f64,

    /// Share of the correction given to discharge; the rest goes to soil.
    #[serde(default = "default_discharge_fraction")]
    pub discharge_fraction: f64,

    #[serde(default)]
    pub zero_observation: ZeroObservationPolicy,
}

fn default_max_distance() -> f64 {
    100.0
}
fn default_min_multiplier() -> f64 {
    0.7
}
fn default_max_multiplier() -> f64 {
    1.3
}
fn default_discharge_fraction() -> f64 {
    0.8
}

impl AssimilationConfig {
    pub fn new(gauge_cells: Vec<usize>) -> Self {
        Self {
            enabled: true,
            gauge_cells,
            max_distance: default_max_distance(),
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
            discharge_fraction: default_discharge_fraction(),
            zero_observation: ZeroObservationPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_distance > 0.0) {
            return Err(ConfigError::invalid(
                "assimilation.max_distance",
                self.max_distance,
                "must be positive",
            ));
        }
        if !(self.min_multiplier >= 0.0 && self.min_multiplier <= 1.0) {
            return Err(ConfigError::invalid(
                "assimilation.min_multiplier",
                self.min_multiplier,
                "must lie in [0, 1]",
            ));
        }
        if !(self.max_multiplier >= 1.0 && self.max_multiplier.is_finite()) {
            return Err(ConfigError::invalid(
                "assimilation.max_multiplier",
                self.max_multiplier,
                "must be finite and at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.discharge_fraction) {
            return Err(ConfigError::invalid(
                "assimilation.discharge_fraction",
                self.discharge_fraction,
                "must lie in [0, 1]",
            ));
        }
        Ok(())
    }
}
