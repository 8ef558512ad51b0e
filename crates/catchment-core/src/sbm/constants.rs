/// Vertical column numerical constants and parameter bounds.
///
/// Centralises the fixed values used by the soil, canopy and snow processes.

// -- Column contract constants --

/// Interception switches from modified Rutter to Gash at this timestep [s].
pub const GASH_MIN_TIMESTEP_SECS: f64 = 23.0 * 3600.0;

/// Stemflow as a fraction of the canopy gap fraction.
pub const STEMFLOW_GAP_RATIO: f64 = 0.1;

/// Saturation deficit below which no unsaturated transfer happens [mm].
pub const MIN_SATURATION_DEFICIT: f64 = 1.0e-5;

/// Rooting depth is limited to this fraction of the soil thickness.
pub const MAX_ROOTING_FRACTION: f64 = 0.99;

/// Share of the unsaturated store roots can reach when all of it is available.
pub const WHOLE_USTORE_AVAILABILITY: f64 = 0.99;

/// Steepness of the saturation-excess (exfiltration) curve.
pub const EXFILTRATION_STEEPNESS: f64 = 5.0;

/// At most this share of channel water re-infiltrates per step.
pub const MAX_REINFILTRATION_SHARE: f64 = 0.7;

/// Exponent limit keeping the logistic curve finite.
pub const S_CURVE_EXPONENT_LIMIT: f64 = 700.0;

/// Number of values per cell in the flat column state.
pub const COLUMN_STATE_SIZE: usize = 6;

// -- Parameter bounds --

/// Inclusive validity range for a parameter.
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Dimensionless fractions [-].
pub const FRACTION_BOUNDS: Bounds = Bounds { min: 0.0, max: 1.0 };

/// Depths, rates and capacities that may be zero [mm] or [mm/d].
pub const NON_NEGATIVE_BOUNDS: Bounds = Bounds {
    min: 0.0,
    max: f64::MAX,
};

/// Water holding capacity of the snow pack [-].
pub const WHC_BOUNDS: Bounds = Bounds { min: 0.0, max: 1.0 };
