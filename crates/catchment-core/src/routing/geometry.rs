//! Channel hydraulic geometry.
//!
//! Manning's equation on a rectangular channel gives the storage relation
//! `A = alpha * Q^beta`, with `alpha` depending on the wetted perimeter and
//! therefore on the current water depth.
use serde::{Deserialize, Serialize};

use super::constants::{ALPHA_POWER, BETA};
use crate::error::ParameterError;
use crate::sbm::params::check_positive;

/// Per-cell channel parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParams {
    /// Channel width [m].
    pub width: f64,
    /// Manning roughness [s/m^(1/3)].
    pub manning_n: f64,
    /// Channel bed slope [m/m].
    pub slope: f64,
    /// Channel length within the cell [m].
    pub length: f64,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            width: 2.0,
            manning_n: 0.072,
            slope: 0.01,
            length: 1000.0,
        }
    }
}

impl ChannelParams {
    pub fn validate(&self, cell: usize) -> Result<(), ParameterError> {
        check_positive(cell, "channel.width", self.width)?;
        check_positive(cell, "channel.manning_n", self.manning_n)?;
        check_positive(cell, "channel.slope", self.slope)?;
        check_positive(cell, "channel.length", self.length)?;
        Ok(())
    }
}

/// Run-constant geometry of one channel cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelGeometry {
    alpha_term: f64,
    width: f64,
    length: f64,
}

impl ChannelGeometry {
    pub fn new(params: &ChannelParams) -> Self {
        Self {
            alpha_term: (params.manning_n / params.slope.sqrt()).powf(BETA),
            width: params.width,
            length: params.length,
        }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Water depth for a stored volume [m].
    pub fn level(&self, storage: f64) -> f64 {
        storage.max(0.0) / (self.width * self.length)
    }

    /// `alpha` of the storage relation at the current depth.
    pub fn alpha(&self, storage: f64) -> f64 {
        let perimeter = self.width + 2.0 * self.level(storage);
        self.alpha_term * perimeter.powf(ALPHA_POWER)
    }

    /// Volume consistent with discharge `q` under the given `alpha` [m3].
    pub fn storage_for(&self, discharge: f64, alpha: f64) -> f64 {
        alpha * discharge.max(0.0).powf(BETA) * self.length
    }
}

/// Bankfull river width from a discharge scaled by contributing area.
///
/// `relative_area` is the cell's contributing area over the largest one,
/// `alf` the width-to-depth shape factor.
pub fn estimate_width(
    relative_area: f64,
    slope: f64,
    manning_n: f64,
    alf: f64,
    annual_discharge: f64,
) -> f64 {
    let discharge = annual_discharge * relative_area.clamp(0.0, 1.0);
    (alf * (alf + 2.0).powf(2.0 / 3.0)).powf(0.375)
        * discharge.powf(0.375)
        * slope.powf(-0.1875)
        * manning_n.powf(0.375)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    fn params() -> ChannelParams {
        ChannelParams {
            width: 4.0,
            manning_n: 0.04,
            slope: 0.0025,
            length: 500.0,
        }
    }

    #[test]
    fn empty_channel_alpha_uses_width_only() {
        let geo = ChannelGeometry::new(&params());
        let expected = (0.04f64 / 0.05).powf(0.6) * 4.0f64.powf(0.4);
        assert_approx(geo.alpha(0.0), expected, 1e-12);
    }

    #[test]
    fn alpha_grows_with_depth() {
        let geo = ChannelGeometry::new(&params());
        assert_approx(geo.level(2000.0), 1.0, 1e-12);
        assert!(geo.alpha(2000.0) > geo.alpha(0.0));
    }

    #[test]
    fn storage_for_zero_discharge_is_empty() {
        let geo = ChannelGeometry::new(&params());
        assert_eq!(geo.storage_for(0.0, geo.alpha(0.0)), 0.0);
    }

    #[test]
    fn width_increases_with_area() {
        let small = estimate_width(0.1, 0.01, 0.04, 60.0, 300.0);
        let large = estimate_width(1.0, 0.01, 0.04, 60.0, 300.0);
        assert!(large > small && small > 0.0);
        assert_approx(large / small, 10f64.powf(0.375), 1e-9);
    }

    #[test]
    fn validate_rejects_zero_roughness() {
        let mut p = params();
        p.manning_n = 0.0;
        assert!(p.validate(3).is_err());
        assert!(params().validate(3).is_ok());
    }
}
