//! Simple reservoirs.
//!
//! A reservoir replaces the kinematic update at its cell with a storage
//! release rule. Its cell is rerouted once at setup to drain to the
//! designated outlet, so the release enters the network there.
use serde::{Deserialize, Serialize};

use super::constants::MIN_RELEASE_STEEPNESS;
use crate::error::ParameterError;
use crate::sbm::params::{check_fraction, check_non_negative, check_positive};
use crate::sbm::processes::s_curve;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReservoirParams {
    /// Cell holding the reservoir.
    pub cell: usize,
    /// Maximum volume [m3].
    pub max_volume: f64,
    /// Fill fraction above which the reservoir releases its surplus [-].
    pub target_full_frac: f64,
    /// Fill fraction below which the minimum release fades out [-].
    pub target_min_frac: f64,
    /// Largest controlled release [m3/s].
    pub max_release: f64,
    /// Downstream demand, the release while comfortably filled [m3/s].
    pub demand: f64,
    /// Cell receiving the release; the natural downstream cell when `None`.
    #[serde(default)]
    pub outlet: Option<usize>,
}

impl ReservoirParams {
    pub fn validate(&self) -> Result<(), ParameterError> {
        let cell = self.cell;
        check_positive(cell, "reservoir.max_volume", self.max_volume)?;
        check_fraction(cell, "reservoir.target_full_frac", self.target_full_frac)?;
        check_fraction(cell, "reservoir.target_min_frac", self.target_min_frac)?;
        check_non_negative(cell, "reservoir.max_release", self.max_release)?;
        check_non_negative(cell, "reservoir.demand", self.demand)?;
        Ok(())
    }

    /// Cold-start volume: filled to the target fraction.
    pub fn initial_volume(&self) -> f64 {
        self.target_full_frac * self.max_volume
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservoirUpdate {
    pub volume: f64,
    /// Controlled release [m3/s].
    pub release: f64,
    /// Volume spilled above `max_volume` [m3].
    pub spill: f64,
    /// Withdrawal the reservoir could not supply [m3].
    pub shortfall: f64,
}

/// Controlled release for the current fill [m3/s].
///
/// Clipped to `[min_release, max_release]` and to what the reservoir holds.
pub fn release(params: &ReservoirParams, volume: f64, dts: f64) -> f64 {
    let fill = volume / params.max_volume;
    let min_release = s_curve(fill, params.target_min_frac, 1.0, MIN_RELEASE_STEEPNESS) * params.demand;
    let target = (volume - params.target_full_frac * params.max_volume).max(0.0) / dts;
    target
        .max(min_release)
        .min(params.max_release)
        .min(volume.max(0.0) / dts)
}

/// Advance a reservoir by one sub-step with `inflow` [m3/s].
pub fn update(params: &ReservoirParams, volume: f64, inflow: f64, dts: f64) -> ReservoirUpdate {
    let release = release(params, volume, dts);
    let mut new_volume = volume + (inflow - release) * dts;
    let mut shortfall = 0.0;
    if new_volume < 0.0 {
        shortfall = -new_volume;
        new_volume = 0.0;
    }
    let spill = (new_volume - params.max_volume).max(0.0);
    ReservoirUpdate {
        volume: new_volume - spill,
        release,
        spill,
        shortfall,
    }
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

    fn params() -> ReservoirParams {
        ReservoirParams {
            cell: 0,
            max_volume: 1.0e6,
            target_full_frac: 0.8,
            target_min_frac: 0.2,
            max_release: 50.0,
            demand: 5.0,
            outlet: None,
        }
    }

    // -- Release rule --

    #[test]
    fn comfortable_fill_releases_demand() {
        let r = release(&params(), 5.0e5, 86400.0);
        assert_approx(r, 5.0, 1e-3);
    }

    #[test]
    fn near_empty_release_fades() {
        let r = release(&params(), 1.0e4, 86400.0);
        assert!(r < 0.02, "release {r}");
    }

    #[test]
    fn surplus_released_up_to_max() {
        // 100 000 m3 above target over one hour is ~27.8 m3/s.
        let r = release(&params(), 9.0e5, 3600.0);
        assert_approx(r, 1.0e5 / 3600.0, 1e-9);
        let r = release(&params(), 9.9e5, 3600.0);
        assert_approx(r, 50.0, 1e-12);
    }

    #[test]
    fn release_limited_by_volume() {
        let mut p = params();
        p.target_min_frac = 0.0;
        p.demand = 100.0;
        p.max_release = 100.0;
        let r = release(&p, 3600.0, 3600.0);
        assert_approx(r, 1.0, 1e-12);
    }

    // -- Storage update --

    #[test]
    fn update_conserves_volume() {
        let p = params();
        let (volume, inflow, dts) = (6.0e5, 6.0, 86400.0);
        let up = update(&p, volume, inflow, dts);
        assert_eq!(up.spill, 0.0);
        assert_approx(up.volume, volume + inflow * dts - up.release * dts, 1e-6);
        assert!(up.release >= 0.0 && up.release <= p.max_release);
    }

    #[test]
    fn overflow_spills() {
        let p = params();
        let up = update(&p, 9.9e5, 100.0, 3600.0);
        assert!(up.spill > 0.0);
        assert_approx(up.volume, p.max_volume, 1e-6);
    }

    #[test]
    fn validate_rejects_zero_volume() {
        let mut p = params();
        p.max_volume = 0.0;
        assert!(p.validate().is_err());
        assert_approx(params().initial_volume(), 8.0e5, 1e-6);
    }
}
