//! HBV-type snow pack and soil temperature.
//!
//! Pure functions for precipitation phase partitioning, degree-day melt and
//! refreezing, free-water retention, frozen-soil infiltration reduction and
//! the mass-wasting transport capacity.
use super::params::SnowParams;
use super::processes::s_curve;

/// Refreezing efficiency relative to the degree-day factor.
pub const REFREEZE_EFFICIENCY: f64 = 0.05;

/// Steepness of the frozen-soil reduction curve.
pub const FROZEN_SOIL_STEEPNESS: f64 = 8.0;

/// Tangent of 80 degrees, the slope at which mass wasting saturates.
pub const MASS_WASTING_SLOPE: f64 = 5.67;

/// Largest share of the pack moved downslope in one step.
pub const MASS_WASTING_MAX_FRACTION: f64 = 0.5;

/// Pack depth at which mass wasting reaches full strength [mm].
pub const MAX_SNOW_PACK: f64 = 10_000.0;

/// Outcome of one snow pack update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnowUpdate {
    pub snow: f64,
    pub snow_water: f64,
    pub snowfall: f64,
    pub melt: f64,
    pub refreeze: f64,
    /// Liquid water leaving the pack: rain plus melt above the holding capacity.
    pub outflow: f64,
}

/// Fraction of precipitation falling as rain.
///
/// Ramps linearly over `[tt - tti/2, tt + tti/2]`; a step at `tt` when the
/// interval has zero width.
pub fn rain_fraction(temp: f64, tt: f64, tti: f64) -> f64 {
    if tti == 0.0 {
        if temp <= tt {
            0.0
        } else {
            1.0
        }
    } else {
        ((temp - (tt - 0.5 * tti)) / tti).clamp(0.0, 1.0)
    }
}

/// Advance the snow pack by one step.
///
/// `cfmax` must already be scaled to the timestep.
pub fn update_pack(
    snow: f64,
    snow_water: f64,
    precip: f64,
    temp: f64,
    params: &SnowParams,
    cfmax: f64,
) -> SnowUpdate {
    let rain_frac = rain_fraction(temp, params.tt, params.tti);
    let snowfall = (1.0 - rain_frac) * precip;
    let rainfall = rain_frac * precip;

    let melt = if temp > params.ttm {
        (cfmax * (temp - params.ttm)).min(snow)
    } else {
        0.0
    };
    let refreeze = if temp < params.ttm {
        (cfmax * REFREEZE_EFFICIENCY * (params.ttm - temp)).min(snow_water)
    } else {
        0.0
    };

    let new_snow = snow + snowfall + refreeze - melt;
    let held = snow_water - refreeze + melt + rainfall;
    let max_held = new_snow * params.whc;
    let outflow = (held - max_held).max(0.0);

    SnowUpdate {
        snow: new_snow,
        snow_water: held - outflow,
        snowfall,
        melt,
        refreeze,
        outflow,
    }
}

/// Relax the soil temperature towards the air temperature.
pub fn update_soil_temperature(tsoil: f64, temp: f64, weight: f64) -> f64 {
    tsoil + weight.clamp(0.0, 1.0) * (temp - tsoil)
}

/// Infiltration multiplier in `[cf_soil, 1]`, near `cf_soil` when frozen.
pub fn frozen_soil_factor(tsoil: f64, cf_soil: f64) -> f64 {
    cf_soil + (1.0 - cf_soil) * s_curve(tsoil, 0.0, 1.0, FROZEN_SOIL_STEEPNESS)
}

/// Dry snow a cell may shed downslope in one step [mm].
pub fn mass_wasting_capacity(snow: f64, slope: f64) -> f64 {
    let frac = (slope / MASS_WASTING_SLOPE).min(MASS_WASTING_MAX_FRACTION)
        * (snow / MAX_SNOW_PACK).min(1.0);
    frac * snow
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

    fn params() -> SnowParams {
        SnowParams {
            tt: 0.0,
            tti: 2.0,
            ttm: 0.0,
            cfmax: 3.0,
            whc: 0.1,
            w_soil: 0.1,
            cf_soil: 0.05,
        }
    }

    // -- Phase partitioning --

    #[test]
    fn rain_fraction_ramps_smoothly() {
        assert_eq!(rain_fraction(-2.0, 0.0, 2.0), 0.0);
        assert_approx(rain_fraction(-0.5, 0.0, 2.0), 0.25, 1e-12);
        assert_approx(rain_fraction(0.0, 0.0, 2.0), 0.5, 1e-12);
        assert_eq!(rain_fraction(3.0, 0.0, 2.0), 1.0);
    }

    #[test]
    fn zero_interval_is_a_step() {
        assert_eq!(rain_fraction(0.0, 0.0, 0.0), 0.0);
        assert_eq!(rain_fraction(0.1, 0.0, 0.0), 1.0);
    }

    // -- Pack update --

    #[test]
    fn cold_precipitation_accumulates() {
        let up = update_pack(0.0, 0.0, 10.0, -5.0, &params(), 3.0);
        assert_approx(up.snow, 10.0, 1e-12);
        assert_eq!(up.melt, 0.0);
        assert_eq!(up.outflow, 0.0);
    }

    #[test]
    fn warm_day_melts_and_spills() {
        let up = update_pack(20.0, 0.0, 0.0, 4.0, &params(), 3.0);
        assert_approx(up.melt, 12.0, 1e-12);
        assert_approx(up.snow, 8.0, 1e-12);
        // Holds 0.8 mm, the rest leaves the pack.
        assert_approx(up.snow_water, 0.8, 1e-12);
        assert_approx(up.outflow, 11.2, 1e-12);
    }

    #[test]
    fn melt_limited_by_pack() {
        let up = update_pack(2.0, 0.0, 0.0, 10.0, &params(), 3.0);
        assert_approx(up.melt, 2.0, 1e-12);
        assert_eq!(up.snow, 0.0);
        assert_approx(up.outflow, 2.0, 1e-12);
    }

    #[test]
    fn refreeze_limited_by_free_water() {
        let up = update_pack(10.0, 0.1, 0.0, -10.0, &params(), 3.0);
        assert_approx(up.refreeze, 0.1, 1e-12);
        assert_approx(up.snow, 10.1, 1e-12);
        assert_eq!(up.snow_water, 0.0);
    }

    #[test]
    fn pack_conserves_mass() {
        let (snow, water, precip) = (15.0, 1.0, 6.0);
        for temp in [-4.0, -0.5, 0.3, 2.0, 7.0] {
            let up = update_pack(snow, water, precip, temp, &params(), 3.0);
            assert_approx(
                up.snow + up.snow_water + up.outflow,
                snow + water + precip,
                1e-12,
            );
        }
    }

    // -- Soil temperature --

    #[test]
    fn frozen_soil_factor_bounds() {
        assert_approx(frozen_soil_factor(-20.0, 0.05), 0.05, 1e-9);
        assert_approx(frozen_soil_factor(20.0, 0.05), 1.0, 1e-9);
        assert_approx(frozen_soil_factor(0.0, 0.0), 0.5, 1e-12);
    }

    #[test]
    fn soil_temperature_relaxes() {
        assert_approx(update_soil_temperature(10.0, 0.0, 0.25), 7.5, 1e-12);
        assert_eq!(update_soil_temperature(10.0, 0.0, 2.0), 0.0);
    }

    #[test]
    fn mass_wasting_capacity_scales() {
        assert_eq!(mass_wasting_capacity(0.0, 1.0), 0.0);
        assert_eq!(mass_wasting_capacity(500.0, 0.0), 0.0);
        // Steep slope caps at half, 5000 mm pack gives half strength.
        assert_approx(mass_wasting_capacity(5000.0, 10.0), 0.25 * 5000.0, 1e-9);
    }
}
