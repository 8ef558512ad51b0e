//! Canopy interception.
//!
//! Two schemes: the analytic Gash model for daily or longer timesteps, which
//! never adds to the canopy store, and a modified Rutter model with an
//! explicit store for shorter steps. Both route everything above the canopy
//! capacity to throughfall within the same step.
use super::constants::STEMFLOW_GAP_RATIO;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interception {
    pub throughfall: f64,
    pub stemflow: f64,
    /// Water evaporated from the canopy.
    pub evaporation: f64,
    /// Canopy store after the step.
    pub canopy: f64,
    /// Potential evaporation left for soil, open water and transpiration.
    pub remaining_demand: f64,
}

/// Stemflow fraction, kept small enough that gap and stem flow never
/// exceed the gross precipitation.
fn stemflow_fraction(gap_fraction: f64) -> f64 {
    (STEMFLOW_GAP_RATIO * gap_fraction).min(1.0 - gap_fraction).max(0.0)
}

/// Gash (1995) analytic interception for one storm per timestep.
pub fn gash(
    precip: f64,
    potential_evaporation: f64,
    canopy: f64,
    max_storage: f64,
    gap_fraction: f64,
    evap_over_rain: f64,
) -> Interception {
    let max_storage = max_storage.max(0.0);
    // Carry-over above capacity drains as throughfall.
    let excess = (canopy - max_storage).max(0.0);
    let canopy = canopy - excess;
    if max_storage <= 0.0 || precip <= 0.0 {
        return Interception {
            throughfall: precip + excess,
            stemflow: 0.0,
            evaporation: 0.0,
            canopy,
            remaining_demand: potential_evaporation,
        };
    }

    let pt = stemflow_fraction(gap_fraction);
    let canopy_share = (1.0 - gap_fraction - pt).max(0.0);

    // Gross precipitation needed to saturate the canopy.
    let p_sat = if evap_over_rain > 0.0 && evap_over_rain < canopy_share {
        (-max_storage / evap_over_rain * (1.0 - evap_over_rain / canopy_share).ln()).max(0.0)
    } else {
        0.0
    };

    let (wetting, saturated, drying) = if precip > p_sat {
        (
            canopy_share * p_sat - max_storage,
            evap_over_rain * (precip - p_sat),
            max_storage,
        )
    } else {
        (canopy_share * precip, 0.0, 0.0)
    };

    let stemflow = pt * precip;
    let gross = (wetting + saturated + drying).clamp(0.0, precip - stemflow);
    let evaporation = gross.min(potential_evaporation.max(0.0));

    Interception {
        throughfall: precip - stemflow - evaporation + excess,
        stemflow,
        evaporation,
        canopy,
        remaining_demand: (potential_evaporation - evaporation).max(0.0),
    }
}

/// Modified Rutter interception with an explicit canopy store.
pub fn rutter(
    precip: f64,
    potential_evaporation: f64,
    canopy: f64,
    max_storage: f64,
    gap_fraction: f64,
) -> Interception {
    let max_storage = max_storage.max(0.0);
    let pt = stemflow_fraction(gap_fraction);
    let to_canopy = (1.0 - gap_fraction - pt).max(0.0) * precip;

    // Drain anything above capacity left over from before.
    let early_drain = (canopy - max_storage).max(0.0);
    let mut store = canopy - early_drain + to_canopy;

    let evaporation = store.min(potential_evaporation.max(0.0));
    store -= evaporation;

    let late_drain = (store - max_storage).max(0.0);
    store -= late_drain;

    Interception {
        throughfall: early_drain + late_drain + gap_fraction * precip,
        stemflow: pt * precip,
        evaporation,
        canopy: store,
        remaining_demand: (potential_evaporation - evaporation).max(0.0),
    }
}
