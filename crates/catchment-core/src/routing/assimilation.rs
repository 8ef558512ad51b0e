//! Discharge assimilation at gauges.
//!
//! Each gauge with a usable observation yields a ratio `observed/simulated`.
//! Every cell whose first downstream gauge it is gets a discharge multiplier
//! that decays linearly to 1 at `max_distance` upstream of the gauge, and a
//! soil multiplier applied to its unsaturated store. Both are clipped to the
//! configured multiplier bounds.
use super::constants::MIN_SIMULATED_DISCHARGE;
use crate::config::{AssimilationConfig, ZeroObservationPolicy};
use crate::network::DrainageNetwork;

/// Per-cell multipliers for one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub discharge: Vec<f64>,
    pub soil: Vec<f64>,
    /// Ratio used at each gauge, `None` where the gauge was skipped.
    pub ratios: Vec<Option<f64>>,
}

/// Observed over simulated discharge at one gauge, `None` when unusable.
pub fn gauge_ratio(simulated: f64, observed: Option<f64>, policy: ZeroObservationPolicy) -> Option<f64> {
    let observed = observed.filter(|q| q.is_finite() && *q >= 0.0)?;
    if simulated <= MIN_SIMULATED_DISCHARGE {
        return None;
    }
    if observed == 0.0 && policy == ZeroObservationPolicy::Skip {
        return None;
    }
    Some(observed / simulated)
}

impl Correction {
    /// Multipliers from the simulated discharge and the gauge observations.
    ///
    /// Returns `None` when no gauge has a usable observation.
    pub fn compute(
        network: &DrainageNetwork,
        config: &AssimilationConfig,
        discharge: &[f64],
        observed: &[Option<f64>],
    ) -> Option<Self> {
        let n = network.n_cells();
        let ratios: Vec<Option<f64>> = config
            .gauge_cells
            .iter()
            .enumerate()
            .map(|(i, &cell)| {
                gauge_ratio(
                    discharge[cell],
                    observed.get(i).copied().flatten(),
                    config.zero_observation,
                )
            })
            .collect();
        if ratios.iter().all(Option::is_none) {
            return None;
        }

        let mut marked = vec![false; n];
        let mut ratio_at = vec![None; n];
        for (&cell, &ratio) in config.gauge_cells.iter().zip(&ratios) {
            marked[cell] = true;
            ratio_at[cell] = ratio;
        }
        let zone = network.downstream_marker(&marked);
        let distance = network.distance_to_marked(&marked, config.max_distance);

        let (lo, hi) = (config.min_multiplier, config.max_multiplier);
        let up = config.discharge_fraction;
        let mut discharge_mult = vec![1.0; n];
        let mut soil_mult = vec![1.0; n];
        for cell in 0..n {
            if let Some(r) = zone[cell].and_then(|g| ratio_at[g]) {
                let kin = (1.0 + (r - 1.0) * up).clamp(lo, hi);
                discharge_mult[cell] = kin + (1.0 - kin) * distance[cell] / config.max_distance;
                soil_mult[cell] = (1.0 + (r - 1.0) * (1.0 - up)).clamp(lo, hi);
            }
        }

        Some(Self {
            discharge: discharge_mult,
            soil: soil_mult,
            ratios,
        })
    }
}
