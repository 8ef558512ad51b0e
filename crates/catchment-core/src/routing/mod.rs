/// Kinematic-wave channel router.
///
/// Routes the lateral inflow of every cell down the drainage network in
/// `kinematic_substeps` explicit sweeps per timestep, with reservoirs,
/// withdrawals reconciled by fixed-point iteration, and optional gauge
/// assimilation.
pub mod abstraction;
pub mod assimilation;
pub mod constants;
pub mod geometry;
pub mod irrigation;
pub mod kinematic;
pub mod reservoir;

use tracing::warn;

pub use abstraction::ReturnFlowLink;
pub use assimilation::Correction;
pub use geometry::{ChannelGeometry, ChannelParams};
pub use irrigation::IrrigationParams;
pub use reservoir::ReservoirParams;

use crate::config::RunConfig;
use crate::network::DrainageNetwork;

/// Channel and reservoir stores at the start of a step.
#[derive(Debug, Clone, Copy)]
pub struct ChannelStores<'a> {
    /// Discharge per cell [m3/s].
    pub discharge: &'a [f64],
    /// Channel storage per cell [m3].
    pub storage: &'a [f64],
    /// Volume per reservoir [m3].
    pub reservoir_volumes: &'a [f64],
}

/// Result of one pass over all sub-steps.
#[derive(Debug, Clone, PartialEq)]
struct Sweep {
    discharge: Vec<f64>,
    storage: Vec<f64>,
    reservoir_volumes: Vec<f64>,
    /// Upstream inflow per cell during the last sub-step [m3/s].
    upstream: Vec<f64>,
    /// Mean controlled release per reservoir [m3/s].
    releases: Vec<f64>,
    outflow_volume: f64,
    shortfall_volume: f64,
    spill_volume: f64,
}

/// Routed channel state and bookkeeping for one timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub discharge: Vec<f64>,
    pub storage: Vec<f64>,
    pub reservoir_volumes: Vec<f64>,
    pub releases: Vec<f64>,
    /// Withdrawal requested per cell [m3/s].
    pub requested: Vec<f64>,
    /// Withdrawal supplied per cell [m3/s].
    pub supply: Vec<f64>,
    /// Supply iterations run, zero without withdrawals.
    pub iterations: usize,
    pub converged: bool,
    /// Largest supply change in the last iteration [m3/s].
    pub max_change: f64,
    /// Net volume added by external inflow, withdrawals and return flows [m3].
    pub external_volume: f64,
    /// Volume leaving the network through pits [m3].
    pub outflow_volume: f64,
    /// Withdrawals the channel could not supply [m3].
    pub shortfall_volume: f64,
    /// Volume spilled over reservoir crests [m3].
    pub spill_volume: f64,
}

#[derive(Debug, Clone)]
pub struct Router {
    geometry: Vec<ChannelGeometry>,
    reservoirs: Vec<ReservoirParams>,
    reservoir_at: Vec<Option<usize>>,
    return_flows: Vec<ReturnFlowLink>,
    timestep: f64,
    substeps: usize,
    abstractions: bool,
    tolerance: f64,
    max_iterations: usize,
}

impl Router {
    /// Derive run-constant geometry. Reservoir cells must already be
    /// rerouted in `network`.
    pub fn new(
        network: &DrainageNetwork,
        channel: &[ChannelParams],
        reservoirs: &[ReservoirParams],
        return_flows: &[ReturnFlowLink],
        config: &RunConfig,
    ) -> Self {
        let mut reservoir_at = vec![None; network.n_cells()];
        for (i, r) in reservoirs.iter().enumerate() {
            reservoir_at[r.cell] = Some(i);
        }
        Self {
            geometry: channel.iter().map(ChannelGeometry::new).collect(),
            reservoirs: reservoirs.to_vec(),
            reservoir_at,
            return_flows: if config.abstractions {
                return_flows.to_vec()
            } else {
                Vec::new()
            },
            timestep: config.timestep_secs,
            substeps: config.kinematic_substeps.max(1),
            abstractions: config.abstractions,
            tolerance: config.supply_tolerance,
            max_iterations: config.max_supply_iterations,
        }
    }

    pub fn reservoirs(&self) -> &[ReservoirParams] {
        &self.reservoirs
    }

    pub fn is_reservoir(&self, cell: usize) -> bool {
        self.reservoir_at[cell].is_some()
    }

    pub fn cold_start_volumes(&self) -> Vec<f64> {
        self.reservoirs.iter().map(ReservoirParams::initial_volume).collect()
    }

    /// Channel water level per cell [m].
    pub fn levels(&self, storage: &[f64]) -> Vec<f64> {
        self.geometry
            .iter()
            .zip(storage)
            .map(|(g, &s)| g.level(s))
            .collect()
    }

    /// Share of the supply at `intake` that return flows leave withdrawn.
    pub fn kept_share(&self, intake: usize) -> f64 {
        let returned: f64 = self
            .return_flows
            .iter()
            .filter(|l| l.intake == intake)
            .map(|l| l.fraction)
            .sum();
        (1.0 - returned).max(0.0)
    }

    /// Route one timestep from `stores`.
    ///
    /// `lateral` is the lateral inflow per cell [m3/s]; `inflow` the signed
    /// external inflow, where negative entries request withdrawals;
    /// `irrigation` adds irrigation requests per cell on top of those. With
    /// withdrawals the sweep is repeated from the same start state until the
    /// supplied vector changes by less than the tolerance or the iteration
    /// cap is hit, in which case the last iterate is kept.
    pub fn route(
        &self,
        network: &DrainageNetwork,
        stores: ChannelStores<'_>,
        lateral: &[f64],
        inflow: Option<&[f64]>,
        irrigation: Option<&[f64]>,
    ) -> RouteOutcome {
        let n = network.n_cells();
        let mut base = lateral.to_vec();
        let mut requested = vec![0.0; n];
        let mut added = 0.0;
        if let Some(inflow) = inflow {
            for (cell, &q) in inflow.iter().enumerate() {
                if q >= 0.0 {
                    base[cell] += q;
                    added += q;
                } else if self.abstractions {
                    requested[cell] = -q;
                }
            }
        }
        if let Some(irrigation) = irrigation {
            for (r, &q) in requested.iter_mut().zip(irrigation) {
                *r += q.max(0.0);
            }
        }
        let requesting: Vec<usize> = (0..n).filter(|&c| requested[c] > 0.0).collect();

        let mut supply = vec![0.0; n];
        let mut sweep = self.sweep(network, stores, &base);
        let mut iterations = 0;
        let mut max_change = 0.0;
        let mut converged = true;

        if !requesting.is_empty() {
            converged = false;
            while iterations < self.max_iterations {
                iterations += 1;
                let mut next = vec![0.0; n];
                for &cell in &requesting {
                    next[cell] = abstraction::available_supply(
                        sweep.upstream[cell],
                        base[cell],
                        requested[cell],
                    );
                }
                max_change = requesting
                    .iter()
                    .map(|&c| (next[c] - supply[c]).abs())
                    .fold(0.0, f64::max);
                supply = next;
                let applied = abstraction::apply_withdrawals(&base, &supply, &self.return_flows);
                sweep = self.sweep(network, stores, &applied);
                if max_change < self.tolerance {
                    converged = true;
                    break;
                }
            }
            if !converged {
                warn!(
                    "supply iteration stopped after {} iterations, max change {:.3e} m3/s",
                    iterations, max_change
                );
            }
        }

        let supplied: f64 = supply.iter().sum();
        let returned = abstraction::returned(&supply, &self.return_flows);
        RouteOutcome {
            discharge: sweep.discharge,
            storage: sweep.storage,
            reservoir_volumes: sweep.reservoir_volumes,
            releases: sweep.releases,
            requested,
            supply,
            iterations,
            converged,
            max_change,
            external_volume: (added + returned - supplied) * self.timestep,
            outflow_volume: sweep.outflow_volume,
            shortfall_volume: sweep.shortfall_volume,
            spill_volume: sweep.spill_volume,
        }
    }

    fn sweep(&self, network: &DrainageNetwork, stores: ChannelStores<'_>, lateral: &[f64]) -> Sweep {
        let n = network.n_cells();
        let dts = self.timestep / self.substeps as f64;
        let mut discharge = stores.discharge.to_vec();
        let mut storage = stores.storage.to_vec();
        let mut volumes = stores.reservoir_volumes.to_vec();
        let mut releases = vec![0.0; self.reservoirs.len()];
        let mut upstream = vec![0.0; n];
        let (mut outflow, mut shortfall, mut spill) = (0.0, 0.0, 0.0);

        for _ in 0..self.substeps {
            upstream.iter_mut().for_each(|q| *q = 0.0);
            for &cell in network.topological_order() {
                let q_in = upstream[cell];
                match self.reservoir_at[cell] {
                    Some(r) => {
                        let up = reservoir::update(&self.reservoirs[r], volumes[r], q_in + lateral[cell], dts);
                        volumes[r] = up.volume;
                        releases[r] += up.release / self.substeps as f64;
                        discharge[cell] = up.release + up.spill / dts;
                        shortfall += up.shortfall;
                        spill += up.spill;
                    }
                    None => {
                        let geo = &self.geometry[cell];
                        let up = kinematic::update(
                            q_in,
                            discharge[cell],
                            storage[cell],
                            lateral[cell],
                            geo.alpha(storage[cell]),
                            geo.length(),
                            dts,
                        );
                        discharge[cell] = up.discharge;
                        storage[cell] = up.storage;
                        shortfall += up.shortfall;
                    }
                }
                match network.downstream(cell) {
                    Some(down) => upstream[down] += discharge[cell],
                    None => outflow += discharge[cell] * dts,
                }
            }
        }

        Sweep {
            discharge,
            storage,
            reservoir_volumes: volumes,
            upstream,
            releases,
            outflow_volume: outflow,
            shortfall_volume: shortfall,
            spill_volume: spill,
        }
    }

    /// Scale discharge by the correction and refit storage to it.
    ///
    /// Reservoir cells are left alone. Returns the channel volume added [m3].
    pub fn assimilate(&self, correction: &Correction, discharge: &mut [f64], storage: &mut [f64]) -> f64 {
        let mut added = 0.0;
        for cell in 0..discharge.len() {
            if self.is_reservoir(cell) || correction.discharge[cell] == 1.0 {
                continue;
            }
            let geo = &self.geometry[cell];
            let alpha = geo.alpha(storage[cell]);
            discharge[cell] *= correction.discharge[cell];
            let refit = geo.storage_for(discharge[cell], alpha);
            added += refit - storage[cell];
            storage[cell] = refit;
        }
        added
    }
}
