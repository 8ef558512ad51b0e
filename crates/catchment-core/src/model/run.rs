/// Catchment step orchestration.
///
/// One timestep, in order:
/// 1. snow mass wasting along the network (optional)
/// 2. vertical column up to the deep losses, per cell
/// 3. lateral saturated flow along the network (optional)
/// 4. exfiltration, re-infiltration and the lateral flux, per cell
/// 5. kinematic-wave routing with the withdrawal iteration, including the
///    irrigation demand of the step (optional)
/// 6. gauge assimilation (optional)
/// 7. water balance, then commit of the new state and of the irrigation
///    supply the next step spreads over its areas
use rayon::prelude::*;
use tracing::{debug, info};

use super::report::{RunOutput, StepReport};
use super::state::{CatchmentState, CellState, StateLayout};
use crate::balance::{StepBalance, WaterBalance};
use crate::config::RunConfig;
use crate::error::{Diagnostic, ModelResult, ParameterError};
use crate::forcing::{CellForcing, Forcing};
use crate::network::DrainageNetwork;
use crate::params::CellParameters;
use crate::routing::constants::MM_TO_M;
use crate::routing::{ChannelStores, Correction, IrrigationParams, ReservoirParams, RouteOutcome, Router};
use crate::sbm::column::{self, ChannelView, ColumnContext, ColumnParams};
use crate::sbm::snow::mass_wasting_capacity;
use crate::sbm::{ColumnState, VerticalFluxes, VerticalFluxesSeries};
use crate::traits::Simulation;

#[derive(Debug, Clone)]
pub struct Catchment {
    network: DrainageNetwork,
    params: CellParameters,
    config: RunConfig,
    context: ColumnContext,
    router: Router,
    state: CatchmentState,
    balance: WaterBalance,
    steps: usize,
}

fn cold_start(params: &CellParameters, config: &RunConfig, router: &Router) -> CatchmentState {
    CatchmentState {
        cells: params
            .soil
            .iter()
            .map(|soil| CellState {
                column: ColumnState::initialize(
                    soil,
                    config.initial_saturation_fraction,
                    config.initial_soil_temperature,
                ),
                discharge: 0.0,
                channel_storage: 0.0,
                irrigation: 0.0,
            })
            .collect(),
        reservoir_volumes: router.cold_start_volumes(),
    }
}

impl Catchment {
    /// Validate inputs, apply reservoir reroutes and cold-start the state.
    pub fn new(network: DrainageNetwork, params: CellParameters, config: RunConfig) -> ModelResult<Self> {
        config.validate()?;
        let n = network.n_cells();
        params.validate(n, &config)?;
        if let Some(assim) = &config.assimilation {
            if let Some(&cell) = assim.gauge_cells.iter().find(|&&c| c >= n) {
                return Err(ParameterError::CellOutOfRange {
                    name: "assimilation.gauge_cells",
                    cell,
                    n_cells: n,
                }
                .into());
            }
        }

        let reservoirs: &[ReservoirParams] = if config.reservoirs {
            &params.reservoirs
        } else {
            &[]
        };
        let edits: Vec<(usize, usize)> = reservoirs
            .iter()
            .filter_map(|r| r.outlet.map(|outlet| (r.cell, outlet)))
            .collect();
        let network = if edits.is_empty() {
            network
        } else {
            network.rerouted(&edits)?
        };

        let context = ColumnContext::from_config(&config, params.snow.is_some(), params.subgrid.is_some());
        let router = Router::new(&network, &params.channel, reservoirs, &params.return_flows, &config);
        let state = cold_start(&params, &config, &router);

        info!(
            "catchment: {} cells, {} pits, {} reservoirs, {} irrigation areas, {} gauges, snow={}, subgrid={}, dt={}s x {} substeps",
            n,
            network.pits().count(),
            router.reservoirs().len(),
            params
                .irrigation
                .as_ref()
                .filter(|_| config.irrigation)
                .map_or(0, IrrigationParams::n_areas),
            config.assimilation.as_ref().map_or(0, |a| a.gauge_cells.len()),
            context.snow,
            context.subgrid,
            config.timestep_secs,
            config.kinematic_substeps,
        );

        let balance = WaterBalance::new(n, network.cell_area(), config.mass_balance_tolerance, 0.0);
        let mut model = Self {
            network,
            params,
            config,
            context,
            router,
            state,
            balance,
            steps: 0,
        };
        model.balance = model.fresh_balance();
        Ok(model)
    }

    /// Resume from a persisted state. Step numbering and balance totals
    /// restart from it.
    pub fn with_state(mut self, state: CatchmentState) -> ModelResult<Self> {
        state.validate(&self.layout())?;
        self.state = state;
        self.steps = 0;
        self.balance = self.fresh_balance();
        Ok(self)
    }

    fn fresh_balance(&self) -> WaterBalance {
        let n = self.network.n_cells();
        let area = self.network.cell_area();
        let tolerance = self.config.mass_balance_tolerance;
        let empty = WaterBalance::new(n, area, tolerance, 0.0);
        let storage = empty.storage_of(
            &self.state.columns(),
            self.state.pending_irrigation(),
            self.state.channel_volume(),
        );
        WaterBalance::new(n, area, tolerance, storage)
    }

    pub fn cold_start_state(&self) -> CatchmentState {
        cold_start(&self.params, &self.config, &self.router)
    }

    pub fn layout(&self) -> StateLayout {
        StateLayout {
            n_cells: self.network.n_cells(),
            n_reservoirs: self.router.reservoirs().len(),
        }
    }

    /// The network after reservoir reroutes.
    pub fn network(&self) -> &DrainageNetwork {
        &self.network
    }

    pub fn parameters(&self) -> &CellParameters {
        &self.params
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> &CatchmentState {
        &self.state
    }

    pub fn into_state(self) -> CatchmentState {
        self.state
    }

    pub fn balance(&self) -> &WaterBalance {
        &self.balance
    }

    /// Steps taken since construction or resume.
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn column_params(&self, cell: usize) -> ColumnParams<'_> {
        ColumnParams {
            soil: &self.params.soil[cell],
            canopy: &self.params.canopy[cell],
            surface: &self.params.surface[cell],
            snow: self.params.snow.as_ref().map(|s| &s[cell]),
            subgrid: self.params.subgrid.as_ref().map(|s| &s[cell]),
        }
    }

    fn irrigation(&self) -> Option<&IrrigationParams> {
        if self.config.irrigation {
            self.params.irrigation.as_ref()
        } else {
            None
        }
    }

    fn channel_view(&self, cell: usize, level: f64) -> ChannelView {
        ChannelView {
            level,
            width: self.params.channel[cell].width,
            cell_length: self.network.cell_size(),
        }
    }

    /// Evaluate `f` for every cell, on the rayon pool when enabled.
    fn map_cells<T, F>(&self, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Send + Sync,
    {
        let n = self.network.n_cells();
        if self.config.parallel {
            (0..n).into_par_iter().map(f).collect()
        } else {
            (0..n).map(f).collect()
        }
    }

    /// Move dry snow downslope. Returns `(received, shed)` per cell [mm].
    fn mass_wasting(&self, columns: &mut [ColumnState]) -> (Vec<f64>, Vec<f64>) {
        let n = columns.len();
        if !(self.context.snow && self.config.mass_wasting) {
            return (vec![0.0; n], vec![0.0; n]);
        }
        let stock: Vec<f64> = columns.iter().map(|c| c.snow).collect();
        let capacity: Vec<f64> = (0..n)
            .map(|c| {
                if self.network.is_pit(c) {
                    0.0
                } else {
                    mass_wasting_capacity(stock[c], self.params.soil[c].slope)
                }
            })
            .collect();
        let (shed, held) = self.network.route_with_capacity(&stock, &capacity);
        for (col, &h) in columns.iter_mut().zip(&held) {
            col.snow = h;
        }
        (self.network.upstream_sum(&shed), shed)
    }

    /// Execute one timestep and commit the new state.
    pub fn step(&mut self, forcing: &Forcing) -> ModelResult<StepReport> {
        let n = self.network.n_cells();
        let n_gauges = self
            .config
            .assimilation
            .as_ref()
            .map_or(0, |a| a.gauge_cells.len());
        forcing.validate(n, n_gauges, self.context.snow)?;

        let before = self.state.columns();
        let mut columns = before.clone();

        // 1. Mass wasting
        let (snow_in, snow_out) = self.mass_wasting(&mut columns);

        // 2. Vertical column
        let levels = self.router.levels(&self.state.channel_storage());
        let phase_a = self.map_cells(|c| {
            let cell_forcing = CellForcing {
                irrigation: self.state.cells[c].irrigation,
                ..forcing.cell(c)
            };
            column::vertical_step(
                &columns[c],
                self.column_params(c),
                &cell_forcing,
                self.channel_view(c, levels[c]),
                &self.context,
            )
        });
        let (mut columns, mut fluxes): (Vec<ColumnState>, Vec<VerticalFluxes>) = phase_a.into_iter().unzip();
        for (c, fx) in fluxes.iter_mut().enumerate() {
            fx.snow_in = snow_in[c];
            fx.snow_out = snow_out[c];
        }

        // 3. Lateral saturated flow
        if self.config.lateral_subsurface_flow {
            let capacity: Vec<f64> = (0..n)
                .map(|c| column::subsurface_capacity(&columns[c], &self.params.soil[c], &self.context))
                .collect();
            let stock: Vec<f64> = columns.iter().map(|c| c.satstore).collect();
            let (outflow, held) = self.network.route_with_capacity(&stock, &capacity);
            let inflow = self.network.upstream_sum(&outflow);
            for c in 0..n {
                columns[c].satstore = held[c];
                fluxes[c].subsurface_out = outflow[c];
                fluxes[c].subsurface_in = inflow[c];
            }
        }

        // 4. Return flow and lateral flux
        let phase_b = self.map_cells(|c| {
            column::surface_step(
                &columns[c],
                &fluxes[c],
                self.column_params(c),
                self.channel_view(c, levels[c]),
                &self.context,
            )
        });
        let (columns, fluxes): (Vec<ColumnState>, Vec<VerticalFluxes>) = phase_b.into_iter().unzip();

        // 5. Routing
        let to_rate = self.network.cell_area() * MM_TO_M / self.config.timestep_secs;
        let lateral: Vec<f64> = fluxes.iter().map(|fx| fx.lateral * to_rate).collect();
        let irrigation = self.irrigation();
        let irrigation_demand = irrigation.map_or_else(Vec::new, |irr| {
            let deficit: Vec<f64> = fluxes
                .iter()
                .map(|fx| fx.potential_transpiration - fx.transpiration)
                .collect();
            irr.demand(&deficit, to_rate)
        });
        let irrigation_requests = irrigation.map(|irr| irr.requests(&irrigation_demand, n));
        let channel_before = self.state.channel_volume();
        let discharge_before = self.state.discharge();
        let storage_before = self.state.channel_storage();
        let stores = ChannelStores {
            discharge: &discharge_before,
            storage: &storage_before,
            reservoir_volumes: &self.state.reservoir_volumes,
        };
        let RouteOutcome {
            mut discharge,
            mut storage,
            reservoir_volumes,
            releases,
            requested,
            supply,
            iterations,
            converged,
            max_change,
            external_volume,
            outflow_volume,
            shortfall_volume,
            spill_volume: _,
        } = self
            .router
            .route(
                &self.network,
                stores,
                &lateral,
                forcing.inflow.as_deref(),
                irrigation_requests.as_deref(),
            );
        let channel_after = storage.iter().sum::<f64>() + reservoir_volumes.iter().sum::<f64>();

        let (irrigation_delivered, pending) = match irrigation {
            Some(irr) => {
                let delivered = irr.delivered(&irrigation_demand, &requested, &supply, |intake| {
                    self.router.kept_share(intake)
                });
                let pending = irr.spread(&delivered, to_rate);
                (delivered, pending)
            }
            None => (Vec::new(), vec![0.0; n]),
        };
        let irrigation_volume = irrigation_delivered.iter().sum::<f64>() * self.config.timestep_secs;

        // 6. Assimilation
        let correction = match (&self.config.assimilation, &forcing.observed_discharge) {
            (Some(cfg), Some(observed)) if cfg.enabled => {
                Correction::compute(&self.network, cfg, &discharge, observed)
            }
            _ => None,
        };
        let mut corrected = columns.clone();
        let mut soil_added = 0.0;
        let mut channel_added = 0.0;
        if let Some(corr) = &correction {
            channel_added = self.router.assimilate(corr, &mut discharge, &mut storage);
            for (c, col) in corrected.iter_mut().enumerate() {
                let room = (self.params.soil[c].water_capacity() - col.satstore).max(col.ustore);
                let scaled = (col.ustore * corr.soil[c]).min(room);
                soil_added += scaled - col.ustore;
                col.ustore = scaled;
            }
        }

        // 7. Balance
        let (totals, balance_diagnostics) = self.balance.update(&StepBalance {
            before: &before,
            after: &columns,
            fluxes: &fluxes,
            channel_before,
            channel_after,
            outflow_volume,
            external_volume,
            shortfall_volume,
            irrigation_volume,
            pending_irrigation: pending.iter().sum(),
            assimilation_soil: soil_added,
            assimilation_channel: channel_added,
        });
        let mut diagnostics = Vec::with_capacity(balance_diagnostics.len() + 1);
        if !converged {
            diagnostics.push(Diagnostic::ConvergenceNotReached {
                iterations,
                max_change,
            });
        }
        diagnostics.extend(balance_diagnostics);

        // Commit
        let outlet_discharge: f64 = self.network.pits().map(|p| discharge[p]).sum();
        self.state = CatchmentState {
            cells: corrected
                .into_iter()
                .enumerate()
                .map(|(c, column)| CellState {
                    column,
                    discharge: discharge[c],
                    channel_storage: storage[c],
                    irrigation: pending[c],
                })
                .collect(),
            reservoir_volumes,
        };
        let step = self.steps;
        self.steps += 1;
        debug!(
            "step {}: outlet {:.4} m3/s, {} supply iterations, residual {:.2e} mm",
            step, outlet_discharge, iterations, totals.residual
        );

        let mut series = VerticalFluxesSeries::with_capacity(n);
        for fx in &fluxes {
            series.push(fx);
        }
        Ok(StepReport {
            step,
            fluxes: series,
            discharge,
            outlet_discharge,
            requested,
            supply,
            supply_iterations: iterations,
            irrigation_demand,
            irrigation_delivered,
            reservoir_releases: releases,
            correction,
            balance: totals,
            diagnostics,
        })
    }

    /// Run over a forcing sequence, committing state after every step.
    pub fn run(&mut self, forcing: &[Forcing]) -> ModelResult<RunOutput> {
        Simulation::run(self, forcing)
    }
}

impl Simulation for Catchment {
    type Forcing = Forcing;
    type Report = StepReport;
    type Output = RunOutput;

    fn step(&mut self, forcing: &Forcing) -> ModelResult<StepReport> {
        Catchment::step(self, forcing)
    }
}
