//! Water balance bookkeeping.
//!
//! Purely diagnostic: reads what the column and the router did in a step,
//! keeps running totals and checks closure per cell, for the channel and
//! for the whole catchment. Residuals above the tolerance are reported as
//! [`Diagnostic`] values and logged, never corrected.
use catchment_macros::Fluxes;
use tracing::warn;

use crate::error::{BalanceScope, Diagnostic};
use crate::routing::constants::MM_TO_M;
use crate::sbm::{ColumnState, VerticalFluxes};

/// Storage change minus net flux of one column [mm].
pub fn column_residual(before: &ColumnState, after: &ColumnState, fluxes: &VerticalFluxes) -> f64 {
    (after.total_water() - before.total_water()) - (fluxes.column_inputs() - fluxes.column_outputs())
}

/// Catchment terms of one step, in mm over the active area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Fluxes)]
pub struct BalanceTotals {
    pub precipitation: f64,
    /// Land evaporation plus open-water evaporation.
    pub evaporation: f64,
    pub outlet_discharge: f64,
    /// Saturated lateral flow leaving through pits.
    pub subsurface_outflow: f64,
    /// Leakage plus percolation.
    pub deep_losses: f64,
    /// External inflow minus supplied withdrawals plus return flows.
    pub external: f64,
    /// Supplied withdrawals held back to irrigate on the next step.
    pub irrigation: f64,
    /// Withdrawals the channel could not supply.
    pub shortfall: f64,
    pub assimilation: f64,
    /// Total storage at the end of the step.
    pub storage: f64,
    pub storage_change: f64,
    pub residual: f64,
}

/// What happened during one step, as seen by the balance.
#[derive(Debug, Clone, Copy)]
pub struct StepBalance<'a> {
    /// Column states at the start of the step.
    pub before: &'a [ColumnState],
    /// Column states after the vertical step, before assimilation.
    pub after: &'a [ColumnState],
    pub fluxes: &'a [VerticalFluxes],
    /// Channel plus reservoir volume at the start of the step [m3].
    pub channel_before: f64,
    /// Channel plus reservoir volume after routing, before assimilation [m3].
    pub channel_after: f64,
    pub outflow_volume: f64,
    pub external_volume: f64,
    pub shortfall_volume: f64,
    /// Supply diverted to irrigation areas [m3].
    pub irrigation_volume: f64,
    /// Irrigation waiting for the next step, summed over cells [mm].
    pub pending_irrigation: f64,
    /// Unsaturated store change from assimilation, summed over cells [mm].
    pub assimilation_soil: f64,
    /// Channel volume change from assimilation [m3].
    pub assimilation_channel: f64,
}

/// Cumulative per-cell fluxes since the balance was created [mm].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellTotals {
    pub precipitation: Vec<f64>,
    pub evaporation: Vec<f64>,
    pub infiltration: Vec<f64>,
    pub deep_losses: Vec<f64>,
    pub exfiltration: Vec<f64>,
    pub runoff_generated: Vec<f64>,
    pub reinfiltration: Vec<f64>,
    pub irrigation: Vec<f64>,
    /// Net snow received through mass wasting.
    pub snow_transport: Vec<f64>,
}

impl CellTotals {
    fn new(n: usize) -> Self {
        Self {
            precipitation: vec![0.0; n],
            evaporation: vec![0.0; n],
            infiltration: vec![0.0; n],
            deep_losses: vec![0.0; n],
            exfiltration: vec![0.0; n],
            runoff_generated: vec![0.0; n],
            reinfiltration: vec![0.0; n],
            irrigation: vec![0.0; n],
            snow_transport: vec![0.0; n],
        }
    }

    fn record(&mut self, fluxes: &[VerticalFluxes]) {
        for (c, fx) in fluxes.iter().enumerate() {
            self.precipitation[c] += fx.precipitation;
            self.evaporation[c] += fx.land_evaporation() + fx.open_water_evaporation;
            self.infiltration[c] += fx.infiltration;
            self.deep_losses[c] += fx.leakage + fx.percolation;
            self.exfiltration[c] += fx.exfiltration;
            self.runoff_generated[c] += fx.runoff_generated;
            self.reinfiltration[c] += fx.reinfiltration;
            self.irrigation[c] += fx.irrigation;
            self.snow_transport[c] += fx.snow_in - fx.snow_out;
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaterBalance {
    n_cells: usize,
    cell_area: f64,
    tolerance: f64,
    storage: f64,
    cells: CellTotals,
    cumulative: BalanceTotals,
}

impl WaterBalance {
    pub fn new(n_cells: usize, cell_area: f64, tolerance: f64, initial_storage: f64) -> Self {
        Self {
            n_cells,
            cell_area,
            tolerance,
            storage: initial_storage,
            cells: CellTotals::new(n_cells),
            cumulative: BalanceTotals {
                storage: initial_storage,
                ..Default::default()
            },
        }
    }

    /// Volume [m3] as a depth over the active area [mm].
    pub fn volume_to_mm(&self, volume: f64) -> f64 {
        volume / (self.n_cells as f64 * self.cell_area * MM_TO_M)
    }

    /// Catchment storage [mm] of columns and pending irrigation [mm summed
    /// over cells] plus channel volume [m3].
    pub fn storage_of(&self, columns: &[ColumnState], pending_irrigation: f64, channel_volume: f64) -> f64 {
        let column: f64 = columns.iter().map(ColumnState::total_water).sum();
        (column + pending_irrigation) / self.n_cells as f64 + self.volume_to_mm(channel_volume)
    }

    pub fn cell_totals(&self) -> &CellTotals {
        &self.cells
    }

    /// Totals summed over every step so far; `storage` is the latest value.
    pub fn cumulative(&self) -> &BalanceTotals {
        &self.cumulative
    }

    /// Record one step and check closure.
    pub fn update(&mut self, step: &StepBalance<'_>) -> (BalanceTotals, Vec<Diagnostic>) {
        let n = self.n_cells as f64;
        let mut diagnostics = Vec::new();

        // Per cell.
        let mut worst: Option<(usize, f64)> = None;
        for (c, fx) in step.fluxes.iter().enumerate() {
            let r = column_residual(&step.before[c], &step.after[c], fx);
            if worst.map_or(true, |(_, w)| r.abs() > w.abs()) {
                worst = Some((c, r));
            }
        }
        if let Some((cell, residual)) = worst {
            self.check(BalanceScope::Cell(cell), residual, &mut diagnostics);
        }

        let mean = |f: fn(&VerticalFluxes) -> f64| step.fluxes.iter().map(f).sum::<f64>() / n;
        let lateral = mean(|fx| fx.lateral);

        // Channel and reservoirs.
        let outlet = self.volume_to_mm(step.outflow_volume);
        let external = self.volume_to_mm(step.external_volume);
        let shortfall = self.volume_to_mm(step.shortfall_volume);
        let channel_change = self.volume_to_mm(step.channel_after - step.channel_before);
        let channel_residual = channel_change - (lateral + external + shortfall - outlet);
        self.check(BalanceScope::Channel, channel_residual, &mut diagnostics);

        // Catchment.
        let assimilation = step.assimilation_soil / n + self.volume_to_mm(step.assimilation_channel);
        let storage = self.storage_of(step.after, step.pending_irrigation, step.channel_after) + assimilation;
        let snow_export = mean(|fx| fx.snow_out - fx.snow_in);
        let mut totals = BalanceTotals {
            precipitation: mean(|fx| fx.precipitation),
            evaporation: mean(|fx| fx.land_evaporation() + fx.open_water_evaporation),
            outlet_discharge: outlet,
            subsurface_outflow: mean(|fx| fx.subsurface_out - fx.subsurface_in),
            deep_losses: mean(|fx| fx.leakage + fx.percolation),
            external,
            irrigation: self.volume_to_mm(step.irrigation_volume),
            shortfall,
            assimilation,
            storage,
            storage_change: storage - self.storage,
            residual: 0.0,
        };
        totals.residual = totals.storage_change
            - (totals.precipitation - totals.evaporation - totals.outlet_discharge
                - totals.subsurface_outflow
                - totals.deep_losses
                - snow_export
                + totals.external
                + totals.irrigation
                + totals.shortfall
                + totals.assimilation);
        self.check(BalanceScope::Catchment, totals.residual, &mut diagnostics);

        self.storage = storage;
        self.cells.record(step.fluxes);
        self.accumulate(&totals);
        (totals, diagnostics)
    }

    fn check(&self, scope: BalanceScope, residual: f64, diagnostics: &mut Vec<Diagnostic>) {
        if residual.abs() > self.tolerance || !residual.is_finite() {
            warn!(
                "mass balance residual {:.3e} mm at {:?} exceeds {:.1e}",
                residual, scope, self.tolerance
            );
            diagnostics.push(Diagnostic::MassBalanceResidual {
                scope,
                residual,
                tolerance: self.tolerance,
            });
        }
    }

    fn accumulate(&mut self, step: &BalanceTotals) {
        let c = &mut self.cumulative;
        c.precipitation += step.precipitation;
        c.evaporation += step.evaporation;
        c.outlet_discharge += step.outlet_discharge;
        c.subsurface_outflow += step.subsurface_outflow;
        c.deep_losses += step.deep_losses;
        c.external += step.external;
        c.irrigation += step.irrigation;
        c.shortfall += step.shortfall;
        c.assimilation += step.assimilation;
        c.storage = step.storage;
        c.storage_change += step.storage_change;
        c.residual += step.residual;
    }
}
