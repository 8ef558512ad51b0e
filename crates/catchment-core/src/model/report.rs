/// Step and run outputs.
use crate::balance::{BalanceTotals, BalanceTotalsSeries};
use crate::error::Diagnostic;
use crate::routing::Correction;
use crate::sbm::VerticalFluxesSeries;
use crate::traits::ReportCollector;

/// Everything one timestep produced besides the committed state.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Zero-based index of the step since construction or resume.
    pub step: usize,
    /// Column fluxes, one entry per cell.
    pub fluxes: VerticalFluxesSeries,
    /// Channel discharge per cell at the end of the step [m3/s].
    pub discharge: Vec<f64>,
    /// Discharge summed over pits [m3/s].
    pub outlet_discharge: f64,
    /// Withdrawal requested per cell [m3/s].
    pub requested: Vec<f64>,
    /// Withdrawal supplied per cell [m3/s].
    pub supply: Vec<f64>,
    pub supply_iterations: usize,
    /// Withdrawal asked by each irrigation area [m3/s], empty without
    /// irrigation.
    pub irrigation_demand: Vec<f64>,
    /// Supply each irrigation area keeps for the next step [m3/s].
    pub irrigation_delivered: Vec<f64>,
    /// Mean release per reservoir [m3/s].
    pub reservoir_releases: Vec<f64>,
    /// Assimilation multipliers, when any gauge had a usable observation.
    pub correction: Option<Correction>,
    pub balance: BalanceTotals,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per-step outlet series and balance totals over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    pub outlet_discharge: Vec<f64>,
    pub supply_iterations: Vec<usize>,
    pub balance: BalanceTotalsSeries,
    /// Diagnostics tagged with the step that raised them.
    pub diagnostics: Vec<(usize, Diagnostic)>,
}

impl ReportCollector<StepReport> for RunOutput {
    fn with_capacity(n: usize) -> Self {
        Self {
            outlet_discharge: Vec::with_capacity(n),
            supply_iterations: Vec::with_capacity(n),
            balance: BalanceTotalsSeries::with_capacity(n),
            diagnostics: Vec::new(),
        }
    }

    fn push(&mut self, report: StepReport) {
        self.outlet_discharge.push(report.outlet_discharge);
        self.supply_iterations.push(report.supply_iterations);
        self.balance.push(&report.balance);
        let step = report.step;
        self.diagnostics
            .extend(report.diagnostics.into_iter().map(|d| (step, d)));
    }

    fn len(&self) -> usize {
        self.outlet_discharge.len()
    }

    fn is_empty(&self) -> bool {
        self.outlet_discharge.is_empty()
    }
}
