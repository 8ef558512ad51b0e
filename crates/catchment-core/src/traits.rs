/// Core traits shared by the simulation types.
///
/// `ModelState` is the flat-array persistence contract for states;
/// `Simulation` is the step/run interface with a default `run` loop.
use crate::error::{ModelResult, StateError};

/// Flat `f64` layout of a state, for persistence and resumption.
pub trait ModelState: Sized {
    /// Shape information needed to rebuild the state from a flat array.
    type Layout;

    fn to_vec(&self) -> Vec<f64>;

    fn from_slice(arr: &[f64], layout: &Self::Layout) -> Result<Self, StateError>;

    /// Number of values `to_vec` produces for a layout.
    fn array_len(layout: &Self::Layout) -> usize;
}

/// A model advanced one timestep at a time.
pub trait Simulation {
    type Forcing;
    type Report;
    type Output: ReportCollector<Self::Report>;

    /// Execute one timestep and commit the new state.
    fn step(&mut self, forcing: &Self::Forcing) -> ModelResult<Self::Report>;

    /// Run over a forcing sequence.
    ///
    /// Default implementation: step through the forcing in order, collecting
    /// each report. Stops at the first error; steps before it stay committed.
    fn run(&mut self, forcing: &[Self::Forcing]) -> ModelResult<Self::Output> {
        let mut outputs = Self::Output::with_capacity(forcing.len());
        for f in forcing {
            let report = self.step(f)?;
            outputs.push(report);
        }
        Ok(outputs)
    }
}

/// Operations required on the collected run output.
pub trait ReportCollector<R> {
    fn with_capacity(n: usize) -> Self;
    fn push(&mut self, report: R);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
}
