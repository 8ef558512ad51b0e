//! Catchment model: state, step orchestration and reports.
pub mod report;
pub mod run;
pub mod state;

pub use report::{RunOutput, StepReport};
pub use run::Catchment;
pub use state::{CatchmentState, CellState, StateLayout, CELL_STATE_SIZE};
