//! Distributed rainfall-runoff core.
//!
//! A catchment is a grid of active cells joined into a drainage forest. Each
//! timestep runs a vertical soil-water column per cell, hands the resulting
//! lateral flux to a kinematic-wave channel router, and checks mass closure.
pub mod balance;
pub mod config;
pub mod error;
pub mod forcing;
pub mod model;
pub mod network;
pub mod params;
pub mod routing;
pub mod sbm;
pub mod traits;

pub use config::{AssimilationConfig, RunConfig, ZeroObservationPolicy};
pub use error::{Diagnostic, ModelError};
pub use forcing::Forcing;
pub use model::{Catchment, CatchmentState, CellState, RunOutput, StepReport};
pub use network::{DrainageNetwork, FlowDirectionGrid};
pub use params::CellParameters;
