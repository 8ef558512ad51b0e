//! Error taxonomy.
//!
//! Structural and configuration problems are fatal and detected once at
//! setup. Conditions found while stepping are never errors: they surface as
//! [`Diagnostic`] values on the step report.
use std::fmt;

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

/// What is wrong with a drainage topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyFault {
    /// Following downstream links from the cell returns to it.
    Cycle,
    /// A non-pit direction points off the grid or into a masked cell.
    Dangling,
}

impl fmt::Display for TopologyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyFault::Cycle => write!(f, "flow directions form a cycle"),
            TopologyFault::Dangling => write!(f, "non-pit cell has no downstream target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error("invalid topology at grid cell ({row}, {col}): {fault}")]
    InvalidTopology {
        row: usize,
        col: usize,
        fault: TopologyFault,
    },

    #[error("grid cell ({row}, {col}) has direction code {code}, expected 1-9")]
    InvalidDirectionCode { row: usize, col: usize, code: u8 },

    #[error("grid shape {rows}x{cols} needs {expected} direction entries, got {actual}")]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        expected: usize,
        actual: usize,
    },

    #[error("cell size must be positive, got {0}")]
    InvalidCellSize(f64),

    #[error("cell id {cell} is out of range for a network of {n_cells} cells")]
    CellOutOfRange { cell: usize, n_cells: usize },

    #[error("flow-direction grid has no active cells")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("invalid parameter `{name}` at cell {cell}: {value} ({reason})")]
    InvalidParameter {
        cell: usize,
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("parameter block `{name}` has {actual} entries, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("`{name}` references cell {cell}, outside a network of {n_cells} cells")]
    CellOutOfRange {
        name: &'static str,
        cell: usize,
        n_cells: usize,
    },

    #[error("cell {cell} hosts more than one reservoir")]
    DuplicateReservoir { cell: usize },

    #[error("`{name}` is enabled but its parameter block is missing")]
    MissingBlock { name: &'static str },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid config value `{key}` = {value}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, value: impl fmt::Display, reason: &'static str) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForcingError {
    #[error("forcing `{name}` has {actual} values, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("forcing `{name}` is not finite at cell {cell}")]
    NonFinite { name: &'static str, cell: usize },

    #[error("forcing `{name}` is negative at cell {cell}")]
    Negative { name: &'static str, cell: usize },

    #[error("snow is enabled but no temperature forcing was supplied")]
    MissingTemperature,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("state array has {actual} values, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("state `{name}` at cell {cell} is {value}, must be finite and non-negative")]
    InvalidValue {
        name: &'static str,
        cell: usize,
        value: f64,
    },
}

/// Umbrella error returned by model construction and stepping.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Forcing(#[from] ForcingError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Where a mass-balance residual was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceScope {
    Cell(usize),
    Channel,
    Catchment,
}

/// Non-fatal conditions raised while stepping.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The abstraction loop hit its iteration cap; the last iterate was kept.
    ConvergenceNotReached { iterations: usize, max_change: f64 },
    /// A closure residual exceeded the configured tolerance.
    MassBalanceResidual {
        scope: BalanceScope,
        residual: f64,
        tolerance: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ConvergenceNotReached {
                iterations,
                max_change,
            } => write!(
                f,
                "supply iteration stopped after {iterations} iterations, max change {max_change:.3e} m3/s"
            ),
            Diagnostic::MassBalanceResidual {
                scope,
                residual,
                tolerance,
            } => write!(
                f,
                "mass balance residual {residual:.3e} mm at {scope:?} exceeds {tolerance:.1e}"
            ),
        }
    }
}
