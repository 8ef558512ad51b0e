/// Withdrawal supply and return flows.
///
/// A withdrawal can take at most what reaches its cell: the upstream
/// discharge plus the local lateral inflow. Supplied water may be partly
/// returned to another cell.
use serde::{Deserialize, Serialize};

use crate::error::ParameterError;
use crate::sbm::params::check_fraction;

/// Share of the water withdrawn at `intake` released again at `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnFlowLink {
    pub intake: usize,
    pub target: usize,
    pub fraction: f64,
}

impl ReturnFlowLink {
    pub fn validate(&self) -> Result<(), ParameterError> {
        check_fraction(self.intake, "return_flow.fraction", self.fraction)
    }
}

/// Water a withdrawal of `request` [m3/s] can actually take.
pub fn available_supply(upstream_discharge: f64, local_inflow: f64, request: f64) -> f64 {
    (upstream_discharge + local_inflow).max(0.0).min(request.max(0.0))
}

/// Lateral inflow after withdrawals and return flows.
pub fn apply_withdrawals(base: &[f64], supply: &[f64], links: &[ReturnFlowLink]) -> Vec<f64> {
    let mut applied: Vec<f64> = base.iter().zip(supply).map(|(b, s)| b - s).collect();
    for link in links {
        applied[link.target] += link.fraction * supply[link.intake];
    }
    applied
}

/// Total returned to the network [m3/s].
pub fn returned(supply: &[f64], links: &[ReturnFlowLink]) -> f64 {
    links.iter().map(|l| l.fraction * supply[l.intake]).sum()
}
