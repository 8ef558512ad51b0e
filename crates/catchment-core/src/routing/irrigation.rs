/// Irrigation areas fed from surface-water intakes.
///
/// Every area asks its intake for the transpiration deficit of its cells.
/// The water the intake delivers, less what return flows send back to the
/// network, is spread evenly over the area and reaches the surface on the
/// following step.
use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationParams {
    /// Area of each cell, `None` outside every area.
    pub area: Vec<Option<usize>>,
    /// Intake cell of each area.
    pub intakes: Vec<usize>,
}

impl IrrigationParams {
    pub fn n_areas(&self) -> usize {
        self.intakes.len()
    }

    /// Number of cells in each area.
    pub fn area_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_areas()];
        for &a in self.area.iter().flatten() {
            if let Some(size) = sizes.get_mut(a) {
                *size += 1;
            }
        }
        sizes
    }

    /// Intakes must lie on the network and every area needs an intake and
    /// at least one cell. The per-cell length is checked by the caller.
    pub fn validate(&self, n_cells: usize) -> Result<(), ParameterError> {
        for &intake in &self.intakes {
            if intake >= n_cells {
                return Err(ParameterError::CellOutOfRange {
                    name: "irrigation.intakes",
                    cell: intake,
                    n_cells,
                });
            }
        }
        for (cell, a) in self.area.iter().enumerate() {
            if let Some(a) = *a {
                if a >= self.n_areas() {
                    return Err(ParameterError::InvalidParameter {
                        cell,
                        name: "irrigation.area",
                        value: a as f64,
                        reason: "area has no intake",
                    });
                }
            }
        }
        if let Some(a) = self.area_sizes().iter().position(|&size| size == 0) {
            return Err(ParameterError::InvalidParameter {
                cell: self.intakes[a],
                name: "irrigation.intakes",
                value: a as f64,
                reason: "area has no cells",
            });
        }
        Ok(())
    }

    /// Withdrawal asked by each area [m3/s].
    ///
    /// `deficit` is potential minus actual transpiration per cell [mm];
    /// `mm_to_rate` converts a depth on one cell to a rate [m3/s per mm].
    pub fn demand(&self, deficit: &[f64], mm_to_rate: f64) -> Vec<f64> {
        let mut demand = vec![0.0; self.n_areas()];
        for (&a, &d) in self.area.iter().zip(deficit) {
            if let Some(a) = a {
                demand[a] += d.max(0.0) * mm_to_rate;
            }
        }
        demand
    }

    /// Area demands placed on their intake cells [m3/s].
    pub fn requests(&self, demand: &[f64], n_cells: usize) -> Vec<f64> {
        let mut requests = vec![0.0; n_cells];
        for (&intake, &d) in self.intakes.iter().zip(demand) {
            requests[intake] += d;
        }
        requests
    }

    /// Supply kept by each area [m3/s].
    ///
    /// An intake serving several requests shares its supply in proportion
    /// to them. `kept` is the share of an intake's supply that return flows
    /// leave in place.
    pub fn delivered<F>(&self, demand: &[f64], requested: &[f64], supply: &[f64], kept: F) -> Vec<f64>
    where
        F: Fn(usize) -> f64,
    {
        self.intakes
            .iter()
            .zip(demand)
            .map(|(&intake, &d)| {
                if requested[intake] > 0.0 {
                    supply[intake] * d / requested[intake] * kept(intake)
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Delivered rates [m3/s] as an even depth over each area [mm].
    pub fn spread(&self, delivered: &[f64], mm_to_rate: f64) -> Vec<f64> {
        let sizes = self.area_sizes();
        self.area
            .iter()
            .map(|a| match *a {
                Some(a) => delivered[a] / (sizes[a] as f64 * mm_to_rate),
                None => 0.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    /// Cells 0-1 form area 0 fed from cell 3, cell 2 forms area 1 fed from
    /// cell 4.
    fn two_areas() -> IrrigationParams {
        IrrigationParams {
            area: vec![Some(0), Some(0), Some(1), None, None],
            intakes: vec![3, 4],
        }
    }

    // -- Validation --

    #[test]
    fn well_formed_areas_accepted() {
        let irr = two_areas();
        assert!(irr.validate(5).is_ok());
        assert_eq!(irr.area_sizes(), vec![2, 1]);
    }

    #[test]
    fn intake_outside_network_rejected() {
        let mut irr = two_areas();
        irr.intakes[1] = 9;
        assert_eq!(
            irr.validate(5),
            Err(ParameterError::CellOutOfRange {
                name: "irrigation.intakes",
                cell: 9,
                n_cells: 5
            })
        );
    }

    #[test]
    fn area_without_intake_rejected() {
        let mut irr = two_areas();
        irr.area[4] = Some(2);
        assert!(matches!(
            irr.validate(5),
            Err(ParameterError::InvalidParameter { cell: 4, name: "irrigation.area", .. })
        ));
    }

    #[test]
    fn empty_area_rejected() {
        let mut irr = two_areas();
        irr.area[2] = None;
        assert!(matches!(
            irr.validate(5),
            Err(ParameterError::InvalidParameter { cell: 4, name: "irrigation.intakes", .. })
        ));
    }

    // -- Demand and delivery --

    #[test]
    fn demand_sums_deficit_over_area() {
        let irr = two_areas();
        // 10 m3/s per mm makes the numbers easy to follow.
        let demand = irr.demand(&[2.0, 1.0, 4.0, 7.0, 0.0], 10.0);
        assert_eq!(demand, vec![30.0, 40.0]);
        assert_eq!(irr.requests(&demand, 5), vec![0.0, 0.0, 0.0, 30.0, 40.0]);
    }

    #[test]
    fn negative_deficit_asks_nothing() {
        let irr = two_areas();
        assert_eq!(irr.demand(&[-1.0, 0.0, 0.0, 0.0, 0.0], 10.0), vec![0.0, 0.0]);
    }

    #[test]
    fn shared_intake_splits_supply_pro_rata() {
        let irr = IrrigationParams {
            area: vec![Some(0), Some(1), None],
            intakes: vec![2, 2],
        };
        let demand = [3.0, 1.0];
        let requested = [0.0, 0.0, 4.0];
        let supply = [0.0, 0.0, 2.0];
        let delivered = irr.delivered(&demand, &requested, &supply, |_| 1.0);
        assert_approx(delivered[0], 1.5, 1e-12);
        assert_approx(delivered[1], 0.5, 1e-12);
    }

    #[test]
    fn returned_share_is_not_spread() {
        let irr = two_areas();
        let demand = [30.0, 0.0];
        let requested = [0.0, 0.0, 0.0, 30.0, 0.0];
        let supply = [0.0, 0.0, 0.0, 20.0, 0.0];
        let delivered = irr.delivered(&demand, &requested, &supply, |c| if c == 3 { 0.75 } else { 1.0 });
        assert_eq!(delivered, vec![15.0, 0.0]);
        let depth = irr.spread(&delivered, 10.0);
        assert_eq!(depth, vec![0.75, 0.75, 0.0, 0.0, 0.0]);
        let volume: f64 = depth.iter().map(|d| d * 10.0).sum();
        assert_approx(volume, 15.0, 1e-12);
    }
}
