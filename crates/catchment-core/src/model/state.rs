/// Persistent catchment state.
///
/// The complete carry-over between runs: column stores, channel state and
/// pending irrigation per cell, plus one volume per reservoir. Resuming from
/// a saved state reproduces the following steps exactly.
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::sbm::constants::COLUMN_STATE_SIZE;
use crate::sbm::ColumnState;
use crate::traits::ModelState;

/// Values per cell in the flat layout.
pub const CELL_STATE_SIZE: usize = COLUMN_STATE_SIZE + 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub column: ColumnState,
    /// Channel discharge [m3/s].
    pub discharge: f64,
    /// Channel storage [m3].
    pub channel_storage: f64,
    /// Irrigation supply waiting to reach the surface next step [mm].
    #[serde(default)]
    pub irrigation: f64,
}

impl CellState {
    /// Layout: [ustore, satstore, canopy, snow, snow_water, tsoil, discharge,
    /// channel_storage, irrigation]
    pub fn to_array(&self) -> [f64; CELL_STATE_SIZE] {
        let c = self.column.to_array();
        [
            c[0],
            c[1],
            c[2],
            c[3],
            c[4],
            c[5],
            self.discharge,
            self.channel_storage,
            self.irrigation,
        ]
    }

    pub fn from_array(arr: &[f64; CELL_STATE_SIZE]) -> Self {
        let mut column = [0.0; COLUMN_STATE_SIZE];
        column.copy_from_slice(&arr[..COLUMN_STATE_SIZE]);
        Self {
            column: ColumnState::from_array(&column),
            discharge: arr[COLUMN_STATE_SIZE],
            channel_storage: arr[COLUMN_STATE_SIZE + 1],
            irrigation: arr[COLUMN_STATE_SIZE + 2],
        }
    }

    /// Depths and flows must be finite and non-negative, soil temperature
    /// finite.
    pub fn validate(&self, cell: usize) -> Result<(), StateError> {
        let c = &self.column;
        let checks = [
            ("ustore", c.ustore),
            ("satstore", c.satstore),
            ("canopy", c.canopy),
            ("snow", c.snow),
            ("snow_water", c.snow_water),
            ("discharge", self.discharge),
            ("channel_storage", self.channel_storage),
            ("irrigation", self.irrigation),
        ];
        for (name, value) in checks {
            if !(value.is_finite() && value >= 0.0) {
                return Err(StateError::InvalidValue { name, cell, value });
            }
        }
        if !c.tsoil.is_finite() {
            return Err(StateError::InvalidValue {
                name: "tsoil",
                cell,
                value: c.tsoil,
            });
        }
        Ok(())
    }
}

/// Shape of a flattened [`CatchmentState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLayout {
    pub n_cells: usize,
    pub n_reservoirs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatchmentState {
    pub cells: Vec<CellState>,
    #[serde(default)]
    pub reservoir_volumes: Vec<f64>,
}

impl CatchmentState {
    pub fn layout(&self) -> StateLayout {
        StateLayout {
            n_cells: self.cells.len(),
            n_reservoirs: self.reservoir_volumes.len(),
        }
    }

    pub fn discharge(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.discharge).collect()
    }

    pub fn channel_storage(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.channel_storage).collect()
    }

    pub fn columns(&self) -> Vec<ColumnState> {
        self.cells.iter().map(|c| c.column).collect()
    }

    /// Pending irrigation summed over cells [mm].
    pub fn pending_irrigation(&self) -> f64 {
        self.cells.iter().map(|c| c.irrigation).sum()
    }

    /// Channel plus reservoir volume [m3].
    pub fn channel_volume(&self) -> f64 {
        self.cells.iter().map(|c| c.channel_storage).sum::<f64>()
            + self.reservoir_volumes.iter().sum::<f64>()
    }

    pub fn validate(&self, layout: &StateLayout) -> Result<(), StateError> {
        let actual = self.layout();
        if actual != *layout {
            return Err(StateError::LengthMismatch {
                expected: CatchmentState::array_len(layout),
                actual: CatchmentState::array_len(&actual),
            });
        }
        for (cell, c) in self.cells.iter().enumerate() {
            c.validate(cell)?;
        }
        for (i, &value) in self.reservoir_volumes.iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(StateError::InvalidValue {
                    name: "reservoir_volume",
                    cell: i,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl ModelState for CatchmentState {
    type Layout = StateLayout;

    /// Cells in id order, then reservoir volumes.
    fn to_vec(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(Self::array_len(&self.layout()));
        for c in &self.cells {
            out.extend_from_slice(&c.to_array());
        }
        out.extend_from_slice(&self.reservoir_volumes);
        out
    }

    fn from_slice(arr: &[f64], layout: &StateLayout) -> Result<Self, StateError> {
        let expected = Self::array_len(layout);
        if arr.len() != expected {
            return Err(StateError::LengthMismatch {
                expected,
                actual: arr.len(),
            });
        }
        let split = layout.n_cells * CELL_STATE_SIZE;
        let cells = arr[..split]
            .chunks_exact(CELL_STATE_SIZE)
            .map(|chunk| {
                let mut a = [0.0; CELL_STATE_SIZE];
                a.copy_from_slice(chunk);
                CellState::from_array(&a)
            })
            .collect();
        let state = Self {
            cells,
            reservoir_volumes: arr[split..].to_vec(),
        };
        state.validate(layout)?;
        Ok(state)
    }

    fn array_len(layout: &StateLayout) -> usize {
        layout.n_cells * CELL_STATE_SIZE + layout.n_reservoirs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CatchmentState {
        let cell = |i: f64| CellState {
            column: ColumnState {
                ustore: 1.0 + i,
                satstore: 100.0 + i,
                canopy: 0.5,
                snow: 0.0,
                snow_water: 0.0,
                tsoil: -2.0,
            },
            discharge: 3.0 * i,
            channel_storage: 40.0 * i,
            irrigation: 0.5 * i,
        };
        CatchmentState {
            cells: vec![cell(0.0), cell(1.0), cell(2.0)],
            reservoir_volumes: vec![5.0e4],
        }
    }

    #[test]
    fn flat_layout_restores_state() {
        let s = sample();
        let arr = s.to_vec();
        assert_eq!(arr.len(), 3 * CELL_STATE_SIZE + 1);
        assert_eq!(arr[CELL_STATE_SIZE + 1], 101.0);
        let back = CatchmentState::from_slice(&arr, &s.layout()).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn wrong_length_rejected() {
        let s = sample();
        let arr = s.to_vec();
        let err = CatchmentState::from_slice(&arr[1..], &s.layout()).unwrap_err();
        assert_eq!(
            err,
            StateError::LengthMismatch {
                expected: arr.len(),
                actual: arr.len() - 1
            }
        );
    }

    #[test]
    fn negative_store_rejected() {
        let mut arr = sample().to_vec();
        arr[0] = -1.0;
        let err = CatchmentState::from_slice(&arr, &sample().layout()).unwrap_err();
        assert!(matches!(err, StateError::InvalidValue { name: "ustore", cell: 0, .. }));
    }

    #[test]
    fn negative_pending_irrigation_rejected() {
        let mut arr = sample().to_vec();
        arr[2 * CELL_STATE_SIZE - 1] = -0.1;
        let err = CatchmentState::from_slice(&arr, &sample().layout()).unwrap_err();
        assert!(matches!(err, StateError::InvalidValue { name: "irrigation", cell: 1, .. }));
    }

    #[test]
    fn json_round_trip() {
        let s = sample();
        let json = serde_json::to_string(&s).unwrap();
        let back: CatchmentState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
