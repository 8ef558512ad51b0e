/// Vertical column state variables.
///
/// Mutable per-cell stores carried from one timestep to the next. All depths
/// are in mm over the cell area.
use serde::{Deserialize, Serialize};

use super::constants::COLUMN_STATE_SIZE;
use super::params::SoilParams;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnState {
    /// Unsaturated store depth [mm].
    pub ustore: f64,
    /// Saturated store depth [mm].
    pub satstore: f64,
    /// Canopy interception store [mm].
    pub canopy: f64,
    /// Dry snow pack [mm].
    pub snow: f64,
    /// Free water held in the snow pack [mm].
    pub snow_water: f64,
    /// Top soil temperature [C].
    pub tsoil: f64,
}

impl ColumnState {
    /// Cold-start state: the saturated store at a fraction of capacity, the
    /// unsaturated store, canopy and snow empty.
    pub fn initialize(soil: &SoilParams, saturation_fraction: f64, tsoil: f64) -> Self {
        Self {
            ustore: 0.0,
            satstore: saturation_fraction * soil.water_capacity(),
            canopy: 0.0,
            snow: 0.0,
            snow_water: 0.0,
            tsoil,
        }
    }

    /// Water held by every store of the column [mm].
    pub fn total_water(&self) -> f64 {
        self.ustore + self.satstore + self.canopy + self.snow + self.snow_water
    }

    /// Layout: [ustore, satstore, canopy, snow, snow_water, tsoil]
    pub fn to_array(&self) -> [f64; COLUMN_STATE_SIZE] {
        [
            self.ustore,
            self.satstore,
            self.canopy,
            self.snow,
            self.snow_water,
            self.tsoil,
        ]
    }

    pub fn from_array(arr: &[f64; COLUMN_STATE_SIZE]) -> Self {
        Self {
            ustore: arr[0],
            satstore: arr[1],
            canopy: arr[2],
            snow: arr[3],
            snow_water: arr[4],
            tsoil: arr[5],
        }
    }
}
