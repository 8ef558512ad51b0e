/// Per-cell parameters of the vertical column.
///
/// Rates are given per day and scaled by the timestep's day fraction where
/// they are used. Depths are in mm.
use serde::{Deserialize, Serialize};

use super::constants::{Bounds, FRACTION_BOUNDS, MAX_ROOTING_FRACTION, NON_NEGATIVE_BOUNDS, WHC_BOUNDS};
use crate::error::ParameterError;

pub(crate) fn check_bounds(
    cell: usize,
    name: &'static str,
    value: f64,
    bounds: &Bounds,
    reason: &'static str,
) -> Result<(), ParameterError> {
    if value.is_finite() && bounds.contains(value) {
        Ok(())
    } else {
        Err(ParameterError::InvalidParameter {
            cell,
            name,
            value,
            reason,
        })
    }
}

pub(crate) fn check_positive(cell: usize, name: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::InvalidParameter {
            cell,
            name,
            value,
            reason: "must be strictly positive",
        })
    }
}

pub(crate) fn check_fraction(cell: usize, name: &'static str, value: f64) -> Result<(), ParameterError> {
    check_bounds(cell, name, value, &FRACTION_BOUNDS, "must lie in [0, 1]")
}

pub(crate) fn check_non_negative(cell: usize, name: &'static str, value: f64) -> Result<(), ParameterError> {
    check_bounds(cell, name, value, &NON_NEGATIVE_BOUNDS, "must be non-negative")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilParams {
    /// Soil thickness [mm].
    pub thickness: f64,
    /// Saturated water content [-].
    pub theta_s: f64,
    /// Residual water content [-].
    pub theta_r: f64,
    /// Vertical saturated conductivity at the surface [mm/d].
    pub ksat_ver: f64,
    /// Conductivity decay depth; `f = (theta_s - theta_r) / m` [mm].
    pub m: f64,
    /// Horizontal to vertical conductivity ratio [-].
    pub ksat_hor_frac: f64,
    /// Infiltration capacity of undisturbed soil [mm/d].
    pub infilt_cap_soil: f64,
    /// Infiltration capacity of compacted areas [mm/d].
    pub infilt_cap_path: f64,
    /// Compacted fraction of the cell [-].
    pub path_frac: f64,
    /// Leakage to deep groundwater [mm/d].
    pub max_leakage: f64,
    /// Percolation out of the soil column [mm/d].
    pub max_percolation: f64,
    /// Rooting depth [mm].
    pub rooting_depth: f64,
    /// Sharpness of the root wetness curve, negative [-].
    pub root_dist_par: f64,
    /// Capillary rise distance scale [mm].
    pub cap_scale: f64,
    /// Share of infiltration short-circuiting to the saturated store [-].
    pub macropore_frac: f64,
    /// Land surface slope [m/m].
    pub slope: f64,
}

impl Default for SoilParams {
    fn default() -> Self {
        Self {
            thickness: 2000.0,
            theta_s: 0.6,
            theta_r: 0.01,
            ksat_ver: 3000.0,
            m: 300.0,
            ksat_hor_frac: 1.0,
            infilt_cap_soil: 100.0,
            infilt_cap_path: 10.0,
            path_frac: 0.01,
            max_leakage: 0.0,
            max_percolation: 0.0,
            rooting_depth: 750.0,
            root_dist_par: -500.0,
            cap_scale: 100.0,
            macropore_frac: 0.0,
            slope: 0.01,
        }
    }
}

impl SoilParams {
    /// Water the soil holds when fully saturated [mm].
    pub fn water_capacity(&self) -> f64 {
        self.thickness * (self.theta_s - self.theta_r)
    }

    /// Exponential conductivity decay rate [1/mm].
    pub fn decay(&self) -> f64 {
        (self.theta_s - self.theta_r) / self.m
    }

    /// Depth of the water table below the surface for a saturated store [mm].
    pub fn water_table_depth(&self, satstore: f64) -> f64 {
        (self.thickness - satstore / (self.theta_s - self.theta_r)).max(0.0)
    }

    pub fn effective_rooting_depth(&self) -> f64 {
        self.rooting_depth.min(self.thickness * MAX_ROOTING_FRACTION)
    }

    pub fn validate(&self, cell: usize) -> Result<(), ParameterError> {
        check_positive(cell, "soil.thickness", self.thickness)?;
        check_fraction(cell, "soil.theta_s", self.theta_s)?;
        check_fraction(cell, "soil.theta_r", self.theta_r)?;
        if self.theta_s <= self.theta_r {
            return Err(ParameterError::InvalidParameter {
                cell,
                name: "soil.theta_s",
                value: self.theta_s,
                reason: "must exceed theta_r",
            });
        }
        check_positive(cell, "soil.ksat_ver", self.ksat_ver)?;
        check_positive(cell, "soil.m", self.m)?;
        check_non_negative(cell, "soil.ksat_hor_frac", self.ksat_hor_frac)?;
        check_non_negative(cell, "soil.infilt_cap_soil", self.infilt_cap_soil)?;
        check_non_negative(cell, "soil.infilt_cap_path", self.infilt_cap_path)?;
        check_fraction(cell, "soil.path_frac", self.path_frac)?;
        check_non_negative(cell, "soil.max_leakage", self.max_leakage)?;
        check_non_negative(cell, "soil.max_percolation", self.max_percolation)?;
        check_non_negative(cell, "soil.rooting_depth", self.rooting_depth)?;
        if !(self.root_dist_par.is_finite() && self.root_dist_par < 0.0) {
            return Err(ParameterError::InvalidParameter {
                cell,
                name: "soil.root_dist_par",
                value: self.root_dist_par,
                reason: "must be negative",
            });
        }
        check_positive(cell, "soil.cap_scale", self.cap_scale)?;
        check_fraction(cell, "soil.macropore_frac", self.macropore_frac)?;
        check_non_negative(cell, "soil.slope", self.slope)?;
        Ok(())
    }
}

/// Canopy interception parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanopyParams {
    /// Canopy storage capacity [mm].
    pub max_storage: f64,
    /// Free throughfall fraction [-].
    pub gap_fraction: f64,
    /// Mean evaporation over mean rainfall rate during storms [-].
    pub evap_over_rain: f64,
}

impl Default for CanopyParams {
    fn default() -> Self {
        Self {
            max_storage: 1.0,
            gap_fraction: 0.1,
            evap_over_rain: 0.1,
        }
    }
}

impl CanopyParams {
    pub fn validate(&self, cell: usize) -> Result<(), ParameterError> {
        check_non_negative(cell, "canopy.max_storage", self.max_storage)?;
        check_fraction(cell, "canopy.gap_fraction", self.gap_fraction)?;
        check_fraction(cell, "canopy.evap_over_rain", self.evap_over_rain)?;
        Ok(())
    }
}

/// Open water and river surface shares of a cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceParams {
    /// Open water (lake) fraction [-].
    pub water_frac: f64,
    /// River fraction [-].
    pub river_frac: f64,
    /// Re-infiltration limit [mm/d].
    pub max_reinfiltration: f64,
}

impl SurfaceParams {
    pub fn validate(&self, cell: usize) -> Result<(), ParameterError> {
        check_fraction(cell, "surface.water_frac", self.water_frac)?;
        check_fraction(cell, "surface.river_frac", self.river_frac)?;
        check_non_negative(cell, "surface.max_reinfiltration", self.max_reinfiltration)?;
        Ok(())
    }
}

/// HBV-type snow parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnowParams {
    /// Threshold temperature for snowfall [C].
    pub tt: f64,
    /// Width of the rain/snow transition interval [C].
    pub tti: f64,
    /// Threshold temperature for melt [C].
    pub ttm: f64,
    /// Degree-day factor [mm/C/d].
    pub cfmax: f64,
    /// Water holding capacity of snow [-].
    pub whc: f64,
    /// Soil temperature smoothing weight [1/d].
    pub w_soil: f64,
    /// Infiltration reduction floor for frozen soil [-].
    pub cf_soil: f64,
}

impl Default for SnowParams {
    fn default() -> Self {
        Self {
            tt: 0.0,
            tti: 1.0,
            ttm: 0.0,
            cfmax: 3.75653,
            whc: 0.1,
            w_soil: 0.1125,
            cf_soil: 0.038,
        }
    }
}

impl SnowParams {
    pub fn validate(&self, cell: usize) -> Result<(), ParameterError> {
        for (name, v) in [("snow.tt", self.tt), ("snow.ttm", self.ttm)] {
            if !v.is_finite() {
                return Err(ParameterError::InvalidParameter {
                    cell,
                    name,
                    value: v,
                    reason: "must be finite",
                });
            }
        }
        check_non_negative(cell, "snow.tti", self.tti)?;
        check_non_negative(cell, "snow.cfmax", self.cfmax)?;
        check_bounds(cell, "snow.whc", self.whc, &WHC_BOUNDS, "must lie in [0, 1]")?;
        check_non_negative(cell, "snow.w_soil", self.w_soil)?;
        check_fraction(cell, "snow.cf_soil", self.cf_soil)?;
        Ok(())
    }
}

/// Terrain statistics for sub-cell saturated-area runoff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubgridParams {
    /// Mean cell elevation [m].
    pub altitude: f64,
    /// Highest elevation inside the cell [m].
    pub dem_max: f64,
    /// Lowest elevation inside the cell, the drainage base [m].
    pub drainage_base: f64,
    /// Share of the soil depth that generates sub-cell runoff [-].
    pub runoff_generating_gw_perc: f64,
}

impl SubgridParams {
    /// Sharpness of the saturated-fraction curve.
    pub fn sharpness(&self) -> f64 {
        let k = -(1.0_f64 / 0.1 - 1.0).ln();
        let low = (k / (self.drainage_base - self.altitude).min(-0.1)).min(100.0);
        let up = (k / (self.altitude - self.dem_max).min(-0.1)).min(100.0);
        0.5 * (low + up)
    }

    /// Elevation change per mm of water-table depth [m/mm].
    pub fn gw_scale(&self, soil_thickness: f64) -> f64 {
        (self.dem_max - self.drainage_base) / soil_thickness / self.runoff_generating_gw_perc
    }

    pub fn validate(&self, cell: usize) -> Result<(), ParameterError> {
        if !(self.altitude.is_finite() && self.dem_max.is_finite() && self.drainage_base.is_finite())
        {
            return Err(ParameterError::InvalidParameter {
                cell,
                name: "subgrid.altitude",
                value: self.altitude,
                reason: "elevations must be finite",
            });
        }
        if self.dem_max < self.drainage_base {
            return Err(ParameterError::InvalidParameter {
                cell,
                name: "subgrid.dem_max",
                value: self.dem_max,
                reason: "must not lie below drainage_base",
            });
        }
        check_positive(
            cell,
            "subgrid.runoff_generating_gw_perc",
            self.runoff_generating_gw_perc,
        )
    }
}
