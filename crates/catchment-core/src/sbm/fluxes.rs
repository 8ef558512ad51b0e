/// Per-cell vertical column outputs for one timestep.
///
/// All values in mm over the cell area, except `water_table_depth` [mm
/// below surface]. The derive generates `VerticalFluxesSeries`, which the
/// orchestrator fills with one entry per active cell.
use catchment_macros::Fluxes;

#[derive(Debug, Clone, Copy, Default, PartialEq, Fluxes)]
pub struct VerticalFluxes {
    pub precipitation: f64,
    pub snowfall: f64,
    pub snowmelt: f64,
    /// Liquid water reaching the canopy (rain plus snow pack outflow).
    pub liquid_input: f64,
    pub throughfall: f64,
    pub stemflow: f64,
    /// Irrigation supply applied on top of throughfall.
    pub irrigation: f64,
    pub interception: f64,
    pub open_water_runoff: f64,
    pub subcell_runoff: f64,
    pub subcell_gw_runoff: f64,
    pub infiltration: f64,
    pub infiltration_excess: f64,
    pub excess_water: f64,
    pub soil_evaporation: f64,
    /// Demand left for the roots after soil and open-water evaporation.
    pub potential_transpiration: f64,
    pub transpiration: f64,
    pub open_water_evaporation: f64,
    pub macropore_transfer: f64,
    pub transfer: f64,
    pub capillary_flux: f64,
    pub leakage: f64,
    pub percolation: f64,
    pub subsurface_in: f64,
    pub subsurface_out: f64,
    pub snow_in: f64,
    pub snow_out: f64,
    pub exfiltration: f64,
    pub reinfiltration: f64,
    /// Surface water handed to the channel before withdrawals.
    pub runoff_generated: f64,
    /// Net lateral flux into the channel, may be negative.
    pub lateral: f64,
    pub water_table_depth: f64,
}

impl VerticalFluxes {
    /// Actual evaporation from land stores (canopy, soil and roots).
    pub fn land_evaporation(&self) -> f64 {
        self.interception + self.soil_evaporation + self.transpiration
    }

    /// Water entering the column from outside the cell.
    pub fn column_inputs(&self) -> f64 {
        self.precipitation + self.irrigation + self.snow_in + self.subsurface_in + self.reinfiltration
    }

    /// Water leaving the column.
    pub fn column_outputs(&self) -> f64 {
        self.land_evaporation()
            + self.runoff_generated
            + self.leakage
            + self.percolation
            + self.subsurface_out
            + self.snow_out
    }
}
