//! Soil-water process functions.
//!
//! Pure per-cell functions for the infiltration partition, evaporation and
//! transpiration, store transfers, deep losses, exfiltration and
//! re-infiltration. Inputs are depths in mm per timestep; rates given per day
//! must be scaled before they arrive here.
use super::constants::{
    EXFILTRATION_STEEPNESS, MAX_REINFILTRATION_SHARE, MIN_SATURATION_DEFICIT,
    S_CURVE_EXPONENT_LIMIT, WHOLE_USTORE_AVAILABILITY,
};

/// Logistic curve `b / (1 + exp(-c (x - a)))`.
pub fn s_curve(x: f64, a: f64, b: f64, c: f64) -> f64 {
    let exponent = (-c * (x - a)).clamp(-S_CURVE_EXPONENT_LIMIT, S_CURVE_EXPONENT_LIMIT);
    b / (1.0 + exponent.exp())
}

/// Split of water available at the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Infiltration {
    pub soil: f64,
    pub path: f64,
    /// Water left over while the unsaturated store still had room.
    pub infiltration_excess: f64,
    /// Everything left at the surface.
    pub excess_water: f64,
}

impl Infiltration {
    pub fn total(&self) -> f64 {
        self.soil + self.path
    }
}

/// Infiltrate into the undisturbed and compacted parts of the cell.
///
/// Each part is limited by its capacity (times `reduction`, the frozen-soil
/// factor) and both together by the room left in the unsaturated store.
pub fn infiltrate(
    available: f64,
    path_frac: f64,
    cap_soil: f64,
    cap_path: f64,
    reduction: f64,
    ustore_room: f64,
) -> Infiltration {
    let mut room = ustore_room.max(0.0);
    let mut left = available;

    let soil_part = available * (1.0 - path_frac);
    let soil = (cap_soil * reduction).min(soil_part).min(room).max(0.0);
    room -= soil;
    left -= soil;

    let path_part = available * path_frac;
    let path = (cap_path * reduction).min(path_part).min(room).max(0.0);
    room -= path;
    left -= path;

    Infiltration {
        soil,
        path,
        infiltration_excess: if room > 0.0 { left } else { 0.0 },
        excess_water: left,
    }
}

/// Bare-soil evaporation, scaled by the relative saturation deficit and
/// limited by the unsaturated store.
pub fn soil_evaporation(demand: f64, deficit: f64, capacity: f64, ustore: f64) -> f64 {
    let scale = if capacity > 0.0 {
        (deficit / capacity).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (demand * scale).min(ustore).max(0.0)
}

/// Result of root water uptake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transpiration {
    pub from_satstore: f64,
    pub from_ustore: f64,
    pub satstore: f64,
    pub ustore: f64,
}

impl Transpiration {
    pub fn total(&self) -> f64 {
        self.from_satstore + self.from_ustore
    }
}

/// Transpiration drawing first on the saturated store, then the unsaturated.
///
/// Roots reach the saturated store through a smooth wetness curve of the
/// water-table depth against the rooting depth. The unsaturated store gives
/// up a share depending on how deep the water table is below the roots.
pub fn transpire(
    demand: f64,
    water_table: f64,
    rooting_depth: f64,
    root_dist_par: f64,
    satstore: f64,
    ustore: f64,
    whole_ustore: bool,
) -> Transpiration {
    let demand = demand.max(0.0);
    let wet_roots = s_curve(water_table, rooting_depth, 1.0, root_dist_par);
    let from_satstore = (demand * wet_roots).min(satstore).max(0.0);
    let rest = demand - from_satstore;

    let avail_share = if whole_ustore {
        WHOLE_USTORE_AVAILABILITY
    } else if water_table < rooting_depth {
        1.0
    } else {
        (rooting_depth / (water_table + 1.0)).max(0.0)
    };
    let from_ustore = (avail_share * ustore).min(rest).min(ustore).max(0.0);

    Transpiration {
        from_satstore,
        from_ustore,
        satstore: satstore - from_satstore,
        ustore: ustore - from_ustore,
    }
}

/// Drainage from the unsaturated to the saturated store.
///
/// `ksat` is the conductivity at the water table for this timestep.
pub fn unsaturated_transfer(ustore: f64, deficit: f64, ksat: f64) -> f64 {
    if deficit <= MIN_SATURATION_DEFICIT {
        return 0.0;
    }
    (ksat * ustore / (deficit + 1.0)).min(ustore).max(0.0)
}

/// Capillary rise from the saturated into the unsaturated store.
///
/// Bounded by conductivity, the evaporative demand met from the unsaturated
/// store, the room left there and the saturated store; scaled down with the
/// distance between the water table and the roots, zero when roots reach it.
#[allow(clippy::too_many_arguments)]
pub fn capillary_flux(
    ksat: f64,
    uptake_from_ustore: f64,
    ustore_room: f64,
    satstore: f64,
    water_table: f64,
    rooting_depth: f64,
    cap_scale: f64,
    day_fraction: f64,
) -> f64 {
    if water_table <= rooting_depth {
        return 0.0;
    }
    let max_flux = ksat
        .min(uptake_from_ustore)
        .min(ustore_room)
        .min(satstore)
        .max(0.0);
    let scale = cap_scale / (cap_scale + water_table - rooting_depth) * day_fraction;
    max_flux * scale.min(1.0)
}

/// Leakage and percolation out of the bottom of the saturated store.
///
/// Both share the conductivity at the soil base and together never take more
/// than `satstore`. Returns `(leakage, percolation)`.
pub fn deep_losses(satstore: f64, deep_ksat: f64, max_leakage: f64, max_percolation: f64) -> (f64, f64) {
    let deep = satstore.min(deep_ksat).max(0.0);
    let leakage = max_leakage.min(deep).max(0.0);
    // One budget: percolation gets what leakage leaves, not its own clip at `deep`.
    let percolation = max_percolation.min(deep - leakage).max(0.0);
    (leakage, percolation)
}

/// Saturation excess returned to the surface by a smooth curve around the
/// soil water capacity.
pub fn exfiltration(satstore: f64, capacity: f64) -> f64 {
    let frac = s_curve(satstore, capacity, 1.0, EXFILTRATION_STEEPNESS);
    (frac * (satstore - capacity)).max(0.0)
}

/// Channel water infiltrating back into the unsaturated store [mm].
///
/// `channel_water` is the channel depth in mm, `width` and `length` the
/// channel width and cell length in m.
pub fn reinfiltration(
    channel_water: f64,
    width: f64,
    length: f64,
    infilt_cap_soil: f64,
    path_frac: f64,
    ustore_room: f64,
    max_reinfiltration: f64,
) -> f64 {
    if length <= 0.0 {
        return 0.0;
    }
    let from_channel = channel_water * width / length * MAX_REINFILTRATION_SHARE;
    let soil_limit = (infilt_cap_soil * (1.0 - path_frac)).min(ustore_room);
    from_channel.min(soil_limit).max(0.0).min(max_reinfiltration)
}

/// Lateral subsurface transport capacity of a cell [mm].
///
/// `ksat` is the surface conductivity for this timestep.
pub fn lateral_capacity(
    ksat: f64,
    ksat_hor_frac: f64,
    slope: f64,
    deficit: f64,
    m: f64,
    satstore: f64,
) -> f64 {
    (ksat * ksat_hor_frac * slope * (-deficit.max(0.0) / m).exp())
        .min(satstore)
        .max(0.0)
}

/// Runoff from the saturated part of a cell resolved at sub-cell scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubcellRunoff {
    pub saturated_fraction: f64,
    /// Surface runoff off the saturated fraction [mm].
    pub surface: f64,
    /// Groundwater seeping out of the saturated fraction [mm].
    pub groundwater: f64,
}

/// Sub-cell saturated-area runoff.
///
/// `absolute_gw` is the water table elevation, `lateral` the saturated
/// lateral flux the saturated fraction may release.
pub fn subcell_runoff(
    available: f64,
    satstore: f64,
    absolute_gw: f64,
    altitude: f64,
    sharpness: f64,
    open_fraction: f64,
    lateral: f64,
) -> SubcellRunoff {
    let frac = s_curve(absolute_gw, altitude + 1.0, 1.0, sharpness);
    let correction = (frac + open_fraction - 1.0).max(0.0);
    let surface = ((frac - correction) * available).max(0.0);
    let groundwater = (frac * satstore).min((frac * lateral).max(0.0));
    SubcellRunoff {
        saturated_fraction: frac,
        surface,
        groundwater,
    }
}
