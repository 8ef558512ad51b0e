/// Vertical column step functions.
///
/// - `vertical_step()`: snow, interception, infiltration, evaporation and
///   store transfers
/// - `surface_step()`: exfiltration, re-infiltration and the lateral flux,
///   run after the saturated stores have exchanged water laterally
/// - `step()`: both, for a column with no lateral exchange
use super::fluxes::VerticalFluxes;
use super::interception;
use super::params::{CanopyParams, SnowParams, SoilParams, SubgridParams, SurfaceParams};
use super::processes;
use super::snow;
use super::state::ColumnState;
use crate::config::RunConfig;
use crate::forcing::CellForcing;

/// Run-constant switches, resolved once from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnContext {
    pub day_fraction: f64,
    pub gash: bool,
    pub snow: bool,
    pub subgrid: bool,
    pub whole_ustore: bool,
    pub reinfiltration: bool,
}

impl ColumnContext {
    pub fn from_config(config: &RunConfig, has_snow: bool, has_subgrid: bool) -> Self {
        Self {
            day_fraction: config.day_fraction(),
            gash: config.timestep_secs >= super::constants::GASH_MIN_TIMESTEP_SECS,
            snow: config.snow && has_snow,
            subgrid: config.subgrid_runoff && has_subgrid,
            whole_ustore: config.whole_ustore_available,
            reinfiltration: config.reinfiltration,
        }
    }
}

impl Default for ColumnContext {
    fn default() -> Self {
        Self::from_config(&RunConfig::default(), false, false)
    }
}

/// Parameter blocks of one cell.
#[derive(Debug, Clone, Copy)]
pub struct ColumnParams<'a> {
    pub soil: &'a SoilParams,
    pub canopy: &'a CanopyParams,
    pub surface: &'a SurfaceParams,
    pub snow: Option<&'a SnowParams>,
    pub subgrid: Option<&'a SubgridParams>,
}

/// The cell's channel as seen from the column.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelView {
    /// Water level at the start of the step [m].
    pub level: f64,
    /// Channel width [m].
    pub width: f64,
    /// Cell edge length [m].
    pub cell_length: f64,
}

/// Surface conductivity scaled to the timestep, decayed to depth `z` [mm].
fn ksat_at(soil: &SoilParams, depth: f64, day_fraction: f64) -> f64 {
    soil.ksat_ver * day_fraction * (-soil.decay() * depth).exp()
}

/// First half of the column step, up to the deep losses.
pub fn vertical_step(
    state: &ColumnState,
    params: ColumnParams<'_>,
    forcing: &CellForcing,
    channel: ChannelView,
    ctx: &ColumnContext,
) -> (ColumnState, VerticalFluxes) {
    let dayf = ctx.day_fraction;
    let soil = params.soil;
    let capacity = soil.water_capacity();
    let mut s = *state;
    let mut fx = VerticalFluxes {
        precipitation: forcing.precipitation,
        ..Default::default()
    };

    // 1. Snow
    let snow_params = if ctx.snow { params.snow } else { None };
    let liquid = match snow_params {
        Some(sp) => {
            s.tsoil = snow::update_soil_temperature(s.tsoil, forcing.temperature, sp.w_soil * dayf);
            let up = snow::update_pack(
                s.snow,
                s.snow_water,
                forcing.precipitation,
                forcing.temperature,
                sp,
                sp.cfmax * dayf,
            );
            s.snow = up.snow;
            s.snow_water = up.snow_water;
            fx.snowfall = up.snowfall;
            fx.snowmelt = up.melt;
            up.outflow
        }
        None => forcing.precipitation,
    };
    fx.liquid_input = liquid;

    // 2. Interception
    let canopy = params.canopy;
    let icp = if ctx.gash {
        interception::gash(
            liquid,
            forcing.potential_evaporation,
            s.canopy,
            canopy.max_storage,
            canopy.gap_fraction,
            canopy.evap_over_rain,
        )
    } else {
        interception::rutter(
            liquid,
            forcing.potential_evaporation,
            s.canopy,
            canopy.max_storage,
            canopy.gap_fraction,
        )
    };
    s.canopy = icp.canopy;
    fx.throughfall = icp.throughfall;
    fx.stemflow = icp.stemflow;
    fx.interception = icp.evaporation;

    // 3. Surface partition and infiltration
    let surface = params.surface;
    let open_fraction = (surface.river_frac + surface.water_frac).min(1.0);
    fx.irrigation = forcing.irrigation;
    let mut available = icp.throughfall + icp.stemflow + forcing.irrigation;
    fx.open_water_runoff = open_fraction * available;
    available -= fx.open_water_runoff;

    if let (true, Some(sub)) = (ctx.subgrid, params.subgrid) {
        let zi = soil.water_table_depth(s.satstore);
        let absolute_gw = sub.dem_max - zi * sub.gw_scale(soil.thickness);
        let lateral = ksat_at(soil, zi, dayf) * soil.ksat_hor_frac * soil.slope;
        let r = processes::subcell_runoff(
            available,
            s.satstore,
            absolute_gw,
            sub.altitude,
            sub.sharpness(),
            surface.river_frac + surface.water_frac,
            lateral,
        );
        s.satstore -= r.groundwater;
        available -= r.surface;
        fx.subcell_runoff = r.surface;
        fx.subcell_gw_runoff = r.groundwater;
    }

    let reduction = match snow_params {
        Some(sp) => snow::frozen_soil_factor(s.tsoil, sp.cf_soil),
        None => 1.0,
    };
    let inf = processes::infiltrate(
        available,
        soil.path_frac,
        soil.infilt_cap_soil * dayf,
        soil.infilt_cap_path * dayf,
        reduction,
        capacity - s.satstore - s.ustore,
    );
    s.ustore += inf.total();
    fx.infiltration = inf.total();
    fx.infiltration_excess = inf.infiltration_excess;
    fx.excess_water = inf.excess_water;

    // 4. Evaporation and transpiration
    let demand = icp.remaining_demand;
    let soil_open_demand = (1.0 - canopy.gap_fraction) * demand;
    let open_water = (channel.level * 1000.0 * surface.water_frac)
        .min(surface.water_frac * soil_open_demand)
        .max(0.0);
    fx.open_water_evaporation = open_water;

    let soil_evap = processes::soil_evaporation(
        soil_open_demand - open_water,
        capacity - s.satstore,
        capacity,
        s.ustore,
    );
    s.ustore -= soil_evap;
    fx.soil_evaporation = soil_evap;

    let rooting_depth = soil.effective_rooting_depth();
    fx.potential_transpiration = (demand - soil_evap - open_water).max(0.0);
    let tr = processes::transpire(
        fx.potential_transpiration,
        soil.water_table_depth(s.satstore),
        rooting_depth,
        soil.root_dist_par,
        s.satstore,
        s.ustore,
        ctx.whole_ustore,
    );
    s.satstore = tr.satstore;
    s.ustore = tr.ustore;
    fx.transpiration = tr.total();

    // 5. Store transfer and deep losses
    let macropore = (inf.total() * soil.macropore_frac).min(s.ustore).max(0.0);
    s.satstore += macropore;
    s.ustore -= macropore;
    fx.macropore_transfer = macropore;

    let zi = soil.water_table_depth(s.satstore);
    let ksat = ksat_at(soil, zi, dayf);
    let transfer = processes::unsaturated_transfer(s.ustore, capacity - s.satstore, ksat);
    let capillary = processes::capillary_flux(
        ksat,
        tr.from_ustore,
        (capacity - s.satstore - s.ustore).max(0.0),
        s.satstore,
        zi,
        rooting_depth,
        soil.cap_scale,
        dayf,
    );
    let (leakage, percolation) = processes::deep_losses(
        s.satstore + transfer - capillary,
        ksat_at(soil, soil.thickness, dayf),
        soil.max_leakage * dayf,
        soil.max_percolation * dayf,
    );
    s.satstore += transfer - capillary - leakage - percolation;
    s.ustore += capillary - transfer;
    fx.transfer = transfer;
    fx.capillary_flux = capillary;
    fx.leakage = leakage;
    fx.percolation = percolation;
    fx.water_table_depth = soil.water_table_depth(s.satstore);

    (s, fx)
}

/// Transport capacity of the saturated store towards the downstream cell [mm].
pub fn subsurface_capacity(state: &ColumnState, soil: &SoilParams, ctx: &ColumnContext) -> f64 {
    processes::lateral_capacity(
        soil.ksat_ver * ctx.day_fraction,
        soil.ksat_hor_frac,
        soil.slope,
        soil.water_capacity() - state.satstore,
        soil.m,
        state.satstore,
    )
}

/// Second half of the column step: return flow and the lateral flux.
pub fn surface_step(
    state: &ColumnState,
    fluxes: &VerticalFluxes,
    params: ColumnParams<'_>,
    channel: ChannelView,
    ctx: &ColumnContext,
) -> (ColumnState, VerticalFluxes) {
    let soil = params.soil;
    let capacity = soil.water_capacity();
    let mut s = *state;
    let mut fx = *fluxes;

    // Saturation excess, then anything the unsaturated store can no longer hold.
    let exfiltration = processes::exfiltration(s.satstore, capacity);
    s.satstore -= exfiltration;
    let room = (capacity - s.satstore).max(0.0);
    let overflow = (s.ustore - room).max(0.0);
    s.ustore -= overflow;
    fx.exfiltration = exfiltration + overflow;

    if ctx.reinfiltration {
        let reinfiltration = processes::reinfiltration(
            channel.level * 1000.0,
            channel.width,
            channel.cell_length,
            soil.infilt_cap_soil * ctx.day_fraction,
            soil.path_frac,
            (capacity - s.satstore - s.ustore).max(0.0),
            params.surface.max_reinfiltration * ctx.day_fraction,
        );
        s.ustore += reinfiltration;
        fx.reinfiltration = reinfiltration;
    }

    fx.runoff_generated = fx.excess_water
        + fx.exfiltration
        + fx.open_water_runoff
        + fx.subcell_runoff
        + fx.subcell_gw_runoff;
    fx.lateral = fx.runoff_generated - fx.reinfiltration - fx.open_water_evaporation;
    fx.water_table_depth = soil.water_table_depth(s.satstore);

    (s, fx)
}

/// Full column step without lateral exchange with other cells.
pub fn step(
    state: &ColumnState,
    params: ColumnParams<'_>,
    forcing: &CellForcing,
    channel: ChannelView,
    ctx: &ColumnContext,
) -> (ColumnState, VerticalFluxes) {
    let (mid, fluxes) = vertical_step(state, params, forcing, channel, ctx);
    surface_step(&mid, &fluxes, params, channel, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::column_residual;

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    struct Blocks {
        soil: SoilParams,
        canopy: CanopyParams,
        surface: SurfaceParams,
        snow: SnowParams,
    }

    impl Blocks {
        fn new() -> Self {
            Self {
                soil: SoilParams {
                    thickness: 500.0,
                    theta_s: 0.45,
                    theta_r: 0.05,
                    ksat_ver: 200.0,
                    m: 100.0,
                    infilt_cap_soil: 50.0,
                    infilt_cap_path: 5.0,
                    path_frac: 0.05,
                    rooting_depth: 300.0,
                    ..Default::default()
                },
                canopy: CanopyParams::default(),
                surface: SurfaceParams {
                    water_frac: 0.05,
                    river_frac: 0.02,
                    max_reinfiltration: 5.0,
                },
                snow: SnowParams::default(),
            }
        }

        fn params(&self) -> ColumnParams<'_> {
            ColumnParams {
                soil: &self.soil,
                canopy: &self.canopy,
                surface: &self.surface,
                snow: Some(&self.snow),
                subgrid: None,
            }
        }
    }

    fn forcing(precipitation: f64, pet: f64, temperature: f64) -> CellForcing {
        CellForcing {
            precipitation,
            potential_evaporation: pet,
            temperature,
            irrigation: 0.0,
        }
    }

    /// Deterministic LCG stream in [0, 1).
    fn lcg(seed: u64) -> impl FnMut() -> f64 {
        let mut state = seed;
        move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as f64 / (1u64 << 31) as f64
        }
    }

    // -- Single step behaviour --

    #[test]
    fn dry_soil_absorbs_moderate_rain() {
        let b = Blocks::new();
        let state = ColumnState::initialize(&b.soil, 0.3, 10.0);
        let (_, fx) = step(&state, b.params(), &forcing(10.0, 0.0, 15.0), ChannelView::default(), &ColumnContext::default());
        assert!(fx.infiltration > 8.0);
        assert_approx(fx.excess_water, 0.0, 1e-12);
        assert_eq!(fx.exfiltration, 0.0);
        assert!(fx.open_water_runoff > 0.0);
    }

    #[test]
    fn saturated_soil_sheds_rain() {
        let b = Blocks::new();
        let state = ColumnState::initialize(&b.soil, 1.0, 10.0);
        let (new, fx) = step(&state, b.params(), &forcing(20.0, 0.0, 15.0), ChannelView::default(), &ColumnContext::default());
        assert!(fx.excess_water > 15.0);
        assert!(fx.runoff_generated > 15.0);
        assert!(new.satstore + new.ustore <= b.soil.water_capacity() + 1e-6);
    }

    #[test]
    fn lateral_is_runoff_minus_channel_losses() {
        let b = Blocks::new();
        let ctx = ColumnContext {
            reinfiltration: true,
            ..Default::default()
        };
        let channel = ChannelView {
            level: 0.5,
            width: 5.0,
            cell_length: 100.0,
        };
        let state = ColumnState::initialize(&b.soil, 0.5, 10.0);
        let (_, fx) = step(&state, b.params(), &forcing(5.0, 4.0, 15.0), channel, &ctx);
        assert!(fx.reinfiltration > 0.0);
        assert!(fx.open_water_evaporation > 0.0);
        assert_approx(
            fx.lateral,
            fx.runoff_generated - fx.reinfiltration - fx.open_water_evaporation,
            1e-12,
        );
    }

    #[test]
    fn frozen_soil_limits_infiltration() {
        let b = Blocks::new();
        let ctx = ColumnContext {
            snow: true,
            ..Default::default()
        };
        let mut frozen = ColumnState::initialize(&b.soil, 0.3, -10.0);
        frozen.snow = 0.0;
        let thawed = ColumnState::initialize(&b.soil, 0.3, 10.0);
        // Warm enough to rain, soil temperature barely moves in one step.
        let f = forcing(40.0, 0.0, 5.0);
        let (_, fx_frozen) = step(&frozen, b.params(), &f, ChannelView::default(), &ctx);
        let (_, fx_thawed) = step(&thawed, b.params(), &f, ChannelView::default(), &ctx);
        assert!(fx_frozen.infiltration < 0.2 * fx_thawed.infiltration);
    }

    #[test]
    fn cold_precipitation_stays_in_pack() {
        let b = Blocks::new();
        let ctx = ColumnContext {
            snow: true,
            ..Default::default()
        };
        let state = ColumnState::initialize(&b.soil, 0.5, 0.0);
        let (new, fx) = step(&state, b.params(), &forcing(12.0, 0.5, -8.0), ChannelView::default(), &ctx);
        assert_approx(new.snow, 12.0, 1e-12);
        assert_eq!(fx.liquid_input, 0.0);
        assert_eq!(fx.infiltration, 0.0);
    }

    #[test]
    fn irrigation_joins_surface_input() {
        let b = Blocks::new();
        let state = ColumnState::initialize(&b.soil, 0.3, 10.0);
        let ctx = ColumnContext::default();
        let dry = forcing(0.0, 4.0, 15.0);
        let watered = CellForcing {
            irrigation: 6.0,
            ..dry
        };
        let (_, fx_dry) = step(&state, b.params(), &dry, ChannelView::default(), &ctx);
        let (new, fx) = step(&state, b.params(), &watered, ChannelView::default(), &ctx);
        assert_eq!(fx.irrigation, 6.0);
        assert_approx(fx.open_water_runoff, 0.07 * 6.0, 1e-12);
        assert!(fx.infiltration > fx_dry.infiltration);
        assert!(fx.potential_transpiration >= fx.transpiration);
        assert_approx(column_residual(&state, &new, &fx), 0.0, 1e-9);
    }

    // -- Invariants over many steps --

    fn run_closed(ctx: ColumnContext, seed: u64) {
        let b = Blocks::new();
        let mut state = ColumnState::initialize(&b.soil, 0.85, 2.0);
        let mut rand = lcg(seed);
        for _ in 0..400 {
            let f = forcing(
                if rand() < 0.4 { 60.0 * rand() } else { 0.0 },
                5.0 * rand(),
                -10.0 + 25.0 * rand(),
            );
            let (new, fx) = step(&state, b.params(), &f, ChannelView::default(), &ctx);
            assert!(new.ustore >= 0.0, "ustore {}", new.ustore);
            assert!(new.satstore >= 0.0, "satstore {}", new.satstore);
            assert!(new.canopy >= 0.0 && new.canopy <= b.canopy.max_storage + 1e-12);
            assert!(new.snow >= 0.0 && new.snow_water >= 0.0);
            assert_approx(column_residual(&state, &new, &fx), 0.0, 1e-9);
            state = new;
        }
    }

    #[test]
    fn daily_gash_column_conserves_mass() {
        run_closed(ColumnContext::default(), 42);
    }

    #[test]
    fn hourly_rutter_column_conserves_mass() {
        let cfg = RunConfig {
            timestep_secs: 3600.0,
            ..Default::default()
        };
        run_closed(ColumnContext::from_config(&cfg, false, false), 7);
    }

    #[test]
    fn snow_column_conserves_mass() {
        let ctx = ColumnContext {
            snow: true,
            whole_ustore: true,
            ..Default::default()
        };
        run_closed(ctx, 99);
    }

    #[test]
    fn leaky_column_conserves_mass() {
        let mut b = Blocks::new();
        b.soil.max_leakage = 2.0;
        b.soil.max_percolation = 1.0;
        b.soil.macropore_frac = 0.2;
        let ctx = ColumnContext::default();
        let mut state = ColumnState::initialize(&b.soil, 0.9, 10.0);
        for day in 0..60 {
            let f = forcing(if day % 5 == 0 { 30.0 } else { 0.0 }, 3.0, 12.0);
            let (new, fx) = step(&state, b.params(), &f, ChannelView::default(), &ctx);
            assert!(fx.leakage <= 2.0 + 1e-12 && fx.percolation <= 1.0 + 1e-12);
            assert_approx(column_residual(&state, &new, &fx), 0.0, 1e-9);
            state = new;
        }
    }

    #[test]
    fn subsurface_capacity_bounded_by_store() {
        let b = Blocks::new();
        let wet = ColumnState::initialize(&b.soil, 1.0, 10.0);
        let ctx = ColumnContext::default();
        let cap = subsurface_capacity(&wet, &b.soil, &ctx);
        assert_approx(cap, 200.0 * 1.0 * 0.01, 1e-9);
        let empty = ColumnState::default();
        assert_eq!(subsurface_capacity(&empty, &b.soil, &ctx), 0.0);
    }
}
