/// SBM vertical soil column.
///
/// Per-cell snow, canopy interception, infiltration, evapotranspiration and
/// the exchange between an unsaturated and a saturated store whose
/// conductivity decays exponentially with depth.
pub mod column;
pub mod constants;
pub mod fluxes;
pub mod interception;
pub mod params;
pub mod processes;
pub mod snow;
pub mod state;

pub use column::{ChannelView, ColumnContext, ColumnParams};
pub use fluxes::{VerticalFluxes, VerticalFluxesSeries};
pub use params::{CanopyParams, SnowParams, SoilParams, SubgridParams, SurfaceParams};
pub use state::ColumnState;
