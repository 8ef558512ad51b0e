/// Per-cell parameter fields for a whole catchment.
///
/// Dense arrays over active cells, composed of required blocks (soil,
/// canopy, surface, channel) and optional ones (snow, subgrid runoff,
/// reservoirs, return flows, irrigation areas). The orchestrator checks
/// once at setup which optional blocks are present.
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::error::ParameterError;
use crate::network::DrainageNetwork;
use crate::routing::geometry::estimate_width;
use crate::routing::{ChannelParams, IrrigationParams, ReservoirParams, ReturnFlowLink};
use crate::sbm::{CanopyParams, SnowParams, SoilParams, SubgridParams, SurfaceParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellParameters {
    pub soil: Vec<SoilParams>,
    pub canopy: Vec<CanopyParams>,
    pub surface: Vec<SurfaceParams>,
    pub channel: Vec<ChannelParams>,
    #[serde(default)]
    pub snow: Option<Vec<SnowParams>>,
    #[serde(default)]
    pub subgrid: Option<Vec<SubgridParams>>,
    #[serde(default)]
    pub reservoirs: Vec<ReservoirParams>,
    #[serde(default)]
    pub return_flows: Vec<ReturnFlowLink>,
    #[serde(default)]
    pub irrigation: Option<IrrigationParams>,
}

fn check_len<T>(name: &'static str, values: &[T], expected: usize) -> Result<(), ParameterError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(ParameterError::LengthMismatch {
            name,
            expected,
            actual: values.len(),
        })
    }
}

fn check_cell(name: &'static str, cell: usize, n_cells: usize) -> Result<(), ParameterError> {
    if cell < n_cells {
        Ok(())
    } else {
        Err(ParameterError::CellOutOfRange { name, cell, n_cells })
    }
}

impl CellParameters {
    /// The same blocks in every cell; channel length follows the network's
    /// drain length.
    pub fn uniform(
        network: &DrainageNetwork,
        soil: SoilParams,
        canopy: CanopyParams,
        surface: SurfaceParams,
        channel: ChannelParams,
    ) -> Self {
        let n = network.n_cells();
        Self {
            soil: vec![soil; n],
            canopy: vec![canopy; n],
            surface: vec![surface; n],
            channel: (0..n)
                .map(|cell| ChannelParams {
                    length: network.drain_length(cell),
                    ..channel
                })
                .collect(),
            snow: None,
            subgrid: None,
            reservoirs: Vec::new(),
            return_flows: Vec::new(),
            irrigation: None,
        }
    }

    pub fn with_snow(mut self, snow: Vec<SnowParams>) -> Self {
        self.snow = Some(snow);
        self
    }

    pub fn with_subgrid(mut self, subgrid: Vec<SubgridParams>) -> Self {
        self.subgrid = Some(subgrid);
        self
    }

    pub fn with_reservoirs(mut self, reservoirs: Vec<ReservoirParams>) -> Self {
        self.reservoirs = reservoirs;
        self
    }

    pub fn with_return_flows(mut self, links: Vec<ReturnFlowLink>) -> Self {
        self.return_flows = links;
        self
    }

    pub fn with_irrigation(mut self, irrigation: IrrigationParams) -> Self {
        self.irrigation = Some(irrigation);
        self
    }

    /// Replace channel widths with the bankfull estimate from contributing
    /// area, slope and roughness.
    pub fn with_estimated_widths(mut self, network: &DrainageNetwork, alf: f64, annual_discharge: f64) -> Self {
        let largest = (0..network.n_cells())
            .map(|c| network.contributing_area(c))
            .fold(0.0, f64::max);
        for (cell, ch) in self.channel.iter_mut().enumerate() {
            let relative = network.contributing_area(cell) / largest;
            ch.width = estimate_width(relative, ch.slope, ch.manning_n, alf, annual_discharge);
        }
        self
    }

    /// Check every block against the network size and the enabled
    /// sub-models.
    pub fn validate(&self, n_cells: usize, config: &RunConfig) -> Result<(), ParameterError> {
        check_len("soil", &self.soil, n_cells)?;
        check_len("canopy", &self.canopy, n_cells)?;
        check_len("surface", &self.surface, n_cells)?;
        check_len("channel", &self.channel, n_cells)?;

        for cell in 0..n_cells {
            self.soil[cell].validate(cell)?;
            self.canopy[cell].validate(cell)?;
            self.surface[cell].validate(cell)?;
            self.channel[cell].validate(cell)?;
        }

        match &self.snow {
            Some(snow) => {
                check_len("snow", snow, n_cells)?;
                for (cell, s) in snow.iter().enumerate() {
                    s.validate(cell)?;
                }
            }
            None if config.snow => return Err(ParameterError::MissingBlock { name: "snow" }),
            None => {}
        }

        match &self.subgrid {
            Some(subgrid) => {
                check_len("subgrid", subgrid, n_cells)?;
                for (cell, s) in subgrid.iter().enumerate() {
                    s.validate(cell)?;
                }
            }
            None if config.subgrid_runoff => {
                return Err(ParameterError::MissingBlock { name: "subgrid" })
            }
            None => {}
        }

        let mut seen = vec![false; n_cells];
        for r in &self.reservoirs {
            check_cell("reservoir.cell", r.cell, n_cells)?;
            if let Some(outlet) = r.outlet {
                check_cell("reservoir.outlet", outlet, n_cells)?;
            }
            if std::mem::replace(&mut seen[r.cell], true) {
                return Err(ParameterError::DuplicateReservoir { cell: r.cell });
            }
            r.validate()?;
        }

        for link in &self.return_flows {
            check_cell("return_flow.intake", link.intake, n_cells)?;
            check_cell("return_flow.target", link.target, n_cells)?;
            link.validate()?;
        }

        match &self.irrigation {
            Some(irrigation) => {
                check_len("irrigation.area", &irrigation.area, n_cells)?;
                irrigation.validate(n_cells)?;
            }
            None if config.irrigation => {
                return Err(ParameterError::MissingBlock { name: "irrigation" })
            }
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::FlowDirectionGrid;

    fn network() -> DrainageNetwork {
        DrainageNetwork::build(&FlowDirectionGrid::parse("3 . 1\n. 5 .", 100.0).unwrap()).unwrap()
    }

    fn params(net: &DrainageNetwork) -> CellParameters {
        CellParameters::uniform(
            net,
            SoilParams::default(),
            CanopyParams::default(),
            SurfaceParams::default(),
            ChannelParams::default(),
        )
    }

    fn reservoir(cell: usize) -> ReservoirParams {
        ReservoirParams {
            cell,
            max_volume: 1.0e5,
            target_full_frac: 0.8,
            target_min_frac: 0.2,
            max_release: 1.0,
            demand: 0.1,
            outlet: None,
        }
    }

    #[test]
    fn uniform_uses_drain_lengths() {
        let net = network();
        let p = params(&net);
        assert!((p.channel[0].length - 100.0 * std::f64::consts::SQRT_2).abs() < 1e-9);
        assert_eq!(p.channel[2].length, 100.0);
        assert!(p.validate(3, &RunConfig::default()).is_ok());
    }

    #[test]
    fn length_mismatch_detected() {
        let net = network();
        let mut p = params(&net);
        p.soil.pop();
        assert_eq!(
            p.validate(3, &RunConfig::default()),
            Err(ParameterError::LengthMismatch {
                name: "soil",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn snow_enabled_without_block_rejected() {
        let net = network();
        let cfg = RunConfig {
            snow: true,
            ..Default::default()
        };
        let p = params(&net);
        assert_eq!(
            p.validate(3, &cfg),
            Err(ParameterError::MissingBlock { name: "snow" })
        );
        let p = params(&net).with_snow(vec![SnowParams::default(); 3]);
        assert!(p.validate(3, &cfg).is_ok());
    }

    #[test]
    fn zero_conductivity_rejected() {
        let net = network();
        let mut p = params(&net);
        p.soil[1].ksat_ver = 0.0;
        assert!(matches!(
            p.validate(3, &RunConfig::default()),
            Err(ParameterError::InvalidParameter { cell: 1, .. })
        ));
    }

    #[test]
    fn reservoir_checks() {
        let net = network();
        let p = params(&net).with_reservoirs(vec![reservoir(0), reservoir(0)]);
        assert_eq!(
            p.validate(3, &RunConfig::default()),
            Err(ParameterError::DuplicateReservoir { cell: 0 })
        );
        let p = params(&net).with_reservoirs(vec![reservoir(7)]);
        assert!(matches!(
            p.validate(3, &RunConfig::default()),
            Err(ParameterError::CellOutOfRange { cell: 7, .. })
        ));
    }

    #[test]
    fn irrigation_block_checked() {
        let net = network();
        let cfg = RunConfig {
            irrigation: true,
            ..Default::default()
        };
        assert_eq!(
            params(&net).validate(3, &cfg),
            Err(ParameterError::MissingBlock { name: "irrigation" })
        );
        let short = params(&net).with_irrigation(IrrigationParams {
            area: vec![Some(0)],
            intakes: vec![2],
        });
        assert!(matches!(
            short.validate(3, &cfg),
            Err(ParameterError::LengthMismatch { name: "irrigation.area", .. })
        ));
        let p = params(&net).with_irrigation(IrrigationParams {
            area: vec![Some(0), None, None],
            intakes: vec![2],
        });
        assert!(p.validate(3, &cfg).is_ok());
    }

    #[test]
    fn estimated_width_largest_at_outlet() {
        let net = network();
        let p = params(&net).with_estimated_widths(&net, 60.0, 300.0);
        assert!(p.channel[2].width > p.channel[0].width);
        assert!(p.validate(3, &RunConfig::default()).is_ok());
    }
}
