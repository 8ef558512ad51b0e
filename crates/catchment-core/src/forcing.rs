/// Per-step forcing arrays.
///
/// All arrays are dense over active cells. Observed discharge is indexed by
/// gauge (the order of `AssimilationConfig::gauge_cells`), and `None` or NaN
/// marks a missing observation.
use crate::error::ForcingError;

/// Forcing for a single cell, as consumed by the vertical column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellForcing {
    /// Precipitation [mm/timestep].
    pub precipitation: f64,
    /// Potential evapotranspiration [mm/timestep].
    pub potential_evaporation: f64,
    /// Air temperature [C]. Only read when snow is enabled.
    pub temperature: f64,
    /// Irrigation water spread over the cell [mm/timestep].
    pub irrigation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forcing {
    pub precipitation: Vec<f64>,
    pub potential_evaporation: Vec<f64>,
    pub temperature: Option<Vec<f64>>,
    /// Signed external inflow [m3/s]; negative values request a withdrawal.
    pub inflow: Option<Vec<f64>>,
    /// Observed discharge per gauge [m3/s].
    pub observed_discharge: Option<Vec<Option<f64>>>,
}

impl Forcing {
    pub fn new(precipitation: Vec<f64>, potential_evaporation: Vec<f64>) -> Self {
        Self {
            precipitation,
            potential_evaporation,
            temperature: None,
            inflow: None,
            observed_discharge: None,
        }
    }

    /// Spatially uniform precipitation and PET over `n_cells`.
    pub fn uniform(n_cells: usize, precipitation: f64, potential_evaporation: f64) -> Self {
        Self::new(
            vec![precipitation; n_cells],
            vec![potential_evaporation; n_cells],
        )
    }

    pub fn with_temperature(mut self, temperature: Vec<f64>) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_inflow(mut self, inflow: Vec<f64>) -> Self {
        self.inflow = Some(inflow);
        self
    }

    pub fn with_observed_discharge(mut self, observed: Vec<Option<f64>>) -> Self {
        self.observed_discharge = Some(observed);
        self
    }

    /// Check shapes and values against the run layout.
    ///
    /// Validates:
    /// - every per-cell array has `n_cells` entries
    /// - precipitation and PET are finite and non-negative
    /// - temperature and inflow are finite
    /// - temperature is present when snow is enabled
    /// - observations, when given, have one entry per gauge
    pub fn validate(
        &self,
        n_cells: usize,
        n_gauges: usize,
        needs_temperature: bool,
    ) -> Result<(), ForcingError> {
        check_cells("precipitation", &self.precipitation, n_cells, true)?;
        check_cells(
            "potential_evaporation",
            &self.potential_evaporation,
            n_cells,
            true,
        )?;
        match &self.temperature {
            Some(t) => check_cells("temperature", t, n_cells, false)?,
            None if needs_temperature => return Err(ForcingError::MissingTemperature),
            None => {}
        }
        if let Some(inflow) = &self.inflow {
            check_cells("inflow", inflow, n_cells, false)?;
        }
        if let Some(obs) = &self.observed_discharge {
            if obs.len() != n_gauges {
                return Err(ForcingError::LengthMismatch {
                    name: "observed_discharge",
                    expected: n_gauges,
                    actual: obs.len(),
                });
            }
        }
        Ok(())
    }

    /// Forcing seen by one cell.
    pub fn cell(&self, cell: usize) -> CellForcing {
        CellForcing {
            precipitation: self.precipitation[cell],
            potential_evaporation: self.potential_evaporation[cell],
            temperature: self
                .temperature
                .as_ref()
                .map_or(0.0, |t| t[cell]),
            irrigation: 0.0,
        }
    }
}

fn check_cells(
    name: &'static str,
    values: &[f64],
    n_cells: usize,
    non_negative: bool,
) -> Result<(), ForcingError> {
    if values.len() != n_cells {
        return Err(ForcingError::LengthMismatch {
            name,
            expected: n_cells,
            actual: values.len(),
        });
    }
    for (cell, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(ForcingError::NonFinite { name, cell });
        }
        if non_negative && v < 0.0 {
            return Err(ForcingError::Negative { name, cell });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_forcing_passes() {
        let f = Forcing::uniform(3, 10.0, 2.0).with_inflow(vec![0.0, -1.0, 0.5]);
        assert!(f.validate(3, 0, false).is_ok());
        assert_eq!(f.cell(1).precipitation, 10.0);
        assert_eq!(f.cell(1).temperature, 0.0);
    }

    #[test]
    fn length_mismatch_rejected() {
        let f = Forcing::new(vec![1.0; 3], vec![1.0; 2]);
        assert_eq!(
            f.validate(3, 0, false),
            Err(ForcingError::LengthMismatch {
                name: "potential_evaporation",
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn nan_rejected() {
        let f = Forcing::new(vec![1.0, f64::NAN], vec![1.0; 2]);
        assert_eq!(
            f.validate(2, 0, false),
            Err(ForcingError::NonFinite {
                name: "precipitation",
                cell: 1
            })
        );
    }

    #[test]
    fn negative_precipitation_rejected() {
        let f = Forcing::new(vec![-1.0], vec![1.0]);
        assert!(matches!(
            f.validate(1, 0, false),
            Err(ForcingError::Negative { .. })
        ));
    }

    #[test]
    fn snow_requires_temperature() {
        let f = Forcing::uniform(2, 1.0, 1.0);
        assert_eq!(
            f.validate(2, 0, true),
            Err(ForcingError::MissingTemperature)
        );
        let f = f.with_temperature(vec![-3.0, 1.0]);
        assert!(f.validate(2, 0, true).is_ok());
    }

    #[test]
    fn observations_may_be_missing_or_nan() {
        let f = Forcing::uniform(2, 1.0, 1.0).with_observed_discharge(vec![None, Some(f64::NAN)]);
        assert!(f.validate(2, 2, false).is_ok());
        assert!(f.validate(2, 1, false).is_err());
    }
}
