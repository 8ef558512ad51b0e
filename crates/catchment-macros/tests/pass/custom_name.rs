use catchment_macros::Fluxes;

#[derive(Debug, Clone, Copy, Fluxes)]
#[fluxes(series_name = "OutletSeries")]
pub struct OutletFluxes {
    pub discharge: f64,
    pub storage: f64,
}

fn main() {
    let f = OutletFluxes { discharge: 12.5, storage: 3.0e4 };
    let mut ts = OutletSeries::with_capacity(5);
    assert!(ts.is_empty());
    ts.push(&f);
    assert_eq!(ts.len(), 1);
    assert_eq!(OutletFluxes::field_names(), &["discharge", "storage"]);
}
