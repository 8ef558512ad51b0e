use catchment_macros::Fluxes;

#[derive(Debug, Clone, Copy, PartialEq, Fluxes)]
pub struct ColumnFluxes {
    pub infiltration: f64,
    pub exfiltration: f64,
    pub lateral: f64,
}

fn main() {
    let a = ColumnFluxes { infiltration: 4.0, exfiltration: 0.0, lateral: 1.5 };
    let b = ColumnFluxes { infiltration: 2.0, exfiltration: 0.5, lateral: 0.5 };
    let mut cells = ColumnFluxesSeries::with_capacity(2);
    cells.push(&a);
    cells.push(&b);
    assert_eq!(cells.len(), 2);
    assert!(!cells.is_empty());
    assert_eq!(cells.get(1), Some(b));
    assert_eq!(cells.get(2), None);
    assert_eq!(
        ColumnFluxes::field_names(),
        &["infiltration", "exfiltration", "lateral"]
    );
}
