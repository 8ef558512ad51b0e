use catchment_macros::Fluxes;

#[derive(Debug, Clone, Copy, Fluxes)]
pub struct Totals {
    pub precipitation: f64,
    pub evaporation: f64,
}

fn main() {
    let mut ts = TotalsSeries::default();
    ts.push(&Totals { precipitation: 10.0, evaporation: 2.0 });
    ts.push(&Totals { precipitation: 0.0, evaporation: 1.5 });
    assert_eq!(ts.column("evaporation"), Some(&[2.0, 1.5][..]));
    assert_eq!(ts.column("runoff"), None);
}
