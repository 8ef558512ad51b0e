/// Per-cell kinematic-wave update.
///
/// Four-point nonlinear scheme: given upstream inflow, lateral inflow and the
/// current wetted area, solve `dtx*Q + alpha*Q^beta = C` for the new discharge
/// with Newton-Raphson. The new storage then follows from conservation, so
/// the update never creates or destroys water.
use super::constants::{BETA, MAX_NEWTON_ITERATIONS, MIN_FLUX, NEWTON_TOLERANCE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellUpdate {
    pub discharge: f64,
    pub storage: f64,
    /// Withdrawal the channel could not supply [m3].
    pub shortfall: f64,
}

/// Solve `dtx*Q + alpha*Q^beta = c` for `Q >= 0`.
pub fn solve_discharge(c: f64, alpha: f64, dtx: f64, guess: f64) -> f64 {
    if c <= 0.0 {
        return 0.0;
    }
    let mut q = guess.max(MIN_FLUX);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let residual = dtx * q + alpha * q.powf(BETA) - c;
        if residual.abs() < NEWTON_TOLERANCE {
            break;
        }
        let slope = dtx + alpha * BETA * q.powf(BETA - 1.0);
        let next = (q - residual / slope).max(MIN_FLUX);
        let converged = (next - q).abs() <= NEWTON_TOLERANCE * q.max(1.0);
        q = next;
        if converged {
            break;
        }
    }
    q
}

/// Advance one channel cell by one sub-step of `dts` seconds.
///
/// `inflow` is the discharge arriving from upstream this sub-step and
/// `lateral` the lateral inflow rate [m3/s] over the whole channel length.
pub fn update(
    inflow: f64,
    discharge: f64,
    storage: f64,
    lateral: f64,
    alpha: f64,
    length: f64,
    dts: f64,
) -> CellUpdate {
    let dtx = dts / length;
    let lateral_per_length = lateral / length;
    let c = dtx * inflow + storage / length + dts * lateral_per_length;

    // Linear first guess around the mean of old and upstream discharge.
    let mean = (0.5 * (discharge + inflow)).max(MIN_FLUX);
    let ab_pq = alpha * BETA * mean.powf(BETA - 1.0);
    let guess = (dtx * inflow + discharge * ab_pq + dts * lateral_per_length) / (dtx + ab_pq);

    let q = solve_discharge(c, alpha, dtx, guess);
    let volume = (c - dtx * q) * length;
    if volume < 0.0 {
        CellUpdate {
            discharge: q,
            storage: 0.0,
            shortfall: -volume,
        }
    } else {
        CellUpdate {
            discharge: q,
            storage: volume,
            shortfall: 0.0,
        }
    }
}
