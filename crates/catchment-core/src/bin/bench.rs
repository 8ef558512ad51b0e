/// Catchment stepping benchmarks on synthetic grids.
///
/// Uses std::time::Instant for timing, a deterministic LCG PRNG for forcing,
/// and std::hint::black_box to prevent dead-code elimination. Set RUST_LOG
/// to see the model's own log lines.
use std::hint::black_box;
use std::time::{Duration, Instant};

use catchment_core::network::ldd::PIT;
use catchment_core::routing::ChannelParams;
use catchment_core::sbm::{CanopyParams, SoilParams, SurfaceParams};
use catchment_core::{
    Catchment, CellParameters, DrainageNetwork, FlowDirectionGrid, Forcing, ModelError, RunConfig,
};
use tracing_subscriber::EnvFilter;

const REPEATS: usize = 5;
const STEPS: usize = 48;

/// Comb-shaped drainage: every row drains east into the last column, which
/// drains south to a single pit in the bottom-right corner.
fn comb_grid(side: usize) -> Result<FlowDirectionGrid, ModelError> {
    let codes = (0..side * side)
        .map(|i| {
            let (row, col) = (i / side, i % side);
            Some(if col + 1 < side {
                6
            } else if row + 1 < side {
                2
            } else {
                PIT
            })
        })
        .collect();
    Ok(FlowDirectionGrid::new(side, side, 1000.0, codes)?)
}

/// Simple LCG PRNG for deterministic forcing.
fn make_forcing(n_cells: usize, steps: usize, seed: u64) -> Vec<Forcing> {
    let mut state = seed;
    let mut next_f64 = || -> f64 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };
    (0..steps)
        .map(|_| {
            let storm = next_f64() < 0.3;
            let precip = (0..n_cells)
                .map(|_| if storm { next_f64() * 30.0 } else { 0.0 })
                .collect();
            let pet = (0..n_cells).map(|_| 0.5 + next_f64() * 4.5).collect();
            Forcing::new(precip, pet)
        })
        .collect()
}

/// Run a closure `REPEATS` times, return the median duration.
fn median_time<F: FnMut()>(mut f: F) -> Duration {
    let mut times: Vec<Duration> = (0..REPEATS)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .collect();
    times.sort();
    times[REPEATS / 2]
}

fn bench_grid(side: usize, parallel: bool) -> Result<(usize, Duration), ModelError> {
    let network = DrainageNetwork::build(&comb_grid(side)?)?;
    let params = CellParameters::uniform(
        &network,
        SoilParams::default(),
        CanopyParams::default(),
        SurfaceParams::default(),
        ChannelParams::default(),
    )
    .with_estimated_widths(&network, 60.0, 300.0);
    let config = RunConfig {
        parallel,
        ..Default::default()
    };
    let forcing = make_forcing(network.n_cells(), STEPS, 42);
    let model = Catchment::new(network, params, config)?;

    // Warmup
    black_box(model.clone().run(&forcing)?);

    let mut failure = None;
    let dur = median_time(|| match model.clone().run(&forcing) {
        Ok(out) => {
            black_box(out);
        }
        Err(e) => failure = Some(e),
    });
    match failure {
        Some(e) => Err(e),
        None => Ok((side * side, dur)),
    }
}

fn main() -> Result<(), ModelError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Catchment Core Benchmarks ({STEPS} daily steps)");
    println!("============================================================");
    println!("{:<10} {:>8}   {:>12}", "Mode", "Cells", "Median (ms)");
    println!("--------------------------------------------");

    for side in [16, 64, 128] {
        for parallel in [false, true] {
            let (cells, dur) = bench_grid(side, parallel)?;
            let mode = if parallel { "parallel" } else { "serial" };
            let ms = dur.as_secs_f64() * 1000.0;
            println!("{:<10} {:>8}      {:>8.2}", mode, cells, ms);
        }
    }

    println!("============================================================");
    Ok(())
}
