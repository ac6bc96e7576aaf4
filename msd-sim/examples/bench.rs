use std::sync::atomic::AtomicBool;
use std::time::Instant;

use msd_sim::config::*;
use msd_sim::geometry::Geometry;
use msd_sim::{run_sweep_parallel, Device, Parameters, Simulation};

const L: usize = 32;
const N_SIMS: usize = 8;
const N_STEPS: u64 = 2_000_000;

fn main() {
    let device = DeviceConfig {
        geometry: Geometry {
            width: L,
            height: L,
            depth: L,
            mol_pos_l: (L / 2) as i64,
            mol_pos_r: (L / 2) as i64,
            top_l: (L / 4) as i64,
            bottom_l: (3 * L / 4) as i64,
            front_r: (L / 4) as i64,
            back_r: (3 * L / 4) as i64,
        },
        ..Default::default()
    };
    let params = Parameters {
        kt: 0.5,
        ..Default::default()
    };

    let mut sims: Vec<Simulation> = (0..N_SIMS)
        .map(|i| Simulation::with_seed(Device::new(&device, params), 42 + i as u64))
        .collect();
    let n_sites = sims[0].device().lattice().counts().n;

    let interrupted = AtomicBool::new(false);
    let config = RunConfig {
        equilibration_steps: N_STEPS / 2,
        sampling_steps: N_STEPS / 2,
        freq: 10_000,
        flip: FlipStrategy::Continuous,
    };

    println!(
        "Lattice: {L}x{L}x{L}  |  Sites: {n_sites}  |  Simulations: {N_SIMS}  |  Steps: {N_STEPS}"
    );
    println!("{}", "-".repeat(70));

    let t0 = Instant::now();
    for r in run_sweep_parallel(&mut sims, &config, &interrupted) {
        r.unwrap();
    }
    let elapsed = t0.elapsed().as_secs_f64();

    let total = (N_STEPS * N_SIMS as u64) as f64;
    println!(
        "Total: {:.3} s  |  {:.2} M steps/s  |  {:.1} ns/step per simulation",
        elapsed,
        total / elapsed / 1e6,
        elapsed / N_STEPS as f64 * 1e9
    );

    let mut drift: f64 = 0.0;
    for sim in &sims {
        drift = drift.max(sim.device().recompute().max_deviation(sim.results()));
    }
    println!("Max drift vs recompute: {drift:.3e}");
}
