mod record;

pub use record::Record;

use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use serde::Serialize;
use tracing::{debug, info};
use validator::Validate;

use crate::config::{FlipStrategy, RunConfig};
use crate::device::Device;
use crate::energy::{EnergyTerm, MagnetizationTerm, Results};
use crate::error::{MsdError, MsdResult};
use crate::mcmc;
use crate::vector::DVec3;

/// Which half of a run the driver is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Proposals are applied without recording.
    Equilibrating,
    /// A snapshot of [`Results`] is taken every `freq` steps.
    Sampling,
}

/// Metropolis driver owning one [`Device`] and its PRNG.
///
/// Strictly sequential: every step depends on the state committed by the
/// previous one. Independent simulations share nothing and may run on
/// separate threads.
pub struct Simulation {
    device: Device,
    rng: Xoshiro256StarStar,
    seed: u64,
    flip: FlipStrategy,
    record: Record,
    phase: Phase,
}

fn fresh_seed() -> u64 {
    rand::thread_rng().gen()
}

impl Simulation {
    /// Wrap `device` with a freshly drawn seed.
    pub fn new(device: Device) -> Self {
        Self::with_seed(device, fresh_seed())
    }

    pub fn with_seed(device: Device, seed: u64) -> Self {
        Self {
            device,
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            seed,
            flip: FlipStrategy::default(),
            record: Record::default(),
            phase: Phase::Equilibrating,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn into_device(self) -> Device {
        self.device
    }

    pub fn results(&self) -> &Results {
        self.device.results()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the PRNG from `seed`.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = Xoshiro256StarStar::seed_from_u64(seed);
    }

    pub fn flip(&self) -> FlipStrategy {
        self.flip
    }

    pub fn set_flip(&mut self, flip: FlipStrategy) {
        self.flip = flip;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn clear_record(&mut self) {
        self.record.clear();
    }

    /// Restore the initial state with `t = 0` and an empty record. The PRNG
    /// restarts from the current seed, or from a new one if `reseed`.
    pub fn reinitialize(&mut self, reseed: bool) {
        self.restart_rng(reseed);
        self.device.reset_state();
        self.record.clear();
        self.phase = Phase::Equilibrating;
        debug!(seed = self.seed, "reinitialized");
    }

    /// Like [`reinitialize`](Self::reinitialize), but every site starts from
    /// a random direction instead of the initial state.
    pub fn randomize(&mut self, reseed: bool) {
        self.restart_rng(reseed);
        self.device.randomize(&mut self.rng);
        self.device.reset_time();
        self.record.clear();
        self.phase = Phase::Equilibrating;
        debug!(seed = self.seed, "randomized");
    }

    fn restart_rng(&mut self, reseed: bool) {
        let seed = if reseed { fresh_seed() } else { self.seed };
        self.set_seed(seed);
    }

    /// Run `n` steps without recording.
    pub fn metropolis(&mut self, n: u64) {
        self.phase = Phase::Equilibrating;
        mcmc::metropolis_sweep(&mut self.device, &self.flip, &mut self.rng, n);
    }

    /// Run `n` steps, taking a snapshot before every block of `freq` steps.
    ///
    /// The state after the last block is only recorded when `n` is a multiple
    /// of `freq`. With `freq == 0` nothing is recorded. `cancel` is checked
    /// before each snapshot; once set, the run stops with
    /// [`MsdError::Interrupted`] and the steps already taken are kept.
    pub fn metropolis_sampled(&mut self, n: u64, freq: u64, cancel: Option<&AtomicBool>) -> MsdResult<()> {
        self.phase = Phase::Sampling;
        if freq == 0 {
            mcmc::metropolis_sweep(&mut self.device, &self.flip, &mut self.rng, n);
            return Ok(());
        }

        let mut remaining = n;
        loop {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(MsdError::Interrupted);
            }
            self.record.push(*self.device.results());
            let block = remaining.min(freq);
            mcmc::metropolis_sweep(&mut self.device, &self.flip, &mut self.rng, block);
            remaining -= block;
            if block < freq {
                return Ok(());
            }
        }
    }

    /// Equilibrate, then sample, as described by `config`.
    pub fn run(&mut self, config: &RunConfig, interrupted: &AtomicBool) -> MsdResult<()> {
        config.validate()?;
        self.flip = config.flip;

        info!(
            seed = self.seed,
            kt = self.device.parameters().kt,
            equilibration = config.equilibration_steps,
            sampling = config.sampling_steps,
            freq = config.freq,
            "run started"
        );
        self.metropolis(config.equilibration_steps);
        if interrupted.load(Ordering::Relaxed) {
            return Err(MsdError::Interrupted);
        }
        self.metropolis_sampled(config.sampling_steps, config.freq, Some(interrupted))?;
        info!(t = self.device.results().t, snapshots = self.record.len(), "run finished");
        Ok(())
    }

    pub fn mean_energy(&self, term: EnergyTerm) -> Option<f64> {
        self.record.mean_energy(term)
    }

    pub fn mean_magnetization(&self, term: MagnetizationTerm) -> Option<DVec3> {
        self.record.mean_magnetization(term)
    }

    /// Specific heat of `term` at the device's current kT.
    pub fn specific_heat(&self, term: EnergyTerm) -> f64 {
        self.record
            .specific_heat(term, self.device.lattice().counts(), self.device.parameters().kt)
    }

    /// Magnetic susceptibility of `term` at the device's current kT.
    pub fn magnetic_susceptibility(&self, term: MagnetizationTerm) -> f64 {
        self.record
            .magnetic_susceptibility(term, self.device.lattice().counts(), self.device.parameters().kt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::energy::Parameters;
    use crate::geometry::Geometry;
    use approx::assert_relative_eq;

    fn small_sim(seed: u64) -> Simulation {
        let config = DeviceConfig {
            geometry: Geometry {
                width: 5,
                height: 5,
                depth: 5,
                mol_pos_l: 2,
                mol_pos_r: 2,
                top_l: 1,
                bottom_l: 3,
                front_r: 1,
                back_r: 3,
            },
            ..Default::default()
        };
        Simulation::with_seed(Device::new(&config, Parameters::default()), seed)
    }

    #[test]
    fn test_metropolis_advances_t() {
        let mut sim = small_sim(1);
        sim.metropolis(0);
        assert_eq!(sim.results().t, 0);
        sim.metropolis(25);
        assert_eq!(sim.results().t, 25);
        assert_eq!(sim.phase(), Phase::Equilibrating);
        assert!(sim.record().is_empty());
    }

    #[test]
    fn test_sampling_snapshots() {
        let mut sim = small_sim(2);
        sim.metropolis_sampled(10, 3, None).unwrap();
        let ts: Vec<u64> = sim.record().iter().map(|r| r.t).collect();
        assert_eq!(ts, vec![0, 3, 6, 9]);
        assert_eq!(sim.results().t, 10);
        assert_eq!(sim.phase(), Phase::Sampling);

        sim.clear_record();
        sim.metropolis_sampled(9, 3, None).unwrap();
        let ts: Vec<u64> = sim.record().iter().map(|r| r.t).collect();
        assert_eq!(ts, vec![10, 13, 16, 19]);

        sim.clear_record();
        sim.metropolis_sampled(7, 0, None).unwrap();
        assert!(sim.record().is_empty());
        assert_eq!(sim.results().t, 26);
    }

    #[test]
    fn test_cancel_before_snapshot() {
        let mut sim = small_sim(3);
        let flag = AtomicBool::new(true);
        assert_eq!(sim.metropolis_sampled(100, 10, Some(&flag)), Err(MsdError::Interrupted));
        assert!(sim.record().is_empty());
        assert_eq!(sim.results().t, 0);
    }

    #[test]
    fn test_same_seed_same_trajectory() {
        let mut a = small_sim(42);
        let mut b = small_sim(42);
        a.metropolis(2000);
        b.metropolis(2000);
        assert_eq!(a.results(), b.results());
        assert!(a.device().sites().eq(b.device().sites()));
    }

    #[test]
    fn test_reinitialize_restores_baseline() {
        let mut sim = small_sim(5);
        let baseline = *sim.results();
        sim.metropolis_sampled(500, 50, None).unwrap();
        sim.reinitialize(false);
        assert_eq!(sim.results().t, 0);
        assert!(sim.record().is_empty());
        assert_relative_eq!(sim.results().u, baseline.u, epsilon = 1e-9);
        assert!(sim.device().sites().all(|s| s.spin == DVec3::Y));
    }

    #[test]
    fn test_run_validates_config() {
        let mut sim = small_sim(6);
        let flag = AtomicBool::new(false);
        let bad = RunConfig {
            sampling_steps: 10,
            freq: 0,
            ..Default::default()
        };
        assert!(matches!(sim.run(&bad, &flag), Err(MsdError::Config(_))));

        let ok = RunConfig {
            equilibration_steps: 100,
            sampling_steps: 100,
            freq: 10,
            flip: FlipStrategy::UpDown,
        };
        sim.run(&ok, &flag).unwrap();
        assert_eq!(sim.flip(), FlipStrategy::UpDown);
        assert_eq!(sim.record().len(), 11);
        assert_eq!(sim.results().t, 200);
    }

    #[test]
    fn test_randomize_keeps_magnitudes() {
        let mut sim = small_sim(7);
        sim.randomize(false);
        assert_eq!(sim.results().t, 0);
        for s in sim.device().sites() {
            assert_relative_eq!(s.spin.length(), 1.0, epsilon = 1e-12);
        }
        let fresh = sim.device().recompute();
        assert!(fresh.max_deviation(sim.results()) < 1e-9);
    }
}
