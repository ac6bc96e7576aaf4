//! Outer-level parallelism: independent simulations on a bounded pool.
//!
//! A single [`Simulation`] never runs on more than one thread. Sweeps run
//! one simulation per worker slot, each with its own seed, and collect
//! completions by polling with a timeout.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use crate::config::{DeviceConfig, RunConfig, SweepConfig};
use crate::device::Device;
use crate::energy::{EnergyTerm, MagnetizationTerm, Parameters, Results};
use crate::error::{MsdError, MsdResult};
use crate::simulation::Simulation;
use crate::vector::DVec3;

type Work<J, T> = dyn Fn(J, usize, &AtomicBool) -> MsdResult<T> + Send + Sync;

/// A bounded pool running jobs of type `J` to results of type `T`.
///
/// At most `capacity` jobs are in flight; [`try_dispatch`](Self::try_dispatch)
/// hands the job back when every slot is busy. Each job receives a worker id
/// unique for the lifetime of the pool and the shared cancellation flag.
pub struct WorkerPool<J, T> {
    pool: rayon::ThreadPool,
    capacity: usize,
    in_flight: usize,
    next_id: Arc<Mutex<usize>>,
    cancel: Arc<AtomicBool>,
    work: Arc<Work<J, T>>,
    tx: Sender<MsdResult<T>>,
    rx: Receiver<MsdResult<T>>,
}

impl<J, T> WorkerPool<J, T>
where
    J: Send + 'static,
    T: Send + 'static,
{
    pub fn new<F>(capacity: usize, cancel: Arc<AtomicBool>, work: F) -> MsdResult<Self>
    where
        F: Fn(J, usize, &AtomicBool) -> MsdResult<T> + Send + Sync + 'static,
    {
        let capacity = capacity.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(capacity)
            .thread_name(|i| format!("msd-worker-{i}"))
            .build()?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            pool,
            capacity,
            in_flight: 0,
            next_id: Arc::new(Mutex::new(0)),
            cancel,
            work: Arc::new(work),
            tx,
            rx,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.capacity
    }

    /// Ask every running job to stop at its next check.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Start `job` if a slot is free, otherwise give it back.
    pub fn try_dispatch(&mut self, job: J) -> Result<(), J> {
        if !self.has_capacity() {
            return Err(job);
        }
        self.in_flight += 1;
        let tx = self.tx.clone();
        let work = Arc::clone(&self.work);
        let cancel = Arc::clone(&self.cancel);
        let next_id = Arc::clone(&self.next_id);
        self.pool.spawn(move || {
            let id = {
                let mut guard = next_id.lock().unwrap_or_else(|p| p.into_inner());
                let id = *guard;
                *guard += 1;
                id
            };
            // the receiver only goes away with the pool
            let _ = tx.send(work(job, id, &cancel));
        });
        Ok(())
    }

    /// Wait up to `timeout` for a completion, then take every other one
    /// already available without waiting.
    pub fn poll(&mut self, timeout: Duration) -> Vec<MsdResult<T>> {
        let mut done = Vec::new();
        if self.in_flight == 0 {
            return done;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(r) => done.push(r),
            Err(RecvTimeoutError::Timeout) => return done,
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = 0;
                return done;
            }
        }
        while let Ok(r) = self.rx.try_recv() {
            done.push(r);
        }
        self.in_flight -= done.len();
        done
    }

    /// Block until every in-flight job has completed.
    pub fn drain(&mut self) -> Vec<MsdResult<T>> {
        let mut done = Vec::with_capacity(self.in_flight);
        while self.in_flight > 0 {
            match self.rx.recv() {
                Ok(r) => {
                    done.push(r);
                    self.in_flight -= 1;
                }
                Err(_) => self.in_flight = 0,
            }
        }
        done
    }
}

/// One sweep point waiting to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepJob {
    pub index: usize,
    pub parameters: Parameters,
    pub seed: u64,
}

/// Summary of one completed sweep point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepPoint {
    pub index: usize,
    pub worker: usize,
    pub seed: u64,
    #[serde(rename = "kT")]
    pub kt: f64,
    #[serde(rename = "B")]
    pub field: DVec3,
    pub snapshots: usize,
    pub mean_u: Option<f64>,
    pub mean_m: Option<DVec3>,
    pub specific_heat: f64,
    pub susceptibility: f64,
    pub results: Results,
}

impl SweepPoint {
    fn from_simulation(index: usize, worker: usize, sim: &Simulation) -> Self {
        let p = sim.device().parameters();
        Self {
            index,
            worker,
            seed: sim.seed(),
            kt: p.kt,
            field: p.field,
            snapshots: sim.record().len(),
            mean_u: sim.mean_energy(EnergyTerm::U),
            mean_m: sim.mean_magnetization(MagnetizationTerm::M),
            specific_heat: sim.specific_heat(EnergyTerm::U),
            susceptibility: sim.magnetic_susceptibility(MagnetizationTerm::M),
            results: *sim.results(),
        }
    }
}

impl SweepJob {
    pub fn run(
        self,
        worker: usize,
        device: &DeviceConfig,
        run: &RunConfig,
        cancel: &AtomicBool,
    ) -> MsdResult<SweepPoint> {
        let mut sim = Simulation::with_seed(Device::new(device, self.parameters), self.seed);
        sim.run(run, cancel)?;
        Ok(SweepPoint::from_simulation(self.index, worker, &sim))
    }
}

/// The jobs of a sweep, in point order.
pub fn sweep_jobs(cfg: &SweepConfig) -> Vec<SweepJob> {
    let base = cfg.seed.unwrap_or_else(|| rand::thread_rng().gen());
    (0..cfg.points)
        .map(|i| SweepJob {
            index: i,
            parameters: cfg.point(i),
            seed: base.wrapping_add(i as u64),
        })
        .collect()
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run every point of `cfg` on a pool of `cfg.workers` threads.
///
/// `on_point` sees each point as it completes; the returned points are in
/// input order. The first failing point cancels the rest and its error is
/// returned.
pub fn run_sweep(
    cfg: &SweepConfig,
    cancel: Arc<AtomicBool>,
    mut on_point: impl FnMut(&SweepPoint),
) -> MsdResult<Vec<SweepPoint>> {
    cfg.validate()?;
    let device = cfg.device;
    let run = cfg.run;
    let mut pending: VecDeque<SweepJob> = sweep_jobs(cfg).into();
    let mut pool = WorkerPool::new(cfg.workers.min(cfg.points), cancel, move |job: SweepJob, worker, cancel| {
        job.run(worker, &device, &run, cancel)
    })?;

    info!(
        points = cfg.points,
        workers = pool.capacity(),
        steps = run.equilibration_steps + run.sampling_steps,
        "sweep started"
    );

    let mut points: Vec<Option<SweepPoint>> = vec![None; cfg.points];
    let mut failure: Option<MsdError> = None;

    while failure.is_none() && (!pending.is_empty() || pool.in_flight() > 0) {
        while !pool.is_cancelled() {
            let Some(job) = pending.pop_front() else { break };
            if let Err(job) = pool.try_dispatch(job) {
                pending.push_front(job);
                break;
            }
        }
        if pool.is_cancelled() && pool.in_flight() == 0 {
            failure = Some(MsdError::Interrupted);
            break;
        }
        for r in pool.poll(POLL_INTERVAL) {
            match r {
                Ok(point) => {
                    on_point(&point);
                    let i = point.index;
                    points[i] = Some(point);
                }
                Err(e) => {
                    warn!(error = %e, "sweep point failed, cancelling the rest");
                    pool.cancel();
                    failure.get_or_insert(e);
                }
            }
        }
    }

    if let Some(e) = failure {
        pool.drain();
        return Err(e);
    }
    info!(points = cfg.points, "sweep finished");
    Ok(points.into_iter().flatten().collect())
}

/// Run prepared simulations side by side, one rayon task each.
pub fn run_sweep_parallel(sims: &mut [Simulation], run: &RunConfig, interrupted: &AtomicBool) -> Vec<MsdResult<()>> {
    if sims.len() == 1 {
        return vec![sims[0].run(run, interrupted)];
    }
    sims.par_iter_mut().map(|sim| sim.run(run, interrupted)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use std::collections::HashSet;

    fn tiny_sweep(points: usize, workers: usize) -> SweepConfig {
        SweepConfig {
            device: DeviceConfig {
                geometry: Geometry {
                    width: 4,
                    height: 3,
                    depth: 3,
                    mol_pos_l: 2,
                    mol_pos_r: 2,
                    top_l: 0,
                    bottom_l: 2,
                    front_r: 0,
                    back_r: 2,
                },
                ..Default::default()
            },
            points,
            kt_stop: Some(1.0),
            run: RunConfig {
                equilibration_steps: 200,
                sampling_steps: 200,
                freq: 20,
                ..Default::default()
            },
            seed: Some(11),
            workers,
            ..Default::default()
        }
    }

    #[test]
    fn test_try_dispatch_respects_capacity() {
        let gate = Arc::new(AtomicBool::new(false));
        let g = Arc::clone(&gate);
        let mut pool = WorkerPool::new(2, Arc::new(AtomicBool::new(false)), move |j: usize, id, _| {
            while !g.load(Ordering::Acquire) {
                std::thread::yield_now();
            }
            Ok((j, id))
        })
        .unwrap();

        assert!(pool.try_dispatch(0).is_ok());
        assert!(pool.try_dispatch(1).is_ok());
        assert_eq!(pool.try_dispatch(2), Err(2));
        assert!(pool.poll(Duration::from_millis(1)).is_empty());

        gate.store(true, Ordering::Release);
        let done = pool.drain();
        assert_eq!(done.len(), 2);
        let ids: HashSet<usize> = done.into_iter().map(|r| r.unwrap().1).collect();
        assert_eq!(ids.len(), 2);
        assert!(pool.try_dispatch(2).is_ok());
        assert_eq!(pool.drain().len(), 1);
    }

    #[test]
    fn test_run_sweep_in_order() {
        let cfg = tiny_sweep(3, 2);
        let mut seen = 0;
        let points = run_sweep(&cfg, Arc::new(AtomicBool::new(false)), |_| seen += 1).unwrap();
        assert_eq!(seen, 3);
        assert_eq!(points.len(), 3);
        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.index, i);
            assert_eq!(p.seed, 11 + i as u64);
            assert_eq!(p.snapshots, 11);
            assert_eq!(p.results.t, 400);
        }
        assert_eq!(points[0].kt, 0.25);
        assert_eq!(points[2].kt, 1.0);
    }

    #[test]
    fn test_sweep_matches_sequential_run() {
        let cfg = tiny_sweep(2, 2);
        let points = run_sweep(&cfg, Arc::new(AtomicBool::new(false)), |_| {}).unwrap();
        let flag = AtomicBool::new(false);
        let alone = SweepJob {
            index: 1,
            parameters: cfg.point(1),
            seed: 12,
        }
        .run(0, &cfg.device, &cfg.run, &flag)
        .unwrap();
        assert_eq!(points[1].results, alone.results);
        assert_eq!(points[1].mean_u, alone.mean_u);
    }

    #[test]
    fn test_cancelled_sweep() {
        let cfg = tiny_sweep(4, 2);
        let res = run_sweep(&cfg, Arc::new(AtomicBool::new(true)), |_| {});
        assert_eq!(res, Err(MsdError::Interrupted));
    }

    #[test]
    fn test_run_sweep_parallel() {
        let cfg = tiny_sweep(1, 1);
        let make = |seed| Simulation::with_seed(Device::new(&cfg.device, Parameters::default()), seed);
        let mut sims = vec![make(1), make(2), make(1)];
        let flag = AtomicBool::new(false);
        let out = run_sweep_parallel(&mut sims, &cfg.run, &flag);
        assert!(out.iter().all(|r| r.is_ok()));
        assert_eq!(sims[0].results(), sims[2].results());
        assert_eq!(sims[0].record(), sims[2].record());
    }
}
