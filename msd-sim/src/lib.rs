pub mod config;
pub mod device;
pub mod energy;
pub mod error;
pub mod geometry;
pub mod mcmc;
pub mod molecule;
pub mod parallel;
pub mod simulation;
pub mod statistics;
pub mod vector;

pub use config::{DeviceConfig, FlipStrategy, InitialState, RunConfig, SweepConfig};
pub use device::{Device, SiteState};
pub use energy::{EnergyTerm, MagnetizationTerm, Parameters, Results};
pub use error::{MsdError, MsdResult};
pub use geometry::{Cursor, Geometry, Lattice, Region, RegionCounts};
pub use molecule::{MolHandle, MolInstance, MolProto, MolType};
pub use parallel::{run_sweep, run_sweep_parallel, SweepJob, SweepPoint, WorkerPool};
pub use simulation::{Phase, Record, Simulation};
pub use vector::DVec3;
