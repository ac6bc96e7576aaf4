pub mod flip;
pub mod sweep;

pub use flip::{propose_flux, Proposal};
pub use sweep::metropolis_sweep;
