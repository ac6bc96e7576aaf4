use rand::Rng;

use super::flip::{propose_flux, Proposal};
use crate::device::Device;

/// Single-site Metropolis steps with a generic acceptance rule.
///
/// `accept(rng, du, kt)` decides whether an energy change `du > 0` is kept;
/// non-positive changes are always kept. Rejected steps restore the site and
/// the cached results directly.
fn sweep_generic<P, R>(
    device: &mut Device,
    proposal: &P,
    rng: &mut R,
    n_steps: u64,
    accept: impl Fn(&mut R, f64, f64) -> bool,
) where
    P: Proposal,
    R: Rng,
{
    let n_sites = device.lattice().indices().len();
    if n_sites > 0 {
        for _ in 0..n_steps {
            let a = device.lattice().indices()[rng.gen_range(0..n_sites)];
            let (spin, flux) = device.site_state(a);
            let new_spin = proposal.propose(spin, rng);
            let new_flux = propose_flux(device.flux_bound(a), rng);

            let before = *device.results();
            device.apply(a, new_spin, new_flux);
            let du = device.results().u - before.u;
            if du > 0.0 && !accept(rng, du, device.parameters().kt) {
                device.revert(a, spin, flux, before);
            }
        }
    }
    device.advance_time(n_steps);
}

/// `n_steps` Metropolis steps: uphill moves are kept with probability
/// `exp(-du / kT)`.
pub fn metropolis_sweep<P: Proposal, R: Rng>(device: &mut Device, proposal: &P, rng: &mut R, n_steps: u64) {
    sweep_generic(device, proposal, rng, n_steps, |rng, du, kt| {
        rng.gen::<f64>() < (-du / kt).exp()
    });
}
