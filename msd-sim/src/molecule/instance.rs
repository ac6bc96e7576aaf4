use super::prototype::MolProto;
use crate::config::InitialState;
use crate::vector::{clamp_flux, rescale_flux, with_magnitude, DVec3};

/// Stable handle of a molecule instance in a device's instance arena.
/// Two sites share state exactly when their handles are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MolHandle(pub(crate) usize);

impl MolHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Per-node spin and flux state of the molecule occupying one `(y, z)`
/// column. The topology and constants come from the device's prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct MolInstance {
    pub(crate) y: usize,
    pub(crate) z: usize,
    pub(crate) spins: Vec<DVec3>,
    pub(crate) fluxes: Vec<DVec3>,
}

impl MolInstance {
    pub fn new(proto: &MolProto, y: usize, z: usize, init: &InitialState) -> Self {
        let mut inst = Self {
            y,
            z,
            spins: Vec::with_capacity(proto.node_count()),
            fluxes: Vec::with_capacity(proto.node_count()),
        };
        for p in proto.nodes() {
            inst.spins.push(with_magnitude(init.spin, p.sm, DVec3::Y));
            inst.fluxes.push(clamp_flux(init.flux, p.fm));
        }
        inst
    }

    pub fn column(&self) -> (usize, usize) {
        (self.y, self.z)
    }

    pub fn node_count(&self) -> usize {
        self.spins.len()
    }

    pub fn spin(&self, node: usize) -> Option<DVec3> {
        self.spins.get(node).copied()
    }

    pub fn flux(&self, node: usize) -> Option<DVec3> {
        self.fluxes.get(node).copied()
    }

    pub fn spins(&self) -> &[DVec3] {
        &self.spins
    }

    pub fn fluxes(&self) -> &[DVec3] {
        &self.fluxes
    }

    #[inline]
    pub(crate) fn state(&self, node: usize) -> (DVec3, DVec3) {
        (self.spins[node], self.fluxes[node])
    }

    #[inline]
    pub(crate) fn set_state(&mut self, node: usize, spin: DVec3, flux: DVec3) {
        self.spins[node] = spin;
        self.fluxes[node] = flux;
    }

    /// Carry this instance from prototype `old` to `new` (same node count):
    /// spins keep their direction at the new magnitude, fluxes scale by the
    /// ratio of bounds.
    pub(crate) fn rescale(&mut self, old: &MolProto, new: &MolProto, init: &InitialState) {
        for (i, (p0, p)) in old.nodes().zip(new.nodes()).enumerate() {
            self.spins[i] = with_magnitude(self.spins[i], p.sm, init.spin);
            self.fluxes[i] = rescale_flux(self.fluxes[i], p0.fm, p.fm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::molecule::{MolType, NodeParameters};

    #[test]
    fn test_new_scales_initial_state() {
        let mut proto = MolType::Linear.build(2);
        proto
            .set_node_parameters(1, NodeParameters {
                sm: 2.0,
                fm: 0.1,
                ..Default::default()
            })
            .unwrap();
        let init = InitialState {
            spin: DVec3::new(0.0, 0.0, 5.0),
            flux: DVec3::new(0.0, 0.5, 0.0),
        };
        let inst = MolInstance::new(&proto, 3, 4, &init);
        assert_eq!(inst.column(), (3, 4));
        assert_eq!(inst.spin(0), Some(DVec3::Z));
        assert_eq!(inst.spin(1), Some(DVec3::new(0.0, 0.0, 2.0)));
        // node 0 has no flux room, node 1 clamps to its bound
        assert_eq!(inst.flux(0), Some(DVec3::ZERO));
        assert!((inst.flux(1).unwrap().length() - 0.1).abs() < 1e-12);
        assert_eq!(inst.spin(2), None);
    }

    #[test]
    fn test_rescale() {
        let old = MolType::Linear.build(1);
        let mut new = old.clone();
        new.set_all_node_parameters(NodeParameters {
            sm: 3.0,
            fm: 1.0,
            ..Default::default()
        });
        let init = InitialState::default();
        let mut inst = MolInstance::new(&old, 0, 0, &init);
        inst.set_state(0, DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.2, 0.0, 0.0));
        inst.rescale(&old, &new, &init);
        assert_eq!(inst.spin(0), Some(DVec3::new(3.0, 0.0, 0.0)));
        // old bound was zero, so the flux collapses
        assert_eq!(inst.flux(0), Some(DVec3::ZERO));
    }
}
