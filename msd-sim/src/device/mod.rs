//! The device: lattice, per-site state, molecule instances and the cached
//! [`Results`] kept consistent with them.

mod full;
mod update;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::{DeviceConfig, InitialState};
use crate::energy::{Parameters, Results};
use crate::error::{MsdError, MsdResult};
use crate::geometry::{Geometry, Lattice, Region};
use crate::molecule::{EdgeParameters, MolHandle, MolInstance, MolProto, NodeParameters};
use crate::vector::{clamp_flux, random_on_sphere, rescale_flux, with_magnitude, DVec3};

/// Local state of one present site, as exported to drivers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SiteState {
    pub x: usize,
    pub y: usize,
    pub z: usize,
    pub spin: DVec3,
    pub flux: DVec3,
}

/// A molecular spintronic device.
///
/// Ferromagnet spins and fluxes live in flat arrays indexed like the lattice
/// (void cells stay zero). Molecule sites delegate to the instance owning
/// their `(y, z)` column: `columns` maps every column slot to a handle into
/// the `mols` arena, and every x-position of a column reads the node
/// `x - molPosL` of that one instance.
pub struct Device {
    lattice: Lattice,
    parameters: Parameters,
    results: Results,
    spins: Vec<DVec3>,
    fluxes: Vec<DVec3>,
    proto: MolProto,
    mols: Vec<MolInstance>,
    columns: Vec<Option<MolHandle>>,
    init: InitialState,
}

impl Device {
    /// Build a device whose molecule comes from `config.mol_type`, sized to
    /// the molecule's width.
    pub fn new(config: &DeviceConfig, parameters: Parameters) -> Self {
        let lattice = Lattice::new(&config.geometry);
        let proto = config.mol_type.build(lattice.mol_width());
        Self::build(lattice, proto, parameters, config.initial_state)
    }

    /// Build a device around an explicit prototype. The molecule spans one
    /// x-position per node starting at `geometry.mol_pos_l`, so
    /// `geometry.mol_pos_r` is ignored.
    pub fn with_prototype(
        geometry: &Geometry,
        proto: MolProto,
        parameters: Parameters,
        init: InitialState,
    ) -> Self {
        let mut geometry = *geometry;
        geometry.mol_pos_r = geometry.mol_pos_l + proto.node_count() as i64 - 1;
        Self::build(Lattice::new(&geometry), proto, parameters, init)
    }

    fn build(lattice: Lattice, proto: MolProto, parameters: Parameters, init: InitialState) -> Self {
        let size = lattice.size();
        let mut device = Self {
            columns: vec![None; lattice.height * lattice.depth],
            lattice,
            parameters,
            results: Results::default(),
            spins: vec![DVec3::ZERO; size],
            fluxes: vec![DVec3::ZERO; size],
            proto,
            mols: Vec::new(),
            init,
        };
        device.reset_state();
        debug!(
            n = device.lattice.counts().n,
            mol_nodes = device.proto.node_count(),
            "device built"
        );
        device
    }

    /// Put every site back to the initial state and recompute from scratch.
    /// Resets `t` to 0.
    pub(crate) fn reset_state(&mut self) {
        let p = self.parameters;
        let init = self.init;
        for &a in self.lattice.indices() {
            let (s, f) = match self.lattice.region(self.lattice.x(a)) {
                Region::Left => (p.s_l, p.f_l),
                Region::Right => (p.s_r, p.f_r),
                Region::Molecule => continue,
            };
            self.spins[a] = with_magnitude(init.spin, s, DVec3::Y);
            self.fluxes[a] = clamp_flux(init.flux, f);
        }

        self.mols.clear();
        self.columns.fill(None);
        for &(y, z) in self.lattice.mol_columns() {
            let slot = self.lattice.column_slot(y, z);
            self.columns[slot] = Some(MolHandle(self.mols.len()));
            self.mols.push(MolInstance::new(&self.proto, y, z, &init));
        }

        self.results = self.recompute();
        self.results.t = 0;
    }

    /// Draw random spin directions at the regional magnitude and random
    /// fluxes below the regional bound, then recompute from scratch.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let p = self.parameters;
        for &a in self.lattice.indices() {
            let (s, f) = match self.lattice.region(self.lattice.x(a)) {
                Region::Left => (p.s_l, p.f_l),
                Region::Right => (p.s_r, p.f_r),
                Region::Molecule => continue,
            };
            self.spins[a] = random_on_sphere(s, rng);
            self.fluxes[a] = random_on_sphere(f * rng.gen::<f64>(), rng);
        }
        for inst in &mut self.mols {
            for (i, np) in self.proto.nodes().enumerate() {
                let spin = random_on_sphere(np.sm, rng);
                let flux = random_on_sphere(np.fm * rng.gen::<f64>(), rng);
                inst.set_state(i, spin, flux);
            }
        }
        self.refresh();
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    pub fn initial_state(&self) -> &InitialState {
        &self.init
    }

    /// Put a site and the cached results back to a previous snapshot
    /// without any energy arithmetic, so a rejected step leaves no drift.
    pub(crate) fn revert(&mut self, a: usize, spin: DVec3, flux: DVec3, results: Results) {
        let (x, y, z) = self.lattice.coords(a);
        if self.lattice.region(x) == Region::Molecule {
            match self.mol_handle(y, z) {
                Some(h) => {
                    let node = x - self.lattice.mol_x().start;
                    self.mols[h.0].set_state(node, spin, flux);
                }
                None => self.inconsistency(a, "molecule site without an instance"),
            }
        } else {
            self.spins[a] = spin;
            self.fluxes[a] = flux;
        }
        self.results = results;
    }

    pub(crate) fn advance_time(&mut self, steps: u64) {
        self.results.t += steps;
    }

    pub(crate) fn reset_time(&mut self) {
        self.results.t = 0;
    }

    /// Replace every parameter at once. Ferromagnet spins are rescaled to the
    /// new magnitudes, fluxes by the ratio of bounds, and all energies are
    /// recomputed.
    pub fn set_parameters(&mut self, parameters: Parameters) {
        let p0 = self.parameters;
        let fallback = self.init.spin;
        for &a in self.lattice.indices() {
            let (s, f0, f) = match self.lattice.region(self.lattice.x(a)) {
                Region::Left => (parameters.s_l, p0.f_l, parameters.f_l),
                Region::Right => (parameters.s_r, p0.f_r, parameters.f_r),
                Region::Molecule => continue,
            };
            self.spins[a] = with_magnitude(self.spins[a], s, fallback);
            self.fluxes[a] = rescale_flux(self.fluxes[a], f0, f);
        }
        self.parameters = parameters;
        self.refresh();
        debug!(kt = parameters.kt, "parameters replaced");
    }

    /// Change only the external field. Only the Zeeman terms move, so the
    /// update is applied per region without touching any site.
    pub fn set_field(&mut self, field: DVec3) {
        let delta = field - self.parameters.field;
        let r = &mut self.results;
        r.u_l -= delta.dot(r.m_l);
        r.u_r -= delta.dot(r.m_r);
        r.u_m -= delta.dot(r.m_m);
        r.aggregate();
        self.parameters.field = field;
    }

    pub fn set_kt(&mut self, kt: f64) {
        self.parameters.kt = kt;
    }

    pub fn mol_proto(&self) -> &MolProto {
        &self.proto
    }

    /// Swap in a new molecule prototype with the same node count. Node spins
    /// keep their direction at the new magnitudes, fluxes scale by the ratio
    /// of bounds, and all energies are recomputed. On error nothing changes.
    pub fn set_mol_proto(&mut self, proto: MolProto) -> MsdResult<()> {
        if proto.node_count() != self.proto.node_count() {
            return Err(MsdError::NodeCountMismatch {
                expected: self.proto.node_count(),
                actual: proto.node_count(),
            });
        }
        for inst in &mut self.mols {
            inst.rescale(&self.proto, &proto, &self.init);
        }
        self.proto = proto;
        self.refresh();
        debug!(
            nodes = self.proto.node_count(),
            edges = self.proto.edge_count(),
            "molecule prototype swapped"
        );
        Ok(())
    }

    /// Give every node and every edge of the molecule the same parameters.
    pub fn set_mol_parameters(&mut self, node: NodeParameters, edge: EdgeParameters) -> MsdResult<()> {
        let mut proto = self.proto.clone();
        proto.set_all_parameters(node, edge);
        self.set_mol_proto(proto)
    }

    /// Instance owning the molecule column `(y, z)`, if there is one.
    #[inline]
    pub fn mol_handle(&self, y: usize, z: usize) -> Option<MolHandle> {
        if y >= self.lattice.height || z >= self.lattice.depth {
            return None;
        }
        self.columns[self.lattice.column_slot(y, z)]
    }

    /// Instance owning site `a`, if `a` is a molecule site.
    pub fn mol_at(&self, a: usize) -> Option<MolHandle> {
        if !self.lattice.is_present(a) {
            return None;
        }
        let (x, y, z) = self.lattice.coords(a);
        match self.lattice.region(x) {
            Region::Molecule => self.mol_handle(y, z),
            _ => None,
        }
    }

    pub fn mol_instance(&self, handle: MolHandle) -> Option<&MolInstance> {
        self.mols.get(handle.0)
    }

    pub fn mol_instances(&self) -> &[MolInstance] {
        &self.mols
    }

    fn check_present(&self, a: usize) -> MsdResult<()> {
        if a >= self.lattice.size() {
            return Err(MsdError::IndexOutOfBounds {
                index: a,
                size: self.lattice.size(),
            });
        }
        if !self.lattice.is_present(a) {
            let (x, y, z) = self.lattice.coords(a);
            return Err(MsdError::NotPresent { x, y, z });
        }
        Ok(())
    }

    /// Spin and flux of a present site, without checks.
    #[inline]
    pub(crate) fn site_state(&self, a: usize) -> (DVec3, DVec3) {
        let (x, y, z) = self.lattice.coords(a);
        if self.lattice.region(x) != Region::Molecule {
            return (self.spins[a], self.fluxes[a]);
        }
        match self.mol_handle(y, z) {
            Some(h) => self.mols[h.0].state(x - self.lattice.mol_x().start),
            None => self.inconsistency(a, "molecule site without an instance"),
        }
    }

    /// Flux bound of the site's region, or of its molecule node.
    #[inline]
    pub(crate) fn flux_bound(&self, a: usize) -> f64 {
        let x = self.lattice.x(a);
        match self.lattice.region(x) {
            Region::Left => self.parameters.f_l,
            Region::Right => self.parameters.f_r,
            Region::Molecule => self.proto.node(x - self.lattice.mol_x().start).fm,
        }
    }

    pub fn spin(&self, a: usize) -> MsdResult<DVec3> {
        self.check_present(a)?;
        Ok(self.site_state(a).0)
    }

    pub fn flux(&self, a: usize) -> MsdResult<DVec3> {
        self.check_present(a)?;
        Ok(self.site_state(a).1)
    }

    /// Spin + flux of site `a`.
    pub fn local_m(&self, a: usize) -> MsdResult<DVec3> {
        self.check_present(a)?;
        let (s, f) = self.site_state(a);
        Ok(s + f)
    }

    pub fn spin_at(&self, x: usize, y: usize, z: usize) -> MsdResult<DVec3> {
        self.spin(self.lattice.checked_index(x, y, z)?)
    }

    pub fn flux_at(&self, x: usize, y: usize, z: usize) -> MsdResult<DVec3> {
        self.flux(self.lattice.checked_index(x, y, z)?)
    }

    pub fn local_m_at(&self, x: usize, y: usize, z: usize) -> MsdResult<DVec3> {
        self.local_m(self.lattice.checked_index(x, y, z)?)
    }

    /// Set the spin and flux of site `a`, updating [`Results`] incrementally.
    pub fn set_local_m(&mut self, a: usize, spin: DVec3, flux: DVec3) -> MsdResult<()> {
        self.check_present(a)?;
        self.apply(a, spin, flux);
        Ok(())
    }

    pub fn set_local_m_at(&mut self, x: usize, y: usize, z: usize, spin: DVec3, flux: DVec3) -> MsdResult<()> {
        let a = self.lattice.checked_index(x, y, z)?;
        self.set_local_m(a, spin, flux)
    }

    pub fn set_spin(&mut self, a: usize, spin: DVec3) -> MsdResult<()> {
        let flux = self.flux(a)?;
        self.set_local_m(a, spin, flux)
    }

    pub fn set_flux(&mut self, a: usize, flux: DVec3) -> MsdResult<()> {
        let spin = self.spin(a)?;
        self.set_local_m(a, spin, flux)
    }

    /// Set one node of one molecule instance, including nodes that do not
    /// map to a lattice site.
    pub fn set_mol_local_m(&mut self, handle: MolHandle, node: usize, spin: DVec3, flux: DVec3) -> MsdResult<()> {
        if handle.0 >= self.mols.len() {
            return Err(MsdError::IndexOutOfBounds {
                index: handle.0,
                size: self.mols.len(),
            });
        }
        if node >= self.proto.node_count() {
            return Err(MsdError::InvalidNode {
                index: node,
                count: self.proto.node_count(),
            });
        }
        self.apply_mol(handle, node, spin, flux);
        Ok(())
    }

    /// Every present site in traversal order.
    pub fn sites(&self) -> impl Iterator<Item = SiteState> + '_ {
        self.lattice.indices().iter().map(move |&a| {
            let (x, y, z) = self.lattice.coords(a);
            let (spin, flux) = self.site_state(a);
            SiteState { x, y, z, spin, flux }
        })
    }

    /// Abort on a bookkeeping bug, logging everything needed to find it.
    #[cold]
    fn inconsistency(&self, a: usize, what: &str) -> ! {
        let lat = &self.lattice;
        error!(
            index = a,
            coords = ?lat.coords(a),
            width = lat.width,
            height = lat.height,
            depth = lat.depth,
            mol_x = ?lat.mol_x(),
            rows_l = ?lat.rows_l(),
            layers_r = ?lat.layers_r(),
            instances = self.mols.len(),
            valid_indices = ?lat.indices(),
            "internal inconsistency: {what}"
        );
        panic!("internal inconsistency at site {a}: {what}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn device() -> Device {
        let config = DeviceConfig {
            geometry: Geometry {
                width: 5,
                height: 4,
                depth: 4,
                mol_pos_l: 2,
                mol_pos_r: 2,
                top_l: 1,
                bottom_l: 2,
                front_r: 1,
                back_r: 2,
            },
            ..Default::default()
        };
        let params = Parameters {
            je1_l: 0.3,
            b_r: 0.2,
            d_ml: DVec3::new(0.1, 0.0, -0.4),
            ..Default::default()
        };
        let mut device = Device::new(&config, params);
        device.randomize(&mut Xoshiro256StarStar::seed_from_u64(3));
        device
    }

    #[test]
    fn test_revert_is_bit_exact() {
        let mut d = device();
        for &a in &d.lattice.indices().to_vec() {
            let before = d.results;
            let (s, f) = d.site_state(a);
            d.apply(a, DVec3::new(0.2, -0.9, 0.1), DVec3::new(0.0, 0.0, 0.3));
            assert_ne!(d.results, before);
            d.revert(a, s, f, before);
            assert_eq!(d.results, before);
            assert_eq!(d.site_state(a), (s, f));
        }
    }

    #[test]
    fn test_update_and_undo_within_tolerance() {
        let mut d = device();
        let a = d.lattice.indices()[7];
        let before = d.results;
        let (s, f) = d.site_state(a);
        d.set_local_m(a, -s, f * 0.5).unwrap();
        d.set_local_m(a, s, f).unwrap();
        assert!(d.results.max_deviation(&before) < 1e-12);
    }

    #[test]
    fn test_site_access_errors() {
        let mut d = device();
        let size = d.lattice.size();
        assert_eq!(
            d.spin(size),
            Err(MsdError::IndexOutOfBounds { index: size, size })
        );
        // (2, 0, 0) is in the molecule plane but outside every column
        let void = d.lattice.index(2, 0, 0);
        assert_eq!(d.flux(void), Err(MsdError::NotPresent { x: 2, y: 0, z: 0 }));
        assert!(matches!(d.spin_at(9, 0, 0), Err(MsdError::OutOfBounds { .. })));
        assert!(d.set_local_m(void, DVec3::Y, DVec3::ZERO).is_err());
    }

    #[test]
    fn test_molecule_sites_share_the_column_instance() {
        let d = device();
        let a = d.lattice.index(2, 1, 1);
        let h = d.mol_at(a).unwrap();
        assert_eq!(d.mol_handle(1, 1), Some(h));
        assert_eq!(d.mol_instance(h).map(|m| m.column()), Some((1, 1)));
        assert_eq!(d.spin(a).unwrap(), d.mol_instance(h).unwrap().spins()[0]);
        assert_eq!(d.mol_at(d.lattice.index(0, 1, 1)), None);
    }

    #[test]
    fn test_set_mol_proto_rejects_node_count_change() {
        let mut d = device();
        let before = d.results;
        let proto = d.proto.clone();
        let err = d.set_mol_proto(MolProto::with_nodes(3)).unwrap_err();
        assert_eq!(err, MsdError::NodeCountMismatch { expected: 1, actual: 3 });
        assert_eq!(d.results, before);
        assert_eq!(d.proto, proto);
    }
}
