//! O(1) incremental update of the cached results for a single-site change.
//!
//! Each function first sums the change of every affected coupling sum from
//! the changed site and its direct neighbors, then applies the deltas. Seam
//! neighbors are looked up as options; a missing region contributes nothing.

use super::Device;
use crate::energy::{SiteChange, CHANGED_FIRST, NEIGHBOR_FIRST};
use crate::geometry::Region;
use crate::molecule::MolHandle;
use crate::vector::DVec3;

/// Coupling-sum changes produced by one site update. Energies move by the
/// negated values.
#[derive(Debug, Default, Clone, Copy)]
struct Delta {
    bulk: f64,
    seam_m: f64,
    seam_lr: f64,
}

impl Device {
    /// Apply a change to a present site. Callers guarantee `a` is present.
    pub(crate) fn apply(&mut self, a: usize, spin: DVec3, flux: DVec3) {
        let (x, y, z) = self.lattice.coords(a);
        match self.lattice.region(x) {
            Region::Molecule => match self.mol_handle(y, z) {
                Some(h) => {
                    let node = x - self.lattice.mol_x().start;
                    self.apply_mol(h, node, spin, flux);
                }
                None => self.inconsistency(a, "molecule site without an instance"),
            },
            region => self.apply_fm(a, region, spin, flux),
        }
    }

    fn apply_fm(&mut self, a: usize, region: Region, spin: DVec3, flux: DVec3) {
        let change = SiteChange::new(self.spins[a], self.fluxes[a], spin, flux);
        let d = self.fm_delta(a, region, &change);

        let r = &mut self.results;
        if region == Region::Left {
            r.ms_l += change.ds();
            r.mf_l += change.df();
            r.u_l -= d.bulk;
            r.u_ml -= d.seam_m;
        } else {
            r.ms_r += change.ds();
            r.mf_r += change.df();
            r.u_r -= d.bulk;
            r.u_mr -= d.seam_m;
        }
        r.u_lr -= d.seam_lr;
        r.aggregate();

        self.spins[a] = spin;
        self.fluxes[a] = flux;
    }

    fn fm_delta(&self, a: usize, region: Region, change: &SiteChange) -> Delta {
        let lat = &self.lattice;
        let p = &self.parameters;
        let (x, y, z) = lat.coords(a);
        let (mol_start, mol_end) = (lat.mol_x().start, lat.mol_x().end);
        let rows = lat.rows_l();
        let layers = lat.layers_r();
        let fm = |b: usize| (self.spins[b], self.fluxes[b]);
        let mut d = Delta::default();

        match region {
            Region::Left => {
                let c = p.coupling_l();
                let bond = |b: usize, sign: f64| {
                    let (ns, nf) = fm(b);
                    c.bond_delta(change, ns, nf, sign)
                };
                d.bulk += change.onsite_delta(p.field, p.a_l, p.je0_l);
                if x > 0 {
                    d.bulk += bond(lat.index(x - 1, y, z), NEIGHBOR_FIRST);
                }
                if y > rows.start {
                    d.bulk += bond(lat.index(x, y - 1, z), NEIGHBOR_FIRST);
                }
                if y + 1 < rows.end {
                    d.bulk += bond(lat.index(x, y + 1, z), CHANGED_FIRST);
                }
                if z > 0 {
                    d.bulk += bond(lat.index(x, y, z - 1), NEIGHBOR_FIRST);
                }
                if z + 1 < lat.depth {
                    d.bulk += bond(lat.index(x, y, z + 1), CHANGED_FIRST);
                }
                if x + 1 < mol_start {
                    d.bulk += bond(lat.index(x + 1, y, z), CHANGED_FIRST);
                } else {
                    // seam plane: the molecule's left lead and the right ferromagnet
                    if let Some(h) = self.mol_handle(y, z) {
                        let (ns, nf) = self.mols[h.0].state(self.proto.left_lead());
                        d.seam_m += p.coupling_ml().bond_delta(change, ns, nf, CHANGED_FIRST);
                    }
                    if lat.fm_r_exists() && layers.contains(&z) {
                        let (ns, nf) = fm(lat.index(mol_end, y, z));
                        d.seam_lr += p.coupling_lr().bond_delta(change, ns, nf, CHANGED_FIRST);
                    }
                }
            }
            Region::Right => {
                let c = p.coupling_r();
                let bond = |b: usize, sign: f64| {
                    let (ns, nf) = fm(b);
                    c.bond_delta(change, ns, nf, sign)
                };
                d.bulk += change.onsite_delta(p.field, p.a_r, p.je0_r);
                if x + 1 < lat.width {
                    d.bulk += bond(lat.index(x + 1, y, z), CHANGED_FIRST);
                }
                if y > 0 {
                    d.bulk += bond(lat.index(x, y - 1, z), NEIGHBOR_FIRST);
                }
                if y + 1 < lat.height {
                    d.bulk += bond(lat.index(x, y + 1, z), CHANGED_FIRST);
                }
                if z > layers.start {
                    d.bulk += bond(lat.index(x, y, z - 1), NEIGHBOR_FIRST);
                }
                if z + 1 < layers.end {
                    d.bulk += bond(lat.index(x, y, z + 1), CHANGED_FIRST);
                }
                if x > mol_end {
                    d.bulk += bond(lat.index(x - 1, y, z), NEIGHBOR_FIRST);
                } else {
                    if let Some(h) = self.mol_handle(y, z) {
                        let (ns, nf) = self.mols[h.0].state(self.proto.right_lead());
                        d.seam_m += p.coupling_mr().bond_delta(change, ns, nf, NEIGHBOR_FIRST);
                    }
                    if lat.fm_l_exists() && rows.contains(&y) {
                        let (ns, nf) = fm(lat.index(mol_start - 1, y, z));
                        d.seam_lr += p.coupling_lr().bond_delta(change, ns, nf, NEIGHBOR_FIRST);
                    }
                }
            }
            Region::Molecule => self.inconsistency(a, "ferromagnet update addressed a molecule site"),
        }
        d
    }

    pub(crate) fn apply_mol(&mut self, handle: MolHandle, node: usize, spin: DVec3, flux: DVec3) {
        let (s0, f0) = self.mols[handle.0].state(node);
        let change = SiteChange::new(s0, f0, spin, flux);
        let (bulk, seam_l, seam_r) = self.mol_delta(handle, node, &change);

        let r = &mut self.results;
        r.ms_m += change.ds();
        r.mf_m += change.df();
        r.u_m -= bulk;
        r.u_ml -= seam_l;
        r.u_mr -= seam_r;
        r.aggregate();

        self.mols[handle.0].set_state(node, spin, flux);
    }

    /// Changes of the molecule bulk sum and the two seam sums.
    fn mol_delta(&self, handle: MolHandle, node: usize, change: &SiteChange) -> (f64, f64, f64) {
        let lat = &self.lattice;
        let p = &self.parameters;
        let proto = &self.proto;
        let inst = &self.mols[handle.0];
        let np = proto.node(node);

        let mut bulk = change.onsite_delta(p.field, np.am, np.je0m);
        for e in proto.neighbors(node) {
            if e.is_loop() {
                continue;
            }
            let (ns, nf) = inst.state(e.node_index);
            let c = proto.edge(e.edge_index).coupling();
            bulk += c.bond_delta(change, ns, nf, e.direction.sign());
        }

        let (y, z) = inst.column();
        let mut seam_l = 0.0;
        if node == proto.left_lead() && lat.fm_l_exists() {
            let b = lat.index(lat.mol_x().start - 1, y, z);
            seam_l = p.coupling_ml().bond_delta(change, self.spins[b], self.fluxes[b], NEIGHBOR_FIRST);
        }
        let mut seam_r = 0.0;
        if node == proto.right_lead() && lat.fm_r_exists() {
            let b = lat.index(lat.mol_x().end, y, z);
            seam_r = p.coupling_mr().bond_delta(change, self.spins[b], self.fluxes[b], CHANGED_FIRST);
        }
        (bulk, seam_l, seam_r)
    }
}
