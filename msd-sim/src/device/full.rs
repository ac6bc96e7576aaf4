use tracing::debug;

use super::Device;
use crate::energy::{BondSums, Results, SiteSums, CHANGED_FIRST};
use crate::geometry::Region;
use crate::vector::squares;

impl Device {
    /// Compute [`Results`] from scratch, visiting every site and bond once.
    ///
    /// Lattice bonds are oriented from the lower to the higher coordinate,
    /// seam bonds from left to right, and molecule edges by their stored
    /// direction. Self-loops carry no energy. The iteration counter is taken
    /// from the cached results.
    pub fn recompute(&self) -> Results {
        let lat = &self.lattice;
        let p = &self.parameters;
        let (mol_start, mol_end) = (lat.mol_x().start, lat.mol_x().end);
        let rows = lat.rows_l();
        let layers = lat.layers_r();
        let fm = |b: usize| (self.spins[b], self.fluxes[b]);

        let mut site_l = SiteSums::default();
        let mut site_r = SiteSums::default();
        let mut bonds_l = BondSums::default();
        let mut bonds_r = BondSums::default();

        for &a in lat.indices() {
            let (x, y, z) = lat.coords(a);
            let (s, f) = fm(a);
            match lat.region(x) {
                Region::Left => {
                    site_l.add(s, f);
                    let mut bond = |b: usize| {
                        let (sb, fb) = fm(b);
                        bonds_l.add(s, f, sb, fb, CHANGED_FIRST);
                    };
                    if x + 1 < mol_start {
                        bond(lat.index(x + 1, y, z));
                    }
                    if y + 1 < rows.end {
                        bond(lat.index(x, y + 1, z));
                    }
                    if z + 1 < lat.depth {
                        bond(lat.index(x, y, z + 1));
                    }
                }
                Region::Right => {
                    site_r.add(s, f);
                    let mut bond = |b: usize| {
                        let (sb, fb) = fm(b);
                        bonds_r.add(s, f, sb, fb, CHANGED_FIRST);
                    };
                    if x + 1 < lat.width {
                        bond(lat.index(x + 1, y, z));
                    }
                    if y + 1 < lat.height {
                        bond(lat.index(x, y + 1, z));
                    }
                    if z + 1 < layers.end {
                        bond(lat.index(x, y, z + 1));
                    }
                }
                Region::Molecule => {}
            }
        }

        // direct left-right coupling across the seam plane
        let mut bonds_lr = BondSums::default();
        if lat.fm_l_exists() && lat.fm_r_exists() {
            for z in layers.clone() {
                for y in rows.clone() {
                    let (sl, fl) = fm(lat.index(mol_start - 1, y, z));
                    let (sr, fr) = fm(lat.index(mol_end, y, z));
                    bonds_lr.add(sl, fl, sr, fr, CHANGED_FIRST);
                }
            }
        }

        let mut r = Results {
            t: self.results.t,
            ..Default::default()
        };

        let mut bonds_ml = BondSums::default();
        let mut bonds_mr = BondSums::default();
        let proto = &self.proto;
        for inst in &self.mols {
            for (i, np) in proto.nodes().enumerate() {
                let (s, f) = inst.state(i);
                let m = s + f;
                r.ms_m += s;
                r.mf_m += f;
                r.u_m -= p.field.dot(m) + np.am.dot(squares(m)) + np.je0m * s.dot(f);

                for e in proto.neighbors(i) {
                    if e.self_index >= e.node_index {
                        continue;
                    }
                    let (sj, fj) = inst.state(e.node_index);
                    let mut sums = BondSums::default();
                    sums.add(s, f, sj, fj, e.direction.sign());
                    r.u_m += sums.energy(&proto.edge(e.edge_index).coupling());
                }
            }

            let (y, z) = inst.column();
            if lat.fm_l_exists() {
                let (sl, fl) = fm(lat.index(mol_start - 1, y, z));
                let (s, f) = inst.state(proto.left_lead());
                bonds_ml.add(sl, fl, s, f, CHANGED_FIRST);
            }
            if lat.fm_r_exists() {
                let (s, f) = inst.state(proto.right_lead());
                let (sr, fr) = fm(lat.index(mol_end, y, z));
                bonds_mr.add(s, f, sr, fr, CHANGED_FIRST);
            }
        }

        r.ms_l = site_l.s;
        r.mf_l = site_l.f;
        r.ms_r = site_r.s;
        r.mf_r = site_r.f;
        r.u_l = site_l.energy(p.field, p.a_l, p.je0_l) + bonds_l.energy(&p.coupling_l());
        r.u_r = site_r.energy(p.field, p.a_r, p.je0_r) + bonds_r.energy(&p.coupling_r());
        r.u_ml = bonds_ml.energy(&p.coupling_ml());
        r.u_mr = bonds_mr.energy(&p.coupling_mr());
        r.u_lr = bonds_lr.energy(&p.coupling_lr());
        r.aggregate();
        r
    }

    /// Replace the cached results with a full recompute, keeping `t`.
    pub(crate) fn refresh(&mut self) {
        self.results = self.recompute();
        debug!(t = self.results.t, u = self.results.u, "results recomputed");
    }
}
