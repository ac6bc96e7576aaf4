//! Bond and on-site energy algebra shared by the full and incremental paths.
//!
//! Energies are minus the weighted coupling sums, e.g. a bond contributes
//! `-(J s_i.s_j + Je1 (s_i.f_j + f_i.s_j) + Jee f_i.f_j + b (m_i.m_j)^2 + D.(m_i x m_j))`
//! where `m = s + f` and `i` precedes `j` in the bond orientation.

use crate::vector::{squares, DVec3};

/// Orientation of a lattice bond whose higher-ordered endpoint changed.
pub const NEIGHBOR_FIRST: f64 = -1.0;
/// Orientation of a lattice bond whose lower-ordered endpoint changed.
pub const CHANGED_FIRST: f64 = 1.0;

/// Pairwise coefficients of one family of bonds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coupling {
    pub j: f64,
    pub je1: f64,
    pub jee: f64,
    pub b: f64,
    pub d: DVec3,
}

/// Local state of a site before and after a proposed change.
#[derive(Debug, Clone, Copy)]
pub struct SiteChange {
    pub old_s: DVec3,
    pub old_f: DVec3,
    pub new_s: DVec3,
    pub new_f: DVec3,
}

impl SiteChange {
    pub fn new(old_s: DVec3, old_f: DVec3, new_s: DVec3, new_f: DVec3) -> Self {
        Self {
            old_s,
            old_f,
            new_s,
            new_f,
        }
    }

    #[inline]
    pub fn ds(&self) -> DVec3 {
        self.new_s - self.old_s
    }

    #[inline]
    pub fn df(&self) -> DVec3 {
        self.new_f - self.old_f
    }

    #[inline]
    pub fn old_m(&self) -> DVec3 {
        self.old_s + self.old_f
    }

    #[inline]
    pub fn new_m(&self) -> DVec3 {
        self.new_s + self.new_f
    }

    #[inline]
    pub fn dm(&self) -> DVec3 {
        self.new_m() - self.old_m()
    }

    /// Change of the on-site coupling sum `B.m + A.m^2 + Je0 s.f`.
    #[inline]
    pub fn onsite_delta(&self, field: DVec3, anisotropy: DVec3, je0: f64) -> f64 {
        field.dot(self.dm())
            + anisotropy.dot(squares(self.new_m()) - squares(self.old_m()))
            + je0 * (self.new_s.dot(self.new_f) - self.old_s.dot(self.old_f))
    }
}

impl Coupling {
    /// Change of this bond's coupling sum when one endpoint goes through
    /// `change` and the other endpoint holds `(ns, nf)`.
    ///
    /// `sign` orients the DMI term: [`CHANGED_FIRST`] when the changed site
    /// is the first endpoint, [`NEIGHBOR_FIRST`] otherwise. Molecule edges
    /// pass their stored direction.
    #[inline]
    pub fn bond_delta(&self, change: &SiteChange, ns: DVec3, nf: DVec3, sign: f64) -> f64 {
        let nm = ns + nf;
        let ds = change.ds();
        let df = change.df();
        self.j * ns.dot(ds)
            + self.je1 * (nf.dot(ds) + ns.dot(df))
            + self.jee * nf.dot(df)
            + self.b * (nm.dot(change.new_m()).powi(2) - nm.dot(change.old_m()).powi(2))
            + sign * self.d.dot(change.dm().cross(nm))
    }
}

/// Accumulated pairwise sums over a set of bonds.
#[derive(Debug, Clone, Copy, Default)]
pub struct BondSums {
    pub ss: f64,
    pub e1: f64,
    pub ee: f64,
    pub biquad: f64,
    pub dmi: DVec3,
}

impl BondSums {
    /// Add the bond `i -> j` (scaled by `sign` in the DMI term).
    #[inline]
    pub fn add(&mut self, si: DVec3, fi: DVec3, sj: DVec3, fj: DVec3, sign: f64) {
        let mi = si + fi;
        let mj = sj + fj;
        self.ss += si.dot(sj);
        self.e1 += si.dot(fj) + fi.dot(sj);
        self.ee += fi.dot(fj);
        self.biquad += mi.dot(mj).powi(2);
        self.dmi += sign * mi.cross(mj);
    }

    pub fn energy(&self, c: &Coupling) -> f64 {
        -(c.j * self.ss + c.je1 * self.e1 + c.jee * self.ee + c.b * self.biquad + c.d.dot(self.dmi))
    }
}

/// Accumulated on-site sums over a set of sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteSums {
    pub s: DVec3,
    pub f: DVec3,
    pub anisotropy: DVec3,
    pub e0: f64,
}

impl SiteSums {
    #[inline]
    pub fn add(&mut self, s: DVec3, f: DVec3) {
        self.s += s;
        self.f += f;
        self.anisotropy += squares(s + f);
        self.e0 += s.dot(f);
    }

    pub fn m(&self) -> DVec3 {
        self.s + self.f
    }

    pub fn energy(&self, field: DVec3, anisotropy: DVec3, je0: f64) -> f64 {
        -(field.dot(self.m()) + anisotropy.dot(self.anisotropy) + je0 * self.e0)
    }
}
