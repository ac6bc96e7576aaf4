use serde::{Deserialize, Serialize};

use crate::geometry::RegionCounts;
use crate::vector::DVec3;

/// Aggregate state of a device at iteration `t`.
///
/// `M*` are local magnetizations (spin + flux), `MS*` spins only, `MF*`
/// fluxes only. `U` is the sum of the six region energies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub t: u64,

    #[serde(rename = "M")]
    pub m: DVec3,
    #[serde(rename = "ML")]
    pub m_l: DVec3,
    #[serde(rename = "MR")]
    pub m_r: DVec3,
    #[serde(rename = "Mm")]
    pub m_m: DVec3,

    #[serde(rename = "MS")]
    pub ms: DVec3,
    #[serde(rename = "MSL")]
    pub ms_l: DVec3,
    #[serde(rename = "MSR")]
    pub ms_r: DVec3,
    #[serde(rename = "MSm")]
    pub ms_m: DVec3,

    #[serde(rename = "MF")]
    pub mf: DVec3,
    #[serde(rename = "MFL")]
    pub mf_l: DVec3,
    #[serde(rename = "MFR")]
    pub mf_r: DVec3,
    #[serde(rename = "MFm")]
    pub mf_m: DVec3,

    #[serde(rename = "U")]
    pub u: f64,
    #[serde(rename = "UL")]
    pub u_l: f64,
    #[serde(rename = "UR")]
    pub u_r: f64,
    #[serde(rename = "Um")]
    pub u_m: f64,
    #[serde(rename = "UmL")]
    pub u_ml: f64,
    #[serde(rename = "UmR")]
    pub u_mr: f64,
    #[serde(rename = "ULR")]
    pub u_lr: f64,
}

impl Results {
    /// Rebuild the aggregate fields (`M`, `ML`, `MS`, `U`, ...) from the
    /// per-region spin/flux sums and region energies.
    pub fn aggregate(&mut self) {
        self.m_l = self.ms_l + self.mf_l;
        self.m_r = self.ms_r + self.mf_r;
        self.m_m = self.ms_m + self.mf_m;
        self.ms = self.ms_l + self.ms_r + self.ms_m;
        self.mf = self.mf_l + self.mf_r + self.mf_m;
        self.m = self.m_l + self.m_r + self.m_m;
        self.u = self.u_l + self.u_r + self.u_m + self.u_ml + self.u_mr + self.u_lr;
    }

    /// Largest absolute difference over every energy and magnetization
    /// component, ignoring `t`.
    pub fn max_deviation(&self, other: &Self) -> f64 {
        let scalars = [
            (self.u, other.u),
            (self.u_l, other.u_l),
            (self.u_r, other.u_r),
            (self.u_m, other.u_m),
            (self.u_ml, other.u_ml),
            (self.u_mr, other.u_mr),
            (self.u_lr, other.u_lr),
        ];
        let vectors = [
            (self.m, other.m),
            (self.m_l, other.m_l),
            (self.m_r, other.m_r),
            (self.m_m, other.m_m),
            (self.ms, other.ms),
            (self.ms_l, other.ms_l),
            (self.ms_r, other.ms_r),
            (self.ms_m, other.ms_m),
            (self.mf, other.mf),
            (self.mf_l, other.mf_l),
            (self.mf_r, other.mf_r),
            (self.mf_m, other.mf_m),
        ];
        let s = scalars.iter().map(|(a, b)| (a - b).abs());
        let v = vectors.iter().map(|(a, b)| (*a - *b).abs().max_element());
        s.chain(v).fold(0.0, f64::max)
    }
}

/// Selects one energy term of [`Results`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyTerm {
    U,
    UL,
    UR,
    Um,
    UmL,
    UmR,
    ULR,
}

impl EnergyTerm {
    pub const ALL: [EnergyTerm; 7] = [
        Self::U,
        Self::UL,
        Self::UR,
        Self::Um,
        Self::UmL,
        Self::UmR,
        Self::ULR,
    ];

    #[inline]
    pub fn of(self, r: &Results) -> f64 {
        match self {
            Self::U => r.u,
            Self::UL => r.u_l,
            Self::UR => r.u_r,
            Self::Um => r.u_m,
            Self::UmL => r.u_ml,
            Self::UmR => r.u_mr,
            Self::ULR => r.u_lr,
        }
    }

    /// Particle count the term is normalized by.
    pub fn count(self, c: &RegionCounts) -> usize {
        match self {
            Self::U => c.n,
            Self::UL => c.n_l,
            Self::UR => c.n_r,
            Self::Um => c.n_m,
            Self::UmL => c.n_ml,
            Self::UmR => c.n_mr,
            Self::ULR => c.n_lr,
        }
    }
}

/// Selects one magnetization vector of [`Results`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagnetizationTerm {
    M,
    ML,
    MR,
    Mm,
    MS,
    MSL,
    MSR,
    MSm,
    MF,
    MFL,
    MFR,
    MFm,
}

impl MagnetizationTerm {
    #[inline]
    pub fn of(self, r: &Results) -> DVec3 {
        match self {
            Self::M => r.m,
            Self::ML => r.m_l,
            Self::MR => r.m_r,
            Self::Mm => r.m_m,
            Self::MS => r.ms,
            Self::MSL => r.ms_l,
            Self::MSR => r.ms_r,
            Self::MSm => r.ms_m,
            Self::MF => r.mf,
            Self::MFL => r.mf_l,
            Self::MFR => r.mf_r,
            Self::MFm => r.mf_m,
        }
    }

    pub fn count(self, c: &RegionCounts) -> usize {
        match self {
            Self::M | Self::MS | Self::MF => c.n,
            Self::ML | Self::MSL | Self::MFL => c.n_l,
            Self::MR | Self::MSR | Self::MFR => c.n_r,
            Self::Mm | Self::MSm | Self::MFm => c.n_m,
        }
    }
}
