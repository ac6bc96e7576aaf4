use serde::{Deserialize, Serialize};

use super::coupling::Coupling;
use crate::vector::DVec3;

/// Every coupling constant of the ferromagnets and the two seams.
///
/// Suffixes name the region: `l`/`r` for the left/right ferromagnet, `ml`/`mr`
/// for the molecule seams and `lr` for the direct left-right coupling.
/// Molecule-internal constants live on the molecule prototype instead.
/// Serialized with the conventional short names (`kT`, `B`, `JmL`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    #[serde(rename = "kT")]
    pub kt: f64,
    /// External magnetic field.
    #[serde(rename = "B")]
    pub field: DVec3,

    /// Spin magnitudes.
    #[serde(rename = "SL")]
    pub s_l: f64,
    #[serde(rename = "SR")]
    pub s_r: f64,
    /// Flux bounds.
    #[serde(rename = "FL")]
    pub f_l: f64,
    #[serde(rename = "FR")]
    pub f_r: f64,

    /// Heisenberg exchange, spin-spin.
    #[serde(rename = "JL")]
    pub j_l: f64,
    #[serde(rename = "JR")]
    pub j_r: f64,
    #[serde(rename = "JmL")]
    pub j_ml: f64,
    #[serde(rename = "JmR")]
    pub j_mr: f64,
    #[serde(rename = "JLR")]
    pub j_lr: f64,

    /// On-site spin-flux coupling.
    #[serde(rename = "Je0L")]
    pub je0_l: f64,
    #[serde(rename = "Je0R")]
    pub je0_r: f64,

    /// Neighbor spin-flux coupling.
    #[serde(rename = "Je1L")]
    pub je1_l: f64,
    #[serde(rename = "Je1R")]
    pub je1_r: f64,
    #[serde(rename = "Je1mL")]
    pub je1_ml: f64,
    #[serde(rename = "Je1mR")]
    pub je1_mr: f64,
    #[serde(rename = "Je1LR")]
    pub je1_lr: f64,

    /// Neighbor flux-flux coupling.
    #[serde(rename = "JeeL")]
    pub jee_l: f64,
    #[serde(rename = "JeeR")]
    pub jee_r: f64,
    #[serde(rename = "JeemL")]
    pub jee_ml: f64,
    #[serde(rename = "JeemR")]
    pub jee_mr: f64,
    #[serde(rename = "JeeLR")]
    pub jee_lr: f64,

    /// Biquadratic coupling.
    #[serde(rename = "bL")]
    pub b_l: f64,
    #[serde(rename = "bR")]
    pub b_r: f64,
    #[serde(rename = "bmL")]
    pub b_ml: f64,
    #[serde(rename = "bmR")]
    pub b_mr: f64,
    #[serde(rename = "bLR")]
    pub b_lr: f64,

    /// Single-ion anisotropy.
    #[serde(rename = "AL")]
    pub a_l: DVec3,
    #[serde(rename = "AR")]
    pub a_r: DVec3,

    /// Dzyaloshinskii-Moriya vectors.
    #[serde(rename = "DL")]
    pub d_l: DVec3,
    #[serde(rename = "DR")]
    pub d_r: DVec3,
    #[serde(rename = "DmL")]
    pub d_ml: DVec3,
    #[serde(rename = "DmR")]
    pub d_mr: DVec3,
    #[serde(rename = "DLR")]
    pub d_lr: DVec3,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            kt: 0.25,
            field: DVec3::ZERO,
            s_l: 1.0,
            s_r: 1.0,
            f_l: 0.0,
            f_r: 0.0,
            j_l: 1.0,
            j_r: 1.0,
            j_ml: 1.0,
            j_mr: -1.0,
            j_lr: 0.0,
            je0_l: 0.0,
            je0_r: 0.0,
            je1_l: 0.0,
            je1_r: 0.0,
            je1_ml: 0.0,
            je1_mr: 0.0,
            je1_lr: 0.0,
            jee_l: 0.0,
            jee_r: 0.0,
            jee_ml: 0.0,
            jee_mr: 0.0,
            jee_lr: 0.0,
            b_l: 0.0,
            b_r: 0.0,
            b_ml: 0.0,
            b_mr: 0.0,
            b_lr: 0.0,
            a_l: DVec3::ZERO,
            a_r: DVec3::ZERO,
            d_l: DVec3::ZERO,
            d_r: DVec3::ZERO,
            d_ml: DVec3::ZERO,
            d_mr: DVec3::ZERO,
            d_lr: DVec3::ZERO,
        }
    }
}

impl Parameters {
    pub fn coupling_l(&self) -> Coupling {
        Coupling {
            j: self.j_l,
            je1: self.je1_l,
            jee: self.jee_l,
            b: self.b_l,
            d: self.d_l,
        }
    }

    pub fn coupling_r(&self) -> Coupling {
        Coupling {
            j: self.j_r,
            je1: self.je1_r,
            jee: self.jee_r,
            b: self.b_r,
            d: self.d_r,
        }
    }

    pub fn coupling_ml(&self) -> Coupling {
        Coupling {
            j: self.j_ml,
            je1: self.je1_ml,
            jee: self.jee_ml,
            b: self.b_ml,
            d: self.d_ml,
        }
    }

    pub fn coupling_mr(&self) -> Coupling {
        Coupling {
            j: self.j_mr,
            je1: self.je1_mr,
            jee: self.jee_mr,
            b: self.b_mr,
            d: self.d_mr,
        }
    }

    pub fn coupling_lr(&self) -> Coupling {
        Coupling {
            j: self.j_lr,
            je1: self.je1_lr,
            jee: self.jee_lr,
            b: self.b_lr,
            d: self.d_lr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Parameters::default();
        assert_eq!(p.kt, 0.25);
        assert_eq!(p.j_mr, -1.0);
        assert_eq!(p.coupling_l().j, 1.0);
        assert_eq!(p.coupling_lr().j, 0.0);
        assert_eq!(p.field, DVec3::ZERO);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let p: Parameters = serde_json::from_str(r#"{"kT": 1.5, "B": [0.0, 0.1, 0.0], "JmR": 0.5}"#).unwrap();
        assert_eq!(p.kt, 1.5);
        assert_eq!(p.field, DVec3::new(0.0, 0.1, 0.0));
        assert_eq!(p.j_mr, 0.5);
        assert_eq!(p.j_l, 1.0);

        let v = serde_json::to_value(p).unwrap();
        assert_eq!(v["JmR"], 0.5);
        assert!(v.get("DmL").is_some());
    }
}
