use serde::{Deserialize, Serialize};

use super::prototype::{EdgeParameters, MolProto};

/// Built-in molecule topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum MolType {
    /// A chain `0 - 1 - ... - (n-1)` with leads at both ends.
    #[default]
    Linear,
    /// The chain closed back onto node 0, leads at nodes `0` and `n / 2`.
    Circular,
}

impl TryFrom<&str> for MolType {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "circular" => Ok(Self::Circular),
            _ => Err(format!(
                "unknown mol_type '{s}', expected 'linear' or 'circular'"
            )),
        }
    }
}

impl TryFrom<String> for MolType {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::try_from(s.as_str())
    }
}

impl MolType {
    /// Build a prototype of `node_count` default-parameter nodes.
    pub fn build(self, node_count: usize) -> MolProto {
        let mut mol = MolProto::with_nodes(node_count);
        for i in 1..node_count {
            mol.link(i - 1, i, EdgeParameters::default());
        }
        match self {
            Self::Linear => {
                mol.left_lead = 0;
                mol.right_lead = node_count.saturating_sub(1);
            }
            Self::Circular => {
                if node_count >= 2 {
                    mol.link(node_count - 1, 0, EdgeParameters::default());
                }
                mol.left_lead = 0;
                mol.right_lead = node_count / 2;
            }
        }
        mol
    }
}
