use serde::Serialize;

use crate::energy::{EnergyTerm, MagnetizationTerm, Results};
use crate::error::{MsdError, MsdResult};
use crate::geometry::RegionCounts;
use crate::statistics;
use crate::vector::DVec3;

/// Snapshots taken during the Sampling phase, ordered by `t`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    snapshots: Vec<Results>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub(crate) fn push(&mut self, snapshot: Results) {
        self.snapshots.push(snapshot);
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn get(&self, index: usize) -> MsdResult<&Results> {
        self.snapshots.get(index).ok_or(MsdError::RecordIndex {
            index,
            len: self.snapshots.len(),
        })
    }

    pub fn as_slice(&self) -> &[Results] {
        &self.snapshots
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Results> {
        self.snapshots.iter()
    }

    pub fn mean_energy(&self, term: EnergyTerm) -> Option<f64> {
        statistics::mean_energy(&self.snapshots, term)
    }

    pub fn mean_magnetization(&self, term: MagnetizationTerm) -> Option<DVec3> {
        statistics::mean_magnetization(&self.snapshots, term)
    }

    pub fn specific_heat(&self, term: EnergyTerm, counts: &RegionCounts, kt: f64) -> f64 {
        statistics::specific_heat(&self.snapshots, term, counts, kt)
    }

    pub fn magnetic_susceptibility(&self, term: MagnetizationTerm, counts: &RegionCounts, kt: f64) -> f64 {
        statistics::magnetic_susceptibility(&self.snapshots, term, counts, kt)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Results;
    type IntoIter = std::slice::Iter<'a, Results>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}
