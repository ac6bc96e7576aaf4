use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MsdError, MsdResult};

/// Raw construction parameters of a device lattice.
///
/// Bounds are inclusive and signed, matching the way devices are usually
/// described (`molPosL..=molPosR`, `topL..=bottomL`, `frontR..=backR`).
/// Writing `mol_pos_r = mol_pos_l - 1` describes a device without a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub mol_pos_l: i64,
    pub mol_pos_r: i64,
    pub top_l: i64,
    pub bottom_l: i64,
    pub front_r: i64,
    pub back_r: i64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: 11,
            height: 10,
            depth: 10,
            mol_pos_l: 5,
            mol_pos_r: 5,
            top_l: 3,
            bottom_l: 6,
            front_r: 3,
            back_r: 6,
        }
    }
}

/// Which part of the device an x-coordinate falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Left,
    Molecule,
    Right,
}

/// Number of sites (or bond endpoints, for seams) contributing to each
/// energy term. Used to normalize fluctuation estimators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCounts {
    pub n: usize,
    pub n_l: usize,
    pub n_r: usize,
    pub n_m: usize,
    pub n_ml: usize,
    pub n_mr: usize,
    pub n_lr: usize,
}

/// Bounded 3D grid split into a left ferromagnet, a molecule and a right
/// ferromagnet along x.
///
/// Sites are indexed as `(z * height + y) * width + x`. The left ferromagnet
/// only spans the rows `rows_l` and the right ferromagnet only spans the
/// layers `layers_r`; everything else in those blocks is void. Molecule sites
/// exist only on the outer shell of the `rows_l x layers_r` neck, and every
/// x-position of one shell column belongs to a single molecule instance.
///
/// All ranges are half-open; an inverted input bound gives an empty range.
#[derive(Debug, Clone)]
pub struct Lattice {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    mol_x: Range<usize>,
    rows_l: Range<usize>,
    layers_r: Range<usize>,
    fm_l_exists: bool,
    fm_r_exists: bool,
    mol_exists: bool,
    /// Present sites in traversal order (z, then y, then x).
    indices: Vec<usize>,
    present: Vec<bool>,
    /// Molecule shell columns `(y, z)` in traversal order.
    columns: Vec<(usize, usize)>,
    counts: RegionCounts,
}

/// Clamp the inclusive signed bound pair `lo..=hi` into `0..len` as a
/// half-open range, empty when `hi < lo`.
fn clamp_range(lo: i64, hi: i64, len: usize) -> Range<usize> {
    let len_i = len as i64;
    let start = lo.clamp(0, len_i);
    let end = hi.saturating_add(1).clamp(start, len_i);
    start as usize..end as usize
}

impl Lattice {
    pub fn new(geometry: &Geometry) -> Self {
        let width = geometry.width.max(1);
        let height = geometry.height.max(1);
        let depth = geometry.depth.max(1);
        if (width, height, depth) != (geometry.width, geometry.height, geometry.depth) {
            warn!(
                width = geometry.width,
                height = geometry.height,
                depth = geometry.depth,
                "lattice dimensions clamped to >= 1"
            );
        }

        let mol_x = clamp_range(geometry.mol_pos_l, geometry.mol_pos_r, width);
        let rows_l = clamp_range(geometry.top_l, geometry.bottom_l, height);
        let layers_r = clamp_range(geometry.front_r, geometry.back_r, depth);

        let fm_l_exists = mol_x.start != 0;
        let fm_r_exists = mol_x.end < width;
        let mol_exists = !mol_x.is_empty();

        let size = width * height * depth;
        let mut lattice = Self {
            width,
            height,
            depth,
            mol_x,
            rows_l,
            layers_r,
            fm_l_exists,
            fm_r_exists,
            mol_exists,
            indices: Vec::with_capacity(size),
            present: vec![false; size],
            columns: Vec::new(),
            counts: RegionCounts::default(),
        };
        lattice.enumerate_sites();
        lattice
    }

    fn enumerate_sites(&mut self) {
        let mut counts = RegionCounts::default();
        let (mol_start, mol_end) = (self.mol_x.start, self.mol_x.end);

        for z in 0..self.depth {
            for y in 0..self.height {
                if self.rows_l.contains(&y) {
                    for x in 0..mol_start {
                        self.mark(x, y, z);
                        counts.n_l += 1;
                        if x + 1 == mol_start {
                            if self.mol_exists {
                                counts.n_ml += 1;
                            }
                            if self.fm_r_exists {
                                counts.n_lr += 1;
                            }
                        }
                    }
                }

                if self.mol_exists && self.is_shell(y, z) {
                    self.columns.push((y, z));
                    for x in mol_start..mol_end {
                        self.mark(x, y, z);
                        counts.n_m += 1;
                    }
                    if self.fm_l_exists {
                        counts.n_ml += 1;
                    }
                    if self.fm_r_exists {
                        counts.n_mr += 1;
                    }
                }

                if self.layers_r.contains(&z) {
                    for x in mol_end..self.width {
                        self.mark(x, y, z);
                        counts.n_r += 1;
                        if x == mol_end {
                            if self.mol_exists {
                                counts.n_mr += 1;
                            }
                            if self.fm_l_exists {
                                counts.n_lr += 1;
                            }
                        }
                    }
                }
            }
        }

        counts.n = self.indices.len();
        self.counts = counts;
    }

    fn mark(&mut self, x: usize, y: usize, z: usize) {
        let a = self.index(x, y, z);
        self.indices.push(a);
        self.present[a] = true;
    }

    /// Whether `(y, z)` lies on the outer shell of the neck, i.e. hosts a
    /// molecule column.
    pub fn is_shell(&self, y: usize, z: usize) -> bool {
        if self.rows_l.is_empty() || self.layers_r.is_empty() {
            return false;
        }
        let (top, bottom) = (self.rows_l.start, self.rows_l.end - 1);
        let (front, back) = (self.layers_r.start, self.layers_r.end - 1);
        ((y == top || y == bottom) && self.layers_r.contains(&z))
            || ((z == front || z == back) && self.rows_l.contains(&y))
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    /// Bounds-checked [`Lattice::index`].
    pub fn checked_index(&self, x: usize, y: usize, z: usize) -> MsdResult<usize> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return Err(MsdError::OutOfBounds {
                x,
                y,
                z,
                width: self.width,
                height: self.height,
                depth: self.depth,
            });
        }
        Ok(self.index(x, y, z))
    }

    #[inline]
    pub fn x(&self, a: usize) -> usize {
        a % self.width
    }

    #[inline]
    pub fn y(&self, a: usize) -> usize {
        a % (self.width * self.height) / self.width
    }

    #[inline]
    pub fn z(&self, a: usize) -> usize {
        a / (self.width * self.height)
    }

    #[inline]
    pub fn coords(&self, a: usize) -> (usize, usize, usize) {
        (self.x(a), self.y(a), self.z(a))
    }

    /// Total number of grid cells, present or void.
    pub fn size(&self) -> usize {
        self.width * self.height * self.depth
    }

    #[inline]
    pub fn region(&self, x: usize) -> Region {
        if x < self.mol_x.start {
            Region::Left
        } else if x < self.mol_x.end {
            Region::Molecule
        } else {
            Region::Right
        }
    }

    #[inline]
    pub fn is_present(&self, a: usize) -> bool {
        self.present.get(a).copied().unwrap_or(false)
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn mol_columns(&self) -> &[(usize, usize)] {
        &self.columns
    }

    /// Slot of column `(y, z)` in a `height * depth` column table.
    #[inline]
    pub fn column_slot(&self, y: usize, z: usize) -> usize {
        z * self.height + y
    }

    pub fn counts(&self) -> &RegionCounts {
        &self.counts
    }

    pub fn mol_x(&self) -> Range<usize> {
        self.mol_x.clone()
    }

    pub fn rows_l(&self) -> Range<usize> {
        self.rows_l.clone()
    }

    pub fn layers_r(&self) -> Range<usize> {
        self.layers_r.clone()
    }

    pub fn fm_l_exists(&self) -> bool {
        self.fm_l_exists
    }

    pub fn fm_r_exists(&self) -> bool {
        self.fm_r_exists
    }

    pub fn mol_exists(&self) -> bool {
        self.mol_exists
    }

    /// Number of x-positions the molecule spans.
    pub fn mol_width(&self) -> usize {
        self.mol_x.len()
    }
}
