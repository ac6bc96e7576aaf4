use std::cmp::Ordering;

use super::Lattice;
use crate::error::{MsdError, MsdResult};

/// Random-access position over the present sites of one [`Lattice`].
///
/// A cursor walks [`Lattice::indices`] and never lands on a void cell. The
/// one-past-the-end position is valid to hold but not to read. Comparing
/// cursors from two different lattices is a programming error and panics.
#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    lattice: &'a Lattice,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn at(lattice: &'a Lattice, pos: usize) -> Self {
        Self { lattice, pos }
    }

    /// Ordinal of this cursor among the present sites.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.lattice.indices().len()
    }

    /// Linear index of the site under the cursor.
    pub fn index(&self) -> MsdResult<usize> {
        self.lattice
            .indices()
            .get(self.pos)
            .copied()
            .ok_or(MsdError::CursorOutOfRange("end"))
    }

    pub fn coords(&self) -> MsdResult<(usize, usize, usize)> {
        self.index().map(|a| self.lattice.coords(a))
    }

    pub fn x(&self) -> MsdResult<usize> {
        self.index().map(|a| self.lattice.x(a))
    }

    pub fn y(&self) -> MsdResult<usize> {
        self.index().map(|a| self.lattice.y(a))
    }

    pub fn z(&self) -> MsdResult<usize> {
        self.index().map(|a| self.lattice.z(a))
    }

    /// Step to the next present site. Stepping from the end position fails.
    pub fn step_forward(&mut self) -> MsdResult<()> {
        if self.is_end() {
            return Err(MsdError::CursorOutOfRange("end"));
        }
        self.pos += 1;
        Ok(())
    }

    /// Step to the previous present site. Stepping from the first site fails.
    pub fn step_back(&mut self) -> MsdResult<()> {
        if self.pos == 0 {
            return Err(MsdError::CursorOutOfRange("beginning"));
        }
        self.pos -= 1;
        Ok(())
    }

    /// Move by `n` present sites in either direction. The cursor is left
    /// untouched when the target lies outside `begin..=end`.
    pub fn advance(&mut self, n: isize) -> MsdResult<()> {
        let target = self.pos as isize + n;
        if target < 0 {
            return Err(MsdError::CursorOutOfRange("beginning"));
        }
        if target as usize > self.lattice.indices().len() {
            return Err(MsdError::CursorOutOfRange("end"));
        }
        self.pos = target as usize;
        Ok(())
    }

    /// Signed number of steps from `other` to `self`.
    pub fn distance_from(&self, other: &Self) -> isize {
        self.assert_same_lattice(other);
        self.pos as isize - other.pos as isize
    }

    fn assert_same_lattice(&self, other: &Self) {
        assert!(
            std::ptr::eq(self.lattice, other.lattice),
            "compared cursors from different lattices"
        );
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.assert_same_lattice(other);
        self.pos == other.pos
    }
}

impl Eq for Cursor<'_> {}

impl PartialOrd for Cursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cursor<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.assert_same_lattice(other);
        self.pos.cmp(&other.pos)
    }
}

impl Lattice {
    /// Cursor at the first present site.
    pub fn begin(&self) -> Cursor<'_> {
        Cursor::at(self, 0)
    }

    /// Cursor one past the last present site.
    pub fn end(&self) -> Cursor<'_> {
        Cursor::at(self, self.indices().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn lattice() -> Lattice {
        Lattice::new(&Geometry {
            width: 5,
            height: 5,
            depth: 5,
            mol_pos_l: 3,
            mol_pos_r: 3,
            top_l: 1,
            bottom_l: 3,
            front_r: 1,
            back_r: 3,
        })
    }

    #[test]
    fn test_walk_visits_only_present_sites() {
        let lat = lattice();
        let mut cur = lat.begin();
        let end = lat.end();
        let mut seen = 0;
        while cur != end {
            let a = cur.index().unwrap();
            assert!(lat.is_present(a));
            cur.step_forward().unwrap();
            seen += 1;
        }
        assert_eq!(seen, lat.counts().n);
        assert_eq!(end.distance_from(&lat.begin()), seen as isize);
    }

    #[test]
    fn test_stepping_past_either_end_fails() {
        let lat = lattice();
        let mut cur = lat.begin();
        assert_eq!(cur.step_back(), Err(MsdError::CursorOutOfRange("beginning")));

        let mut end = lat.end();
        assert!(end.index().is_err());
        assert_eq!(end.step_forward(), Err(MsdError::CursorOutOfRange("end")));
        end.step_back().unwrap();
        assert!(end.index().is_ok());

        assert!(cur.advance(lat.counts().n as isize + 1).is_err());
        assert_eq!(cur.position(), 0);
        cur.advance(4).unwrap();
        assert!(cur > lat.begin());
        cur.advance(-4).unwrap();
        assert_eq!(cur, lat.begin());
    }

    #[test]
    #[should_panic(expected = "different lattices")]
    fn test_cross_lattice_comparison_panics() {
        let a = lattice();
        let b = lattice();
        let _ = a.begin() == b.begin();
    }
}
