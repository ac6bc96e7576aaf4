pub mod cursor;
pub mod lattice;

pub use cursor::Cursor;
pub use lattice::{Geometry, Lattice, Region, RegionCounts};
