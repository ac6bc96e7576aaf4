pub mod coupling;
pub mod parameters;
pub mod results;

pub use coupling::{BondSums, Coupling, SiteChange, SiteSums, CHANGED_FIRST, NEIGHBOR_FIRST};
pub use parameters::Parameters;
pub use results::{EnergyTerm, MagnetizationTerm, Results};
