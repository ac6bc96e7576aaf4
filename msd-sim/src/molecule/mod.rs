pub mod codec;
pub mod factory;
pub mod instance;
pub mod prototype;

pub use factory::MolType;
pub use instance::{MolHandle, MolInstance};
pub use prototype::{Direction, Edge, EdgeParameters, EdgeView, MolProto, NodeParameters};
