use thiserror::Error;

pub type MsdResult<T> = Result<T, MsdError>;

/// Recoverable failures surfaced by the engine.
///
/// Absent neighbors across a seam are not errors (they are `Option` lookups at
/// the point of use), and internal bookkeeping failures panic instead of
/// returning one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MsdError {
    #[error("coordinate ({x}, {y}, {z}) outside the {width}x{height}x{depth} lattice")]
    OutOfBounds {
        x: usize,
        y: usize,
        z: usize,
        width: usize,
        height: usize,
        depth: usize,
    },

    #[error("index {index} outside the lattice (size {size})")]
    IndexOutOfBounds { index: usize, size: usize },

    #[error("site ({x}, {y}, {z}) is void")]
    NotPresent { x: usize, y: usize, z: usize },

    #[error("cursor stepped past the {0} of the lattice")]
    CursorOutOfRange(&'static str),

    #[error("record index {index} out of range (record holds {len} snapshots)")]
    RecordIndex { index: usize, len: usize },

    #[error("molecule prototype has {actual} nodes, expected {expected}")]
    NodeCountMismatch { expected: usize, actual: usize },

    #[error("node {index} does not exist (molecule has {count} nodes)")]
    InvalidNode { index: usize, count: usize },

    #[error("edge {index} does not exist (molecule has {count} edges)")]
    InvalidEdge { index: usize, count: usize },

    #[error("malformed molecule buffer: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("interrupted")]
    Interrupted,

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl From<validator::ValidationErrors> for MsdError {
    fn from(e: validator::ValidationErrors) -> Self {
        MsdError::Config(format!("{e}"))
    }
}

impl From<rayon::ThreadPoolBuildError> for MsdError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        MsdError::ThreadPool(e.to_string())
    }
}
