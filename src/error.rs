use crate::shape::Shape;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong inside the tensor engine and the trainer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimsMismatch { expected: Shape, found: Shape },

    #[error("rank mismatch: expected {expected}, found {found}")]
    RankMismatch { expected: usize, found: usize },

    #[error("index {index} is out of bounds for axis {axis} with extent {extent}")]
    OutOfBounds {
        axis: usize,
        index: usize,
        extent: usize,
    },

    #[error("cannot reshape {from} elements into {to} elements")]
    BadReshape { from: usize, to: usize },

    #[error("cannot contract axis {axis} of a rank {rank} tensor")]
    BadContraction { axis: usize, rank: usize },

    #[error("{what}: {inputs} inputs but {targets} targets")]
    DataMismatch {
        what: &'static str,
        inputs: usize,
        targets: usize,
    },

    #[error("the network has no topology yet")]
    Uninitialized,

    #[error("unknown tensor slot {0}")]
    UnknownSlot(usize),

    #[error("bad magic number: expected {expected}, found '{found}'")]
    BadMagic { expected: u32, found: String },

    #[error("malformed network file: {0}")]
    Format(String),

    #[error("cannot change the topology: {0}")]
    Topology(String),

    #[error("invalid training configuration: {0}")]
    Config(String),

    #[error("training worker panicked: {0}")]
    WorkerPanicked(String),
}

impl Error {
    pub(crate) fn dims(expected: &Shape, found: &Shape) -> Self {
        Error::DimsMismatch {
            expected: expected.clone(),
            found: found.clone(),
        }
    }
}
