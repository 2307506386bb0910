use crate::constants::{Float, MaterialId};
use thiserror::Error;

pub type LbResult<T> = Result<T, LbError>;

#[derive(Error, Debug)]
pub enum LbError {
    #[error("cannot split {layers} layers along axis {axis} across {workers} workers")]
    Capacity {
        workers: usize,
        layers: usize,
        axis: usize,
    },

    #[error("material {0} is referenced by a dynamics definition but has no voxels")]
    EmptyMaterial(MaterialId),

    #[error(
        "material {material}: fictitious densities of both phases must form a distinct pair, got {first:?} and {second:?}"
    )]
    FictitiousDensityPairing {
        material: MaterialId,
        first: Option<Float>,
        second: Option<Float>,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("halo exchange from partition {from} to partition {to} failed: {reason}")]
    Communication {
        from: usize,
        to: usize,
        reason: String,
    },

    #[error("could not build the thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LbError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}
