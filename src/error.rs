use derive_more::{Display, From};

use crate::{config::ScalarKind, types::Value};

pub type Result<T> = core::result::Result<T, ThicknessError>;

/// Rejected configuration, raised before any ray is cast.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ConfigError {
    #[display("sampling precision must be strictly positive, got {_0}")]
    InvalidPrecision(Value),
    #[display("gradient scale factor must be strictly positive, got {_0}")]
    InvalidScale(Value),
    #[display("grazing cutoff must lie in (0, 180] degrees, got {_0}")]
    InvalidCutoff(Value),
    #[display("{kind} display range needs min < max, got [{min}, {max}]")]
    InvalidRange {
        kind: ScalarKind,
        min: Value,
        max: Value,
    },
    #[display("region of interest needs lo < hi, got [{lo}, {hi})")]
    InvalidRegion { lo: Value, hi: Value },
}

impl std::error::Error for ConfigError {}

/// Fatal failure of a thickness run. No scalar fields are produced.
#[derive(Debug, Clone, PartialEq, Display, From)]
pub enum ThicknessError {
    #[from]
    #[display("invalid configuration: {_0}")]
    Config(ConfigError),
    #[display("input surface has no points or no cells")]
    EmptyMesh,
    #[display("cell {cell} references point {point} which does not exist")]
    InvalidCell { cell: usize, point: usize },
    #[display("spatial index has no usable cells")]
    IndexBuild,
    #[display("sampling grid of {rows}x{cols} produced no rays")]
    NoGridRays { rows: usize, cols: usize },
    #[display("grid of {rows}x{cols} cannot hold {len} entries")]
    GridShape { rows: usize, cols: usize, len: usize },
    #[display("run cancelled")]
    Cancelled,
}

impl std::error::Error for ThicknessError {}

impl ThicknessError {
    /// Human-readable description of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "validating configuration",
            Self::EmptyMesh | Self::InvalidCell { .. } | Self::IndexBuild => {
                "building spatial index"
            }
            Self::NoGridRays { .. } => "rainfall cast",
            Self::GridShape { .. } => "forming top layer",
            Self::Cancelled => "cancelled by caller",
        }
    }
}
