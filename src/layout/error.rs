use super::LabelIndex;
use thiserror::Error;

/// Unrecoverable numerical failure of a relaxation session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryFailure {
    #[error("label {label} moved to a non-finite position ({x}, {y})")]
    NonFinite { label: LabelIndex, x: f64, y: f64 },
    #[error("label {label} is out of range for a problem with {len} labels")]
    UnknownLabel { label: LabelIndex, len: usize },
    #[error("relaxation diverged: {0}")]
    Diverged(String),
}
