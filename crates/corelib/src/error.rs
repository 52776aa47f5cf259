//! Core shared errors (renderer-agnostic).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Animation clip not found: {0}")]
    MissingClip(String),
    #[error("Node index {0} out of range")]
    InvalidNode(usize),
    #[error("Mesh index {0} out of range")]
    InvalidMesh(usize),
}

pub type CoreResult<T> = Result<T, CoreError>;
