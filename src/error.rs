//! Error types
//!
//! Nothing here ever reaches the host as a panic. `GeometryUnstable` aborts a
//! single pass, `Violation` is recorded data, and `ReflowError` only exists at
//! the WASM boundary where input buffers are decoded.

use crate::document::BlockId;
use serde::Serialize;
use thiserror::Error;

/// Page geometry cannot be trusted for this pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryUnstable {
    /// Header anchors and page-break containers disagree
    #[error("page header count {headers} does not match container count {containers}")]
    HeaderCountMismatch { headers: usize, containers: usize },

    /// Page height is zero, negative or not a number
    #[error("invalid page height: {0}")]
    InvalidPageHeight(f32),

    /// A header reported a non-finite top coordinate
    #[error("page header {index} has a non-finite top")]
    NonFiniteHeader { index: usize },

    /// Header tops go backwards or bands overlap
    #[error("page band {index} overlaps the previous band")]
    OverlappingBands { index: usize },
}

/// Soft failures recorded during a pass. Never fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Violation {
    /// Block rect falls outside every page band; excluded from rules
    UnresolvedBlockPosition { block: BlockId },
    /// Spacer height came out negative and was clamped to zero
    PushExhausted { anchor: usize, deficit: f32 },
}

/// Errors at the host boundary
#[derive(Debug, Error)]
pub enum ReflowError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(#[source] serde_json::Error),

    /// Flat rect buffer length is not a multiple of its stride
    #[error("rect buffer length {len} is not a multiple of {stride}")]
    MalformedRectBuffer { len: usize, stride: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryUnstable),
}
