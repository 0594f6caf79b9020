//! Error types for kernel generation and configuration loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::statement::{PositionKey, ScalarType};

/// Result alias used throughout the generator.
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Failures raised while compiling a statement into kernel text.
///
/// Every variant is a deterministic function of the statement's shape.
/// A failed call produces no partial kernel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodegenError {
    /// An operand shape has no mapped rendering.
    #[error("unsupported operand kind: {0}")]
    UnsupportedOperand(String),

    /// An operator has no kernel token.
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// A position key points past the end of the statement.
    #[error("node index {index} out of range (statement has {len} nodes)")]
    NodeOutOfRange { index: usize, len: usize },

    /// Structural violation in the statement graph.
    #[error("malformed statement: {0}")]
    MalformedGraph(String),

    /// The emitter reached a position the prototype pass never mapped.
    #[error("no mapped operand at {0}")]
    UnmappedPosition(PositionKey),

    /// A static value has no literal spelling in its element type.
    #[error("{value} is not a valid {dtype} literal")]
    InvalidLiteral { value: f64, dtype: ScalarType },

    /// A reduction was rendered without a materialized result name.
    #[error("reduction at {0} has no materialized result")]
    UnmaterializedReduction(PositionKey),
}

/// Failures raised while reading `kernelgen.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config at '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
