//! Compiles scheduler statements into OpenCL kernel source.
//!
//! A statement is a small expression graph over scalars, vectors, and
//! matrices. Compilation runs two passes over it:
//!
//! ```text
//! Statement ──prototype──▶ arguments + mapping ──emit──▶ expression text
//!                                              └─kernel─▶ __kernel source
//! ```

pub mod bundle;
pub mod config;
pub mod emit;
pub mod error;
pub mod kernel;
pub mod mapped;
pub mod prototype;
pub mod registry;
pub mod statement;
pub mod stream;
pub mod traverse;

pub use config::CodegenOptions;
pub use error::{CodegenError, ConfigError, Result};
pub use kernel::{generate_kernel, KernelSource};
pub use prototype::{build_prototype, Prototype};
pub use statement::{PositionKey, Statement};

/// Argument declarations and body expression for `statement`.
///
/// The body is rendered at loop index `index` from the statement root and
/// carries no trailing terminator.
pub fn compile_expression(statement: &Statement, index: &str) -> Result<(Vec<String>, String)> {
    statement.validate()?;
    let prototype = build_prototype(statement, statement.root_key())?;
    let body = emit::emit(index, statement, &prototype.mapping, statement.root_key())?;
    Ok((prototype.declarations(), body))
}
