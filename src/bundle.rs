//! Kernel bundle: self-contained artifact for a launcher.
//!
//! Carries the kernel source, its argument bindings in slot order, and a
//! content hash of the statement it was generated from. Launchers key their
//! compiled-program cache on the hash.

use serde::{Deserialize, Serialize};

use crate::kernel::KernelSource;
use crate::registry::KernelArgument;
use crate::statement::Statement;

// ─── Data Types ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelBundle {
    /// Kernel function name.
    pub name: String,
    /// blake3 of the statement's JSON encoding (hex).
    pub statement_hash: String,
    /// Arguments in slot order; the element count follows them.
    pub arguments: Vec<KernelArgument>,
    /// Name of the trailing element-count parameter.
    pub size_argument: String,
    pub source: String,
}

/// Content hash of a statement.
pub fn statement_hash(statement: &Statement) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(statement)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// ─── JSON Serialization ────────────────────────────────────────────

impl KernelBundle {
    pub fn new(
        statement: &Statement,
        kernel: KernelSource,
        size_argument: &str,
    ) -> Result<KernelBundle, serde_json::Error> {
        Ok(KernelBundle {
            name: kernel.name,
            statement_hash: statement_hash(statement)?,
            arguments: kernel.arguments,
            size_argument: size_argument.to_string(),
            source: kernel.source,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<KernelBundle, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenOptions;
    use crate::kernel::generate_kernel;
    use crate::registry::{ArgumentKind, AddressSpace};
    use crate::statement::{Node, OperationKind, Operand, ScalarType};

    fn saxpy_like() -> Statement {
        Statement::new(vec![
            Node::binary(
                OperationKind::Assign,
                Operand::vector(1, ScalarType::Float),
                Operand::Composite(1),
            ),
            Node::binary(
                OperationKind::Add,
                Operand::vector(2, ScalarType::Float),
                Operand::host_scalar(3, ScalarType::Float, 2.0),
            ),
        ])
    }

    #[test]
    fn test_bundle_json_round_trip() {
        let stmt = saxpy_like();
        let options = CodegenOptions::default();
        let kernel = generate_kernel(&stmt, &options).unwrap();
        let bundle = KernelBundle::new(&stmt, kernel, &options.size_argument).unwrap();

        let json = bundle.to_json().unwrap();
        assert!(json.contains("\"statement_hash\""));
        let back = KernelBundle::from_json(&json).unwrap();
        assert_eq!(back, bundle);
        assert_eq!(
            back.arguments[0].kind,
            ArgumentKind::Pointer(AddressSpace::Global)
        );
        assert_eq!(back.arguments[2].kind, ArgumentKind::Value);
    }

    #[test]
    fn test_statement_hash_tracks_content() {
        let a = saxpy_like();
        let b = saxpy_like();
        assert_eq!(statement_hash(&a).unwrap(), statement_hash(&b).unwrap());
        assert_eq!(statement_hash(&a).unwrap().len(), 64);

        let c = Statement::new(vec![Node::binary(
            OperationKind::Assign,
            Operand::vector(1, ScalarType::Float),
            Operand::vector(9, ScalarType::Float),
        )]);
        assert_ne!(statement_hash(&a).unwrap(), statement_hash(&c).unwrap());
    }
}
