//! Prototype builder: discovers kernel arguments and maps every position.
//!
//! A shallow walk from the start key maps the top-level operands first, so
//! their arguments come first. Keys deferred by reductions and element
//! accesses are then walked deep, oldest first, until every operand a later
//! render can reach has been registered. Emission never touches the
//! registry.


use std::collections::{HashSet, VecDeque};

use crate::error::{CodegenError, Result};
use crate::mapped::{
    DeferredExpr, MappedHostScalar, MappedKind, MappedMatrix, MappedOperand, MappedReduction,
    MappedSymbolicMatrix, MappedSymbolicVector, MappedVector, MappingTable,
};
use crate::registry::{AddressSpace, KernelArgument, SymbolKey, SymbolRegistry, SymbolRole};
use crate::statement::{
    Leaf, Node, OperationKind, Operand, PositionKey, Role, ScalarType, Statement, StorageId,
};
use crate::traverse::{child_key, traverse, Visitor};

/// Kernel parameter list plus the mapping needed to address each parameter.
#[derive(Clone, Debug)]
pub struct Prototype {
    pub arguments: Vec<KernelArgument>,
    pub mapping: MappingTable,
}

impl Prototype {
    /// Declaration lines in slot order.
    pub fn declarations(&self) -> Vec<String> {
        self.arguments.iter().map(|a| a.declaration()).collect()
    }
}

/// Build the prototype of `statement` starting at `start` with global
/// pointer arguments.
pub fn build_prototype(statement: &Statement, start: PositionKey) -> Result<Prototype> {
    PrototypeBuilder::new(statement).build(start)
}

pub struct PrototypeBuilder<'a> {
    statement: &'a Statement,
    address_space: AddressSpace,
    registry: SymbolRegistry,
    mapping: MappingTable,
    deferred: VecDeque<PositionKey>,
    expanded: HashSet<PositionKey>,
    /// Buffers the kernel stores to; always `__global`.
    written: HashSet<StorageId>,
}

impl<'a> PrototypeBuilder<'a> {
    pub fn new(statement: &'a Statement) -> Self {
        PrototypeBuilder {
            statement,
            address_space: AddressSpace::Global,
            registry: SymbolRegistry::new(),
            mapping: MappingTable::new(),
            deferred: VecDeque::new(),
            expanded: HashSet::new(),
            written: HashSet::new(),
        }
    }

    /// Address space of pointer arguments the kernel only reads.
    pub fn address_space(mut self, space: AddressSpace) -> Self {
        self.address_space = space;
        self
    }

    /// Mark `storage` as written by the kernel.
    pub fn writes(mut self, storage: StorageId) -> Self {
        self.written.insert(storage);
        self
    }

    pub fn build(mut self, start: PositionKey) -> Result<Prototype> {
        let statement = self.statement;
        traverse(statement, &mut self, false, start)?;

        while let Some(key) = self.deferred.pop_front() {
            if self.expanded.insert(key) {
                traverse(statement, &mut self, true, key)?;
            }
        }

        log::debug!(
            "prototype: {} arguments, {} mapped positions",
            self.registry.len(),
            self.mapping.len()
        );
        Ok(Prototype {
            arguments: self.registry.into_arguments(),
            mapping: self.mapping,
        })
    }

    fn map_position(&mut self, key: PositionKey, node: &Node, statement: &Statement) -> Result<()> {
        if self.mapping.contains(key) {
            return Ok(());
        }

        if key.role != Role::ParentRoot {
            let leaf = match statement.operand_at(key)? {
                Operand::Leaf(leaf) => leaf,
                Operand::Composite(child) => {
                    return Err(CodegenError::UnsupportedOperand(format!(
                        "composite operand (node {}) at leaf position {}",
                        child, key
                    )));
                }
            };
            let mapped = self.map_leaf(leaf)?;
            self.mapping.insert(key, mapped);
            return Ok(());
        }

        match node.kind {
            OperationKind::Access => self.map_access(key, node, statement),
            kind if kind.is_reduction() => {
                let lhs = child_key(node, key.node, Role::Left)?;
                let rhs = child_key(node, key.node, Role::Right)?;
                let scalar_type = statement.scalar_type_of(lhs)?;
                let reduction = MappedReduction {
                    key,
                    kind,
                    lhs: DeferredExpr::new(lhs),
                    rhs: DeferredExpr::new(rhs),
                };
                self.mapping.insert(
                    key,
                    MappedOperand::new(scalar_type, MappedKind::Reduction(reduction)),
                );
                self.deferred.push_back(lhs);
                self.deferred.push_back(rhs);
                Ok(())
            }
            kind => Err(CodegenError::UnsupportedOperand(format!(
                "{} at {} cannot be mapped as a leaf",
                kind, key
            ))),
        }
    }

    /// `a[expr]`: map `a` as the indexed array, then attach `expr`.
    fn map_access(&mut self, key: PositionKey, node: &Node, statement: &Statement) -> Result<()> {
        if !matches!(node.lhs, Operand::Leaf(Leaf::Vector(_))) {
            let what = match &node.lhs {
                Operand::Leaf(leaf) => leaf.family_name(),
                Operand::Composite(_) => "composite expression",
            };
            return Err(CodegenError::UnsupportedOperand(format!(
                "element access on {} at {}",
                what, key
            )));
        }

        let base = PositionKey::new(key.node, Role::Left);
        self.map_position(base, node, statement)?;
        let index_key = child_key(node, key.node, Role::Right)?;
        if let MappedKind::Vector(vector) = &mut self.mapping.get_mut(base)?.kind {
            vector.access = Some(DeferredExpr::new(index_key));
        }
        self.mapping.alias(key, base);
        self.deferred.push_back(index_key);
        Ok(())
    }

    fn map_leaf(&mut self, leaf: &Leaf) -> Result<MappedOperand> {
        let dtype = leaf.dtype();
        let kind = match leaf {
            Leaf::HostScalar(s) => MappedKind::HostScalar(MappedHostScalar {
                name: self.value(s.id, SymbolRole::Value, dtype),
            }),
            Leaf::Vector(v) => {
                let name = self.pointer(v.id, dtype);
                let start = (v.start > 0).then(|| self.offset(v.id, SymbolRole::Start));
                let stride = (v.stride > 1).then(|| self.offset(v.id, SymbolRole::Stride));
                MappedKind::Vector(MappedVector {
                    name,
                    start,
                    stride,
                    access: None,
                })
            }
            Leaf::Matrix(m) => {
                let name = self.pointer(m.id, dtype);
                let start1 = (m.start1 > 0).then(|| self.offset(m.id, SymbolRole::Start1));
                let stride1 = (m.stride1 > 1).then(|| self.offset(m.id, SymbolRole::Stride1));
                let start2 = (m.start2 > 0).then(|| self.offset(m.id, SymbolRole::Start2));
                let stride2 = (m.stride2 > 1).then(|| self.offset(m.id, SymbolRole::Stride2));
                MappedKind::Matrix(MappedMatrix {
                    name,
                    layout: m.layout,
                    start1,
                    stride1,
                    start2,
                    stride2,
                })
            }
            Leaf::SymbolicVector(v) => {
                let value = if v.is_value_static {
                    dtype.literal(v.value)?
                } else {
                    self.value(v.id, SymbolRole::Value, dtype)
                };
                let index = v.index.map(|_| self.offset(v.id, SymbolRole::Index));
                MappedKind::SymbolicVector(MappedSymbolicVector {
                    value,
                    is_value_static: v.is_value_static,
                    index,
                })
            }
            Leaf::SymbolicMatrix(m) => {
                let value = if m.is_value_static {
                    dtype.literal(m.value)?
                } else {
                    self.value(m.id, SymbolRole::Value, dtype)
                };
                MappedKind::SymbolicMatrix(MappedSymbolicMatrix {
                    value,
                    is_value_static: m.is_value_static,
                    is_diag: m.diag,
                })
            }
        };
        Ok(MappedOperand::new(dtype, kind))
    }

    fn value(&mut self, id: StorageId, role: SymbolRole, dtype: ScalarType) -> String {
        self.registry.value(SymbolKey::new(id, role), dtype)
    }

    /// Auxiliary index parameter.
    fn offset(&mut self, id: StorageId, role: SymbolRole) -> String {
        self.value(id, role, ScalarType::Uint)
    }

    fn pointer(&mut self, id: StorageId, dtype: ScalarType) -> String {
        let space = if self.written.contains(&id) {
            AddressSpace::Global
        } else {
            self.address_space
        };
        self.registry
            .pointer(SymbolKey::new(id, SymbolRole::Buffer), dtype, space)
    }
}

impl Visitor for PrototypeBuilder<'_> {
    fn on_leaf(&mut self, key: PositionKey, node: &Node, statement: &Statement) -> Result<()> {
        self.map_position(key, node, statement)
    }
}
