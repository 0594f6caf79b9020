//! Mapped operands: how each position of a statement renders to source.
//!
//! The prototype pass creates one [`MappedOperand`] per distinct
//! [`PositionKey`] and stores it in a [`MappingTable`]. The table is an arena
//! owned by a single compile call; operands that need to render other parts
//! of the tree (access index expressions, reduction bodies) hold keys into
//! it, never references.


use std::collections::{BTreeMap, HashSet};

use crate::emit;
use crate::error::{CodegenError, Result};
use crate::statement::{Layout, OperationKind, PositionKey, ScalarType, Statement};
use crate::stream::KernelStream;

/// Read-only view handed to renderers.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub statement: &'a Statement,
    pub mapping: &'a MappingTable,
}

/// A sub-expression rendered on demand by a deep emitter pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeferredExpr {
    pub key: PositionKey,
}

impl DeferredExpr {
    pub fn new(key: PositionKey) -> Self {
        DeferredExpr { key }
    }

    pub fn render(&self, index: &str, ctx: &RenderContext<'_>) -> Result<String> {
        emit::emit(index, ctx.statement, ctx.mapping, self.key)
    }
}

// ─── Variants ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct MappedHostScalar {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MappedVector {
    pub name: String,
    pub start: Option<String>,
    pub stride: Option<String>,
    /// Index expression when this vector is the base of an element access.
    pub access: Option<DeferredExpr>,
}

impl MappedVector {
    fn offset(&self, index: &str, ctx: &RenderContext<'_>) -> Result<String> {
        let idx = match &self.access {
            Some(expr) => expr.render(index, ctx)?,
            None => index.to_string(),
        };
        Ok(match (&self.start, &self.stride) {
            (None, None) => idx,
            (Some(start), None) => format!("{} + {}", start, idx),
            (None, Some(stride)) => format!("({})*{}", idx, stride),
            (Some(start), Some(stride)) => format!("{} + ({})*{}", start, idx, stride),
        })
    }
}

/// Dense matrix. The flat index is supplied by the caller; layout and the
/// per-dimension start/stride names are carried for the linearization step.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedMatrix {
    pub name: String,
    pub layout: Layout,
    pub start1: Option<String>,
    pub stride1: Option<String>,
    pub start2: Option<String>,
    pub stride2: Option<String>,
}

impl MappedMatrix {
    pub fn is_row_major(&self) -> bool {
        self.layout == Layout::RowMajor
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MappedSymbolicVector {
    /// Parameter name, or a literal when the value is static.
    pub value: String,
    pub is_value_static: bool,
    /// Unit-vector position parameter.
    pub index: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MappedSymbolicMatrix {
    pub value: String,
    pub is_value_static: bool,
    pub is_diag: bool,
}

/// Whether a reduction collapses to one value or to a vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReductionOutput {
    Scalar,
    Vector,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MappedReduction {
    /// Position of the reduction node itself.
    pub key: PositionKey,
    pub kind: OperationKind,
    pub lhs: DeferredExpr,
    pub rhs: DeferredExpr,
}

impl MappedReduction {
    pub fn output(&self) -> ReductionOutput {
        match self.kind {
            OperationKind::InnerProd => ReductionOutput::Scalar,
            _ => ReductionOutput::Vector,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MappedKind {
    HostScalar(MappedHostScalar),
    Vector(MappedVector),
    Matrix(MappedMatrix),
    SymbolicVector(MappedSymbolicVector),
    SymbolicMatrix(MappedSymbolicMatrix),
    Reduction(MappedReduction),
}

// ─── Mapped Operand ────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct MappedOperand {
    pub scalar_type: ScalarType,
    /// Override returned verbatim by [`MappedOperand::render`].
    pub access_name: Option<String>,
    pub kind: MappedKind,
}

impl MappedOperand {
    pub fn new(scalar_type: ScalarType, kind: MappedKind) -> Self {
        MappedOperand {
            scalar_type,
            access_name: None,
            kind,
        }
    }

    /// Text for this operand at loop index `index`.
    pub fn render(&self, index: &str, ctx: &RenderContext<'_>) -> Result<String> {
        match &self.access_name {
            Some(name) => Ok(name.clone()),
            None => self.render_default(index, ctx),
        }
    }

    /// Text ignoring any override.
    pub fn render_default(&self, index: &str, ctx: &RenderContext<'_>) -> Result<String> {
        match &self.kind {
            MappedKind::HostScalar(s) => Ok(s.name.clone()),
            MappedKind::Vector(v) => Ok(format!("{}[{}]", v.name, v.offset(index, ctx)?)),
            MappedKind::Matrix(m) => Ok(format!("{}[{}]", m.name, index)),
            MappedKind::SymbolicVector(v) => Ok(match &v.index {
                Some(position) => format!(
                    "(({} == {}) ? {} : {})",
                    index,
                    position,
                    v.value,
                    self.scalar_type.literal(0.0)?
                ),
                None => v.value.clone(),
            }),
            MappedKind::SymbolicMatrix(m) => Ok(m.value.clone()),
            MappedKind::Reduction(r) => Err(CodegenError::UnmaterializedReduction(r.key)),
        }
    }

    /// Buffer name of pointer-backed operands.
    pub fn handle_name(&self) -> Option<&str> {
        match &self.kind {
            MappedKind::Vector(v) => Some(&v.name),
            MappedKind::Matrix(m) => Some(&m.name),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&MappedVector> {
        match &self.kind {
            MappedKind::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_reduction(&self) -> Option<&MappedReduction> {
        match &self.kind {
            MappedKind::Reduction(r) => Some(r),
            _ => None,
        }
    }
}

// ─── Mapping Table ─────────────────────────────────────────────────

/// Arena of mapped operands for one compile call.
#[derive(Clone, Debug, Default)]
pub struct MappingTable {
    entries: BTreeMap<PositionKey, MappedOperand>,
    aliases: BTreeMap<PositionKey, PositionKey>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless `key` is already mapped. Returns whether it was new.
    pub fn insert(&mut self, key: PositionKey, operand: MappedOperand) -> bool {
        if self.contains(key) {
            return false;
        }
        self.entries.insert(key, operand);
        true
    }

    /// Make `key` resolve to the operand stored at `target`.
    pub fn alias(&mut self, key: PositionKey, target: PositionKey) {
        self.aliases.insert(key, target);
    }

    pub fn resolve(&self, key: PositionKey) -> PositionKey {
        self.aliases.get(&key).copied().unwrap_or(key)
    }

    pub fn contains(&self, key: PositionKey) -> bool {
        self.entries.contains_key(&self.resolve(key))
    }

    pub fn get(&self, key: PositionKey) -> Result<&MappedOperand> {
        self.entries
            .get(&self.resolve(key))
            .ok_or(CodegenError::UnmappedPosition(key))
    }

    pub fn get_mut(&mut self, key: PositionKey) -> Result<&mut MappedOperand> {
        let resolved = self.resolve(key);
        self.entries
            .get_mut(&resolved)
            .ok_or(CodegenError::UnmappedPosition(key))
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PositionKey, &MappedOperand)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind or clear the override name at `key`.
    pub fn set_access_name(&mut self, key: PositionKey, name: Option<String>) -> Result<()> {
        self.get_mut(key)?.access_name = name;
        Ok(())
    }

    /// Load the handle at `key` into a private copy.
    ///
    /// The declaration is written once per buffer name; every later fetch of
    /// the same buffer only rebinds the override.
    pub fn fetch(
        &mut self,
        key: PositionKey,
        index: &str,
        statement: &Statement,
        fetched: &mut HashSet<String>,
        out: &mut KernelStream,
    ) -> Result<()> {
        let (name, scalar_type) = self.handle(key)?;
        let private = format!("{}_private", name);
        if !fetched.contains(&name) {
            let ctx = RenderContext {
                statement,
                mapping: self,
            };
            let address = self.get(key)?.render_default(index, &ctx)?;
            out.line(format!("{} {} = {};", scalar_type, private, address));
            fetched.insert(name);
        }
        self.set_access_name(key, Some(private))
    }

    /// Store the private copy of the handle at `key` back to its buffer.
    ///
    /// The store is emitted only while the buffer is fetched and targets the
    /// default address, not the private name. The override at `key` is
    /// always cleared, as is every other position still bound to this
    /// buffer's private copy.
    pub fn write_back(
        &mut self,
        key: PositionKey,
        index: &str,
        statement: &Statement,
        fetched: &mut HashSet<String>,
        out: &mut KernelStream,
    ) -> Result<()> {
        let (name, _) = self.handle(key)?;
        let private = format!("{}_private", name);
        if fetched.remove(&name) {
            let operand = self.get(key)?;
            let ctx = RenderContext {
                statement,
                mapping: self,
            };
            let address = operand.render_default(index, &ctx)?;
            let current = operand.access_name.as_deref().unwrap_or(&private);
            out.line(format!("{} = {};", address, current));
            log::trace!("wrote back {} through {}", name, current);
        }

        self.set_access_name(key, None)?;
        for operand in self.entries.values_mut() {
            if operand.access_name.as_deref() == Some(private.as_str()) {
                operand.access_name = None;
            }
        }
        Ok(())
    }

    fn handle(&self, key: PositionKey) -> Result<(String, ScalarType)> {
        let operand = self.get(key)?;
        match operand.handle_name() {
            Some(name) => Ok((name.to_string(), operand.scalar_type)),
            None => Err(CodegenError::UnsupportedOperand(format!(
                "operand at {} is not pointer-backed",
                key
            ))),
        }
    }
}
