//! Statement graph: the input a scheduler hands to the generator.
//!
//! A statement is an indexed sequence of operation nodes. Operands are either
//! references to other nodes ("composite", evaluate that node first) or leaf
//! descriptors carrying the metadata the generator reads from host containers.
//!
//! Positions inside the graph are addressed with a [`PositionKey`]: a node
//! index plus a [`Role`] saying whether the key names the node itself or one
//! of its operand slots.


use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodegenError, Result};

// ─── Scalar Types ──────────────────────────────────────────────────

/// Element type of a container, as spelled in kernel source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Float,
    Double,
    Int,
    Uint,
}

impl ScalarType {
    /// Canonical kernel spelling.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::Int => "int",
            ScalarType::Uint => "unsigned int",
        }
    }

    /// Spell a compile-time constant of this type.
    ///
    /// Non-finite values have no kernel spelling. Integer types also reject
    /// fractional and out-of-range values.
    pub fn literal(self, value: f64) -> Result<String> {
        let invalid = || CodegenError::InvalidLiteral { value, dtype: self };
        if !value.is_finite() {
            return Err(invalid());
        }
        match self {
            ScalarType::Float => Ok(format!("{:?}f", value)),
            ScalarType::Double => Ok(format!("{:?}", value)),
            ScalarType::Int => {
                if value.fract() != 0.0 || value < i64::MIN as f64 || value >= i64::MAX as f64 {
                    return Err(invalid());
                }
                Ok(format!("{}", value as i64))
            }
            ScalarType::Uint => {
                if value.fract() != 0.0 || value < 0.0 || value >= u64::MAX as f64 {
                    return Err(invalid());
                }
                Ok(format!("{}u", value as u64))
            }
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Storage Identity ──────────────────────────────────────────────

/// Opaque identity of an underlying memory object.
///
/// Two operand occurrences compare equal iff they alias the same buffer.
/// Assigned by the container layer; the generator never interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(pub u64);

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─── Leaf Descriptors ──────────────────────────────────────────────

/// Scalar passed by value from the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostScalar {
    pub id: StorageId,
    pub dtype: ScalarType,
    #[serde(default)]
    pub value: f64,
}

/// Dense device vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorDesc {
    pub id: StorageId,
    pub dtype: ScalarType,
    #[serde(default)]
    pub start: usize,
    #[serde(default = "unit_stride")]
    pub stride: usize,
}

/// Storage order of a dense matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    RowMajor,
    ColumnMajor,
}

/// Dense device matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatrixDesc {
    pub id: StorageId,
    pub dtype: ScalarType,
    pub layout: Layout,
    #[serde(default)]
    pub start1: usize,
    #[serde(default = "unit_stride")]
    pub stride1: usize,
    #[serde(default)]
    pub start2: usize,
    #[serde(default = "unit_stride")]
    pub stride2: usize,
}

/// Vector whose entries are a broadcast value, or a unit vector when
/// `index` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolicVectorDesc {
    pub id: StorageId,
    pub dtype: ScalarType,
    pub value: f64,
    #[serde(default)]
    pub is_value_static: bool,
    #[serde(default)]
    pub index: Option<usize>,
}

/// Matrix whose entries are a broadcast value, or a scaled identity when
/// `diag` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolicMatrixDesc {
    pub id: StorageId,
    pub dtype: ScalarType,
    pub value: f64,
    #[serde(default)]
    pub is_value_static: bool,
    #[serde(default)]
    pub diag: bool,
}

fn unit_stride() -> usize {
    1
}

/// A leaf value descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leaf {
    HostScalar(HostScalar),
    Vector(VectorDesc),
    Matrix(MatrixDesc),
    SymbolicVector(SymbolicVectorDesc),
    SymbolicMatrix(SymbolicMatrixDesc),
}

impl Leaf {
    pub fn dtype(&self) -> ScalarType {
        match self {
            Leaf::HostScalar(s) => s.dtype,
            Leaf::Vector(v) => v.dtype,
            Leaf::Matrix(m) => m.dtype,
            Leaf::SymbolicVector(v) => v.dtype,
            Leaf::SymbolicMatrix(m) => m.dtype,
        }
    }

    pub fn storage(&self) -> StorageId {
        match self {
            Leaf::HostScalar(s) => s.id,
            Leaf::Vector(v) => v.id,
            Leaf::Matrix(m) => m.id,
            Leaf::SymbolicVector(v) => v.id,
            Leaf::SymbolicMatrix(m) => m.id,
        }
    }

    /// Short family tag used in diagnostics.
    pub fn family_name(&self) -> &'static str {
        match self {
            Leaf::HostScalar(_) => "host scalar",
            Leaf::Vector(_) => "vector",
            Leaf::Matrix(m) => match m.layout {
                Layout::RowMajor => "row-major matrix",
                Layout::ColumnMajor => "column-major matrix",
            },
            Leaf::SymbolicVector(_) => "symbolic vector",
            Leaf::SymbolicMatrix(_) => "symbolic matrix",
        }
    }
}

// ─── Operands ──────────────────────────────────────────────────────

/// Typed reference held in a node's operand slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Evaluate the node at this index first.
    Composite(usize),
    Leaf(Leaf),
}

impl Operand {
    pub fn host_scalar(id: u64, dtype: ScalarType, value: f64) -> Self {
        Operand::Leaf(Leaf::HostScalar(HostScalar {
            id: StorageId(id),
            dtype,
            value,
        }))
    }

    pub fn vector(id: u64, dtype: ScalarType) -> Self {
        Operand::Leaf(Leaf::Vector(VectorDesc {
            id: StorageId(id),
            dtype,
            start: 0,
            stride: 1,
        }))
    }

    pub fn matrix(id: u64, dtype: ScalarType, layout: Layout) -> Self {
        Operand::Leaf(Leaf::Matrix(MatrixDesc {
            id: StorageId(id),
            dtype,
            layout,
            start1: 0,
            stride1: 1,
            start2: 0,
            stride2: 1,
        }))
    }
}

// ─── Operations ────────────────────────────────────────────────────

/// Arity of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationFamily {
    Unary,
    Binary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    // Unary
    Abs,
    Neg,
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Trans,
    // Binary
    Assign,
    InplaceAdd,
    InplaceSub,
    Add,
    Sub,
    ElementProd,
    ElementDiv,
    Access,
    Prod,
    InnerProd,
}

impl OperationKind {
    pub fn family(self) -> OperationFamily {
        use OperationKind::*;
        match self {
            Abs | Neg | Exp | Log | Sqrt | Sin | Cos | Trans => OperationFamily::Unary,
            _ => OperationFamily::Binary,
        }
    }

    /// Binary operations rendered as a nested sub-expression.
    pub fn is_reduction(self) -> bool {
        matches!(self, OperationKind::Prod | OperationKind::InnerProd)
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            OperationKind::Assign | OperationKind::InplaceAdd | OperationKind::InplaceSub
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Abs => "abs",
            OperationKind::Neg => "neg",
            OperationKind::Exp => "exp",
            OperationKind::Log => "log",
            OperationKind::Sqrt => "sqrt",
            OperationKind::Sin => "sin",
            OperationKind::Cos => "cos",
            OperationKind::Trans => "trans",
            OperationKind::Assign => "assign",
            OperationKind::InplaceAdd => "inplace_add",
            OperationKind::InplaceSub => "inplace_sub",
            OperationKind::Add => "add",
            OperationKind::Sub => "sub",
            OperationKind::ElementProd => "element_prod",
            OperationKind::ElementDiv => "element_div",
            OperationKind::Access => "access",
            OperationKind::Prod => "prod",
            OperationKind::InnerProd => "inner_prod",
        };
        f.write_str(name)
    }
}

// ─── Nodes ─────────────────────────────────────────────────────────

/// One operation application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub family: OperationFamily,
    pub kind: OperationKind,
    pub lhs: Operand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhs: Option<Operand>,
}

impl Node {
    pub fn unary(kind: OperationKind, operand: Operand) -> Self {
        Node {
            family: OperationFamily::Unary,
            kind,
            lhs: operand,
            rhs: None,
        }
    }

    pub fn binary(kind: OperationKind, lhs: Operand, rhs: Operand) -> Self {
        Node {
            family: OperationFamily::Binary,
            kind,
            lhs,
            rhs: Some(rhs),
        }
    }

    /// Operand in the given slot. `ParentRoot` has no operand.
    pub fn operand(&self, role: Role) -> Option<&Operand> {
        match role {
            Role::Left => Some(&self.lhs),
            Role::Right => self.rhs.as_ref(),
            Role::ParentRoot => None,
        }
    }
}

// ─── Position Keys ─────────────────────────────────────────────────

/// Which part of a node a [`PositionKey`] addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Left,
    ParentRoot,
    Right,
}

/// (node index, role) address of a position in the statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionKey {
    pub node: usize,
    pub role: Role,
}

impl PositionKey {
    pub fn new(node: usize, role: Role) -> Self {
        PositionKey { node, role }
    }

    pub fn root(node: usize) -> Self {
        PositionKey::new(node, Role::ParentRoot)
    }

    /// Effective key of `operand` sitting in slot `role` of node `node`.
    ///
    /// Composite operands are inlined: the key re-points to the child node
    /// itself. Leaves keep the slot address.
    pub fn for_operand(operand: &Operand, node: usize, role: Role) -> Self {
        match operand {
            Operand::Composite(child) => PositionKey::root(*child),
            Operand::Leaf(_) => PositionKey::new(node, role),
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            Role::Left => "left",
            Role::ParentRoot => "root",
            Role::Right => "right",
        };
        write!(f, "({}, {})", self.node, role)
    }
}

// ─── Statement ─────────────────────────────────────────────────────

/// An expression graph to compile into one kernel body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    nodes: Vec<Node>,
    #[serde(default)]
    root: usize,
}

impl Statement {
    pub fn new(nodes: Vec<Node>) -> Self {
        Statement { nodes, root: 0 }
    }

    pub fn with_root(mut self, root: usize) -> Self {
        self.root = root;
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Traversal entry point.
    pub fn root_key(&self) -> PositionKey {
        PositionKey::root(self.root)
    }

    /// Bounds-checked node access.
    pub fn node(&self, index: usize) -> Result<&Node> {
        self.nodes.get(index).ok_or(CodegenError::NodeOutOfRange {
            index,
            len: self.nodes.len(),
        })
    }

    /// Operand sitting at a LEFT/RIGHT key.
    pub fn operand_at(&self, key: PositionKey) -> Result<&Operand> {
        let node = self.node(key.node)?;
        node.operand(key.role).ok_or_else(|| {
            CodegenError::MalformedGraph(format!("node {} has no operand at {}", key.node, key))
        })
    }

    /// Check references, arity, and acyclicity.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(CodegenError::MalformedGraph("statement has no nodes".into()));
        }
        self.node(self.root)?;

        for (index, node) in self.nodes.iter().enumerate() {
            if node.kind.family() != node.family {
                return Err(CodegenError::MalformedGraph(format!(
                    "node {}: {} is not a {:?} operation",
                    index, node.kind, node.family
                )));
            }
            match (node.family, &node.rhs) {
                (OperationFamily::Unary, Some(_)) => {
                    return Err(CodegenError::MalformedGraph(format!(
                        "node {}: unary {} has a right operand",
                        index, node.kind
                    )));
                }
                (OperationFamily::Binary, None) => {
                    return Err(CodegenError::MalformedGraph(format!(
                        "node {}: binary {} is missing its right operand",
                        index, node.kind
                    )));
                }
                _ => {}
            }
            for operand in std::iter::once(&node.lhs).chain(node.rhs.iter()) {
                if let Operand::Composite(child) = operand {
                    self.node(*child)?;
                }
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unseen,
            Active,
            Done,
        }

        let mut marks = vec![Mark::Unseen; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unseen {
                continue;
            }
            // (node, next child slot to visit)
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::Active;
            while let Some(top) = stack.last_mut() {
                let (index, slot) = *top;
                top.1 += 1;
                let node = &self.nodes[index];
                let child = match slot {
                    0 => Some(&node.lhs),
                    1 => node.rhs.as_ref(),
                    _ => {
                        marks[index] = Mark::Done;
                        stack.pop();
                        continue;
                    }
                };
                if let Some(Operand::Composite(next)) = child {
                    match marks[*next] {
                        Mark::Active => {
                            return Err(CodegenError::MalformedGraph(format!(
                                "cycle through node {}",
                                next
                            )));
                        }
                        Mark::Unseen => {
                            marks[*next] = Mark::Active;
                            stack.push((*next, 0));
                        }
                        Mark::Done => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Element type produced at `key`: the type of its leftmost leaf.
    pub fn scalar_type_of(&self, key: PositionKey) -> Result<ScalarType> {
        let mut key = key;
        for _ in 0..=self.nodes.len() {
            let node = self.node(key.node)?;
            let operand = match key.role {
                Role::ParentRoot => &node.lhs,
                _ => self.operand_at(key)?,
            };
            match operand {
                Operand::Leaf(leaf) => return Ok(leaf.dtype()),
                Operand::Composite(child) => key = PositionKey::root(*child),
            }
        }
        Err(CodegenError::MalformedGraph(format!(
            "cycle while resolving the type at {}",
            key
        )))
    }
}
