//! Generic walk over a statement with pluggable visitor behavior.
//!
//! A shallow walk treats element accesses and reductions as opaque leaves;
//! a deep walk also descends into the access index expression and into both
//! reduction operands. The same walker serves argument discovery and full
//! expression rendering.

#[cfg(test)]
mod tests;

use crate::error::{CodegenError, Result};
use crate::statement::{Node, OperationFamily, OperationKind, PositionKey, Role, Statement};

/// Callbacks invoked by [`traverse`].
pub trait Visitor {
    /// A position that is not expanded further at this step.
    fn on_leaf(&mut self, key: PositionKey, node: &Node, statement: &Statement) -> Result<()>;

    fn on_operator(&mut self, _family: OperationFamily, _kind: OperationKind) -> Result<()> {
        Ok(())
    }

    fn before_expansion(&mut self) {}

    fn after_expansion(&mut self) {}

    /// Deep walk is entering the substructure of a leaf it just reported
    /// (access index expression or reduction operands).
    fn enter_substructure(&mut self) {}

    fn leave_substructure(&mut self) {}
}

/// Walk `statement` from `key`.
pub fn traverse<V: Visitor + ?Sized>(
    statement: &Statement,
    visitor: &mut V,
    deep: bool,
    key: PositionKey,
) -> Result<()> {
    walk(statement, visitor, deep, key, 0)
}

/// Effective key of the operand in slot `role` of `node`.
pub fn child_key(node: &Node, index: usize, role: Role) -> Result<PositionKey> {
    let operand = node.operand(role).ok_or_else(|| {
        CodegenError::MalformedGraph(format!(
            "node {}: {} has no {:?} operand",
            index, node.kind, role
        ))
    })?;
    Ok(PositionKey::for_operand(operand, index, role))
}

fn walk<V: Visitor + ?Sized>(
    statement: &Statement,
    visitor: &mut V,
    deep: bool,
    key: PositionKey,
    depth: usize,
) -> Result<()> {
    if depth > statement.len() {
        return Err(CodegenError::MalformedGraph(format!(
            "traversal depth exceeded at {} (cycle?)",
            key
        )));
    }
    let node = statement.node(key.node)?;
    log::trace!("visit {} {} deep={}", key, node.kind, deep);

    if key.role != Role::ParentRoot {
        return visitor.on_leaf(key, node, statement);
    }

    let index = key.node;
    match node.family {
        OperationFamily::Unary => {
            visitor.on_operator(node.family, node.kind)?;
            visitor.before_expansion();
            walk(statement, visitor, deep, child_key(node, index, Role::Left)?, depth + 1)?;
            visitor.after_expansion();
        }
        OperationFamily::Binary if node.kind == OperationKind::Access => {
            visitor.on_leaf(key, node, statement)?;
            if deep {
                visitor.enter_substructure();
                walk(statement, visitor, deep, child_key(node, index, Role::Right)?, depth + 1)?;
                visitor.leave_substructure();
            }
        }
        OperationFamily::Binary => {
            let is_reduction = node.kind.is_reduction();
            if is_reduction {
                visitor.on_leaf(key, node, statement)?;
                if !deep {
                    return Ok(());
                }
                visitor.enter_substructure();
            }
            visitor.before_expansion();
            walk(statement, visitor, deep, child_key(node, index, Role::Left)?, depth + 1)?;
            visitor.on_operator(node.family, node.kind)?;
            walk(statement, visitor, deep, child_key(node, index, Role::Right)?, depth + 1)?;
            visitor.after_expansion();
            if is_reduction {
                visitor.leave_substructure();
            }
        }
    }
    Ok(())
}
