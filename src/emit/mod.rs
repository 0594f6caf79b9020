//! Expression emitter: renders a mapped statement to one expression string.
//!
//! Every composite sub-expression is wrapped in parentheses so precedence
//! never depends on the operator table. Assignment-class operators are the
//! exception: they only ever sit at statement level and stay bare.


use crate::error::{CodegenError, Result};
use crate::mapped::{MappingTable, RenderContext};
use crate::statement::{Node, OperationFamily, OperationKind, PositionKey, Statement};
use crate::traverse::{traverse, Visitor};

const OPEN: &str = "( ";
const CLOSE: &str = " )";

/// Kernel spelling of an operator.
pub fn operator_token(kind: OperationKind) -> Result<&'static str> {
    use OperationKind::*;
    match kind {
        Abs => Ok("abs"),
        Neg => Ok("-"),
        Exp => Ok("exp"),
        Log => Ok("log"),
        Sqrt => Ok("sqrt"),
        Sin => Ok("sin"),
        Cos => Ok("cos"),
        Assign => Ok("="),
        InplaceAdd => Ok("+="),
        InplaceSub => Ok("-="),
        Add => Ok("+"),
        Sub => Ok("-"),
        ElementProd => Ok("*"),
        ElementDiv => Ok("/"),
        Access => Ok(""),
        Trans | Prod | InnerProd => Err(CodegenError::UnsupportedOperator(kind.to_string())),
    }
}

/// Render `statement` from `start` at loop index `index`.
pub fn emit(
    index: &str,
    statement: &Statement,
    mapping: &MappingTable,
    start: PositionKey,
) -> Result<String> {
    let mut emitter = ExpressionEmitter::new(index, statement, mapping);
    traverse(statement, &mut emitter, true, start)?;
    Ok(emitter.finish())
}

/// Deep-walk visitor accumulating the expression text.
pub struct ExpressionEmitter<'a> {
    index: &'a str,
    ctx: RenderContext<'a>,
    out: String,
    /// Output offset of each open parenthesis, `None` once removed.
    groups: Vec<Option<usize>>,
    /// Substructure nesting already rendered through its leaf.
    muted: usize,
}

impl<'a> ExpressionEmitter<'a> {
    pub fn new(index: &'a str, statement: &'a Statement, mapping: &'a MappingTable) -> Self {
        ExpressionEmitter {
            index,
            ctx: RenderContext { statement, mapping },
            out: String::new(),
            groups: Vec::new(),
            muted: 0,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Visitor for ExpressionEmitter<'_> {
    fn on_leaf(&mut self, key: PositionKey, _node: &Node, _statement: &Statement) -> Result<()> {
        if self.muted > 0 {
            return Ok(());
        }
        let text = self.ctx.mapping.get(key)?.render(self.index, &self.ctx)?;
        self.out.push_str(&text);
        Ok(())
    }

    fn on_operator(&mut self, family: OperationFamily, kind: OperationKind) -> Result<()> {
        if self.muted > 0 {
            return Ok(());
        }
        let token = operator_token(kind)?;
        match family {
            OperationFamily::Unary => self.out.push_str(token),
            OperationFamily::Binary => {
                if kind.is_assignment() {
                    if let Some(group) = self.groups.last_mut() {
                        if let Some(at) = group.take() {
                            self.out.replace_range(at..at + OPEN.len(), "");
                        }
                    }
                }
                self.out.push(' ');
                self.out.push_str(token);
                self.out.push(' ');
            }
        }
        Ok(())
    }

    fn before_expansion(&mut self) {
        if self.muted > 0 {
            return;
        }
        self.groups.push(Some(self.out.len()));
        self.out.push_str(OPEN);
    }

    fn after_expansion(&mut self) {
        if self.muted > 0 {
            return;
        }
        if let Some(Some(_)) = self.groups.pop() {
            self.out.push_str(CLOSE);
        }
    }

    fn enter_substructure(&mut self) {
        self.muted += 1;
    }

    fn leave_substructure(&mut self) {
        self.muted = self.muted.saturating_sub(1);
    }
}
