use super::*;
use crate::statement::{Operand, ScalarType};

/// Records every callback as a short token.
#[derive(Default)]
struct Recorder {
    events: Vec<String>,
}

impl Visitor for Recorder {
    fn on_leaf(&mut self, key: PositionKey, _node: &Node, _statement: &Statement) -> Result<()> {
        self.events.push(format!("leaf{}", key));
        Ok(())
    }

    fn on_operator(&mut self, _family: OperationFamily, kind: OperationKind) -> Result<()> {
        self.events.push(format!("op:{}", kind));
        Ok(())
    }

    fn before_expansion(&mut self) {
        self.events.push("(".into());
    }

    fn after_expansion(&mut self) {
        self.events.push(")".into());
    }

    fn enter_substructure(&mut self) {
        self.events.push("<".into());
    }

    fn leave_substructure(&mut self) {
        self.events.push(">".into());
    }
}

fn vector(id: u64) -> Operand {
    Operand::vector(id, ScalarType::Float)
}

fn record(stmt: &Statement, deep: bool, key: PositionKey) -> Vec<String> {
    let mut rec = Recorder::default();
    traverse(stmt, &mut rec, deep, key).unwrap();
    rec.events
}

/// s = inner_prod(x, y)
fn reduction_statement() -> Statement {
    Statement::new(vec![
        Node::binary(OperationKind::Assign, vector(0), Operand::Composite(1)),
        Node::binary(OperationKind::InnerProd, vector(1), vector(2)),
    ])
}

#[test]
fn test_binary_in_order() {
    let stmt = Statement::new(vec![
        Node::binary(OperationKind::Assign, vector(0), Operand::Composite(1)),
        Node::binary(OperationKind::Add, vector(1), vector(2)),
    ]);
    assert_eq!(
        record(&stmt, false, stmt.root_key()),
        vec![
            "(",
            "leaf(0, left)",
            "op:assign",
            "(",
            "leaf(1, left)",
            "op:add",
            "leaf(1, right)",
            ")",
            ")",
        ]
    );
}

#[test]
fn test_unary_prefix() {
    let stmt = Statement::new(vec![
        Node::binary(OperationKind::Assign, vector(0), Operand::Composite(1)),
        Node::unary(OperationKind::Abs, vector(1)),
    ]);
    assert_eq!(
        record(&stmt, false, PositionKey::root(1)),
        vec!["op:abs", "(", "leaf(1, left)", ")"]
    );
}

#[test]
fn test_shallow_reduction_is_opaque() {
    let stmt = reduction_statement();
    assert_eq!(
        record(&stmt, false, stmt.root_key()),
        vec!["(", "leaf(0, left)", "op:assign", "leaf(1, root)", ")"]
    );
}

#[test]
fn test_deep_reduction_descends() {
    let stmt = reduction_statement();
    assert_eq!(
        record(&stmt, true, stmt.root_key()),
        vec![
            "(",
            "leaf(0, left)",
            "op:assign",
            "leaf(1, root)",
            "<",
            "(",
            "leaf(1, left)",
            "op:inner_prod",
            "leaf(1, right)",
            ")",
            ">",
            ")",
        ]
    );
}

#[test]
fn test_access_descends_only_when_deep() {
    // y = x[j + k]
    let stmt = Statement::new(vec![
        Node::binary(OperationKind::Assign, vector(0), Operand::Composite(1)),
        Node::binary(OperationKind::Access, vector(1), Operand::Composite(2)),
        Node::binary(
            OperationKind::Add,
            Operand::host_scalar(2, ScalarType::Int, 0.0),
            Operand::host_scalar(3, ScalarType::Int, 0.0),
        ),
    ]);
    assert_eq!(
        record(&stmt, false, PositionKey::root(1)),
        vec!["leaf(1, root)"]
    );
    assert_eq!(
        record(&stmt, true, PositionKey::root(1)),
        vec![
            "leaf(1, root)",
            "<",
            "(",
            "leaf(2, left)",
            "op:add",
            "leaf(2, right)",
            ")",
            ">",
        ]
    );
}

#[test]
fn test_leaf_key_visits_once() {
    let stmt = reduction_statement();
    assert_eq!(
        record(&stmt, true, PositionKey::new(1, Role::Right)),
        vec!["leaf(1, right)"]
    );
}

#[test]
fn test_out_of_range_start() {
    let stmt = reduction_statement();
    let mut rec = Recorder::default();
    let err = traverse(&stmt, &mut rec, true, PositionKey::root(9)).unwrap_err();
    assert_eq!(err, CodegenError::NodeOutOfRange { index: 9, len: 2 });
}

#[test]
fn test_dangling_child_fails_fast() {
    let stmt = Statement::new(vec![Node::binary(
        OperationKind::Assign,
        vector(0),
        Operand::Composite(3),
    )]);
    let mut rec = Recorder::default();
    let err = traverse(&stmt, &mut rec, false, stmt.root_key()).unwrap_err();
    assert_eq!(err, CodegenError::NodeOutOfRange { index: 3, len: 1 });
}

#[test]
fn test_cycle_is_bounded() {
    let stmt = Statement::new(vec![
        Node::unary(OperationKind::Neg, Operand::Composite(1)),
        Node::unary(OperationKind::Abs, Operand::Composite(0)),
    ]);
    let mut rec = Recorder::default();
    let err = traverse(&stmt, &mut rec, true, stmt.root_key()).unwrap_err();
    assert!(matches!(err, CodegenError::MalformedGraph(_)));
}

#[test]
fn test_missing_right_operand() {
    let mut node = Node::binary(OperationKind::Add, vector(1), vector(2));
    node.rhs = None;
    let stmt = Statement::new(vec![node]);
    let mut rec = Recorder::default();
    let err = traverse(&stmt, &mut rec, false, stmt.root_key()).unwrap_err();
    assert!(matches!(err, CodegenError::MalformedGraph(_)));
}
