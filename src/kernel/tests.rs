use super::*;
use crate::registry::AddressSpace;
use crate::statement::{Layout, Leaf, Node, ScalarType, StorageId, SymbolicVectorDesc};

const F: ScalarType = ScalarType::Float;

fn vector(id: u64) -> Operand {
    Operand::vector(id, F)
}

fn assign(lhs: Operand, rhs: Operand) -> Node {
    Node::binary(OperationKind::Assign, lhs, rhs)
}

fn generate(stmt: &Statement) -> KernelSource {
    generate_kernel(stmt, &CodegenOptions::default()).unwrap()
}

#[test]
fn test_elementwise_kernel() {
    // y = x + 2.0
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(OperationKind::Add, vector(2), Operand::host_scalar(3, F, 2.0)),
    ]);
    let kernel = generate(&stmt);
    assert_eq!(kernel.name, "kernel_0");
    assert_eq!(kernel.arguments.len(), 3);
    assert_eq!(kernel.body, "arg0[i] = ( arg1_private + arg2 )");
    insta::assert_snapshot!(kernel.source, @r"
__kernel void kernel_0(
    __global float* arg0,
    __global float* arg1,
    float arg2,
    unsigned int N)
{
    for(unsigned int i = get_global_id(0) ; i < N ; i += get_global_size(0))
    {
        float arg1_private = arg1[i];
        arg0[i] = ( arg1_private + arg2 );
    }
}
");
}

#[test]
fn test_target_also_read_is_fetched_and_stored() {
    // x = x + a
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(OperationKind::Add, vector(1), Operand::host_scalar(2, F, 1.0)),
    ]);
    let source = generate(&stmt).source;
    let body: Vec<&str> = source.lines().map(str::trim).collect();
    assert!(body.contains(&"float arg0_private = arg0[i];"));
    assert!(body.contains(&"arg0_private = ( arg0_private + arg1 );"));
    assert!(body.contains(&"arg0[i] = arg0_private;"));
    assert_eq!(source.matches("arg0_private = arg0[i]").count(), 1);
}

#[test]
fn test_inplace_update_round_trips_target() {
    // y += x
    let stmt = Statement::new(vec![Node::binary(
        OperationKind::InplaceAdd,
        vector(1),
        vector(2),
    )]);
    let source = generate(&stmt).source;
    let body: Vec<&str> = source.lines().map(str::trim).collect();
    assert!(body.contains(&"float arg0_private = arg0[i];"));
    assert!(body.contains(&"float arg1_private = arg1[i];"));
    assert!(body.contains(&"arg0_private += arg1_private;"));
    assert!(body.contains(&"arg0[i] = arg0_private;"));
}

#[test]
fn test_access_base_is_not_fetched() {
    // y = x[j]
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(
            OperationKind::Access,
            vector(2),
            Operand::host_scalar(3, ScalarType::Uint, 0.0),
        ),
    ]);
    let source = generate(&stmt).source;
    assert!(source.contains("arg0[i] = arg1[arg2];"));
    assert!(!source.contains("arg1_private"));
    assert!(source.contains("    unsigned int arg2,\n"));
}

#[test]
fn test_matrix_elementwise() {
    let stmt = Statement::new(vec![
        assign(Operand::matrix(1, F, Layout::RowMajor), Operand::Composite(1)),
        Node::unary(OperationKind::Sqrt, Operand::matrix(2, F, Layout::RowMajor)),
    ]);
    let source = generate(&stmt).source;
    assert!(source.contains("float arg1_private = arg1[i];"));
    assert!(source.contains("arg0[i] = sqrt( arg1_private );"));
}

#[test]
fn test_options_shape_the_kernel() {
    let stmt = Statement::new(vec![assign(vector(1), vector(2))]);
    let options = CodegenOptions {
        kernel_name: "copy".into(),
        index_variable: "gid".into(),
        size_argument: "size".into(),
        address_space: AddressSpace::Constant,
        local_size: 64,
    };
    let kernel = generate_kernel(&stmt, &options).unwrap();
    assert_eq!(kernel.name, "copy");
    assert!(kernel.source.starts_with("__kernel void copy(\n"));
    assert!(kernel.source.contains("    __global float* arg0,\n"));
    assert!(kernel.source.contains("    __constant float* arg1,\n"));
    assert!(kernel.source.contains("    unsigned int size)\n"));
    assert!(kernel
        .source
        .contains("for(unsigned int gid = get_global_id(0) ; gid < size ; gid += get_global_size(0))"));
    assert!(kernel.source.contains("arg0[gid] = arg1_private;"));
}

#[test]
fn test_inner_product_kernel() {
    // partial = inner_prod(x, y)
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(OperationKind::InnerProd, vector(2), vector(3)),
    ]);
    let kernel = generate(&stmt);
    assert_eq!(kernel.body, "arg1[i] * arg2[i]");
    insta::assert_snapshot!(kernel.source, @r"
__kernel void kernel_0(
    __global float* arg0,
    __global float* arg1,
    __global float* arg2,
    unsigned int N)
{
    __local float buf[128];
    float acc = 0.0f;
    for(unsigned int i = get_global_id(0) ; i < N ; i += get_global_size(0))
    {
        acc += arg1[i] * arg2[i];
    }
    buf[get_local_id(0)] = acc;
    for(unsigned int stride = get_local_size(0)/2 ; stride > 0 ; stride /= 2)
    {
        barrier(CLK_LOCAL_MEM_FENCE);
        if(get_local_id(0) < stride)
            buf[get_local_id(0)] += buf[get_local_id(0) + stride];
    }
    if(get_local_id(0) == 0)
        arg0[get_group_id(0)] = buf[0];
}
");
}

#[test]
fn test_inner_product_of_expressions() {
    // partial = inner_prod(x + z, abs(y)) in double precision
    let d = ScalarType::Double;
    let stmt = Statement::new(vec![
        assign(Operand::vector(1, d), Operand::Composite(1)),
        Node::binary(OperationKind::InnerProd, Operand::Composite(2), Operand::Composite(3)),
        Node::binary(OperationKind::Add, Operand::vector(2, d), Operand::vector(4, d)),
        Node::unary(OperationKind::Abs, Operand::vector(3, d)),
    ]);
    let source = generate(&stmt).source;
    assert!(source.contains("__local double buf[128];"));
    assert!(source.contains("double acc = 0.0;"));
    assert!(source.contains("acc += ( arg1[i] + arg2[i] ) * abs( arg3[i] );"));
}

#[test]
fn test_matrix_product_kernel_is_unsupported() {
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(
            OperationKind::Prod,
            Operand::matrix(2, F, Layout::RowMajor),
            vector(3),
        ),
    ]);
    let err = generate_kernel(&stmt, &CodegenOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::UnsupportedOperand(_)), "{err}");
}

#[test]
fn test_reduction_inside_expression_is_unsupported() {
    // s = inner_prod(x, y) + c
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(OperationKind::Add, Operand::Composite(2), Operand::host_scalar(4, F, 1.0)),
        Node::binary(OperationKind::InnerProd, vector(2), vector(3)),
    ]);
    assert!(generate_kernel(&stmt, &CodegenOptions::default()).is_err());
}

#[test]
fn test_two_reductions_are_unsupported() {
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(OperationKind::Add, Operand::Composite(2), Operand::Composite(3)),
        Node::binary(OperationKind::InnerProd, vector(2), vector(3)),
        Node::binary(OperationKind::InnerProd, vector(4), vector(5)),
    ]);
    assert!(matches!(
        generate_kernel(&stmt, &CodegenOptions::default()),
        Err(CodegenError::UnsupportedOperand(_))
    ));
}

#[test]
fn test_malformed_statement_generates_nothing() {
    let stmt = Statement::new(vec![assign(vector(1), Operand::Composite(2))]);
    assert_eq!(
        generate_kernel(&stmt, &CodegenOptions::default()).unwrap_err(),
        CodegenError::NodeOutOfRange { index: 2, len: 1 }
    );
}

#[test]
fn test_constant_space_spares_the_target_when_it_is_also_read() {
    // y = y * x
    let stmt = Statement::new(vec![
        assign(vector(1), Operand::Composite(1)),
        Node::binary(OperationKind::ElementProd, vector(1), vector(2)),
    ]);
    let options = CodegenOptions {
        address_space: AddressSpace::Constant,
        ..CodegenOptions::default()
    };
    let kernel = generate_kernel(&stmt, &options).unwrap();
    assert_eq!(
        kernel.arguments[0].kind,
        crate::registry::ArgumentKind::Pointer(AddressSpace::Global)
    );
    assert!(kernel.source.contains("    __global float* arg0,\n"));
    assert!(kernel.source.contains("    __constant float* arg1,\n"));
    assert!(kernel.source.contains("arg0[i] = arg0_private;"));
}

#[test]
fn test_access_target_stays_global() {
    // y[j] = x
    let stmt = Statement::new(vec![
        assign(Operand::Composite(1), vector(2)),
        Node::binary(
            OperationKind::Access,
            vector(1),
            Operand::host_scalar(3, ScalarType::Uint, 0.0),
        ),
    ]);
    let options = CodegenOptions {
        address_space: AddressSpace::Constant,
        ..CodegenOptions::default()
    };
    let source = generate_kernel(&stmt, &options).unwrap().source;
    assert!(source.contains("    __global float* arg0,\n"));
    assert!(source.contains("    __constant float* arg1,\n"));
    assert!(source.contains("arg0[arg2] = arg1_private;"));
}

#[test]
fn test_symbolic_target_is_unsupported() {
    let ones = Operand::Leaf(Leaf::SymbolicVector(SymbolicVectorDesc {
        id: StorageId(1),
        dtype: F,
        value: 1.0,
        is_value_static: true,
        index: None,
    }));
    let stmt = Statement::new(vec![assign(ones, vector(2))]);
    let err = generate_kernel(&stmt, &CodegenOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::UnsupportedOperand(_)), "{err}");
}

#[test]
fn test_host_scalar_target_is_unsupported() {
    let stmt = Statement::new(vec![assign(Operand::host_scalar(1, F, 0.0), vector(2))]);
    let err = generate_kernel(&stmt, &CodegenOptions::default()).unwrap_err();
    assert!(matches!(err, CodegenError::UnsupportedOperand(_)), "{err}");
}
