//! Kernel assembly: wraps an emitted expression into a complete OpenCL
//! `__kernel` function.
//!
//! Two shapes are produced:
//! - element-wise: a grid-stride loop whose body is the whole statement,
//!   with pointer operands loaded into private copies once per iteration;
//! - inner product: per-work-item accumulation, a `__local` tree reduction,
//!   and one store per work group through the statement's assignment.

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use serde::Serialize;

use crate::config::CodegenOptions;
use crate::emit::emit;
use crate::error::{CodegenError, Result};
use crate::mapped::{MappedReduction, MappingTable, RenderContext};
use crate::prototype::{Prototype, PrototypeBuilder};
use crate::registry::KernelArgument;
use crate::statement::{OperationKind, Operand, PositionKey, Role, Statement, StorageId};
use crate::stream::KernelStream;

const ACCUMULATOR: &str = "acc";
const LOCAL_BUFFER: &str = "buf";

/// A generated kernel and the arguments it expects, in slot order.
///
/// The launcher binds `arguments` first, then the element count.
#[derive(Clone, Debug, Serialize)]
pub struct KernelSource {
    pub name: String,
    pub arguments: Vec<KernelArgument>,
    /// Innermost expression: the loop body for element-wise kernels, the
    /// accumulated term for reductions.
    pub body: String,
    pub source: String,
}

/// Compile `statement` into a complete kernel.
pub fn generate_kernel(statement: &Statement, options: &CodegenOptions) -> Result<KernelSource> {
    statement.validate()?;
    let mut builder = PrototypeBuilder::new(statement).address_space(options.address_space);
    if let Some(storage) = written_storage(statement)? {
        builder = builder.writes(storage);
    }
    let prototype = builder.build(statement.root_key())?;

    if let Some(target) = assignment_target(statement)? {
        let is_buffer = prototype
            .mapping
            .get(target)
            .ok()
            .and_then(|operand| operand.handle_name())
            .is_some();
        if !is_buffer {
            return Err(CodegenError::UnsupportedOperand(format!(
                "assignment target at {} is not a device buffer",
                target
            )));
        }
    }

    let reductions: Vec<MappedReduction> = prototype
        .mapping
        .iter()
        .filter_map(|(_, operand)| operand.as_reduction().cloned())
        .collect();

    let arguments = prototype.arguments.clone();
    let (body, source) = match reductions.as_slice() {
        [] => elementwise_kernel(statement, prototype, options)?,
        [reduction] if reduction.kind == OperationKind::InnerProd => {
            let reduction = reduction.clone();
            inner_product_kernel(statement, prototype, &reduction, options)?
        }
        [reduction] => {
            return Err(CodegenError::UnsupportedOperand(format!(
                "no kernel template for a {} reduction",
                reduction.kind
            )));
        }
        _ => {
            return Err(CodegenError::UnsupportedOperand(
                "more than one reduction in a single kernel".to_string(),
            ));
        }
    };

    log::debug!(
        "generated kernel '{}' ({} arguments, {} lines)",
        options.kernel_name,
        arguments.len(),
        source.lines().count()
    );
    Ok(KernelSource {
        name: options.kernel_name.clone(),
        arguments,
        body,
        source,
    })
}

/// `__kernel void name(` one parameter per line, then the element count.
fn signature(out: &mut KernelStream, arguments: &[KernelArgument], options: &CodegenOptions) {
    out.line(format!("__kernel void {}(", options.kernel_name));
    out.inc_tab();
    for argument in arguments {
        out.line(argument.declaration());
    }
    out.line(format!("unsigned int {})", options.size_argument));
    out.dec_tab();
}

fn grid_stride_loop(out: &mut KernelStream, options: &CodegenOptions) {
    let i = &options.index_variable;
    out.line(format!(
        "for(unsigned int {i} = get_global_id(0) ; {i} < {n} ; {i} += get_global_size(0))",
        i = i,
        n = options.size_argument
    ));
}

/// Key of the assigned operand when the root is an assignment.
fn assignment_target(statement: &Statement) -> Result<Option<PositionKey>> {
    let root = statement.root_key();
    let node = statement.node(root.node)?;
    if !node.kind.is_assignment() {
        return Ok(None);
    }
    Ok(Some(PositionKey::for_operand(&node.lhs, root.node, Role::Left)))
}

/// Storage the root assignment stores into, directly or through an
/// element access.
fn written_storage(statement: &Statement) -> Result<Option<StorageId>> {
    let node = statement.node(statement.root_key().node)?;
    if !node.kind.is_assignment() {
        return Ok(None);
    }
    let leaf = match &node.lhs {
        Operand::Leaf(leaf) => leaf,
        Operand::Composite(child) => {
            let access = statement.node(*child)?;
            match (&access.kind, &access.lhs) {
                (OperationKind::Access, Operand::Leaf(leaf)) => leaf,
                _ => return Ok(None),
            }
        }
    };
    Ok(Some(leaf.storage()))
}

/// Pointer-backed positions to load into private copies.
///
/// Access bases are skipped: each carries its own index expression. A plain
/// `=` target is skipped unless its buffer is also read.
fn fetch_keys(statement: &Statement, mapping: &MappingTable) -> Result<Vec<PositionKey>> {
    let root = statement.node(statement.root_key().node)?;
    let write_only = match assignment_target(statement)? {
        Some(target) if root.kind == OperationKind::Assign => {
            let name = mapping.get(target)?.handle_name().map(str::to_string);
            let shared = mapping.iter().any(|(key, operand)| {
                *key != mapping.resolve(target)
                    && name.is_some()
                    && operand.handle_name() == name.as_deref()
            });
            (!shared).then(|| mapping.resolve(target))
        }
        _ => None,
    };

    Ok(mapping
        .iter()
        .filter(|(key, operand)| {
            operand.handle_name().is_some()
                && operand.as_vector().map_or(true, |v| v.access.is_none())
                && Some(**key) != write_only
        })
        .map(|(key, _)| *key)
        .collect())
}

fn elementwise_kernel(
    statement: &Statement,
    prototype: Prototype,
    options: &CodegenOptions,
) -> Result<(String, String)> {
    let index = options.index_variable.as_str();
    let Prototype {
        arguments,
        mut mapping,
    } = prototype;

    let mut out = KernelStream::new();
    signature(&mut out, &arguments, options);
    out.open_block();
    grid_stride_loop(&mut out, options);
    out.open_block();

    let mut fetched = HashSet::new();
    for key in fetch_keys(statement, &mapping)? {
        mapping.fetch(key, index, statement, &mut fetched, &mut out)?;
    }
    let body = emit(index, statement, &mapping, statement.root_key())?;
    out.line(format!("{};", body));
    if let Some(target) = assignment_target(statement)? {
        mapping.write_back(target, index, statement, &mut fetched, &mut out)?;
    }

    out.close_block();
    out.close_block();
    Ok((body, out.into_string()))
}

fn inner_product_kernel(
    statement: &Statement,
    prototype: Prototype,
    reduction: &MappedReduction,
    options: &CodegenOptions,
) -> Result<(String, String)> {
    let root = statement.root_key();
    let root_node = statement.node(root.node)?;
    let is_whole_rhs = root_node.kind.is_assignment()
        && root_node.rhs == Some(Operand::Composite(reduction.key.node));
    if !is_whole_rhs {
        return Err(CodegenError::UnsupportedOperand(format!(
            "reduction at {} must be the whole right-hand side of the assignment",
            reduction.key
        )));
    }

    let index = options.index_variable.as_str();
    let Prototype {
        arguments,
        mut mapping,
    } = prototype;
    let scalar_type = mapping.get(reduction.key)?.scalar_type;
    let local_id = "get_local_id(0)";

    let (lhs, rhs) = {
        let ctx = RenderContext {
            statement,
            mapping: &mapping,
        };
        (
            reduction.lhs.render(index, &ctx)?,
            reduction.rhs.render(index, &ctx)?,
        )
    };

    let mut out = KernelStream::new();
    signature(&mut out, &arguments, options);
    out.open_block();
    out.line(format!(
        "__local {} {}[{}];",
        scalar_type, LOCAL_BUFFER, options.local_size
    ));
    out.line(format!(
        "{} {} = {};",
        scalar_type,
        ACCUMULATOR,
        scalar_type.literal(0.0)?
    ));
    grid_stride_loop(&mut out, options);
    out.open_block();
    let term = format!("{} * {}", lhs, rhs);
    out.line(format!("{} += {};", ACCUMULATOR, term));
    out.close_block();
    out.line(format!("{}[{}] = {};", LOCAL_BUFFER, local_id, ACCUMULATOR));
    out.line("for(unsigned int stride = get_local_size(0)/2 ; stride > 0 ; stride /= 2)");
    out.open_block();
    out.line("barrier(CLK_LOCAL_MEM_FENCE);");
    out.line(format!("if({} < stride)", local_id));
    out.inc_tab();
    out.line(format!(
        "{buf}[{id}] += {buf}[{id} + stride];",
        buf = LOCAL_BUFFER,
        id = local_id
    ));
    out.dec_tab();
    out.close_block();

    mapping.set_access_name(reduction.key, Some(format!("{}[0]", LOCAL_BUFFER)))?;
    let store = emit("get_group_id(0)", statement, &mapping, root)?;
    out.line(format!("if({} == 0)", local_id));
    out.inc_tab();
    out.line(format!("{};", store));
    out.dec_tab();
    out.close_block();
    Ok((term, out.into_string()))
}
