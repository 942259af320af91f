//! Generic stable-index rewriting over an already-resolved subtree.
//!
//! A handful of lowering passes need to duplicate or relocate a piece of a resolved tree while
//! keeping every cross-reference inside it internally consistent under a fresh set of indices
//! (the loop unroller duplicating a loop body is the main customer, §4.I). Rather than have each
//! of those passes hand-roll the same tree walk, they all go through [`remap_indices`] with a
//! callback describing the old-to-new mapping for whichever categories it cares about.

use nzsl_ast::{
    errors::NzslResult,
    expressions::{Expression, ExpressionKind},
    ids::{AliasId, ConstantId, ExternalBlockId, FunctionId, ModuleId, StructId, VariableId},
    statements::{Statement, StatementKind},
};

/// Which stable-index table a reference belongs to, mirroring `crate::ids`'s newtypes minus
/// `TypeId`/`IntrinsicId` (neither ever appears as a bare cross-reference inside an expression
/// or statement body — types are resolved in place, and intrinsics are addressed by
/// `IntrinsicKind`, not by table index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexCategory {
    Alias,
    Constant,
    ExternalBlock,
    Function,
    Module,
    Struct,
    Variable,
}

/// Rewrites every stable-index reference within `stmt` per `remap(category, old_index)`.
///
/// `remap` is expected to be the identity for indices it doesn't recognize (returning the input
/// unchanged), so a caller that only wants to rename variables can ignore every other category.
/// Declarations themselves (`DeclareVariable`'s own `var_id`, once the caller has re-registered
/// it under a fresh id) are remapped the same way as read references, so a single pass over the
/// duplicate handles both.
pub fn remap_indices(stmt: &mut Statement, remap: &mut dyn FnMut(IndexCategory, u64) -> u64) -> NzslResult<()> {
    remap_statement(stmt, remap);
    Ok(())
}

fn remap_statement(stmt: &mut Statement, remap: &mut dyn FnMut(IndexCategory, u64) -> u64) {
    match &mut stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements {
                remap_statement(s, remap);
            }
        }
        StatementKind::Branch { arms, else_statement, .. } => {
            for arm in arms {
                remap_expression(&mut arm.condition, remap);
                remap_statement(&mut arm.body, remap);
            }
            if let Some(e) = else_statement {
                remap_statement(e, remap);
            }
        }
        StatementKind::Conditional { condition, statement } => {
            remap_expression(condition, remap);
            remap_statement(statement, remap);
        }
        StatementKind::DeclareAlias { target, .. } => remap_expression(target, remap),
        StatementKind::DeclareConst { value, .. } => remap_expression(value, remap),
        StatementKind::DeclareExternal { .. } | StatementKind::DeclareStruct { .. } => {}
        StatementKind::DeclareFunction { body, .. } => remap_statement(body, remap),
        StatementKind::DeclareOption { default_value: Some(value), .. } => remap_expression(value, remap),
        StatementKind::DeclareOption { default_value: None, .. } => {}
        StatementKind::DeclareVariable { initial_value, var_id, .. } => {
            if let Some(id) = var_id {
                *id = VariableId::new(remap(IndexCategory::Variable, id.index()));
            }
            if let Some(value) = initial_value {
                remap_expression(value, remap);
            }
        }
        StatementKind::Expression(expr) => remap_expression(expr, remap),
        StatementKind::For { from, to, step, body, var_id, .. } => {
            if let Some(id) = var_id {
                *id = VariableId::new(remap(IndexCategory::Variable, id.index()));
            }
            remap_expression(from, remap);
            remap_expression(to, remap);
            if let Some(step) = step {
                remap_expression(step, remap);
            }
            remap_statement(body, remap);
        }
        StatementKind::ForEach { container, body, var_id, .. } => {
            if let Some(id) = var_id {
                *id = VariableId::new(remap(IndexCategory::Variable, id.index()));
            }
            remap_expression(container, remap);
            remap_statement(body, remap);
        }
        StatementKind::Return(Some(expr)) => remap_expression(expr, remap),
        StatementKind::Return(None) => {}
        StatementKind::Scoped(inner) => remap_statement(inner, remap),
        StatementKind::While { condition, body, .. } => {
            remap_expression(condition, remap);
            remap_statement(body, remap);
        }
        StatementKind::Import { .. } | StatementKind::Break | StatementKind::Continue | StatementKind::Discard | StatementKind::NoOp => {}
    }
}

fn remap_expression(expr: &mut Expression, remap: &mut dyn FnMut(IndexCategory, u64) -> u64) {
    match &mut expr.kind {
        ExpressionKind::AccessField { expr, .. } | ExpressionKind::AccessIdentifier { expr, .. } | ExpressionKind::Swizzle { expr, .. } | ExpressionKind::Unary { expr, .. } => {
            remap_expression(expr, remap);
        }
        ExpressionKind::AccessIndex { expr, indices } => {
            remap_expression(expr, remap);
            for i in indices {
                remap_expression(i, remap);
            }
        }
        ExpressionKind::Assign { lhs, rhs, .. } | ExpressionKind::Binary { lhs, rhs, .. } => {
            remap_expression(lhs, remap);
            remap_expression(rhs, remap);
        }
        ExpressionKind::CallFunction { target, params } => {
            remap_expression(target, remap);
            for p in params {
                remap_expression(p, remap);
            }
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            remap_expression(object, remap);
            for p in params {
                remap_expression(p, remap);
            }
        }
        ExpressionKind::Cast { exprs, .. } | ExpressionKind::Intrinsic { params: exprs, .. } => {
            for e in exprs {
                remap_expression(e, remap);
            }
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            remap_expression(condition, remap);
            remap_expression(true_path, remap);
            remap_expression(false_path, remap);
        }
        ExpressionKind::AliasValue(id) => *id = AliasId::new(remap(IndexCategory::Alias, id.index())),
        ExpressionKind::Constant(id) => *id = ConstantId::new(remap(IndexCategory::Constant, id.index())),
        ExpressionKind::Function(id) => *id = FunctionId::new(remap(IndexCategory::Function, id.index())),
        ExpressionKind::Module(id) => *id = ModuleId::new(remap(IndexCategory::Module, id.index())),
        ExpressionKind::NamedExternalBlock(id) => *id = ExternalBlockId::new(remap(IndexCategory::ExternalBlock, id.index())),
        ExpressionKind::StructType(id) => *id = StructId::new(remap(IndexCategory::Struct, id.index())),
        ExpressionKind::VariableValue(id) => *id = VariableId::new(remap(IndexCategory::Variable, id.index())),
        ExpressionKind::ConstantArrayValue(_)
        | ExpressionKind::ConstantValue(_)
        | ExpressionKind::Identifier(_)
        | ExpressionKind::IntrinsicFunction(_)
        | ExpressionKind::TypeConstant(_) => {}
    }
}
