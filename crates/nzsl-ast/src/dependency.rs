//! The dependency analyzer (§4.K): for a set of used shader stages, computes the transitive
//! closure of declarations reachable from their entry points.
//!
//! The result is a set of bitsets (one per declaration category) a later dead-code eliminator
//! consumes; the analyzer itself never deletes anything. Walking only resolved trees, it
//! dispatches on the post-resolution expression variants (`VariableValue`, `Constant`,
//! `Function`, `StructType`, `AliasValue`) rather than on the pre-resolution `Identifier`.

use ahash::AHashSet;

use crate::{
    context::TransformerContext,
    enums::ShaderStage,
    expressions::{Expression, ExpressionKind},
    ids::{AliasId, ConstantId, FunctionId, StructId, VariableId},
    module::Module,
    statements::{BranchArm, Statement, StatementKind},
    types::Type,
};

/// The transitive closure of declarations used by a set of entry points (§4.K).
#[derive(Debug, Clone, Default)]
pub struct UsageBitsets {
    pub variables: AHashSet<VariableId>,
    pub constants: AHashSet<ConstantId>,
    pub functions: AHashSet<FunctionId>,
    pub structs: AHashSet<StructId>,
    pub aliases: AHashSet<AliasId>,
}

impl UsageBitsets {
    #[must_use]
    pub fn uses_function(&self, id: FunctionId) -> bool {
        self.functions.contains(&id)
    }
}

/// Maps each function's stable index to its (already-resolved) body statement.
///
/// Built by a single pass over the tree rather than stored on `FunctionData` itself: the
/// original keeps a raw, non-owning "source node pointer" back-reference (§3.6), which Rust's
/// ownership model has no equivalent for without either `Rc<RefCell<_>>`-wrapping every
/// function body or re-deriving the map on demand. Re-deriving is the cheaper, and the only
/// allocation-free, choice here since a `Module` is a sole-ownership tree (§3.8).
fn collect_function_bodies<'module>(module: &'module Module, bodies: &mut std::collections::HashMap<FunctionId, &'module Statement>, resolved_ids: &std::collections::HashMap<String, FunctionId>) {
    fn walk<'m>(stmt: &'m Statement, bodies: &mut std::collections::HashMap<FunctionId, &'m Statement>, resolved_ids: &std::collections::HashMap<String, FunctionId>) {
        match &stmt.kind {
            StatementKind::Multi(statements) => {
                for s in statements {
                    walk(s, bodies, resolved_ids);
                }
            }
            StatementKind::DeclareFunction { name, body, .. } => {
                if let Some(&id) = resolved_ids.get(name) {
                    bodies.insert(id, body);
                }
            }
            _ => {}
        }
    }
    walk(&module.root, bodies, resolved_ids);
    for imported in &module.imported_modules {
        walk(&imported.module.root, bodies, resolved_ids);
    }
}

/// Computes the transitive closure of declarations reached from every entry-point function
/// targeting one of `used_stages`.
#[must_use]
pub fn dependency_check(module: &Module, ctx: &TransformerContext, used_stages: &[ShaderStage]) -> UsageBitsets {
    let mut usage = UsageBitsets::default();

    let name_to_id: std::collections::HashMap<String, FunctionId> =
        ctx.iter_functions().map(|(id, data)| (data.name.clone(), id)).collect();
    let mut bodies = std::collections::HashMap::new();
    collect_function_bodies(module, &mut bodies, &name_to_id);

    let mut worklist: Vec<FunctionId> = ctx
        .iter_functions()
        .filter(|(_, data)| data.attributes.entry_stage.is_some_and(|stage| used_stages.contains(&stage)))
        .map(|(id, _)| id)
        .collect();

    for &id in &worklist {
        usage.functions.insert(id);
    }

    while let Some(func_id) = worklist.pop() {
        let Some(data) = ctx.function(func_id) else { continue };
        mark_type(&data.return_type, ctx, &mut usage, &mut worklist);
        for param in &data.parameters {
            mark_type(&param.r#type, ctx, &mut usage, &mut worklist);
        }
        if let Some(&body) = bodies.get(&func_id) {
            walk_statement(body, ctx, &mut usage, &mut worklist);
        }
    }

    usage
}

/// Walks a statement tree, recording every post-resolution reference it contains. Exposed
/// separately from [`dependency_check`] so a caller already holding a function's body (as the
/// resolver's `FunctionData` does not store the body node itself, only its signature) can feed
/// it in.
pub fn walk_statement(stmt: &Statement, ctx: &TransformerContext, usage: &mut UsageBitsets, worklist: &mut Vec<FunctionId>) {
    match &stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements {
                walk_statement(s, ctx, usage, worklist);
            }
        }
        StatementKind::Branch { arms, else_statement, .. } => {
            for BranchArm { condition, body } in arms {
                walk_expression(condition, ctx, usage, worklist);
                walk_statement(body, ctx, usage, worklist);
            }
            if let Some(else_stmt) = else_statement {
                walk_statement(else_stmt, ctx, usage, worklist);
            }
        }
        StatementKind::Conditional { condition, statement } => {
            walk_expression(condition, ctx, usage, worklist);
            walk_statement(statement, ctx, usage, worklist);
        }
        StatementKind::DeclareAlias { target, .. } => walk_expression(target, ctx, usage, worklist),
        StatementKind::DeclareConst { value, .. } => walk_expression(value, ctx, usage, worklist),
        StatementKind::DeclareFunction { body, .. } => walk_statement(body, ctx, usage, worklist),
        StatementKind::DeclareOption { default_value: Some(value), .. } => walk_expression(value, ctx, usage, worklist),
        StatementKind::DeclareVariable { initial_value: Some(value), r#type, .. } => {
            walk_expression(value, ctx, usage, worklist);
            if let Some(ty) = r#type {
                mark_type(ty, ctx, usage, worklist);
            }
        }
        StatementKind::DeclareVariable { r#type: Some(ty), .. } => mark_type(ty, ctx, usage, worklist),
        StatementKind::Expression(expr) => walk_expression(expr, ctx, usage, worklist),
        StatementKind::For { from, to, step, body, .. } => {
            walk_expression(from, ctx, usage, worklist);
            walk_expression(to, ctx, usage, worklist);
            if let Some(step) = step {
                walk_expression(step, ctx, usage, worklist);
            }
            walk_statement(body, ctx, usage, worklist);
        }
        StatementKind::ForEach { container, body, .. } => {
            walk_expression(container, ctx, usage, worklist);
            walk_statement(body, ctx, usage, worklist);
        }
        StatementKind::Return(Some(expr)) => walk_expression(expr, ctx, usage, worklist),
        StatementKind::Scoped(inner) => walk_statement(inner, ctx, usage, worklist),
        StatementKind::While { condition, body, .. } => {
            walk_expression(condition, ctx, usage, worklist);
            walk_statement(body, ctx, usage, worklist);
        }
        _ => {}
    }
}

fn walk_expression(expr: &Expression, ctx: &TransformerContext, usage: &mut UsageBitsets, worklist: &mut Vec<FunctionId>) {
    match &expr.kind {
        ExpressionKind::VariableValue(id) => {
            usage.variables.insert(*id);
        }
        ExpressionKind::Constant(id) => {
            usage.constants.insert(*id);
        }
        ExpressionKind::Function(id) => mark_function(*id, usage, worklist),
        ExpressionKind::StructType(id) => {
            mark_struct(*id, ctx, usage, worklist);
        }
        ExpressionKind::AliasValue(id) => {
            usage.aliases.insert(*id);
        }
        ExpressionKind::CallFunction { target, params } => {
            walk_expression(target, ctx, usage, worklist);
            for p in params {
                walk_expression(p, ctx, usage, worklist);
            }
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            walk_expression(object, ctx, usage, worklist);
            for p in params {
                walk_expression(p, ctx, usage, worklist);
            }
        }
        ExpressionKind::Assign { lhs, rhs, .. } | ExpressionKind::Binary { lhs, rhs, .. } => {
            walk_expression(lhs, ctx, usage, worklist);
            walk_expression(rhs, ctx, usage, worklist);
        }
        ExpressionKind::Unary { expr, .. }
        | ExpressionKind::Swizzle { expr, .. }
        | ExpressionKind::AccessField { expr, .. }
        | ExpressionKind::AccessIdentifier { expr, .. } => walk_expression(expr, ctx, usage, worklist),
        ExpressionKind::AccessIndex { expr, indices } => {
            walk_expression(expr, ctx, usage, worklist);
            for i in indices {
                walk_expression(i, ctx, usage, worklist);
            }
        }
        ExpressionKind::Cast { target_type, exprs } => {
            mark_type(target_type, ctx, usage, worklist);
            for e in exprs {
                walk_expression(e, ctx, usage, worklist);
            }
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            walk_expression(condition, ctx, usage, worklist);
            walk_expression(true_path, ctx, usage, worklist);
            walk_expression(false_path, ctx, usage, worklist);
        }
        ExpressionKind::Intrinsic { params, .. } => {
            for p in params {
                walk_expression(p, ctx, usage, worklist);
            }
        }
        ExpressionKind::TypeConstant(ty) => mark_type(ty, ctx, usage, worklist),
        _ => {}
    }
}

fn mark_function(id: FunctionId, usage: &mut UsageBitsets, worklist: &mut Vec<FunctionId>) {
    if usage.functions.insert(id) {
        worklist.push(id);
    }
}

fn mark_struct(id: StructId, ctx: &TransformerContext, usage: &mut UsageBitsets, worklist: &mut Vec<FunctionId>) {
    if !usage.structs.insert(id) {
        return;
    }
    if let Some(data) = ctx.struct_data(id) {
        for field in &data.description.fields {
            mark_type(&field.r#type, ctx, usage, worklist);
        }
    }
}

fn mark_type(ty: &Type, ctx: &TransformerContext, usage: &mut UsageBitsets, worklist: &mut Vec<FunctionId>) {
    match ty {
        Type::Struct(r) | Type::Uniform(r) | Type::PushConstant(r) => mark_struct(r.struct_id, ctx, usage, worklist),
        Type::Storage { structure, .. } => mark_struct(structure.struct_id, ctx, usage, worklist),
        Type::Array { inner, .. } | Type::DynArray { inner } => mark_type(inner, ctx, usage, worklist),
        Type::Alias { target, .. } => mark_type(target, ctx, usage, worklist),
        Type::Function(id) => mark_function(*id, usage, worklist),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{ContextOptions, FunctionData, FunctionFlags},
        statements::FunctionAttributes,
    };

    #[test]
    fn unreferenced_function_is_not_marked_used() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let used = ctx.register_function(FunctionData {
            name: "main".into(),
            parameters: vec![],
            return_type: Type::NoType,
            attributes: FunctionAttributes { entry_stage: Some(ShaderStage::Frag), ..Default::default() },
            flags: FunctionFlags::default(),
        });
        let unused = ctx.register_function(FunctionData {
            name: "helper".into(),
            parameters: vec![],
            return_type: Type::NoType,
            attributes: FunctionAttributes::default(),
            flags: FunctionFlags::default(),
        });
        let module = Module::new(crate::module::ModuleMetadata::default());
        let usage = dependency_check(&module, &ctx, &[ShaderStage::Frag]);
        assert!(usage.uses_function(used));
        assert!(!usage.uses_function(unused));
    }
}
