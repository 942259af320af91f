//! Loop unrolling for `[unroll(always)]` loops (§4.I).
//!
//! Runs before [`crate::loop_lowering`]: a `For`/`ForEach` still carries its own iteration
//! bounds directly, which is a far easier trip count to compute than reverse-engineering one out
//! of an already-lowered `While` condition. Each duplicate of the loop body gets a fresh variable
//! registered per declaration it contains (via [`crate::index_remapper`]) so unrolled iterations
//! never alias each other's locals.

use nzsl_ast::{
    constants::ConstantSingleValue,
    context::{TransformerContext, VariableData},
    errors::{CompilerErrorKind, NzslError, NzslResult},
    expressions::{Expression, ExpressionKind},
    ids::VariableId,
    location::SourceLocation,
    module::Module,
    statements::{Statement, StatementKind},
    transformer::{Transformer, TransformerState, VisitAction},
    types::{PrimitiveType, Type},
};

use crate::index_remapper::{remap_indices, IndexCategory};

/// Duplicates every `[unroll(always)]` `For`/`ForEach` loop's body once per iteration.
pub fn unroll_loops(module: &mut Module, ctx: &mut TransformerContext) -> NzslResult<()> {
    LoopUnroller.transform(ctx, module)
}

struct LoopUnroller;

impl Transformer for LoopUnroller {
    fn visit_statement(&mut self, ctx: &mut TransformerContext, state: &mut TransformerState, stmt: &Statement) -> NzslResult<VisitAction<Statement>> {
        match &stmt.kind {
            StatementKind::For { unroll: Some(nzsl_ast::enums::LoopUnroll::Always), .. } => Ok(VisitAction::Replace(Box::new(unroll_for(stmt, ctx)?))),
            StatementKind::ForEach { unroll: Some(nzsl_ast::enums::LoopUnroll::Always), .. } => Ok(VisitAction::Replace(Box::new(unroll_foreach(stmt, ctx, state)?))),
            StatementKind::While { unroll: Some(nzsl_ast::enums::LoopUnroll::Always), .. } => Err(NzslError::compiler(
                CompilerErrorKind::WhileUnrollNotSupported,
                stmt.location.clone(),
                "a 'while' loop's trip count cannot be determined statically; only 'for'/'for-each' support [unroll(always)]",
            )),
            _ => Ok(VisitAction::VisitChildren),
        }
    }
}

fn require_constant_i64(expr: &Expression) -> NzslResult<i64> {
    match &expr.kind {
        ExpressionKind::ConstantValue(ConstantSingleValue::I32(v)) => Ok(i64::from(*v)),
        ExpressionKind::ConstantValue(ConstantSingleValue::U32(v)) => Ok(i64::from(*v)),
        ExpressionKind::ConstantValue(ConstantSingleValue::IntLiteral(v)) => Ok(*v),
        _ => Err(NzslError::compiler(
            CompilerErrorKind::ConstantExpressionRequired,
            expr.location.clone(),
            "an unrolled loop's bounds must be compile-time constants",
        )),
    }
}

fn const_expr_for(primitive: PrimitiveType, value: i64, location: SourceLocation) -> Expression {
    let (kind, ty) = match primitive {
        PrimitiveType::U32 => (ConstantSingleValue::U32(value as u32), Type::Primitive(PrimitiveType::U32)),
        PrimitiveType::IntLiteral => (ConstantSingleValue::IntLiteral(value), Type::Primitive(PrimitiveType::IntLiteral)),
        _ => (ConstantSingleValue::I32(value as i32), Type::Primitive(PrimitiveType::I32)),
    };
    Expression::with_type(location, ExpressionKind::ConstantValue(kind), ty)
}

/// Duplicates `body` under a fresh variable registration for every old id it references, seeded
/// with `seed` (typically the loop's own counter, whose replacement already carries a specific
/// initial value rather than a verbatim clone of context data).
fn duplicate_body(body: &Statement, ctx: &mut TransformerContext, seed: &[(VariableId, VariableId)]) -> NzslResult<Statement> {
    let mut cloned = body.clone();
    let mut local: ahash::AHashMap<u64, u64> = seed.iter().map(|(old, new)| (old.index(), new.index())).collect();
    remap_indices(&mut cloned, &mut |category, old| {
        if category != IndexCategory::Variable {
            return old;
        }
        if let Some(existing) = local.get(&old) {
            return *existing;
        }
        let data = ctx
            .variable(VariableId::new(old))
            .cloned()
            .unwrap_or(VariableData { name: "_nzsl_unrolled".to_owned(), r#type: Type::NoType, is_const: false });
        let fresh = ctx.register_variable(data).index();
        local.insert(old, fresh);
        fresh
    })?;
    Ok(cloned)
}

fn unroll_for(stmt: &Statement, ctx: &mut TransformerContext) -> NzslResult<Statement> {
    let StatementKind::For { var_name, from, to, step, body, var_id, .. } = &stmt.kind else {
        unreachable!("visit_statement only routes For nodes here")
    };
    let location = stmt.location.clone();
    let counter_id = var_id.ok_or_else(|| NzslError::ast(nzsl_ast::errors::AstErrorKind::Internal, location.clone(), "unresolved for-loop counter"))?;
    let counter_type = ctx.variable(counter_id).map(|v| v.r#type.clone()).unwrap_or(Type::Primitive(PrimitiveType::I32));
    let primitive = counter_type.as_primitive().unwrap_or(PrimitiveType::I32);

    let from_v = require_constant_i64(from)?;
    let to_v = require_constant_i64(to)?;
    let step_v = step.as_ref().map_or(Ok(1), |s| require_constant_i64(s))?;
    if step_v == 0 {
        return Err(NzslError::compiler(CompilerErrorKind::ConstantExpressionRequired, location.clone(), "an unrolled for-loop's step cannot be zero"));
    }

    let mut values = Vec::new();
    let mut cursor = from_v;
    while (step_v > 0 && cursor < to_v) || (step_v < 0 && cursor > to_v) {
        values.push(cursor);
        cursor += step_v;
    }

    let mut unrolled = Vec::with_capacity(values.len());
    for value in values {
        let new_id = ctx.register_variable(VariableData { name: var_name.clone(), r#type: counter_type.clone(), is_const: false });
        let decl = Statement::new(
            location.clone(),
            StatementKind::DeclareVariable {
                name: var_name.clone(),
                r#type: Some(counter_type.clone()),
                initial_value: Some(const_expr_for(primitive, value, location.clone())),
                var_id: Some(new_id),
            },
        );
        let duplicate = duplicate_body(body, ctx, &[(counter_id, new_id)])?;
        unrolled.push(Statement::new(location.clone(), StatementKind::Scoped(Box::new(Statement::new(location.clone(), StatementKind::Multi(vec![decl, duplicate]))))));
    }
    Ok(Statement::new(location.clone(), StatementKind::Scoped(Box::new(Statement::new(location, StatementKind::Multi(unrolled))))))
}

fn unroll_foreach(stmt: &Statement, ctx: &mut TransformerContext, state: &mut TransformerState) -> NzslResult<Statement> {
    let StatementKind::ForEach { var_name, container, body, var_id, .. } = &stmt.kind else {
        unreachable!("visit_statement only routes ForEach nodes here")
    };
    let location = stmt.location.clone();
    let counter_id = var_id.ok_or_else(|| NzslError::ast(nzsl_ast::errors::AstErrorKind::Internal, location.clone(), "unresolved for-each element variable"))?;
    let element_type = ctx.variable(counter_id).map(|v| v.r#type.clone()).unwrap_or(Type::NoType);
    let Some(Type::Array { length, .. }) = container.cached_type.as_ref().map(Type::resolve_alias).cloned() else {
        return Err(NzslError::compiler(
            CompilerErrorKind::ArrayLengthRequired,
            location.clone(),
            "unrolling a 'for-each' loop requires a fixed-length array, not a 'dyn_array'",
        ));
    };

    let container_temp = state.cache_expression(ctx, container.clone(), "unroll_container");

    let mut unrolled = Vec::with_capacity(length as usize);
    for i in 0..length {
        let new_id = ctx.register_variable(VariableData { name: var_name.clone(), r#type: element_type.clone(), is_const: false });
        let index_expr = Expression::with_type(location.clone(), ExpressionKind::ConstantValue(ConstantSingleValue::U32(i)), Type::Primitive(PrimitiveType::U32));
        let element = Expression::with_type(
            location.clone(),
            ExpressionKind::AccessIndex { expr: Box::new(container_temp.clone()), indices: vec![index_expr] },
            element_type.clone(),
        );
        let decl = Statement::new(
            location.clone(),
            StatementKind::DeclareVariable { name: var_name.clone(), r#type: Some(element_type.clone()), initial_value: Some(element), var_id: Some(new_id) },
        );
        let duplicate = duplicate_body(body, ctx, &[(counter_id, new_id)])?;
        unrolled.push(Statement::new(location.clone(), StatementKind::Scoped(Box::new(Statement::new(location.clone(), StatementKind::Multi(vec![decl, duplicate]))))));
    }
    Ok(Statement::new(location.clone(), StatementKind::Scoped(Box::new(Statement::new(location, StatementKind::Multi(unrolled))))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{context::ContextOptions, module::ModuleMetadata};

    #[test]
    fn unrolling_duplicates_body_once_per_iteration() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let counter_id = ctx.register_variable(VariableData { name: "i".into(), r#type: Type::Primitive(PrimitiveType::I32), is_const: false });
        let body = Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![Statement::new(SourceLocation::synthetic(), StatementKind::Discard)]));
        let for_stmt = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::For {
                var_name: "i".into(),
                from: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::I32(0)), Type::Primitive(PrimitiveType::I32)),
                to: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::I32(3)), Type::Primitive(PrimitiveType::I32)),
                step: None,
                unroll: Some(nzsl_ast::enums::LoopUnroll::Always),
                body: Box::new(body),
                var_id: Some(counter_id),
            },
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![for_stmt];
        unroll_loops(&mut module, &mut ctx).unwrap();
        let StatementKind::Scoped(inner) = &module.top_level_statements()[0].kind else { panic!("expected Scoped replacement") };
        let StatementKind::Multi(iterations) = &inner.kind else { panic!("expected Multi of unrolled iterations") };
        assert_eq!(iterations.len(), 3);
    }

    #[test]
    fn non_constant_bounds_are_rejected() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let counter_id = ctx.register_variable(VariableData { name: "i".into(), r#type: Type::Primitive(PrimitiveType::I32), is_const: false });
        let body = Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![]));
        let for_stmt = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::For {
                var_name: "i".into(),
                from: Expression::new(SourceLocation::synthetic(), ExpressionKind::VariableValue(counter_id)),
                to: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::I32(3)), Type::Primitive(PrimitiveType::I32)),
                step: None,
                unroll: Some(nzsl_ast::enums::LoopUnroll::Always),
                body: Box::new(body),
                var_id: Some(counter_id),
            },
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![for_stmt];
        let err = unroll_loops(&mut module, &mut ctx);
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::ConstantExpressionRequired)));
    }
}
