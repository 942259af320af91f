//! `For`/`ForEach` lowering to `While` (§4.I).
//!
//! Runs after [`crate::loop_unroller`]: anything still a `For`/`ForEach` at this point either
//! had no `[unroll(always)]` attribute or was already rejected as unrollable, so every remaining
//! instance lowers unconditionally. Counter bookkeeping reuses the loop's own `var_id` rather
//! than registering a fresh variable — the body already references it via `VariableValue`, and
//! re-pointing every such reference would need the same index-remapping machinery the unroller
//! uses for a much simpler win.

use nzsl_ast::{
    constants::ConstantSingleValue,
    context::{TransformerContext, VariableData},
    enums::{AssignOp, BinaryOp},
    errors::{CompilerErrorKind, NzslError, NzslResult},
    expressions::{Expression, ExpressionKind},
    location::SourceLocation,
    module::Module,
    statements::{Statement, StatementKind},
    transformer::{Transformer, TransformerState, VisitAction},
    types::{PrimitiveType, Type},
};

/// Lowers every remaining `For`/`ForEach` statement into an equivalent `While`.
pub fn lower_loops(module: &mut Module, ctx: &mut TransformerContext) -> NzslResult<()> {
    LoopLowering.transform(ctx, module)
}

struct LoopLowering;

impl Transformer for LoopLowering {
    fn visit_statement(&mut self, ctx: &mut TransformerContext, state: &mut TransformerState, stmt: &Statement) -> NzslResult<VisitAction<Statement>> {
        match &stmt.kind {
            StatementKind::For { .. } => Ok(VisitAction::Replace(Box::new(lower_for(stmt, ctx)?))),
            StatementKind::ForEach { .. } => Ok(VisitAction::Replace(Box::new(lower_foreach(stmt, ctx, state)?))),
            _ => Ok(VisitAction::VisitChildren),
        }
    }
}

fn variable_value(id: nzsl_ast::ids::VariableId, ty: Type, location: SourceLocation) -> Expression {
    Expression::with_type(location, ExpressionKind::VariableValue(id), ty)
}

fn const_literal_i64(expr: &Expression) -> Option<i64> {
    match &expr.kind {
        ExpressionKind::ConstantValue(ConstantSingleValue::I32(v)) => Some(i64::from(*v)),
        ExpressionKind::ConstantValue(ConstantSingleValue::U32(v)) => Some(i64::from(*v)),
        ExpressionKind::ConstantValue(ConstantSingleValue::IntLiteral(v)) => Some(*v),
        _ => None,
    }
}

fn const_one(primitive: PrimitiveType, location: SourceLocation) -> Expression {
    let (kind, ty) = match primitive {
        PrimitiveType::U32 => (ConstantSingleValue::U32(1), Type::Primitive(PrimitiveType::U32)),
        _ => (ConstantSingleValue::I32(1), Type::Primitive(PrimitiveType::I32)),
    };
    Expression::with_type(location, ExpressionKind::ConstantValue(kind), ty)
}

fn check_matches(value: &Expression, counter_type: &Type, location: &SourceLocation, mismatch: CompilerErrorKind, what: &str) -> NzslResult<()> {
    let value_type = value.cached_type.as_ref().unwrap_or(counter_type);
    let ok = match (value_type.as_primitive(), counter_type.as_primitive()) {
        (Some(a), Some(b)) => a == b || a.is_literal() || b.is_literal(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(NzslError::compiler(mismatch, location.clone(), format!("'for' loop {what} does not match the counter's type")))
    }
}

fn lower_for(stmt: &Statement, ctx: &mut TransformerContext) -> NzslResult<Statement> {
    let StatementKind::For { var_name, from, to, step, body, var_id, .. } = &stmt.kind else {
        unreachable!("visit_statement only routes For nodes here")
    };
    let location = stmt.location.clone();
    let counter_id = var_id.ok_or_else(|| NzslError::ast(nzsl_ast::errors::AstErrorKind::Internal, location.clone(), "unresolved for-loop counter"))?;
    let counter_type = ctx.variable(counter_id).map(|v| v.r#type.clone()).unwrap_or(Type::Primitive(PrimitiveType::I32));
    let primitive = counter_type.as_primitive().unwrap_or(PrimitiveType::I32);

    if !counter_type.is_numeric() || !primitive.is_integer() {
        return Err(NzslError::compiler(CompilerErrorKind::ForFromTypeExpectIntegerType, location.clone(), "a 'for' loop's counter must be an integer type"));
    }
    check_matches(to, &counter_type, &location, CompilerErrorKind::ForToUnmatchingType, "bound")?;
    if let Some(s) = step {
        check_matches(s, &counter_type, &location, CompilerErrorKind::ForStepUnmatchingType, "step")?;
    }

    let step_expr = step.clone().unwrap_or_else(|| const_one(primitive, location.clone()));
    let to_id = ctx.register_variable(VariableData { name: "_nzsl_for_to".into(), r#type: counter_type.clone(), is_const: false });
    let step_id = ctx.register_variable(VariableData { name: "_nzsl_for_step".into(), r#type: counter_type.clone(), is_const: false });

    let decl_counter = Statement::new(
        location.clone(),
        StatementKind::DeclareVariable { name: var_name.clone(), r#type: Some(counter_type.clone()), initial_value: Some(from.clone()), var_id: Some(counter_id) },
    );
    let decl_to = Statement::new(
        location.clone(),
        StatementKind::DeclareVariable { name: "_nzsl_for_to".into(), r#type: Some(counter_type.clone()), initial_value: Some(to.clone()), var_id: Some(to_id) },
    );
    let decl_step = Statement::new(
        location.clone(),
        StatementKind::DeclareVariable { name: "_nzsl_for_step".into(), r#type: Some(counter_type.clone()), initial_value: Some(step_expr), var_id: Some(step_id) },
    );

    let descending = const_literal_i64(step).is_some_and(|v| v < 0);
    let compare_op = if descending { BinaryOp::CompGt } else { BinaryOp::CompLt };
    let condition = Expression::with_type(
        location.clone(),
        ExpressionKind::Binary {
            op: compare_op,
            lhs: Box::new(variable_value(counter_id, counter_type.clone(), location.clone())),
            rhs: Box::new(variable_value(to_id, counter_type.clone(), location.clone())),
        },
        Type::Primitive(PrimitiveType::Bool),
    );
    let increment = Statement::new(
        location.clone(),
        StatementKind::Expression(Expression::new(
            location.clone(),
            ExpressionKind::Assign {
                op: AssignOp::Simple,
                lhs: Box::new(variable_value(counter_id, counter_type.clone(), location.clone())),
                rhs: Box::new(Expression::with_type(
                    location.clone(),
                    ExpressionKind::Binary {
                        op: BinaryOp::Add,
                        lhs: Box::new(variable_value(counter_id, counter_type.clone(), location.clone())),
                        rhs: Box::new(variable_value(step_id, counter_type.clone(), location.clone())),
                    },
                    counter_type.clone(),
                )),
            },
        )),
    );
    let while_body = Statement::new(location.clone(), StatementKind::Scoped(Box::new(Statement::new(location.clone(), StatementKind::Multi(vec![*body.clone(), increment])))));
    let while_stmt = Statement::new(location.clone(), StatementKind::While { condition, unroll: None, body: Box::new(while_body) });
    Ok(Statement::new(location.clone(), StatementKind::Scoped(Box::new(Statement::new(location, StatementKind::Multi(vec![decl_counter, decl_to, decl_step, while_stmt]))))))
}

fn lower_foreach(stmt: &Statement, ctx: &mut TransformerContext, state: &mut TransformerState) -> NzslResult<Statement> {
    let StatementKind::ForEach { var_name, container, body, var_id, .. } = &stmt.kind else {
        unreachable!("visit_statement only routes ForEach nodes here")
    };
    let location = stmt.location.clone();
    let element_id = var_id.ok_or_else(|| NzslError::ast(nzsl_ast::errors::AstErrorKind::Internal, location.clone(), "unresolved for-each element variable"))?;
    let element_type = ctx.variable(element_id).map(|v| v.r#type.clone()).unwrap_or(Type::NoType);

    let length = match container.cached_type.as_ref().map(Type::resolve_alias) {
        Some(Type::Array { length, .. }) => Some(*length),
        Some(Type::DynArray { .. }) => None,
        _ => return Err(NzslError::compiler(CompilerErrorKind::ForEachUnsupportedType, location.clone(), "'for-each' requires an array or dyn_array container")),
    };

    let container_temp = state.cache_expression(ctx, container.clone(), "foreach_container");
    let idx_id = ctx.register_variable(VariableData { name: "_nzsl_foreach_idx".into(), r#type: Type::Primitive(PrimitiveType::U32), is_const: false });
    let decl_idx = Statement::new(
        location.clone(),
        StatementKind::DeclareVariable {
            name: "_nzsl_foreach_idx".into(),
            r#type: Some(Type::Primitive(PrimitiveType::U32)),
            initial_value: Some(Expression::with_type(location.clone(), ExpressionKind::ConstantValue(ConstantSingleValue::U32(0)), Type::Primitive(PrimitiveType::U32))),
            var_id: Some(idx_id),
        },
    );

    let bound = match length {
        Some(n) => Expression::with_type(location.clone(), ExpressionKind::ConstantValue(ConstantSingleValue::U32(n)), Type::Primitive(PrimitiveType::U32)),
        None => Expression::with_type(
            location.clone(),
            ExpressionKind::Intrinsic { kind: nzsl_ast::enums::IntrinsicKind::ArraySize, params: vec![container_temp.clone()] },
            Type::Primitive(PrimitiveType::U32),
        ),
    };
    let condition = Expression::with_type(
        location.clone(),
        ExpressionKind::Binary {
            op: BinaryOp::CompLt,
            lhs: Box::new(variable_value(idx_id, Type::Primitive(PrimitiveType::U32), location.clone())),
            rhs: Box::new(bound),
        },
        Type::Primitive(PrimitiveType::Bool),
    );

    let element_access = Expression::with_type(
        location.clone(),
        ExpressionKind::AccessIndex { expr: Box::new(container_temp), indices: vec![variable_value(idx_id, Type::Primitive(PrimitiveType::U32), location.clone())] },
        element_type.clone(),
    );
    let decl_element = Statement::new(
        location.clone(),
        StatementKind::DeclareVariable { name: var_name.clone(), r#type: Some(element_type), initial_value: Some(element_access), var_id: Some(element_id) },
    );

    let increment = Statement::new(
        location.clone(),
        StatementKind::Expression(Expression::new(
            location.clone(),
            ExpressionKind::Assign {
                op: AssignOp::Simple,
                lhs: Box::new(variable_value(idx_id, Type::Primitive(PrimitiveType::U32), location.clone())),
                rhs: Box::new(Expression::with_type(
                    location.clone(),
                    ExpressionKind::Binary {
                        op: BinaryOp::Add,
                        lhs: Box::new(variable_value(idx_id, Type::Primitive(PrimitiveType::U32), location.clone())),
                        rhs: Box::new(Expression::with_type(location.clone(), ExpressionKind::ConstantValue(ConstantSingleValue::U32(1)), Type::Primitive(PrimitiveType::U32))),
                    },
                    Type::Primitive(PrimitiveType::U32),
                )),
            },
        )),
    );

    let while_body = Statement::new(
        location.clone(),
        StatementKind::Scoped(Box::new(Statement::new(location.clone(), StatementKind::Multi(vec![decl_element, *body.clone(), increment])))),
    );
    let while_stmt = Statement::new(location.clone(), StatementKind::While { condition, unroll: None, body: Box::new(while_body) });
    Ok(Statement::new(location.clone(), StatementKind::Scoped(Box::new(Statement::new(location, StatementKind::Multi(vec![decl_idx, while_stmt]))))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{context::ContextOptions, module::ModuleMetadata};

    #[test]
    fn for_loop_lowers_to_while_with_three_declarations() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let counter_id = ctx.register_variable(VariableData { name: "i".into(), r#type: Type::Primitive(PrimitiveType::I32), is_const: false });
        let body = Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![]));
        let for_stmt = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::For {
                var_name: "i".into(),
                from: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::I32(0)), Type::Primitive(PrimitiveType::I32)),
                to: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::I32(10)), Type::Primitive(PrimitiveType::I32)),
                step: None,
                unroll: None,
                body: Box::new(body),
                var_id: Some(counter_id),
            },
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![for_stmt];
        lower_loops(&mut module, &mut ctx).unwrap();
        let StatementKind::Scoped(inner) = &module.top_level_statements()[0].kind else { panic!("expected Scoped") };
        let StatementKind::Multi(statements) = &inner.kind else { panic!("expected Multi") };
        assert_eq!(statements.len(), 4);
        assert!(matches!(statements.last().unwrap().kind, StatementKind::While { .. }));
    }

    #[test]
    fn non_integer_counter_is_rejected() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let counter_id = ctx.register_variable(VariableData { name: "i".into(), r#type: Type::Primitive(PrimitiveType::F32), is_const: false });
        let body = Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![]));
        let for_stmt = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::For {
                var_name: "i".into(),
                from: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::F32(0.0)), Type::Primitive(PrimitiveType::F32)),
                to: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::F32(10.0)), Type::Primitive(PrimitiveType::F32)),
                step: None,
                unroll: None,
                body: Box::new(body),
                var_id: Some(counter_id),
            },
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![for_stmt];
        let err = lower_loops(&mut module, &mut ctx);
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::ForFromTypeExpectIntegerType)));
    }
}
