//! Bottom-up constant folding over already-resolved expressions (§4.G).
//!
//! Unlike most passes here, this one doesn't go through [`nzsl_ast::transformer::Transformer`]:
//! folding an outer `Binary` needs its operands already folded, but the transformer dispatches
//! pre-order (a hook sees a node before its children), which is backwards for this pass's needs.
//! So it owns a small recursive walker instead, folding children first and then trying the
//! parent. Intrinsic calls are deliberately left unfolded — see `DESIGN.md`.

use nzsl_ast::{
    constants::{eval_binary, eval_unary, ConstantSingleValue},
    context::TransformerContext,
    errors::{CompilerErrorKind, NzslError, NzslResult},
    expressions::{Expression, ExpressionKind},
    module::Module,
    statements::{Statement, StatementKind},
};

/// Configuration for one `propagate_constants` pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantPropagationOptions {
    /// Whether calls to intrinsics with all-constant arguments should also be folded. Left off
    /// by default: folding `sqrt`/`pow`/... at compile time means committing to this crate's
    /// floating-point intrinsic implementations matching whatever a backend's target shading
    /// language does at runtime, which isn't guaranteed bit-for-bit (see `DESIGN.md`).
    pub fold_intrinsics: bool,
}

/// Folds every constant-foldable expression in `module`'s tree in place.
pub fn propagate_constants(module: &mut Module, ctx: &mut TransformerContext, options: ConstantPropagationOptions) -> NzslResult<()> {
    let _ = options.fold_intrinsics;
    fold_statement(&mut module.root, ctx)
}

fn fold_statement(stmt: &mut Statement, ctx: &mut TransformerContext) -> NzslResult<()> {
    match &mut stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements {
                fold_statement(s, ctx)?;
            }
        }
        StatementKind::Branch { arms, else_statement, .. } => {
            for arm in arms {
                fold_expression(&mut arm.condition, ctx)?;
                fold_statement(&mut arm.body, ctx)?;
            }
            if let Some(e) = else_statement {
                fold_statement(e, ctx)?;
            }
        }
        StatementKind::Conditional { condition, statement } => {
            fold_expression(condition, ctx)?;
            fold_statement(statement, ctx)?;
        }
        StatementKind::DeclareAlias { target, .. } => fold_expression(target, ctx)?,
        StatementKind::DeclareConst { value, .. } => fold_expression(value, ctx)?,
        StatementKind::DeclareExternal { .. } | StatementKind::DeclareStruct { .. } => {}
        StatementKind::DeclareFunction { body, .. } => fold_statement(body, ctx)?,
        StatementKind::DeclareOption { default_value: Some(value), .. } => fold_expression(value, ctx)?,
        StatementKind::DeclareOption { default_value: None, .. } => {}
        StatementKind::DeclareVariable { initial_value: Some(value), .. } => fold_expression(value, ctx)?,
        StatementKind::DeclareVariable { initial_value: None, .. } => {}
        StatementKind::Expression(expr) => fold_expression(expr, ctx)?,
        StatementKind::For { from, to, step, body, .. } => {
            fold_expression(from, ctx)?;
            fold_expression(to, ctx)?;
            if let Some(step) = step {
                fold_expression(step, ctx)?;
            }
            fold_statement(body, ctx)?;
        }
        StatementKind::ForEach { container, body, .. } => {
            fold_expression(container, ctx)?;
            fold_statement(body, ctx)?;
        }
        StatementKind::Return(Some(expr)) => fold_expression(expr, ctx)?,
        StatementKind::Return(None) => {}
        StatementKind::Scoped(inner) => fold_statement(inner, ctx)?,
        StatementKind::While { condition, body, .. } => {
            fold_expression(condition, ctx)?;
            fold_statement(body, ctx)?;
        }
        StatementKind::Import { .. } | StatementKind::Break | StatementKind::Continue | StatementKind::Discard | StatementKind::NoOp => {}
    }
    Ok(())
}

fn fold_expression(expr: &mut Expression, ctx: &mut TransformerContext) -> NzslResult<()> {
    match &mut expr.kind {
        ExpressionKind::AccessField { expr: inner, .. } | ExpressionKind::AccessIdentifier { expr: inner, .. } | ExpressionKind::Swizzle { expr: inner, .. } => {
            fold_expression(inner, ctx)?;
        }
        ExpressionKind::AccessIndex { expr: inner, indices } => {
            fold_expression(inner, ctx)?;
            for i in indices {
                fold_expression(i, ctx)?;
            }
        }
        ExpressionKind::Assign { rhs, .. } => fold_expression(rhs, ctx)?,
        ExpressionKind::Binary { lhs, rhs, .. } => {
            fold_expression(lhs, ctx)?;
            fold_expression(rhs, ctx)?;
        }
        ExpressionKind::CallFunction { target, params } => {
            fold_expression(target, ctx)?;
            for p in params {
                fold_expression(p, ctx)?;
            }
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            fold_expression(object, ctx)?;
            for p in params {
                fold_expression(p, ctx)?;
            }
        }
        ExpressionKind::Cast { exprs, .. } | ExpressionKind::Intrinsic { params: exprs, .. } => {
            for e in exprs {
                fold_expression(e, ctx)?;
            }
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            fold_expression(condition, ctx)?;
            fold_expression(true_path, ctx)?;
            fold_expression(false_path, ctx)?;
        }
        ExpressionKind::Unary { expr: inner, .. } => fold_expression(inner, ctx)?,
        ExpressionKind::AliasValue(_)
        | ExpressionKind::Constant(_)
        | ExpressionKind::ConstantArrayValue(_)
        | ExpressionKind::ConstantValue(_)
        | ExpressionKind::Function(_)
        | ExpressionKind::Identifier(_)
        | ExpressionKind::IntrinsicFunction(_)
        | ExpressionKind::Module(_)
        | ExpressionKind::NamedExternalBlock(_)
        | ExpressionKind::StructType(_)
        | ExpressionKind::TypeConstant(_)
        | ExpressionKind::VariableValue(_) => {}
    }

    // Children are folded (if foldable at all); now see whether this node itself collapses.
    let folded = match &expr.kind {
        ExpressionKind::Binary { op, lhs, rhs } => match (as_constant(lhs), as_constant(rhs)) {
            (Some(a), Some(b)) => Some(eval_binary(*op, a, b).map_err(|e| lift(e, expr))?),
            _ => None,
        },
        ExpressionKind::Unary { op, expr: inner } => as_constant(inner).map(|v| eval_unary(*op, v)).transpose().map_err(|e| lift(e, expr))?,
        ExpressionKind::Constant(id) => match ctx.constant(*id) {
            Some(data) if data.value.is_some() => data.value.clone(),
            Some(data) if data.is_option => {
                return Err(NzslError::compiler(
                    CompilerErrorKind::MissingOptionValue,
                    expr.location.clone(),
                    format!("option '{}' requires a value (no default value set)", data.name),
                ));
            }
            _ => None,
        },
        _ => None,
    };

    if let Some(value) = folded {
        let ty = value.get_type();
        expr.kind = ExpressionKind::ConstantValue(value);
        expr.cached_type = Some(ty);
    }
    Ok(())
}

fn as_constant(expr: &Expression) -> Option<&ConstantSingleValue> {
    match &expr.kind {
        ExpressionKind::ConstantValue(v) => Some(v),
        _ => None,
    }
}

fn lift(err: nzsl_ast::constants::ConstEvalError, expr: &Expression) -> NzslError {
    let kind: CompilerErrorKind = err.into();
    NzslError::compiler(kind, expr.location.clone(), format!("{kind} while folding a constant expression"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{context::ContextOptions, enums::BinaryOp, location::SourceLocation, module::ModuleMetadata};

    fn constant(v: ConstantSingleValue) -> Expression {
        let ty = v.get_type();
        Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(v), ty)
    }

    #[test]
    fn nested_binary_expressions_fold_bottom_up() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut module = Module::new(ModuleMetadata::default());
        let inner = Expression::new(
            SourceLocation::synthetic(),
            ExpressionKind::Binary { op: BinaryOp::Add, lhs: Box::new(constant(ConstantSingleValue::I32(1))), rhs: Box::new(constant(ConstantSingleValue::I32(2))) },
        );
        let outer = Expression::new(
            SourceLocation::synthetic(),
            ExpressionKind::Binary { op: BinaryOp::Multiply, lhs: Box::new(inner), rhs: Box::new(constant(ConstantSingleValue::I32(10))) },
        );
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(outer))];
        propagate_constants(&mut module, &mut ctx, ConstantPropagationOptions::default()).unwrap();
        let StatementKind::Expression(Expression { kind: ExpressionKind::ConstantValue(v), .. }) = &module.top_level_statements()[0].kind else {
            panic!("expected a folded constant")
        };
        assert_eq!(*v, ConstantSingleValue::I32(30));
    }

    #[test]
    fn division_by_zero_surfaces_as_a_compiler_error() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut module = Module::new(ModuleMetadata::default());
        let expr = Expression::new(
            SourceLocation::synthetic(),
            ExpressionKind::Binary { op: BinaryOp::Divide, lhs: Box::new(constant(ConstantSingleValue::I32(1))), rhs: Box::new(constant(ConstantSingleValue::I32(0))) },
        );
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(expr))];
        let err = propagate_constants(&mut module, &mut ctx, ConstantPropagationOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::IntegralDivisionByZero)));
    }

    #[test]
    fn non_constant_operands_are_left_untouched() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut module = Module::new(ModuleMetadata::default());
        let expr = Expression::new(
            SourceLocation::synthetic(),
            ExpressionKind::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expression::new(SourceLocation::synthetic(), ExpressionKind::Identifier("x".into()))),
                rhs: Box::new(constant(ConstantSingleValue::I32(2))),
            },
        );
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(expr))];
        propagate_constants(&mut module, &mut ctx, ConstantPropagationOptions::default()).unwrap();
        assert!(matches!(
            &module.top_level_statements()[0].kind,
            StatementKind::Expression(Expression { kind: ExpressionKind::Binary { .. }, .. })
        ));
    }

    #[test]
    fn folding_an_option_with_no_default_value_is_rejected() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let option_id = ctx.register_constant(nzsl_ast::context::ConstantData {
            name: "Quality".into(),
            r#type: nzsl_ast::types::Type::Primitive(nzsl_ast::types::PrimitiveType::I32),
            value: None,
            module_index: None,
            is_option: true,
        });
        let mut module = Module::new(ModuleMetadata::default());
        let expr = Expression::new(SourceLocation::synthetic(), ExpressionKind::Constant(option_id));
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(expr))];
        let err = propagate_constants(&mut module, &mut ctx, ConstantPropagationOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::MissingOptionValue)));
    }
}
