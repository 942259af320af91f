//! Literal typing (§4.H): assigns a concrete type to every untyped numeric literal based on
//! the context it appears in.
//!
//! Like [`crate::constant_propagation`], this is a standalone recursive walker rather than a
//! [`nzsl_ast::transformer::Transformer`] pass: the rule that decides a literal's concrete type
//! almost always comes from the *parent* node (the call's parameter type, the assignment's lhs
//! type, the declaration's annotated type), so the walk has to look at context unavailable to a
//! context-free per-node hook. Where nothing in context constrains a literal, it collapses to
//! its default (`IntLiteral -> i32`, `FloatLiteral -> f32`).

use nzsl_ast::{
    context::TransformerContext,
    errors::{CompilerErrorKind, NzslError, NzslResult},
    expressions::{Expression, ExpressionKind},
    module::Module,
    statements::{Statement, StatementKind},
    types::{PrimitiveType, Type},
};

/// Configuration for one `assign_literal_types` pass. Currently empty — kept as a struct
/// rather than a bare function argument so a future flag (e.g. a stricter "no implicit
/// default" mode) doesn't need to change every caller's signature, matching the shape of
/// every other pass's options struct in this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralTypingOptions {}

/// Assigns a concrete type to every untyped literal reachable from `module`'s tree.
pub fn assign_literal_types(module: &mut Module, ctx: &mut TransformerContext, _options: LiteralTypingOptions) -> NzslResult<()> {
    type_statement(&mut module.root, ctx, None)
}

/// Coerces `expr`'s type in place to `target`, provided `expr` is (or contains, for a
/// `ConstantValue`/cached-type pair) an untyped literal and `target` is a concrete numeric
/// primitive of the matching literal kind. A no-op when `expr` is already concrete or when
/// `target` isn't numeric — the caller doesn't need to pre-check either case.
fn coerce_to(expr: &mut Expression, target: &Type) -> NzslResult<()> {
    let Some(current) = expr.cached_type.as_ref().and_then(Type::as_primitive) else { return Ok(()) };
    if !current.is_literal() {
        return Ok(());
    }
    let Some(concrete) = target.as_primitive() else { return Ok(()) };
    if concrete.is_literal() || !concrete.is_numeric() {
        return Ok(());
    }
    if current.is_integer() != concrete.is_integer() {
        return Err(NzslError::compiler(
            CompilerErrorKind::UnmatchingTypes,
            expr.location.clone(),
            format!("cannot assign a {current} literal to a {concrete} destination"),
        ));
    }
    retype_literal(expr, concrete)
}

/// Rewrites an untyped-literal `ConstantValue`/`cached_type` pair to the concrete primitive
/// `target`, checking for overflow on an integer narrowing cast (§8 "Integer overflow
/// diagnostics": `const x: i32 = 2147483648;` must report `LiteralOutOfRange` at the literal).
fn retype_literal(expr: &mut Expression, target: PrimitiveType) -> NzslResult<()> {
    use nzsl_ast::constants::ConstantSingleValue as V;
    if let ExpressionKind::ConstantValue(value) = &mut expr.kind {
        let retyped = match (&value, target) {
            (V::IntLiteral(v), PrimitiveType::I32) => {
                let narrowed = i32::try_from(*v).map_err(|_| out_of_range(&expr.location, *v))?;
                V::I32(narrowed)
            }
            (V::IntLiteral(v), PrimitiveType::U32) => {
                let narrowed = u32::try_from(*v).map_err(|_| out_of_range(&expr.location, *v))?;
                V::U32(narrowed)
            }
            (V::IntLiteral(v), PrimitiveType::F32) => V::F32(*v as f32),
            (V::IntLiteral(v), PrimitiveType::F64) => V::F64(*v as f64),
            (V::FloatLiteral(v), PrimitiveType::F32) => V::F32(*v as f32),
            (V::FloatLiteral(v), PrimitiveType::F64) => V::F64(*v),
            _ => return Ok(()),
        };
        *value = retyped;
    }
    expr.cached_type = Some(Type::Primitive(target));
    Ok(())
}

fn out_of_range(location: &nzsl_ast::location::SourceLocation, value: i64) -> NzslError {
    NzslError::compiler(CompilerErrorKind::LiteralOutOfRange, location.clone(), format!("literal '{value}' is out of range for its destination type"))
}

fn default_literal(expr: &mut Expression) -> NzslResult<()> {
    let Some(current) = expr.cached_type.as_ref().and_then(Type::as_primitive) else { return Ok(()) };
    if !current.is_literal() {
        return Ok(());
    }
    retype_literal(expr, current.default_concrete())
}

fn type_statement(stmt: &mut Statement, ctx: &mut TransformerContext, enclosing_return: Option<&Type>) -> NzslResult<()> {
    match &mut stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements {
                type_statement(s, ctx, enclosing_return)?;
            }
        }
        StatementKind::Branch { arms, else_statement, .. } => {
            for arm in arms {
                type_expression(&mut arm.condition, ctx, None)?;
                type_statement(&mut arm.body, ctx, enclosing_return)?;
            }
            if let Some(e) = else_statement {
                type_statement(e, ctx, enclosing_return)?;
            }
        }
        StatementKind::Conditional { condition, statement } => {
            type_expression(condition, ctx, None)?;
            type_statement(statement, ctx, enclosing_return)?;
        }
        StatementKind::DeclareAlias { target, .. } => type_expression(target, ctx, None)?,
        StatementKind::DeclareConst { r#type, value, .. } => {
            type_expression(value, ctx, r#type.as_ref())?;
        }
        StatementKind::DeclareExternal { .. } | StatementKind::DeclareStruct { .. } => {}
        StatementKind::DeclareFunction { body, return_type, .. } => {
            type_statement(body, ctx, Some(&return_type.clone()))?;
        }
        StatementKind::DeclareOption { r#type, default_value: Some(value), .. } => type_expression(value, ctx, Some(&r#type.clone()))?,
        StatementKind::DeclareOption { default_value: None, .. } => {}
        StatementKind::DeclareVariable { r#type, initial_value: Some(value), .. } => {
            type_expression(value, ctx, r#type.as_ref())?;
            if r#type.is_none() {
                *r#type = value.cached_type.clone();
            }
        }
        StatementKind::DeclareVariable { initial_value: None, .. } => {}
        StatementKind::Expression(expr) => type_expression(expr, ctx, None)?,
        StatementKind::For { from, to, step, body, .. } => {
            type_expression(from, ctx, None)?;
            type_expression(to, ctx, from.cached_type.as_ref())?;
            if let Some(step) = step {
                type_expression(step, ctx, from.cached_type.as_ref())?;
            }
            type_statement(body, ctx, enclosing_return)?;
        }
        StatementKind::ForEach { container, body, .. } => {
            type_expression(container, ctx, None)?;
            type_statement(body, ctx, enclosing_return)?;
        }
        StatementKind::Return(Some(expr)) => type_expression(expr, ctx, enclosing_return)?,
        StatementKind::Return(None) => {}
        StatementKind::Scoped(inner) => type_statement(inner, ctx, enclosing_return)?,
        StatementKind::While { condition, body, .. } => {
            type_expression(condition, ctx, None)?;
            type_statement(body, ctx, enclosing_return)?;
        }
        StatementKind::Import { .. } | StatementKind::Break | StatementKind::Continue | StatementKind::Discard | StatementKind::NoOp => {}
    }
    Ok(())
}

/// Types `expr` and its children, in operand order (§5 ordering guarantee), then coerces `expr`
/// itself to `context_type` if provided. An argument-position, an assignment rhs, an
/// initializer, a return expression, and a binary op's literal-vs-concrete operand all funnel
/// through this single coercion call with a different `context_type` supplied by the caller.
fn type_expression(expr: &mut Expression, ctx: &mut TransformerContext, context_type: Option<&Type>) -> NzslResult<()> {
    match &mut expr.kind {
        ExpressionKind::AccessField { expr: inner, .. } | ExpressionKind::AccessIdentifier { expr: inner, .. } => type_expression(inner, ctx, None)?,
        ExpressionKind::AccessIndex { expr: inner, indices } => {
            type_expression(inner, ctx, None)?;
            for index in indices {
                type_expression(index, ctx, Some(&Type::Primitive(PrimitiveType::I32)))?;
            }
        }
        ExpressionKind::Assign { lhs, rhs, .. } => {
            type_expression(lhs, ctx, None)?;
            let lhs_type = lhs.cached_type.clone();
            type_expression(rhs, ctx, lhs_type.as_ref())?;
        }
        ExpressionKind::Binary { lhs, rhs, .. } => {
            type_expression(lhs, ctx, None)?;
            type_expression(rhs, ctx, None)?;
            // Neither side constrained the other up front (both are typed independently
            // above); now let whichever side is concrete pull the other's literal into its
            // space, matching §4.H "operand of a binary op against a concrete-typed operand".
            let lhs_concrete = lhs.cached_type.as_ref().is_some_and(|t| t.as_primitive().is_some_and(|p| !p.is_literal()));
            let rhs_concrete = rhs.cached_type.as_ref().is_some_and(|t| t.as_primitive().is_some_and(|p| !p.is_literal()));
            if rhs_concrete {
                let ty = rhs.cached_type.clone();
                coerce_to_opt(lhs, ty.as_ref())?;
            } else if lhs_concrete {
                let ty = lhs.cached_type.clone();
                coerce_to_opt(rhs, ty.as_ref())?;
            }
        }
        ExpressionKind::CallFunction { target, params } => {
            type_expression(target, ctx, None)?;
            let param_types = match &target.kind {
                ExpressionKind::Function(id) => ctx.function(*id).map(|f| f.parameters.iter().map(|p| p.r#type.clone()).collect::<Vec<_>>()),
                _ => None,
            };
            for (i, param) in params.iter_mut().enumerate() {
                let expected = param_types.as_ref().and_then(|types| types.get(i));
                type_expression(param, ctx, expected)?;
            }
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            type_expression(object, ctx, None)?;
            for param in params {
                type_expression(param, ctx, None)?;
            }
        }
        ExpressionKind::Cast { target_type, exprs } => {
            let target_type = target_type.clone();
            let component = target_type.component_type().map(Type::Primitive);
            for e in exprs {
                type_expression(e, ctx, component.as_ref())?;
            }
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            type_expression(condition, ctx, None)?;
            type_expression(true_path, ctx, context_type)?;
            type_expression(false_path, ctx, true_path.cached_type.as_ref().or(context_type))?;
        }
        ExpressionKind::Intrinsic { params, .. } => {
            for param in params {
                type_expression(param, ctx, None)?;
            }
        }
        ExpressionKind::Swizzle { expr: inner, .. } | ExpressionKind::Unary { expr: inner, .. } => type_expression(inner, ctx, None)?,
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

    match context_type {
        Some(ty) => coerce_to(expr, ty)?,
        None => default_literal(expr)?,
    }
    Ok(())
}

fn coerce_to_opt(expr: &mut Expression, ty: Option<&Type>) -> NzslResult<()> {
    match ty {
        Some(ty) => coerce_to(expr, ty),
        None => Ok(()),
    }
}
