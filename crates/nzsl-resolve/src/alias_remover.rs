//! Alias removal (§4.I): replaces every `Alias` type with the type it targets and deletes
//! `DeclareAlias` statements, leaving a tree a back-end never sees an `alias` in.
//!
//! A standalone recursive walker: stripping `Type::Alias` wrappers out of an embedded field
//! (a variable's declared type, a cast's target) while still recursing into that same field's
//! nested types needs direct `&mut Type` access, which `Transformer`'s node-level `Replace`
//! cannot thread through a field that isn't itself a `Statement`/`Expression`.

use nzsl_ast::{
    context::TransformerContext,
    errors::NzslResult,
    expressions::{Expression, ExpressionKind},
    module::Module,
    statements::{Statement, StatementKind},
    types::Type,
};

/// Removes every `alias` declaration and resolves every `Alias` type down to its target,
/// across the context's symbol tables and the module tree (including imported submodules).
pub fn remove_aliases(module: &mut Module, ctx: &mut TransformerContext) -> NzslResult<()> {
    strip_table_aliases(ctx);
    strip_statement(&mut module.root, ctx);
    for imported in &mut module.imported_modules {
        strip_statement(&mut imported.module.root, ctx);
    }
    Ok(())
}

fn strip_alias(ty: &mut Type) {
    while let Type::Alias { target, .. } = ty {
        *ty = (**target).clone();
    }
    match ty {
        Type::Array { inner, .. } | Type::DynArray { inner } | Type::Method { object_type: inner, .. } => strip_alias(inner),
        _ => {}
    }
}

fn strip_table_aliases(ctx: &mut TransformerContext) {
    let variable_ids: Vec<_> = ctx.iter_variables().map(|(id, _)| id).collect();
    for id in variable_ids {
        if let Some(data) = ctx.variable_mut(id) {
            strip_alias(&mut data.r#type);
        }
    }
    let constant_ids: Vec<_> = ctx.iter_constants().map(|(id, _)| id).collect();
    for id in constant_ids {
        if let Some(data) = ctx.constant_mut(id) {
            strip_alias(&mut data.r#type);
        }
    }
    let function_ids: Vec<_> = ctx.iter_functions().map(|(id, _)| id).collect();
    for id in function_ids {
        if let Some(data) = ctx.function_mut(id) {
            strip_alias(&mut data.return_type);
            for param in &mut data.parameters {
                strip_alias(&mut param.r#type);
            }
        }
    }
    let struct_ids: Vec<_> = ctx.iter_structs().map(|(id, _)| id).collect();
    for id in struct_ids {
        if let Some(data) = ctx.struct_data_mut(id) {
            for field in &mut data.description.fields {
                strip_alias(&mut field.r#type);
            }
        }
    }
}

fn strip_statement(stmt: &mut Statement, ctx: &TransformerContext) {
    match &mut stmt.kind {
        StatementKind::DeclareAlias { .. } => stmt.kind = StatementKind::NoOp,
        StatementKind::Multi(statements) => {
            for s in statements {
                strip_statement(s, ctx);
            }
        }
        StatementKind::Scoped(inner) => strip_statement(inner, ctx),
        StatementKind::Branch { arms, else_statement, .. } => {
            for arm in arms {
                strip_expression(&mut arm.condition, ctx);
                strip_statement(&mut arm.body, ctx);
            }
            if let Some(e) = else_statement {
                strip_statement(e, ctx);
            }
        }
        StatementKind::Conditional { condition, statement } => {
            strip_expression(condition, ctx);
            strip_statement(statement, ctx);
        }
        StatementKind::DeclareConst { r#type, value, .. } => {
            if let Some(t) = r#type {
                strip_alias(t);
            }
            strip_expression(value, ctx);
        }
        StatementKind::DeclareExternal { variables, .. } => {
            for v in variables {
                strip_alias(&mut v.r#type);
            }
        }
        StatementKind::DeclareFunction { parameters, body, return_type, .. } => {
            for p in parameters {
                strip_alias(&mut p.r#type);
            }
            strip_alias(return_type);
            strip_statement(body, ctx);
        }
        StatementKind::DeclareOption { r#type, default_value, .. } => {
            strip_alias(r#type);
            if let Some(v) = default_value {
                strip_expression(v, ctx);
            }
        }
        StatementKind::DeclareStruct { description } => {
            for field in &mut description.fields {
                strip_alias(&mut field.r#type);
            }
        }
        StatementKind::DeclareVariable { r#type, initial_value, .. } => {
            if let Some(t) = r#type {
                strip_alias(t);
            }
            if let Some(v) = initial_value {
                strip_expression(v, ctx);
            }
        }
        StatementKind::Expression(expr) => strip_expression(expr, ctx),
        StatementKind::For { from, to, step, body, .. } => {
            strip_expression(from, ctx);
            strip_expression(to, ctx);
            if let Some(s) = step {
                strip_expression(s, ctx);
            }
            strip_statement(body, ctx);
        }
        StatementKind::ForEach { container, body, .. } => {
            strip_expression(container, ctx);
            strip_statement(body, ctx);
        }
        StatementKind::Return(Some(expr)) => strip_expression(expr, ctx),
        StatementKind::While { condition, body, .. } => {
            strip_expression(condition, ctx);
            strip_statement(body, ctx);
        }
        StatementKind::Break
        | StatementKind::Continue
        | StatementKind::Discard
        | StatementKind::Import { .. }
        | StatementKind::NoOp
        | StatementKind::Return(None) => {}
    }
}

fn strip_expression(expr: &mut Expression, ctx: &TransformerContext) {
    if let Some(ty) = &mut expr.cached_type {
        strip_alias(ty);
    }
    match &mut expr.kind {
        ExpressionKind::AliasValue(id) => {
            let target = ctx.alias(*id).map(|a| a.target.clone()).unwrap_or(Type::NoType);
            let mut target = target;
            strip_alias(&mut target);
            expr.cached_type = Some(target.clone());
            expr.kind = ExpressionKind::TypeConstant(target);
        }
        ExpressionKind::AccessField { expr: inner, .. } | ExpressionKind::AccessIdentifier { expr: inner, .. } | ExpressionKind::Swizzle { expr: inner, .. } | ExpressionKind::Unary { expr: inner, .. } => {
            strip_expression(inner, ctx);
        }
        ExpressionKind::AccessIndex { expr: inner, indices } => {
            strip_expression(inner, ctx);
            for i in indices {
                strip_expression(i, ctx);
            }
        }
        ExpressionKind::Assign { lhs, rhs, .. } | ExpressionKind::Binary { lhs, rhs, .. } => {
            strip_expression(lhs, ctx);
            strip_expression(rhs, ctx);
        }
        ExpressionKind::CallFunction { target, params } => {
            strip_expression(target, ctx);
            for p in params {
                strip_expression(p, ctx);
            }
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            strip_expression(object, ctx);
            for p in params {
                strip_expression(p, ctx);
            }
        }
        ExpressionKind::Cast { target_type, exprs } => {
            strip_alias(target_type);
            for e in exprs {
                strip_expression(e, ctx);
            }
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            strip_expression(condition, ctx);
            strip_expression(true_path, ctx);
            strip_expression(false_path, ctx);
        }
        ExpressionKind::Intrinsic { params, .. } => {
            for p in params {
                strip_expression(p, ctx);
            }
        }
        ExpressionKind::TypeConstant(ty) => strip_alias(ty),
        ExpressionKind::Constant(_)
        | ExpressionKind::ConstantArrayValue(_)
        | ExpressionKind::ConstantValue(_)
        | ExpressionKind::Function(_)
        | ExpressionKind::Identifier(_)
        | ExpressionKind::IntrinsicFunction(_)
        | ExpressionKind::Module(_)
        | ExpressionKind::NamedExternalBlock(_)
        | ExpressionKind::StructType(_)
        | ExpressionKind::VariableValue(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{context::ContextOptions, context::VariableData, location::SourceLocation, module::ModuleMetadata, types::PrimitiveType};

    #[test]
    fn declare_alias_statement_becomes_no_op() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let decl = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::DeclareAlias {
                name: "MyFloat".into(),
                target: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::TypeConstant(Type::Primitive(PrimitiveType::F32)), Type::Primitive(PrimitiveType::F32)),
            },
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![decl];
        remove_aliases(&mut module, &mut ctx).unwrap();
        assert!(matches!(module.top_level_statements()[0].kind, StatementKind::NoOp));
    }

    #[test]
    fn variable_alias_type_resolves_to_target() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let aliased = Type::Alias { name: "MyFloat".into(), target: Box::new(Type::Primitive(PrimitiveType::F32)) };
        let id = ctx.register_variable(VariableData { name: "x".into(), r#type: aliased, is_const: false });
        let mut module = Module::new(ModuleMetadata::default());
        remove_aliases(&mut module, &mut ctx).unwrap();
        assert_eq!(ctx.variable(id).unwrap().r#type, Type::Primitive(PrimitiveType::F32));
    }
}
