//! Swizzle transformer (§4.I). Two independent rewrites fold into one pass since they both key
//! off `ExpressionKind::Swizzle`:
//!
//! - A scalar swizzle (the swizzled expression's type is a primitive, not a vector — NZSL
//!   allows splatting a scalar through swizzle syntax) rebuilds a `vecN[T]` by repeating the
//!   scalar `count` times, or degenerates straight to the scalar itself when `count == 1`
//!   (`value.xxxx` -> `vecN[T](value, value, ..., value)`, `value.x` -> `value`).
//! - Any other swizzle applied to something that isn't a pure l-value (a function call result,
//!   for instance) is cached into a temporary first, so the emitted swizzle reads the cached
//!   value instead of re-running the underlying expression once per use.

use nzsl_ast::{
    context::TransformerContext,
    errors::NzslResult,
    expressions::{Expression, ExpressionKind},
    transformer::{Transformer, TransformerState, VisitAction},
    types::{PrimitiveType, Type},
};

/// Lowers every swizzle in `module` per the two rules above.
pub fn lower_swizzles(module: &mut nzsl_ast::module::Module, ctx: &mut TransformerContext) -> NzslResult<()> {
    SwizzleLowering.transform(ctx, module)
}

struct SwizzleLowering;

impl Transformer for SwizzleLowering {
    fn visit_expression(&mut self, ctx: &mut TransformerContext, state: &mut TransformerState, expr: &Expression) -> NzslResult<VisitAction<Expression>> {
        let ExpressionKind::Swizzle { expr: inner, components, count } = &expr.kind else {
            return Ok(VisitAction::VisitChildren);
        };

        let is_scalar_source = inner.cached_type.as_ref().is_some_and(|ty| matches!(ty.resolve_alias(), Type::Primitive(_)));

        if is_scalar_source {
            let component_type = match inner.cached_type.as_ref().map(Type::resolve_alias) {
                Some(Type::Primitive(p)) => *p,
                _ => PrimitiveType::F32,
            };
            let base = if is_cheap_to_repeat(inner) { (**inner).clone() } else { state.cache_expression(ctx, (**inner).clone(), "swizzle_scalar") };
            if *count == 1 {
                return Ok(VisitAction::Replace(Box::new(base)));
            }
            let target_type = Type::Vector { component_count: u32::from(*count), component_type };
            let repeated = Expression::with_type(
                expr.location.clone(),
                ExpressionKind::Cast { target_type: target_type.clone(), exprs: std::iter::repeat_n(base, usize::from(*count)).collect() },
                target_type,
            );
            return Ok(VisitAction::Replace(Box::new(repeated)));
        }

        if is_cheap_to_repeat(inner) {
            return Ok(VisitAction::VisitChildren);
        }
        let cached = state.cache_expression(ctx, (**inner).clone(), "swizzle_base");
        let rewritten = Expression::with_type(
            expr.location.clone(),
            ExpressionKind::Swizzle { expr: Box::new(cached), components: components.clone(), count: *count },
            expr.cached_type.clone().unwrap_or(Type::NoType),
        );
        Ok(VisitAction::Replace(Box::new(rewritten)))
    }
}

fn is_cheap_to_repeat(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::VariableValue(_) => true,
        ExpressionKind::AccessField { expr: inner, .. } => is_cheap_to_repeat(inner),
        ExpressionKind::AccessIndex { expr: inner, indices } => is_cheap_to_repeat(inner) && indices.iter().all(is_cheap_to_repeat),
        ExpressionKind::ConstantValue(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{
        context::{ContextOptions, VariableData},
        location::SourceLocation,
        module::{Module, ModuleMetadata},
        statements::{Statement, StatementKind},
    };

    fn vec4() -> Type {
        Type::Vector { component_count: 4, component_type: PrimitiveType::F32 }
    }

    #[test]
    fn scalar_single_component_swizzle_unwraps_to_the_scalar_itself() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let id = ctx.register_variable(VariableData { name: "s".into(), r#type: Type::Primitive(PrimitiveType::F32), is_const: false });
        let base = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(id), Type::Primitive(PrimitiveType::F32));
        let swizzle = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::Swizzle { expr: Box::new(base), components: smallvec::smallvec![0], count: 1 },
            Type::Primitive(PrimitiveType::F32),
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(swizzle))];
        lower_swizzles(&mut module, &mut ctx).unwrap();
        let StatementKind::Expression(rewritten) = &module.top_level_statements()[0].kind else { panic!() };
        assert!(matches!(rewritten.kind, ExpressionKind::VariableValue(v) if v == id));
    }

    #[test]
    fn vector_swizzle_of_an_impure_expression_is_cached_first() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let call = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::CallFunction { target: Box::new(Expression::new(SourceLocation::synthetic(), ExpressionKind::Function(nzsl_ast::ids::FunctionId::new(0)))), params: vec![] },
            vec4(),
        );
        let swizzle = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::Swizzle { expr: Box::new(call), components: smallvec::smallvec![2, 1, 0], count: 3 },
            Type::Vector { component_count: 3, component_type: PrimitiveType::F32 },
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(swizzle))];
        lower_swizzles(&mut module, &mut ctx).unwrap();
        let statements = module.top_level_statements();
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0].kind, StatementKind::DeclareVariable { .. }));
        let StatementKind::Expression(rewritten) = &statements[1].kind else { panic!() };
        assert!(matches!(rewritten.kind, ExpressionKind::Swizzle { .. }));
    }

    #[test]
    fn scalar_splat_swizzle_becomes_vector_cast() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let id = ctx.register_variable(VariableData { name: "s".into(), r#type: Type::Primitive(PrimitiveType::F32), is_const: false });
        let base = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(id), Type::Primitive(PrimitiveType::F32));
        let swizzle = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::Swizzle { expr: Box::new(base), components: smallvec::smallvec![0, 0, 0, 0], count: 4 },
            vec4(),
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(swizzle))];
        lower_swizzles(&mut module, &mut ctx).unwrap();
        let StatementKind::Expression(rewritten) = &module.top_level_statements()[0].kind else { panic!() };
        assert!(matches!(rewritten.kind, ExpressionKind::Cast { ref exprs, .. } if exprs.len() == 4));
    }
}
