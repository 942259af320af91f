//! Compound-assignment transformer (§4.I): rewrites `a OP= b` into `a = a OP b`. When `a` is
//! not a pure l-value read (anything beyond a bare variable, field or swizzle access — an index
//! expression with a side-effecting subscript, for instance) its address is evaluated once into
//! a temporary so the lowered form doesn't duplicate side effects.

use nzsl_ast::{
    context::TransformerContext,
    enums::AssignOp,
    errors::NzslResult,
    expressions::{Expression, ExpressionKind},
    statements::{Statement, StatementKind},
    transformer::{Transformer, TransformerState, VisitAction},
};

/// Rewrites every compound assignment (`+=`, `-=`, `*=`, `/=`, `%=`, bitwise/logical variants)
/// in `module` into a plain assignment of a binary expression.
pub fn lower_compound_assignments(module: &mut nzsl_ast::module::Module, ctx: &mut TransformerContext) -> NzslResult<()> {
    CompoundAssignLowering.transform(ctx, module)
}

struct CompoundAssignLowering;

impl Transformer for CompoundAssignLowering {
    fn visit_expression(&mut self, ctx: &mut TransformerContext, state: &mut TransformerState, expr: &Expression) -> NzslResult<VisitAction<Expression>> {
        let ExpressionKind::Assign { op, lhs, rhs } = &expr.kind else {
            return Ok(VisitAction::VisitChildren);
        };
        let Some(binary_op) = op.binary_op() else {
            return Ok(VisitAction::VisitChildren);
        };

        let lhs_read = if is_simple_lvalue(lhs) { (**lhs).clone() } else { state.cache_expression(ctx, (**lhs).clone(), "compound_lhs") };

        let rewritten = Expression::with_type(
            expr.location.clone(),
            ExpressionKind::Assign {
                op: AssignOp::Simple,
                lhs: lhs.clone(),
                rhs: Box::new(Expression::with_type(
                    expr.location.clone(),
                    ExpressionKind::Binary { op: binary_op, lhs: Box::new(lhs_read), rhs: rhs.clone() },
                    rhs.cached_type.clone().unwrap_or(nzsl_ast::types::Type::NoType),
                )),
            },
            expr.cached_type.clone().unwrap_or(nzsl_ast::types::Type::NoType),
        );
        Ok(VisitAction::Replace(Box::new(rewritten)))
    }
}

/// A read that can be repeated without re-evaluating any side-effecting subexpression: a bare
/// variable, a field access, or a swizzle, all rooted (recursively) in one of the same.
fn is_simple_lvalue(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::VariableValue(_) => true,
        ExpressionKind::AccessField { expr: inner, .. } | ExpressionKind::Swizzle { expr: inner, .. } => is_simple_lvalue(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{
        context::{ContextOptions, VariableData},
        enums::BinaryOp,
        location::SourceLocation,
        module::{Module, ModuleMetadata},
        types::{PrimitiveType, Type},
    };

    #[test]
    fn plus_equals_expands_into_plain_assignment_of_addition() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let id = ctx.register_variable(VariableData { name: "x".into(), r#type: Type::Primitive(PrimitiveType::I32), is_const: false });
        let lhs = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(id), Type::Primitive(PrimitiveType::I32));
        let rhs = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::I32(1)),
            Type::Primitive(PrimitiveType::I32),
        );
        let assign = Expression::new(SourceLocation::synthetic(), ExpressionKind::Assign { op: AssignOp::CompoundAdd, lhs: Box::new(lhs), rhs: Box::new(rhs) });

        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(assign))];
        lower_compound_assignments(&mut module, &mut ctx).unwrap();

        let statements = module.top_level_statements();
        assert_eq!(statements.len(), 1);
        let StatementKind::Expression(expr) = &statements[0].kind else { panic!("expected an expression statement") };
        let ExpressionKind::Assign { op, rhs, .. } = &expr.kind else { panic!("expected an assignment") };
        assert_eq!(*op, AssignOp::Simple);
        assert!(matches!(rhs.kind, ExpressionKind::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn indexed_lhs_is_cached_once_before_use() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let array_type = Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::I32)), length: 4 };
        let id = ctx.register_variable(VariableData { name: "arr".into(), r#type: array_type.clone(), is_const: false });
        let base = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(id), array_type);
        let index = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::U32(0)),
            Type::Primitive(PrimitiveType::U32),
        );
        let lhs = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::AccessIndex { expr: Box::new(base), indices: vec![index] },
            Type::Primitive(PrimitiveType::I32),
        );
        let rhs = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::I32(1)),
            Type::Primitive(PrimitiveType::I32),
        );
        let assign = Expression::new(SourceLocation::synthetic(), ExpressionKind::Assign { op: AssignOp::CompoundAdd, lhs: Box::new(lhs), rhs: Box::new(rhs) });

        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Expression(assign))];
        lower_compound_assignments(&mut module, &mut ctx).unwrap();

        // the cached index read hoists a DeclareVariable ahead of the rewritten assignment.
        let statements = module.top_level_statements();
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0].kind, StatementKind::DeclareVariable { .. }));
    }
}
