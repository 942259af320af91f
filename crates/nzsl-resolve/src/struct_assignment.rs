//! Struct-assignment splitter (§4.I): when the source and destination of a struct (or
//! array-of-struct) assignment are laid out differently in memory — different `ArrayStride`
//! under their respective host-sharing layouts, or a `[cond(false)]` member present on one side
//! and not the other — a single aggregate copy can't be emitted. This pass rewrites the
//! assignment into field-by-field (and, for arrays, element-by-element) assignments instead,
//! recursing into nested structs and arrays, and guards each copied member by its `[cond]`
//! attribute when that attribute hasn't already collapsed to a known constant.
//!
//! A standalone recursive walker, not a [`crate::Transformer`] pass: the replacement for one
//! `Statement` is itself a list of statements (one assignment per member), which doesn't fit
//! `VisitAction::Replace`'s one-node-for-one-node shape. `StatementKind::Multi` nests anywhere a
//! `Statement` can appear and introduces no scope of its own (§4.D), so wrapping the generated
//! list in a nested `Multi` in place of the original statement is transparent to name lookup.

use nzsl_ast::{
    context::TransformerContext,
    enums::{AssignOp, StructLayout},
    errors::NzslResult,
    expressions::{Expression, ExpressionKind, ExpressionValue},
    location::SourceLocation,
    statements::{Statement, StatementKind, StructField},
    types::{FieldOffsets, StructRef, Type},
};

/// Splits every layout-incompatible struct/array assignment in `module` into member-by-member
/// assignments.
pub fn split_struct_assignments(module: &mut nzsl_ast::module::Module, ctx: &mut TransformerContext) -> NzslResult<()> {
    split_statement(&mut module.root, ctx)
}

fn split_statement(stmt: &mut Statement, ctx: &mut TransformerContext) -> NzslResult<()> {
    match &mut stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements.iter_mut() {
                split_statement(s, ctx)?;
            }
            return Ok(());
        }
        StatementKind::Scoped(inner) | StatementKind::Conditional { statement: inner, .. } => return split_statement(inner, ctx),
        StatementKind::DeclareFunction { body, .. } => return split_statement(body, ctx),
        StatementKind::For { body, .. } | StatementKind::ForEach { body, .. } | StatementKind::While { body, .. } => return split_statement(body, ctx),
        StatementKind::Branch { arms, else_statement, .. } => {
            for arm in arms.iter_mut() {
                split_statement(&mut arm.body, ctx)?;
            }
            if let Some(else_stmt) = else_statement {
                split_statement(else_stmt, ctx)?;
            }
            return Ok(());
        }
        _ => {}
    }

    let location = stmt.location.clone();
    let replacement = match &mut stmt.kind {
        StatementKind::Expression(expr) => match &mut expr.kind {
            ExpressionKind::Assign { op: AssignOp::Simple, lhs, rhs } => {
                let (Some(lhs_ty), Some(rhs_ty)) = (lhs.cached_type.clone(), rhs.cached_type.clone()) else {
                    return Ok(());
                };
                if !layouts_incompatible(ctx, &lhs_ty, &rhs_ty) {
                    return Ok(());
                }
                Some(split_value_assignment(ctx, (**lhs).clone(), (**rhs).clone(), &lhs_ty, &rhs_ty, &location))
            }
            _ => None,
        },
        StatementKind::DeclareVariable { name, r#type, initial_value: Some(init), var_id: Some(var_id) } => {
            let dst_ty = ctx.variable(*var_id).map(|v| v.r#type.clone()).or_else(|| r#type.clone());
            let Some(dst_ty) = dst_ty else { return Ok(()) };
            let Some(src_ty) = init.cached_type.clone() else { return Ok(()) };
            if !layouts_incompatible(ctx, &dst_ty, &src_ty) {
                return Ok(());
            }
            let src = init.clone();
            let dst_var = Expression::with_type(location.clone(), ExpressionKind::VariableValue(*var_id), dst_ty.clone());
            let mut statements = vec![Statement::new(
                location.clone(),
                StatementKind::DeclareVariable { name: name.clone(), r#type: r#type.clone(), initial_value: None, var_id: Some(*var_id) },
            )];
            statements.extend(split_value_assignment(ctx, dst_var, src, &dst_ty, &src_ty, &location));
            Some(statements)
        }
        _ => None,
    };

    if let Some(statements) = replacement {
        *stmt = Statement::new(location, StatementKind::Multi(statements));
    }
    Ok(())
}

/// Whether `lhs`/`rhs` need member-by-member copying rather than one aggregate assignment.
fn layouts_incompatible(ctx: &TransformerContext, lhs: &Type, rhs: &Type) -> bool {
    let lhs = lhs.resolve_alias();
    let rhs = rhs.resolve_alias();
    match (struct_shape(lhs), struct_shape(rhs)) {
        (Some((lhs_ref, lhs_layout)), Some((rhs_ref, rhs_layout))) => {
            if lhs_ref.struct_id == rhs_ref.struct_id && lhs_layout == rhs_layout {
                return false;
            }
            !fields_layout_equal(ctx, lhs_ref, lhs_layout, rhs_ref, rhs_layout)
        }
        _ => match (lhs, rhs) {
            (Type::Array { inner: lhs_inner, length: lhs_len }, Type::Array { inner: rhs_inner, length: rhs_len }) => {
                lhs_len != rhs_len
                    || FieldOffsets::new(StructLayout::Std140).array_stride(lhs_inner) != FieldOffsets::new(StructLayout::Std140).array_stride(rhs_inner)
                    || layouts_incompatible(ctx, lhs_inner, rhs_inner)
            }
            _ => false,
        },
    }
}

fn struct_shape(ty: &Type) -> Option<(&StructRef, StructLayout)> {
    match ty {
        Type::Struct(r) => Some((r, StructLayout::Packed)),
        Type::Uniform(r) => Some((r, StructLayout::Std140)),
        Type::Storage { structure, .. } => Some((structure, StructLayout::Std430)),
        Type::PushConstant(r) => Some((r, StructLayout::Std430)),
        _ => None,
    }
}

fn fields_layout_equal(ctx: &TransformerContext, lhs_ref: &StructRef, lhs_layout: StructLayout, rhs_ref: &StructRef, rhs_layout: StructLayout) -> bool {
    let (Some(lhs_fields), Some(rhs_fields)) = (resolved_fields(ctx, lhs_ref.struct_id), resolved_fields(ctx, rhs_ref.struct_id)) else {
        return lhs_ref.struct_id == rhs_ref.struct_id;
    };
    if lhs_fields.len() != rhs_fields.len() {
        return false;
    }
    let lhs_types: Vec<Type> = lhs_fields.iter().map(|f| f.r#type.clone()).collect();
    let rhs_types: Vec<Type> = rhs_fields.iter().map(|f| f.r#type.clone()).collect();
    let (lhs_offsets, lhs_size) = FieldOffsets::new(lhs_layout).field_offsets(&lhs_types);
    let (rhs_offsets, rhs_size) = FieldOffsets::new(rhs_layout).field_offsets(&rhs_types);
    if lhs_size != rhs_size || lhs_offsets != rhs_offsets {
        return false;
    }
    lhs_fields
        .iter()
        .zip(rhs_fields.iter())
        .all(|(l, r)| l.name == r.name && resolved_cond(&l.attributes.cond) == resolved_cond(&r.attributes.cond))
}

fn resolved_fields(ctx: &TransformerContext, struct_id: nzsl_ast::ids::StructId) -> Option<Vec<StructField>> {
    ctx.struct_data(struct_id).map(|data| data.description.fields.clone())
}

fn resolved_cond(cond: &Option<ExpressionValue<bool>>) -> Option<bool> {
    match cond {
        Some(ExpressionValue::Resolved(b)) => Some(*b),
        _ => None,
    }
}

fn split_value_assignment(ctx: &TransformerContext, dst: Expression, src: Expression, dst_ty: &Type, src_ty: &Type, location: &SourceLocation) -> Vec<Statement> {
    let dst_resolved = dst_ty.resolve_alias();
    let src_resolved = src_ty.resolve_alias();

    if let (Some((dst_ref, _)), Some((src_ref, _))) = (struct_shape(dst_resolved), struct_shape(src_resolved)) {
        let (Some(dst_fields), Some(src_fields)) = (resolved_fields(ctx, dst_ref.struct_id), resolved_fields(ctx, src_ref.struct_id)) else {
            return vec![plain_assign(dst, src, location)];
        };
        let mut statements = Vec::new();
        for (dst_index, dst_field) in dst_fields.iter().enumerate() {
            if resolved_cond(&dst_field.attributes.cond) == Some(false) {
                continue;
            }
            let Some((src_index, src_field)) = src_fields.iter().enumerate().find(|(_, f)| f.name == dst_field.name) else {
                continue;
            };
            if resolved_cond(&src_field.attributes.cond) == Some(false) {
                continue;
            }
            let dst_field_expr = Expression::with_type(
                location.clone(),
                ExpressionKind::AccessField { expr: Box::new(dst.clone()), field_index: dst_index as u32 },
                dst_field.r#type.clone(),
            );
            let src_field_expr = Expression::with_type(
                location.clone(),
                ExpressionKind::AccessField { expr: Box::new(src.clone()), field_index: src_index as u32 },
                src_field.r#type.clone(),
            );
            let member_statements = if layouts_incompatible(ctx, &dst_field.r#type, &src_field.r#type) {
                split_value_assignment(ctx, dst_field_expr, src_field_expr, &dst_field.r#type, &src_field.r#type, location)
            } else {
                vec![plain_assign(dst_field_expr, src_field_expr, location)]
            };
            statements.extend(guard_by_cond(&dst_field.attributes.cond, member_statements, location));
        }
        return statements;
    }

    if let (Type::Array { inner: dst_inner, length: dst_len }, Type::Array { inner: src_inner, length: src_len }) = (dst_resolved, src_resolved) {
        let count = (*dst_len).min(*src_len);
        let mut statements = Vec::with_capacity(count as usize);
        for i in 0..count {
            let index_expr = |base: &Expression, ty: &Type| {
                let index = Expression::with_type(
                    location.clone(),
                    ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::U32(i)),
                    Type::Primitive(nzsl_ast::types::PrimitiveType::U32),
                );
                Expression::with_type(location.clone(), ExpressionKind::AccessIndex { expr: Box::new(base.clone()), indices: vec![index] }, ty.clone())
            };
            let dst_elem = index_expr(&dst, dst_inner);
            let src_elem = index_expr(&src, src_inner);
            if layouts_incompatible(ctx, dst_inner, src_inner) {
                statements.extend(split_value_assignment(ctx, dst_elem, src_elem, dst_inner, src_inner, location));
            } else {
                statements.push(plain_assign(dst_elem, src_elem, location));
            }
        }
        return statements;
    }

    vec![plain_assign(dst, src, location)]
}

fn guard_by_cond(cond: &Option<ExpressionValue<bool>>, statements: Vec<Statement>, location: &SourceLocation) -> Vec<Statement> {
    match cond {
        Some(ExpressionValue::Unresolved(expr)) => {
            vec![Statement::new(
                location.clone(),
                StatementKind::Conditional {
                    condition: (**expr).clone(),
                    statement: Box::new(Statement::new(location.clone(), StatementKind::Multi(statements))),
                },
            )]
        }
        _ => statements,
    }
}

fn plain_assign(dst: Expression, src: Expression, location: &SourceLocation) -> Statement {
    Statement::new(
        location.clone(),
        StatementKind::Expression(Expression::new(location.clone(), ExpressionKind::Assign { op: AssignOp::Simple, lhs: Box::new(dst), rhs: Box::new(src) })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{
        context::{ContextOptions, StructData, VariableData},
        ids::StructId,
        module::{Module, ModuleMetadata},
        statements::{StructDescription, StructFieldAttributes},
        types::PrimitiveType,
    };

    fn field(name: &str, ty: Type) -> StructField {
        StructField { name: name.into(), r#type: ty, attributes: StructFieldAttributes::default() }
    }

    fn register_struct(ctx: &mut TransformerContext, name: &str, fields: Vec<StructField>) -> StructId {
        ctx.register_struct(StructData { description: StructDescription { name: name.into(), layout: None, fields }, module_index: None })
    }

    #[test]
    fn identical_struct_same_layout_is_not_split() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let sid = register_struct(&mut ctx, "Point", vec![field("x", Type::Primitive(PrimitiveType::F32))]);
        let struct_ty = Type::Struct(StructRef::resolved("Point", sid));
        assert!(!layouts_incompatible(&ctx, &struct_ty, &struct_ty));
    }

    #[test]
    fn uniform_wrapped_struct_with_f32_array_splits_against_plain_struct() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let array_ty = Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::F32)), length: 4 };
        let sid = register_struct(&mut ctx, "Weights", vec![field("values", array_ty)]);
        let uniform_ty = Type::Uniform(StructRef::resolved("Weights", sid));
        let plain_ty = Type::Struct(StructRef::resolved("Weights", sid));
        assert!(layouts_incompatible(&ctx, &plain_ty, &uniform_ty));
    }

    #[test]
    fn incompatible_struct_declaration_is_split_field_by_field() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let array_ty = Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::F32)), length: 4 };
        let sid = register_struct(&mut ctx, "Weights", vec![field("values", array_ty)]);
        let uniform_ty = Type::Uniform(StructRef::resolved("Weights", sid));
        let plain_ty = Type::Struct(StructRef::resolved("Weights", sid));

        let src_id = ctx.register_variable(VariableData { name: "src".into(), r#type: uniform_ty.clone(), is_const: false });
        let dst_id = ctx.register_variable(VariableData { name: "dst".into(), r#type: plain_ty.clone(), is_const: false });
        let init = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(src_id), uniform_ty);
        let mut stmt = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::DeclareVariable { name: "dst".into(), r#type: Some(plain_ty), initial_value: Some(init), var_id: Some(dst_id) },
        );
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![std::mem::replace(&mut stmt, Statement::new(SourceLocation::synthetic(), StatementKind::NoOp))];
        split_struct_assignments(&mut module, &mut ctx).unwrap();
        let StatementKind::Multi(statements) = &module.top_level_statements()[0].kind else { panic!("expected a Multi replacement") };
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0].kind, StatementKind::DeclareVariable { initial_value: None, .. }));
        assert!(matches!(statements[1].kind, StatementKind::Expression(_)));
    }
}
