//! Std140 emulation (§4.I). `std140` requires every array element and every nested struct to sit
//! on a 16-byte boundary; a lot of member types (a bare `f32`, a `vec2`) don't naturally reach
//! that alignment. Rather than leave the 16-byte stride implicit (which back-ends that lay out
//! structs member-by-member would get wrong), this pass makes it concrete:
//!
//! - Every array element type smaller than 16 bytes is replaced by a synthetic wrapper struct
//!   (`{ value: T, _pad: array<u32, N> }`) sized exactly 16 bytes; one wrapper is created per
//!   distinct element type and shared across every array that needs it.
//! - Struct members that need 16-byte alignment but would not naturally land on one get an
//!   explicit `array<u32, N>` padding member inserted ahead of them.
//! - Every `AccessIndex` into a now-wrapped array is followed by an implicit `.value` field read
//!   so the rest of the tree keeps seeing the original element type.
//!
//! A standalone walker: the struct rewriting has to run to a fixed point over the context's
//! struct table (not the module tree) before any expression can be fixed up against it, which
//! doesn't fit the node-at-a-time shape of [`crate::Transformer`].

use nzsl_ast::{
    context::TransformerContext,
    enums::StructLayout,
    errors::NzslResult,
    expressions::{Expression, ExpressionKind},
    ids::StructId,
    module::Module,
    statements::{Statement, StatementKind, StructField, StructFieldAttributes},
    types::{FieldOffsets, PrimitiveType, StructRef, Type},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Std140EmulationOptions {}

/// One synthetic `{ value: T, _pad: array<u32, N> }` wrapper, keyed by the element type it
/// stands in for.
struct WrapperCatalogue {
    entries: Vec<(Type, StructId)>,
}

impl WrapperCatalogue {
    fn get_or_create(&mut self, ctx: &mut TransformerContext, inner: &Type) -> StructId {
        if let Some((_, id)) = self.entries.iter().find(|(ty, _)| ty == inner) {
            return *id;
        }
        let layout = FieldOffsets::new(StructLayout::Packed);
        let size = layout.size(inner);
        let pad_words = (16u32.saturating_sub(size)) / 4;
        let mut fields = vec![StructField { name: "value".into(), r#type: inner.clone(), attributes: StructFieldAttributes::default() }];
        if pad_words > 0 {
            fields.push(StructField {
                name: "_pad".into(),
                r#type: Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::U32)), length: pad_words },
                attributes: StructFieldAttributes::default(),
            });
        }
        let name = format!("_nzsl_std140_wrap_{}", self.entries.len());
        let id = ctx.register_struct(nzsl_ast::context::StructData {
            description: nzsl_ast::statements::StructDescription { name, layout: Some(StructLayout::Std140), fields },
            module_index: None,
        });
        self.entries.push((inner.clone(), id));
        id
    }
}

/// Wraps every array element and pads every struct member that needs emulated std140
/// alignment, and fixes up the accesses that wrapping disturbs.
pub fn emulate_std140(module: &mut Module, ctx: &mut TransformerContext, _options: Std140EmulationOptions) -> NzslResult<()> {
    let required = structs_requiring_std140(ctx);
    if required.is_empty() {
        return Ok(());
    }

    let mut catalogue = WrapperCatalogue { entries: Vec::new() };
    for struct_id in required {
        let Some(mut fields) = ctx.struct_data(struct_id).map(|d| d.description.fields.clone()) else {
            continue;
        };
        for field in &mut fields {
            if let Type::Array { inner, length } = &field.r#type {
                if FieldOffsets::new(StructLayout::Std430).alignment(inner) < 16 {
                    let wrapper_id = catalogue.get_or_create(ctx, inner);
                    field.r#type = Type::Array { inner: Box::new(Type::Struct(StructRef::resolved(format!("{inner:?}"), wrapper_id))), length: *length };
                }
            }
        }
        let padded = insert_std140_padding(fields);
        if let Some(data) = ctx.struct_data_mut(struct_id) {
            data.description.fields = padded;
            data.description.layout = Some(StructLayout::Std140);
        }
    }

    if !catalogue.entries.is_empty() {
        fixup_statement(&mut module.root, &catalogue.entries);
    }
    Ok(())
}

fn structs_requiring_std140(ctx: &TransformerContext) -> Vec<StructId> {
    let mut ids: Vec<StructId> = ctx
        .iter_structs()
        .filter(|(_, data)| data.description.layout == Some(StructLayout::Std140))
        .map(|(id, _)| id)
        .collect();
    for (_, variable) in ctx.iter_variables() {
        if let Type::Uniform(struct_ref) = variable.r#type.resolve_alias() {
            if !ids.contains(&struct_ref.struct_id) {
                ids.push(struct_ref.struct_id);
            }
        }
    }
    ids
}

fn insert_std140_padding(fields: Vec<StructField>) -> Vec<StructField> {
    let layout = FieldOffsets::new(StructLayout::Std140);
    let mut out = Vec::with_capacity(fields.len());
    let mut cursor = 0u32;
    let mut pad_index = 0;
    for field in fields {
        let align = layout.alignment(&field.r#type).max(1);
        let aligned = round_up(cursor, align);
        if aligned > cursor {
            let gap_words = (aligned - cursor) / 4;
            out.push(StructField {
                name: format!("_pad{pad_index}"),
                r#type: Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::U32)), length: gap_words },
                attributes: StructFieldAttributes::default(),
            });
            pad_index += 1;
        }
        cursor = aligned + layout.size(&field.r#type);
        out.push(field);
    }
    out
}

fn round_up(value: u32, alignment: u32) -> u32 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

fn wrapper_of(entries: &[(Type, StructId)], inner: &Type) -> Option<StructId> {
    entries.iter().find(|(ty, _)| ty == inner).map(|(_, id)| *id)
}

fn fixup_statement(stmt: &mut Statement, wrap_map: &[(Type, StructId)]) {
    match &mut stmt.kind {
        StatementKind::Multi(statements) => statements.iter_mut().for_each(|s| fixup_statement(s, wrap_map)),
        StatementKind::Scoped(inner) | StatementKind::Conditional { statement: inner, .. } => fixup_statement(inner, wrap_map),
        StatementKind::DeclareFunction { body, .. } => fixup_statement(body, wrap_map),
        StatementKind::For { body, from, to, step, .. } => {
            fixup_expression(from, wrap_map);
            fixup_expression(to, wrap_map);
            if let Some(step) = step {
                fixup_expression(step, wrap_map);
            }
            fixup_statement(body, wrap_map);
        }
        StatementKind::ForEach { body, container, .. } => {
            fixup_expression(container, wrap_map);
            fixup_statement(body, wrap_map);
        }
        StatementKind::While { body, condition, .. } => {
            fixup_expression(condition, wrap_map);
            fixup_statement(body, wrap_map);
        }
        StatementKind::Branch { arms, else_statement, .. } => {
            for arm in arms.iter_mut() {
                fixup_expression(&mut arm.condition, wrap_map);
                fixup_statement(&mut arm.body, wrap_map);
            }
            if let Some(else_stmt) = else_statement {
                fixup_statement(else_stmt, wrap_map);
            }
        }
        StatementKind::DeclareConst { value, .. } => fixup_expression(value, wrap_map),
        StatementKind::DeclareVariable { initial_value: Some(value), .. } => fixup_expression(value, wrap_map),
        StatementKind::DeclareOption { default_value: Some(value), .. } => fixup_expression(value, wrap_map),
        StatementKind::Expression(expr) => fixup_expression(expr, wrap_map),
        StatementKind::Return(Some(expr)) => fixup_expression(expr, wrap_map),
        _ => {}
    }
}

/// Fixes up `expr` bottom-up: children are rewritten first so that, by the time an `AccessIndex`
/// examines its base's type, that type already reflects any wrapping applied further down.
fn fixup_expression(expr: &mut Expression, wrap_map: &[(Type, StructId)]) {
    match &mut expr.kind {
        ExpressionKind::AccessField { expr: inner, .. } | ExpressionKind::Swizzle { expr: inner, .. } | ExpressionKind::Unary { expr: inner, .. } => {
            fixup_expression(inner, wrap_map);
        }
        ExpressionKind::AccessIdentifier { expr: inner, .. } => fixup_expression(inner, wrap_map),
        ExpressionKind::AccessIndex { expr: inner, indices } => {
            fixup_expression(inner, wrap_map);
            for index in indices.iter_mut() {
                fixup_expression(index, wrap_map);
            }
            let wrapped = match inner.cached_type.as_ref().map(Type::resolve_alias) {
                Some(Type::Array { inner: element, .. }) => wrapper_of(wrap_map, element),
                _ => None,
            };
            if let Some(wrapper_id) = wrapped {
                let wrapped_type = Type::Struct(StructRef::resolved("_nzsl_std140_wrap", wrapper_id));
                let original_type = expr.cached_type.clone().unwrap_or(Type::NoType);
                let location = expr.location.clone();
                let original_kind = std::mem::replace(&mut expr.kind, ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::U32(0)));
                let wrapped_access = Expression::with_type(location, original_kind, wrapped_type);
                expr.kind = ExpressionKind::AccessField { expr: Box::new(wrapped_access), field_index: 0 };
                expr.cached_type = Some(original_type);
            }
        }
        ExpressionKind::Assign { lhs, rhs, .. } | ExpressionKind::Binary { lhs, rhs, .. } => {
            fixup_expression(lhs, wrap_map);
            fixup_expression(rhs, wrap_map);
        }
        ExpressionKind::CallFunction { target, params } => {
            fixup_expression(target, wrap_map);
            params.iter_mut().for_each(|p| fixup_expression(p, wrap_map));
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            fixup_expression(object, wrap_map);
            params.iter_mut().for_each(|p| fixup_expression(p, wrap_map));
        }
        ExpressionKind::Cast { exprs, .. } | ExpressionKind::Intrinsic { params: exprs, .. } => {
            exprs.iter_mut().for_each(|e| fixup_expression(e, wrap_map));
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            fixup_expression(condition, wrap_map);
            fixup_expression(true_path, wrap_map);
            fixup_expression(false_path, wrap_map);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{
        context::{ContextOptions, StructData, VariableData},
        location::SourceLocation,
        module::ModuleMetadata,
        statements::StructDescription,
    };

    fn f32_array_struct(ctx: &mut TransformerContext) -> StructId {
        ctx.register_struct(StructData {
            description: StructDescription {
                name: "Weights".into(),
                layout: Some(StructLayout::Std140),
                fields: vec![StructField {
                    name: "values".into(),
                    r#type: Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::F32)), length: 4 },
                    attributes: StructFieldAttributes::default(),
                }],
            },
            module_index: None,
        })
    }

    #[test]
    fn f32_array_elements_are_wrapped_to_16_bytes() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let struct_id = f32_array_struct(&mut ctx);
        let mut module = Module::new(ModuleMetadata::default());
        emulate_std140(&mut module, &mut ctx, Std140EmulationOptions::default()).unwrap();
        let fields = &ctx.struct_data(struct_id).unwrap().description.fields;
        let Type::Array { inner, .. } = &fields[0].r#type else { panic!("expected array field") };
        assert!(matches!(**inner, Type::Struct(_)));
    }

    #[test]
    fn uniform_variable_struct_is_picked_up_without_explicit_layout_attribute() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let struct_id = ctx.register_struct(StructData {
            description: StructDescription {
                name: "Params".into(),
                layout: None,
                fields: vec![StructField {
                    name: "scale".into(),
                    r#type: Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::F32)), length: 2 },
                    attributes: StructFieldAttributes::default(),
                }],
            },
            module_index: None,
        });
        ctx.register_variable(VariableData { name: "params".into(), r#type: Type::Uniform(StructRef::resolved("Params", struct_id)), is_const: false });
        let mut module = Module::new(ModuleMetadata::default());
        emulate_std140(&mut module, &mut ctx, Std140EmulationOptions::default()).unwrap();
        let fields = &ctx.struct_data(struct_id).unwrap().description.fields;
        let Type::Array { inner, .. } = &fields[0].r#type else { panic!("expected array field") };
        assert!(matches!(**inner, Type::Struct(_)));
    }

    #[test]
    fn access_into_wrapped_array_gains_a_value_field_read() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let struct_id = f32_array_struct(&mut ctx);
        let array_ty = Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::F32)), length: 4 };
        let var_id = ctx.register_variable(VariableData { name: "weights".into(), r#type: array_ty.clone(), is_const: false });
        let base = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(var_id), array_ty);
        let index = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::U32(0)),
            Type::Primitive(PrimitiveType::U32),
        );
        let mut access = Expression::with_type(
            SourceLocation::synthetic(),
            ExpressionKind::AccessIndex { expr: Box::new(base), indices: vec![index] },
            Type::Primitive(PrimitiveType::F32),
        );
        let mut module = Module::new(ModuleMetadata::default());
        emulate_std140(&mut module, &mut ctx, Std140EmulationOptions::default()).unwrap();
        // the fixup runs over module.root in the real pipeline; exercised directly here since this
        // access lives outside of any declared module statement.
        let wrap_map: Vec<(Type, StructId)> = ctx
            .iter_structs()
            .filter(|(_, d)| d.description.name.starts_with("_nzsl_std140_wrap"))
            .map(|(id, _)| (Type::Primitive(PrimitiveType::F32), id))
            .collect();
        fixup_expression(&mut access, &wrap_map);
        assert!(matches!(access.kind, ExpressionKind::AccessField { field_index: 0, .. }));
        assert_eq!(access.cached_type, Some(Type::Primitive(PrimitiveType::F32)));
    }
}
