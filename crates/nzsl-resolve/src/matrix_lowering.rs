//! Matrix transformer (§4.I): lowers matrix `+`/`-` into column-wise operations on a hoisted
//! temporary, and lowers a matrix-to-matrix `Cast` into a per-column construction that pads the
//! destination's diagonal with `1` and off-diagonal entries with `0` when growing the shape.
//!
//! Both rewrites need a temporary to hold the in-progress result while its columns are filled
//! one at a time, so this pass goes through [`nzsl_ast::transformer::Transformer`] rather than a
//! bespoke walker — it's the one customer `TransformerState::declare_variable`/
//! `cache_expression` (the "`let _nzsl_matrix: mat4[f32];` injected before an assignment that
//! will fill its columns" example named directly in §4.D) was written for.

use nzsl_ast::{
    constants::ConstantSingleValue,
    context::TransformerContext,
    enums::{AssignOp, BinaryOp},
    errors::{CompilerErrorKind, NzslError, NzslResult},
    expressions::{Expression, ExpressionKind},
    location::SourceLocation,
    module::Module,
    transformer::{Transformer, TransformerState, VisitAction},
    types::{PrimitiveType, Type},
};

/// Lowers every matrix `+`/`-` and matrix-to-matrix cast in `module` into column-wise
/// temporary-based constructions.
pub fn lower_matrices(module: &mut Module, ctx: &mut TransformerContext) -> NzslResult<()> {
    MatrixLowering.transform(ctx, module)
}

struct MatrixLowering;

impl Transformer for MatrixLowering {
    fn visit_expression(&mut self, ctx: &mut TransformerContext, state: &mut TransformerState, expr: &Expression) -> NzslResult<VisitAction<Expression>> {
        match &expr.kind {
            ExpressionKind::Binary { op: op @ (BinaryOp::Add | BinaryOp::Subtract), lhs, rhs } if is_matrix(lhs) && is_matrix(rhs) => {
                Ok(VisitAction::Replace(Box::new(lower_matrix_binary(expr, *op, lhs, rhs, ctx, state)?)))
            }
            ExpressionKind::Cast { target_type, exprs } if exprs.len() == 1 && is_matrix_type(target_type) && is_matrix(&exprs[0]) => {
                Ok(VisitAction::Replace(Box::new(lower_matrix_cast(expr, target_type, &exprs[0], ctx, state)?)))
            }
            _ => Ok(VisitAction::VisitChildren),
        }
    }
}

fn is_matrix_type(ty: &Type) -> bool {
    matches!(ty.resolve_alias(), Type::Matrix { .. })
}

fn is_matrix(expr: &Expression) -> bool {
    expr.cached_type.as_ref().is_some_and(is_matrix_type)
}

fn matrix_shape(ty: &Type) -> Option<(u32, u32, PrimitiveType)> {
    ty.as_matrix()
}

fn column_vector_type(rows: u32, component_type: PrimitiveType) -> Type {
    Type::Vector { component_count: rows, component_type }
}

fn column_access(matrix: &Expression, column: u32, column_type: Type, location: SourceLocation) -> Expression {
    Expression::with_type(
        location.clone(),
        ExpressionKind::AccessIndex {
            expr: Box::new(matrix.clone()),
            indices: vec![Expression::with_type(location, ExpressionKind::ConstantValue(ConstantSingleValue::U32(column)), Type::Primitive(PrimitiveType::U32))],
        },
        column_type,
    )
}

/// Rewrites `mat_a + mat_b` (or `-`) into a temporary filled column by column: `let _t: matNxM;
/// _t[0] = a[0] OP b[0]; ...; _t[N-1] = a[N-1] OP b[N-1];` with the final expression reading
/// `_t` back.
fn lower_matrix_binary(expr: &Expression, op: BinaryOp, lhs: &Expression, rhs: &Expression, ctx: &mut TransformerContext, state: &mut TransformerState) -> NzslResult<Expression> {
    let location = expr.location.clone();
    let matrix_type = expr.cached_type.clone().unwrap_or_else(|| lhs.cached_type.clone().unwrap());
    let (columns, rows, component_type) = matrix_shape(&matrix_type)
        .ok_or_else(|| NzslError::compiler(CompilerErrorKind::BinaryIncompatibleTypes, location.clone(), "matrix binary lowering requires a matrix result type"))?;

    let lhs_temp = state.cache_expression(ctx, lhs.clone(), "matrix_lhs");
    let rhs_temp = state.cache_expression(ctx, rhs.clone(), "matrix_rhs");
    let result_id = state.declare_variable(ctx, "matrix_result", matrix_type.clone(), None, location.clone());
    let column_type = column_vector_type(rows, component_type);

    for column in 0..columns {
        let lhs_col = column_access(&lhs_temp, column, column_type.clone(), location.clone());
        let rhs_col = column_access(&rhs_temp, column, column_type.clone(), location.clone());
        let sum = Expression::with_type(location.clone(), ExpressionKind::Binary { op, lhs: Box::new(lhs_col), rhs: Box::new(rhs_col) }, column_type.clone());
        let result_expr = Expression::with_type(location.clone(), ExpressionKind::VariableValue(result_id), matrix_type.clone());
        let assign = Expression::new(
            location.clone(),
            ExpressionKind::Assign { op: AssignOp::Simple, lhs: Box::new(column_access(&result_expr, column, column_type.clone(), location.clone())), rhs: Box::new(sum) },
        );
        state.append_statement(nzsl_ast::statements::Statement::new(location.clone(), nzsl_ast::statements::StatementKind::Expression(assign)));
    }

    Ok(Expression::with_type(location, ExpressionKind::VariableValue(result_id), matrix_type))
}

/// Rewrites `matN[T](matM[U])` into a construction that copies as many rows/columns as overlap
/// between the source and destination shapes, padding the destination's diagonal with `1` and
/// every other out-of-range cell with `0` (§4.I matrix transformer).
fn lower_matrix_cast(expr: &Expression, target_type: &Type, source: &Expression, ctx: &mut TransformerContext, state: &mut TransformerState) -> NzslResult<Expression> {
    let location = expr.location.clone();
    let (dst_columns, dst_rows, dst_component) = matrix_shape(target_type)
        .ok_or_else(|| NzslError::compiler(CompilerErrorKind::CastIncompatibleTypes, location.clone(), "matrix cast lowering requires a matrix destination type"))?;
    let (src_columns, src_rows, _src_component) = source
        .cached_type
        .as_ref()
        .and_then(matrix_shape)
        .ok_or_else(|| NzslError::compiler(CompilerErrorKind::CastIncompatibleTypes, location.clone(), "matrix cast lowering requires a matrix source type"))?;

    let source_temp = state.cache_expression(ctx, source.clone(), "matrix_cast_src");
    let result_id = state.declare_variable(ctx, "matrix_cast", target_type.clone(), None, location.clone());
    let dst_column_type = column_vector_type(dst_rows, dst_component);
    let src_column_type = column_vector_type(src_rows, dst_component);

    for column in 0..dst_columns {
        let mut components = Vec::with_capacity(dst_rows as usize);
        if column < src_columns {
            let src_col = column_access(&source_temp, column, src_column_type.clone(), location.clone());
            for row in 0..dst_rows {
                if row < src_rows {
                    components.push(swizzle_one(&src_col, row, dst_component, location.clone()));
                } else {
                    components.push(diagonal_fill(row, column, dst_component, location.clone()));
                }
            }
        } else {
            for row in 0..dst_rows {
                components.push(diagonal_fill(row, column, dst_component, location.clone()));
            }
        }
        let column_value = Expression::with_type(
            location.clone(),
            ExpressionKind::Cast { target_type: dst_column_type.clone(), exprs: components },
            dst_column_type.clone(),
        );
        let result_expr = Expression::with_type(location.clone(), ExpressionKind::VariableValue(result_id), target_type.clone());
        let assign = Expression::new(
            location.clone(),
            ExpressionKind::Assign {
                op: AssignOp::Simple,
                lhs: Box::new(column_access(&result_expr, column, dst_column_type.clone(), location.clone())),
                rhs: Box::new(column_value),
            },
        );
        state.append_statement(nzsl_ast::statements::Statement::new(location.clone(), nzsl_ast::statements::StatementKind::Expression(assign)));
    }

    Ok(Expression::with_type(location, ExpressionKind::VariableValue(result_id), target_type.clone()))
}

fn swizzle_one(vector: &Expression, component: u32, component_type: PrimitiveType, location: SourceLocation) -> Expression {
    Expression::with_type(
        location,
        ExpressionKind::Swizzle { expr: Box::new(vector.clone()), components: smallvec::smallvec![component as u8], count: 1 },
        Type::Primitive(component_type),
    )
}

fn diagonal_fill(row: u32, column: u32, component_type: PrimitiveType, location: SourceLocation) -> Expression {
    let value = if row == column { one_of(component_type) } else { zero_of(component_type) };
    Expression::with_type(location, ExpressionKind::ConstantValue(value), Type::Primitive(component_type))
}

fn zero_of(primitive: PrimitiveType) -> ConstantSingleValue {
    match primitive {
        PrimitiveType::F64 => ConstantSingleValue::F64(0.0),
        _ => ConstantSingleValue::F32(0.0),
    }
}

fn one_of(primitive: PrimitiveType) -> ConstantSingleValue {
    match primitive {
        PrimitiveType::F64 => ConstantSingleValue::F64(1.0),
        _ => ConstantSingleValue::F32(1.0),
    }
}
