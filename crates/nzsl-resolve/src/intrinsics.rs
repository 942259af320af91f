//! Per-intrinsic name, arity, and parameter-type checking (§9 "intrinsic signatures").
//!
//! Kept private to this crate (not one of the public passes) since it is a lookup table the
//! resolver and constant-propagation both need, not an independently invokable operation.

use nzsl_ast::{
    errors::{CompilerErrorKind, NzslError, NzslResult},
    expressions::Expression,
    location::SourceLocation,
    enums::IntrinsicKind,
    types::{PrimitiveType, Type},
};

/// The canonical lowercase name an intrinsic is invoked under in source.
#[must_use]
pub fn intrinsic_name(kind: IntrinsicKind) -> &'static str {
    match kind {
        IntrinsicKind::CrossProduct => "cross",
        IntrinsicKind::Exp => "exp",
        IntrinsicKind::Exp2 => "exp2",
        IntrinsicKind::Length => "length",
        IntrinsicKind::Max => "max",
        IntrinsicKind::Min => "min",
        IntrinsicKind::Normalize => "normalize",
        IntrinsicKind::Pow => "pow",
        IntrinsicKind::Reflect => "reflect",
        IntrinsicKind::Select => "select",
        IntrinsicKind::SquareRoot => "sqrt",
        IntrinsicKind::InverseSquareRoot => "inversesqrt",
        IntrinsicKind::Abs => "abs",
        IntrinsicKind::Ceil => "ceil",
        IntrinsicKind::Floor => "floor",
        IntrinsicKind::Fract => "fract",
        IntrinsicKind::Round => "round",
        IntrinsicKind::Sign => "sign",
        IntrinsicKind::Clamp => "clamp",
        IntrinsicKind::Lerp => "lerp",
        IntrinsicKind::Dot => "dot",
        IntrinsicKind::Distance => "distance",
        IntrinsicKind::MatrixInverse => "inverse",
        IntrinsicKind::MatrixTranspose => "transpose",
        IntrinsicKind::ArraySize => "array_size",
        IntrinsicKind::SampleTexture => "sample",
        IntrinsicKind::TextureSampleImplicitLod => "texture_sample_implicit_lod",
        IntrinsicKind::TextureRead => "texture_read",
        IntrinsicKind::TextureWrite => "texture_write",
        IntrinsicKind::Unpack => "unpack",
        IntrinsicKind::Pack => "pack",
    }
}

fn expect_arity(kind: IntrinsicKind, params: &[Expression], expected: usize, location: &SourceLocation) -> NzslResult<()> {
    if params.len() != expected {
        return Err(NzslError::compiler(
            CompilerErrorKind::IntrinsicExpectedParameterCount,
            location.clone(),
            format!("'{}' expects {expected} parameter(s), got {}", intrinsic_name(kind), params.len()),
        ));
    }
    Ok(())
}

fn expect_numeric(kind: IntrinsicKind, param_index: usize, ty: &Type, location: &SourceLocation) -> NzslResult<()> {
    if !ty.is_numeric() {
        return Err(NzslError::compiler(
            CompilerErrorKind::IntrinsicUnmatchingParameterType,
            location.clone(),
            format!("'{}' parameter #{param_index} must be numeric, got {ty:?}", intrinsic_name(kind)),
        ));
    }
    Ok(())
}

fn expect_float(kind: IntrinsicKind, param_index: usize, ty: &Type, location: &SourceLocation) -> NzslResult<()> {
    let is_float = matches!(ty.as_primitive(), Some(p) if p.is_floating())
        || matches!(ty.resolve_alias(), Type::Vector { component_type, .. } if component_type.is_floating());
    if !is_float {
        return Err(NzslError::compiler(
            CompilerErrorKind::IntrinsicExpectedFloat,
            location.clone(),
            format!("'{}' parameter #{param_index} must be floating-point, got {ty:?}", intrinsic_name(kind)),
        ));
    }
    Ok(())
}

/// Validates `params` against `kind`'s signature and returns the intrinsic's result type.
///
/// Parameter types not yet fully inferred (`cached_type` still `None`, e.g. when literal typing
/// has not run) are accepted optimistically; a later pass still has a chance to catch a real
/// mismatch once types settle.
pub fn check_intrinsic(kind: IntrinsicKind, params: &[Expression], location: &SourceLocation) -> NzslResult<Type> {
    let types: Vec<Option<&Type>> = params.iter().map(|p| p.cached_type.as_ref()).collect();

    match kind {
        IntrinsicKind::CrossProduct | IntrinsicKind::Reflect => {
            expect_arity(kind, params, 2, location)?;
            Ok(types[0].cloned().unwrap_or(Type::NoType))
        }
        IntrinsicKind::Dot | IntrinsicKind::Distance => {
            expect_arity(kind, params, 2, location)?;
            let component = types[0].and_then(Type::component_type).unwrap_or(PrimitiveType::F32);
            Ok(Type::Primitive(component))
        }
        IntrinsicKind::Length => {
            expect_arity(kind, params, 1, location)?;
            let component = types[0].and_then(Type::component_type).unwrap_or(PrimitiveType::F32);
            Ok(Type::Primitive(component))
        }
        IntrinsicKind::Normalize => {
            expect_arity(kind, params, 1, location)?;
            Ok(types[0].cloned().unwrap_or(Type::NoType))
        }
        IntrinsicKind::Max | IntrinsicKind::Min | IntrinsicKind::Pow => {
            expect_arity(kind, params, 2, location)?;
            Ok(types[0].cloned().unwrap_or(Type::NoType))
        }
        IntrinsicKind::Clamp | IntrinsicKind::Lerp => {
            expect_arity(kind, params, 3, location)?;
            Ok(types[0].cloned().unwrap_or(Type::NoType))
        }
        IntrinsicKind::Select => {
            expect_arity(kind, params, 3, location)?;
            Ok(types[1].cloned().unwrap_or(Type::NoType))
        }
        IntrinsicKind::SquareRoot | IntrinsicKind::InverseSquareRoot | IntrinsicKind::Exp | IntrinsicKind::Exp2 => {
            expect_arity(kind, params, 1, location)?;
            if let Some(ty) = types[0] {
                expect_float(kind, 0, ty, location)?;
            }
            Ok(types[0].cloned().unwrap_or(Type::NoType))
        }
        IntrinsicKind::Abs | IntrinsicKind::Ceil | IntrinsicKind::Floor | IntrinsicKind::Fract | IntrinsicKind::Round | IntrinsicKind::Sign => {
            expect_arity(kind, params, 1, location)?;
            if let Some(ty) = types[0] {
                expect_numeric(kind, 0, ty, location)?;
            }
            Ok(types[0].cloned().unwrap_or(Type::NoType))
        }
        IntrinsicKind::MatrixInverse | IntrinsicKind::MatrixTranspose => {
            expect_arity(kind, params, 1, location)?;
            let Some(ty) = types[0] else { return Ok(Type::NoType) };
            let Some((columns, rows, component_type)) = ty.as_matrix() else {
                return Err(NzslError::compiler(CompilerErrorKind::IntrinsicExpectedType, location.clone(), format!("'{}' expects a matrix", intrinsic_name(kind))));
            };
            match kind {
                IntrinsicKind::MatrixInverse => {
                    if !Type::is_square_matrix(columns, rows) {
                        return Err(NzslError::compiler(
                            CompilerErrorKind::IntrinsicExpectedType,
                            location.clone(),
                            format!("'inverse' expects a square matrix, got a {columns}x{rows} matrix"),
                        ));
                    }
                    Ok(Type::Matrix { columns, rows, component_type })
                }
                IntrinsicKind::MatrixTranspose => Ok(Type::Matrix { columns: rows, rows: columns, component_type }),
                _ => unreachable!(),
            }
        }
        IntrinsicKind::ArraySize => {
            expect_arity(kind, params, 1, location)?;
            Ok(Type::Primitive(PrimitiveType::U32))
        }
        IntrinsicKind::SampleTexture | IntrinsicKind::TextureSampleImplicitLod => {
            if params.is_empty() {
                return Err(NzslError::compiler(
                    CompilerErrorKind::IntrinsicExpectedParameterCount,
                    location.clone(),
                    format!("'{}' expects at least one parameter", intrinsic_name(kind)),
                ));
            }
            Ok(Type::Vector { component_count: 4, component_type: PrimitiveType::F32 })
        }
        IntrinsicKind::TextureRead => {
            if params.is_empty() {
                return Err(NzslError::compiler(
                    CompilerErrorKind::IntrinsicExpectedParameterCount,
                    location.clone(),
                    "'texture_read' expects at least one parameter",
                ));
            }
            Ok(Type::Vector { component_count: 4, component_type: PrimitiveType::F32 })
        }
        IntrinsicKind::TextureWrite => {
            expect_arity(kind, params, 2, location)?;
            Ok(Type::NoType)
        }
        IntrinsicKind::Unpack => {
            expect_arity(kind, params, 1, location)?;
            Ok(Type::Vector { component_count: 4, component_type: PrimitiveType::F32 })
        }
        IntrinsicKind::Pack => {
            expect_arity(kind, params, 1, location)?;
            Ok(Type::Primitive(PrimitiveType::U32))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::expressions::ExpressionKind;

    fn typed(ty: Type) -> Expression {
        Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::NoValue), ty)
    }

    #[test]
    fn inverse_requires_square_matrix() {
        let param = typed(Type::Matrix { columns: 2, rows: 3, component_type: PrimitiveType::F32 });
        let err = check_intrinsic(IntrinsicKind::MatrixInverse, &[param], &SourceLocation::synthetic());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::IntrinsicExpectedType)));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = check_intrinsic(IntrinsicKind::Dot, &[typed(Type::vec3(PrimitiveType::F32))], &SourceLocation::synthetic());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::IntrinsicExpectedParameterCount)));
    }

    #[test]
    fn sqrt_rejects_integer_operand() {
        let err = check_intrinsic(IntrinsicKind::SquareRoot, &[typed(Type::Primitive(PrimitiveType::I32))], &SourceLocation::synthetic());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::IntrinsicExpectedFloat)));
    }
}
