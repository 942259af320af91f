//! The constant-value model (§4.C): scalar/vector constants, fixed-length composite arrays,
//! the operators foldable over them, and their canonical printable form.
//!
//! Binary/unary evaluation lives here (not in `nzsl-resolve`) because it is data-model-level
//! "what does `+` mean for two `f32` constants", independent of *when* constant propagation
//! chooses to fold a node; `nzsl-resolve::constant_propagation` is the bottom-up tree walk that
//! decides which nodes are foldable and calls into [`eval_binary`]/[`eval_unary`].

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::{
    enums::{BinaryOp, UnaryOp},
    types::{PrimitiveType, Type},
};

/// A scalar or small fixed-size vector constant (§4.C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantSingleValue {
    NoValue,
    Bool(bool),
    I32(i32),
    U32(u32),
    F32(f32),
    F64(f64),
    /// Untyped integer literal, stored widened so it can represent any eventual concrete type.
    IntLiteral(i64),
    /// Untyped floating-point literal, stored widened to `f64`.
    FloatLiteral(f64),
    VecBool(smallvec::SmallVec<[bool; 4]>),
    VecI32(smallvec::SmallVec<[i32; 4]>),
    VecU32(smallvec::SmallVec<[u32; 4]>),
    VecF32(smallvec::SmallVec<[f32; 4]>),
    VecF64(smallvec::SmallVec<[f64; 4]>),
    VecIntLiteral(smallvec::SmallVec<[i64; 4]>),
    VecFloatLiteral(smallvec::SmallVec<[f64; 4]>),
    String(String),
}

/// A fixed-length array of homogeneous [`ConstantSingleValue`]s (§4.C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantArrayValue {
    pub values: Vec<ConstantSingleValue>,
}

/// Failure modes specific to constant evaluation (§4.G, §7 compiler errors).
///
/// These map 1:1 onto `CompilerErrorKind` variants; kept as a distinct type so the evaluator
/// functions below don't need to depend on `crate::errors` (which in turn depends on
/// `SourceLocation`, irrelevant at this purely-arithmetic layer). Callers attach a location
/// when lifting this into a `CompilerError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstEvalError {
    IntegralDivisionByZero,
    IntegralModuloByZero,
    BinaryNegativeShift,
    BinaryTooLargeShift,
    /// The pair of operand types/operator has no folding rule (not every pure-looking
    /// expression is actually representable as a scalar/vector constant operation).
    Unsupported,
}

impl ConstantSingleValue {
    #[must_use]
    pub fn get_type(&self) -> Type {
        use PrimitiveType::{Bool, F32, F64, FloatLiteral, I32, IntLiteral, String as PString, U32};
        match self {
            Self::NoValue => Type::NoType,
            Self::Bool(_) => Type::Primitive(Bool),
            Self::I32(_) => Type::Primitive(I32),
            Self::U32(_) => Type::Primitive(U32),
            Self::F32(_) => Type::Primitive(F32),
            Self::F64(_) => Type::Primitive(F64),
            Self::IntLiteral(_) => Type::Primitive(IntLiteral),
            Self::FloatLiteral(_) => Type::Primitive(FloatLiteral),
            Self::String(_) => Type::Primitive(PString),
            Self::VecBool(v) => Type::Vector { component_count: v.len() as u32, component_type: Bool },
            Self::VecI32(v) => Type::Vector { component_count: v.len() as u32, component_type: I32 },
            Self::VecU32(v) => Type::Vector { component_count: v.len() as u32, component_type: U32 },
            Self::VecF32(v) => Type::Vector { component_count: v.len() as u32, component_type: F32 },
            Self::VecF64(v) => Type::Vector { component_count: v.len() as u32, component_type: F64 },
            Self::VecIntLiteral(v) => Type::Vector { component_count: v.len() as u32, component_type: IntLiteral },
            Self::VecFloatLiteral(v) => Type::Vector { component_count: v.len() as u32, component_type: FloatLiteral },
        }
    }

    #[must_use]
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            Self::VecBool(_)
                | Self::VecI32(_)
                | Self::VecU32(_)
                | Self::VecF32(_)
                | Self::VecF64(_)
                | Self::VecIntLiteral(_)
                | Self::VecFloatLiteral(_)
        )
    }

    /// The canonical printable form used in diagnostic messages and SL re-emission, matching
    /// the source's `float64`-aware and shortest-round-trip float formatting.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::NoValue => "<no value>".to_owned(),
            Self::Bool(b) => b.to_string(),
            Self::I32(v) => v.to_string(),
            Self::U32(v) => format!("{v}u32"),
            Self::F32(v) => format_f32(*v),
            Self::F64(v) => format_f64(*v),
            Self::IntLiteral(v) => v.to_string(),
            Self::FloatLiteral(v) => format_f64(*v),
            Self::String(s) => format!("{s:?}"),
            Self::VecBool(v) => format_vec(v, |b| b.to_string()),
            Self::VecI32(v) => format_vec(v, |i| i.to_string()),
            Self::VecU32(v) => format_vec(v, |u| format!("{u}u32")),
            Self::VecF32(v) => format_vec(v, |f| format_f32(*f)),
            Self::VecF64(v) => format_vec(v, |f| format_f64(*f)),
            Self::VecIntLiteral(v) => format_vec(v, |i| i.to_string()),
            Self::VecFloatLiteral(v) => format_vec(v, |f| format_f64(*f)),
        }
    }
}

fn format_vec<T>(values: &[T], fmt_one: impl Fn(&T) -> String) -> String {
    let mut out = String::from("vec");
    let _ = write!(out, "{}(", values.len());
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&fmt_one(v));
    }
    out.push(')');
    out
}

fn format_f32(v: f32) -> String {
    let mut buf = ryu::Buffer::new();
    buf.format(v).to_owned()
}

fn format_f64(v: f64) -> String {
    let mut buf = ryu::Buffer::new();
    buf.format(v).to_owned()
}

impl fmt::Display for ConstantSingleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl ConstantArrayValue {
    #[must_use]
    pub fn get_type(&self) -> Type {
        let inner = self.values.first().map_or(Type::NoType, ConstantSingleValue::get_type);
        Type::Array { inner: Box::new(inner), length: self.values.len() as u32 }
    }
}

/// Evaluates `lhs OP rhs`, dispatching per-operator and per-operand-type as described in §4.G.
///
/// Scalar x vector broadcasts for `*`/`/`/`%` when one side is a bare scalar; shifts validate
/// their count is in `[0, bit_width)`; integral `/`/`%` reject a zero divisor; vector `%` with
/// any zero lane raises one error for the whole vector rather than per-lane (§9 open question,
/// preserved from the source).
pub fn eval_binary(op: BinaryOp, lhs: &ConstantSingleValue, rhs: &ConstantSingleValue) -> Result<ConstantSingleValue, ConstEvalError> {
    use ConstantSingleValue::{Bool, F32, F64, FloatLiteral, I32, IntLiteral, U32};

    if op.is_logical() {
        if let (Bool(a), Bool(b)) = (lhs, rhs) {
            return Ok(Bool(match op {
                BinaryOp::LogicalAnd => *a && *b,
                BinaryOp::LogicalOr => *a || *b,
                _ => unreachable!(),
            }));
        }
        return Err(ConstEvalError::Unsupported);
    }

    if op.is_shift() {
        return eval_shift(op, lhs, rhs);
    }

    if let (Some(a), Some(b)) = (as_vector(lhs), as_vector(rhs)) {
        let lane_kind = vector_lane_kind(lhs).or_else(|| vector_lane_kind(rhs)).ok_or(ConstEvalError::Unsupported)?;
        return eval_componentwise(op, &a, &b, lhs.is_vector(), rhs.is_vector(), lane_kind);
    }

    match (lhs, rhs) {
        (I32(a), I32(b)) => eval_scalar_int(op, i64::from(*a), i64::from(*b)).map(|r| I32(r as i32)),
        (U32(a), U32(b)) => eval_scalar_uint(op, u64::from(*a), u64::from(*b)).map(|r| U32(r as u32)),
        (F32(a), F32(b)) => eval_scalar_float(op, f64::from(*a), f64::from(*b)).map(|r| F32(r as f32)),
        (F64(a), F64(b)) => eval_scalar_float(op, *a, *b).map(F64),
        (IntLiteral(a), IntLiteral(b)) => eval_scalar_int(op, *a, *b).map(IntLiteral),
        (FloatLiteral(a), FloatLiteral(b)) => eval_scalar_float(op, *a, *b).map(FloatLiteral),
        // A literal paired with a concrete type coerces into the concrete type's space first
        // (§4.G untyped-literal interoperability); the result stays concretely typed.
        (IntLiteral(a), I32(b)) | (I32(b), IntLiteral(a)) => eval_scalar_int(op, *a, i64::from(*b)).map(|r| I32(r as i32)),
        (IntLiteral(a), U32(b)) | (U32(b), IntLiteral(a)) => {
            eval_scalar_uint(op, u64::try_from(*a).unwrap_or(0), u64::from(*b)).map(|r| U32(r as u32))
        }
        (FloatLiteral(a), F32(b)) | (F32(b), FloatLiteral(a)) => eval_scalar_float(op, *a, f64::from(*b)).map(|r| F32(r as f32)),
        (FloatLiteral(a), F64(b)) | (F64(b), FloatLiteral(a)) => eval_scalar_float(op, *a, *b).map(F64),
        (Bool(a), Bool(b)) if op.is_comparison() => Ok(Bool(eval_comparison(op, f64::from(u8::from(*a)), f64::from(u8::from(*b))))),
        _ => Err(ConstEvalError::Unsupported),
    }
}

fn as_vector(value: &ConstantSingleValue) -> Option<Vec<f64>> {
    use ConstantSingleValue::{F32, F64, FloatLiteral, I32, IntLiteral, U32, VecF32, VecF64, VecFloatLiteral, VecI32, VecIntLiteral, VecU32};
    Some(match value {
        VecI32(v) => v.iter().map(|x| f64::from(*x)).collect(),
        VecU32(v) => v.iter().map(|x| f64::from(*x)).collect(),
        VecF32(v) => v.iter().map(|x| f64::from(*x)).collect(),
        VecF64(v) => v.clone(),
        VecIntLiteral(v) => v.iter().map(|x| *x as f64).collect(),
        VecFloatLiteral(v) => v.clone(),
        I32(x) => vec![f64::from(*x)],
        U32(x) => vec![f64::from(*x)],
        F32(x) => vec![f64::from(*x)],
        F64(x) => vec![*x],
        IntLiteral(x) => vec![*x as f64],
        FloatLiteral(x) => vec![*x],
        _ => return None,
    })
}

/// Which concrete component type a vector/scalar operand's lanes carry, so component-wise
/// evaluation can retag its `f64` intermediates back to the correct variant instead of always
/// widening to `VecF64` (§4.G: the folded constant's type must match what the type checker
/// would have inferred for the unfolded expression).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LaneKind {
    I32,
    U32,
    F32,
    F64,
    IntLiteral,
    FloatLiteral,
}

fn vector_lane_kind(value: &ConstantSingleValue) -> Option<LaneKind> {
    use ConstantSingleValue::{F32, F64, FloatLiteral, I32, IntLiteral, U32, VecF32, VecF64, VecFloatLiteral, VecI32, VecIntLiteral, VecU32};
    Some(match value {
        I32(_) | VecI32(_) => LaneKind::I32,
        U32(_) | VecU32(_) => LaneKind::U32,
        F32(_) | VecF32(_) => LaneKind::F32,
        F64(_) | VecF64(_) => LaneKind::F64,
        IntLiteral(_) | VecIntLiteral(_) => LaneKind::IntLiteral,
        FloatLiteral(_) | VecFloatLiteral(_) => LaneKind::FloatLiteral,
        _ => return None,
    })
}

/// Broadcasts a scalar against a vector, or runs component-wise where both sides are vectors,
/// then re-tags the `f64` intermediate results back into `lane_kind` (the concrete component
/// type either operand carried — a bare literal operand contributes no kind of its own and
/// coerces into its concrete peer, mirroring the scalar path's literal/peer coercion).
fn eval_componentwise(
    op: BinaryOp,
    a: &[f64],
    b: &[f64],
    a_is_vec: bool,
    b_is_vec: bool,
    lane_kind: LaneKind,
) -> Result<ConstantSingleValue, ConstEvalError> {
    let len = if a_is_vec { a.len() } else { b.len() };
    if a_is_vec && b_is_vec && a.len() != b.len() {
        return Err(ConstEvalError::Unsupported);
    }
    if !a_is_vec && !b_is_vec {
        return Err(ConstEvalError::Unsupported);
    }
    let mut out = smallvec::SmallVec::<[f64; 4]>::new();
    for i in 0..len {
        let lhs = if a_is_vec { a[i] } else { a[0] };
        let rhs = if b_is_vec { b[i] } else { b[0] };
        out.push(eval_scalar_float(op, lhs, rhs)?);
    }
    Ok(match lane_kind {
        LaneKind::I32 => ConstantSingleValue::VecI32(out.iter().map(|v| *v as i32).collect()),
        LaneKind::U32 => ConstantSingleValue::VecU32(out.iter().map(|v| *v as u32).collect()),
        LaneKind::F32 => ConstantSingleValue::VecF32(out.iter().map(|v| *v as f32).collect()),
        LaneKind::F64 => ConstantSingleValue::VecF64(out),
        LaneKind::IntLiteral => ConstantSingleValue::VecIntLiteral(out.iter().map(|v| *v as i64).collect()),
        LaneKind::FloatLiteral => ConstantSingleValue::VecFloatLiteral(out),
    })
}

fn eval_scalar_int(op: BinaryOp, a: i64, b: i64) -> Result<i64, ConstEvalError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Subtract => a.wrapping_sub(b),
        BinaryOp::Multiply => a.wrapping_mul(b),
        BinaryOp::Divide => {
            if b == 0 {
                return Err(ConstEvalError::IntegralDivisionByZero);
            }
            a.wrapping_div(b)
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Err(ConstEvalError::IntegralModuloByZero);
            }
            a.wrapping_rem(b)
        }
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::BitwiseXor => a ^ b,
        op if op.is_comparison() => i64::from(eval_comparison(op, a as f64, b as f64)),
        _ => return Err(ConstEvalError::Unsupported),
    })
}

fn eval_scalar_uint(op: BinaryOp, a: u64, b: u64) -> Result<u64, ConstEvalError> {
    Ok(match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Subtract => a.wrapping_sub(b),
        BinaryOp::Multiply => a.wrapping_mul(b),
        BinaryOp::Divide => {
            if b == 0 {
                return Err(ConstEvalError::IntegralDivisionByZero);
            }
            a / b
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Err(ConstEvalError::IntegralModuloByZero);
            }
            a % b
        }
        BinaryOp::BitwiseAnd => a & b,
        BinaryOp::BitwiseOr => a | b,
        BinaryOp::BitwiseXor => a ^ b,
        op if op.is_comparison() => u64::from(eval_comparison(op, a as f64, b as f64)),
        _ => return Err(ConstEvalError::Unsupported),
    })
}

/// Floating modulo uses truncated-toward-zero semantics (`fmod`), matching the source (§4.G).
fn eval_scalar_float(op: BinaryOp, a: f64, b: f64) -> Result<f64, ConstEvalError> {
    Ok(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        op if op.is_comparison() => f64::from(eval_comparison(op, a, b)),
        _ => return Err(ConstEvalError::Unsupported),
    })
}

fn eval_comparison(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::CompEq => a == b,
        BinaryOp::CompNe => a != b,
        BinaryOp::CompLt => a < b,
        BinaryOp::CompLe => a <= b,
        BinaryOp::CompGt => a > b,
        BinaryOp::CompGe => a >= b,
        _ => unreachable!("non-comparison operator routed to eval_comparison"),
    }
}

fn eval_shift(op: BinaryOp, lhs: &ConstantSingleValue, rhs: &ConstantSingleValue) -> Result<ConstantSingleValue, ConstEvalError> {
    use ConstantSingleValue::{I32, IntLiteral, U32};
    let (value, width, signed): (i64, u32, bool) = match lhs {
        I32(v) => (i64::from(*v), 32, true),
        U32(v) => (i64::from(*v), 32, false),
        IntLiteral(v) => (*v, 64, true),
        _ => return Err(ConstEvalError::Unsupported),
    };
    let count = match rhs {
        I32(v) => i64::from(*v),
        U32(v) => i64::from(*v),
        IntLiteral(v) => *v,
        _ => return Err(ConstEvalError::Unsupported),
    };
    if count < 0 {
        return Err(ConstEvalError::BinaryNegativeShift);
    }
    if count >= i64::from(width) {
        return Err(ConstEvalError::BinaryTooLargeShift);
    }
    let shifted = match (op, signed) {
        (BinaryOp::ShiftLeft, _) => value.wrapping_shl(count as u32),
        (BinaryOp::ShiftRight, true) => value.wrapping_shr(count as u32),
        (BinaryOp::ShiftRight, false) => ((value as u64) >> count) as i64,
        _ => return Err(ConstEvalError::Unsupported),
    };
    Ok(match lhs {
        I32(_) => I32(shifted as i32),
        U32(_) => U32(shifted as u32),
        IntLiteral(_) => IntLiteral(shifted),
        _ => unreachable!(),
    })
}

/// Evaluates a unary operator over a constant.
pub fn eval_unary(op: UnaryOp, value: &ConstantSingleValue) -> Result<ConstantSingleValue, ConstEvalError> {
    use ConstantSingleValue::{Bool, F32, F64, FloatLiteral, I32, IntLiteral, U32};
    Ok(match (op, value) {
        (UnaryOp::LogicalNot, Bool(b)) => Bool(!b),
        (UnaryOp::BitwiseNot, I32(v)) => I32(!v),
        (UnaryOp::BitwiseNot, U32(v)) => U32(!v),
        (UnaryOp::BitwiseNot, IntLiteral(v)) => IntLiteral(!v),
        (UnaryOp::Minus, I32(v)) => I32(v.wrapping_neg()),
        (UnaryOp::Minus, F32(v)) => F32(-v),
        (UnaryOp::Minus, F64(v)) => F64(-v),
        (UnaryOp::Minus, IntLiteral(v)) => IntLiteral(v.wrapping_neg()),
        (UnaryOp::Minus, FloatLiteral(v)) => FloatLiteral(-v),
        (UnaryOp::Plus, v) => v.clone(),
        _ => return Err(ConstEvalError::Unsupported),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_division_by_zero_errors() {
        let r = eval_binary(BinaryOp::Divide, &ConstantSingleValue::I32(42), &ConstantSingleValue::I32(0));
        assert_eq!(r, Err(ConstEvalError::IntegralDivisionByZero));
    }

    #[test]
    fn integral_modulo_by_zero_errors() {
        let r = eval_binary(BinaryOp::Modulo, &ConstantSingleValue::I32(42), &ConstantSingleValue::I32(0));
        assert_eq!(r, Err(ConstEvalError::IntegralModuloByZero));
    }

    #[test]
    fn float_modulo_truncates_toward_zero() {
        let r = eval_binary(BinaryOp::Modulo, &ConstantSingleValue::F32(5.5), &ConstantSingleValue::F32(2.0)).unwrap();
        assert_eq!(r, ConstantSingleValue::F32(1.5));
    }

    #[test]
    fn negative_shift_errors() {
        let r = eval_binary(BinaryOp::ShiftLeft, &ConstantSingleValue::I32(1), &ConstantSingleValue::I32(-1));
        assert_eq!(r, Err(ConstEvalError::BinaryNegativeShift));
    }

    #[test]
    fn too_large_shift_errors() {
        let r = eval_binary(BinaryOp::ShiftLeft, &ConstantSingleValue::I32(1), &ConstantSingleValue::I32(32));
        assert_eq!(r, Err(ConstEvalError::BinaryTooLargeShift));
    }

    #[test]
    fn scalar_broadcasts_over_vector() {
        let v = ConstantSingleValue::VecF32(smallvec::smallvec![1.0, 2.0, 3.0]);
        let s = ConstantSingleValue::F32(2.0);
        let r = eval_binary(BinaryOp::Multiply, &v, &s).unwrap();
        assert_eq!(r, ConstantSingleValue::VecF32(smallvec::smallvec![2.0, 4.0, 6.0]));
    }

    #[test]
    fn literal_coerces_to_concrete_peer() {
        let r = eval_binary(BinaryOp::Add, &ConstantSingleValue::IntLiteral(1), &ConstantSingleValue::I32(2)).unwrap();
        assert_eq!(r, ConstantSingleValue::I32(3));
    }

    #[test]
    fn vector_addition_preserves_integer_component_type() {
        let a = ConstantSingleValue::VecI32(smallvec::smallvec![1, 2, 3]);
        let b = ConstantSingleValue::VecI32(smallvec::smallvec![4, 5, 6]);
        let r = eval_binary(BinaryOp::Add, &a, &b).unwrap();
        assert_eq!(r, ConstantSingleValue::VecI32(smallvec::smallvec![5, 7, 9]));
    }

    #[test]
    fn display_format_matches_suffix_conventions() {
        assert_eq!(ConstantSingleValue::U32(7).to_display_string(), "7u32");
        assert_eq!(ConstantSingleValue::I32(-3).to_display_string(), "-3");
    }
}
