//! Closed enums shared by the node model, type system, and error catalogue.
//!
//! Every enum here keeps the original NZSL C++ source's variant *ordering and grouping*
//! (§2 of the expanded spec) even though the Rust-side discriminants are our own choice, so the
//! binary codec's tag tables read the same way the original's switch statements do.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Binary operators (§3.3). Covers arithmetic, comparison, bitwise, logical, and shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "==")]
    CompEq,
    #[strum(serialize = "!=")]
    CompNe,
    #[strum(serialize = "<")]
    CompLt,
    #[strum(serialize = "<=")]
    CompLe,
    #[strum(serialize = ">")]
    CompGt,
    #[strum(serialize = ">=")]
    CompGe,
    #[strum(serialize = "&&")]
    LogicalAnd,
    #[strum(serialize = "||")]
    LogicalOr,
    #[strum(serialize = "&")]
    BitwiseAnd,
    #[strum(serialize = "|")]
    BitwiseOr,
    #[strum(serialize = "^")]
    BitwiseXor,
    #[strum(serialize = "<<")]
    ShiftLeft,
    #[strum(serialize = ">>")]
    ShiftRight,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::CompEq | Self::CompNe | Self::CompLt | Self::CompLe | Self::CompGt | Self::CompGe
        )
    }

    #[must_use]
    pub const fn is_logical(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr)
    }

    #[must_use]
    pub const fn is_shift(self) -> bool {
        matches!(self, Self::ShiftLeft | Self::ShiftRight)
    }
}

/// Unary operators (§3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum UnaryOp {
    #[strum(serialize = "!")]
    LogicalNot,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "~")]
    BitwiseNot,
}

/// Assignment operators, including the compound forms lowered away by `CompoundAssignLowering`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum AssignOp {
    #[strum(serialize = "=")]
    Simple,
    #[strum(serialize = "+=")]
    CompoundAdd,
    #[strum(serialize = "-=")]
    CompoundSubtract,
    #[strum(serialize = "*=")]
    CompoundMultiply,
    #[strum(serialize = "/=")]
    CompoundDivide,
    #[strum(serialize = "%=")]
    CompoundModulo,
    #[strum(serialize = "&&=")]
    CompoundLogicalAnd,
    #[strum(serialize = "||=")]
    CompoundLogicalOr,
    #[strum(serialize = "&=")]
    CompoundBitwiseAnd,
    #[strum(serialize = "|=")]
    CompoundBitwiseOr,
    #[strum(serialize = "^=")]
    CompoundBitwiseXor,
    #[strum(serialize = "<<=")]
    CompoundShiftLeft,
    #[strum(serialize = ">>=")]
    CompoundShiftRight,
}

impl AssignOp {
    /// The underlying `BinaryOp` a compound assignment lowers into, or `None` for `Simple`.
    #[must_use]
    pub const fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            Self::Simple => return None,
            Self::CompoundAdd => BinaryOp::Add,
            Self::CompoundSubtract => BinaryOp::Subtract,
            Self::CompoundMultiply => BinaryOp::Multiply,
            Self::CompoundDivide => BinaryOp::Divide,
            Self::CompoundModulo => BinaryOp::Modulo,
            Self::CompoundLogicalAnd => BinaryOp::LogicalAnd,
            Self::CompoundLogicalOr => BinaryOp::LogicalOr,
            Self::CompoundBitwiseAnd => BinaryOp::BitwiseAnd,
            Self::CompoundBitwiseOr => BinaryOp::BitwiseOr,
            Self::CompoundBitwiseXor => BinaryOp::BitwiseXor,
            Self::CompoundShiftLeft => BinaryOp::ShiftLeft,
            Self::CompoundShiftRight => BinaryOp::ShiftRight,
        })
    }
}

/// Pipeline shader stages an entry-point function can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ShaderStage {
    Vert,
    Frag,
    Comp,
}

/// `[unroll(...)]` attribute values (§4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum LoopUnroll {
    Never,
    Always,
    Hint,
}

/// `[depth_write(...)]` attribute values, valid only on `entry(frag)` functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum DepthWriteMode {
    Replace,
    Greater,
    Less,
    Unchanged,
}

/// Storage/external-block access policy (§3.3 `storage` wrapper, §4.F external blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum AccessPolicy {
    Readonly,
    Readwrite,
    Writeonly,
}

/// `nzsl_version` module features (§6.2): each gates a set of otherwise-reserved identifiers or
/// language constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ModuleFeature {
    Float64,
    PrimitiveExternals,
    Texture1D,
}

/// Sampler/texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ImageDimension {
    #[strum(serialize = "1d")]
    D1,
    #[strum(serialize = "2d")]
    D2,
    #[strum(serialize = "3d")]
    D3,
    Cube,
}

/// Storage-image texel formats usable on a `[binding]`ed `texture*` external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum ImageFormat {
    Rgba8,
    Rgba8Snorm,
    Rgba16F,
    R32F,
    Rg32F,
    Rgba32F,
    R32I,
    R32U,
}

/// Field/member layout rules a struct type can be declared under (§4.B layout arithmetic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum StructLayout {
    Packed,
    Std140,
    Std430,
}

/// Identifies every dispatchable intrinsic function (§4.F, §9 intrinsic signatures).
///
/// This is deliberately an exhaustive closed set rather than an open-ended registry: the
/// resolver's per-intrinsic arity/type table (§9) is keyed on this enum, and constant
/// propagation's evaluator switches on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum IntrinsicKind {
    CrossProduct,
    Exp,
    Exp2,
    Length,
    Max,
    Min,
    Normalize,
    Pow,
    Reflect,
    Select,
    SquareRoot,
    InverseSquareRoot,
    Abs,
    Ceil,
    Floor,
    Fract,
    Round,
    Sign,
    Clamp,
    Lerp,
    Dot,
    Distance,
    MatrixInverse,
    MatrixTranspose,
    ArraySize,
    SampleTexture,
    TextureSampleImplicitLod,
    TextureRead,
    TextureWrite,
    Unpack,
    Pack,
}

/// `[attr(...)]` attribute kinds recognized on declarations (§4.F attribute resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum AttributeType {
    Author,
    AutoBinding,
    Binding,
    Builtin,
    Cond,
    DepthWriteMode,
    Desc,
    EarlyFragmentTests,
    Entry,
    Feature,
    LangVersion,
    Layout,
    License,
    Location,
    Set,
    Unroll,
    Workgroup,
}
