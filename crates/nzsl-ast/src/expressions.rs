//! Expression nodes (§3.2, §3.3).
//!
//! Every [`Expression`] owns its children exclusively (`Box`/`Vec`, never a pointer or `Rc`) and
//! carries a source location plus an optional cached result type. There are no cyclic
//! references: cross-references to declarations elsewhere in the module go through the stable
//! indices in [`crate::ids`], resolved against [`crate::context::TransformerContext`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    constants::{ConstantArrayValue, ConstantSingleValue},
    enums::{AssignOp, BinaryOp, IntrinsicKind, UnaryOp},
    ids::{AliasId, ConstantId, ExternalBlockId, FunctionId, ModuleId, StructId, VariableId},
    location::SourceLocation,
    types::Type,
};

/// A three-state union for attribute payloads that may be a not-yet-evaluated constant
/// expression (§3.5). Resolution replaces `Unresolved` with `Resolved` once the type checker
/// has evaluated the expression; `Unset` and `Unresolved` are kept distinct because diagnostics
/// (e.g. "missing required attribute" vs. "attribute expression failed to resolve") depend on
/// telling them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionValue<T> {
    Unset,
    Unresolved(Box<Expression>),
    Resolved(T),
}

impl<T> ExpressionValue<T> {
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    #[must_use]
    pub const fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved(_))
    }

    #[must_use]
    pub const fn resolved(&self) -> Option<&T> {
        match self {
            Self::Resolved(v) => Some(v),
            _ => None,
        }
    }

    pub fn resolve(&mut self, value: T) {
        *self = Self::Resolved(value);
    }
}

impl<T> Default for ExpressionValue<T> {
    fn default() -> Self {
        Self::Unset
    }
}

/// One swizzle component (`.xyzw` / `.rgba`), stored as a 0-3 field index so both naming
/// conventions share a representation.
pub type SwizzleComponent = u8;

/// An expression node: source location, optional cached result type (§3.8 invariant: if set,
/// must equal what the type checker would infer), and the tagged-variant payload (§3.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub location: SourceLocation,
    pub cached_type: Option<Type>,
    pub kind: ExpressionKind,
}

impl Expression {
    #[must_use]
    pub fn new(location: SourceLocation, kind: ExpressionKind) -> Self {
        Self { location, cached_type: None, kind }
    }

    #[must_use]
    pub fn with_type(location: SourceLocation, kind: ExpressionKind, ty: Type) -> Self {
        Self { location, cached_type: Some(ty), kind }
    }
}

/// The expression tagged-variant payload (§3.3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Numeric field index into a struct; produced by the resolver out of an `AccessIdentifier`
    /// once the accessed chain resolves to a concrete struct field.
    AccessField { expr: Box<Expression>, field_index: u32 },
    /// A chain of named accesses (`foo.bar.baz`), pre-resolution: the parser cannot yet tell
    /// whether each hop is a struct field, a swizzle, or a method.
    AccessIdentifier { expr: Box<Expression>, names: Vec<String> },
    /// One or more index expressions (`arr[i][j]`), post-resolution.
    AccessIndex { expr: Box<Expression>, indices: Vec<Expression> },
    AliasValue(AliasId),
    Assign { op: AssignOp, lhs: Box<Expression>, rhs: Box<Expression> },
    Binary { op: BinaryOp, lhs: Box<Expression>, rhs: Box<Expression> },
    CallFunction { target: Box<Expression>, params: Vec<Expression> },
    CallMethod { object: Box<Expression>, method: String, params: Vec<Expression> },
    Cast { target_type: Type, exprs: Vec<Expression> },
    Conditional { condition: Box<Expression>, true_path: Box<Expression>, false_path: Box<Expression> },
    Constant(ConstantId),
    ConstantArrayValue(ConstantArrayValue),
    ConstantValue(ConstantSingleValue),
    Function(FunctionId),
    /// Bare identifier, pre-resolution; the resolver rewrites this into one of the typed forms
    /// (`Variable`, `Function`, `StructType`, `AliasValue`, `Constant`, ...) per §4.F.
    Identifier(String),
    /// A resolved call into an intrinsic (post-resolution form of `CallFunction` whose target
    /// was an `IntrinsicFunction`).
    Intrinsic { kind: IntrinsicKind, params: Vec<Expression> },
    /// Reference to an intrinsic function as a value, analogous to `Function(funcId)`.
    IntrinsicFunction(IntrinsicKind),
    Module(ModuleId),
    NamedExternalBlock(ExternalBlockId),
    StructType(StructId),
    /// `count` is always in `1..=4` and indexes into `components`; trailing slots beyond
    /// `count` are unused padding, matching the original's fixed 4-wide storage.
    Swizzle { expr: Box<Expression>, components: SmallVec<[SwizzleComponent; 4]>, count: u8 },
    /// A type used as a value (e.g. `array_size` operating on a type rather than a variable).
    TypeConstant(Type),
    VariableValue(VariableId),
    Unary { op: UnaryOp, expr: Box<Expression> },
}

impl ExpressionKind {
    /// Whether this kind can only arise after the resolver has run; used by sanity assertions
    /// in tests and by the dependency analyzer which only ever walks resolved trees.
    #[must_use]
    pub const fn is_post_resolution(&self) -> bool {
        matches!(
            self,
            Self::AccessField { .. }
                | Self::AliasValue(_)
                | Self::Constant(_)
                | Self::Function(_)
                | Self::Intrinsic { .. }
                | Self::IntrinsicFunction(_)
                | Self::Module(_)
                | Self::NamedExternalBlock(_)
                | Self::StructType(_)
                | Self::VariableValue(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_value_starts_unset() {
        let v: ExpressionValue<u32> = ExpressionValue::default();
        assert!(v.is_unset());
        assert!(v.resolved().is_none());
    }

    #[test]
    fn expression_value_resolves_in_place() {
        let mut v: ExpressionValue<u32> = ExpressionValue::Unresolved(Box::new(Expression::new(
            SourceLocation::synthetic(),
            ExpressionKind::ConstantValue(ConstantSingleValue::I32(4)),
        )));
        assert!(v.is_unresolved());
        v.resolve(4);
        assert_eq!(v.resolved(), Some(&4));
    }
}
