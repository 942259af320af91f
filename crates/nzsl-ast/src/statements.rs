//! Statement nodes (§3.2, §3.4) and the declaration payloads they carry.

use serde::{Deserialize, Serialize};

use crate::{
    enums::{AccessPolicy, DepthWriteMode, ImageDimension, ImageFormat, LoopUnroll, ShaderStage},
    expressions::{Expression, ExpressionValue},
    ids::VariableId,
    location::SourceLocation,
    types::Type,
};

/// A statement node: source location plus the tagged-variant payload (§3.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub location: SourceLocation,
    pub kind: StatementKind,
}

impl Statement {
    #[must_use]
    pub fn new(location: SourceLocation, kind: StatementKind) -> Self {
        Self { location, kind }
    }

    /// A `NoOp` at a synthetic location; used by lowering passes as a placeholder when
    /// `Transformer::visit_statement` asks for "don't visit children" on something that used to
    /// hold a statement now fully replaced elsewhere.
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(SourceLocation::synthetic(), StatementKind::NoOp)
    }
}

/// One arm of a `Branch` (§3.4): `if <condition> <body>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchArm {
    pub condition: Expression,
    pub body: Box<Statement>,
}

/// A function parameter: name plus declared type (always resolved by the time a `DeclareFunction`
/// leaves the resolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionParameter {
    pub name: String,
    pub r#type: Type,
}

/// Attributes carried by a `DeclareFunction` (§3.4, §4.F entry points).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionAttributes {
    pub entry_stage: Option<ShaderStage>,
    pub workgroup_size: Option<[ExpressionValue<u32>; 3]>,
    pub depth_write: Option<ExpressionValue<DepthWriteMode>>,
    pub early_fragment_tests: Option<ExpressionValue<bool>>,
}

/// `[builtin]`/`[location]`/`[cond]` attributes a struct member may carry (§4.F struct
/// members): builtin and location are mutually exclusive, and at most one active `[cond]`
/// member of a given name is allowed per struct.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructFieldAttributes {
    pub builtin: Option<String>,
    pub location: Option<ExpressionValue<u32>>,
    pub cond: Option<ExpressionValue<bool>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub r#type: Type,
    pub attributes: StructFieldAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDescription {
    pub name: String,
    pub layout: Option<crate::enums::StructLayout>,
    pub fields: Vec<StructField>,
}

/// One resource binding inside an `external { ... }` block (§4.F external blocks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalVariable {
    pub name: String,
    pub r#type: Type,
    pub binding: ExpressionValue<u32>,
    pub set: ExpressionValue<u32>,
    pub auto_binding: bool,
}

/// Imported-name list of an `Import` statement (§3.4, §6.2): either an explicit list of
/// identifiers (optionally renamed) or a wildcard import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImportIdentifiers {
    Explicit(Vec<ImportedIdentifier>),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedIdentifier {
    pub name: String,
    pub rename: Option<String>,
}

/// The statement tagged-variant payload (§3.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    Branch { arms: Vec<BranchArm>, else_statement: Option<Box<Statement>>, is_const: bool },
    Break,
    /// Compile-time `if` with no `else`, collapsed by the resolver's constant-branch handling
    /// before code generation ever sees it; kept distinct from `Branch { is_const: true, .. }`
    /// because it never carries an else-chain (§3.4).
    Conditional { condition: Expression, statement: Box<Statement> },
    Continue,
    DeclareAlias { name: String, target: Expression },
    DeclareConst { name: String, r#type: Option<Type>, value: Expression },
    DeclareExternal { block_name: Option<String>, variables: Vec<ExternalVariable> },
    DeclareFunction {
        name: String,
        parameters: Vec<FunctionParameter>,
        body: Box<Statement>,
        return_type: Type,
        attributes: FunctionAttributes,
    },
    DeclareOption { name: String, r#type: Type, default_value: Option<Expression> },
    DeclareStruct { description: StructDescription },
    DeclareVariable {
        name: String,
        r#type: Option<Type>,
        initial_value: Option<Expression>,
        /// The variable's stable index once the resolver has registered it; `None` before
        /// resolution. Cached here (mirroring [`Expression::cached_type`]) so later passes that
        /// clone or reorder a declaration's subtree — the loop unroller duplicating a body,
        /// the index remapper rewriting one — can tell which context-table entry a given
        /// `DeclareVariable` corresponds to without re-deriving it from name-based scope lookup,
        /// which is no longer available once the declaring scope has been popped.
        var_id: Option<VariableId>,
    },
    Discard,
    Expression(Expression),
    For {
        var_name: String,
        from: Expression,
        to: Expression,
        step: Option<Expression>,
        unroll: Option<LoopUnroll>,
        body: Box<Statement>,
        /// Stable index of the per-iteration counter variable, cached the same way and for the
        /// same reason as `DeclareVariable::var_id`.
        var_id: Option<VariableId>,
    },
    ForEach {
        var_name: String,
        container: Expression,
        unroll: Option<LoopUnroll>,
        body: Box<Statement>,
        var_id: Option<VariableId>,
    },
    Import { module_name: String, identifiers: ImportIdentifiers },
    Multi(Vec<Statement>),
    NoOp,
    Return(Option<Expression>),
    /// Introduces a fresh lexical scope around a single statement, without looping or
    /// branching (used e.g. to wrap the `let`s a `For`-to-`While` lowering injects).
    Scoped(Box<Statement>),
    While { condition: Expression, unroll: Option<LoopUnroll>, body: Box<Statement> },
}

/// Image/sampler-like external variable shapes, kept here rather than in `types::Type` because
/// they only ever appear as the type of an `ExternalVariable` (§4.F `ExtTypeNotAllowed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerShape {
    pub dimension: ImageDimension,
    pub depth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureShape {
    pub dimension: ImageDimension,
    pub format: ImageFormat,
    pub access: AccessPolicy,
}
