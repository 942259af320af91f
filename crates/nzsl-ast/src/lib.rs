#![doc = include_str!("../../../README.md")]

pub mod codec;
pub mod constants;
pub mod context;
pub mod dependency;
pub mod enums;
pub mod errors;
pub mod expressions;
pub mod ids;
pub mod intern;
pub mod location;
pub mod module;
pub mod statements;
pub mod transformer;
pub mod types;

pub use constants::{ConstEvalError, ConstantArrayValue, ConstantSingleValue};
pub use context::{Binding, ContextOptions, TransformerContext};
pub use dependency::{dependency_check, UsageBitsets};
pub use enums::{
    AccessPolicy, AssignOp, AttributeType, BinaryOp, DepthWriteMode, ImageDimension, ImageFormat, IntrinsicKind, LoopUnroll, ModuleFeature,
    ShaderStage, StructLayout, UnaryOp,
};
pub use errors::{AstErrorKind, CompilerErrorKind, ErrorCategory, ErrorKind, LexErrorKind, NzslError, NzslResult, ParseErrorKind};
pub use expressions::{Expression, ExpressionKind, ExpressionValue, SwizzleComponent};
pub use ids::{AliasId, ConstantId, ExternalBlockId, FunctionId, IntrinsicId, ModuleId, StructId, TypeId, VariableId};
pub use intern::{InternerBuilder, Interns, StringId};
pub use location::{FileId, Position, SourceLocation};
pub use module::{ImportedModule, Module, ModuleMetadata};
pub use statements::{Statement, StatementKind};
pub use transformer::{Transformer, TransformerState, VisitAction};
pub use types::{FieldOffsets, PrimitiveType, StructRef, Type};
