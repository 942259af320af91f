//! The binary module codec (§4.J, §6.3).
//!
//! The original hand-rolls a tag-dispatch binary serializer because C++ has no equivalent to
//! `serde`; the Rust port's AST, type, and constant types all derive `Serialize`/`Deserialize`
//! (every node's "tag" is simply its enum discriminant, which `postcard` encodes as a varint —
//! the same job the original's per-variant integer tag does, §9 "tagged variants over virtual
//! dispatch"). `postcard` is already the workspace's wire-format crate (compact, `no_std`-
//! capable, varint-based), so the codec wraps it in a version-tagged envelope rather than
//! re-deriving a bespoke tag/length/value format by hand.
//!
//! The envelope still honors the spec's two on-disk requirements that a bare `postcard::to_vec`
//! wouldn't give for free: a `(major, minor)` format version the reader can refuse or adapt to
//! (`FormatVersion::is_greater_or_equal`), and a deduplicated string table built by
//! [`crate::intern::InternerBuilder`] over every name, struct field, and identifier in the
//! module, kept alongside the module payload for tooling that wants to inspect a compiled
//! module's interned strings without deserializing the whole tree.

use serde::{Deserialize, Serialize};

use crate::{
    context::TransformerContext,
    intern::InternerBuilder,
    module::Module,
    statements::{BranchArm, ImportIdentifiers, Statement, StatementKind},
};

/// Magic bytes identifying an NZSL binary module, matching the source's own module magic
/// length (4 bytes) though not its exact byte values (those are the original's implementation
/// detail, not part of this spec's observable contract).
pub const MAGIC: [u8; 4] = *b"NZSM";

/// `(major, minor)` format version. A reader refuses a module whose major version it doesn't
/// recognize and may behave conditionally on minor version bumps (§4.J).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

impl FormatVersion {
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    #[must_use]
    pub const fn is_greater_or_equal(self, other: Self) -> bool {
        self.major > other.major || (self.major == other.major && self.minor >= other.minor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    BadMagic,
    UnsupportedVersion(FormatVersion),
    Encode(String),
    Decode(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadMagic => write!(f, "not an NZSL binary module (bad magic)"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported module format version {}.{}", v.major, v.minor),
            Self::Encode(msg) | Self::Decode(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CodecError {}

/// The on-disk envelope (§6.3): magic + version header, a deduplicated string table, and the
/// module payload (metadata, imported modules, root `Multi`, and the context tables every
/// index in the tree resolves against).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModuleFile {
    version: FormatVersion,
    string_table: Vec<String>,
    module: Module,
    context: TransformerContext,
}

/// Serializes `module` and its resolved `context` into a version-tagged binary blob.
///
/// # Errors
/// Returns [`CodecError::Encode`] if `postcard` fails to encode the module (e.g. a node whose
/// invariants were violated in a way `serde` can't represent, such as a recursive `Box` cycle —
/// never possible to construct through the public AST API, §3.8).
pub fn serialize(module: &Module, context: &TransformerContext) -> Result<Vec<u8>, CodecError> {
    let string_table = build_string_table(module, context).into_table();
    let file = ModuleFile { version: FormatVersion::CURRENT, string_table, module: module.clone(), context: context.clone() };
    let body = postcard::to_allocvec(&file).map_err(|e| CodecError::Encode(e.to_string()))?;
    let mut out = Vec::with_capacity(MAGIC.len() + body.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserializes a blob written by [`serialize`].
///
/// # Errors
/// Returns [`CodecError::BadMagic`] if the blob doesn't start with [`MAGIC`],
/// [`CodecError::UnsupportedVersion`] if its major version doesn't match
/// [`FormatVersion::CURRENT`], or [`CodecError::Decode`] if `postcard` fails to parse the body.
pub fn deserialize(bytes: &[u8]) -> Result<(Module, TransformerContext), CodecError> {
    let (magic, body) = bytes.split_at_checked(MAGIC.len()).ok_or(CodecError::BadMagic)?;
    if magic != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let file: ModuleFile = postcard::from_bytes(body).map_err(|e| CodecError::Decode(e.to_string()))?;
    if file.version.major != FormatVersion::CURRENT.major {
        return Err(CodecError::UnsupportedVersion(file.version));
    }
    Ok((file.module, file.context))
}

/// Walks every name-carrying position in `module`/`context` and interns each unique string
/// exactly once, in first-seen order (§4.J: "writer always emits the full table of unique
/// strings first").
fn build_string_table(module: &Module, context: &TransformerContext) -> InternerBuilder {
    let mut builder = InternerBuilder::new();
    builder.intern(&module.metadata.module_name);
    if let Some(author) = &module.metadata.author {
        builder.intern(author);
    }
    intern_statement(&module.root, &mut builder);
    for imported in &module.imported_modules {
        builder.intern(&imported.identifier);
        intern_statement(&imported.module.root, &mut builder);
    }
    for (_, data) in context.iter_functions() {
        builder.intern(&data.name);
        for param in &data.parameters {
            builder.intern(&param.name);
        }
    }
    for (_, data) in context.iter_structs() {
        builder.intern(&data.description.name);
        for field in &data.description.fields {
            builder.intern(&field.name);
        }
    }
    for (_, data) in context.iter_variables() {
        builder.intern(&data.name);
    }
    for (_, data) in context.iter_constants() {
        builder.intern(&data.name);
    }
    for (_, data) in context.iter_aliases() {
        builder.intern(&data.name);
    }
    builder
}

fn intern_statement(stmt: &Statement, builder: &mut InternerBuilder) {
    match &stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements {
                intern_statement(s, builder);
            }
        }
        StatementKind::Branch { arms, else_statement, .. } => {
            for BranchArm { body, .. } in arms {
                intern_statement(body, builder);
            }
            if let Some(e) = else_statement {
                intern_statement(e, builder);
            }
        }
        StatementKind::Conditional { statement, .. } => intern_statement(statement, builder),
        StatementKind::DeclareAlias { name, .. } | StatementKind::DeclareConst { name, .. } => {
            builder.intern(name);
        }
        StatementKind::DeclareExternal { block_name, variables } => {
            if let Some(name) = block_name {
                builder.intern(name);
            }
            for v in variables {
                builder.intern(&v.name);
            }
        }
        StatementKind::DeclareFunction { name, parameters, body, .. } => {
            builder.intern(name);
            for p in parameters {
                builder.intern(&p.name);
            }
            intern_statement(body, builder);
        }
        StatementKind::DeclareOption { name, .. } => {
            builder.intern(name);
        }
        StatementKind::DeclareStruct { description } => {
            builder.intern(&description.name);
            for f in &description.fields {
                builder.intern(&f.name);
            }
        }
        StatementKind::DeclareVariable { name, .. } => {
            builder.intern(name);
        }
        StatementKind::For { var_name, body, .. } | StatementKind::ForEach { var_name, body, .. } => {
            builder.intern(var_name);
            intern_statement(body, builder);
        }
        StatementKind::Import { module_name, identifiers } => {
            builder.intern(module_name);
            if let ImportIdentifiers::Explicit(list) = identifiers {
                for id in list {
                    builder.intern(&id.name);
                    if let Some(rename) = &id.rename {
                        builder.intern(rename);
                    }
                }
            }
        }
        StatementKind::Scoped(inner) => intern_statement(inner, builder),
        StatementKind::While { body, .. } => intern_statement(body, builder),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::ContextOptions, module::ModuleMetadata};

    #[test]
    fn round_trip_preserves_module_and_context() {
        let module = Module::new(ModuleMetadata { module_name: "test".into(), nzsl_version: (1, 0), ..Default::default() });
        let ctx = TransformerContext::new(ContextOptions::default());
        let bytes = serialize(&module, &ctx).unwrap();
        let (decoded_module, _decoded_ctx) = deserialize(&bytes).unwrap();
        assert_eq!(decoded_module.metadata.module_name, "test");
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = deserialize(b"xxxxbogus").unwrap_err();
        assert_eq!(err, CodecError::BadMagic);
    }

    #[test]
    fn string_table_deduplicates_repeated_names() {
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![
            Statement::new(
                crate::location::SourceLocation::synthetic(),
                StatementKind::DeclareConst { name: "x".into(), r#type: None, value: crate::expressions::Expression::new(
                    crate::location::SourceLocation::synthetic(),
                    crate::expressions::ExpressionKind::ConstantValue(crate::constants::ConstantSingleValue::I32(1)),
                ) },
            ),
            Statement::new(
                crate::location::SourceLocation::synthetic(),
                StatementKind::DeclareConst { name: "x".into(), r#type: None, value: crate::expressions::Expression::new(
                    crate::location::SourceLocation::synthetic(),
                    crate::expressions::ExpressionKind::ConstantValue(crate::constants::ConstantSingleValue::I32(2)),
                ) },
            ),
        ];
        let ctx = TransformerContext::new(ContextOptions::default());
        let table = build_string_table(&module, &ctx).into_table();
        assert_eq!(table.iter().filter(|s| *s == "x").count(), 1);
    }
}
