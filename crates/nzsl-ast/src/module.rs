//! Modules (§3.7): a compilation unit, its metadata, and its imported submodules.

use serde::{Deserialize, Serialize};

use crate::{
    enums::ModuleFeature,
    ids::ModuleId,
    statements::{Statement, StatementKind},
};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub module_name: String,
    /// `(major, minor)` from `nzsl_version("major.minor")`.
    pub nzsl_version: (u32, u32),
    pub enabled_features: Vec<ModuleFeature>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
}

impl ModuleMetadata {
    #[must_use]
    pub fn has_feature(&self, feature: ModuleFeature) -> bool {
        self.enabled_features.contains(&feature)
    }
}

/// An imported submodule: the local identifier it's bound to, its own stable index in the
/// importing module's module table, and the full (already-parsed) module tree (§3.7: "imports
/// compose trees, not a flat graph").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedModule {
    pub id: ModuleId,
    pub identifier: String,
    pub module: Box<Module>,
}

/// A compilation unit: metadata, a root `Multi` statement, and a list of already-resolved
/// imported submodules (§3.7). Before the import-resolver pass runs, `imported_modules` is
/// empty and any `Import` statements remain in `root` as-is (§4.I import resolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub metadata: ModuleMetadata,
    pub root: Statement,
    pub imported_modules: Vec<ImportedModule>,
    /// Set once a pass runs in a mode that tolerates missing information (an unresolved
    /// `Import`, an unknown identifier under `allow_unknown_identifiers`): a partially resolved
    /// module can still be introspected, but back-ends must refuse to emit from it (§4.F, §9).
    pub partial: bool,
}

impl Module {
    #[must_use]
    pub fn new(metadata: ModuleMetadata) -> Self {
        Self {
            metadata,
            root: Statement::new(crate::location::SourceLocation::synthetic(), StatementKind::Multi(Vec::new())),
            imported_modules: Vec::new(),
            partial: false,
        }
    }

    /// Top-level statements of the module, i.e. the children of the root `Multi`.
    ///
    /// # Panics
    /// If `root` is not a `Multi` (never true for a module produced by the parser or by
    /// [`Module::new`]; an AST-integrity bug elsewhere would be the only way to violate this).
    #[must_use]
    pub fn top_level_statements(&self) -> &[Statement] {
        match &self.root.kind {
            StatementKind::Multi(statements) => statements,
            _ => panic!("module root is not a Multi statement"),
        }
    }

    pub fn top_level_statements_mut(&mut self) -> &mut Vec<Statement> {
        match &mut self.root.kind {
            StatementKind::Multi(statements) => statements,
            _ => panic!("module root is not a Multi statement"),
        }
    }
}
