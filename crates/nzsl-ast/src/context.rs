//! The transformer context (§3.6, §4.E): the shared, process-wide-per-module symbol tables and
//! scope chain threaded through every pass that runs on a module.

use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    enums::{AccessPolicy, IntrinsicKind, ModuleFeature},
    errors::{AstErrorKind, CompilerErrorKind, ErrorKind, NzslError},
    ids::{AliasId, ConstantId, ExternalBlockId, FunctionId, IntrinsicId, ModuleId, StructId, TypeId, VariableId},
    location::SourceLocation,
    statements::{FunctionAttributes, FunctionParameter, StructDescription},
    types::Type,
};

/// Payload stored for a `DeclareAlias` (§3.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasData {
    pub name: String,
    pub target: Type,
}

/// Payload stored for a `DeclareConst`/`DeclareOption` (§3.6: "also covers options").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantData {
    pub name: String,
    pub r#type: Type,
    pub value: Option<crate::constants::ConstantSingleValue>,
    pub module_index: Option<ModuleId>,
    pub is_option: bool,
}

/// Bit flags describing a function's role, orthogonal to its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FunctionFlags {
    pub is_entry_point: bool,
    pub is_used_as_value: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionData {
    pub name: String,
    pub parameters: Vec<FunctionParameter>,
    pub return_type: Type,
    pub attributes: FunctionAttributes,
    pub flags: FunctionFlags,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructData {
    pub description: StructDescription,
    pub module_index: Option<ModuleId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableData {
    pub name: String,
    pub r#type: Type,
    pub is_const: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalBlockData {
    pub block_name: Option<String>,
    pub members: Vec<crate::statements::ExternalVariable>,
}

/// Either a fully concrete type or a partial type still awaiting its type/constant arguments
/// (a `vec3`, an `array`, §4.F partial types) — kept in the context's type table so aliases and
/// structs can both be referenced the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeData {
    Concrete(Type),
    Partial(PartialTypeKind),
}

/// The shape of a generic type constructor awaiting its arguments (§4.F partial types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialTypeKind {
    Vector { component_count: u32 },
    Matrix { columns: u32, rows: u32 },
    Array,
    DynArray,
    Sampler { dimension: crate::enums::ImageDimension, depth: bool },
    Texture { dimension: crate::enums::ImageDimension },
    Uniform,
    Storage { access: AccessPolicy },
    PushConstant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrinsicData {
    pub kind: IntrinsicKind,
}

/// A generic, insertion-order-preserving table keyed by a stable index newtype. Registration
/// either allocates a fresh index or accepts a caller-supplied preregistered one (used when
/// rewriting a module whose indices must survive, e.g. the index remapper re-registering under
/// new indices one category at a time, §3.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolTable<T> {
    next_index: u64,
    entries: IndexMap<u64, T>,
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self { next_index: 0, entries: IndexMap::new() }
    }
}

impl<T> SymbolTable<T> {
    /// Registers `payload` under a freshly allocated index.
    pub fn register(&mut self, payload: T) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        self.entries.insert(index, payload);
        index
    }

    /// Registers `payload` under `preregistered_index`, failing if that index is already used.
    pub fn register_at(&mut self, preregistered_index: u64, payload: T) -> Result<(), AstErrorKind> {
        if self.entries.contains_key(&preregistered_index) {
            return Err(AstErrorKind::AlreadyUsedIndex);
        }
        self.entries.insert(preregistered_index, payload);
        self.next_index = self.next_index.max(preregistered_index + 1);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, index: u64) -> Option<&T> {
        self.entries.get(&index)
    }

    pub fn get_mut(&mut self, index: u64) -> Option<&mut T> {
        self.entries.get_mut(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &T)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

macro_rules! typed_table_accessors {
    ($field:ident, $id:ty, $payload:ty, $register:ident, $register_at:ident, $get:ident, $get_mut:ident) => {
        pub fn $register(&mut self, payload: $payload) -> $id {
            <$id>::new(self.$field.register(payload))
        }

        pub fn $register_at(&mut self, index: $id, payload: $payload) -> Result<(), AstErrorKind> {
            self.$field.register_at(index.index(), payload)
        }

        #[must_use]
        pub fn $get(&self, id: $id) -> Option<&$payload> {
            self.$field.get(id.index())
        }

        pub fn $get_mut(&mut self, id: $id) -> Option<&mut $payload> {
            self.$field.get_mut(id.index())
        }
    };
}

/// What a name in scope refers to (§4.F): the resolver rewrites `Identifier`/`AccessIdentifier`
/// nodes into the typed expression variant matching the binding it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    Alias(AliasId),
    Constant(ConstantId),
    Function(FunctionId),
    Struct(StructId),
    Variable(VariableId),
    Module(ModuleId),
    Type(TypeId),
    Intrinsic(IntrinsicId),
}

/// One lexical scope's name bindings, plus which of those names are reserved built-ins that
/// cannot be shadowed (§4.F: built-ins "occupy their own index space and cannot be
/// redeclared").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    bindings: AHashMap<String, Binding>,
    reserved: ahash::AHashSet<String>,
}

/// First-class configuration flags for a compilation attempt (§4.E, §9).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContextOptions {
    /// Tolerates an `Import` with no resolver available, and downgrades `UnknownIdentifier` to
    /// a warning (§9 "Partial compilation").
    pub partial_compilation: bool,
    pub allow_unknown_identifiers: bool,
}

/// The context threaded through every pass invoked on one module (§4.E).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformerContext {
    pub options: ContextOptions,
    pub enabled_features: Vec<ModuleFeature>,

    alias_table: SymbolTable<AliasData>,
    constant_table: SymbolTable<ConstantData>,
    external_block_table: SymbolTable<ExternalBlockData>,
    function_table: SymbolTable<FunctionData>,
    intrinsic_table: SymbolTable<IntrinsicData>,
    module_table: SymbolTable<crate::module::ImportedModule>,
    struct_table: SymbolTable<StructData>,
    type_table: SymbolTable<TypeData>,
    variable_table: SymbolTable<VariableData>,

    scopes: Vec<Scope>,

    /// Functions whose bodies still need a revisit after global (module-scope) resolution,
    /// because they referenced a name not yet declared when their signature was first seen
    /// (forward references between sibling functions, §4.E).
    pub pending_functions: Vec<FunctionId>,
}

impl TransformerContext {
    #[must_use]
    pub fn new(options: ContextOptions) -> Self {
        Self { options, scopes: vec![Scope::default()], ..Self::default() }
    }

    typed_table_accessors!(alias_table, AliasId, AliasData, register_alias, register_alias_at, alias, alias_mut);
    typed_table_accessors!(
        constant_table,
        ConstantId,
        ConstantData,
        register_constant,
        register_constant_at,
        constant,
        constant_mut
    );
    typed_table_accessors!(
        external_block_table,
        ExternalBlockId,
        ExternalBlockData,
        register_external_block,
        register_external_block_at,
        external_block,
        external_block_mut
    );
    typed_table_accessors!(
        function_table,
        FunctionId,
        FunctionData,
        register_function,
        register_function_at,
        function,
        function_mut
    );
    typed_table_accessors!(
        intrinsic_table,
        IntrinsicId,
        IntrinsicData,
        register_intrinsic,
        register_intrinsic_at,
        intrinsic,
        intrinsic_mut
    );
    typed_table_accessors!(
        struct_table,
        StructId,
        StructData,
        register_struct,
        register_struct_at,
        struct_data,
        struct_data_mut
    );
    typed_table_accessors!(
        type_table,
        TypeId,
        TypeData,
        register_type,
        register_type_at,
        type_data,
        type_data_mut
    );
    typed_table_accessors!(
        variable_table,
        VariableId,
        VariableData,
        register_variable,
        register_variable_at,
        variable,
        variable_mut
    );

    pub fn register_module(&mut self, imported: crate::module::ImportedModule) -> ModuleId {
        ModuleId::new(self.module_table.register(imported))
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&crate::module::ImportedModule> {
        self.module_table.get(id.index())
    }

    pub fn module_mut(&mut self, id: ModuleId) -> Option<&mut crate::module::ImportedModule> {
        self.module_table.get_mut(id.index())
    }

    pub fn iter_modules(&self) -> impl Iterator<Item = (ModuleId, &crate::module::ImportedModule)> {
        self.module_table.iter().map(|(k, v)| (ModuleId::new(k), v))
    }

    pub fn iter_functions(&self) -> impl Iterator<Item = (FunctionId, &FunctionData)> {
        self.function_table.iter().map(|(k, v)| (FunctionId::new(k), v))
    }

    pub fn iter_structs(&self) -> impl Iterator<Item = (StructId, &StructData)> {
        self.struct_table.iter().map(|(k, v)| (StructId::new(k), v))
    }

    pub fn iter_variables(&self) -> impl Iterator<Item = (VariableId, &VariableData)> {
        self.variable_table.iter().map(|(k, v)| (VariableId::new(k), v))
    }

    pub fn iter_constants(&self) -> impl Iterator<Item = (ConstantId, &ConstantData)> {
        self.constant_table.iter().map(|(k, v)| (ConstantId::new(k), v))
    }

    pub fn iter_aliases(&self) -> impl Iterator<Item = (AliasId, &AliasData)> {
        self.alias_table.iter().map(|(k, v)| (AliasId::new(k), v))
    }

    // --- Scope chain (§4.D `PushScope`/`PopScope`, §4.F name resolution) ---

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "attempted to pop the global scope");
        self.scopes.pop();
    }

    /// Binds `name` to `binding` as a reserved built-in in the *current* (normally global)
    /// scope: it can be looked up like any other name but redeclaring it is always an error,
    /// even from a scope where ordinary shadowing would otherwise be allowed.
    pub fn declare_reserved(&mut self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        let scope = self.scopes.last_mut().expect("at least one scope always present");
        scope.reserved.insert(name.clone());
        scope.bindings.insert(name, binding);
    }

    /// Declares `name` in the current scope. Fails with `IdentifierAlreadyUsed` if a
    /// non-reserved binding of the same name already exists in this scope, or
    /// `ReservedKeyword`-shaped if the name collides with a reserved built-in anywhere still
    /// visible in the active scope (§4.F, §4.E: "dedupe by name within a scope").
    pub fn declare(&mut self, name: impl Into<String>, binding: Binding, location: &SourceLocation) -> Result<(), NzslError> {
        let name = name.into();
        let scope = self.scopes.last_mut().expect("at least one scope always present");
        if scope.reserved.contains(&name) {
            return Err(NzslError::compiler(
                CompilerErrorKind::IdentifierAlreadyUsed,
                location.clone(),
                format!("'{name}' is a reserved built-in identifier"),
            ));
        }
        if scope.bindings.contains_key(&name) {
            return Err(NzslError::compiler(
                CompilerErrorKind::IdentifierAlreadyUsed,
                location.clone(),
                format!("identifier '{name}' is already declared in this scope"),
            ));
        }
        scope.bindings.insert(name, binding);
        Ok(())
    }

    /// Looks up `name` through the scope chain, innermost first.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.bindings.get(name).copied())
    }

    /// Every user-declared (non-reserved) name bound in the current, innermost scope. Unlike
    /// [`Self::lookup`], this doesn't walk outer scopes, so it never picks up shadowed names or
    /// built-ins — used by the import resolver to harvest a just-resolved submodule's top-level
    /// declarations before its scope is popped.
    #[must_use]
    pub fn current_scope_user_bindings(&self) -> Vec<(String, Binding)> {
        let scope = self.scopes.last().expect("at least one scope always present");
        scope.bindings.iter().filter(|(name, _)| !scope.reserved.contains(*name)).map(|(name, binding)| (name.clone(), *binding)).collect()
    }

    /// Looks up `name`, translating a miss into `UnknownIdentifier` (downgraded to `Ok(None)`
    /// under `allow_unknown_identifiers`, §9).
    pub fn resolve_identifier(&self, name: &str, location: &SourceLocation) -> Result<Option<Binding>, NzslError> {
        match self.lookup(name) {
            Some(binding) => Ok(Some(binding)),
            None if self.options.allow_unknown_identifiers => Ok(None),
            None => Err(NzslError::compiler(
                CompilerErrorKind::UnknownIdentifier,
                location.clone(),
                format!("unknown identifier '{name}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaring_twice_in_same_scope_errors() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let id = ctx.register_variable(VariableData { name: "x".into(), r#type: Type::NoType, is_const: false });
        ctx.declare("x", Binding::Variable(id), &SourceLocation::synthetic()).unwrap();
        let err = ctx.declare("x", Binding::Variable(id), &SourceLocation::synthetic());
        assert!(matches!(err, Err(e) if e.kind == ErrorKind::Compiler(CompilerErrorKind::IdentifierAlreadyUsed)));
    }

    #[test]
    fn reserved_names_cannot_be_redeclared() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let id = ctx.register_intrinsic(IntrinsicData { kind: IntrinsicKind::Abs });
        ctx.declare_reserved("abs", Binding::Intrinsic(id));
        let err = ctx.declare("abs", Binding::Intrinsic(id), &SourceLocation::synthetic());
        assert!(err.is_err());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let outer = ctx.register_variable(VariableData { name: "x".into(), r#type: Type::NoType, is_const: false });
        ctx.declare("x", Binding::Variable(outer), &SourceLocation::synthetic()).unwrap();
        ctx.push_scope();
        let inner = ctx.register_variable(VariableData { name: "x".into(), r#type: Type::NoType, is_const: false });
        ctx.declare("x", Binding::Variable(inner), &SourceLocation::synthetic()).unwrap();
        assert_eq!(ctx.lookup("x"), Some(Binding::Variable(inner)));
        ctx.pop_scope();
        assert_eq!(ctx.lookup("x"), Some(Binding::Variable(outer)));
    }

    #[test]
    fn unknown_identifier_is_tolerated_in_partial_mode() {
        let mut ctx = TransformerContext::new(ContextOptions { allow_unknown_identifiers: true, ..Default::default() });
        ctx.options.partial_compilation = true;
        assert_eq!(ctx.resolve_identifier("ghost", &SourceLocation::synthetic()).unwrap(), None);
    }
}
