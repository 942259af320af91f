//! Import resolution (§4.I, §3.7): the pass that turns an `Import` statement into concrete
//! bindings in the importing module's scope.
//!
//! Imports compose a tree, not a flat graph: each module keeps its own list of resolved
//! [`nzsl_ast::module::ImportedModule`]s, and re-importing the same module name twice within one
//! module reuses the first resolution rather than asking the resolver again. Nothing here
//! rewrites identifier expressions into member accesses the way a namespaced `Import M;` would
//! need to: every imported name (explicit or wildcard) is declared directly into the importing
//! scope under its own name, the same way a local declaration would be. That means a bare
//! `Import M;` with no identifier list and no rename has nothing to bind and resolves to a no-op
//! beyond pulling `M` into the context's module table for later passes (the dependency analyzer,
//! the codec) to walk.

use ahash::AHashMap;

use nzsl_ast::{
    context::{Binding, TransformerContext},
    errors::{CompilerErrorKind, NzslError, NzslResult},
    ids::ModuleId,
    location::SourceLocation,
    module::{ImportedModule, Module},
    statements::{ImportIdentifiers, StatementKind},
};

use crate::resolver::{resolve, ResolverOptions};

/// What a module-name import resolved into, cached for the lifetime of one `resolve_imports_in`
/// call so a second `Import` of the same module name in the same module doesn't re-resolve it.
struct ResolvedImport {
    bindings: Vec<(String, Binding)>,
}

/// External collaborator that turns a dotted module name into a parsed (not yet resolved)
/// [`Module`]. Filesystem search, network fetch, and a built-in module registry are all out of
/// scope here; a caller supplies whichever of those its embedding needs.
pub trait ModuleResolver {
    /// # Errors
    /// Returns [`ModuleResolverError::NotFound`] if no module answers to `module_name`, or
    /// [`ModuleResolverError::CompilationFailed`] if one was found but produced an error while
    /// being parsed or independently compiled.
    fn resolve_module(&mut self, module_name: &str) -> Result<Module, ModuleResolverError>;
}

/// Failure modes a [`ModuleResolver`] can report back to [`resolve_imports`].
#[derive(Debug, Clone)]
pub enum ModuleResolverError {
    NotFound,
    CompilationFailed(NzslError),
}

/// Configuration for one `resolve_imports` pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportResolverOptions {
    /// Under partial compilation, an `Import` with no resolver configured is tolerated (the
    /// module is marked partial, §9) instead of raising [`CompilerErrorKind::NoModuleResolver`].
    pub partial_compilation: bool,
}

/// Resolves every `Import` statement in `module`'s tree, recursively resolving imported
/// submodules through `resolver` first.
///
/// # Errors
/// Propagates [`CompilerErrorKind::ModuleNotFound`], [`CompilerErrorKind::ModuleCompilationFailed`],
/// [`CompilerErrorKind::ModuleFeatureMismatch`], [`CompilerErrorKind::CircularImport`],
/// [`CompilerErrorKind::NoModuleResolver`], [`CompilerErrorKind::ImportIdentifierAlreadyPresent`],
/// or [`CompilerErrorKind::UnknownIdentifier`]/[`CompilerErrorKind::IdentifierAlreadyUsed`] raised
/// while binding an imported name into scope.
pub fn resolve_imports(module: &mut Module, ctx: &mut TransformerContext, resolver: Option<&mut dyn ModuleResolver>, options: ImportResolverOptions) -> NzslResult<()> {
    let mut resolver = resolver;
    let mut in_progress = Vec::new();
    if !module.metadata.module_name.is_empty() {
        in_progress.push(module.metadata.module_name.clone());
    }
    resolve_imports_in(module, ctx, &mut resolver, &options, &mut in_progress)
}

fn resolve_imports_in(module: &mut Module, ctx: &mut TransformerContext, resolver: &mut Option<&mut dyn ModuleResolver>, options: &ImportResolverOptions, in_progress: &mut Vec<String>) -> NzslResult<()> {
    let mut resolved_here: AHashMap<String, ResolvedImport> = AHashMap::new();

    for index in 0..module.top_level_statements().len() {
        if !matches!(module.top_level_statements()[index].kind, StatementKind::Import { .. }) {
            continue;
        }
        let location = module.top_level_statements()[index].location.clone();
        let StatementKind::Import { module_name, identifiers } = std::mem::replace(&mut module.top_level_statements_mut()[index].kind, StatementKind::NoOp) else {
            unreachable!("checked above")
        };

        let new_kind = resolve_one_import(module, &module_name, &identifiers, &location, ctx, resolver, options, in_progress, &mut resolved_here)?;
        module.top_level_statements_mut()[index].kind = new_kind;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn resolve_one_import(
    host: &mut Module,
    module_name: &str,
    identifiers: &ImportIdentifiers,
    location: &SourceLocation,
    ctx: &mut TransformerContext,
    resolver: &mut Option<&mut dyn ModuleResolver>,
    options: &ImportResolverOptions,
    in_progress: &mut Vec<String>,
    resolved_here: &mut AHashMap<String, ResolvedImport>,
) -> NzslResult<StatementKind> {
    if !resolved_here.contains_key(module_name) {
        if in_progress.iter().any(|name| name == module_name) {
            return Err(NzslError::compiler(
                CompilerErrorKind::CircularImport,
                location.clone(),
                format!("module '{module_name}' is imported while it is still being resolved"),
            ));
        }

        let Some(resolver_ref) = resolver.as_deref_mut() else {
            return if options.partial_compilation {
                host.partial = true;
                Ok(StatementKind::NoOp)
            } else {
                Err(NzslError::compiler(CompilerErrorKind::NoModuleResolver, location.clone(), format!("no module resolver configured to import '{module_name}'")))
            };
        };

        let mut submodule = match resolver_ref.resolve_module(module_name) {
            Ok(parsed) => parsed,
            Err(ModuleResolverError::NotFound) => {
                return Err(NzslError::compiler(CompilerErrorKind::ModuleNotFound, location.clone(), format!("module '{module_name}' was not found")));
            }
            Err(ModuleResolverError::CompilationFailed(inner)) => {
                return Err(NzslError::compiler(
                    CompilerErrorKind::ModuleCompilationFailed,
                    location.clone(),
                    format!("module '{module_name}' failed to compile: {inner}"),
                ));
            }
        };

        for feature in &submodule.metadata.enabled_features {
            if !ctx.enabled_features.contains(feature) {
                return Err(NzslError::compiler(
                    CompilerErrorKind::ModuleFeatureMismatch,
                    location.clone(),
                    format!("module '{module_name}' requires feature '{feature}', which is not enabled for this compilation"),
                ));
            }
        }

        in_progress.push(module_name.to_string());
        let resolved = resolve_submodule(&mut submodule, ctx, resolver, options, in_progress);
        in_progress.pop();
        resolved?;

        let bindings = ctx.current_scope_user_bindings();
        ctx.pop_scope();

        let module_id = ctx.register_module(ImportedModule { id: ModuleId::new(0), identifier: module_name.to_string(), module: Box::new(submodule) });
        if let Some(entry) = ctx.module_mut(module_id) {
            entry.id = module_id;
        }
        host.imported_modules.push(ctx.module(module_id).expect("just registered").clone());
        resolved_here.insert(module_name.to_string(), ResolvedImport { bindings });
    }

    let resolved = &resolved_here[module_name];
    bind_identifiers(ctx, resolved, identifiers, location)
}

/// Resolves `submodule`'s own imports and declarations inside a fresh, isolated scope, so the
/// caller can harvest exactly the names it declared at its own top level without leaking outer
/// bindings in or the submodule's bindings out.
///
/// On success the pushed scope is left in place for the caller to harvest from and pop; on
/// failure it's popped here, since there's nothing left to harvest and the whole pass is about
/// to fail anyway.
fn resolve_submodule(submodule: &mut Module, ctx: &mut TransformerContext, resolver: &mut Option<&mut dyn ModuleResolver>, options: &ImportResolverOptions, in_progress: &mut Vec<String>) -> NzslResult<()> {
    resolve_imports_in(submodule, ctx, resolver, options, in_progress)?;

    ctx.push_scope();
    let resolver_options = ResolverOptions { partial_compilation: options.partial_compilation, allow_unknown_identifiers: false };
    let result = resolve(submodule, ctx, &resolver_options);
    if result.is_err() {
        ctx.pop_scope();
    }
    result
}

fn bind_identifiers(ctx: &mut TransformerContext, resolved: &ResolvedImport, identifiers: &ImportIdentifiers, location: &SourceLocation) -> NzslResult<StatementKind> {
    match identifiers {
        ImportIdentifiers::Wildcard => {
            for (name, binding) in &resolved.bindings {
                ctx.declare(name.clone(), *binding, location)?;
            }
        }
        ImportIdentifiers::Explicit(requested) => {
            let mut seen = ahash::AHashSet::default();
            for item in requested {
                let bound_name = item.rename.clone().unwrap_or_else(|| item.name.clone());
                if !seen.insert(bound_name.clone()) {
                    return Err(NzslError::compiler(
                        CompilerErrorKind::ImportIdentifierAlreadyPresent,
                        location.clone(),
                        format!("'{bound_name}' is imported more than once"),
                    ));
                }
                let Some((_, binding)) = resolved.bindings.iter().find(|(name, _)| *name == item.name) else {
                    return Err(NzslError::compiler(
                        CompilerErrorKind::UnknownIdentifier,
                        location.clone(),
                        format!("'{}' is not exported by the imported module", item.name),
                    ));
                };
                ctx.declare(bound_name, *binding, location)?;
            }
        }
    }
    Ok(StatementKind::NoOp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{
        context::ContextOptions,
        expressions::{Expression, ExpressionKind},
        module::ModuleMetadata,
        statements::{ImportedIdentifier, Statement},
        types::{PrimitiveType, Type},
    };

    struct StaticResolver(AHashMap<String, Module>);

    impl ModuleResolver for StaticResolver {
        fn resolve_module(&mut self, module_name: &str) -> Result<Module, ModuleResolverError> {
            self.0.get(module_name).cloned().ok_or(ModuleResolverError::NotFound)
        }
    }

    fn const_module(name: &str, value: i32) -> Module {
        let mut module = Module::new(ModuleMetadata { module_name: name.to_string(), ..Default::default() });
        *module.top_level_statements_mut() = vec![Statement::new(
            SourceLocation::synthetic(),
            StatementKind::DeclareConst {
                name: "Answer".into(),
                r#type: Some(Type::Primitive(PrimitiveType::I32)),
                value: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(nzsl_ast::constants::ConstantSingleValue::I32(value)), Type::Primitive(PrimitiveType::I32)),
            },
        )];
        module
    }

    #[test]
    fn explicit_import_declares_the_requested_name() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut resolver = StaticResolver(AHashMap::from_iter([("math".to_string(), const_module("math", 42))]));
        let mut host = Module::new(ModuleMetadata::default());
        *host.top_level_statements_mut() = vec![Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Import { module_name: "math".into(), identifiers: ImportIdentifiers::Explicit(vec![ImportedIdentifier { name: "Answer".into(), rename: None }]) },
        )];

        resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default()).unwrap();
        assert!(matches!(ctx.lookup("Answer"), Some(Binding::Constant(_))));
        assert_eq!(host.imported_modules.len(), 1);
    }

    #[test]
    fn wildcard_import_pulls_in_every_top_level_name() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut resolver = StaticResolver(AHashMap::from_iter([("math".to_string(), const_module("math", 7))]));
        let mut host = Module::new(ModuleMetadata::default());
        *host.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Import { module_name: "math".into(), identifiers: ImportIdentifiers::Wildcard })];

        resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default()).unwrap();
        assert!(matches!(ctx.lookup("Answer"), Some(Binding::Constant(_))));
    }

    #[test]
    fn importing_an_unknown_module_errors() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut resolver = StaticResolver(AHashMap::default());
        let mut host = Module::new(ModuleMetadata::default());
        *host.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Import { module_name: "ghost".into(), identifiers: ImportIdentifiers::Wildcard })];

        let err = resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::ModuleNotFound)));
    }

    #[test]
    fn duplicate_explicit_identifiers_are_rejected() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut resolver = StaticResolver(AHashMap::from_iter([("math".to_string(), const_module("math", 1))]));
        let mut host = Module::new(ModuleMetadata::default());
        *host.top_level_statements_mut() = vec![Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Import {
                module_name: "math".into(),
                identifiers: ImportIdentifiers::Explicit(vec![
                    ImportedIdentifier { name: "Answer".into(), rename: None },
                    ImportedIdentifier { name: "Answer".into(), rename: None },
                ]),
            },
        )];

        let err = resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::ImportIdentifierAlreadyPresent)));
    }

    #[test]
    fn importing_a_module_that_imports_itself_is_a_circular_import() {
        let mut ctx = TransformerContext::new(ContextOptions::default());
        let mut cyclic = Module::new(ModuleMetadata { module_name: "cyclic".into(), ..Default::default() });
        *cyclic.top_level_statements_mut() = vec![Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Import { module_name: "cyclic".into(), identifiers: ImportIdentifiers::Wildcard },
        )];
        let mut resolver = StaticResolver(AHashMap::from_iter([("cyclic".to_string(), cyclic)]));
        let mut host = Module::new(ModuleMetadata::default());
        *host.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Import { module_name: "cyclic".into(), identifiers: ImportIdentifiers::Wildcard })];

        let err = resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::CircularImport)));
    }

    #[test]
    fn missing_resolver_is_tolerated_under_partial_compilation() {
        let mut ctx = TransformerContext::new(ContextOptions { partial_compilation: true, ..Default::default() });
        let mut host = Module::new(ModuleMetadata::default());
        *host.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Import { module_name: "math".into(), identifiers: ImportIdentifiers::Wildcard })];

        resolve_imports(&mut host, &mut ctx, None, ImportResolverOptions { partial_compilation: true }).unwrap();
        assert!(host.partial);
        assert!(matches!(host.top_level_statements()[0].kind, StatementKind::NoOp));
    }
}
