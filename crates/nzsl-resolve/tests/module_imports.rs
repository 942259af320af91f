//! Import resolution composed with the ordinary resolver: an imported constant must be usable
//! by name in the importing module's own code, not just visible in the context's symbol table.

use nzsl_ast::{
    constants::ConstantSingleValue,
    context::{Binding, ContextOptions, TransformerContext},
    errors::{CompilerErrorKind, ErrorKind},
    expressions::{Expression, ExpressionKind},
    location::SourceLocation,
    module::{Module, ModuleMetadata},
    statements::{ImportIdentifiers, ImportedIdentifier, Statement, StatementKind},
    types::{PrimitiveType, Type},
};
use nzsl_resolve::{resolve, resolve_imports, ImportResolverOptions, ModuleResolver, ModuleResolverError, ResolverOptions};

struct FixedResolver(Module);

impl ModuleResolver for FixedResolver {
    fn resolve_module(&mut self, module_name: &str) -> Result<Module, ModuleResolverError> {
        if module_name == self.0.metadata.module_name { Ok(self.0.clone()) } else { Err(ModuleResolverError::NotFound) }
    }
}

fn constants_module() -> Module {
    let mut module = Module::new(ModuleMetadata { module_name: "constants".into(), ..Default::default() });
    *module.top_level_statements_mut() = vec![Statement::new(
        SourceLocation::synthetic(),
        StatementKind::DeclareConst {
            name: "Gravity".into(),
            r#type: Some(Type::Primitive(PrimitiveType::F32)),
            value: Expression::with_type(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::F32(9.8)), Type::Primitive(PrimitiveType::F32)),
        },
    )];
    module
}

#[test]
fn an_imported_constant_is_usable_by_name_in_the_host_module() {
    let mut host = Module::new(ModuleMetadata::default());
    *host.top_level_statements_mut() = vec![
        Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Import {
                module_name: "constants".into(),
                identifiers: ImportIdentifiers::Explicit(vec![ImportedIdentifier { name: "Gravity".into(), rename: None }]),
            },
        ),
        Statement::new(
            SourceLocation::synthetic(),
            StatementKind::DeclareConst { name: "DoubleGravity".into(), r#type: None, value: Expression::new(SourceLocation::synthetic(), ExpressionKind::Identifier("Gravity".into())) },
        ),
    ];
    let mut ctx = TransformerContext::new(ContextOptions::default());
    let mut resolver = FixedResolver(constants_module());

    resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default()).unwrap();
    assert!(matches!(ctx.lookup("Gravity"), Some(Binding::Constant(_))));

    resolve(&mut host, &mut ctx, &ResolverOptions::default()).unwrap();
    let StatementKind::DeclareConst { value, .. } = &host.top_level_statements()[1].kind else { panic!("expected the second statement to still be a const declaration") };
    assert!(matches!(value.kind, ExpressionKind::Constant(_)), "the identifier should resolve against the imported binding, not error as unknown");
}

#[test]
fn the_same_module_imported_twice_in_one_file_is_not_resolved_twice() {
    let mut host = Module::new(ModuleMetadata::default());
    *host.top_level_statements_mut() = vec![
        Statement::new(SourceLocation::synthetic(), StatementKind::Import { module_name: "constants".into(), identifiers: ImportIdentifiers::Wildcard }),
        Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Import {
                module_name: "constants".into(),
                identifiers: ImportIdentifiers::Explicit(vec![ImportedIdentifier { name: "Gravity".into(), rename: Some("G".into()) }]),
            },
        ),
    ];
    let mut ctx = TransformerContext::new(ContextOptions::default());
    let mut resolver = FixedResolver(constants_module());

    let err = resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default());
    // the wildcard import already declared `Gravity`; re-requesting it under a new name is fine,
    // but the module itself must only be registered once.
    err.unwrap();
    assert_eq!(host.imported_modules.len(), 1);
    assert!(matches!(ctx.lookup("G"), Some(Binding::Constant(_))));
}

#[test]
fn an_explicit_import_naming_something_the_module_does_not_export_is_unknown() {
    let mut host = Module::new(ModuleMetadata::default());
    *host.top_level_statements_mut() = vec![Statement::new(
        SourceLocation::synthetic(),
        StatementKind::Import {
            module_name: "constants".into(),
            identifiers: ImportIdentifiers::Explicit(vec![ImportedIdentifier { name: "Nonexistent".into(), rename: None }]),
        },
    )];
    let mut ctx = TransformerContext::new(ContextOptions::default());
    let mut resolver = FixedResolver(constants_module());

    let err = resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Compiler(CompilerErrorKind::UnknownIdentifier));
}
