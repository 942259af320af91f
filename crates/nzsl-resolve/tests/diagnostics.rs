//! End-to-end diagnostics: each test drives a small module through the exact sequence of passes
//! needed to surface one specific error, the way a host embedding this crate would see it.

use nzsl_ast::{
    constants::ConstantSingleValue,
    context::{ContextOptions, TransformerContext},
    enums::{BinaryOp, ModuleFeature},
    errors::{CompilerErrorKind, ErrorKind},
    expressions::{Expression, ExpressionKind},
    location::SourceLocation,
    module::{Module, ModuleMetadata},
    statements::{ImportIdentifiers, Statement, StatementKind},
    types::{PrimitiveType, Type},
};
use nzsl_resolve::{
    assign_literal_types, propagate_constants, resolve, resolve_imports, ConstantPropagationOptions, ImportResolverOptions, LiteralTypingOptions, ModuleResolver,
    ModuleResolverError, ResolverOptions,
};

fn const_i32(value: i64) -> Expression {
    Expression::new(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::IntLiteral(value)))
}

#[test]
fn oversized_integer_literal_is_reported_as_out_of_range() {
    let mut module = Module::new(ModuleMetadata::default());
    *module.top_level_statements_mut() = vec![Statement::new(
        SourceLocation::synthetic(),
        StatementKind::DeclareConst { name: "TooBig".into(), r#type: Some(Type::Primitive(PrimitiveType::I32)), value: const_i32(2_147_483_648) },
    )];
    let mut ctx = TransformerContext::new(ContextOptions::default());

    resolve(&mut module, &mut ctx, &ResolverOptions::default()).unwrap();
    let err = assign_literal_types(&mut module, &mut ctx, LiteralTypingOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Compiler(CompilerErrorKind::LiteralOutOfRange));
}

#[test]
fn dividing_a_constant_by_zero_is_caught_during_folding() {
    let mut module = Module::new(ModuleMetadata::default());
    let division = Expression::new(
        SourceLocation::synthetic(),
        ExpressionKind::Binary { op: BinaryOp::Divide, lhs: Box::new(const_i32(42)), rhs: Box::new(const_i32(0)) },
    );
    *module.top_level_statements_mut() =
        vec![Statement::new(SourceLocation::synthetic(), StatementKind::DeclareConst { name: "Bad".into(), r#type: Some(Type::Primitive(PrimitiveType::I32)), value: division })];
    let mut ctx = TransformerContext::new(ContextOptions::default());

    resolve(&mut module, &mut ctx, &ResolverOptions::default()).unwrap();
    assign_literal_types(&mut module, &mut ctx, LiteralTypingOptions::default()).unwrap();
    let err = propagate_constants(&mut module, &mut ctx, ConstantPropagationOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Compiler(CompilerErrorKind::IntegralDivisionByZero));
}

struct FeatureGatedResolver;

impl ModuleResolver for FeatureGatedResolver {
    fn resolve_module(&mut self, module_name: &str) -> Result<Module, ModuleResolverError> {
        assert_eq!(module_name, "highprecision");
        let mut submodule = Module::new(ModuleMetadata { module_name: "highprecision".into(), enabled_features: vec![ModuleFeature::Float64], ..Default::default() });
        *submodule.top_level_statements_mut() = vec![Statement::new(
            SourceLocation::synthetic(),
            StatementKind::DeclareConst { name: "Epsilon".into(), r#type: Some(Type::Primitive(PrimitiveType::F64)), value: const_i32(0) },
        )];
        Ok(submodule)
    }
}

#[test]
fn importing_a_module_that_needs_an_unenabled_feature_is_rejected() {
    let mut host = Module::new(ModuleMetadata::default());
    *host.top_level_statements_mut() = vec![Statement::new(
        SourceLocation::synthetic(),
        StatementKind::Import { module_name: "highprecision".into(), identifiers: ImportIdentifiers::Wildcard },
    )];
    let mut ctx = TransformerContext::new(ContextOptions::default());
    // ctx.enabled_features stays empty: the host compilation never opted into Float64.
    let mut resolver = FeatureGatedResolver;

    let err = resolve_imports(&mut host, &mut ctx, Some(&mut resolver), ImportResolverOptions::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Compiler(CompilerErrorKind::ModuleFeatureMismatch));
}
