//! End-to-end exercise of the full transformation pipeline, in the same order the manual-testing
//! CLI runs it: resolve, literal typing, constant propagation, the structural lowering passes,
//! dependency analysis, and finally a binary round trip.

use nzsl_ast::{
    codec,
    constants::ConstantSingleValue,
    context::{ContextOptions, TransformerContext},
    dependency_check,
    enums::{AssignOp, BinaryOp, ShaderStage},
    expressions::{Expression, ExpressionKind},
    location::SourceLocation,
    module::{Module, ModuleMetadata},
    statements::{FunctionAttributes, Statement, StatementKind},
    types::{PrimitiveType, Type},
};
use nzsl_resolve::{
    assign_literal_types, lower_compound_assignments, lower_loops, lower_matrices, lower_swizzles, propagate_constants, remove_aliases, resolve, split_branches,
    split_struct_assignments, unroll_loops, ConstantPropagationOptions, LiteralTypingOptions, ResolverOptions,
};
use pretty_assertions::assert_eq;

fn literal(v: f64) -> Expression {
    Expression::new(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::FloatLiteral(v)))
}

fn shader_module() -> Module {
    let loc = SourceLocation::synthetic();
    let declare_value = Statement::new(
        loc.clone(),
        StatementKind::DeclareVariable {
            name: "value".into(),
            r#type: None,
            initial_value: Some(Expression::new(
                loc.clone(),
                ExpressionKind::Binary { op: BinaryOp::Add, lhs: Box::new(literal(1.0)), rhs: Box::new(literal(2.0)) },
            )),
            var_id: None,
        },
    );
    let double_value = Statement::new(
        loc.clone(),
        StatementKind::Expression(Expression::new(
            loc.clone(),
            ExpressionKind::Assign {
                op: AssignOp::CompoundMultiply,
                lhs: Box::new(Expression::new(loc.clone(), ExpressionKind::Identifier("value".into()))),
                rhs: Box::new(literal(2.0)),
            },
        )),
    );
    let return_value = Statement::new(loc.clone(), StatementKind::Return(Some(Expression::new(loc.clone(), ExpressionKind::Identifier("value".into())))));

    let body = Statement::new(loc.clone(), StatementKind::Multi(vec![declare_value, double_value, return_value]));
    let main_fn = Statement::new(
        loc.clone(),
        StatementKind::DeclareFunction {
            name: "main".into(),
            parameters: Vec::new(),
            body: Box::new(body),
            return_type: Type::Primitive(PrimitiveType::F32),
            attributes: FunctionAttributes { entry_stage: Some(ShaderStage::Frag), ..FunctionAttributes::default() },
        },
    );

    let mut module = Module::new(ModuleMetadata { module_name: "pipeline_test".into(), nzsl_version: (1, 0), ..Default::default() });
    *module.top_level_statements_mut() = vec![main_fn];
    module
}

#[test]
fn full_pipeline_runs_and_round_trips_through_the_codec() {
    let mut module = shader_module();
    let mut ctx = TransformerContext::new(ContextOptions::default());

    resolve(&mut module, &mut ctx, &ResolverOptions::default()).unwrap();
    assign_literal_types(&mut module, &mut ctx, LiteralTypingOptions::default()).unwrap();
    propagate_constants(&mut module, &mut ctx, ConstantPropagationOptions::default()).unwrap();

    lower_compound_assignments(&mut module, &mut ctx).unwrap();
    split_branches(&mut module, &mut ctx).unwrap();
    lower_loops(&mut module, &mut ctx).unwrap();
    unroll_loops(&mut module, &mut ctx).unwrap();
    lower_matrices(&mut module, &mut ctx).unwrap();
    lower_swizzles(&mut module, &mut ctx).unwrap();
    split_struct_assignments(&mut module, &mut ctx).unwrap();
    remove_aliases(&mut module, &mut ctx).unwrap();

    let usage = dependency_check(&module, &ctx, &[ShaderStage::Frag]);
    assert_eq!(usage.functions.len(), 1, "the entry point itself should be marked reachable");

    let bytes = codec::serialize(&module, &ctx).unwrap();
    let (decoded_module, decoded_ctx) = codec::deserialize(&bytes).unwrap();
    assert_eq!(decoded_module.metadata.module_name, "pipeline_test");
    assert_eq!(decoded_ctx.iter_functions().count(), ctx.iter_functions().count());
}

#[test]
fn running_the_same_module_twice_produces_identical_trees() {
    // resolve() is idempotent up to source locations: given the same input and fresh context,
    // running the pipeline twice must declare the same number of symbols and leave the same
    // reachable set, modulo synthetic vs. original locations never being compared here.
    let mut module_a = shader_module();
    let mut ctx_a = TransformerContext::new(ContextOptions::default());
    resolve(&mut module_a, &mut ctx_a, &ResolverOptions::default()).unwrap();

    let mut module_b = shader_module();
    let mut ctx_b = TransformerContext::new(ContextOptions::default());
    resolve(&mut module_b, &mut ctx_b, &ResolverOptions::default()).unwrap();

    assert_eq!(ctx_a.iter_functions().count(), ctx_b.iter_functions().count());
    assert_eq!(ctx_a.iter_variables().count(), ctx_b.iter_variables().count());
}
