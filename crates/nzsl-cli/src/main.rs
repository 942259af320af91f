use std::{process::ExitCode, time::Instant};

use nzsl_ast::{
    codec, dependency_check, statements::FunctionAttributes, AssignOp, BinaryOp, CompilerErrorKind, ConstantSingleValue, ContextOptions, ErrorKind,
    Expression, ExpressionKind, PrimitiveType, ShaderStage, SourceLocation, Statement, StatementKind, Type, TransformerContext,
};
use nzsl_resolve::{
    assign_literal_types, lower_compound_assignments, lower_loops, lower_matrices, lower_swizzles, propagate_constants, remove_aliases, resolve,
    split_branches, split_struct_assignments, unroll_loops, ConstantPropagationOptions, LiteralTypingOptions, ResolverOptions,
};

/// A minimal, hand-built example program standing in for one a lexer/parser would hand us:
///
/// ```text
/// [entry(frag)]
/// fn main() -> f32
/// {
///     let value: f32 = 1.0 + 2.0;
///     value *= 2.0;
///     return value;
/// }
/// ```
fn example_module() -> nzsl_ast::Module {
    let loc = SourceLocation::synthetic();
    let literal = |v: f64| Expression::new(loc.clone(), ExpressionKind::ConstantValue(ConstantSingleValue::FloatLiteral(v)));

    let declare_value = Statement::new(
        loc.clone(),
        StatementKind::DeclareVariable {
            name: "value".into(),
            r#type: Some(Type::Primitive(PrimitiveType::F32)),
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

    let mut module = nzsl_ast::Module::new(nzsl_ast::ModuleMetadata { module_name: "example".into(), nzsl_version: (1, 0), ..Default::default() });
    *module.top_level_statements_mut() = vec![main_fn];
    module
}

fn run() -> Result<(), nzsl_ast::NzslError> {
    let mut module = example_module();
    let mut ctx = TransformerContext::new(ContextOptions::default());

    resolve(&mut module, &mut ctx, &ResolverOptions::default())?;
    assign_literal_types(&mut module, &mut ctx, LiteralTypingOptions::default())?;
    propagate_constants(&mut module, &mut ctx, ConstantPropagationOptions::default())?;

    lower_compound_assignments(&mut module, &mut ctx)?;
    split_branches(&mut module, &mut ctx)?;
    lower_loops(&mut module, &mut ctx)?;
    unroll_loops(&mut module, &mut ctx)?;
    lower_matrices(&mut module, &mut ctx)?;
    lower_swizzles(&mut module, &mut ctx)?;
    split_struct_assignments(&mut module, &mut ctx)?;
    remove_aliases(&mut module, &mut ctx)?;

    let usage = dependency_check(&module, &ctx, &[ShaderStage::Frag]);
    eprintln!("reachable: {} function(s), {} struct(s), {} constant(s)", usage.functions.len(), usage.structs.len(), usage.constants.len());

    let bytes = codec::serialize(&module, &ctx).map_err(|err| nzsl_ast::NzslError::ast(nzsl_ast::AstErrorKind::Internal, SourceLocation::synthetic(), err.to_string()))?;
    eprintln!("encoded module: {} bytes", bytes.len());
    let (decoded_module, _decoded_ctx) =
        codec::deserialize(&bytes).map_err(|err| nzsl_ast::NzslError::ast(nzsl_ast::AstErrorKind::Internal, SourceLocation::synthetic(), err.to_string()))?;
    assert_eq!(decoded_module.metadata.module_name, module.metadata.module_name, "round trip changed the module");

    Ok(())
}

fn main() -> ExitCode {
    let start = Instant::now();
    match run() {
        Ok(()) => {
            let elapsed = start.elapsed();
            println!("pipeline succeeded in {elapsed:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let elapsed = start.elapsed();
            eprintln!("pipeline failed after {elapsed:?}: {err}");
            if err.kind == ErrorKind::Compiler(CompilerErrorKind::UnknownIdentifier) {
                eprintln!("hint: every identifier the example program uses must be declared before use");
            }
            ExitCode::FAILURE
        }
    }
}
