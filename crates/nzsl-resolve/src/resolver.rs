//! The resolver pass (§4.F): the semantic core.
//!
//! Builds scopes as it descends. A declaration allocates an index in the matching
//! `TransformerContext` sub-table and binds its name in the current scope; an `Identifier`,
//! `AccessIdentifier`, or unresolved type expression is looked up in the scope chain and
//! rewritten into its typed post-resolution form (`VariableValue`, `Function`, `StructType`,
//! `AliasValue`, `Constant`, `AccessField`, ...).
//!
//! Sibling functions may call each other regardless of declaration order: top-level
//! `DeclareFunction` signatures are all registered in a first pass before any body is resolved
//! (`ResolveTransformer`'s forward-declaration behavior, §2 "Resolver method inventory").

use ahash::AHashMap;

use nzsl_ast::{
    constants::ConstantSingleValue,
    context::{AliasData, Binding, ConstantData, ContextOptions, ExternalBlockData, FunctionData, FunctionFlags, IntrinsicData, PartialTypeKind, StructData, TransformerContext, TypeData, VariableData},
    enums::{AccessPolicy, DepthWriteMode, ImageDimension, ImageFormat, IntrinsicKind, ShaderStage, StructLayout},
    errors::{CompilerErrorKind, NzslError, NzslResult},
    expressions::{Expression, ExpressionKind, ExpressionValue},
    location::SourceLocation,
    module::Module,
    statements::{BranchArm, FunctionAttributes, Statement, StatementKind, StructDescription},
    types::{PrimitiveType, StructRef, Type},
};

use crate::intrinsics::{check_intrinsic, intrinsic_name};

/// Configuration flags for one `resolve` invocation (§4.F, §9 "partial compilation").
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    pub partial_compilation: bool,
    pub allow_unknown_identifiers: bool,
}

/// Transient state threaded through one `resolve` call: nesting counters and the currently
/// enclosing function's signature, none of which belong on `TransformerContext` itself since
/// they don't survive past this one pass.
#[derive(Default)]
struct ResolveState {
    function_depth: u32,
    loop_depth: u32,
    current_return_type: Option<Type>,
    current_entry_stage: Option<ShaderStage>,
    defined_entry_stages: AHashMap<ShaderStage, SourceLocation>,
    used_bindings: AHashMap<(u32, u32), SourceLocation>,
    saw_unresolved_import: bool,
}

/// Runs the resolver over `module`'s tree (§4.F).
///
/// # Errors
/// Returns the first [`nzsl_ast::errors::CompilerErrorKind`] the resolver's taxonomy raises
/// (unknown identifier, already-used identifier, type mismatch, disallowed-in-stage, ...), or an
/// [`nzsl_ast::errors::AstErrorKind`] if the tree is already malformed in a way that should never
/// reach this pass.
pub fn resolve(module: &mut Module, ctx: &mut TransformerContext, options: &ResolverOptions) -> NzslResult<()> {
    ctx.options = ContextOptions { partial_compilation: options.partial_compilation, allow_unknown_identifiers: options.allow_unknown_identifiers };
    register_builtins(ctx);

    let mut state = ResolveState::default();
    let statements = module.top_level_statements_mut();
    resolve_top_level(statements, ctx, &mut state)?;

    if state.saw_unresolved_import {
        module.partial = true;
    }
    Ok(())
}

// --- Built-ins registration (§4.F "Built-ins registration") ---

/// Reserves the identifier space occupied by every built-in type constructor, intrinsic, and
/// keyword constant, so none of them can be shadowed by a user declaration (§4.F).
fn register_builtins(ctx: &mut TransformerContext) {
    for primitive in [
        PrimitiveType::Bool,
        PrimitiveType::I32,
        PrimitiveType::U32,
        PrimitiveType::F32,
        PrimitiveType::F64,
    ] {
        let id = ctx.register_type(TypeData::Concrete(Type::Primitive(primitive)));
        ctx.declare_reserved(primitive.to_string().to_lowercase(), Binding::Type(id));
    }

    for count in 2..=4u32 {
        let id = ctx.register_type(TypeData::Partial(PartialTypeKind::Vector { component_count: count }));
        ctx.declare_reserved(format!("vec{count}"), Binding::Type(id));
    }
    for columns in 2..=4u32 {
        for rows in 2..=4u32 {
            let id = ctx.register_type(TypeData::Partial(PartialTypeKind::Matrix { columns, rows }));
            let name = if columns == rows { format!("mat{columns}") } else { format!("mat{columns}x{rows}") };
            ctx.declare_reserved(name, Binding::Type(id));
        }
    }
    {
        let id = ctx.register_type(TypeData::Partial(PartialTypeKind::Array));
        ctx.declare_reserved("array", Binding::Type(id));
    }
    {
        let id = ctx.register_type(TypeData::Partial(PartialTypeKind::DynArray));
        ctx.declare_reserved("dyn_array", Binding::Type(id));
    }
    {
        let id = ctx.register_type(TypeData::Partial(PartialTypeKind::Uniform));
        ctx.declare_reserved("uniform", Binding::Type(id));
    }
    for access in [AccessPolicy::Readonly, AccessPolicy::Readwrite, AccessPolicy::Writeonly] {
        let id = ctx.register_type(TypeData::Partial(PartialTypeKind::Storage { access }));
        ctx.declare_reserved(format!("storage_{access}"), Binding::Type(id));
    }
    {
        let id = ctx.register_type(TypeData::Partial(PartialTypeKind::PushConstant));
        ctx.declare_reserved("push_constant", Binding::Type(id));
    }
    for (dim, name) in [
        (ImageDimension::D1, "1d"),
        (ImageDimension::D2, "2d"),
        (ImageDimension::D3, "3d"),
        (ImageDimension::Cube, "cube"),
    ] {
        for depth in [false, true] {
            let id = ctx.register_type(TypeData::Partial(PartialTypeKind::Sampler { dimension: dim, depth }));
            let suffix = if depth { "_depth" } else { "" };
            ctx.declare_reserved(format!("sampler{name}{suffix}"), Binding::Type(id));
        }
        let id = ctx.register_type(TypeData::Partial(PartialTypeKind::Texture { dimension: dim }));
        ctx.declare_reserved(format!("texture{name}"), Binding::Type(id));
    }

    for access in [AccessPolicy::Readonly, AccessPolicy::Readwrite, AccessPolicy::Writeonly] {
        declare_keyword_constant(ctx, &access.to_string());
    }
    for format in [
        ImageFormat::Rgba8,
        ImageFormat::Rgba8Snorm,
        ImageFormat::Rgba16F,
        ImageFormat::R32F,
        ImageFormat::Rg32F,
        ImageFormat::Rgba32F,
        ImageFormat::R32I,
        ImageFormat::R32U,
    ] {
        declare_keyword_constant(ctx, &format.to_string());
    }

    for kind in [
        IntrinsicKind::CrossProduct,
        IntrinsicKind::Exp,
        IntrinsicKind::Exp2,
        IntrinsicKind::Length,
        IntrinsicKind::Max,
        IntrinsicKind::Min,
        IntrinsicKind::Normalize,
        IntrinsicKind::Pow,
        IntrinsicKind::Reflect,
        IntrinsicKind::Select,
        IntrinsicKind::SquareRoot,
        IntrinsicKind::InverseSquareRoot,
        IntrinsicKind::Abs,
        IntrinsicKind::Ceil,
        IntrinsicKind::Floor,
        IntrinsicKind::Fract,
        IntrinsicKind::Round,
        IntrinsicKind::Sign,
        IntrinsicKind::Clamp,
        IntrinsicKind::Lerp,
        IntrinsicKind::Dot,
        IntrinsicKind::Distance,
        IntrinsicKind::MatrixInverse,
        IntrinsicKind::MatrixTranspose,
        IntrinsicKind::ArraySize,
        IntrinsicKind::SampleTexture,
        IntrinsicKind::TextureSampleImplicitLod,
        IntrinsicKind::TextureRead,
        IntrinsicKind::TextureWrite,
        IntrinsicKind::Unpack,
        IntrinsicKind::Pack,
    ] {
        let id = ctx.register_intrinsic(IntrinsicData { kind });
        ctx.declare_reserved(intrinsic_name(kind), Binding::Intrinsic(id));
    }
}

/// Access-policy and image-format names are reserved identifiers bound to a constant carrying
/// their own name as a tagged string value, rather than a dedicated enum-constant binding kind —
/// the context's `Binding` enum has no variant of its own for them, and a string-valued constant
/// is exactly how the type system already represents an opaque keyword payload (§4.C `String`).
fn declare_keyword_constant(ctx: &mut TransformerContext, name: &str) {
    let id = ctx.register_constant(ConstantData {
        name: name.to_owned(),
        r#type: Type::Primitive(PrimitiveType::String),
        value: Some(ConstantSingleValue::String(name.to_owned())),
        module_index: None,
        is_option: false,
    });
    ctx.declare_reserved(name, Binding::Constant(id));
}

// --- Top-level (module scope) resolution: forward-declares sibling functions ---

fn resolve_top_level(statements: &mut [Statement], ctx: &mut TransformerContext, state: &mut ResolveState) -> NzslResult<()> {
    let mut pending_bodies: Vec<usize> = Vec::new();

    for (index, stmt) in statements.iter_mut().enumerate() {
        match &mut stmt.kind {
            StatementKind::DeclareFunction { .. } => {
                declare_function_signature(stmt, ctx, state)?;
                pending_bodies.push(index);
            }
            _ => resolve_statement(stmt, ctx, state)?,
        }
    }

    for index in pending_bodies {
        resolve_function_body(&mut statements[index], ctx, state)?;
    }

    Ok(())
}

fn declare_function_signature(stmt: &mut Statement, ctx: &mut TransformerContext, state: &mut ResolveState) -> NzslResult<()> {
    let location = stmt.location.clone();
    let StatementKind::DeclareFunction { name, parameters, return_type, attributes, .. } = &mut stmt.kind else {
        unreachable!("caller only invokes this on DeclareFunction");
    };

    for parameter in parameters.iter_mut() {
        parameter.r#type = resolve_type(&parameter.r#type, ctx, &location)?;
    }
    *return_type = resolve_type(return_type, ctx, &location)?;
    resolve_function_attributes(attributes, &location, state)?;

    let id = ctx.register_function(FunctionData {
        name: name.clone(),
        parameters: parameters.clone(),
        return_type: return_type.clone(),
        attributes: attributes.clone(),
        flags: FunctionFlags { is_entry_point: attributes.entry_stage.is_some(), is_used_as_value: false },
    });
    ctx.declare(name.clone(), Binding::Function(id), &location)?;
    Ok(())
}

fn resolve_function_body(stmt: &mut Statement, ctx: &mut TransformerContext, state: &mut ResolveState) -> NzslResult<()> {
    let location = stmt.location.clone();
    let StatementKind::DeclareFunction { parameters, body, return_type, attributes, .. } = &mut stmt.kind else {
        unreachable!("caller only invokes this on DeclareFunction");
    };

    ctx.push_scope();
    for parameter in parameters.iter() {
        let id = ctx.register_variable(VariableData { name: parameter.name.clone(), r#type: parameter.r#type.clone(), is_const: true });
        ctx.declare(parameter.name.clone(), Binding::Variable(id), &location)?;
    }

    state.function_depth += 1;
    let previous_return = state.current_return_type.replace(return_type.clone());
    let previous_stage = state.current_entry_stage.take();
    state.current_entry_stage = attributes.entry_stage;

    let result = resolve_statement(body, ctx, state);

    state.current_entry_stage = previous_stage;
    state.current_return_type = previous_return;
    state.function_depth -= 1;
    ctx.pop_scope();
    result
}

fn resolve_function_attributes(attributes: &mut FunctionAttributes, location: &SourceLocation, state: &mut ResolveState) -> NzslResult<()> {
    if let Some(stage) = attributes.entry_stage {
        if let Some(existing) = state.defined_entry_stages.insert(stage, location.clone()) {
            let _ = existing;
            return Err(NzslError::compiler(
                CompilerErrorKind::EntryPointAlreadyDefined,
                location.clone(),
                format!("entry point for stage '{stage}' is already defined"),
            ));
        }
    }
    if attributes.depth_write.is_some() && attributes.entry_stage != Some(ShaderStage::Frag) {
        return Err(NzslError::compiler(CompilerErrorKind::DepthWriteAttribute, location.clone(), "[depth_write] is only valid on a fragment entry point"));
    }
    if attributes.early_fragment_tests.is_some() && attributes.entry_stage != Some(ShaderStage::Frag) {
        return Err(NzslError::compiler(
            CompilerErrorKind::EarlyFragmentTestsAttribute,
            location.clone(),
            "[early_fragment_tests] is only valid on a fragment entry point",
        ));
    }
    if attributes.workgroup_size.is_some() && attributes.entry_stage != Some(ShaderStage::Comp) {
        return Err(NzslError::compiler(
            CompilerErrorKind::AttributeUnexpectedType,
            location.clone(),
            "[workgroup] is only valid on a compute entry point",
        ));
    }
    if let Some(workgroup) = &mut attributes.workgroup_size {
        for component in workgroup.iter_mut() {
            resolve_expression_value_u32(component, location)?;
        }
    }
    if let Some(value) = &mut attributes.depth_write {
        resolve_expression_value_enum(value, location, |text| match text {
            "replace" => Some(DepthWriteMode::Replace),
            "greater" => Some(DepthWriteMode::Greater),
            "less" => Some(DepthWriteMode::Less),
            "unchanged" => Some(DepthWriteMode::Unchanged),
            _ => None,
        })?;
    }
    if let Some(value) = &mut attributes.early_fragment_tests {
        resolve_expression_value_bool(value, location)?;
    }
    Ok(())
}

// --- Statement resolution ---

fn resolve_statement(stmt: &mut Statement, ctx: &mut TransformerContext, state: &mut ResolveState) -> NzslResult<()> {
    let location = stmt.location.clone();
    let mut branch_replacement: Option<StatementKind> = None;
    let result: NzslResult<()> = match &mut stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements.iter_mut() {
                resolve_statement(s, ctx, state)?;
            }
            Ok(())
        }
        StatementKind::Scoped(inner) => {
            ctx.push_scope();
            let result = resolve_statement(inner, ctx, state);
            ctx.pop_scope();
            result
        }
        StatementKind::Branch { arms, else_statement, is_const } => {
            branch_replacement = resolve_branch(&location, arms, else_statement, *is_const, ctx, state)?;
            Ok(())
        }
        StatementKind::Conditional { condition, statement } => {
            resolve_expression(condition, ctx, state)?;
            require_bool(condition, &location)?;
            ctx.push_scope();
            let result = resolve_statement(statement, ctx, state);
            ctx.pop_scope();
            result
        }
        StatementKind::DeclareVariable { name, r#type, initial_value, var_id } => {
            if state.function_depth == 0 {
                return Err(NzslError::compiler(CompilerErrorKind::VarDeclarationOutsideOfFunction, location.clone(), "variables can only be declared inside a function"));
            }
            if let Some(value) = initial_value.as_mut() {
                resolve_expression(value, ctx, state)?;
            }
            let resolved_type = match (r#type.as_ref(), initial_value.as_ref().and_then(|v| v.cached_type.clone())) {
                (Some(declared), _) => resolve_type(declared, ctx, &location)?,
                (None, Some(inferred)) => inferred,
                (None, None) => {
                    return Err(NzslError::compiler(
                        CompilerErrorKind::VarDeclarationMissingTypeAndValue,
                        location.clone(),
                        format!("variable '{name}' needs either a declared type or an initializer"),
                    ))
                }
            };
            if let (Some(_), Some(value)) = (r#type.as_ref(), initial_value.as_ref()) {
                if let Some(value_type) = &value.cached_type {
                    if !types_compatible(&resolved_type, value_type) {
                        return Err(NzslError::compiler(
                            CompilerErrorKind::VarDeclarationTypeUnmatching,
                            location.clone(),
                            format!("variable '{name}' declared as {resolved_type:?} but initialized with {value_type:?}"),
                        ));
                    }
                }
            }
            *r#type = Some(resolved_type.clone());
            let id = ctx.register_variable(VariableData { name: name.clone(), r#type: resolved_type, is_const: false });
            ctx.declare(name.clone(), Binding::Variable(id), &location)?;
            *var_id = Some(id);
            Ok(())
        }
        StatementKind::DeclareConst { name, r#type, value } => {
            resolve_expression(value, ctx, state)?;
            let resolved_type = match r#type {
                Some(t) => resolve_type(t, ctx, &location)?,
                None => value.cached_type.clone().unwrap_or(Type::NoType),
            };
            *r#type = Some(resolved_type.clone());
            let folded_value = match &value.kind {
                ExpressionKind::ConstantValue(v) => Some(v.clone()),
                _ => None,
            };
            let id = ctx.register_constant(ConstantData { name: name.clone(), r#type: resolved_type, value: folded_value, module_index: None, is_option: false });
            ctx.declare(name.clone(), Binding::Constant(id), &location)?;
            Ok(())
        }
        StatementKind::DeclareOption { name, r#type, default_value } => {
            if state.function_depth > 0 {
                return Err(NzslError::compiler(CompilerErrorKind::OptionDeclarationInsideFunction, location.clone(), "options can only be declared at module scope"));
            }
            *r#type = resolve_type(r#type, ctx, &location)?;
            if let Some(value) = default_value.as_mut() {
                resolve_expression(value, ctx, state)?;
            }
            let folded_value = default_value.as_ref().and_then(|v| match &v.kind {
                ExpressionKind::ConstantValue(cv) => Some(cv.clone()),
                _ => None,
            });
            let id = ctx.register_constant(ConstantData { name: name.clone(), r#type: r#type.clone(), value: folded_value, module_index: None, is_option: true });
            ctx.declare(name.clone(), Binding::Constant(id), &location)?;
            Ok(())
        }
        StatementKind::DeclareAlias { name, target } => {
            resolve_expression(target, ctx, state)?;
            let resolved_target = match &target.kind {
                ExpressionKind::TypeConstant(t) => t.clone(),
                ExpressionKind::StructType(id) => Type::Struct(StructRef::resolved(name_of_struct(ctx, *id), *id)),
                _ => {
                    return Err(NzslError::compiler(CompilerErrorKind::AliasUnexpectedType, location.clone(), format!("alias '{name}' must target a type")));
                }
            };
            let id = ctx.register_alias(AliasData { name: name.clone(), target: resolved_target });
            ctx.declare(name.clone(), Binding::Alias(id), &location)?;
            Ok(())
        }
        StatementKind::DeclareStruct { description } => {
            if state.function_depth > 0 {
                return Err(NzslError::compiler(CompilerErrorKind::StructDeclarationInsideFunction, location.clone(), "structs can only be declared at module scope"));
            }
            resolve_struct(description, ctx, &location)?;
            let id = ctx.register_struct(StructData { description: description.clone(), module_index: None });
            ctx.declare(description.name.clone(), Binding::Struct(id), &location)?;
            Ok(())
        }
        StatementKind::DeclareExternal { block_name, variables } => {
            if state.function_depth > 0 {
                return Err(NzslError::compiler(CompilerErrorKind::ExtAlreadyDeclared, location.clone(), "external blocks can only be declared at module scope"));
            }
            for variable in variables.iter_mut() {
                variable.r#type = resolve_type(&variable.r#type, ctx, &location)?;
                resolve_external_type(&variable.r#type, &variable.name, &location)?;
            }
            assign_auto_bindings(variables, state, &location)?;
            let id = ctx.register_external_block(ExternalBlockData { block_name: block_name.clone(), members: variables.clone() });
            for variable in variables.iter() {
                let var_id = ctx.register_variable(VariableData { name: variable.name.clone(), r#type: variable.r#type.clone(), is_const: true });
                ctx.declare(variable.name.clone(), Binding::Variable(var_id), &location)?;
            }
            let _ = id;
            Ok(())
        }
        StatementKind::DeclareFunction { .. } => {
            if state.function_depth > 0 {
                return Err(NzslError::compiler(CompilerErrorKind::FunctionDeclarationInsideFunction, location.clone(), "functions cannot be declared inside another function"));
            }
            declare_function_signature(stmt, ctx, state)?;
            resolve_function_body(stmt, ctx, state)
        }
        StatementKind::Expression(expr) => resolve_expression(expr, ctx, state),
        StatementKind::For { var_name, from, to, step, body, var_id, .. } => {
            resolve_expression(from, ctx, state)?;
            resolve_expression(to, ctx, state)?;
            if let Some(step) = step.as_mut() {
                resolve_expression(step, ctx, state)?;
            }
            let counter_type = from.cached_type.clone().unwrap_or(Type::Primitive(PrimitiveType::I32));
            ctx.push_scope();
            let id = ctx.register_variable(VariableData { name: var_name.clone(), r#type: counter_type, is_const: false });
            ctx.declare(var_name.clone(), Binding::Variable(id), &location)?;
            *var_id = Some(id);
            state.loop_depth += 1;
            let result = resolve_statement(body, ctx, state);
            state.loop_depth -= 1;
            ctx.pop_scope();
            result
        }
        StatementKind::ForEach { var_name, container, body, var_id, .. } => {
            resolve_expression(container, ctx, state)?;
            let element_type = match container.cached_type.as_ref().map(Type::resolve_alias) {
                Some(Type::Array { inner, .. } | Type::DynArray { inner }) => (**inner).clone(),
                _ => {
                    return Err(NzslError::compiler(CompilerErrorKind::ForEachUnsupportedType, location.clone(), "for-each requires an array or dyn_array expression"));
                }
            };
            ctx.push_scope();
            let id = ctx.register_variable(VariableData { name: var_name.clone(), r#type: element_type, is_const: false });
            ctx.declare(var_name.clone(), Binding::Variable(id), &location)?;
            *var_id = Some(id);
            state.loop_depth += 1;
            let result = resolve_statement(body, ctx, state);
            state.loop_depth -= 1;
            ctx.pop_scope();
            result
        }
        StatementKind::While { condition, body, .. } => {
            resolve_expression(condition, ctx, state)?;
            require_bool(condition, &location)?;
            ctx.push_scope();
            state.loop_depth += 1;
            let result = resolve_statement(body, ctx, state);
            state.loop_depth -= 1;
            ctx.pop_scope();
            result
        }
        StatementKind::Return(expr) => {
            if state.function_depth == 0 {
                return Err(NzslError::ast(nzsl_ast::errors::AstErrorKind::Internal, location.clone(), "return statement outside of a function"));
            }
            if let Some(e) = expr.as_mut() {
                resolve_expression(e, ctx, state)?;
            }
            Ok(())
        }
        StatementKind::Break | StatementKind::Continue => {
            if state.loop_depth == 0 {
                let which = if matches!(stmt.kind, StatementKind::Break) { "break" } else { "continue" };
                return Err(NzslError::compiler(CompilerErrorKind::LoopControlOutsideOfLoop, location.clone(), format!("'{which}' used outside of a loop")));
            }
            Ok(())
        }
        StatementKind::Discard => {
            if state.function_depth == 0 {
                return Err(NzslError::compiler(CompilerErrorKind::DiscardOutsideOfFunction, location.clone(), "'discard' used outside of a function"));
            }
            if state.current_entry_stage == Some(ShaderStage::Vert) {
                return Err(NzslError::compiler(CompilerErrorKind::InvalidStageDependency, location.clone(), "'discard' is not valid in a vertex entry point"));
            }
            Ok(())
        }
        StatementKind::Import { module_name, identifiers } => {
            state.saw_unresolved_import = true;
            let _ = (module_name, identifiers);
            Ok(())
        }
        StatementKind::NoOp => Ok(()),
    };
    result?;
    if let Some(replacement) = branch_replacement {
        stmt.kind = replacement;
    }
    Ok(())
}

/// Resolves a `const if` chain's arms/else branch, then (for `is_const`) folds the whole
/// statement down to whichever single branch's body is statically taken. Returns the
/// replacement `StatementKind` for the caller to splice in, rather than writing through a
/// second mutable borrow of the `stmt.kind` the `arms`/`else_statement` borrows already came
/// from.
fn resolve_branch(
    location: &SourceLocation,
    arms: &mut [BranchArm],
    else_statement: &mut Option<Box<Statement>>,
    is_const: bool,
    ctx: &mut TransformerContext,
    state: &mut ResolveState,
) -> NzslResult<Option<StatementKind>> {
    if state.function_depth == 0 {
        return Err(NzslError::compiler(CompilerErrorKind::BranchOutsideOfFunction, location.clone(), "branches can only appear inside a function"));
    }

    for arm in arms.iter_mut() {
        resolve_expression(&mut arm.condition, ctx, state)?;
        require_bool(&arm.condition, location)?;
        ctx.push_scope();
        let result = resolve_statement(&mut arm.body, ctx, state);
        ctx.pop_scope();
        result?;
    }
    if let Some(else_stmt) = else_statement.as_mut() {
        ctx.push_scope();
        let result = resolve_statement(else_stmt, ctx, state);
        ctx.pop_scope();
        result?;
    }

    if !is_const {
        return Ok(None);
    }
    for arm in arms.iter() {
        if let ExpressionKind::ConstantValue(ConstantSingleValue::Bool(true)) = &arm.condition.kind {
            return Ok(Some(arm.body.kind.clone()));
        }
        if !matches!(&arm.condition.kind, ExpressionKind::ConstantValue(ConstantSingleValue::Bool(_))) {
            return Err(NzslError::compiler(CompilerErrorKind::ConstantExpressionRequired, location.clone(), "'const if' condition must fold to a compile-time boolean"));
        }
    }
    Ok(Some(else_statement.take().map_or(StatementKind::NoOp, |s| s.kind)))
}

fn name_of_struct(ctx: &TransformerContext, id: nzsl_ast::ids::StructId) -> String {
    ctx.struct_data(id).map_or_else(String::new, |d| d.description.name.clone())
}

fn resolve_struct(description: &mut StructDescription, ctx: &mut TransformerContext, location: &SourceLocation) -> NzslResult<()> {
    let mut seen_cond_names: AHashMap<String, ()> = AHashMap::new();
    for field in description.fields.iter_mut() {
        field.r#type = resolve_type(&field.r#type, ctx, location)?;
        if field.attributes.builtin.is_some() && field.attributes.location.is_some() {
            return Err(NzslError::compiler(
                CompilerErrorKind::StructFieldBuiltinLocation,
                location.clone(),
                format!("struct field '{}' cannot have both [builtin] and [location]", field.name),
            ));
        }
        if field.attributes.cond.is_some() {
            if seen_cond_names.insert(field.name.clone(), ()).is_some() {
                return Err(NzslError::compiler(
                    CompilerErrorKind::StructFieldMultiple,
                    location.clone(),
                    format!("struct field '{}' declared more than once under [cond]", field.name),
                ));
            }
        }
        if let Some(layout) = description.layout {
            validate_layout_compatible(&field.r#type, layout, &field.name, location)?;
        }
    }
    Ok(())
}

fn validate_layout_compatible(ty: &Type, _layout: StructLayout, field_name: &str, location: &SourceLocation) -> NzslResult<()> {
    match ty.resolve_alias() {
        Type::Sampler { .. } | Type::Texture { .. } | Type::Function(_) | Type::Method { .. } | Type::Intrinsic(_) => Err(NzslError::compiler(
            CompilerErrorKind::StructLayoutTypeNotAllowed,
            location.clone(),
            format!("struct field '{field_name}' has a type not allowed in a laid-out struct"),
        )),
        _ => Ok(()),
    }
}

fn resolve_external_type(ty: &Type, name: &str, location: &SourceLocation) -> NzslResult<()> {
    match ty.resolve_alias() {
        Type::Uniform(_) | Type::Storage { .. } | Type::PushConstant(_) | Type::Sampler { .. } | Type::Texture { .. } | Type::Primitive(_) => Ok(()),
        _ => Err(NzslError::compiler(CompilerErrorKind::ExtTypeNotAllowed, location.clone(), format!("external member '{name}' has a type not usable in an external block"))),
    }
}

/// Assigns every member of one external block a `(set, binding)` pair, in two passes so an
/// auto-assigned slot can never collide with an explicit one declared earlier or later in the
/// same block (§4.F "deterministic by source order"):
///
/// 1. Default a missing `[set]` to 0, then register every *explicit* (non-`auto_binding`)
///    member's pair into `state.used_bindings` up front, erroring on a collision against
///    anything seen so far (this block's own members included) or a missing `[binding]`.
/// 2. Walk the `auto_binding` members and hand each the lowest free slot not yet recorded,
///    recording it immediately so later members in the same block see it too.
fn assign_auto_bindings(variables: &mut [nzsl_ast::statements::ExternalVariable], state: &mut ResolveState, location: &SourceLocation) -> NzslResult<()> {
    for variable in variables.iter_mut() {
        if variable.set.is_unset() {
            variable.set = ExpressionValue::Resolved(0);
        }
    }

    for variable in variables.iter() {
        if variable.auto_binding {
            continue;
        }
        let Some(&set) = variable.set.resolved() else { continue };
        let Some(&binding) = variable.binding.resolved() else {
            return Err(NzslError::compiler(CompilerErrorKind::ExtMissingBindingIndex, location.clone(), format!("external member '{}' is missing a [binding]", variable.name)));
        };
        if let Some(previous) = state.used_bindings.insert((set, binding), location.clone()) {
            let _ = previous;
            return Err(NzslError::compiler(
                CompilerErrorKind::ExtBindingAlreadyUsed,
                location.clone(),
                format!("binding set={set} binding={binding} already used (member '{}')", variable.name),
            ));
        }
    }

    for variable in variables.iter_mut() {
        if !variable.auto_binding {
            continue;
        }
        let set = *variable.set.resolved().unwrap_or(&0);
        let mut candidate = 0u32;
        while state.used_bindings.contains_key(&(set, candidate)) {
            candidate += 1;
        }
        variable.binding = ExpressionValue::Resolved(candidate);
        state.used_bindings.insert((set, candidate), location.clone());
    }
    Ok(())
}

// --- Expression resolution ---

fn resolve_expression(expr: &mut Expression, ctx: &mut TransformerContext, state: &mut ResolveState) -> NzslResult<()> {
    let location = expr.location.clone();
    match &mut expr.kind {
        ExpressionKind::Identifier(name) => {
            let binding = ctx.resolve_identifier(name, &location)?;
            let Some(binding) = binding else {
                return Ok(());
            };
            rewrite_identifier(expr, binding, ctx);
        }
        ExpressionKind::AccessIdentifier { expr: inner, names } => {
            resolve_expression(inner, ctx, state)?;
            resolve_access_chain(expr, inner.as_ref().clone(), names.clone(), ctx, &location)?;
        }
        ExpressionKind::Binary { op, lhs, rhs } => {
            resolve_expression(lhs, ctx, state)?;
            resolve_expression(rhs, ctx, state)?;
            let op = *op;
            let result_type = infer_binary_type(op, lhs, rhs, &location)?;
            expr.cached_type = Some(result_type);
        }
        ExpressionKind::Unary { op, expr: inner } => {
            resolve_expression(inner, ctx, state)?;
            let ty = inner.cached_type.clone();
            if *op == nzsl_ast::enums::UnaryOp::LogicalNot {
                if !matches!(ty.as_ref().map(Type::resolve_alias), Some(Type::Primitive(PrimitiveType::Bool))) {
                    return Err(NzslError::compiler(CompilerErrorKind::UnaryUnsupported, location, "'!' requires a bool operand"));
                }
            }
            expr.cached_type = ty;
        }
        ExpressionKind::Assign { op, lhs, rhs } => {
            resolve_expression(lhs, ctx, state)?;
            resolve_expression(rhs, ctx, state)?;
            if !is_lvalue(lhs) {
                return Err(NzslError::compiler(CompilerErrorKind::AssignTemporary, location, "left-hand side of an assignment must be a variable, field, or index expression"));
            }
            let _ = op;
            expr.cached_type = lhs.cached_type.clone();
        }
        ExpressionKind::CallFunction { target, params } => {
            resolve_expression(target, ctx, state)?;
            for param in params.iter_mut() {
                resolve_expression(param, ctx, state)?;
            }
            resolve_call(expr, ctx, &location)?;
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            resolve_expression(object, ctx, state)?;
            for param in params.iter_mut() {
                resolve_expression(param, ctx, state)?;
            }
            resolve_method_call(expr, &location)?;
        }
        ExpressionKind::Intrinsic { kind, params } => {
            for param in params.iter_mut() {
                resolve_expression(param, ctx, state)?;
            }
            let result_type = check_intrinsic(*kind, params, &location)?;
            expr.cached_type = Some(result_type);
        }
        ExpressionKind::Cast { target_type, exprs } => {
            *target_type = resolve_type(target_type, ctx, &location)?;
            for e in exprs.iter_mut() {
                resolve_expression(e, ctx, state)?;
            }
            expr.cached_type = Some(target_type.clone());
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            resolve_expression(condition, ctx, state)?;
            require_bool(condition, &location)?;
            resolve_expression(true_path, ctx, state)?;
            resolve_expression(false_path, ctx, state)?;
            expr.cached_type = true_path.cached_type.clone();
        }
        ExpressionKind::AccessIndex { expr: inner, indices } => {
            resolve_expression(inner, ctx, state)?;
            for i in indices.iter_mut() {
                resolve_expression(i, ctx, state)?;
            }
            for i in indices.iter() {
                let is_integer = matches!(
                    i.cached_type.as_ref().map(Type::resolve_alias),
                    Some(Type::Primitive(PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::IntLiteral))
                );
                if !is_integer {
                    return Err(NzslError::compiler(CompilerErrorKind::IndexRequiresIntegerIndices, location.clone(), "index expression must be an integer"));
                }
            }
            expr.cached_type = match inner.cached_type.as_ref().map(Type::resolve_alias) {
                Some(Type::Array { inner, .. } | Type::DynArray { inner }) => Some((**inner).clone()),
                Some(Type::Vector { component_type, .. }) => Some(Type::Primitive(*component_type)),
                Some(other) => Some(other.clone()),
                None => None,
            };
        }
        ExpressionKind::Swizzle { expr: inner, .. } => {
            resolve_expression(inner, ctx, state)?;
        }
        ExpressionKind::ConstantValue(v) => {
            expr.cached_type = Some(v.get_type());
        }
        ExpressionKind::ConstantArrayValue(v) => {
            expr.cached_type = Some(v.get_type());
        }
        ExpressionKind::TypeConstant(t) => {
            let resolved = resolve_type(t, ctx, &location)?;
            *t = resolved;
        }
        ExpressionKind::AccessField { .. } | ExpressionKind::AliasValue(_) | ExpressionKind::Constant(_) | ExpressionKind::Function(_) | ExpressionKind::IntrinsicFunction(_) | ExpressionKind::Module(_) | ExpressionKind::NamedExternalBlock(_) | ExpressionKind::StructType(_) | ExpressionKind::VariableValue(_) => {}
    }
    Ok(())
}

fn rewrite_identifier(expr: &mut Expression, binding: Binding, ctx: &TransformerContext) {
    let location = expr.location.clone();
    expr.kind = match binding {
        Binding::Variable(id) => {
            expr.cached_type = ctx.variable(id).map(|v| v.r#type.clone());
            ExpressionKind::VariableValue(id)
        }
        Binding::Constant(id) => {
            expr.cached_type = ctx.constant(id).map(|c| c.r#type.clone());
            if let Some(data) = ctx.constant(id) {
                if let Some(value) = &data.value {
                    expr.cached_type = Some(value.get_type());
                }
            }
            ExpressionKind::Constant(id)
        }
        Binding::Function(id) => {
            expr.cached_type = Some(Type::Function(id));
            ExpressionKind::Function(id)
        }
        Binding::Struct(id) => {
            expr.cached_type = Some(Type::Struct(StructRef::resolved(name_of_struct(ctx, id), id)));
            ExpressionKind::StructType(id)
        }
        Binding::Alias(id) => {
            expr.cached_type = ctx.alias(id).map(|a| a.target.clone());
            ExpressionKind::AliasValue(id)
        }
        Binding::Module(id) => ExpressionKind::Module(id),
        Binding::Type(id) => {
            let resolved = ctx.type_data(id).and_then(|t| match t {
                TypeData::Concrete(ty) => Some(ty.clone()),
                TypeData::Partial(_) => None,
            });
            expr.cached_type = None;
            ExpressionKind::TypeConstant(resolved.unwrap_or(Type::NoType))
        }
        Binding::Intrinsic(id) => {
            let kind = ctx.intrinsic(id).map_or(IntrinsicKind::Abs, |i| i.kind);
            expr.cached_type = Some(Type::Intrinsic(kind));
            ExpressionKind::IntrinsicFunction(kind)
        }
    };
    expr.location = location;
}

/// Resolves an `AccessIdentifier` chain one name at a time, rewriting `expr` into a struct-field
/// access (`AccessField`), a swizzle, or a method reference as each hop's accessed type demands
/// (§2 "`AccessField` vs `AccessIdentifier`").
fn resolve_access_chain(expr: &mut Expression, base: Expression, names: Vec<String>, ctx: &TransformerContext, location: &SourceLocation) -> NzslResult<()> {
    let mut current = base;
    for name in names {
        let accessed_type = current.cached_type.clone();
        match accessed_type.as_ref().map(Type::resolve_alias) {
            Some(Type::Struct(r) | Type::Uniform(r) | Type::PushConstant(r)) => {
                let struct_data = ctx.struct_data(r.struct_id);
                let Some(struct_data) = struct_data else {
                    return Err(NzslError::compiler(CompilerErrorKind::UnknownField, location.clone(), format!("unknown struct in access chain for field '{name}'")));
                };
                let field_index = struct_data.description.fields.iter().position(|f| f.name == name);
                let Some(field_index) = field_index else {
                    return Err(NzslError::compiler(CompilerErrorKind::UnknownField, location.clone(), format!("struct '{}' has no field '{name}'", struct_data.description.name)));
                };
                let field_type = struct_data.description.fields[field_index].r#type.clone();
                current = Expression::with_type(location.clone(), ExpressionKind::AccessField { expr: Box::new(current), field_index: field_index as u32 }, field_type);
            }
            Some(Type::Vector { component_count, component_type }) => {
                let components = swizzle_components(&name, *component_count, location)?;
                let count = components.len() as u8;
                let result_type = if count == 1 { Type::Primitive(*component_type) } else { Type::Vector { component_count: u32::from(count), component_type: *component_type } };
                current = Expression::with_type(location.clone(), ExpressionKind::Swizzle { expr: Box::new(current), components, count }, result_type);
            }
            Some(Type::Primitive(component_type)) if *component_type != PrimitiveType::String => {
                let component_type = *component_type;
                let count = scalar_swizzle_count(&name, location)?;
                let result_type = if count == 1 { Type::Primitive(component_type) } else { Type::Vector { component_count: u32::from(count), component_type } };
                let components = smallvec::smallvec![0u8; usize::from(count)];
                current = Expression::with_type(location.clone(), ExpressionKind::Swizzle { expr: Box::new(current), components, count }, result_type);
            }
            _ => {
                current = Expression::new(location.clone(), ExpressionKind::CallMethod { object: Box::new(current), method: name, params: Vec::new() });
            }
        }
    }
    *expr = current;
    Ok(())
}

fn swizzle_components(name: &str, component_count: u32, location: &SourceLocation) -> NzslResult<smallvec::SmallVec<[u8; 4]>> {
    let mut out = smallvec::SmallVec::<[u8; 4]>::new();
    for c in name.chars() {
        let index = match c {
            'x' | 'r' => 0,
            'y' | 'g' => 1,
            'z' | 'b' => 2,
            'w' | 'a' => 3,
            _ => return Err(NzslError::compiler(CompilerErrorKind::InvalidSwizzle, location.clone(), format!("'{c}' is not a valid swizzle component"))),
        };
        if index >= component_count {
            return Err(NzslError::compiler(CompilerErrorKind::InvalidSwizzle, location.clone(), format!("swizzle component '{c}' out of range for a {component_count}-component vector")));
        }
        out.push(index);
    }
    if out.is_empty() || out.len() > 4 {
        return Err(NzslError::compiler(CompilerErrorKind::InvalidSwizzle, location.clone(), "swizzle must select between 1 and 4 components"));
    }
    Ok(out)
}

/// Validates a swizzle name applied to a scalar (primitive, not vector) expression. A scalar has
/// only one component, so every character must name it (`x`/`r`); `value.x` degenerates to the
/// scalar itself and `value.xxxx` splats it into a 4-component vector (§4.I swizzle lowering),
/// but `value.y` or `value.xy` have no component to reference and are rejected.
fn scalar_swizzle_count(name: &str, location: &SourceLocation) -> NzslResult<u8> {
    if name.is_empty() || name.len() > 4 {
        return Err(NzslError::compiler(CompilerErrorKind::InvalidScalarSwizzle, location.clone(), "swizzle must select between 1 and 4 components"));
    }
    if !name.chars().all(|c| c == 'x' || c == 'r') {
        return Err(NzslError::compiler(CompilerErrorKind::InvalidScalarSwizzle, location.clone(), format!("'{name}' is not a valid swizzle for a scalar expression")));
    }
    Ok(name.len() as u8)
}

fn resolve_call(expr: &mut Expression, ctx: &TransformerContext, location: &SourceLocation) -> NzslResult<()> {
    let ExpressionKind::CallFunction { target, params } = &mut expr.kind else { unreachable!() };
    match &target.kind {
        ExpressionKind::Function(id) => {
            let id = *id;
            let Some(function) = ctx.function(id) else {
                return Ok(());
            };
            if function.flags.is_entry_point {
                return Err(NzslError::compiler(
                    CompilerErrorKind::FunctionCallUnexpectedEntryFunction,
                    location.clone(),
                    format!("entry point '{}' cannot be called from program code", function.name),
                ));
            }
            if params.len() != function.parameters.len() {
                return Err(NzslError::compiler(
                    CompilerErrorKind::FunctionCallUnmatchingParameterCount,
                    location.clone(),
                    format!("function '{}' expects {} argument(s), got {}", function.name, function.parameters.len(), params.len()),
                ));
            }
            for (i, (arg, parameter)) in params.iter().zip(function.parameters.iter()).enumerate() {
                let Some(arg_type) = arg.cached_type.as_ref() else { continue };
                if !call_argument_compatible(arg_type, &parameter.r#type) {
                    return Err(NzslError::compiler(
                        CompilerErrorKind::FunctionCallUnmatchingParameterType,
                        location.clone(),
                        format!("argument #{i} to '{}' has an incompatible type for parameter '{}'", function.name, parameter.name),
                    ));
                }
            }
            expr.cached_type = Some(function.return_type.clone());
        }
        ExpressionKind::IntrinsicFunction(kind) => {
            let kind = *kind;
            let result = check_intrinsic(kind, params, location)?;
            expr.kind = ExpressionKind::Intrinsic { kind, params: std::mem::take(params) };
            expr.cached_type = Some(result);
            return Ok(());
        }
        _ => return Err(NzslError::compiler(CompilerErrorKind::FunctionCallExpectedFunction, location.clone(), "call target is not a function")),
    }
    Ok(())
}

/// Whether an argument of type `arg` may be passed where `parameter` is declared, allowing an
/// untyped literal argument through when its integer/float kind matches (actual coercion to the
/// concrete parameter type happens in the literal-typing pass that runs after resolution, §4.H).
fn call_argument_compatible(arg: &Type, parameter: &Type) -> bool {
    if types_compatible(arg, parameter) {
        return true;
    }
    match (arg.as_primitive(), parameter.as_primitive()) {
        (Some(a), Some(p)) if a.is_literal() && p.is_numeric() => a.is_integer() == p.is_integer(),
        _ => false,
    }
}

/// Resolves a `.Method(...)` call against the accessed object's type (§4.F "Method call
/// checking"). Only `Length()` on a fixed-size array is modeled today; anything else raises
/// `UnknownMethod`.
fn resolve_method_call(expr: &mut Expression, location: &SourceLocation) -> NzslResult<()> {
    let ExpressionKind::CallMethod { object, method, params } = &expr.kind else { unreachable!() };
    let method = method.clone();
    let has_args = !params.is_empty();
    let Some(object_type) = object.cached_type.clone() else { return Ok(()) };
    match (method.as_str(), object_type.resolve_alias()) {
        ("Length", Type::Array { length, .. }) => {
            if has_args {
                return Err(NzslError::compiler(CompilerErrorKind::FunctionCallUnmatchingParameterCount, location.clone(), "'Length' takes no arguments"));
            }
            let length = *length;
            expr.kind = ExpressionKind::ConstantValue(ConstantSingleValue::U32(length));
            expr.cached_type = Some(Type::Primitive(PrimitiveType::U32));
        }
        ("Length", Type::DynArray { .. }) => {
            return Err(NzslError::compiler(
                CompilerErrorKind::ArrayLengthRequired,
                location.clone(),
                "'Length' requires a fixed-length array, not a 'dyn_array'",
            ));
        }
        (other, ty) => {
            return Err(NzslError::compiler(CompilerErrorKind::UnknownMethod, location.clone(), format!("type {ty:?} has no method '{other}'")));
        }
    }
    Ok(())
}

fn infer_binary_type(op: nzsl_ast::enums::BinaryOp, lhs: &Expression, rhs: &Expression, location: &SourceLocation) -> NzslResult<Type> {
    let (Some(lhs_ty), Some(rhs_ty)) = (&lhs.cached_type, &rhs.cached_type) else {
        return Ok(Type::NoType);
    };
    if op.is_comparison() || op.is_logical() {
        return Ok(Type::Primitive(PrimitiveType::Bool));
    }
    if types_compatible(lhs_ty, rhs_ty) {
        return Ok(lhs_ty.clone());
    }
    if lhs_ty.is_numeric() && rhs_ty.is_numeric() {
        return Ok(if matches!(rhs_ty.as_primitive(), Some(p) if p.is_literal()) { lhs_ty.clone() } else { rhs_ty.clone() });
    }
    Err(NzslError::compiler(
        CompilerErrorKind::BinaryIncompatibleTypes,
        location.clone(),
        format!("incompatible operand types for '{op}': {lhs_ty:?} and {rhs_ty:?}"),
    ))
}

fn types_compatible(a: &Type, b: &Type) -> bool {
    a.resolve_alias() == b.resolve_alias()
}

fn require_bool(expr: &Expression, location: &SourceLocation) -> NzslResult<()> {
    match expr.cached_type.as_ref().map(Type::resolve_alias) {
        Some(Type::Primitive(PrimitiveType::Bool)) | None => Ok(()),
        Some(_) => Err(NzslError::compiler(CompilerErrorKind::ConditionExpectedBool, location.clone(), "condition must be a bool expression")),
    }
}

fn is_lvalue(expr: &Expression) -> bool {
    matches!(
        expr.kind,
        ExpressionKind::VariableValue(_) | ExpressionKind::AccessField { .. } | ExpressionKind::AccessIndex { .. } | ExpressionKind::Swizzle { .. }
    )
}

fn resolve_expression_value_u32(value: &mut ExpressionValue<u32>, location: &SourceLocation) -> NzslResult<()> {
    if let ExpressionValue::Unresolved(expr) = value {
        let resolved = match &expr.kind {
            ExpressionKind::ConstantValue(ConstantSingleValue::U32(v)) => Some(*v),
            ExpressionKind::ConstantValue(ConstantSingleValue::I32(v)) if *v >= 0 => Some(*v as u32),
            _ => None,
        };
        let Some(v) = resolved else {
            return Err(NzslError::compiler(CompilerErrorKind::AttributeUnexpectedType, location.clone(), "attribute expects a constant u32 expression"));
        };
        value.resolve(v);
    }
    Ok(())
}

fn resolve_expression_value_bool(value: &mut ExpressionValue<bool>, location: &SourceLocation) -> NzslResult<()> {
    if let ExpressionValue::Unresolved(expr) = value {
        if let ExpressionKind::ConstantValue(ConstantSingleValue::Bool(b)) = &expr.kind {
            let b = *b;
            value.resolve(b);
            return Ok(());
        }
        return Err(NzslError::compiler(CompilerErrorKind::AttributeUnexpectedType, location.clone(), "attribute expects a constant bool expression"));
    }
    Ok(())
}

fn resolve_expression_value_enum<T>(value: &mut ExpressionValue<T>, location: &SourceLocation, parse: impl Fn(&str) -> Option<T>) -> NzslResult<()> {
    if let ExpressionValue::Unresolved(expr) = value {
        if let ExpressionKind::ConstantValue(ConstantSingleValue::String(s)) = &expr.kind {
            if let Some(parsed) = parse(s) {
                value.resolve(parsed);
                return Ok(());
            }
        }
        return Err(NzslError::compiler(CompilerErrorKind::AttributeInvalidParameter, location.clone(), "attribute value does not name a recognized keyword"));
    }
    Ok(())
}

// --- Type resolution ---

/// Resolves a type expression produced pre-resolution (a bare `Named` identifier, or a
/// `Struct`/`Uniform`/`Storage`/`PushConstant` wrapper still carrying [`StructRef::UNRESOLVED`])
/// into its fully concrete form, per §4.F.
pub(crate) fn resolve_type(ty: &Type, ctx: &TransformerContext, location: &SourceLocation) -> NzslResult<Type> {
    match ty {
        Type::Named(name) => match ctx.lookup(name) {
            Some(Binding::Struct(id)) => Ok(Type::Struct(StructRef::resolved(name.clone(), id))),
            Some(Binding::Alias(id)) => Ok(Type::Alias { name: name.clone(), target: Box::new(ctx.alias(id).map_or(Type::NoType, |a| a.target.clone())) }),
            Some(Binding::Type(id)) => match ctx.type_data(id) {
                Some(TypeData::Concrete(concrete)) => Ok(concrete.clone()),
                Some(TypeData::Partial(_)) => Err(NzslError::compiler(CompilerErrorKind::FullTypeExpected, location.clone(), format!("'{name}' names a partial type; type arguments are required"))),
                None => Err(NzslError::compiler(CompilerErrorKind::UnknownType, location.clone(), format!("unknown type '{name}'"))),
            },
            Some(_) => Err(NzslError::compiler(CompilerErrorKind::StructExpected, location.clone(), format!("'{name}' does not name a type"))),
            None if ctx.options.allow_unknown_identifiers => Ok(ty.clone()),
            None => Err(NzslError::compiler(CompilerErrorKind::UnknownIdentifier, location.clone(), format!("unknown type '{name}'"))),
        },
        Type::Struct(r) if !r.is_resolved() => resolve_struct_ref(r, ctx, location).map(Type::Struct),
        Type::Uniform(r) if !r.is_resolved() => resolve_struct_ref(r, ctx, location).map(Type::Uniform),
        Type::PushConstant(r) if !r.is_resolved() => resolve_struct_ref(r, ctx, location).map(Type::PushConstant),
        Type::Storage { structure, access } if !structure.is_resolved() => {
            Ok(Type::Storage { structure: resolve_struct_ref(structure, ctx, location)?, access: *access })
        }
        Type::Array { inner, length } => Ok(Type::Array { inner: Box::new(resolve_type(inner, ctx, location)?), length: *length }),
        Type::DynArray { inner } => Ok(Type::DynArray { inner: Box::new(resolve_type(inner, ctx, location)?) }),
        Type::Alias { name, target } => Ok(Type::Alias { name: name.clone(), target: Box::new(resolve_type(target, ctx, location)?) }),
        other => Ok(other.clone()),
    }
}

fn resolve_struct_ref(r: &StructRef, ctx: &TransformerContext, location: &SourceLocation) -> NzslResult<StructRef> {
    match ctx.lookup(&r.name) {
        Some(Binding::Struct(id)) => Ok(StructRef::resolved(r.name.clone(), id)),
        Some(_) => Err(NzslError::compiler(CompilerErrorKind::StructExpected, location.clone(), format!("'{}' does not name a struct", r.name))),
        None => Err(NzslError::compiler(CompilerErrorKind::UnknownIdentifier, location.clone(), format!("unknown struct '{}'", r.name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::{context::ContextOptions, location::SourceLocation, module::ModuleMetadata};

    fn new_ctx() -> TransformerContext {
        TransformerContext::new(ContextOptions::default())
    }

    #[test]
    fn builtins_cannot_be_redeclared() {
        let mut ctx = new_ctx();
        register_builtins(&mut ctx);
        let err = ctx.declare("vec3", Binding::Variable(nzsl_ast::ids::VariableId::new(0)), &SourceLocation::synthetic());
        assert!(err.is_err());
    }

    #[test]
    fn simple_let_resolves_against_a_constant_initializer() {
        let mut module = Module::new(ModuleMetadata::default());
        let mut ctx = new_ctx();
        let body = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Multi(vec![Statement::new(
                SourceLocation::synthetic(),
                StatementKind::DeclareVariable {
                    name: "x".into(),
                    r#type: None,
                    initial_value: Some(Expression::new(SourceLocation::synthetic(), ExpressionKind::ConstantValue(ConstantSingleValue::I32(42)))),
                    var_id: None,
                },
            )]),
        );
        *module.top_level_statements_mut() = vec![Statement::new(
            SourceLocation::synthetic(),
            StatementKind::DeclareFunction {
                name: "main".into(),
                parameters: vec![],
                body: Box::new(body),
                return_type: Type::NoType,
                attributes: FunctionAttributes::default(),
            },
        )];
        resolve(&mut module, &mut ctx, &ResolverOptions::default()).unwrap();
        assert_eq!(ctx.iter_variables().count(), 1);
    }

    #[test]
    fn sibling_functions_may_call_each_other_regardless_of_order() {
        let mut module = Module::new(ModuleMetadata::default());
        let mut ctx = new_ctx();
        let call_helper = Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Multi(vec![Statement::new(
                SourceLocation::synthetic(),
                StatementKind::Expression(Expression::new(
                    SourceLocation::synthetic(),
                    ExpressionKind::CallFunction { target: Box::new(Expression::new(SourceLocation::synthetic(), ExpressionKind::Identifier("helper".into()))), params: vec![] },
                )),
            )]),
        );
        let helper_body = Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![]));
        *module.top_level_statements_mut() = vec![
            Statement::new(
                SourceLocation::synthetic(),
                StatementKind::DeclareFunction { name: "main".into(), parameters: vec![], body: Box::new(call_helper), return_type: Type::NoType, attributes: FunctionAttributes::default() },
            ),
            Statement::new(
                SourceLocation::synthetic(),
                StatementKind::DeclareFunction { name: "helper".into(), parameters: vec![], body: Box::new(helper_body), return_type: Type::NoType, attributes: FunctionAttributes::default() },
            ),
        ];
        resolve(&mut module, &mut ctx, &ResolverOptions::default()).unwrap();
    }

    #[test]
    fn duplicate_external_binding_is_rejected() {
        let mut module = Module::new(ModuleMetadata::default());
        let mut ctx = new_ctx();
        let variables = vec![
            nzsl_ast::statements::ExternalVariable {
                name: "foo".into(),
                r#type: Type::Sampler { dimension: ImageDimension::D2, sampled_type: PrimitiveType::F32, depth: false },
                binding: ExpressionValue::Resolved(0),
                set: ExpressionValue::Resolved(0),
                auto_binding: false,
            },
            nzsl_ast::statements::ExternalVariable {
                name: "bar".into(),
                r#type: Type::Sampler { dimension: ImageDimension::D2, sampled_type: PrimitiveType::F32, depth: false },
                binding: ExpressionValue::Resolved(0),
                set: ExpressionValue::Resolved(0),
                auto_binding: false,
            },
        ];
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::DeclareExternal { block_name: None, variables })];
        let err = resolve(&mut module, &mut ctx, &ResolverOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::ExtBindingAlreadyUsed)));
    }

    fn call_statement(name: &str, params: Vec<Expression>) -> Statement {
        Statement::new(
            SourceLocation::synthetic(),
            StatementKind::Expression(Expression::new(
                SourceLocation::synthetic(),
                ExpressionKind::CallFunction { target: Box::new(Expression::new(SourceLocation::synthetic(), ExpressionKind::Identifier(name.into()))), params },
            )),
        )
    }

    fn function_decl(name: &str, parameters: Vec<nzsl_ast::statements::FunctionParameter>, attributes: FunctionAttributes) -> Statement {
        Statement::new(
            SourceLocation::synthetic(),
            StatementKind::DeclareFunction {
                name: name.into(),
                parameters,
                body: Box::new(Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![]))),
                return_type: Type::NoType,
                attributes,
            },
        )
    }

    #[test]
    fn calling_a_function_with_the_wrong_argument_count_is_rejected() {
        let mut module = Module::new(ModuleMetadata::default());
        let mut ctx = new_ctx();
        let helper = function_decl("helper", vec![nzsl_ast::statements::FunctionParameter { name: "x".into(), r#type: Type::Primitive(PrimitiveType::I32) }], FunctionAttributes::default());
        let mut main = function_decl("main", vec![], FunctionAttributes::default());
        let StatementKind::DeclareFunction { body, .. } = &mut main.kind else { unreachable!() };
        *body = Box::new(Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![call_statement("helper", vec![])])));
        *module.top_level_statements_mut() = vec![main, helper];
        let err = resolve(&mut module, &mut ctx, &ResolverOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::FunctionCallUnmatchingParameterCount)));
    }

    #[test]
    fn calling_an_entry_point_function_from_program_code_is_rejected() {
        let mut module = Module::new(ModuleMetadata::default());
        let mut ctx = new_ctx();
        let entry_attrs = FunctionAttributes { entry_stage: Some(ShaderStage::Frag), ..FunctionAttributes::default() };
        let entry_fn = function_decl("main", vec![], entry_attrs);
        let mut caller = function_decl("caller", vec![], FunctionAttributes::default());
        let StatementKind::DeclareFunction { body, .. } = &mut caller.kind else { unreachable!() };
        *body = Box::new(Statement::new(SourceLocation::synthetic(), StatementKind::Multi(vec![call_statement("main", vec![])])));
        *module.top_level_statements_mut() = vec![entry_fn, caller];
        let err = resolve(&mut module, &mut ctx, &ResolverOptions::default());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::FunctionCallUnexpectedEntryFunction)));
    }

    #[test]
    fn scalar_swizzle_splat_resolves_to_a_vector_cast_source() {
        let ctx = new_ctx();
        let base = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(nzsl_ast::ids::VariableId::new(0)), Type::Primitive(PrimitiveType::F32));
        let mut expr = Expression::new(SourceLocation::synthetic(), ExpressionKind::Identifier(String::new()));
        resolve_access_chain(&mut expr, base, vec!["xxxx".into()], &ctx, &SourceLocation::synthetic()).unwrap();
        assert!(matches!(expr.kind, ExpressionKind::Swizzle { count: 4, .. }));
        assert_eq!(expr.cached_type, Some(Type::Vector { component_count: 4, component_type: PrimitiveType::F32 }));
    }

    #[test]
    fn scalar_swizzle_with_a_non_x_component_is_rejected() {
        let ctx = new_ctx();
        let base = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(nzsl_ast::ids::VariableId::new(0)), Type::Primitive(PrimitiveType::F32));
        let mut expr = Expression::new(SourceLocation::synthetic(), ExpressionKind::Identifier(String::new()));
        let err = resolve_access_chain(&mut expr, base, vec!["y".into()], &ctx, &SourceLocation::synthetic());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::InvalidScalarSwizzle)));
    }

    #[test]
    fn length_method_on_a_fixed_array_folds_to_its_constant_length() {
        let array_type = Type::Array { inner: Box::new(Type::Primitive(PrimitiveType::F32)), length: 6 };
        let object = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(nzsl_ast::ids::VariableId::new(0)), array_type);
        let mut expr =
            Expression::new(SourceLocation::synthetic(), ExpressionKind::CallMethod { object: Box::new(object), method: "Length".into(), params: vec![] });
        resolve_method_call(&mut expr, &SourceLocation::synthetic()).unwrap();
        assert!(matches!(expr.kind, ExpressionKind::ConstantValue(ConstantSingleValue::U32(6))));
    }

    #[test]
    fn length_method_on_a_dyn_array_requires_a_fixed_length() {
        let dyn_array_type = Type::DynArray { inner: Box::new(Type::Primitive(PrimitiveType::F32)) };
        let object = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(nzsl_ast::ids::VariableId::new(0)), dyn_array_type);
        let mut expr =
            Expression::new(SourceLocation::synthetic(), ExpressionKind::CallMethod { object: Box::new(object), method: "Length".into(), params: vec![] });
        let err = resolve_method_call(&mut expr, &SourceLocation::synthetic());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::ArrayLengthRequired)));
    }

    #[test]
    fn an_unknown_method_name_is_rejected() {
        let object = Expression::with_type(SourceLocation::synthetic(), ExpressionKind::VariableValue(nzsl_ast::ids::VariableId::new(0)), Type::Primitive(PrimitiveType::F32));
        let mut expr = Expression::new(SourceLocation::synthetic(), ExpressionKind::CallMethod { object: Box::new(object), method: "Bogus".into(), params: vec![] });
        let err = resolve_method_call(&mut expr, &SourceLocation::synthetic());
        assert!(matches!(err, Err(e) if e.kind == nzsl_ast::errors::ErrorKind::Compiler(CompilerErrorKind::UnknownMethod)));
    }
}
