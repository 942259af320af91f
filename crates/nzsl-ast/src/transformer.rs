//! The transformer framework (§4.D): an in-place mutating visitor over a `Module`'s tree.
//!
//! Every pass implements [`Transformer`], overriding only the hooks it cares about. Each hook
//! returns a [`VisitAction`] telling the framework whether to recurse into the node's children,
//! stop, or replace the node outright. A separate statement-list side channel
//! ([`TransformerState::append_statement`]) lets a pass splice new statements in front of
//! the one currently being visited — used to hoist temporaries the way the original's
//! `Transformer::AppendStatement` does.

use crate::{
    context::{Binding, TransformerContext, VariableData},
    errors::NzslResult,
    expressions::{Expression, ExpressionKind},
    ids::VariableId,
    location::SourceLocation,
    module::Module,
    statements::{BranchArm, Statement, StatementKind},
    types::Type,
};

/// What a transformer hook wants done with the node it was just handed.
pub enum VisitAction<Node> {
    /// Recurse into this node's children with the same transformer.
    VisitChildren,
    /// Leave this node (and its children) untouched.
    DontVisitChildren,
    /// Replace the current node with `Node`. Its children are *not* automatically visited —
    /// a pass that wants the replacement's children visited too must recurse manually or
    /// return `VisitChildren` from a subsequent call after re-dispatching.
    Replace(Box<Node>),
}

/// Mutable state threaded through one `Transformer::transform` call: the statement-list side
/// channel used to splice new statements before the one currently being visited (§4.D).
#[derive(Default)]
pub struct TransformerState {
    /// Statements queued to be inserted immediately before the statement currently being
    /// visited, in the order queued. Drained by the framework after each statement in a `Multi`
    /// is visited.
    pending_prefix: Vec<Statement>,
    /// Disambiguates the synthetic names `declare_variable`/`cache_expression` generate, so two
    /// hoisted temporaries within the same pass never collide.
    next_temporary: u32,
}

impl TransformerState {
    /// Queues `statement` to be inserted immediately before the statement currently being
    /// visited (§4.D, used by lowering passes to hoist a temporary: "`let _nzsl_matrix:
    /// mat4[f32];` injected before an assignment that will fill its columns").
    pub fn append_statement(&mut self, statement: Statement) {
        self.pending_prefix.push(statement);
    }

    fn drain_pending(&mut self) -> Vec<Statement> {
        std::mem::take(&mut self.pending_prefix)
    }

    fn next_temporary_name(&mut self, hint: &str) -> String {
        let n = self.next_temporary;
        self.next_temporary += 1;
        format!("_nzsl_{hint}{n}")
    }

    /// Declares a fresh local variable in `ctx`'s current scope, appends its `DeclareVariable`
    /// statement ahead of the one currently being visited, and returns its stable index (§2
    /// "`DeclareVariable` helper" from the transformer plumbing carried over from the original).
    pub fn declare_variable(
        &mut self,
        ctx: &mut TransformerContext,
        name_hint: &str,
        r#type: Type,
        initial_value: Option<Expression>,
        location: SourceLocation,
    ) -> VariableId {
        let name = self.next_temporary_name(name_hint);
        let id = ctx.register_variable(VariableData { name: name.clone(), r#type: r#type.clone(), is_const: false });
        ctx.declare(name.clone(), Binding::Variable(id), &location).expect("synthetic temporary name never collides");
        self.append_statement(Statement::new(
            location,
            StatementKind::DeclareVariable { name, r#type: Some(r#type), initial_value, var_id: Some(id) },
        ));
        id
    }

    /// Hoists `expr` into a freshly declared temporary variable and returns a `VariableValue`
    /// expression reading it back, preserving `expr`'s cached type if it had one (§2
    /// "`CacheExpression` helper"). Used by lowering passes that need to evaluate an expression
    /// exactly once before referencing its value more than once (e.g. matrix-cast lowering).
    pub fn cache_expression(&mut self, ctx: &mut TransformerContext, expr: Expression, name_hint: &str) -> Expression {
        let location = expr.location.clone();
        let ty = expr.cached_type.clone().unwrap_or(Type::NoType);
        let id = self.declare_variable(ctx, name_hint, ty.clone(), Some(expr), location.clone());
        Expression::with_type(location, ExpressionKind::VariableValue(id), ty)
    }
}

/// A single transformation pass over a module (§4.D).
///
/// Default hook implementations return `VisitChildren`, i.e. a pass that overrides nothing is
/// the identity transform. `visit_*_enter`/`visit_*_leave` bracket scope-affecting constructs
/// (function bodies, blocks, loop bodies, `Scoped`) the way the original's `PushScope`/
/// `PopScope` do; passes that track per-scope state override these instead of every node kind.
#[allow(unused_variables)]
pub trait Transformer {
    fn visit_expression(&mut self, ctx: &mut TransformerContext, state: &mut TransformerState, expr: &Expression) -> NzslResult<VisitAction<Expression>> {
        Ok(VisitAction::VisitChildren)
    }

    fn visit_statement(&mut self, ctx: &mut TransformerContext, state: &mut TransformerState, stmt: &Statement) -> NzslResult<VisitAction<Statement>> {
        Ok(VisitAction::VisitChildren)
    }

    /// Called when entering a new lexical scope (function body, block, loop body, `Scoped`).
    fn enter_scope(&mut self, ctx: &mut TransformerContext) {
        ctx.push_scope();
    }

    /// Called when leaving a lexical scope entered via `enter_scope`.
    fn leave_scope(&mut self, ctx: &mut TransformerContext) {
        ctx.pop_scope();
    }

    /// Runs this pass over `module`'s entire tree.
    fn transform(&mut self, ctx: &mut TransformerContext, module: &mut Module) -> NzslResult<()> {
        let mut state = TransformerState::default();
        visit_statement_boxed(self, ctx, &mut state, &mut module.root)?;
        Ok(())
    }
}

fn dispatch_expression<T: Transformer + ?Sized>(
    transformer: &mut T,
    ctx: &mut TransformerContext,
    state: &mut TransformerState,
    expr: &mut Expression,
) -> NzslResult<()> {
    match transformer.visit_expression(ctx, state, expr)? {
        VisitAction::DontVisitChildren => Ok(()),
        VisitAction::Replace(replacement) => {
            *expr = *replacement;
            Ok(())
        }
        VisitAction::VisitChildren => visit_expression_children(transformer, ctx, state, expr),
    }
}

/// Visits every child expression of `expr` in operand order (lhs before rhs, parameters in
/// index order), matching the ordering guarantee of §5.
fn visit_expression_children<T: Transformer + ?Sized>(
    transformer: &mut T,
    ctx: &mut TransformerContext,
    state: &mut TransformerState,
    expr: &mut Expression,
) -> NzslResult<()> {
    match &mut expr.kind {
        ExpressionKind::AccessField { expr, .. } => dispatch_expression(transformer, ctx, state, expr)?,
        ExpressionKind::AccessIdentifier { expr, .. } => dispatch_expression(transformer, ctx, state, expr)?,
        ExpressionKind::AccessIndex { expr, indices } => {
            dispatch_expression(transformer, ctx, state, expr)?;
            for index in indices {
                dispatch_expression(transformer, ctx, state, index)?;
            }
        }
        ExpressionKind::Assign { lhs, rhs, .. } | ExpressionKind::Binary { lhs, rhs, .. } => {
            dispatch_expression(transformer, ctx, state, lhs)?;
            dispatch_expression(transformer, ctx, state, rhs)?;
        }
        ExpressionKind::CallFunction { target, params } => {
            dispatch_expression(transformer, ctx, state, target)?;
            for param in params {
                dispatch_expression(transformer, ctx, state, param)?;
            }
        }
        ExpressionKind::CallMethod { object, params, .. } => {
            dispatch_expression(transformer, ctx, state, object)?;
            for param in params {
                dispatch_expression(transformer, ctx, state, param)?;
            }
        }
        ExpressionKind::Cast { exprs, .. } => {
            for e in exprs {
                dispatch_expression(transformer, ctx, state, e)?;
            }
        }
        ExpressionKind::Conditional { condition, true_path, false_path } => {
            dispatch_expression(transformer, ctx, state, condition)?;
            dispatch_expression(transformer, ctx, state, true_path)?;
            dispatch_expression(transformer, ctx, state, false_path)?;
        }
        ExpressionKind::Intrinsic { params, .. } => {
            for param in params {
                dispatch_expression(transformer, ctx, state, param)?;
            }
        }
        ExpressionKind::Swizzle { expr, .. } => dispatch_expression(transformer, ctx, state, expr)?,
        ExpressionKind::Unary { expr, .. } => dispatch_expression(transformer, ctx, state, expr)?,
        ExpressionKind::AliasValue(_)
        | ExpressionKind::Constant(_)
        | ExpressionKind::ConstantArrayValue(_)
        | ExpressionKind::ConstantValue(_)
        | ExpressionKind::Function(_)
        | ExpressionKind::Identifier(_)
        | ExpressionKind::IntrinsicFunction(_)
        | ExpressionKind::Module(_)
        | ExpressionKind::NamedExternalBlock(_)
        | ExpressionKind::StructType(_)
        | ExpressionKind::TypeConstant(_)
        | ExpressionKind::VariableValue(_) => {}
    }
    Ok(())
}

fn visit_statement_boxed<T: Transformer + ?Sized>(
    transformer: &mut T,
    ctx: &mut TransformerContext,
    state: &mut TransformerState,
    stmt: &mut Statement,
) -> NzslResult<()> {
    match transformer.visit_statement(ctx, state, stmt)? {
        VisitAction::DontVisitChildren => Ok(()),
        VisitAction::Replace(replacement) => {
            *stmt = *replacement;
            Ok(())
        }
        VisitAction::VisitChildren => visit_statement_children(transformer, ctx, state, stmt),
    }
}

fn visit_statement_children<T: Transformer + ?Sized>(
    transformer: &mut T,
    ctx: &mut TransformerContext,
    state: &mut TransformerState,
    stmt: &mut Statement,
) -> NzslResult<()> {
    match &mut stmt.kind {
        StatementKind::Multi(statements) => visit_statement_list(transformer, ctx, state, statements)?,
        StatementKind::Branch { arms, else_statement, .. } => {
            for BranchArm { condition, body } in arms {
                dispatch_expression(transformer, ctx, state, condition)?;
                visit_scoped_body(transformer, ctx, state, body)?;
            }
            if let Some(else_stmt) = else_statement {
                visit_scoped_body(transformer, ctx, state, else_stmt)?;
            }
        }
        StatementKind::Conditional { condition, statement } => {
            dispatch_expression(transformer, ctx, state, condition)?;
            visit_scoped_body(transformer, ctx, state, statement)?;
        }
        StatementKind::DeclareAlias { target, .. } => dispatch_expression(transformer, ctx, state, target)?,
        StatementKind::DeclareConst { value, .. } => dispatch_expression(transformer, ctx, state, value)?,
        StatementKind::DeclareExternal { .. } => {}
        StatementKind::DeclareFunction { body, .. } => visit_scoped_body(transformer, ctx, state, body)?,
        StatementKind::DeclareOption { default_value: Some(value), .. } => dispatch_expression(transformer, ctx, state, value)?,
        StatementKind::DeclareOption { default_value: None, .. } => {}
        StatementKind::DeclareStruct { .. } => {}
        StatementKind::DeclareVariable { initial_value: Some(value), .. } => dispatch_expression(transformer, ctx, state, value)?,
        StatementKind::DeclareVariable { initial_value: None, .. } => {}
        StatementKind::Expression(expr) => dispatch_expression(transformer, ctx, state, expr)?,
        StatementKind::For { from, to, step, body, .. } => {
            dispatch_expression(transformer, ctx, state, from)?;
            dispatch_expression(transformer, ctx, state, to)?;
            if let Some(step) = step {
                dispatch_expression(transformer, ctx, state, step)?;
            }
            visit_scoped_body(transformer, ctx, state, body)?;
        }
        StatementKind::ForEach { container, body, .. } => {
            dispatch_expression(transformer, ctx, state, container)?;
            visit_scoped_body(transformer, ctx, state, body)?;
        }
        StatementKind::Return(Some(expr)) => dispatch_expression(transformer, ctx, state, expr)?,
        StatementKind::Return(None) => {}
        StatementKind::Scoped(inner) => visit_scoped_body(transformer, ctx, state, inner)?,
        StatementKind::While { condition, body, .. } => {
            dispatch_expression(transformer, ctx, state, condition)?;
            visit_scoped_body(transformer, ctx, state, body)?;
        }
        StatementKind::Import { .. }
        | StatementKind::Break
        | StatementKind::Continue
        | StatementKind::Discard
        | StatementKind::NoOp => {}
    }
    Ok(())
}

fn visit_scoped_body<T: Transformer + ?Sized>(
    transformer: &mut T,
    ctx: &mut TransformerContext,
    state: &mut TransformerState,
    body: &mut Statement,
) -> NzslResult<()> {
    transformer.enter_scope(ctx);
    let result = visit_statement_boxed(transformer, ctx, state, body);
    transformer.leave_scope(ctx);
    result
}

/// Visits a `Multi`'s statements in source order, draining `state`'s pending-prefix queue
/// before each one so splices land immediately in front of the statement that requested them.
fn visit_statement_list<T: Transformer + ?Sized>(
    transformer: &mut T,
    ctx: &mut TransformerContext,
    state: &mut TransformerState,
    statements: &mut Vec<Statement>,
) -> NzslResult<()> {
    let mut rebuilt = Vec::with_capacity(statements.len());
    for mut stmt in std::mem::take(statements) {
        visit_statement_boxed(transformer, ctx, state, &mut stmt)?;
        rebuilt.extend(state.drain_pending());
        rebuilt.push(stmt);
    }
    *statements = rebuilt;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::ContextOptions, location::SourceLocation, module::ModuleMetadata};

    struct BreakToNoOp;

    impl Transformer for BreakToNoOp {
        fn visit_statement(&mut self, _ctx: &mut TransformerContext, _state: &mut TransformerState, stmt: &Statement) -> NzslResult<VisitAction<Statement>> {
            if matches!(stmt.kind, StatementKind::Break) {
                Ok(VisitAction::Replace(Box::new(Statement::no_op())))
            } else {
                Ok(VisitAction::VisitChildren)
            }
        }
    }

    #[test]
    fn replace_rewrites_matching_nodes() {
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Break)];
        let mut ctx = TransformerContext::new(ContextOptions::default());
        BreakToNoOp.transform(&mut ctx, &mut module).unwrap();
        assert!(matches!(module.top_level_statements()[0].kind, StatementKind::NoOp));
    }

    struct Hoister;

    impl Transformer for Hoister {
        fn visit_statement(&mut self, _ctx: &mut TransformerContext, state: &mut TransformerState, stmt: &Statement) -> NzslResult<VisitAction<Statement>> {
            if matches!(stmt.kind, StatementKind::Discard) {
                state.append_statement(Statement::no_op());
            }
            Ok(VisitAction::VisitChildren)
        }
    }

    #[test]
    fn append_statement_splices_in_front() {
        let mut module = Module::new(ModuleMetadata::default());
        *module.top_level_statements_mut() = vec![Statement::new(SourceLocation::synthetic(), StatementKind::Discard)];
        let mut ctx = TransformerContext::new(ContextOptions::default());
        Hoister.transform(&mut ctx, &mut module).unwrap();
        let statements = module.top_level_statements();
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0].kind, StatementKind::NoOp));
        assert!(matches!(statements[1].kind, StatementKind::Discard));
    }
}
