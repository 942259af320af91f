//! Branch splitting (§4.I): rewrites a multi-arm `if/elif/.../else` into a chain of nested
//! two-way `Branch` statements, one arm per level.
//!
//! A standalone recursive walker rather than a [`crate::Transformer`] pass: splitting the head
//! arm off builds a brand-new nested `Branch` statement that itself may still have more than one
//! arm (three `elif`s split down to one nested level at a time), and that nested statement needs
//! the same treatment recursively before it is attached. `Replace` alone cannot express this —
//! its payload is never revisited by the framework.

use nzsl_ast::{
    context::TransformerContext,
    errors::NzslResult,
    module::Module,
    statements::{Statement, StatementKind},
};

/// Flattens every multi-arm branch in `module` down to nested two-way branches.
pub fn split_branches(module: &mut Module, _ctx: &mut TransformerContext) -> NzslResult<()> {
    split_statement(&mut module.root)?;
    for imported in &mut module.imported_modules {
        split_statement(&mut imported.module.root)?;
    }
    Ok(())
}

fn split_statement(stmt: &mut Statement) -> NzslResult<()> {
    match &mut stmt.kind {
        StatementKind::Multi(statements) => {
            for s in statements {
                split_statement(s)?;
            }
        }
        StatementKind::Scoped(inner) => split_statement(inner)?,
        StatementKind::Conditional { statement, .. } => split_statement(statement)?,
        StatementKind::DeclareFunction { body, .. } => split_statement(body)?,
        StatementKind::For { body, .. } | StatementKind::ForEach { body, .. } | StatementKind::While { body, .. } => split_statement(body)?,
        StatementKind::Branch { arms, else_statement, is_const } => {
            for arm in arms.iter_mut() {
                split_statement(&mut arm.body)?;
            }
            if let Some(else_stmt) = else_statement {
                split_statement(else_stmt)?;
            }
            if arms.len() > 1 {
                let mut drained = std::mem::take(arms);
                let head = drained.remove(0);
                let mut nested = Statement::new(
                    stmt.location.clone(),
                    StatementKind::Branch { arms: drained, else_statement: else_statement.take(), is_const: *is_const },
                );
                split_statement(&mut nested)?;
                *arms = vec![head];
                *else_statement = Some(Box::new(nested));
            }
        }
        StatementKind::Break
        | StatementKind::Continue
        | StatementKind::DeclareAlias { .. }
        | StatementKind::DeclareConst { .. }
        | StatementKind::DeclareExternal { .. }
        | StatementKind::DeclareOption { .. }
        | StatementKind::DeclareStruct { .. }
        | StatementKind::DeclareVariable { .. }
        | StatementKind::Discard
        | StatementKind::Expression(_)
        | StatementKind::Import { .. }
        | StatementKind::NoOp
        | StatementKind::Return(_) => {}
    }
    Ok(())
}
