//! Loop labeling (`spec.md` §4.5): attaches a unique label to every loop
//! statement and propagates it down to the `break`/`continue` statements
//! that target it, rejecting either when it appears outside any loop.

use crate::ast::*;
use crate::context::Context;
use crate::error::{CResult, CompileError};

pub fn label_program(ctx: &mut Context, program: Program) -> CResult<Program> {
    let mut declarations = Vec::with_capacity(program.declarations.len());
    for decl in program.declarations {
        declarations.push(label_declaration(ctx, decl)?);
    }
    Ok(Program { declarations })
}

fn label_declaration(ctx: &mut Context, decl: Declaration) -> CResult<Declaration> {
    match decl {
        Declaration::FunDecl(f) => {
            let body = f.body.map(|b| label_block(ctx, b, None)).transpose()?;
            Ok(Declaration::FunDecl(FunctionDeclaration { body, ..f }))
        }
        other @ Declaration::VarDecl(_) => Ok(other),
    }
}

fn label_block(ctx: &mut Context, block: Block, current_loop: Option<&str>) -> CResult<Block> {
    let mut items = Vec::with_capacity(block.items.len());
    for item in block.items {
        items.push(label_block_item(ctx, item, current_loop)?);
    }
    Ok(Block { items })
}

fn label_block_item(ctx: &mut Context, item: BlockItem, current_loop: Option<&str>) -> CResult<BlockItem> {
    Ok(match item {
        BlockItem::D(Declaration::FunDecl(f)) => {
            // A nested declaration without a body (the resolver already
            // rejects nested definitions); still needs its own, unrelated
            // loop context since it can't see an enclosing loop.
            let body = f.body.map(|b| label_block(ctx, b, None)).transpose()?;
            BlockItem::D(Declaration::FunDecl(FunctionDeclaration { body, ..f }))
        }
        BlockItem::D(decl) => BlockItem::D(decl),
        BlockItem::S(stmt) => BlockItem::S(label_statement(ctx, stmt, current_loop)?),
    })
}

fn label_statement(ctx: &mut Context, stmt: Statement, current_loop: Option<&str>) -> CResult<Statement> {
    Ok(match stmt {
        Statement::Break(_) => {
            let label = current_loop
                .ok_or_else(|| CompileError::Loop("'break' statement not within a loop".to_string()))?
                .to_string();
            Statement::Break(Some(label))
        }
        Statement::Continue(_) => {
            let label = current_loop
                .ok_or_else(|| CompileError::Loop("'continue' statement not within a loop".to_string()))?
                .to_string();
            Statement::Continue(Some(label))
        }
        Statement::While { cond, body, .. } => {
            let label = ctx.fresh("loop");
            let body = Box::new(label_statement(ctx, *body, Some(&label))?);
            Statement::While { cond, body, label: Some(label) }
        }
        Statement::DoWhile { body, cond, .. } => {
            let label = ctx.fresh("loop");
            let body = Box::new(label_statement(ctx, *body, Some(&label))?);
            Statement::DoWhile { body, cond, label: Some(label) }
        }
        Statement::For { init, cond, post, body, .. } => {
            let label = ctx.fresh("loop");
            let body = Box::new(label_statement(ctx, *body, Some(&label))?);
            Statement::For { init, cond, post, body, label: Some(label) }
        }
        Statement::If { cond, then, otherwise } => Statement::If {
            cond,
            then: Box::new(label_statement(ctx, *then, current_loop)?),
            otherwise: otherwise.map(|s| label_statement(ctx, *s, current_loop)).transpose()?.map(Box::new),
        },
        Statement::Compound(block) => Statement::Compound(label_block(ctx, block, current_loop)?),
        other @ (Statement::Return(_) | Statement::Expression(_) | Statement::Null) => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::resolve_program;
    use crate::typechecker::TypeChecker;

    fn label(src: &str) -> CResult<Program> {
        let program = Parser::new(src).unwrap().parse_program().unwrap();
        let mut ctx = Context::new();
        let program = resolve_program(&mut ctx, program).unwrap();
        let program = TypeChecker::new(&mut ctx).check_program(program).unwrap();
        label_program(&mut ctx, program)
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert!(label("int main(void) { break; }").is_err());
    }

    #[test]
    fn continue_outside_loop_is_rejected() {
        assert!(label("int main(void) { continue; }").is_err());
    }

    #[test]
    fn nested_loops_get_distinct_labels() {
        let program =
            label("int main(void) { while (1) { while (1) { break; } break; } return 0; }").unwrap();
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let BlockItem::S(Statement::While { body: outer_body, label: outer_label, .. }) =
            &f.body.as_ref().unwrap().items[0]
        else {
            panic!()
        };
        let Statement::Compound(inner_block) = outer_body.as_ref() else { panic!() };
        let BlockItem::S(Statement::While { label: inner_label, .. }) = &inner_block.items[0] else { panic!() };
        assert_ne!(outer_label, inner_label);
    }

    #[test]
    fn break_binds_to_nearest_enclosing_loop() {
        let program =
            label("int main(void) { while (1) { while (1) { break; } break; } return 0; }").unwrap();
        let Declaration::FunDecl(f) = &program.declarations[0] else { panic!() };
        let BlockItem::S(Statement::While { body: outer_body, label: outer_label, .. }) =
            &f.body.as_ref().unwrap().items[0]
        else {
            panic!()
        };
        let Statement::Compound(inner_block) = outer_body.as_ref() else { panic!() };
        let BlockItem::S(Statement::While { body: inner_body, label: inner_label, .. }) = &inner_block.items[0]
        else {
            panic!()
        };
        let Statement::Break(inner_break_label) = inner_body.as_ref() else { panic!() };
        assert_eq!(inner_break_label, inner_label);
        let BlockItem::S(Statement::Break(outer_break_label)) = &inner_block.items[1] else { panic!() };
        assert_eq!(outer_break_label, outer_label);
    }
}
