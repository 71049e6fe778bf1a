//! TACKY emission (`spec.md` §4.6): lowers the type-checked, loop-labeled
//! C-AST into the flat `tacky::IRProgram`, linearizing every short-circuit
//! operator, conditional, and loop into explicit jumps and labels.
//!
//! Every instruction-emitting helper takes `instrs: &mut Vec<IRInstruction>`
//! and appends to it in place — the one place in the pipeline that isn't
//! "return a new tree", because an instruction stream has no natural
//! recursive shape to rebuild functionally.

use crate::ast::*;
use crate::context::Context;
use crate::symbols::{IdentifierAttr, InitialValue, SymbolEntry};
use crate::tacky::{IRInstruction, IRProgram, IRTopLevel, IRVal};
use crate::types::{Const, StaticInit, Type};

pub fn emit_program(ctx: &mut Context, program: Program) -> IRProgram {
    let mut top_levels = Vec::new();
    for decl in program.declarations {
        if let Declaration::FunDecl(f) = decl {
            if f.body.is_some() {
                top_levels.push(emit_function(ctx, f));
            }
        }
    }

    let mut statics: Vec<(String, IRTopLevel)> = ctx
        .symbols
        .iter()
        .filter_map(|(name, entry)| match &entry.attrs {
            IdentifierAttr::Static { init: InitialValue::Initial(init), global } => {
                Some((name.clone(), IRTopLevel::StaticVariable { name: name.clone(), global: *global, var_type: entry.ty.clone(), init: *init }))
            }
            IdentifierAttr::Static { init: InitialValue::Tentative, global } => Some((
                name.clone(),
                IRTopLevel::StaticVariable {
                    name: name.clone(),
                    global: *global,
                    var_type: entry.ty.clone(),
                    init: StaticInit::zero_of(entry.ty.clone()),
                },
            )),
            _ => None,
        })
        .collect();
    statics.sort_by(|a, b| a.0.cmp(&b.0));
    top_levels.extend(statics.into_iter().map(|(_, t)| t));

    IRProgram { top_levels }
}

fn is_global(ctx: &Context, name: &str) -> bool {
    matches!(ctx.symbols.get(name).map(|e| &e.attrs), Some(IdentifierAttr::Fun { global: true, .. }))
}

fn emit_function(ctx: &mut Context, f: FunctionDeclaration) -> IRTopLevel {
    let global = is_global(ctx, &f.name);
    let mut instrs = Vec::new();
    if let Some(body) = f.body {
        emit_block(ctx, body, &mut instrs);
    }
    // Defensive fallthrough return: a well-typed program always returns
    // explicitly, but nothing upstream guarantees every path does, so every
    // function body is terminated with one regardless.
    instrs.push(IRInstruction::Return(IRVal::Constant(Const::Int(0))));
    IRTopLevel::Function { name: f.name, global, params: f.params, body: instrs }
}

fn make_temp(ctx: &mut Context, ty: Type) -> IRVal {
    let name = ctx.fresh("tmp");
    ctx.symbols.insert(name.clone(), SymbolEntry { ty, attrs: IdentifierAttr::Local });
    IRVal::Var(name)
}

fn emit_block(ctx: &mut Context, block: Block, instrs: &mut Vec<IRInstruction>) {
    for item in block.items {
        emit_block_item(ctx, item, instrs);
    }
}

fn emit_block_item(ctx: &mut Context, item: BlockItem, instrs: &mut Vec<IRInstruction>) {
    match item {
        BlockItem::D(Declaration::FunDecl(_)) => {
            // A nested prototype; nothing to lower (the resolver rejects
            // nested *definitions*, so it can never have a body here).
        }
        BlockItem::D(Declaration::VarDecl(decl)) => emit_local_declaration(ctx, decl, instrs),
        BlockItem::S(stmt) => emit_statement(ctx, stmt, instrs),
    }
}

fn emit_local_declaration(ctx: &mut Context, decl: VariableDeclaration, instrs: &mut Vec<IRInstruction>) {
    if decl.storage_class.is_some() {
        // `static`/`extern` locals are materialized from the symbol table
        // at the end of `emit_program`, not as in-line code.
        return;
    }
    if let Some(init) = decl.init {
        let val = emit_exp(ctx, init, instrs);
        instrs.push(IRInstruction::Copy { src: val, dst: IRVal::Var(decl.name) });
    }
}

fn emit_statement(ctx: &mut Context, stmt: Statement, instrs: &mut Vec<IRInstruction>) {
    match stmt {
        Statement::Return(e) => {
            let val = emit_exp(ctx, e, instrs);
            instrs.push(IRInstruction::Return(val));
        }
        Statement::Expression(e) => {
            emit_exp(ctx, e, instrs);
        }
        Statement::If { cond, then, otherwise: None } => {
            let end_label = ctx.fresh("if_end");
            let c = emit_exp(ctx, cond, instrs);
            instrs.push(IRInstruction::JumpIfZero { cond: c, target: end_label.clone() });
            emit_statement(ctx, *then, instrs);
            instrs.push(IRInstruction::Label(end_label));
        }
        Statement::If { cond, then, otherwise: Some(otherwise) } => {
            let else_label = ctx.fresh("if_else");
            let end_label = ctx.fresh("if_end");
            let c = emit_exp(ctx, cond, instrs);
            instrs.push(IRInstruction::JumpIfZero { cond: c, target: else_label.clone() });
            emit_statement(ctx, *then, instrs);
            instrs.push(IRInstruction::Jump(end_label.clone()));
            instrs.push(IRInstruction::Label(else_label));
            emit_statement(ctx, *otherwise, instrs);
            instrs.push(IRInstruction::Label(end_label));
        }
        Statement::Compound(block) => emit_block(ctx, block, instrs),
        Statement::Break(label) => instrs.push(IRInstruction::Jump(break_label(&label))),
        Statement::Continue(label) => instrs.push(IRInstruction::Jump(continue_label(&label))),
        Statement::While { cond, body, label } => {
            let label = label.expect("while statement missing its loop label");
            let continue_label = continue_label(&Some(label.clone()));
            let break_label = break_label(&Some(label));
            instrs.push(IRInstruction::Label(continue_label.clone()));
            let c = emit_exp(ctx, cond, instrs);
            instrs.push(IRInstruction::JumpIfZero { cond: c, target: break_label.clone() });
            emit_statement(ctx, *body, instrs);
            instrs.push(IRInstruction::Jump(continue_label));
            instrs.push(IRInstruction::Label(break_label));
        }
        Statement::DoWhile { body, cond, label } => {
            let label = label.expect("do-while statement missing its loop label");
            let start_label = ctx.fresh("do_start");
            let continue_label = continue_label(&Some(label.clone()));
            let break_label = break_label(&Some(label));
            instrs.push(IRInstruction::Label(start_label.clone()));
            emit_statement(ctx, *body, instrs);
            instrs.push(IRInstruction::Label(continue_label));
            let c = emit_exp(ctx, cond, instrs);
            instrs.push(IRInstruction::JumpIfNotZero { cond: c, target: start_label });
            instrs.push(IRInstruction::Label(break_label));
        }
        Statement::For { init, cond, post, body, label } => {
            let label = label.expect("for statement missing its loop label");
            emit_for_init(ctx, init, instrs);
            let start_label = ctx.fresh("for_start");
            let continue_label = continue_label(&Some(label.clone()));
            let break_label = break_label(&Some(label));
            instrs.push(IRInstruction::Label(start_label.clone()));
            if let Some(cond) = cond {
                let c = emit_exp(ctx, cond, instrs);
                instrs.push(IRInstruction::JumpIfZero { cond: c, target: break_label.clone() });
            }
            emit_statement(ctx, *body, instrs);
            instrs.push(IRInstruction::Label(continue_label));
            if let Some(post) = post {
                emit_exp(ctx, post, instrs);
            }
            instrs.push(IRInstruction::Jump(start_label));
            instrs.push(IRInstruction::Label(break_label));
        }
        Statement::Null => {}
    }
}

fn break_label(label: &Option<String>) -> String {
    format!("break.{}", label.as_ref().expect("break outside a loop survived loop labeling"))
}

fn continue_label(label: &Option<String>) -> String {
    format!("continue.{}", label.as_ref().expect("continue outside a loop survived loop labeling"))
}

fn emit_for_init(ctx: &mut Context, init: ForInit, instrs: &mut Vec<IRInstruction>) {
    match init {
        ForInit::InitDecl(decl) => emit_local_declaration(ctx, decl, instrs),
        ForInit::InitExp(Some(e)) => {
            emit_exp(ctx, e, instrs);
        }
        ForInit::InitExp(None) => {}
    }
}

fn emit_exp(ctx: &mut Context, exp: Exp, instrs: &mut Vec<IRInstruction>) -> IRVal {
    let ty = exp.ty();
    match exp.kind {
        ExpKind::Constant(c) => IRVal::Constant(c),
        ExpKind::Var(name) => IRVal::Var(name),
        ExpKind::Cast(target, inner) => {
            let inner_ty = inner.ty();
            let src = emit_exp(ctx, *inner, instrs);
            if target == inner_ty {
                return src;
            }
            let target_size = target.size();
            let dst = make_temp(ctx, target);
            let instr = if target_size == inner_ty.size() {
                IRInstruction::Copy { src, dst: dst.clone() }
            } else if target_size < inner_ty.size() {
                IRInstruction::Truncate { src, dst: dst.clone() }
            } else if inner_ty.is_signed() {
                IRInstruction::SignExtend { src, dst: dst.clone() }
            } else {
                IRInstruction::ZeroExtend { src, dst: dst.clone() }
            };
            instrs.push(instr);
            dst
        }
        ExpKind::Unary(op, inner) => {
            let src = emit_exp(ctx, *inner, instrs);
            let dst = make_temp(ctx, ty);
            instrs.push(IRInstruction::Unary { op, src, dst: dst.clone() });
            dst
        }
        ExpKind::Binary(BinaryOperator::And, l, r) => {
            let false_label = ctx.fresh("and_false");
            let end_label = ctx.fresh("and_end");
            let l_val = emit_exp(ctx, *l, instrs);
            instrs.push(IRInstruction::JumpIfZero { cond: l_val, target: false_label.clone() });
            let r_val = emit_exp(ctx, *r, instrs);
            instrs.push(IRInstruction::JumpIfZero { cond: r_val, target: false_label.clone() });
            let dst = make_temp(ctx, Type::Int);
            instrs.push(IRInstruction::Copy { src: IRVal::Constant(Const::Int(1)), dst: dst.clone() });
            instrs.push(IRInstruction::Jump(end_label.clone()));
            instrs.push(IRInstruction::Label(false_label));
            instrs.push(IRInstruction::Copy { src: IRVal::Constant(Const::Int(0)), dst: dst.clone() });
            instrs.push(IRInstruction::Label(end_label));
            dst
        }
        ExpKind::Binary(BinaryOperator::Or, l, r) => {
            let true_label = ctx.fresh("or_true");
            let end_label = ctx.fresh("or_end");
            let l_val = emit_exp(ctx, *l, instrs);
            instrs.push(IRInstruction::JumpIfNotZero { cond: l_val, target: true_label.clone() });
            let r_val = emit_exp(ctx, *r, instrs);
            instrs.push(IRInstruction::JumpIfNotZero { cond: r_val, target: true_label.clone() });
            let dst = make_temp(ctx, Type::Int);
            instrs.push(IRInstruction::Copy { src: IRVal::Constant(Const::Int(0)), dst: dst.clone() });
            instrs.push(IRInstruction::Jump(end_label.clone()));
            instrs.push(IRInstruction::Label(true_label));
            instrs.push(IRInstruction::Copy { src: IRVal::Constant(Const::Int(1)), dst: dst.clone() });
            instrs.push(IRInstruction::Label(end_label));
            dst
        }
        ExpKind::Binary(op, l, r) => {
            let src1 = emit_exp(ctx, *l, instrs);
            let src2 = emit_exp(ctx, *r, instrs);
            let dst = make_temp(ctx, ty);
            instrs.push(IRInstruction::Binary { op, src1, src2, dst: dst.clone() });
            dst
        }
        ExpKind::Assignment(lhs, rhs) => {
            let name = match lhs.kind {
                ExpKind::Var(name) => name,
                _ => unreachable!("the resolver only accepts a bare variable as an assignment target"),
            };
            let val = emit_exp(ctx, *rhs, instrs);
            instrs.push(IRInstruction::Copy { src: val, dst: IRVal::Var(name.clone()) });
            IRVal::Var(name)
        }
        ExpKind::Conditional { cond, then, otherwise } => {
            let else_label = ctx.fresh("cond_else");
            let end_label = ctx.fresh("cond_end");
            let c = emit_exp(ctx, *cond, instrs);
            instrs.push(IRInstruction::JumpIfZero { cond: c, target: else_label.clone() });
            let dst = make_temp(ctx, ty);
            let then_val = emit_exp(ctx, *then, instrs);
            instrs.push(IRInstruction::Copy { src: then_val, dst: dst.clone() });
            instrs.push(IRInstruction::Jump(end_label.clone()));
            instrs.push(IRInstruction::Label(else_label));
            let else_val = emit_exp(ctx, *otherwise, instrs);
            instrs.push(IRInstruction::Copy { src: else_val, dst: dst.clone() });
            instrs.push(IRInstruction::Label(end_label));
            dst
        }
        ExpKind::FunctionCall(name, args) => {
            let arg_vals = args.into_iter().map(|a| emit_exp(ctx, a, instrs)).collect();
            let dst = make_temp(ctx, ty);
            instrs.push(IRInstruction::FunCall { name, args: arg_vals, dst: dst.clone() });
            dst
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loop_labeler::label_program;
    use crate::parser::Parser;
    use crate::resolver::resolve_program;
    use crate::typechecker::TypeChecker;

    fn lower(src: &str) -> IRProgram {
        let program = Parser::new(src).unwrap().parse_program().unwrap();
        let mut ctx = Context::new();
        let program = resolve_program(&mut ctx, program).unwrap();
        let program = TypeChecker::new(&mut ctx).check_program(program).unwrap();
        let program = label_program(&mut ctx, program).unwrap();
        emit_program(&mut ctx, program)
    }

    #[test]
    fn simple_return_lowers_to_one_instruction_plus_fallthrough() {
        let ir = lower("int main(void) { return 2; }");
        let IRTopLevel::Function { body, .. } = &ir.top_levels[0] else { panic!() };
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], IRInstruction::Return(IRVal::Constant(Const::Int(2)))));
    }

    #[test]
    fn short_circuit_and_emits_conditional_jumps() {
        let ir = lower("int main(void) { return 1 && 0; }");
        let IRTopLevel::Function { body, .. } = &ir.top_levels[0] else { panic!() };
        assert!(body.iter().any(|i| matches!(i, IRInstruction::JumpIfZero { .. })));
    }

    #[test]
    fn while_loop_uses_break_and_continue_labels() {
        let ir = lower("int main(void) { while (1) { break; } return 0; }");
        let IRTopLevel::Function { body, .. } = &ir.top_levels[0] else { panic!() };
        let has_break_label = body.iter().any(|i| matches!(i, IRInstruction::Label(l) if l.starts_with("break.")));
        assert!(has_break_label);
    }

    #[test]
    fn static_variable_is_materialized_once() {
        let ir = lower("int x = 5; int main(void) { return x; }");
        let statics: Vec<_> =
            ir.top_levels.iter().filter(|t| matches!(t, IRTopLevel::StaticVariable { .. })).collect();
        assert_eq!(statics.len(), 1);
    }

    #[test]
    fn tentative_definition_materializes_as_zero() {
        let ir = lower("int x; int main(void) { return x; }");
        let IRTopLevel::StaticVariable { init, .. } =
            ir.top_levels.iter().find(|t| matches!(t, IRTopLevel::StaticVariable { .. })).unwrap()
        else {
            panic!()
        };
        assert!(init.is_zero());
    }
}
