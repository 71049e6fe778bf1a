//! TACKY to abstract assembly (`spec.md` §4.7): instruction selection and
//! the System V calling convention. Every `tacky::IRVal::Var` becomes an
//! `Operand::Pseudo`, left for `allocate` to resolve into a stack slot or a
//! static `Data` reference.

use crate::asm::backend_symbols::BackendSymbolTable;
use crate::asm::{self, AssemblyType, BinaryOp, CondCode, Instruction, Operand, Reg, TopLevel, ARG_REGS};
use crate::ast::{BinaryOperator, UnaryOperator};
use crate::context::Context;
use crate::tacky::{IRInstruction, IRProgram, IRTopLevel, IRVal};
use crate::types::Type;

pub fn lower_program(ctx: &Context, ir: IRProgram) -> (asm::Program, BackendSymbolTable) {
    let backend = BackendSymbolTable::from_frontend(&ctx.symbols);
    let top_levels = ir.top_levels.into_iter().map(|t| lower_top_level(ctx, t)).collect();
    (asm::Program { top_levels }, backend)
}

fn lower_top_level(ctx: &Context, top: IRTopLevel) -> TopLevel {
    match top {
        IRTopLevel::Function { name, global, params, body } => lower_function(ctx, name, global, params, body),
        IRTopLevel::StaticVariable { name, global, var_type, init } => {
            TopLevel::StaticVariable { name, global, alignment: var_type.alignment(), init }
        }
    }
}

fn val_type(ctx: &Context, val: &IRVal) -> Type {
    match val {
        IRVal::Constant(c) => c.ty(),
        IRVal::Var(name) => {
            ctx.symbols.get(name).unwrap_or_else(|| panic!("internal error: '{name}' has no recorded type")).ty.clone()
        }
    }
}

fn asm_type_of(ctx: &Context, val: &IRVal) -> AssemblyType {
    val_type(ctx, val).into()
}

fn lower_val(val: &IRVal) -> Operand {
    match val {
        IRVal::Constant(c) => Operand::Imm(c.as_u64()),
        IRVal::Var(name) => Operand::Pseudo(name.clone()),
    }
}

fn lower_function(ctx: &Context, name: String, global: bool, params: Vec<String>, body: Vec<IRInstruction>) -> TopLevel {
    let mut instructions = Vec::new();
    for (i, param) in params.iter().enumerate() {
        let ty: AssemblyType = ctx.symbols.get(param).expect("parameter missing from symbol table").ty.clone().into();
        let src = if i < 6 {
            Operand::Reg(ARG_REGS[i])
        } else {
            Operand::Stack(16 + 8 * (i as i64 - 6))
        };
        instructions.push(Instruction::Mov { ty, src, dst: Operand::Pseudo(param.clone()) });
    }
    for instr in body {
        lower_instruction(ctx, instr, &mut instructions);
    }
    TopLevel::Function { name, global, instructions }
}

fn cond_code(op: BinaryOperator, signed: bool) -> CondCode {
    match op {
        BinaryOperator::Equal => CondCode::E,
        BinaryOperator::NotEqual => CondCode::NE,
        BinaryOperator::LessThan => if signed { CondCode::L } else { CondCode::B },
        BinaryOperator::LessOrEqual => if signed { CondCode::LE } else { CondCode::BE },
        BinaryOperator::GreaterThan => if signed { CondCode::G } else { CondCode::A },
        BinaryOperator::GreaterOrEqual => if signed { CondCode::GE } else { CondCode::AE },
        _ => unreachable!("{op:?} is not a relational operator"),
    }
}

fn asm_unary_op(op: UnaryOperator) -> asm::UnaryOp {
    match op {
        UnaryOperator::Complement => asm::UnaryOp::Not,
        UnaryOperator::Negate => asm::UnaryOp::Neg,
        UnaryOperator::Not => unreachable!("logical not is lowered separately, via compare-to-zero"),
    }
}

fn asm_binary_op(op: BinaryOperator) -> BinaryOp {
    match op {
        BinaryOperator::Add => BinaryOp::Add,
        BinaryOperator::Subtract => BinaryOp::Sub,
        BinaryOperator::Multiply => BinaryOp::Mult,
        _ => unreachable!("{op:?} has no direct assembly binary opcode"),
    }
}

fn lower_instruction(ctx: &Context, instr: IRInstruction, out: &mut Vec<Instruction>) {
    match instr {
        IRInstruction::Return(val) => {
            let ty = asm_type_of(ctx, &val);
            out.push(Instruction::Mov { ty, src: lower_val(&val), dst: Operand::Reg(Reg::Ax) });
            out.push(Instruction::Ret);
        }
        IRInstruction::SignExtend { src, dst } => {
            out.push(Instruction::Movsx { src: lower_val(&src), dst: lower_val(&dst) });
        }
        IRInstruction::ZeroExtend { src, dst } => {
            out.push(Instruction::MovZeroExtend { src: lower_val(&src), dst: lower_val(&dst) });
        }
        IRInstruction::Truncate { src, dst } => {
            out.push(Instruction::Mov { ty: AssemblyType::Longword, src: lower_val(&src), dst: lower_val(&dst) });
        }
        IRInstruction::Unary { op: UnaryOperator::Not, src, dst } => {
            let src_ty = asm_type_of(ctx, &src);
            let dst_ty = asm_type_of(ctx, &dst);
            out.push(Instruction::Cmp { ty: src_ty, src: Operand::Imm(0), dst: lower_val(&src) });
            out.push(Instruction::Mov { ty: dst_ty, src: Operand::Imm(0), dst: lower_val(&dst) });
            out.push(Instruction::SetCC { cond: CondCode::E, operand: lower_val(&dst) });
        }
        IRInstruction::Unary { op, src, dst } => {
            let ty = asm_type_of(ctx, &dst);
            out.push(Instruction::Mov { ty, src: lower_val(&src), dst: lower_val(&dst) });
            out.push(Instruction::Unary { op: asm_unary_op(op), ty, operand: lower_val(&dst) });
        }
        IRInstruction::Binary { op: op @ (BinaryOperator::Divide | BinaryOperator::Remainder), src1, src2, dst } => {
            let ty = asm_type_of(ctx, &src1);
            let signed = val_type(ctx, &src1).is_signed();
            out.push(Instruction::Mov { ty, src: lower_val(&src1), dst: Operand::Reg(Reg::Ax) });
            if signed {
                out.push(Instruction::Cdq { ty });
                out.push(Instruction::Idiv { ty, operand: lower_val(&src2) });
            } else {
                out.push(Instruction::Mov { ty, src: Operand::Imm(0), dst: Operand::Reg(Reg::Dx) });
                out.push(Instruction::Div { ty, operand: lower_val(&src2) });
            }
            let result_reg = if op == BinaryOperator::Divide { Reg::Ax } else { Reg::Dx };
            out.push(Instruction::Mov { ty, src: Operand::Reg(result_reg), dst: lower_val(&dst) });
        }
        IRInstruction::Binary { op, src1, src2, dst } if op.is_relational() => {
            let ty = asm_type_of(ctx, &src1);
            let signed = val_type(ctx, &src1).is_signed();
            out.push(Instruction::Cmp { ty, src: lower_val(&src2), dst: lower_val(&src1) });
            out.push(Instruction::Mov { ty: AssemblyType::Longword, src: Operand::Imm(0), dst: lower_val(&dst) });
            out.push(Instruction::SetCC { cond: cond_code(op, signed), operand: lower_val(&dst) });
        }
        IRInstruction::Binary { op, src1, src2, dst } => {
            let ty = asm_type_of(ctx, &dst);
            out.push(Instruction::Mov { ty, src: lower_val(&src1), dst: lower_val(&dst) });
            out.push(Instruction::Binary { op: asm_binary_op(op), ty, src: lower_val(&src2), dst: lower_val(&dst) });
        }
        IRInstruction::Copy { src, dst } => {
            let ty = asm_type_of(ctx, &dst);
            out.push(Instruction::Mov { ty, src: lower_val(&src), dst: lower_val(&dst) });
        }
        IRInstruction::Jump(label) => out.push(Instruction::Jmp(label)),
        IRInstruction::JumpIfZero { cond, target } => {
            let ty = asm_type_of(ctx, &cond);
            out.push(Instruction::Cmp { ty, src: Operand::Imm(0), dst: lower_val(&cond) });
            out.push(Instruction::JmpCC { cond: CondCode::E, target });
        }
        IRInstruction::JumpIfNotZero { cond, target } => {
            let ty = asm_type_of(ctx, &cond);
            out.push(Instruction::Cmp { ty, src: Operand::Imm(0), dst: lower_val(&cond) });
            out.push(Instruction::JmpCC { cond: CondCode::NE, target });
        }
        IRInstruction::Label(label) => out.push(Instruction::Label(label)),
        IRInstruction::FunCall { name, args, dst } => lower_call(ctx, name, args, dst, out),
    }
}

fn lower_call(ctx: &Context, name: String, args: Vec<IRVal>, dst: IRVal, out: &mut Vec<Instruction>) {
    let (reg_args, stack_args) = if args.len() > 6 { args.split_at(6) } else { (&args[..], &[][..]) };

    let padding = if stack_args.len() % 2 != 0 { 8 } else { 0 };
    if padding > 0 {
        out.push(Instruction::AllocateStack(padding));
    }

    for (reg, arg) in ARG_REGS.iter().zip(reg_args.iter()) {
        let ty = asm_type_of(ctx, arg);
        out.push(Instruction::Mov { ty, src: lower_val(arg), dst: Operand::Reg(*reg) });
    }

    for arg in stack_args.iter().rev() {
        let operand = lower_val(arg);
        let ty = asm_type_of(ctx, arg);
        match (&operand, ty) {
            (Operand::Imm(_) | Operand::Reg(_), _) | (_, AssemblyType::Quadword) => {
                out.push(Instruction::Push(operand));
            }
            _ => {
                out.push(Instruction::Mov { ty, src: operand, dst: Operand::Reg(Reg::Ax) });
                out.push(Instruction::Push(Operand::Reg(Reg::Ax)));
            }
        }
    }

    out.push(Instruction::Call(name));

    let to_remove = 8 * stack_args.len() as i64 + padding;
    if to_remove > 0 {
        out.push(Instruction::DeallocateStack(to_remove));
    }

    let dst_ty = asm_type_of(ctx, &dst);
    out.push(Instruction::Mov { ty: dst_ty, src: Operand::Reg(Reg::Ax), dst: lower_val(&dst) });
}
