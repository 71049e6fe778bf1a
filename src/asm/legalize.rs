//! Operand legalization (`spec.md` §4.8, second half): x86-64 forbids most
//! two-memory-operand forms and a handful of other combinations the
//! earlier passes don't bother avoiding; this pass rewrites each offending
//! instruction into an equivalent sequence that stages through a scratch
//! register (`%r10`/`%r11`), which is otherwise unused by the calling
//! convention this compiler generates.

use crate::asm::{AssemblyType, BinaryOp, Instruction, Operand, Program, Reg, TopLevel};

fn is_memory(op: &Operand) -> bool {
    matches!(op, Operand::Stack(_) | Operand::Data(_))
}

fn fits_i32(value: u64) -> bool {
    i32::try_from(value as i64).is_ok()
}

pub fn legalize_program(program: Program) -> Program {
    let top_levels = program
        .top_levels
        .into_iter()
        .map(|t| match t {
            TopLevel::Function { name, global, instructions } => {
                let mut out = Vec::with_capacity(instructions.len());
                for instr in instructions {
                    legalize_instruction(instr, &mut out);
                }
                TopLevel::Function { name, global, instructions: out }
            }
            other => other,
        })
        .collect();
    Program { top_levels }
}

fn legalize_instruction(instr: Instruction, out: &mut Vec<Instruction>) {
    match instr {
        Instruction::Mov { ty, src, dst } => legalize_mov(ty, src, dst, out),
        Instruction::Movsx { src, dst } => legalize_movsx(src, dst, out),
        Instruction::MovZeroExtend { src, dst } => legalize_zero_extend(src, dst, out),
        Instruction::Cmp { ty, src, dst } => legalize_cmp(ty, src, dst, out),
        Instruction::Binary { op: op @ (BinaryOp::Add | BinaryOp::Sub), ty, src, dst } => {
            legalize_add_sub(op, ty, src, dst, out)
        }
        Instruction::Binary { op: BinaryOp::Mult, ty, src, dst } => legalize_mult(ty, src, dst, out),
        Instruction::Idiv { ty, operand } => legalize_div_operand(Instruction::Idiv { ty, operand: Operand::Reg(Reg::R10) }, ty, operand, out),
        Instruction::Div { ty, operand } => legalize_div_operand(Instruction::Div { ty, operand: Operand::Reg(Reg::R10) }, ty, operand, out),
        other => out.push(other),
    }
}

fn legalize_mov(ty: AssemblyType, src: Operand, dst: Operand, out: &mut Vec<Instruction>) {
    if ty == AssemblyType::Quadword {
        if let Operand::Imm(v) = src {
            if !fits_i32(v) {
                out.push(Instruction::Mov { ty, src: Operand::Imm(v), dst: Operand::Reg(Reg::R10) });
                out.push(Instruction::Mov { ty, src: Operand::Reg(Reg::R10), dst });
                return;
            }
        }
    }
    if is_memory(&src) && is_memory(&dst) {
        out.push(Instruction::Mov { ty, src, dst: Operand::Reg(Reg::R10) });
        out.push(Instruction::Mov { ty, src: Operand::Reg(Reg::R10), dst });
    } else {
        out.push(Instruction::Mov { ty, src, dst });
    }
}

fn legalize_movsx(src: Operand, dst: Operand, out: &mut Vec<Instruction>) {
    let src = if let Operand::Imm(v) = src {
        out.push(Instruction::Mov { ty: AssemblyType::Longword, src: Operand::Imm(v), dst: Operand::Reg(Reg::R10) });
        Operand::Reg(Reg::R10)
    } else {
        src
    };
    if is_memory(&dst) {
        out.push(Instruction::Movsx { src, dst: Operand::Reg(Reg::R11) });
        out.push(Instruction::Mov { ty: AssemblyType::Quadword, src: Operand::Reg(Reg::R11), dst });
    } else {
        out.push(Instruction::Movsx { src, dst });
    }
}

fn legalize_zero_extend(src: Operand, dst: Operand, out: &mut Vec<Instruction>) {
    if is_memory(&dst) {
        out.push(Instruction::MovZeroExtend { src, dst: Operand::Reg(Reg::R11) });
        out.push(Instruction::Mov { ty: AssemblyType::Quadword, src: Operand::Reg(Reg::R11), dst });
    } else {
        out.push(Instruction::MovZeroExtend { src, dst });
    }
}

fn legalize_cmp(ty: AssemblyType, src: Operand, dst: Operand, out: &mut Vec<Instruction>) {
    let src = if ty == AssemblyType::Quadword {
        if let Operand::Imm(v) = src {
            if !fits_i32(v) {
                out.push(Instruction::Mov { ty, src: Operand::Imm(v), dst: Operand::Reg(Reg::R10) });
                Operand::Reg(Reg::R10)
            } else {
                src
            }
        } else {
            src
        }
    } else {
        src
    };
    if is_memory(&src) && is_memory(&dst) {
        out.push(Instruction::Mov { ty, src, dst: Operand::Reg(Reg::R10) });
        out.push(Instruction::Cmp { ty, src: Operand::Reg(Reg::R10), dst });
    } else if matches!(dst, Operand::Imm(_)) {
        out.push(Instruction::Mov { ty, src: dst, dst: Operand::Reg(Reg::R11) });
        out.push(Instruction::Cmp { ty, src, dst: Operand::Reg(Reg::R11) });
    } else {
        out.push(Instruction::Cmp { ty, src, dst });
    }
}

fn legalize_add_sub(op: BinaryOp, ty: AssemblyType, src: Operand, dst: Operand, out: &mut Vec<Instruction>) {
    if is_memory(&src) && is_memory(&dst) {
        out.push(Instruction::Mov { ty, src, dst: Operand::Reg(Reg::R10) });
        out.push(Instruction::Binary { op, ty, src: Operand::Reg(Reg::R10), dst });
    } else {
        out.push(Instruction::Binary { op, ty, src, dst });
    }
}

fn legalize_mult(ty: AssemblyType, src: Operand, dst: Operand, out: &mut Vec<Instruction>) {
    if is_memory(&dst) {
        out.push(Instruction::Mov { ty, src: dst.clone(), dst: Operand::Reg(Reg::R11) });
        out.push(Instruction::Binary { op: BinaryOp::Mult, ty, src, dst: Operand::Reg(Reg::R11) });
        out.push(Instruction::Mov { ty, src: Operand::Reg(Reg::R11), dst });
    } else {
        out.push(Instruction::Binary { op: BinaryOp::Mult, ty, src, dst });
    }
}

fn legalize_div_operand(staged: Instruction, ty: AssemblyType, operand: Operand, out: &mut Vec<Instruction>) {
    if let Operand::Imm(_) = operand {
        out.push(Instruction::Mov { ty, src: operand, dst: Operand::Reg(Reg::R10) });
        out.push(staged);
    } else {
        let restored = match staged {
            Instruction::Idiv { .. } => Instruction::Idiv { ty, operand },
            Instruction::Div { .. } => Instruction::Div { ty, operand },
            _ => unreachable!(),
        };
        out.push(restored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_to_mem_mov_is_staged_through_r10() {
        let mut out = Vec::new();
        legalize_mov(AssemblyType::Longword, Operand::Stack(-4), Operand::Stack(-8), &mut out);
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Instruction::Mov { dst: Operand::Reg(Reg::R10), .. }));
    }

    #[test]
    fn register_to_memory_mov_is_untouched() {
        let mut out = Vec::new();
        legalize_mov(AssemblyType::Longword, Operand::Reg(Reg::Ax), Operand::Stack(-4), &mut out);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn oversized_quadword_immediate_is_staged() {
        let mut out = Vec::new();
        legalize_mov(AssemblyType::Quadword, Operand::Imm(u64::MAX), Operand::Stack(-8), &mut out);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn imul_into_memory_destination_is_staged_through_r11() {
        let mut out = Vec::new();
        legalize_mult(AssemblyType::Longword, Operand::Reg(Reg::Cx), Operand::Stack(-4), &mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn idiv_by_immediate_is_staged() {
        let mut out = Vec::new();
        legalize_div_operand(
            Instruction::Idiv { ty: AssemblyType::Longword, operand: Operand::Imm(0) },
            AssemblyType::Longword,
            Operand::Imm(3),
            &mut out,
        );
        assert_eq!(out.len(), 2);
    }
}
