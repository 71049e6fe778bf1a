//! AT&T-syntax text emission (`spec.md` §4.9): the last pass, turning a
//! fully legalized `asm::Program` into the `.s` text `cc` assembles.

use crate::asm::backend_symbols::BackendSymbolTable;
use crate::asm::{AssemblyType, BinaryOp, CondCode, Instruction, Operand, Program, Reg, TopLevel, UnaryOp};
use crate::types::StaticInit;
use std::fmt::Write;

pub fn emit_program(program: &Program, backend: &BackendSymbolTable) -> String {
    let mut out = String::new();
    for top in &program.top_levels {
        emit_top_level(&mut out, top, backend);
    }
    out.push_str("\t.section .note.GNU-stack,\"\",@progbits\n");
    out
}

fn emit_top_level(out: &mut String, top: &TopLevel, backend: &BackendSymbolTable) {
    match top {
        TopLevel::Function { name, global, instructions } => {
            if *global {
                let _ = writeln!(out, "\t.globl {name}");
            }
            out.push_str("\t.text\n");
            let _ = writeln!(out, "{name}:");
            out.push_str("\tpushq\t%rbp\n");
            out.push_str("\tmovq\t%rsp, %rbp\n");
            for instr in instructions {
                emit_instruction(out, instr, backend);
            }
        }
        TopLevel::StaticVariable { name, global, alignment, init } => {
            if *global {
                let _ = writeln!(out, "\t.globl {name}");
            }
            if init.is_zero() {
                out.push_str("\t.bss\n");
                let _ = writeln!(out, "\t.align {alignment}");
                let _ = writeln!(out, "{name}:");
                let _ = writeln!(out, "\t.zero {}", init.ty().size());
            } else {
                out.push_str("\t.data\n");
                let _ = writeln!(out, "\t.align {alignment}");
                let _ = writeln!(out, "{name}:");
                let _ = writeln!(out, "\t{}", static_init_directive(*init));
            }
        }
    }
}

fn static_init_directive(init: StaticInit) -> String {
    match init {
        StaticInit::Int(v) => format!(".long {v}"),
        StaticInit::UInt(v) => format!(".long {v}"),
        StaticInit::Long(v) => format!(".quad {v}"),
        StaticInit::ULong(v) => format!(".quad {v}"),
    }
}

fn suffix(ty: AssemblyType) -> &'static str {
    match ty {
        AssemblyType::Longword => "l",
        AssemblyType::Quadword => "q",
    }
}

fn reg_name(reg: Reg, ty: AssemblyType) -> &'static str {
    match (ty, reg) {
        (AssemblyType::Longword, Reg::Ax) => "%eax",
        (AssemblyType::Longword, Reg::Cx) => "%ecx",
        (AssemblyType::Longword, Reg::Dx) => "%edx",
        (AssemblyType::Longword, Reg::Di) => "%edi",
        (AssemblyType::Longword, Reg::Si) => "%esi",
        (AssemblyType::Longword, Reg::R8) => "%r8d",
        (AssemblyType::Longword, Reg::R9) => "%r9d",
        (AssemblyType::Longword, Reg::R10) => "%r10d",
        (AssemblyType::Longword, Reg::R11) => "%r11d",
        (AssemblyType::Longword, Reg::Sp) => "%esp",
        (AssemblyType::Quadword, Reg::Ax) => "%rax",
        (AssemblyType::Quadword, Reg::Cx) => "%rcx",
        (AssemblyType::Quadword, Reg::Dx) => "%rdx",
        (AssemblyType::Quadword, Reg::Di) => "%rdi",
        (AssemblyType::Quadword, Reg::Si) => "%rsi",
        (AssemblyType::Quadword, Reg::R8) => "%r8",
        (AssemblyType::Quadword, Reg::R9) => "%r9",
        (AssemblyType::Quadword, Reg::R10) => "%r10",
        (AssemblyType::Quadword, Reg::R11) => "%r11",
        (AssemblyType::Quadword, Reg::Sp) => "%rsp",
    }
}

fn reg_name_byte(reg: Reg) -> &'static str {
    match reg {
        Reg::Ax => "%al",
        Reg::Cx => "%cl",
        Reg::Dx => "%dl",
        Reg::Di => "%dil",
        Reg::Si => "%sil",
        Reg::R8 => "%r8b",
        Reg::R9 => "%r9b",
        Reg::R10 => "%r10b",
        Reg::R11 => "%r11b",
        Reg::Sp => "%spl",
    }
}

fn operand_text(op: &Operand, ty: AssemblyType) -> String {
    match op {
        Operand::Imm(v) => match ty {
            AssemblyType::Longword => format!("${}", *v as u32 as i32),
            AssemblyType::Quadword => format!("${}", *v as i64),
        },
        Operand::Reg(r) => reg_name(*r, ty).to_string(),
        Operand::Stack(offset) => format!("{offset}(%rbp)"),
        Operand::Data(name) => format!("{name}(%rip)"),
        Operand::Pseudo(name) => panic!("internal error: unallocated pseudo-register '{name}' reached emission"),
    }
}

fn operand_text_byte(op: &Operand) -> String {
    match op {
        Operand::Reg(r) => reg_name_byte(*r).to_string(),
        Operand::Stack(offset) => format!("{offset}(%rbp)"),
        Operand::Data(name) => format!("{name}(%rip)"),
        Operand::Imm(_) => panic!("internal error: setCC never targets an immediate"),
        Operand::Pseudo(name) => panic!("internal error: unallocated pseudo-register '{name}' reached emission"),
    }
}

fn cond_suffix(cond: CondCode) -> &'static str {
    match cond {
        CondCode::E => "e",
        CondCode::NE => "ne",
        CondCode::L => "l",
        CondCode::LE => "le",
        CondCode::G => "g",
        CondCode::GE => "ge",
        CondCode::B => "b",
        CondCode::BE => "be",
        CondCode::A => "a",
        CondCode::AE => "ae",
    }
}

fn unary_mnemonic(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "neg",
        UnaryOp::Not => "not",
    }
}

fn binary_mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mult => "imul",
    }
}

fn emit_instruction(out: &mut String, instr: &Instruction, backend: &BackendSymbolTable) {
    match instr {
        Instruction::Mov { ty, src, dst } => {
            let _ = writeln!(out, "\tmov{}\t{}, {}", suffix(*ty), operand_text(src, *ty), operand_text(dst, *ty));
        }
        Instruction::Movsx { src, dst } => {
            let _ = writeln!(
                out,
                "\tmovslq\t{}, {}",
                operand_text(src, AssemblyType::Longword),
                operand_text(dst, AssemblyType::Quadword)
            );
        }
        Instruction::MovZeroExtend { src, dst } => {
            let Operand::Reg(dst_reg) = dst else {
                panic!("internal error: zero-extend destination must be a register after legalization")
            };
            let _ = writeln!(
                out,
                "\tmovl\t{}, {}",
                operand_text(src, AssemblyType::Longword),
                reg_name(*dst_reg, AssemblyType::Longword)
            );
        }
        Instruction::Unary { op, ty, operand } => {
            let _ = writeln!(out, "\t{}{}\t{}", unary_mnemonic(*op), suffix(*ty), operand_text(operand, *ty));
        }
        Instruction::Binary { op, ty, src, dst } => {
            let _ =
                writeln!(out, "\t{}{}\t{}, {}", binary_mnemonic(*op), suffix(*ty), operand_text(src, *ty), operand_text(dst, *ty));
        }
        Instruction::Cmp { ty, src, dst } => {
            let _ = writeln!(out, "\tcmp{}\t{}, {}", suffix(*ty), operand_text(src, *ty), operand_text(dst, *ty));
        }
        Instruction::Idiv { ty, operand } => {
            let _ = writeln!(out, "\tidiv{}\t{}", suffix(*ty), operand_text(operand, *ty));
        }
        Instruction::Div { ty, operand } => {
            let _ = writeln!(out, "\tdiv{}\t{}", suffix(*ty), operand_text(operand, *ty));
        }
        Instruction::Cdq { ty } => out.push_str(match ty {
            AssemblyType::Longword => "\tcltd\n",
            AssemblyType::Quadword => "\tcqto\n",
        }),
        Instruction::Jmp(label) => {
            let _ = writeln!(out, "\tjmp\t.L{label}");
        }
        Instruction::JmpCC { cond, target } => {
            let _ = writeln!(out, "\tj{}\t.L{}", cond_suffix(*cond), target);
        }
        Instruction::SetCC { cond, operand } => {
            let _ = writeln!(out, "\tset{}\t{}", cond_suffix(*cond), operand_text_byte(operand));
        }
        Instruction::Label(label) => {
            let _ = writeln!(out, ".L{label}:");
        }
        Instruction::AllocateStack(n) => {
            let _ = writeln!(out, "\tsubq\t${n}, %rsp");
        }
        Instruction::DeallocateStack(n) => {
            let _ = writeln!(out, "\taddq\t${n}, %rsp");
        }
        Instruction::Push(operand) => {
            let _ = writeln!(out, "\tpushq\t{}", operand_text(operand, AssemblyType::Quadword));
        }
        Instruction::Call(name) => {
            if backend.function_is_defined(name) {
                let _ = writeln!(out, "\tcall\t{name}");
            } else {
                let _ = writeln!(out, "\tcall\t{name}@PLT");
            }
        }
        Instruction::Ret => {
            out.push_str("\tmovq\t%rbp, %rsp\n");
            out.push_str("\tpopq\t%rbp\n");
            out.push_str("\tret\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::backend_symbols::BackendSymbolTable;

    #[test]
    fn mov_renders_sized_register_names() {
        let mut out = String::new();
        let backend = BackendSymbolTable::default();
        emit_instruction(
            &mut out,
            &Instruction::Mov { ty: AssemblyType::Quadword, src: Operand::Imm(1), dst: Operand::Reg(Reg::Ax) },
            &backend,
        );
        assert_eq!(out, "\tmovq\t$1, %rax\n");
    }

    #[test]
    fn undefined_function_call_gets_plt_suffix() {
        let mut out = String::new();
        let backend = BackendSymbolTable::default();
        emit_instruction(&mut out, &Instruction::Call("printf".to_string()), &backend);
        assert_eq!(out, "\tcall\tprintf@PLT\n");
    }

    #[test]
    fn negative_immediate_renders_signed() {
        assert_eq!(operand_text(&Operand::Imm(u64::MAX), AssemblyType::Quadword), "$-1");
    }
}
