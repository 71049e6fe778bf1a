//! Pseudo-register allocation (`spec.md` §4.8, first half): every
//! `Operand::Pseudo` becomes either a `Data` reference (static storage) or
//! a `Stack` slot, and each function gets a single `AllocateStack`
//! prologue sized to its largest stack offset, rounded up to 16 bytes to
//! keep the System V stack-alignment invariant at every `call`.

use crate::asm::backend_symbols::BackendSymbolTable;
use crate::asm::{Instruction, Operand, Program, TopLevel};
use std::collections::HashMap;

struct Frame<'a> {
    backend: &'a BackendSymbolTable,
    offsets: HashMap<String, i64>,
    current_offset: i64,
}

impl<'a> Frame<'a> {
    fn new(backend: &'a BackendSymbolTable) -> Frame<'a> {
        Frame { backend, offsets: HashMap::new(), current_offset: 0 }
    }

    fn resolve(&mut self, operand: Operand) -> Operand {
        let Operand::Pseudo(name) = operand else { return operand };
        if self.backend.is_static(&name) {
            return Operand::Data(name);
        }
        if let Some(offset) = self.offsets.get(&name) {
            return Operand::Stack(*offset);
        }
        let size = self.backend.object(&name).ty.size();
        self.current_offset -= size;
        self.current_offset -= self.current_offset.rem_euclid(size);
        self.offsets.insert(name, self.current_offset);
        Operand::Stack(self.current_offset)
    }
}

pub fn allocate_program(backend: &BackendSymbolTable, program: Program) -> Program {
    let top_levels = program.top_levels.into_iter().map(|t| allocate_top_level(backend, t)).collect();
    Program { top_levels }
}

fn allocate_top_level(backend: &BackendSymbolTable, top: TopLevel) -> TopLevel {
    let (name, global, instructions) = match top {
        TopLevel::Function { name, global, instructions } => (name, global, instructions),
        other @ TopLevel::StaticVariable { .. } => return other,
    };
    let mut frame = Frame::new(backend);
    let mut resolved = Vec::with_capacity(instructions.len() + 1);
    for instr in instructions {
        resolved.push(resolve_instruction(&mut frame, instr));
    }
    let frame_size = round_up_to_16(-frame.current_offset);
    let mut instructions = Vec::with_capacity(resolved.len() + 1);
    if frame_size > 0 {
        instructions.push(Instruction::AllocateStack(frame_size));
    }
    instructions.extend(resolved);
    TopLevel::Function { name, global, instructions }
}

fn round_up_to_16(n: i64) -> i64 {
    (n + 15) / 16 * 16
}

fn resolve_instruction(frame: &mut Frame, instr: Instruction) -> Instruction {
    match instr {
        Instruction::Mov { ty, src, dst } => Instruction::Mov { ty, src: frame.resolve(src), dst: frame.resolve(dst) },
        Instruction::Movsx { src, dst } => Instruction::Movsx { src: frame.resolve(src), dst: frame.resolve(dst) },
        Instruction::MovZeroExtend { src, dst } => {
            Instruction::MovZeroExtend { src: frame.resolve(src), dst: frame.resolve(dst) }
        }
        Instruction::Unary { op, ty, operand } => Instruction::Unary { op, ty, operand: frame.resolve(operand) },
        Instruction::Binary { op, ty, src, dst } => {
            Instruction::Binary { op, ty, src: frame.resolve(src), dst: frame.resolve(dst) }
        }
        Instruction::Cmp { ty, src, dst } => Instruction::Cmp { ty, src: frame.resolve(src), dst: frame.resolve(dst) },
        Instruction::Idiv { ty, operand } => Instruction::Idiv { ty, operand: frame.resolve(operand) },
        Instruction::Div { ty, operand } => Instruction::Div { ty, operand: frame.resolve(operand) },
        Instruction::SetCC { cond, operand } => Instruction::SetCC { cond, operand: frame.resolve(operand) },
        Instruction::Push(operand) => Instruction::Push(frame.resolve(operand)),
        other @ (Instruction::Cdq { .. }
        | Instruction::Jmp(_)
        | Instruction::JmpCC { .. }
        | Instruction::Label(_)
        | Instruction::AllocateStack(_)
        | Instruction::DeallocateStack(_)
        | Instruction::Call(_)
        | Instruction::Ret) => other,
    }
}
