//! TACKY: the flat three-address IR produced by `ir_emitter` and consumed
//! by `asm::lower` (`spec.md` §4.6).
//!
//! Every instruction operates on `IRVal`s; a value's type is never stored
//! inline (constants carry it via `Const::ty()`, variables are looked up in
//! the symbol table), which is also why this module has nothing to check —
//! it is pure data, shaped the way the control-flow linearization in
//! `ir_emitter` wants to build it.

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::types::{Const, StaticInit, Type};

#[derive(Debug, Clone, PartialEq)]
pub enum IRVal {
    Constant(Const),
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IRInstruction {
    Return(IRVal),
    SignExtend { src: IRVal, dst: IRVal },
    Truncate { src: IRVal, dst: IRVal },
    ZeroExtend { src: IRVal, dst: IRVal },
    Unary { op: UnaryOperator, src: IRVal, dst: IRVal },
    Binary { op: BinaryOperator, src1: IRVal, src2: IRVal, dst: IRVal },
    Copy { src: IRVal, dst: IRVal },
    Jump(String),
    JumpIfZero { cond: IRVal, target: String },
    JumpIfNotZero { cond: IRVal, target: String },
    Label(String),
    FunCall { name: String, args: Vec<IRVal>, dst: IRVal },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IRTopLevel {
    Function { name: String, global: bool, params: Vec<String>, body: Vec<IRInstruction> },
    StaticVariable { name: String, global: bool, var_type: Type, init: StaticInit },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IRProgram {
    pub top_levels: Vec<IRTopLevel>,
}
