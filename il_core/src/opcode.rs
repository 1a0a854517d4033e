//! The opcode metadata table: the single source of truth consulted by the
//! parser, the verifier, and the serializer for operand shape, result
//! arity, successor count, terminator status and side-effect class.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    Alloca,
    Load,
    Store,
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
    ICmpEq,
    ICmpNe,
    ICmpSlt,
    ICmpSle,
    ICmpSgt,
    ICmpSge,
    FCmpEq,
    FCmpNe,
    FCmpLt,
    FCmpLe,
    FCmpGt,
    FCmpGe,
    Sitofp,
    Fptosi,
    Zext,
    Sext,
    Trunc,
    Call,
    Br,
    CBr,
    Ret,
    Trap,
}

/// Category a single operand must satisfy. `Any` accepts every `Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandCategory {
    Integer,
    Float,
    Pointer,
    String,
    Any,
}

/// Fixed arity, or variadic with a floor (e.g. `call` takes 0+ args).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic { min: usize },
}

/// Whether an instruction has observable side effects DCE must not erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    Pure,
    /// May write memory, trap, or call an effectful runtime helper.
    Effectful,
    /// Unconditionally transfers control; never "dead" even with no uses.
    ControlFlow,
}

/// How the result, if any, is categorized (used by the verifier to check
/// result-type/category agreement and by lowering to pick a result type).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    None,
    /// Result type is a fixed category; lowering/parser supply the exact
    /// width (e.g. `alloca` always yields `ptr`, `icmp_*` always `i1`).
    Category(OperandCategory),
    /// Result type must match the operand type exactly (arithmetic ops).
    SameAsOperands,
    /// Result type is free-form, declared explicitly in the text/IR
    /// (casts, calls).
    Declared,
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub mnemonic: &'static str,
    pub operand_arity: Arity,
    pub operand_category: OperandCategory,
    pub successors: usize,
    pub is_terminator: bool,
    pub side_effect: SideEffect,
    pub result_kind: ResultKind,
    pub has_callee: bool,
}

macro_rules! op_row {
    ($op:ident, $mnem:literal, $arity:expr, $cat:expr, $succs:expr, $term:expr, $eff:expr, $res:expr, $callee:expr) => {
        OpcodeInfo {
            opcode: Opcode::$op,
            mnemonic: $mnem,
            operand_arity: $arity,
            operand_category: $cat,
            successors: $succs,
            is_terminator: $term,
            side_effect: $eff,
            result_kind: $res,
            has_callee: $callee,
        }
    };
}

/// The dense metadata table, indexed in declaration order. Adding an
/// opcode means: add the enum variant, add a row here, and touch the
/// parser/serializer only if the mnemonic has special syntax.
pub const OPCODE_TABLE: &[OpcodeInfo] = &[
    op_row!(Alloca, "alloca", Arity::Fixed(1), OperandCategory::Integer, 0, false, SideEffect::Effectful, ResultKind::Category(OperandCategory::Pointer), false),
    op_row!(Load, "load", Arity::Fixed(1), OperandCategory::Pointer, 0, false, SideEffect::Effectful, ResultKind::Declared, false),
    op_row!(Store, "store", Arity::Fixed(2), OperandCategory::Any, 0, false, SideEffect::Effectful, ResultKind::None, false),
    op_row!(Add, "add", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(Sub, "sub", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(Mul, "mul", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(SDiv, "sdiv", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Effectful, ResultKind::SameAsOperands, false),
    op_row!(SRem, "srem", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Effectful, ResultKind::SameAsOperands, false),
    op_row!(FAdd, "fadd", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(FSub, "fsub", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(FMul, "fmul", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(FDiv, "fdiv", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(And, "and", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(Or, "or", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(Xor, "xor", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(Shl, "shl", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(LShr, "lshr", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(AShr, "ashr", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::SameAsOperands, false),
    op_row!(ICmpEq, "icmp_eq", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(ICmpNe, "icmp_ne", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(ICmpSlt, "icmp_slt", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(ICmpSle, "icmp_sle", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(ICmpSgt, "icmp_sgt", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(ICmpSge, "icmp_sge", Arity::Fixed(2), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(FCmpEq, "fcmp_eq", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(FCmpNe, "fcmp_ne", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(FCmpLt, "fcmp_lt", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(FCmpLe, "fcmp_le", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(FCmpGt, "fcmp_gt", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(FCmpGe, "fcmp_ge", Arity::Fixed(2), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::Category(OperandCategory::Integer), false),
    op_row!(Sitofp, "sitofp", Arity::Fixed(1), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Declared, false),
    op_row!(Fptosi, "fptosi", Arity::Fixed(1), OperandCategory::Float, 0, false, SideEffect::Pure, ResultKind::Declared, false),
    op_row!(Zext, "zext", Arity::Fixed(1), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Declared, false),
    op_row!(Sext, "sext", Arity::Fixed(1), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Declared, false),
    op_row!(Trunc, "trunc", Arity::Fixed(1), OperandCategory::Integer, 0, false, SideEffect::Pure, ResultKind::Declared, false),
    op_row!(Call, "call", Arity::Variadic { min: 0 }, OperandCategory::Any, 0, false, SideEffect::Effectful, ResultKind::Declared, true),
    op_row!(Br, "br", Arity::Fixed(0), OperandCategory::Any, 1, true, SideEffect::ControlFlow, ResultKind::None, false),
    op_row!(CBr, "cbr", Arity::Fixed(1), OperandCategory::Integer, 2, true, SideEffect::ControlFlow, ResultKind::None, false),
    op_row!(Ret, "ret", Arity::Variadic { min: 0 }, OperandCategory::Any, 0, true, SideEffect::ControlFlow, ResultKind::None, false),
    op_row!(Trap, "trap", Arity::Fixed(0), OperandCategory::Any, 0, true, SideEffect::Effectful, ResultKind::None, false),
];

impl Opcode {
    pub fn info(self) -> &'static OpcodeInfo {
        OPCODE_TABLE
            .iter()
            .find(|row| row.opcode == self)
            .expect("every Opcode variant has a table row")
    }

    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        OPCODE_TABLE.iter().find(|row| row.mnemonic == s).map(|row| row.opcode)
    }

    pub fn is_terminator(self) -> bool {
        self.info().is_terminator
    }

    pub fn side_effect(self) -> SideEffect {
        self.info().side_effect
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
