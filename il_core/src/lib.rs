//! Core SSA IR data model: types, values, opcodes, instructions, basic
//! blocks, functions, externs, globals and modules. Ownership is strictly
//! tree-shaped — modules own functions, functions own blocks, blocks own
//! instructions — so every cross-reference (SSA id, block label, extern
//! name) is by name/id rather than by pointer.

mod block;
mod externs;
mod function;
mod global;
mod instr;
mod module;
mod opcode;
mod types;
mod value;

pub use block::{BasicBlock, BlockParam};
pub use externs::Extern;
pub use function::{Function, Param};
pub use global::Global;
pub use instr::{Instr, InstrResult};
pub use module::Module;
pub use opcode::{Arity, Opcode, OpcodeInfo, OperandCategory, ResultKind, SideEffect, OPCODE_TABLE};
pub use types::Type;
pub use value::{format_f64_roundtrip, Value};
