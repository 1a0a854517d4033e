//! The canonical serializer (§4.3.3): `parse ∘ serialize` is the identity
//! on valid modules. Externs are sorted lexicographically; globals,
//! functions, blocks, instructions, and operands retain in-memory order.

use std::fmt::Write as _;

use il_core::{BasicBlock, Function, Instr, Module, Opcode, Value};
use il_support::SourceLoc;

pub fn serialize_module(module: &Module) -> String {
    let mut out = String::new();
    writeln!(out, "il {}", module.version).unwrap();

    let mut externs: Vec<_> = module.externs.iter().collect();
    externs.sort_by(|a, b| a.name.cmp(&b.name));
    for ext in externs {
        writeln!(out, "{ext}").unwrap();
    }

    for global in &module.globals {
        writeln!(out, "{global}").unwrap();
    }

    for func in &module.functions {
        serialize_function(&mut out, func);
    }

    out
}

fn serialize_function(out: &mut String, func: &Function) {
    write!(out, "func @{}(", func.name).unwrap();
    for (i, p) in func.params.iter().enumerate() {
        if i > 0 {
            write!(out, ", ").unwrap();
        }
        write!(out, "{p}").unwrap();
    }
    writeln!(out, ") -> {} {{", func.ret_ty).unwrap();
    for block in &func.blocks {
        serialize_block(out, block);
    }
    writeln!(out, "}}").unwrap();
}

fn serialize_block(out: &mut String, block: &BasicBlock) {
    write!(out, "{}", block.label).unwrap();
    if !block.params.is_empty() {
        write!(out, "(").unwrap();
        for (i, p) in block.params.iter().enumerate() {
            if i > 0 {
                write!(out, ", ").unwrap();
            }
            write!(out, "{p}").unwrap();
        }
        write!(out, ")").unwrap();
    }
    writeln!(out, ":").unwrap();

    let mut last_loc = block.entry_loc;
    for instr in &block.instrs {
        if instr.loc.is_known() && instr.loc != last_loc {
            writeln!(out, "  .loc {} {} {}", instr.loc.file_id, instr.loc.line, instr.loc.column).unwrap();
            last_loc = instr.loc;
        }
        write!(out, "  ").unwrap();
        serialize_instr(out, instr);
        writeln!(out).unwrap();
    }
}

fn serialize_instr(out: &mut String, instr: &Instr) {
    if let Some((id, ty)) = instr.result {
        write!(out, "%t{id}:{ty} = ").unwrap();
    }
    write!(out, "{}", instr.opcode.mnemonic()).unwrap();
    match instr.opcode {
        Opcode::Alloca => {
            let size = match instr.operands.first() {
                Some(Value::ConstInt(v, _)) => *v,
                _ => 0,
            };
            write!(out, " {size}").unwrap();
        }
        Opcode::Call => {
            write!(out, " @{}(", instr.callee.as_deref().unwrap_or("")).unwrap();
            write_operands(out, &instr.operands);
            write!(out, ")").unwrap();
        }
        Opcode::Br | Opcode::CBr => {
            if instr.opcode == Opcode::CBr {
                write!(out, " ").unwrap();
                write_operands(out, &instr.operands);
            }
            for (i, (label, args)) in instr.successors.iter().zip(instr.branch_args.iter()).enumerate() {
                if i == 0 && instr.opcode == Opcode::Br {
                    write!(out, " ").unwrap();
                } else {
                    write!(out, ", ").unwrap();
                }
                write!(out, "label {label}").unwrap();
                if !args.is_empty() {
                    write!(out, "(").unwrap();
                    write_operands(out, args);
                    write!(out, ")").unwrap();
                }
            }
        }
        Opcode::Ret => {
            if let Some(v) = instr.operands.first() {
                write!(out, " {v}").unwrap();
            }
        }
        Opcode::Trap => {}
        _ => {
            write!(out, " ").unwrap();
            write_operands(out, &instr.operands);
        }
    }
}

fn write_operands(out: &mut String, values: &[Value]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(out, ", ").unwrap();
        }
        write!(out, "{v}").unwrap();
    }
}

/// True when `loc` should not trigger a `.loc` directive because it is
/// unregistered (synthesized by a transform, not sourced from text).
pub fn is_synthetic(loc: SourceLoc) -> bool {
    !loc.is_known()
}
