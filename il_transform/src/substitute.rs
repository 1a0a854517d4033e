//! Shared operand-substitution helper used by ConstFold, SCCP and
//! Peephole: rewrite every use of a folded/forwarded id to its
//! replacement value across operands and branch arguments.

use std::collections::HashMap;

use il_core::{Instr, Value};

pub fn substitute_instr(instr: &mut Instr, subs: &HashMap<u32, Value>) {
    for op in &mut instr.operands {
        if let Some(id) = op.as_temp_id() {
            if let Some(repl) = subs.get(&id) {
                *op = repl.clone();
            }
        }
    }
    for args in &mut instr.branch_args {
        for arg in args {
            if let Some(id) = arg.as_temp_id() {
                if let Some(repl) = subs.get(&id) {
                    *arg = repl.clone();
                }
            }
        }
    }
}
