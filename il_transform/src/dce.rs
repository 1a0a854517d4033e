//! Dead-code elimination (§4.8.2): erase instructions whose results are
//! unused and which have no observable side effect, then drop block
//! parameters left with no remaining use, shrinking every predecessor's
//! matching branch-argument column.

use std::collections::HashSet;

use il_core::{Function, Instr, Module, Opcode, SideEffect, Value};
use il_pass::{AnalysisCache, AnalysisKind, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

pub struct Dce;

impl FunctionPass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        _fid: FunctionId,
        _module_for_analysis: &Module,
        _cache: &mut AnalysisCache,
    ) -> PassResult {
        if run_on_function(function) {
            PassResult::changed(PreservedAnalyses::only(&[AnalysisKind::Cfg, AnalysisKind::Dominators]))
        } else {
            PassResult::unchanged()
        }
    }
}

pub fn run_on_function(function: &mut Function) -> bool {
    let mut changed = false;
    changed |= remove_dead_instructions(function);
    changed |= remove_unused_block_params(function);
    changed
}

fn used_ids(function: &Function) -> HashSet<u32> {
    let mut used = HashSet::new();
    for block in &function.blocks {
        for instr in &block.instrs {
            for id in instr.used_temps() {
                used.insert(id);
            }
        }
    }
    used
}

/// Whether a dead (unused-result) instruction must still be kept. Most
/// opcodes are classified once in `OPCODE_TABLE`; `call` is special-cased
/// since the opcode itself is conservatively `Effectful` regardless of
/// which helper is being called; only calls to a helper registered as
/// `Pure` in `il_runtime` may be dropped when their result is unused.
fn is_effectful(instr: &Instr) -> bool {
    if instr.opcode == Opcode::Call {
        return match instr.callee.as_deref().and_then(|name| il_runtime::registry().lookup(name)) {
            Some(entry) => entry.effect != il_runtime::Effect::Pure,
            None => true,
        };
    }
    matches!(instr.opcode.side_effect(), SideEffect::Effectful)
}

fn remove_dead_instructions(function: &mut Function) -> bool {
    let mut changed = false;
    // Iterate to a local fixpoint: removing one dead instruction can make
    // another, earlier one dead (a chain of pure defs with no remaining use).
    loop {
        let used = used_ids(function);
        let mut removed_any = false;
        for block in &mut function.blocks {
            let before = block.instrs.len();
            block.instrs.retain(|instr| {
                if instr.is_terminator() {
                    return true;
                }
                match instr.result_id() {
                    Some(id) if !used.contains(&id) => is_effectful(instr),
                    _ => true,
                }
            });
            if block.instrs.len() != before {
                removed_any = true;
            }
        }
        if removed_any {
            changed = true;
        } else {
            break;
        }
    }
    changed
}

fn remove_unused_block_params(function: &mut Function) -> bool {
    // Never touch the entry block: its "parameters" are the function's
    // ABI-facing ones in spirit, and pruning them would change the
    // function's call convention rather than its SSA shape. (Per the
    // data model, entry temp params are conceptually tied to the
    // function's Param list by position, not individually droppable.)
    let used = used_ids(function);
    let mut changed = false;

    for block_idx in 1..function.blocks.len() {
        let keep: Vec<bool> = function.blocks[block_idx]
            .params
            .iter()
            .map(|p| used.contains(&p.id))
            .collect();
        if keep.iter().all(|&k| k) {
            continue;
        }
        changed = true;
        let label = function.blocks[block_idx].label.clone();
        function.blocks[block_idx].params = function.blocks[block_idx]
            .params
            .iter()
            .zip(&keep)
            .filter(|(_, &k)| k)
            .map(|(p, _)| p.clone())
            .collect();

        for block in &mut function.blocks {
            for instr in &mut block.instrs {
                for (succ_label, args) in instr.successors.iter().zip(&mut instr.branch_args) {
                    if *succ_label == label {
                        let pruned: Vec<Value> = args
                            .iter()
                            .zip(&keep)
                            .filter(|(_, &k)| k)
                            .map(|(v, _)| v.clone())
                            .collect();
                        *args = pruned;
                    }
                }
            }
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Instr, Opcode, Type};

    #[test]
    fn removes_pure_instruction_with_no_uses() {
        let mut f = Function::new("main", Type::Void);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::Add)
                .with_result(0, Type::I64)
                .with_operands(vec![Value::ConstInt(1, Type::I64), Value::ConstInt(2, Type::I64)]),
        );
        entry.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry];
        assert!(run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs.len(), 1);
    }

    #[test]
    fn keeps_effectful_instruction_even_with_no_uses() {
        let mut f = Function::new("main", Type::Void);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::Alloca)
                .with_result(0, Type::Ptr)
                .with_operands(vec![Value::ConstInt(8, Type::I64)]),
        );
        entry.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry];
        assert!(!run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs.len(), 2);
    }

    #[test]
    fn drops_unused_non_entry_block_parameter_and_its_arg_column() {
        let mut f = Function::new("main", Type::Void);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Br).with_successor("join", vec![Value::ConstInt(1, Type::I64)]));
        let mut join = BasicBlock::new("join").with_param(0, Type::I64);
        join.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry, join];
        assert!(run_on_function(&mut f));
        assert!(f.blocks[1].params.is_empty());
        assert!(f.blocks[0].instrs[0].branch_args[0].is_empty());
    }
}
