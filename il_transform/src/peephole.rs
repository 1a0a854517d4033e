//! Peephole simplification (§4.8.5): local algebraic identity folds
//! (`x + 0 → x`, `x * 1 → x`, `x - x → 0`), conditional-branch-on-constant
//! collapse, and deletion of single-use predicate definitions the
//! collapse renders dead.

use std::collections::HashMap;

use il_core::{Function, Instr, Module, Opcode, SideEffect, Value};
use il_pass::{AnalysisCache, AnalysisKind, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

use crate::substitute::substitute_instr;

pub struct Peephole;

impl FunctionPass for Peephole {
    fn name(&self) -> &'static str {
        "peephole"
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
    changed |= fold_identities(function);
    changed |= collapse_constant_branches(function);
    changed |= delete_dead_single_use_defs(function);
    changed
}

fn is_zero(v: &Value) -> bool {
    matches!(v, Value::ConstInt(0, ty) if ty.is_integer())
}

fn is_one(v: &Value) -> bool {
    matches!(v, Value::ConstInt(1, ty) if ty.is_integer())
}

/// `x + 0 → x`, `x * 1 → x`, `x - x → 0`, forwarded block-wide the same
/// way ConstFold forwards folded constants: a running `subs` map applied
/// to every later operand before it is inspected.
fn fold_identities(function: &mut Function) -> bool {
    let mut subs: HashMap<u32, Value> = HashMap::new();
    let mut changed = false;

    for block in &mut function.blocks {
        let mut kept = Vec::with_capacity(block.instrs.len());
        for mut instr in std::mem::take(&mut block.instrs) {
            substitute_instr(&mut instr, &subs);
            if let Some(result_id) = instr.result_id() {
                if let Some(forwarded) = try_identity(&instr) {
                    subs.insert(result_id, forwarded);
                    changed = true;
                    continue;
                }
            }
            kept.push(instr);
        }
        block.instrs = kept;
    }

    changed
}

fn try_identity(instr: &Instr) -> Option<Value> {
    let (a, b) = (instr.operands.first()?, instr.operands.get(1)?);
    match instr.opcode {
        Opcode::Add if is_zero(b) => Some(a.clone()),
        Opcode::Add if is_zero(a) => Some(b.clone()),
        Opcode::Mul if is_one(b) => Some(a.clone()),
        Opcode::Mul if is_one(a) => Some(b.clone()),
        Opcode::Sub if a == b => Some(Value::ConstInt(0, a.ty())),
        _ => None,
    }
}

/// `cbr const, L, M → br (L or M)`; the predicate here is a literal
/// already, not one requiring a lattice (that is SCCP's job) — it arises
/// from a constant operand in the source or from `fold_identities`
/// forwarding one in.
fn collapse_constant_branches(function: &mut Function) -> bool {
    let mut changed = false;
    for block in &mut function.blocks {
        let Some(last) = block.instrs.last() else { continue };
        if last.opcode != Opcode::CBr {
            continue;
        }
        let Some(Value::ConstInt(cond, _)) = last.operands.first() else { continue };
        let keep = if *cond != 0 { 0 } else { 1 };
        let term = block.instrs.last_mut().expect("checked above");
        let label = term.successors[keep].clone();
        let args = term.branch_args[keep].clone();
        let loc = term.loc;
        *term = Instr::new(Opcode::Br).with_loc(loc).with_successor(label, args);
        changed = true;
    }
    changed
}

fn block_used_ids(function: &Function) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();
    for block in &function.blocks {
        for instr in &block.instrs {
            for id in instr.used_temps() {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
    }
    counts
}

fn is_pure(instr: &Instr) -> bool {
    if instr.opcode == Opcode::Call {
        return instr
            .callee
            .as_deref()
            .and_then(|name| il_runtime::registry().lookup(name))
            .map(|e| e.effect == il_runtime::Effect::Pure)
            .unwrap_or(false);
    }
    matches!(instr.opcode.side_effect(), SideEffect::Pure)
}

/// Cleans up defs `collapse_constant_branches` (or `fold_identities`)
/// left with no remaining use — most often a comparison whose only use
/// was the `cbr` just folded away. A single sweep suffices here: full
/// chain cleanup across passes is DCE's job.
fn delete_dead_single_use_defs(function: &mut Function) -> bool {
    let used = block_used_ids(function);
    let mut changed = false;
    for block in &mut function.blocks {
        let before = block.instrs.len();
        block.instrs.retain(|instr| match instr.result_id() {
            Some(id) if !used.contains_key(&id) => !is_pure(instr),
            _ => true,
        });
        if block.instrs.len() != before {
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Type};

    #[test]
    fn folds_add_zero_to_its_other_operand() {
        let mut f = Function::new("main", Type::I64).with_param("x", Type::I64);
        let mut entry = BasicBlock::new("entry").with_param(9, Type::I64);
        entry.push(
            Instr::new(Opcode::Add)
                .with_result(0, Type::I64)
                .with_operands(vec![Value::Temp(9, Type::I64), Value::ConstInt(0, Type::I64)]),
        );
        entry.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        f.blocks = vec![entry];

        assert!(run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs.len(), 1);
        assert_eq!(f.blocks[0].instrs[0].operands[0], Value::Temp(9, Type::I64));
    }

    #[test]
    fn folds_self_subtraction_to_zero() {
        let mut f = Function::new("main", Type::I64).with_param("x", Type::I64);
        let mut entry = BasicBlock::new("entry").with_param(0, Type::I64);
        entry.push(
            Instr::new(Opcode::Sub)
                .with_result(1, Type::I64)
                .with_operands(vec![Value::Temp(0, Type::I64), Value::Temp(0, Type::I64)]),
        );
        entry.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(1, Type::I64)]));
        f.blocks = vec![entry];

        assert!(run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs[0].operands[0], Value::ConstInt(0, Type::I64));
    }

    #[test]
    fn collapses_constant_branch_and_deletes_the_orphaned_predicate() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::ICmpEq)
                .with_result(0, Type::I1)
                .with_operands(vec![Value::ConstInt(1, Type::I64), Value::ConstInt(1, Type::I64)]),
        );
        entry.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("T", vec![])
                .with_successor("F", vec![]),
        );
        let mut t = BasicBlock::new("T");
        t.push(Instr::new(Opcode::Ret).with_operands(vec![Value::ConstInt(1, Type::I64)]));
        let mut fblock = BasicBlock::new("F");
        fblock.push(Instr::new(Opcode::Ret).with_operands(vec![Value::ConstInt(0, Type::I64)]));
        f.blocks = vec![entry, t, fblock];

        assert!(run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs.len(), 1);
        assert_eq!(f.blocks[0].instrs[0].opcode, Opcode::Br);
    }
}
