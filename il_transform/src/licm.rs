//! LICM (§4.8.7): hoist an instruction out of its innermost loop into
//! that loop's preheader when it is side-effect-free per opcode
//! metadata (which already excludes `sdiv`/`srem`'s divide-by-zero trap
//! and any `call`) and every operand is defined outside the loop or is
//! itself loop-invariant. Preserves CFG, Dominators and Loops (§4.8.8).
//! Runs after `LoopSimplify` has given every loop a dedicated preheader;
//! a header with none is left alone.

use std::collections::HashSet;

use il_analysis::{Cfg, Dominators, Loop, LoopForest};
use il_core::{Function, Module, SideEffect, Value};
use il_pass::{AnalysisCache, AnalysisKind, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

pub struct Licm;

impl FunctionPass for Licm {
    fn name(&self) -> &'static str {
        "licm"
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        _fid: FunctionId,
        _module_for_analysis: &Module,
        _cache: &mut AnalysisCache,
    ) -> PassResult {
        if run_on_function(function) {
            PassResult::changed(PreservedAnalyses::only(&[
                AnalysisKind::Cfg,
                AnalysisKind::Dominators,
                AnalysisKind::Loops,
            ]))
        } else {
            PassResult::unchanged()
        }
    }
}

pub fn run_on_function(function: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let cfg = Cfg::build(function);
        let doms = Dominators::build(&cfg);
        let forest = LoopForest::build(&cfg, &doms);

        // `forest.loops` is ordered innermost-first (smallest body first);
        // hoisting from the innermost loop outward lets an instruction
        // already hoisted to an inner preheader be re-examined as a
        // candidate for the next loop out.
        let mut acted = false;
        for lp in &forest.loops {
            if hoist_one(function, &cfg, lp) {
                acted = true;
                break;
            }
        }
        if !acted {
            break;
        }
        changed = true;
    }
    changed
}

fn find_dedicated_preheader(cfg: &Cfg, lp: &Loop) -> Option<usize> {
    let external: Vec<usize> = cfg.predecessors(lp.header).iter().copied().filter(|p| !lp.contains(*p)).collect();
    match external.as_slice() {
        [only] if cfg.successors(*only).len() == 1 => Some(*only),
        _ => None,
    }
}

fn defined_in_loop(function: &Function, lp: &Loop) -> HashSet<u32> {
    let mut ids = HashSet::new();
    for &b in &lp.blocks {
        for param in &function.blocks[b].params {
            ids.insert(param.id);
        }
        for instr in &function.blocks[b].instrs {
            if let Some(id) = instr.result_id() {
                ids.insert(id);
            }
        }
    }
    ids
}

fn is_invariant(v: &Value, defined_in_loop: &HashSet<u32>) -> bool {
    match v.as_temp_id() {
        Some(id) => !defined_in_loop.contains(&id),
        None => true,
    }
}

/// Hoists the first eligible instruction found (by block order, then
/// position) and returns whether one was moved. One move per call keeps
/// the preheader's growing instruction list simple to reason about
/// without a compiler to check index arithmetic against.
fn hoist_one(function: &mut Function, cfg: &Cfg, lp: &Loop) -> bool {
    let Some(preheader) = find_dedicated_preheader(cfg, lp) else { return false };
    let loop_defs = defined_in_loop(function, lp);

    for &b in &lp.blocks {
        let Some(pos) = function.blocks[b].instrs.iter().position(|instr| {
            instr.result_id().is_some()
                && !instr.is_terminator()
                && matches!(instr.opcode.side_effect(), SideEffect::Pure)
                && instr.operands.iter().all(|op| is_invariant(op, &loop_defs))
        }) else {
            continue;
        };

        let instr = function.blocks[b].instrs.remove(pos);
        let insert_at = function.blocks[preheader].instrs.len().saturating_sub(1);
        function.blocks[preheader].instrs.insert(insert_at, instr);
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Instr, Opcode, Type};

    fn loop_with_invariant_add() -> Function {
        let mut f = Function::new("main", Type::I64).with_param("n", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Br).with_successor("preheader", vec![]));
        let mut preheader = BasicBlock::new("preheader");
        preheader.push(Instr::new(Opcode::Br).with_successor("head", vec![Value::ConstInt(0, Type::I64)]));
        let mut head = BasicBlock::new("head").with_param(0, Type::I64);
        head.push(
            Instr::new(Opcode::Add)
                .with_result(1, Type::I64)
                .with_operands(vec![Value::ConstInt(2, Type::I64), Value::ConstInt(3, Type::I64)]),
        );
        head.push(
            Instr::new(Opcode::ICmpSlt)
                .with_result(2, Type::I1)
                .with_operands(vec![Value::Temp(0, Type::I64), Value::ConstInt(10, Type::I64)]),
        );
        head.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::Temp(2, Type::I1)])
                .with_successor("head", vec![Value::Temp(1, Type::I64)])
                .with_successor("exit", vec![]),
        );
        let mut exit = BasicBlock::new("exit");
        exit.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        f.blocks = vec![entry, preheader, head, exit];
        f
    }

    #[test]
    fn hoists_loop_invariant_add_to_the_preheader() {
        let mut f = loop_with_invariant_add();
        assert!(run_on_function(&mut f));
        let preheader = f.blocks.iter().find(|b| b.label == "preheader").unwrap();
        assert!(preheader.instrs.iter().any(|i| i.opcode == Opcode::Add));
        let head = f.blocks.iter().find(|b| b.label == "head").unwrap();
        assert!(head.instrs.iter().all(|i| i.opcode != Opcode::Add));
    }

    #[test]
    fn leaves_the_loop_carried_comparison_in_place() {
        let mut f = loop_with_invariant_add();
        run_on_function(&mut f);
        let head = f.blocks.iter().find(|b| b.label == "head").unwrap();
        assert!(head.instrs.iter().any(|i| i.opcode == Opcode::ICmpSlt));
    }

    #[test]
    fn does_nothing_without_a_dedicated_preheader() {
        // Two distinct blocks branch into `head` from outside the loop,
        // so `head` has no single dedicated preheader to hoist into.
        let mut f = Function::new("main", Type::I64);
        let mut a = BasicBlock::new("a");
        a.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("head", vec![])
                .with_successor("b", vec![]),
        );
        let mut b = BasicBlock::new("b");
        b.push(Instr::new(Opcode::Br).with_successor("head", vec![]));
        let mut head = BasicBlock::new("head");
        head.push(
            Instr::new(Opcode::Add)
                .with_result(0, Type::I64)
                .with_operands(vec![Value::ConstInt(2, Type::I64), Value::ConstInt(3, Type::I64)]),
        );
        head.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("head", vec![])
                .with_successor("exit", vec![]),
        );
        let mut exit = BasicBlock::new("exit");
        exit.push(Instr::new(Opcode::Ret));
        f.blocks = vec![a, b, head, exit];

        assert!(!run_on_function(&mut f));
    }
}
