//! LoopSimplify (§4.8.7): normalize every natural loop to a unique
//! preheader and a single back-edge by inserting forwarding blocks and
//! redistributing branch arguments. Preserves no analysis (§4.8.8):
//! block count and the CFG both change.

use std::collections::HashSet;

use il_analysis::{Cfg, Dominators, Loop, LoopForest};
use il_core::{BasicBlock, BlockParam, Function, Instr, Module, Opcode, Type, Value};
use il_pass::{AnalysisCache, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

pub struct LoopSimplify;

impl FunctionPass for LoopSimplify {
    fn name(&self) -> &'static str {
        "loop-simplify"
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        _fid: FunctionId,
        _module_for_analysis: &Module,
        _cache: &mut AnalysisCache,
    ) -> PassResult {
        if run_on_function(function) {
            PassResult::changed(PreservedAnalyses::NONE)
        } else {
            PassResult::unchanged()
        }
    }
}

pub fn run_on_function(function: &mut Function) -> bool {
    let mut changed = false;
    let mut next_id = function.all_defined_ids().max().map_or(0, |m| m + 1);

    loop {
        let cfg = Cfg::build(function);
        let doms = Dominators::build(&cfg);
        let forest = LoopForest::build(&cfg, &doms);
        let mut acted = false;

        for lp in &forest.loops {
            if insert_preheader_if_needed(function, &cfg, lp, &mut next_id) {
                acted = true;
                break;
            }
        }
        if acted {
            changed = true;
            continue;
        }

        for lp in &forest.loops {
            if insert_unique_latch_if_needed(function, &cfg, lp, &mut next_id) {
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

fn unique_label(function: &Function, base: &str) -> String {
    let existing: HashSet<&str> = function.blocks.iter().map(|b| b.label.as_str()).collect();
    if !existing.contains(base) {
        return base.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}{n}");
        if !existing.contains(candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}

fn redirect_successor(function: &mut Function, from_block: usize, old_label: &str, new_label: &str) {
    for instr in &mut function.blocks[from_block].instrs {
        for label in &mut instr.successors {
            if label == old_label {
                *label = new_label.to_string();
            }
        }
    }
}

fn forwarding_params(header_params: &[BlockParam], next_id: &mut u32) -> Vec<BlockParam> {
    header_params
        .iter()
        .map(|p| {
            let id = *next_id;
            *next_id += 1;
            BlockParam { id, ty: p.ty }
        })
        .collect()
}

fn forwarding_block(label: String, params: Vec<BlockParam>, target: &str) -> BasicBlock {
    let args: Vec<Value> = params.iter().map(|p| Value::Temp(p.id, p.ty)).collect();
    let mut block = BasicBlock::new(label);
    block.params = params;
    block.push(Instr::new(Opcode::Br).with_successor(target, args));
    block
}

/// A loop header needs a dedicated preheader unless it already has
/// exactly one predecessor outside the loop and that predecessor's only
/// successor is the header itself.
fn insert_preheader_if_needed(function: &mut Function, cfg: &Cfg, lp: &Loop, next_id: &mut u32) -> bool {
    let header = lp.header;
    if header == Cfg::ENTRY {
        return false;
    }
    let external: Vec<usize> = cfg.predecessors(header).iter().copied().filter(|p| !lp.contains(*p)).collect();
    if external.is_empty() {
        return false;
    }
    if external.len() == 1 && cfg.successors(external[0]).len() == 1 {
        return false;
    }

    let header_label = function.blocks[header].label.clone();
    let new_label = unique_label(function, &format!("{header_label}.preheader"));
    let pre_params = forwarding_params(&function.blocks[header].params, next_id);
    let preheader = forwarding_block(new_label.clone(), pre_params, &header_label);

    for p in external {
        redirect_successor(function, p, &header_label, &new_label);
    }
    function.blocks.push(preheader);
    true
}

/// A loop header needs a single synthetic latch unless it already has
/// exactly one back-edge from inside the loop.
fn insert_unique_latch_if_needed(function: &mut Function, cfg: &Cfg, lp: &Loop, next_id: &mut u32) -> bool {
    let header = lp.header;
    let tails: Vec<usize> = cfg.predecessors(header).iter().copied().filter(|p| lp.contains(*p)).collect();
    if tails.len() <= 1 {
        return false;
    }

    let header_label = function.blocks[header].label.clone();
    let new_label = unique_label(function, &format!("{header_label}.latch"));
    let latch_params = forwarding_params(&function.blocks[header].params, next_id);
    let latch = forwarding_block(new_label.clone(), latch_params, &header_label);

    for t in tails {
        redirect_successor(function, t, &header_label, &new_label);
    }
    function.blocks.push(latch);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_a_dedicated_preheader_when_header_has_two_outside_predecessors() {
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
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("head", vec![])
                .with_successor("exit", vec![]),
        );
        let mut exit = BasicBlock::new("exit");
        exit.push(Instr::new(Opcode::Ret));
        f.blocks = vec![a, b, head, exit];

        assert!(run_on_function(&mut f));
        assert!(f.blocks.iter().any(|blk| blk.label == "head.preheader"));
        let a_term = f.blocks[0].instrs.last().unwrap();
        assert!(a_term.successors.contains(&"head.preheader".to_string()));
        let b_term = f.blocks[1].instrs.last().unwrap();
        assert!(b_term.successors.contains(&"head.preheader".to_string()));
    }

    #[test]
    fn inserts_a_unique_latch_when_two_blocks_branch_back_to_the_header() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Br).with_successor("head", vec![]));
        let mut head = BasicBlock::new("head");
        head.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("left", vec![])
                .with_successor("right", vec![]),
        );
        let mut left = BasicBlock::new("left");
        left.push(Instr::new(Opcode::Br).with_successor("head", vec![]));
        let mut right = BasicBlock::new("right");
        right.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("head", vec![])
                .with_successor("exit", vec![]),
        );
        let mut exit = BasicBlock::new("exit");
        exit.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry, head, left, right, exit];

        assert!(run_on_function(&mut f));
        assert!(f.blocks.iter().any(|blk| blk.label == "head.latch"));
        let left_term = f.blocks[2].instrs.last().unwrap();
        assert!(left_term.successors.contains(&"head.latch".to_string()));
        let right_term = f.blocks[3].instrs.last().unwrap();
        assert!(right_term.successors.contains(&"head.latch".to_string()));
    }
}
