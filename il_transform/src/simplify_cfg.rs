//! SimplifyCFG suite (§4.8.6): five idempotent subpasses run in a fixed
//! order — BlockMerging, BranchFolding, ForwardingElimination,
//! ParamCanonicalization, ReachabilityCleanup last. The combined pass
//! preserves no analysis (§4.8.8): block identities and indices can both
//! move.

use std::collections::HashMap;

use il_analysis::Cfg;
use il_core::{Function, Instr, Module, Opcode, Value};
use il_pass::{AnalysisCache, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

pub struct SimplifyCfg;

impl FunctionPass for SimplifyCfg {
    fn name(&self) -> &'static str {
        "simplify-cfg"
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
    changed |= block_merging(function);
    changed |= branch_folding(function);
    changed |= forwarding_elimination(function);
    changed |= param_canonicalization(function);
    changed |= reachability_cleanup(function);
    changed
}

/// Merge a block into its unique predecessor when that predecessor's
/// only successor is this block: the predecessor's `br` (with whatever
/// args it passed) is replaced by the block's own params bound to those
/// args, then the block's instructions are appended in place.
fn block_merging(function: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let cfg = Cfg::build(function);
        let mut merged_any = false;

        for b in 0..function.blocks.len() {
            if b == 0 {
                continue;
            }
            let preds = cfg.predecessors(b);
            if preds.len() != 1 {
                continue;
            }
            let p = preds[0];
            let succs_of_p = cfg.successors(p);
            if p == b || succs_of_p.len() != 1 || succs_of_p[0] != b {
                continue;
            }

            let (label, params, instrs) = {
                let block = &function.blocks[b];
                (block.label.clone(), block.params.clone(), block.instrs.clone())
            };
            let bind: HashMap<u32, Value> = {
                let pred = &function.blocks[p];
                let term = pred.terminator().expect("predecessor has a terminator");
                let succ_idx = term.successors.iter().position(|l| *l == label).expect("edge exists");
                params.iter().map(|param| param.id).zip(term.branch_args[succ_idx].iter().cloned()).collect()
            };

            function.blocks[p].instrs.pop();
            for mut instr in instrs {
                crate::substitute::substitute_instr(&mut instr, &bind);
                function.blocks[p].instrs.push(instr);
            }
            function.blocks.remove(b);
            merged_any = true;
            changed = true;
            break;
        }

        if !merged_any {
            break;
        }
    }
    changed
}

/// `cbr c, L, L → br L` (only when both edges carry identical arguments —
/// otherwise the branch is the only thing selecting which argument set
/// reaches `L`, so it cannot be dropped); `cbr const, L, M → br` whichever
/// edge the literal predicate selects.
fn branch_folding(function: &mut Function) -> bool {
    let mut changed = false;
    for block in &mut function.blocks {
        let Some(last) = block.instrs.last() else { continue };
        if last.opcode != Opcode::CBr {
            continue;
        }

        let same_target = last.successors[0] == last.successors[1] && last.branch_args[0] == last.branch_args[1];
        let literal = match last.operands.first() {
            Some(Value::ConstInt(v, _)) => Some(*v != 0),
            _ => None,
        };

        let keep = if same_target {
            Some(0)
        } else {
            literal.map(|v| if v { 0 } else { 1 })
        };
        let Some(keep) = keep else { continue };

        let term = block.instrs.last_mut().expect("checked above");
        let label = term.successors[keep].clone();
        let args = term.branch_args[keep].clone();
        let loc = term.loc;
        *term = Instr::new(Opcode::Br).with_loc(loc).with_successor(label, args);
        changed = true;
    }
    changed
}

/// Remove a non-entry block whose body is nothing but a `br` forwarding
/// (a function of) its own parameters to one successor: retarget every
/// predecessor directly to that successor, composing argument vectors.
fn forwarding_elimination(function: &mut Function) -> bool {
    let mut changed = false;
    loop {
        let forward = find_pure_forwarder(function);
        let Some((idx, label, params, target_label, template)) = forward else { break };

        for block in &mut function.blocks {
            for (succ_label, args) in block.instrs.iter_mut().flat_map(|i| i.successors.iter_mut().zip(i.branch_args.iter_mut())) {
                if *succ_label != label {
                    continue;
                }
                let bind: HashMap<u32, Value> = params.iter().map(|p| p.id).zip(args.iter().cloned()).collect();
                let composed: Vec<Value> = template
                    .iter()
                    .map(|v| match v.as_temp_id().and_then(|id| bind.get(&id)) {
                        Some(replacement) => replacement.clone(),
                        None => v.clone(),
                    })
                    .collect();
                *succ_label = target_label.clone();
                *args = composed;
            }
        }

        function.blocks.remove(idx);
        changed = true;
    }
    changed
}

type ForwarderInfo = (usize, String, Vec<il_core::BlockParam>, String, Vec<Value>);

fn find_pure_forwarder(function: &Function) -> Option<ForwarderInfo> {
    for (idx, block) in function.blocks.iter().enumerate() {
        if idx == 0 || block.instrs.len() != 1 {
            continue;
        }
        let term = &block.instrs[0];
        if term.opcode != Opcode::Br {
            continue;
        }
        // A block cannot forward to itself in this scheme: the
        // composition step below assumes the target is a distinct block.
        if term.successors[0] == block.label {
            continue;
        }
        return Some((idx, block.label.clone(), block.params.clone(), term.successors[0].clone(), term.branch_args[0].clone()));
    }
    None
}

/// Drop block parameters (and the matching branch-argument column) with
/// no remaining use, on every non-entry block.
fn param_canonicalization(function: &mut Function) -> bool {
    let mut changed = false;
    for block_idx in 1..function.blocks.len() {
        let used = used_ids(function);
        let keep: Vec<bool> = function.blocks[block_idx].params.iter().map(|p| used.contains(&p.id)).collect();
        if keep.iter().all(|&k| k) {
            continue;
        }
        changed = true;
        let label = function.blocks[block_idx].label.clone();
        function.blocks[block_idx].params =
            function.blocks[block_idx].params.iter().zip(&keep).filter(|(_, &k)| k).map(|(p, _)| p.clone()).collect();
        for block in &mut function.blocks {
            for instr in &mut block.instrs {
                for (succ_label, args) in instr.successors.iter().zip(&mut instr.branch_args) {
                    if *succ_label == label {
                        *args = args.iter().zip(&keep).filter(|(_, &k)| k).map(|(v, _)| v.clone()).collect();
                    }
                }
            }
        }
    }
    changed
}

fn used_ids(function: &Function) -> std::collections::HashSet<u32> {
    let mut used = std::collections::HashSet::new();
    for block in &function.blocks {
        for instr in &block.instrs {
            for id in instr.used_temps() {
                used.insert(id);
            }
        }
    }
    used
}

/// Remove unreachable blocks. Run last, after merging/forwarding may
/// have stranded blocks with zero remaining predecessors.
fn reachability_cleanup(function: &mut Function) -> bool {
    let cfg = Cfg::build(function);
    let reachable = cfg.reachable();
    if reachable.iter().all(|&r| r) {
        return false;
    }
    function.blocks = function.blocks.drain(..).zip(reachable).filter_map(|(b, keep)| keep.then_some(b)).collect();
    true
}
