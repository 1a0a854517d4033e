//! Sparse Conditional Constant Propagation (§4.8.4): a joint
//! value/executability lattice computed to a fixpoint over the whole
//! function, then rewritten — constant operands substituted, branches
//! on a constant predicate collapsed, and now-unreachable blocks
//! dropped.

use std::collections::HashMap;

use il_core::{Function, Module, Opcode, Value};
use il_pass::{AnalysisCache, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

use crate::const_fold::try_fold;
use crate::substitute::substitute_instr;

pub struct Sccp;

impl FunctionPass for Sccp {
    fn name(&self) -> &'static str {
        "sccp"
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

#[derive(Debug, Clone)]
enum Lattice {
    Undef,
    Const(Value),
    Overdef,
}

impl PartialEq for Lattice {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Lattice::Undef, Lattice::Undef) => true,
            (Lattice::Overdef, Lattice::Overdef) => true,
            (Lattice::Const(a), Lattice::Const(b)) => a.const_eq(b),
            _ => false,
        }
    }
}

fn meet(a: &Lattice, b: &Lattice) -> Lattice {
    match (a, b) {
        (Lattice::Undef, x) | (x, Lattice::Undef) => x.clone(),
        (Lattice::Overdef, _) | (_, Lattice::Overdef) => Lattice::Overdef,
        (Lattice::Const(a), Lattice::Const(b)) => {
            if a.const_eq(b) {
                Lattice::Const(a.clone())
            } else {
                Lattice::Overdef
            }
        }
    }
}

fn value_lattice(v: &Value, lattice: &HashMap<u32, Lattice>) -> Lattice {
    match v {
        Value::Temp(id, _) => lattice.get(id).cloned().unwrap_or(Lattice::Overdef),
        Value::GlobalRef(_) => Lattice::Overdef,
        _ => Lattice::Const(v.clone()),
    }
}

/// `successors[b][i]` is the block index the `i`th successor label of
/// block `b`'s terminator resolves to; `edge_exec[b][i]` tracks whether
/// that edge has been proven reachable.
struct EdgeModel {
    successors: Vec<Vec<usize>>,
}

impl EdgeModel {
    fn build(function: &Function) -> Self {
        let label_index: HashMap<&str, usize> =
            function.blocks.iter().enumerate().map(|(i, b)| (b.label.as_str(), i)).collect();
        let successors = function
            .blocks
            .iter()
            .map(|b| match b.terminator() {
                Some(t) => t.successors.iter().filter_map(|l| label_index.get(l.as_str()).copied()).collect(),
                None => Vec::new(),
            })
            .collect();
        Self { successors }
    }
}

const MAX_ITERATIONS: usize = 4096;

pub fn run_on_function(function: &mut Function) -> bool {
    if function.blocks.is_empty() {
        return false;
    }

    let edges = EdgeModel::build(function);
    let mut block_exec = vec![false; function.blocks.len()];
    block_exec[0] = true;
    let mut edge_exec: Vec<Vec<bool>> = edges.successors.iter().map(|s| vec![false; s.len()]).collect();
    let mut lattice: HashMap<u32, Lattice> = HashMap::new();
    for id in function.all_defined_ids() {
        lattice.insert(id, Lattice::Undef);
    }
    // Entry-block parameters stand for the function's actual arguments —
    // externally supplied, never a merge of other lattice values — so
    // they start at Overdef rather than waiting on a join that never
    // comes (the entry block has no predecessors).
    if let Some(entry) = function.blocks.first() {
        for param in &entry.params {
            lattice.insert(param.id, Lattice::Overdef);
        }
    }

    let mut iterations = 0;
    loop {
        let mut changed = false;
        iterations += 1;

        for b in 0..function.blocks.len() {
            if !block_exec[b] {
                continue;
            }

            for (pi, param) in function.blocks[b].params.iter().enumerate() {
                let mut joined = Lattice::Undef;
                for (from, succs) in edges.successors.iter().enumerate() {
                    if !block_exec[from] {
                        continue;
                    }
                    for (si, &to) in succs.iter().enumerate() {
                        if to != b || !edge_exec[from][si] {
                            continue;
                        }
                        let Some(term) = function.blocks[from].terminator() else { continue };
                        if let Some(arg) = term.branch_args.get(si).and_then(|args| args.get(pi)) {
                            joined = meet(&joined, &value_lattice(arg, &lattice));
                        }
                    }
                }
                if lattice.get(&param.id) != Some(&joined) {
                    lattice.insert(param.id, joined);
                    changed = true;
                }
            }

            for instr in &function.blocks[b].instrs {
                let Some(rid) = instr.result_id() else { continue };
                if instr.is_terminator() {
                    continue;
                }
                let ops: Vec<Lattice> = instr.operands.iter().map(|v| value_lattice(v, &lattice)).collect();
                let new_val = if ops.iter().any(|o| matches!(o, Lattice::Overdef)) {
                    Lattice::Overdef
                } else if !ops.is_empty() && ops.iter().all(|o| matches!(o, Lattice::Const(_))) {
                    let mut folded = instr.clone();
                    for (operand, op_lattice) in folded.operands.iter_mut().zip(&ops) {
                        if let Lattice::Const(v) = op_lattice {
                            *operand = v.clone();
                        }
                    }
                    match try_fold(&folded) {
                        Some(v) => Lattice::Const(v),
                        None => Lattice::Overdef,
                    }
                } else if instr.opcode == Opcode::Call || matches!(instr.opcode, Opcode::Load | Opcode::Alloca) {
                    Lattice::Overdef
                } else {
                    Lattice::Undef
                };
                if lattice.get(&rid) != Some(&new_val) {
                    lattice.insert(rid, new_val);
                    changed = true;
                }
            }

            let succs = &edges.successors[b];
            let Some(term) = function.blocks[b].terminator() else { continue };
            match term.opcode {
                Opcode::Br if !succs.is_empty() => {
                    if !edge_exec[b][0] {
                        edge_exec[b][0] = true;
                        changed = true;
                    }
                }
                Opcode::CBr if succs.len() == 2 => {
                    let cond = term.operands.first().map(|v| value_lattice(v, &lattice)).unwrap_or(Lattice::Overdef);
                    let to_mark: &[usize] = match cond {
                        Lattice::Const(Value::ConstInt(v, _)) => {
                            if v != 0 {
                                &[0]
                            } else {
                                &[1]
                            }
                        }
                        Lattice::Overdef => &[0, 1],
                        Lattice::Undef | Lattice::Const(_) => &[],
                    };
                    for &i in to_mark {
                        if !edge_exec[b][i] {
                            edge_exec[b][i] = true;
                            changed = true;
                        }
                    }
                }
                _ => {}
            }

            for (si, &to) in succs.iter().enumerate() {
                if edge_exec[b][si] && !block_exec[to] {
                    block_exec[to] = true;
                    changed = true;
                }
            }
        }

        if !changed || iterations >= MAX_ITERATIONS {
            break;
        }
    }

    let subs: HashMap<u32, Value> = lattice
        .into_iter()
        .filter_map(|(id, l)| match l {
            Lattice::Const(v) => Some((id, v)),
            _ => None,
        })
        .collect();

    let mut changed = !subs.is_empty();
    for block in &mut function.blocks {
        for instr in &mut block.instrs {
            substitute_instr(instr, &subs);
        }
    }

    for b in 0..function.blocks.len() {
        if !block_exec[b] {
            continue;
        }
        let succs = edges.successors[b].clone();
        if succs.len() != 2 {
            continue;
        }
        let executable: Vec<usize> = (0..2).filter(|&i| edge_exec[b][i]).collect();
        if executable.len() != 1 {
            continue;
        }
        let keep = executable[0];
        let term = function.blocks[b].instrs.last_mut().expect("terminator");
        if term.opcode != Opcode::CBr {
            continue;
        }
        let label = term.successors[keep].clone();
        let args = term.branch_args[keep].clone();
        *term = il_core::Instr::new(Opcode::Br).with_loc(term.loc).with_successor(label, args);
        changed = true;
    }

    let live: Vec<bool> = block_exec;
    if live.iter().any(|&e| !e) {
        function.blocks = function
            .blocks
            .drain(..)
            .zip(live)
            .filter_map(|(b, keep)| keep.then_some(b))
            .collect();
        changed = true;
    }

    changed
}
