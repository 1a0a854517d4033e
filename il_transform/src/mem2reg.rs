//! Mem2Reg (§4.8.3): promotes scalar stack slots to SSA via block
//! parameters instead of phi nodes, sealed-block variant. Allocas whose
//! result escapes anywhere other than the pointer operand of a `load` or
//! `store`, or whose element type is not integer/float/bool, are left
//! alone.

use std::collections::{BTreeMap, HashMap, HashSet};

use il_analysis::Cfg;
use il_core::{BlockParam, Function, Module, Opcode, Type, Value};
use il_pass::{AnalysisCache, AnalysisKind, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

use crate::substitute::substitute_instr;

pub struct Mem2Reg;

impl FunctionPass for Mem2Reg {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        _fid: FunctionId,
        _module_for_analysis: &Module,
        _cache: &mut AnalysisCache,
    ) -> PassResult {
        let stats = run_on_function(function);
        if stats.slots_promoted > 0 {
            PassResult::changed(PreservedAnalyses::only(&[AnalysisKind::Cfg, AnalysisKind::Dominators]))
        } else {
            PassResult::unchanged()
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Mem2RegStats {
    pub slots_promoted: usize,
    pub loads_removed: usize,
    pub stores_removed: usize,
}

pub fn run_on_function(function: &mut Function) -> Mem2RegStats {
    let mut stats = Mem2RegStats::default();
    let promotable = find_promotable(function);
    if promotable.is_empty() {
        return stats;
    }
    stats.slots_promoted = promotable.len();

    let cfg = Cfg::build(function);
    let rpo = cfg.reverse_post_order();
    let mut rpo_pos: HashMap<usize, usize> = HashMap::new();
    for (pos, &b) in rpo.iter().enumerate() {
        rpo_pos.insert(b, pos);
    }

    let mut next_id = function.all_defined_ids().max().map_or(0, |m| m + 1);
    let mut exit_maps: Vec<HashMap<u32, Value>> = vec![HashMap::new(); function.blocks.len()];
    let mut placeholders: Vec<Vec<(u32, u32)>> = vec![Vec::new(); function.blocks.len()];
    let mut subs: HashMap<u32, Value> = HashMap::new();

    for &b in &rpo {
        let mut entry_map = build_entry_map(
            function,
            &cfg,
            &rpo_pos,
            b,
            &promotable,
            &exit_maps,
            &mut next_id,
            &mut placeholders,
        );

        let old_instrs = std::mem::take(&mut function.blocks[b].instrs);
        let mut new_instrs = Vec::with_capacity(old_instrs.len());
        for mut instr in old_instrs {
            substitute_instr(&mut instr, &subs);

            if let Some(aid) = load_alloca_id(&instr, &promotable) {
                if let Some(rid) = instr.result_id() {
                    let repl = entry_map
                        .get(&aid)
                        .cloned()
                        .unwrap_or_else(|| zero_value(promotable[&aid]));
                    subs.insert(rid, repl);
                }
                stats.loads_removed += 1;
                continue;
            }

            if let Some(aid) = store_alloca_id(&instr, &promotable) {
                let value = instr.operands[1].clone();
                entry_map.insert(aid, value);
                stats.stores_removed += 1;
                continue;
            }

            if let Some(id) = instr.result_id() {
                if instr.opcode == Opcode::Alloca && promotable.contains_key(&id) {
                    continue;
                }
            }

            new_instrs.push(instr);
        }
        function.blocks[b].instrs = new_instrs;
        exit_maps[b] = entry_map;
    }

    seal_placeholders(function, &cfg, &placeholders, &exit_maps, &promotable);
    eliminate_trivial_params(function, &cfg, &placeholders, &promotable);

    stats
}

fn find_promotable(function: &Function) -> BTreeMap<u32, Type> {
    let mut alloca_ids: HashSet<u32> = HashSet::new();
    for block in &function.blocks {
        for instr in &block.instrs {
            if instr.opcode == Opcode::Alloca {
                if let Some(id) = instr.result_id() {
                    alloca_ids.insert(id);
                }
            }
        }
    }
    if alloca_ids.is_empty() {
        return BTreeMap::new();
    }

    let mut elem_ty: HashMap<u32, Type> = HashMap::new();
    let mut disqualified: HashSet<u32> = HashSet::new();

    for block in &function.blocks {
        for instr in &block.instrs {
            match instr.opcode {
                Opcode::Load => {
                    if let Some(Value::Temp(id, _)) = instr.operands.first() {
                        if alloca_ids.contains(id) {
                            if let Some(ty) = instr.result_type() {
                                elem_ty.entry(*id).or_insert(ty);
                            }
                        }
                    }
                }
                Opcode::Store => {
                    if let Some(Value::Temp(id, _)) = instr.operands.first() {
                        if alloca_ids.contains(id) {
                            if let Some(v) = instr.operands.get(1) {
                                elem_ty.entry(*id).or_insert(v.ty());
                            }
                        }
                    }
                }
                _ => {}
            }

            for (i, op) in instr.operands.iter().enumerate() {
                if let Some(id) = op.as_temp_id() {
                    if alloca_ids.contains(&id) {
                        let approved = matches!(instr.opcode, Opcode::Load | Opcode::Store) && i == 0;
                        if !approved {
                            disqualified.insert(id);
                        }
                    }
                }
            }
            for args in &instr.branch_args {
                for v in args {
                    if let Some(id) = v.as_temp_id() {
                        if alloca_ids.contains(&id) {
                            disqualified.insert(id);
                        }
                    }
                }
            }
        }
    }

    alloca_ids
        .into_iter()
        .filter(|id| !disqualified.contains(id))
        .filter_map(|id| elem_ty.get(&id).map(|ty| (id, *ty)))
        .filter(|(_, ty)| ty.is_integer() || ty.is_float())
        .collect()
}

fn load_alloca_id(instr: &il_core::Instr, promotable: &BTreeMap<u32, Type>) -> Option<u32> {
    if instr.opcode != Opcode::Load {
        return None;
    }
    match instr.operands.first() {
        Some(Value::Temp(id, _)) if promotable.contains_key(id) => Some(*id),
        _ => None,
    }
}

fn store_alloca_id(instr: &il_core::Instr, promotable: &BTreeMap<u32, Type>) -> Option<u32> {
    if instr.opcode != Opcode::Store {
        return None;
    }
    match instr.operands.first() {
        Some(Value::Temp(id, _)) if promotable.contains_key(id) => Some(*id),
        _ => None,
    }
}

fn zero_value(ty: Type) -> Value {
    if ty.is_float() {
        Value::ConstFloat(0.0)
    } else {
        Value::ConstInt(0, ty)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_entry_map(
    function: &mut Function,
    cfg: &Cfg,
    rpo_pos: &HashMap<usize, usize>,
    block: usize,
    promotable: &BTreeMap<u32, Type>,
    exit_maps: &[HashMap<u32, Value>],
    next_id: &mut u32,
    placeholders: &mut [Vec<(u32, u32)>],
) -> HashMap<u32, Value> {
    let preds = cfg.predecessors(block);
    if preds.is_empty() {
        return HashMap::new();
    }

    let forward: Vec<usize> = preds.iter().filter(|&&p| rpo_pos[&p] < rpo_pos[&block]).copied().collect();
    let all_processed = forward.len() == preds.len();

    if preds.len() == 1 && all_processed {
        return exit_maps[preds[0]].clone();
    }

    let mut entry_map = HashMap::new();
    for (&aid, &ty) in promotable {
        if all_processed {
            let values: Vec<Option<&Value>> = forward.iter().map(|p| exit_maps[*p].get(&aid)).collect();
            if values.iter().all(|v| v.is_some()) {
                let first = values[0].unwrap();
                if values.iter().all(|v| v.unwrap() == first) {
                    entry_map.insert(aid, first.clone());
                    continue;
                }
            }
        }
        let param_id = *next_id;
        *next_id += 1;
        function.blocks[block].params.push(BlockParam { id: param_id, ty });
        entry_map.insert(aid, Value::Temp(param_id, ty));
        placeholders[block].push((aid, param_id));
    }
    entry_map
}

fn seal_placeholders(
    function: &mut Function,
    cfg: &Cfg,
    placeholders: &[Vec<(u32, u32)>],
    exit_maps: &[HashMap<u32, Value>],
    promotable: &BTreeMap<u32, Type>,
) {
    for (block_idx, entries) in placeholders.iter().enumerate() {
        if entries.is_empty() {
            continue;
        }
        let label = function.blocks[block_idx].label.clone();
        for (aid, _) in entries {
            for &pred in cfg.predecessors(block_idx) {
                let value = exit_maps[pred].get(aid).cloned().unwrap_or_else(|| zero_value(promotable[aid]));
                let term = function.blocks[pred]
                    .instrs
                    .last_mut()
                    .expect("every block ends in a terminator after verification");
                for (succ_label, args) in term.successors.iter().zip(term.branch_args.iter_mut()) {
                    if *succ_label == label {
                        args.push(value.clone());
                    }
                }
            }
        }
    }
}

/// Standard trivial-phi elimination over the block parameters this pass
/// introduced: a placeholder whose incoming values, ignoring references
/// to itself, collapse to a single value needs no merge at all.
fn eliminate_trivial_params(
    function: &mut Function,
    cfg: &Cfg,
    placeholders: &[Vec<(u32, u32)>],
    promotable: &BTreeMap<u32, Type>,
) {
    let mut live: HashSet<u32> =
        placeholders.iter().flatten().map(|(_, pid)| *pid).collect();
    let mut subs: HashMap<u32, Value> = HashMap::new();

    loop {
        let mut progressed = false;
        for (block_idx, entries) in placeholders.iter().enumerate() {
            for &(aid, param_id) in entries {
                if !live.contains(&param_id) {
                    continue;
                }
                let Some(param_index) = function.blocks[block_idx].params.iter().position(|p| p.id == param_id)
                else {
                    continue;
                };

                let mut incoming: Vec<Value> = Vec::new();
                let label = function.blocks[block_idx].label.clone();
                for &pred in cfg.predecessors(block_idx) {
                    let term = &function.blocks[pred];
                    let Some(terminator) = term.instrs.last() else { continue };
                    for (succ_label, args) in terminator.successors.iter().zip(&terminator.branch_args) {
                        if *succ_label == label {
                            if let Some(v) = args.get(param_index) {
                                incoming.push(v.clone());
                            }
                        }
                    }
                }

                let distinct: Vec<&Value> = incoming
                    .iter()
                    .filter(|v| v.as_temp_id() != Some(param_id))
                    .collect();
                let all_same = distinct.windows(2).all(|w| w[0] == w[1]);
                if !all_same {
                    continue;
                }

                let replacement = distinct.first().map(|v| (*v).clone()).unwrap_or_else(|| zero_value(promotable[&aid]));
                subs.insert(param_id, replacement.clone());
                live.remove(&param_id);
                progressed = true;

                function.blocks[block_idx].params.remove(param_index);
                for &pred in cfg.predecessors(block_idx) {
                    let term = function.blocks[pred].instrs.last_mut().expect("terminator");
                    for (succ_label, args) in term.successors.iter().zip(term.branch_args.iter_mut()) {
                        if *succ_label == label && args.len() > param_index {
                            args.remove(param_index);
                        }
                    }
                }

                for block in &mut function.blocks {
                    for instr in &mut block.instrs {
                        substitute_instr(instr, &subs);
                    }
                }
            }
        }
        if !progressed {
            break;
        }
    }
}
