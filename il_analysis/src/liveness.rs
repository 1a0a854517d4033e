//! Backward dataflow liveness at instruction granularity: for every
//! instruction, the set of SSA ids live immediately after it.

use std::collections::HashSet;

use il_core::Function;

use crate::cfg::Cfg;

#[derive(Debug, Clone, Default)]
pub struct Liveness {
    /// live-in set per block, indexed by CFG block index.
    live_in: Vec<HashSet<u32>>,
    /// live-out set per block, indexed by CFG block index.
    live_out: Vec<HashSet<u32>>,
}

impl Liveness {
    pub fn build(func: &Function, cfg: &Cfg) -> Self {
        let n = cfg.block_count();
        let (block_use, block_def) = block_use_def(func);

        let mut live_in = vec![HashSet::new(); n];
        let mut live_out = vec![HashSet::new(); n];

        let rpo = cfg.reverse_post_order();
        let mut changed = true;
        while changed {
            changed = false;
            // Reverse of RPO approximates a backward traversal order.
            for &block in rpo.iter().rev() {
                let mut out: HashSet<u32> = HashSet::new();
                for &succ in cfg.successors(block) {
                    out.extend(live_in[succ].iter().copied());
                }
                let mut inp: HashSet<u32> = out.iter().copied().collect();
                for id in &block_def[block] {
                    inp.remove(id);
                }
                inp.extend(block_use[block].iter().copied());

                if inp != live_in[block] || out != live_out[block] {
                    live_in[block] = inp;
                    live_out[block] = out;
                    changed = true;
                }
            }
        }

        Self { live_in, live_out }
    }

    pub fn live_in(&self, block: usize) -> &HashSet<u32> {
        &self.live_in[block]
    }

    pub fn live_out(&self, block: usize) -> &HashSet<u32> {
        &self.live_out[block]
    }

    /// Live set immediately after instruction `instr_idx` within `block`
    /// (instruction-granularity liveness, walking backward from
    /// live-out).
    pub fn live_after_instr(&self, func: &Function, block: usize, instr_idx: usize) -> HashSet<u32> {
        let b = &func.blocks[block];
        let mut live = self.live_out[block].clone();
        for instr in b.instrs.iter().skip(instr_idx + 1).rev() {
            if let Some(id) = instr.result_id() {
                live.remove(&id);
            }
            live.extend(instr.used_temps());
        }
        live
    }

    /// True when `id`, defined by some instruction, has no use at or
    /// after the given point (conservative: only sound for ids defined
    /// and fully scoped within a single function).
    pub fn is_dead_after(&self, func: &Function, block: usize, instr_idx: usize, id: u32) -> bool {
        !self.live_after_instr(func, block, instr_idx).contains(&id)
    }
}

/// Per-block upward-exposed uses and local defs, in CFG block-index
/// order; block parameters count as defs of their own block.
fn block_use_def(func: &Function) -> (Vec<HashSet<u32>>, Vec<HashSet<u32>>) {
    let mut uses = Vec::with_capacity(func.blocks.len());
    let mut defs = Vec::with_capacity(func.blocks.len());
    for block in &func.blocks {
        let mut local_use = HashSet::new();
        let mut local_def: HashSet<u32> = block.params.iter().map(|p| p.id).collect();
        for instr in &block.instrs {
            for used in instr.used_temps() {
                if !local_def.contains(&used) {
                    local_use.insert(used);
                }
            }
            if let Some(id) = instr.result_id() {
                local_def.insert(id);
            }
        }
        uses.push(local_use);
        defs.push(local_def);
    }
    (uses, defs)
}
