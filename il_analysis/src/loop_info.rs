//! Natural loop detection via back-edges discovered from the dominator
//! tree: an edge `n -> h` is a back-edge when `h` dominates `n`.

use std::collections::BTreeSet;

use crate::cfg::Cfg;
use crate::dominators::Dominators;

#[derive(Debug, Clone)]
pub struct Loop {
    pub header: usize,
    /// All blocks in the natural loop, including the header.
    pub blocks: BTreeSet<usize>,
    /// Blocks outside the loop reachable in one step from a loop block;
    /// the loop's exit edges land here.
    pub exits: BTreeSet<usize>,
    /// Index into `LoopForest::loops` of the loop directly enclosing this
    /// one, if any.
    pub parent: Option<usize>,
}

impl Loop {
    pub fn contains(&self, block: usize) -> bool {
        self.blocks.contains(&block)
    }

    pub fn depth(&self, forest: &LoopForest) -> usize {
        let mut depth = 1;
        let mut cur = self.parent;
        while let Some(idx) = cur {
            depth += 1;
            cur = forest.loops[idx].parent;
        }
        depth
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    pub loops: Vec<Loop>,
}

impl LoopForest {
    pub fn build(cfg: &Cfg, doms: &Dominators) -> Self {
        let mut back_edges = Vec::new();
        for block in 0..cfg.block_count() {
            for &succ in cfg.successors(block) {
                if doms.dominates(succ, block) {
                    back_edges.push((block, succ));
                }
            }
        }

        // One loop per distinct header; merge bodies when a header has
        // multiple back-edges (irreducible entries aside, this matches
        // the common case of a header reached by several continues).
        let mut by_header: Vec<(usize, BTreeSet<usize>)> = Vec::new();
        for (tail, header) in back_edges {
            let body = natural_loop_body(cfg, header, tail);
            if let Some(entry) = by_header.iter_mut().find(|(h, _)| *h == header) {
                entry.1.extend(body);
            } else {
                by_header.push((header, body));
            }
        }

        // Order loops so that a nested loop's header appears after its
        // enclosing loop's header in `loops`, for straightforward parent
        // lookup by containment size (smaller body = more nested).
        by_header.sort_by_key(|(_, body)| body.len());

        let mut loops: Vec<Loop> = Vec::new();
        for (header, blocks) in by_header {
            let exits: BTreeSet<usize> = blocks
                .iter()
                .flat_map(|&b| cfg.successors(b).iter().copied())
                .filter(|s| !blocks.contains(s))
                .collect();
            let parent = loops
                .iter()
                .enumerate()
                .filter(|(_, l)| l.blocks.len() > blocks.len() && blocks.is_subset(&l.blocks))
                .min_by_key(|(_, l)| l.blocks.len())
                .map(|(i, _)| i);
            loops.push(Loop { header, blocks, exits, parent });
        }

        Self { loops }
    }

    pub fn innermost_loop_containing(&self, block: usize) -> Option<&Loop> {
        self.loops
            .iter()
            .filter(|l| l.contains(block))
            .min_by_key(|l| l.blocks.len())
    }

    pub fn is_loop_header(&self, block: usize) -> bool {
        self.loops.iter().any(|l| l.header == block)
    }
}

/// The natural loop body for back-edge `tail -> header`: `header` plus
/// every block that can reach `tail` without passing through `header`.
fn natural_loop_body(cfg: &Cfg, header: usize, tail: usize) -> BTreeSet<usize> {
    let mut body = BTreeSet::new();
    body.insert(header);
    if tail == header {
        return body;
    }
    body.insert(tail);
    let mut stack = vec![tail];
    while let Some(b) = stack.pop() {
        for &pred in cfg.predecessors(b) {
            if body.insert(pred) {
                stack.push(pred);
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Function, Instr, Opcode, Type, Value};

    fn single_loop() -> Function {
        let mut f = Function::new("loopy", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Br).with_successor("head", vec![]));
        let mut head = BasicBlock::new("head");
        head.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("body", vec![])
                .with_successor("exit", vec![]),
        );
        let mut body = BasicBlock::new("body");
        body.push(Instr::new(Opcode::Br).with_successor("head", vec![]));
        let mut exit = BasicBlock::new("exit");
        exit.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry, head, body, exit];
        f
    }

    #[test]
    fn finds_single_natural_loop() {
        let f = single_loop();
        let cfg = Cfg::build(&f);
        let doms = Dominators::build(&cfg);
        let forest = LoopForest::build(&cfg, &doms);
        assert_eq!(forest.loops.len(), 1);
        let head = cfg.index_of("head").unwrap();
        let body = cfg.index_of("body").unwrap();
        assert!(forest.is_loop_header(head));
        assert!(forest.loops[0].contains(body));
        assert!(!forest.loops[0].contains(cfg.index_of("exit").unwrap()));
    }

    #[test]
    fn loop_exits_point_outside_body() {
        let f = single_loop();
        let cfg = Cfg::build(&f);
        let doms = Dominators::build(&cfg);
        let forest = LoopForest::build(&cfg, &doms);
        let exit = cfg.index_of("exit").unwrap();
        assert!(forest.loops[0].exits.contains(&exit));
    }

    #[test]
    fn acyclic_cfg_has_no_loops() {
        let mut f = Function::new("straight", Type::I64);
        let mut a = BasicBlock::new("a");
        a.push(Instr::new(Opcode::Ret));
        f.blocks = vec![a];
        let cfg = Cfg::build(&f);
        let doms = Dominators::build(&cfg);
        let forest = LoopForest::build(&cfg, &doms);
        assert!(forest.loops.is_empty());
    }
}
