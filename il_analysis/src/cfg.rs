//! The control-flow graph of a function: successor/predecessor maps and
//! traversal orders, derived purely from each block's terminator.

use indexmap::IndexMap;

use il_core::Function;

#[derive(Debug, Clone)]
pub struct Cfg {
    /// Block label -> index into `Function::blocks`, preserving
    /// insertion order (iteration never depends on a hash order).
    index_of: IndexMap<String, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl Cfg {
    pub fn build(func: &Function) -> Self {
        let index_of: IndexMap<String, usize> =
            func.blocks.iter().enumerate().map(|(i, b)| (b.label.clone(), i)).collect();

        let successors: Vec<Vec<usize>> = func
            .blocks
            .iter()
            .map(|b| match b.terminator() {
                Some(term) => term
                    .successors
                    .iter()
                    .filter_map(|label| index_of.get(label).copied())
                    .collect(),
                None => Vec::new(),
            })
            .collect();

        let mut predecessors = vec![Vec::new(); func.blocks.len()];
        for (from, succs) in successors.iter().enumerate() {
            for &to in succs {
                predecessors[to].push(from);
            }
        }

        Self { index_of, successors, predecessors }
    }

    pub fn block_count(&self) -> usize {
        self.successors.len()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index_of.get(label).copied()
    }

    pub fn successors(&self, block: usize) -> &[usize] {
        &self.successors[block]
    }

    pub fn predecessors(&self, block: usize) -> &[usize] {
        &self.predecessors[block]
    }

    pub const ENTRY: usize = 0;

    /// Reverse post-order from the entry block, skipping unreachable
    /// blocks entirely.
    pub fn reverse_post_order(&self) -> Vec<usize> {
        if self.block_count() == 0 {
            return Vec::new();
        }
        let mut visited = vec![false; self.block_count()];
        let mut post_order = Vec::with_capacity(self.block_count());
        self.post_order_dfs(Self::ENTRY, &mut visited, &mut post_order);
        post_order.reverse();
        post_order
    }

    fn post_order_dfs(&self, block: usize, visited: &mut [bool], out: &mut Vec<usize>) {
        if visited[block] {
            return;
        }
        visited[block] = true;
        for &succ in &self.successors[block] {
            self.post_order_dfs(succ, visited, out);
        }
        out.push(block);
    }

    /// Which blocks are reachable from the entry block.
    pub fn reachable(&self) -> Vec<bool> {
        let mut visited = vec![false; self.block_count()];
        if self.block_count() == 0 {
            return visited;
        }
        let mut stack = vec![Self::ENTRY];
        visited[Self::ENTRY] = true;
        while let Some(b) = stack.pop() {
            for &s in &self.successors[b] {
                if !visited[s] {
                    visited[s] = true;
                    stack.push(s);
                }
            }
        }
        visited
    }

    /// A topological order of reachable blocks, or `None` if the
    /// reachable subgraph contains a cycle.
    pub fn topo_order(&self) -> Option<Vec<usize>> {
        let reachable = self.reachable();
        let mut in_degree = vec![0usize; self.block_count()];
        for (b, succs) in self.successors.iter().enumerate() {
            if !reachable[b] {
                continue;
            }
            for &s in succs {
                in_degree[s] += 1;
            }
        }
        let mut queue: std::collections::VecDeque<usize> = (0..self.block_count())
            .filter(|&b| reachable[b] && in_degree[b] == 0)
            .collect();
        let mut order = Vec::new();
        while let Some(b) = queue.pop_front() {
            order.push(b);
            for &s in &self.successors[b] {
                in_degree[s] -= 1;
                if in_degree[s] == 0 {
                    queue.push_back(s);
                }
            }
        }
        if order.len() == reachable.iter().filter(|&&r| r).count() {
            Some(order)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Instr, Opcode, Type};

    fn diamond() -> Function {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::CBr).with_operands(vec![il_core::Value::ConstInt(1, Type::I1)]).with_successor("T", vec![]).with_successor("F", vec![]));
        let mut t = BasicBlock::new("T");
        t.push(Instr::new(Opcode::Br).with_successor("Join", vec![]));
        let mut ff = BasicBlock::new("F");
        ff.push(Instr::new(Opcode::Br).with_successor("Join", vec![]));
        let mut join = BasicBlock::new("Join");
        join.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry, t, ff, join];
        f
    }

    #[test]
    fn successors_and_predecessors_agree() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        assert_eq!(cfg.successors(0).len(), 2);
        assert_eq!(cfg.predecessors(3).len(), 2);
    }

    #[test]
    fn rpo_visits_entry_first() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        let rpo = cfg.reverse_post_order();
        assert_eq!(rpo[0], 0);
        assert_eq!(rpo.len(), 4);
    }

    #[test]
    fn unreachable_block_excluded_from_rpo() {
        let mut f = diamond();
        let mut dead = BasicBlock::new("dead");
        dead.push(Instr::new(Opcode::Ret));
        f.blocks.push(dead);
        let cfg = Cfg::build(&f);
        assert_eq!(cfg.reverse_post_order().len(), 4);
    }

    #[test]
    fn acyclic_cfg_has_topo_order() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        assert!(cfg.topo_order().is_some());
    }

    #[test]
    fn cyclic_cfg_has_no_topo_order() {
        let mut f = Function::new("loopy", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Br).with_successor("head", vec![]));
        let mut head = BasicBlock::new("head");
        head.push(Instr::new(Opcode::Br).with_successor("head", vec![]));
        f.blocks = vec![entry, head];
        let cfg = Cfg::build(&f);
        assert!(cfg.topo_order().is_none());
    }
}
