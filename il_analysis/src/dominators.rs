//! Dominator tree construction via the Cooper-Harvey-Kennedy iterative
//! fixpoint algorithm, operating over reverse post-order block indices.

use crate::cfg::Cfg;

#[derive(Debug, Clone)]
pub struct Dominators {
    /// Immediate dominator of each block, indexed by CFG block index.
    /// `None` for unreachable blocks; the entry block is its own idom.
    idom: Vec<Option<usize>>,
}

impl Dominators {
    pub fn build(cfg: &Cfg) -> Self {
        let n = cfg.block_count();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        if n == 0 {
            return Self { idom };
        }

        let rpo = cfg.reverse_post_order();
        let mut rpo_index = vec![usize::MAX; n];
        for (order, &block) in rpo.iter().enumerate() {
            rpo_index[block] = order;
        }

        idom[Cfg::ENTRY] = Some(Cfg::ENTRY);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for &pred in cfg.predecessors(block) {
                    if idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idom, &rpo_index, current, pred),
                    });
                }
                if new_idom != idom[block] {
                    idom[block] = new_idom;
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    pub fn idom(&self, block: usize) -> Option<usize> {
        if block == Cfg::ENTRY {
            None
        } else {
            self.idom[block]
        }
    }

    /// `a` strictly or non-strictly dominates `b` (`a == b` counts).
    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if a == b {
            return true;
        }
        let mut cur = b;
        while let Some(idom) = self.idom[cur] {
            if idom == cur {
                return a == cur;
            }
            if idom == a {
                return true;
            }
            cur = idom;
        }
        false
    }

    pub fn strictly_dominates(&self, a: usize, b: usize) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Blocks immediately dominated by `a`.
    pub fn children(&self, a: usize) -> Vec<usize> {
        self.idom
            .iter()
            .enumerate()
            .filter(|&(b, idom)| b != a && *idom == Some(a))
            .map(|(b, _)| b)
            .collect()
    }
}

fn intersect(idom: &[Option<usize>], rpo_index: &[usize], a: usize, b: usize) -> usize {
    let mut finger1 = a;
    let mut finger2 = b;
    while finger1 != finger2 {
        while rpo_index[finger1] > rpo_index[finger2] {
            finger1 = idom[finger1].expect("processed block has an idom");
        }
        while rpo_index[finger2] > rpo_index[finger1] {
            finger2 = idom[finger2].expect("processed block has an idom");
        }
    }
    finger1
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Function, Instr, Opcode, Type, Value};

    fn diamond() -> Function {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("T", vec![])
                .with_successor("F", vec![]),
        );
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
    fn diamond_join_is_dominated_only_by_entry() {
        let f = diamond();
        let cfg = Cfg::build(&f);
        let doms = Dominators::build(&cfg);
        let entry = cfg.index_of("entry").unwrap();
        let t = cfg.index_of("T").unwrap();
        let join = cfg.index_of("Join").unwrap();
        assert_eq!(doms.idom(join), Some(entry));
        assert!(!doms.dominates(t, join));
        assert!(doms.dominates(entry, join));
    }

    #[test]
    fn straight_line_chain_dominates_transitively() {
        let mut f = Function::new("chain", Type::I64);
        let mut a = BasicBlock::new("a");
        a.push(Instr::new(Opcode::Br).with_successor("b", vec![]));
        let mut b = BasicBlock::new("b");
        b.push(Instr::new(Opcode::Br).with_successor("c", vec![]));
        let mut c = BasicBlock::new("c");
        c.push(Instr::new(Opcode::Ret));
        f.blocks = vec![a, b, c];
        let cfg = Cfg::build(&f);
        let doms = Dominators::build(&cfg);
        let ia = cfg.index_of("a").unwrap();
        let ic = cfg.index_of("c").unwrap();
        assert!(doms.strictly_dominates(ia, ic));
    }

    #[test]
    fn loop_header_dominates_its_body() {
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
        let cfg = Cfg::build(&f);
        let doms = Dominators::build(&cfg);
        let head_i = cfg.index_of("head").unwrap();
        let body_i = cfg.index_of("body").unwrap();
        assert!(doms.strictly_dominates(head_i, body_i));
    }
}
