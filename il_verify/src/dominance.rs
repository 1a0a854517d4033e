//! The dominance check (§4.5.1 step 7): every use of an SSA id must be
//! dominated by its definition. Block parameters are defined at block
//! entry; unreachable blocks are skipped since their dominator is
//! undefined by construction.

use std::collections::HashMap;

use il_core::{Function, Value};
use il_analysis::{Cfg, Dominators};
use il_support::{Diag, DiagSink};

#[derive(Clone, Copy)]
struct DefSite {
    block: usize,
    /// `None` for a block parameter, defined before every instruction.
    instr_index: Option<usize>,
}

pub fn check_dominance(func: &Function, sink: &mut DiagSink) {
    let cfg = Cfg::build(func);
    let doms = Dominators::build(&cfg);
    let reachable = cfg.reachable();

    let mut defs: HashMap<u32, DefSite> = HashMap::new();
    for (block_idx, block) in func.blocks.iter().enumerate() {
        for param in &block.params {
            defs.insert(param.id, DefSite { block: block_idx, instr_index: None });
        }
        for (instr_idx, instr) in block.instrs.iter().enumerate() {
            if let Some(id) = instr.result_id() {
                defs.insert(id, DefSite { block: block_idx, instr_index: Some(instr_idx) });
            }
        }
    }

    for (block_idx, block) in func.blocks.iter().enumerate() {
        if !reachable[block_idx] {
            continue;
        }
        for (instr_idx, instr) in block.instrs.iter().enumerate() {
            for used in instr.operands.iter().chain(instr.branch_args.iter().flatten()) {
                check_use(func, &doms, &defs, block_idx, instr_idx, used, instr.loc, sink);
            }
        }
    }
}

fn check_use(
    func: &Function,
    doms: &Dominators,
    defs: &HashMap<u32, DefSite>,
    use_block: usize,
    use_instr: usize,
    used: &Value,
    loc: il_support::SourceLoc,
    sink: &mut DiagSink,
) {
    let Some(id) = used.as_temp_id() else {
        return;
    };
    let Some(def) = defs.get(&id) else {
        sink.push(
            Diag::error(format!("function `@{}`: use of undefined `%t{id}`", func.name))
                .with_loc(loc)
                .with_code("E_UNDEFINED_SSA_ID"),
        );
        return;
    };

    let dominates = if def.block == use_block {
        match def.instr_index {
            None => true,
            Some(def_idx) => def_idx < use_instr,
        }
    } else {
        doms.dominates(def.block, use_block)
    };

    if !dominates {
        sink.push(
            Diag::error(format!(
                "function `@{}`: use of `%t{id}` is not dominated by its definition",
                func.name
            ))
            .with_loc(loc)
            .with_code("E_NOT_DOMINATED"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Instr, Opcode, Type};

    #[test]
    fn block_param_satisfies_dominance_for_successor_use() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Br).with_successor("join", vec![Value::ConstInt(1, Type::I64)]));
        let mut join = BasicBlock::new("join").with_param(0, Type::I64);
        join.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        f.blocks = vec![entry, join];
        let mut sink = DiagSink::new();
        check_dominance(&f, &mut sink);
        assert!(!sink.has_errors());
    }

    #[test]
    fn use_before_definition_in_same_block_is_rejected() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        entry.push(
            Instr::new(Opcode::Add)
                .with_result(0, Type::I64)
                .with_operands(vec![Value::ConstInt(1, Type::I64), Value::ConstInt(2, Type::I64)]),
        );
        f.blocks = vec![entry];
        let mut sink = DiagSink::new();
        check_dominance(&f, &mut sink);
        assert!(sink.has_errors());
    }

    #[test]
    fn use_in_a_sibling_branch_of_a_diamond_is_rejected() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::ConstInt(1, Type::I1)])
                .with_successor("T", vec![])
                .with_successor("F", vec![]),
        );
        let mut t = BasicBlock::new("T");
        t.push(
            Instr::new(Opcode::Add)
                .with_result(0, Type::I64)
                .with_operands(vec![Value::ConstInt(1, Type::I64), Value::ConstInt(2, Type::I64)]),
        );
        t.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        let mut ff = BasicBlock::new("F");
        ff.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        f.blocks = vec![entry, t, ff];
        let mut sink = DiagSink::new();
        check_dominance(&f, &mut sink);
        assert!(sink.has_errors());
    }
}
