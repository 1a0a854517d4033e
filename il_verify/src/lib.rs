//! The verifier (§4.5): validates a `Module` against the invariants of
//! §3.7 and the opcode contracts of §4.1. Read-only — it never mutates
//! the module it checks.

mod dominance;
mod names;
mod structure;

use il_core::Module;
use il_support::{DiagSink, Expected, Severity};

/// Verifies `module`, failing on the first error encountered.
pub fn verify_module(module: &Module) -> Expected<()> {
    let sink = verify_module_collecting(module);
    match sink.into_diags().into_iter().find(|d| d.severity == Severity::Error) {
        Some(first) => Err(first),
        None => Ok(()),
    }
}

/// Verifies `module`, continuing past local errors so every diagnostic
/// in the module is reported in one pass (§4.5.2 collecting mode).
pub fn verify_module_collecting(module: &Module) -> DiagSink {
    log::debug!("verifying module (IL version {}, {} functions)", module.version, module.functions.len());
    let mut sink = DiagSink::new();

    names::check_names(module, &mut sink);
    log::trace!("name checks: {} diagnostics so far", sink.diags().len());

    for func in &module.functions {
        log::trace!("verifying function `{}`", func.name);
        structure::check_function(module, func, &mut sink);
        dominance::check_dominance(func, &mut sink);
    }

    log::debug!("verification finished with {} diagnostics", sink.diags().len());
    sink
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Function, Instr, Opcode, Type, Value};

    #[test]
    fn empty_module_verifies() {
        let m = Module::new("0.1.2");
        assert!(verify_module(&m).is_ok());
    }

    #[test]
    fn well_formed_diamond_module_verifies() {
        let mut m = Module::new("0.1.2");
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::ICmpEq)
                .with_result(0, Type::I1)
                .with_operands(vec![Value::ConstInt(0, Type::I64), Value::ConstInt(0, Type::I64)]),
        );
        entry.push(
            Instr::new(Opcode::CBr)
                .with_operands(vec![Value::Temp(0, Type::I1)])
                .with_successor("T", vec![])
                .with_successor("F", vec![]),
        );
        let mut t = BasicBlock::new("T");
        t.push(Instr::new(Opcode::Br).with_successor("Join", vec![Value::ConstInt(2, Type::I64)]));
        let mut ff = BasicBlock::new("F");
        ff.push(Instr::new(Opcode::Br).with_successor("Join", vec![Value::ConstInt(3, Type::I64)]));
        let mut join = BasicBlock::new("Join").with_param(1, Type::I64);
        join.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(1, Type::I64)]));
        f.blocks = vec![entry, t, ff, join];
        m.add_function(f);
        assert!(verify_module(&m).is_ok());
    }

    #[test]
    fn module_with_abi_mismatch_fails_verification() {
        let mut m = Module::new("0.1.2");
        m.add_extern(il_core::Extern::new("rt_abs_i64", Type::Void, vec![]));
        assert!(verify_module(&m).is_err());
    }

    #[test]
    fn collecting_mode_reports_multiple_diagnostics() {
        let mut m = Module::new("0.1.2");
        m.add_extern(il_core::Extern::new("rt_abs_i64", Type::Void, vec![]));
        let mut f = Function::new("main", Type::Void);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Br).with_successor("missing", vec![]));
        f.blocks = vec![entry];
        m.add_function(f);
        let sink = verify_module_collecting(&m);
        assert!(sink.diags().len() >= 2);
    }
}
