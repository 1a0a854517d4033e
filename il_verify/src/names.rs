//! Name uniqueness (invariant 5) and runtime ABI coherence (invariant 6):
//! the only checks that look at the whole module rather than one
//! function at a time.

use std::collections::HashSet;

use il_core::Module;
use il_support::{Diag, DiagSink};

pub fn check_names(module: &Module, sink: &mut DiagSink) {
    let mut seen_externs = HashSet::new();
    for ext in &module.externs {
        if !seen_externs.insert(ext.name.as_str()) {
            sink.push(
                Diag::error(format!("duplicate extern `@{}`", ext.name)).with_code("E_DUP_NAME"),
            );
        }
        check_runtime_abi(module, ext, sink);
    }

    let mut seen_globals = HashSet::new();
    for global in &module.globals {
        if !seen_globals.insert(global.name.as_str()) {
            sink.push(
                Diag::error(format!("duplicate global `@{}`", global.name)).with_code("E_DUP_NAME"),
            );
        }
    }

    let mut seen_functions = HashSet::new();
    for func in &module.functions {
        if !seen_functions.insert(func.name.as_str()) {
            sink.push(
                Diag::error(format!("duplicate function `@{}`", func.name)).with_code("E_DUP_NAME"),
            );
        }
    }
}

fn check_runtime_abi(_module: &Module, ext: &il_core::Extern, sink: &mut DiagSink) {
    let Some(expected) = il_runtime::lookup(&ext.name) else {
        return;
    };
    let declared = format!("{}({})", ext.ret_ty, joined(&ext.param_tys));
    if expected.ret != ext.ret_ty || expected.params != ext.param_tys {
        sink.push(
            Diag::error(format!(
                "extern `@{}` does not match runtime signature: declared `{}`, runtime expects `{}`",
                ext.name, declared, expected
            ))
            .with_code("E_ABI_MISMATCH"),
        );
    }
}

fn joined(tys: &[il_core::Type]) -> String {
    tys.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{Extern, Type};

    #[test]
    fn duplicate_extern_names_are_rejected() {
        let mut m = Module::new("0.1.2");
        m.add_extern(Extern::new("rt_helper", Type::Void, vec![]));
        m.add_extern(Extern::new("rt_helper", Type::Void, vec![]));
        let mut sink = DiagSink::new();
        check_names(&m, &mut sink);
        assert!(sink.has_errors());
    }

    #[test]
    fn runtime_abi_mismatch_is_rejected() {
        let mut m = Module::new("0.1.2");
        m.add_extern(Extern::new("rt_concat", Type::Void, vec![Type::Str]));
        let mut sink = DiagSink::new();
        check_names(&m, &mut sink);
        assert!(sink.has_errors());
    }

    #[test]
    fn matching_runtime_extern_is_accepted() {
        let mut m = Module::new("0.1.2");
        m.add_extern(Extern::new("rt_concat", Type::Str, vec![Type::Str, Type::Str]));
        let mut sink = DiagSink::new();
        check_names(&m, &mut sink);
        assert!(!sink.has_errors());
    }
}
