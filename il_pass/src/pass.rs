//! The `Pass`/`FunctionPass` traits and their shared result type.

use il_core::{Function, Module};

use crate::cache::{AnalysisCache, FunctionId};
use crate::preserved::PreservedAnalyses;

#[derive(Debug, Clone, Copy)]
pub struct PassResult {
    pub changed: bool,
    pub preserves: PreservedAnalyses,
}

impl PassResult {
    pub fn unchanged() -> Self {
        Self { changed: false, preserves: PreservedAnalyses::ALL }
    }

    pub fn changed(preserves: PreservedAnalyses) -> Self {
        Self { changed: true, preserves }
    }
}

/// A pass that operates on the whole module at once (may add, remove,
/// or reorder functions).
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&self, module: &mut Module, cache: &mut AnalysisCache) -> PassResult;
}

/// A pass that transforms exactly one function, leaving the module's
/// function list untouched. The pipeline runs it over every function.
pub trait FunctionPass {
    fn name(&self) -> &'static str;

    fn run_on_function(
        &self,
        function: &mut Function,
        fid: FunctionId,
        module_for_analysis: &Module,
        cache: &mut AnalysisCache,
    ) -> PassResult;
}

/// Lifts a `FunctionPass` to a `Pass` by iterating every function in
/// the module, threading the shared analysis cache through each.
pub struct FunctionPassAdapter<P: FunctionPass> {
    inner: P,
}

impl<P: FunctionPass> FunctionPassAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: FunctionPass> Pass for FunctionPassAdapter<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn run(&self, module: &mut Module, cache: &mut AnalysisCache) -> PassResult {
        let snapshot = module.clone();
        let mut any_changed = false;
        let mut combined_preserves = PreservedAnalyses::ALL;

        for fid in 0..module.functions.len() {
            let mut func = module.functions[fid].clone();
            let result = self.inner.run_on_function(&mut func, fid, &snapshot, cache);
            module.functions[fid] = func;
            if result.changed {
                any_changed = true;
                cache.invalidate(fid, result.preserves);
                combined_preserves = and_preserves(combined_preserves, result.preserves);
            }
        }

        if any_changed {
            PassResult::changed(combined_preserves)
        } else {
            PassResult::unchanged()
        }
    }
}

fn and_preserves(a: PreservedAnalyses, b: PreservedAnalyses) -> PreservedAnalyses {
    PreservedAnalyses {
        cfg: a.cfg && b.cfg,
        dominators: a.dominators && b.dominators,
        loops: a.loops && b.loops,
        liveness: a.liveness && b.liveness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Instr, Opcode, Type};

    struct NoopPass;

    impl FunctionPass for NoopPass {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn run_on_function(
            &self,
            _function: &mut Function,
            _fid: FunctionId,
            _module_for_analysis: &Module,
            _cache: &mut AnalysisCache,
        ) -> PassResult {
            PassResult::unchanged()
        }
    }

    #[test]
    fn unchanged_function_pass_reports_unchanged_adapter() {
        let mut m = Module::new("0.1.2");
        let mut f = Function::new("main", Type::Void);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry];
        m.add_function(f);

        let adapter = FunctionPassAdapter::new(NoopPass);
        let mut cache = AnalysisCache::new();
        let result = adapter.run(&mut m, &mut cache);
        assert!(!result.changed);
    }
}
