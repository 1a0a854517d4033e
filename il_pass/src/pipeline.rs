//! Pipeline construction and execution: runs a sequence of passes in
//! registration order, with optional verify-after-each-pass and a dump
//! hook (§4.7).

use il_core::Module;
use il_support::{Diag, Expected};

use crate::cache::AnalysisCache;
use crate::pass::Pass;

/// The fixpoint bound for any pass registered as `repeat_to_fixpoint`
/// (e.g. SimplifyCFG's idempotent subpasses, §4.8.6).
pub const FIXPOINT_LIMIT: usize = 1024;

struct Stage {
    pass: Box<dyn Pass>,
    repeat_to_fixpoint: bool,
}

pub struct PipelineBuilder {
    stages: Vec<Stage>,
    verify_after_each: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self { stages: Vec::new(), verify_after_each: cfg!(debug_assertions) }
    }

    pub fn add(mut self, pass: Box<dyn Pass>) -> Self {
        self.stages.push(Stage { pass, repeat_to_fixpoint: false });
        self
    }

    /// Registers `pass` to be re-run until it reports no change, bounded
    /// by `FIXPOINT_LIMIT` iterations.
    pub fn add_to_fixpoint(mut self, pass: Box<dyn Pass>) -> Self {
        self.stages.push(Stage { pass, repeat_to_fixpoint: true });
        self
    }

    pub fn with_verify_after_each(mut self, verify: bool) -> Self {
        self.verify_after_each = verify;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { stages: self.stages, verify_after_each: self.verify_after_each }
    }
}

pub struct Pipeline {
    stages: Vec<Stage>,
    verify_after_each: bool,
}

/// Per-pass-invocation record, for callers that want a summary of what
/// ran (mirrors the teacher's `OptimizationStats::passes_run` log).
#[derive(Debug, Clone)]
pub struct PassInvocation {
    pub pass_name: &'static str,
    pub changed: bool,
    pub iteration: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub invocations: Vec<PassInvocation>,
}

impl Pipeline {
    pub fn run(&self, module: &mut Module) -> Expected<PipelineReport> {
        let mut cache = AnalysisCache::new();
        let mut report = PipelineReport::default();

        for stage in &self.stages {
            if stage.repeat_to_fixpoint {
                let mut iteration = 0;
                loop {
                    let result = stage.pass.run(module, &mut cache);
                    log::trace!("pass `{}` iteration {iteration}: changed={}", stage.pass.name(), result.changed);
                    report.invocations.push(PassInvocation {
                        pass_name: stage.pass.name(),
                        changed: result.changed,
                        iteration,
                    });
                    if !result.changed {
                        break;
                    }
                    iteration += 1;
                    if iteration >= FIXPOINT_LIMIT {
                        return Err(Diag::error(format!(
                            "pass `{}` did not reach a fixpoint within {FIXPOINT_LIMIT} iterations",
                            stage.pass.name()
                        ))
                        .with_code("E_NO_FIXPOINT"));
                    }
                    if !result.preserves.cfg {
                        cache.invalidate_all();
                    }
                    self.maybe_verify(stage.pass.name(), module)?;
                }
            } else {
                let result = stage.pass.run(module, &mut cache);
                log::trace!("pass `{}`: changed={}", stage.pass.name(), result.changed);
                report.invocations.push(PassInvocation {
                    pass_name: stage.pass.name(),
                    changed: result.changed,
                    iteration: 0,
                });
                if result.changed && !result.preserves.cfg {
                    cache.invalidate_all();
                }
            }
            self.maybe_verify(stage.pass.name(), module)?;
        }

        Ok(report)
    }

    fn maybe_verify(&self, pass_name: &'static str, module: &Module) -> Expected<()> {
        if !self.verify_after_each {
            return Ok(());
        }
        il_verify::verify_module(module).map_err(|diag| {
            Diag::error(format!("module failed verification after pass `{pass_name}`: {diag}"))
                .with_code("E_POST_PASS_VERIFY")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Function, Instr, Opcode, Type};
    use crate::pass::PassResult;
    use crate::preserved::PreservedAnalyses;

    struct AlwaysUnchanged;

    impl Pass for AlwaysUnchanged {
        fn name(&self) -> &'static str {
            "always_unchanged"
        }

        fn run(&self, _module: &mut Module, _cache: &mut AnalysisCache) -> PassResult {
            PassResult::unchanged()
        }
    }

    struct CountToThree {
        count: std::cell::Cell<usize>,
    }

    impl Pass for CountToThree {
        fn name(&self) -> &'static str {
            "count_to_three"
        }

        fn run(&self, _module: &mut Module, _cache: &mut AnalysisCache) -> PassResult {
            let n = self.count.get();
            if n < 3 {
                self.count.set(n + 1);
                PassResult::changed(PreservedAnalyses::ALL)
            } else {
                PassResult::unchanged()
            }
        }
    }

    fn well_formed_module() -> Module {
        let mut m = Module::new("0.1.2");
        let mut f = Function::new("main", Type::Void);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry];
        m.add_function(f);
        m
    }

    #[test]
    fn pipeline_runs_passes_in_order_and_reports_them() {
        let pipeline = PipelineBuilder::new()
            .with_verify_after_each(false)
            .add(Box::new(AlwaysUnchanged))
            .build();
        let mut m = well_formed_module();
        let report = pipeline.run(&mut m).unwrap();
        assert_eq!(report.invocations.len(), 1);
        assert!(!report.invocations[0].changed);
    }

    #[test]
    fn fixpoint_stage_repeats_until_no_change() {
        let pipeline = PipelineBuilder::new()
            .with_verify_after_each(false)
            .add_to_fixpoint(Box::new(CountToThree { count: std::cell::Cell::new(0) }))
            .build();
        let mut m = well_formed_module();
        let report = pipeline.run(&mut m).unwrap();
        // 3 changed iterations + 1 final unchanged iteration.
        assert_eq!(report.invocations.len(), 4);
        assert!(!report.invocations.last().unwrap().changed);
    }

    #[test]
    fn verify_after_each_catches_a_broken_module() {
        struct BreakIt;
        impl Pass for BreakIt {
            fn name(&self) -> &'static str {
                "break_it"
            }
            fn run(&self, module: &mut Module, _cache: &mut AnalysisCache) -> PassResult {
                module.functions[0].blocks[0].push(Instr::new(Opcode::Ret));
                PassResult::changed(PreservedAnalyses::ALL)
            }
        }
        let pipeline = PipelineBuilder::new()
            .with_verify_after_each(true)
            .add(Box::new(BreakIt))
            .build();
        let mut m = well_formed_module();
        assert!(pipeline.run(&mut m).is_err());
    }
}
