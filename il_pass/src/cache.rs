//! The analysis cache: lazily-built analyses keyed by `(function index,
//! analysis kind)`, invalidated by a pass's declared `PreservedAnalyses`.

use std::collections::HashMap;

use il_analysis::{Cfg, Dominators, Liveness, LoopForest};
use il_core::{Function, Module};

use crate::preserved::{AnalysisKind, PreservedAnalyses};

enum CachedAnalysis {
    Cfg(Cfg),
    Dominators(Dominators),
    Loops(LoopForest),
    Liveness(Liveness),
}

/// Stable identity for a function within one pipeline `run`: its index
/// into `Module::functions`. No transform in §4.8 deletes a function
/// mid-pipeline, so index identity is sound for the cache's lifetime.
pub type FunctionId = usize;

#[derive(Default)]
pub struct AnalysisCache {
    entries: HashMap<(FunctionId, AnalysisKindTag), CachedAnalysis>,
}

/// `AnalysisKind` isn't `Hash`/`Eq` since it is a small public-facing
/// enum used mostly by value; this tag type keys the cache instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AnalysisKindTag {
    Cfg,
    Dominators,
    Loops,
    Liveness,
}

impl From<AnalysisKind> for AnalysisKindTag {
    fn from(kind: AnalysisKind) -> Self {
        match kind {
            AnalysisKind::Cfg => AnalysisKindTag::Cfg,
            AnalysisKind::Dominators => AnalysisKindTag::Dominators,
            AnalysisKind::Loops => AnalysisKindTag::Loops,
            AnalysisKind::Liveness => AnalysisKindTag::Liveness,
        }
    }
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cfg(&mut self, module: &Module, fid: FunctionId) -> &Cfg {
        self.entries
            .entry((fid, AnalysisKindTag::Cfg))
            .or_insert_with(|| CachedAnalysis::Cfg(Cfg::build(&module.functions[fid])));
        match &self.entries[&(fid, AnalysisKindTag::Cfg)] {
            CachedAnalysis::Cfg(cfg) => cfg,
            _ => unreachable!(),
        }
    }

    pub fn dominators(&mut self, module: &Module, fid: FunctionId) -> &Dominators {
        if !self.entries.contains_key(&(fid, AnalysisKindTag::Dominators)) {
            let cfg = Cfg::build(&module.functions[fid]);
            let doms = Dominators::build(&cfg);
            self.entries.insert((fid, AnalysisKindTag::Cfg), CachedAnalysis::Cfg(cfg));
            self.entries.insert((fid, AnalysisKindTag::Dominators), CachedAnalysis::Dominators(doms));
        }
        match &self.entries[&(fid, AnalysisKindTag::Dominators)] {
            CachedAnalysis::Dominators(doms) => doms,
            _ => unreachable!(),
        }
    }

    pub fn loops(&mut self, module: &Module, fid: FunctionId) -> &LoopForest {
        if !self.entries.contains_key(&(fid, AnalysisKindTag::Loops)) {
            let cfg = Cfg::build(&module.functions[fid]);
            let doms = Dominators::build(&cfg);
            let forest = LoopForest::build(&cfg, &doms);
            self.entries.insert((fid, AnalysisKindTag::Cfg), CachedAnalysis::Cfg(cfg));
            self.entries.insert((fid, AnalysisKindTag::Dominators), CachedAnalysis::Dominators(doms));
            self.entries.insert((fid, AnalysisKindTag::Loops), CachedAnalysis::Loops(forest));
        }
        match &self.entries[&(fid, AnalysisKindTag::Loops)] {
            CachedAnalysis::Loops(forest) => forest,
            _ => unreachable!(),
        }
    }

    pub fn liveness(&mut self, module: &Module, fid: FunctionId) -> &Liveness {
        if !self.entries.contains_key(&(fid, AnalysisKindTag::Liveness)) {
            let func: &Function = &module.functions[fid];
            let cfg = Cfg::build(func);
            let live = Liveness::build(func, &cfg);
            self.entries.insert((fid, AnalysisKindTag::Cfg), CachedAnalysis::Cfg(cfg));
            self.entries.insert((fid, AnalysisKindTag::Liveness), CachedAnalysis::Liveness(live));
        }
        match &self.entries[&(fid, AnalysisKindTag::Liveness)] {
            CachedAnalysis::Liveness(live) => live,
            _ => unreachable!(),
        }
    }

    /// Drops every cached analysis for `fid` not named by `preserved`.
    pub fn invalidate(&mut self, fid: FunctionId, preserved: PreservedAnalyses) {
        for kind in [AnalysisKind::Cfg, AnalysisKind::Dominators, AnalysisKind::Loops, AnalysisKind::Liveness] {
            if !preserved.preserves(kind) {
                self.entries.remove(&(fid, kind.into()));
            }
        }
    }

    /// Drops every cached analysis for every function; used when a pass
    /// changes module-level structure (adds/removes functions).
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Instr, Opcode, Type};

    fn trivial_module() -> Module {
        let mut m = Module::new("0.1.2");
        let mut f = Function::new("main", Type::Void);
        let mut entry = BasicBlock::new("entry");
        entry.push(Instr::new(Opcode::Ret));
        f.blocks = vec![entry];
        m.add_function(f);
        m
    }

    #[test]
    fn repeated_lookups_reuse_the_cached_cfg() {
        let m = trivial_module();
        let mut cache = AnalysisCache::new();
        let first_ptr = cache.cfg(&m, 0) as *const Cfg;
        let second_ptr = cache.cfg(&m, 0) as *const Cfg;
        assert_eq!(first_ptr, second_ptr);
    }

    #[test]
    fn invalidate_drops_unpreserved_analyses() {
        let m = trivial_module();
        let mut cache = AnalysisCache::new();
        cache.dominators(&m, 0);
        assert!(cache.entries.contains_key(&(0, AnalysisKindTag::Dominators)));
        cache.invalidate(0, PreservedAnalyses::NONE);
        assert!(!cache.entries.contains_key(&(0, AnalysisKindTag::Dominators)));
    }

    #[test]
    fn invalidate_keeps_preserved_analyses() {
        let m = trivial_module();
        let mut cache = AnalysisCache::new();
        cache.dominators(&m, 0);
        cache.invalidate(0, PreservedAnalyses::only(&[AnalysisKind::Cfg, AnalysisKind::Dominators]));
        assert!(cache.entries.contains_key(&(0, AnalysisKindTag::Dominators)));
    }
}
