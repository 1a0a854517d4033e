//! Analyses over `il_core` functions (§4.6): control-flow graph,
//! dominator tree, natural loop forest, and instruction-granularity
//! liveness. Each analysis is built fresh from a `Function`; the pass
//! manager (`il_pass`) is responsible for caching and invalidating them
//! according to the preservation matrix.

mod cfg;
mod dominators;
mod liveness;
mod loop_info;

pub use cfg::Cfg;
pub use dominators::Dominators;
pub use liveness::Liveness;
pub use loop_info::{Loop, LoopForest};
