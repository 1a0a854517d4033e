//! Function-level IR transforms: ConstFold, DCE, Mem2Reg, SCCP,
//! Peephole, the SimplifyCFG suite, LoopSimplify and LICM. Each is both
//! a `FunctionPass` for use in an `il_pass::Pipeline` and a free
//! `run_on_function` entry point for direct unit testing.

mod const_fold;
mod dce;
mod licm;
mod loop_simplify;
mod mem2reg;
mod peephole;
mod sccp;
mod simplify_cfg;
mod substitute;

pub use const_fold::ConstFold;
pub use dce::Dce;
pub use licm::Licm;
pub use loop_simplify::LoopSimplify;
pub use mem2reg::{Mem2Reg, Mem2RegStats};
pub use peephole::Peephole;
pub use sccp::Sccp;
pub use simplify_cfg::SimplifyCfg;
