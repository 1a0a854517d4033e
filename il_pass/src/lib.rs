//! The pass manager (§4.7): named pass registration, a pipeline builder,
//! an analysis cache keyed by `(function, analysis kind)`, and
//! preservation-matrix-driven invalidation.

mod cache;
mod pass;
mod pipeline;
mod preserved;

pub use cache::{AnalysisCache, FunctionId};
pub use pass::{FunctionPass, FunctionPassAdapter, Pass, PassResult};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineReport, PassInvocation, FIXPOINT_LIMIT};
pub use preserved::{AnalysisKind, PreservedAnalyses};
