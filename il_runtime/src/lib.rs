//! The runtime extern signature registry: a canonical table mapping
//! runtime helper names to IL signatures, shared by the verifier
//! (ABI cross-check) and BASIC lowering (only declares helpers it uses).

mod registry;
mod signature;

pub use registry::{lookup, registry, Effect, Facility, HelperEntry, Registry};
pub use signature::Signature;
