//! Parser and canonical serializer for the textual IL (§4.3). Guarantees
//! `parse(serialize(m))` is structurally equal to `m` for every valid
//! module (P1).

mod lexer;
mod parser;
mod serializer;

pub use parser::{parse_module, Parser};
pub use serializer::serialize_module;
