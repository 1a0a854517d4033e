//! Basic blocks: a label, an ordered parameter list (the IL's substitute
//! for phi nodes), and an ordered, terminator-last instruction list.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use il_support::SourceLoc;

use crate::instr::Instr;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockParam {
    pub id: u32,
    pub ty: Type,
}

impl fmt::Display for BlockParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}:{}", self.id, self.ty)
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    pub label: String,
    pub params: Vec<BlockParam>,
    pub instrs: Vec<Instr>,
    /// Source location active at block entry, used by the serializer to
    /// decide whether a leading `.loc` directive is redundant.
    pub entry_loc: SourceLoc,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            params: Vec::new(),
            instrs: Vec::new(),
            entry_loc: SourceLoc::UNKNOWN,
        }
    }

    pub fn with_param(mut self, id: u32, ty: Type) -> Self {
        self.params.push(BlockParam { id, ty });
        self
    }

    pub fn push(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|i| i.is_terminator())
    }

    pub fn terminator_mut(&mut self) -> Option<&mut Instr> {
        if self.instrs.last().is_some_and(Instr::is_terminator) {
            self.instrs.last_mut()
        } else {
            None
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }

    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    #[test]
    fn terminator_is_only_the_last_instruction() {
        let mut b = BasicBlock::new("entry");
        b.push(Instr::new(Opcode::Add).with_result(0, Type::I64));
        assert!(b.terminator().is_none());
        b.push(Instr::new(Opcode::Ret));
        assert!(b.is_terminated());
    }
}
