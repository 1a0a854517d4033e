//! A single SSA instruction.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use il_support::SourceLoc;

use crate::opcode::Opcode;
use crate::types::Type;
use crate::value::Value;

/// The declared result of an instruction: its SSA id and type. `None` for
/// instructions with no result (`store`, `br`, `ret`, ...).
pub type InstrResult = Option<(u32, Type)>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instr {
    pub opcode: Opcode,
    pub result: InstrResult,
    pub operands: Vec<Value>,
    /// Callee name for `call`; `None` otherwise.
    pub callee: Option<String>,
    /// Successor block labels, in declaration order, for terminators with
    /// successors (`br`, `cbr`).
    pub successors: Vec<String>,
    /// One branch-argument vector per successor, same length/order as
    /// `successors`.
    pub branch_args: Vec<Vec<Value>>,
    pub loc: SourceLoc,
}

impl Instr {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            result: None,
            operands: Vec::new(),
            callee: None,
            successors: Vec::new(),
            branch_args: Vec::new(),
            loc: SourceLoc::UNKNOWN,
        }
    }

    pub fn with_result(mut self, id: u32, ty: Type) -> Self {
        self.result = Some((id, ty));
        self
    }

    pub fn with_operands(mut self, operands: Vec<Value>) -> Self {
        self.operands = operands;
        self
    }

    pub fn with_callee(mut self, callee: impl Into<String>) -> Self {
        self.callee = Some(callee.into());
        self
    }

    pub fn with_successor(mut self, label: impl Into<String>, args: Vec<Value>) -> Self {
        self.successors.push(label.into());
        self.branch_args.push(args);
        self
    }

    pub fn with_loc(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    pub fn result_id(&self) -> Option<u32> {
        self.result.map(|(id, _)| id)
    }

    pub fn result_type(&self) -> Option<Type> {
        self.result.map(|(_, ty)| ty)
    }

    /// Every SSA id this instruction *uses* as an operand or branch
    /// argument (not including its own result).
    pub fn used_temps(&self) -> impl Iterator<Item = u32> + '_ {
        self.operands
            .iter()
            .filter_map(Value::as_temp_id)
            .chain(self.branch_args.iter().flatten().filter_map(Value::as_temp_id))
    }

    /// Rewrites every use of `from` to `to` across operands and branch
    /// arguments; used uniformly by ConstFold/SCCP/peephole rewrites.
    pub fn replace_all(&mut self, from: u32, to: &Value) {
        for operand in &mut self.operands {
            if operand.as_temp_id() == Some(from) {
                *operand = to.clone();
            }
        }
        for args in &mut self.branch_args {
            for arg in args {
                if arg.as_temp_id() == Some(from) {
                    *arg = to.clone();
                }
            }
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((id, ty)) = self.result {
            write!(f, "%t{id}:{ty} = ")?;
        }
        write!(f, "{}", self.opcode.mnemonic())?;
        if let Some(callee) = &self.callee {
            write!(f, " @{callee}")?;
        }
        if !self.operands.is_empty() {
            if self.callee.is_some() {
                write!(f, "(")?;
                write_values(f, &self.operands)?;
                write!(f, ")")?;
            } else {
                write!(f, " ")?;
                write_values(f, &self.operands)?;
            }
        }
        for (i, (label, args)) in self.successors.iter().zip(self.branch_args.iter()).enumerate() {
            if i == 0 && self.operands.is_empty() {
                write!(f, " ")?;
            } else {
                write!(f, ", ")?;
            }
            write!(f, "label {label}")?;
            if !args.is_empty() {
                write!(f, "(")?;
                write_values(f, args)?;
                write!(f, ")")?;
            }
        }
        Ok(())
    }
}

fn write_values(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}
