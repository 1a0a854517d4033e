//! Constant folding (§4.8.1): integer arithmetic, comparisons, and a
//! whitelist of pure runtime helpers. Integer arithmetic wraps modulo
//! 2^width two's-complement; division/modulo fold only when the
//! divisor is nonzero.

use std::collections::HashMap;

use il_core::{Function, Instr, Module, Opcode, Type, Value};
use il_pass::{AnalysisCache, FunctionId, FunctionPass, PassResult, PreservedAnalyses};

use crate::substitute::substitute_instr;

pub struct ConstFold;

impl FunctionPass for ConstFold {
    fn name(&self) -> &'static str {
        "const-fold"
    }

    fn run_on_function(
        &self,
        function: &mut Function,
        _fid: FunctionId,
        _module_for_analysis: &Module,
        _cache: &mut AnalysisCache,
    ) -> PassResult {
        if run_on_function(function) {
            PassResult::changed(PreservedAnalyses::only(&[
                il_pass::AnalysisKind::Cfg,
                il_pass::AnalysisKind::Dominators,
                il_pass::AnalysisKind::Loops,
            ]))
        } else {
            PassResult::unchanged()
        }
    }
}

/// Pure entry point usable directly by unit tests without a pass
/// manager round-trip.
pub fn run_on_function(function: &mut Function) -> bool {
    let mut subs: HashMap<u32, Value> = HashMap::new();
    let mut changed = false;

    for block in &mut function.blocks {
        let mut kept = Vec::with_capacity(block.instrs.len());
        for mut instr in std::mem::take(&mut block.instrs) {
            substitute_instr(&mut instr, &subs);
            if let Some(result_id) = instr.result_id() {
                if let Some(folded) = try_fold(&instr) {
                    subs.insert(result_id, folded);
                    changed = true;
                    continue;
                }
            }
            kept.push(instr);
        }
        block.instrs = kept;
    }

    changed
}

/// Shared with SCCP, which folds the same opcodes once every operand has
/// resolved to a lattice constant.
pub(crate) fn try_fold(instr: &Instr) -> Option<Value> {
    match instr.opcode {
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::SDiv | Opcode::SRem | Opcode::And
        | Opcode::Or | Opcode::Xor | Opcode::Shl | Opcode::LShr | Opcode::AShr => fold_int_binop(instr),
        Opcode::ICmpEq
        | Opcode::ICmpNe
        | Opcode::ICmpSlt
        | Opcode::ICmpSle
        | Opcode::ICmpSgt
        | Opcode::ICmpSge => fold_icmp(instr),
        Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv => fold_float_binop(instr),
        Opcode::FCmpEq | Opcode::FCmpNe | Opcode::FCmpLt | Opcode::FCmpLe | Opcode::FCmpGt | Opcode::FCmpGe => {
            fold_fcmp(instr)
        }
        Opcode::Call => fold_pure_call(instr),
        _ => None,
    }
}

fn int_operands(instr: &Instr) -> Option<(i64, i64, Type)> {
    match (instr.operands.first(), instr.operands.get(1)) {
        (Some(Value::ConstInt(a, ta)), Some(Value::ConstInt(b, _))) => Some((*a, *b, *ta)),
        _ => None,
    }
}

fn wrap(v: i64, ty: Type) -> i64 {
    match ty.int_bits() {
        Some(64) | None => v,
        Some(bits) => {
            let mask = (1i64 << bits) - 1;
            let truncated = v & mask;
            let sign_bit = 1i64 << (bits - 1);
            if truncated & sign_bit != 0 {
                truncated | !mask
            } else {
                truncated
            }
        }
    }
}

fn fold_int_binop(instr: &Instr) -> Option<Value> {
    let (a, b, ty) = int_operands(instr)?;
    let result = match instr.opcode {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::SDiv if b != 0 => a.wrapping_div(b),
        Opcode::SRem if b != 0 => a.wrapping_rem(b),
        Opcode::SDiv | Opcode::SRem => return None,
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::Shl => a.wrapping_shl(b as u32),
        Opcode::LShr => ((a as u64) >> (b as u32)) as i64,
        Opcode::AShr => a.wrapping_shr(b as u32),
        _ => return None,
    };
    Some(Value::ConstInt(wrap(result, ty), ty))
}

fn fold_icmp(instr: &Instr) -> Option<Value> {
    let (a, b, _) = int_operands(instr)?;
    let result = match instr.opcode {
        Opcode::ICmpEq => a == b,
        Opcode::ICmpNe => a != b,
        Opcode::ICmpSlt => a < b,
        Opcode::ICmpSle => a <= b,
        Opcode::ICmpSgt => a > b,
        Opcode::ICmpSge => a >= b,
        _ => return None,
    };
    Some(Value::ConstInt(result as i64, Type::I1))
}

fn float_operands(instr: &Instr) -> Option<(f64, f64)> {
    match (instr.operands.first(), instr.operands.get(1)) {
        (Some(Value::ConstFloat(a)), Some(Value::ConstFloat(b))) => Some((*a, *b)),
        _ => None,
    }
}

fn fold_float_binop(instr: &Instr) -> Option<Value> {
    let (a, b) = float_operands(instr)?;
    let result = match instr.opcode {
        Opcode::FAdd => a + b,
        Opcode::FSub => a - b,
        Opcode::FMul => a * b,
        Opcode::FDiv => a / b,
        _ => return None,
    };
    Some(Value::ConstFloat(result))
}

fn fold_fcmp(instr: &Instr) -> Option<Value> {
    let (a, b) = float_operands(instr)?;
    let result = match instr.opcode {
        Opcode::FCmpEq => a == b,
        Opcode::FCmpNe => a != b,
        Opcode::FCmpLt => a < b,
        Opcode::FCmpLe => a <= b,
        Opcode::FCmpGt => a > b,
        Opcode::FCmpGe => a >= b,
        _ => return None,
    };
    Some(Value::ConstInt(result as i64, Type::I1))
}

/// Whitelist of pure runtime helpers folded when every argument is a
/// constant (§4.8.1: abs, floor/ceil/sqrt of non-negative inputs,
/// small-exponent integer power, `sin(0)=0`, `cos(0)=1`).
fn fold_pure_call(instr: &Instr) -> Option<Value> {
    let callee = instr.callee.as_deref()?;
    if il_runtime::registry().lookup(callee)?.effect != il_runtime::Effect::Pure {
        return None;
    }
    match (callee, instr.operands.as_slice()) {
        ("rt_abs_i64", [Value::ConstInt(v, ty)]) => Some(Value::ConstInt(v.wrapping_abs(), *ty)),
        ("rt_abs_f64", [Value::ConstFloat(v)]) => Some(Value::ConstFloat(v.abs())),
        ("rt_floor", [Value::ConstFloat(v)]) if *v >= 0.0 => Some(Value::ConstFloat(v.floor())),
        ("rt_ceil", [Value::ConstFloat(v)]) if *v >= 0.0 => Some(Value::ConstFloat(v.ceil())),
        ("rt_sqr", [Value::ConstFloat(v)]) if *v >= 0.0 => Some(Value::ConstFloat(v.sqrt())),
        ("rt_pow", [Value::ConstFloat(base), Value::ConstFloat(exp)])
            if *exp >= 0.0 && exp.fract() == 0.0 && *exp <= 16.0 =>
        {
            Some(Value::ConstFloat(base.powi(*exp as i32)))
        }
        ("rt_sin", [Value::ConstFloat(v)]) if *v == 0.0 => Some(Value::ConstFloat(0.0)),
        ("rt_cos", [Value::ConstFloat(v)]) if *v == 0.0 => Some(Value::ConstFloat(1.0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use il_core::{BasicBlock, Opcode};

    #[test]
    fn folds_integer_arithmetic_chain() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::Add)
                .with_result(0, Type::I64)
                .with_operands(vec![Value::ConstInt(2, Type::I64), Value::ConstInt(3, Type::I64)]),
        );
        entry.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        f.blocks = vec![entry];
        assert!(run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs.len(), 1);
        assert_eq!(f.blocks[0].instrs[0].operands[0], Value::ConstInt(5, Type::I64));
    }

    #[test]
    fn does_not_fold_division_by_constant_zero() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::SDiv)
                .with_result(0, Type::I64)
                .with_operands(vec![Value::ConstInt(10, Type::I64), Value::ConstInt(0, Type::I64)]),
        );
        entry.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        f.blocks = vec![entry];
        assert!(!run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs.len(), 2);
    }

    #[test]
    fn folds_abs_of_negative_five() {
        let mut f = Function::new("main", Type::I64);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::Call)
                .with_result(0, Type::I64)
                .with_callee("rt_abs_i64")
                .with_operands(vec![Value::ConstInt(-5, Type::I64)]),
        );
        entry.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I64)]));
        f.blocks = vec![entry];
        assert!(run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs[0].operands[0], Value::ConstInt(5, Type::I64));
    }

    #[test]
    fn i1_arithmetic_wraps_modulo_two() {
        let mut f = Function::new("main", Type::I1);
        let mut entry = BasicBlock::new("entry");
        entry.push(
            Instr::new(Opcode::Add)
                .with_result(0, Type::I1)
                .with_operands(vec![Value::ConstInt(1, Type::I1), Value::ConstInt(1, Type::I1)]),
        );
        entry.push(Instr::new(Opcode::Ret).with_operands(vec![Value::Temp(0, Type::I1)]));
        f.blocks = vec![entry];
        assert!(run_on_function(&mut f));
        assert_eq!(f.blocks[0].instrs[0].operands[0], Value::ConstInt(0, Type::I1));
    }
}
