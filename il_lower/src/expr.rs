//! Expression lowering (§4.9.4): dispatch on `ExprKind`, one rule per
//! case, mirroring the statement-lowering split in `stmt.rs`.

use il_core::{Instr, Opcode, Type, Value};

use crate::ast::{BasicType, BinOp, BuiltinId, ExprKind, ExpressionAst, UnOp};
use crate::context::{to_il_type, LoweringContext};

/// Lowers `expr`, emitting into the context's current block, and returns
/// the `Value` holding its result.
pub fn lower_expr(ctx: &mut LoweringContext, expr: &dyn ExpressionAst) -> Value {
    ctx.cur_loc = expr.loc();
    match expr.kind().clone() {
        ExprKind::IntLit(v) => Value::ConstInt(v, Type::I64),
        ExprKind::FloatLit(s) => {
            Value::ConstFloat(s.parse().unwrap_or_else(|_| panic!("float literal `{s}` was not validated by semantic analysis")))
        }
        ExprKind::StrLit(s) => Value::ConstStr(s),
        ExprKind::Var(name) => {
            let ty = to_il_type(ctx.scan.variables[&name]);
            let slot = ctx.slots[&name].clone();
            ctx.load(&slot, ty)
        }
        ExprKind::Index(name) => {
            let children = expr.children();
            let index = lower_expr(ctx, children[0]);
            let elem_ty = ctx.scan.arrays[&name];
            let slot = ctx.array_slots[&name].clone();
            let helper = if elem_ty == BasicType::Int { "rt_arr_get_i64" } else { "rt_arr_get_f64" };
            ctx.call(helper, to_il_type(elem_ty), vec![slot, index])
        }
        ExprKind::Unary(op) => lower_unary(ctx, op, expr.children()[0]),
        ExprKind::Binary(op) => lower_binary(ctx, op, expr.children()[0], expr.children()[1]),
        ExprKind::Call(name) => lower_call(ctx, &name, &expr.children()),
        ExprKind::Builtin(id) => lower_builtin(ctx, id, &expr.children()),
    }
}

fn lower_unary(ctx: &mut LoweringContext, op: UnOp, operand: &dyn ExpressionAst) -> Value {
    let v = lower_expr(ctx, operand);
    match op {
        // There is no dedicated negate opcode; `-x` is `0 - x` / `0.0 - x`.
        UnOp::Neg => {
            let ty = v.ty();
            let (opcode, zero) =
                if ty == Type::F64 { (Opcode::FSub, Value::ConstFloat(0.0)) } else { (Opcode::Sub, Value::ConstInt(0, ty)) };
            let id = ctx.fresh_id();
            ctx.push(Instr::new(opcode).with_result(id, ty).with_operands(vec![zero, v]));
            Value::Temp(id, ty)
        }
        UnOp::Not => {
            let id = ctx.fresh_id();
            ctx.push(Instr::new(Opcode::Xor).with_result(id, Type::I1).with_operands(vec![v, Value::ConstInt(1, Type::I1)]));
            Value::Temp(id, Type::I1)
        }
    }
}

fn lower_binary(ctx: &mut LoweringContext, op: BinOp, lhs_e: &dyn ExpressionAst, rhs_e: &dyn ExpressionAst) -> Value {
    if matches!(op, BinOp::And | BinOp::Or) {
        return lower_short_circuit(ctx, op, lhs_e, rhs_e);
    }

    let lhs = lower_expr(ctx, lhs_e);
    let rhs = lower_expr(ctx, rhs_e);

    if lhs.ty() == Type::Str || rhs.ty() == Type::Str {
        return lower_string_binary(ctx, op, lhs, rhs);
    }

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => lower_arith(ctx, op, lhs, rhs),
        BinOp::IDiv | BinOp::Mod => lower_int_div(ctx, op, lhs, rhs),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => lower_numeric_cmp(ctx, op, lhs, rhs),
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops return above"),
    }
}

/// Promotes `lhs`/`rhs` to `f64` if either is already `f64`; otherwise
/// leaves both as-is. Returns the (possibly promoted) pair and whether
/// promotion happened.
fn promote_numeric(ctx: &mut LoweringContext, lhs: Value, rhs: Value) -> (Value, Value, bool) {
    if lhs.ty() != Type::F64 && rhs.ty() != Type::F64 {
        return (lhs, rhs, false);
    }
    (to_float(ctx, lhs), to_float(ctx, rhs), true)
}

fn to_float(ctx: &mut LoweringContext, v: Value) -> Value {
    if v.ty() == Type::F64 {
        return v;
    }
    let id = ctx.fresh_id();
    ctx.push(Instr::new(Opcode::Sitofp).with_result(id, Type::F64).with_operands(vec![v]));
    Value::Temp(id, Type::F64)
}

fn lower_arith(ctx: &mut LoweringContext, op: BinOp, lhs: Value, rhs: Value) -> Value {
    let (lhs, rhs, is_float) = promote_numeric(ctx, lhs, rhs);
    if is_float {
        let opcode = match op {
            BinOp::Add => Opcode::FAdd,
            BinOp::Sub => Opcode::FSub,
            BinOp::Mul => Opcode::FMul,
            BinOp::Div => Opcode::FDiv,
            _ => unreachable!(),
        };
        let id = ctx.fresh_id();
        ctx.push(Instr::new(opcode).with_result(id, Type::F64).with_operands(vec![lhs, rhs]));
        return Value::Temp(id, Type::F64);
    }
    let ty = lhs.ty();
    if op == BinOp::Div {
        emit_divisor_zero_trap(ctx, &rhs);
        let id = ctx.fresh_id();
        ctx.push(Instr::new(Opcode::SDiv).with_result(id, ty).with_operands(vec![lhs, rhs]));
        return Value::Temp(id, ty);
    }
    let opcode = match op {
        BinOp::Add => Opcode::Add,
        BinOp::Sub => Opcode::Sub,
        BinOp::Mul => Opcode::Mul,
        _ => unreachable!(),
    };
    let id = ctx.fresh_id();
    ctx.push(Instr::new(opcode).with_result(id, ty).with_operands(vec![lhs, rhs]));
    Value::Temp(id, ty)
}

/// `\` and `MOD`: integer-only, no promotion (§4.9.4). Both trap on a
/// zero divisor.
fn lower_int_div(ctx: &mut LoweringContext, op: BinOp, lhs: Value, rhs: Value) -> Value {
    emit_divisor_zero_trap(ctx, &rhs);
    let ty = lhs.ty();
    let opcode = if op == BinOp::IDiv { Opcode::SDiv } else { Opcode::SRem };
    let id = ctx.fresh_id();
    ctx.push(Instr::new(opcode).with_result(id, ty).with_operands(vec![lhs, rhs]));
    Value::Temp(id, ty)
}

/// Emits `if divisor == 0 { rt_trap(...) }` ahead of an integer division
/// or modulo; `rt_trap` never returns, so its block ends in `trap` rather
/// than falling through.
fn emit_divisor_zero_trap(ctx: &mut LoweringContext, divisor: &Value) {
    let ty = divisor.ty();
    let cmp_id = ctx.fresh_id();
    ctx.push(Instr::new(Opcode::ICmpEq).with_result(cmp_id, Type::I1).with_operands(vec![divisor.clone(), Value::ConstInt(0, ty)]));

    let trap_blk = ctx.new_block("div_trap");
    let cont_blk = ctx.new_block("div_ok");
    ctx.cbr(Value::Temp(cmp_id, Type::I1), trap_blk, vec![], cont_blk, vec![]);

    ctx.switch_to(trap_blk);
    ctx.call_void("rt_trap", vec![Value::ConstStr("division by zero".to_string())]);
    ctx.push(Instr::new(Opcode::Trap));

    ctx.switch_to(cont_blk);
}

fn lower_numeric_cmp(ctx: &mut LoweringContext, op: BinOp, lhs: Value, rhs: Value) -> Value {
    let (lhs, rhs, is_float) = promote_numeric(ctx, lhs, rhs);
    let opcode = if is_float {
        match op {
            BinOp::Eq => Opcode::FCmpEq,
            BinOp::Ne => Opcode::FCmpNe,
            BinOp::Lt => Opcode::FCmpLt,
            BinOp::Le => Opcode::FCmpLe,
            BinOp::Gt => Opcode::FCmpGt,
            BinOp::Ge => Opcode::FCmpGe,
            _ => unreachable!(),
        }
    } else {
        match op {
            BinOp::Eq => Opcode::ICmpEq,
            BinOp::Ne => Opcode::ICmpNe,
            BinOp::Lt => Opcode::ICmpSlt,
            BinOp::Le => Opcode::ICmpSle,
            BinOp::Gt => Opcode::ICmpSgt,
            BinOp::Ge => Opcode::ICmpSge,
            _ => unreachable!(),
        }
    };
    let id = ctx.fresh_id();
    ctx.push(Instr::new(opcode).with_result(id, Type::I1).with_operands(vec![lhs, rhs]));
    Value::Temp(id, Type::I1)
}

/// `+` is concatenation for strings; the rest compare via `rt_str_eq`
/// (equality) or `rt_str_cmp` (ordering, which returns a signed `i64`
/// lexicographic order and is then compared against zero).
fn lower_string_binary(ctx: &mut LoweringContext, op: BinOp, lhs: Value, rhs: Value) -> Value {
    match op {
        BinOp::Add => ctx.call("rt_concat", Type::Str, vec![lhs, rhs]),
        BinOp::Eq => ctx.call("rt_str_eq", Type::I1, vec![lhs, rhs]),
        BinOp::Ne => {
            let eq = ctx.call("rt_str_eq", Type::I1, vec![lhs, rhs]);
            let id = ctx.fresh_id();
            ctx.push(Instr::new(Opcode::Xor).with_result(id, Type::I1).with_operands(vec![eq, Value::ConstInt(1, Type::I1)]));
            Value::Temp(id, Type::I1)
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let cmp = ctx.call("rt_str_cmp", Type::I64, vec![lhs, rhs]);
            let opcode = match op {
                BinOp::Lt => Opcode::ICmpSlt,
                BinOp::Le => Opcode::ICmpSle,
                BinOp::Gt => Opcode::ICmpSgt,
                BinOp::Ge => Opcode::ICmpSge,
                _ => unreachable!(),
            };
            let id = ctx.fresh_id();
            ctx.push(Instr::new(opcode).with_result(id, Type::I1).with_operands(vec![cmp, Value::ConstInt(0, Type::I64)]));
            Value::Temp(id, Type::I1)
        }
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::IDiv | BinOp::Mod | BinOp::And | BinOp::Or => {
            unreachable!("only `+` and comparisons apply to strings; semantic analysis rejects the rest")
        }
    }
}

/// `AND`/`OR` short-circuit (§4.9.4): the right operand is only
/// evaluated in a side block, with the result joined through an `i1`
/// block parameter rather than a phi node.
fn lower_short_circuit(ctx: &mut LoweringContext, op: BinOp, lhs_e: &dyn ExpressionAst, rhs_e: &dyn ExpressionAst) -> Value {
    let lhs = lower_expr(ctx, lhs_e);

    let rhs_blk = ctx.new_block("logic_rhs");
    let join_blk = ctx.new_block("logic_join");
    let join_id = ctx.add_block_param(join_blk, Type::I1);

    match op {
        BinOp::And => ctx.cbr(lhs, rhs_blk, vec![], join_blk, vec![Value::ConstInt(0, Type::I1)]),
        BinOp::Or => ctx.cbr(lhs, join_blk, vec![Value::ConstInt(1, Type::I1)], rhs_blk, vec![]),
        _ => unreachable!(),
    }

    ctx.switch_to(rhs_blk);
    let rhs = lower_expr(ctx, rhs_e);
    ctx.br(join_blk, vec![rhs]);

    ctx.switch_to(join_blk);
    Value::Temp(join_id, Type::I1)
}

fn lower_call(ctx: &mut LoweringContext, name: &str, args: &[&dyn ExpressionAst]) -> Value {
    let arg_vals: Vec<Value> = args.iter().map(|a| lower_expr(ctx, *a)).collect();
    let ret_ty = *ctx
        .declared_ret
        .get(name)
        .unwrap_or_else(|| panic!("call to undeclared procedure `{name}` should have been rejected by semantic analysis"));
    let id = ctx.fresh_id();
    ctx.push(Instr::new(Opcode::Call).with_callee(name).with_result(id, ret_ty).with_operands(arg_vals));
    Value::Temp(id, ret_ty)
}

fn lower_builtin(ctx: &mut LoweringContext, id: BuiltinId, args: &[&dyn ExpressionAst]) -> Value {
    let arg_basic_ty = args.first().map(|a| a.ty()).unwrap_or(BasicType::Int);
    let arg_vals: Vec<Value> = args.iter().map(|a| lower_expr(ctx, *a)).collect();
    let helper = id.helper_name(arg_basic_ty);
    let ret_ty = match id {
        BuiltinId::Abs => to_il_type(arg_basic_ty),
        BuiltinId::Len | BuiltinId::Rnd => Type::I64,
        BuiltinId::Sqr | BuiltinId::Floor | BuiltinId::Ceil | BuiltinId::Pow | BuiltinId::Sin | BuiltinId::Cos => Type::F64,
    };
    ctx.call(helper, ret_ty, arg_vals)
}
