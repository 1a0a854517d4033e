//! Statement lowering (§4.9.5): `IF`/`FOR`/`WHILE` block-chaining,
//! `GOTO`/label resolution, and the runtime-backed `PRINT`/`INPUT`/`DIM`
//! statements.

use il_core::{Instr, Opcode, Type, Value};

use crate::ast::{AssignTarget, BasicType, ExprKind, ExpressionAst, StatementAst, StmtKind, UnOp};
use crate::context::{to_il_type, LoweringContext};
use crate::expr::lower_expr;

pub fn lower_stmts(ctx: &mut LoweringContext, stmts: &[Box<dyn StatementAst>]) {
    for stmt in stmts {
        ctx.ensure_open();
        lower_stmt(ctx, stmt.as_ref());
    }
}

fn lower_stmt(ctx: &mut LoweringContext, stmt: &dyn StatementAst) {
    ctx.cur_loc = stmt.loc();
    match stmt.kind().clone() {
        StmtKind::Let(AssignTarget::Var(name)) => {
            let value = lower_expr(ctx, stmt.exprs()[0]);
            let slot = ctx.slots[&name].clone();
            ctx.store(&slot, value);
        }
        StmtKind::Let(AssignTarget::Index(name)) => {
            let exprs = stmt.exprs();
            let index = lower_expr(ctx, exprs[0]);
            let value = lower_expr(ctx, exprs[1]);
            let elem_ty = ctx.scan.arrays[&name];
            let slot = ctx.array_slots[&name].clone();
            let helper = if elem_ty == BasicType::Int { "rt_arr_set_i64" } else { "rt_arr_set_f64" };
            ctx.call_void(helper, vec![slot, index, value]);
        }
        StmtKind::Print => {
            for e in stmt.exprs() {
                let v = lower_expr(ctx, e);
                let helper = match v.ty() {
                    Type::Str => "rt_print_str",
                    Type::F64 => "rt_print_f64",
                    _ => "rt_print_i64",
                };
                ctx.call_void(helper, vec![v]);
            }
        }
        StmtKind::Input { var } => {
            let line = ctx.call("rt_input_line", Type::Str, vec![]);
            let ty = to_il_type(ctx.scan.variables[&var]);
            let value = match ty {
                Type::Str => line,
                Type::F64 => ctx.call("rt_str_to_float", Type::F64, vec![line]),
                _ => ctx.call("rt_str_to_int", Type::I64, vec![line]),
            };
            let slot = ctx.slots[&var].clone();
            ctx.store(&slot, value);
        }
        StmtKind::If => lower_if(ctx, stmt),
        StmtKind::For { var, has_step } => lower_for(ctx, stmt, &var, has_step),
        StmtKind::While => lower_while(ctx, stmt),
        StmtKind::Goto(target) => {
            let target_blk = ctx.labels[&target];
            ctx.br(target_blk, vec![]);
        }
        StmtKind::Label(target) => {
            let target_blk = ctx.labels[&target];
            if !ctx.is_terminated() {
                ctx.br(target_blk, vec![]);
            }
            ctx.switch_to(target_blk);
        }
        StmtKind::Dim { var, elem_ty } => {
            let size = lower_expr(ctx, stmt.exprs()[0]);
            let helper = if elem_ty == BasicType::Int { "rt_arr_alloc_i64" } else { "rt_arr_alloc_f64" };
            let ptr = ctx.call(helper, Type::Ptr, vec![size]);
            let slot = ctx.array_slots[&var].clone();
            ctx.store(&slot, ptr);
        }
        StmtKind::Return => {
            let exprs = stmt.exprs();
            if let Some(e) = exprs.first() {
                let value = lower_expr(ctx, *e);
                ctx.push(Instr::new(Opcode::Ret).with_operands(vec![value]));
            } else {
                ctx.push(Instr::new(Opcode::Ret));
            }
        }
        StmtKind::ExprStmt => {
            for e in stmt.exprs() {
                lower_expr(ctx, e);
            }
        }
    }
}

/// `IF cond1 THEN ... ELSEIF cond2 THEN ... ELSE ... END IF`: each
/// condition gets its own check block, chaining into the next check (or
/// the `ELSE` arm) on failure; every arm that falls off its own end
/// branches into a single shared `join` block.
fn lower_if(ctx: &mut LoweringContext, stmt: &dyn StatementAst) {
    let conditions = stmt.exprs();
    let arms = stmt.arms();
    let join = ctx.new_block("if_join");
    let mut join_reachable = false;

    for (i, cond) in conditions.iter().enumerate() {
        let cond_val = lower_expr(ctx, *cond);
        let then_blk = ctx.new_block("if_then");
        let next_blk = if i + 1 < conditions.len() { ctx.new_block("if_check") } else { ctx.new_block("if_else") };
        ctx.cbr(cond_val, then_blk, vec![], next_blk, vec![]);

        ctx.switch_to(then_blk);
        lower_stmts(ctx, arms[i]);
        if !ctx.is_terminated() {
            ctx.br(join, vec![]);
            join_reachable = true;
        }

        ctx.switch_to(next_blk);
    }

    lower_stmts(ctx, arms[conditions.len()]);
    if !ctx.is_terminated() {
        ctx.br(join, vec![]);
        join_reachable = true;
    }

    ctx.switch_to(join);
    // Every arm returned/jumped away: `join` has no predecessors. Trap it
    // rather than leaving it open, so a trailing `IF` whose arms all
    // `RETURN` is correctly seen as terminated by the caller (matches
    // `scan::always_returns`'s structural acceptance of that shape).
    if !join_reachable {
        ctx.push(Instr::new(Opcode::Trap));
    }
}

/// `WHILE cond ... WEND`: re-evaluates `cond` from a dedicated check
/// block on every iteration, reading loop-carried variables back out of
/// their stack slots (no block parameters needed).
fn lower_while(ctx: &mut LoweringContext, stmt: &dyn StatementAst) {
    let arms = stmt.arms();
    let check = ctx.new_block("while_check");
    ctx.br(check, vec![]);

    ctx.switch_to(check);
    let cond_val = lower_expr(ctx, stmt.exprs()[0]);
    let body = ctx.new_block("while_body");
    let exit = ctx.new_block("while_exit");
    ctx.cbr(cond_val, body, vec![], exit, vec![]);

    ctx.switch_to(body);
    lower_stmts(ctx, arms[0]);
    if !ctx.is_terminated() {
        ctx.br(check, vec![]);
    }

    ctx.switch_to(exit);
}

/// `FOR var = start TO end [STEP step] ... NEXT`: a preheader computes
/// `start`/`end`/`step` once; the header carries the induction value as
/// a block parameter rather than re-reading the variable's slot, and
/// also writes it back to the slot so ordinary `Var` reads inside the
/// body see it. The exit test depends on `step`'s sign: `ind <= end`
/// when ascending, `ind >= end` when descending. When `step` is a
/// literal its sign is known while lowering, so only the taken branch
/// is ever emitted; a non-literal step instead checks its sign at
/// runtime on every iteration.
fn lower_for(ctx: &mut LoweringContext, stmt: &dyn StatementAst, var: &str, has_step: bool) {
    let exprs = stmt.exprs();
    let arms = stmt.arms();
    let ty = to_il_type(ctx.scan.variables[var]);

    let start_val = lower_expr(ctx, exprs[0]);
    let end_val = lower_expr(ctx, exprs[1]);
    let step_val = if has_step {
        lower_expr(ctx, exprs[2])
    } else if ty == Type::F64 {
        Value::ConstFloat(1.0)
    } else {
        Value::ConstInt(1, ty)
    };
    let known_sign = if has_step { literal_sign(exprs[2]) } else { Some(true) };

    let header = ctx.new_block("for_header");
    let ind_id = ctx.add_block_param(header, ty);
    ctx.br(header, vec![start_val]);

    ctx.switch_to(header);
    let ind_val = Value::Temp(ind_id, ty);
    let var_slot = ctx.slots[var].clone();
    ctx.store(&var_slot, ind_val.clone());

    let cmp_val = match known_sign {
        Some(true) => cmp_le(ctx, ind_val.clone(), end_val.clone(), ty),
        Some(false) => cmp_ge(ctx, ind_val.clone(), end_val.clone(), ty),
        None => dynamic_sign_cmp(ctx, ind_val.clone(), end_val.clone(), step_val.clone(), ty),
    };

    let body = ctx.new_block("for_body");
    let exit = ctx.new_block("for_exit");
    ctx.cbr(cmp_val, body, vec![], exit, vec![]);

    ctx.switch_to(body);
    lower_stmts(ctx, arms[0]);
    if !ctx.is_terminated() {
        let cur = ctx.load(&var_slot, ty);
        let next = add_step(ctx, cur, step_val, ty);
        ctx.br(header, vec![next]);
    }

    ctx.switch_to(exit);
}

/// Whether `e` is a literal (or negation of one) whose sign is known
/// without emitting anything; used to skip the dynamic sign check for
/// the overwhelmingly common `STEP 1` / `STEP -1` / no-`STEP` cases.
fn literal_sign(e: &dyn ExpressionAst) -> Option<bool> {
    match e.kind() {
        ExprKind::IntLit(v) => Some(*v >= 0),
        ExprKind::FloatLit(s) => s.parse::<f64>().ok().map(|v| v >= 0.0),
        ExprKind::Unary(UnOp::Neg) => literal_sign(e.children()[0]).map(|positive| !positive),
        _ => None,
    }
}

fn cmp_le(ctx: &mut LoweringContext, lhs: Value, rhs: Value, ty: Type) -> Value {
    let opcode = if ty == Type::F64 { Opcode::FCmpLe } else { Opcode::ICmpSle };
    let id = ctx.fresh_id();
    ctx.push(Instr::new(opcode).with_result(id, Type::I1).with_operands(vec![lhs, rhs]));
    Value::Temp(id, Type::I1)
}

fn cmp_ge(ctx: &mut LoweringContext, lhs: Value, rhs: Value, ty: Type) -> Value {
    let opcode = if ty == Type::F64 { Opcode::FCmpGe } else { Opcode::ICmpSge };
    let id = ctx.fresh_id();
    ctx.push(Instr::new(opcode).with_result(id, Type::I1).with_operands(vec![lhs, rhs]));
    Value::Temp(id, Type::I1)
}

fn dynamic_sign_cmp(ctx: &mut LoweringContext, ind: Value, end: Value, step: Value, ty: Type) -> Value {
    let zero = if ty == Type::F64 { Value::ConstFloat(0.0) } else { Value::ConstInt(0, ty) };
    let nonneg = cmp_ge(ctx, step, zero, ty);

    let pos_blk = ctx.new_block("for_check_pos");
    let neg_blk = ctx.new_block("for_check_neg");
    let merge_blk = ctx.new_block("for_check_merge");
    let merge_id = ctx.add_block_param(merge_blk, Type::I1);
    ctx.cbr(nonneg, pos_blk, vec![], neg_blk, vec![]);

    ctx.switch_to(pos_blk);
    let le = cmp_le(ctx, ind.clone(), end.clone(), ty);
    ctx.br(merge_blk, vec![le]);

    ctx.switch_to(neg_blk);
    let ge = cmp_ge(ctx, ind, end, ty);
    ctx.br(merge_blk, vec![ge]);

    ctx.switch_to(merge_blk);
    Value::Temp(merge_id, Type::I1)
}

fn add_step(ctx: &mut LoweringContext, lhs: Value, rhs: Value, ty: Type) -> Value {
    let opcode = if ty == Type::F64 { Opcode::FAdd } else { Opcode::Add };
    let id = ctx.fresh_id();
    ctx.push(Instr::new(opcode).with_result(id, ty).with_operands(vec![lhs, rhs]));
    Value::Temp(id, ty)
}
