//! BASIC-AST-to-IL lowering (§4.9): turns a frontend-supplied AST,
//! behind the read-only contract in `ast.rs`, into an `il_core::Module`.
//!
//! Lowering runs in two passes per procedure: `scan` (§4.9.3) walks the
//! body once with no emission to collect the variables, arrays, runtime
//! helpers and `GOTO` labels it references, then `context`/`expr`/`stmt`
//! emit the IL proper. Lowering assumes its input AST already passed
//! semantic analysis; an internal inconsistency here (an unresolved
//! `GOTO`, a call to an undeclared procedure) is lowering's own bug, not
//! a user error, and is reported the same way as any other `Diag`.

mod ast;
mod block_namer;
mod context;
mod expr;
#[cfg(test)]
pub(crate) mod fixtures;
mod scan;
mod stmt;

pub use ast::{
    AssignTarget, BasicType, BinOp, BuiltinId, ExprKind, ExpressionAst, GotoTarget, ProcedureAst, ProcedureKind,
    StatementAst, StmtKind, UnOp,
};
pub use context::to_il_type;
pub use scan::{scan_procedure, var_type_from_suffix, ScanInfo};

use std::collections::BTreeMap;

use il_core::{Extern, Module, Param, Type};
use il_support::{Diag, Expected};

use context::{HelperUse, LoweringContext};

const IL_VERSION: &str = "0.1.2";

/// Lowers a whole BASIC program — every declared `FUNCTION`/`SUB` plus
/// the synthetic `ProcedureKind::Main` top-level body — to one `Module`.
/// Declares exactly the runtime externs actually used (§4.9.2).
pub fn lower_program(procs: &[Box<dyn ProcedureAst>]) -> Expected<Module> {
    log::debug!("lowering program: {} procedure(s)", procs.len());
    let declared_ret = collect_declared_return_types(procs);
    let mut module = Module::new(IL_VERSION);
    let mut helpers = HelperUse::default();

    for proc in procs {
        log::trace!("lowering stage: procedure `{}`", proc.name());
        let function = lower_procedure(proc.as_ref(), &mut helpers, &declared_ret)?;
        module.add_function(function);
    }

    log::trace!("lowering stage: declaring {} runtime extern(s)", helpers.names.len());
    for name in &helpers.names {
        let sig = il_runtime::lookup(name)
            .unwrap_or_else(|| panic!("helper `{name}` was requested by lowering but is absent from the runtime registry"));
        module.add_extern(Extern::new(*name, sig.ret, sig.params.clone()));
    }

    log::debug!("lowering finished: {} function(s), {} extern(s)", module.functions.len(), module.externs.len());
    Ok(module)
}

fn collect_declared_return_types(procs: &[Box<dyn ProcedureAst>]) -> BTreeMap<String, Type> {
    procs
        .iter()
        .map(|proc| {
            let ret_ty = match proc.ret_ty() {
                Some(basic_ty) => to_il_type(basic_ty),
                None => Type::Void,
            };
            (proc.name().to_string(), ret_ty)
        })
        .collect()
}

fn lower_procedure(
    proc: &dyn ProcedureAst,
    helpers: &mut HelperUse,
    declared_ret: &BTreeMap<String, Type>,
) -> Expected<il_core::Function> {
    let scan = scan_procedure(proc)?;
    log::trace!(
        "scan of `{}`: {} variable(s), {} array(s), {} label(s)",
        proc.name(),
        scan.variables.len(),
        scan.arrays.len(),
        scan.labels.len()
    );

    let il_name = if proc.kind() == ProcedureKind::Main { "main".to_string() } else { proc.name().to_string() };
    let ret_ty = *declared_ret.get(proc.name()).unwrap_or(&Type::Void);
    let params: Vec<Param> = proc.params().iter().map(|(name, ty)| Param::new(name.clone(), to_il_type(*ty))).collect();

    let mut ctx = LoweringContext::new(helpers, declared_ret, scan, il_name, ret_ty, params);

    allocate_slots(&mut ctx);
    declare_labels(&mut ctx);
    bind_incoming_params(&mut ctx, proc);

    stmt::lower_stmts(&mut ctx, proc.body());
    if !ctx.is_terminated() {
        if ret_ty == Type::Void {
            ctx.push(il_core::Instr::new(il_core::Opcode::Ret));
        } else {
            return Err(Diag::error(format!("function `{}` falls through without a RETURN", proc.name()))
                .with_loc(proc.loc())
                .with_code("lower-no-return"));
        }
    }

    Ok(ctx.function)
}

/// One stack slot per scanned scalar variable and one (pointer-typed)
/// slot per scanned array, all allocated up front in the entry block
/// (§4.9.3). `mem2reg` later promotes away any slot whose address is
/// never taken.
fn allocate_slots(ctx: &mut LoweringContext) {
    let var_names: Vec<String> = ctx.scan.variables.keys().cloned().collect();
    for name in var_names {
        let slot = ctx.alloc_slot();
        ctx.slots.insert(name, slot);
    }
    let array_names: Vec<String> = ctx.scan.arrays.keys().cloned().collect();
    for name in array_names {
        let slot = ctx.alloc_slot();
        ctx.array_slots.insert(name, slot);
    }
}

/// Pre-allocates one block per scanned label before any statement is
/// emitted, so a forward `GOTO` can resolve to a valid block index
/// before the `Label` statement that defines it is reached.
fn declare_labels(ctx: &mut LoweringContext) {
    let labels: Vec<_> = ctx.scan.labels.iter().cloned().collect();
    for target in labels {
        let idx = ctx.new_block("label");
        ctx.labels.insert(target, idx);
    }
}

/// Stores each incoming parameter's entry-block value into its stack
/// slot, so the body's uniform slot-load/slot-store model (`Var`
/// lookups, `mem2reg`) applies to parameters exactly like locals.
fn bind_incoming_params(ctx: &mut LoweringContext, proc: &dyn ProcedureAst) {
    for (i, (name, _)) in proc.params().iter().enumerate() {
        let entry_param = &ctx.function.blocks[0].params[i];
        let value = il_core::Value::Temp(entry_param.id, entry_param.ty);
        let slot = ctx.slots[name].clone();
        ctx.store(&slot, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, BuiltinId, GotoTarget, UnOp};
    use crate::fixtures::*;
    use il_core::Opcode;

    fn procs(list: Vec<Proc>) -> Vec<Box<dyn ProcedureAst>> {
        list.into_iter().map(|p| Box::new(p) as Box<dyn ProcedureAst>).collect()
    }

    #[test]
    fn straight_line_program_lowers_to_one_block_and_declares_print_extern() {
        let main = Proc::main(vec![
            let_var("X", Expr::binary(BinOp::Add, BasicType::Int, Expr::int(1), Expr::int(2))),
            print(vec![Expr::var("X", BasicType::Int)]),
        ]);
        let module = lower_program(&procs(vec![main])).unwrap();

        let main_fn = module.find_function("main").unwrap();
        assert_eq!(main_fn.blocks.len(), 1, "no branches means everything stays in the entry block");
        assert!(module.find_extern("rt_print_i64").is_some());
        assert!(main_fn.blocks[0].instrs.last().unwrap().opcode == Opcode::Ret);
    }

    #[test]
    fn if_else_joins_both_arms_into_a_single_block() {
        let main = Proc::main(vec![if_stmt(
            vec![Expr::binary(BinOp::Gt, BasicType::Int, Expr::var("X", BasicType::Int), Expr::int(0))],
            vec![
                vec![print(vec![Expr::string("positive")])],
                vec![print(vec![Expr::string("non-positive")])],
            ],
        )]);
        let module = lower_program(&procs(vec![main])).unwrap();
        let main_fn = module.find_function("main").unwrap();

        // entry, if_join, if_then, if_else = 4 blocks; both arms fall
        // through so if_join is reachable and carries the trailing `ret`.
        assert_eq!(main_fn.blocks.len(), 4);
        let join = main_fn.blocks.iter().find(|b| b.label == "if_join.0").unwrap();
        assert_eq!(join.terminator().unwrap().opcode, Opcode::Ret);
    }

    #[test]
    fn function_whose_every_if_arm_returns_is_accepted_and_traps_the_dead_join() {
        let f = Proc::function(
            "Sign",
            vec![("N", BasicType::Int)],
            BasicType::Int,
            vec![if_stmt(
                vec![Expr::binary(BinOp::Lt, BasicType::Int, Expr::var("N", BasicType::Int), Expr::int(0))],
                vec![
                    vec![return_stmt(Some(Expr::int(-1)))],
                    vec![return_stmt(Some(Expr::int(1)))],
                ],
            )],
        );
        let module = lower_program(&procs(vec![f])).unwrap();
        let sign_fn = module.find_function("Sign").unwrap();
        let join = sign_fn.blocks.iter().find(|b| b.label == "if_join.0").unwrap();
        assert_eq!(join.terminator().unwrap().opcode, Opcode::Trap, "unreachable join must still be closed off");
    }

    #[test]
    fn function_with_a_fallthrough_path_is_rejected() {
        let f = Proc::function(
            "Bad",
            vec![],
            BasicType::Int,
            vec![if_stmt(
                vec![Expr::int(1)],
                vec![vec![return_stmt(Some(Expr::int(1)))], vec![]],
            )],
        );
        let err = lower_program(&procs(vec![f])).unwrap_err();
        assert_eq!(err.code, Some("lower-no-return"));
    }

    #[test]
    fn for_loop_carries_the_induction_value_as_a_block_parameter() {
        let main = Proc::main(vec![for_stmt(
            "I",
            Expr::int(1),
            Expr::int(10),
            None,
            vec![print(vec![Expr::var("I", BasicType::Int)])],
        )]);
        let module = lower_program(&procs(vec![main])).unwrap();
        let main_fn = module.find_function("main").unwrap();
        let header = main_fn.blocks.iter().find(|b| b.label == "for_header.0").unwrap();
        assert_eq!(header.params.len(), 1);
        assert_eq!(header.params[0].ty, Type::I64);
    }

    #[test]
    fn negative_literal_step_skips_the_dynamic_sign_check() {
        let main = Proc::main(vec![for_stmt(
            "I",
            Expr::int(10),
            Expr::int(1),
            Some(Expr::unary(UnOp::Neg, BasicType::Int, Expr::int(1))),
            vec![print(vec![Expr::var("I", BasicType::Int)])],
        )]);
        let module = lower_program(&procs(vec![main])).unwrap();
        let main_fn = module.find_function("main").unwrap();
        assert!(main_fn.blocks.iter().all(|b| !b.label.starts_with("for_check_")));
    }

    #[test]
    fn goto_resolves_to_a_forward_label() {
        let main = Proc::main(vec![
            goto_(GotoTarget::Label("SKIP".to_string())),
            print(vec![Expr::string("never")]),
            label(GotoTarget::Label("SKIP".to_string())),
            print(vec![Expr::string("here")]),
        ]);
        let module = lower_program(&procs(vec![main])).unwrap();
        let main_fn = module.find_function("main").unwrap();
        let entry_term = main_fn.blocks[0].terminator().unwrap();
        assert_eq!(entry_term.opcode, Opcode::Br);
        assert_eq!(entry_term.successors[0], "label.0");
    }

    #[test]
    fn array_roundtrip_declares_bounds_checked_helpers() {
        let main = Proc::main(vec![
            dim("NUMS", BasicType::Int, Expr::int(10)),
            let_index("NUMS", Expr::int(0), Expr::int(42)),
            print(vec![Expr::index("NUMS", BasicType::Int, Expr::int(0))]),
        ]);
        let module = lower_program(&procs(vec![main])).unwrap();
        for name in ["rt_arr_alloc_i64", "rt_arr_set_i64", "rt_arr_get_i64"] {
            assert!(module.find_extern(name).is_some(), "missing extern {name}");
        }
    }

    #[test]
    fn string_equality_uses_rt_str_eq_not_rt_str_cmp() {
        let main = Proc::main(vec![if_stmt(
            vec![Expr::binary(
                BinOp::Eq,
                BasicType::Int,
                Expr::var("A$", BasicType::Str),
                Expr::string("done"),
            )],
            vec![vec![print(vec![Expr::string("yes")])], vec![]],
        )]);
        let module = lower_program(&procs(vec![main])).unwrap();
        assert!(module.find_extern("rt_str_eq").is_some());
        assert!(module.find_extern("rt_str_cmp").is_none());
    }

    #[test]
    fn builtin_abs_picks_the_integer_helper_for_an_integer_argument() {
        let main = Proc::main(vec![print(vec![Expr::builtin(
            BuiltinId::Abs,
            BasicType::Int,
            vec![Expr::var("N", BasicType::Int)],
        )])]);
        let module = lower_program(&procs(vec![main])).unwrap();
        assert!(module.find_extern("rt_abs_i64").is_some());
        assert!(module.find_extern("rt_abs_f64").is_none());
    }

    #[test]
    fn integer_division_emits_a_divisor_zero_trap_before_the_divide() {
        let main = Proc::main(vec![let_var(
            "Q",
            Expr::binary(BinOp::IDiv, BasicType::Int, Expr::int(10), Expr::var("D", BasicType::Int)),
        )]);
        let module = lower_program(&procs(vec![main])).unwrap();
        let main_fn = module.find_function("main").unwrap();
        assert!(main_fn.blocks.iter().any(|b| b.label == "div_trap.0"));
        assert!(module.find_extern("rt_trap").is_some());
    }
}
