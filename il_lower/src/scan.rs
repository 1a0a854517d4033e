//! The scan pass (§4.9.3): a no-emission walk over a procedure that
//! determines referenced variables, array metadata, the runtime helpers
//! lowering will need, the set of valid `GOTO` targets, and — for
//! `FUNCTION`s only — whether every path guarantees a `RETURN`.

use std::collections::{BTreeMap, BTreeSet};

use il_support::{Diag, Expected};

use crate::ast::{
    AssignTarget, BasicType, BinOp, BuiltinId, ExprKind, ExpressionAst, GotoTarget, ProcedureAst, ProcedureKind,
    StmtKind,
};

/// A variable's type is the BASIC type suffix on its name: `$` -> `Str`,
/// `#` -> `Float`, anything else -> `Int` (§4.9.1).
pub fn var_type_from_suffix(name: &str) -> BasicType {
    if name.ends_with('$') {
        BasicType::Str
    } else if name.ends_with('#') {
        BasicType::Float
    } else {
        BasicType::Int
    }
}

#[derive(Debug, Default)]
pub struct ScanInfo {
    pub variables: BTreeMap<String, BasicType>,
    pub arrays: BTreeMap<String, BasicType>,
    pub helpers: BTreeSet<&'static str>,
    pub labels: BTreeSet<GotoTarget>,
}

pub fn scan_procedure(proc: &dyn ProcedureAst) -> Expected<ScanInfo> {
    let mut info = ScanInfo::default();
    for (name, ty) in proc.params() {
        info.variables.insert(name.clone(), *ty);
    }
    scan_stmts(proc.body(), &mut info)?;

    if proc.kind() == ProcedureKind::Function && !always_returns(proc.body()) {
        return Err(Diag::error(format!(
            "function `{}` has a path that does not reach a RETURN",
            proc.name()
        ))
        .with_loc(proc.loc())
        .with_code("lower-no-return"));
    }
    Ok(info)
}

fn scan_stmts(stmts: &[Box<dyn crate::ast::StatementAst>], info: &mut ScanInfo) -> Expected<()> {
    for stmt in stmts {
        scan_stmt(stmt.as_ref(), info)?;
    }
    Ok(())
}

fn scan_stmt(stmt: &dyn crate::ast::StatementAst, info: &mut ScanInfo) -> Expected<()> {
    match stmt.kind() {
        StmtKind::Let(target) => {
            match target {
                AssignTarget::Var(name) => {
                    info.variables.insert(name.clone(), var_type_from_suffix(name));
                }
                AssignTarget::Index(name) => {
                    let Some(elem_ty) = info.arrays.get(name).copied() else {
                        return Err(Diag::error(format!("array `{name}` assigned before DIM"))
                            .with_loc(stmt.loc())
                            .with_code("lower-no-dim"));
                    };
                    info.helpers.insert(if elem_ty == BasicType::Int { "rt_arr_set_i64" } else { "rt_arr_set_f64" });
                }
            }
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
        }
        StmtKind::Print => {
            info.helpers.insert("rt_print_str");
            info.helpers.insert("rt_print_i64");
            info.helpers.insert("rt_print_f64");
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
        }
        StmtKind::Input { var } => {
            info.variables.insert(var.clone(), var_type_from_suffix(var));
            info.helpers.insert("rt_input_line");
            info.helpers.insert("rt_str_to_int");
            info.helpers.insert("rt_str_to_float");
        }
        StmtKind::If => {
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
            for arm in stmt.arms() {
                scan_stmts(arm, info)?;
            }
        }
        StmtKind::For { var, .. } => {
            info.variables.insert(var.clone(), var_type_from_suffix(var));
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
            for arm in stmt.arms() {
                scan_stmts(arm, info)?;
            }
        }
        StmtKind::While => {
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
            for arm in stmt.arms() {
                scan_stmts(arm, info)?;
            }
        }
        // `GOTO` targets may be forward references; validated once the
        // whole procedure's labels are known, by the emitter.
        StmtKind::Goto(_) => {}
        StmtKind::Label(target) => {
            info.labels.insert(target.clone());
        }
        StmtKind::Dim { var, elem_ty } => {
            if *elem_ty == BasicType::Str {
                return Err(Diag::error(format!("array `{var}` has unsupported element type `str`"))
                    .with_loc(stmt.loc())
                    .with_code("lower-bad-array-type"));
            }
            info.arrays.insert(var.clone(), *elem_ty);
            info.helpers.insert(if *elem_ty == BasicType::Int { "rt_arr_alloc_i64" } else { "rt_arr_alloc_f64" });
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
        }
        StmtKind::Return => {
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
        }
        StmtKind::ExprStmt => {
            for e in stmt.exprs() {
                scan_expr(e, info)?;
            }
        }
    }
    Ok(())
}

fn scan_expr(expr: &dyn ExpressionAst, info: &mut ScanInfo) -> Expected<()> {
    match expr.kind() {
        ExprKind::Var(name) => {
            info.variables.entry(name.clone()).or_insert_with(|| var_type_from_suffix(name));
        }
        ExprKind::Index(name) => {
            if !info.arrays.contains_key(name) {
                return Err(Diag::error(format!("array `{name}` used before DIM"))
                    .with_loc(expr.loc())
                    .with_code("lower-no-dim"));
            }
            let elem_ty = info.arrays[name];
            info.helpers.insert(if elem_ty == BasicType::Int { "rt_arr_get_i64" } else { "rt_arr_get_f64" });
        }
        ExprKind::Binary(op) => {
            if matches!(op, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
                && expr.children().iter().any(|c| c.ty() == BasicType::Str)
            {
                info.helpers.insert("rt_str_cmp");
            }
            if matches!(op, BinOp::Add) && expr.children().iter().all(|c| c.ty() == BasicType::Str) {
                info.helpers.insert("rt_concat");
            }
            if matches!(op, BinOp::IDiv | BinOp::Mod) {
                info.helpers.insert("rt_trap");
            }
        }
        ExprKind::Builtin(id) => {
            let arg_ty = expr.children().first().map(|c| c.ty()).unwrap_or(BasicType::Int);
            info.helpers.insert(id.helper_name(arg_ty));
        }
        ExprKind::Call(_) | ExprKind::IntLit(_) | ExprKind::FloatLit(_) | ExprKind::StrLit(_) | ExprKind::Unary(_) => {}
    }
    for child in expr.children() {
        scan_expr(child, info)?;
    }
    Ok(())
}

/// Whether `stmts` guarantees a `RETURN` is reached on every path through
/// the statement tree. This is a structural check over the AST, not a
/// full control-flow reachability analysis: a loop body is never assumed
/// to run, and a `GOTO` is not followed — so a `FUNCTION` whose only
/// `RETURN` is reached by jumping into the middle of an `IF` chain is
/// rejected even though it would behave correctly at runtime. Stricter
/// than necessary, never laxer: no accepted procedure can fall off the
/// end without returning.
fn always_returns(stmts: &[Box<dyn crate::ast::StatementAst>]) -> bool {
    match stmts.last() {
        None => false,
        Some(last) => match last.kind() {
            StmtKind::Return => true,
            // `arms()` always carries a trailing `ELSE` slot (empty if the
            // source had none), so a missing `ELSE` and an empty `ELSE`
            // both correctly fail the `all` below: there is no statement
            // list reached "otherwise" that is guaranteed to return.
            StmtKind::If => last.arms().iter().all(|arm| always_returns(arm)),
            _ => false,
        },
    }
}
