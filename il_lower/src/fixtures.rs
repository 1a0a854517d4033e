//! Test-only concrete AST, implementing the `ast` module's traits, since
//! the real BASIC frontend is out of this crate's scope. Kept minimal:
//! enough shape to drive the scan/emit passes, nothing a real frontend
//! would also need (precise spans, error recovery, ...).

use il_support::SourceLoc;

use crate::ast::{
    AssignTarget, BasicType, BinOp, BuiltinId, ExprKind, ExpressionAst, GotoTarget, ProcedureAst, ProcedureKind,
    StatementAst, StmtKind, UnOp,
};

pub struct Expr {
    kind: ExprKind,
    ty: BasicType,
    children: Vec<Expr>,
}

impl Expr {
    pub fn int(v: i64) -> Self {
        Expr { kind: ExprKind::IntLit(v), ty: BasicType::Int, children: vec![] }
    }

    pub fn float(s: &str) -> Self {
        Expr { kind: ExprKind::FloatLit(s.to_string()), ty: BasicType::Float, children: vec![] }
    }

    pub fn string(s: &str) -> Self {
        Expr { kind: ExprKind::StrLit(s.to_string()), ty: BasicType::Str, children: vec![] }
    }

    pub fn var(name: &str, ty: BasicType) -> Self {
        Expr { kind: ExprKind::Var(name.to_string()), ty, children: vec![] }
    }

    pub fn index(name: &str, ty: BasicType, subscript: Expr) -> Self {
        Expr { kind: ExprKind::Index(name.to_string()), ty, children: vec![subscript] }
    }

    pub fn unary(op: UnOp, ty: BasicType, operand: Expr) -> Self {
        Expr { kind: ExprKind::Unary(op), ty, children: vec![operand] }
    }

    pub fn binary(op: BinOp, ty: BasicType, lhs: Expr, rhs: Expr) -> Self {
        Expr { kind: ExprKind::Binary(op), ty, children: vec![lhs, rhs] }
    }

    pub fn call(name: &str, ty: BasicType, args: Vec<Expr>) -> Self {
        Expr { kind: ExprKind::Call(name.to_string()), ty, children: args }
    }

    pub fn builtin(id: BuiltinId, ty: BasicType, args: Vec<Expr>) -> Self {
        Expr { kind: ExprKind::Builtin(id), ty, children: args }
    }
}

impl ExpressionAst for Expr {
    fn kind(&self) -> &ExprKind {
        &self.kind
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::UNKNOWN
    }

    fn ty(&self) -> BasicType {
        self.ty
    }

    fn children(&self) -> Vec<&dyn ExpressionAst> {
        self.children.iter().map(|c| c as &dyn ExpressionAst).collect()
    }
}

pub struct Stmt {
    kind: StmtKind,
    exprs: Vec<Expr>,
    arms: Vec<Vec<Box<dyn StatementAst>>>,
}

impl StatementAst for Stmt {
    fn kind(&self) -> &StmtKind {
        &self.kind
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::UNKNOWN
    }

    fn exprs(&self) -> Vec<&dyn ExpressionAst> {
        self.exprs.iter().map(|e| e as &dyn ExpressionAst).collect()
    }

    fn arms(&self) -> Vec<&[Box<dyn StatementAst>]> {
        self.arms.iter().map(|a| a.as_slice()).collect()
    }
}

pub fn let_var(name: &str, value: Expr) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Let(AssignTarget::Var(name.to_string())), exprs: vec![value], arms: vec![] })
}

pub fn let_index(name: &str, subscript: Expr, value: Expr) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Let(AssignTarget::Index(name.to_string())), exprs: vec![subscript, value], arms: vec![] })
}

pub fn print(exprs: Vec<Expr>) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Print, exprs, arms: vec![] })
}

pub fn input(var: &str) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Input { var: var.to_string() }, exprs: vec![], arms: vec![] })
}

/// `conds.len() + 1 == arms.len()`: one body per condition, plus the
/// trailing `ELSE` (pass an empty `Vec` when there is none).
pub fn if_stmt(conds: Vec<Expr>, arms: Vec<Vec<Box<dyn StatementAst>>>) -> Box<dyn StatementAst> {
    assert_eq!(conds.len() + 1, arms.len(), "if_stmt needs one arm per condition plus a trailing else arm");
    Box::new(Stmt { kind: StmtKind::If, exprs: conds, arms })
}

pub fn for_stmt(var: &str, start: Expr, end: Expr, step: Option<Expr>, body: Vec<Box<dyn StatementAst>>) -> Box<dyn StatementAst> {
    let has_step = step.is_some();
    let mut exprs = vec![start, end];
    if let Some(step) = step {
        exprs.push(step);
    }
    Box::new(Stmt { kind: StmtKind::For { var: var.to_string(), has_step }, exprs, arms: vec![body] })
}

pub fn while_stmt(cond: Expr, body: Vec<Box<dyn StatementAst>>) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::While, exprs: vec![cond], arms: vec![body] })
}

pub fn goto_(target: GotoTarget) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Goto(target), exprs: vec![], arms: vec![] })
}

pub fn label(target: GotoTarget) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Label(target), exprs: vec![], arms: vec![] })
}

pub fn dim(var: &str, elem_ty: BasicType, size: Expr) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Dim { var: var.to_string(), elem_ty }, exprs: vec![size], arms: vec![] })
}

pub fn return_stmt(value: Option<Expr>) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::Return, exprs: value.into_iter().collect(), arms: vec![] })
}

pub fn expr_stmt(e: Expr) -> Box<dyn StatementAst> {
    Box::new(Stmt { kind: StmtKind::ExprStmt, exprs: vec![e], arms: vec![] })
}

pub struct Proc {
    pub name: String,
    pub kind: ProcedureKind,
    pub params: Vec<(String, BasicType)>,
    pub ret_ty: Option<BasicType>,
    pub body: Vec<Box<dyn StatementAst>>,
}

impl Proc {
    pub fn main(body: Vec<Box<dyn StatementAst>>) -> Self {
        Proc { name: "main".to_string(), kind: ProcedureKind::Main, params: vec![], ret_ty: None, body }
    }

    pub fn function(name: &str, params: Vec<(&str, BasicType)>, ret_ty: BasicType, body: Vec<Box<dyn StatementAst>>) -> Self {
        Proc {
            name: name.to_string(),
            kind: ProcedureKind::Function,
            params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
            ret_ty: Some(ret_ty),
            body,
        }
    }

    pub fn sub(name: &str, params: Vec<(&str, BasicType)>, body: Vec<Box<dyn StatementAst>>) -> Self {
        Proc {
            name: name.to_string(),
            kind: ProcedureKind::Sub,
            params: params.into_iter().map(|(n, t)| (n.to_string(), t)).collect(),
            ret_ty: None,
            body,
        }
    }
}

impl ProcedureAst for Proc {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProcedureKind {
        self.kind
    }

    fn params(&self) -> &[(String, BasicType)] {
        &self.params
    }

    fn ret_ty(&self) -> Option<BasicType> {
        self.ret_ty
    }

    fn body(&self) -> &[Box<dyn StatementAst>] {
        &self.body
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::UNKNOWN
    }
}
