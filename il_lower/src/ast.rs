//! The frontend contract (§4.9.1): lowering never owns or constructs a
//! BASIC AST, it only walks one. A frontend satisfies this contract by
//! implementing three read-only traits carrying just enough shape — a
//! kind tag, a `SourceLoc`, and (for statements) the nested structure —
//! for the scan and emit passes to traverse without knowing the
//! frontend's concrete node types. Lowering never mutates what it walks.

use il_support::SourceLoc;

/// Resolved type of a BASIC value, already disambiguated by the
/// frontend's semantic analysis from the variable's type suffix
/// (`$` -> `Str`, `#` -> `Float`, default -> `Int`; §4.9.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicType {
    Int,
    Float,
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// `/`: promotes to float division whenever either operand is float.
    Div,
    /// `\`: integer division, requires integer operands.
    IDiv,
    /// `MOD`: requires integer operands.
    Mod,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A builtin the runtime signature registry can resolve directly, by
/// the name of the helper it lowers to (§4.9.4). Argument-count and
/// operand-type checking is semantic analysis's job, not lowering's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinId {
    Abs,
    Sqr,
    Floor,
    Ceil,
    Pow,
    Sin,
    Cos,
    Len,
    Rnd,
}

impl BuiltinId {
    /// The runtime helper this builtin resolves to when its argument is
    /// (or, after promotion, becomes) the given type. `Abs`/`Len` have a
    /// type-dependent helper; the rest are fixed.
    pub fn helper_name(self, arg_ty: BasicType) -> &'static str {
        match self {
            BuiltinId::Abs if arg_ty == BasicType::Int => "rt_abs_i64",
            BuiltinId::Abs => "rt_abs_f64",
            BuiltinId::Sqr => "rt_sqr",
            BuiltinId::Floor => "rt_floor",
            BuiltinId::Ceil => "rt_ceil",
            BuiltinId::Pow => "rt_pow",
            BuiltinId::Sin => "rt_sin",
            BuiltinId::Cos => "rt_cos",
            BuiltinId::Len => "rt_str_len",
            BuiltinId::Rnd => "rt_rand_next",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(String),
    StrLit(String),
    Var(String),
    /// Reference to an array element: `children()[0]` is the index.
    Index(String),
    Unary(UnOp),
    Binary(BinOp),
    /// Call to a user-declared FUNCTION; `children()` are the arguments.
    Call(String),
    /// Call to a builtin; `children()` are the arguments.
    Builtin(BuiltinId),
}

/// A read-only BASIC expression node. `children()` gives the operand
/// sub-expressions in evaluation order (binary: `[lhs, rhs]`; unary:
/// `[operand]`; call/builtin: the argument list; index: `[subscript]`;
/// leaves: empty).
pub trait ExpressionAst {
    fn kind(&self) -> &ExprKind;
    fn loc(&self) -> SourceLoc;
    fn ty(&self) -> BasicType;
    fn children(&self) -> Vec<&dyn ExpressionAst>;
}

/// Where a variable-length `DIM` bound or a `GOTO` target points.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum GotoTarget {
    Label(String),
    Line(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    Var(String),
    /// Array element assignment; the subscript is the statement's sole
    /// expression child.
    Index(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// Assigns to `target`. `exprs()` is `[value]` for `AssignTarget::Var`,
    /// `[subscript, value]` for `AssignTarget::Index`.
    Let(AssignTarget),
    /// Prints every expression child, in order.
    Print,
    /// Reads one value into `var`.
    Input { var: String },
    /// `exprs()` gives the condition of each `IF`/`ELSEIF` arm, in
    /// order; `arms()` gives one body per condition (same order),
    /// followed by one trailing arm for `ELSE` (empty slice if there
    /// is none).
    If,
    /// `exprs()` is `[start, end]`, or `[start, end, step]` when
    /// `has_step`; `arms()` is `[body]`.
    For { var: String, has_step: bool },
    /// `exprs()` is `[condition]`; `arms()` is `[body]`.
    While,
    Goto(GotoTarget),
    /// A scan-visible jump target: a named label or a BASIC line number
    /// used as a `GOTO` destination.
    Label(GotoTarget),
    /// `exprs()` is `[size]`, the array's element count.
    Dim { var: String, elem_ty: BasicType },
    /// `exprs()` is `[value]` in a `FUNCTION`, empty in a `SUB`.
    Return,
    /// An expression evaluated for its side effect (a bare `FUNCTION`
    /// or `SUB` call); the call is the statement's sole expression
    /// child.
    ExprStmt,
}

/// A read-only BASIC statement node. Expression children (conditions,
/// assigned values, array subscripts, `DIM` bounds, `PRINT`/call
/// arguments) come from `exprs()`; nested statement bodies (`IF`/`FOR`/
/// `WHILE` bodies, `ELSEIF`/`ELSE` arms) come from `arms()`.
pub trait StatementAst {
    fn kind(&self) -> &StmtKind;
    fn loc(&self) -> SourceLoc;
    fn exprs(&self) -> Vec<&dyn ExpressionAst>;
    /// Nested statement lists, in a per-`kind` order:
    /// - `If`: one per condition in `exprs()`, in the same order (the
    ///   `THEN`/`ELSEIF` bodies), followed by one trailing arm for
    ///   `ELSE` (empty slice if there is none).
    /// - `For`/`While`: exactly one arm, the loop body.
    /// - anything else: empty.
    fn arms(&self) -> Vec<&[Box<dyn StatementAst>]>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Function,
    Sub,
    /// The synthetic top-level program body (§4.9.2: lowered to `@main`).
    Main,
}

pub trait ProcedureAst {
    fn name(&self) -> &str;
    fn kind(&self) -> ProcedureKind;
    fn params(&self) -> &[(String, BasicType)];
    /// `None` for `Sub`/`Main`; `Some` for `Function`.
    fn ret_ty(&self) -> Option<BasicType>;
    fn body(&self) -> &[Box<dyn StatementAst>];
    fn loc(&self) -> SourceLoc;
}
