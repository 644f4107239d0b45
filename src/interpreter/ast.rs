//! Abstract syntax for the interactive language.
//!
//! Statements carry their 1-based source line for traceback synthesis.

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A bare expression statement; its value feeds the display hook.
    Expr { value: Expr, line: u32 },
    Assign {
        target: Target,
        value: Expr,
        line: u32,
    },
    AugAssign {
        target: Target,
        op: BinOp,
        value: Expr,
        line: u32,
    },
    /// `print` is a statement in this python2-flavored surface; the
    /// parenthesized call form parses as a single grouped argument.
    Print { values: Vec<Expr>, line: u32 },
    Del { names: Vec<String>, line: u32 },
    Import {
        module: String,
        alias: Option<String>,
        line: u32,
    },
    Def {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        line: u32,
    },
    Class {
        name: String,
        body: Vec<Stmt>,
        line: u32,
    },
    Return { value: Option<Expr>, line: u32 },
    If {
        /// `(condition, suite)` for the `if` and each `elif`.
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
        line: u32,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    For {
        target: String,
        iter: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    Break { line: u32 },
    Continue { line: u32 },
    Pass { line: u32 },
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Expr { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::AugAssign { line, .. }
            | Stmt::Print { line, .. }
            | Stmt::Del { line, .. }
            | Stmt::Import { line, .. }
            | Stmt::Def { line, .. }
            | Stmt::Class { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::If { line, .. }
            | Stmt::While { line, .. }
            | Stmt::For { line, .. }
            | Stmt::Break { line }
            | Stmt::Continue { line }
            | Stmt::Pass { line } => *line,
        }
    }

    /// Whether this statement is an expression statement (eval-and-display
    /// rather than exec).
    pub fn is_expression(&self) -> bool {
        matches!(self, Stmt::Expr { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

/// Assignable location.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Attribute(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    None,
    True,
    False,
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    BoolOp {
        left: Box<Expr>,
        op: BoolOp,
        right: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        /// Chained comparisons: `a < b <= c` keeps `[(Lt, b), (Le, c)]`.
        ops: Vec<(CmpOp, Expr)>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}
