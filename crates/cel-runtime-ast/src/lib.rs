//! Expression tree consumed by the CEL runtime.
//!
//! Parsing is not part of this workspace: a front end produces [`SpannedExpr`]
//! trees (macro calls such as `all` or `map` already expanded into
//! [`Expr::Comprehension`]) and hands them to the interpreter. The runtime only
//! relies on three things from a node: its discriminant, its sub-expressions
//! and its [`Span`], which is attached to evaluation errors.
//!
//! [`AstBuilder`] constructs trees programmatically, for embedders without a
//! parser and for tests.

use std::fmt;

mod builder;

pub use builder::{AstBuilder, ACCU_VAR};

/// Source span for error reporting.
/// Uses half-open byte offsets into the source string.
pub type Span = std::ops::Range<usize>;

/// AST node with source location and unique ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// Unique identifier for this node, assigned by whoever built the tree.
    pub id: i64,
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(id: i64, node: T, span: Span) -> Self {
        Self { id, node, span }
    }

    /// Replace the span of this node.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// A spanned expression.
pub type SpannedExpr = Spanned<Expr>;

/// A map literal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: SpannedExpr,
    pub value: SpannedExpr,
}

/// A field initializer in a message construction expression.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub value: SpannedExpr,
}

/// CEL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),

    Ident(String),

    // Collections
    List(Vec<SpannedExpr>),
    Map(Vec<MapEntry>),

    // Operations
    Unary {
        op: UnaryOp,
        expr: Box<SpannedExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<SpannedExpr>,
        right: Box<SpannedExpr>,
    },
    Ternary {
        cond: Box<SpannedExpr>,
        then_expr: Box<SpannedExpr>,
        else_expr: Box<SpannedExpr>,
    },

    // Access
    Member {
        expr: Box<SpannedExpr>,
        field: String,
    },
    Index {
        expr: Box<SpannedExpr>,
        index: Box<SpannedExpr>,
    },
    /// Function call. `target` is set for receiver-style calls
    /// (`target.function(args)`); the runtime passes it as the first argument.
    Call {
        target: Option<Box<SpannedExpr>>,
        function: String,
        args: Vec<SpannedExpr>,
    },
    /// Message construction: `TypeName{field: value, ...}`.
    Struct {
        type_name: String,
        fields: Vec<StructField>,
    },

    /// Presence test produced by the `has(e.f)` macro.
    Has {
        expr: Box<SpannedExpr>,
        field: String,
    },

    /// Comprehension expression (result of macro expansion).
    ///
    /// Semantics:
    /// ```text
    /// let accu_var = accu_init
    /// for (let iter_var in iter_range) {
    ///    if (!loop_condition) { break }
    ///    accu_var = loop_step
    /// }
    /// return result
    /// ```
    Comprehension {
        iter_var: String,
        iter_range: Box<SpannedExpr>,
        accu_var: String,
        accu_init: Box<SpannedExpr>,
        /// Returns false when the result has been computed (short-circuit condition).
        loop_condition: Box<SpannedExpr>,
        loop_step: Box<SpannedExpr>,
        result: Box<SpannedExpr>,
    },
}

impl Expr {
    /// Name of the node discriminant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Null
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::UInt(_)
            | Expr::Float(_)
            | Expr::String(_)
            | Expr::Bytes(_) => "literal",
            Expr::Ident(_) => "ident",
            Expr::List(_) => "list",
            Expr::Map(_) => "map",
            Expr::Unary { .. } => "unary",
            Expr::Binary { .. } => "binary",
            Expr::Ternary { .. } => "ternary",
            Expr::Member { .. } => "member",
            Expr::Index { .. } => "index",
            Expr::Call { .. } => "call",
            Expr::Struct { .. } => "struct",
            Expr::Has { .. } => "has",
            Expr::Comprehension { .. } => "comprehension",
        }
    }

    /// Direct sub-expressions, in the order the interpreter evaluates them.
    pub fn children(&self) -> Vec<&SpannedExpr> {
        match self {
            Expr::Null
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::UInt(_)
            | Expr::Float(_)
            | Expr::String(_)
            | Expr::Bytes(_)
            | Expr::Ident(_) => Vec::new(),
            Expr::List(elements) => elements.iter().collect(),
            Expr::Map(entries) => entries
                .iter()
                .flat_map(|entry| [&entry.key, &entry.value])
                .collect(),
            Expr::Unary { expr, .. } => vec![&**expr],
            Expr::Binary { left, right, .. } => vec![&**left, &**right],
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => vec![&**cond, &**then_expr, &**else_expr],
            Expr::Member { expr, .. } | Expr::Has { expr, .. } => vec![&**expr],
            Expr::Index { expr, index } => vec![&**expr, &**index],
            Expr::Call { target, args, .. } => {
                target.iter().map(|t| t.as_ref()).chain(args.iter()).collect()
            }
            Expr::Struct { fields, .. } => fields.iter().map(|f| &f.value).collect(),
            Expr::Comprehension {
                iter_range,
                accu_init,
                loop_condition,
                loop_step,
                result,
                ..
            } => vec![
                &**iter_range,
                &**accu_init,
                &**loop_condition,
                &**loop_step,
                &**result,
            ],
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation (`-`)
    Neg,
    /// Logical negation (`!`)
    Not,
}

impl UnaryOp {
    /// The CEL overload symbol, e.g. `-_`.
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-_",
            UnaryOp::Not => "!_",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Membership
    In,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    /// The CEL overload symbol, e.g. `_+_`.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "_+_",
            BinaryOp::Sub => "_-_",
            BinaryOp::Mul => "_*_",
            BinaryOp::Div => "_/_",
            BinaryOp::Mod => "_%_",
            BinaryOp::Eq => "_==_",
            BinaryOp::Ne => "_!=_",
            BinaryOp::Lt => "_<_",
            BinaryOp::Le => "_<=_",
            BinaryOp::Gt => "_>_",
            BinaryOp::Ge => "_>=_",
            BinaryOp::In => "@in",
            BinaryOp::And => "_&&_",
            BinaryOp::Or => "_||_",
        }
    }

    /// Returns true for `&&` and `||`.
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
