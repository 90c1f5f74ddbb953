//! Abstract Syntax Tree definitions for queries.

pub use crate::error::ErrorContext;
use crate::types::Value;

/// Stable identity of a syntax node within one parsed statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A parsed statement: inline function definitions followed by a query.
#[derive(Debug, Clone)]
pub struct Statement {
    /// `FUNCTION name(...) AS (...)` definitions.
    pub functions: Vec<FunctionDefinition>,
    /// The query expression.
    pub query: Expr,
}

/// Inline function definition.
#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub name: String,
    pub parameters: Vec<ParameterDefinition>,
    pub body: Expr,
    pub context: ErrorContext,
}

/// Formal parameter of an inline function.
#[derive(Debug, Clone)]
pub struct ParameterDefinition {
    pub name: String,
    pub type_ref: TypeRef,
    pub context: ErrorContext,
}

/// Type reference in an inline function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// Possibly qualified type name, e.g. `Edm.Int32`.
    Named(Vec<String>),
    /// `Collection(T)`.
    Collection(Box<TypeRef>),
}

/// Expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub context: ErrorContext,
    pub kind: ExprKind,
}

/// Expression variants.
#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Constant.
    Literal(Value),
    /// Untyped `null`.
    Null,
    /// `@name`.
    Parameter(String),
    /// Simple name.
    Identifier(String),
    /// `left.member`.
    Dot { left: Box<Expr>, member: String },
    /// `function(args)`; `function` is an identifier or dotted name.
    Call {
        function: Box<Expr>,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// `GROUPPARTITION([DISTINCT] arg)`.
    GroupPartition { arg: Box<Expr>, distinct: bool },
    /// Arithmetic, comparison or logical operator.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `NOT operand`.
    Not(Box<Expr>),
    /// `operand IS [NOT] NULL`.
    IsNull { operand: Box<Expr>, negated: bool },
    /// `{e1, e2, ...}`.
    Collection(Vec<Expr>),
    /// Nested query block.
    Query(Box<QueryExpr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    /// Returns true for `=`/`<>`.
    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::NotEq)
    }
}

impl Expr {
    /// Returns the name parts if this is `a`, `a.b`, `a.b.c`, ...
    #[must_use]
    pub fn multipart_identifier(&self) -> Option<Vec<String>> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(vec![name.clone()]),
            ExprKind::Dot { left, member } => {
                let mut names = left.multipart_identifier()?;
                names.push(member.clone());
                Some(names)
            }
            _ => None,
        }
    }

    /// Returns whether this expression contains a call-shaped subexpression.
    ///
    /// Nested query blocks are searched in all their clauses.
    #[must_use]
    pub fn has_method_call(&self) -> bool {
        match &self.kind {
            ExprKind::Call { .. } | ExprKind::GroupPartition { .. } => true,
            ExprKind::Literal(_)
            | ExprKind::Null
            | ExprKind::Parameter(_)
            | ExprKind::Identifier(_) => false,
            ExprKind::Dot { left, .. } => left.has_method_call(),
            ExprKind::Binary { left, right, .. } => left.has_method_call() || right.has_method_call(),
            ExprKind::Not(operand) | ExprKind::IsNull { operand, .. } => operand.has_method_call(),
            ExprKind::Collection(items) => items.iter().any(Expr::has_method_call),
            ExprKind::Query(query) => query.contains_method_call(),
        }
    }
}

/// Query block.
#[derive(Debug, Clone)]
pub struct QueryExpr {
    pub select: SelectClause,
    pub from: FromClause,
    pub where_clause: Option<Expr>,
    pub group_by: Option<GroupByClause>,
    pub having: Option<Expr>,
    pub order_by: Option<OrderByClause>,
    pub context: ErrorContext,
}

impl QueryExpr {
    /// Returns whether the clauses evaluated after grouping contain a call.
    ///
    /// This is the trigger for speculative implicit grouping.
    #[must_use]
    pub fn has_method_call(&self) -> bool {
        self.select.has_method_call()
            || self.having.as_ref().is_some_and(Expr::has_method_call)
            || self.order_by.as_ref().is_some_and(OrderByClause::has_method_call)
    }

    /// Returns whether any clause of this block contains a call.
    #[must_use]
    pub fn contains_method_call(&self) -> bool {
        self.has_method_call()
            || self.from.items.iter().any(FromItem::has_method_call)
            || self.where_clause.as_ref().is_some_and(Expr::has_method_call)
            || self.group_by.as_ref().is_some_and(|g| {
                g.items.iter().any(|item| item.expr.has_method_call())
            })
    }
}

/// Row or value projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectKind {
    /// `SELECT a, b` produces rows.
    Row,
    /// `SELECT VALUE a` produces values.
    Value,
}

/// SELECT clause.
#[derive(Debug, Clone)]
pub struct SelectClause {
    pub kind: SelectKind,
    pub distinct: bool,
    pub items: Vec<AliasedExpr>,
    pub context: ErrorContext,
}

impl SelectClause {
    /// Returns whether any projection item contains a call.
    #[must_use]
    pub fn has_method_call(&self) -> bool {
        self.items.iter().any(|item| item.expr.has_method_call())
    }
}

/// `expr [AS alias]`.
#[derive(Debug, Clone)]
pub struct AliasedExpr {
    pub expr: Expr,
    pub alias: Option<Alias>,
}

/// Explicit alias.
#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub context: ErrorContext,
}

/// FROM clause.
#[derive(Debug, Clone)]
pub struct FromClause {
    pub items: Vec<FromItem>,
    pub context: ErrorContext,
}

/// One comma-separated FROM item.
#[derive(Debug, Clone)]
pub enum FromItem {
    Aliased(AliasedExpr),
    Join(Box<JoinItem>),
    Apply(Box<ApplyItem>),
}

impl FromItem {
    /// Returns whether any expression in this item contains a call.
    #[must_use]
    pub fn has_method_call(&self) -> bool {
        match self {
            FromItem::Aliased(aliased) => aliased.expr.has_method_call(),
            FromItem::Join(join) => {
                join.left.has_method_call()
                    || join.right.has_method_call()
                    || join.on.as_ref().is_some_and(Expr::has_method_call)
            }
            FromItem::Apply(apply) => apply.left.has_method_call() || apply.right.has_method_call(),
        }
    }
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Cross,
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

/// `left JOIN right [ON predicate]`.
#[derive(Debug, Clone)]
pub struct JoinItem {
    pub left: FromItem,
    pub right: FromItem,
    pub kind: JoinKind,
    pub on: Option<Expr>,
    pub context: ErrorContext,
}

/// Apply kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyKind {
    Cross,
    Outer,
}

/// `left CROSS|OUTER APPLY right`.
#[derive(Debug, Clone)]
pub struct ApplyItem {
    pub left: FromItem,
    pub right: FromItem,
    pub kind: ApplyKind,
    pub context: ErrorContext,
}

/// GROUP BY clause.
#[derive(Debug, Clone)]
pub struct GroupByClause {
    pub items: Vec<AliasedExpr>,
    pub context: ErrorContext,
}

/// ORDER BY clause.
#[derive(Debug, Clone)]
pub struct OrderByClause {
    pub items: Vec<OrderItem>,
    pub context: ErrorContext,
}

impl OrderByClause {
    /// Returns whether any sort key contains a call.
    #[must_use]
    pub fn has_method_call(&self) -> bool {
        self.items.iter().any(|item| item.expr.has_method_call())
    }
}

/// Sort key.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub expr: Expr,
    pub descending: bool,
}
