//! Error types for query compilation.

use std::fmt;

use thiserror::Error;

/// Result type alias using [`QueryError`].
pub type Result<T> = std::result::Result<T, QueryError>;

/// Clause of a query block a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Function,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Clause::Select => "SELECT clause",
            Clause::From => "FROM clause",
            Clause::Where => "WHERE clause",
            Clause::GroupBy => "GROUP BY clause",
            Clause::Having => "HAVING clause",
            Clause::OrderBy => "ORDER BY clause",
            Clause::Function => "function definition",
        };
        f.write_str(name)
    }
}

/// Source position of a syntax node, with an optional clause tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub col: usize,
    /// Clause the node belongs to, if known.
    pub clause: Option<Clause>,
}

impl ErrorContext {
    /// Creates a position without a clause tag.
    #[must_use]
    pub fn new(line: usize, col: usize) -> Self {
        ErrorContext {
            line,
            col,
            clause: None,
        }
    }

    /// Tags this position with the clause it appears in.
    #[must_use]
    pub fn in_clause(mut self, clause: Clause) -> Self {
        self.clause = Some(clause);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)?;
        if let Some(clause) = self.clause {
            write!(f, ", in {clause}")?;
        }
        Ok(())
    }
}

/// Semantic errors raised while binding a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    // ==================== Name resolution ====================
    /// Name not found in any scope, container or namespace.
    #[error("'{0}' could not be resolved in the current scope or context")]
    UnresolvedIdentifier(String),

    /// Case-insensitive lookup matched more than one metadata member.
    #[error("'{name}' is ambiguous; candidates are {}", .candidates.join(", "))]
    AmbiguousMetadataMember {
        name: String,
        candidates: Vec<String>,
    },

    /// Alias defined twice in the same clause.
    #[error("the alias '{0}' was already used")]
    AliasAlreadyUsed(String),

    /// Query parameter was not declared.
    #[error("the query parameter '@{0}' is not defined")]
    ParameterNotFound(String),

    /// Member access on a value whose type has no such member.
    #[error("'{member}' is not a member of type '{type_name}'")]
    NotAMemberOfType { member: String, type_name: String },

    /// Member access on a collection.
    #[error("'{member}' is not a member of collection type '{type_name}'")]
    NotAMemberOfCollection { member: String, type_name: String },

    /// Member access on an entity container.
    #[error("'{member}' is not a member of entity container '{container}'")]
    NotAMemberOfContainer { member: String, container: String },

    /// Member access on a namespace.
    #[error("'{member}' is not a member of namespace '{namespace}'")]
    NotAMemberOfNamespace { member: String, namespace: String },

    /// Name resolved to something that is not a value.
    #[error("'{0}' does not refer to a value")]
    NotAValue(String),

    /// Name resolved to something that cannot be invoked.
    #[error("'{0}' cannot be resolved into a valid type or function")]
    NotAFunction(String),

    /// Name used as a parameter type does not denote a type.
    #[error("'{0}' is not a type")]
    NotAType(String),

    /// Duplicate command variable.
    #[error("the variable '{0}' is already defined")]
    DuplicateVariable(String),

    // ==================== Functions ====================
    /// No overload accepts the argument types.
    #[error("no overload of function '{name}' accepts arguments ({})", .args.join(", "))]
    FunctionOverloadNotFound { name: String, args: Vec<String> },

    /// More than one overload is an equally good match.
    #[error("the call to function '{0}' is ambiguous")]
    AmbiguousFunctionOverload(String),

    /// Inline function calls itself, directly or indirectly.
    #[error("the inline function '{0}' is recursive")]
    RecursiveInlineFunction(String),

    /// Inline function defined twice with the same signature.
    #[error("the inline function '{0}' is already defined with the same parameters")]
    DuplicateInlineFunction(String),

    // ==================== Aggregates ====================
    /// Aggregate has no grouping region to evaluate in.
    #[error("the aggregate has no enclosing aggregating scope")]
    AggregateHasNoAggregatingScope,

    /// Contained aggregate evaluates inside its container's range.
    #[error("nested aggregate cannot be used inside an aggregate")]
    NestedAggregateInAggregate,

    /// Two aggregates resolved to the same result name.
    #[error("aggregate result name '{0}' is already used")]
    DuplicateAggregateName(String),

    /// GROUPPARTITION used without any enclosing grouping.
    #[error("GROUPPARTITION can only be used in the context of a grouping query")]
    GroupPartitionOutOfContext,

    /// Read of a name that was consumed by a grouping operation.
    #[error("'{0}' is not valid after grouping; only group keys and aggregates can be referenced")]
    InvalidGroupInputReference(String),

    // ==================== Structure ====================
    /// Right side of a join references its left side.
    #[error("the right side of a join cannot reference the left side")]
    InvalidJoinLeftCorrelation,

    /// Key expression does not reference the query's sources.
    #[error("{0} key expression must reference the query's sources")]
    KeyMustBeCorrelated(&'static str),

    /// HAVING without GROUP BY.
    #[error("HAVING requires a GROUP BY clause")]
    HavingRequiresGroupClause,

    /// Inner join without ON.
    #[error("an inner join must have an ON predicate")]
    InnerJoinMustHaveOnPredicate,

    /// Cross join with ON.
    #[error("a cross join cannot have an ON predicate")]
    InvalidPredicateForCrossJoin,

    /// SELECT VALUE with more than one item.
    #[error("SELECT VALUE must have exactly one item")]
    InvalidSelectValueList,

    /// Aliased SELECT VALUE item without ORDER BY.
    #[error("SELECT VALUE items cannot be aliased")]
    InvalidSelectValueAliasedExpression,

    /// Clause not accepted in restricted compilation mode.
    #[error("{0} is not supported in restricted compilation mode")]
    NotSupportedInRestrictedMode(&'static str),

    // ==================== Types ====================
    /// Expression of the wrong type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// FROM source is not a collection.
    #[error("FROM source must be a collection, got {0}")]
    ExpressionMustBeCollection(String),

    /// Predicate is not boolean.
    #[error("predicate must be boolean, got {0}")]
    ExpressionTypeMustBeBoolean(String),

    /// Untyped null in a context that needs a type.
    #[error("an untyped null is not allowed here")]
    ExpressionCannotBeNull,

    /// Group key type does not support equality.
    #[error("group key of type {0} is not equality-comparable")]
    GroupingKeyNotEqualComparable(String),

    /// Sort key type does not support ordering.
    #[error("ORDER BY key of type {0} is not order-comparable")]
    OrderByKeyNotOrderComparable(String),

    /// DISTINCT over a type without equality.
    #[error("DISTINCT over {0} is not supported")]
    DistinctNotEqualComparable(String),

    /// Collection constructor elements have no common type.
    #[error("collection elements have no common type")]
    CollectionElementTypesIncompatible,
}

impl BindError {
    /// Attaches a source position to this error.
    #[must_use]
    pub fn at(self, context: ErrorContext) -> QueryError {
        QueryError::Bind {
            error: self,
            context,
        }
    }
}

/// Errors raised by query compilation.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Parse error with location information.
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    /// Semantic error at a source position.
    #[error("Bind error at {context}: {error}")]
    Bind {
        error: BindError,
        context: ErrorContext,
    },

    /// Catalog definition error.
    #[error("Metadata error: {0}")]
    Metadata(String),
}

impl QueryError {
    /// Returns the bind error, if this is one.
    #[must_use]
    pub fn bind_error(&self) -> Option<&BindError> {
        match self {
            QueryError::Bind { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Tags a bind error with `clause` unless an inner clause already did.
    #[must_use]
    pub fn in_clause(self, clause: Clause) -> Self {
        match self {
            QueryError::Bind { error, context } if context.clause.is_none() => QueryError::Bind {
                error,
                context: context.in_clause(clause),
            },
            other => other,
        }
    }

    /// Returns the source position, if the error has one.
    #[must_use]
    pub fn context(&self) -> Option<ErrorContext> {
        match self {
            QueryError::Bind { context, .. } => Some(*context),
            QueryError::ParseError { line, col, .. } => Some(ErrorContext::new(*line, *col)),
            QueryError::Metadata(_) => None,
        }
    }
}
