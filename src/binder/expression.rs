//! Bound expression definitions.

use serde::{Deserialize, Serialize};

use crate::types::{DataType, Value};

/// Bound expression after semantic analysis.
///
/// Every node carries the type it evaluates to.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpression {
    /// Literal value (constant).
    Literal { value: Value, data_type: DataType },

    /// Typed null. Also used as the placeholder result of an aggregate
    /// before its group is built.
    Null { data_type: DataType },

    /// Query parameter `@name`.
    Parameter { name: String, data_type: DataType },

    /// Reference to a bound variable.
    VariableRef { variable: String, data_type: DataType },

    /// Member of a row-typed instance.
    Property {
        instance: Box<BoundExpression>,
        property: String,
        data_type: DataType,
    },

    /// Scan of an entity set.
    Scan {
        container: String,
        entity_set: String,
        data_type: DataType,
    },

    /// Call of a metadata function.
    FunctionCall {
        function: String,
        args: Vec<BoundExpression>,
        data_type: DataType,
    },

    /// Binary comparison.
    Comparison {
        left: Box<BoundExpression>,
        op: ComparisonOp,
        right: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Logical AND/OR/NOT.
    Logical {
        op: LogicalOp,
        operands: Vec<BoundExpression>,
        data_type: DataType,
    },

    /// Arithmetic operations.
    Arithmetic {
        left: Box<BoundExpression>,
        op: ArithmeticOp,
        right: Box<BoundExpression>,
        data_type: DataType,
    },

    /// IS NULL / IS NOT NULL.
    IsNull {
        operand: Box<BoundExpression>,
        negated: bool,
        data_type: DataType,
    },

    /// `{e1, e2, ...}`.
    NewCollection {
        items: Vec<BoundExpression>,
        data_type: DataType,
    },

    /// Row constructor.
    NewRow {
        fields: Vec<(String, BoundExpression)>,
        data_type: DataType,
    },

    /// Inline function body over named formals.
    Lambda {
        parameters: Vec<(String, DataType)>,
        body: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Application of a lambda to arguments.
    Invoke {
        lambda: Box<BoundExpression>,
        args: Vec<BoundExpression>,
        data_type: DataType,
    },

    /// Elements of the input satisfying a predicate.
    Filter {
        input: ExpressionBinding,
        predicate: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Projection of each input element.
    Project {
        input: ExpressionBinding,
        projection: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Duplicate elimination.
    Distinct {
        input: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Ordering.
    Sort {
        input: ExpressionBinding,
        keys: Vec<SortKey>,
        data_type: DataType,
    },

    /// Join of two inputs.
    Join {
        kind: JoinKind,
        left: ExpressionBinding,
        right: ExpressionBinding,
        condition: Box<BoundExpression>,
        data_type: DataType,
    },

    /// Correlated application of a collection to each input element.
    Apply {
        kind: ApplyKind,
        input: ExpressionBinding,
        apply: ExpressionBinding,
        data_type: DataType,
    },

    /// Grouping with keys and aggregates, producing one row per group.
    GroupBy {
        input: GroupBinding,
        keys: Vec<(String, BoundExpression)>,
        aggregates: Vec<(String, BoundExpression)>,
        data_type: DataType,
    },

    /// Aggregate function over a group, only valid inside [`BoundExpression::GroupBy`].
    Aggregate {
        function: String,
        args: Vec<BoundExpression>,
        distinct: bool,
        data_type: DataType,
    },

    /// The elements of a group collected into a collection.
    GroupAggregate {
        argument: Box<BoundExpression>,
        data_type: DataType,
    },
}

impl BoundExpression {
    /// Returns the data type of this expression.
    #[must_use]
    pub fn data_type(&self) -> &DataType {
        match self {
            BoundExpression::Literal { data_type, .. }
            | BoundExpression::Null { data_type }
            | BoundExpression::Parameter { data_type, .. }
            | BoundExpression::VariableRef { data_type, .. }
            | BoundExpression::Property { data_type, .. }
            | BoundExpression::Scan { data_type, .. }
            | BoundExpression::FunctionCall { data_type, .. }
            | BoundExpression::Comparison { data_type, .. }
            | BoundExpression::Logical { data_type, .. }
            | BoundExpression::Arithmetic { data_type, .. }
            | BoundExpression::IsNull { data_type, .. }
            | BoundExpression::NewCollection { data_type, .. }
            | BoundExpression::NewRow { data_type, .. }
            | BoundExpression::Lambda { data_type, .. }
            | BoundExpression::Invoke { data_type, .. }
            | BoundExpression::Filter { data_type, .. }
            | BoundExpression::Project { data_type, .. }
            | BoundExpression::Distinct { data_type, .. }
            | BoundExpression::Sort { data_type, .. }
            | BoundExpression::Join { data_type, .. }
            | BoundExpression::Apply { data_type, .. }
            | BoundExpression::GroupBy { data_type, .. }
            | BoundExpression::Aggregate { data_type, .. }
            | BoundExpression::GroupAggregate { data_type, .. } => data_type,
        }
    }

    /// Creates a literal expression.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        let data_type = value.data_type();
        BoundExpression::Literal { value, data_type }
    }

    /// Creates a typed null.
    #[must_use]
    pub fn null(data_type: DataType) -> Self {
        BoundExpression::Null { data_type }
    }

    /// Creates a variable reference.
    #[must_use]
    pub fn variable(variable: impl Into<String>, data_type: DataType) -> Self {
        BoundExpression::VariableRef {
            variable: variable.into(),
            data_type,
        }
    }

    /// Creates a property access with an explicit result type.
    #[must_use]
    pub fn property(self, property: impl Into<String>, data_type: DataType) -> Self {
        BoundExpression::Property {
            instance: Box::new(self),
            property: property.into(),
            data_type,
        }
    }

    /// Creates a comparison expression.
    #[must_use]
    pub fn comparison(left: BoundExpression, op: ComparisonOp, right: BoundExpression) -> Self {
        BoundExpression::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
            data_type: DataType::Bool,
        }
    }

    /// Creates a logical AND expression.
    #[must_use]
    pub fn and(operands: Vec<BoundExpression>) -> Self {
        BoundExpression::Logical {
            op: LogicalOp::And,
            operands,
            data_type: DataType::Bool,
        }
    }

    /// Creates a logical OR expression.
    #[must_use]
    pub fn or(operands: Vec<BoundExpression>) -> Self {
        BoundExpression::Logical {
            op: LogicalOp::Or,
            operands,
            data_type: DataType::Bool,
        }
    }

    /// Creates a logical NOT expression.
    #[must_use]
    pub fn not(operand: BoundExpression) -> Self {
        BoundExpression::Logical {
            op: LogicalOp::Not,
            operands: vec![operand],
            data_type: DataType::Bool,
        }
    }

    /// Returns the variable name if this is a variable reference.
    #[must_use]
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            BoundExpression::VariableRef { variable, .. } => Some(variable),
            _ => None,
        }
    }

    /// Returns true for a typed null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, BoundExpression::Null { .. })
    }
}

/// An input expression whose elements are named by a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionBinding {
    /// Collection being iterated.
    pub expression: Box<BoundExpression>,
    /// Name of the element variable.
    pub variable: String,
    /// Type of the element variable.
    pub variable_type: DataType,
}

impl ExpressionBinding {
    /// Binds `expression` under `variable`.
    ///
    /// # Panics
    ///
    /// Panics if `expression` is not collection-typed.
    #[must_use]
    pub fn new(expression: BoundExpression, variable: impl Into<String>) -> Self {
        let variable_type = match expression.data_type().element_type() {
            Some(element) => element.clone(),
            None => panic!("expression binding over a non-collection input"),
        };
        ExpressionBinding {
            expression: Box::new(expression),
            variable: variable.into(),
            variable_type,
        }
    }

    /// Returns a reference to the element variable.
    #[must_use]
    pub fn variable_ref(&self) -> BoundExpression {
        BoundExpression::variable(self.variable.clone(), self.variable_type.clone())
    }
}

/// Input of a group-by: the element variable and the per-group variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBinding {
    /// Collection being grouped.
    pub expression: Box<BoundExpression>,
    /// Element variable, visible to key expressions.
    pub variable: String,
    /// Group variable, visible to aggregate arguments.
    pub group_variable: String,
    /// Type of one input element.
    pub element_type: DataType,
}

impl GroupBinding {
    /// Creates a group binding over a collection-typed input.
    ///
    /// # Panics
    ///
    /// Panics if `expression` is not collection-typed.
    #[must_use]
    pub fn new(
        expression: BoundExpression,
        variable: impl Into<String>,
        group_variable: impl Into<String>,
    ) -> Self {
        let element_type = match expression.data_type().element_type() {
            Some(element) => element.clone(),
            None => panic!("group binding over a non-collection input"),
        };
        GroupBinding {
            expression: Box::new(expression),
            variable: variable.into(),
            group_variable: group_variable.into(),
            element_type,
        }
    }

    /// Returns a reference to the element variable.
    #[must_use]
    pub fn variable_ref(&self) -> BoundExpression {
        BoundExpression::variable(self.variable.clone(), self.element_type.clone())
    }

    /// Returns a reference to the group variable.
    #[must_use]
    pub fn group_variable_ref(&self) -> BoundExpression {
        BoundExpression::variable(self.group_variable.clone(), self.element_type.clone())
    }
}

/// Sort key for ORDER BY.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// The expression to sort by.
    pub expression: BoundExpression,
    /// Sort ascending (true) or descending (false).
    pub ascending: bool,
}

impl SortKey {
    /// Creates a new ascending sort key.
    #[must_use]
    pub fn asc(expression: BoundExpression) -> Self {
        SortKey {
            expression,
            ascending: true,
        }
    }

    /// Creates a new descending sort key.
    #[must_use]
    pub fn desc(expression: BoundExpression) -> Self {
        SortKey {
            expression,
            ascending: false,
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equal (=).
    Eq,
    /// Not equal (<>).
    Neq,
    /// Less than (<).
    Lt,
    /// Less than or equal (<=).
    Lte,
    /// Greater than (>).
    Gt,
    /// Greater than or equal (>=).
    Gte,
}

impl ComparisonOp {
    /// Returns the string representation of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
        }
    }

    /// Returns true for `=` and `<>`.
    #[must_use]
    pub fn is_equality(&self) -> bool {
        matches!(self, ComparisonOp::Eq | ComparisonOp::Neq)
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOp {
    /// Returns the string representation of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
        }
    }
}

/// Join kinds of the bound algebra. Right outer joins are normalized to left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Cross,
    Inner,
    LeftOuter,
    FullOuter,
}

/// Apply kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyKind {
    Cross,
    Outer,
}
