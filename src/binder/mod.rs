//! Binder module for semantic analysis.
//!
//! The binder turns a parsed statement into a typed expression tree:
//! - Names are resolved against nested scopes, query parameters, command
//!   variables and the metadata catalog
//! - Function calls are matched to overloads, inline functions to lambdas
//! - Aggregates are attached to the query block they evaluate in, which
//!   may be an enclosing block, and the block is grouped accordingly
//!
//! The output is a [`BoundStatement`] whose tree has no unresolved names.

mod aggregate;
mod expression;
mod group_by;
mod inline;
mod region;
mod resolver;
mod scope;
mod semantic;

pub use aggregate::{AggregateArena, AggregateDescriptor, AggregateId, AggregateKind, Interpretation};
pub use expression::{
    ApplyKind, ArithmeticOp, BoundExpression, ComparisonOp, ExpressionBinding, GroupBinding, JoinKind,
    LogicalOp, SortKey,
};
pub use inline::{InlineFunction, InlineFunctionTable};
pub use region::ScopeRegion;
pub use resolver::{AggregateGuard, ExpressionResolution, IgnoreContainerGuard, RegionGuard, Resolver};
pub use scope::{Scope, ScopeEntry, ScopeManager, SourceVariable, VarRef};
pub use semantic::{Binder, BoundStatement};
