//! queryscope - semantic resolution for an entity query language
//!
//! Parses a query into an AST and binds it against a metadata catalog,
//! producing a typed expression tree with every name resolved, every
//! function overload chosen, and every aggregate placed in the query block
//! that evaluates it.
//!
//! ```
//! use queryscope::catalog::{Catalog, EntityContainer};
//! use queryscope::types::DataType;
//! use queryscope::{bind, ResolverConfig};
//!
//! let mut catalog = Catalog::with_builtins();
//! catalog
//!     .add_container(EntityContainer::new("Store").with_entity_set(
//!         "Products",
//!         DataType::row([("Name", DataType::String), ("Price", DataType::Int32)]),
//!     ))
//!     .unwrap();
//! catalog.set_default_container("Store").unwrap();
//!
//! let bound = bind(
//!     "SELECT p.Price, count(p.Name) AS n FROM Products AS p GROUP BY p.Price",
//!     &catalog,
//!     &ResolverConfig::default(),
//! )
//! .unwrap();
//! assert!(bound.data_type().is_collection());
//! ```

pub mod binder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod parser;
pub mod types;

pub use binder::{Binder, BoundExpression, BoundStatement};
pub use catalog::Metadata;
pub use config::{CompilationMode, ResolverConfig};
pub use error::{BindError, Clause, ErrorContext, QueryError, Result};
pub use types::{DataType, Value};

use tracing::debug;

/// Parses and binds a query in one step.
///
/// # Errors
///
/// Returns `ParseError` for malformed text and `Bind` for semantic errors.
pub fn bind(query: &str, metadata: &dyn Metadata, config: &ResolverConfig) -> Result<BoundStatement> {
    let statement = parser::parse_query(query)?;
    let bound = Binder::new(metadata)
        .with_config(*config)
        .bind_statement(&statement)?;
    debug!(data_type = %bound.data_type(), "bound statement");
    Ok(bound)
}
