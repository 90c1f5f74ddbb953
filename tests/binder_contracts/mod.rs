//! Contract tests for the binder.
//!
//! These tests verify the resolution contracts:
//! - Aggregates evaluate in the innermost block they reference
//! - Aggregates cannot contain aggregates evaluated in the same range
//! - Speculative grouping leaves no trace when nothing aggregates
//! - Errors carry the position and clause of the offending node

mod aggregate_contract;
mod resolution_contract;

use queryscope::catalog::{Catalog, EntityContainer};
use queryscope::types::DataType;
use queryscope::{BoundStatement, QueryError, ResolverConfig};

/// Creates a test catalog with a Store container holding Products and Orders.
pub fn store() -> Catalog {
    let mut catalog = Catalog::with_builtins();
    catalog
        .add_container(
            EntityContainer::new("Store")
                .with_entity_set(
                    "Products",
                    DataType::row([
                        ("Id", DataType::Int64),
                        ("Name", DataType::String),
                        ("Price", DataType::Int32),
                    ]),
                )
                .with_entity_set(
                    "Orders",
                    DataType::row([("ProductId", DataType::Int64), ("Quantity", DataType::Int32)]),
                ),
        )
        .unwrap();
    catalog.set_default_container("Store").unwrap();
    catalog
}

pub fn bind(query: &str) -> Result<BoundStatement, QueryError> {
    queryscope::bind(query, &store(), &ResolverConfig::default())
}

pub fn bind_err(query: &str) -> QueryError {
    match bind(query) {
        Ok(bound) => panic!("expected an error for {query:?}, got {:?}", bound.expression),
        Err(err) => err,
    }
}
