//! Data types and literal values.

mod data_type;
mod value;

pub use data_type::{DataType, RowField};
pub use value::Value;
