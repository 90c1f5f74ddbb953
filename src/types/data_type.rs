//! Type system used by the binder.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named, typed field of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowField {
    /// Field name.
    pub name: String,
    /// Field type.
    pub data_type: DataType,
}

impl RowField {
    /// Creates a new row field.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        RowField {
            name: name.into(),
            data_type,
        }
    }
}

/// Result type of a bound expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Multiset of elements.
    Collection(Box<DataType>),
    /// Ordered record of named fields.
    Row(Vec<RowField>),
}

impl DataType {
    /// Creates a collection type over `element`.
    #[must_use]
    pub fn collection(element: DataType) -> Self {
        DataType::Collection(Box::new(element))
    }

    /// Creates a row type from `(name, type)` pairs.
    #[must_use]
    pub fn row<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        DataType::Row(
            fields
                .into_iter()
                .map(|(name, data_type)| RowField::new(name, data_type))
                .collect(),
        )
    }

    /// Returns whether this type is a scalar primitive.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float64 | DataType::Bool | DataType::String
        )
    }

    /// Returns whether this type is numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }

    /// Returns whether this type is a collection.
    #[must_use]
    pub fn is_collection(&self) -> bool {
        matches!(self, DataType::Collection(_))
    }

    /// Returns the element type of a collection.
    #[must_use]
    pub fn element_type(&self) -> Option<&DataType> {
        match self {
            DataType::Collection(element) => Some(element),
            _ => None,
        }
    }

    /// Returns whether values of this type support equality.
    ///
    /// Valid for group keys, DISTINCT and `=`/`<>`.
    #[must_use]
    pub fn is_equal_comparable(&self) -> bool {
        match self {
            DataType::Row(fields) => fields.iter().all(|f| f.data_type.is_equal_comparable()),
            DataType::Collection(_) => false,
            _ => true,
        }
    }

    /// Returns whether values of this type support ordering.
    #[must_use]
    pub fn is_order_comparable(&self) -> bool {
        self.is_primitive()
    }

    /// Returns whether this type is a valid group key type.
    #[must_use]
    pub fn is_valid_group_key(&self) -> bool {
        self.is_equal_comparable()
    }

    /// Looks up a row field by name.
    #[must_use]
    pub fn property(&self, name: &str, ignore_case: bool) -> Option<&RowField> {
        match self {
            DataType::Row(fields) => fields.iter().find(|f| {
                if ignore_case {
                    f.name.eq_ignore_ascii_case(name)
                } else {
                    f.name == name
                }
            }),
            _ => None,
        }
    }

    /// Returns whether a value of this type can be implicitly promoted to `target`.
    ///
    /// Promotion is reflexive, follows `INT32 -> INT64 -> FLOAT64`, and is
    /// covariant through collections and rows with matching field names.
    #[must_use]
    pub fn is_promotable_to(&self, target: &DataType) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (DataType::Int32, DataType::Int64 | DataType::Float64)
            | (DataType::Int64, DataType::Float64) => true,
            (DataType::Collection(from), DataType::Collection(to)) => from.is_promotable_to(to),
            (DataType::Row(from), DataType::Row(to)) => {
                from.len() == to.len()
                    && from
                        .iter()
                        .zip(to)
                        .all(|(f, t)| f.name == t.name && f.data_type.is_promotable_to(&t.data_type))
            }
            _ => false,
        }
    }

    /// Returns the narrowest type both `self` and `other` promote to.
    #[must_use]
    pub fn common_supertype(&self, other: &DataType) -> Option<DataType> {
        if self.is_promotable_to(other) {
            Some(other.clone())
        } else if other.is_promotable_to(self) {
            Some(self.clone())
        } else {
            None
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int32 => f.write_str("INT32"),
            DataType::Int64 => f.write_str("INT64"),
            DataType::Float64 => f.write_str("FLOAT64"),
            DataType::Bool => f.write_str("BOOL"),
            DataType::String => f.write_str("STRING"),
            DataType::Collection(element) => write!(f, "COLLECTION({element})"),
            DataType::Row(fields) => {
                f.write_str("ROW(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", field.name, field.data_type)?;
                }
                f.write_str(")")
            }
        }
    }
}
