//! Function signatures and overload resolution.

use serde::{Deserialize, Serialize};

use crate::types::DataType;

/// Formal parameter of a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionParameter {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
}

impl FunctionParameter {
    /// Creates a new parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        FunctionParameter {
            name: name.into(),
            data_type,
        }
    }
}

/// One overload of a metadata function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOverload {
    /// Namespace the function belongs to.
    pub namespace: String,
    /// Function name.
    pub name: String,
    /// Ordered parameters.
    pub parameters: Vec<FunctionParameter>,
    /// Result type.
    pub return_type: DataType,
    /// Whether this function reduces a collection to a scalar.
    pub is_aggregate: bool,
}

impl FunctionOverload {
    /// Creates a scalar function overload.
    #[must_use]
    pub fn scalar(
        namespace: impl Into<String>,
        name: impl Into<String>,
        parameters: Vec<FunctionParameter>,
        return_type: DataType,
    ) -> Self {
        FunctionOverload {
            namespace: namespace.into(),
            name: name.into(),
            parameters,
            return_type,
            is_aggregate: false,
        }
    }

    /// Creates an aggregate function overload over a collection of `element`.
    #[must_use]
    pub fn aggregate(
        namespace: impl Into<String>,
        name: impl Into<String>,
        element: DataType,
        return_type: DataType,
    ) -> Self {
        FunctionOverload {
            namespace: namespace.into(),
            name: name.into(),
            parameters: vec![FunctionParameter::new(
                "collection",
                DataType::collection(element),
            )],
            return_type,
            is_aggregate: true,
        }
    }

    /// Returns the namespace-qualified name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Returns whether both overloads take the same parameter types.
    #[must_use]
    pub fn same_signature(&self, other: &FunctionOverload) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

/// Outcome of overload resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadResolution {
    /// Index of the single best candidate.
    Resolved(usize),
    /// No candidate accepts the arguments.
    NotFound,
    /// Several candidates are equally good.
    Ambiguous,
}

/// Picks the best overload for the given argument types.
///
/// `None` in `arg_types` stands for an untyped null, which promotes to any
/// non-collection type. With `group_aggregate` set, each collection parameter
/// is matched against its element type, so that `MAX(x)` over a group binds
/// to `MAX(COLLECTION(T))`. The candidate with the most exact matches wins.
pub fn resolve_overloads<T>(
    candidates: &[T],
    arg_types: &[Option<DataType>],
    parameters: impl Fn(&T) -> &[FunctionParameter],
    group_aggregate: bool,
) -> OverloadResolution {
    let mut best: Option<(usize, usize)> = None;
    let mut ambiguous = false;

    for (index, candidate) in candidates.iter().enumerate() {
        let Some(rank) = rank_candidate(parameters(candidate), arg_types, group_aggregate) else {
            continue;
        };
        match best {
            Some((_, best_rank)) if rank < best_rank => {}
            Some((_, best_rank)) if rank == best_rank => ambiguous = true,
            _ => {
                best = Some((index, rank));
                ambiguous = false;
            }
        }
    }

    match best {
        None => OverloadResolution::NotFound,
        Some(_) if ambiguous => OverloadResolution::Ambiguous,
        Some((index, _)) => OverloadResolution::Resolved(index),
    }
}

/// Number of exact argument matches, or `None` if some argument does not fit.
fn rank_candidate(
    parameters: &[FunctionParameter],
    arg_types: &[Option<DataType>],
    group_aggregate: bool,
) -> Option<usize> {
    if parameters.len() != arg_types.len() {
        return None;
    }
    let mut exact = 0;
    for (param, arg) in parameters.iter().zip(arg_types) {
        let param_type = if group_aggregate {
            param.data_type.element_type()?
        } else {
            &param.data_type
        };
        match arg {
            None if param_type.is_collection() => return None,
            None => exact += 1,
            Some(arg) if arg == param_type => exact += 1,
            Some(arg) if arg.is_promotable_to(param_type) => {}
            Some(_) => return None,
        }
    }
    Some(exact)
}
