//! Functions defined inline in the query text.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::catalog::FunctionParameter;
use crate::error::BindError;
use crate::parser::ast::FunctionDefinition;

use super::expression::BoundExpression;

#[derive(Debug, Clone)]
enum BodyState {
    Pending,
    Converting,
    Converted(BoundExpression),
}

/// One inline function overload.
#[derive(Debug)]
pub struct InlineFunction {
    /// Name as written in the definition.
    pub name: String,
    /// Formals with their resolved types.
    pub parameters: Vec<FunctionParameter>,
    /// Definition the body is converted from.
    pub definition: FunctionDefinition,
    state: RefCell<BodyState>,
}

impl InlineFunction {
    /// Creates an overload whose body is not converted yet.
    #[must_use]
    pub fn new(definition: FunctionDefinition, parameters: Vec<FunctionParameter>) -> Self {
        InlineFunction {
            name: definition.name.clone(),
            parameters,
            definition,
            state: RefCell::new(BodyState::Pending),
        }
    }

    /// Returns the converted lambda, if the body has been converted.
    #[must_use]
    pub fn lambda(&self) -> Option<BoundExpression> {
        match &*self.state.borrow() {
            BodyState::Converted(lambda) => Some(lambda.clone()),
            _ => None,
        }
    }

    /// Marks the body as being converted.
    ///
    /// # Errors
    ///
    /// Returns `RecursiveInlineFunction` if the body is already being
    /// converted, i.e. the function refers to itself.
    pub fn begin_conversion(&self) -> Result<(), BindError> {
        let mut state = self.state.borrow_mut();
        if matches!(*state, BodyState::Converting) {
            return Err(BindError::RecursiveInlineFunction(self.name.clone()));
        }
        *state = BodyState::Converting;
        Ok(())
    }

    /// Stores the converted lambda.
    pub fn complete_conversion(&self, lambda: BoundExpression) {
        *self.state.borrow_mut() = BodyState::Converted(lambda);
    }

    /// Resets a failed conversion.
    pub fn abort_conversion(&self) {
        *self.state.borrow_mut() = BodyState::Pending;
    }

    fn same_signature(&self, other: &InlineFunction) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

/// Inline functions of one statement, grouped by normalized name.
///
/// Shared between the statement resolver and the resolvers that convert
/// function bodies.
#[derive(Debug, Default)]
pub struct InlineFunctionTable {
    groups: HashMap<String, Vec<Rc<InlineFunction>>>,
}

impl InlineFunctionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        InlineFunctionTable::default()
    }

    /// Adds an overload under the normalized name `key`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateInlineFunction` if an overload with the same
    /// parameter types exists.
    pub fn declare(&mut self, key: String, function: InlineFunction) -> Result<(), BindError> {
        let group = self.groups.entry(key).or_default();
        if group.iter().any(|f| f.same_signature(&function)) {
            return Err(BindError::DuplicateInlineFunction(function.name));
        }
        group.push(Rc::new(function));
        Ok(())
    }

    /// Returns the overloads declared under `key`.
    #[must_use]
    pub fn group(&self, key: &str) -> Option<&[Rc<InlineFunction>]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Returns true if no functions are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
