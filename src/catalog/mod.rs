//! Metadata consulted by the binder: containers, namespaces, types and functions.

mod function;
mod schema;

pub use function::{resolve_overloads, FunctionOverload, FunctionParameter, OverloadResolution};
pub use schema::{Catalog, ContainerMember, EntityContainer, EntitySet, BUILTIN_NAMESPACE};

use crate::types::DataType;

/// Non-value result of name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataMember {
    /// Namespace, possibly only assumed to exist.
    Namespace(String),
    /// Named type.
    Type { name: String, data_type: DataType },
    /// Overloads of a metadata function.
    FunctionGroup {
        name: String,
        overloads: Vec<FunctionOverload>,
    },
    /// Functions defined inline in the query text.
    InlineFunctionGroup(String),
}

impl MetadataMember {
    /// Returns the (qualified) name of the member.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MetadataMember::Namespace(name)
            | MetadataMember::Type { name, .. }
            | MetadataMember::FunctionGroup { name, .. }
            | MetadataMember::InlineFunctionGroup(name) => name,
        }
    }
}

/// Case-insensitive lookup matched several members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousName {
    /// Name being resolved.
    pub name: String,
    /// Full names of the matching members.
    pub candidates: Vec<String>,
}

/// Metadata collaborator of the resolver.
pub trait Metadata {
    /// Returns the container whose members are visible unqualified.
    fn default_container(&self) -> Option<&EntityContainer>;

    /// Looks up an entity container by name.
    fn entity_container(&self, name: &str, ignore_case: bool) -> Option<&EntityContainer>;

    /// Looks up an extent or function import of `container`.
    fn container_member<'c>(
        &self,
        container: &'c EntityContainer,
        name: &str,
        ignore_case: bool,
    ) -> Option<ContainerMember<'c>> {
        container.member(name, ignore_case)
    }

    /// Resolves a name that is not qualified by a namespace.
    ///
    /// # Errors
    ///
    /// Returns [`AmbiguousName`] when several members match.
    fn resolve_unqualified_name(
        &self,
        name: &str,
        ignore_case: bool,
    ) -> Result<Option<MetadataMember>, AmbiguousName>;

    /// Resolves `name` as a member of `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`AmbiguousName`] when several members match.
    fn resolve_member(
        &self,
        namespace: &str,
        name: &str,
        ignore_case: bool,
    ) -> Result<Option<MetadataMember>, AmbiguousName>;
}
