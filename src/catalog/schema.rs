//! In-memory metadata: entity containers, namespaces and functions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::types::DataType;

use super::function::{FunctionOverload, FunctionParameter};
use super::{AmbiguousName, Metadata, MetadataMember};

/// Namespace of the built-in types and functions.
pub const BUILTIN_NAMESPACE: &str = "Edm";

/// Named collection of rows inside an entity container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    /// Set name.
    pub name: String,
    /// Row type of each element.
    pub element_type: DataType,
}

impl EntitySet {
    /// Returns the type of a scan over this set.
    #[must_use]
    pub fn collection_type(&self) -> DataType {
        DataType::collection(self.element_type.clone())
    }
}

/// Member of an entity container.
#[derive(Debug, Clone, Copy)]
pub enum ContainerMember<'a> {
    /// Extent.
    EntitySet(&'a EntitySet),
    /// Function import.
    FunctionImport(&'a FunctionOverload),
}

/// Container of entity sets and function imports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityContainer {
    /// Container name.
    pub name: String,
    entity_sets: Vec<EntitySet>,
    function_imports: Vec<FunctionOverload>,
}

impl EntityContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        EntityContainer {
            name: name.into(),
            entity_sets: Vec::new(),
            function_imports: Vec::new(),
        }
    }

    /// Adds an entity set with the given row type.
    #[must_use]
    pub fn with_entity_set(mut self, name: impl Into<String>, element_type: DataType) -> Self {
        self.entity_sets.push(EntitySet {
            name: name.into(),
            element_type,
        });
        self
    }

    /// Adds a function import.
    #[must_use]
    pub fn with_function_import(mut self, function: FunctionOverload) -> Self {
        self.function_imports.push(function);
        self
    }

    /// Returns all entity sets.
    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.entity_sets.iter()
    }

    /// Looks up an entity set or function import by name.
    #[must_use]
    pub fn member(&self, name: &str, ignore_case: bool) -> Option<ContainerMember<'_>> {
        let matches = |candidate: &str| names_match(candidate, name, ignore_case);
        if let Some(set) = self.entity_sets.iter().find(|s| matches(&s.name)) {
            return Some(ContainerMember::EntitySet(set));
        }
        self.function_imports
            .iter()
            .find(|f| matches(&f.name))
            .map(ContainerMember::FunctionImport)
    }
}

/// Types and functions of one namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Namespace {
    name: String,
    types: Vec<(String, DataType)>,
    functions: Vec<FunctionOverload>,
}

impl Namespace {
    /// Resolves a type or function group declared directly in this namespace.
    fn member(&self, name: &str, ignore_case: bool) -> std::result::Result<Option<MetadataMember>, AmbiguousName> {
        let mut found: Vec<MetadataMember> = Vec::new();

        for (type_name, data_type) in &self.types {
            if names_match(type_name, name, ignore_case) {
                found.push(MetadataMember::Type {
                    name: format!("{}.{type_name}", self.name),
                    data_type: data_type.clone(),
                });
            }
        }

        // Overloads sharing the exact name form one group.
        let mut groups: Vec<(String, Vec<FunctionOverload>)> = Vec::new();
        for function in self.functions.iter().filter(|f| names_match(&f.name, name, ignore_case)) {
            match groups.iter_mut().find(|(n, _)| *n == function.name) {
                Some((_, overloads)) => overloads.push(function.clone()),
                None => groups.push((function.name.clone(), vec![function.clone()])),
            }
        }
        for (group_name, overloads) in groups {
            found.push(MetadataMember::FunctionGroup {
                name: format!("{}.{group_name}", self.name),
                overloads,
            });
        }

        single_or_ambiguous(name, found)
    }
}

/// In-memory implementation of [`Metadata`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    containers: Vec<EntityContainer>,
    default_container: Option<usize>,
    namespaces: HashMap<String, Namespace>,
    /// Namespaces searched for unqualified names.
    imports: Vec<String>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Creates a catalog with the built-in namespace registered and imported.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Catalog::new();
        catalog.register_builtins();
        catalog
    }

    fn register_builtins(&mut self) {
        let ns = self.namespace_mut(BUILTIN_NAMESPACE);
        ns.types = vec![
            ("Int32".into(), DataType::Int32),
            ("Int64".into(), DataType::Int64),
            ("Double".into(), DataType::Float64),
            ("Boolean".into(), DataType::Bool),
            ("String".into(), DataType::String),
        ];

        let numeric = [DataType::Int32, DataType::Int64, DataType::Float64];
        let mut functions = Vec::new();
        for name in ["MAX", "MIN"] {
            for t in numeric.iter().chain([&DataType::String]) {
                functions.push(FunctionOverload::aggregate(BUILTIN_NAMESPACE, name, t.clone(), t.clone()));
            }
        }
        for t in &numeric {
            functions.push(FunctionOverload::aggregate(BUILTIN_NAMESPACE, "SUM", t.clone(), t.clone()));
            functions.push(FunctionOverload::aggregate(BUILTIN_NAMESPACE, "AVG", t.clone(), DataType::Float64));
            functions.push(FunctionOverload::scalar(
                BUILTIN_NAMESPACE,
                "ABS",
                vec![FunctionParameter::new("value", t.clone())],
                t.clone(),
            ));
        }
        for t in numeric.iter().chain([&DataType::Bool, &DataType::String]) {
            functions.push(FunctionOverload::aggregate(BUILTIN_NAMESPACE, "COUNT", t.clone(), DataType::Int32));
        }
        functions.push(FunctionOverload::scalar(
            BUILTIN_NAMESPACE,
            "LENGTH",
            vec![FunctionParameter::new("value", DataType::String)],
            DataType::Int32,
        ));
        for name in ["UPPER", "LOWER"] {
            functions.push(FunctionOverload::scalar(
                BUILTIN_NAMESPACE,
                name,
                vec![FunctionParameter::new("value", DataType::String)],
                DataType::String,
            ));
        }
        ns.functions = functions;

        self.import_namespace(BUILTIN_NAMESPACE);
    }

    fn namespace_mut(&mut self, name: &str) -> &mut Namespace {
        self.namespaces.entry(name.to_string()).or_insert_with(|| Namespace {
            name: name.to_string(),
            ..Namespace::default()
        })
    }

    /// Adds a namespace to the list searched for unqualified names.
    pub fn import_namespace(&mut self, name: &str) {
        if !self.imports.iter().any(|n| n == name) {
            self.imports.push(name.to_string());
        }
    }

    /// Registers a function overload in its namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if an overload with the same parameter types exists.
    pub fn add_function(&mut self, function: FunctionOverload) -> Result<()> {
        let ns = self.namespace_mut(&function.namespace);
        if ns
            .functions
            .iter()
            .any(|f| f.name == function.name && f.same_signature(&function))
        {
            return Err(QueryError::Metadata(format!(
                "Function '{}' already has an overload with the same parameters",
                function.full_name()
            )));
        }
        ns.functions.push(function);
        Ok(())
    }

    /// Registers a named type in a namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace already declares the name.
    pub fn add_type(&mut self, namespace: &str, name: &str, data_type: DataType) -> Result<()> {
        let ns = self.namespace_mut(namespace);
        if ns.types.iter().any(|(n, _)| n == name) {
            return Err(QueryError::Metadata(format!(
                "Type '{namespace}.{name}' already exists"
            )));
        }
        ns.types.push((name.to_string(), data_type));
        Ok(())
    }

    /// Registers an entity container.
    ///
    /// # Errors
    ///
    /// Returns an error if a container with the same name exists.
    pub fn add_container(&mut self, container: EntityContainer) -> Result<()> {
        if self.containers.iter().any(|c| c.name == container.name) {
            return Err(QueryError::Metadata(format!(
                "Entity container '{}' already exists",
                container.name
            )));
        }
        self.containers.push(container);
        Ok(())
    }

    /// Makes a registered container the default one.
    ///
    /// # Errors
    ///
    /// Returns an error if no container has the given name.
    pub fn set_default_container(&mut self, name: &str) -> Result<()> {
        let index = self
            .containers
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| QueryError::Metadata(format!("Entity container '{name}' does not exist")))?;
        self.default_container = Some(index);
        Ok(())
    }

    fn find_namespace(&self, name: &str, ignore_case: bool) -> Option<&Namespace> {
        self.namespaces
            .values()
            .find(|ns| names_match(&ns.name, name, ignore_case))
    }
}

impl Metadata for Catalog {
    fn default_container(&self) -> Option<&EntityContainer> {
        self.default_container.map(|i| &self.containers[i])
    }

    fn entity_container(&self, name: &str, ignore_case: bool) -> Option<&EntityContainer> {
        self.containers
            .iter()
            .find(|c| names_match(&c.name, name, ignore_case))
    }

    fn resolve_unqualified_name(
        &self,
        name: &str,
        ignore_case: bool,
    ) -> std::result::Result<Option<MetadataMember>, AmbiguousName> {
        if let Some(ns) = self.find_namespace(name, ignore_case) {
            return Ok(Some(MetadataMember::Namespace(ns.name.clone())));
        }

        let mut found = Vec::new();
        for import in &self.imports {
            if let Some(ns) = self.namespaces.get(import) {
                if let Some(member) = ns.member(name, ignore_case)? {
                    found.push(member);
                }
            }
        }
        single_or_ambiguous(name, found)
    }

    fn resolve_member(
        &self,
        namespace: &str,
        name: &str,
        ignore_case: bool,
    ) -> std::result::Result<Option<MetadataMember>, AmbiguousName> {
        let nested = format!("{namespace}.{name}");
        if let Some(ns) = self.find_namespace(&nested, ignore_case) {
            return Ok(Some(MetadataMember::Namespace(ns.name.clone())));
        }
        match self.find_namespace(namespace, ignore_case) {
            Some(ns) => ns.member(name, ignore_case),
            None => Ok(None),
        }
    }
}

fn names_match(candidate: &str, name: &str, ignore_case: bool) -> bool {
    if ignore_case {
        candidate.eq_ignore_ascii_case(name)
    } else {
        candidate == name
    }
}

fn single_or_ambiguous(
    name: &str,
    mut found: Vec<MetadataMember>,
) -> std::result::Result<Option<MetadataMember>, AmbiguousName> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(AmbiguousName {
            name: name.to_string(),
            candidates: found.iter().map(|m| m.name().to_string()).collect(),
        }),
    }
}
