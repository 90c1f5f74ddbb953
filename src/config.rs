//! Resolver configuration.

use serde::{Deserialize, Serialize};

/// Compilation mode of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompilationMode {
    /// Full query language.
    #[default]
    Normal,
    /// Mapping-view queries: no GROUP BY, HAVING, ORDER BY or GROUPPARTITION.
    RestrictedViewGeneration,
}

/// Options controlling name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Compare identifiers without regard to case.
    pub case_insensitive_names: bool,
    /// Which subset of the language is accepted.
    pub compilation_mode: CompilationMode,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            case_insensitive_names: true,
            compilation_mode: CompilationMode::Normal,
        }
    }
}

impl ResolverConfig {
    /// Sets case-sensitive name comparison.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive_names = false;
        self
    }

    /// Sets the compilation mode.
    #[must_use]
    pub fn with_compilation_mode(mut self, mode: CompilationMode) -> Self {
        self.compilation_mode = mode;
        self
    }

    /// Returns true in restricted view-generation mode.
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        self.compilation_mode == CompilationMode::RestrictedViewGeneration
    }

    /// Compares two names under this configuration.
    #[must_use]
    pub fn names_equal(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive_names {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }

    /// Normalizes a name into its lookup key.
    #[must_use]
    pub fn name_key(&self, name: &str) -> String {
        if self.case_insensitive_names {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }
}
