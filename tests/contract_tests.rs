//! Contract tests for the public binding API.

use queryscope::{bind, CompilationMode, ResolverConfig};

// =============================================================================
// Binder Contract Tests
// =============================================================================

#[path = "binder_contracts/mod.rs"]
mod binder_contracts;

// =============================================================================
// Configuration Contract Tests
// =============================================================================

mod config_contracts {
    use super::*;
    use queryscope::catalog::Catalog;

    #[test]
    fn test_default_config_is_case_insensitive_normal_mode() {
        let config = ResolverConfig::default();
        assert!(config.case_insensitive_names);
        assert_eq!(config.compilation_mode, CompilationMode::Normal);
        assert!(!config.is_restricted());
    }

    #[test]
    fn test_case_sensitive_config_rejects_wrong_case() {
        let catalog = Catalog::with_builtins();
        let config = ResolverConfig::default().case_sensitive();
        assert!(bind("SELECT VALUE x FROM {1} AS x", &catalog, &config).is_ok());
        assert!(bind("SELECT VALUE X FROM {1} AS x", &catalog, &config).is_err());
    }
}
