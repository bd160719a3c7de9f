//! Settings loaded via OrthoConfig from CLI flags, `EDGECONFIG_*`
//! environment variables and configuration files.

use std::path::PathBuf;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{NamingRules, NamingRulesError};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/edgeconfig";

/// Connection and naming-rule settings for the inventory engine.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "EDGECONFIG")]
pub struct InventorySettings {
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// JSON file replacing the built-in edgefile naming rules.
    pub naming_rules_path: Option<PathBuf>,
    /// Upper bound on pooled connections.
    pub pool_max_size: Option<u32>,
}

impl InventorySettings {
    /// Return the configured database URL, falling back to the default.
    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }

    /// Load the configured naming rules, or the built-in set when no file
    /// is configured.
    pub fn naming_rules(&self) -> Result<NamingRules, NamingRulesError> {
        match &self.naming_rules_path {
            Some(path) => NamingRules::load(path),
            None => Ok(NamingRules::default()),
        }
    }
}
