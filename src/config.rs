//! Registry configuration loading.
//!
//! The directive table (`{name, stage, description, depends_on}` entries) and
//! the extension key mapping can be supplied as a YAML or JSON file; YAML
//! parsing accepts both. Absent sections fall back to the built-in defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::{MatterpipeError, Result};
use crate::directives::{DirectiveConfig, DirectiveKeys, DirectiveRegistry};

/// On-disk registry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryFile {
    /// Directive table; `None` keeps the built-in directives.
    #[serde(default)]
    pub directives: Option<Vec<DirectiveConfig>>,
    /// Extension key mapping; `None` keeps the `x-` prefixed defaults.
    #[serde(default)]
    pub keys: Option<DirectiveKeys>,
}

impl RegistryFile {
    /// Construct the registry and key mapping this file describes.
    ///
    /// Registry construction re-validates names, duplicates, and
    /// dependencies; the key mapping is checked for distinctness.
    pub fn into_parts(self) -> Result<(DirectiveRegistry, DirectiveKeys)> {
        let registry = match self.directives {
            Some(configs) => DirectiveRegistry::new(configs)?,
            None => DirectiveRegistry::default(),
        };
        let keys = self.keys.unwrap_or_default();
        keys.validate()?;
        Ok((registry, keys))
    }
}

/// Read and parse a registry configuration file.
pub async fn load_registry_file(path: &Path) -> Result<RegistryFile> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_yaml::from_str(&content).map_err(|e| MatterpipeError::SchemaParse {
        file: path.display().to_string(),
        reason: format!("invalid registry configuration: {e}"),
    })
}

/// Load a registry configuration, or the defaults when no path is given.
pub async fn load_registry(
    path: Option<&Path>,
) -> Result<(DirectiveRegistry, DirectiveKeys)> {
    match path {
        Some(path) => load_registry_file(path).await?.into_parts(),
        None => Ok((DirectiveRegistry::default(), DirectiveKeys::default())),
    }
}
