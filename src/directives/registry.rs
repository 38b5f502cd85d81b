//! Directive registry: stage-ordered configuration of the directive set
//!
//! The registry holds one [`DirectiveConfig`] per directive name and computes
//! the pipeline's processing order. Stage numbers are the sole ordering
//! authority: directives sort by ascending stage with declaration order
//! preserved on ties. Dependency lists are used only to *validate* that a
//! directive's prerequisites are registered; schema-authoring tooling is
//! responsible for keeping declared stages consistent with declared
//! dependencies (documented contract, not enforced topologically).
//!
//! Construction validates the full set up front and is atomic: a partial
//! registry is never exposed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::core::{MatterpipeError, Result};
use crate::directives::DirectiveKind;

/// Static configuration of one directive: identity, ordering, provenance.
///
/// Immutable after registry construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectiveConfig {
    /// Globally unique directive name; must match a known [`DirectiveKind`].
    pub name: String,
    /// Ordering key; lower stages run first.
    pub stage: i64,
    /// Human description shown by diagnostic tooling.
    pub description: String,
    /// Names of directives that must also be registered for this one to make
    /// sense. Validated at construction, never used for ordering.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Validated, immutable directive set with a stable processing order.
#[derive(Debug, Clone)]
pub struct DirectiveRegistry {
    configs: Vec<DirectiveConfig>,
    by_name: HashMap<String, usize>,
}

impl Default for DirectiveRegistry {
    /// The built-in registry: all eight kinds at stages 10 through 80.
    fn default() -> Self {
        Self::new(builtin_configs()).expect("built-in directive configuration is valid")
    }
}

impl DirectiveRegistry {
    /// Construct a registry from directive configurations.
    ///
    /// # Errors
    ///
    /// - [`MatterpipeError::UnknownDirective`] for a name outside the known set
    /// - [`MatterpipeError::DuplicateDirective`] for a repeated name
    /// - [`MatterpipeError::UnknownDependency`] for a `depends_on` entry that
    ///   is not itself registered
    /// - [`MatterpipeError::InvalidDirectiveConfig`] for an empty description
    ///
    /// Any failure aborts construction; partial registries are never exposed.
    pub fn new(configs: Vec<DirectiveConfig>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            Self::validate_config(config)?;
            if by_name.insert(config.name.clone(), index).is_some() {
                return Err(MatterpipeError::DuplicateDirective {
                    name: config.name.clone(),
                });
            }
        }

        // Dependency validation needs the full name set, so it runs second.
        for config in &configs {
            for dependency in &config.depends_on {
                if !by_name.contains_key(dependency) {
                    return Err(MatterpipeError::UnknownDependency {
                        directive: config.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        tracing::debug!(directives = configs.len(), "directive registry constructed");
        Ok(Self { configs, by_name })
    }

    /// Validate a single configuration entry in isolation.
    pub fn validate_config(config: &DirectiveConfig) -> Result<()> {
        DirectiveKind::from_str(&config.name)?;
        if config.description.trim().is_empty() {
            return Err(MatterpipeError::InvalidDirectiveConfig {
                name: config.name.clone(),
                reason: "description must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Look up one directive's configuration by name.
    pub fn get(&self, name: &str) -> Result<&DirectiveConfig> {
        self.by_name
            .get(name)
            .map(|&index| &self.configs[index])
            .ok_or_else(|| MatterpipeError::UnknownDirective { name: name.to_string() })
    }

    /// Whether a directive name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// The pipeline's execution order: ascending stage, stable on ties.
    #[must_use]
    pub fn processing_order(&self) -> Vec<&DirectiveConfig> {
        let mut ordered: Vec<&DirectiveConfig> = self.configs.iter().collect();
        ordered.sort_by_key(|config| config.stage);
        ordered
    }

    /// Number of registered directives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

/// The built-in directive set. Stages mirror the dependency contract:
/// derived-unique follows derived-from, template-items follows template.
fn builtin_configs() -> Vec<DirectiveConfig> {
    let entry = |kind: DirectiveKind, stage: i64, description: &str, depends_on: &[&str]| {
        DirectiveConfig {
            name: kind.name().to_string(),
            stage,
            description: description.to_string(),
            depends_on: depends_on.iter().map(|s| (*s).to_string()).collect(),
        }
    };

    vec![
        entry(
            DirectiveKind::FrontmatterPart,
            10,
            "Mark the array property that expands one document into per-item documents",
            &[],
        ),
        entry(
            DirectiveKind::DerivedFrom,
            20,
            "Collect values from a source path across all documents in the batch",
            &[],
        ),
        entry(
            DirectiveKind::DerivedUnique,
            30,
            "Deduplicate a derived array, first occurrence wins",
            &["derived-from"],
        ),
        entry(
            DirectiveKind::FlattenArrays,
            40,
            "Flatten nested arrays at a dotted path to a single depth",
            &[],
        ),
        entry(
            DirectiveKind::JmespathFilter,
            50,
            "Filter document data through a JMESPath expression",
            &[],
        ),
        entry(DirectiveKind::Template, 60, "Bind the main output template", &[]),
        entry(
            DirectiveKind::TemplateItems,
            70,
            "Render an item template against every element of a target array",
            &["template"],
        ),
        entry(
            DirectiveKind::TemplateFormat,
            80,
            "Record the output serialization format",
            &[],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, stage: i64) -> DirectiveConfig {
        DirectiveConfig {
            name: name.into(),
            stage,
            description: format!("{name} directive"),
            depends_on: vec![],
        }
    }

    #[test]
    fn default_registry_contains_all_kinds() {
        let registry = DirectiveRegistry::default();
        assert_eq!(registry.len(), 8);
        for kind in DirectiveKind::ALL {
            assert!(registry.contains(kind.name()));
        }
    }

    #[test]
    fn processing_order_sorts_by_stage() {
        let registry = DirectiveRegistry::new(vec![
            config("template", 60),
            config("derived-from", 20),
            config("frontmatter-part", 10),
        ])
        .unwrap();
        let order: Vec<&str> =
            registry.processing_order().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, vec!["frontmatter-part", "derived-from", "template"]);
    }

    #[test]
    fn stage_ties_preserve_declaration_order() {
        let registry = DirectiveRegistry::new(vec![
            config("template", 5),
            config("derived-from", 5),
            config("flatten-arrays", 5),
        ])
        .unwrap();
        let order: Vec<&str> =
            registry.processing_order().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(order, vec!["template", "derived-from", "flatten-arrays"]);
    }

    #[test]
    fn duplicate_name_fails_construction() {
        let err =
            DirectiveRegistry::new(vec![config("template", 1), config("template", 2)]).unwrap_err();
        assert!(matches!(err, MatterpipeError::DuplicateDirective { name } if name == "template"));
    }

    #[test]
    fn unknown_dependency_fails_construction() {
        let mut bad = config("derived-unique", 30);
        bad.depends_on = vec!["derived-from".into()];
        let err = DirectiveRegistry::new(vec![bad]).unwrap_err();
        assert!(matches!(
            err,
            MatterpipeError::UnknownDependency { directive, dependency }
                if directive == "derived-unique" && dependency == "derived-from"
        ));
    }

    #[test]
    fn unknown_name_fails_construction() {
        let err = DirectiveRegistry::new(vec![config("not-a-directive", 1)]).unwrap_err();
        assert!(matches!(err, MatterpipeError::UnknownDirective { .. }));
    }

    #[test]
    fn empty_description_fails_construction() {
        let mut bad = config("template", 1);
        bad.description = "  ".into();
        let err = DirectiveRegistry::new(vec![bad]).unwrap_err();
        assert!(matches!(err, MatterpipeError::InvalidDirectiveConfig { .. }));
    }

    #[test]
    fn get_returns_registered_config() {
        let registry = DirectiveRegistry::default();
        assert_eq!(registry.get("derived-from").unwrap().stage, 20);
        assert!(registry.get("nope").is_err());
    }
}
