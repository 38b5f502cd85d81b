//! Directive kinds, key mapping, registry, and handlers
//!
//! A directive is a named schema annotation instructing the pipeline to apply
//! one specific data transformation. The set of kinds is closed (a tagged
//! enum dispatched by a single match, not an open plugin interface), so
//! adding a kind is a compile-time, exhaustiveness-checked change.
//!
//! The schema property names carrying the annotations are configurable
//! through [`DirectiveKeys`]; the defaults use an `x-` prefix
//! (`x-derived-from`, `x-template`, ...). All eight keys must stay mutually
//! distinct and syntactically valid identifiers.

pub mod handlers;
pub mod registry;

pub use registry::{DirectiveConfig, DirectiveRegistry};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{MatterpipeError, Result};
use crate::utils::is_valid_identifier;

/// The closed set of directive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DirectiveKind {
    /// Marks the array property used to expand one document into per-item
    /// logical documents. Advisory only; no data transform.
    FrontmatterPart,
    /// Collects values from a source path across all documents in a batch.
    DerivedFrom,
    /// Deduplicates the derived array, preserving first-occurrence order.
    DerivedUnique,
    /// Recursively flattens nested arrays at a dotted path to a single depth.
    FlattenArrays,
    /// Applies a JMESPath expression to the document data.
    JmespathFilter,
    /// Binds the main output template (inline string or file reference).
    Template,
    /// Applies an item template to every element of a target array.
    TemplateItems,
    /// Records the output serialization format as render metadata.
    TemplateFormat,
}

impl DirectiveKind {
    /// Every kind, in spec declaration order. Matches the default registry's
    /// stage ordering.
    pub const ALL: [Self; 8] = [
        Self::FrontmatterPart,
        Self::DerivedFrom,
        Self::DerivedUnique,
        Self::FlattenArrays,
        Self::JmespathFilter,
        Self::Template,
        Self::TemplateItems,
        Self::TemplateFormat,
    ];

    /// The canonical directive name used in registry configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FrontmatterPart => "frontmatter-part",
            Self::DerivedFrom => "derived-from",
            Self::DerivedUnique => "derived-unique",
            Self::FlattenArrays => "flatten-arrays",
            Self::JmespathFilter => "jmespath-filter",
            Self::Template => "template",
            Self::TemplateItems => "template-items",
            Self::TemplateFormat => "template-format",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DirectiveKind {
    type Err = MatterpipeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| MatterpipeError::UnknownDirective { name: s.to_string() })
    }
}

/// Property-name mapping from directive kind to schema annotation key.
///
/// Deserializable from the registry configuration file; unspecified keys fall
/// back to their `x-` prefixed defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DirectiveKeys {
    /// Key for the frontmatter-part flag.
    pub frontmatter_part: String,
    /// Key for the derived-from source path.
    pub derived_from: String,
    /// Key for the derived-unique flag.
    pub derived_unique: String,
    /// Key for the flatten-arrays target path.
    pub flatten_arrays: String,
    /// Key for the jmespath-filter expression.
    pub jmespath_filter: String,
    /// Key for the main template binding.
    pub template: String,
    /// Key for the per-item template.
    pub template_items: String,
    /// Key for the output format tag.
    pub template_format: String,
}

impl Default for DirectiveKeys {
    fn default() -> Self {
        Self {
            frontmatter_part: "x-frontmatter-part".into(),
            derived_from: "x-derived-from".into(),
            derived_unique: "x-derived-unique".into(),
            flatten_arrays: "x-flatten-arrays".into(),
            jmespath_filter: "x-jmespath-filter".into(),
            template: "x-template".into(),
            template_items: "x-template-items".into(),
            template_format: "x-template-format".into(),
        }
    }
}

impl DirectiveKeys {
    /// The annotation key for a directive kind.
    #[must_use]
    pub fn key_for(&self, kind: DirectiveKind) -> &str {
        match kind {
            DirectiveKind::FrontmatterPart => &self.frontmatter_part,
            DirectiveKind::DerivedFrom => &self.derived_from,
            DirectiveKind::DerivedUnique => &self.derived_unique,
            DirectiveKind::FlattenArrays => &self.flatten_arrays,
            DirectiveKind::JmespathFilter => &self.jmespath_filter,
            DirectiveKind::Template => &self.template,
            DirectiveKind::TemplateItems => &self.template_items,
            DirectiveKind::TemplateFormat => &self.template_format,
        }
    }

    /// Check that all eight keys are mutually distinct and valid identifiers.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for kind in DirectiveKind::ALL {
            let key = self.key_for(kind);
            if !is_valid_identifier(key) {
                return Err(MatterpipeError::InvalidKeyMapping {
                    reason: format!("key '{key}' for directive '{kind}' is not a valid identifier"),
                });
            }
            if !seen.insert(key) {
                return Err(MatterpipeError::InvalidKeyMapping {
                    reason: format!("key '{key}' is mapped to more than one directive"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in DirectiveKind::ALL {
            assert_eq!(DirectiveKind::from_str(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            DirectiveKind::from_str("made-up"),
            Err(MatterpipeError::UnknownDirective { .. })
        ));
    }

    #[test]
    fn default_keys_validate() {
        DirectiveKeys::default().validate().unwrap();
    }

    #[test]
    fn duplicate_keys_fail_validation() {
        let keys = DirectiveKeys {
            derived_from: "x-dup".into(),
            derived_unique: "x-dup".into(),
            ..DirectiveKeys::default()
        };
        assert!(matches!(keys.validate(), Err(MatterpipeError::InvalidKeyMapping { .. })));
    }

    #[test]
    fn malformed_key_fails_validation() {
        let keys = DirectiveKeys {
            template: "9-bad key".into(),
            ..DirectiveKeys::default()
        };
        assert!(matches!(keys.validate(), Err(MatterpipeError::InvalidKeyMapping { .. })));
    }

    #[test]
    fn keys_deserialize_with_defaults() {
        let keys: DirectiveKeys = serde_yaml::from_str("template: my-template\n").unwrap();
        assert_eq!(keys.template, "my-template");
        assert_eq!(keys.derived_from, "x-derived-from");
    }
}
