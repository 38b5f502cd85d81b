//! Error handling for matterpipe
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** for precise handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! Every component in the resolve → transform → render chain returns an
//! explicit [`Result`]; panics are never used for expected failure modes.
//! The two main types are:
//! - [`MatterpipeError`] - enumerated error types for all failure cases
//! - [`ErrorContext`] - wrapper that adds user-friendly messages and suggestions
//!
//! # Error Categories
//!
//! - **Schema resolution**: [`MatterpipeError::CircularReference`],
//!   [`MatterpipeError::ReferenceNotFound`], [`MatterpipeError::SchemaParse`]
//! - **Directive configuration**: [`MatterpipeError::Validation`],
//!   [`MatterpipeError::DuplicateDirective`], [`MatterpipeError::UnknownDependency`]
//! - **Transformation**: [`MatterpipeError::Processing`]
//! - **Caching**: [`MatterpipeError::Cache`]
//! - **Rendering**: [`MatterpipeError::IrBuildFailed`],
//!   [`MatterpipeError::MissingVariable`], [`MatterpipeError::TemplateNotFound`]
//!
//! Use [`user_friendly_error`] to convert any error into a displayable format
//! with contextual suggestions before it reaches the terminal.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for matterpipe operations.
///
/// Each variant carries the component-specific context a user needs to act on
/// the failure: the directive, reference, or file involved, plus a
/// human-readable reason. A bare message with no subject is never the only
/// signal.
#[derive(Error, Debug)]
pub enum MatterpipeError {
    /// A schema reference chain loops back onto a file already being resolved.
    ///
    /// The chain names every file on the cycle in traversal order, e.g.
    /// `a.json -> b.json -> a.json`.
    #[error("circular schema reference detected: {chain}")]
    CircularReference {
        /// The reference chain, ` -> ` separated, ending at the repeated path
        chain: String,
    },

    /// A `$ref` pointed at a schema file that could not be loaded.
    #[error("referenced schema '{path}' not found (referenced from '{referenced_from}')")]
    ReferenceNotFound {
        /// The path that failed to load
        path: String,
        /// The schema file containing the dangling reference
        referenced_from: String,
    },

    /// A schema file exists but is not valid JSON.
    #[error("invalid schema syntax in {file}: {reason}")]
    SchemaParse {
        /// Path to the schema file that failed to parse
        file: String,
        /// The underlying parse failure
        reason: String,
    },

    /// A document's frontmatter block could not be parsed.
    #[error("invalid frontmatter in {file}: {reason}")]
    Frontmatter {
        /// Path to the offending document
        file: String,
        /// The underlying parse failure
        reason: String,
    },

    /// A directive annotation is present but malformed.
    ///
    /// Raised at extraction time, before any document data is touched: wrong
    /// primitive types are never silently coerced, and malformed
    /// path/expression strings are rejected up front.
    #[error("invalid '{directive}' configuration on property '{property}': {reason}")]
    Validation {
        /// The directive whose configuration is invalid
        directive: String,
        /// The schema property carrying the annotation
        property: String,
        /// Why the configuration was rejected
        reason: String,
    },

    /// A directive's transform step failed at runtime.
    #[error("directive '{directive}' failed: {reason}")]
    Processing {
        /// The directive whose transform failed
        directive: String,
        /// Why the transform failed
        reason: String,
    },

    /// A cache operation hit a backing-store or file-stat failure.
    ///
    /// Cache errors never corrupt existing entries; callers treat them as a
    /// skipped optimization, not a fatal condition.
    #[error("cache {operation} failed for '{path}': {reason}")]
    Cache {
        /// The cache operation that failed ("get", "set", "stat")
        operation: String,
        /// The normalized cache key involved
        path: String,
        /// Why the operation failed
        reason: String,
    },

    /// Template IR construction failed because required fields were not set.
    ///
    /// All missing fields are collected and named together in one pass rather
    /// than failing fast on the first.
    #[error("template IR is missing required fields: {}", .missing.join(", "))]
    IrBuildFailed {
        /// Every required field that was not set before `build()`
        missing: Vec<String>,
    },

    /// Two registry entries share the same directive name.
    #[error("directive '{name}' is registered more than once")]
    DuplicateDirective {
        /// The duplicated directive name
        name: String,
    },

    /// A directive name does not match any known directive kind.
    #[error("unknown directive '{name}'")]
    UnknownDirective {
        /// The unrecognized name
        name: String,
    },

    /// A registry entry's `depends_on` references an unregistered directive.
    #[error("directive '{directive}' depends on unregistered directive '{dependency}'")]
    UnknownDependency {
        /// The directive declaring the dependency
        directive: String,
        /// The dependency name that is not registered
        dependency: String,
    },

    /// A registry entry is structurally invalid.
    #[error("invalid directive configuration for '{name}': {reason}")]
    InvalidDirectiveConfig {
        /// The directive whose configuration is invalid
        name: String,
        /// Why the configuration was rejected
        reason: String,
    },

    /// The directive key mapping is invalid (duplicate or malformed keys).
    #[error("invalid directive key mapping: {reason}")]
    InvalidKeyMapping {
        /// Why the mapping was rejected
        reason: String,
    },

    /// A template file reference could not be loaded.
    #[error("template file not found: {path}")]
    TemplateNotFound {
        /// Path to the missing template file
        path: String,
    },

    /// Strict-mode rendering hit a placeholder with no matching data.
    #[error("template variable '{variable}' not found in document data")]
    MissingVariable {
        /// The dotted path that failed to resolve
        variable: String,
    },

    /// Template rendering failed for a reason other than a missing variable.
    #[error("template rendering failed: {reason}")]
    Render {
        /// Why rendering failed
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

/// Convenience alias used across the core modules.
pub type Result<T> = std::result::Result<T, MatterpipeError>;

impl MatterpipeError {
    /// Shorthand for a [`MatterpipeError::Processing`] error.
    pub fn processing(directive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Processing {
            directive: directive.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`MatterpipeError::Validation`] error.
    pub fn validation(
        directive: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            directive: directive.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }
}

/// Wrapper that pairs a [`MatterpipeError`] with user-facing context.
///
/// Suggestions are actionable steps (displayed green), details explain what
/// the error means (displayed yellow). This is how matterpipe presents
/// failures in the CLI; library callers can ignore it entirely.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying matterpipe error
    pub error: MatterpipeError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: MatterpipeError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with suggestions.
///
/// Recognizes [`MatterpipeError`] variants and common IO failures and attaches
/// tailored guidance; everything else passes through with its full error
/// chain so diagnostics are never lost.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<MatterpipeError>() {
        Ok(typed) => return contextualize(typed),
        Err(other) => other,
    };

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(MatterpipeError::Other {
                    message: format!("permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership or re-run with elevated permissions")
                .with_details("matterpipe could not read or write a required file");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(MatterpipeError::Other {
                    message: format!("file not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    // Generic error - include the full error chain for better diagnostics.
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(|cause| cause.to_string()).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(MatterpipeError::Other { message })
}

fn contextualize(error: MatterpipeError) -> ErrorContext {
    match &error {
        MatterpipeError::CircularReference { .. } => ErrorContext::new(error)
            .with_suggestion("Break the cycle by removing one of the $ref entries in the chain")
            .with_details(
                "Schema files may reference each other, but the reference graph must be acyclic",
            ),
        MatterpipeError::ReferenceNotFound { .. } => ErrorContext::new(error).with_suggestion(
            "Check that the referenced schema file exists relative to the referencing file",
        ),
        MatterpipeError::Validation { .. } => ErrorContext::new(error).with_details(
            "Directive annotations are validated before any document data is transformed; \
             wrong value types are never coerced",
        ),
        MatterpipeError::IrBuildFailed { .. } => ErrorContext::new(error).with_suggestion(
            "Set a main template (x-template), an output format (x-template-format), and \
             renderer configuration before rendering",
        ),
        MatterpipeError::UnknownDirective { .. } => ErrorContext::new(error).with_details(
            "Known directives: frontmatter-part, derived-from, derived-unique, flatten-arrays, \
             jmespath-filter, template, template-items, template-format",
        ),
        MatterpipeError::MissingVariable { .. } => ErrorContext::new(error).with_suggestion(
            "Add the missing field to the document frontmatter, or render without --strict \
             to leave unknown placeholders in place",
        ),
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_build_failed_names_every_missing_field() {
        let err = MatterpipeError::IrBuildFailed {
            missing: vec!["main_template".into(), "output_format".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("main_template"));
        assert!(msg.contains("output_format"));
    }

    #[test]
    fn circular_reference_message_carries_chain() {
        let err = MatterpipeError::CircularReference {
            chain: "a.json -> b.json -> a.json".into(),
        };
        assert!(err.to_string().contains("a.json -> b.json -> a.json"));
    }

    #[test]
    fn user_friendly_error_preserves_typed_variant() {
        let err = anyhow::Error::from(MatterpipeError::UnknownDirective {
            name: "bogus".into(),
        });
        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, MatterpipeError::UnknownDirective { .. }));
        assert!(ctx.details.is_some());
    }

    #[test]
    fn error_context_display_includes_suggestion() {
        let ctx = ErrorContext::new(MatterpipeError::Other {
            message: "boom".into(),
        })
        .with_suggestion("try again");
        let rendered = format!("{ctx}");
        assert!(rendered.contains("boom"));
        assert!(rendered.contains("Suggestion: try again"));
    }
}
