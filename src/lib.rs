//! Matterpipe: directive-driven document transformation and templating.
//!
//! Matterpipe reads text documents with YAML frontmatter, applies the
//! transformation directives declared in an extended JSON schema, and renders
//! the result through a structure-aware template engine.
//!
//! # Architecture
//!
//! The flow from document to output passes through five components:
//!
//! 1. [`schema`] - loads schema files, resolves `$ref` reference nodes
//!    (with cycle detection) through a TTL/LRU cache
//! 2. [`directives`] - the closed set of directive kinds, the stage-ordered
//!    registry, and one handler per kind
//! 3. [`pipeline`] - drives the registry's processing order over a resolved
//!    schema, threading each handler's output into the next
//! 4. [`template`] - freezes the pipeline's render state into an immutable
//!    IR and renders it (JSON-structure-aware substitution)
//! 5. [`document`] - frontmatter parsing and part expansion, the external
//!    collaborators feeding the pipeline
//!
//! # Example
//!
//! ```no_run
//! use matterpipe::directives::{DirectiveKeys, DirectiveRegistry};
//! use matterpipe::pipeline::DirectivePipeline;
//! use serde_json::json;
//!
//! let pipeline = DirectivePipeline::new(
//!     DirectiveRegistry::default(),
//!     DirectiveKeys::default(),
//! );
//! let schema = json!({"properties": {"tags": {"x-derived-from": "items[].tag"}}});
//! let batch = [json!({"items": [{"tag": "rust"}]})];
//! let run = pipeline.run_batch(&batch, &schema).unwrap();
//! assert_eq!(run.data, json!({"tags": ["rust"]}));
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod directives;
pub mod document;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod template;
pub mod utils;

pub use crate::core::{MatterpipeError, Result};
