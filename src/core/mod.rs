//! Core types and error handling for matterpipe
//!
//! The error module is the foundation the rest of the crate builds on: every
//! operation that can fail returns a [`Result`] carrying a
//! [`MatterpipeError`], and CLI-facing code converts failures through
//! [`user_friendly_error`] before display.

pub mod error;

pub use error::{ErrorContext, MatterpipeError, Result, user_friendly_error};
