//! Runtime diagnostics helpers.

pub mod reporter;
