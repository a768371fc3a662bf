//! Command line parsing and settings resolution.

pub mod args;
pub mod options;
