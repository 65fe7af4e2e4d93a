//! Module dependency graph and binary composition.

pub mod binary_composer;
pub mod builder;

pub use binary_composer::{binary_output_path, compose_binaries};
pub use builder::{ModuleGraph, ModuleGraphBuilder};
