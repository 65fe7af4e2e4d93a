//! Core data structures for the build driver.
//!
//! - [`path`] - canonical, case-insensitive file/directory identity
//! - [`rules`] - declarative value types: `ModuleRules`, `TargetRules`,
//!   `PluginDescriptor`, `ProjectDescriptor`, `TargetDescriptor`
//! - [`module`] - the runtime `Module` instance, arena-indexed
//! - [`binary`] - the runtime `Binary` output artifact
//! - [`context`] - the explicit, non-singleton `BuildContext`

pub mod binary;
pub mod context;
pub mod module;
pub mod path;
pub mod rules;

pub use binary::{Binary, BinaryId, BinaryType};
pub use context::BuildContext;
pub use module::{DependencyKind, Module, ModuleEdge, ModuleId};
pub use path::{DirRef, FileRef};
pub use rules::{
    BuildEnvironment, Configuration, LinkType, ModuleRules, ModuleType, PchMode, Platform,
    PluginDescriptor, PluginModuleEntry, PluginReference, PluginType, ProjectDescriptor,
    SymbolVisibility, TargetDescriptor, TargetRules, TargetType,
};
