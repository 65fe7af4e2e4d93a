//! Rules assembly and the declarative rules loader.

pub mod assembly;
pub mod loader;

pub use assembly::{RulesAssembly, RulesAssemblyError};
