//! Output artifacts.

use std::path::PathBuf;

use crate::core::module::ModuleId;
use crate::core::path::DirRef;
use crate::util::InternedString;

/// Index into a [`crate::graph::binary_composer`] binary list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinaryId(pub usize);

/// The kind of output artifact a [`Binary`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryType {
    Executable,
    DynamicLinkLibrary,
    StaticLibrary,
    Object,
    PrecompiledHeader,
}

impl BinaryType {
    pub fn is_dll_like(self) -> bool {
        matches!(self, BinaryType::DynamicLinkLibrary)
    }
}

/// An output artifact grouping one or more modules.
#[derive(Debug, Clone)]
pub struct Binary {
    pub id: BinaryId,
    pub name: InternedString,
    pub binary_type: BinaryType,
    pub output_files: Vec<PathBuf>,
    pub intermediate_directory: DirRef,
    /// The module that defines this binary's identity: the launch module
    /// for the executable, or a plugin's primary module for a DLL.
    pub primary_module: Option<ModuleId>,
    pub modules: Vec<ModuleId>,
    /// Whether this binary's modules export symbols.
    pub allow_exports: bool,
    pub create_import_library_separately: bool,
    /// "do not rebuild".
    pub precompiled: bool,
}

impl Binary {
    pub fn new(id: BinaryId, name: InternedString, binary_type: BinaryType, intermediate_directory: DirRef) -> Self {
        Binary {
            id,
            name,
            binary_type,
            output_files: Vec::new(),
            intermediate_directory,
            primary_module: None,
            modules: Vec::new(),
            allow_exports: matches!(binary_type, BinaryType::DynamicLinkLibrary | BinaryType::Executable),
            create_import_library_separately: false,
            precompiled: false,
        }
    }

    pub fn contains(&self, module: ModuleId) -> bool {
        self.modules.contains(&module)
    }
}
