//! Runtime module instances.
//!
//! A [`Module`] is cached once per target build. It is created by the
//! module graph builder, mutated by the binary composer and environment
//! propagator, and destroyed with the target. Modules are arena-allocated
//! and referenced by [`ModuleId`] rather than by owning reference,
//! which is what lets a cyclic dependency edge be represented without a
//! reference cycle.

use std::path::PathBuf;

use crate::core::binary::BinaryId;
use crate::core::path::DirRef;
use crate::core::rules::ModuleRules;
use crate::util::InternedString;

/// Index into a [`crate::graph::builder::ModuleGraph`]'s module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

/// How one module references another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Public,
    Private,
    /// Include paths only, no link surface.
    IncludePathOnly,
    /// Loaded at runtime, not linked.
    Dynamic,
}

/// An edge from a module to one of its referenced modules, in first-
/// occurrence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleEdge {
    pub target: ModuleId,
    pub kind: DependencyKind,
}

/// A runtime instance of a [`ModuleRules`], resolved within one target build.
#[derive(Debug, Clone)]
pub struct Module {
    pub id: ModuleId,
    pub name: InternedString,
    pub rules: ModuleRules,
    pub module_dir: DirRef,
    pub generated_code_dir: DirRef,

    /// Resolved, de-duplicated include path sets.
    pub public_include_paths: Vec<DirRef>,
    pub private_include_paths: Vec<DirRef>,

    /// Public definitions, including the computed `<MODULE>_API` value once
    /// the environment propagator has assigned a binary and resolved
    /// the export/import/empty rule. `None` until that stage runs.
    pub api_definition: Option<String>,

    /// Outgoing edges in first-occurrence order, duplicates removed.
    pub edges: Vec<ModuleEdge>,

    /// The binary this module has been assigned to by the binary composer.
    /// `None` means the module is not part of this build.
    pub binary: Option<BinaryId>,
}

impl Module {
    pub fn new(id: ModuleId, name: InternedString, rules: ModuleRules, module_dir: DirRef, generated_code_dir: DirRef) -> Self {
        Module {
            id,
            name,
            rules,
            module_dir,
            generated_code_dir,
            public_include_paths: Vec::new(),
            private_include_paths: Vec::new(),
            api_definition: None,
            edges: Vec::new(),
            binary: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.rules.module_type == crate::core::rules::ModuleType::External
    }

    pub fn public_dependencies(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.edges
            .iter()
            .filter(|e| e.kind == DependencyKind::Public)
            .map(|e| e.target)
    }

    pub fn private_dependencies(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.edges
            .iter()
            .filter(|e| e.kind == DependencyKind::Private)
            .map(|e| e.target)
    }

    pub fn include_path_only_dependencies(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.edges
            .iter()
            .filter(|e| e.kind == DependencyKind::IncludePathOnly)
            .map(|e| e.target)
    }

    pub fn dynamic_dependencies(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.edges
            .iter()
            .filter(|e| e.kind == DependencyKind::Dynamic)
            .map(|e| e.target)
    }

    /// Whether `other` is declared on both sides of
    /// `CircularlyReferencedDependentModules`, permitting a circular edge.
    pub fn permits_circular_reference_to(&self, other_name: &str) -> bool {
        self.rules
            .circularly_referenced_dependent_modules
            .iter()
            .any(|n| n == other_name)
    }

    /// The default source-relative directories checked for existence and
    /// added to include paths: `ModuleDir/..`,
    /// `ModuleDir/Public`, `ModuleDir/Private`, `ModuleDir/Classes`.
    pub fn default_include_candidates(&self) -> Vec<(PathBuf, bool)> {
        vec![
            (PathBuf::from(".."), false),
            (PathBuf::from("Public"), true),
            (PathBuf::from("Private"), true),
            (PathBuf::from("Classes"), true),
        ]
    }
}
