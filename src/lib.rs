//! Forge - a cross-platform native build driver for a large C++ engine
//! codebase.
//!
//! This crate provides the core library functionality: rules loading and
//! assembly, plugin discovery, module-graph construction and binary
//! composition, environment propagation, shared-PCH planning, action graph
//! assembly, and receipt/manifest writing. [`cli`] wires these stages
//! together for the `forge` binary. Nothing in this crate spawns a
//! compiler or linker process - concrete toolchains are
//! adapters behind the [`toolchain::ToolChain`] trait, plugged in by a
//! caller outside this crate.

pub mod action;
pub mod cli;
pub mod core;
pub mod diagnostic;
pub mod env;
pub mod graph;
pub mod pch;
pub mod receipt;
pub mod registry;
pub mod rules;
pub mod toolchain;
pub mod util;

pub use action::{assemble_makefile, Action, ActionId, ActionKind, AssemblerInputs, Makefile};
pub use core::{
    Binary, BinaryId, BinaryType, BuildContext, BuildEnvironment, Configuration, DependencyKind,
    DirRef, FileRef, LinkType, Module, ModuleEdge, ModuleId, ModuleRules, ModuleType, PchMode,
    Platform, PluginDescriptor, PluginModuleEntry, PluginReference, PluginType, ProjectDescriptor,
    SymbolVisibility, TargetDescriptor, TargetRules, TargetType,
};
pub use diagnostic::{BuildError, Diagnostic, DiagnosticList, ReferenceChain, Severity};
pub use env::{
    compile_environment_for, link_closure, private_compile_closure, public_compile_closure,
    CompileEnvironment, LinkEnvironment,
};
pub use graph::{binary_output_path, compose_binaries, ModuleGraph, ModuleGraphBuilder};
pub use pch::{plan_shared_pchs, PchPlan, PchTemplate};
pub use receipt::{
    write_build_manifest, write_dependency_list, write_module_manifest, write_target_receipt,
    write_version_file, BuildManifest, BuildProduct, BuildProductType, ModuleManifest,
    RuntimeDependency, RuntimeDependencyType, TargetReceipt, VersionInfo,
};
pub use registry::{PluginInfo, PluginRegistry};
pub use rules::{RulesAssembly, RulesAssemblyError};
pub use toolchain::{NullPlatformAdapter, NullToolChain, PlatformAdapter, ToolChain};
pub use util::{Config, InternedString};
