//! Toolchain & platform adapter interfaces.
//!
//! Deliberately interface-only: "Concrete toolchains (compiler/linker/
//! archiver invocations for Windows, Mac, HoloLens, etc.)... are adapters
//! behind a `ToolChain` capability set". Nothing in this module
//! invokes a compiler or a linker; [`NullToolChain`]/[`NullPlatformAdapter`]
//! exist only so the rest of the pipeline (the action assembler, chiefly)
//! has something to call during tests and in the CLI before a real adapter
//! is plugged in - they format symbolic command lines and never spawn a
//! process.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::binary::{Binary, BinaryType};
use crate::core::rules::{Configuration, ModuleRules, TargetRules};
use crate::env::propagator::{CompileEnvironment, LinkEnvironment};

/// Result of a `CompileCppFiles` call: one object file per input, plus an
/// optional dependency-list file for incremental-build tracking.
#[derive(Debug, Clone, Default)]
pub struct CppOutput {
    pub object_files: Vec<PathBuf>,
    pub dependency_list_file: Option<PathBuf>,
}

/// Result of a `LinkFiles` call.
#[derive(Debug, Clone)]
pub struct LinkOutput {
    pub output_file: PathBuf,
    pub import_library: Option<PathBuf>,
    pub map_file: Option<PathBuf>,
    pub symbol_file: Option<PathBuf>,
}

/// The capability set consumed by the action graph assembler.
/// Every method here formats inputs/outputs for an action; none of them run
/// a subprocess - that is the executor's job, outside this crate.
pub trait ToolChain {
    fn compile_cpp_files(
        &self,
        env: &CompileEnvironment,
        inputs: &[PathBuf],
        output_dir: &Path,
        module_name: &str,
    ) -> CppOutput;

    /// May be absent (graceful no-op) - not every module has resource files.
    fn compile_resource_files(&self, _inputs: &[PathBuf], _output_dir: &Path) -> Option<CppOutput> {
        None
    }

    /// May be absent (graceful no-op) - ISPC is an optional SIMD backend.
    fn compile_ispc_files(&self, _inputs: &[PathBuf], _output_dir: &Path) -> Option<CppOutput> {
        None
    }

    fn generate_ispc_headers(&self, _inputs: &[PathBuf], _output_dir: &Path) -> Option<Vec<PathBuf>> {
        None
    }

    fn link_files(&self, env: &LinkEnvironment, output_file: &Path, build_import_library_only: bool) -> LinkOutput;

    fn generate_type_library_header(&self, _env: &CompileEnvironment, _type_lib: &Path, _output: &Path) {}

    /// Hook: adjust global compiler/linker state before any action is
    /// emitted for this target.
    fn setup_global_environment(&self, _rules: &TargetRules) {}

    /// Hook: register a binary's runtime bundle dependencies (Mac `.app`
    /// bundles, Android APK assets, ...).
    fn setup_bundle_dependencies(&self, _binaries: &[Binary], _name: &str) {}

    fn get_binary_extension(&self, binary_type: BinaryType) -> &'static str;

    fn get_debug_info_extensions(&self, rules: &TargetRules, binary_type: BinaryType) -> Vec<&'static str>;

    /// Hook: last-chance mutation of the finished makefile (e.g. appending
    /// platform-specific finalize actions). Default is a no-op.
    fn finalize_output(&self, _rules: &TargetRules, _produced_items: &[PathBuf]) {}

    /// Returns additional output items produced by a post-link step (e.g. a
    /// generated `.dSYM` bundle).
    fn post_build(&self, _executable: &Path, _env: &LinkEnvironment) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Resolves the final `(source, destination)` pairs for a target's
    /// runtime dependency list, given the binary output directory.
    fn prepare_runtime_dependencies(
        &self,
        list: &[(PathBuf, PathBuf)],
        _exe_dir: &Path,
    ) -> Vec<(PathBuf, PathBuf)> {
        list.to_vec()
    }

    fn get_sdk_version(&self) -> String {
        String::new()
    }

    fn get_version_info(&self, lines: &[String]) -> String {
        lines.join("\n")
    }

    /// Side effect on the current process, run once before any action is
    /// emitted.
    fn set_environment_variables(&self) {}
}

/// Platform-specific rule adjustments and path policy, separate from the
/// compiler/linker capability set above.
pub trait PlatformAdapter {
    fn modify_module_rules_for_active_platform(&self, _name: &str, _rules: &mut ModuleRules, _target: &TargetRules) {}

    fn is_build_product(&self, filename: &str, prefixes: &[String], suffixes: &[String]) -> bool {
        prefixes.iter().any(|p| filename.starts_with(p.as_str()))
            && suffixes.iter().any(|s| filename.ends_with(s.as_str()))
    }

    fn finalize_binary_paths(&self, base: &Path, project: Option<&Path>, _rules: &TargetRules) -> Vec<PathBuf> {
        vec![project.unwrap_or(base).to_path_buf()]
    }

    fn get_excluded_folder_names(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn get_default_architecture(&self, _project: Option<&Path>) -> String {
        String::from("x64")
    }

    fn requires_architecture_suffix(&self) -> bool {
        false
    }

    fn set_up_environment(&self) {}

    fn set_up_configuration_environment(&self, _configuration: Configuration) {}

    fn should_create_debug_info(&self, configuration: Configuration) -> bool {
        !configuration.is_shipping_like()
    }
}

/// Formats symbolic object/link outputs without compiling or linking
/// anything - see the module doc comment. Used by the CLI until a real
/// per-platform adapter is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullToolChain;

impl ToolChain for NullToolChain {
    fn compile_cpp_files(
        &self,
        _env: &CompileEnvironment,
        inputs: &[PathBuf],
        output_dir: &Path,
        _module_name: &str,
    ) -> CppOutput {
        let object_files = inputs
            .iter()
            .map(|source| {
                let stem = source.file_stem().unwrap_or_default();
                output_dir.join(stem).with_extension("o")
            })
            .collect();
        CppOutput {
            object_files,
            dependency_list_file: None,
        }
    }

    fn link_files(&self, _env: &LinkEnvironment, output_file: &Path, _build_import_library_only: bool) -> LinkOutput {
        LinkOutput {
            output_file: output_file.to_path_buf(),
            import_library: None,
            map_file: None,
            symbol_file: None,
        }
    }

    fn get_binary_extension(&self, binary_type: BinaryType) -> &'static str {
        match binary_type {
            BinaryType::Executable => "",
            BinaryType::DynamicLinkLibrary => ".so",
            BinaryType::StaticLibrary => ".a",
            BinaryType::Object => ".o",
            BinaryType::PrecompiledHeader => ".pch",
        }
    }

    fn get_debug_info_extensions(&self, _rules: &TargetRules, _binary_type: BinaryType) -> Vec<&'static str> {
        Vec::new()
    }
}

/// See [`NullToolChain`] - symbolic only, no platform-specific behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlatformAdapter;

impl PlatformAdapter for NullPlatformAdapter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_toolchain_names_one_object_per_input() {
        let tc = NullToolChain;
        let env = CompileEnvironment::default();
        let inputs = vec![PathBuf::from("Foo.cpp"), PathBuf::from("Bar.cpp")];
        let output = tc.compile_cpp_files(&env, &inputs, Path::new("/tmp/out"), "Module");
        assert_eq!(output.object_files, vec![PathBuf::from("/tmp/out/Foo.o"), PathBuf::from("/tmp/out/Bar.o")]);
    }

    #[test]
    fn default_platform_adapter_disables_debug_info_in_shipping() {
        let adapter = NullPlatformAdapter;
        assert!(!adapter.should_create_debug_info(Configuration::Shipping));
        assert!(adapter.should_create_debug_info(Configuration::Development));
    }
}
