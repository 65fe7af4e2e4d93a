//! Rules model: value types only, no behavior beyond
//! trivial accessors and `Validate()`. These are produced by evaluating a
//! rules definition - in this port, a declarative TOML document
//! rather than a scripting-engine evaluation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::diagnostic::BuildError;
use crate::util::InternedString;

/// Target platform. Concrete toolchain/SDK behavior per platform
/// is out of scope - this enum is the identity the core threads
/// through environment and path computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Platform {
    Win64,
    Mac,
    Linux,
    HoloLens,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Configuration {
    Debug,
    DebugGame,
    Development,
    Test,
    Shipping,
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Configuration {
    /// Whether this configuration strips developer-only affordances.
    pub fn is_shipping_like(self) -> bool {
        matches!(self, Configuration::Shipping | Configuration::Test)
    }
}

/// Target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    Game,
    Editor,
    Client,
    Server,
    Program,
}

/// Link type: monolithic executable vs. modular DLL composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkType {
    Monolithic,
    Modular,
}

/// Build environment: whether engine-level module intermediates are
/// reusable across projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildEnvironment {
    Shared,
    Unique,
}

/// Module type: compiled C++ module vs. an external (prebuilt) dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleType {
    CPlusPlus,
    External,
}

/// Precompiled-header usage mode for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PchMode {
    #[default]
    None,
    NoSharedPCHs,
    UseSharedPCHs,
    UseExplicitOrShared,
}

/// Symbol visibility for a module's DLL export macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SymbolVisibility {
    #[default]
    Default,
    VisibleForDll,
    Hidden,
}

/// Plugin loading context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    Engine,
    Enterprise,
    Project,
    Mod,
    External,
}

/// A reference to another plugin by name, with enable/disable semantics
/// used by registry merge and enablement precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginReference {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub optional: bool,
}

fn default_true() -> bool {
    true
}

/// A module entry inside a plugin descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginModuleEntry {
    pub name: String,
    pub module_type: ModuleType,
    /// Platforms this module is built for; empty means "all supported".
    #[serde(default)]
    pub whitelist_platforms: Vec<Platform>,
    #[serde(default)]
    pub blacklist_platforms: Vec<Platform>,
}

/// The contents of a `.uplugin`-equivalent descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginDescriptor {
    pub friendly_name: String,
    pub modules: Vec<PluginModuleEntry>,
    pub plugin_references: Vec<PluginReference>,
    /// Empty means "supported on every platform".
    pub supported_target_platforms: Vec<Platform>,
    pub requires_build_platform: bool,
    pub enabled_by_default: bool,
    /// Set for `Parent_Suffix.uplugin`-style files; carries the suffix that
    /// was parsed off the filename.
    #[serde(skip)]
    pub is_plugin_extension: bool,
}

/// A project descriptor's plugin enablement overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDescriptor {
    pub plugins: Vec<PluginReference>,
    pub additional_plugin_directories: Vec<PathBuf>,
    pub disable_engine_plugins_by_default: bool,
}

/// Per-module declaration. Value object only; behavior lives in
/// `graph::builder` and `env::propagator`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleRules {
    pub name: String,
    pub module_type: ModuleType,

    pub public_include_paths: Vec<PathBuf>,
    pub private_include_paths: Vec<PathBuf>,

    pub public_dependency_module_names: Vec<String>,
    pub private_dependency_module_names: Vec<String>,
    /// Modules whose include paths (but not link surface) are pulled in.
    pub public_include_path_module_names: Vec<String>,
    /// Modules loaded dynamically at runtime rather than linked.
    pub dynamically_loaded_module_names: Vec<String>,
    /// Declared both-ways to permit a cyclic edge to terminate.
    pub circularly_referenced_dependent_modules: Vec<String>,

    pub public_definitions: Vec<String>,
    pub private_definitions: Vec<String>,

    pub public_additional_libraries: Vec<String>,
    pub public_library_paths: Vec<PathBuf>,
    pub public_frameworks: Vec<String>,
    pub public_weak_frameworks: Vec<String>,
    pub public_delay_load_dlls: Vec<String>,
    pub public_runtime_library_paths: Vec<PathBuf>,
    pub additional_bundle_resources: Vec<PathBuf>,

    pub pch_mode: PchMode,
    pub private_pch_header_file: Option<PathBuf>,
    pub shared_pch_header_file: Option<PathBuf>,
    /// Whether this module's shared PCH header may be used as a candidate
    /// by other modules.
    pub permits_shared_pch_use: bool,

    pub symbol_visibility: SymbolVisibility,
    pub is_redistributable: bool,

    /// Propagates only from the module itself, never through a dependency
    /// closure.
    pub force_include_files: Vec<PathBuf>,
}

impl Default for ModuleRules {
    fn default() -> Self {
        ModuleRules {
            name: String::new(),
            module_type: ModuleType::CPlusPlus,
            public_include_paths: Vec::new(),
            private_include_paths: Vec::new(),
            public_dependency_module_names: Vec::new(),
            private_dependency_module_names: Vec::new(),
            public_include_path_module_names: Vec::new(),
            dynamically_loaded_module_names: Vec::new(),
            circularly_referenced_dependent_modules: Vec::new(),
            public_definitions: Vec::new(),
            private_definitions: Vec::new(),
            public_additional_libraries: Vec::new(),
            public_library_paths: Vec::new(),
            public_frameworks: Vec::new(),
            public_weak_frameworks: Vec::new(),
            public_delay_load_dlls: Vec::new(),
            public_runtime_library_paths: Vec::new(),
            additional_bundle_resources: Vec::new(),
            pch_mode: PchMode::default(),
            private_pch_header_file: None,
            shared_pch_header_file: None,
            permits_shared_pch_use: true,
            symbol_visibility: SymbolVisibility::default(),
            is_redistributable: true,
            force_include_files: Vec::new(),
        }
    }
}

impl ModuleRules {
    /// The computed `<MODULE>_API` macro identifier.
    pub fn api_macro_name(&self) -> String {
        format!("{}_API", self.name.to_uppercase())
    }

    /// First-occurrence-order, de-duplicated union of every module name this
    /// module names as a dependency, include-only module, or dynamic load
    /// target.
    /// Note: "private-include-path module names" refers to
    /// path-only modules named privately; this rules model does not separate
    /// that list from `public_include_path_module_names` because the source
    /// rules format does not emit a private variant distinct from dependency
    /// lists - private include-only references are modeled as private
    /// dependencies instead.
    pub fn referenced_module_names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut ordered = Vec::new();
        for name in self
            .public_dependency_module_names
            .iter()
            .chain(self.private_dependency_module_names.iter())
            .chain(self.public_include_path_module_names.iter())
            .chain(self.dynamically_loaded_module_names.iter())
        {
            if seen.insert(name.clone()) {
                ordered.push(name.clone());
            }
        }
        ordered
    }
}

/// Declarative target definition produced by evaluating a rules script
///. Fields tagged "requires-unique-environment" in the source are
/// modeled here via [`TargetRules::unique_environment_fields`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetRules {
    pub target_type: TargetType,
    pub link_type: LinkType,
    pub build_environment: BuildEnvironment,
    pub launch_module_name: String,

    pub enable_exceptions: bool,
    pub enable_rtti: bool,
    pub build_editor: bool,
    pub build_developer_tools: bool,
    pub pch_mode: PchMode,

    pub enable_plugins: Vec<String>,
    pub disable_plugins: Vec<String>,
    pub extra_module_names: Vec<String>,

    pub pgo_profile: bool,
    pub pgo_optimize: bool,

    pub pre_build_steps: Vec<String>,
    pub post_build_steps: Vec<String>,

    pub strict_plugin_dependencies: bool,
    pub break_build_on_license_violation: bool,

    /// Forced on for a foreign-plugin build.
    pub disable_linking: bool,

    pub undecorated_configuration: Configuration,

    /// Names of fields a Shared-environment build forbids tweaking away from
    /// the canonical base rules for this target type. Populated by the
    /// concrete subclass in the original source; represented directly here
    /// since there is no runtime subclassing in this port.
    pub requires_unique_environment_overrides: BTreeMap<String, String>,
}

impl Default for TargetRules {
    fn default() -> Self {
        TargetRules {
            target_type: TargetType::Game,
            link_type: LinkType::Modular,
            build_environment: BuildEnvironment::Unique,
            launch_module_name: String::new(),
            enable_exceptions: true,
            enable_rtti: true,
            build_editor: false,
            build_developer_tools: false,
            pch_mode: PchMode::UseSharedPCHs,
            enable_plugins: Vec::new(),
            disable_plugins: Vec::new(),
            extra_module_names: Vec::new(),
            pgo_profile: false,
            pgo_optimize: false,
            pre_build_steps: Vec::new(),
            post_build_steps: Vec::new(),
            strict_plugin_dependencies: false,
            break_build_on_license_violation: false,
            disable_linking: false,
            undecorated_configuration: Configuration::Development,
            requires_unique_environment_overrides: BTreeMap::new(),
        }
    }
}

impl TargetRules {
    /// `LaunchModuleName` set; PGO-optimize/PGO-profile mutually
    /// exclusive; explicit plugin enable/disable lists not used with a
    /// Shared environment.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.launch_module_name.trim().is_empty() {
            return Err(BuildError::configuration(
                "TargetRules.LaunchModuleName must be set",
            ));
        }
        if self.pgo_profile && self.pgo_optimize {
            return Err(BuildError::configuration(
                "TargetRules cannot set both bPGOProfile and bPGOOptimize",
            ));
        }
        if self.build_environment == BuildEnvironment::Shared
            && (!self.enable_plugins.is_empty() || !self.disable_plugins.is_empty())
        {
            return Err(BuildError::configuration(
                "explicit EnablePlugins/DisablePlugins cannot be used with a Shared build environment",
            ));
        }
        Ok(())
    }

    /// Compares this target's unique-environment-tagged fields against the
    /// canonical base target rules for its target type, failing fatally on
    /// the first mismatch and naming the field and base target.
    pub fn check_unique_environment(&self, base: &TargetRules) -> Result<(), BuildError> {
        if self.build_environment != BuildEnvironment::Shared {
            return Ok(());
        }
        for (field, value) in &self.requires_unique_environment_overrides {
            match base.requires_unique_environment_overrides.get(field) {
                Some(base_value) if base_value == value => {}
                _ => {
                    return Err(BuildError::configuration(format!(
                        "target sets [RequiresUniqueBuildEnvironment] field `{}`={} while declaring a Shared \
                         build environment; it differs from the canonical base target's value",
                        field, value
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Invocation identity. Immutable after construction.
#[derive(Debug, Clone)]
pub struct TargetDescriptor {
    pub name: InternedString,
    pub platform: Platform,
    pub configuration: Configuration,
    pub architecture: String,
    pub project_file: Option<PathBuf>,
    pub foreign_plugin: Option<PathBuf>,
    /// module-name -> hot-reload numeric suffix (`-ModuleWithSuffix=Foo,42`).
    pub hot_reload_module_suffixes: BTreeMap<String, u32>,
    pub single_file_to_compile: Option<PathBuf>,
    pub additional_args: Vec<String>,
}

impl TargetDescriptor {
    pub fn is_foreign_plugin_build(&self) -> bool {
        self.foreign_plugin.is_some()
    }

    pub fn is_single_file_build(&self) -> bool {
        self.single_file_to_compile.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_requires_launch_module() {
        let rules = TargetRules::default();
        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("LaunchModuleName"));
    }

    #[test]
    fn validate_rejects_both_pgo_flags() {
        let mut rules = TargetRules {
            launch_module_name: "Game".into(),
            ..Default::default()
        };
        rules.pgo_profile = true;
        rules.pgo_optimize = true;
        assert!(rules.validate().is_err());
    }

    #[test]
    fn validate_rejects_explicit_plugin_lists_with_shared_environment() {
        let rules = TargetRules {
            launch_module_name: "Game".into(),
            build_environment: BuildEnvironment::Shared,
            enable_plugins: vec!["Foo".into()],
            ..Default::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn api_macro_name_is_upper_snake() {
        let rules = ModuleRules {
            name: "Core".into(),
            ..Default::default()
        };
        assert_eq!(rules.api_macro_name(), "CORE_API");
    }

    #[test]
    fn referenced_module_names_dedupes_preserving_first_occurrence() {
        let rules = ModuleRules {
            public_dependency_module_names: vec!["Core".into(), "CoreUObject".into()],
            private_dependency_module_names: vec!["Core".into(), "Engine".into()],
            ..Default::default()
        };
        assert_eq!(
            rules.referenced_module_names(),
            vec!["Core", "CoreUObject", "Engine"]
        );
    }

    #[test]
    fn unique_environment_check_rejects_mismatch() {
        let mut base = TargetRules {
            launch_module_name: "Game".into(),
            ..Default::default()
        };
        base.requires_unique_environment_overrides
            .insert("bUseChecksInShipping".into(), "false".into());

        let mut shared = base.clone();
        shared.build_environment = BuildEnvironment::Shared;
        shared
            .requires_unique_environment_overrides
            .insert("bUseChecksInShipping".into(), "true".into());

        let err = shared.check_unique_environment(&base).unwrap_err();
        assert!(err.to_string().contains("bUseChecksInShipping"));
    }
}
