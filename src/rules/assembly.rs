//! Rules assembly: load & compile rules definitions, locate
//! rules by name, enumerate plugins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::rules::{Configuration, ModuleRules, Platform, TargetDescriptor, TargetRules};
use crate::diagnostic::ReferenceChain;
use crate::registry::plugin::{PluginInfo, PluginRegistry};
use crate::rules::loader;

#[derive(Debug, Error)]
pub enum RulesAssemblyError {
    #[error("could not find rules for `{name}` under any search root (while building {chain})")]
    RulesNotFound { name: String, chain: ReferenceChain },

    #[error("failed to evaluate rules for `{name}`: {message}")]
    RulesEvaluationError { name: String, message: String },

    #[error("module `{name}` is declared by two different rules assemblies: {first} and {second}")]
    RulesAmbiguous {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Where a module's rules file lives, so `GetModuleFile` can answer
/// without re-parsing.
#[derive(Debug, Clone)]
struct ModuleEntry {
    path: PathBuf,
    rules: ModuleRules,
}

/// Loaded & compiled rules for one invocation. Two invocations
/// over the same search roots must produce structurally identical rule
/// objects - this assembly holds only deterministic, disk-derived state.
pub struct RulesAssembly {
    search_roots: Vec<PathBuf>,
    modules: BTreeMap<String, ModuleEntry>,
    targets: BTreeMap<String, PathBuf>,
}

impl RulesAssembly {
    /// `LoadForTarget`: locate the target's rules script and transitively
    /// the rules it depends on, evaluating them into in-memory rule
    /// objects. In this port "transitively" means "every `.module.toml`
    /// reachable from the search roots" - the declarative format has no
    /// separate dependency-of-rules-scripts concept to walk.
    pub fn load_for_target(
        engine_source_dir: &Path,
        project_source_dir: Option<&Path>,
        registry: &PluginRegistry,
        target_name: &str,
    ) -> Result<Self, RulesAssemblyError> {
        let mut search_roots = vec![engine_source_dir.to_path_buf()];
        if let Some(project_dir) = project_source_dir {
            search_roots.push(project_dir.to_path_buf());
        }
        for plugin in registry.all_plugins() {
            search_roots.push(plugin.root_dir.as_path().join("Source"));
        }

        let mut modules = BTreeMap::new();
        for root in &search_roots {
            for file in loader::discover_module_rules_files(root) {
                let rules = loader::parse_module_rules(&file.path).map_err(|e| {
                    RulesAssemblyError::RulesEvaluationError {
                        name: file.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                if let Some(existing) = modules.get(&file.name) {
                    let existing: &ModuleEntry = existing;
                    if existing.path != file.path {
                        return Err(RulesAssemblyError::RulesAmbiguous {
                            name: file.name,
                            first: existing.path.clone(),
                            second: file.path,
                        });
                    }
                } else {
                    modules.insert(
                        file.name.clone(),
                        ModuleEntry {
                            path: file.path,
                            rules,
                        },
                    );
                }
            }
        }

        let mut targets = BTreeMap::new();
        for root in &search_roots {
            for file in loader::discover_target_rules_files(root) {
                targets.entry(file.name).or_insert(file.path);
            }
        }

        if !targets.contains_key(target_name) {
            return Err(RulesAssemblyError::RulesNotFound {
                name: target_name.to_string(),
                chain: ReferenceChain::root(target_name),
            });
        }

        Ok(RulesAssembly {
            search_roots,
            modules,
            targets,
        })
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    /// `CreateTargetRules`.
    pub fn create_target_rules(
        &self,
        target_name: &str,
        _platform: Platform,
        _configuration: Configuration,
        _architecture: &str,
    ) -> Result<TargetRules, RulesAssemblyError> {
        let path = self.targets.get(target_name).ok_or_else(|| {
            RulesAssemblyError::RulesNotFound {
                name: target_name.to_string(),
                chain: ReferenceChain::root(target_name),
            }
        })?;
        let rules = loader::parse_target_rules(path).map_err(|e| {
            RulesAssemblyError::RulesEvaluationError {
                name: target_name.to_string(),
                message: e.to_string(),
            }
        })?;
        rules
            .validate()
            .map_err(|e| RulesAssemblyError::RulesEvaluationError {
                name: target_name.to_string(),
                message: e.to_string(),
            })?;
        Ok(rules)
    }

    /// `CreateModuleRules`, diagnostics carry the reference chain that led here.
    pub fn create_module_rules(
        &self,
        module_name: &str,
        chain: &ReferenceChain,
    ) -> Result<ModuleRules, RulesAssemblyError> {
        self.modules
            .get(module_name)
            .map(|entry| entry.rules.clone())
            .ok_or_else(|| RulesAssemblyError::RulesNotFound {
                name: module_name.to_string(),
                chain: chain.push(module_name),
            })
    }

    /// `GetAllModuleNames`.
    pub fn all_module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// `GetModuleFile`.
    pub fn module_file(&self, name: &str) -> Option<&Path> {
        self.modules.get(name).map(|entry| entry.path.as_path())
    }

    /// `EnumeratePlugins` delegates to the plugin registry; kept
    /// here too since it's an assembly-stage operation.
    pub fn enumerate_plugins<'a>(&self, registry: &'a PluginRegistry) -> Vec<&'a PluginInfo> {
        registry.all_plugins()
    }
}

/// Build a [`TargetDescriptor`]-scoped reference chain root, used as the
/// starting diagnostic frame for module creation.
pub fn root_chain(descriptor: &TargetDescriptor) -> ReferenceChain {
    ReferenceChain::root(descriptor.name.as_str())
}
