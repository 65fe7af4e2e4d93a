//! Plugin registry.
//!
//! Scans well-known roots for plugin descriptors, merges platform-extension
//! child plugins into their parents, and computes the enabled-plugin set
//! for a target from the combined engine/project/command-line precedence
//! rules.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Mutex;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::core::path::DirRef;
use crate::core::rules::{
    Platform, PluginDescriptor, PluginModuleEntry, PluginReference, PluginType, ProjectDescriptor,
    TargetDescriptor, TargetRules, TargetType,
};

pub const PLUGIN_DESCRIPTOR_EXTENSION: &str = "plugin.toml";

/// Identity of a discovered plugin.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub root_dir: DirRef,
    pub descriptor_file: PathBuf,
    pub descriptor: PluginDescriptor,
    pub plugin_type: PluginType,
    /// Platform-extension files merged into this entry, for diagnostics.
    pub merged_extension_files: Vec<PathBuf>,
}

impl PluginInfo {
    pub fn modules_for_platform(&self, platform: Platform) -> Vec<&PluginModuleEntry> {
        self.descriptor
            .modules
            .iter()
            .filter(|m| {
                (m.whitelist_platforms.is_empty() || m.whitelist_platforms.contains(&platform))
                    && !m.blacklist_platforms.contains(&platform)
            })
            .collect()
    }

    pub fn supports_platform(&self, platform: Platform) -> bool {
        self.descriptor.supported_target_platforms.is_empty()
            || self.descriptor.supported_target_platforms.contains(&platform)
    }
}

fn parse_platform_suffix(suffix: &str) -> Option<Platform> {
    match suffix.to_ascii_lowercase().as_str() {
        "win64" | "windows" => Some(Platform::Win64),
        "mac" | "macos" => Some(Platform::Mac),
        "linux" => Some(Platform::Linux),
        "hololens" => Some(Platform::HoloLens),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct RawDescriptorFile {
    root_label: PluginType,
    path: PathBuf,
}

/// Walk `root`, appending every `*.plugin.toml` file it finds into a
/// shared, lock-protected list. `rayon` provides the work-
/// stealing pool; the top-level subdirectories are the work items.
fn scan_root_parallel(root: &DirRef, plugin_type: PluginType, out: &Mutex<Vec<RawDescriptorFile>>) {
    if !root.exists() {
        return;
    }
    let top_level: Vec<PathBuf> = std::fs::read_dir(root.as_path())
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();

    top_level.par_iter().for_each(|dir| {
        let mut local = Vec::new();
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if file_name.ends_with(&format!(".{}", PLUGIN_DESCRIPTOR_EXTENSION)) {
                local.push(RawDescriptorFile {
                    root_label: plugin_type,
                    path: entry.path().to_path_buf(),
                });
            }
        }
        if !local.is_empty() {
            out.lock().unwrap().extend(local);
        }
    });

    // The root itself may directly contain a descriptor (not nested under
    // a subdirectory per plugin).
    for entry in std::fs::read_dir(root.as_path()).into_iter().flatten().flatten() {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_file() && file_name.ends_with(&format!(".{}", PLUGIN_DESCRIPTOR_EXTENSION)) {
            out.lock().unwrap().push(RawDescriptorFile {
                root_label: plugin_type,
                path: entry.path(),
            });
        }
    }
}

fn parse_descriptor(path: &std::path::Path) -> anyhow::Result<PluginDescriptor> {
    let contents = std::fs::read_to_string(path)?;
    let descriptor: PluginDescriptor = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
    Ok(descriptor)
}

/// The merged set of plugins known to one driver invocation.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginInfo>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        PluginRegistry::default()
    }

    /// Scan the engine/enterprise/project/mod roots plus any additional
    /// roots, merge platform-extension children into parents, and return
    /// the combined registry. Result ordering is deterministic: the raw
    /// file list is sorted by path before anything else consumes it.
    pub fn scan(
        engine_plugins_root: &DirRef,
        enterprise_plugins_root: Option<&DirRef>,
        project_plugins_root: Option<&DirRef>,
        project_mods_root: Option<&DirRef>,
        additional_roots: &[DirRef],
    ) -> (Self, Vec<String>) {
        let collected: Mutex<Vec<RawDescriptorFile>> = Mutex::new(Vec::new());

        scan_root_parallel(engine_plugins_root, PluginType::Engine, &collected);
        if let Some(root) = enterprise_plugins_root {
            scan_root_parallel(root, PluginType::Enterprise, &collected);
        }
        if let Some(root) = project_plugins_root {
            scan_root_parallel(root, PluginType::Project, &collected);
        }
        if let Some(root) = project_mods_root {
            scan_root_parallel(root, PluginType::Mod, &collected);
        }
        for root in additional_roots {
            scan_root_parallel(root, PluginType::External, &collected);
        }

        let mut files = collected.into_inner().unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut warnings = Vec::new();
        let mut primaries: BTreeMap<String, PluginInfo> = BTreeMap::new();
        let mut pending_children: Vec<(String, Platform, RawDescriptorFile)> = Vec::new();

        for file in &files {
            let stem = file
                .path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .strip_suffix(&format!(".{}", PLUGIN_DESCRIPTOR_EXTENSION))
                .unwrap()
                .to_string();

            let mut is_child = false;
            if let Some(idx) = stem.rfind('_') {
                let (base, suffix) = stem.split_at(idx);
                let suffix = &suffix[1..];
                if let Some(platform) = parse_platform_suffix(suffix) {
                    pending_children.push((base.to_string(), platform, file.clone()));
                    is_child = true;
                }
            }
            if is_child {
                continue;
            }

            match parse_descriptor(&file.path) {
                Ok(descriptor) => {
                    let root_dir = DirRef::new(file.path.parent().unwrap().to_path_buf());
                    primaries.insert(
                        stem.clone(),
                        PluginInfo {
                            name: stem,
                            root_dir,
                            descriptor_file: file.path.clone(),
                            descriptor,
                            plugin_type: file.root_label,
                            merged_extension_files: Vec::new(),
                        },
                    );
                }
                Err(e) => warnings.push(format!("failed to parse plugin descriptor {}: {}", file.path.display(), e)),
            }
        }

        for (parent_name, platform, file) in pending_children {
            let Some(parent) = primaries.get_mut(&parent_name) else {
                warnings.push(format!(
                    "platform-extension plugin file {} has no parent plugin `{}`; ignored",
                    file.path.display(),
                    parent_name
                ));
                continue;
            };
            match parse_descriptor(&file.path) {
                Ok(child) => merge_child_descriptor(parent, &child, platform),
                Err(e) => {
                    warnings.push(format!("failed to parse plugin descriptor {}: {}", file.path.display(), e));
                    continue;
                }
            }
            parent.merged_extension_files.push(file.path.clone());
        }

        (PluginRegistry { plugins: primaries }, warnings)
    }

    pub fn all_plugins(&self) -> Vec<&PluginInfo> {
        self.plugins.values().collect()
    }

    pub fn get(&self, name: &str) -> Option<&PluginInfo> {
        self.plugins.get(name)
    }

    /// Combine precedence (decreasing): foreign-plugin flag, explicit
    /// target `EnablePlugins`/`DisablePlugins`, project descriptor's plugin
    /// references, engine defaults (gated by "disable engine plugins by
    /// default"), and (Program targets only) an extra-plugins list.
    pub fn enabled_plugins_for_target(
        &self,
        descriptor: &TargetDescriptor,
        target_rules: &TargetRules,
        project: Option<&ProjectDescriptor>,
        program_extra_plugins: &[String],
    ) -> BTreeSet<String> {
        if let Some(foreign) = &descriptor.foreign_plugin {
            let name = foreign
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            return BTreeSet::from([name]);
        }

        let mut enabled: BTreeSet<String> = BTreeSet::new();
        let mut explicitly_disabled: BTreeSet<String> = BTreeSet::new();

        let disable_engine_defaults = project.map(|p| p.disable_engine_plugins_by_default).unwrap_or(false);
        if !disable_engine_defaults {
            for plugin in self.plugins.values() {
                if plugin.descriptor.enabled_by_default {
                    enabled.insert(plugin.name.clone());
                }
            }
        }

        if target_rules.target_type == TargetType::Program {
            for name in program_extra_plugins {
                enabled.insert(name.clone());
            }
        }

        if let Some(project) = project {
            for reference in &project.plugins {
                if reference.enabled {
                    enabled.insert(reference.name.clone());
                } else {
                    explicitly_disabled.insert(reference.name.clone());
                }
            }
        }

        for name in &target_rules.enable_plugins {
            enabled.insert(name.clone());
            explicitly_disabled.remove(name);
        }
        for name in &target_rules.disable_plugins {
            explicitly_disabled.insert(name.clone());
        }

        for name in &explicitly_disabled {
            enabled.remove(name);
        }

        enabled
    }
}

/// Merge a platform-extension child descriptor into its parent:
/// union supported-target-platforms, modules (by `(name, type)` key - child
/// overrides whitelist/blacklist of platforms), plugin references (by name -
/// whitelist union only if parent had one; blacklist union always).
fn merge_child_descriptor(parent: &mut PluginInfo, child: &PluginDescriptor, platform: Platform) {
    if !parent.descriptor.supported_target_platforms.is_empty()
        && !parent.descriptor.supported_target_platforms.contains(&platform)
    {
        parent.descriptor.supported_target_platforms.push(platform);
    }

    for child_module in &child.modules {
        if let Some(existing) = parent
            .descriptor
            .modules
            .iter_mut()
            .find(|m| m.name == child_module.name && m.module_type == child_module.module_type)
        {
            if !existing.whitelist_platforms.contains(&platform) {
                existing.whitelist_platforms.push(platform);
            }
            existing.blacklist_platforms.retain(|p| *p != platform);
        } else {
            let mut entry = child_module.clone();
            if entry.whitelist_platforms.is_empty() {
                entry.whitelist_platforms.push(platform);
            }
            parent.descriptor.modules.push(entry);
        }
    }

    let parent_had_whitelist = parent.descriptor.plugin_references.iter().any(|r| r.enabled);
    for child_ref in &child.plugin_references {
        if parent
            .descriptor
            .plugin_references
            .iter()
            .any(|r| r.name == child_ref.name)
        {
            continue;
        }
        if child_ref.enabled {
            if parent_had_whitelist {
                parent.descriptor.plugin_references.push(child_ref.clone());
            }
        } else {
            parent.descriptor.plugin_references.push(child_ref.clone());
        }
    }
}
