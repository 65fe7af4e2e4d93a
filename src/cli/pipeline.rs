//! Orchestrates one target build end to end, driving rules assembly
//! through receipt writing for every (platform, configuration, target)
//! triple named on the command line: rules assembly, plugin registry, module graph,
//! binary composition, environment propagation, shared-PCH planning, action
//! assembly, and receipt/manifest writing. Nothing here spawns a compiler or
//! linker - the [`crate::toolchain::NullToolChain`] plugged in below only
//! names outputs symbolically, the same way the action assembler's own unit
//! tests exercise it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::action::{assemble_makefile, Action, ActionKind, AssemblerInputs, Makefile};
use crate::cli::args::Invocation;
use crate::core::binary::BinaryType;
use crate::core::context::BuildContext;
use crate::core::path::DirRef;
use crate::core::rules::{BuildEnvironment, Configuration, LinkType, Platform, ProjectDescriptor, TargetDescriptor};
use crate::diagnostic::{BuildError, Diagnostic, DiagnosticList, ReferenceChain};
use crate::graph::{binary_output_path, compose_binaries};
use crate::graph::builder::ModuleGraphBuilder;
use crate::pch::plan_shared_pchs;
use crate::receipt::model::{AdditionalProperty, BuildProduct, BuildProductType, ModuleManifest, RuntimeDependency, TargetReceipt, VersionInfo};
use crate::receipt::{metadata_file_name, write_module_manifest, write_target_receipt, write_version_file};
use crate::registry::plugin::PluginRegistry;
use crate::rules::assembly::RulesAssembly;
use crate::toolchain::NullToolChain;
use crate::util::config::Config;

/// The outcome of building one (platform, configuration, target) triple.
#[derive(Debug)]
pub struct BuildSummary {
    pub target_name: String,
    pub platform: Platform,
    pub configuration: Configuration,
    pub makefile: Makefile,
    pub receipt_path: Option<PathBuf>,
    pub diagnostics: DiagnosticList,
}

/// The outcome of a full invocation, possibly spanning several triples
/// (`-Target=` repeated, a `+`-joined platform/configuration list, or a
/// `-TargetList=` file).
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub summaries: Vec<BuildSummary>,
    pub failed: bool,
}

fn binary_product_type(binary_type: BinaryType) -> BuildProductType {
    match binary_type {
        BinaryType::Executable => BuildProductType::Executable,
        BinaryType::DynamicLinkLibrary => BuildProductType::DynamicLibrary,
        BinaryType::StaticLibrary => BuildProductType::StaticLibrary,
        BinaryType::Object | BinaryType::PrecompiledHeader => BuildProductType::BuildResource,
    }
}

/// `Name-42.dll` from `Name.dll` and hot-reload suffix `42`.
fn apply_hot_reload_suffix(path: &Path, suffix: u32) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());
    let file_name = match extension {
        Some(ext) => format!("{}-{}.{}", stem, suffix, ext),
        None => format!("{}-{}", stem, suffix),
    };
    path.with_file_name(file_name)
}

fn load_project_descriptor(project_file: &Path) -> Result<ProjectDescriptor, BuildError> {
    let contents = std::fs::read_to_string(project_file).map_err(|e| {
        BuildError::configuration(format!("failed to read project file {}: {}", project_file.display(), e))
    })?;
    toml::from_str(&contents)
        .map_err(|e| BuildError::configuration(format!("failed to parse project file {}: {}", project_file.display(), e)))
}

/// A JSON-friendly projection of a [`Makefile`]'s actions, written by
/// `-WriteActions=<path>`. Deliberately a separate DTO rather than
/// deriving `Serialize` on [`Action`] itself: several internal id types
/// (`ModuleId`, `BinaryId`) are array indices, not the stable identifiers an
/// external reader of this file should depend on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ActionPlanEntry {
    id: usize,
    kind: String,
    command_description: String,
    prerequisite_items: Vec<PathBuf>,
    produced_items: Vec<PathBuf>,
    can_execute_remotely: bool,
}

fn action_kind_label(kind: &ActionKind) -> String {
    match kind {
        ActionKind::Compile { .. } => "Compile".to_string(),
        ActionKind::CreatePch { .. } => "CreatePch".to_string(),
        ActionKind::Link { .. } => "Link".to_string(),
        ActionKind::WriteModuleManifest => "WriteModuleManifest".to_string(),
        ActionKind::WriteTargetReceipt => "WriteTargetReceipt".to_string(),
        ActionKind::WriteVersionFile => "WriteVersionFile".to_string(),
        ActionKind::PostBuildStep { .. } => "PostBuildStep".to_string(),
        ActionKind::Copy { .. } => "Copy".to_string(),
    }
}

fn write_action_plan(path: &Path, makefile: &Makefile) -> Result<(), BuildError> {
    let entries: Vec<ActionPlanEntry> = makefile
        .actions
        .iter()
        .map(|action: &Action| ActionPlanEntry {
            id: action.id.0,
            kind: action_kind_label(&action.kind),
            command_description: action.command_description.clone(),
            prerequisite_items: action.prerequisite_items.clone(),
            produced_items: action.produced_items.clone(),
            can_execute_remotely: action.can_execute_remotely,
        })
        .collect();
    let json = serde_json::to_string_pretty(&entries)
        .map_err(|e| BuildError::configuration(format!("failed to serialize action plan: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BuildError::configuration(format!("failed to create {}: {}", parent.display(), e)))?;
    }
    std::fs::write(path, json).map_err(|e| BuildError::configuration(format!("failed to write {}: {}", path.display(), e)))
}

/// Build one (platform, configuration, target) triple through the full
/// pipeline. Returns `Err` only for a configuration-time failure that
/// prevents the build from starting at all (rules/plugin loading, target
/// validation); everything discovered once the build context exists is
/// reported through the returned [`BuildSummary::diagnostics`] instead, as
/// a single ordered list.
pub fn run_one(
    invocation: &Invocation,
    config: &Config,
    target_name: &str,
    platform: Platform,
    configuration: Configuration,
) -> Result<BuildSummary, BuildError> {
    let engine_dir = DirRef::new(invocation.engine_dir.clone());
    let project_dir = invocation
        .project_file
        .as_ref()
        .and_then(|p| p.parent())
        .map(|p| DirRef::new(p.to_path_buf()));
    let architecture = invocation.architecture.clone().unwrap_or_else(|| "x64".to_string());

    let descriptor = TargetDescriptor {
        name: crate::util::InternedString::new(target_name),
        platform,
        configuration,
        architecture,
        project_file: invocation.project_file.clone(),
        foreign_plugin: invocation.plugin.clone(),
        hot_reload_module_suffixes: invocation.module_with_suffix.clone(),
        single_file_to_compile: invocation.single_file.clone(),
        additional_args: invocation.additional_args.clone(),
    };

    let engine_plugins_root = engine_dir.join("Plugins");
    let project_plugins_root = project_dir.as_ref().map(|d| d.join("Plugins"));
    let (registry, scan_warnings) = PluginRegistry::scan(
        &engine_plugins_root,
        None,
        project_plugins_root.as_ref(),
        None,
        &[],
    );

    let engine_source_dir = engine_dir.join("Source");
    let project_source_dir = project_dir.as_ref().map(|d| d.join("Source"));
    let assembly = RulesAssembly::load_for_target(
        engine_source_dir.as_path(),
        project_source_dir.as_ref().map(|d| d.as_path()),
        &registry,
        target_name,
    )
    .map_err(|e| BuildError::rules(e.to_string(), &ReferenceChain::root(target_name)))?;

    let mut target_rules = assembly
        .create_target_rules(target_name, platform, configuration, &descriptor.architecture)
        .map_err(|e| BuildError::rules(e.to_string(), &ReferenceChain::root(target_name)))?;

    if let Some(target_type) = invocation.target_type {
        target_rules.target_type = target_type;
    }

    let is_foreign_plugin_build = descriptor.is_foreign_plugin_build();
    let is_single_file_build = descriptor.is_single_file_build();
    if is_foreign_plugin_build {
        // Foreign plugin compile: disable_linking is forced on regardless
        // of what the target rules declared.
        target_rules.disable_linking = true;
    }

    let project_descriptor = project_dir
        .as_ref()
        .and_then(|_| invocation.project_file.as_ref())
        .map(|p| load_project_descriptor(p))
        .transpose()?;

    let enabled_plugin_names =
        registry.enabled_plugins_for_target(&descriptor, &target_rules, project_descriptor.as_ref(), &[]);
    let enabled_plugins: Vec<&crate::registry::PluginInfo> = registry
        .all_plugins()
        .into_iter()
        .filter(|p| enabled_plugin_names.contains(&p.name))
        .collect();

    let ctx = {
        let mut ctx = BuildContext::new(engine_dir.clone(), descriptor.clone(), config.clone());
        if let Some(dir) = project_dir.clone() {
            ctx = ctx.with_project_dir(dir);
        }
        ctx
    };

    let root_chain = ReferenceChain::root(target_name);
    let mut builder = ModuleGraphBuilder::new(&ctx, &assembly, &enabled_plugins);
    let launch_module = builder.find_or_create_module(&target_rules.launch_module_name, &root_chain)?;

    for name in &target_rules.extra_module_names {
        builder.find_or_create_module(name, &root_chain)?;
    }

    let mut plugin_modules: Vec<(String, Vec<crate::core::module::ModuleId>)> = Vec::new();
    for plugin in &enabled_plugins {
        let mut ids = Vec::new();
        for module_entry in plugin.modules_for_platform(platform) {
            let chain = root_chain.push(&plugin.name);
            ids.push(builder.find_or_create_module(&module_entry.name, &chain)?);
        }
        if !ids.is_empty() {
            plugin_modules.push((plugin.name.clone(), ids));
        }
    }

    let mut graph = builder.build();
    let binaries = compose_binaries(&mut graph, &ctx, &target_rules, target_name, launch_module, &plugin_modules);

    let disable_shared_pchs = is_foreign_plugin_build || is_single_file_build;
    let pch_plan = plan_shared_pchs(&graph, &binaries, &target_rules, disable_shared_pchs)?;

    let toolchain = NullToolChain;
    let plugin_descriptor_files: Vec<PathBuf> = enabled_plugins.iter().map(|p| p.descriptor_file.clone()).collect();

    let makefile = assemble_makefile(AssemblerInputs {
        graph: &graph,
        binaries: &binaries,
        context: &ctx,
        target_rules: &target_rules,
        target_name,
        pch_plan: &pch_plan,
        toolchain: &toolchain,
        plugin_descriptor_files: &plugin_descriptor_files,
        runtime_dependencies: &[],
    })?;

    for warning in scan_warnings {
        ctx.report(Diagnostic::warning(warning));
    }

    for path in &invocation.write_actions {
        write_action_plan(path, &makefile)?;
    }

    let mut receipt_path = None;
    if !ctx.has_fatal_diagnostics() && !is_single_file_build {
        let mut build_products: Vec<BuildProduct> = Vec::new();
        let mut launch_path = None;
        for binary in &binaries {
            let mut output = binary.output_files.first().cloned().unwrap_or_else(|| {
                binary_output_path(
                    ctx.base_dir(),
                    binary.name.as_str(),
                    platform,
                    configuration,
                    &ctx.descriptor.architecture,
                    target_rules.undecorated_configuration,
                    binary.binary_type,
                )
            });
            if let Some(primary) = binary.primary_module {
                let module_name = graph.module(primary).name.to_string();
                if let Some(&suffix) = descriptor.hot_reload_module_suffixes.get(module_name.as_str()) {
                    output = apply_hot_reload_suffix(&output, suffix);
                }
            }
            if Some(binary.id) == graph.module(launch_module).binary {
                launch_path = Some(output.clone());
            }
            build_products.push(BuildProduct {
                path: output,
                product_type: binary_product_type(binary.binary_type),
            });
        }

        let runtime_dependencies: Vec<RuntimeDependency> = Vec::new();
        let mut plugin_names: Vec<String> = enabled_plugins.iter().map(|p| p.name.clone()).collect();
        plugin_names.sort();

        let receipt = TargetReceipt {
            target_name: target_name.to_string(),
            platform: platform.to_string(),
            configuration: configuration.to_string(),
            architecture: ctx.descriptor.architecture.clone(),
            version: VersionInfo::default(),
            launch: launch_path.unwrap_or_else(|| ctx.base_dir().join("Binaries").as_path().join(target_name)),
            build_products,
            runtime_dependencies,
            additional_properties: Vec::<AdditionalProperty>::new(),
            plugins: plugin_names,
        };

        let binaries_dir = ctx.base_dir().join("Binaries");
        let receipt_file = binaries_dir.as_path().join(metadata_file_name(target_name, platform, configuration, "target"));
        write_target_receipt(&receipt_file, &receipt)
            .map_err(|e| BuildError::configuration(format!("failed to write target receipt: {}", e)))?;
        receipt_path = Some(receipt_file);

        let is_modular_manifest_eligible = matches!(target_rules.link_type, LinkType::Modular) && !target_rules.disable_linking;
        if is_modular_manifest_eligible {
            let mut modules = BTreeMap::new();
            for binary in &binaries {
                if binary.binary_type != BinaryType::DynamicLinkLibrary {
                    continue;
                }
                if let Some(mut output) = binary.output_files.first().cloned() {
                    if let Some(primary) = binary.primary_module {
                        let module_name = graph.module(primary).name.to_string();
                        if let Some(&suffix) = descriptor.hot_reload_module_suffixes.get(module_name.as_str()) {
                            output = apply_hot_reload_suffix(&output, suffix);
                        }
                        let file_name = output.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                        modules.insert(module_name, file_name);
                    }
                }
            }
            let manifest = ModuleManifest {
                build_id: build_id_for(&makefile),
                modules,
            };
            let manifest_file = binaries_dir.as_path().join(metadata_file_name(target_name, platform, configuration, "modules"));
            write_module_manifest(&manifest_file, &manifest)
                .map_err(|e| BuildError::configuration(format!("failed to write module manifest: {}", e)))?;
        }

        let is_debug_game = configuration == Configuration::DebugGame;
        if !matches!(target_rules.link_type, LinkType::Monolithic) && !is_debug_game {
            let version_file = binaries_dir.as_path().join(metadata_file_name(target_name, platform, configuration, "version"));
            write_version_file(&version_file, &build_id_for(&makefile))
                .map_err(|e| BuildError::configuration(format!("failed to write version file: {}", e)))?;
        }
    }

    Ok(BuildSummary {
        target_name: target_name.to_string(),
        platform,
        configuration,
        makefile,
        receipt_path,
        diagnostics: ctx.diagnostics(),
    })
}

/// A build id stable for a given action graph shape - the count of actions
/// is enough to detect "this receipt is stale relative to this makefile" for
/// the hot-reload flow without hashing file contents this port never reads.
fn build_id_for(makefile: &Makefile) -> String {
    format!("{:x}", makefile.actions.len())
}

fn target_names(invocation: &Invocation) -> Result<Vec<String>, BuildError> {
    let mut names = invocation.targets.clone();
    if let Some(list_file) = &invocation.target_list_file {
        let contents = std::fs::read_to_string(list_file).map_err(|e| {
            BuildError::configuration(format!("failed to read -TargetList file {}: {}", list_file.display(), e))
        })?;
        for line in contents.lines() {
            let line = line.trim();
            if !line.is_empty() {
                names.push(line.to_string());
            }
        }
    }
    if names.is_empty() {
        return Err(BuildError::configuration("no target given; pass -Target=<Name> or -TargetList=<file>"));
    }
    Ok(names)
}

/// Checks that every target sharing the `Shared` build environment agrees on its `requires_unique_environment_overrides`
/// with the first such target in this invocation. Returns
/// the conflicting pair's names on violation; loading rules again here (the
/// per-triple pipeline already does this once per target) is cheaper than
/// threading a cross-target accumulator through `run_one`.
fn find_shared_environment_conflict(
    invocation: &Invocation,
    names: &[String],
) -> Result<Option<(String, String, BuildError)>, BuildError> {
    if names.len() < 2 || invocation.platforms.is_empty() || invocation.configurations.is_empty() {
        return Ok(None);
    }
    let engine_dir = DirRef::new(invocation.engine_dir.clone());
    let project_dir = invocation.project_file.as_ref().and_then(|p| p.parent()).map(|p| DirRef::new(p.to_path_buf()));
    let engine_plugins_root = engine_dir.join("Plugins");
    let project_plugins_root = project_dir.as_ref().map(|d| d.join("Plugins"));
    let (registry, _) = PluginRegistry::scan(&engine_plugins_root, None, project_plugins_root.as_ref(), None, &[]);
    let engine_source_dir = engine_dir.join("Source");
    let project_source_dir = project_dir.as_ref().map(|d| d.join("Source"));
    let platform = invocation.platforms[0];
    let configuration = invocation.configurations[0];
    let architecture = invocation.architecture.clone().unwrap_or_else(|| "x64".to_string());

    let mut base: Option<(String, crate::core::rules::TargetRules)> = None;
    for name in names {
        let assembly = match RulesAssembly::load_for_target(
            engine_source_dir.as_path(),
            project_source_dir.as_ref().map(|d| d.as_path()),
            &registry,
            name,
        ) {
            Ok(a) => a,
            Err(_) => continue,
        };
        let rules = match assembly.create_target_rules(name, platform, configuration, &architecture) {
            Ok(r) => r,
            Err(_) => continue,
        };
        if rules.build_environment != BuildEnvironment::Shared {
            continue;
        }
        match &base {
            None => base = Some((name.clone(), rules)),
            Some((base_name, base_rules)) => {
                if let Err(e) = rules.check_unique_environment(base_rules) {
                    return Ok(Some((base_name.clone(), name.clone(), e)));
                }
            }
        }
    }
    Ok(None)
}

/// Drives every (platform, configuration, target) triple named by the
/// invocation. Each triple's pipeline failure is
/// independent: one bad target doesn't stop the others from being attempted.
pub fn run(invocation: &Invocation, config: &Config) -> Result<RunOutcome, BuildError> {
    let names = target_names(invocation)?;
    let mut outcome = RunOutcome::default();

    if let Some((first, second, conflict)) = find_shared_environment_conflict(invocation, &names)? {
        eprintln!("error: {} and {} share a build environment but disagree: {}", first, second, conflict);
        outcome.failed = true;
        return Ok(outcome);
    }

    for target_name in &names {
        for &platform in &invocation.platforms {
            for &configuration in &invocation.configurations {
                match run_one(invocation, config, target_name, platform, configuration) {
                    Ok(summary) => {
                        if summary.diagnostics.has_fatal() {
                            outcome.failed = true;
                        }
                        outcome.summaries.push(summary);
                    }
                    Err(e) => {
                        outcome.failed = true;
                        eprintln!("error: {}", e);
                    }
                }
            }
        }
    }

    Ok(outcome)
}
