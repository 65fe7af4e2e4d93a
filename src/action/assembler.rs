//! Action graph assembler: walks binaries leaves-first and
//! emits compile, PCH-creation, link, metadata, post-build, and copy
//! actions with explicit prerequisite/produced-item edges.

use std::collections::HashMap;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::action::types::{Action, ActionId, ActionKind, Makefile};
use crate::core::binary::{Binary, BinaryId};
use crate::core::context::BuildContext;
use crate::core::module::ModuleId;
use crate::core::rules::{Configuration, LinkType, TargetRules};
use crate::diagnostic::BuildError;
use crate::env::propagator::{compile_environment_for, link_closure};
use crate::graph::builder::ModuleGraph;
use crate::pch::planner::PchPlan;
use crate::receipt::metadata_file_name;
use crate::toolchain::ToolChain;

pub struct AssemblerInputs<'a> {
    pub graph: &'a ModuleGraph,
    pub binaries: &'a [Binary],
    pub context: &'a BuildContext,
    pub target_rules: &'a TargetRules,
    pub target_name: &'a str,
    pub pch_plan: &'a PchPlan,
    pub toolchain: &'a dyn ToolChain,
    pub plugin_descriptor_files: &'a [PathBuf],
    /// (source, destination) pairs; a no-op copy (source == destination) is
    /// skipped.
    pub runtime_dependencies: &'a [(PathBuf, PathBuf)],
}

const SOURCE_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "c"];

fn discover_source_files(module_dir: &std::path::Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(module_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Leaves-first binary processing order (dependencies before dependents),
/// derived from the module graph's own
/// topological order (dependencies before dependents).
fn order_binaries_leaves_first<'a>(graph: &ModuleGraph, binaries: &'a [Binary]) -> Vec<&'a Binary> {
    let topo = graph.topo_order();
    let mut earliest: HashMap<BinaryId, usize> = HashMap::new();
    for (idx, module_id) in topo.iter().enumerate() {
        if let Some(bin_id) = graph.module(*module_id).binary {
            earliest.entry(bin_id).or_insert(idx);
        }
    }
    let mut ordered: Vec<&Binary> = binaries.iter().collect();
    ordered.sort_by_key(|b| earliest.get(&b.id).copied().unwrap_or(usize::MAX));
    ordered
}

struct IdAllocator(usize);

impl IdAllocator {
    fn next(&mut self) -> ActionId {
        let id = ActionId(self.0);
        self.0 += 1;
        id
    }
}

pub fn assemble_makefile(inputs: AssemblerInputs<'_>) -> Result<Makefile, BuildError> {
    let AssemblerInputs {
        graph,
        binaries,
        context,
        target_rules,
        target_name,
        pch_plan,
        toolchain,
        plugin_descriptor_files,
        runtime_dependencies,
    } = inputs;

    // The only process-environment mutation, run once before any
    // action is emitted.
    toolchain.set_environment_variables();

    let mut makefile = Makefile::default();
    makefile.plugin_files.extend(plugin_descriptor_files.iter().cloned());
    let mut ids = IdAllocator(0);
    let descriptor = context.descriptor.clone();

    if let Some(single_file) = descriptor.single_file_to_compile.clone() {
        let module_id = graph
            .all_module_ids()
            .find(|id| graph.module(*id).module_dir.contains(&single_file))
            .ok_or_else(|| {
                BuildError::graph(format!(
                    "SingleFile `{}` does not belong to any module in this build",
                    single_file.display()
                ))
            })?;
        emit_compile_action(graph, binaries, context, toolchain, &mut makefile, &mut ids, module_id, single_file);
        makefile.check_no_duplicate_outputs()?;
        return Ok(makefile);
    }

    let ordered_binaries = order_binaries_leaves_first(graph, binaries);
    let mut used_templates = std::collections::BTreeSet::new();

    for binary in &ordered_binaries {
        if binary.precompiled {
            continue;
        }
        let mut module_ids: Vec<ModuleId> = binary.modules.clone();
        module_ids.sort_by_key(|id| id.0);
        for module_id in module_ids {
            let module = graph.module(module_id);
            if module.is_external() {
                continue;
            }
            if let Some(template) = pch_plan.template_for(module_id) {
                let idx = pch_plan.templates.iter().position(|t| std::ptr::eq(t, template)).unwrap();
                used_templates.insert(idx);
            }
            for source in discover_source_files(module.module_dir.as_path()) {
                emit_compile_action(graph, binaries, context, toolchain, &mut makefile, &mut ids, module_id, source);
            }
        }
    }

    for (idx, template) in pch_plan.templates.iter().enumerate() {
        if !used_templates.contains(&idx) {
            continue;
        }
        let owner = graph.module(template.owning_module);
        let header = owner
            .rules
            .shared_pch_header_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.h", owner.name)));
        let pch_object = context.module_intermediate_dir(&owner.name).join(format!("SharedPCH.{}.pch", owner.name));
        let mut prereqs = vec![owner.module_dir.join(&header).as_path().to_path_buf()];
        prereqs.extend(template.environment.force_include_files.iter().cloned());
        makefile.actions.push(Action {
            id: ids.next(),
            kind: ActionKind::CreatePch { template_index: idx },
            working_directory: context.module_intermediate_dir(&owner.name).as_path().to_path_buf(),
            command_description: format!("create shared PCH for {}", owner.name),
            prerequisite_items: prereqs,
            produced_items: vec![pch_object],
            can_execute_remotely: true,
            status_description: format!("PCH {}", owner.name),
        });
    }

    if !target_rules.disable_linking {
        for binary in &ordered_binaries {
            if binary.precompiled {
                continue;
            }
            emit_link_action(graph, binaries, context, target_rules, toolchain, &mut makefile, &mut ids, binary);
        }
    }

    let is_modular_manifest_eligible = matches!(target_rules.link_type, LinkType::Modular) && !target_rules.disable_linking;
    if is_modular_manifest_eligible {
        emit_metadata_action(context, target_name, &mut makefile, &mut ids, ActionKind::WriteModuleManifest, "module manifest");
    }
    emit_metadata_action(context, target_name, &mut makefile, &mut ids, ActionKind::WriteTargetReceipt, "target receipt");
    let is_debug_game = context.descriptor.configuration == Configuration::DebugGame;
    if !matches!(target_rules.link_type, LinkType::Monolithic) && !is_debug_game {
        emit_metadata_action(context, target_name, &mut makefile, &mut ids, ActionKind::WriteVersionFile, "version file");
    }

    for (batch_index, step) in target_rules.post_build_steps.iter().enumerate() {
        let script_path = context.intermediate_dir().join(format!("PostBuildStep{}.sh", batch_index)).as_path().to_path_buf();
        let expanded = context.expand_path_variables(step, &[]);
        makefile.actions.push(Action {
            id: ids.next(),
            kind: ActionKind::PostBuildStep { batch_index },
            working_directory: context.intermediate_dir().as_path().to_path_buf(),
            command_description: expanded,
            prerequisite_items: makefile.produced_items().cloned().collect(),
            produced_items: vec![script_path],
            can_execute_remotely: false,
            status_description: format!("PostBuildStep {}", batch_index),
        });
    }

    for (source, destination) in runtime_dependencies {
        if source == destination {
            continue;
        }
        makefile.actions.push(Action {
            id: ids.next(),
            kind: ActionKind::Copy { from: source.clone() },
            working_directory: context.base_dir().as_path().to_path_buf(),
            command_description: format!("copy {} -> {}", source.display(), destination.display()),
            prerequisite_items: vec![source.clone()],
            produced_items: vec![destination.clone()],
            can_execute_remotely: true,
            status_description: format!("Copy {}", destination.display()),
        });
        makefile.external_dependencies.insert(source.clone());
    }

    for module_id in graph.all_module_ids() {
        let module = graph.module(module_id);
        if descriptor.hot_reload_module_suffixes.contains_key(module.name.as_str()) {
            makefile.hot_reload_module_names.insert(module.name.to_string());
        }
    }

    makefile.check_no_duplicate_outputs()?;
    Ok(makefile)
}

fn emit_compile_action(
    graph: &ModuleGraph,
    binaries: &[Binary],
    context: &BuildContext,
    toolchain: &dyn ToolChain,
    makefile: &mut Makefile,
    ids: &mut IdAllocator,
    module_id: ModuleId,
    source: PathBuf,
) {
    let module = graph.module(module_id);
    let env = compile_environment_for(graph, binaries, module_id);
    let output_dir = context.module_intermediate_dir(&module.name);
    let output = toolchain.compile_cpp_files(&env, std::slice::from_ref(&source), output_dir.as_path(), &module.name);

    let mut prereqs = vec![source.clone()];
    prereqs.extend(env.force_include_files.iter().cloned());

    let mut produced = output.object_files.clone();
    if let Some(dep_list) = &output.dependency_list_file {
        produced.push(dep_list.clone());
    }

    makefile
        .output_items_by_module
        .entry(module_id)
        .or_default()
        .extend(output.object_files.iter().cloned());

    makefile.actions.push(Action {
        id: ids.next(),
        kind: ActionKind::Compile { module: module_id, source: source.clone() },
        working_directory: output_dir.as_path().to_path_buf(),
        command_description: format!("compile {}", source.display()),
        prerequisite_items: prereqs,
        produced_items: produced,
        can_execute_remotely: true,
        status_description: format!("Compile {} [{}]", source.display(), module.name),
    });
}

fn emit_link_action(
    graph: &ModuleGraph,
    binaries: &[Binary],
    context: &BuildContext,
    target_rules: &TargetRules,
    toolchain: &dyn ToolChain,
    makefile: &mut Makefile,
    ids: &mut IdAllocator,
    binary: &Binary,
) {
    let Some(root_module) = binary.primary_module.or_else(|| binary.modules.first().copied()) else {
        return;
    };
    let env = link_closure(graph, binaries, root_module);
    let output_file = binary
        .output_files
        .first()
        .cloned()
        .unwrap_or_else(|| context.base_dir().join("Binaries").as_path().join(binary.name.as_str()));
    let build_import_library_only = false;
    let link_output = toolchain.link_files(&env, &output_file, build_import_library_only);

    let mut prereqs: Vec<PathBuf> = binary
        .modules
        .iter()
        .flat_map(|m| makefile.output_items_by_module.get(m).cloned().unwrap_or_default())
        .collect();
    for other in binaries {
        if other.id == binary.id {
            continue;
        }
        if binary.modules.iter().any(|m| {
            graph
                .module(*m)
                .private_dependencies()
                .chain(graph.module(*m).public_dependencies())
                .any(|dep| other.modules.contains(&dep))
        }) {
            prereqs.extend(other.output_files.iter().cloned());
        }
    }

    let mut produced = vec![link_output.output_file.clone()];
    produced.extend(link_output.import_library.iter().cloned());
    produced.extend(link_output.map_file.iter().cloned());
    produced.extend(link_output.symbol_file.iter().cloned());

    let post_build_outputs = toolchain.post_build(&link_output.output_file, &env);
    produced.extend(post_build_outputs);

    makefile.actions.push(Action {
        id: ids.next(),
        kind: ActionKind::Link { binary: binary.id },
        working_directory: context.base_dir().as_path().to_path_buf(),
        command_description: format!("link {}", output_file.display()),
        prerequisite_items: prereqs,
        produced_items: produced,
        can_execute_remotely: false,
        status_description: format!("Link {}", binary.name),
    });
}

fn emit_metadata_action(
    context: &BuildContext,
    target_name: &str,
    makefile: &mut Makefile,
    ids: &mut IdAllocator,
    kind: ActionKind,
    label: &str,
) {
    let extension = match &kind {
        ActionKind::WriteModuleManifest => "modules",
        ActionKind::WriteTargetReceipt => "target",
        ActionKind::WriteVersionFile => "version",
        _ => unreachable!("emit_metadata_action only called with metadata kinds"),
    };
    let file_name = metadata_file_name(target_name, context.descriptor.platform, context.descriptor.configuration, extension);
    let produced = vec![context.base_dir().join("Binaries").as_path().join(file_name)];
    makefile.actions.push(Action {
        id: ids.next(),
        kind,
        working_directory: context.base_dir().as_path().to_path_buf(),
        command_description: format!("write {}", label),
        prerequisite_items: makefile.produced_items().cloned().collect(),
        produced_items: produced,
        can_execute_remotely: false,
        status_description: format!("WriteMetadata ({})", label),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::BuildContext;
    use crate::core::path::DirRef;
    use crate::core::rules::{Configuration, Platform, TargetDescriptor};
    use crate::diagnostic::ReferenceChain;
    use crate::graph::binary_composer::compose_binaries;
    use crate::graph::builder::ModuleGraphBuilder;
    use crate::pch::planner::plan_shared_pchs;
    use crate::registry::plugin::PluginInfo;
    use crate::registry::plugin::PluginRegistry;
    use crate::rules::assembly::RulesAssembly;
    use crate::toolchain::NullToolChain;
    use crate::util::config::Config;
    use crate::util::InternedString;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn write(path: &std::path::Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn descriptor() -> TargetDescriptor {
        TargetDescriptor {
            name: InternedString::new("Game"),
            platform: Platform::Win64,
            configuration: Configuration::Development,
            architecture: "x64".into(),
            project_file: None,
            foreign_plugin: None,
            hot_reload_module_suffixes: BTreeMap::new(),
            single_file_to_compile: None,
            additional_args: Vec::new(),
        }
    }

    #[test]
    fn monolithic_build_emits_compile_link_and_metadata_actions_without_duplicates() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(&engine_source.join("Core/Private/Core.cpp"), "// core\n");
        write(&engine_source.join("Core/Core.module.toml"), "name = \"Core\"\n");
        write(&engine_source.join("Game/Private/Game.cpp"), "// game\n");
        write(
            &engine_source.join("Game/Game.module.toml"),
            "name = \"Game\"\npublic_dependency_module_names = [\"Core\"]\n",
        );
        write(
            &engine_source.join("Game/Game.target.toml"),
            "launch_module_name = \"Game\"\nlink_type = \"Monolithic\"\n",
        );

        let registry = PluginRegistry::empty();
        let assembly = RulesAssembly::load_for_target(&engine_source, None, &registry, "Game").unwrap();
        let ctx = BuildContext::new(DirRef::new(tmp.path().join("Engine")), descriptor(), Config::default());
        let plugins: Vec<&PluginInfo> = Vec::new();
        let mut builder = ModuleGraphBuilder::new(&ctx, &assembly, &plugins);
        let chain = ReferenceChain::root("Game");
        let launch = builder.find_or_create_module("Game", &chain).unwrap();
        let mut graph = builder.build();
        let target_rules = assembly
            .create_target_rules("Game", Platform::Win64, Configuration::Development, "x64")
            .unwrap();
        let binaries = compose_binaries(&mut graph, &ctx, &target_rules, "Game", launch, &[]);
        let pch_plan = plan_shared_pchs(&graph, &binaries, &target_rules, false).unwrap();
        let toolchain = NullToolChain;

        let makefile = assemble_makefile(AssemblerInputs {
            graph: &graph,
            binaries: &binaries,
            context: &ctx,
            target_rules: &target_rules,
            target_name: "Game",
            pch_plan: &pch_plan,
            toolchain: &toolchain,
            plugin_descriptor_files: &[],
            runtime_dependencies: &[],
        })
        .unwrap();

        let compile_count = makefile
            .actions
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::Compile { .. }))
            .count();
        assert_eq!(compile_count, 2);
        assert!(makefile.actions.iter().any(|a| matches!(a.kind, ActionKind::Link { .. })));
        assert!(makefile.actions.iter().any(|a| matches!(a.kind, ActionKind::WriteTargetReceipt)));
        assert!(makefile.check_no_duplicate_outputs().is_ok());
    }

    #[test]
    fn single_file_build_emits_exactly_one_compile_action() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        let source_file = engine_source.join("Game/Private/Game.cpp");
        write(&source_file, "// game\n");
        write(&engine_source.join("Game/Game.module.toml"), "name = \"Game\"\n");
        write(
            &engine_source.join("Game/Game.target.toml"),
            "launch_module_name = \"Game\"\n",
        );

        let registry = PluginRegistry::empty();
        let assembly = RulesAssembly::load_for_target(&engine_source, None, &registry, "Game").unwrap();
        let mut d = descriptor();
        d.single_file_to_compile = Some(source_file.clone());
        let ctx = BuildContext::new(DirRef::new(tmp.path().join("Engine")), d, Config::default());
        let plugins: Vec<&PluginInfo> = Vec::new();
        let mut builder = ModuleGraphBuilder::new(&ctx, &assembly, &plugins);
        let chain = ReferenceChain::root("Game");
        let launch = builder.find_or_create_module("Game", &chain).unwrap();
        let mut graph = builder.build();
        let target_rules = assembly
            .create_target_rules("Game", Platform::Win64, Configuration::Development, "x64")
            .unwrap();
        let binaries = compose_binaries(&mut graph, &ctx, &target_rules, "Game", launch, &[]);
        let pch_plan = plan_shared_pchs(&graph, &binaries, &target_rules, true).unwrap();
        let toolchain = NullToolChain;

        let makefile = assemble_makefile(AssemblerInputs {
            graph: &graph,
            binaries: &binaries,
            context: &ctx,
            target_rules: &target_rules,
            target_name: "Game",
            pch_plan: &pch_plan,
            toolchain: &toolchain,
            plugin_descriptor_files: &[],
            runtime_dependencies: &[],
        })
        .unwrap();

        assert_eq!(makefile.actions.len(), 1);
        assert!(matches!(makefile.actions[0].kind, ActionKind::Compile { .. }));
    }
}
