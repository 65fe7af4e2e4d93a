//! Environment propagator: computes each module's compile
//! environment and each binary's link environment by propagating public
//! surfaces across the dependency closure.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::core::binary::{Binary, BinaryId, BinaryType};
use crate::core::module::{DependencyKind, Module, ModuleId};
use crate::core::path::DirRef;
use crate::core::rules::ModuleRules;
use crate::graph::builder::ModuleGraph;

/// A single module's resolved compile inputs.
#[derive(Debug, Clone, Default)]
pub struct CompileEnvironment {
    pub include_paths: Vec<DirRef>,
    pub definitions: Vec<String>,
    pub force_include_files: Vec<PathBuf>,
}

/// A single binary's resolved link inputs.
#[derive(Debug, Clone, Default)]
pub struct LinkEnvironment {
    pub library_paths: Vec<PathBuf>,
    pub additional_libraries: Vec<String>,
    pub frameworks: Vec<String>,
    pub weak_frameworks: Vec<String>,
    pub additional_bundle_resources: Vec<PathBuf>,
    pub delay_load_dlls: Vec<String>,
    pub runtime_library_paths: Vec<PathBuf>,
}

fn push_unique<T: PartialEq + Clone>(dest: &mut Vec<T>, items: impl IntoIterator<Item = T>) {
    for item in items {
        if !dest.contains(&item) {
            dest.push(item);
        }
    }
}

/// Whether `id` contributes include-paths only (no link surface, no further
/// recursion through its own dependencies) when reached via an
/// `IncludePathOnly` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Membership {
    include_only: bool,
}

/// Depth-first walk of the public dependency graph reachable from `id`,
/// honoring the being-visited/visited termination rule for declared
/// circular edges.
fn visit_public(
    graph: &ModuleGraph,
    id: ModuleId,
    include_only: bool,
    membership: &mut HashMap<ModuleId, Membership>,
    order: &mut Vec<ModuleId>,
    being_visited: &mut HashSet<ModuleId>,
) {
    if let Some(existing) = membership.get_mut(&id) {
        if existing.include_only && !include_only {
            existing.include_only = false;
        }
        return;
    }
    if being_visited.contains(&id) {
        membership.insert(id, Membership { include_only });
        return;
    }

    being_visited.insert(id);
    membership.insert(id, Membership { include_only });
    order.push(id);

    if !include_only {
        let module = graph.module(id);
        let deps: Vec<(ModuleId, bool)> = module
            .edges
            .iter()
            .filter_map(|e| match e.kind {
                DependencyKind::Public => Some((e.target, false)),
                DependencyKind::IncludePathOnly => Some((e.target, true)),
                _ => None,
            })
            .collect();
        for (dep_id, dep_include_only) in deps {
            visit_public(graph, dep_id, dep_include_only, membership, order, being_visited);
        }
    }

    being_visited.remove(&id);
}

/// `PublicCompileClosure(m)`.
pub fn public_compile_closure(graph: &ModuleGraph, root: ModuleId) -> Vec<(ModuleId, bool)> {
    let mut membership = HashMap::new();
    let mut order = Vec::new();
    let mut being_visited = HashSet::new();
    visit_public(graph, root, false, &mut membership, &mut order, &mut being_visited);
    order.into_iter().map(|id| (id, membership[&id].include_only)).collect()
}

/// `PrivateCompileClosure(m) = PublicCompileClosure(m) ∪ {n | n is a
/// private-dependency of m}` with their public closures also included.
pub fn private_compile_closure(graph: &ModuleGraph, root: ModuleId) -> Vec<(ModuleId, bool)> {
    let mut membership = HashMap::new();
    let mut order = Vec::new();
    let mut being_visited = HashSet::new();
    visit_public(graph, root, false, &mut membership, &mut order, &mut being_visited);

    let private_deps: Vec<ModuleId> = graph.module(root).private_dependencies().collect();
    for dep in private_deps {
        visit_public(graph, dep, false, &mut membership, &mut order, &mut being_visited);
    }

    order.into_iter().map(|id| (id, membership[&id].include_only)).collect()
}

/// The export/import/empty value for `m`'s `<MODULE>_API` macro, as seen
/// from a compile happening as part of `source_binary`.
pub(crate) fn api_macro_value(module: &Module, source_binary: BinaryId, binaries: &[Binary]) -> &'static str {
    let Some(bin_id) = module.binary else {
        return "";
    };
    let Some(binary) = binaries.iter().find(|b| b.id == bin_id) else {
        return "";
    };
    if bin_id == source_binary {
        if binary.allow_exports && binary.binary_type != BinaryType::Executable {
            "DLLEXPORT"
        } else {
            ""
        }
    } else {
        "DLLIMPORT"
    }
}

/// `m`'s fully-formatted `<MODULE>_API` (or `<MODULE>_API=DLLEXPORT`/
/// `=DLLIMPORT`) definition, as seen from a compile happening as part of
/// `source_binary`. The single place this string is assembled - both
/// `compile_environment_for` below and `Module::api_definition`'s
/// population in `graph::binary_composer::compose_binaries` call through
/// here, so the two can't drift apart.
pub(crate) fn resolve_api_definition(module: &Module, source_binary: BinaryId, binaries: &[Binary]) -> String {
    let macro_name = module.rules.api_macro_name();
    let value = api_macro_value(module, source_binary, binaries);
    if value.is_empty() {
        macro_name
    } else {
        format!("{}={}", macro_name, value)
    }
}

/// Computes `m`'s [`CompileEnvironment`], including one `<N>_API` macro
/// definition per module `n` in `m`'s private compile closure (`m` itself
/// included): `DLLEXPORT`/empty when `n` shares `m`'s binary, `DLLIMPORT`
/// when it doesn't - the cross-binary case matters for modular/DLL builds,
/// where a module importing symbols from another binary must see its
/// `<N>_API` macro resolve to an import rather than an export declaration.
pub fn compile_environment_for(
    graph: &ModuleGraph,
    binaries: &[Binary],
    module_id: ModuleId,
) -> CompileEnvironment {
    let module = graph.module(module_id);
    let closure = private_compile_closure(graph, module_id);
    let source_binary = module.binary;

    let mut env = CompileEnvironment::default();
    for (id, include_only) in &closure {
        let member = graph.module(*id);
        push_unique(&mut env.include_paths, member.public_include_paths.iter().cloned());
        if !include_only {
            push_unique(&mut env.definitions, member.rules.public_definitions.iter().cloned());
            if let Some(source_binary) = source_binary {
                push_unique(&mut env.definitions, std::iter::once(resolve_api_definition(member, source_binary, binaries)));
            }
        }
    }
    push_unique(&mut env.include_paths, module.private_include_paths.iter().cloned());
    push_unique(&mut env.definitions, module.rules.private_definitions.iter().cloned());

    env.force_include_files = module.rules.force_include_files.clone();
    env
}

fn accumulate_link_fields(rules: &ModuleRules, env: &mut LinkEnvironment) {
    push_unique(&mut env.additional_libraries, rules.public_additional_libraries.iter().cloned());
    push_unique(&mut env.library_paths, rules.public_library_paths.iter().cloned());
    push_unique(&mut env.frameworks, rules.public_frameworks.iter().cloned());
    push_unique(&mut env.weak_frameworks, rules.public_weak_frameworks.iter().cloned());
    push_unique(&mut env.delay_load_dlls, rules.public_delay_load_dlls.iter().cloned());
    push_unique(&mut env.runtime_library_paths, rules.public_runtime_library_paths.iter().cloned());
    push_unique(&mut env.additional_bundle_resources, rules.additional_bundle_resources.iter().cloned());
}

fn binary_type_of(graph: &ModuleGraph, binaries: &[Binary], id: ModuleId) -> Option<BinaryType> {
    let bin_id = graph.module(id).binary?;
    binaries.iter().find(|b| b.id == bin_id).map(|b| b.binary_type)
}

/// `LinkClosure(m)`, called once per binary using its primary
/// (launch/plugin-root) module as the traversal seed.
///
/// Static-library recursion rule: a static archive carries no transitive
/// symbols of its own, so when a member of the closure is itself bound to a
/// `StaticLibrary` binary and the binary being linked here is not one, that
/// member's private dependencies are folded in too - normally only the
/// closure's root contributes its private dependencies.
pub fn link_closure(graph: &ModuleGraph, binaries: &[Binary], root: ModuleId) -> LinkEnvironment {
    let root_is_static = binary_type_of(graph, binaries, root) == Some(BinaryType::StaticLibrary);
    let mut env = LinkEnvironment::default();
    let mut recursed_static = HashSet::new();

    let closure = private_compile_closure(graph, root);
    for (id, include_only) in &closure {
        if *include_only {
            continue;
        }
        let module = graph.module(*id);
        accumulate_link_fields(&module.rules, &mut env);

        if !root_is_static
            && binary_type_of(graph, binaries, *id) == Some(BinaryType::StaticLibrary)
            && recursed_static.insert(*id)
        {
            for dep in module.private_dependencies() {
                for (dep_id, dep_include_only) in public_compile_closure(graph, dep) {
                    if dep_include_only {
                        continue;
                    }
                    accumulate_link_fields(&graph.module(dep_id).rules, &mut env);
                }
            }
        }
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::BuildContext;
    use crate::core::rules::{Configuration, Platform, TargetDescriptor};
    use crate::diagnostic::ReferenceChain;
    use crate::graph::binary_composer::compose_binaries;
    use crate::graph::builder::ModuleGraphBuilder;
    use crate::registry::plugin::PluginInfo;
    use crate::registry::plugin::PluginRegistry;
    use crate::rules::assembly::RulesAssembly;
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
    fn compile_environment_includes_transitive_public_definitions() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(
            &engine_source.join("Core/Core.module.toml"),
            "name = \"Core\"\npublic_definitions = [\"CORE_BUILD\"]\n",
        );
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

        let game_env = compile_environment_for(&graph, &binaries, launch);
        assert!(game_env.definitions.iter().any(|d| d == "CORE_BUILD"));
        assert!(game_env.definitions.iter().any(|d| d.starts_with("GAME_API")));
    }

    #[test]
    fn compile_environment_imports_api_macro_of_cross_binary_dependency() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(&engine_source.join("Core/Core.module.toml"), "name = \"Core\"\n");
        write(
            &engine_source.join("Game/Game.module.toml"),
            "name = \"Game\"\npublic_dependency_module_names = [\"Core\"]\n",
        );
        write(
            &engine_source.join("Game/Game.target.toml"),
            "launch_module_name = \"Game\"\nlink_type = \"Modular\"\n",
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

        // Modular link puts Core in its own DLL, separate from Game's exe.
        let core_id = graph.find_by_name("Core").unwrap();
        assert_ne!(graph.module(core_id).binary, graph.module(launch).binary);

        let game_env = compile_environment_for(&graph, &binaries, launch);
        assert!(game_env.definitions.iter().any(|d| d == "CORE_API=DLLIMPORT"));

        let core_env = compile_environment_for(&graph, &binaries, core_id);
        assert!(core_env.definitions.iter().any(|d| d == "CORE_API=DLLEXPORT"));
    }

    #[test]
    fn private_closure_adds_private_dependencys_public_closure() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(&engine_source.join("Core/Core.module.toml"), "name = \"Core\"\n");
        write(
            &engine_source.join("Helper/Helper.module.toml"),
            "name = \"Helper\"\npublic_dependency_module_names = [\"Core\"]\n",
        );
        write(
            &engine_source.join("Game/Game.module.toml"),
            "name = \"Game\"\nprivate_dependency_module_names = [\"Helper\"]\n",
        );
        write(
            &engine_source.join("Game/Game.target.toml"),
            "launch_module_name = \"Game\"\n",
        );

        let registry = PluginRegistry::empty();
        let assembly = RulesAssembly::load_for_target(&engine_source, None, &registry, "Game").unwrap();
        let ctx = BuildContext::new(DirRef::new(tmp.path().join("Engine")), descriptor(), Config::default());
        let plugins: Vec<&PluginInfo> = Vec::new();
        let mut builder = ModuleGraphBuilder::new(&ctx, &assembly, &plugins);
        let chain = ReferenceChain::root("Game");
        let launch = builder.find_or_create_module("Game", &chain).unwrap();
        let graph = builder.build();

        let closure = private_compile_closure(&graph, launch);
        let names: Vec<String> = closure.iter().map(|(id, _)| graph.module(*id).name.to_string()).collect();
        assert!(names.contains(&"Helper".to_string()));
        assert!(names.contains(&"Core".to_string()));
    }
}
