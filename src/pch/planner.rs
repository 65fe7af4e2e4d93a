//! Shared-PCH planner.
//!
//! Candidates are ordered once per build, then each eligible module picks
//! the highest-priority compatible template reachable in its public
//! dependency closure.

use std::collections::HashMap;

use crate::core::binary::Binary;
use crate::core::module::ModuleId;
use crate::core::rules::{PchMode, TargetRules};
use crate::diagnostic::BuildError;
use crate::env::propagator::{compile_environment_for, public_compile_closure, CompileEnvironment};
use crate::graph::builder::ModuleGraph;

/// A single shared-PCH candidate, ranked and given its own cloned compile
/// environment.
#[derive(Debug, Clone)]
pub struct PchTemplate {
    pub owning_module: ModuleId,
    pub priority: usize,
    pub environment: CompileEnvironment,
    compat: PchCompatibilityKey,
}

/// The result of planning: the ordered template list plus each eligible
/// module's chosen template, if any.
#[derive(Debug, Clone, Default)]
pub struct PchPlan {
    pub templates: Vec<PchTemplate>,
    selected: HashMap<ModuleId, usize>,
}

impl PchPlan {
    pub fn template_for(&self, module: ModuleId) -> Option<&PchTemplate> {
        self.selected.get(&module).map(|&idx| &self.templates[idx])
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn module_permits_shared_pch(pch_mode: PchMode) -> bool {
    matches!(pch_mode, PchMode::UseSharedPCHs | PchMode::UseExplicitOrShared)
}

/// A module's PCH-governing settings; two modules sharing a template must
/// agree on all of these.
/// This port resolves one `TargetRules` per build invocation, so these
/// fields are target-wide rather than per-module - every module in the same
/// build is trivially compatible with every other, which is why
/// compatibility here reduces to "both declared under the same target".
/// The key is still computed explicitly so a future per-module override
/// (sanitizers, optimization class) has somewhere to plug in without
/// changing the planner's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PchCompatibilityKey {
    enable_exceptions: bool,
    enable_rtti: bool,
}

fn compatibility_key(target_rules: &TargetRules) -> PchCompatibilityKey {
    PchCompatibilityKey {
        enable_exceptions: target_rules.enable_exceptions,
        enable_rtti: target_rules.enable_rtti,
    }
}

/// `disable_shared_pchs` is set by callers that must force shared
/// PCHs off regardless of rules content (foreign-plugin and single-file
/// builds).
pub fn plan_shared_pchs(
    graph: &ModuleGraph,
    binaries: &[Binary],
    target_rules: &TargetRules,
    disable_shared_pchs: bool,
) -> Result<PchPlan, BuildError> {
    if disable_shared_pchs || matches!(target_rules.pch_mode, PchMode::None | PchMode::NoSharedPCHs) {
        return Ok(PchPlan::default());
    }

    let mut candidate_ids = Vec::new();
    for id in graph.all_module_ids() {
        let module = graph.module(id);
        if module.rules.shared_pch_header_file.is_some() {
            if !module.rules.permits_shared_pch_use {
                return Err(BuildError::rules(
                    format!(
                        "module `{}` declares a SharedPCHHeaderFile but does not permit shared PCH use",
                        module.name
                    ),
                    &crate::diagnostic::ReferenceChain::root(module.name.as_str()),
                ));
            }
            candidate_ids.push(id);
        }
    }

    let candidate_set: std::collections::HashSet<ModuleId> = candidate_ids.iter().copied().collect();

    let mut ranked: Vec<(ModuleId, usize)> = candidate_ids
        .iter()
        .map(|&id| {
            let closure = public_compile_closure(graph, id);
            let priority = closure
                .iter()
                .filter(|(member, _)| *member != id && candidate_set.contains(member))
                .count();
            (id, priority)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| graph.module(a.0).name.as_str().cmp(graph.module(b.0).name.as_str()))
    });

    let compat = compatibility_key(target_rules);
    let templates: Vec<PchTemplate> = ranked
        .into_iter()
        .map(|(id, priority)| PchTemplate {
            owning_module: id,
            priority,
            environment: compile_environment_for(graph, binaries, id),
            compat,
        })
        .collect();

    let mut selected = HashMap::new();

    for id in graph.all_module_ids() {
        let module = graph.module(id);
        if module.binary.is_none() || !module_permits_shared_pch(module.rules.pch_mode) {
            continue;
        }
        let closure: std::collections::HashSet<ModuleId> =
            public_compile_closure(graph, id).into_iter().map(|(m, _)| m).collect();

        if let Some((idx, _)) = templates
            .iter()
            .enumerate()
            .find(|(_, template)| closure.contains(&template.owning_module) && template.compat == compat)
        {
            selected.insert(id, idx);
        }
    }

    Ok(PchPlan { templates, selected })
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
    fn picks_highest_priority_candidate_in_public_closure() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(
            &engine_source.join("Core/Core.module.toml"),
            "name = \"Core\"\nshared_pch_header_file = \"Core.h\"\npermits_shared_pch_use = true\npch_mode = \"UseSharedPCHs\"\n",
        );
        write(
            &engine_source.join("Engine/Engine.module.toml"),
            "name = \"Engine\"\npublic_dependency_module_names = [\"Core\"]\nshared_pch_header_file = \"Engine.h\"\npermits_shared_pch_use = true\npch_mode = \"UseSharedPCHs\"\n",
        );
        write(
            &engine_source.join("Game/Game.module.toml"),
            "name = \"Game\"\npublic_dependency_module_names = [\"Engine\"]\npch_mode = \"UseSharedPCHs\"\n",
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

        let plan = plan_shared_pchs(&graph, &binaries, &target_rules, false).unwrap();
        assert_eq!(plan.templates.len(), 2);
        // Engine is reachable from Core's closure too, but Core has no
        // candidates below it, so Engine (which can see Core) ranks first.
        assert_eq!(graph.module(plan.templates[0].owning_module).name.as_str(), "Engine");

        let chosen = plan.template_for(launch).expect("Game should pick a shared PCH");
        assert_eq!(graph.module(chosen.owning_module).name.as_str(), "Engine");
    }

    #[test]
    fn disabled_flag_produces_empty_plan() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(&engine_source.join("Game/Game.module.toml"), "name = \"Game\"\n");
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
        let mut graph = builder.build();
        let target_rules = assembly
            .create_target_rules("Game", Platform::Win64, Configuration::Development, "x64")
            .unwrap();
        let binaries = compose_binaries(&mut graph, &ctx, &target_rules, "Game", launch, &[]);

        let plan = plan_shared_pchs(&graph, &binaries, &target_rules, true).unwrap();
        assert!(plan.is_empty());
    }
}
