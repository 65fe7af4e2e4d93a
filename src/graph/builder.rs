//! Module graph builder.
//!
//! `FindOrCreateModule` is the single entry point; everything else is a
//! consequence of its recursion. Modules are arena-allocated and addressed
//! by [`ModuleId`] so a cyclic dependency edge never needs a reference back
//! into the arena it came from.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::core::context::BuildContext;
use crate::core::module::{DependencyKind, Module, ModuleEdge, ModuleId};
use crate::core::path::DirRef;
use crate::diagnostic::{BuildError, ReferenceChain};
use crate::registry::plugin::PluginInfo;
use crate::rules::assembly::RulesAssembly;
use crate::util::InternedString;

/// The resolved module graph for one target build: an arena of [`Module`]
/// plus a `petgraph` view over the same nodes, kept in lock-step so callers
/// can use either addressing scheme (direct arena index for data, the graph
/// for traversal algorithms like topological order).
pub struct ModuleGraph {
    arena: Vec<Module>,
    by_name: HashMap<String, ModuleId>,
    graph: DiGraph<ModuleId, DependencyKind>,
}

impl ModuleGraph {
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.arena[id.0]
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.arena[id.0]
    }

    pub fn find_by_name(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    pub fn all_module_ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.arena.iter().map(|m| m.id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Topological order over the module dependency graph (dependencies
    /// before dependents), used by the environment propagator and action
    /// assembler to visit modules in a safe build order. Declared circular
    /// edges make the underlying graph cyclic; `petgraph`'s `Topo` walk
    /// simply skips nodes that still have unvisited in-edges once every
    /// remaining node is part of a cycle, so the result degrades to
    /// arena-insertion order for the cyclic remainder rather than panicking.
    pub fn topo_order(&self) -> Vec<ModuleId> {
        use petgraph::visit::Topo;
        let mut order = Vec::with_capacity(self.arena.len());
        let mut seen = HashSet::new();
        let mut topo = Topo::new(&self.graph);
        while let Some(node) = topo.next(&self.graph) {
            let id = self.graph[node];
            if seen.insert(id) {
                order.push(id);
            }
        }
        for module in &self.arena {
            if seen.insert(module.id) {
                order.push(module.id);
            }
        }
        order
    }
}

/// Where a module's on-disk rules file came from, for default include-path
/// and generated-code-directory computation.
pub enum ModuleOrigin<'a> {
    Engine,
    Project,
    Plugin(&'a PluginInfo),
}

/// Builds a [`ModuleGraph`] by recursively resolving `FindOrCreateModule`
/// calls starting from a set of root module names (the launch module, each
/// enabled plugin's modules, and any extra module names).
pub struct ModuleGraphBuilder<'a> {
    context: &'a BuildContext,
    assembly: &'a RulesAssembly,
    plugins: &'a [&'a PluginInfo],
    arena: Vec<Module>,
    by_name: HashMap<String, ModuleId>,
    in_progress: HashSet<String>,
    graph: DiGraph<ModuleId, DependencyKind>,
    node_of: HashMap<ModuleId, NodeIndex>,
}

impl<'a> ModuleGraphBuilder<'a> {
    pub fn new(context: &'a BuildContext, assembly: &'a RulesAssembly, plugins: &'a [&'a PluginInfo]) -> Self {
        ModuleGraphBuilder {
            context,
            assembly,
            plugins,
            arena: Vec::new(),
            by_name: HashMap::new(),
            in_progress: HashSet::new(),
            graph: DiGraph::new(),
            node_of: HashMap::new(),
        }
    }

    fn origin_of(&self, module_dir: &DirRef) -> ModuleOrigin<'a> {
        for plugin in self.plugins {
            if plugin.root_dir.contains(module_dir.as_path()) {
                return ModuleOrigin::Plugin(plugin);
            }
        }
        if let Some(project_dir) = &self.context.project_dir {
            if project_dir.contains(module_dir.as_path()) {
                return ModuleOrigin::Project;
            }
        }
        ModuleOrigin::Engine
    }

    /// `FindOrCreateModule(name, referenceChain)`. Returns the
    /// existing instance immediately - whether fully built or still being
    /// built - so a circular reference resolves to the same [`ModuleId`]
    /// without re-entering its construction.
    pub fn find_or_create_module(
        &mut self,
        name: &str,
        chain: &ReferenceChain,
    ) -> Result<ModuleId, BuildError> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }

        let chain = chain.push(name);
        if self.in_progress.contains(name) {
            // Defensive: by_name is populated before recursion starts, so a
            // name in `in_progress` is always already present in `by_name`.
            return Err(BuildError::graph(format!(
                "module `{}` re-entered before its placeholder was registered",
                name
            )));
        }
        self.in_progress.insert(name.to_string());

        let rules = self
            .assembly
            .create_module_rules(name, &chain)
            .map_err(|e| BuildError::rules(e.to_string(), &chain))?;

        let module_file = self.assembly.module_file(name).ok_or_else(|| {
            BuildError::rules(format!("module `{}` has no backing rules file", name), &chain)
        })?;
        let module_dir = DirRef::new(
            module_file
                .parent()
                .expect("rules file always has a parent directory")
                .to_path_buf(),
        );
        let generated_code_dir = self.context.module_intermediate_dir(name);

        let id = ModuleId(self.arena.len());
        let mut module = Module::new(id, InternedString::new(name), rules, module_dir.clone(), generated_code_dir);

        for (relative, must_exist) in module.default_include_candidates() {
            let candidate = module_dir.join(&relative);
            if must_exist && !candidate.exists() {
                continue;
            }
            match relative.to_str() {
                Some("Public") | Some("Classes") => module.public_include_paths.push(candidate),
                _ => module.private_include_paths.push(candidate),
            }
        }
        match self.origin_of(&module_dir) {
            ModuleOrigin::Plugin(plugin) => {
                module.public_include_paths.push(plugin.root_dir.join("Source"));
            }
            ModuleOrigin::Project => {
                if let Some(project_dir) = &self.context.project_dir {
                    module.public_include_paths.push(project_dir.join("Source"));
                }
            }
            ModuleOrigin::Engine => {}
        }

        let node = self.graph.add_node(id);
        self.arena.push(module);
        self.by_name.insert(name.to_string(), id);
        self.node_of.insert(id, node);

        let referenced = self.arena[id.0].rules.referenced_module_names();
        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for dep_name in &referenced {
            let dep_id = self.find_or_create_module(dep_name, &chain)?;
            let kind = self.classify_dependency(id, dep_name);
            if seen.insert(dep_id) {
                edges.push(ModuleEdge { target: dep_id, kind });
                let dep_node = self.node_of[&dep_id];
                if !self.graph.contains_edge(node, dep_node) {
                    self.graph.add_edge(node, dep_node, kind);
                }
            }
        }

        self.arena[id.0].edges = edges;
        self.in_progress.remove(name);
        Ok(id)
    }

    fn classify_dependency(&self, module_id: ModuleId, dep_name: &str) -> DependencyKind {
        let rules = &self.arena[module_id.0].rules;
        if rules.public_dependency_module_names.iter().any(|n| n == dep_name) {
            DependencyKind::Public
        } else if rules.private_dependency_module_names.iter().any(|n| n == dep_name) {
            DependencyKind::Private
        } else if rules.public_include_path_module_names.iter().any(|n| n == dep_name) {
            DependencyKind::IncludePathOnly
        } else {
            DependencyKind::Dynamic
        }
    }

    pub fn build(self) -> ModuleGraph {
        ModuleGraph {
            arena: self.arena,
            by_name: self.by_name,
            graph: self.graph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::{Configuration, Platform, TargetDescriptor};
    use crate::registry::plugin::PluginRegistry;
    use crate::util::config::Config;
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
    fn resolves_dependency_chain_with_public_and_private_edges() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(
            &engine_source.join("Core/Core.module.toml"),
            "name = \"Core\"\n",
        );
        write(
            &engine_source.join("Game/Game.module.toml"),
            r#"
name = "Game"
public_dependency_module_names = ["Core"]
"#,
        );
        write(
            &engine_source.join("Game/Game.target.toml"),
            "launch_module_name = \"Game\"\n",
        );

        let registry = PluginRegistry::empty();
        let assembly =
            RulesAssembly::load_for_target(&engine_source, None, &registry, "Game").unwrap();
        let ctx = BuildContext::new(DirRef::new(tmp.path().join("Engine")), descriptor(), Config::default());

        let plugins: Vec<&PluginInfo> = Vec::new();
        let mut builder = ModuleGraphBuilder::new(&ctx, &assembly, &plugins);
        let chain = ReferenceChain::root("Game");
        let game_id = builder.find_or_create_module("Game", &chain).unwrap();
        let graph = builder.build();

        let game = graph.module(game_id);
        assert_eq!(game.edges.len(), 1);
        assert_eq!(game.edges[0].kind, DependencyKind::Public);
        let core_id = graph.find_by_name("Core").unwrap();
        assert_eq!(game.edges[0].target, core_id);
    }

    #[test]
    fn circular_reference_resolves_to_same_module_id() {
        let tmp = TempDir::new().unwrap();
        let engine_source = tmp.path().join("Engine/Source");
        write(
            &engine_source.join("A/A.module.toml"),
            r#"
name = "A"
public_dependency_module_names = ["B"]
circularly_referenced_dependent_modules = ["B"]
"#,
        );
        write(
            &engine_source.join("B/B.module.toml"),
            r#"
name = "B"
public_dependency_module_names = ["A"]
circularly_referenced_dependent_modules = ["A"]
"#,
        );
        write(
            &engine_source.join("A/A.target.toml"),
            "launch_module_name = \"A\"\n",
        );

        let registry = PluginRegistry::empty();
        let assembly =
            RulesAssembly::load_for_target(&engine_source, None, &registry, "A").unwrap();
        let ctx = BuildContext::new(DirRef::new(tmp.path().join("Engine")), descriptor(), Config::default());
        let plugins: Vec<&PluginInfo> = Vec::new();
        let mut builder = ModuleGraphBuilder::new(&ctx, &assembly, &plugins);
        let chain = ReferenceChain::root("A");
        let a_id = builder.find_or_create_module("A", &chain).unwrap();
        let graph = builder.build();

        assert_eq!(graph.len(), 2);
        let a = graph.module(a_id);
        let b_id = a.edges[0].target;
        let b = graph.module(b_id);
        assert_eq!(b.edges[0].target, a_id);
    }
}
