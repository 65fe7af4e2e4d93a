//! Binary composer: assigns every module in the graph to
//! exactly one output [`Binary`], and computes each binary's output path.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::core::binary::{Binary, BinaryId, BinaryType};
use crate::core::context::BuildContext;
use crate::core::module::{DependencyKind, ModuleId};
use crate::core::path::DirRef;
use crate::core::rules::{Configuration, LinkType, ModuleType, Platform, TargetRules};
use crate::env::propagator::resolve_api_definition;
use crate::graph::builder::ModuleGraph;
use crate::util::InternedString;

fn default_extension(binary_type: BinaryType, platform: Platform) -> &'static str {
    match (binary_type, platform) {
        (BinaryType::Executable, Platform::Win64) => ".exe",
        (BinaryType::Executable, _) => "",
        (BinaryType::DynamicLinkLibrary, Platform::Win64) => ".dll",
        (BinaryType::DynamicLinkLibrary, Platform::Mac) => ".dylib",
        (BinaryType::DynamicLinkLibrary, _) => ".so",
        (BinaryType::StaticLibrary, Platform::Win64) => ".lib",
        (BinaryType::StaticLibrary, _) => ".a",
        (BinaryType::Object, Platform::Win64) => ".obj",
        (BinaryType::Object, _) => ".o",
        (BinaryType::PrecompiledHeader, _) => ".pch",
    }
}

/// Output-path policy: a pure function of the binary's identity
/// and the build's platform/configuration/architecture. The configuration
/// suffix is omitted iff `configuration == undecorated_configuration`.
pub fn binary_output_path(
    base_dir: &DirRef,
    binary_name: &str,
    platform: Platform,
    configuration: Configuration,
    architecture: &str,
    undecorated_configuration: Configuration,
    binary_type: BinaryType,
) -> PathBuf {
    let extension = default_extension(binary_type, platform);
    let file_name = if configuration == undecorated_configuration {
        format!("{}{}", binary_name, extension)
    } else {
        format!("{}-{}-{}-{}{}", binary_name, platform, configuration, architecture, extension)
    };
    base_dir
        .join("Binaries")
        .join(platform.to_string())
        .as_path()
        .join(file_name)
}

/// A binary is precompiled when every module bound to it is an external
/// (prebuilt) module - there is no source of its own to build or link.
fn is_precompiled(graph: &ModuleGraph, members: &[ModuleId]) -> bool {
    !members.is_empty() && members.iter().all(|m| graph.module(*m).rules.module_type == ModuleType::External)
}

/// Modules reachable from `root` through link-significant edges.
fn collect_link_closure(graph: &ModuleGraph, root: ModuleId, visited: &mut HashSet<ModuleId>, out: &mut Vec<ModuleId>) {
    if !visited.insert(root) {
        return;
    }
    out.push(root);
    let module = graph.module(root);
    for edge in &module.edges {
        if matches!(edge.kind, DependencyKind::Public | DependencyKind::Private) {
            collect_link_closure(graph, edge.target, visited, out);
        }
    }
}

/// Assigns every module to a [`Binary`]. `plugin_modules` maps
/// each enabled plugin's name to the module ids (already resolved in
/// `graph`) that make up its runtime modules.
pub fn compose_binaries(
    graph: &mut ModuleGraph,
    context: &BuildContext,
    target_rules: &TargetRules,
    target_name: &str,
    launch_module: ModuleId,
    plugin_modules: &[(String, Vec<ModuleId>)],
) -> Vec<Binary> {
    let base_dir = context.base_dir().clone();
    let platform = context.descriptor.platform;
    let configuration = context.descriptor.configuration;
    let architecture = context.descriptor.architecture.clone();
    let undecorated = target_rules.undecorated_configuration;

    let mut binaries = Vec::new();
    let mut next_id = 0usize;
    let mut bound = HashSet::new();

    match target_rules.link_type {
        LinkType::Monolithic => {
            let mut members = Vec::new();
            let mut visited = HashSet::new();
            collect_link_closure(graph, launch_module, &mut visited, &mut members);

            let id = BinaryId(next_id);
            next_id += 1;
            let output_path = binary_output_path(
                &base_dir,
                target_name,
                platform,
                configuration,
                &architecture,
                undecorated,
                BinaryType::Executable,
            );
            let mut binary = Binary::new(
                id,
                InternedString::new(target_name),
                BinaryType::Executable,
                context.module_intermediate_dir(target_name),
            );
            binary.primary_module = Some(launch_module);
            binary.output_files.push(output_path);
            binary.modules = members.clone();
            binary.precompiled = is_precompiled(graph, &members);
            for module_id in &members {
                graph.module_mut(*module_id).binary = Some(id);
                bound.insert(*module_id);
            }
            binaries.push(binary);
        }
        LinkType::Modular => {
            let exe_id = BinaryId(next_id);
            next_id += 1;
            let output_path = binary_output_path(
                &base_dir,
                target_name,
                platform,
                configuration,
                &architecture,
                undecorated,
                BinaryType::Executable,
            );
            let mut exe = Binary::new(
                exe_id,
                InternedString::new(target_name),
                BinaryType::Executable,
                context.module_intermediate_dir(target_name),
            );
            exe.primary_module = Some(launch_module);
            exe.output_files.push(output_path);
            exe.modules.push(launch_module);
            graph.module_mut(launch_module).binary = Some(exe_id);
            bound.insert(launch_module);
            binaries.push(exe);

            for (plugin_name, modules) in plugin_modules {
                let unbound: Vec<ModuleId> = modules.iter().copied().filter(|m| !bound.contains(m)).collect();
                if unbound.is_empty() {
                    continue;
                }
                let id = BinaryId(next_id);
                next_id += 1;
                let output_path = binary_output_path(
                    &base_dir,
                    plugin_name,
                    platform,
                    configuration,
                    &architecture,
                    undecorated,
                    BinaryType::DynamicLinkLibrary,
                );
                let mut dll = Binary::new(
                    id,
                    InternedString::new(plugin_name.as_str()),
                    BinaryType::DynamicLinkLibrary,
                    context.module_intermediate_dir(plugin_name),
                );
                dll.primary_module = unbound.first().copied();
                dll.output_files.push(output_path);
                dll.modules = unbound.clone();
                dll.precompiled = is_precompiled(graph, &unbound);
                for module_id in &unbound {
                    graph.module_mut(*module_id).binary = Some(id);
                    bound.insert(*module_id);
                }
                binaries.push(dll);
            }

            let remaining: Vec<ModuleId> = graph.all_module_ids().filter(|m| !bound.contains(m)).collect();
            for module_id in remaining {
                let name = graph.module(module_id).name.to_string();
                let id = BinaryId(next_id);
                next_id += 1;
                let output_path = binary_output_path(
                    &base_dir,
                    &name,
                    platform,
                    configuration,
                    &architecture,
                    undecorated,
                    BinaryType::DynamicLinkLibrary,
                );
                let mut dll = Binary::new(
                    id,
                    InternedString::new(name.as_str()),
                    BinaryType::DynamicLinkLibrary,
                    context.module_intermediate_dir(&name),
                );
                dll.primary_module = Some(module_id);
                dll.output_files.push(output_path);
                dll.modules.push(module_id);
                dll.precompiled = is_precompiled(graph, std::slice::from_ref(&module_id));
                graph.module_mut(module_id).binary = Some(id);
                bound.insert(module_id);
                binaries.push(dll);
            }
        }
    }

    for module_id in graph.all_module_ids().collect::<Vec<_>>() {
        let module = graph.module(module_id);
        let Some(bin_id) = module.binary else { continue };
        let definition = resolve_api_definition(module, bin_id, &binaries);
        graph.module_mut(module_id).api_definition = Some(definition);
    }

    binaries
}
