//! Explicit, non-singleton build context.
//!
//! "Global process-wide state (platform-SDK cache, path lookup caches, ...
//! a target-build cache) should be encapsulated in an explicit `BuildContext`
//! carried through the pipeline. Tests create a fresh context per run; no
//! singletons." Every stage of the pipeline (C through J) takes a
//! `&BuildContext` rather than reaching for global state.

use std::cell::RefCell;

use crate::core::path::DirRef;
use crate::core::rules::TargetDescriptor;
use crate::diagnostic::{Diagnostic, DiagnosticList};
use crate::util::config::Config;

/// Carried through one driver invocation. Not `Send`/`Sync` by design: the
/// core is single-threaded with respect to mutable shared state;
/// the only internal parallelism (the plugin discovery walk) collects into
/// a lock-protected list and hands results back before this context's
/// diagnostics are touched again.
pub struct BuildContext {
    pub engine_dir: DirRef,
    pub project_dir: Option<DirRef>,
    pub enterprise_dir: Option<DirRef>,
    pub descriptor: TargetDescriptor,
    pub config: Config,
    diagnostics: RefCell<DiagnosticList>,
}

impl BuildContext {
    pub fn new(engine_dir: DirRef, descriptor: TargetDescriptor, config: Config) -> Self {
        BuildContext {
            engine_dir,
            project_dir: None,
            enterprise_dir: None,
            descriptor,
            config,
            diagnostics: RefCell::new(DiagnosticList::new()),
        }
    }

    pub fn with_project_dir(mut self, dir: DirRef) -> Self {
        self.project_dir = Some(dir);
        self
    }

    pub fn with_enterprise_dir(mut self, dir: DirRef) -> Self {
        self.enterprise_dir = Some(dir);
        self
    }

    /// The directory build output is rooted under: the project directory
    /// when building a project target, the engine directory otherwise.
    pub fn base_dir(&self) -> &DirRef {
        self.project_dir.as_ref().unwrap_or(&self.engine_dir)
    }

    /// The platform/configuration-scoped intermediate folder a module's
    /// generated code and object files live under.
    pub fn intermediate_dir(&self) -> DirRef {
        self.base_dir()
            .join("Intermediate")
            .join("Build")
            .join(self.descriptor.platform.to_string())
            .join(self.descriptor.name.as_str())
            .join(self.descriptor.configuration.to_string())
    }

    pub fn module_intermediate_dir(&self, module_name: &str) -> DirRef {
        self.intermediate_dir().join(module_name)
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn has_fatal_diagnostics(&self) -> bool {
        self.diagnostics.borrow().has_fatal()
    }

    pub fn diagnostics(&self) -> DiagnosticList {
        self.diagnostics.borrow().clone()
    }

    /// Expand the `$(...)` path-variable vocabulary:
    /// `$(EngineDir)`, `$(ProjectDir)`, `$(EnterpriseDir)`, and the
    /// per-action variables `$(PluginDir)`, `$(ModuleDir)`,
    /// `$(BinaryOutputDir)`, `$(TargetOutputDir)` when supplied.
    pub fn expand_path_variables(&self, input: &str, extra: &[(&str, &DirRef)]) -> String {
        let mut out = input.to_string();
        out = out.replace("$(EngineDir)", &self.engine_dir.as_path().display().to_string());
        if let Some(ref project_dir) = self.project_dir {
            out = out.replace("$(ProjectDir)", &project_dir.as_path().display().to_string());
        }
        if let Some(ref enterprise_dir) = self.enterprise_dir {
            out = out.replace(
                "$(EnterpriseDir)",
                &enterprise_dir.as_path().display().to_string(),
            );
        }
        for (var, dir) in extra {
            out = out.replace(&format!("$({})", var), &dir.as_path().display().to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rules::{Configuration, Platform, TargetDescriptor};
    use crate::util::InternedString;
    use std::collections::BTreeMap;

    fn descriptor() -> TargetDescriptor {
        TargetDescriptor {
            name: InternedString::new("Editor"),
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
    fn expands_known_path_variables() {
        let ctx = BuildContext::new(DirRef::new("/engine"), descriptor(), Config::default())
            .with_project_dir(DirRef::new("/game"));
        let expanded = ctx.expand_path_variables("$(EngineDir)/Source;$(ProjectDir)/Source", &[]);
        assert_eq!(expanded, "/engine/Source;/game/Source");
    }

    #[test]
    fn reports_accumulate_and_detect_fatal() {
        let ctx = BuildContext::new(DirRef::new("/engine"), descriptor(), Config::default());
        assert!(!ctx.has_fatal_diagnostics());
        ctx.report(Diagnostic::warning("unreferenced plugin dependency"));
        assert!(!ctx.has_fatal_diagnostics());
        ctx.report(Diagnostic::error("module not found"));
        assert!(ctx.has_fatal_diagnostics());
    }
}
