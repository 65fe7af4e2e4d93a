//! Action graph value types.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::core::binary::BinaryId;
use crate::core::module::ModuleId;
use crate::diagnostic::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub usize);

/// What an action does. Concrete command construction is the
/// toolchain adapter's job; the assembler only records which
/// kind an action is plus its prerequisite/produced items.
#[derive(Debug, Clone)]
pub enum ActionKind {
    Compile { module: ModuleId, source: PathBuf },
    CreatePch { template_index: usize },
    Link { binary: BinaryId },
    WriteModuleManifest,
    WriteTargetReceipt,
    WriteVersionFile,
    PostBuildStep { batch_index: usize },
    Copy { from: PathBuf },
}

/// A unit of work for the executor.
#[derive(Debug, Clone)]
pub struct Action {
    pub id: ActionId,
    pub kind: ActionKind,
    pub working_directory: PathBuf,
    pub command_description: String,
    pub prerequisite_items: Vec<PathBuf>,
    pub produced_items: Vec<PathBuf>,
    /// Link, post-build, and metadata actions are local-only.
    pub can_execute_remotely: bool,
    pub status_description: String,
}

/// The full action graph for one target invocation, plus its bookkeeping
/// side-tables.
#[derive(Debug, Clone, Default)]
pub struct Makefile {
    pub actions: Vec<Action>,
    pub output_items_by_module: HashMap<ModuleId, Vec<PathBuf>>,
    pub plugin_files: BTreeSet<PathBuf>,
    pub external_dependencies: BTreeSet<PathBuf>,
    pub hot_reload_module_names: BTreeSet<String>,
    /// Carried for data-model completeness; always empty
    /// in this port, since the header-generation preprocessor that would
    /// populate it is explicitly out of scope.
    pub uobject_module_names: Vec<String>,
    pub diagnostics: Vec<String>,
}

impl Makefile {
    pub fn produced_items(&self) -> impl Iterator<Item = &PathBuf> {
        self.actions.iter().flat_map(|a| a.produced_items.iter())
    }

    /// Invariant: two actions must never share a produced item.
    pub fn check_no_duplicate_outputs(&self) -> Result<(), BuildError> {
        let mut seen = std::collections::HashSet::new();
        for item in self.produced_items() {
            if !seen.insert(item) {
                return Err(BuildError::graph(format!(
                    "DuplicateOutput: two actions both produce `{}`",
                    item.display()
                )));
            }
        }
        Ok(())
    }
}
