//! Declarative rules loader.
//!
//! The original system evaluates rules scripts at runtime via reflection
//! over a scripting engine. This port replaces that with data: a module's
//! rules live in `<Name>.module.toml` next to its source, a target's rules
//! live in `<Name>.target.toml`. Loading becomes a deterministic directory
//! walk plus `toml` deserialization - no scripting engine dependency, and
//! two loads of the same tree always produce structurally identical rule
//! objects.

use std::path::PathBuf;

use walkdir::WalkDir;

use crate::core::rules::{ModuleRules, TargetRules};

pub const MODULE_RULES_EXTENSION: &str = "module.toml";
pub const TARGET_RULES_EXTENSION: &str = "target.toml";

/// A rules file discovered under a search root, with its parsed stem name.
#[derive(Debug, Clone)]
pub struct DiscoveredRulesFile {
    pub name: String,
    pub path: PathBuf,
}

fn file_stem_before(file_name: &str, suffix: &str) -> Option<String> {
    file_name
        .strip_suffix(&format!(".{}", suffix))
        .map(|s| s.to_string())
}

/// Walk `root` for every module rules file, sorted by path for determinism.
pub fn discover_module_rules_files(root: &std::path::Path) -> Vec<DiscoveredRulesFile> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if let Some(name) = file_stem_before(&file_name, MODULE_RULES_EXTENSION) {
            found.push(DiscoveredRulesFile {
                name,
                path: entry.path().to_path_buf(),
            });
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

/// Walk `root` for every target rules file, sorted by path for determinism.
pub fn discover_target_rules_files(root: &std::path::Path) -> Vec<DiscoveredRulesFile> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if let Some(name) = file_stem_before(&file_name, TARGET_RULES_EXTENSION) {
            found.push(DiscoveredRulesFile {
                name,
                path: entry.path().to_path_buf(),
            });
        }
    }
    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

/// Parse a `.module.toml` file into a [`ModuleRules`] value.
pub fn parse_module_rules(path: &std::path::Path) -> anyhow::Result<ModuleRules> {
    let contents = std::fs::read_to_string(path)?;
    let rules: ModuleRules = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
    Ok(rules)
}

/// Parse a `.target.toml` file into a [`TargetRules`] value.
pub fn parse_target_rules(path: &std::path::Path) -> anyhow::Result<TargetRules> {
    let contents = std::fs::read_to_string(path)?;
    let rules: TargetRules = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discovers_module_rules_files_sorted() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("Engine")).unwrap();
        std::fs::write(tmp.path().join("Engine/Core.module.toml"), "name = \"Core\"").unwrap();
        std::fs::write(tmp.path().join("Zeta.module.toml"), "name = \"Zeta\"").unwrap();

        let found = discover_module_rules_files(tmp.path());
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|f| f.name == "Core"));
        assert!(found.iter().any(|f| f.name == "Zeta"));
    }

    #[test]
    fn parses_module_rules_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Core.module.toml");
        std::fs::write(
            &path,
            r#"
name = "Core"
module_type = "CPlusPlus"
public_dependency_module_names = ["Foo"]
"#,
        )
        .unwrap();

        let rules = parse_module_rules(&path).unwrap();
        assert_eq!(rules.name, "Core");
        assert_eq!(rules.public_dependency_module_names, vec!["Foo"]);
    }
}
