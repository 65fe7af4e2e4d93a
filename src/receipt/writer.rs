//! Writes receipts and manifests to disk. Every writer here
//! serializes with `serde_json::to_string_pretty` and writes the whole file
//! in one `fs::write` call so a reader never observes a partial document;
//! identical input always produces identical bytes.

use std::io;
use std::path::Path;

use crate::receipt::model::{BuildManifest, ModuleManifest, TargetReceipt};

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
}

pub fn write_target_receipt(path: &Path, receipt: &TargetReceipt) -> io::Result<()> {
    write_json(path, receipt)
}

pub fn write_module_manifest(path: &Path, manifest: &ModuleManifest) -> io::Result<()> {
    write_json(path, manifest)
}

/// Version file: a single line carrying the build id, read by the
/// hot-reload/live-coding flow to detect a stale binary. Plain text rather
/// than JSON since nothing else parses it structurally.
pub fn write_version_file(path: &Path, build_id: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{}\n", build_id))
}

pub fn write_build_manifest(path: &Path, manifest: &BuildManifest) -> io::Result<()> {
    write_json(path, manifest)
}

/// Dependency list: plain text, one project-root-relative path per
/// line, POSIX separators, sorted.
pub fn write_dependency_list(path: &Path, project_root: &Path, files: &[std::path::PathBuf]) -> io::Result<()> {
    let mut relative: Vec<String> = files
        .iter()
        .map(|f| {
            let rel = f.strip_prefix(project_root).unwrap_or(f);
            rel.to_string_lossy().replace('\\', "/")
        })
        .collect();
    relative.sort();
    relative.dedup();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut contents = relative.join("\n");
    if !relative.is_empty() {
        contents.push('\n');
    }
    std::fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::model::{BuildProduct, BuildProductType, VersionInfo};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_receipt() -> TargetReceipt {
        TargetReceipt {
            target_name: "Game".into(),
            platform: "Win64".into(),
            configuration: "Development".into(),
            architecture: "x64".into(),
            version: VersionInfo::default(),
            launch: PathBuf::from("/Binaries/Win64/Game.exe"),
            build_products: vec![BuildProduct {
                path: PathBuf::from("/Binaries/Win64/Game.exe"),
                product_type: BuildProductType::Executable,
            }],
            runtime_dependencies: Vec::new(),
            additional_properties: Vec::new(),
            plugins: Vec::new(),
        }
    }

    #[test]
    fn target_receipt_round_trips_through_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Game-Win64-Development.target");
        write_target_receipt(&path, &sample_receipt()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"TargetName\": \"Game\""));
        let parsed: TargetReceipt = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, sample_receipt());
    }

    #[test]
    fn rewriting_identical_receipt_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Game.target");
        write_target_receipt(&path, &sample_receipt()).unwrap();
        let first = std::fs::read(&path).unwrap();
        write_target_receipt(&path, &sample_receipt()).unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn module_manifest_orders_modules_by_name() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Game.modules");
        let mut modules = BTreeMap::new();
        modules.insert("Zeta".to_string(), "Zeta.dll".to_string());
        modules.insert("Alpha".to_string(), "Alpha.dll".to_string());
        write_module_manifest(
            &path,
            &ModuleManifest {
                build_id: "abc123".into(),
                modules,
            },
        )
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let alpha_pos = contents.find("Alpha").unwrap();
        let zeta_pos = contents.find("Zeta").unwrap();
        assert!(alpha_pos < zeta_pos);
    }

    #[test]
    fn dependency_list_is_sorted_relative_and_posix() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("Game");
        let list_path = tmp.path().join("deps.txt");
        let files = vec![
            root.join("Source").join("Zeta.cpp"),
            root.join("Source").join("Alpha.cpp"),
        ];
        write_dependency_list(&list_path, &root, &files).unwrap();
        let contents = std::fs::read_to_string(&list_path).unwrap();
        assert_eq!(contents, "Source/Alpha.cpp\nSource/Zeta.cpp\n");
    }
}
