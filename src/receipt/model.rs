//! Receipt & manifest value types. Serialized with
//! `serde_json`; field names match the wire schema exactly since external
//! tooling (packagers, the editor's module loader) reads these files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Build-version identity carried in a target receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
    pub changelist: u64,
    pub compatible_changelist: u64,
    pub is_licensee_version: bool,
    pub is_promoted_build: bool,
    pub build_id: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        VersionInfo {
            major_version: 0,
            minor_version: 1,
            patch_version: 0,
            changelist: 0,
            compatible_changelist: 0,
            is_licensee_version: false,
            is_promoted_build: false,
            build_id: String::new(),
        }
    }
}

/// Typed as Executable/DynamicLibrary/StaticLibrary/SymbolFile/
/// RequiredResource/MapFile/BuildResource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildProductType {
    Executable,
    DynamicLibrary,
    StaticLibrary,
    SymbolFile,
    RequiredResource,
    MapFile,
    BuildResource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildProduct {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub product_type: BuildProductType,
}

/// Runtime dependencies, each carrying a staged-file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeDependencyType {
    NonUFS,
    UFS,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeDependency {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub dependency_type: RuntimeDependencyType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdditionalProperty {
    pub name: String,
    pub value: String,
}

/// A single target receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetReceipt {
    pub target_name: String,
    pub platform: String,
    pub configuration: String,
    pub architecture: String,
    pub version: VersionInfo,
    pub launch: PathBuf,
    pub build_products: Vec<BuildProduct>,
    pub runtime_dependencies: Vec<RuntimeDependency>,
    pub additional_properties: Vec<AdditionalProperty>,
    pub plugins: Vec<String>,
}

/// Module manifest: `{ "BuildId": str, "Modules": { name: dll } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleManifest {
    pub build_id: String,
    /// A `BTreeMap` rather than a `HashMap` so re-running with identical
    /// inputs serializes the same key order.
    pub modules: BTreeMap<String, String>,
}

/// An enabled plugin, as carried in the build manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PluginReceiptEntry {
    pub name: String,
    pub descriptor_path: PathBuf,
}

/// A flat list of build products and deploy-target files for external
/// packagers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildManifest {
    pub build_products: Vec<PathBuf>,
    pub deploy_targets: Vec<PathBuf>,
}
