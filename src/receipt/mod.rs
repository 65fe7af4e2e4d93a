//! Target receipt & module manifest writer.

use crate::core::rules::{Configuration, Platform};

pub mod model;
pub mod writer;

pub use model::{
    AdditionalProperty, BuildManifest, BuildProduct, BuildProductType, ModuleManifest,
    PluginReceiptEntry, RuntimeDependency, RuntimeDependencyType, TargetReceipt, VersionInfo,
};
pub use writer::{
    write_build_manifest, write_dependency_list, write_module_manifest, write_target_receipt,
    write_version_file,
};

/// `Name-Platform-Config.ext`, the shared naming policy for a target's
/// metadata files (receipt, module manifest, version file), disambiguating
/// them across the different platform/configuration builds of one target -
/// both where `cli::pipeline` writes these files and where
/// `action::assembler` names the corresponding action's produced item must
/// agree on this, so it lives in one place.
pub fn metadata_file_name(target_name: &str, platform: Platform, configuration: Configuration, extension: &str) -> String {
    format!("{}-{}-{}.{}", target_name, platform, configuration, extension)
}
