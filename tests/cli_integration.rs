//! End-to-end tests for the `forge` binary: a modular editor target, a
//! monolithic shipping game, a foreign plugin compile, a single-file
//! compile, hot-reload with a module suffix, and a shared-environment
//! violation between two targets.

use std::fs;
use std::path::Path;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn forge() -> Command {
    Command::cargo_bin("forge").unwrap()
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A minimal engine tree with one `Core` module and a `Game` module that
/// depends on it, plus a target rules file the caller customizes per test.
fn engine_with_game_target(root: &Path, target_rules_toml: &str) {
    let source = root.join("Engine/Source");
    write(&source.join("Core/Private/Core.cpp"), "// core\n");
    write(&source.join("Core/Public/Core.h"), "#pragma once\n");
    write(&source.join("Core/Core.module.toml"), "name = \"Core\"\n");
    write(&source.join("Game/Private/Game.cpp"), "#include \"Core.h\"\n");
    write(
        &source.join("Game/Game.module.toml"),
        "name = \"Game\"\npublic_dependency_module_names = [\"Core\"]\n",
    );
    write(&source.join("Game/Game.target.toml"), target_rules_toml);
}

#[test]
fn modular_editor_target_writes_a_receipt_and_module_manifest() {
    let tmp = TempDir::new().unwrap();
    let engine_dir = tmp.path().join("Engine");
    engine_with_game_target(
        tmp.path(),
        "launch_module_name = \"Game\"\nlink_type = \"Modular\"\ntarget_type = \"Editor\"\n",
    );

    forge()
        .arg(format!("-Engine={}", engine_dir.display()))
        .args(["-Target=Game", "Win64", "Development"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let receipt = engine_dir.join("Binaries/Game-Win64-Development.target");
    assert!(receipt.exists());
    let contents = fs::read_to_string(&receipt).unwrap();
    assert!(contents.contains("\"TargetName\": \"Game\""));
}

#[test]
fn monolithic_shipping_game_links_everything_into_one_executable() {
    let tmp = TempDir::new().unwrap();
    let engine_dir = tmp.path().join("Engine");
    engine_with_game_target(
        tmp.path(),
        "launch_module_name = \"Game\"\nlink_type = \"Monolithic\"\ntarget_type = \"Game\"\n",
    );

    forge()
        .arg(format!("-Engine={}", engine_dir.display()))
        .args(["-Target=Game", "Win64", "Shipping"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let receipt_path = engine_dir.join("Binaries/Game-Win64-Shipping.target");
    let contents = fs::read_to_string(&receipt_path).unwrap();
    // Monolithic builds don't get a `.modules` manifest.
    assert!(!engine_dir.join("Binaries/Game-Win64-Shipping.modules").exists());
    assert!(contents.contains("Executable"));
}

#[test]
fn single_file_compile_emits_exactly_one_compile_action_and_no_receipt() {
    let tmp = TempDir::new().unwrap();
    let engine_dir = tmp.path().join("Engine");
    engine_with_game_target(tmp.path(), "launch_module_name = \"Game\"\n");
    let source_file = engine_dir.join("Source/Game/Private/Game.cpp");
    let actions_file = tmp.path().join("actions.json");

    forge()
        .arg(format!("-Engine={}", engine_dir.display()))
        .args(["-Target=Game", "Win64", "Development"])
        .arg(format!("-SingleFile={}", source_file.display()))
        .arg(format!("-WriteActions={}", actions_file.display()))
        .current_dir(tmp.path())
        .assert()
        .success();

    assert!(!engine_dir.join("Binaries/Game-Win64-Development.target").exists());
    let plan = fs::read_to_string(&actions_file).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&plan).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
    assert_eq!(parsed[0]["Kind"], "Compile");
}

#[test]
fn foreign_plugin_compile_disables_linking() {
    let tmp = TempDir::new().unwrap();
    let engine_dir = tmp.path().join("Engine");
    engine_with_game_target(
        tmp.path(),
        "launch_module_name = \"Game\"\nlink_type = \"Monolithic\"\n",
    );
    let plugin_dir = tmp.path().join("MyPlugin");
    write(&plugin_dir.join("MyPlugin.plugin.toml"), "friendly_name = \"MyPlugin\"\n");
    let actions_file = tmp.path().join("actions.json");

    forge()
        .arg(format!("-Engine={}", engine_dir.display()))
        .args(["-Target=Game", "Win64", "Development"])
        .arg(format!("-Plugin={}", plugin_dir.join("MyPlugin.plugin.toml").display()))
        .arg(format!("-WriteActions={}", actions_file.display()))
        .current_dir(tmp.path())
        .assert()
        .success();

    let plan = fs::read_to_string(&actions_file).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&plan).unwrap();
    assert!(parsed.as_array().unwrap().iter().all(|a| a["Kind"] != "Link"));
}

#[test]
fn hot_reload_with_suffix_renames_the_module_output() {
    let tmp = TempDir::new().unwrap();
    let engine_dir = tmp.path().join("Engine");
    let source = engine_dir.join("Source");
    write(&source.join("Core/Private/Core.cpp"), "// core\n");
    write(&source.join("Core/Core.module.toml"), "name = \"Core\"\n");
    write(&source.join("Game/Private/Game.cpp"), "// game\n");
    write(
        &source.join("Game/Game.module.toml"),
        "name = \"Game\"\npublic_dependency_module_names = [\"Core\"]\n",
    );
    write(
        &source.join("Game/Game.target.toml"),
        "launch_module_name = \"Game\"\nlink_type = \"Modular\"\nextra_module_names = [\"Core\"]\n",
    );

    forge()
        .arg(format!("-Engine={}", engine_dir.display()))
        .args(["-Target=Game", "Win64", "Development"])
        .args(["-ModuleWithSuffix=Core,7"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let manifest_path = engine_dir.join("Binaries/Game-Win64-Development.modules");
    let manifest = fs::read_to_string(&manifest_path).unwrap();
    assert!(manifest.contains("Core-7"));
}

#[test]
fn shared_environment_violation_between_two_targets_fails_the_invocation() {
    let tmp = TempDir::new().unwrap();
    let engine_dir = tmp.path().join("Engine");
    let source = engine_dir.join("Source");
    write(&source.join("Game/Private/Game.cpp"), "// game\n");
    write(&source.join("Game/Game.module.toml"), "name = \"Game\"\n");
    write(
        &source.join("Game/Game.target.toml"),
        "launch_module_name = \"Game\"\nbuild_environment = \"Shared\"\n\
         [requires_unique_environment_overrides]\nbUseChecksInShipping = \"true\"\n",
    );
    write(&source.join("Editor/Private/Editor.cpp"), "// editor\n");
    write(&source.join("Editor/Editor.module.toml"), "name = \"Editor\"\n");
    write(
        &source.join("Editor/Editor.target.toml"),
        "launch_module_name = \"Editor\"\nbuild_environment = \"Shared\"\n\
         [requires_unique_environment_overrides]\nbUseChecksInShipping = \"false\"\n",
    );

    forge()
        .arg(format!("-Engine={}", engine_dir.display()))
        .args(["-Target=Game", "-Target=Editor", "Win64", "Development"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("share a build environment"));
}

#[test]
fn missing_engine_flag_is_a_configuration_error() {
    let tmp = TempDir::new().unwrap();
    forge()
        .args(["-Target=Game", "Win64", "Development"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("-Engine"));
}
