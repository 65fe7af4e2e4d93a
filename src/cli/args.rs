//! Command-line flag vocabulary.
//!
//! Real build-driver invocations look like
//! `forge -Target=Game Win64 Development /Projects/Foo/Foo.project`:
//! single-dash `-Key=Value` flags mixed with bare positional tokens, where
//! the same positional slot can repeat (`Win64+Linux`-style platform lists
//! aren't part of this subset, but multiple bare platform/configuration
//! tokens are). `clap`'s derive macros assume GNU-style `--long` flags, so
//! they're used here only for the outermost shell - `--help`/`--version`
//! and raw-argument capture - while the actual `-Key=Value` grammar is
//! parsed by hand in [`parse_tokens`]. This mirrors how the core itself
//! treats toolchains: clap owns the boilerplate it's actually good at,
//! and gets out of the way for the part it can't express.
use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Arg, Command};

use crate::core::rules::{Configuration, Platform, TargetType};
use crate::diagnostic::BuildError;

/// One parsed `forge` invocation. Fields map directly onto the documented
/// flag list; `engine_dir` is the one addition this port makes beyond that list
/// (see module docs on [`crate::cli`] for why).
#[derive(Debug, Clone)]
pub struct Invocation {
    pub engine_dir: PathBuf,
    pub targets: Vec<String>,
    pub target_list_file: Option<PathBuf>,
    pub platforms: Vec<Platform>,
    pub configurations: Vec<Configuration>,
    pub project_file: Option<PathBuf>,
    pub modules: Vec<String>,
    pub single_file: Option<PathBuf>,
    pub plugin: Option<PathBuf>,
    pub target_type: Option<TargetType>,
    pub architecture: Option<String>,
    pub no_hot_reload: bool,
    pub force_hot_reload: bool,
    pub live_coding: bool,
    pub module_with_suffix: BTreeMap<String, u32>,
    pub write_actions: Vec<PathBuf>,
    pub dependency_list: Option<PathBuf>,
    pub live_coding_modules: Option<PathBuf>,
    pub live_coding_manifest: Option<PathBuf>,
    pub quiet: bool,
    pub no_manifest_changes: bool,
    pub additional_args: Vec<String>,
}

impl Default for Invocation {
    fn default() -> Self {
        Invocation {
            engine_dir: PathBuf::new(),
            targets: Vec::new(),
            target_list_file: None,
            platforms: Vec::new(),
            configurations: Vec::new(),
            project_file: None,
            modules: Vec::new(),
            single_file: None,
            plugin: None,
            target_type: None,
            architecture: None,
            no_hot_reload: false,
            force_hot_reload: false,
            live_coding: false,
            module_with_suffix: BTreeMap::new(),
            write_actions: Vec::new(),
            dependency_list: None,
            live_coding_modules: None,
            live_coding_manifest: None,
            quiet: false,
            no_manifest_changes: false,
            additional_args: Vec::new(),
        }
    }
}

fn parse_platform(token: &str) -> Option<Platform> {
    match token {
        "Win64" => Some(Platform::Win64),
        "Mac" => Some(Platform::Mac),
        "Linux" => Some(Platform::Linux),
        "HoloLens" => Some(Platform::HoloLens),
        _ => None,
    }
}

fn parse_configuration(token: &str) -> Option<Configuration> {
    match token {
        "Debug" => Some(Configuration::Debug),
        "DebugGame" => Some(Configuration::DebugGame),
        "Development" => Some(Configuration::Development),
        "Test" => Some(Configuration::Test),
        "Shipping" => Some(Configuration::Shipping),
        _ => None,
    }
}

fn parse_target_type(token: &str) -> Option<TargetType> {
    match token {
        "Game" => Some(TargetType::Game),
        "Editor" => Some(TargetType::Editor),
        "Client" => Some(TargetType::Client),
        "Server" => Some(TargetType::Server),
        "Program" => Some(TargetType::Program),
        _ => None,
    }
}

fn build_command() -> Command {
    Command::new("forge")
        .about("A cross-platform native build driver for a large C++ engine codebase")
        .arg(
            Arg::new("args")
                .num_args(0..)
                .allow_hyphen_values(true)
                .trailing_var_arg(true),
        )
}

/// `-ModuleWithSuffix=Name,42` -> `("Name", 42)`.
fn parse_module_with_suffix(value: &str) -> Result<(String, u32), BuildError> {
    let (name, suffix) = value.split_once(',').ok_or_else(|| {
        BuildError::configuration(format!(
            "-ModuleWithSuffix expects `Name,Suffix`, got `{}`",
            value
        ))
    })?;
    let suffix: u32 = suffix.parse().map_err(|_| {
        BuildError::configuration(format!("-ModuleWithSuffix suffix must be an integer, got `{}`", suffix))
    })?;
    Ok((name.to_string(), suffix))
}

/// Parses the single-dash flag vocabulary plus bare positional tokens
///. Unlike the real build driver, which discovers its own engine
/// directory from the executable's install location, this port has no
/// install-relative anchor - `-Engine=<path>` is required.
fn parse_tokens(tokens: &[String]) -> Result<Invocation, BuildError> {
    let mut invocation = Invocation::default();
    let mut engine_dir = None;
    let mut project_files_seen = 0usize;

    for token in tokens {
        if let Some(rest) = token.strip_prefix("-Target=") {
            invocation.targets.push(rest.to_string());
        } else if let Some(rest) = token.strip_prefix("-TargetList=") {
            invocation.target_list_file = Some(PathBuf::from(rest));
        } else if let Some(rest) = token.strip_prefix("-Engine=") {
            engine_dir = Some(PathBuf::from(rest));
        } else if let Some(rest) = token.strip_prefix("-Project=") {
            invocation.project_file = Some(PathBuf::from(rest));
            project_files_seen += 1;
        } else if let Some(rest) = token.strip_prefix("-Module=") {
            invocation.modules.push(rest.to_string());
        } else if let Some(rest) = token.strip_prefix("-SingleFile=") {
            invocation.single_file = Some(PathBuf::from(rest));
        } else if let Some(rest) = token.strip_prefix("-Plugin=") {
            invocation.plugin = Some(PathBuf::from(rest));
        } else if let Some(rest) = token.strip_prefix("-TargetType=") {
            invocation.target_type = Some(parse_target_type(rest).ok_or_else(|| {
                BuildError::configuration(format!(
                    "-TargetType expects one of Game, Editor, Client, Server, Program, got `{}`",
                    rest
                ))
            })?);
        } else if let Some(rest) = token.strip_prefix("-Architecture=") {
            invocation.architecture = Some(rest.to_string());
        } else if let Some(rest) = token.strip_prefix("-ModuleWithSuffix=") {
            let (name, suffix) = parse_module_with_suffix(rest)?;
            invocation.module_with_suffix.insert(name, suffix);
        } else if let Some(rest) = token.strip_prefix("-WriteActions=") {
            invocation.write_actions.push(PathBuf::from(rest));
        } else if let Some(rest) = token.strip_prefix("-DependencyList=") {
            invocation.dependency_list = Some(PathBuf::from(rest));
        } else if let Some(rest) = token.strip_prefix("-LiveCodingModules=") {
            invocation.live_coding_modules = Some(PathBuf::from(rest));
        } else if let Some(rest) = token.strip_prefix("-LiveCodingManifest=") {
            invocation.live_coding_manifest = Some(PathBuf::from(rest));
        } else if token == "-NoHotReload" {
            invocation.no_hot_reload = true;
        } else if token == "-ForceHotReload" {
            invocation.force_hot_reload = true;
        } else if token == "-LiveCoding" {
            invocation.live_coding = true;
        } else if token == "-Quiet" {
            invocation.quiet = true;
        } else if token == "-NoManifestChanges" {
            invocation.no_manifest_changes = true;
        } else if let Some(platform) = parse_platform(token) {
            invocation.platforms.push(platform);
        } else if let Some(configuration) = parse_configuration(token) {
            invocation.configurations.push(configuration);
        } else if token.ends_with(".project") {
            invocation.project_file = Some(PathBuf::from(token));
            project_files_seen += 1;
        } else if token.starts_with('-') {
            invocation.additional_args.push(token.clone());
        } else {
            invocation.targets.push(token.clone());
        }
    }

    if project_files_seen > 1 {
        return Err(BuildError::configuration(
            "multiple project files were given; a single invocation builds at most one project",
        ));
    }
    if invocation.platforms.is_empty() {
        return Err(BuildError::configuration(
            "no platform given; pass one of Win64, Mac, Linux, HoloLens",
        ));
    }
    if invocation.configurations.is_empty() {
        return Err(BuildError::configuration(
            "no configuration given; pass one of Debug, DebugGame, Development, Test, Shipping",
        ));
    }
    invocation.engine_dir = engine_dir.ok_or_else(|| {
        BuildError::configuration("-Engine=<path> is required (this port has no install-relative engine directory)")
    })?;

    Ok(invocation)
}

/// Parse a `forge` invocation from raw process arguments (argv0 excluded).
pub fn parse_from<I, T>(raw: I) -> Result<Invocation, BuildError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = build_command()
        .try_get_matches_from(std::iter::once(std::ffi::OsString::from("forge")).chain(raw.into_iter().map(Into::into)))
        .map_err(|e| BuildError::configuration(e.to_string()))?;
    let tokens: Vec<String> = matches
        .get_many::<String>("args")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    parse_tokens(&tokens)
}
