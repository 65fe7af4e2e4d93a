//! `forge` - a cross-platform native build driver for a large C++ engine
//! codebase. This binary is a thin shell: flag parsing and
//! pipeline orchestration both live in the `forge` library's [`forge::cli`]
//! module so they're testable without a process boundary.

use std::process::ExitCode;

use forge::cli;
use forge::util::Config;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` on a clean build, `Ok(false)` if any target produced a
/// fatal diagnostic, and `Err` only for a failure that prevented the
/// invocation from being understood at all (bad flags, unreadable config).
fn run() -> anyhow::Result<bool> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = cli::parse_from(args)?;

    let filter = if invocation.quiet {
        EnvFilter::new("forge=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forge=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let global_config_path = directories::ProjectDirs::from("", "", "forge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::path::PathBuf::from("forge.toml"));
    let project_config_path = invocation
        .project_file
        .as_ref()
        .and_then(|p| p.parent())
        .map(|dir| dir.join("Forge.toml"))
        .unwrap_or_else(|| std::path::PathBuf::from("Forge.toml"));
    let mut config = Config::load_or_default(&global_config_path);
    config.merge(Config::load_or_default(&project_config_path));

    let outcome = cli::run(&invocation, &config)?;
    for summary in &outcome.summaries {
        summary.diagnostics.emit_all(true);
        if !invocation.quiet {
            if let Some(receipt_path) = &summary.receipt_path {
                tracing::info!(
                    target = %summary.target_name,
                    platform = %summary.platform,
                    configuration = %summary.configuration,
                    "wrote {}",
                    receipt_path.display()
                );
            }
        }
    }

    Ok(!outcome.failed)
}
