use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use citeverify_core::Config;
use citeverify_core::config_file::ConfigFile;
use citeverify_reporting::ExportFormat;

use crate::cli::Cli;

/// Build the run configuration.
///
/// Precedence, lowest first: built-in defaults, config files, environment
/// variables, command-line flags.
pub fn resolve_config(
    cli: &Cli,
    file: &ConfigFile,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut config = Config::default();
    file.apply_to(&mut config);

    let env = |name: &str| env(name).filter(|v| !v.trim().is_empty());
    if let Some(key) = env("S2_API_KEY") {
        config.s2_api_key = Some(key);
    }
    if let Some(mailto) = env("CROSSREF_MAILTO") {
        config.crossref_mailto = Some(mailto);
    }
    if let Some(key) = env("NCBI_API_KEY") {
        config.ncbi_api_key = Some(key);
    }
    if let Some(raw) = env("CITEVERIFY_THRESHOLD") {
        config.similarity_threshold = raw
            .trim()
            .parse()
            .with_context(|| format!("CITEVERIFY_THRESHOLD is not a number: {raw:?}"))?;
    }

    if let Some(t) = cli.threshold {
        config.similarity_threshold = t;
    }
    if let Some(ms) = cli.delay_ms {
        config.courtesy_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = cli.workers {
        config.num_workers = n;
    }
    if cli.parallel_sources {
        config.parallel_sources = true;
    }
    if let Some(secs) = cli.deadline_secs {
        config.deadline = Some(Duration::from_secs(secs));
    }
    if cli.s2_api_key.is_some() {
        config.s2_api_key = cli.s2_api_key.clone();
    }
    if cli.crossref_mailto.is_some() {
        config.crossref_mailto = cli.crossref_mailto.clone();
    }
    if cli.ncbi_api_key.is_some() {
        config.ncbi_api_key = cli.ncbi_api_key.clone();
    }
    if !cli.disable_sources.is_empty() {
        config.disabled_sources = cli
            .disable_sources
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
    }

    config.validate()?;
    Ok(config)
}

/// Report format: the explicit flag, else the output extension, else JSON.
pub fn resolve_format(cli: &Cli) -> ExportFormat {
    if let Some(format) = cli.format {
        return format.into();
    }
    cli.output
        .as_deref()
        .and_then(ExportFormat::from_path)
        .unwrap_or_default()
}

/// Report path: the explicit flag, else `<stem>_citation_report.<ext>` next
/// to the manuscript.
pub fn resolve_output(cli: &Cli, format: ExportFormat) -> PathBuf {
    match &cli.output {
        Some(path) => path.clone(),
        None => default_output_path(&cli.manuscript, format),
    }
}

fn default_output_path(manuscript: &Path, format: ExportFormat) -> PathBuf {
    let stem = manuscript
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manuscript".to_string());
    manuscript.with_file_name(format!("{stem}_citation_report.{}", format.extension()))
}
