// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Litmus CLI - run the script examples embedded in markdown documents.

mod output;
mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use litmus_doctest::{exit_code, run, DocumentSource, ExpectErrorPolicy, RunConfig};
use litmus_interp::{Capability, CapabilitySet};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "litmus", version, about = "Run and verify the script examples in markdown documents")]
struct Args {
    /// Markdown files or directories to search for `.md` files
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// TOML run configuration; flags below override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Documents run in parallel (default: available cores)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Wall-clock limit per block
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Step budget per block
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Extra capabilities to allow: fs, net, process, timers, random, clock
    #[arg(long, value_delimiter = ',', value_name = "CAP,...")]
    allow: Vec<Capability>,

    /// How `expect-error=<Name>` is checked: `any` or `match`
    #[arg(long, value_name = "POLICY")]
    expect_error_policy: Option<ExpectErrorPolicy>,
}

fn main() -> ExitCode {
    init_logging();
    output::init();

    let args = Args::parse();
    match run_cli(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", output::error_label(), e);
            ExitCode::from(2)
        }
    }
}

/// Diagnostics go to stderr; the level comes from `LITMUS_LOG`.
fn init_logging() {
    let filter = EnvFilter::try_from_env("LITMUS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_cli(args: &Args) -> anyhow::Result<ExitCode> {
    let config = build_config(args)?;

    let mut files = Vec::new();
    for path in &args.paths {
        if !path.exists() {
            bail!("path not found: {}", path.display());
        }
        files.extend(collect_md_files(path));
    }
    if files.is_empty() {
        eprintln!("{}: no markdown documents found", output::warning_label());
        return Ok(ExitCode::SUCCESS);
    }

    let documents = files
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(DocumentSource::new(path.display().to_string(), text))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    tracing::info!(documents = documents.len(), "starting run");
    let reports = run(&documents, &config);

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        Format::Text => report::print(&reports, config.expect_error),
    }

    Ok(ExitCode::from(exit_code(&reports) as u8))
}

/// Config file first, then command-line overrides.
fn build_config(args: &Args) -> anyhow::Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(jobs) = args.jobs {
        config.jobs = Some(jobs);
    }
    if let Some(ms) = args.timeout_ms {
        config.policy.timeout_ms = ms;
    }
    if let Some(steps) = args.max_steps {
        config.policy.max_steps = Some(steps);
    }
    if !args.allow.is_empty() {
        config.policy.allow = CapabilitySet::new(
            config.policy.allow.iter().chain(args.allow.iter().copied()),
        );
    }
    if let Some(policy) = args.expect_error_policy {
        config.expect_error = policy;
    }
    config.validate()?;
    Ok(config)
}

/// Recursively collect all .md files under `path`, sorted.
fn collect_md_files(path: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if path.is_file() {
        if path.extension().map(|e| e == "md").unwrap_or(false) {
            files.push(path.to_path_buf());
        }
        return files;
    }

    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_md_files(&path));
            } else if path.extension().map(|e| e == "md").unwrap_or(false) {
                files.push(path);
            }
        }
    }

    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let args = Args::parse_from([
            "litmus",
            "docs",
            "--jobs",
            "3",
            "--max-steps",
            "99",
            "--allow",
            "timers,random",
            "--expect-error-policy",
            "any",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.jobs, Some(3));
        assert_eq!(config.policy.max_steps, Some(99));
        assert!(config.policy.allow.allows(Capability::Print));
        assert!(config.policy.allow.allows(Capability::Timers));
        assert!(config.policy.allow.allows(Capability::Random));
        assert!(!config.policy.allow.allows(Capability::Fs));
        assert_eq!(config.expect_error, ExpectErrorPolicy::AnyThrow);
    }

    #[test]
    fn test_bad_flag_values() {
        assert!(Args::try_parse_from(["litmus", "docs", "--allow", "disk"]).is_err());
        assert!(Args::try_parse_from(["litmus", "docs", "--expect-error-policy", "strict"]).is_err());
        assert!(Args::try_parse_from(["litmus"]).is_err());

        let zero_jobs = Args::parse_from(["litmus", "docs", "--jobs", "0"]);
        assert!(build_config(&zero_jobs).is_err());
    }

    #[test]
    fn test_collect_md_files_is_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.md"), "").unwrap();
        fs::write(dir.path().join("a.md"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("nested").join("c.md"), "").unwrap();

        let files = collect_md_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names.len(), 3);
        assert_eq!(names[0], "a.md");
        assert_eq!(names[1], "b.md");
        assert!(names[2].ends_with("c.md"));
    }
}
