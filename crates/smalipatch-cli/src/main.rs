//! smalipatch CLI - patches decompiled Android framework listings
//!
//! Rule sets:
//! - framework: signature verification in framework.jar
//! - services: downgrade and signature checks in services.jar
//! - miui-services: MIUI installer restrictions in miui-services.jar
//!
//! Listings are produced and reassembled by an external smali toolchain;
//! this tool only rewrites the `.smali` text in place.

mod backup;
mod batch;
mod config;
mod discover;
mod logging;
mod output;
mod process;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};

use backup::{BackupManager, DEFAULT_BACKUP_DIR};
use batch::{run_batch, BatchContext, CancellationToken};
use config::Config;
use discover::{default_roots, discover, group_roots};
use output::{OutputFormat, Reporter};
use smalipatch_rules::yaml_rules::{load_targets_from_path, run_tests};
use smalipatch_rules::{RuleRegistry, RuleSetId, TargetDef};

#[derive(Parser)]
#[command(name = "smalipatch")]
#[command(version)]
#[command(about = "Rule-driven patcher for smali listings")]
struct Cli {
    /// Listing root directories (default: the rule set's usual roots in the current directory)
    roots: Vec<PathBuf>,

    /// Rule set: framework, services, miui-services or auto
    #[arg(long, short = 's', value_name = "SET")]
    rule_set: Option<String>,

    /// Rules to run (can be specified multiple times). Overrides config file.
    #[arg(long, short = 'r', value_name = "RULE")]
    rule: Vec<String>,

    /// Show what would change without writing any file
    #[arg(long, short = 'n')]
    check: bool,

    /// Output format: text, json, diff
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(long, conflicts_with = "format")]
    json: bool,

    /// Path to config file (default: auto-detect .smalipatch.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ignore config files
    #[arg(long, conflicts_with = "config")]
    no_config: bool,

    /// Number of worker threads (default: all cores)
    #[arg(long, short = 'j', value_name = "N")]
    jobs: Option<usize>,

    /// Stop starting new files after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Back up every file before rewriting it
    #[arg(long)]
    backup: bool,

    /// Backup directory (default: .smalipatch-backup)
    #[arg(long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    /// Extra YAML rule file or directory (can be specified multiple times)
    #[arg(long, value_name = "PATH")]
    rules: Vec<PathBuf>,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Run the test cases embedded in YAML rule files and exit
    #[arg(long)]
    verify_rules: bool,

    /// Show verbose output and debug logging
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_file.as_deref())?;

    // Load config file
    let config = if cli.no_config {
        Config::default()
    } else if let Some(config_path) = &cli.config {
        let cfg = Config::load_path(config_path)?;
        debug!(path = %config_path.display(), "using config");
        cfg
    } else {
        match Config::load()? {
            Some((cfg, path)) => {
                debug!(path = %path.display(), "using config");
                cfg
            }
            None => Config::default(),
        }
    };

    let mut registry = RuleRegistry::new().context("Invalid built-in rules")?;
    let mut extra_targets: Vec<TargetDef> = Vec::new();
    for path in config.rules.files.iter().chain(&cli.rules) {
        let loaded = load_targets_from_path(path)?;
        info!(path = %path.display(), targets = loaded.len(), "loaded rules");
        extra_targets.extend(loaded);
    }
    registry.add_targets(&extra_targets)?;

    if cli.list_rules {
        list_rules(&registry);
        return Ok(ExitCode::SUCCESS);
    }

    if cli.verify_rules {
        return verify_rules(&extra_targets);
    }

    // Determine output format
    let output_format = if cli.json {
        OutputFormat::Json
    } else {
        let name = cli
            .format
            .as_deref()
            .or(config.output.format.as_deref())
            .unwrap_or("text");
        OutputFormat::parse(name).ok_or_else(|| {
            anyhow!("Invalid output format '{}'. Valid options: text, json, diff", name)
        })?
    };

    let requested = cli
        .rule_set
        .as_deref()
        .or(config.rules.rule_set.as_deref())
        .unwrap_or("auto");
    let explicit_set = match requested {
        "auto" => None,
        name => Some(name.parse::<RuleSetId>()?),
    };

    let roots = if !cli.roots.is_empty() {
        cli.roots.clone()
    } else if !config.paths.roots.is_empty() {
        config.paths.roots.clone()
    } else {
        let cwd = std::env::current_dir()?;
        let sets = match explicit_set {
            Some(set) => vec![set],
            None => RuleSetId::ALL.to_vec(),
        };
        let found: Vec<PathBuf> = sets.into_iter().flat_map(|set| default_roots(set, &cwd)).collect();
        if found.is_empty() {
            bail!("No listing roots given and none of the default roots exist in {}", cwd.display());
        }
        found
    };

    let (enabled, disabled) = config.rule_selection(&cli.rule);
    let groups = group_roots(&roots, explicit_set);
    let group_names: Vec<String> = groups.iter().map(|(set, _)| set.to_string()).collect();
    let mut runs = Vec::new();
    for (rule_set, set_roots) in groups {
        if explicit_set.is_none() {
            info!(rule_set = %rule_set, roots = set_roots.len(), "detected rule set");
        }
        let targets = registry.select(rule_set, enabled.as_ref(), &disabled)?;
        if targets.is_empty() {
            warn!(rule_set = %rule_set, "no rules enabled; skipping its roots");
            continue;
        }
        runs.push((rule_set, set_roots, targets));
    }
    if runs.is_empty() {
        bail!("No rules enabled for rule set '{}'", group_names.join(", "));
    }

    let check_mode = cli.check;
    if cli.verbose && output_format == OutputFormat::Text {
        println!("{}: {}", "Mode".bold(), if check_mode { "check" } else { "patch" });
        for (rule_set, set_roots, _) in &runs {
            println!(
                "{} {}: {}",
                "Roots".bold(),
                rule_set,
                set_roots.iter().map(|r| r.display().to_string()).collect::<Vec<_>>().join(", ")
            );
        }
        println!();
    }

    let backup_enabled = (cli.backup || config.batch.backup) && !check_mode;
    let backup = if backup_enabled {
        let dir = cli
            .backup_dir
            .clone()
            .or_else(|| config.batch.backup_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR));
        let manager = BackupManager::init_session(&dir)?;
        info!(path = %manager.session_path().display(), "backing up files");
        Some(manager)
    } else {
        None
    };

    let cancel = CancellationToken::default();
    let mut reporter = Reporter::new(output_format, cli.verbose, runs.iter().map(|(set, _, _)| *set).collect());
    for (rule_set, set_roots, targets) in runs {
        let discovery = discover(&set_roots, &targets, |path, relative| config.should_exclude(path, relative));
        for root in &discovery.missing_roots {
            warn!(root = %root.display(), "root does not exist");
            reporter.report_missing_root(root);
        }
        if discovery.files.is_empty() {
            warn!(rule_set = %rule_set, "no listing matched any target");
        }

        let ctx = BatchContext {
            jobs: cli.jobs.or(config.batch.jobs).unwrap_or(0),
            dry_run: check_mode,
            fail_fast: cli.fail_fast || config.batch.fail_fast,
            backup: backup.clone(),
            cancel: cancel.clone(),
            ..BatchContext::new(targets)
        };
        for report in run_batch(&ctx, &discovery.files)? {
            reporter.report(rule_set, &report, check_mode);
        }
    }

    // Determine exit code
    let summary = reporter.summary();
    let exit_code = if summary.errors > 0 {
        ExitCode::from(1)
    } else if check_mode && summary.files_patched > 0 {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    };

    reporter.finish(check_mode);

    Ok(exit_code)
}

fn list_rules(registry: &RuleRegistry) {
    let mut current = None;
    for info in registry.list_rules() {
        if current != Some(info.rule_set) {
            println!("{}", format!("{}:", info.rule_set).bold());
            current = Some(info.rule_set);
        }
        println!(
            "  {} [{}] {} - {}",
            info.id.green(),
            info.kind,
            info.suffix.dimmed(),
            info.description
        );
    }
}

fn verify_rules(targets: &[TargetDef]) -> Result<ExitCode> {
    let mut passed = 0;
    let mut failed = 0;

    for target in targets {
        for result in run_tests(target)? {
            if result.passed {
                passed += 1;
                continue;
            }
            failed += 1;
            println!("{} {}", "FAIL".red(), target.suffix);
            match (&result.error, &result.actual) {
                (Some(error), _) => println!("  {}", error),
                (None, Some(actual)) => {
                    for line in diff::lines(&result.expected, actual) {
                        match line {
                            diff::Result::Left(l) => println!("  {}", format!("- {}", l).red()),
                            diff::Result::Right(r) => println!("  {}", format!("+ {}", r).green()),
                            diff::Result::Both(_, _) => {}
                        }
                    }
                }
                (None, None) => {}
            }
        }
    }

    if passed + failed == 0 {
        println!("No rule tests found");
    } else {
        println!("{} passed, {} failed", passed, failed);
    }

    Ok(if failed > 0 { ExitCode::from(1) } else { ExitCode::SUCCESS })
}
