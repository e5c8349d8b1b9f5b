mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use backup_scan_core::config::{load_configuration, load_configuration_from};
use backup_scan_core::{
    AppConfig, BackupFinder, CatalogDb, FindOutcome, FindRequest, LocalStorage,
    PropertiesRecordBuilder, RepairMode, Scanner, Storage,
};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let outcome = match args.command {
        Some(Commands::Scan {
            root,
            package,
            repair,
            trace,
        }) => run_scan(&config, root, &package, repair, trace),
        Some(Commands::List { package }) => run_list(&config, package.as_deref()),
        Some(Commands::Sessions { limit }) => run_sessions(&config, limit),
        Some(Commands::PrintConfig) => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::TruncateCatalog) => {
            match prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the backup catalog?",
                Some(false),
            ) {
                Ok(true) => match CatalogDb::open(&config.catalog_path) {
                    Ok(db) => {
                        if let Err(e) = db.truncate_all() {
                            error!("Error truncating catalog: {}", e);
                        } else {
                            println!("All tables truncated");
                        }
                    }
                    Err(e) => error!("Error opening catalog: {}", e),
                },
                _ => {
                    process::exit(0);
                }
            }
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        process::exit(1);
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, backup_scan_core::Error> {
    let config = match path {
        Some(path) => load_configuration_from(path)?,
        None => load_configuration()?,
    };
    Ok(config)
}

fn run_scan(
    config: &AppConfig,
    root: Option<PathBuf>,
    package: &str,
    repair: RepairMode,
    trace: bool,
) -> anyhow::Result<()> {
    let backup_root = root.unwrap_or_else(|| config.backup_root.clone());
    let storage: Arc<dyn Storage> =
        Arc::new(LocalStorage::new(&config.naming.properties_extension));
    let scanner = Scanner::new(storage.clone(), &config.naming, &config.scanner)
        .context("building scanner")?;
    let builder = PropertiesRecordBuilder::new(storage, &config.naming)?;
    let finder = BackupFinder::new(
        scanner,
        Box::new(builder),
        Box::new(config.installed_packages.clone()),
        &backup_root,
    )
    .with_invalid_backups(config.create_invalid_backups)
    .with_early_empty_backups(config.early_empty_backups);

    let db = CatalogDb::open(&config.catalog_path)
        .with_context(|| format!("opening catalog {}", config.catalog_path))?;
    info!(
        "Scanning {} with {} workers (repair: {})",
        backup_root.display(),
        finder.scanner().worker_threads(),
        repair
    );

    let request = FindRequest {
        package_filter: package.to_string(),
        repair_mode: repair,
        force_trace: trace,
    };
    let reporter = CliReporter::new();
    let report = finder.find(&db, &request, &reporter);

    println!();
    if let Some(scan) = &report.scan {
        info!(
            "Scan: {}, {} entries, {} listings",
            format!("{:.2}s", scan.duration.as_secs_f64()).green(),
            scan.processed,
            scan.listings,
        );
        info!(
            "{} valid, {} invalid, {} {}, {} failed",
            format!("{}", scan.valid).green(),
            format!("{}", scan.invalid).yellow(),
            format!("{}", scan.suspicious).red(),
            scan.repair_mode.outcome_label(),
            scan.failed,
        );
    }
    match &report.outcome {
        FindOutcome::Completed => info!(
            "{} packages, {} backups written to {}",
            format!("{}", report.backups.len()).cyan(),
            format!("{}", report.written).cyan(),
            config.catalog_path,
        ),
        FindOutcome::Failed(reason) => {
            anyhow::bail!("catalog left unchanged: {}", reason)
        }
    }

    Ok(())
}

fn run_list(config: &AppConfig, package: Option<&str>) -> anyhow::Result<()> {
    let db = CatalogDb::open(&config.catalog_path)?;

    match package {
        Some(package) => {
            let backups = db.get_backups_of(package)?;
            if backups.is_empty() {
                println!("No backups of {}", package);
            }
            for backup in backups {
                let date = backup
                    .backup_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let state = match &backup.invalid_reason {
                    Some(reason) => reason.red().to_string(),
                    None => "ok".green().to_string(),
                };
                println!(
                    "{}  {:>12}  user {:<3} {}  {}",
                    date,
                    backup.size,
                    backup.profile_id,
                    state,
                    backup.dir_path.display()
                );
            }
        }
        None => {
            let summaries = db.get_package_summaries()?;
            for summary in &summaries {
                println!(
                    "{:<50} {:>4} backups {:>4} invalid  {}",
                    summary.package_name,
                    summary.backups.to_string().green(),
                    summary.invalid.to_string().red(),
                    summary.latest_backup.as_deref().unwrap_or("-"),
                );
            }
            println!(
                "{} packages, {} backups",
                summaries.len(),
                db.get_backup_count()?
            );
        }
    }

    Ok(())
}

fn run_sessions(config: &AppConfig, limit: i64) -> anyhow::Result<()> {
    let db = CatalogDb::open(&config.catalog_path)?;
    for session in db.list_sessions(limit)? {
        let status = if session.status == "completed" {
            session.status.green()
        } else {
            session.status.red()
        };
        let filter = if session.package_filter.is_empty() {
            "all packages".to_string()
        } else {
            session.package_filter.clone()
        };
        println!(
            "#{:<5} {}  {:<9} {:<8} {:<24} {} processed, {} valid, {} invalid, {} suspicious",
            session.id,
            session.started_at,
            status,
            session.repair_mode,
            filter,
            session.processed,
            session.valid,
            session.invalid,
            session.suspicious,
        );
    }
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
