//! void-sweep - Resumable Empty Directory Cleanup
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use void_sweep::catalog::Catalog;
use void_sweep::config::{CliArgs, Command, SweepConfig};
use void_sweep::progress::{
    format_number, print_cleanup_summary, print_errors, print_header, print_scan_summary,
    ConsoleProgress, ProgressSink,
};
use void_sweep::SweepEngine;

/// Errors listed after a run
const ERROR_REPORT_LIMIT: usize = 10;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose)?;

    if let Some(Command::Sessions { catalog, limit }) = &args.command {
        return list_sessions(catalog, *limit);
    }

    let engine = build_engine(&args)?;
    let config = engine.config().clone();

    if !args.quiet {
        print_header(
            &engine.session().root_path,
            config.workers,
            &config.catalog_path.display().to_string(),
            config.delete_mode,
        );
    }

    let progress = (!args.quiet).then(|| Arc::new(ConsoleProgress::new()));
    let engine = match &progress {
        Some(p) => engine.with_progress(Arc::clone(p) as Arc<dyn ProgressSink>),
        None => engine,
    };

    // Ctrl-C drains in-flight work and leaves the rest pending
    let control = engine.control();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing in-flight directories...");
        control.cancel();
    })
    .context("Failed to set signal handler")?;

    let session_id = engine.session().id.clone();

    if args.cleanup_only {
        let report = engine.cleanup_only().context("Cleanup failed")?;
        if let Some(p) = &progress {
            p.finish_and_clear();
        }
        print_cleanup_summary(&report, config.delete_mode);
    } else if args.scan_only {
        let summary = engine.scan_only().context("Scan failed")?;
        if let Some(p) = &progress {
            p.finish_and_clear();
        }
        print_scan_summary(&summary, &session_id);
    } else {
        let result = engine.run().context("Sweep failed")?;
        if let Some(p) = &progress {
            p.finish_and_clear();
        }
        print_scan_summary(&result.scan, &session_id);
        match &result.cleanup {
            Some(report) => print_cleanup_summary(report, config.delete_mode),
            None => info!("Scan was interrupted; run again with --resume to continue"),
        }
    }

    let errors = engine
        .catalog()
        .errors(&session_id)
        .context("Failed to read error report")?;
    print_errors(&errors, ERROR_REPORT_LIMIT);

    Ok(())
}

fn build_engine(args: &CliArgs) -> Result<SweepEngine> {
    if args.resume {
        if args.path.is_some() {
            anyhow::bail!(void_sweep::error::ConfigError::ResumeWithPath);
        }
        let engine = SweepEngine::resume(&args.catalog).context("Failed to resume session")?;
        let min_depth = engine.config().min_depth;
        // --delete may be added on resume; it is never taken away
        Ok(if args.delete {
            engine.with_cleanup_options(true, min_depth)
        } else {
            engine
        })
    } else if args.cleanup_only && args.path.is_none() {
        Ok(SweepEngine::last_completed(&args.catalog)
            .context("No completed scan to clean up")?
            .with_cleanup_options(args.delete, args.min_depth))
    } else if args.cleanup_only {
        anyhow::bail!("--cleanup-only works on the last completed session; omit the path")
    } else {
        let config = SweepConfig::from_args(args).context("Invalid configuration")?;
        SweepEngine::new(config).context("Failed to open catalog")
    }
}

fn list_sessions(catalog_path: &Path, limit: usize) -> Result<()> {
    let catalog = Catalog::open(catalog_path)
        .with_context(|| format!("Failed to open catalog {}", catalog_path.display()))?;
    let sessions = catalog.list_sessions(limit).context("Failed to list sessions")?;

    if sessions.is_empty() {
        println!("No sessions in {}", catalog_path.display());
        return Ok(());
    }

    for (session, stats) in sessions {
        let state = if session.completed {
            style("complete").green()
        } else {
            style("incomplete").yellow()
        };
        println!("{} [{}]", style(&session.id).bold(), state);
        println!("  {} {}", style("Started:").dim(), session.started_at);
        println!("  {} {}", style("Root:").dim(), session.root_path);
        println!(
            "  {} {} scanned, {} empty, {} pending, {} errors, {} deleted, {} would delete",
            style("Folders:").dim(),
            format_number(stats.scanned),
            format_number(stats.empty),
            format_number(stats.pending),
            format_number(stats.errors),
            format_number(stats.deleted),
            format_number(stats.would_delete),
        );
    }
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("void_sweep=debug,warn")
    } else {
        EnvFilter::new("void_sweep=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
