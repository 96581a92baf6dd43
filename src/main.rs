//! fswalk - Concurrent filesystem traversal CLI
//!
//! Entry point for the command-line application. Exit codes: 0 on
//! success, 1 on fatal error, 2 on invalid arguments.

use anyhow::Context;
use clap::Parser;
use fswalk::cancel::Cancellation;
use fswalk::config::{CliArgs, Command, FindArgs, OutputFormat, WalkConfig, WatchArgs};
use fswalk::error::WalkError;
use fswalk::find::{default_handler, exec_handler, format_handler};
use fswalk::progress::{print_header, print_summary, ProgressReporter, Stats};
use fswalk::template;
use fswalk::walker::{visit_fn, Flow, VisitFn, WalkStats, Walker};
use fswalk::{find, watch};
use std::io::Write;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let verbose = match &args.command {
        Some(Command::Find(find_args)) => find_args.verbose,
        Some(Command::Watch(watch_args)) => watch_args.verbose,
        None => args.verbose,
    };
    setup_logging(verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            match err.downcast_ref::<WalkError>() {
                Some(WalkError::Config(_)) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    match args.command.clone() {
        Some(Command::Find(find_args)) => run_find(find_args),
        Some(Command::Watch(watch_args)) => run_watch(watch_args),
        None => run_walk(args),
    }
}

fn run_walk(args: CliArgs) -> anyhow::Result<()> {
    let config = WalkConfig::from_args(&args).map_err(WalkError::Config)?;

    let cancel = Cancellation::new();
    install_signal_handler(cancel.clone())?;

    let reporter = if config.show_progress && config.format == OutputFormat::Text {
        Some(ProgressReporter::new())
    } else {
        None
    };

    let mut builder = Walker::builder()
        .workers(config.workers)
        .filter(config.filter.clone())
        .symlink_mode(config.symlink_mode)
        .error_mode(config.error_mode)
        .cancellation(cancel.clone());

    if config.show_progress {
        match (&reporter, config.format) {
            (Some(reporter), _) => {
                let reporter = reporter.clone();
                builder = builder.progress(Arc::new(move |stats: Stats| {
                    reporter.update(&stats);
                }));
            }
            (None, OutputFormat::Json) => {
                builder = builder.progress(Arc::new(|stats: Stats| {
                    if let Ok(json) = serde_json::to_string(&stats) {
                        println!("{}", json);
                    }
                }));
            }
            (None, OutputFormat::Text) => {}
        }
    }

    let walker = builder.build().map_err(WalkError::Config)?;

    if !config.silent && !config.show_progress && config.format == OutputFormat::Text {
        print_header(&config.root.display().to_string(), config.workers);
    }

    let visit = walk_output_visit(&config);
    let result = walker.walk(&config.root, visit);

    if let Some(reporter) = &reporter {
        match &result {
            Ok(stats) if stats.completed => reporter.finish("Walk completed"),
            _ => reporter.finish("Walk interrupted"),
        }
    }

    let stats = result.context("Walk failed")?;

    if !config.silent && config.format == OutputFormat::Text {
        print_summary(&to_snapshot(&stats));
    }

    Ok(())
}

/// Per-entry output callback for the plain walk command.
fn walk_output_visit(config: &WalkConfig) -> VisitFn {
    let format = config.format;
    let silent = config.silent;
    let show_progress = config.show_progress;
    let root = config.root.clone();

    visit_fn(move |visit| {
        // Propagate entry errors so the error policy sees them.
        if let Some(err) = visit.error {
            return Err(WalkError::Entry(err.clone()));
        }

        // Directories steer traversal; output covers files only.
        if visit.entry.is_dir() {
            return Ok(Flow::Continue);
        }

        match format {
            OutputFormat::Json => {
                let modified = visit
                    .entry
                    .modified
                    .map(|t| chrono::DateTime::<chrono::Local>::from(t).to_rfc3339());
                let line = serde_json::json!({
                    "path": visit.entry.path.display().to_string(),
                    "size": visit.entry.size,
                    "mode": format!("{:o}", visit.entry.mode),
                    "type": visit.entry.kind.as_str(),
                    "last_modified": modified,
                });
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                let _ = writeln!(out, "{}", line);
            }
            OutputFormat::Text => {
                if !silent && !show_progress {
                    let display = visit
                        .entry
                        .path
                        .strip_prefix(&root)
                        .unwrap_or(&visit.entry.path);
                    let stdout = std::io::stdout();
                    let mut out = stdout.lock();
                    let _ = writeln!(out, "{} ({} bytes)", display.display(), visit.entry.size);
                }
            }
        }
        Ok(Flow::Continue)
    })
}

fn run_find(args: FindArgs) -> anyhow::Result<()> {
    let opts = args.to_options().map_err(WalkError::Config)?;

    let cancel = Cancellation::new();
    install_signal_handler(cancel.clone())?;

    let handler = if !opts.exec_cmd.is_empty() {
        exec_handler(opts.exec_cmd.clone())
    } else if !opts.print_format.is_empty() {
        format_handler(opts.print_format.clone())
    } else {
        default_handler()
    };

    find::find(&args.path, &opts, handler, &cancel).context("Find failed")?;
    Ok(())
}

fn run_watch(args: WatchArgs) -> anyhow::Result<()> {
    let opts = args.to_options().map_err(WalkError::Config)?;

    let cancel = Cancellation::new();
    install_signal_handler(cancel.clone())?;

    let visit = if let Some(exec) = args.exec.clone() {
        let cancel = cancel.clone();
        visit_fn(move |visit| {
            if visit.error.is_some() {
                return Ok(Flow::Continue);
            }
            let line = template::format(&exec, visit.entry, visit.event);
            find::run_command(&line, &cancel)?;
            Ok(Flow::Continue)
        })
    } else if let Some(format) = args.format.clone() {
        visit_fn(move |visit| {
            if visit.error.is_some() {
                return Ok(Flow::Continue);
            }
            let line = template::format(&format, visit.entry, visit.event);
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let _ = writeln!(out, "{}", line);
            Ok(Flow::Continue)
        })
    } else {
        visit_fn(|visit| {
            if visit.error.is_some() {
                return Ok(Flow::Continue);
            }
            if let Some(event) = visit.event {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                let _ = writeln!(
                    out,
                    "{}: {}",
                    event.as_str().to_uppercase(),
                    visit.entry.path.display()
                );
            }
            Ok(Flow::Continue)
        })
    };

    watch::watch(&args.path, &opts, visit, &cancel).context("Watch failed")?;
    Ok(())
}

/// Graceful shutdown on the first interrupt, forced exit on the second.
fn install_signal_handler(cancel: Cancellation) -> anyhow::Result<()> {
    let interrupt_count = Arc::new(AtomicU32::new(0));
    ctrlc::set_handler(move || {
        let count = interrupt_count.fetch_add(1, Ordering::SeqCst);
        if count == 0 {
            eprintln!("\nInterrupt received, shutting down gracefully...");
            eprintln!("Press Ctrl+C again to force exit immediately.");
            cancel.cancel();
        } else {
            eprintln!("\nForced exit!");
            std::process::exit(130);
        }
    })
    .context("Failed to set signal handler")?;
    Ok(())
}

fn to_snapshot(stats: &WalkStats) -> Stats {
    Stats {
        files_processed: stats.files,
        dirs_processed: stats.dirs,
        empty_dirs: stats.empty_dirs,
        bytes_processed: stats.bytes,
        error_count: stats.errors,
        elapsed: stats.duration,
        avg_file_size: if stats.files > 0 {
            stats.bytes / stats.files
        } else {
            0
        },
        speed_mb_per_sec: if stats.duration.as_secs_f64() > 0.0 {
            (stats.bytes as f64 / 1_048_576.0) / stats.duration.as_secs_f64()
        } else {
            0.0
        },
    }
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("fswalk=debug,warn")
    } else {
        EnvFilter::new("fswalk=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
