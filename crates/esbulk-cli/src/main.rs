//! esbulk - pack newline-delimited operations into bulk request bodies
//!
//! Splits a stream of index/create/update/delete operations into
//! size-bounded bulk payloads, ready to be sent to a `_bulk` endpoint.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod input;

use config::Config;

#[derive(Parser)]
#[command(name = "esbulk")]
#[command(about = "Pack document operations into size-bounded bulk request bodies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./esbulk.toml or ~/.config/esbulk/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Pack an operation stream into bulk body files
    Pack(cmd::pack::PackArgs),
    /// List the batches recorded in a manifest
    Inspect(cmd::inspect::InspectArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(esbulk_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, the spinner shows activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    esbulk_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Pack(args) => {
            setup_signal_handler()?;
            cmd::pack::run(args, &config, &progress)
        }
        Command::Inspect(args) => cmd::inspect::run(args, &config),
        Command::Config => {
            use comfy_table::{
                Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec!["Max body size", &config.bulk.max_size.to_string()]);
            table.add_row(vec!["Default type", &config.bulk.default_type]);
            table.add_row(vec![
                "Output directory",
                &config.output.default_dir.display().to_string(),
            ]);
            table.add_row(vec!["File prefix", &config.output.prefix]);
            table.add_row(vec![
                "Gzip",
                &if config.output.gzip {
                    format!("on (level {})", config.output.compression_level)
                } else {
                    "off".to_string()
                },
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}

/// First signal: stop after the current line and flush the partial batch.
/// Second signal: exit immediately.
fn setup_signal_handler() -> Result<()> {
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
        unsafe {
            signal_hook::low_level::register(signal, || {
                if esbulk_core::shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })?;
        }
    }
    Ok(())
}
