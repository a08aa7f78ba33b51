//! Inspect subcommand - list (and optionally verify) packed batches

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use esbulk_core::{BatchManifest, BatchRecord, ByteSize, fmt_num};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Directory holding manifest.json (default: configured output dir)
    pub dir: Option<PathBuf>,

    /// Re-hash every batch file against the manifest
    #[arg(long)]
    pub verify: bool,
}

/// First eight characters of a recorded hash
fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

/// Verification outcome per batch, in manifest order
fn verify_all(dir: &Path, batches: &[BatchRecord]) -> Result<Vec<bool>> {
    batches
        .iter()
        .map(|b| {
            BatchManifest::verify_batch(dir, b)
                .with_context(|| format!("Failed to read {}", b.file))
        })
        .collect()
}

pub fn run(args: InspectArgs, config: &Config) -> Result<()> {
    let dir = args
        .dir
        .unwrap_or_else(|| config.output.default_dir.clone());
    let manifest = BatchManifest::load(&dir)
        .with_context(|| format!("Failed to load manifest from {}", dir.display()))?;

    let verified = if args.verify {
        Some(verify_all(&dir, &manifest.batches)?)
    } else {
        None
    };

    let mut header = vec![
        Cell::new("File").fg(Color::Cyan),
        Cell::new("Entries").fg(Color::Cyan),
        Cell::new("Size").fg(Color::Cyan),
        Cell::new("Hash").fg(Color::Cyan),
    ];
    if verified.is_some() {
        header.push(Cell::new("Verified").fg(Color::Cyan));
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);

    for (i, batch) in manifest.batches.iter().enumerate() {
        let mut row = vec![
            Cell::new(&batch.file),
            Cell::new(fmt_num(batch.entries)),
            Cell::new(ByteSize::bytes(batch.bytes)),
            Cell::new(short_hash(&batch.hash)),
        ];
        if let Some(ok) = verified.as_ref().map(|v| v[i]) {
            row.push(if ok {
                Cell::new("ok").fg(Color::Green)
            } else {
                Cell::new("MISMATCH").fg(Color::Red)
            });
        }
        table.add_row(row);
    }

    eprintln!("\n{table}");
    eprintln!(
        "{} batches, {} entries, {} (max {} per body, packed {})",
        manifest.batches.len(),
        fmt_num(manifest.total_entries),
        ByteSize::bytes(manifest.total_bytes),
        manifest.max_size,
        manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if let Some(v) = verified {
        let bad = v.iter().filter(|ok| !**ok).count();
        if bad > 0 {
            bail!("{bad} batch file(s) do not match the manifest");
        }
    }
    Ok(())
}
