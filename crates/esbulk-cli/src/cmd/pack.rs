//! Pack subcommand - split an operation stream into bulk body files

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::ProgressBar;

use esbulk_core::{
    BatchFileSink, BatchManifest, BulkBody, BulkError, ByteSize, SharedProgress,
    cleanup_tmp_files, fmt_num, is_shutdown_requested,
};

use crate::config::Config;
use crate::input;

/// Progress update interval (every N lines to avoid overhead)
const UPDATE_INTERVAL: usize = 10_000;

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Input file with one operation per line ("-" or omitted for stdin)
    pub input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Soft size budget per bulk body (e.g. 512KB, 5MB)
    #[arg(short, long)]
    pub max_size: Option<ByteSize>,

    /// Gzip each batch file
    #[arg(long)]
    pub gzip: bool,

    /// Gzip level (0-9)
    #[arg(long)]
    pub compression_level: Option<u32>,

    /// Batch file name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// `_type` for lines without one
    #[arg(long)]
    pub default_type: Option<String>,
}

/// Effective settings after merging CLI args over config
#[derive(Debug, Clone)]
pub struct PackSettings {
    pub output_dir: PathBuf,
    pub max_size: ByteSize,
    pub gzip_level: Option<u32>,
    pub prefix: String,
    pub default_type: String,
}

impl PackSettings {
    pub fn resolve(args: &PackArgs, config: &Config) -> Self {
        let gzip = args.gzip || config.output.gzip;
        Self {
            output_dir: args
                .output
                .clone()
                .unwrap_or_else(|| config.output.default_dir.clone()),
            max_size: args.max_size.unwrap_or(config.bulk.max_size),
            gzip_level: gzip.then(|| {
                args.compression_level
                    .unwrap_or(config.output.compression_level)
            }),
            prefix: args
                .prefix
                .clone()
                .unwrap_or_else(|| config.output.prefix.clone()),
            default_type: args
                .default_type
                .clone()
                .unwrap_or_else(|| config.bulk.default_type.clone()),
        }
    }
}

/// Result of a packing run
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub lines: usize,
    pub entries: usize,
    pub batches: usize,
    pub bytes: u64,
    /// Stopped early by a shutdown signal
    pub interrupted: bool,
}

pub fn run(args: PackArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let settings = PackSettings::resolve(&args, config);
    log::info!(
        "Packing into {} (max {} per body{})",
        settings.output_dir.display(),
        settings.max_size,
        if settings.gzip_level.is_some() {
            ", gzip"
        } else {
            ""
        }
    );

    let reader = input::open(args.input.as_deref())?;
    let pb = progress.status_line("pack");
    let summary = pack(reader, &settings, &pb)?;
    pb.finish_and_clear();

    progress.println(format!(
        "Packed {} entries into {} batches ({}) in {}",
        fmt_num(summary.entries),
        summary.batches,
        ByteSize::bytes(summary.bytes),
        settings.output_dir.display()
    ));
    if summary.interrupted {
        log::warn!(
            "Interrupted after {} lines; remaining input was not packed",
            fmt_num(summary.lines)
        );
    }
    Ok(())
}

/// Read operations line by line, append them to a bulk body, and write every
/// sealed body through a [`BatchFileSink`].
///
/// Batches from an earlier run with the same prefix are removed first, and
/// `manifest.json` is rewritten after every batch so it always lists exactly
/// the files on disk, even when the run fails partway.
pub fn pack<R: BufRead>(
    mut reader: R,
    settings: &PackSettings,
    pb: &ProgressBar,
) -> Result<PackSummary> {
    let mut sink =
        BatchFileSink::new(&settings.output_dir, &settings.prefix, settings.gzip_level)
            .with_context(|| format!("Failed to prepare {}", settings.output_dir.display()))?;
    cleanup_tmp_files(sink.dir())?;

    let mut manifest = BatchManifest::new(settings.max_size);
    manifest.save(sink.dir())?;
    let removed = sink.remove_previous_batches()?;
    if removed > 0 {
        log::warn!(
            "Removed {removed} batch files from a previous run in {}",
            sink.dir().display()
        );
    }
    let mut body = BulkBody::new(settings.max_size);
    let mut summary = PackSummary::default();
    let mut line = String::new();

    loop {
        if is_shutdown_requested() {
            summary.interrupted = true;
            break;
        }
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        summary.lines += 1;
        let line_no = summary.lines;

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let op = input::parse_line(text, &settings.default_type)
            .with_context(|| format!("line {line_no}"))?;

        match body.append(&op) {
            Ok(()) => {}
            Err(BulkError::Full) => {
                flush(&mut body, &mut sink, &mut manifest)?;
                body.append(&op)
                    .with_context(|| format!("line {line_no}: entry rejected by an empty body"))?;
            }
            Err(e) => return Err(e).with_context(|| format!("line {line_no}")),
        }
        summary.entries += 1;

        if line_no.is_multiple_of(UPDATE_INTERVAL) {
            pb.set_message(format!(
                "{} entries, {} batches",
                fmt_num(summary.entries),
                sink.written()
            ));
        }
    }

    if body.entries() > 0 {
        flush(&mut body, &mut sink, &mut manifest)?;
    }

    summary.batches = manifest.batches.len();
    summary.bytes = manifest.total_bytes;
    Ok(summary)
}

/// Seal, drain and persist the current body, then rewrite the manifest.
/// The emptied body re-opens on its next append.
fn flush(
    body: &mut BulkBody,
    sink: &mut BatchFileSink,
    manifest: &mut BatchManifest,
) -> Result<()> {
    body.seal()?;
    let entries = body.entries();
    let bytes = body.take();
    let record = sink.write_batch(&bytes, entries)?;
    log::info!(
        "{}: {} entries, {}",
        record.file,
        fmt_num(record.entries),
        ByteSize::bytes(record.bytes)
    );
    manifest.push(record);
    manifest.save(sink.dir())?;
    Ok(())
}
