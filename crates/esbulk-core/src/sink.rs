//! Batch file sink: persists drained bulk bodies for later transmission

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::manifest::BatchRecord;

/// Writes each bulk body to its own numbered file with atomic tmp→rename.
///
/// Files are named `<prefix>_<seq>.ndjson`, or `.ndjson.gz` when gzip is on.
pub struct BatchFileSink {
    dir: PathBuf,
    prefix: String,
    gzip: Option<Compression>,
    next_seq: usize,
}

impl std::fmt::Debug for BatchFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchFileSink")
            .field("dir", &self.dir)
            .field("next_seq", &self.next_seq)
            .finish_non_exhaustive()
    }
}

impl BatchFileSink {
    /// Create the output directory if needed.
    ///
    /// `gzip_level` (0-9) enables gzip output.
    pub fn new(dir: &Path, prefix: &str, gzip_level: Option<u32>) -> io::Result<Self> {
        if let Some(level) = gzip_level {
            if level > 9 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("gzip level {level} out of range 0-9"),
                ));
            }
        }
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            gzip: gzip_level.map(Compression::new),
            next_seq: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of batches written so far
    pub fn written(&self) -> usize {
        self.next_seq
    }

    fn file_name(&self, seq: usize) -> String {
        let ext = if self.gzip.is_some() { "ndjson.gz" } else { "ndjson" };
        format!("{}_{seq:04}.{ext}", self.prefix)
    }

    /// Whether `name` is a batch file this sink would write (`<prefix>_<digits>.ndjson[.gz]`)
    fn is_batch_file(&self, name: &str) -> bool {
        let Some(rest) = name
            .strip_prefix(self.prefix.as_str())
            .and_then(|r| r.strip_prefix('_'))
        else {
            return false;
        };
        rest.strip_suffix(".ndjson.gz")
            .or_else(|| rest.strip_suffix(".ndjson"))
            .is_some_and(|seq| !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Delete batch files with this sink's prefix left by an earlier run.
    ///
    /// Returns how many were removed.
    pub fn remove_previous_batches(&self) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.is_batch_file(name) {
                log::debug!("removing previous batch {}", path.display());
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Persist one sealed body holding `entries` records.
    pub fn write_batch(&mut self, body: &[u8], entries: usize) -> io::Result<BatchRecord> {
        let file = self.file_name(self.next_seq);
        let final_path = self.dir.join(&file);
        let tmp_path = self.dir.join(format!("{file}.tmp"));

        let out = BufWriter::new(File::create(&tmp_path)?);
        match self.gzip {
            Some(level) => {
                let mut enc = GzEncoder::new(out, level);
                enc.write_all(body)?;
                enc.finish()?.flush()?;
            }
            None => {
                let mut out = out;
                out.write_all(body)?;
                out.flush()?;
            }
        }
        fs::rename(&tmp_path, &final_path)?;

        self.next_seq += 1;
        log::debug!(
            "wrote {} ({} entries, {} bytes)",
            final_path.display(),
            entries,
            body.len()
        );
        Ok(BatchRecord {
            file,
            entries,
            bytes: body.len() as u64,
            hash: blake3::hash(body).to_hex().to_string(),
        })
    }
}

/// Remove stale .tmp files in the output directory
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::BatchManifest;
    use std::io::Read;
    use tempfile::TempDir;

    const BODY: &[u8] = b"{\"index\":{\"_index\":\"a\",\"_type\":\"_doc\",\"_id\":\"1\"}}\n{}\n\n";

    #[test]
    fn writes_numbered_files() {
        let dir = TempDir::new().unwrap();
        let mut sink = BatchFileSink::new(dir.path(), "bulk", None).unwrap();
        let first = sink.write_batch(BODY, 1).unwrap();
        let second = sink.write_batch(BODY, 1).unwrap();

        assert_eq!(first.file, "bulk_0000.ndjson");
        assert_eq!(second.file, "bulk_0001.ndjson");
        assert_eq!(sink.written(), 2);
        assert_eq!(fs::read(dir.path().join(&first.file)).unwrap(), BODY);
        assert!(!dir.path().join("bulk_0000.ndjson.tmp").exists());
    }

    #[test]
    fn gzip_output_decompresses_to_body() {
        let dir = TempDir::new().unwrap();
        let mut sink = BatchFileSink::new(dir.path(), "orders", Some(6)).unwrap();
        let rec = sink.write_batch(BODY, 1).unwrap();
        assert_eq!(rec.file, "orders_0000.ndjson.gz");
        assert_eq!(rec.bytes, BODY.len() as u64);

        let file = File::open(dir.path().join(&rec.file)).unwrap();
        let mut decoded = Vec::new();
        flate2::read::GzDecoder::new(file)
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, BODY);
        assert!(BatchManifest::verify_batch(dir.path(), &rec).unwrap());
    }

    #[test]
    fn rejects_bad_gzip_level() {
        let dir = TempDir::new().unwrap();
        let err = BatchFileSink::new(dir.path(), "bulk", Some(12)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("out/batches");
        let mut sink = BatchFileSink::new(&nested, "bulk", None).unwrap();
        sink.write_batch(BODY, 1).unwrap();
        assert!(nested.join("bulk_0000.ndjson").exists());
    }

    #[test]
    fn cleanup_tmp_files_removes_only_tmp() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bulk_0000.ndjson.tmp"), b"stale").unwrap();
        fs::write(dir.path().join("bulk_0001.ndjson"), b"keep").unwrap();
        fs::write(dir.path().join("manifest.json.tmp"), b"stale2").unwrap();

        cleanup_tmp_files(dir.path()).unwrap();

        assert!(!dir.path().join("bulk_0000.ndjson.tmp").exists());
        assert!(dir.path().join("bulk_0001.ndjson").exists());
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[test]
    fn remove_previous_batches_matches_prefix_only() {
        let dir = TempDir::new().unwrap();
        for name in [
            "bulk_0000.ndjson",
            "bulk_0001.ndjson.gz",
            "bulk_notes.ndjson",
            "other_0000.ndjson",
            "manifest.json",
        ] {
            fs::write(dir.path().join(name), b"old").unwrap();
        }

        let sink = BatchFileSink::new(dir.path(), "bulk", None).unwrap();
        assert_eq!(sink.remove_previous_batches().unwrap(), 2);

        assert!(!dir.path().join("bulk_0000.ndjson").exists());
        assert!(!dir.path().join("bulk_0001.ndjson.gz").exists());
        assert!(dir.path().join("bulk_notes.ndjson").exists());
        assert!(dir.path().join("other_0000.ndjson").exists());
        assert!(dir.path().join("manifest.json").exists());
    }
}
