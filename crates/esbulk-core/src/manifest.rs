//! Batch manifest: records every bulk body written by a packing run

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::size::ByteSize;

pub const MANIFEST_FILE: &str = "manifest.json";

/// One sealed bulk body persisted to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// File name relative to the output directory
    pub file: String,
    /// Number of records in the body
    pub entries: usize,
    /// Size of the uncompressed body, final delimiter included
    pub bytes: u64,
    /// Blake3 hex hash of the uncompressed body
    pub hash: String,
}

impl BatchRecord {
    pub fn is_gzip(&self) -> bool {
        self.file.ends_with(".gz")
    }
}

/// Manifest stored alongside the batch files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Budget the bodies were packed with
    pub max_size: ByteSize,
    pub batches: Vec<BatchRecord>,
    pub total_entries: usize,
    pub total_bytes: u64,
}

impl BatchManifest {
    pub fn new(max_size: ByteSize) -> Self {
        Self {
            created_at: chrono::Utc::now(),
            max_size,
            batches: Vec::new(),
            total_entries: 0,
            total_bytes: 0,
        }
    }

    pub fn push(&mut self, record: BatchRecord) {
        self.total_entries += record.entries;
        self.total_bytes += record.bytes;
        self.batches.push(record);
    }

    /// Write `manifest.json` into `dir` (tmp + rename).
    pub fn save(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    /// Read `manifest.json` from `dir`.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        serde_json::from_str(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Re-hash a batch file and compare against its recorded hash and size.
    ///
    /// Gzip files are hashed after decompression. The recorded size is not
    /// trusted for allocation.
    pub fn verify_batch(dir: &Path, record: &BatchRecord) -> io::Result<bool> {
        let file = File::open(dir.join(&record.file))?;
        let mut body = Vec::new();
        if record.is_gzip() {
            GzDecoder::new(file).read_to_end(&mut body)?;
        } else {
            let mut file = file;
            file.read_to_end(&mut body)?;
        }
        Ok(body.len() as u64 == record.bytes && blake3::hash(&body).to_hex().as_str() == record.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str, body: &[u8], entries: usize) -> BatchRecord {
        BatchRecord {
            file: file.to_string(),
            entries,
            bytes: body.len() as u64,
            hash: blake3::hash(body).to_hex().to_string(),
        }
    }

    #[test]
    fn push_accumulates_totals() {
        let mut m = BatchManifest::new(ByteSize::mb(5));
        m.push(record("bulk_0000.ndjson", b"a\nb\n\n", 1));
        m.push(record("bulk_0001.ndjson", b"c\nd\ne\nf\n\n", 2));
        assert_eq!(m.total_entries, 3);
        assert_eq!(m.total_bytes, 14);
        assert_eq!(m.batches.len(), 2);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = BatchManifest::new(ByteSize::kb(64));
        m.push(record("bulk_0000.ndjson", b"x\ny\n\n", 1));
        let path = m.save(dir.path()).unwrap();
        assert!(path.ends_with(MANIFEST_FILE));
        assert!(!dir.path().join("manifest.json.tmp").exists());

        let loaded = BatchManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.max_size, ByteSize::kb(64));
        assert_eq!(loaded.batches, m.batches);
        assert_eq!(loaded.created_at, m.created_at);
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), b"not json").unwrap();
        let err = BatchManifest::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn verify_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"{\"index\":{}}\n{}\n\n";
        fs::write(dir.path().join("bulk_0000.ndjson"), body).unwrap();
        let rec = record("bulk_0000.ndjson", body, 1);
        assert!(BatchManifest::verify_batch(dir.path(), &rec).unwrap());

        fs::write(dir.path().join("bulk_0000.ndjson"), b"{\"index\":{}}\n{}\n").unwrap();
        assert!(!BatchManifest::verify_batch(dir.path(), &rec).unwrap());
    }

    #[test]
    fn verify_reports_corrupt_size_as_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bulk_0000.ndjson"), b"x\n\n").unwrap();
        let mut rec = record("bulk_0000.ndjson", b"x\n\n", 1);
        rec.bytes = u64::MAX;
        assert!(!BatchManifest::verify_batch(dir.path(), &rec).unwrap());

        rec.file = "bulk_0000.ndjson.gz".into();
        let mut enc =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        io::Write::write_all(&mut enc, b"x\n\n").unwrap();
        fs::write(dir.path().join(&rec.file), enc.finish().unwrap()).unwrap();
        assert!(!BatchManifest::verify_batch(dir.path(), &rec).unwrap());
    }
}
