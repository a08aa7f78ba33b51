//! esbulk core - size-bounded request bodies for document-store bulk APIs
//!
//! This crate assembles newline-delimited bulk payloads (index, create,
//! update and delete operations) without doing any network I/O. Callers
//! append [`BulkEntry`] values to a [`BulkBody`], seal it, drain the bytes for
//! transmission, and clear the sink to start the next batch.
//!
//! # Example
//!
//! ```
//! use esbulk_core::{BulkBody, ByteSize, Operation, Target};
//! use serde_json::json;
//!
//! let mut body = BulkBody::new(ByteSize::mb(5));
//! body.append(&Operation::Index(Target::new("books", "_doc", "1"), json!({"title": "Dune"})))?;
//! body.seal()?;
//!
//! let payload = body.take();
//! assert!(payload.ends_with(b"\n\n"));
//! # Ok::<(), esbulk_core::BulkError>(())
//! ```

pub mod body;
pub mod entry;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod progress;
pub mod shutdown;
pub mod sink;
pub mod size;

// Re-exports for convenience
pub use body::{BodyBuffer, BulkBody, encode_record};
pub use entry::{Action, BulkEntry, Operation, ParseActionError, Target};
pub use error::{BoxError, BulkError, EntryField, RecordPart};
pub use logging::{IndicatifLogger, init_logging};
pub use manifest::{BatchManifest, BatchRecord, MANIFEST_FILE};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use shutdown::{is_shutdown_requested, shutdown_flag};
pub use sink::{BatchFileSink, cleanup_tmp_files};
pub use size::{ByteSize, ParseSizeError};
