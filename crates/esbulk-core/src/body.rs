//! Size-bounded bulk request body
//!
//! A [`BulkBody`] frames each [`BulkEntry`] as a header line and a document
//! line, and ends a batch with one extra newline when sealed:
//!
//! ```text
//! {"index":{"_index":"books","_type":"_doc","_id":"1"}}
//! {"title":"Dune"}
//! {"update":{"_index":"books","_type":"_doc","_id":"2"}}
//! {"doc":{"year":1965},"doc_as_upsert":true}
//!
//! ```
//!
//! The budget is a soft watermark: it is only compared against the bytes
//! already written, so the entry that crosses it is still accepted and the
//! next append seals the body instead.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use crate::entry::{Action, BulkEntry};
use crate::error::{BoxError, BulkError, EntryField, RecordPart};
use crate::size::ByteSize;

const NEWLINE: u8 = b'\n';

/// Byte sink a [`BulkBody`] writes into.
///
/// The body never clears its sink. Whoever drains it clears it, and the body
/// notices the empty sink on the next append.
pub trait BodyBuffer: Write {
    /// Bytes currently held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BodyBuffer for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

#[derive(Serialize)]
struct IndexHeader<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    doc_type: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

/// Update payload: apply `doc` as a partial update, or insert it if missing
#[derive(Serialize)]
struct UpsertDoc<'a> {
    doc: &'a Option<Value>,
    doc_as_upsert: bool,
}

/// Accumulates bulk records into a sink until the budget is reached.
///
/// States: open (`sealed == false`) and sealed. A sealed body rejects appends
/// with [`BulkError::Full`] until its sink has been emptied externally.
pub struct BulkBody<B = Vec<u8>> {
    buffer: B,
    max: ByteSize,
    sealed: bool,
    entries: usize,
}

impl<B: BodyBuffer> std::fmt::Debug for BulkBody<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkBody")
            .field("len", &self.buffer.len())
            .field("max", &self.max)
            .field("sealed", &self.sealed)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl BulkBody<Vec<u8>> {
    /// Empty in-memory body with the given budget
    pub fn new(max: ByteSize) -> Self {
        Self::with_buffer(Vec::new(), max)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Drain the body, leaving an empty sink behind.
    ///
    /// A sealed body stays sealed until the next append observes the empty sink.
    pub fn take(&mut self) -> Vec<u8> {
        self.entries = 0;
        std::mem::take(&mut self.buffer)
    }
}

impl<B: BodyBuffer> BulkBody<B> {
    pub fn with_buffer(buffer: B, max: ByteSize) -> Self {
        Self {
            buffer,
            max,
            sealed: false,
            entries: 0,
        }
    }

    /// Append one entry as a header line plus a document line.
    ///
    /// Fails with [`BulkError::Full`] when sealed, or when the sink already
    /// holds `max` bytes or more; in the latter case the body seals itself.
    /// Entry and encoding errors are returned before any byte is written.
    pub fn append<E: BulkEntry + ?Sized>(&mut self, entry: &E) -> Result<(), BulkError> {
        // Reset handshake: an emptied sink re-opens a sealed body
        if self.buffer.is_empty() {
            if self.sealed {
                log::trace!("bulk body drained, reopening");
                self.sealed = false;
            }
            self.entries = 0;
        }
        if self.sealed {
            return Err(BulkError::Full);
        }
        if self.buffer.len() as u64 >= self.max.as_u64() {
            log::debug!(
                "bulk body reached {} bytes (max {}), sealing after {} entries",
                self.buffer.len(),
                self.max,
                self.entries
            );
            self.seal()?;
            return Err(BulkError::Full);
        }

        let record = encode_record(entry)?;
        self.buffer.write_all(&record)?;
        self.entries += 1;
        Ok(())
    }

    /// Write the final newline and reject further appends. Idempotent.
    pub fn seal(&mut self) -> Result<(), BulkError> {
        if !self.sealed {
            self.buffer.write_all(&[NEWLINE])?;
            self.sealed = true;
        }
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Bytes currently in the sink
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Records appended since the sink was last observed empty
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn max(&self) -> ByteSize {
        self.max
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    /// Mutable access for draining and clearing the sink
    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub fn into_inner(self) -> B {
        self.buffer
    }
}

fn query<T>(field: EntryField, result: Result<T, BoxError>) -> Result<T, BulkError> {
    result.map_err(|source| BulkError::Entry { field, source })
}

/// Encode one framed record: header, newline, document, newline.
///
/// The header holds only strings and the document is a `serde_json::Value`,
/// whose object keys are always strings, so [`BulkError::Serialize`] is not
/// produced by encoding into memory today. It stays in the signature for
/// document types that can fail to serialize.
pub fn encode_record<E: BulkEntry + ?Sized>(entry: &E) -> Result<Vec<u8>, BulkError> {
    let index = query(EntryField::Index, entry.index())?;
    let doc_type = query(EntryField::DocType, entry.doc_type())?;
    let id = query(EntryField::Id, entry.id())?;
    let action = query(EntryField::Action, entry.action())?;

    let header = BTreeMap::from([(
        action.as_str(),
        IndexHeader {
            index: &index,
            doc_type: &doc_type,
            id: &id,
        },
    )]);
    let mut record = serde_json::to_vec(&header).map_err(|source| BulkError::Serialize {
        part: RecordPart::Header,
        source,
    })?;
    record.push(NEWLINE);

    let doc = query(EntryField::Document, entry.document())?;
    let encoded = if action == Action::Update {
        serde_json::to_writer(
            &mut record,
            &UpsertDoc {
                doc: &doc,
                doc_as_upsert: true,
            },
        )
    } else {
        serde_json::to_writer(&mut record, &doc)
    };
    encoded.map_err(|source| BulkError::Serialize {
        part: RecordPart::Document,
        source,
    })?;
    record.push(NEWLINE);

    Ok(record)
}
