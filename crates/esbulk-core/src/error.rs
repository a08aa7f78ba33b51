//! Error type for bulk body assembly

use std::fmt;

/// Boxed error returned by fallible [`BulkEntry`](crate::BulkEntry) queries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which entry query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Index,
    DocType,
    Id,
    Action,
    Document,
}

impl EntryField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::DocType => "type",
            Self::Id => "id",
            Self::Action => "action",
            Self::Document => "document",
        }
    }
}

impl fmt::Display for EntryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which line of a record failed to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPart {
    Header,
    Document,
}

impl fmt::Display for RecordPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Document => f.write_str("document"),
        }
    }
}

/// Error from appending to or sealing a [`BulkBody`](crate::BulkBody).
///
/// Only [`BulkError::Full`] raised by the budget check changes accumulator state
/// (the body is sealed). Every other variant leaves the state untouched.
#[derive(Debug)]
pub enum BulkError {
    /// No more operations can be added: sealed, or already at/over budget
    Full,
    /// An entry query failed
    Entry { field: EntryField, source: BoxError },
    /// Header or document could not be encoded as JSON
    Serialize {
        part: RecordPart,
        source: serde_json::Error,
    },
    /// The underlying sink rejected a write
    Io(std::io::Error),
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("no more operations can be added"),
            Self::Entry { field, source } => write!(f, "entry {field}: {source}"),
            Self::Serialize { part, source } => write!(f, "encode {part}: {source}"),
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for BulkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Full => None,
            Self::Entry { source, .. } => Some(source.as_ref()),
            Self::Serialize { source, .. } => Some(source),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for BulkError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl BulkError {
    /// Whether the body rejected the entry for capacity reasons.
    ///
    /// Callers usually react by draining the body and retrying the same entry.
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io::ErrorKind;

    #[test]
    fn full_display() {
        assert_eq!(
            BulkError::Full.to_string(),
            "no more operations can be added"
        );
        assert!(BulkError::Full.is_full());
    }

    #[test]
    fn entry_error_names_field() {
        let err = BulkError::Entry {
            field: EntryField::Id,
            source: "lookup failed".into(),
        };
        assert_eq!(err.to_string(), "entry id: lookup failed");
        assert!(!err.is_full());
        assert!(err.source().is_some());
    }

    #[test]
    fn io_from_conversion() {
        let err: BulkError = std::io::Error::new(ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, BulkError::Io(_)));
        assert!(err.to_string().contains("IO:"));
    }

    #[test]
    fn doc_type_field_label() {
        assert_eq!(EntryField::DocType.to_string(), "type");
    }

    #[test]
    fn serialize_error_names_part() {
        let bad_keys = std::collections::BTreeMap::from([((1u8, 2u8), 3u8)]);
        let source = serde_json::to_vec(&bad_keys).unwrap_err();
        let err = BulkError::Serialize {
            part: RecordPart::Document,
            source,
        };
        assert!(err.to_string().starts_with("encode document: "));
        assert!(err.source().is_some());
        assert!(!err.is_full());
    }
}
