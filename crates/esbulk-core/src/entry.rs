//! Bulk entry contract and the built-in operation variants

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BoxError;

/// Bulk action, written as the single top-level key of a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Index,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Index => "index",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an [`Action`] name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseActionError(String);

impl fmt::Display for ParseActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown bulk action {:?} (expected create, index, update or delete)",
            self.0
        )
    }
}

impl std::error::Error for ParseActionError {}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "index" => Ok(Self::Index),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(ParseActionError(other.to_string())),
        }
    }
}

/// A value that can be appended to a [`BulkBody`](crate::BulkBody).
///
/// Every query may fail (e.g. an id computed from a remote lookup). The body
/// queries them in declaration order and aborts the append on the first error,
/// before anything is written.
pub trait BulkEntry {
    /// Target index name
    fn index(&self) -> Result<String, BoxError>;

    /// Target type label
    fn doc_type(&self) -> Result<String, BoxError>;

    /// Document id; empty lets the server assign one
    fn id(&self) -> Result<String, BoxError>;

    fn action(&self) -> Result<Action, BoxError>;

    /// Document payload. `None` is encoded as `null`.
    fn document(&self) -> Result<Option<Value>, BoxError>;
}

impl<T: BulkEntry + ?Sized> BulkEntry for &T {
    fn index(&self) -> Result<String, BoxError> {
        (**self).index()
    }

    fn doc_type(&self) -> Result<String, BoxError> {
        (**self).doc_type()
    }

    fn id(&self) -> Result<String, BoxError> {
        (**self).id()
    }

    fn action(&self) -> Result<Action, BoxError> {
        (**self).action()
    }

    fn document(&self) -> Result<Option<Value>, BoxError> {
        (**self).document()
    }
}

/// Routing fields shared by every [`Operation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub index: String,
    pub doc_type: String,
    pub id: String,
}

impl Target {
    pub fn new(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
        }
    }
}

/// Built-in bulk operations. Their queries never fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Insert or replace a document
    Index(Target, Value),
    /// Insert a document, failing server-side if the id exists
    Create(Target, Value),
    /// Partial update, inserting the document when missing
    Update(Target, Value),
    Delete(Target),
}

impl Operation {
    pub fn target(&self) -> &Target {
        match self {
            Self::Index(t, _) | Self::Create(t, _) | Self::Update(t, _) | Self::Delete(t) => t,
        }
    }

    pub fn kind(&self) -> Action {
        match self {
            Self::Index(..) => Action::Index,
            Self::Create(..) => Action::Create,
            Self::Update(..) => Action::Update,
            Self::Delete(_) => Action::Delete,
        }
    }

    pub fn doc(&self) -> Option<&Value> {
        match self {
            Self::Index(_, d) | Self::Create(_, d) | Self::Update(_, d) => Some(d),
            Self::Delete(_) => None,
        }
    }

    /// Build from an action name and optional document.
    ///
    /// Returns `None` when a document is required but missing.
    pub fn from_parts(action: Action, target: Target, doc: Option<Value>) -> Option<Self> {
        match (action, doc) {
            (Action::Delete, _) => Some(Self::Delete(target)),
            (Action::Index, Some(d)) => Some(Self::Index(target, d)),
            (Action::Create, Some(d)) => Some(Self::Create(target, d)),
            (Action::Update, Some(d)) => Some(Self::Update(target, d)),
            (_, None) => None,
        }
    }
}

impl BulkEntry for Operation {
    fn index(&self) -> Result<String, BoxError> {
        Ok(self.target().index.clone())
    }

    fn doc_type(&self) -> Result<String, BoxError> {
        Ok(self.target().doc_type.clone())
    }

    fn id(&self) -> Result<String, BoxError> {
        Ok(self.target().id.clone())
    }

    fn action(&self) -> Result<Action, BoxError> {
        Ok(self.kind())
    }

    fn document(&self) -> Result<Option<Value>, BoxError> {
        Ok(self.doc().cloned())
    }
}
