//! Newline-delimited operation input
//!
//! One JSON object per line:
//!
//! ```text
//! {"action": "index", "index": "books", "type": "_doc", "id": "1", "doc": {"title": "Dune"}}
//! {"action": "delete", "index": "books", "id": 2}
//! ```
//!
//! `type` falls back to the configured default, `id` to empty (server-assigned),
//! and `doc` is required for every action except `delete`.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use esbulk_core::{Action, Operation, Target};
use serde::Deserialize;
use serde_json::Value;

/// Read buffer for input files (256KB)
const INPUT_BUF_SIZE: usize = 256 * 1024;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputLine {
    action: Action,
    index: String,
    #[serde(rename = "type")]
    doc_type: Option<String>,
    #[serde(default)]
    id: Value,
    doc: Option<Value>,
}

/// Open a file, or stdin for `None` / `-`.
pub fn open(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        None => Ok(Box::new(io::stdin().lock())),
        Some(p) if p.as_os_str() == "-" => Ok(Box::new(io::stdin().lock())),
        Some(p) => {
            let file =
                File::open(p).with_context(|| format!("Failed to open input: {}", p.display()))?;
            Ok(Box::new(BufReader::with_capacity(INPUT_BUF_SIZE, file)))
        }
    }
}

/// Parse one input line into an [`Operation`].
pub fn parse_line(line: &str, default_type: &str) -> Result<Operation> {
    let raw: InputLine = serde_json::from_str(line).context("invalid operation JSON")?;

    let id = match raw.id {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => bail!("id must be a string or number, got {other}"),
    };
    if raw.index.is_empty() {
        bail!("index must not be empty");
    }

    let target = Target {
        index: raw.index,
        doc_type: raw.doc_type.unwrap_or_else(|| default_type.to_string()),
        id,
    };
    let action = raw.action;
    if action == Action::Delete && raw.doc.is_some() {
        log::debug!("ignoring doc on delete of {}/{}", target.index, target.id);
    }
    Operation::from_parts(action, target, raw.doc)
        .ok_or_else(|| anyhow!("{action} requires a doc"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_index_line() {
        let op = parse_line(
            r#"{"action":"index","index":"books","type":"book","id":"1","doc":{"t":"Dune"}}"#,
            "_doc",
        )
        .unwrap();
        assert_eq!(
            op,
            Operation::Index(Target::new("books", "book", "1"), json!({"t": "Dune"}))
        );
    }

    #[test]
    fn defaults_type_and_id() {
        let op = parse_line(r#"{"action":"create","index":"logs","doc":{}}"#, "event").unwrap();
        assert_eq!(op.target(), &Target::new("logs", "event", ""));
        assert_eq!(op.kind(), Action::Create);
    }

    #[test]
    fn numeric_id() {
        let op = parse_line(r#"{"action":"delete","index":"books","id":42}"#, "_doc").unwrap();
        assert_eq!(op, Operation::Delete(Target::new("books", "_doc", "42")));
    }

    #[test]
    fn missing_doc_rejected() {
        let err = parse_line(r#"{"action":"update","index":"books","id":"1"}"#, "_doc")
            .unwrap_err();
        assert_eq!(err.to_string(), "update requires a doc");
    }

    #[test]
    fn unknown_action_rejected() {
        assert!(parse_line(r#"{"action":"upsert","index":"b","doc":{}}"#, "_doc").is_err());
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(parse_line(r#"{"action":"index","index":"b","doc":{},"ttl":5}"#, "_doc").is_err());
    }

    #[test]
    fn bad_id_type_rejected() {
        let err = parse_line(r#"{"action":"index","index":"b","id":[1],"doc":{}}"#, "_doc")
            .unwrap_err();
        assert!(err.to_string().contains("id must be"));
    }

    #[test]
    fn empty_index_rejected() {
        assert!(parse_line(r#"{"action":"index","index":"","doc":{}}"#, "_doc").is_err());
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open(Some(&dir.path().join("nope.ndjson"))).err().unwrap();
        assert!(format!("{err}").contains("nope.ndjson"));
    }
}
