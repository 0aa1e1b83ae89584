//! Statement classifier - locate the table a statement touches
//!
//! Table names are found by fixed keyword anchors and fixed offsets over the raw
//! statement text. Observations already stored were produced by exactly these
//! rules, so the offsets, the terminator set and the cleaning rules in
//! [`clean_table_name`] must stay as they are:
//!
//! * SELECT and DELETE anchor on the first `FROM`, INSERT on the first `INTO`;
//!   the name starts 5 bytes after the anchor, past any further spaces.
//! * UPDATE has no anchor; the name starts at byte 7, right after `UPDATE `.
//! * Keywords are matched case-sensitively and schema qualifiers are kept.

use std::ops::Range;

use crate::observation::{CommandKind, QueryType};

/// Longest table name captured from a statement, in bytes
pub const MAX_TABLE_NAME_LEN: usize = 255;

/// Offset from a `FROM`/`INTO` anchor to the table name
const ANCHOR_SKIP: usize = 5;

/// Offset from the start of an UPDATE statement to the table name
const UPDATE_SKIP: usize = 7;

/// Suffix left by the host on names it has already terminated
const NAME_SENTINEL: &str = "V\u{1C}";

/// Result of classifying a recognized statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification<'a> {
    pub query_type: QueryType,
    /// Cleaned table name, never empty
    pub table_name: &'a str,
    /// Byte range of the raw captured name within the statement
    pub table_span: Range<usize>,
}

/// Classify `statement`, reported by the host as `kind`.
///
/// Returns `None` when the kind is not observed or no table name can be
/// anchored; such statements are skipped without error.
pub fn classify(statement: &str, kind: CommandKind) -> Option<Classification<'_>> {
    let query_type = QueryType::from_command(kind)?;

    let name_start = match query_type {
        QueryType::Select | QueryType::Delete => statement.find("FROM")? + ANCHOR_SKIP,
        QueryType::Insert => statement.find("INTO")? + ANCHOR_SKIP,
        QueryType::Update => UPDATE_SKIP,
    };

    let table_span = capture_name(statement.as_bytes(), name_start)?;
    let raw = statement.get(table_span.clone())?;
    let table_name = clean_table_name(raw);

    if table_name.is_empty() {
        return None;
    }

    Some(Classification {
        query_type,
        table_name,
        table_span,
    })
}

/// Span of the name starting at `start`, after skipping leading spaces.
///
/// Whitespace, `;`, `,`, NUL and any byte outside printable ASCII end the name.
fn capture_name(bytes: &[u8], start: usize) -> Option<Range<usize>> {
    if start > bytes.len() {
        return None;
    }

    let mut begin = start;
    while begin < bytes.len() && bytes[begin] == b' ' {
        begin += 1;
    }

    let mut end = begin;
    while end < bytes.len() && end - begin < MAX_TABLE_NAME_LEN && is_name_byte(bytes[end]) {
        end += 1;
    }

    Some(begin..end)
}

fn is_name_byte(b: u8) -> bool {
    (32..=126).contains(&b) && !matches!(b, b' ' | b';' | b',')
}

/// Recover a bare identifier from a captured name.
///
/// A trailing `V` + `0x1C` pair is removed, then the name is cut at the first
/// backslash.
pub fn clean_table_name(raw: &str) -> &str {
    let name = raw.strip_suffix(NAME_SENTINEL).unwrap_or(raw);

    match name.find('\\') {
        Some(pos) => &name[..pos],
        None => name,
    }
}
