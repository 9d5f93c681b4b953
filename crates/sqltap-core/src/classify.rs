//! SQL statement classification.
//!
//! Classification looks only at the leading keyword of a statement, after
//! skipping leading whitespace and comments (`--` line, `#` line, `/* */`
//! block). It is deliberately shallow: the capture layer needs to know
//! whether a statement writes, changes schema, calls a procedure, or
//! switches databases — nothing more.
//!
//! Classification is best-effort and never fails: input that cannot be
//! parsed yields [`StatementKind::Other`].

use regex::Regex;
use std::sync::LazyLock;

static LEADING_COMMENTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\A\s*(?:--[^\n]*\n|#[^\n]*\n|/\*.*?\*/\s*)*").unwrap());

static FIRST_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\s*([A-Za-z]+)\b").unwrap());

static USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\Ause\s+(?:`([^`]+)`|([A-Za-z0-9_]+))\s*;?\s*\z").unwrap());

/// Coarse statement category derived from the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// `INSERT`, `UPDATE`, `DELETE`, `REPLACE`
    Write,
    /// `CREATE`, `ALTER`, `DROP`, `TRUNCATE`, `RENAME`
    Ddl,
    /// `CALL`
    Call,
    /// `USE`
    Use,
    /// Anything else, including unparsable input
    Other,
}

fn strip_leading_comments(sql: &str) -> String {
    LEADING_COMMENTS_RE.replace(sql, "").trim().to_string()
}

/// Extract the lower-cased leading keyword of a statement, skipping
/// leading whitespace and comments.
pub fn leading_keyword(sql: &str) -> Option<String> {
    if sql.is_empty() {
        return None;
    }
    let stripped = strip_leading_comments(sql);
    FIRST_WORD_RE
        .captures(&stripped)
        .map(|caps| caps[1].to_ascii_lowercase())
}

/// Classify a statement by its leading keyword.
pub fn classify(sql: &str) -> StatementKind {
    match leading_keyword(sql).as_deref() {
        Some("insert" | "update" | "delete" | "replace") => StatementKind::Write,
        Some("create" | "alter" | "drop" | "truncate" | "rename") => StatementKind::Ddl,
        Some("call") => StatementKind::Call,
        Some("use") => StatementKind::Use,
        _ => StatementKind::Other,
    }
}

/// Extract the target database of a `USE` statement.
///
/// Accepts a backtick-quoted or bare identifier with an optional trailing
/// semicolon, tolerating one leading block comment (as produced by inline
/// debug prefixing). Returns `None` for anything else.
pub fn parse_use_database(sql: &str) -> Option<String> {
    let mut s = sql.trim();
    if let Some(rest) = s.strip_prefix("/*") {
        if let Some(idx) = rest.find("*/") {
            s = rest[idx + 2..].trim_start();
        }
    }
    let caps = USE_RE.captures(s)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}
