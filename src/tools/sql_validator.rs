//! SQL statement validation for read-only enforcement.
//!
//! `execute_query` only runs statements this module classifies as safe. The
//! check is a conservative token scan rather than a parse: it over-rejects
//! valid read-only SQL before it would let a write through.
//!
//! A statement is safe when all of the following hold:
//!
//! - once comments are stripped, its first token is the word `SELECT`;
//! - no word anywhere in the raw text (comment bodies and quoted text
//!   included) is a blocked keyword;
//! - it contains no `;` except one trailing terminator;
//! - it contains no nested or unterminated block comment, whose extent
//!   differs between dialects.
//!
//! Bound parameter values are never inspected; they are not part of the text.

use thiserror::Error;

use crate::error::{DbError, DbResult};

/// Keywords that reject a statement wherever they appear as a word.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "GRANT", "REVOKE",
    // SELECT ... INTO creates a table; the rest write or run code.
    "INTO", "MERGE", "COPY", "CALL", "EXECUTE",
];

/// Why a statement was classified unsafe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("query is empty")]
    Empty,

    #[error("only SELECT statements are allowed (statement begins with '{found}')")]
    NotSelect { found: String },

    #[error("keyword '{keyword}' is not allowed")]
    BlockedKeyword { keyword: &'static str },

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("nested block comments are not allowed")]
    NestedComment,

    #[error("unterminated block comment")]
    UnterminatedComment,
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Safe,
    Unsafe(Rejection),
}

impl Classification {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

/// Classify `sql` as safe or unsafe to run.
///
/// # Examples
///
/// ```
/// use db_analyzer_mcp::tools::sql_validator::{classify, Classification};
///
/// assert_eq!(classify("SELECT * FROM accounts WHERE id = $1"), Classification::Safe);
/// assert!(!classify("SELECT 1; DROP TABLE users;").is_safe());
/// ```
pub fn classify(sql: &str) -> Classification {
    match check(sql) {
        Ok(()) => Classification::Safe,
        Err(rejection) => Classification::Unsafe(rejection),
    }
}

/// Like [`classify`], but returns `DbError::Rejected` for unsafe input.
pub fn ensure_safe(sql: &str) -> DbResult<()> {
    check(sql).map_err(|rejection| DbError::rejected(rejection.to_string()))
}

fn check(sql: &str) -> Result<(), Rejection> {
    let stripped = strip_comments(sql)?;

    let first = match first_token(&stripped) {
        Some(token) => token,
        None => return Err(Rejection::Empty),
    };
    if !first.eq_ignore_ascii_case("SELECT") {
        return Err(Rejection::NotSelect {
            found: first.chars().take(32).collect(),
        });
    }

    if has_inner_separator(sql) {
        return Err(Rejection::MultipleStatements);
    }

    if let Some(keyword) = find_blocked_keyword(sql) {
        return Err(Rejection::BlockedKeyword { keyword });
    }

    Ok(())
}

/// Replace every comment with a single space.
///
/// String literals, quoted identifiers and dollar-quoted bodies are copied
/// through untouched so comment markers inside them are not mistaken for
/// comments.
pub fn strip_comments(sql: &str) -> Result<String, Rejection> {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                let backslash_escapes = quote == b'\'' && is_escape_string(bytes, i);
                let end = quoted_end(bytes, i, quote, backslash_escapes);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                // Line comment
                out.push(' ');
                i += 2;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = block_comment_end(bytes, i)?;
                out.push(' ');
            }
            b'$' => {
                // Postgres dollar-quoted strings: $tag$ ... $tag$
                match dollar_quote_end(sql, i) {
                    Some(end) => {
                        out.push_str(&sql[i..end]);
                        i = end;
                    }
                    None => {
                        out.push('$');
                        i += 1;
                    }
                }
            }
            _ => {
                let ch = sql[i..].chars().next().unwrap_or('\0');
                out.push(ch);
                i += ch.len_utf8();
            }
        }
    }

    Ok(out)
}

/// `E'...'` strings treat backslash as an escape character.
fn is_escape_string(bytes: &[u8], quote_pos: usize) -> bool {
    if quote_pos == 0 || !matches!(bytes[quote_pos - 1], b'e' | b'E') {
        return false;
    }
    quote_pos == 1 || !is_identifier_byte(bytes[quote_pos - 2])
}

/// Index just past the closing quote; the end of input when unterminated.
fn quoted_end(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            // Doubled quote is an escaped quote
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn block_comment_end(bytes: &[u8], start: usize) -> Result<usize, Rejection> {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'*', b'/') => return Ok(i + 2),
            // Postgres nests block comments, SQLite does not.
            (b'/', b'*') => return Err(Rejection::NestedComment),
            _ => i += 1,
        }
    }
    Err(Rejection::UnterminatedComment)
}

fn dollar_quote_end(sql: &str, start: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    // `$` inside an identifier (foo$bar) or a positional parameter ($1)
    if start > 0 && is_identifier_byte(bytes[start - 1]) {
        return None;
    }
    let mut j = start + 1;
    if j < bytes.len() && (bytes[j].is_ascii_alphabetic() || bytes[j] == b'_') {
        while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
            j += 1;
        }
    }
    if bytes.get(j) != Some(&b'$') {
        return None;
    }
    let tag = &sql[start..=j];
    let body_start = j + 1;
    // Unterminated bodies run to the end of input, as in Postgres.
    let end = sql[body_start..]
        .find(tag)
        .map(|rel| body_start + rel + tag.len())
        .unwrap_or(sql.len());
    Some(end)
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// First token of comment-free text: a maximal identifier-like run, or the
/// single character that starts the text when that is not an identifier.
fn first_token(stripped: &str) -> Option<&str> {
    let text = stripped.trim_start();
    let first = text.chars().next()?;
    let end = text
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$' || !c.is_ascii()))
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    if end == 0 {
        Some(&text[..first.len_utf8()])
    } else {
        Some(&text[..end])
    }
}

/// A `;` followed by anything but whitespace.
fn has_inner_separator(sql: &str) -> bool {
    let trimmed = sql.trim_end();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    body.contains(';')
}

/// Scan every ASCII word in the raw text, comment bodies and quoted text
/// included.
fn find_blocked_keyword(sql: &str) -> Option<&'static str> {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map(|word| word.trim_start_matches(|c: char| c.is_ascii_digit()))
        .filter(|word| !word.is_empty())
        .find_map(|word| {
            BLOCKED_KEYWORDS
                .iter()
                .copied()
                .find(|kw| word.eq_ignore_ascii_case(kw))
        })
}
