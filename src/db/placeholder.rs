//! Query parameter placeholders.
//!
//! The facade writes SQL with a configurable token (default `?`). Adapters rewrite it
//! into the backend's native form right before dispatch.

use crate::config::DEFAULT_QUERY_PLACEHOLDER;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use std::borrow::Cow;

/// Native parameter syntax of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` (MySQL, SQLite)
    QuestionMark,
    /// `$1`, `$2`, ... (PostgreSQL)
    Numbered,
}

impl PlaceholderStyle {
    pub fn for_database(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::MySQL | DatabaseType::SQLite => Self::QuestionMark,
            DatabaseType::PostgreSQL => Self::Numbered,
        }
    }
}

/// Validate a placeholder token. An empty token selects the default.
pub fn validate_placeholder(placeholder: &str) -> DbResult<String> {
    if placeholder.is_empty() {
        return Ok(DEFAULT_QUERY_PLACEHOLDER.to_string());
    }
    if placeholder
        .chars()
        .any(|c| c.is_whitespace() || c == '\'' || c == '"' || c == '`')
    {
        return Err(DbError::invalid_argument(
            "placeholder",
            "a token without whitespace or quote characters",
        ));
    }
    Ok(placeholder.to_string())
}

/// Where the scanner is inside the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Rewrite every `placeholder` in executable SQL into the backend's native syntax.
///
/// Quoted literals and identifiers, `--` and `/* */` comments (plus `#` comments on
/// MySQL) are copied verbatim. MySQL also treats `\` inside quotes as an escape.
pub fn rewrite_placeholders<'a>(
    sql: &'a str,
    placeholder: &str,
    db_type: DatabaseType,
) -> Cow<'a, str> {
    let style = PlaceholderStyle::for_database(db_type);
    if placeholder.is_empty()
        || !sql.contains(placeholder)
        || (style == PlaceholderStyle::QuestionMark && placeholder == "?")
    {
        return Cow::Borrowed(sql);
    }

    let mysql = db_type == DatabaseType::MySQL;
    let mut out = String::with_capacity(sql.len() + 8);
    let mut state = Scan::Code;
    let mut index = 0usize;
    let mut rest = sql;

    while let Some(c) = rest.chars().next() {
        // bytes copied verbatim this step
        let mut take = c.len_utf8();
        match state {
            Scan::Quoted(q) => {
                if c == '\\' && mysql && q != '`' {
                    take += rest[1..].chars().next().map_or(0, char::len_utf8);
                } else if c == q {
                    state = Scan::Code;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if rest.starts_with("*/") {
                    take = 2;
                    state = Scan::Code;
                }
            }
            Scan::Code if rest.starts_with(placeholder) => {
                index += 1;
                match style {
                    PlaceholderStyle::QuestionMark => out.push('?'),
                    PlaceholderStyle::Numbered => {
                        out.push('$');
                        out.push_str(&index.to_string());
                    }
                }
                rest = &rest[placeholder.len()..];
                continue;
            }
            Scan::Code => {
                if matches!(c, '\'' | '"' | '`') {
                    state = Scan::Quoted(c);
                } else if starts_line_comment(rest, mysql) {
                    state = Scan::LineComment;
                } else if rest.starts_with("/*") {
                    take = 2;
                    state = Scan::BlockComment;
                }
            }
        }
        out.push_str(&rest[..take]);
        rest = &rest[take..];
    }

    Cow::Owned(out)
}

/// MySQL needs whitespace after `--` and also accepts `#`.
fn starts_line_comment(rest: &str, mysql: bool) -> bool {
    if mysql {
        rest.starts_with('#')
            || (rest.starts_with("--") && rest[2..].chars().next().is_none_or(char::is_whitespace))
    } else {
        rest.starts_with("--")
    }
}
