//! Log field conventions for datastore events.
//!
//! Statement text is logged through `StatementLog`, which strips literal
//! values and caps the length so credentials typed into ad-hoc SQL do not
//! end up in log files.

/// Datastore system identifier used in log fields.
pub const DB_SYSTEM: &str = "mysql";

/// Tracing targets for datastore events.
pub mod targets {
    /// Session establishment and teardown.
    pub const CONNECT: &str = "chat_store::connect";
    /// Statement execution.
    pub const EXECUTE: &str = "chat_store::execute";
}

/// How statement text is rendered into log fields.
#[derive(Debug, Clone)]
pub(crate) struct StatementLog {
    /// Replace literal values with `?`.
    pub(crate) redact_literals: bool,
    /// Maximum rendered length in bytes.
    pub(crate) max_length: usize,
}

impl Default for StatementLog {
    fn default() -> Self {
        Self {
            redact_literals: true,
            max_length: 512,
        }
    }
}

impl StatementLog {
    /// Render SQL for a log field.
    #[must_use]
    pub(crate) fn render(&self, sql: &str) -> String {
        let text = if self.redact_literals {
            redact_literals(sql)
        } else {
            sql.to_string()
        };
        truncate(text, self.max_length)
    }
}

/// Replace quoted strings and bare numbers with `?`.
fn redact_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut prev_word = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                // Consume up to the closing quote; a doubled quote is an escape.
                while let Some(inner) = chars.next() {
                    if inner == c {
                        if chars.peek() == Some(&c) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                out.push('?');
                prev_word = false;
            }
            d if d.is_ascii_digit() && !prev_word => {
                while chars.next_if(|n| n.is_ascii_digit() || *n == '.').is_some() {}
                out.push('?');
            }
            other => {
                prev_word = other.is_alphanumeric() || other == '_';
                out.push(other);
            }
        }
    }

    out
}

fn truncate(mut text: String, max_len: usize) -> String {
    if text.len() <= max_len {
        return text;
    }
    let mut cut = max_len.saturating_sub(3);
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("...");
    text
}

/// Leading SQL keyword, upper-cased, for the `db_operation` field.
#[must_use]
pub fn operation_kind(sql: &str) -> &'static str {
    let keyword = sql.split_whitespace().next().unwrap_or_default();
    const KINDS: [&str; 6] = ["SELECT", "INSERT", "UPDATE", "DELETE", "REPLACE", "CALL"];
    KINDS
        .into_iter()
        .find(|kind| keyword.eq_ignore_ascii_case(kind))
        .unwrap_or("OTHER")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_kind() {
        assert_eq!(operation_kind("SELECT 1"), "SELECT");
        assert_eq!(operation_kind("  insert into t values (?)"), "INSERT");
        assert_eq!(operation_kind("UPDATE Authentication SET"), "UPDATE");
        assert_eq!(operation_kind(""), "OTHER");
        assert_eq!(operation_kind("SHOW TABLES"), "OTHER");
    }

    #[test]
    fn test_redacts_literals() {
        let log = StatementLog::default();
        assert_eq!(
            log.render("SELECT * FROM Authentication WHERE username = 'alice' AND uuid = 42"),
            "SELECT * FROM Authentication WHERE username = ? AND uuid = ?"
        );
        assert_eq!(log.render("SELECT 'O''Brien'"), "SELECT ?");
        // Digits inside identifiers are kept.
        assert_eq!(log.render("SELECT col1 FROM t2"), "SELECT col1 FROM t2");
    }

    #[test]
    fn test_placeholders_untouched() {
        let log = StatementLog::default();
        let sql = "UPDATE Authentication SET password = ? WHERE username = ? AND email = ?";
        assert_eq!(log.render(sql), sql);
    }

    #[test]
    fn test_truncates() {
        let log = StatementLog {
            redact_literals: false,
            max_length: 8,
        };
        assert_eq!(log.render("SELECT 1 FROM dual"), "SELEC...");
        assert_eq!(log.render("SELECT 1"), "SELECT 1");
    }
}
