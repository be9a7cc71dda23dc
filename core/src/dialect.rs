//! SQL dialect selection and placeholder rendering.

use core::fmt::Write;
use serde::Deserialize;

/// SQL dialect for database-specific rendering.
///
/// Identifiers are always double-quoted (MySQL connections are expected to run
/// with `ANSI_QUOTES`), so the dialect only decides the placeholder syntax and
/// how inserted keys are reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL - uses `$1, $2, ...` numbered placeholders
    #[default]
    #[serde(alias = "postgres", alias = "pg")]
    PostgreSQL,

    /// MySQL - uses `?` positional placeholders
    MySQL,

    /// SQLite - uses `?` positional placeholders
    SQLite,
}

impl Dialect {
    /// Returns `true` if this dialect uses numbered placeholders (`$1, $2, ...`)
    #[inline]
    #[must_use]
    pub const fn uses_numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Returns `true` if inserted keys come back through `RETURNING`
    /// rather than a driver-reported last-insert id.
    #[inline]
    #[must_use]
    pub const fn supports_returning(&self) -> bool {
        matches!(self, Dialect::PostgreSQL)
    }

    /// Parse a dialect from a string (case-insensitive)
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("postgresql")
            || s.eq_ignore_ascii_case("postgres")
            || s.eq_ignore_ascii_case("pg")
        {
            Some(Dialect::PostgreSQL)
        } else if s.eq_ignore_ascii_case("mysql") {
            Some(Dialect::MySQL)
        } else if s.eq_ignore_ascii_case("sqlite") {
            Some(Dialect::SQLite)
        } else {
            None
        }
    }
}

/// Writes the placeholder for the given 1-based parameter index.
#[inline]
pub fn write_placeholder(dialect: Dialect, index: usize, buf: &mut impl Write) {
    if dialect.uses_numbered_placeholders() {
        let _ = write!(buf, "${}", index);
    } else {
        let _ = buf.write_char('?');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_follow_dialect() {
        let mut pg = String::new();
        write_placeholder(Dialect::PostgreSQL, 3, &mut pg);
        assert_eq!(pg, "$3");

        let mut my = String::new();
        write_placeholder(Dialect::MySQL, 3, &mut my);
        assert_eq!(my, "?");
    }

    #[test]
    fn parse_aliases() {
        assert_eq!(Dialect::parse("pg"), Some(Dialect::PostgreSQL));
        assert_eq!(Dialect::parse("MySQL"), Some(Dialect::MySQL));
        assert_eq!(Dialect::parse("oracle"), None);
    }
}
