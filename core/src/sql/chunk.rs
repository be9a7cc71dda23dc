use super::tokens::Token;
use crate::value::Value;
use std::borrow::Cow;

/// A SQL chunk represents a part of an SQL statement.
///
/// - `Token` - keywords and operators (select, from, =, etc.)
/// - `Ident` - quoted identifiers ("user")
/// - `Raw` - unquoted text (function calls, literal aliases)
/// - `Param` - a bound value, rendered as a placeholder
/// - `Column` - a table-qualified column ("user"."id")
#[derive(Debug, Clone, PartialEq)]
pub enum SQLChunk<'a> {
    Token(Token),

    /// Renders as: "name"
    Ident(Cow<'a, str>),

    /// Renders as-is
    Raw(Cow<'a, str>),

    /// Renders as: $n or ?, depending on the dialect
    Param(Value),

    /// Renders as: "table"."column"
    Column {
        table: Cow<'a, str>,
        column: Cow<'a, str>,
    },
}

impl<'a> SQLChunk<'a> {
    #[inline]
    pub const fn token(t: Token) -> Self {
        Self::Token(t)
    }

    #[inline]
    pub fn ident(name: impl Into<Cow<'a, str>>) -> Self {
        Self::Ident(name.into())
    }

    #[inline]
    pub fn raw(text: impl Into<Cow<'a, str>>) -> Self {
        Self::Raw(text.into())
    }

    #[inline]
    pub fn column(table: impl Into<Cow<'a, str>>, column: impl Into<Cow<'a, str>>) -> Self {
        Self::Column {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Write chunk content to buffer. Parameters are written by the caller,
    /// which owns placeholder numbering.
    pub(crate) fn write(&self, buf: &mut impl core::fmt::Write) {
        match self {
            SQLChunk::Token(token) => {
                let _ = buf.write_str(token.as_str());
            }
            SQLChunk::Ident(name) => write_ident(buf, name),
            SQLChunk::Raw(text) => {
                let _ = buf.write_str(text);
            }
            SQLChunk::Param(_) => {
                let _ = buf.write_char('?');
            }
            SQLChunk::Column { table, column } => {
                write_ident(buf, table);
                let _ = buf.write_char('.');
                write_ident(buf, column);
            }
        }
    }

    /// Word-like chunks need space separation from each other.
    #[inline]
    pub(crate) const fn is_word_like(&self) -> bool {
        match self {
            SQLChunk::Token(t) => !matches!(
                t,
                Token::LPAREN
                    | Token::RPAREN
                    | Token::COMMA
                    | Token::DOT
                    | Token::EQ
                    | Token::NE
                    | Token::LT
                    | Token::GT
                    | Token::LE
                    | Token::GE
            ),
            SQLChunk::Ident(_) | SQLChunk::Raw(_) | SQLChunk::Param(_) | SQLChunk::Column { .. } => {
                true
            }
        }
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
fn write_ident(buf: &mut impl core::fmt::Write, name: &str) {
    let _ = buf.write_char('"');
    if name.contains('"') {
        let _ = buf.write_str(&name.replace('"', "\"\""));
    } else {
        let _ = buf.write_str(name);
    }
    let _ = buf.write_char('"');
}

impl From<Token> for SQLChunk<'_> {
    #[inline]
    fn from(value: Token) -> Self {
        Self::Token(value)
    }
}

impl From<Value> for SQLChunk<'_> {
    #[inline]
    fn from(value: Value) -> Self {
        Self::Param(value)
    }
}
