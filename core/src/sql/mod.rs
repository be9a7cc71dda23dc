mod chunk;
mod tokens;

pub use chunk::*;
pub use tokens::*;

use crate::dialect::{Dialect, write_placeholder};
use crate::value::Value;
use core::fmt::{Display, Write};
use smallvec::SmallVec;
use std::borrow::Cow;

/// SQL text plus its positional parameters, ready to hand to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Display for Statement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, r#"sql: "{}", params: {:?}"#, self.sql, self.params)
    }
}

/// SQL fragment builder with flat chunk storage.
///
/// Uses `SmallVec<[SQLChunk; 8]>` for inline storage of typical SQL fragments
/// without heap allocation. Values are never interpolated into the text: each
/// one becomes a placeholder when the fragment is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SQL<'a> {
    pub chunks: SmallVec<[SQLChunk<'a>; 8]>,
}

impl<'a> SQL<'a> {
    // ==================== constructors ====================

    #[inline]
    pub const fn empty() -> Self {
        Self {
            chunks: SmallVec::new_const(),
        }
    }

    #[inline]
    pub fn token(t: Token) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Token(t)],
        }
    }

    /// Creates SQL with a quoted identifier
    #[inline]
    pub fn ident(name: impl Into<Cow<'a, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Ident(name.into())],
        }
    }

    /// Creates SQL with raw text (unquoted)
    #[inline]
    pub fn raw(text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Raw(text.into())],
        }
    }

    /// Creates SQL with a single parameter value
    #[inline]
    pub fn param(value: impl Into<Value>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::Param(value.into())],
        }
    }

    /// Creates SQL referencing `"table"."column"`
    #[inline]
    pub fn column(table: impl Into<Cow<'a, str>>, column: impl Into<Cow<'a, str>>) -> Self {
        Self {
            chunks: smallvec::smallvec![SQLChunk::column(table, column)],
        }
    }

    // ==================== builder methods ====================

    /// Append another SQL fragment (flat extend)
    #[inline]
    pub fn append(mut self, other: impl Into<SQL<'a>>) -> Self {
        self.append_mut(other);
        self
    }

    #[inline]
    pub fn append_mut(&mut self, other: impl Into<SQL<'a>>) {
        let other = other.into();
        if self.chunks.is_empty() {
            self.chunks = other.chunks;
        } else {
            self.chunks.extend(other.chunks);
        }
    }

    /// Push a single chunk
    #[inline]
    pub fn push(mut self, chunk: impl Into<SQLChunk<'a>>) -> Self {
        self.chunks.push(chunk.into());
        self
    }

    #[inline]
    pub fn push_mut(&mut self, chunk: impl Into<SQLChunk<'a>>) {
        self.chunks.push(chunk.into());
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    // ==================== combinators ====================

    /// Joins multiple SQL fragments with a separator
    pub fn join<T>(sqls: T, separator: Token) -> SQL<'a>
    where
        T: IntoIterator<Item = SQL<'a>>,
    {
        let mut iter = sqls.into_iter();
        let Some(mut result) = iter.next() else {
            return SQL::empty();
        };
        for item in iter {
            result.chunks.push(SQLChunk::Token(separator));
            result.chunks.extend(item.chunks);
        }
        result
    }

    /// Wrap in parentheses: (self)
    #[inline]
    pub fn parens(self) -> Self {
        SQL::token(Token::LPAREN).append(self).push(Token::RPAREN)
    }

    /// self as "name"
    pub fn alias(self, name: impl Into<Cow<'a, str>>) -> SQL<'a> {
        self.push(Token::AS).push(SQLChunk::Ident(name.into()))
    }

    /// Creates a comma-separated list of parameters.
    pub fn param_list<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let iter = values.into_iter();
        let (lower, _) = iter.size_hint();
        let mut chunks = SmallVec::with_capacity(lower.saturating_mul(2));
        for (i, v) in iter.enumerate() {
            if i > 0 {
                chunks.push(SQLChunk::Token(Token::COMMA));
            }
            chunks.push(SQLChunk::Param(v.into()));
        }
        SQL { chunks }
    }

    /// Creates a comma-separated list of column assignments: "col" = ?
    pub fn assignments<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Cow<'a, str>, Value)>,
    {
        let iter = pairs.into_iter();
        let (lower, _) = iter.size_hint();
        // Each assignment: Ident + EQ + Param = 3 chunks, plus commas
        let mut chunks = SmallVec::with_capacity(lower.saturating_mul(4));
        for (i, (col, val)) in iter.enumerate() {
            if i > 0 {
                chunks.push(SQLChunk::Token(Token::COMMA));
            }
            chunks.push(SQLChunk::Ident(col));
            chunks.push(SQLChunk::Token(Token::EQ));
            chunks.push(SQLChunk::Param(val));
        }
        SQL { chunks }
    }

    // ==================== output methods ====================

    /// Renders the SQL text and collects parameters in a single pass.
    pub fn build(self, dialect: Dialect) -> Statement {
        let mut chunks = self.chunks;
        let mut sql = String::with_capacity(chunks.len().saturating_mul(8).max(64));
        let mut params = Vec::new();

        for i in 0..chunks.len() {
            match &mut chunks[i] {
                SQLChunk::Param(value) => {
                    write_placeholder(dialect, params.len() + 1, &mut sql);
                    params.push(std::mem::take(value));
                }
                chunk => chunk.write(&mut sql),
            }
            if let Some(next) = chunks.get(i + 1)
                && chunk_needs_space(&chunks[i], next)
            {
                let _ = sql.write_char(' ');
            }
        }

        Statement { sql, params }
    }

    /// Renders the SQL text without consuming the fragment.
    pub fn sql(&self, dialect: Dialect) -> String {
        let mut buf = String::with_capacity(self.chunks.len().saturating_mul(8).max(64));
        let mut index = 1usize;
        for (i, chunk) in self.chunks.iter().enumerate() {
            match chunk {
                SQLChunk::Param(_) => {
                    write_placeholder(dialect, index, &mut buf);
                    index += 1;
                }
                _ => chunk.write(&mut buf),
            }
            if self.needs_space(i) {
                let _ = buf.write_char(' ');
            }
        }
        buf
    }

    /// Returns an iterator over parameter values in emission order
    pub fn params(&self) -> impl Iterator<Item = &Value> {
        self.chunks.iter().filter_map(|chunk| match chunk {
            SQLChunk::Param(value) => Some(value),
            _ => None,
        })
    }

    fn needs_space(&self, index: usize) -> bool {
        let Some(next) = self.chunks.get(index + 1) else {
            return false;
        };
        chunk_needs_space(&self.chunks[index], next)
    }
}

/// Canonical spacing logic for SQL chunk rendering.
pub(crate) fn chunk_needs_space(current: &SQLChunk<'_>, next: &SQLChunk<'_>) -> bool {
    // No space if current raw text ends with space
    if let SQLChunk::Raw(text) = current
        && text.ends_with(' ')
    {
        return false;
    }

    // No space if next raw text starts with space
    if let SQLChunk::Raw(text) = next
        && text.starts_with(' ')
    {
        return false;
    }

    match (current, next) {
        // No space before closing/separator punctuation
        (_, SQLChunk::Token(Token::RPAREN | Token::COMMA | Token::DOT)) => false,
        // No space after opening punctuation
        (SQLChunk::Token(Token::LPAREN | Token::DOT), _) => false,
        (SQLChunk::Token(Token::COMMA), _) => true,
        // e.g. ") from"
        (SQLChunk::Token(Token::RPAREN), next) => next.is_word_like(),
        // e.g. "in ("
        (current, SQLChunk::Token(Token::LPAREN)) => current.is_word_like(),
        (SQLChunk::Token(t), _) if t.is_operator() => true,
        (_, SQLChunk::Token(t)) if t.is_operator() => true,
        _ => current.is_word_like() && next.is_word_like(),
    }
}

// ==================== trait implementations ====================

impl From<Token> for SQL<'_> {
    fn from(value: Token) -> Self {
        SQL::token(value)
    }
}

impl<'a> From<SQLChunk<'a>> for SQL<'a> {
    fn from(value: SQLChunk<'a>) -> Self {
        Self {
            chunks: smallvec::smallvec![value],
        }
    }
}

impl<'a> FromIterator<SQLChunk<'a>> for SQL<'a> {
    fn from_iter<I: IntoIterator<Item = SQLChunk<'a>>>(iter: I) -> Self {
        Self {
            chunks: SmallVec::from_iter(iter),
        }
    }
}

impl<'a> IntoIterator for SQL<'a> {
    type Item = SQLChunk<'a>;
    type IntoIter = smallvec::IntoIter<[SQLChunk<'a>; 8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}
