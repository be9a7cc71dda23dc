/// SQL keywords and punctuation.
///
/// Keywords render in lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum Token {
    // keywords
    SELECT,
    FROM,
    WHERE,
    AND,
    OR,
    NOT,
    IN,
    IS,
    NULL,
    LIKE,
    AS,
    ON,
    INNER,
    LEFT,
    OUTER,
    JOIN,
    ORDER,
    BY,
    ASC,
    DESC,
    LIMIT,
    OFFSET,
    INSERT,
    INTO,
    VALUES,
    DEFAULT,
    UPDATE,
    SET,
    DELETE,
    RETURNING,
    TRUE,
    FALSE,

    // punctuation
    LPAREN,
    RPAREN,
    COMMA,
    DOT,
    STAR,

    // comparison
    EQ,
    NE,
    LT,
    GT,
    LE,
    GE,
}

impl Token {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Token::SELECT => "select",
            Token::FROM => "from",
            Token::WHERE => "where",
            Token::AND => "and",
            Token::OR => "or",
            Token::NOT => "not",
            Token::IN => "in",
            Token::IS => "is",
            Token::NULL => "null",
            Token::LIKE => "like",
            Token::AS => "as",
            Token::ON => "on",
            Token::INNER => "inner",
            Token::LEFT => "left",
            Token::OUTER => "outer",
            Token::JOIN => "join",
            Token::ORDER => "order",
            Token::BY => "by",
            Token::ASC => "asc",
            Token::DESC => "desc",
            Token::LIMIT => "limit",
            Token::OFFSET => "offset",
            Token::INSERT => "insert",
            Token::INTO => "into",
            Token::VALUES => "values",
            Token::DEFAULT => "default",
            Token::UPDATE => "update",
            Token::SET => "set",
            Token::DELETE => "delete",
            Token::RETURNING => "returning",
            Token::TRUE => "true",
            Token::FALSE => "false",
            Token::LPAREN => "(",
            Token::RPAREN => ")",
            Token::COMMA => ",",
            Token::DOT => ".",
            Token::STAR => "*",
            Token::EQ => "=",
            Token::NE => "<>",
            Token::LT => "<",
            Token::GT => ">",
            Token::LE => "<=",
            Token::GE => ">=",
        }
    }

    /// Comparison operators get a space on both sides.
    #[inline]
    pub const fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::EQ | Token::NE | Token::LT | Token::GT | Token::LE | Token::GE
        )
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
