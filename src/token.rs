use std::fmt;

/// A lexeme of the source text, tagged with its kind.
///
/// Tokens borrow their text from the source buffer, hence they can't outlive
/// it. The end offset is derived from the text's length.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    lo: usize,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, text: &'src str, lo: usize) -> Token<'src> {
        Token { kind, text, lo }
    }

    /// Byte offset of the first character of the token.
    pub fn begin(&self) -> usize {
        self.lo
    }

    /// Byte offset one past the last character of the token.
    pub fn end(&self) -> usize {
        self.lo + self.text.len()
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({:?}, {:?}, {}..{})",
            self.kind,
            self.text,
            self.begin(),
            self.end()
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Namespace,
    Import,
    Class,
    /// `func`
    Function,
    Foreign,
    Public,
    Private,
    Static,
    /// `local`, declares a variable.
    Local,
    /// `self`
    This,
    Return,
    If,
    Else,
    While,
    For,
    In,
    True,
    False,
    Null,
    Constant,

    Name,
    LiteralInt,
    LiteralFloat,
    /// The token text excludes the surrounding quotes.
    LiteralString,

    Comma,
    Period,
    Semicolon,
    OpeningCurlyBraces,
    ClosingCurlyBraces,
    OpeningParentheses,
    ClosingParentheses,
    OpeningSquareBrackets,
    ClosingSquareBrackets,
    /// `#`, precedes a type name.
    TypeRef,
    /// `@`
    AttributeMarker,

    Plus,
    Hyphen,
    Asterisk,
    ForwardSlash,
    Modulo,
    /// `^^`
    Exponential,
    Caret,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Equal,
    NotEqual,
    Assign,
    Not,
    Tilde,
    Pipe,
    Ampersand,
    LogicalOr,
    LogicalAnd,
    /// `^|`
    Xor,
    /// `~&`
    Nand,
    Increment,
    Decrement,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Namespace
                | Import
                | Class
                | Function
                | Foreign
                | Public
                | Private
                | Static
                | Local
                | This
                | Return
                | If
                | Else
                | While
                | For
                | In
                | True
                | False
                | Null
                | Constant
        )
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "namespace" => TokenKind::Namespace,
    "import" => TokenKind::Import,
    "class" => TokenKind::Class,
    "func" => TokenKind::Function,
    "foreign" => TokenKind::Foreign,
    "public" => TokenKind::Public,
    "private" => TokenKind::Private,
    "static" => TokenKind::Static,
    "local" => TokenKind::Local,
    "self" => TokenKind::This,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
    "constant" => TokenKind::Constant,
};

/// Two-character operators. These always win over their single-character
/// prefix.
pub static COMPOUND_SYMBOLS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "==" => TokenKind::Equal,
    "!=" => TokenKind::NotEqual,
    "<=" => TokenKind::LessThanOrEqual,
    ">=" => TokenKind::GreaterThanOrEqual,
    "++" => TokenKind::Increment,
    "--" => TokenKind::Decrement,
    "^^" => TokenKind::Exponential,
    "||" => TokenKind::LogicalOr,
    "^|" => TokenKind::Xor,
    "&&" => TokenKind::LogicalAnd,
    "~&" => TokenKind::Nand,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_derived_from_text() {
        let src = "a <= b";
        let token = Token::new(TokenKind::LessThanOrEqual, &src[2..4], 2);
        assert_eq!(token.begin(), 2);
        assert_eq!(token.end(), 4);
        assert_eq!(format!("{token:?}"), r#"Token(LessThanOrEqual, "<=", 2..4)"#);
    }

    #[test]
    fn test_keyword_table() {
        for (text, kind) in &KEYWORDS {
            assert!(kind.is_keyword(), "{text} maps to non-keyword {kind:?}");
        }
        assert_eq!(KEYWORDS.get("self"), Some(&TokenKind::This));
        assert_eq!(KEYWORDS.get("func"), Some(&TokenKind::Function));
        assert_eq!(KEYWORDS.get("i32"), None);
        assert_eq!(KEYWORDS.get("Class"), None);
    }
}
