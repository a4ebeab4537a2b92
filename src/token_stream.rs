use std::fmt;

use crate::{
    token::{Token, TokenKind},
    util::line_column,
};

/// A cursor over a token sequence. End of stream is a regular state: past the
/// last token, [`TokenStream::current`] returns `None`.
pub struct TokenStream<'src, 'tok> {
    src: &'src str,
    tokens: &'tok [Token<'src>],
    cursor: usize,
}

impl<'src, 'tok> TokenStream<'src, 'tok> {
    pub fn new(src: &'src str, tokens: &'tok [Token<'src>]) -> TokenStream<'src, 'tok> {
        TokenStream {
            src,
            tokens,
            cursor: 0,
        }
    }

    pub fn src(&self) -> &'src str {
        self.src
    }

    /// Returns the current token.
    pub fn current(&self) -> Option<Token<'src>> {
        self.peek(0)
    }

    /// Returns the token `n` positions ahead of the current one.
    pub fn peek(&self, n: usize) -> Option<Token<'src>> {
        self.tokens.get(self.cursor + n).copied()
    }

    /// Returns the current token and advances.
    pub fn advance(&mut self) -> Option<Token<'src>> {
        let c = self.current();
        if c.is_some() {
            self.cursor += 1;
        }
        c
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    /// Checks whether the current token matches the given one.
    pub fn is(&self, expect: TokenKind) -> bool {
        self.current().is_some_and(|t| t.kind == expect)
    }

    /// Checks whether the token `n` positions ahead matches the given one.
    pub fn is_at(&self, n: usize, expect: TokenKind) -> bool {
        self.peek(n).is_some_and(|t| t.kind == expect)
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    pub fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails without advancing.
    pub fn expect(&mut self, expect: TokenKind) -> Result<Token<'src>, UnexpectedTokenError<'src>> {
        match self.current() {
            Some(token) if token.kind == expect => {
                self.cursor += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(Some(expect))),
        }
    }

    /// Builds an error for the current token (or for the end of the stream),
    /// locating it in the source.
    pub fn unexpected(&self, expected: Option<TokenKind>) -> UnexpectedTokenError<'src> {
        let token = self.current();
        let offset = token.map_or(self.src.len(), |t| t.begin());
        let at = line_column(self.src, offset);
        UnexpectedTokenError {
            token,
            expected,
            line: at.line,
            column: at.column,
        }
    }
}

/// The parser found a token (or the end of the stream, if `token` is `None`)
/// which doesn't fit the grammar at that position.
#[derive(Clone, Debug, PartialEq)]
pub struct UnexpectedTokenError<'src> {
    pub token: Option<Token<'src>>,
    pub expected: Option<TokenKind>,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for UnexpectedTokenError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: ", self.line, self.column)?;
        match self.expected {
            Some(expected) => write!(f, "expected token {expected:?}, but got ")?,
            None => write!(f, "unexpected ")?,
        }
        match self.token {
            Some(token) => write!(f, "{:?} `{}`", token.kind, token.text),
            None => write!(f, "end of input"),
        }
    }
}

impl std::error::Error for UnexpectedTokenError<'_> {}
