use std::fmt;

use tracing::debug;

use crate::{
    stream::CharStream,
    token::{Token, TokenKind, COMPOUND_SYMBOLS, KEYWORDS},
};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Tokenizes the provided string, producing the tokens into the provided
/// buffer. Whitespace and comments produce no tokens.
pub fn tokenize_into<'src>(
    src: &'src str,
    tokens: &mut Vec<Token<'src>>,
) -> Result<(), TokenizerError> {
    Tokenizer::new(src, tokens).tokenize()
}

/// A convenience function that allocates a new buffer per tokenized input and
/// returns it.
pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, TokenizerError> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY.min(src.len() / 2 + 1));
    tokenize_into(src, &mut tokens)?;
    Ok(tokens)
}

/// The Moth tokenizer
struct Tokenizer<'src, 'tok> {
    stream: CharStream<'src>,
    tokens: &'tok mut Vec<Token<'src>>,
}

impl<'src> Tokenizer<'src, '_> {
    fn new<'tok>(src: &'src str, tokens: &'tok mut Vec<Token<'src>>) -> Tokenizer<'src, 'tok> {
        Tokenizer {
            stream: CharStream::new(src),
            tokens,
        }
    }

    /// Scans the source string until the input is exhausted.
    fn tokenize(mut self) -> Result<(), TokenizerError> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        while let Some(c) = self.stream.current() {
            match c {
                '\n' | '\r' | '\t' | ' ' => {
                    self.stream.move_next();
                }
                '/' if self.stream.next() == Some('/') => self.line_comment(),
                '"' => self.string()?,
                c if c == '_' || c.is_alphabetic() => self.identifier_or_keyword(),
                c if c.is_ascii_digit() => self.number()?,
                c => self.symbol(c)?,
            }
        }
        debug!(
            tokens = self.tokens.len(),
            bytes = self.stream.src().len(),
            "tokenized source"
        );
        Ok(())
    }

    fn line_comment(&mut self) {
        let comment = self.stream.peek_while(|c| c != '\n');
        self.stream.advance_by(comment.len());
    }

    fn identifier_or_keyword(&mut self) {
        let word = self
            .stream
            .peek_while(|c| c == '_' || c.is_alphanumeric());
        let kind = KEYWORDS.get(word).copied().unwrap_or(TokenKind::Name);
        self.produce(kind, word);
    }

    /// Scans a run of digits and dots. A single dot makes the literal a
    /// float; a second one is an error reported at that dot.
    fn number(&mut self) -> Result<(), TokenizerError> {
        let literal = self.stream.peek_while(|c| c.is_ascii_digit() || c == '.');
        let mut dots = literal.match_indices('.').map(|(at, _)| at);
        let kind = match (dots.next(), dots.next()) {
            (None, _) => TokenKind::LiteralInt,
            (Some(_), None) => TokenKind::LiteralFloat,
            (Some(_), Some(second)) => {
                self.stream.advance_by(second);
                return Err(self.error(TokenizerErrorReason::MalformedNumber));
            }
        };
        self.produce(kind, literal);
        Ok(())
    }

    /// Scans a string literal. Escapes are kept verbatim: the backslash and
    /// the character following it are both part of the token text, and
    /// neither is interpreted.
    fn string(&mut self) -> Result<(), TokenizerError> {
        let quote = self.stream.position();
        self.stream.move_next();
        let start = self.stream.position();
        loop {
            match self.stream.current() {
                None => {
                    self.stream.set_position(quote);
                    return Err(self.error(TokenizerErrorReason::UnterminatedString));
                }
                Some('\\') => {
                    self.stream.move_next();
                    self.stream.move_next();
                }
                Some('"') => break,
                Some(_) => {
                    self.stream.move_next();
                }
            }
        }
        let end = self.stream.position();
        let text = &self.stream.src()[start..end];
        self.tokens.push(Token::new(TokenKind::LiteralString, text, start));
        // Closing quote.
        self.stream.move_next();
        Ok(())
    }

    fn symbol(&mut self, c: char) -> Result<(), TokenizerError> {
        use TokenKind::*;

        let pair = self.stream.peek(2);
        if let Some(&kind) = COMPOUND_SYMBOLS.get(pair) {
            self.produce(kind, pair);
            return Ok(());
        }

        let kind = match c {
            ',' => Comma,
            '.' => Period,
            ';' => Semicolon,
            '{' => OpeningCurlyBraces,
            '}' => ClosingCurlyBraces,
            '(' => OpeningParentheses,
            ')' => ClosingParentheses,
            '[' => OpeningSquareBrackets,
            ']' => ClosingSquareBrackets,
            '>' => GreaterThan,
            '<' => LessThan,
            '|' => Pipe,
            '&' => Ampersand,
            '!' => Not,
            '^' => Caret,
            '~' => Tilde,
            '@' => AttributeMarker,
            '+' => Plus,
            '/' => ForwardSlash,
            '-' => Hyphen,
            '*' => Asterisk,
            '%' => Modulo,
            '=' => Assign,
            '#' => TypeRef,
            _ => return Err(self.error(TokenizerErrorReason::UnexpectedCharacter)),
        };
        let text = self.stream.peek(1);
        self.produce(kind, text);
        Ok(())
    }

    /// Pushes a token for `text`, which must start at the cursor, and moves
    /// past it.
    fn produce(&mut self, kind: TokenKind, text: &'src str) {
        let lo = self.stream.position();
        self.tokens.push(Token::new(kind, text, lo));
        self.stream.advance_by(text.len());
    }

    /// Builds an error located at the cursor.
    fn error(&self, reason: TokenizerErrorReason) -> TokenizerError {
        let at = self.stream.line_column();
        TokenizerError {
            character: self.stream.current().unwrap_or('\0'),
            position: self.stream.position(),
            line: at.line,
            column: at.column,
            reason,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{line}:{column}: {reason} (found {character:?})")]
pub struct TokenizerError {
    pub character: char,
    /// Byte offset of the offending character.
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub reason: TokenizerErrorReason,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenizerErrorReason {
    UnexpectedCharacter,
    /// A numeric literal with more than one decimal point.
    MalformedNumber,
    UnterminatedString,
}

impl fmt::Display for TokenizerErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenizerErrorReason::UnexpectedCharacter => "unexpected character",
            TokenizerErrorReason::MalformedNumber => "malformed number literal",
            TokenizerErrorReason::UnterminatedString => "unterminated string literal",
        })
    }
}
