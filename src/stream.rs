use crate::util::{line_column, LineColumn};

/// A cursor over the source text.
///
/// The stream doesn't own the text. Every slice it hands out borrows from the
/// original source buffer, which is what allows tokens to be zero-copy.
#[derive(Clone, Debug)]
pub struct CharStream<'src> {
    src: &'src str,
    /// Byte offset of the current character.
    position: usize,
}

impl<'src> CharStream<'src> {
    pub fn new(src: &'src str) -> CharStream<'src> {
        CharStream { src, position: 0 }
    }

    pub fn src(&self) -> &'src str {
        self.src
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves the cursor to the given byte offset. The offset must lie on a
    /// character boundary.
    pub fn set_position(&mut self, position: usize) {
        debug_assert!(self.src.is_char_boundary(position.min(self.src.len())));
        self.position = position;
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.src.len()
    }

    /// Returns the current character, or `None` at (or after) the end.
    pub fn current(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Returns the character following the current one, if any.
    pub fn next(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next()?;
        chars.next()
    }

    /// Advances past the current character. Returns whether there is still a
    /// character to be read.
    pub fn move_next(&mut self) -> bool {
        if let Some(c) = self.current() {
            self.position += c.len_utf8();
        }
        !self.is_at_end()
    }

    /// Advances past the current character, returning the new current one.
    pub fn advance(&mut self) -> Option<char> {
        self.move_next();
        self.current()
    }

    /// Skips `len` bytes. Meant to be used with a slice previously returned by
    /// one of the peek methods.
    pub fn advance_by(&mut self, len: usize) {
        self.set_position(self.position + len);
    }

    /// Returns the next `count` characters, starting at the current one. If
    /// fewer than `count` characters remain, an empty slice is returned.
    pub fn peek(&self, count: usize) -> &'src str {
        let rest = self.rest();
        match rest.char_indices().nth(count) {
            Some((end, _)) => &rest[..end],
            None if rest.chars().count() == count => rest,
            None => "",
        }
    }

    /// Returns the maximal run of characters, starting at the current one,
    /// which satisfy `predicate`. If the predicate holds until the input is
    /// exhausted, the full remaining buffer is returned.
    pub fn peek_while(&self, mut predicate: impl FnMut(char) -> bool) -> &'src str {
        let rest = self.rest();
        match rest.char_indices().find(|&(_, c)| !predicate(c)) {
            Some((end, _)) => &rest[..end],
            None => rest,
        }
    }

    /// Returns the 1-based line of the cursor.
    pub fn line(&self) -> usize {
        self.line_column().line
    }

    /// Returns the 1-based column of the cursor.
    pub fn column(&self) -> usize {
        self.line_column().column
    }

    pub fn line_column(&self) -> LineColumn {
        line_column(self.src, self.position)
    }

    fn rest(&self) -> &'src str {
        self.src.get(self.position..).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_and_next() {
        let mut s = CharStream::new("ab");
        assert_eq!(s.current(), Some('a'));
        assert_eq!(s.next(), Some('b'));
        assert!(s.move_next());
        assert_eq!(s.current(), Some('b'));
        assert_eq!(s.next(), None);
        assert!(!s.move_next());
        assert_eq!(s.current(), None);
        assert_eq!(s.next(), None);
        // Moving past the end is harmless.
        assert!(!s.move_next());
        assert_eq!(s.position(), 2);
    }

    #[test]
    fn test_advance_yields_new_current() {
        let mut s = CharStream::new("xyz");
        assert_eq!(s.advance(), Some('y'));
        assert_eq!(s.advance(), Some('z'));
        assert_eq!(s.advance(), None);
    }

    #[test]
    fn test_peek_count() {
        let mut s = CharStream::new("<=x");
        assert_eq!(s.peek(2), "<=");
        assert_eq!(s.peek(3), "<=x");
        assert_eq!(s.peek(4), "");
        s.advance_by(2);
        assert_eq!(s.peek(1), "x");
        assert_eq!(s.peek(2), "");
    }

    #[test]
    fn test_peek_while() {
        let mut s = CharStream::new("foo_1 bar");
        assert_eq!(s.peek_while(|c| c.is_alphanumeric() || c == '_'), "foo_1");
        s.advance_by(6);
        // The predicate never fails, so the whole remaining buffer is returned.
        assert_eq!(s.peek_while(char::is_alphabetic), "bar");
        s.advance_by(3);
        assert_eq!(s.peek_while(|_| true), "");
    }

    #[test]
    fn test_multibyte() {
        let mut s = CharStream::new("λμ");
        assert_eq!(s.peek(1), "λ");
        assert!(s.move_next());
        assert_eq!(s.position(), 2);
        assert_eq!(s.current(), Some('μ'));
        assert_eq!(s.column(), 2);
    }

    #[test]
    fn test_line_and_column() {
        let mut s = CharStream::new("a\nbc");
        s.advance_by(3);
        assert_eq!(s.line(), 2);
        assert_eq!(s.column(), 2);
    }
}
