pub mod fmt;
#[cfg(test)]
pub(crate) mod test_utils;

/// A 1-based line and column pair, as reported by diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for LineColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Computes the line and column of the byte `offset` by scanning `src` from
/// its start. Columns count characters, not bytes.
///
/// Linear in `offset`.
pub fn line_column(src: &str, offset: usize) -> LineColumn {
    debug_assert!(src.is_char_boundary(offset.min(src.len())));
    let mut line = 1;
    let mut column = 1;
    for char in src[..offset.min(src.len())].chars() {
        if char == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    LineColumn { line, column }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_column() {
        let src = "ab\ncd\n\nλx";
        assert_eq!(line_column(src, 0), LineColumn { line: 1, column: 1 });
        assert_eq!(line_column(src, 2), LineColumn { line: 1, column: 3 });
        assert_eq!(line_column(src, 3), LineColumn { line: 2, column: 1 });
        assert_eq!(line_column(src, 7), LineColumn { line: 4, column: 1 });
        // `λ` takes two bytes but a single column.
        assert_eq!(line_column(src, 9), LineColumn { line: 4, column: 2 });
    }

    #[test]
    fn test_line_column_past_end() {
        assert_eq!(line_column("a\nb", 100), LineColumn { line: 2, column: 2 });
    }
}
