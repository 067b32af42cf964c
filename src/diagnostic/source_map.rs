/// Maps byte offsets in template source to 1-based line/column positions.
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        SourceMap { line_starts }
    }

    /// (line, col) for a byte offset, both 1-based.
    pub fn lookup(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line + 1, col + 1)
    }

    /// The text of a 1-based line, trailing newline trimmed.
    pub fn line_text<'a>(&self, source: &'a str, line: usize) -> &'a str {
        if line == 0 || line > self.line_starts.len() {
            return "";
        }
        let start = self.line_starts[line - 1];
        let end = if line < self.line_starts.len() {
            self.line_starts[line]
        } else {
            source.len()
        };
        source[start..end].trim_end_matches('\n').trim_end_matches('\r')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_offsets() {
        let src = "Hello, {{ .name }}!";
        let map = SourceMap::new(src);
        assert_eq!(map.lookup(0), (1, 1));
        assert_eq!(map.lookup(10), (1, 11));
        assert_eq!(map.line_text(src, 1), src);
    }

    #[test]
    fn multi_line_offsets() {
        let src = "line one\n{{range .items}}\n{{end}}";
        let map = SourceMap::new(src);
        assert_eq!(map.lookup(0), (1, 1));
        assert_eq!(map.lookup(9), (2, 1));
        assert_eq!(map.lookup(26), (3, 1));
        assert_eq!(map.line_text(src, 2), "{{range .items}}");
    }

    #[test]
    fn out_of_bounds_lines_are_empty() {
        let src = "one";
        let map = SourceMap::new(src);
        assert_eq!(map.line_text(src, 0), "");
        assert_eq!(map.line_text(src, 9), "");
    }

    #[test]
    fn trailing_newline() {
        let src = "hello\n";
        let map = SourceMap::new(src);
        assert_eq!(map.line_text(src, 1), "hello");
        assert_eq!(map.line_text(src, 2), "");
    }
}
