//! Source file tracking and position mapping
//!
//! Keeps the text of every file a conversion run touches, hands out stable
//! file identifiers, and converts byte offsets into 1-based line/column
//! positions for diagnostics.

use std::collections::HashMap;
use std::fmt;

/// Unique identifier for a registered source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);

impl FileId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

/// A position in source code (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }
}

/// A contiguous region of one source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
    pub file_id: FileId,
}

impl SourceSpan {
    pub fn new(start: SourcePosition, end: SourcePosition, file_id: FileId) -> Self {
        Self {
            start,
            end,
            file_id,
        }
    }
}

/// One registered source file with precomputed line starts
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: String, content: String) -> Self {
        let line_starts = compute_line_starts(&content);
        Self {
            name,
            content,
            line_starts,
        }
    }

    /// Get a specific line (1-based), without its trailing newline
    pub fn get_line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 || line_number > self.line_starts.len() {
            return None;
        }

        let start = self.line_starts[line_number - 1];
        let end = if line_number < self.line_starts.len() {
            self.line_starts[line_number]
        } else {
            self.content.len()
        };

        Some(self.content[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Convert a byte offset to 1-based line and column
    pub fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };

        let line_start = self.line_starts.get(line_index).copied().unwrap_or(0);
        (line_index + 1, offset - line_start + 1)
    }

    pub fn offset_to_position(&self, offset: usize) -> SourcePosition {
        let (line, column) = self.offset_to_line_col(offset);
        SourcePosition::new(line, column, offset)
    }
}

/// Registry of all source files in a conversion run
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: HashMap<FileId, SourceFile>,
    next_id: usize,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file and return its FileId
    pub fn add_file(&mut self, name: String, content: String) -> FileId {
        let file_id = FileId(self.next_id);
        self.next_id += 1;
        self.files.insert(file_id, SourceFile::new(name, content));
        file_id
    }

    pub fn get_file(&self, file_id: FileId) -> Option<&SourceFile> {
        self.files.get(&file_id)
    }

    pub fn get_line(&self, file_id: FileId, line_number: usize) -> Option<&str> {
        self.get_file(file_id)?.get_line(line_number)
    }

    pub fn offset_to_line_col(&self, file_id: FileId, offset: usize) -> Option<(usize, usize)> {
        self.get_file(file_id)
            .map(|file| file.offset_to_line_col(offset))
    }

    /// Create a SourceSpan from a file and a byte range
    pub fn span_from_offsets(
        &self,
        file_id: FileId,
        start: usize,
        end: usize,
    ) -> Option<SourceSpan> {
        let file = self.get_file(file_id)?;
        Some(SourceSpan::new(
            file.offset_to_position(start),
            file.offset_to_position(end),
            file_id,
        ))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut line_starts = vec![0];

    for (i, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push(i + 1);
        }
    }

    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_lookup() {
        let mut map = SourceMap::new();
        let id = map.add_file("Foo.cs".to_string(), "line 1\nline 2\nline 3".to_string());

        assert_eq!(map.get_line(id, 1), Some("line 1"));
        assert_eq!(map.get_line(id, 2), Some("line 2"));
        assert_eq!(map.get_line(id, 3), Some("line 3"));
        assert_eq!(map.get_line(id, 4), None);
    }

    #[test]
    fn offset_to_line_col() {
        let mut map = SourceMap::new();
        let id = map.add_file("Foo.cs".to_string(), "hello\nworld\ntest".to_string());

        assert_eq!(map.offset_to_line_col(id, 0), Some((1, 1)));
        assert_eq!(map.offset_to_line_col(id, 4), Some((1, 5)));
        assert_eq!(map.offset_to_line_col(id, 6), Some((2, 1)));
        assert_eq!(map.offset_to_line_col(id, 12), Some((3, 1)));
    }

    #[test]
    fn multiple_files_get_distinct_ids() {
        let mut map = SourceMap::new();
        let a = map.add_file("A.cs".to_string(), "a".to_string());
        let b = map.add_file("B.cs".to_string(), "b".to_string());

        assert_ne!(a, b);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_file(a).unwrap().name, "A.cs");
        assert_eq!(map.get_file(b).unwrap().name, "B.cs");
    }

    #[test]
    fn span_from_offsets_crosses_lines() {
        let mut map = SourceMap::new();
        let id = map.add_file("Foo.cs".to_string(), "ab\ncd".to_string());

        let span = map.span_from_offsets(id, 1, 4).unwrap();
        assert_eq!(span.start.line, 1);
        assert_eq!(span.start.column, 2);
        assert_eq!(span.end.line, 2);
        assert_eq!(span.end.column, 2);
    }
}
