//! Source location tracking for diagnostics and `#line` directives.
//!
//! # Design
//!
//! - `Span`: compact byte range inside one source file
//! - `SourceMap`: owns every source file of a compilation and answers lookups
//! - `SourceFile`: one source file with a line-start index
//!
//! # Examples
//!
//! ```
//! # use lambdajob_ast::foundation::span::*;
//! # use std::path::PathBuf;
//! let mut map = SourceMap::new();
//! let file_id = map.add_file(PathBuf::from("Move.cs"), "int a;\nint b;".to_string());
//! let span = Span::new(file_id, 7, 13);
//!
//! assert_eq!(map.snippet(&span), "int b;");
//! assert_eq!(map.line_col(&span), (2, 1));
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Byte range in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Index into `SourceMap` files
    pub file_id: u16,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
}

/// All source files in a compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single source file with line indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path as given by the caller
    pub path: PathBuf,
    /// Original source text
    pub source: String,
    /// Byte offsets of each line start, plus an EOF sentinel.
    pub line_starts: Vec<u32>,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// Zero-length span at the start of a file.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0)
    }

    /// Check if this span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Length of this span in bytes.
    ///
    /// # Panics
    /// Panics if end < start (malformed span).
    pub fn len(&self) -> u32 {
        assert!(
            self.end >= self.start,
            "malformed span: end ({}) < start ({})",
            self.end,
            self.start
        );
        self.end - self.start
    }

    /// Span covering both `self` and `other`.
    ///
    /// # Panics
    /// Panics if the spans come from different files.
    pub fn to(&self, other: &Span) -> Span {
        assert_eq!(
            self.file_id, other.file_id,
            "cannot merge spans from different files"
        );
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.file_id == other.file_id && self.start <= other.start && other.end <= self.end
    }
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Add a source file and return its ID.
    pub fn add_file(&mut self, path: PathBuf, source: String) -> u16 {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many source files");
        self.files.push(SourceFile::new(path, source));
        file_id as u16
    }

    /// Source file for a span.
    pub fn file(&self, span: &Span) -> &SourceFile {
        &self.files[span.file_id as usize]
    }

    /// Source file by id, if present.
    pub fn get(&self, file_id: u16) -> Option<&SourceFile> {
        self.files.get(file_id as usize)
    }

    /// File path for a span.
    pub fn file_path(&self, span: &Span) -> &Path {
        &self.files[span.file_id as usize].path
    }

    /// Source text covered by a span.
    pub fn snippet(&self, span: &Span) -> &str {
        let file = &self.files[span.file_id as usize];
        &file.source[span.start as usize..span.end as usize]
    }

    /// 1-based (line, column) of a span's start.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        self.files[span.file_id as usize].line_col(span.start)
    }

    /// Number of files in this map.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl SourceFile {
    /// Create a source file with precomputed line starts.
    pub fn new(path: PathBuf, source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            path,
            source,
            line_starts,
        }
    }

    /// 1-based (line, column) for a byte offset.
    ///
    /// # Panics
    /// Panics if offset is beyond EOF.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        assert!(
            offset <= self.source.len() as u32,
            "offset {} is beyond EOF (len = {})",
            offset,
            self.source.len()
        );

        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx.min(self.line_starts.len().saturating_sub(2)),
            Err(idx) => idx.max(1) - 1,
        };

        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx]) + 1;
        (line, col)
    }

    /// Text of a 1-based line without its line terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 || line as usize >= self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line as usize - 1] as usize;
        let end = self.line_starts[line as usize] as usize;
        Some(self.source[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Number of lines in this file.
    pub fn line_count(&self) -> usize {
        self.line_starts.len() - 1
    }
}

/// Byte offsets of line starts; the last entry is an EOF sentinel.
fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut line_starts = vec![0];
    line_starts.extend(
        source
            .char_indices()
            .filter(|(_, ch)| *ch == '\n')
            .map(|(idx, _)| (idx + 1) as u32),
    );
    if line_starts.last() != Some(&(source.len() as u32)) {
        line_starts.push(source.len() as u32);
    }
    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_basics() {
        let span = Span::new(0, 10, 20);
        assert_eq!(span.len(), 10);
        assert!(!span.is_empty());
        assert!(Span::zero(0).is_empty());
    }

    #[test]
    fn test_span_to_and_contains() {
        let a = Span::new(0, 10, 20);
        let b = Span::new(0, 15, 30);
        let merged = a.to(&b);
        assert_eq!((merged.start, merged.end), (10, 30));
        assert!(merged.contains(&a));
        assert!(!a.contains(&b));
    }

    #[test]
    fn test_compute_line_starts() {
        assert_eq!(compute_line_starts("ab\ncd\nef"), vec![0, 3, 6, 8]);
        assert_eq!(compute_line_starts("ab\ncd\n"), vec![0, 3, 6]);
    }

    #[test]
    fn test_line_col() {
        let file = SourceFile::new(PathBuf::from("a.cs"), "hello\nworld\n".to_string());
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(6), (2, 1));
        assert_eq!(file.line_col(11), (2, 6));
    }

    #[test]
    fn test_line_text_strips_terminator() {
        let file = SourceFile::new(PathBuf::from("a.cs"), "one\r\ntwo\n".to_string());
        assert_eq!(file.line_text(1), Some("one"));
        assert_eq!(file.line_text(2), Some("two"));
        assert_eq!(file.line_text(3), None);
        assert_eq!(file.line_count(), 2);
    }

    #[test]
    #[should_panic(expected = "cannot merge spans from different files")]
    fn test_span_to_panics_on_different_files() {
        let _ = Span::new(0, 0, 1).to(&Span::new(1, 0, 1));
    }
}
