//! Source file spans, line/column conversion, and coordinate maps

use serde::{Deserialize, Serialize};
use std::ops::Range;

pub mod sourcemap;

pub use sourcemap::{Mapping, SourceMap};

/// A byte offset span in a source file
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Inclusive start offset
    pub start: u32,
    /// Exclusive end offset
    pub end: u32,
}

impl Span {
    /// Creates a span from byte offsets
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// The span as a `usize` range
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length in bytes
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A line/column position; lines are 1-based, columns 0-based
/// (the coordinate-map convention)
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LineCol {
    /// 1-based line number
    pub line: u32,
    /// 0-based column in UTF-8 bytes
    pub column: u32,
}

impl LineCol {
    /// Creates a position
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Precomputed line-start offsets for a source text
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Builds the index for `text`
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset as u32 + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a byte offset to a line/column position
    pub fn line_col(&self, offset: u32) -> LineCol {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        LineCol {
            line: line as u32 + 1,
            column: offset - self.line_starts[line],
        }
    }
}
