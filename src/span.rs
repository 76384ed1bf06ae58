// ABOUTME: Source position and span types shared by every pipeline stage

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single point in a named source: line/column are 1-based, `offset` is a
/// 0-based byte offset used for cheap slicing and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    pub fn start() -> Self {
        Position {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open range `[start, end)` within one named source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub source: String,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(source: impl Into<String>, start: Position, end: Position) -> Self {
        Span {
            source: source.into(),
            start,
            end,
        }
    }

    /// A zero-width span used for synthesized nodes that recovery inserts.
    pub fn synthetic(source: impl Into<String>) -> Self {
        let p = Position::start();
        Span::new(source, p, p)
    }

    pub fn merge(&self, other: &Span) -> Span {
        Span {
            source: self.source.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.source, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_takes_widest_range() {
        let a = Span::new("f", Position::start(), Position { line: 1, column: 5, offset: 4 });
        let b = Span::new("f", Position { line: 2, column: 1, offset: 10 }, Position { line: 2, column: 3, offset: 12 });
        let m = a.merge(&b);
        assert_eq!(m.start, a.start);
        assert_eq!(m.end, b.end);
    }
}
