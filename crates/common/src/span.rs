//! Byte-offset spans.

use serde::{Deserialize, Serialize};

/// Half-open byte range `[start, end)` into a source file, excluding
/// leading trivia. All offsets in the pipeline are byte offsets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_offset(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment() {
        let outer = Span::new(10, 50);
        assert!(outer.contains(&Span::new(10, 50)));
        assert!(outer.contains(&Span::new(20, 30)));
        assert!(!outer.contains(&Span::new(5, 30)));
        assert!(!outer.contains(&Span::new(20, 51)));
    }

    #[test]
    fn test_ordering_is_start_then_end() {
        let mut spans = vec![Span::new(5, 9), Span::new(1, 20), Span::new(1, 3)];
        spans.sort();
        assert_eq!(spans, vec![Span::new(1, 3), Span::new(1, 20), Span::new(5, 9)]);
    }
}
