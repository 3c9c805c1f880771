//! Addressing models inside a sectioned snapshot.

use std::fmt;

/// A `(section, item)` position inside a sectioned snapshot.
///
/// Ordering is lexicographic: by section, then by item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ModelPath {
    /// Index of the section.
    pub section: usize,
    /// Index of the item within its section.
    pub item: usize,
}

impl ModelPath {
    /// Create a path.
    #[inline]
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.section, self.item)
    }
}

/// A model that changed position between two snapshots.
///
/// `from` addresses the previous snapshot and `to` addresses the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelMove {
    /// Position in the previous snapshot.
    pub from: ModelPath,
    /// Position in the next snapshot.
    pub to: ModelPath,
}

impl ModelMove {
    /// Create a move.
    #[inline]
    pub const fn new(from: ModelPath, to: ModelPath) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for ModelMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_ordering_is_lexicographic() {
        let mut paths = vec![
            ModelPath::new(1, 0),
            ModelPath::new(0, 5),
            ModelPath::new(0, 1),
        ];
        paths.sort();
        assert_eq!(
            paths,
            vec![ModelPath::new(0, 1), ModelPath::new(0, 5), ModelPath::new(1, 0)]
        );
    }

    #[test]
    fn test_display() {
        let m = ModelMove::new(ModelPath::new(0, 0), ModelPath::new(2, 1));
        assert_eq!(m.to_string(), "(0, 0) -> (2, 1)");
    }
}
