//! Identity paths and index paths into a tree.
//!
//! A [`TreePath`] names a node by the model ids leading to it from the root,
//! so it survives reordering as long as those identities survive. An
//! [`IndexPath`] names the same node by position and is only valid for the
//! snapshot it was computed against.

use std::fmt;
use std::str::FromStr;

/// Separator used by [`TreePath::encode`]: the ASCII unit separator.
pub const PATH_SEPARATOR: char = '\u{1f}';

/// Errors from encoding or decoding a [`TreePath`] as a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathCodecError {
    /// An id renders to a string that cannot be encoded unambiguously.
    #[error("tree path segment {index} cannot be encoded: {reason}")]
    Unencodable {
        /// Position of the offending id.
        index: usize,
        /// Why it cannot be encoded.
        reason: &'static str,
    },

    /// A segment did not parse into the id type.
    #[error("tree path segment {index} ('{segment}') is invalid: {message}")]
    InvalidSegment {
        /// Position of the offending segment.
        index: usize,
        /// The raw segment.
        segment: String,
        /// The parse error, rendered.
        message: String,
    },
}

/// A path of model ids from the tree root. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreePath<Id> {
    ids: Vec<Id>,
}

impl<Id> Default for TreePath<Id> {
    fn default() -> Self {
        Self::root()
    }
}

impl<Id> TreePath<Id> {
    /// The root path.
    pub const fn root() -> Self {
        Self { ids: Vec::new() }
    }

    /// A path through `ids`, outermost first.
    pub fn new(ids: Vec<Id>) -> Self {
        Self { ids }
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.ids.is_empty()
    }

    /// Depth below the root.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Same as [`is_root`](Self::is_root).
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The ids, outermost first.
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// The id of the node this path names, or `None` for the root.
    pub fn last(&self) -> Option<&Id> {
        self.ids.last()
    }

    /// The path extended by `id`.
    pub fn child(&self, id: Id) -> Self
    where
        Id: Clone,
    {
        let mut ids = self.ids.clone();
        ids.push(id);
        Self { ids }
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self>
    where
        Id: Clone,
    {
        let (_, parent) = self.ids.split_last()?;
        Some(Self {
            ids: parent.to_vec(),
        })
    }
}

impl<Id: fmt::Display> TreePath<Id> {
    /// Encode as one string, ids joined by [`PATH_SEPARATOR`].
    ///
    /// Ids must render non-empty and without the separator.
    pub fn encode(&self) -> Result<String, PathCodecError> {
        let mut out = String::new();
        for (index, id) in self.ids.iter().enumerate() {
            let segment = id.to_string();
            if segment.is_empty() {
                return Err(PathCodecError::Unencodable {
                    index,
                    reason: "id renders as an empty string",
                });
            }
            if segment.contains(PATH_SEPARATOR) {
                return Err(PathCodecError::Unencodable {
                    index,
                    reason: "id contains the path separator",
                });
            }
            if index > 0 {
                out.push(PATH_SEPARATOR);
            }
            out.push_str(&segment);
        }
        Ok(out)
    }
}

impl<Id> TreePath<Id>
where
    Id: FromStr,
    Id::Err: fmt::Display,
{
    /// Decode a string produced by [`encode`](Self::encode). The empty
    /// string decodes to the root.
    pub fn decode(encoded: &str) -> Result<Self, PathCodecError> {
        if encoded.is_empty() {
            return Ok(Self::root());
        }
        encoded
            .split(PATH_SEPARATOR)
            .enumerate()
            .map(|(index, segment)| {
                segment
                    .parse::<Id>()
                    .map_err(|err| PathCodecError::InvalidSegment {
                        index,
                        segment: segment.to_string(),
                        message: err.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl<Id> From<Vec<Id>> for TreePath<Id> {
    fn from(ids: Vec<Id>) -> Self {
        Self::new(ids)
    }
}

impl<Id> FromIterator<Id> for TreePath<Id> {
    fn from_iter<I: IntoIterator<Item = Id>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A path of child indices from the tree root. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IndexPath(Vec<usize>);

impl IndexPath {
    /// The root path.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Depth below the root.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`is_root`](Self::is_root).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The indices, outermost first.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Index of the addressed node within its parent.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// The path extended by `index`.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }
}

impl From<Vec<usize>> for IndexPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{index}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_path_navigation() {
        let root = TreePath::<String>::root();
        assert!(root.is_root());
        assert!(root.parent().is_none());

        let path = root.child("a".into()).child("b".into());
        assert_eq!(path.len(), 2);
        assert_eq!(path.last().map(String::as_str), Some("b"));
        assert_eq!(path.parent(), Some(TreePath::new(vec!["a".to_string()])));
    }

    #[test]
    fn test_encode_decode() {
        let path: TreePath<String> = ["music", "albums", "1999"].iter().map(|s| s.to_string()).collect();
        let encoded = path.encode().unwrap();
        assert_eq!(encoded, "music\u{1f}albums\u{1f}1999");
        assert_eq!(TreePath::<String>::decode(&encoded).unwrap(), path);

        assert_eq!(TreePath::<String>::root().encode().unwrap(), "");
        assert!(TreePath::<String>::decode("").unwrap().is_root());
    }

    #[test]
    fn test_decode_numeric_ids() {
        let path = TreePath::<u32>::decode("4\u{1f}17").unwrap();
        assert_eq!(path.ids(), &[4, 17]);

        let err = TreePath::<u32>::decode("4\u{1f}x").unwrap_err();
        assert!(matches!(err, PathCodecError::InvalidSegment { index: 1, .. }));
    }

    #[test]
    fn test_encode_rejects_ambiguous_ids() {
        let path = TreePath::new(vec!["ok".to_string(), "bad\u{1f}id".to_string()]);
        assert_eq!(
            path.encode(),
            Err(PathCodecError::Unencodable {
                index: 1,
                reason: "id contains the path separator"
            })
        );

        let empty = TreePath::new(vec![String::new()]);
        assert!(empty.encode().is_err());
    }

    #[test]
    fn test_index_path() {
        let path = IndexPath::root().child(2).child(0);
        assert_eq!(path.indices(), &[2, 0]);
        assert_eq!(path.last(), Some(0));
        assert_eq!(path.parent(), Some(IndexPath::from(vec![2])));
        assert_eq!(path.to_string(), "[2, 0]");
        assert!(IndexPath::from(vec![0, 5]) < IndexPath::from(vec![1]));
    }
}
