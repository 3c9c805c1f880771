//! Model identity and versioning.
//!
//! Everything fed into a collection, a diff engine or a tree controller is a
//! [`Model`]: an immutable value with a stable identity and a version. The
//! identity says *which* item a value is across snapshots; the version says
//! whether its content changed.

use std::fmt::Debug;
use std::hash::Hash;

/// An identity-keyed, versioned value.
///
/// # Contract
///
/// - `model_id` is stable across snapshots and unique within one snapshot.
///   Feeding a snapshot with duplicate ids into the diff engine panics.
/// - `version` only needs equality. Two values with the same id and equal
///   versions are treated as identical.
///
/// # Example
///
/// ```
/// use trellis::collection::Model;
///
/// #[derive(Clone)]
/// struct Contact {
///     email: String,
///     revision: u32,
///     name: String,
/// }
///
/// impl Model for Contact {
///     type Id = String;
///     type Version = u32;
///
///     fn model_id(&self) -> &String {
///         &self.email
///     }
///
///     fn version(&self) -> u32 {
///         self.revision
///     }
/// }
/// ```
pub trait Model: Clone + Send + Sync + 'static {
    /// The identity type.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// The version type, compared for equality only.
    type Version: PartialEq;

    /// The stable identity of this model.
    fn model_id(&self) -> &Self::Id;

    /// The current version of this model.
    fn version(&self) -> Self::Version;
}

/// A ready-made model: a string id, an integer version and a payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaticModel<T> {
    id: String,
    version: u64,
    payload: T,
}

impl<T> StaticModel<T> {
    /// Create a model at version 0.
    pub fn new(id: impl Into<String>, payload: T) -> Self {
        Self::with_version(id, 0, payload)
    }

    /// Create a model at an explicit version.
    pub fn with_version(id: impl Into<String>, version: u64, payload: T) -> Self {
        Self {
            id: id.into(),
            version,
            payload,
        }
    }

    /// The model's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The wrapped payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Replace the payload, bumping the version.
    pub fn updated(&self, payload: T) -> Self {
        Self {
            id: self.id.clone(),
            version: self.version + 1,
            payload,
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Model for StaticModel<T> {
    type Id = String;
    type Version = u64;

    fn model_id(&self) -> &String {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_model_update_bumps_version() {
        let a = StaticModel::new("a", "first");
        let b = a.updated("second");

        assert_eq!(a.model_id(), b.model_id());
        assert_eq!(a.version(), 0);
        assert_eq!(b.version(), 1);
        assert_eq!(*b.payload(), "second");
    }
}
