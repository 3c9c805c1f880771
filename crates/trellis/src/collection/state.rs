//! Collection lifecycle state and its flatten reduction.
//!
//! A collection moves from [`CollectionState::NotLoaded`] into any of
//! `Loading`, `Loaded` or `Error`, and from then on between those three. It
//! never returns to `NotLoaded`.
//!
//! Combining collections uses [`CollectionState::flatten`], which reduces N
//! sub-states to one with fixed precedence: errors dominate, then "nothing
//! loaded", then "fully loaded", with partial loading as the fallback.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use super::model::Model;
use super::path::ModelPath;

/// An ordered list of sections, each an ordered list of models.
pub type Sections<M> = Vec<Vec<M>>;

/// The data error carried by [`CollectionState::Error`].
///
/// Errors are data: they travel through the same notification channel as
/// loaded models and are never raised across the collection boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollectionError {
    /// A single collection failed to load.
    #[error("{0}")]
    Failed(Arc<dyn StdError + Send + Sync>),

    /// Several combined collections failed; every cause is kept.
    #[error("{} combined collection(s) failed", .0.len())]
    Flattened(Vec<CollectionError>),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

impl CollectionError {
    /// Wrap an arbitrary error.
    pub fn new(err: impl StdError + Send + Sync + 'static) -> Self {
        Self::Failed(Arc::new(err))
    }

    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// The individual causes: the aggregated list for `Flattened`, or this
    /// error alone.
    pub fn causes(&self) -> &[CollectionError] {
        match self {
            Self::Failed(_) => std::slice::from_ref(self),
            Self::Flattened(causes) => causes,
        }
    }
}

/// The lifecycle of one sectioned collection.
///
/// `NotLoaded` and `Error` never carry models. `Loading` may carry a partial
/// snapshot, typically existing data while more is being fetched.
#[derive(Clone)]
pub enum CollectionState<M> {
    /// Nothing has been requested yet.
    NotLoaded,
    /// A load is in progress, optionally with partial data.
    Loading(Option<Sections<M>>),
    /// Data is available.
    Loaded(Sections<M>),
    /// Loading failed.
    Error(CollectionError),
}

impl<M> Default for CollectionState<M> {
    fn default() -> Self {
        Self::NotLoaded
    }
}

impl<M> CollectionState<M> {
    /// The sections this state carries; empty when it carries none.
    pub fn sections(&self) -> &[Vec<M>] {
        match self {
            Self::Loading(Some(sections)) | Self::Loaded(sections) => sections,
            Self::NotLoaded | Self::Loading(None) | Self::Error(_) => &[],
        }
    }

    /// All models across all sections, in order.
    pub fn models(&self) -> impl Iterator<Item = &M> + '_ {
        self.sections().iter().flatten()
    }

    /// Total number of models across all sections.
    pub fn model_count(&self) -> usize {
        self.sections().iter().map(Vec::len).sum()
    }

    /// The error, if this is the `Error` state.
    pub fn error(&self) -> Option<&CollectionError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Whether nothing has been requested yet.
    pub fn is_not_loaded(&self) -> bool {
        matches!(self, Self::NotLoaded)
    }

    /// Whether a load is in progress, with or without partial data.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Whether data is available.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Whether loading failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether the state carries no models at all.
    pub fn is_empty(&self) -> bool {
        self.models().next().is_none()
    }

    /// Whether `other` is a different variant, ignoring carried data.
    pub fn is_different_case(&self, other: &Self) -> bool {
        std::mem::discriminant(self) != std::mem::discriminant(other)
    }
}

impl<M: Model> CollectionState<M> {
    /// The model at `path`, if it is in bounds.
    pub fn model_at(&self, path: ModelPath) -> Option<&M> {
        self.sections().get(path.section)?.get(path.item)
    }

    /// The path of the first model with `id`. O(n).
    pub fn path_of(&self, id: &M::Id) -> Option<ModelPath> {
        self.sections()
            .iter()
            .enumerate()
            .find_map(|(section, models)| {
                models
                    .iter()
                    .position(|m| m.model_id() == id)
                    .map(|item| ModelPath::new(section, item))
            })
    }
}

impl<M: Clone> CollectionState<M> {
    /// All models concatenated into one list.
    pub fn flat_models(&self) -> Vec<M> {
        self.models().cloned().collect()
    }
}

impl<M: Model> CollectionState<M> {
    /// Reduce several sub-states into one representative state.
    ///
    /// Rules, first match wins:
    ///
    /// 1. Any `Error`: `Error(Flattened(all causes))`, even for a single cause.
    /// 2. All `NotLoaded`: `NotLoaded`. This includes an empty input.
    /// 3. All `Loaded`: `Loaded` with the sub-states' sections concatenated.
    /// 4. Only `NotLoaded` and `Loading(None)`: `Loading(None)`.
    /// 5. Otherwise `Loading(Some(concatenated sections))`.
    ///
    /// Each sub-state contributes its own sections in order. A sub-state
    /// carrying no sections contributes one empty section, so section `i` of
    /// the result always maps back to a known sub-state.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis::collection::{CollectionState, StaticModel};
    ///
    /// let a = CollectionState::Loaded(vec![vec![StaticModel::new("a", ())]]);
    /// let b = CollectionState::NotLoaded;
    ///
    /// let flat = CollectionState::flatten([&a, &b]);
    /// assert!(flat.is_loading());
    /// assert_eq!(flat.sections().len(), 2);
    /// ```
    pub fn flatten<'a>(states: impl IntoIterator<Item = &'a CollectionState<M>>) -> Self {
        let mut count = 0usize;
        let mut not_loaded = 0usize;
        let mut loaded = 0usize;
        let mut bare_loading = 0usize;
        let mut errors = Vec::new();
        let mut sections: Sections<M> = Vec::new();

        for state in states {
            count += 1;
            match state {
                Self::NotLoaded => not_loaded += 1,
                Self::Loaded(_) => loaded += 1,
                Self::Loading(None) => bare_loading += 1,
                Self::Loading(Some(_)) => {}
                Self::Error(err) => errors.push(err.clone()),
            }

            if state.sections().is_empty() {
                sections.push(Vec::new());
            } else {
                sections.extend(state.sections().iter().cloned());
            }
        }

        if !errors.is_empty() {
            Self::Error(CollectionError::Flattened(errors))
        } else if not_loaded == count {
            Self::NotLoaded
        } else if loaded == count {
            Self::Loaded(sections)
        } else if not_loaded + bare_loading == count {
            Self::Loading(None)
        } else {
            Self::Loading(Some(sections))
        }
    }
}

/// Turn each section into its own single-section state.
///
/// Used to feed a fixed sectioned snapshot into something that multiplexes
/// per-section collections.
pub fn sectioned_states<M>(sections: Sections<M>, loading: bool) -> Vec<CollectionState<M>> {
    sections
        .into_iter()
        .map(|section| {
            if loading {
                CollectionState::Loading(Some(vec![section]))
            } else {
                CollectionState::Loaded(vec![section])
            }
        })
        .collect()
}

impl<M> fmt::Debug for CollectionState<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn describe<M>(f: &mut fmt::Formatter<'_>, sections: &[Vec<M>]) -> fmt::Result {
            let models: usize = sections.iter().map(Vec::len).sum();
            write!(f, "[{} sections, {} models]", sections.len(), models)
        }

        match self {
            Self::NotLoaded => f.write_str("NotLoaded"),
            Self::Loading(None) => f.write_str("Loading(None)"),
            Self::Loading(Some(sections)) => {
                f.write_str("Loading(")?;
                describe(f, sections)?;
                f.write_str(")")
            }
            Self::Loaded(sections) => {
                f.write_str("Loaded(")?;
                describe(f, sections)?;
                f.write_str(")")
            }
            Self::Error(err) => write!(f, "Error({err})"),
        }
    }
}
