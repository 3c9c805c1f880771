//! Minimal edit scripts between sectioned snapshots.
//!
//! [`diff`] compares two snapshots by model identity and produces an
//! [`EditScript`]; [`DiffEngine`] keeps the previous snapshot so producers
//! only hand it the newest one.
//!
//! # Index Semantics
//!
//! Scripts follow the batch-update convention used by list and outline views:
//!
//! | Category          | Addresses                               |
//! |-------------------|-----------------------------------------|
//! | removed sections  | previous snapshot                       |
//! | added sections    | next snapshot                           |
//! | removed items     | previous snapshot                       |
//! | added items       | next snapshot                           |
//! | moved items       | previous path to next path              |
//! | updated items     | a path identical in both snapshots      |
//!
//! Consumers apply the categories in exactly that order. When
//! [`EditScript::requires_reload`] is set they reload instead.
//!
//! # Sections
//!
//! Sections have no identity of their own and are compared by position: if
//! the snapshot shrinks, the trailing sections are removed; if it grows, the
//! trailing sections are added. Items are only matched within sections that
//! exist in both snapshots. Items of removed sections leave with them and
//! items of added sections arrive with them.
//!
//! # Moves
//!
//! Moves are minimal. An item whose section changed is always a move. Inside
//! a section, items that kept their index stay put, as does the longest run
//! of items that kept their relative order around them; only the rest are
//! reported as moved, so swapping two neighbours yields one move rather than
//! two. A move never has the same source and destination.
//!
//! # Example
//!
//! ```
//! use trellis::collection::{DiffEngine, StaticModel};
//!
//! let a = StaticModel::new("a", ());
//! let b = StaticModel::new("b", ());
//!
//! let mut engine = DiffEngine::with_initial(vec![vec![a.clone(), b.clone()]]);
//! let script = engine.update(vec![vec![b, a]]);
//!
//! assert_eq!(script.moved.len(), 1);
//! assert!(script.removed.is_empty() && script.added.is_empty());
//! ```

use std::collections::HashMap;
use std::fmt;

use trellis_core::logging::targets;

use super::model::Model;
use super::path::{ModelMove, ModelPath};
use super::state::{CollectionState, Sections};

/// The changes that turn one sectioned snapshot into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    /// Section indices in the previous snapshot, ascending.
    pub removed_sections: Vec<usize>,
    /// Section indices in the next snapshot, ascending.
    pub added_sections: Vec<usize>,
    /// Item paths in the previous snapshot, ascending.
    pub removed: Vec<ModelPath>,
    /// Item paths in the next snapshot, ascending.
    pub added: Vec<ModelPath>,
    /// Moves, ordered by destination.
    pub moved: Vec<ModelMove>,
    /// Paths whose model kept its position but changed version, ascending.
    pub updated: Vec<ModelPath>,
    /// A section that existed in both snapshots went from empty to non-empty.
    pub first_add_in_section: bool,
    /// A section that existed in both snapshots went from non-empty to empty.
    pub last_remove_in_section: bool,
}

impl EditScript {
    /// Whether applying this script changes anything.
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    /// Whether consumers must reload instead of applying incrementally.
    ///
    /// Inserting into an empty section or emptying a section trips up
    /// incremental view updates, so both are flagged.
    pub fn requires_reload(&self) -> bool {
        self.first_add_in_section || self.last_remove_in_section
    }

    /// Total number of section and item edits.
    pub fn change_count(&self) -> usize {
        self.removed_sections.len()
            + self.added_sections.len()
            + self.removed.len()
            + self.added.len()
            + self.moved.len()
            + self.updated.len()
    }
}

impl fmt::Display for EditScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sections -{} +{}, items -{} +{} moved {} updated {}",
            self.removed_sections.len(),
            self.added_sections.len(),
            self.removed.len(),
            self.added.len(),
            self.moved.len(),
            self.updated.len(),
        )?;
        if self.requires_reload() {
            f.write_str(" (reload)")?;
        }
        Ok(())
    }
}

/// Compute the edit script from `previous` to `next`.
///
/// # Panics
///
/// Panics if a model id appears twice within the compared sections of
/// either snapshot.
#[tracing::instrument(skip_all, target = "trellis::diff", level = "trace")]
pub fn diff<M: Model>(previous: &[Vec<M>], next: &[Vec<M>]) -> EditScript {
    let surviving = previous.len().min(next.len());
    let mut script = EditScript {
        removed_sections: (surviving..previous.len()).collect(),
        added_sections: (surviving..next.len()).collect(),
        ..EditScript::default()
    };

    let previous_index = index_by_id(&previous[..surviving]);
    let next_index = index_by_id(&next[..surviving]);

    for (section, models) in previous[..surviving].iter().enumerate() {
        for (item, model) in models.iter().enumerate() {
            if !next_index.contains_key(model.model_id()) {
                script.removed.push(ModelPath::new(section, item));
            }
        }
    }

    for (section, models) in next[..surviving].iter().enumerate() {
        // Items that stayed in this section, in next order, with their old index.
        let mut stayed: Vec<(usize, usize)> = Vec::new();

        for (item, model) in models.iter().enumerate() {
            let to = ModelPath::new(section, item);
            match previous_index.get(model.model_id()) {
                None => script.added.push(to),
                Some(&from) if from.section != section => {
                    script.moved.push(ModelMove::new(from, to));
                }
                Some(&from) => stayed.push((from.item, item)),
            }
        }

        let in_order = kept_in_place(&stayed);

        for (&(old, new), keep) in stayed.iter().zip(in_order) {
            let from = ModelPath::new(section, old);
            let to = ModelPath::new(section, new);
            if !keep {
                script.moved.push(ModelMove::new(from, to));
                continue;
            }

            let changed = previous[section][old].version() != next[section][new].version();
            if changed && from == to {
                script.updated.push(to);
            } else if changed {
                // Shifted and changed: report as a move so the destination is refreshed.
                script.moved.push(ModelMove::new(from, to));
            }
        }

        if previous[section].is_empty() && !models.is_empty() {
            script.first_add_in_section = true;
        }
        if !previous[section].is_empty() && models.is_empty() {
            script.last_remove_in_section = true;
        }
    }

    script.moved.sort_by_key(|m| m.to);

    tracing::trace!(target: targets::DIFF, %script, "computed edit script");
    script
}

/// Map every model id to its path, panicking on duplicates.
fn index_by_id<M: Model>(sections: &[Vec<M>]) -> HashMap<&M::Id, ModelPath> {
    let capacity = sections.iter().map(Vec::len).sum();
    let mut index = HashMap::with_capacity(capacity);
    for (section, models) in sections.iter().enumerate() {
        for (item, model) in models.iter().enumerate() {
            let path = ModelPath::new(section, item);
            if let Some(first) = index.insert(model.model_id(), path) {
                panic_duplicate_id(model.model_id(), first, path);
            }
        }
    }
    index
}

/// Mark the items that stay put: every item whose index did not change, plus
/// the longest in-order run between each pair of such items.
///
/// `stayed` holds `(old, new)` index pairs in new order. Items with
/// `old == new` never conflict with each other, so they are always kept and
/// never reported as moves onto their own position.
fn kept_in_place(stayed: &[(usize, usize)]) -> Vec<bool> {
    let mut keep = vec![false; stayed.len()];
    let mut start = 0;
    let mut low: Option<usize> = None;

    for i in 0..=stayed.len() {
        let anchor = stayed.get(i).filter(|&&(old, new)| old == new).map(|&(old, _)| old);
        if i < stayed.len() && anchor.is_none() {
            continue;
        }

        // Between two anchors only old indices strictly between theirs fit.
        let candidates: Vec<usize> = (start..i)
            .filter(|&j| {
                let old = stayed[j].0;
                low.is_none_or(|low| old > low) && anchor.is_none_or(|high| old < high)
            })
            .collect();
        let values: Vec<usize> = candidates.iter().map(|&j| stayed[j].0).collect();
        for (&j, kept) in candidates.iter().zip(longest_increasing_run(&values)) {
            keep[j] = kept;
        }

        if anchor.is_some() {
            keep[i] = true;
            low = anchor;
            start = i + 1;
        }
    }
    keep
}

/// Mark the members of one longest strictly increasing subsequence.
///
/// Patience sorting with back-links, O(n log n).
fn longest_increasing_run(values: &[usize]) -> Vec<bool> {
    // tails[k] is the index of the smallest tail of an increasing run of length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut back: Vec<Option<usize>> = vec![None; values.len()];

    for (i, &value) in values.iter().enumerate() {
        let pos = tails.partition_point(|&t| values[t] < value);
        if pos > 0 {
            back[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut keep = vec![false; values.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        keep[i] = true;
        cursor = back[i];
    }
    keep
}

#[cold]
#[inline(never)]
fn panic_duplicate_id(id: &dyn fmt::Debug, first: ModelPath, second: ModelPath) -> ! {
    tracing::error!(
        target: targets::DIFF,
        ?id,
        %first,
        %second,
        "duplicate model id in snapshot"
    );
    panic!(
        "duplicate model id {id:?} at {first} and {second}: \
         model ids must be unique within a snapshot"
    )
}

/// A diff engine that remembers the last snapshot it saw.
///
/// Each [`update`](Self::update) diffs against the remembered snapshot and
/// then replaces it.
#[derive(Clone)]
pub struct DiffEngine<M> {
    previous: Sections<M>,
}

impl<M: Model> Default for DiffEngine<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> DiffEngine<M> {
    /// Create an engine whose previous snapshot has no sections.
    pub fn new() -> Self {
        Self {
            previous: Vec::new(),
        }
    }

    /// Create an engine starting from a known snapshot.
    pub fn with_initial(sections: Sections<M>) -> Self {
        Self { previous: sections }
    }

    /// The remembered snapshot.
    pub fn previous(&self) -> &[Vec<M>] {
        &self.previous
    }

    /// Diff `next` against the remembered snapshot, then remember `next`.
    pub fn update(&mut self, next: Sections<M>) -> EditScript {
        let script = diff(&self.previous, &next);
        self.previous = next;
        script
    }

    /// Diff the sections carried by `state`.
    ///
    /// States without models count as an empty snapshot.
    pub fn update_from_state(&mut self, state: &CollectionState<M>) -> EditScript {
        self.update(state.sections().to_vec())
    }

    /// Forget the remembered snapshot without producing a script.
    pub fn reset(&mut self, sections: Sections<M>) {
        self.previous = sections;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::StaticModel;

    type M = StaticModel<()>;

    fn m(id: &str) -> M {
        StaticModel::new(id, ())
    }

    fn mv(id: &str, version: u64) -> M {
        StaticModel::with_version(id, version, ())
    }

    fn snapshot(sections: &[&[&str]]) -> Sections<M> {
        sections
            .iter()
            .map(|s| s.iter().map(|id| m(id)).collect())
            .collect()
    }

    fn p(section: usize, item: usize) -> ModelPath {
        ModelPath::new(section, item)
    }

    /// Apply a script batch-update style and return the resulting ids.
    fn apply(previous: &[Vec<M>], next: &[Vec<M>], script: &EditScript) -> Vec<Vec<String>> {
        let kept = previous.len() - script.removed_sections.len();
        let mut slots: Vec<Vec<Option<String>>> = (0..kept + script.added_sections.len())
            .map(|s| {
                let len = next.get(s).map_or(0, Vec::len);
                vec![None; len]
            })
            .collect();

        // Stayed items: everything in surviving sections not removed or moved.
        for (section, models) in previous[..kept].iter().enumerate() {
            let mut offset = 0;
            let mut positions = Vec::new();
            for (item, model) in models.iter().enumerate() {
                let from = p(section, item);
                if script.removed.contains(&from) || script.moved.iter().any(|m| m.from == from) {
                    continue;
                }
                positions.push(model.id().to_string());
                offset += 1;
            }
            let mut fill = positions.into_iter();
            let free: Vec<usize> = (0..slots[section].len())
                .filter(|&i| {
                    let to = p(section, i);
                    !script.added.contains(&to) && !script.moved.iter().any(|m| m.to == to)
                })
                .collect();
            assert_eq!(free.len(), offset, "stayed count mismatch in section {section}");
            for i in free {
                slots[section][i] = fill.next();
            }
        }
        for path in &script.added {
            slots[path.section][path.item] = Some(next[path.section][path.item].id().to_string());
        }
        for &section in &script.added_sections {
            for (i, model) in next[section].iter().enumerate() {
                slots[section][i] = Some(model.id().to_string());
            }
        }
        for mv in &script.moved {
            slots[mv.to.section][mv.to.item] =
                Some(previous[mv.from.section][mv.from.item].id().to_string());
        }

        slots
            .into_iter()
            .map(|s| s.into_iter().map(|id| id.unwrap()).collect())
            .collect()
    }

    fn ids(sections: &[Vec<M>]) -> Vec<Vec<String>> {
        sections
            .iter()
            .map(|s| s.iter().map(|m| m.id().to_string()).collect())
            .collect()
    }

    fn check_roundtrip(previous: Sections<M>, next: Sections<M>) -> EditScript {
        let script = diff(&previous, &next);
        assert_eq!(apply(&previous, &next, &script), ids(&next), "script: {script}");
        script
    }

    #[test]
    fn test_identical_snapshots() {
        let s = snapshot(&[&["a", "b"], &["c"]]);
        let script = diff(&s, &s);
        assert!(!script.has_changes());
        assert!(!script.requires_reload());
        assert_eq!(script, EditScript::default());
    }

    #[test]
    fn test_same_snapshot_version_change_is_update() {
        let previous = vec![vec![mv("a", 1), mv("b", 1)]];
        let next = vec![vec![mv("a", 1), mv("b", 2)]];
        let script = diff(&previous, &next);
        assert_eq!(script.updated, vec![p(0, 1)]);
        assert_eq!(script.change_count(), 1);
    }

    #[test]
    fn test_pure_swap_is_single_move() {
        let script = check_roundtrip(snapshot(&[&["a", "b"]]), snapshot(&[&["b", "a"]]));
        assert_eq!(script.moved.len(), 1);
        assert!(script.removed.is_empty());
        assert!(script.added.is_empty());
        let only = script.moved[0];
        assert!(
            only == ModelMove::new(p(0, 0), p(0, 1)) || only == ModelMove::new(p(0, 1), p(0, 0))
        );
    }

    #[test]
    fn test_insert_does_not_move_followers() {
        let script = check_roundtrip(snapshot(&[&["a", "b", "c"]]), snapshot(&[&["x", "a", "b", "c"]]));
        assert_eq!(script.added, vec![p(0, 0)]);
        assert!(script.moved.is_empty());
    }

    #[test]
    fn test_removals_and_additions() {
        let script = check_roundtrip(
            snapshot(&[&["a", "b", "c"], &["d"]]),
            snapshot(&[&["a", "c", "e"], &["d", "f"]]),
        );
        assert_eq!(script.removed, vec![p(0, 1)]);
        assert_eq!(script.added, vec![p(0, 2), p(1, 1)]);
        assert!(script.moved.is_empty());
    }

    #[test]
    fn test_cross_section_move() {
        let script = check_roundtrip(snapshot(&[&["a", "b"], &["c"]]), snapshot(&[&["b"], &["c", "a"]]));
        assert_eq!(script.moved, vec![ModelMove::new(p(0, 0), p(1, 1))]);
        assert!(!script.requires_reload());
    }

    #[test]
    fn test_item_in_place_is_never_moved() {
        let previous = vec![vec![mv("a", 1), mv("b", 1), mv("c", 1)]];
        let next = vec![vec![mv("c", 1), mv("b", 2), mv("a", 1)]];
        let script = check_roundtrip(previous, next);

        assert!(script.moved.iter().all(|m| m.from != m.to), "script: {script}");
        assert_eq!(script.moved.len(), 2);
        assert_eq!(script.updated, vec![p(0, 1)]);
    }

    #[test]
    fn test_in_place_items_split_runs() {
        let script = check_roundtrip(
            snapshot(&[&["a", "b", "c", "d", "e"]]),
            snapshot(&[&["d", "b", "a", "c", "e"]]),
        );
        assert!(script.moved.iter().all(|m| m.from != m.to));
        assert_eq!(
            script.moved,
            vec![ModelMove::new(p(0, 3), p(0, 0)), ModelMove::new(p(0, 0), p(0, 2))]
        );
    }

    #[test]
    fn test_reversal_is_minimal() {
        let script = check_roundtrip(
            snapshot(&[&["a", "b", "c", "d"]]),
            snapshot(&[&["d", "c", "b", "a"]]),
        );
        assert_eq!(script.moved.len(), 3);
    }

    #[test]
    fn test_sections_diffed_by_position() {
        let script = check_roundtrip(snapshot(&[&["a"], &["b"], &["c"]]), snapshot(&[&["a"]]));
        assert_eq!(script.removed_sections, vec![1, 2]);
        assert!(script.removed.is_empty());

        let script = check_roundtrip(snapshot(&[&["a"]]), snapshot(&[&["a"], &["b", "c"]]));
        assert_eq!(script.added_sections, vec![1]);
        assert!(script.added.is_empty());
    }

    #[test]
    fn test_item_leaving_removed_section_is_added() {
        let script = check_roundtrip(snapshot(&[&["a"], &["b"]]), snapshot(&[&["a", "b"]]));
        assert_eq!(script.removed_sections, vec![1]);
        assert_eq!(script.added, vec![p(0, 1)]);
    }

    #[test]
    fn test_first_add_in_empty_section() {
        let script = diff(&snapshot(&[&[]]), &snapshot(&[&["x"]]));
        assert!(script.first_add_in_section);
        assert!(!script.last_remove_in_section);
        assert!(script.requires_reload());
        assert_eq!(script.added, vec![p(0, 0)]);
    }

    #[test]
    fn test_last_remove_empties_section() {
        let script = diff(&snapshot(&[&["x"]]), &snapshot(&[&[]]));
        assert!(script.last_remove_in_section);
        assert!(!script.first_add_in_section);
        assert_eq!(script.removed, vec![p(0, 0)]);
    }

    #[test]
    fn test_move_emptying_section_is_flagged() {
        let script = diff(&snapshot(&[&["a"], &["b"]]), &snapshot(&[&[], &["b", "a"]]));
        assert!(script.last_remove_in_section);
        assert_eq!(script.moved.len(), 1);
    }

    #[test]
    fn test_shifted_and_changed_is_move() {
        let previous = vec![vec![mv("a", 1), mv("b", 1)]];
        let next = vec![vec![mv("x", 1), mv("a", 1), mv("b", 2)]];
        let script = diff(&previous, &next);
        assert_eq!(script.added, vec![p(0, 0)]);
        assert!(script.updated.is_empty());
        assert_eq!(script.moved, vec![ModelMove::new(p(0, 1), p(0, 2))]);
    }

    #[test]
    #[should_panic(expected = "duplicate model id")]
    fn test_duplicate_id_panics() {
        diff(&snapshot(&[&["a", "a"]]), &snapshot(&[&["a"]]));
    }

    #[test]
    fn test_engine_remembers_previous() {
        let mut engine = DiffEngine::new();
        let first = engine.update(snapshot(&[&["a"]]));
        assert_eq!(first.added_sections, vec![0]);

        let second = engine.update(snapshot(&[&["a", "b"]]));
        assert_eq!(second.added, vec![p(0, 1)]);
        assert_eq!(engine.previous().len(), 1);

        let third = engine.update_from_state(&CollectionState::NotLoaded);
        assert_eq!(third.removed_sections, vec![0]);
        assert!(engine.previous().is_empty());
    }

    #[test]
    fn test_longest_increasing_run() {
        assert_eq!(longest_increasing_run(&[]), Vec::<bool>::new());
        assert_eq!(longest_increasing_run(&[1, 0]).iter().filter(|k| **k).count(), 1);
        assert_eq!(
            longest_increasing_run(&[0, 4, 1, 2, 3]),
            vec![true, false, true, true, true]
        );
    }

    #[test]
    fn test_display_summary() {
        let script = diff(&snapshot(&[&["x"]]), &snapshot(&[&[]]));
        assert_eq!(
            script.to_string(),
            "sections -0 +0, items -1 +0 moved 0 updated 0 (reload)"
        );
    }
}
