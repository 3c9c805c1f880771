//! Debounce, throttle and coalesce over a [`SerialQueue`].
//!
//! These regulate how often upstream producers push new snapshots into the
//! diff pipeline. Each primitive owns an action and exposes a single
//! `trigger(value)` entry point:
//!
//! - [`Debounce`] - each trigger replaces the pending invocation; only the
//!   last trigger within `wait` fires, `wait` after that trigger.
//! - [`Throttle`] - the first trigger fires immediately and starts a cooldown;
//!   triggers during the cooldown are dropped, not queued.
//! - [`Coalesce`] - triggers are folded with a reducer until `window` has
//!   elapsed since the first unflushed trigger, then delivered once.
//!
//! Cancellation is implicit: a new debounce trigger cancels the pending one,
//! and dropping a primitive cancels whatever it has scheduled.
//!
//! Timed callbacks run on the queue's execution context. Triggers should come
//! from that same context; internal state is locked, so other callers are
//! serialized but see no ordering guarantee relative to the queue.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trellis_core::{Coalesce, ManualQueue};
//!
//! let queue = Arc::new(ManualQueue::new());
//! let coalesce = Coalesce::extending(queue.clone(), Duration::from_millis(100), |ids: Vec<u32>| {
//!     println!("reload {ids:?}");
//! });
//!
//! coalesce.trigger(vec![1]);
//! coalesce.trigger(vec![2]);
//! queue.advance(Duration::from_millis(100)); // prints "reload [1, 2]"
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::logging::targets;
use crate::queue::{SerialQueue, TaskHandle};

type Action<T> = Box<dyn Fn(T) + Send + Sync>;
type Reducer<T> = Box<dyn Fn(T, T) -> T + Send + Sync>;

// ============================================================================
// Debounce
// ============================================================================

/// Postpones its action until `wait` has elapsed since the last trigger.
pub struct Debounce<T: Send + 'static> {
    inner: Arc<DebounceInner<T>>,
}

struct DebounceInner<T> {
    queue: Arc<dyn SerialQueue>,
    wait: Duration,
    action: Action<T>,
    /// Generation of the scheduled invocation, plus its handle.
    pending: Mutex<Option<(u64, TaskHandle)>>,
    generation: Mutex<u64>,
}

impl<T: Send + 'static> Debounce<T> {
    /// Create a debounced version of `action`.
    pub fn new<F>(queue: Arc<dyn SerialQueue>, wait: Duration, action: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(DebounceInner {
                queue,
                wait,
                action: Box::new(action),
                pending: Mutex::new(None),
                generation: Mutex::new(0),
            }),
        }
    }

    /// Schedule the action with `value`, replacing any pending invocation.
    pub fn trigger(&self, value: T) {
        let generation = {
            let mut generation = self.inner.generation.lock();
            *generation += 1;
            *generation
        };

        let mut pending = self.inner.pending.lock();
        if let Some((_, handle)) = pending.take() {
            self.inner.queue.cancel(handle);
            tracing::trace!(target: targets::PACING, "debounce replaced pending invocation");
        }

        let weak: Weak<DebounceInner<T>> = Arc::downgrade(&self.inner);
        let task = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.fire(generation, value);
            }
        });

        match self.inner.queue.schedule_after(self.inner.wait, task) {
            Ok(handle) => *pending = Some((generation, handle)),
            Err(err) => {
                tracing::warn!(target: targets::PACING, %err, "debounce could not schedule invocation");
            }
        }
    }

    /// Whether an invocation is scheduled and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// The debounce interval.
    pub fn wait(&self) -> Duration {
        self.inner.wait
    }
}

impl<T> DebounceInner<T> {
    fn fire(&self, generation: u64, value: T) {
        {
            let mut pending = self.pending.lock();
            if pending
                .as_ref()
                .is_some_and(|(current, _)| *current == generation)
            {
                *pending = None;
            }
        }
        tracing::trace!(target: targets::PACING, "debounce fired");
        (self.action)(value);
    }
}

impl<T: Send + 'static> Drop for Debounce<T> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.inner.pending.lock().take() {
            self.inner.queue.cancel(handle);
        }
    }
}

// ============================================================================
// Throttle
// ============================================================================

/// Runs its action at most once per `wait`, dropping triggers in between.
pub struct Throttle<T: Send + 'static> {
    inner: Arc<ThrottleInner<T>>,
}

struct ThrottleInner<T> {
    queue: Arc<dyn SerialQueue>,
    wait: Duration,
    action: Action<T>,
    /// Handle of the task that ends the current cooldown.
    cooldown: Mutex<Option<TaskHandle>>,
}

impl<T: Send + 'static> Throttle<T> {
    /// Create a throttled version of `action`.
    pub fn new<F>(queue: Arc<dyn SerialQueue>, wait: Duration, action: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(ThrottleInner {
                queue,
                wait,
                action: Box::new(action),
                cooldown: Mutex::new(None),
            }),
        }
    }

    /// Run the action with `value` now unless a cooldown is active.
    ///
    /// Returns `true` if the action ran.
    pub fn trigger(&self, value: T) -> bool {
        {
            let mut cooldown = self.inner.cooldown.lock();
            if cooldown.is_some() {
                tracing::trace!(target: targets::PACING, "throttle dropped trigger during cooldown");
                return false;
            }

            let weak: Weak<ThrottleInner<T>> = Arc::downgrade(&self.inner);
            let reset = Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    *inner.cooldown.lock() = None;
                    tracing::trace!(target: targets::PACING, "throttle cooldown ended");
                }
            });
            match self.inner.queue.schedule_after(self.inner.wait, reset) {
                Ok(handle) => *cooldown = Some(handle),
                Err(err) => {
                    // Without a reset task the cooldown would never end.
                    tracing::warn!(target: targets::PACING, %err, "throttle could not schedule cooldown");
                }
            }
        }

        (self.inner.action)(value);
        true
    }

    /// Whether triggers are currently being dropped.
    pub fn is_cooling_down(&self) -> bool {
        self.inner.cooldown.lock().is_some()
    }

    /// The throttle interval.
    pub fn wait(&self) -> Duration {
        self.inner.wait
    }
}

impl<T: Send + 'static> Drop for Throttle<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.cooldown.lock().take() {
            self.inner.queue.cancel(handle);
        }
    }
}

// ============================================================================
// Coalesce
// ============================================================================

/// Folds triggers with a reducer and delivers the result once per window.
///
/// The window opens with the first trigger after a delivery and closes
/// `window` later, regardless of how many triggers arrive in between.
pub struct Coalesce<T: Send + 'static> {
    inner: Arc<CoalesceInner<T>>,
}

struct CoalesceInner<T> {
    queue: Arc<dyn SerialQueue>,
    window: Duration,
    reducer: Reducer<T>,
    action: Action<T>,
    pending: Mutex<Option<Batch<T>>>,
}

struct Batch<T> {
    value: T,
    handle: TaskHandle,
}

impl<T: Send + 'static> Coalesce<T> {
    /// Create a coalescing version of `action` that folds values with
    /// `reducer(accumulated, new)`.
    ///
    /// The reducer runs while the batch is locked and must not trigger this
    /// coalescer again.
    pub fn new<R, F>(queue: Arc<dyn SerialQueue>, window: Duration, reducer: R, action: F) -> Self
    where
        R: Fn(T, T) -> T + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(CoalesceInner {
                queue,
                window,
                reducer: Box::new(reducer),
                action: Box::new(action),
                pending: Mutex::new(None),
            }),
        }
    }

    /// Add `value` to the current batch, opening a window if none is open.
    ///
    /// If the queue refuses the flush timer, `value` is delivered right away.
    pub fn trigger(&self, value: T) {
        let mut pending = self.inner.pending.lock();
        match pending.take() {
            Some(batch) => {
                *pending = Some(Batch {
                    value: (self.inner.reducer)(batch.value, value),
                    handle: batch.handle,
                });
            }
            None => {
                let weak: Weak<CoalesceInner<T>> = Arc::downgrade(&self.inner);
                let flush = Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.deliver();
                    }
                });
                match self.inner.queue.schedule_after(self.inner.window, flush) {
                    Ok(handle) => {
                        tracing::trace!(target: targets::PACING, window = ?self.inner.window, "coalesce window opened");
                        *pending = Some(Batch { value, handle });
                    }
                    Err(err) => {
                        // No timer would ever close the window, so deliver now.
                        tracing::warn!(target: targets::PACING, %err, "coalesce could not schedule flush");
                        drop(pending);
                        (self.inner.action)(value);
                    }
                }
            }
        }
    }

    /// Deliver the pending batch immediately, cancelling its timer.
    ///
    /// Returns `true` if there was a batch to deliver.
    pub fn flush(&self) -> bool {
        let batch = self.inner.pending.lock().take();
        match batch {
            Some(batch) => {
                self.inner.queue.cancel(batch.handle);
                (self.inner.action)(batch.value);
                true
            }
            None => false,
        }
    }

    /// Whether a batch is waiting for its window to close.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.lock().is_some()
    }

    /// The coalescing window.
    pub fn window(&self) -> Duration {
        self.inner.window
    }
}

impl<T> Coalesce<T>
where
    T: IntoIterator + Extend<<T as IntoIterator>::Item> + Send + 'static,
{
    /// Coalesce collections by extending the accumulator with each new value.
    ///
    /// Concatenates `Vec`s and unions `HashSet`s/`BTreeSet`s.
    pub fn extending<F>(queue: Arc<dyn SerialQueue>, window: Duration, action: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new(
            queue,
            window,
            |mut accumulated: T, next: T| {
                accumulated.extend(next);
                accumulated
            },
            action,
        )
    }
}

impl<T> CoalesceInner<T> {
    fn deliver(&self) {
        let batch = self.pending.lock().take();
        if let Some(batch) = batch {
            tracing::trace!(target: targets::PACING, "coalesce window closed");
            (self.action)(batch.value);
        }
    }
}

impl<T: Send + 'static> Drop for Coalesce<T> {
    fn drop(&mut self) {
        let batch = self.inner.pending.lock().take();
        if let Some(batch) = batch {
            self.inner.queue.cancel(batch.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{ManualQueue, ThreadQueue};
    use std::collections::HashSet;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Records `(elapsed, value)` for each delivery.
    fn recorder<T: Send + 'static>(
        queue: &Arc<ManualQueue>,
    ) -> (Arc<Mutex<Vec<(Duration, T)>>>, impl Fn(T) + Send + Sync + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let q = queue.clone();
        (log, move |value: T| l.lock().push((q.elapsed(), value)))
    }

    #[test]
    fn test_debounce_fires_once_with_last_value() {
        let queue = Arc::new(ManualQueue::new());
        let (log, action) = recorder(&queue);
        let debounce = Debounce::new(queue.clone(), ms(50), action);

        debounce.trigger("a");
        queue.advance(ms(10));
        debounce.trigger("b");
        queue.advance(ms(10));
        debounce.trigger("c");
        assert!(debounce.is_pending());

        queue.advance(ms(49));
        assert!(log.lock().is_empty());

        queue.advance(ms(100));
        assert_eq!(*log.lock(), vec![(ms(70), "c")]);
        assert!(!debounce.is_pending());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_debounce_separate_bursts() {
        let queue = Arc::new(ManualQueue::new());
        let (log, action) = recorder(&queue);
        let debounce = Debounce::new(queue.clone(), ms(20), action);

        debounce.trigger(1);
        queue.advance(ms(30));
        debounce.trigger(2);
        queue.advance(ms(30));

        assert_eq!(*log.lock(), vec![(ms(20), 1), (ms(50), 2)]);
    }

    #[test]
    fn test_debounce_drop_cancels_pending() {
        let queue = Arc::new(ManualQueue::new());
        let (log, action) = recorder::<i32>(&queue);

        let debounce = Debounce::new(queue.clone(), ms(20), action);
        debounce.trigger(1);
        drop(debounce);

        queue.advance(ms(100));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_throttle_drops_during_cooldown() {
        let queue = Arc::new(ManualQueue::new());
        let (log, action) = recorder(&queue);
        let throttle = Throttle::new(queue.clone(), ms(50), action);

        assert!(throttle.trigger(1));
        assert!(throttle.is_cooling_down());
        queue.advance(ms(20));
        assert!(!throttle.trigger(2));
        queue.advance(ms(29));
        assert!(!throttle.trigger(3));

        queue.advance(ms(1));
        assert!(!throttle.is_cooling_down());
        queue.advance(ms(10));
        assert!(throttle.trigger(4));

        assert_eq!(*log.lock(), vec![(ms(0), 1), (ms(60), 4)]);
    }

    #[test]
    fn test_coalesce_batches_within_window() {
        let queue = Arc::new(ManualQueue::new());
        let (log, action) = recorder(&queue);
        let coalesce = Coalesce::extending(queue.clone(), ms(100), action);

        coalesce.trigger(vec![1]);
        queue.advance(ms(30));
        coalesce.trigger(vec![2]);
        queue.advance(ms(70));
        assert_eq!(*log.lock(), vec![(ms(100), vec![1, 2])]);
        assert!(!coalesce.is_pending());

        queue.advance(ms(50));
        coalesce.trigger(vec![3]);
        queue.advance(ms(99));
        assert_eq!(log.lock().len(), 1);
        queue.advance(ms(1));
        assert_eq!(log.lock()[1], (ms(250), vec![3]));
    }

    #[test]
    fn test_coalesce_set_union() {
        let queue = Arc::new(ManualQueue::new());
        let (log, action) = recorder::<HashSet<&str>>(&queue);
        let coalesce = Coalesce::extending(queue.clone(), ms(10), action);

        coalesce.trigger(HashSet::from(["a", "b"]));
        coalesce.trigger(HashSet::from(["b", "c"]));
        queue.advance(ms(10));

        let log = log.lock();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].1, HashSet::from(["a", "b", "c"]));
    }

    #[test]
    fn test_coalesce_custom_reducer_and_flush() {
        let queue = Arc::new(ManualQueue::new());
        let (log, action) = recorder(&queue);
        let coalesce = Coalesce::new(queue.clone(), ms(100), |a: u32, b: u32| a.max(b), action);

        coalesce.trigger(3);
        coalesce.trigger(7);
        coalesce.trigger(5);
        assert!(coalesce.flush());
        assert!(!coalesce.flush());

        queue.advance(ms(200));
        assert_eq!(*log.lock(), vec![(ms(0), 7)]);
    }

    #[test]
    fn test_coalesce_delivers_immediately_when_queue_is_shut_down() {
        let queue = ThreadQueue::new().unwrap();
        queue.shutdown();

        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let coalesce = Coalesce::extending(Arc::new(queue), ms(100), move |batch: Vec<u32>| {
            l.lock().push(batch)
        });

        coalesce.trigger(vec![1]);
        assert!(!coalesce.is_pending());
        coalesce.trigger(vec![2]);
        assert!(!coalesce.is_pending());
        assert!(!coalesce.flush());

        assert_eq!(*log.lock(), vec![vec![1], vec![2]]);
    }
}
