//! Serial task queues.
//!
//! A [`SerialQueue`] runs scheduled tasks one at a time, in deadline order,
//! on a single execution context. The pacing primitives in
//! [`crate::pacing`] are built on top of it.
//!
//! Two implementations are provided:
//!
//! - [`ManualQueue`] - a virtual clock advanced explicitly by the caller.
//!   Tasks run on the thread that advances the clock. Deterministic, so it is
//!   the natural choice for tests and for hosts that own their own run loop.
//! - [`ThreadQueue`] - a dedicated worker thread that sleeps until the next
//!   deadline.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use trellis_core::{ManualQueue, SerialQueue};
//!
//! let queue = ManualQueue::new();
//! queue
//!     .schedule_after(Duration::from_millis(10), Box::new(|| println!("tick")))
//!     .unwrap();
//! assert_eq!(queue.advance(Duration::from_millis(10)), 1);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::error::{Error, Result};
use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a scheduled task.
    ///
    /// Returned by [`SerialQueue::schedule_after`] and accepted by
    /// [`SerialQueue::cancel`].
    pub struct TaskHandle;
}

/// A boxed task closure.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A serial execution context with timed scheduling.
///
/// Implementations must run tasks one at a time. Tasks due at the same
/// instant run in submission order.
pub trait SerialQueue: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// The queue's notion of the current time.
    fn now(&self) -> Instant;

    /// Schedule `task` to run once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, task: Task) -> Result<TaskHandle>;

    /// Cancel a pending task.
    ///
    /// Returns `true` if the task was pending and will no longer run.
    fn cancel(&self, handle: TaskHandle) -> bool;

    /// Schedule `task` to run as soon as possible.
    fn schedule(&self, task: Task) -> Result<TaskHandle> {
        self.schedule_after(Duration::ZERO, task)
    }
}

/// An entry in the agenda (min-heap by run time, then submission order).
#[derive(Debug, Clone, Copy)]
struct AgendaEntry {
    handle: TaskHandle,
    run_at: Instant,
    seq: u64,
}

impl PartialEq for AgendaEntry {
    fn eq(&self, other: &Self) -> bool {
        self.run_at == other.run_at && self.seq == other.seq
    }
}

impl Eq for AgendaEntry {}

impl PartialOrd for AgendaEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgendaEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other
            .run_at
            .cmp(&self.run_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending tasks keyed by handle, plus the deadline heap.
struct Agenda {
    tasks: SlotMap<TaskHandle, Task>,
    queue: BinaryHeap<AgendaEntry>,
    next_seq: u64,
}

impl Agenda {
    fn new() -> Self {
        Self {
            tasks: SlotMap::with_key(),
            queue: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    fn insert(&mut self, run_at: Instant, task: Task) -> TaskHandle {
        let handle = self.tasks.insert(task);
        self.queue.push(AgendaEntry {
            handle,
            run_at,
            seq: self.next_seq,
        });
        self.next_seq += 1;
        handle
    }

    /// Remove a pending task and hand it back.
    ///
    /// Callers drop the task after releasing their lock, since its captures
    /// may re-enter the queue when dropped.
    fn cancel(&mut self, handle: TaskHandle) -> Option<Task> {
        // The heap entry is skipped lazily once its task is gone.
        self.tasks.remove(handle)
    }

    /// Drop cancelled entries from the front of the heap.
    fn prune(&mut self) {
        while let Some(entry) = self.queue.peek() {
            if self.tasks.contains_key(entry.handle) {
                break;
            }
            self.queue.pop();
        }
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        self.prune();
        self.queue.peek().map(|entry| entry.run_at)
    }

    /// Remove and return the earliest task due at or before `now`.
    fn pop_due(&mut self, now: Instant) -> Option<(Instant, Task)> {
        self.prune();
        let entry = *self.queue.peek()?;
        if entry.run_at > now {
            return None;
        }
        self.queue.pop();
        self.tasks.remove(entry.handle).map(|task| (entry.run_at, task))
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Remove every pending task and hand them back, to be dropped unlocked.
    fn clear(&mut self) -> Vec<Task> {
        self.queue.clear();
        self.tasks.drain().map(|(_, task)| task).collect()
    }
}

// ============================================================================
// ManualQueue
// ============================================================================

struct ManualState {
    now: Instant,
    agenda: Agenda,
}

/// A serial queue driven by a virtual clock.
///
/// Time only moves when [`advance`](Self::advance),
/// [`advance_to`](Self::advance_to) or
/// [`run_until_idle`](Self::run_until_idle) is called; due tasks run on the
/// calling thread with the queue unlocked, so they may schedule more work.
pub struct ManualQueue {
    name: String,
    origin: Instant,
    state: Mutex<ManualState>,
}

impl Default for ManualQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualQueue {
    /// Create a new queue whose clock starts now.
    pub fn new() -> Self {
        Self::with_name("manual")
    }

    /// Create a new queue with a name for logging.
    pub fn with_name(name: impl Into<String>) -> Self {
        let origin = Instant::now();
        Self {
            name: name.into(),
            origin,
            state: Mutex::new(ManualState {
                now: origin,
                agenda: Agenda::new(),
            }),
        }
    }

    /// Virtual time elapsed since the queue was created.
    pub fn elapsed(&self) -> Duration {
        self.state.lock().now - self.origin
    }

    /// Number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.state.lock().agenda.len()
    }

    /// Advance the clock by `by`, running every task that becomes due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        self.advance_to(target)
    }

    /// Advance the clock to `target`, running every task due by then.
    ///
    /// Tasks observe the clock at their own deadline while they run. Returns
    /// the number of tasks run.
    pub fn advance_to(&self, target: Instant) -> usize {
        let mut ran = 0;
        loop {
            let task = {
                let mut state = self.state.lock();
                match state.agenda.pop_due(target) {
                    Some((run_at, task)) => {
                        state.now = state.now.max(run_at);
                        task
                    }
                    None => {
                        state.now = state.now.max(target);
                        break;
                    }
                }
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Run tasks in deadline order until none remain, jumping the clock to
    /// each deadline.
    ///
    /// A task that always reschedules itself makes this loop forever.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = {
                let mut state = self.state.lock();
                let Some(deadline) = state.agenda.next_deadline() else {
                    break;
                };
                let now = state.now.max(deadline);
                match state.agenda.pop_due(now) {
                    Some((_, task)) => {
                        state.now = now;
                        task
                    }
                    None => break,
                }
            };
            task();
            ran += 1;
        }
        ran
    }
}

impl SerialQueue for ManualQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn now(&self) -> Instant {
        self.state.lock().now
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> Result<TaskHandle> {
        let mut state = self.state.lock();
        let run_at = state.now + delay;
        let handle = state.agenda.insert(run_at, task);
        tracing::trace!(target: targets::QUEUE, queue = %self.name, ?handle, ?delay, "task scheduled");
        Ok(handle)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        let task = self.state.lock().agenda.cancel(handle);
        task.is_some()
    }
}

// ============================================================================
// ThreadQueue
// ============================================================================

/// Configuration for creating a [`ThreadQueue`].
#[derive(Debug, Clone)]
pub struct ThreadQueueConfig {
    /// Name for the queue thread.
    pub name: String,
    /// Stack size for the queue thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
}

impl Default for ThreadQueueConfig {
    fn default() -> Self {
        Self {
            name: "trellis-serial".to_string(),
            stack_size: None,
        }
    }
}

impl ThreadQueueConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Builder for creating thread queues with custom configuration.
#[derive(Debug, Default)]
pub struct ThreadQueueBuilder {
    config: ThreadQueueConfig,
}

impl ThreadQueueBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the stack size for the queue thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Build and start the queue.
    pub fn build(self) -> Result<ThreadQueue> {
        ThreadQueue::with_config(self.config)
    }
}

/// State shared between the queue handle and its thread.
struct ThreadShared {
    agenda: Mutex<Agenda>,
    running: AtomicBool,
}

/// A serial queue backed by a dedicated thread.
///
/// The thread sleeps until the earliest deadline or until new work arrives.
/// Dropping the queue shuts it down; pending tasks are discarded.
pub struct ThreadQueue {
    name: String,
    shared: Arc<ThreadShared>,
    waker: Sender<()>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadQueue {
    /// Create a queue with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(ThreadQueueConfig::default())
    }

    /// Create a queue with custom configuration.
    pub fn with_config(config: ThreadQueueConfig) -> Result<Self> {
        let (waker, wakeups) = unbounded();
        let shared = Arc::new(ThreadShared {
            agenda: Mutex::new(Agenda::new()),
            running: AtomicBool::new(true),
        });

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let thread_shared = shared.clone();
        let handle = builder
            .spawn(move || queue_loop(wakeups, thread_shared))
            .map_err(|err| Error::spawn(&config.name, err))?;

        tracing::debug!(target: targets::QUEUE, queue = %config.name, "thread queue started");

        Ok(Self {
            name: config.name,
            shared,
            waker,
            thread_id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Check if the queue still accepts work.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(AtomicOrdering::Acquire)
    }

    /// Number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.shared.agenda.lock().len()
    }

    /// Whether the caller is running on this queue's thread.
    pub fn is_queue_thread(&self) -> bool {
        self.thread_id == thread::current().id()
    }

    /// Stop accepting work, discard pending tasks and join the thread.
    ///
    /// A task currently running is allowed to finish. Calling this from a
    /// task on the queue itself stops the queue without joining.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, AtomicOrdering::AcqRel) {
            return;
        }
        let discarded = self.shared.agenda.lock().clear();
        drop(discarded);
        let _ = self.waker.send(());

        if self.is_queue_thread() {
            return;
        }
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!(target: targets::QUEUE, queue = %self.name, "queue thread panicked");
            }
        }
        tracing::debug!(target: targets::QUEUE, queue = %self.name, "thread queue stopped");
    }
}

impl SerialQueue for ThreadQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> Result<TaskHandle> {
        if !self.is_running() {
            return Err(Error::queue_shut_down(&self.name));
        }
        let handle = self.shared.agenda.lock().insert(Instant::now() + delay, task);
        // Unbounded channel: the only failure is a gone receiver, which
        // means the thread already exited.
        if self.waker.send(()).is_err() {
            let task = self.shared.agenda.lock().cancel(handle);
            drop(task);
            return Err(Error::queue_shut_down(&self.name));
        }
        Ok(handle)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        let task = self.shared.agenda.lock().cancel(handle);
        task.is_some()
    }
}

impl Drop for ThreadQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum Step {
    Run(Task),
    Wait(Option<Instant>),
}

/// The queue thread: run due tasks, otherwise sleep until the next deadline
/// or a wakeup.
fn queue_loop(wakeups: Receiver<()>, shared: Arc<ThreadShared>) {
    while shared.running.load(AtomicOrdering::Acquire) {
        let step = {
            let mut agenda = shared.agenda.lock();
            match agenda.pop_due(Instant::now()) {
                Some((_, task)) => Step::Run(task),
                None => Step::Wait(agenda.next_deadline()),
            }
        };

        match step {
            Step::Run(task) => task(),
            Step::Wait(Some(deadline)) => match wakeups.recv_deadline(deadline) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            },
            Step::Wait(None) => {
                if wakeups.recv().is_err() {
                    break;
                }
            }
        }
    }
}

static_assertions::assert_impl_all!(ManualQueue: Send, Sync);
static_assertions::assert_impl_all!(ThreadQueue: Send, Sync);
