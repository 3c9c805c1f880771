//! Integration tests: pacing primitives regulating snapshot production.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use trellis::collection::{
    CollectionEvent, DiffEngine, EditScript, ModelCollection, ModelCollectionExt,
    SimpleModelCollection, StaticModel,
};
use trellis::{Coalesce, Debounce, ManualQueue, SerialQueue, ThreadQueue, ThreadQueueBuilder, Throttle};

type Row = StaticModel<u32>;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// A collection plus a diff engine recording every script it produces.
fn observed_collection() -> (Arc<SimpleModelCollection<Row>>, Arc<Mutex<Vec<EditScript>>>) {
    let collection = Arc::new(SimpleModelCollection::new("rows"));
    let engine = Arc::new(Mutex::new(DiffEngine::new()));
    let scripts = Arc::new(Mutex::new(Vec::new()));
    let s = scripts.clone();
    collection.observe(move |state| {
        let script = engine.lock().update_from_state(state);
        s.lock().push(script);
    });
    (collection, scripts)
}

#[test]
fn test_coalesced_ids_become_one_snapshot() {
    let queue = Arc::new(ManualQueue::new());
    let (collection, scripts) = observed_collection();

    let target = collection.clone();
    let coalesce = Coalesce::extending(queue.clone(), ms(100), move |ids: Vec<u32>| {
        let rows = ids
            .iter()
            .map(|id| StaticModel::new(format!("row-{id}"), *id))
            .collect();
        target.on_next(CollectionEvent::Loaded(vec![rows]));
    });

    coalesce.trigger(vec![1]);
    queue.advance(ms(30));
    coalesce.trigger(vec![2]);
    queue.advance(ms(69));
    assert!(scripts.lock().is_empty());

    queue.advance(ms(1));
    {
        let scripts = scripts.lock();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].added_sections, vec![0]);
    }
    assert_eq!(collection.state().model_count(), 2);

    queue.advance(ms(50));
    coalesce.trigger(vec![3]);
    queue.advance(ms(100));
    assert_eq!(queue.elapsed(), ms(250));
    let scripts = scripts.lock();
    assert_eq!(scripts.len(), 2);
    assert_eq!(scripts[1].removed.len(), 2);
    assert_eq!(scripts[1].added.len(), 1);
}

#[test]
fn test_debounced_search_emits_last_query_once() {
    let queue = Arc::new(ManualQueue::new());
    let fired = Arc::new(Mutex::new(Vec::new()));
    let (f, q) = (fired.clone(), queue.clone());
    let search = Debounce::new(queue.clone(), ms(50), move |query: &'static str| {
        f.lock().push((q.elapsed(), query));
    });

    search.trigger("t");
    queue.advance(ms(10));
    search.trigger("tr");
    queue.advance(ms(10));
    search.trigger("tre");
    queue.run_until_idle();

    assert_eq!(*fired.lock(), vec![(ms(70), "tre")]);
}

#[test]
fn test_throttled_refresh_drops_bursts() {
    let queue = Arc::new(ManualQueue::new());
    let (collection, scripts) = observed_collection();
    let target = collection.clone();
    let refresh = Throttle::new(queue.clone(), ms(100), move |version: u64| {
        let row = StaticModel::with_version("row", version, 0);
        target.on_next(CollectionEvent::Loaded(vec![vec![row]]));
    });

    for version in 0..5 {
        refresh.trigger(version);
        queue.advance(ms(10));
    }
    queue.advance(ms(60));
    refresh.trigger(9);

    let scripts = scripts.lock();
    assert_eq!(scripts.len(), 2);
    assert_eq!(scripts[1].updated.len(), 1);
}

#[test]
fn test_thread_queue_drives_collection_serially() {
    let queue = Arc::new(
        ThreadQueueBuilder::new()
            .name("trellis-test")
            .build()
            .expect("spawn queue"),
    );
    let (tx, rx) = bounded(1);

    // The collection is driven from the queue thread only.
    let collection: Arc<SimpleModelCollection<Row>> = Arc::new(SimpleModelCollection::new("rows"));
    let target = collection.clone();
    let coalesce = Coalesce::extending(queue.clone(), ms(20), move |ids: Vec<u32>| {
        let rows = ids.iter().map(|id| StaticModel::new(id.to_string(), *id)).collect();
        target.on_next(CollectionEvent::Loaded(vec![rows]));
        let _ = tx.send(std::thread::current().name().map(str::to_string));
    });

    let started = Instant::now();
    coalesce.trigger(vec![1, 2]);
    coalesce.trigger(vec![3]);

    let thread_name = rx.recv_timeout(Duration::from_secs(5)).expect("flush");
    assert!(started.elapsed() >= ms(20));
    assert_eq!(thread_name.as_deref(), Some("trellis-test"));
    assert_eq!(collection.state().model_count(), 3);

    queue.shutdown();
    assert!(queue.schedule(Box::new(|| {})).is_err());
}

#[test]
fn test_thread_queue_default_config() {
    let queue = ThreadQueue::new().expect("spawn queue");
    assert!(queue.is_running());
    assert_eq!(queue.name(), "trellis-serial");
}
