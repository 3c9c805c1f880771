//! Trellis Outline Example
//!
//! Drives a two-level outline from a serial queue thread:
//! - Coalesced id batches become collection snapshots
//! - Tree events are printed as they would be applied to a view
//!
//! Run with: cargo run -p trellis --example outline

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::bounded;
use trellis::collection::{CollectionEvent, SimpleModelCollection, StaticModel};
use trellis::tree::{ExpandableCollection, NestedModelCollection, NestedTreeController, TreePath};
use trellis::{Coalesce, SerialQueue, ThreadQueueBuilder};

type Heading = StaticModel<String>;

fn heading(id: &str) -> Heading {
    StaticModel::new(id, format!("Heading {id}"))
}

fn main() -> trellis::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let queue = Arc::new(ThreadQueueBuilder::new().name("outline").build()?);

    let chapters: Arc<SimpleModelCollection<Heading>> =
        Arc::new(SimpleModelCollection::new("chapters"));
    let sections: Arc<HashMap<String, Arc<SimpleModelCollection<Heading>>>> = Arc::new(
        ["intro", "usage"]
            .into_iter()
            .map(|id| (id.to_string(), Arc::new(SimpleModelCollection::new(id))))
            .collect(),
    );

    let expandable = sections.clone();
    let children = sections.clone();
    let root: Arc<dyn NestedModelCollection<Heading>> = Arc::new(ExpandableCollection::new(
        chapters.clone(),
        move |m: &Heading| expandable.contains_key(m.id()),
        move |m: &Heading| {
            let source = children.get(m.id())?.clone();
            let leaf: Arc<dyn NestedModelCollection<Heading>> =
                Arc::new(ExpandableCollection::leaf(source));
            Some(leaf)
        },
    ));

    let tree = Arc::new(NestedTreeController::new(root));
    tree.observe(|event| {
        if event.requires_reload() {
            println!("reload children of {}", event.parent);
        } else {
            println!(
                "{}: -{} +{} moved {} updated {}",
                event.parent,
                event.removed.len(),
                event.added.len(),
                event.moved.len(),
                event.updated.len()
            );
        }
    });

    // Chapter ids arrive in bursts; each window becomes one snapshot.
    let target = chapters.clone();
    let batches = Coalesce::extending(queue.clone(), Duration::from_millis(50), move |ids: Vec<&'static str>| {
        target.on_next(CollectionEvent::Loaded(vec![ids.iter().map(|id| heading(id)).collect()]));
    });

    let (done_tx, done_rx) = bounded(1);
    let (outline, section_sources) = (tree.clone(), sections.clone());
    queue.schedule_after(
        Duration::from_millis(200),
        Box::new(move || {
            // Expand "intro" by asking for its children, then load them.
            let intro = TreePath::from(vec!["intro".to_string()]);
            println!("intro has {} children before load", outline.child_count(&intro));
            if let Some(source) = section_sources.get("intro") {
                source.on_next(CollectionEvent::Loaded(vec![vec![
                    heading("install"),
                    heading("configure"),
                ]]));
            }
            println!("intro has {} children", outline.child_count(&intro));
            let _ = done_tx.send(());
        }),
    )?;

    let (q, b) = (queue.clone(), Arc::new(batches));
    let trigger = b.clone();
    q.schedule(Box::new(move || trigger.trigger(vec!["intro"])))?;
    let trigger = b.clone();
    q.schedule(Box::new(move || trigger.trigger(vec!["usage"])))?;

    let _ = done_rx.recv_timeout(Duration::from_secs(5));
    println!("cached nodes: {}", tree.cached_node_count());

    queue.shutdown();
    Ok(())
}
