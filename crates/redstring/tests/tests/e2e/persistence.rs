//! E2E: change notification and whole-store snapshot loads.

use redstring_store::{GraphStore, ImportSnapshot, MutationRequest, PersistenceSink, StoreConfig};
use redstring_tests::*;
use redstring_types::{ChangeBatch, GraphId, PrototypeId, StoreState, TargetKind};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<(usize, ChangeBatch)>>,
}

impl PersistenceSink for RecordingSink {
    fn notify(&self, state: &StoreState, batch: &ChangeBatch) {
        self.batches
            .lock()
            .unwrap()
            .push((state.graphs.len(), batch.clone()));
    }
}

#[test]
fn mutations_in_one_tick_reach_the_sink_as_one_batch() {
    let store = store();
    let sink = Arc::new(RecordingSink::default());
    store.notifier().register(sink.clone());

    let g = graph(&store, "g");
    let dog = prototype(&store, "dog", "Dog");
    place(&store, &g, "d1", &dog, 0.0, 0.0);

    let batch = store.flush_notifications().unwrap();
    assert_eq!(batch.sequence, 1);
    assert!(batch.touches(TargetKind::Graph));
    assert!(batch.touches(TargetKind::Instance));
    let operations: Vec<&str> = batch.operations().collect();
    assert!(operations.contains(&"createNewGraph"));
    assert!(operations.contains(&"addNodeInstance"));

    let seen = sink.batches.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, 1);
    assert_eq!(seen[0].1, batch);
    drop(seen);

    assert!(store.flush_notifications().is_none());
}

#[test]
fn rejected_mutations_notify_nobody() {
    let store = store();
    let _ = store.apply(MutationRequest::SetNodeType {
        node_id: PrototypeId::new("ghost"),
        type_id: None,
    });
    assert!(store.flush_notifications().is_none());
}

#[tokio::test]
async fn spawned_notifier_delivers_to_subscribers() {
    let store = Arc::new(GraphStore::new(StoreConfig::default()));
    let mut rx = store.notifier().subscribe();
    let task = store.spawn_notifier();

    graph(&store, "g");
    prototype(&store, "dog", "Dog");

    let mut operations = Vec::new();
    while operations.len() < 2 {
        let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no batch within timeout")
            .unwrap();
        operations.extend(batch.operations().map(str::to_string));
    }
    assert!(operations.iter().any(|op| op == "createNewGraph"));
    assert!(operations.iter().any(|op| op == "addNodePrototype"));

    drop(store);
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("notifier task did not stop")
        .unwrap();
}

#[test]
fn exported_state_loads_back_cleanly() {
    let source = store();
    let g = graph(&source, "g");
    let dog = prototype(&source, "dog", "Dog");
    let a = place(&source, &g, "a", &dog, 0.0, 0.0);
    let b = place(&source, &g, "b", &dog, 1.0, 1.0);
    connect(&source, &g, "ab", &a, &b);
    apply(&source, MutationRequest::OpenRightPanelNodeTab { node_id: dog });

    let exported = ImportSnapshot::from_state(&source.snapshot()).unwrap();
    let target = store();
    let report = target.load_snapshot(exported).unwrap();
    assert!(report.is_clean(), "defects: {:?}", report.errors);
    assert_eq!(report.graphs, 1);
    assert_eq!(report.edges, 1);

    let loaded = target.snapshot();
    assert_eq!(loaded.graphs, source.snapshot().graphs);
    assert_eq!(loaded.right_panel_tabs, source.snapshot().right_panel_tabs);
    assert_sound(&loaded);

    let batch = target.flush_notifications().unwrap();
    assert!(batch.touches(TargetKind::Store));
}

#[test]
fn defective_snapshot_loads_repaired() {
    let snapshot: ImportSnapshot = serde_json::from_value(json!({
        "graphs": {
            "g": {
                "id": "g",
                "name": "G",
                "instances": {
                    "a": { "id": "a", "prototypeId": "dog", "x": 0.0, "y": 0.0 }
                },
                "edgeIds": ["e1", "missing"]
            }
        },
        "nodePrototypes": {
            "dog": { "id": "dog", "name": "Dog", "typeNodeId": "nobody" }
        },
        "edges": {
            "e1": { "id": "e1", "sourceId": "a", "destinationId": "ghost" }
        },
        "openGraphIds": ["g", "gone"],
        "activeGraphId": "gone"
    }))
    .unwrap();

    let store = store();
    let report = store.load_snapshot(snapshot).unwrap();
    assert!(!report.is_clean());

    let state = store.snapshot();
    assert!(state.edges.is_empty());
    assert!(state.graph(&GraphId::new("g")).unwrap().edge_ids.is_empty());
    assert_eq!(state.open_graph_ids, vec![GraphId::new("g")]);
    assert_eq!(state.active_graph_id, Some(GraphId::new("g")));
    assert_eq!(state.type_of(&PrototypeId::new("dog")), None);
    assert!(state.node_prototype(&PrototypeId::base_thing()).is_some());
    assert_sound(&state);
}

#[test]
fn config_load_without_file_uses_defaults() {
    let config = StoreConfig::load(None).unwrap();
    assert_eq!(config.grace_period_ms, StoreConfig::default().grace_period_ms);
    assert_eq!(config.duplicate_threshold, StoreConfig::default().duplicate_threshold);
}
