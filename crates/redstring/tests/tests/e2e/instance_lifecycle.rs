//! E2E: instance placement, hard delete, soft delete and the grace period.

use redstring_store::{
    GracePeriodScheduler, MutationRequest, OutcomeDetail, StoreConfig, StoreError, ValidationError,
};
use redstring_tests::*;
use redstring_types::{GraphId, InstanceId};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn remove_dog_instance_drops_its_edge() {
    let store = store();
    let g = graph(&store, "G");
    let dog = prototype(&store, "dog", "Dog");
    let i1 = place(&store, &g, "I1", &dog, 0.0, 0.0);
    let i2 = place(&store, &g, "I2", &dog, 10.0, 10.0);
    let e = connect(&store, &g, "E", &i1, &i2);

    apply(
        &store,
        MutationRequest::RemoveNodeInstance {
            graph_id: g.clone(),
            instance_id: i1.clone(),
        },
    );

    let state = store.snapshot();
    let graph = state.graph(&g).unwrap();
    assert_eq!(graph.instances.keys().collect::<Vec<_>>(), vec![&i2]);
    assert!(graph.edge_ids.is_empty());
    assert!(state.edge(&e).is_none());
    assert_sound(&state);
}

#[test]
fn removing_an_instance_leaves_its_groups() {
    let store = store();
    let g = graph(&store, "G");
    let dog = prototype(&store, "dog", "Dog");
    let a = place(&store, &g, "a", &dog, 0.0, 0.0);
    let b = place(&store, &g, "b", &dog, 5.0, 0.0);
    let grp = group(&store, &g, "pack", &[&a, &b]);

    apply(
        &store,
        MutationRequest::RemoveNodeInstance {
            graph_id: g.clone(),
            instance_id: a.clone(),
        },
    );

    let state = store.snapshot();
    let members = &state.graph(&g).unwrap().groups[&grp].member_instance_ids;
    assert!(!members.contains(&a));
    assert!(members.contains(&b));
    assert_sound(&state);
}

#[test]
fn soft_delete_then_restore_reproduces_instance_and_edges() {
    let store = store();
    let g = graph(&store, "G");
    let dog = prototype(&store, "dog", "Dog");
    let a = place(&store, &g, "a", &dog, 1.0, 2.0);
    let b = place(&store, &g, "b", &dog, 3.0, 4.0);
    let c = place(&store, &g, "c", &dog, 5.0, 6.0);
    connect(&store, &g, "ab", &a, &b);
    connect(&store, &g, "bc", &b, &c);
    connect(&store, &g, "ca", &c, &a);
    let before = store.snapshot();

    apply(
        &store,
        MutationRequest::SoftDeleteNodeInstance {
            graph_id: g.clone(),
            instance_id: a.clone(),
            timestamp_ms: Some(1_000),
        },
    );
    let pending = store.snapshot();
    let graph = pending.graph(&g).unwrap();
    assert!(!graph.instances.contains_key(&a));
    assert_eq!(graph.edge_ids.len(), 1);
    assert!(pending.pending_deletions.contains_key(&a));
    assert_sound(&pending);

    assert!(store.restore(&a).unwrap());
    let after = store.snapshot();
    let (restored, original) = (after.graph(&g).unwrap(), before.graph(&g).unwrap());
    assert_eq!(restored.instances, original.instances);
    assert_eq!(restored.edge_ids, original.edge_ids);
    assert_eq!(after.edges, before.edges);
    assert!(after.pending_deletions.is_empty());
    assert_sound(&after);
}

#[test]
fn expired_soft_delete_cannot_be_restored() {
    let store = store_with_grace(1_000);
    let g = graph(&store, "G");
    let dog = prototype(&store, "dog", "Dog");
    let a = place(&store, &g, "a", &dog, 0.0, 0.0);
    let b = place(&store, &g, "b", &dog, 1.0, 1.0);
    let e = connect(&store, &g, "ab", &a, &b);

    apply(
        &store,
        MutationRequest::SoftDeleteNodeInstance {
            graph_id: g.clone(),
            instance_id: a.clone(),
            timestamp_ms: Some(10_000),
        },
    );

    // Still inside the grace period.
    assert!(store.sweep_expired(10_500).unwrap().is_empty());
    assert_eq!(store.sweep_expired(11_001).unwrap(), vec![a.clone()]);

    assert!(!store.restore(&a).unwrap());
    let state = store.snapshot();
    assert!(state.find_instance(&a).is_none());
    assert!(state.edge(&e).is_none());
    assert!(state.pending_deletions.is_empty());
    assert_sound(&state);
}

#[test]
fn restore_without_pending_entry_is_a_noop() {
    let store = store();
    let before = store.snapshot();
    let outcome = store
        .apply(MutationRequest::RestoreNodeInstance {
            instance_id: InstanceId::new("never-deleted"),
        })
        .unwrap();
    assert_eq!(outcome.detail, OutcomeDetail::Restored(false));
    assert_eq!(store.snapshot().graphs, before.graphs);
}

#[test]
fn restore_skips_edges_whose_far_end_is_gone() {
    let store = store();
    let g = graph(&store, "G");
    let dog = prototype(&store, "dog", "Dog");
    let a = place(&store, &g, "a", &dog, 0.0, 0.0);
    let b = place(&store, &g, "b", &dog, 1.0, 1.0);
    let e = connect(&store, &g, "ab", &a, &b);

    apply(
        &store,
        MutationRequest::SoftDeleteNodeInstance {
            graph_id: g.clone(),
            instance_id: a.clone(),
            timestamp_ms: None,
        },
    );
    apply(
        &store,
        MutationRequest::RemoveNodeInstance {
            graph_id: g.clone(),
            instance_id: b.clone(),
        },
    );

    assert!(store.restore(&a).unwrap());
    let state = store.snapshot();
    assert!(state.graph(&g).unwrap().instances.contains_key(&a));
    assert!(state.edge(&e).is_none());
    assert_sound(&state);
}

#[test]
fn soft_delete_in_unknown_graph_is_rejected() {
    let store = store();
    let err = store
        .apply(MutationRequest::SoftDeleteNodeInstance {
            graph_id: GraphId::new("nowhere"),
            instance_id: InstanceId::new("a"),
            timestamp_ms: None,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::GraphNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn scheduler_sweeps_on_its_interval() {
    let store = Arc::new(store_with(
        StoreConfig::default()
            .with_grace_period_ms(1)
            .with_sweep_interval_ms(10),
    ));
    let g = graph(&store, "G");
    let dog = prototype(&store, "dog", "Dog");
    let a = place(&store, &g, "a", &dog, 0.0, 0.0);
    apply(
        &store,
        MutationRequest::SoftDeleteNodeInstance {
            graph_id: g.clone(),
            instance_id: a.clone(),
            // Far enough in the past that the first tick purges it.
            timestamp_ms: Some(0),
        },
    );

    let scheduler = GracePeriodScheduler::new(Arc::clone(&store));
    assert!(scheduler.start().await);
    assert!(!scheduler.start().await);

    tokio::time::sleep(Duration::from_millis(25)).await;
    tokio::task::yield_now().await;
    assert!(store.snapshot().pending_deletions.is_empty());

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
    assert!(scheduler.start().await);
    scheduler.stop().await;
}
