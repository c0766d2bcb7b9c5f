//! Property tests: any sequence of requests, valid or not, leaves the store
//! structurally sound.
//!
//! Ids are drawn from small pools so that requests collide, reference
//! entities that were just removed, and build up real type chains.

use proptest::prelude::*;
use redstring_store::{
    DefinitionMergeStrategy, GraphSpec, IntegrityGuard, MutationRequest, NodeGroupPrototype,
};
use redstring_tests::*;
use redstring_types::{
    Directionality, Edge, EdgeId, Group, GroupId, GraphId, InstanceId, NodeInstance,
    NodePrototype, PrototypeId,
};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

fn graph_id() -> impl Strategy<Value = GraphId> {
    (0..3u8).prop_map(|i| GraphId::new(format!("g{}", i)))
}

fn prototype_id() -> impl Strategy<Value = PrototypeId> {
    (0..5u8).prop_map(|i| PrototypeId::new(format!("p{}", i)))
}

fn instance_id() -> impl Strategy<Value = InstanceId> {
    (0..8u8).prop_map(|i| InstanceId::new(format!("i{}", i)))
}

fn edge_id() -> impl Strategy<Value = EdgeId> {
    (0..8u8).prop_map(|i| EdgeId::new(format!("e{}", i)))
}

fn group_id() -> impl Strategy<Value = GroupId> {
    (0..2u8).prop_map(|i| GroupId::new(format!("grp{}", i)))
}

fn arb_graph_request() -> impl Strategy<Value = MutationRequest> {
    prop_oneof![
        graph_id().prop_map(|id| MutationRequest::CreateNewGraph {
            graph: GraphSpec::named(id.as_str()).with_id(id),
            open: true,
        }),
        graph_id().prop_map(|graph_id| MutationRequest::CloseGraph { graph_id }),
        graph_id().prop_map(|graph_id| MutationRequest::OpenGraphTab { graph_id }),
        graph_id().prop_map(|graph_id| MutationRequest::ToggleSavedGraph { graph_id }),
    ]
}

fn arb_prototype_request() -> impl Strategy<Value = MutationRequest> {
    prop_oneof![
        prototype_id().prop_map(|id| MutationRequest::AddNodePrototype {
            prototype: NodePrototype::new(id.clone(), id.as_str()),
        }),
        (prototype_id(), proptest::option::of(prototype_id())).prop_map(|(node_id, type_id)| {
            MutationRequest::SetNodeType { node_id, type_id }
        }),
        prototype_id().prop_map(|node_id| MutationRequest::ToggleSavedNode { node_id }),
        prototype_id().prop_map(|node_id| MutationRequest::OpenRightPanelNodeTab { node_id }),
        prototype_id().prop_map(|prototype_id| MutationRequest::CreateAndAssignGraphDefinition {
            prototype_id,
            graph_id: None,
        }),
        (prototype_id(), prototype_id()).prop_map(|(primary_id, secondary_id)| {
            MutationRequest::MergeNodePrototypes {
                primary_id,
                secondary_id,
                strategy: DefinitionMergeStrategy::Combine,
            }
        }),
    ]
}

fn arb_instance_request() -> impl Strategy<Value = MutationRequest> {
    prop_oneof![
        (graph_id(), instance_id(), prototype_id(), -100.0..100.0f64, -100.0..100.0f64).prop_map(
            |(graph_id, id, prototype_id, x, y)| MutationRequest::AddNodeInstance {
                graph_id,
                instance: NodeInstance::new(id, prototype_id, x, y),
            }
        ),
        (graph_id(), instance_id()).prop_map(|(graph_id, instance_id)| {
            MutationRequest::RemoveNodeInstance {
                graph_id,
                instance_id,
            }
        }),
        (graph_id(), instance_id(), 0..10_000i64).prop_map(|(graph_id, instance_id, ts)| {
            MutationRequest::SoftDeleteNodeInstance {
                graph_id,
                instance_id,
                timestamp_ms: Some(ts),
            }
        }),
        instance_id().prop_map(|instance_id| MutationRequest::RestoreNodeInstance { instance_id }),
        (0..20_000i64).prop_map(|now| MutationRequest::ExpirePendingDeletions {
            now_ms: Some(now)
        }),
    ]
}

fn arb_edge_request() -> impl Strategy<Value = MutationRequest> {
    prop_oneof![
        (graph_id(), edge_id(), instance_id(), instance_id(), any::<bool>()).prop_map(
            |(graph_id, id, source, destination, arrow)| {
                let mut edge = Edge::new(id, source, destination.clone());
                if arrow {
                    edge.directionality = Directionality::toward(destination);
                }
                MutationRequest::AddEdge { graph_id, edge }
            }
        ),
        edge_id().prop_map(|edge_id| MutationRequest::RemoveEdge { edge_id }),
    ]
}

fn arb_group_request() -> impl Strategy<Value = MutationRequest> {
    prop_oneof![
        (graph_id(), group_id(), prop::collection::vec(instance_id(), 1..4)).prop_map(
            |(graph_id, id, members)| MutationRequest::CreateGroup {
                graph_id,
                group: Group::new(id.clone(), id.as_str()).with_members(members),
            }
        ),
        (graph_id(), group_id(), prototype_id()).prop_map(|(graph_id, group_id, prototype_id)| {
            MutationRequest::ConvertGroupToNodeGroup {
                graph_id,
                group_id,
                prototype: NodeGroupPrototype::Existing { prototype_id },
            }
        }),
        (graph_id(), group_id()).prop_map(|(graph_id, group_id)| {
            MutationRequest::CollapseNodeGroup {
                graph_id,
                group_id,
                instance_id: None,
            }
        }),
        (graph_id(), group_id()).prop_map(|(graph_id, group_id)| MutationRequest::DeleteGroup {
            graph_id,
            group_id,
        }),
    ]
}

fn arb_request() -> impl Strategy<Value = MutationRequest> {
    prop_oneof![
        2 => arb_graph_request(),
        3 => arb_prototype_request(),
        4 => arb_instance_request(),
        3 => arb_edge_request(),
        2 => arb_group_request(),
        1 => Just(MutationRequest::CleanupOrphanedData),
    ]
}

fn arb_requests() -> impl Strategy<Value = Vec<MutationRequest>> {
    prop::collection::vec(arb_request(), 1..60)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    /// Every committed snapshot passes the full audit.
    #[test]
    fn random_sequences_keep_store_sound(requests in arb_requests()) {
        let store = store_with_grace(5_000);
        for request in requests {
            let action = request.action_name();
            let _ = store.apply(request);
            let report = IntegrityGuard::audit(&store.snapshot());
            prop_assert!(report.is_valid(), "after {}: {:?}", action, report.violations);
        }
    }

    /// A rejected request never replaces the snapshot.
    #[test]
    fn rejected_requests_leave_snapshot_untouched(requests in arb_requests()) {
        let store = store();
        for request in requests {
            let before = store.snapshot();
            if store.apply(request).is_err() {
                prop_assert!(Arc::ptr_eq(&before, &store.snapshot()));
            }
        }
    }

    /// Walking any type chain ends within the number of prototypes.
    #[test]
    fn type_chains_terminate(requests in arb_requests()) {
        let store = store();
        for request in requests {
            let _ = store.apply(request);
        }
        let state = store.snapshot();
        for id in state.node_prototypes.keys() {
            let chain = IntegrityGuard::type_chain(&state, id);
            prop_assert!(chain.len() < state.prototype_count());
            prop_assert!(!chain.contains(id), "{} reaches itself", id);
        }
    }

    /// A second collection directly after the first removes nothing.
    #[test]
    fn gc_is_idempotent(requests in arb_requests()) {
        let store = store_with_grace(5_000);
        for request in requests {
            let _ = store.apply(request);
        }
        store.collect_garbage().unwrap();
        let second = store.collect_garbage().unwrap();
        prop_assert!(second.is_empty(), "second pass removed {:?}", second);
        assert_sound(&store.snapshot());
    }
}
