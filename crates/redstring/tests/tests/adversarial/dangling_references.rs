//! Adversarial: requests aimed at entities that do not exist, or that try
//! to smuggle in dangling references, are refused without touching state.

use redstring_store::{
    DefinitionMergeStrategy, GraphStore, MutationRequest, StoreError, ValidationError,
};
use redstring_tests::*;
use redstring_types::{
    Directionality, Edge, EdgeId, Group, GroupId, GraphId, InstanceId, NodeInstance, PrototypeId,
};
use std::sync::Arc;

/// A populated store: graph `g` with dog instances `a`, `b` and edge `ab`.
fn populated() -> GraphStore {
    let store = store();
    let g = graph(&store, "g");
    let dog = prototype(&store, "dog", "Dog");
    let a = place(&store, &g, "a", &dog, 0.0, 0.0);
    let b = place(&store, &g, "b", &dog, 1.0, 0.0);
    connect(&store, &g, "ab", &a, &b);
    store
}

fn assert_refused(store: &GraphStore, request: MutationRequest) -> ValidationError {
    let before = store.snapshot();
    let action = request.action_name();
    match store.apply(request) {
        Ok(outcome) => panic!("{} unexpectedly succeeded: {:?}", action, outcome),
        Err(StoreError::Validation(e)) => {
            assert!(
                Arc::ptr_eq(&before, &store.snapshot()),
                "{} replaced the snapshot",
                action
            );
            e
        }
        Err(other) => panic!("{} failed outside validation: {}", action, other),
    }
}

#[test]
fn unknown_targets_are_refused() {
    let store = populated();
    let ghost_graph = GraphId::new("ghost");
    let ghost_proto = PrototypeId::new("ghost");
    let ghost_instance = InstanceId::new("ghost");

    let requests = vec![
        MutationRequest::CloseGraph { graph_id: ghost_graph.clone() },
        MutationRequest::SetActiveGraph { graph_id: ghost_graph.clone() },
        MutationRequest::AddNodeInstance {
            graph_id: ghost_graph.clone(),
            instance: NodeInstance::new(InstanceId::new("x"), PrototypeId::new("dog"), 0.0, 0.0),
        },
        MutationRequest::AddNodeInstance {
            graph_id: GraphId::new("g"),
            instance: NodeInstance::new(InstanceId::new("x"), ghost_proto.clone(), 0.0, 0.0),
        },
        MutationRequest::RemoveNodeInstance {
            graph_id: GraphId::new("g"),
            instance_id: ghost_instance.clone(),
        },
        MutationRequest::RemoveEdge { edge_id: EdgeId::new("ghost") },
        MutationRequest::SetNodeType {
            node_id: PrototypeId::new("dog"),
            type_id: Some(ghost_proto.clone()),
        },
        MutationRequest::ToggleSavedNode { node_id: ghost_proto.clone() },
        MutationRequest::OpenRightPanelNodeTab { node_id: ghost_proto.clone() },
        MutationRequest::DeleteGroup {
            graph_id: GraphId::new("g"),
            group_id: GroupId::new("ghost"),
        },
        MutationRequest::CreateAndAssignGraphDefinition {
            prototype_id: ghost_proto.clone(),
            graph_id: None,
        },
        MutationRequest::RemoveDefinitionFromNode {
            prototype_id: PrototypeId::new("dog"),
            graph_id: GraphId::new("g"),
        },
        MutationRequest::MergeNodePrototypes {
            primary_id: PrototypeId::new("dog"),
            secondary_id: ghost_proto,
            strategy: DefinitionMergeStrategy::Combine,
        },
    ];

    for request in requests {
        assert_refused(&store, request);
    }
    assert_sound(&store.snapshot());
}

#[test]
fn reused_ids_are_refused() {
    let store = populated();
    let g = GraphId::new("g");

    let err = assert_refused(
        &store,
        MutationRequest::AddNodeInstance {
            graph_id: g.clone(),
            instance: NodeInstance::new(InstanceId::new("a"), PrototypeId::new("dog"), 9.0, 9.0),
        },
    );
    assert!(matches!(err, ValidationError::AlreadyExists { kind: "instance", .. }));

    let err = assert_refused(
        &store,
        MutationRequest::AddEdge {
            graph_id: g.clone(),
            edge: Edge::new(EdgeId::new("ab"), InstanceId::new("b"), InstanceId::new("a")),
        },
    );
    assert!(matches!(err, ValidationError::AlreadyExists { kind: "edge", .. }));

    let err = assert_refused(
        &store,
        MutationRequest::CreateNewGraph {
            graph: redstring_store::GraphSpec::named("again").with_id(g),
            open: true,
        },
    );
    assert!(matches!(err, ValidationError::AlreadyExists { kind: "graph", .. }));
}

#[test]
fn stray_arrow_is_refused() {
    let store = populated();
    let mut edge = Edge::new(EdgeId::new("ba"), InstanceId::new("b"), InstanceId::new("a"));
    edge.directionality = Directionality::toward(InstanceId::new("elsewhere"));
    let err = assert_refused(
        &store,
        MutationRequest::AddEdge {
            graph_id: GraphId::new("g"),
            edge,
        },
    );
    assert_eq!(err, ValidationError::InvalidArrow(InstanceId::new("elsewhere")));
}

#[test]
fn group_with_foreign_member_is_refused() {
    let store = populated();
    let other = graph(&store, "other");
    place(&store, &other, "far", &PrototypeId::new("dog"), 0.0, 0.0);

    let err = assert_refused(
        &store,
        MutationRequest::CreateGroup {
            graph_id: GraphId::new("g"),
            group: Group::new(GroupId::new("mixed"), "Mixed")
                .with_members([InstanceId::new("a"), InstanceId::new("far")]),
        },
    );
    assert_eq!(err, ValidationError::InstanceNotFound(InstanceId::new("far")));
}

#[test]
fn home_tab_and_out_of_range_tabs_are_refused() {
    let store = populated();
    assert_eq!(
        assert_refused(&store, MutationRequest::CloseRightPanelTab { index: 0 }),
        ValidationError::HomeTabPinned
    );
    assert_eq!(
        assert_refused(&store, MutationRequest::ActivateRightPanelTab { index: 7 }),
        ValidationError::TabOutOfRange(7)
    );
}

#[test]
fn root_prototypes_survive_everything() {
    let store = populated();
    assert_refused(
        &store,
        MutationRequest::MergeNodePrototypes {
            primary_id: PrototypeId::new("dog"),
            secondary_id: PrototypeId::base_thing(),
            strategy: DefinitionMergeStrategy::Combine,
        },
    );
    store.collect_garbage().unwrap();
    let state = store.snapshot();
    assert!(state.node_prototype(&PrototypeId::base_thing()).is_some());
    assert!(state.edge_prototype(&PrototypeId::base_connection()).is_some());
}

#[test]
fn bogus_selective_merge_is_refused() {
    let store = populated();
    prototype(&store, "hound", "Hound");
    let err = assert_refused(
        &store,
        MutationRequest::MergeDefinitionGraphs {
            primary_id: PrototypeId::new("dog"),
            secondary_id: PrototypeId::new("hound"),
            strategy: DefinitionMergeStrategy::Selective {
                graph_ids: vec![GraphId::new("g")],
            },
        },
    );
    assert!(matches!(err, ValidationError::InvalidSelection(_)));
}
