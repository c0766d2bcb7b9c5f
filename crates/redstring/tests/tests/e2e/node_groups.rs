//! E2E: a group lifted to a node-group, then collapsed into one instance.

use redstring_store::{
    MutationRequest, NodeGroupPrototype, OutcomeDetail, StoreError, ValidationError,
};
use redstring_tests::*;
use redstring_types::{EdgeId, GraphId, GroupId, InstanceId, NodePrototype, PrototypeId};

struct Fixture {
    store: redstring_store::GraphStore,
    graph: GraphId,
    group: GroupId,
    outside: InstanceId,
}

/// `a` and `b` grouped, `c` outside; edges a→b, b→c, c→a.
fn fixture() -> Fixture {
    let store = store();
    let g = graph(&store, "canvas");
    let part = prototype(&store, "part", "Part");
    let a = place(&store, &g, "a", &part, 0.0, 0.0);
    let b = place(&store, &g, "b", &part, 10.0, 20.0);
    let c = place(&store, &g, "c", &part, 100.0, 100.0);
    connect(&store, &g, "ab", &a, &b);
    connect(&store, &g, "bc", &b, &c);
    connect(&store, &g, "ca", &c, &a);
    let grp = group(&store, &g, "engine", &[&a, &b]);
    Fixture {
        store,
        graph: g,
        group: grp,
        outside: c,
    }
}

fn lift(f: &Fixture, prototype: NodeGroupPrototype) -> GraphId {
    let outcome = f
        .store
        .apply(MutationRequest::ConvertGroupToNodeGroup {
            graph_id: f.graph.clone(),
            group_id: f.group.clone(),
            prototype,
        })
        .unwrap();
    match outcome.detail {
        OutcomeDetail::Created(id) => GraphId::new(id),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn lifting_copies_members_and_internal_edges() {
    let f = fixture();
    let definition = lift(
        &f,
        NodeGroupPrototype::New {
            prototype: NodePrototype::new(PrototypeId::new("engine"), "Engine"),
        },
    );

    let state = f.store.snapshot();
    let engine = state.node_prototype(&PrototypeId::new("engine")).unwrap();
    assert_eq!(engine.definition_graph_ids, vec![definition.clone()]);

    let copy = state.graph(&definition).unwrap();
    assert_eq!(copy.name, "Engine");
    assert_eq!(copy.defining_node_ids, vec![PrototypeId::new("engine")]);
    assert_eq!(copy.instances.len(), 2);
    assert_eq!(copy.edge_ids.len(), 1);
    assert!(copy.instances.keys().all(|id| id.as_str() != "a" && id.as_str() != "b"));

    let group = &state.graph(&f.graph).unwrap().groups[&f.group];
    assert_eq!(group.linked_node_prototype_id, Some(PrototypeId::new("engine")));
    assert_eq!(group.linked_definition_index, Some(0));
    assert_sound(&state);
}

#[test]
fn lifting_twice_is_rejected() {
    let f = fixture();
    let part = PrototypeId::new("part");
    lift(&f, NodeGroupPrototype::Existing { prototype_id: part.clone() });
    let err = f
        .store
        .apply(MutationRequest::ConvertGroupToNodeGroup {
            graph_id: f.graph.clone(),
            group_id: f.group.clone(),
            prototype: NodeGroupPrototype::Existing { prototype_id: part },
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::AlreadyNodeGroup(_))
    ));
}

#[test]
fn collapse_rewires_crossing_edges() {
    let f = fixture();
    lift(
        &f,
        NodeGroupPrototype::New {
            prototype: NodePrototype::new(PrototypeId::new("engine"), "Engine"),
        },
    );

    let outcome = f
        .store
        .apply(MutationRequest::CollapseNodeGroup {
            graph_id: f.graph.clone(),
            group_id: f.group.clone(),
            instance_id: Some(InstanceId::new("engine-1")),
        })
        .unwrap();
    assert_eq!(outcome.detail, OutcomeDetail::Created("engine-1".to_string()));

    let state = f.store.snapshot();
    let canvas = state.graph(&f.graph).unwrap();
    let collapsed = InstanceId::new("engine-1");
    assert_eq!(
        canvas.instances.keys().cloned().collect::<Vec<_>>(),
        vec![f.outside.clone(), collapsed.clone()]
    );
    let placed = &canvas.instances[&collapsed];
    assert_eq!(placed.prototype_id, PrototypeId::new("engine"));
    assert_eq!((placed.x, placed.y), (5.0, 10.0));
    assert!(canvas.groups.is_empty());

    assert!(state.edge(&EdgeId::new("ab")).is_none());
    let bc = state.edge(&EdgeId::new("bc")).unwrap();
    assert_eq!((&bc.source_id, &bc.destination_id), (&collapsed, &f.outside));
    let ca = state.edge(&EdgeId::new("ca")).unwrap();
    assert_eq!((&ca.source_id, &ca.destination_id), (&f.outside, &collapsed));
    assert!(ca.directionality.arrows_toward.contains(&collapsed));
    assert_sound(&state);
}

#[test]
fn collapsing_a_plain_group_is_rejected() {
    let f = fixture();
    let before = f.store.snapshot();
    let err = f
        .store
        .apply(MutationRequest::CollapseNodeGroup {
            graph_id: f.graph.clone(),
            group_id: f.group.clone(),
            instance_id: None,
        })
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::NotANodeGroup(_))
    ));
    assert!(std::sync::Arc::ptr_eq(&before, &f.store.snapshot()));
}

#[test]
fn unlinking_keeps_members_and_definition() {
    let f = fixture();
    let definition = lift(
        &f,
        NodeGroupPrototype::Existing {
            prototype_id: PrototypeId::new("part"),
        },
    );
    f.store
        .apply(MutationRequest::ConvertNodeGroupToGroup {
            graph_id: f.graph.clone(),
            group_id: f.group.clone(),
        })
        .unwrap();

    let state = f.store.snapshot();
    let group = &state.graph(&f.graph).unwrap().groups[&f.group];
    assert!(!group.is_node_group());
    assert_eq!(group.member_instance_ids.len(), 2);
    assert!(state.graph(&definition).is_some());
    assert_sound(&state);
}
