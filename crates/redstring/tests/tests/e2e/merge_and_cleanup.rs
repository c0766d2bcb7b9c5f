//! E2E: merges leave no trace of the absorbed prototype, and garbage
//! collection converges.

use redstring_store::{
    DefinitionMergeStrategy, MutationRequest, OutcomeDetail, StoreError, ValidationError,
};
use redstring_tests::*;
use redstring_types::{Edge, EdgeId, GraphId, NodePrototype, PrototypeId, TabTarget};

fn merge(primary: &PrototypeId, secondary: &PrototypeId) -> MutationRequest {
    MutationRequest::MergeNodePrototypes {
        primary_id: primary.clone(),
        secondary_id: secondary.clone(),
        strategy: DefinitionMergeStrategy::Combine,
    }
}

#[test]
fn merge_rewrites_every_reference() {
    let store = store();
    let g = graph(&store, "board");
    let canine = prototype(&store, "canine", "Canine");
    let dog = prototype(&store, "dog", "Dog");
    apply(
        &store,
        MutationRequest::AddNodePrototype {
            prototype: NodePrototype::new(PrototypeId::new("puppy"), "Puppy")
                .with_type(dog.clone()),
        },
    );

    let i1 = place(&store, &g, "i1", &dog, 0.0, 0.0);
    let i2 = place(&store, &g, "i2", &canine, 5.0, 5.0);
    apply(
        &store,
        MutationRequest::AddEdge {
            graph_id: g.clone(),
            edge: Edge::new(EdgeId::new("e1"), i1.clone(), i2.clone()).with_type(dog.clone()),
        },
    );
    apply(&store, MutationRequest::ToggleSavedNode { node_id: dog.clone() });
    apply(&store, MutationRequest::OpenRightPanelNodeTab { node_id: dog.clone() });
    apply(
        &store,
        MutationRequest::CreateAndAssignGraphDefinition {
            prototype_id: dog.clone(),
            graph_id: None,
        },
    );

    apply(&store, merge(&canine, &dog));

    let state = store.snapshot();
    assert!(!mentions(&state, &dog), "merged prototype is still referenced");
    assert!(state.node_prototype(&dog).is_none());

    let board = state.graph(&g).unwrap();
    assert_eq!(board.instances[&i1].prototype_id, canine);
    assert_eq!(state.edge(&EdgeId::new("e1")).unwrap().type_node_id, Some(canine.clone()));
    assert_eq!(state.type_of(&PrototypeId::new("puppy")), Some(&canine));
    assert!(state.saved_node_ids.contains(&canine));
    assert!(state
        .right_panel_tabs
        .iter()
        .any(|t| t.target == TabTarget::Node { node_id: canine.clone() }));

    let definitions = &state.node_prototype(&canine).unwrap().definition_graph_ids;
    assert_eq!(definitions.len(), 1);
    assert_eq!(state.graph(&definitions[0]).unwrap().defining_node_ids, vec![canine]);
    assert_sound(&state);
}

#[test]
fn merge_into_itself_is_rejected() {
    let store = store();
    let dog = prototype(&store, "dog", "Dog");
    let err = store.apply(merge(&dog, &dog)).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::InvalidMerge(_))
    ));
    assert!(store.snapshot().node_prototype(&dog).is_some());
}

#[test]
fn merge_into_thing_leaves_it_untyped() {
    let store = store();
    let animal = prototype(&store, "animal", "Animal");
    let dog = prototype(&store, "dog", "Dog");
    apply(
        &store,
        MutationRequest::SetNodeType {
            node_id: dog.clone(),
            type_id: Some(animal),
        },
    );

    apply(&store, merge(&PrototypeId::base_thing(), &dog));

    let state = store.snapshot();
    assert_eq!(state.type_of(&PrototypeId::base_thing()), None);
    assert!(!mentions(&state, &dog));
    assert_sound(&state);
}

#[test]
fn duplicates_are_found_then_merged() {
    let store = store();
    let g = graph(&store, "fruit");
    let apple = prototype(&store, "apple", "Apple");
    let appel = prototype(&store, "appel", "Appel");
    prototype(&store, "banana", "Banana");
    place(&store, &g, "a1", &apple, 0.0, 0.0);
    place(&store, &g, "a2", &appel, 1.0, 0.0);

    let groups = store.find_potential_duplicates(Some(0.75));
    assert_eq!(groups.len(), 1);
    // Ascending id order makes "appel" the primary.
    assert_eq!(groups[0].primary, appel);
    assert_eq!(groups[0].candidates.len(), 1);
    assert_eq!(groups[0].candidates[0].prototype_id, apple);

    apply(&store, merge(&groups[0].primary, &groups[0].candidates[0].prototype_id));
    assert!(store.find_potential_duplicates(Some(0.75)).is_empty());
    let state = store.snapshot();
    assert!(state
        .graph(&g)
        .unwrap()
        .instances
        .values()
        .all(|i| i.prototype_id == appel));
    assert_sound(&state);
}

#[test]
fn gc_twice_removes_nothing_the_second_time() {
    let store = store();
    let live = graph(&store, "live");
    let old = graph(&store, "old");
    let dog = prototype(&store, "dog", "Dog");
    let fossil = prototype(&store, "fossil", "Fossil");
    let lonely = prototype(&store, "lonely", "Lonely");
    place(&store, &live, "d1", &dog, 0.0, 0.0);
    let f1 = place(&store, &old, "f1", &fossil, 0.0, 0.0);
    let f2 = place(&store, &old, "f2", &fossil, 1.0, 0.0);
    connect(&store, &old, "ff", &f1, &f2);
    apply(&store, MutationRequest::CloseGraph { graph_id: old.clone() });

    let first = store.collect_garbage().unwrap();
    assert!(first.removed_prototypes.contains(&fossil));
    assert!(first.removed_prototypes.contains(&lonely));
    assert!(!first.removed_prototypes.contains(&dog));
    assert_eq!(first.removed_graphs, vec![old.clone()]);

    let second = store.collect_garbage().unwrap();
    assert!(second.is_empty(), "second pass removed {:?}", second);

    let state = store.snapshot();
    assert!(state.graph(&live).is_some());
    assert!(state.edge(&EdgeId::new("ff")).is_none());
    assert!(state.node_prototype(&PrototypeId::base_thing()).is_some());
    assert!(state.edge_prototype(&PrototypeId::base_connection()).is_some());
    assert_sound(&state);
}

#[test]
fn gc_keeps_bookmarked_and_definition_reachable_prototypes() {
    let store = store();
    let saved = prototype(&store, "saved", "Saved");
    let part = prototype(&store, "part", "Part");
    apply(&store, MutationRequest::ToggleSavedNode { node_id: saved.clone() });

    let outcome = store
        .apply(MutationRequest::CreateAndAssignGraphDefinition {
            prototype_id: saved.clone(),
            graph_id: None,
        })
        .unwrap();
    let OutcomeDetail::Created(definition) = outcome.detail else {
        panic!("expected a created definition graph");
    };
    let definition = GraphId::new(definition);
    place(&store, &definition, "p1", &part, 0.0, 0.0);
    apply(&store, MutationRequest::CloseGraph { graph_id: definition.clone() });

    let outcome = store.apply(MutationRequest::CleanupOrphanedData).unwrap();
    let OutcomeDetail::Gc(report) = outcome.detail else {
        panic!("expected a gc report");
    };
    assert!(report.is_empty(), "unexpected removals {:?}", report);
    let state = store.snapshot();
    assert!(state.node_prototype(&part).is_some());
    assert!(state.graph(&definition).is_some());
}

#[test]
fn removing_last_definition_deletes_unreferenced_graph() {
    let store = store();
    let dog = prototype(&store, "dog", "Dog");
    apply(&store, MutationRequest::ToggleSavedNode { node_id: dog.clone() });
    let outcome = store
        .apply(MutationRequest::CreateAndAssignGraphDefinition {
            prototype_id: dog.clone(),
            graph_id: None,
        })
        .unwrap();
    let OutcomeDetail::Created(definition) = outcome.detail else {
        panic!("expected a created definition graph");
    };
    let definition = GraphId::new(definition);
    assert!(store.snapshot().open_graph_ids.contains(&definition));

    apply(
        &store,
        MutationRequest::RemoveDefinitionFromNode {
            prototype_id: dog.clone(),
            graph_id: definition.clone(),
        },
    );

    let state = store.snapshot();
    assert!(state.graph(&definition).is_none());
    assert!(!state.open_graph_ids.contains(&definition));
    assert!(state.node_prototype(&dog).unwrap().definition_graph_ids.is_empty());
    assert_sound(&state);
}

#[test]
fn removing_a_saved_definition_keeps_the_graph() {
    let store = store();
    let dog = prototype(&store, "dog", "Dog");
    apply(&store, MutationRequest::ToggleSavedNode { node_id: dog.clone() });
    let outcome = store
        .apply(MutationRequest::CreateAndAssignGraphDefinition {
            prototype_id: dog.clone(),
            graph_id: None,
        })
        .unwrap();
    let OutcomeDetail::Created(definition) = outcome.detail else {
        panic!("expected a created definition graph");
    };
    let definition = GraphId::new(definition);
    apply(&store, MutationRequest::ToggleSavedGraph { graph_id: definition.clone() });

    apply(
        &store,
        MutationRequest::RemoveDefinitionFromNode {
            prototype_id: dog,
            graph_id: definition.clone(),
        },
    );
    let state = store.snapshot();
    assert!(state.graph(&definition).is_some());
    assert!(!state.open_graph_ids.contains(&definition));
}

#[test]
fn batch_reports_each_request() {
    let store = store();
    let report = store.apply_batch(vec![
        MutationRequest::AddNodePrototype {
            prototype: NodePrototype::new(PrototypeId::new("a"), "A"),
        },
        MutationRequest::SetNodeType {
            node_id: PrototypeId::new("a"),
            type_id: Some(PrototypeId::new("a")),
        },
        MutationRequest::AddNodePrototype {
            prototype: NodePrototype::new(PrototypeId::new("b"), "B"),
        },
    ]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.results[1].action, "setNodeType");
    assert!(report.results[1].error.is_some());
    assert!(store.snapshot().node_prototype(&PrototypeId::new("b")).is_some());
}
