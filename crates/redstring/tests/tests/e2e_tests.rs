#[path = "e2e/instance_lifecycle.rs"]
mod instance_lifecycle;

#[path = "e2e/type_integrity.rs"]
mod type_integrity;

#[path = "e2e/merge_and_cleanup.rs"]
mod merge_and_cleanup;

#[path = "e2e/node_groups.rs"]
mod node_groups;

#[path = "e2e/persistence.rs"]
mod persistence;
