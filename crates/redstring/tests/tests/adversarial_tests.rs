#[path = "adversarial/dangling_references.rs"]
mod dangling_references;

#[path = "adversarial/concurrent_access.rs"]
mod concurrent_access;

#[path = "adversarial/corrupt_snapshot.rs"]
mod corrupt_snapshot;
