#[path = "property/mutation_sequences.rs"]
mod mutation_sequences;

#[path = "property/similarity.rs"]
mod similarity;
