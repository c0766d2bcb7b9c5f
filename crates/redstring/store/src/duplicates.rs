//! Near-duplicate prototype detection
//!
//! Names are compared pairwise after trimming and lower-casing. The scan is
//! O(n²) in prototype count; run it on demand rather than per mutation.

use redstring_types::{NodePrototype, PrototypeId, StoreState};

/// A prototype that looks like a duplicate of its group's primary.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCandidate {
    pub prototype_id: PrototypeId,
    pub name: String,
    pub similarity: f64,
    pub reasons: Vec<String>,
}

/// A primary prototype and the candidates that match it.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub primary: PrototypeId,
    pub primary_name: String,
    pub candidates: Vec<DuplicateCandidate>,
}

/// Similarity in `[0, 1]` derived from optimal-string-alignment distance.
/// Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = normalize(a).chars().collect();
    let b: Vec<char> = normalize(b).chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - osa_distance(&a, &b) as f64 / longest as f64
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Levenshtein distance where swapping two adjacent characters costs 1.
fn osa_distance(a: &[char], b: &[char]) -> usize {
    let n = b.len();
    if a.is_empty() {
        return n;
    }
    if n == 0 {
        return a.len();
    }

    // Three rows: i-2, i-1 and i.
    let mut before: Vec<usize> = vec![0; n + 1];
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr: Vec<usize> = vec![0; n + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut d = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                d = d.min(before[j - 2] + 1);
            }
            curr[j] = d;
        }
        std::mem::swap(&mut before, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Group node prototypes whose names score at least `threshold`.
///
/// Iteration is in ascending id order; the first prototype of each cluster
/// is the primary and every prototype lands in at most one group. Root
/// prototypes and unnamed prototypes are never candidates.
pub fn find_potential_duplicates(state: &StoreState, threshold: f64) -> Vec<DuplicateGroup> {
    let prototypes: Vec<&NodePrototype> = state
        .node_prototypes
        .values()
        .map(|p| p.as_ref())
        .filter(|p| !p.id.is_root() && !normalize(&p.name).is_empty())
        .collect();

    let mut claimed = vec![false; prototypes.len()];
    let mut groups = Vec::new();

    for i in 0..prototypes.len() {
        if claimed[i] {
            continue;
        }
        let primary = prototypes[i];
        let mut candidates = Vec::new();

        for j in (i + 1)..prototypes.len() {
            if claimed[j] {
                continue;
            }
            let other = prototypes[j];
            let score = similarity(&primary.name, &other.name);
            if score < threshold {
                continue;
            }
            claimed[j] = true;
            candidates.push(DuplicateCandidate {
                prototype_id: other.id.clone(),
                name: other.name.clone(),
                similarity: score,
                reasons: reasons(primary, other, score, threshold),
            });
        }

        if !candidates.is_empty() {
            claimed[i] = true;
            groups.push(DuplicateGroup {
                primary: primary.id.clone(),
                primary_name: primary.name.clone(),
                candidates,
            });
        }
    }
    groups
}

fn reasons(
    primary: &NodePrototype,
    other: &NodePrototype,
    score: f64,
    threshold: f64,
) -> Vec<String> {
    let mut reasons = Vec::new();
    if score >= 1.0 {
        reasons.push("Identical names".to_string());
    } else {
        reasons.push(format!("Similar names ({}% match)", (score * 100.0).round() as u32));
    }
    if primary.type_node_id.is_some() && primary.type_node_id == other.type_node_id {
        reasons.push("Same type".to_string());
    }
    let described =
        !normalize(&primary.description).is_empty() && !normalize(&other.description).is_empty();
    if described && similarity(&primary.description, &other.description) >= threshold {
        reasons.push("Similar descriptions".to_string());
    }
    reasons
}
