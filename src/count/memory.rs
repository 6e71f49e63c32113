//! In-memory counting: restricted paths as parallel set joins.
//!
//! ```text
//! length 1:  lookup(p1) from S, keep o ∈ O
//! length 2:  reach(p1) from S  ⋈x  reach(p2⁻¹) from O
//! length 3:  reach(p1) from S  ⋈x1  reach(p2) from x1  ⋈x2  reach(p3⁻¹) from O
//! ```
//!
//! Every join runs on rayon over hashbrown sets and returns a `PairSet`,
//! so the count is the size of a set and evaluation order never matters.
//! Joins start from whichever end has fewer candidates.
//!
//! Allowed subject/object sets and the direct instances of the current
//! predicate are memoized on the retriever. Scoring one property asks for
//! the same sets thousands of times; the next property replaces them.

use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use crate::graph::{Adjacency, EntitySet, GraphQuery, PairSet};
use crate::model::*;
use crate::Result;
use super::CountRetriever;

// ============================================================================
// Memo: the most recent value of one kind
// ============================================================================

struct Memo<K, V> {
    slot: Mutex<Option<(K, Arc<V>)>>,
}

impl<K: Clone + PartialEq, V> Memo<K, V> {
    fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    /// The lock is released while computing: a rayon worker blocked here
    /// could otherwise steal a task that needs the same memo.
    fn get_or_try(&self, key: &K, compute: impl FnOnce() -> Result<V>) -> Result<Arc<V>> {
        if let Some((cached, value)) = &*self.slot.lock() {
            if cached == key {
                return Ok(value.clone());
            }
        }
        let value = Arc::new(compute()?);
        *self.slot.lock() = Some((key.clone(), value.clone()));
        Ok(value)
    }
}

// ============================================================================
// InMemoryCountRetriever
// ============================================================================

/// `CountRetriever` computing every count locally from a `GraphQuery`.
pub struct InMemoryCountRetriever<G> {
    graph: G,
    domain: Memo<Option<TypeRestriction>, EntitySet>,
    range: Memo<Option<TypeRestriction>, EntitySet>,
    instances: Memo<Predicate, PairSet>,
}

impl<G: GraphQuery> InMemoryCountRetriever<G> {
    pub fn new(graph: G) -> Self {
        Self {
            graph,
            domain: Memo::new(),
            range: Memo::new(),
            instances: Memo::new(),
        }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    fn allowed_subjects(&self, domain: Option<&TypeRestriction>) -> Result<Arc<EntitySet>> {
        self.domain
            .get_or_try(&domain.cloned(), || self.graph.resolve_restriction(domain))
    }

    fn allowed_objects(&self, range: Option<&TypeRestriction>) -> Result<Arc<EntitySet>> {
        self.range
            .get_or_try(&range.cloned(), || self.graph.resolve_restriction(range))
    }

    fn predicate_instances(&self, predicate: &Predicate) -> Result<Arc<PairSet>> {
        self.instances
            .get_or_try(predicate, || self.graph.predicate_pairs(predicate))
    }

    /// Distinct `(x, y)` pairs connected by `path` with x ∈ domain and
    /// y ∈ range.
    pub fn path_pairs(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<PairSet> {
        let subjects = self.allowed_subjects(domain)?;
        let objects = self.allowed_objects(range)?;
        join_path(&self.graph, path, &subjects, &objects)
    }
}

impl<G: GraphQuery> CountRetriever for InMemoryCountRetriever<G> {
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<u64> {
        let count = self.path_pairs(path, domain, range)?.len() as u64;
        debug!(path = %path, count, "path instances");
        Ok(count)
    }

    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64> {
        let instances = self.predicate_instances(predicate)?;
        if instances.is_empty() {
            return Ok(0);
        }
        // Only endpoints of direct instances can co-occur.
        let subjects: EntitySet = instances.iter().map(|(s, _)| s.clone()).collect();
        let objects: EntitySet = instances.iter().map(|(_, o)| o.clone()).collect();

        let pairs = join_path(&self.graph, path, &subjects, &objects)?;
        let count = pairs.par_iter().filter(|pair| instances.contains(*pair)).count() as u64;
        debug!(property = %predicate.property, path = %path, count, "co-occurrences");
        Ok(count)
    }

    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64> {
        Ok(self.predicate_instances(predicate)?.len() as u64)
    }

    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64> {
        let subjects = self.allowed_subjects(predicate.domain.as_ref())?.len() as u64;
        let objects = self.allowed_objects(predicate.range.as_ref())?.len() as u64;
        Ok(subjects.saturating_mul(objects))
    }
}

// ============================================================================
// Joins
// ============================================================================

/// Distinct `(x, y)` with x ∈ `subjects`, y ∈ `objects`, connected by `path`.
pub fn join_path<G: GraphQuery + ?Sized>(
    graph: &G,
    path: &RestrictedPath,
    subjects: &EntitySet,
    objects: &EntitySet,
) -> Result<PairSet> {
    if subjects.is_empty() || objects.is_empty() {
        return Ok(PairSet::new());
    }
    match path.elements() {
        [p1] => join_single(graph, p1, subjects, objects),
        [p1, p2] => join_two(graph, p1, p2, subjects, objects),
        [p1, p2, p3] => join_three(graph, p1, p2, p3, subjects, objects),
        other => Err(crate::Error::InvalidPathLength(other.len())),
    }
}

fn join_single<G: GraphQuery + ?Sized>(
    graph: &G,
    element: &PathElement,
    subjects: &EntitySet,
    objects: &EntitySet,
) -> Result<PairSet> {
    let pairs = if subjects.len() <= objects.len() {
        let mut pairs = graph.lookup(&element.property, element.direction, Some(subjects))?;
        pairs.retain(|(_, o)| objects.contains(o));
        pairs
    } else {
        graph
            .lookup(&element.property, element.direction.flip(), Some(objects))?
            .into_par_iter()
            .filter(|(_, s)| subjects.contains(s))
            .map(|(o, s)| (s, o))
            .collect()
    };
    Ok(pairs)
}

fn join_two<G: GraphQuery + ?Sized>(
    graph: &G,
    p1: &PathElement,
    p2: &PathElement,
    subjects: &EntitySet,
    objects: &EntitySet,
) -> Result<PairSet> {
    // x → subjects reaching it, x → objects reachable from it
    let left = graph.reach(&p1.property, p1.direction, subjects)?;
    if left.is_empty() {
        return Ok(PairSet::new());
    }
    let right = graph.reach(&p2.property, p2.direction.flip(), objects)?;
    Ok(join_on_key(&left, &right))
}

fn join_three<G: GraphQuery + ?Sized>(
    graph: &G,
    p1: &PathElement,
    p2: &PathElement,
    p3: &PathElement,
    subjects: &EntitySet,
    objects: &EntitySet,
) -> Result<PairSet> {
    // x1 → subjects, x2 → objects
    let left = graph.reach(&p1.property, p1.direction, subjects)?;
    if left.is_empty() {
        return Ok(PairSet::new());
    }
    let right = graph.reach(&p3.property, p3.direction.flip(), objects)?;
    if right.is_empty() {
        return Ok(PairSet::new());
    }

    // Walk the middle hop from the smaller frontier, then re-key so the
    // join is always x2 → subjects against x2 → objects.
    let left_extended = if left.len() <= right.len() {
        let frontier: EntitySet = left.keys().cloned().collect();
        let middle = graph.reach(&p2.property, p2.direction, &frontier)?;
        // middle: x2 → x1s
        compose(&middle, &left)
    } else {
        let frontier: EntitySet = right.keys().cloned().collect();
        let middle = graph.reach(&p2.property, p2.direction.flip(), &frontier)?;
        // middle: x1 → x2s; invert to x2 → x1s restricted to known x1
        let mut inverted = Adjacency::new();
        for (x1, x2s) in &middle {
            if left.contains_key(x1) {
                for x2 in x2s {
                    inverted.entry(x2.clone()).or_default().insert(x1.clone());
                }
            }
        }
        compose(&inverted, &left)
    };
    Ok(join_on_key(&left_extended, &right))
}

/// `x2 → x1s` composed with `x1 → subjects` gives `x2 → subjects`.
fn compose(middle: &Adjacency, left: &Adjacency) -> Adjacency {
    middle
        .par_iter()
        .map(|(x2, x1s)| {
            let reached: EntitySet = x1s
                .iter()
                .filter_map(|x1| left.get(x1))
                .flat_map(|subjects| subjects.iter().cloned())
                .collect();
            (x2.clone(), reached)
        })
        .filter(|(_, reached)| !reached.is_empty())
        .collect()
}

/// Pairs `(s, o)` for every key shared by `left: key → subjects` and
/// `right: key → objects`.
fn join_on_key(left: &Adjacency, right: &Adjacency) -> PairSet {
    let (probe, build, swapped) = if left.len() <= right.len() {
        (left, right, false)
    } else {
        (right, left, true)
    };
    probe
        .par_iter()
        .filter_map(|(key, near)| build.get(key).map(|far| (near, far)))
        .fold(PairSet::new, |mut acc, (near, far)| {
            for a in near {
                for b in far {
                    let pair = if swapped { (b.clone(), a.clone()) } else { (a.clone(), b.clone()) };
                    acc.insert(pair);
                }
            }
            acc
        })
        .reduce(PairSet::new, |mut a, mut b| {
            if a.len() < b.len() {
                std::mem::swap(&mut a, &mut b);
            }
            a.extend(b);
            a
        })
}
