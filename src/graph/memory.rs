//! In-memory knowledge graph.
//!
//! This is the reference implementation of `GraphQuery`.
//! Edges are indexed by property in both directions and protected by one
//! RwLock: loading takes the write lock, counting and search only read.
//!
//! ## Limitations
//!
//! - **IRI edges only**: literal objects are counted but not stored; they
//!   can never be a join key or a path endpoint.
//! - **No removal**: the graph is loaded once and then queried.
//! - **Neighbour scans**: `neighbours()` probes every property index, so it
//!   scales with the number of distinct properties.
//!
//! Use this graph for:
//! - Counting paths over a fully loaded dataset with `InMemoryCountRetriever`
//! - Path search over example triples without a SPARQL endpoint
//! - Synthetic graphs in tests

use parking_lot::RwLock;
use rayon::prelude::*;

use hashbrown::{HashMap, HashSet};

use crate::histogram::Histogram;
use crate::model::*;
use crate::Result;
use super::{Adjacency, EntitySet, GraphQuery, PairSet};

// ============================================================================
// MemoryGraph
// ============================================================================

/// In-memory RDF-style graph.
#[derive(Default)]
pub struct MemoryGraph {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    /// property → subject → objects
    outgoing: HashMap<Iri, Adjacency>,
    /// property → object → subjects
    incoming: HashMap<Iri, Adjacency>,
    /// entity → classes (`rdf:type` objects)
    types: Adjacency,
    /// class → instances
    instances: Adjacency,
    /// Every subject and every non-class IRI object
    entities: EntitySet,
    /// Interned IRIs, so join sets share allocations
    iris: HashSet<Iri>,
    edge_count: usize,
    literal_count: usize,
}

impl MemoryInner {
    fn intern(&mut self, value: &str) -> Iri {
        if let Some(existing) = self.iris.get(value) {
            return existing.clone();
        }
        let interned = iri(value);
        self.iris.insert(interned.clone());
        interned
    }

    fn index(&self, direction: Direction) -> &HashMap<Iri, Adjacency> {
        match direction {
            Direction::Forward => &self.outgoing,
            Direction::Inverse => &self.incoming,
        }
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a graph from triples.
    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let graph = Self::new();
        graph.extend(triples);
        graph
    }

    /// Insert a triple. Returns true if a new IRI edge was stored.
    pub fn insert(&self, triple: &Triple) -> bool {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let subject = inner.intern(&triple.subject);
        inner.entities.insert(subject.clone());

        let object = match &triple.object {
            Term::Iri(object) => inner.intern(object),
            Term::Literal(_) => {
                inner.literal_count += 1;
                return false;
            }
        };
        let property = inner.intern(&triple.property);

        let added = inner
            .outgoing
            .entry(property.clone())
            .or_default()
            .entry(subject.clone())
            .or_default()
            .insert(object.clone());
        if !added {
            return false;
        }
        inner
            .incoming
            .entry(property.clone())
            .or_default()
            .entry(object.clone())
            .or_default()
            .insert(subject.clone());

        if &*property == RDF_TYPE {
            inner.types.entry(subject.clone()).or_default().insert(object.clone());
            inner.instances.entry(object).or_default().insert(subject);
        } else {
            inner.entities.insert(object);
        }
        inner.edge_count += 1;
        true
    }

    /// Insert an IRI-to-IRI edge.
    pub fn insert_iri(&self, subject: &str, property: &str, object: &str) -> bool {
        self.insert(&Triple::new(subject, property, object))
    }

    pub fn extend(&self, triples: impl IntoIterator<Item = Triple>) {
        for triple in triples {
            self.insert(&triple);
        }
    }

    /// Number of stored IRI edges.
    pub fn len(&self) -> usize {
        self.inner.read().edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of literal-object triples seen while loading.
    pub fn literal_count(&self) -> usize {
        self.inner.read().literal_count
    }

    pub fn entity_count(&self) -> usize {
        self.inner.read().entities.len()
    }

    /// All distinct edge labels.
    pub fn properties(&self) -> Vec<Iri> {
        let mut properties: Vec<Iri> = self.inner.read().outgoing.keys().cloned().collect();
        properties.sort();
        properties
    }

    /// Number of IRI edges per property.
    pub fn property_histogram(&self) -> Histogram {
        let inner = self.inner.read();
        inner
            .outgoing
            .iter()
            .map(|(property, index)| {
                let count: usize = index.values().map(|objects| objects.len()).sum();
                (property.clone(), count as u64)
            })
            .collect()
    }

    /// Number of instances per class.
    pub fn class_histogram(&self) -> Histogram {
        let inner = self.inner.read();
        inner
            .instances
            .iter()
            .map(|(class, instances)| (class.clone(), instances.len() as u64))
            .collect()
    }
}

// ============================================================================
// GraphQuery impl
// ============================================================================

impl GraphQuery for MemoryGraph {
    fn lookup(
        &self,
        property: &str,
        direction: Direction,
        anchors: Option<&EntitySet>,
    ) -> Result<PairSet> {
        let inner = self.inner.read();
        let Some(index) = inner.index(direction).get(property) else {
            return Ok(PairSet::new());
        };

        let pairs = match anchors {
            Some(anchors) => anchors
                .par_iter()
                .filter_map(|anchor| index.get(anchor).map(|targets| (anchor, targets)))
                .flat_map_iter(|(anchor, targets)| {
                    targets.iter().map(move |target| (anchor.clone(), target.clone()))
                })
                .collect(),
            None => index
                .par_iter()
                .flat_map_iter(|(anchor, targets)| {
                    targets.iter().map(move |target| (anchor.clone(), target.clone()))
                })
                .collect(),
        };
        Ok(pairs)
    }

    fn resolve_restriction(&self, restriction: Option<&TypeRestriction>) -> Result<EntitySet> {
        let inner = self.inner.read();
        let resolved = match restriction {
            None => inner.entities.clone(),
            Some(TypeRestriction::Entities(entities)) => entities.iter().cloned().collect(),
            Some(restriction) => inner
                .types
                .par_iter()
                .filter(|(entity, classes)| restriction.admits(entity, classes.iter().map(|c| &**c)))
                .map(|(entity, _)| entity.clone())
                .collect(),
        };
        Ok(resolved)
    }

    fn neighbours(&self, entity: &str) -> Result<Vec<(PathElement, Iri)>> {
        let inner = self.inner.read();
        let mut result = Vec::new();
        for (direction, index) in [
            (Direction::Forward, &inner.outgoing),
            (Direction::Inverse, &inner.incoming),
        ] {
            for (property, adjacency) in index {
                if let Some(others) = adjacency.get(entity) {
                    let element = PathElement { property: property.clone(), direction };
                    result.extend(others.iter().map(|other| (element.clone(), other.clone())));
                }
            }
        }
        Ok(result)
    }

    fn reach(
        &self,
        property: &str,
        direction: Direction,
        anchors: &EntitySet,
    ) -> Result<Adjacency> {
        let inner = self.inner.read();
        let Some(index) = inner.index(direction).get(property) else {
            return Ok(Adjacency::new());
        };

        let adjacency = anchors
            .par_iter()
            .filter_map(|anchor| index.get(anchor).map(|targets| (anchor, targets)))
            .fold(Adjacency::new, |mut acc, (anchor, targets)| {
                for target in targets {
                    acc.entry(target.clone()).or_default().insert(anchor.clone());
                }
                acc
            })
            .reduce(Adjacency::new, merge_adjacency);
        Ok(adjacency)
    }
}

/// Union two partial adjacency maps, folding the smaller into the larger.
pub(crate) fn merge_adjacency(mut a: Adjacency, mut b: Adjacency) -> Adjacency {
    if a.len() < b.len() {
        std::mem::swap(&mut a, &mut b);
    }
    for (key, values) in b {
        a.entry(key).or_default().extend(values);
    }
    a
}

// ============================================================================
// Tests
// ============================================================================
