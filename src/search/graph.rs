//! Meet-in-the-middle path search over a `GraphQuery`.
//!
//! ```text
//! s ──e1── x1 ──e2── x2 ──e3── o
//! └ neighbours(s) ┘        └ neighbours(o), flipped ┘
//!          └ neighbours(x1) ┘   (length 3 only)
//! ```
//!
//! One neighbour expansion from each end covers lengths 1 and 2; length 3
//! expands once more from the subject side and meets the object side on
//! `x2`. Intermediate nodes are distinct from both ends and from each other.

use hashbrown::{HashMap, HashSet};
use tracing::debug;

use crate::config::SearchConfig;
use crate::graph::GraphQuery;
use crate::model::*;
use crate::Result;
use super::{NamespaceFilter, PathSearcher};

/// `PathSearcher` expanding neighbourhoods of a `GraphQuery`.
pub struct GraphPathSearcher<G> {
    graph: G,
    filter: NamespaceFilter,
    max_path_length: usize,
}

impl<G: GraphQuery> GraphPathSearcher<G> {
    pub fn new(graph: G, filter: NamespaceFilter, max_path_length: usize) -> Self {
        Self {
            graph,
            filter,
            max_path_length: max_path_length.clamp(1, MAX_PATH_LENGTH),
        }
    }

    pub fn from_config(graph: G, config: &SearchConfig) -> Self {
        Self::new(graph, config.namespaces.clone(), config.max_path_length)
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Neighbours over followable edges, grouped by the node reached.
    fn expand(&self, entity: &str) -> Result<HashMap<Iri, Vec<PathElement>>> {
        let mut grouped: HashMap<Iri, Vec<PathElement>> = HashMap::new();
        for (element, other) in self.graph.neighbours(entity)? {
            if &*element.property == RDF_TYPE || !self.filter.accepts(&element.property) {
                continue;
            }
            grouped.entry(other).or_default().push(element);
        }
        Ok(grouped)
    }
}

impl<G: GraphQuery> PathSearcher for GraphPathSearcher<G> {
    fn search(
        &self,
        subject: &str,
        predicate: &Predicate,
        object: &str,
    ) -> Result<HashSet<RestrictedPath>> {
        let trivial = PathElement::forward(&predicate.property);
        let is_end = |node: &Iri| **node == *subject || **node == *object;
        let mut found = HashSet::new();

        let left = self.expand(subject)?;

        // Length 1
        if let Some(direct) = left.get(object) {
            found.extend(
                direct
                    .iter()
                    .filter(|e| **e != trivial)
                    .map(|e| RestrictedPath::single(&e.property, e.direction)),
            );
        }

        if self.max_path_length >= 2 {
            // x → elements leading from x into the object
            let right: HashMap<Iri, Vec<PathElement>> = self
                .expand(object)?
                .into_iter()
                .filter(|(node, _)| !is_end(node))
                .map(|(node, elements)| (node, elements.iter().map(PathElement::flipped).collect()))
                .collect();

            for (x1, firsts) in left.iter().filter(|(node, _)| !is_end(*node)) {
                // Length 2
                if let Some(lasts) = right.get(x1) {
                    for e1 in firsts {
                        for e2 in lasts {
                            found.insert(RestrictedPath::new([e1.clone(), e2.clone()])?);
                        }
                    }
                }

                // Length 3
                if self.max_path_length < 3 {
                    continue;
                }
                for (x2, middles) in self.expand(x1)? {
                    if is_end(&x2) || x2 == *x1 {
                        continue;
                    }
                    let Some(lasts) = right.get(&x2) else { continue };
                    for e1 in firsts {
                        for e2 in &middles {
                            for e3 in lasts {
                                found.insert(RestrictedPath::new([e1.clone(), e2.clone(), e3.clone()])?);
                            }
                        }
                    }
                }
            }
        }

        debug!(subject, object, property = %predicate.property, paths = found.len(), "path search");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    fn graph() -> MemoryGraph {
        let graph = MemoryGraph::new();
        graph.insert_iri("ex:A", "ex:nationality", "ex:D");
        graph.insert_iri("ex:A", "ex:livesIn", "ex:C");
        graph.insert_iri("ex:C", "ex:locatedIn", "ex:D");
        graph.insert_iri("ex:D", "ex:capital", "ex:C");
        graph.insert_iri("ex:B", "ex:knows", "ex:A");
        graph.insert_iri("ex:B", "ex:bornIn", "ex:E");
        graph.insert_iri("ex:E", "ex:locatedIn", "ex:D");
        graph.insert_iri("ex:A", RDF_TYPE, "ex:Person");
        graph.insert_iri("ex:D", RDF_TYPE, "ex:Person");
        graph.insert_iri("ex:A", "other:seeAlso", "ex:D");
        graph
    }

    fn rendered(paths: &HashSet<RestrictedPath>) -> Vec<String> {
        let mut out: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
        out.sort();
        out
    }

    #[test]
    fn test_finds_paths_of_every_length() {
        let searcher = GraphPathSearcher::new(graph(), NamespaceFilter::allow(["ex:"]), 3);
        let found = searcher.search("ex:A", &Predicate::new("ex:nationality"), "ex:D").unwrap();
        assert_eq!(
            rendered(&found),
            vec![
                "<ex:livesIn>/<ex:locatedIn>",
                "<ex:livesIn>/^<ex:capital>",
                "^<ex:knows>/<ex:bornIn>/<ex:locatedIn>",
            ]
        );
    }

    #[test]
    fn test_trivial_path_only_excluded_for_its_property() {
        let searcher = GraphPathSearcher::new(graph(), NamespaceFilter::allow(["ex:"]), 1);
        let found = searcher.search("ex:A", &Predicate::new("ex:citizenOf"), "ex:D").unwrap();
        assert_eq!(rendered(&found), vec!["<ex:nationality>"]);
    }

    #[test]
    fn test_namespace_filter_and_type_edges() {
        let searcher = GraphPathSearcher::new(graph(), NamespaceFilter::any(), 2);
        let found = searcher.search("ex:A", &Predicate::new("ex:nationality"), "ex:D").unwrap();
        let found = rendered(&found);
        assert!(found.contains(&"<other:seeAlso>".to_string()));
        // A and D share the class ex:Person, but rdf:type is never followed.
        assert!(found.iter().all(|p| !p.contains(RDF_TYPE)));
    }

    #[test]
    fn test_max_length_limits_search() {
        let searcher = GraphPathSearcher::new(graph(), NamespaceFilter::allow(["ex:"]), 2);
        let found = searcher.search("ex:A", &Predicate::new("ex:nationality"), "ex:D").unwrap();
        assert!(found.iter().all(|p| p.len() <= 2));
        assert_eq!(found.len(), 2);
    }
}
