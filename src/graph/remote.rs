//! Remote graph: `GraphQuery` over a SPARQL endpoint.
//!
//! The transport is not ours: a `QueryEndpoint` takes query text and hands
//! back solutions (HTTP client, embedded store, test double). This module
//! only decides WHICH queries to send.
//!
//! ```text
//! GraphQuery::lookup(p, dir, anchors) → SELECT DISTINCT ?from ?to … VALUES ?from {…}
//!   → QueryEndpoint::select → PairSet
//! ```
//!
//! Failures are never swallowed: an endpoint error surfaces as
//! `Error::QueryFailure` so callers can tell "unknown" from "absent".

use std::fmt::Write;
use std::sync::Arc;

use hashbrown::HashMap;
use tracing::debug;

use crate::model::*;
use crate::{Error, Result};
use super::{EntitySet, GraphQuery, PairSet};

/// Anchors per `VALUES` block, so a large anchor set becomes several
/// moderate queries instead of one enormous one.
const VALUES_CHUNK: usize = 256;

/// One solution row: variable name (without `?`) → bound value.
///
/// IRIs are given without angle brackets; literals by their lexical form.
pub type QuerySolution = HashMap<String, String>;

// ============================================================================
// QueryEndpoint Trait
// ============================================================================

/// A SPARQL-speaking store. Implementations own transport, timeouts and
/// retries; they report every failure as `Error::QueryFailure`.
pub trait QueryEndpoint: Send + Sync {
    /// Run a SELECT query.
    fn select(&self, query: &str) -> Result<Vec<QuerySolution>>;

    /// Run an ASK query.
    ///
    /// Default returns "not supported".
    fn ask(&self, _query: &str) -> Result<bool> {
        Err(Error::Unsupported("ASK queries".into()))
    }

    /// Run an aggregate SELECT and read the integer bound to `variable`
    /// in the first solution.
    fn count(&self, query: &str, variable: &str) -> Result<u64> {
        let rows = self.select(query)?;
        let value = rows
            .first()
            .and_then(|row| row.get(variable))
            .ok_or_else(|| Error::query_failure(query, format!("no binding for ?{variable}")))?;
        parse_count(value)
            .ok_or_else(|| Error::query_failure(query, format!("not a count: {value:?}")))
    }
}

impl<E: QueryEndpoint + ?Sized> QueryEndpoint for &E {
    fn select(&self, query: &str) -> Result<Vec<QuerySolution>> {
        (**self).select(query)
    }

    fn ask(&self, query: &str) -> Result<bool> {
        (**self).ask(query)
    }

    fn count(&self, query: &str, variable: &str) -> Result<u64> {
        (**self).count(query, variable)
    }
}

impl<E: QueryEndpoint + ?Sized> QueryEndpoint for Arc<E> {
    fn select(&self, query: &str) -> Result<Vec<QuerySolution>> {
        (**self).select(query)
    }

    fn ask(&self, query: &str) -> Result<bool> {
        (**self).ask(query)
    }

    fn count(&self, query: &str, variable: &str) -> Result<u64> {
        (**self).count(query, variable)
    }
}

/// Parse `42`, `"42"` or `"42"^^<xsd:integer>`. Anything but a plain
/// non-negative integer is rejected.
fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    let lexical = match value.strip_prefix('"') {
        Some(quoted) => {
            let (lexical, rest) = quoted.split_once('"')?;
            if !rest.is_empty() && !rest.starts_with("^^") {
                return None;
            }
            lexical
        }
        None => value,
    };
    if lexical.is_empty() || !lexical.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    lexical.parse().ok()
}

/// Bind `?var` to every entity: any subject, or any IRI object of an edge
/// other than `rdf:type`. Classes only reached through `rdf:type` are not
/// entities.
pub(crate) fn append_any_entity(var: &str, query: &mut String) {
    let _ = write!(
        query,
        "{{ ?{var} ?{var}_sp ?{var}_so }} UNION \
         {{ ?{var}_os ?{var}_op ?{var} FILTER(isIRI(?{var}) && ?{var}_op != <{RDF_TYPE}>) }} "
    );
}

// ============================================================================
// RemoteGraph
// ============================================================================

/// `GraphQuery` answered by SELECT queries against an endpoint.
pub struct RemoteGraph<E> {
    endpoint: E,
}

impl<E: QueryEndpoint> RemoteGraph<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    fn select(&self, query: &str) -> Result<Vec<QuerySolution>> {
        debug!(query, "remote select");
        self.endpoint.select(query)
    }

    fn binding<'r>(row: &'r QuerySolution, variable: &str, query: &str) -> Result<&'r str> {
        row.get(variable)
            .map(String::as_str)
            .ok_or_else(|| Error::query_failure(query, format!("missing binding ?{variable}")))
    }

    fn lookup_query(property: &str, direction: Direction, anchors: Option<&[&Iri]>) -> String {
        let mut query = String::from("SELECT DISTINCT ?from ?to WHERE { ");
        if let Some(anchors) = anchors {
            query.push_str("VALUES ?from {");
            for anchor in anchors {
                let _ = write!(query, " <{anchor}>");
            }
            query.push_str(" } ");
        }
        match direction {
            Direction::Forward => { let _ = write!(query, "?from <{property}> ?to . "); }
            Direction::Inverse => { let _ = write!(query, "?to <{property}> ?from . "); }
        }
        query.push_str("FILTER(isIRI(?from) && isIRI(?to)) }");
        query
    }

    fn collect_pairs(&self, query: &str, pairs: &mut PairSet) -> Result<()> {
        for row in self.select(query)? {
            let from = Self::binding(&row, "from", query)?;
            let to = Self::binding(&row, "to", query)?;
            pairs.insert((iri(from), iri(to)));
        }
        Ok(())
    }
}

impl<E: QueryEndpoint> GraphQuery for RemoteGraph<E> {
    fn lookup(
        &self,
        property: &str,
        direction: Direction,
        anchors: Option<&EntitySet>,
    ) -> Result<PairSet> {
        let mut pairs = PairSet::new();
        match anchors {
            None => {
                let query = Self::lookup_query(property, direction, None);
                self.collect_pairs(&query, &mut pairs)?;
            }
            Some(anchors) => {
                let mut sorted: Vec<&Iri> = anchors.iter().collect();
                sorted.sort();
                for chunk in sorted.chunks(VALUES_CHUNK) {
                    let query = Self::lookup_query(property, direction, Some(chunk));
                    self.collect_pairs(&query, &mut pairs)?;
                }
            }
        }
        Ok(pairs)
    }

    fn resolve_restriction(&self, restriction: Option<&TypeRestriction>) -> Result<EntitySet> {
        let mut query = String::from("SELECT DISTINCT ?s WHERE { ");
        match restriction {
            Some(restriction) => restriction.append_to_query("s", &mut query),
            None => append_any_entity("s", &mut query),
        }
        query.push('}');

        let mut entities = EntitySet::new();
        for row in self.select(&query)? {
            entities.insert(iri(Self::binding(&row, "s", &query)?));
        }
        Ok(entities)
    }

    fn neighbours(&self, entity: &str) -> Result<Vec<(PathElement, Iri)>> {
        let mut result = Vec::new();
        let outgoing = format!("SELECT DISTINCT ?p ?x WHERE {{ <{entity}> ?p ?x . FILTER(isIRI(?x)) }}");
        let incoming = format!("SELECT DISTINCT ?p ?x WHERE {{ ?x ?p <{entity}> . FILTER(isIRI(?x)) }}");
        for (direction, query) in [(Direction::Forward, outgoing), (Direction::Inverse, incoming)] {
            for row in self.select(&query)? {
                let property = Self::binding(&row, "p", &query)?;
                let other = Self::binding(&row, "x", &query)?;
                result.push((PathElement::new(property, direction), iri(other)));
            }
        }
        Ok(result)
    }
}
