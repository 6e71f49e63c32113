//! Remote counting: aggregate queries against a `QueryEndpoint`.
//!
//! Every count is one `SELECT (COUNT(*) AS ?c)` over a `SELECT DISTINCT
//! ?s ?o` sub-query; only a number comes back. Co-occurrence is probed
//! with `ASK` first and counted only when the answer is yes.
//!
//! The path pattern itself comes from a `PathClauseGenerator`, so the
//! same retriever serves stores that prefer basic graph patterns and
//! stores that evaluate property paths natively.

use tracing::debug;

use crate::graph::remote::append_any_entity;
use crate::graph::QueryEndpoint;
use crate::model::*;
use crate::{Error, Result};
use super::clause::{BgpPathClauseGenerator, PathClauseGenerator};
use super::CountRetriever;

const COUNT_VAR: &str = "c";

/// `CountRetriever` delegating every count to an endpoint.
pub struct RemoteCountRetriever<E> {
    endpoint: E,
    generator: Box<dyn PathClauseGenerator>,
}

impl<E: QueryEndpoint> RemoteCountRetriever<E> {
    /// Retriever writing basic graph patterns.
    pub fn new(endpoint: E) -> Self {
        Self::with_generator(endpoint, Box::new(BgpPathClauseGenerator))
    }

    pub fn with_generator(endpoint: E, generator: Box<dyn PathClauseGenerator>) -> Self {
        Self { endpoint, generator }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// The body shared by path, co-occurrence and ASK queries.
    fn pattern(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
        property: Option<&str>,
    ) -> String {
        let mut body = String::new();
        if let Some(domain) = domain {
            domain.append_to_query("s", &mut body);
        }
        if let Some(range) = range {
            range.append_to_query("o", &mut body);
        }
        self.generator.append_path_clause(path, "s", "o", &mut body);
        if let Some(property) = property {
            body.push_str(&format!("?s <{property}> ?o . "));
        }
        body.push_str("FILTER(isIRI(?s) && isIRI(?o)) ");
        body
    }

    fn count_pairs(&self, body: &str) -> Result<u64> {
        let query = format!(
            "SELECT (COUNT(*) AS ?{COUNT_VAR}) WHERE {{ SELECT DISTINCT ?s ?o WHERE {{ {body}}} }}"
        );
        debug!(query = %query, "remote count");
        self.endpoint.count(&query, COUNT_VAR)
    }

    fn count_candidates(&self, restriction: Option<&TypeRestriction>, var: &str) -> Result<u64> {
        let mut query = format!("SELECT (COUNT(DISTINCT ?{var}) AS ?{COUNT_VAR}) WHERE {{ ");
        match restriction {
            Some(restriction) => restriction.append_to_query(var, &mut query),
            None => append_any_entity(var, &mut query),
        }
        query.push('}');
        debug!(query = %query, "remote candidate count");
        self.endpoint.count(&query, COUNT_VAR)
    }

    /// `Some(false)` when the store says no pair exists, `None` when it
    /// cannot answer ASK queries.
    fn ask(&self, body: &str) -> Result<Option<bool>> {
        let query = format!("ASK {{ {body}}}");
        debug!(query = %query, "remote ask");
        match self.endpoint.ask(&query) {
            Ok(answer) => Ok(Some(answer)),
            Err(Error::Unsupported(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<E: QueryEndpoint> CountRetriever for RemoteCountRetriever<E> {
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<u64> {
        self.count_pairs(&self.pattern(path, domain, range, None))
    }

    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64> {
        let body = self.pattern(
            path,
            predicate.domain.as_ref(),
            predicate.range.as_ref(),
            Some(&*predicate.property),
        );
        if self.ask(&body)? == Some(false) {
            return Ok(0);
        }
        self.count_pairs(&body)
    }

    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64> {
        let direct = RestrictedPath::single(&predicate.property, Direction::Forward);
        self.count_path_instances(&direct, predicate.domain.as_ref(), predicate.range.as_ref())
    }

    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64> {
        let subjects = self.count_candidates(predicate.domain.as_ref(), "s")?;
        if subjects == 0 {
            return Ok(0);
        }
        let objects = self.count_candidates(predicate.range.as_ref(), "o")?;
        Ok(subjects.saturating_mul(objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::count::PropertyPathClauseGenerator;
    use crate::graph::QuerySolution;
    use parking_lot::Mutex;

    /// Answers counts from a queue and ASKs with a fixed answer.
    struct Scripted {
        counts: Mutex<Vec<u64>>,
        ask: Option<bool>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(counts: &[u64], ask: Option<bool>) -> Self {
            let mut counts = counts.to_vec();
            counts.reverse();
            Self { counts: Mutex::new(counts), ask, seen: Mutex::new(Vec::new()) }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().clone()
        }
    }

    impl QueryEndpoint for Scripted {
        fn select(&self, query: &str) -> Result<Vec<QuerySolution>> {
            self.seen.lock().push(query.to_string());
            let value = self
                .counts
                .lock()
                .pop()
                .ok_or_else(|| Error::query_failure(query, "script exhausted"))?;
            let mut row = QuerySolution::new();
            row.insert(COUNT_VAR.to_string(), value.to_string());
            Ok(vec![row])
        }

        fn ask(&self, query: &str) -> Result<bool> {
            self.seen.lock().push(query.to_string());
            self.ask.ok_or_else(|| Error::Unsupported("ASK".into()))
        }
    }

    fn path() -> RestrictedPath {
        RestrictedPath::new([PathElement::forward("ex:livesIn"), PathElement::forward("ex:locatedIn")])
            .unwrap()
    }

    fn predicate() -> Predicate {
        Predicate::new("ex:nationality").with_domain(TypeRestriction::types(["ex:Person"]))
    }

    #[test]
    fn test_path_instances_query() {
        let retriever = RemoteCountRetriever::new(Scripted::new(&[7], None));
        let count = retriever
            .count_path_instances(&path(), predicate().domain.as_ref(), None)
            .unwrap();
        assert_eq!(count, 7);

        let seen = retriever.endpoint().seen();
        assert!(seen[0].starts_with("SELECT (COUNT(*) AS ?c) WHERE { SELECT DISTINCT ?s ?o"));
        assert!(seen[0].contains("?s <ex:livesIn> ?x1 . ?x1 <ex:locatedIn> ?o ."));
        assert!(seen[0].contains(&format!("?s <{RDF_TYPE}> <ex:Person>")));
    }

    #[test]
    fn test_property_path_style() {
        let retriever = RemoteCountRetriever::with_generator(
            Scripted::new(&[1], None),
            Box::new(PropertyPathClauseGenerator),
        );
        retriever.count_path_instances(&path(), None, None).unwrap();
        assert!(retriever.endpoint().seen()[0].contains("?s <ex:livesIn>/<ex:locatedIn> ?o ."));
    }

    #[test]
    fn test_negative_ask_skips_count() {
        let retriever = RemoteCountRetriever::new(Scripted::new(&[], Some(false)));
        assert_eq!(retriever.count_cooccurrences(&predicate(), &path()).unwrap(), 0);
        let seen = retriever.endpoint().seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("ASK"));
        assert!(seen[0].contains("?s <ex:nationality> ?o ."));
    }

    #[test]
    fn test_cooccurrence_without_ask_support() {
        let retriever = RemoteCountRetriever::new(Scripted::new(&[3], None));
        assert_eq!(retriever.count_cooccurrences(&predicate(), &path()).unwrap(), 3);
    }

    #[test]
    fn test_max_count_multiplies_candidates() {
        let retriever = RemoteCountRetriever::new(Scripted::new(&[4, 5], None));
        assert_eq!(retriever.derive_max_count(&predicate()).unwrap(), 20);
        let seen = retriever.endpoint().seen();
        assert!(seen[0].contains("COUNT(DISTINCT ?s)"));
        assert!(seen[1].contains("UNION"));
    }

    #[test]
    fn test_failure_is_not_zero() {
        let retriever = RemoteCountRetriever::new(Scripted::new(&[], None));
        let err = retriever.count_predicate_instances(&predicate()).unwrap_err();
        assert!(err.is_query_failure());
    }
}
