//! Path clause generation for remote counting.
//!
//! A clause generator writes the graph pattern that binds `?subject` and
//! `?object` to the two ends of a restricted path. The surrounding query
//! (restrictions, projection, aggregation) is written by the retriever.

use std::fmt::Write;

use crate::model::{Direction, RestrictedPath};

/// Writes the pattern connecting two variables through a path.
pub trait PathClauseGenerator: Send + Sync {
    /// Append the pattern for `path` from `?subject` to `?object`.
    fn append_path_clause(&self, path: &RestrictedPath, subject: &str, object: &str, query: &mut String);

    /// The pattern as a new string.
    fn path_clause(&self, path: &RestrictedPath, subject: &str, object: &str) -> String {
        let mut clause = String::new();
        self.append_path_clause(path, subject, object, &mut clause);
        clause
    }
}

/// One triple pattern per hop, with `?x1`, `?x2` as intermediates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BgpPathClauseGenerator;

impl PathClauseGenerator for BgpPathClauseGenerator {
    fn append_path_clause(&self, path: &RestrictedPath, subject: &str, object: &str, query: &mut String) {
        let last = path.len() - 1;
        for (i, element) in path.elements().iter().enumerate() {
            let from = if i == 0 { subject.to_string() } else { format!("x{i}") };
            let to = if i == last { object.to_string() } else { format!("x{}", i + 1) };
            let property = &element.property;
            let _ = match element.direction {
                Direction::Forward => write!(query, "?{from} <{property}> ?{to} . "),
                Direction::Inverse => write!(query, "?{to} <{property}> ?{from} . "),
            };
        }
    }
}

/// A single SPARQL 1.1 sequence path, `^` marking inverse hops.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyPathClauseGenerator;

impl PathClauseGenerator for PropertyPathClauseGenerator {
    fn append_path_clause(&self, path: &RestrictedPath, subject: &str, object: &str, query: &mut String) {
        let _ = write!(query, "?{subject} {path} ?{object} . ");
    }
}
