//! Terms and triples: the edges a knowledge graph is made of.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An IRI. Shared, immutable, cheap to clone into join sets.
pub type Iri = Arc<str>;

/// `rdf:type`, the edge a type restriction is evaluated against.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Build an [`Iri`] from anything string-like.
pub fn iri(value: impl AsRef<str>) -> Iri {
    Arc::from(value.as_ref())
}

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Term {
    Iri(Iri),
    Literal(String),
}

impl Term {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Literal(_) => None,
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Iri(iri(value))
    }
}

impl From<Iri> for Term {
    fn from(value: Iri) -> Self {
        Term::Iri(value)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Literal(lit) => write!(f, "{lit:?}"),
        }
    }
}

/// A single `(subject, property, object)` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Iri,
    pub property: Iri,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: impl AsRef<str>, property: impl AsRef<str>, object: impl Into<Term>) -> Self {
        Self {
            subject: iri(subject),
            property: iri(property),
            object: object.into(),
        }
    }

    /// Triple with a literal object. Literal edges never take part in joins.
    pub fn literal(subject: impl AsRef<str>, property: impl AsRef<str>, value: impl Into<String>) -> Self {
        Self {
            subject: iri(subject),
            property: iri(property),
            object: Term::Literal(value.into()),
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> <{}> {} .", self.subject, self.property, self.object)
    }
}
