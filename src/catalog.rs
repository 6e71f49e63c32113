//! Predicate descriptions: which classes bound a property's subjects and
//! objects.
//!
//! ```json
//! {
//!   "http://dbpedia.org/ontology/birthPlace": {
//!     "domain": ["http://dbpedia.org/ontology/Person"],
//!     "range": ["http://dbpedia.org/ontology/Place"]
//!   }
//! }
//! ```
//!
//! A property missing from the catalog, or listed without classes on one
//! side, is unrestricted on that side.

use std::collections::BTreeSet;
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::Result;

/// Produces the predicate an example triple is evidence for.
pub trait PredicateFactory: Send + Sync {
    fn predicate_for(&self, triple: &Triple) -> Predicate;
}

/// Domain and range classes of one property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyBounds {
    pub domain: BTreeSet<Iri>,
    pub range: BTreeSet<Iri>,
}

fn restriction(classes: &BTreeSet<Iri>) -> Option<TypeRestriction> {
    (!classes.is_empty()).then(|| TypeRestriction::Types(classes.clone()))
}

/// `PredicateFactory` backed by a table of property bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateCatalog {
    bounds: HashMap<Iri, PropertyBounds>,
}

impl PredicateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Register a property; empty class lists leave that side unrestricted.
    pub fn insert<D, R, S>(&mut self, property: impl AsRef<str>, domain: D, range: R)
    where
        D: IntoIterator<Item = S>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bounds = PropertyBounds {
            domain: domain.into_iter().map(iri).collect(),
            range: range.into_iter().map(iri).collect(),
        };
        self.bounds.insert(iri(property), bounds);
    }

    pub fn bounds(&self, property: &str) -> Option<&PropertyBounds> {
        self.bounds.get(property)
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// The predicate for `property`.
    pub fn predicate(&self, property: &str) -> Predicate {
        let mut predicate = Predicate::new(property);
        if let Some(bounds) = self.bounds.get(property) {
            predicate.domain = restriction(&bounds.domain);
            predicate.range = restriction(&bounds.range);
        }
        predicate
    }
}

impl PredicateFactory for PredicateCatalog {
    fn predicate_for(&self, triple: &Triple) -> Predicate {
        self.predicate(&triple.property)
    }
}
