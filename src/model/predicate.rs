//! Target properties and the type restrictions bounding their endpoints.

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use super::{iri, Iri, RDF_TYPE};

/// A filter over entities that bounds the candidate subjects or objects
/// of a property.
///
/// Equality is by value: two restrictions naming the same IRIs are
/// interchangeable cache keys. Sets are ordered so the query fragments
/// they write are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "iris", rename_all = "snake_case")]
pub enum TypeRestriction {
    /// Entity has `rdf:type` in the given class set.
    Types(BTreeSet<Iri>),
    /// Entity is one of the given IRIs.
    Entities(BTreeSet<Iri>),
}

impl TypeRestriction {
    pub fn types<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TypeRestriction::Types(classes.into_iter().map(iri).collect())
    }

    pub fn entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TypeRestriction::Entities(entities.into_iter().map(iri).collect())
    }

    /// The IRIs the restriction names (classes or entities).
    pub fn iris(&self) -> &BTreeSet<Iri> {
        match self {
            TypeRestriction::Types(set) | TypeRestriction::Entities(set) => set,
        }
    }

    /// Class IRIs, if this is a type-based restriction.
    pub fn classes(&self) -> Option<&BTreeSet<Iri>> {
        match self {
            TypeRestriction::Types(set) => Some(set),
            TypeRestriction::Entities(_) => None,
        }
    }

    /// Membership test for locally evaluated restrictions.
    pub fn admits<'a, I>(&self, entity: &str, entity_types: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            TypeRestriction::Types(classes) => {
                entity_types.into_iter().any(|t| classes.contains(t))
            }
            TypeRestriction::Entities(entities) => entities.contains(entity),
        }
    }

    /// Append the restriction on `?var` as a SPARQL group graph pattern.
    pub fn append_to_query(&self, var: &str, query: &mut String) {
        match self {
            TypeRestriction::Types(classes) if classes.is_empty() => {
                query.push_str("FILTER(false) ");
            }
            TypeRestriction::Types(classes) if classes.len() == 1 => {
                let class = classes.iter().next().map(|c| &**c).unwrap_or_default();
                let _ = write!(query, "?{var} <{RDF_TYPE}> <{class}> . ");
            }
            TypeRestriction::Types(classes) => {
                let _ = write!(query, "?{var} <{RDF_TYPE}> ?{var}_type . VALUES ?{var}_type {{");
                for class in classes {
                    let _ = write!(query, " <{class}>");
                }
                query.push_str(" } ");
            }
            TypeRestriction::Entities(entities) if entities.is_empty() => {
                query.push_str("FILTER(false) ");
            }
            TypeRestriction::Entities(entities) => {
                let _ = write!(query, "VALUES ?{var} {{");
                for entity in entities {
                    let _ = write!(query, " <{entity}>");
                }
                query.push_str(" } ");
            }
        }
    }
}

impl fmt::Display for TypeRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, set) = match self {
            TypeRestriction::Types(set) => ("type", set),
            TypeRestriction::Entities(set) => ("entity", set),
        };
        write!(f, "{label} in {{")?;
        for (i, item) in set.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "<{item}>")?;
        }
        f.write_str("}")
    }
}

/// A target property with optional domain and range restrictions.
///
/// Identity (for caching) is the property IRI plus restriction equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    pub property: Iri,
    #[serde(default)]
    pub domain: Option<TypeRestriction>,
    #[serde(default)]
    pub range: Option<TypeRestriction>,
}

impl Predicate {
    /// Unrestricted predicate.
    pub fn new(property: impl AsRef<str>) -> Self {
        Self { property: iri(property), domain: None, range: None }
    }

    pub fn with_domain(mut self, domain: TypeRestriction) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_range(mut self, range: TypeRestriction) -> Self {
        self.range = Some(range);
        self
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.property)?;
        if let Some(domain) = &self.domain {
            write!(f, " domain {domain}")?;
        }
        if let Some(range) = &self.range {
            write!(f, " range {range}")?;
        }
        Ok(())
    }
}
