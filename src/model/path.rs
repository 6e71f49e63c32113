//! Restricted paths: short sequences of directed edge-label traversals.
//!
//! A `RestrictedPath` is a value: two paths with the same elements are the
//! same path. Scores are attached with [`ScoredPath`], never stored inside
//! the path, so a path can key sets and caches regardless of what was
//! computed for it.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};
use smallvec::SmallVec;

use super::{iri, Iri};
use crate::{Error, Result};

/// Longest path the counting engine supports.
pub const MAX_PATH_LENGTH: usize = 3;

/// Traversal direction of a single path element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Follow the edge from subject to object.
    Forward,
    /// Follow the edge from object to subject.
    Inverse,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Forward => Direction::Inverse,
            Direction::Inverse => Direction::Forward,
        }
    }
}

/// One hop: an edge label plus the direction it is traversed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    pub property: Iri,
    pub direction: Direction,
}

impl PathElement {
    pub fn new(property: impl AsRef<str>, direction: Direction) -> Self {
        Self { property: iri(property), direction }
    }

    pub fn forward(property: impl AsRef<str>) -> Self {
        Self::new(property, Direction::Forward)
    }

    pub fn inverse(property: impl AsRef<str>) -> Self {
        Self::new(property, Direction::Inverse)
    }

    /// The same edge traversed the other way.
    pub fn flipped(&self) -> Self {
        Self { property: self.property.clone(), direction: self.direction.flip() }
    }
}

impl<S: AsRef<str>> From<(S, Direction)> for PathElement {
    fn from((property, direction): (S, Direction)) -> Self {
        Self::new(property, direction)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Forward => write!(f, "<{}>", self.property),
            Direction::Inverse => write!(f, "^<{}>", self.property),
        }
    }
}

/// An ordered sequence of 1 to [`MAX_PATH_LENGTH`] path elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<PathElement>", into = "Vec<PathElement>")]
pub struct RestrictedPath {
    elements: SmallVec<[PathElement; MAX_PATH_LENGTH]>,
}

impl RestrictedPath {
    /// Build a path, rejecting lengths outside `1..=MAX_PATH_LENGTH`.
    pub fn new<I>(elements: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<PathElement>,
    {
        let elements: SmallVec<[PathElement; MAX_PATH_LENGTH]> =
            elements.into_iter().map(Into::into).collect();
        if elements.is_empty() || elements.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidPathLength(elements.len()));
        }
        Ok(Self { elements })
    }

    /// A length-1 path. Cannot fail.
    pub fn single(property: impl AsRef<str>, direction: Direction) -> Self {
        let mut elements = SmallVec::new();
        elements.push(PathElement::new(property, direction));
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn first(&self) -> &PathElement {
        &self.elements[0]
    }

    pub fn last(&self) -> &PathElement {
        &self.elements[self.elements.len() - 1]
    }

    /// Edge labels along the path, in order.
    pub fn properties(&self) -> impl Iterator<Item = &Iri> {
        self.elements.iter().map(|e| &e.property)
    }

    /// The same path walked from its object end back to its subject end.
    ///
    /// `(x, y)` satisfies `self` iff `(y, x)` satisfies `self.reversed()`.
    pub fn reversed(&self) -> Self {
        Self {
            elements: self.elements.iter().rev().map(PathElement::flipped).collect(),
        }
    }
}

impl TryFrom<Vec<PathElement>> for RestrictedPath {
    type Error = Error;

    fn try_from(elements: Vec<PathElement>) -> Result<Self> {
        Self::new(elements)
    }
}

impl From<RestrictedPath> for Vec<PathElement> {
    fn from(path: RestrictedPath) -> Self {
        path.elements.into_vec()
    }
}

impl fmt::Display for RestrictedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

// ============================================================================
// ScoredPath
// ============================================================================

/// A path together with its evidence score.
///
/// `NaN` means "undefined" (zero denominator or failed counting), `0.0`
/// means "no measurable correlation". Both mark a path for rescoring.
/// Equality and hashing only look at the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPath {
    pub path: RestrictedPath,
    #[serde(default = "undefined_score", deserialize_with = "nan_from_null")]
    pub score: f64,
}

impl ScoredPath {
    pub fn new(path: RestrictedPath, score: f64) -> Self {
        Self { path, score }
    }

    /// A path that has not been scored yet.
    pub fn unscored(path: RestrictedPath) -> Self {
        Self { path, score: f64::NAN }
    }

    /// NaN and 0.0 both call for another scoring attempt.
    pub fn needs_rescoring(&self) -> bool {
        self.score.is_nan() || self.score == 0.0
    }
}

impl PartialEq for ScoredPath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ScoredPath {}

impl Hash for ScoredPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl From<RestrictedPath> for ScoredPath {
    fn from(path: RestrictedPath) -> Self {
        Self::unscored(path)
    }
}

fn undefined_score() -> f64 {
    f64::NAN
}

// serde_json writes NaN as `null`; read it back the same way.
fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn two_hop() -> RestrictedPath {
        RestrictedPath::new([
            ("ex:livesIn", Direction::Forward),
            ("ex:locatedIn", Direction::Forward),
        ])
        .unwrap()
    }

    #[test]
    fn test_length_bounds() {
        let empty: Vec<PathElement> = Vec::new();
        assert!(matches!(RestrictedPath::new(empty), Err(Error::InvalidPathLength(0))));

        let four = (0..4).map(|i| PathElement::forward(format!("ex:p{i}")));
        assert!(matches!(RestrictedPath::new(four), Err(Error::InvalidPathLength(4))));

        let three = (0..3).map(|i| PathElement::forward(format!("ex:p{i}")));
        assert_eq!(RestrictedPath::new(three).unwrap().len(), 3);
    }

    #[test]
    fn test_direction_distinguishes_paths() {
        let a = RestrictedPath::single("ex:p", Direction::Forward);
        let b = RestrictedPath::single("ex:p", Direction::Inverse);
        assert_ne!(a, b);
    }

    #[test]
    fn test_scored_paths_dedup_by_path() {
        let mut set = HashSet::new();
        set.insert(ScoredPath::new(two_hop(), 0.4));
        set.insert(ScoredPath::new(two_hop(), -0.2));
        set.insert(ScoredPath::unscored(two_hop()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_reversed_twice_is_identity() {
        let path = RestrictedPath::new([
            PathElement::forward("ex:a"),
            PathElement::inverse("ex:b"),
            PathElement::forward("ex:c"),
        ])
        .unwrap();
        let rev = path.reversed();
        assert_eq!(rev.first(), &PathElement::inverse("ex:c"));
        assert_eq!(rev.last(), &PathElement::inverse("ex:a"));
        assert_eq!(rev.reversed(), path);
    }

    #[test]
    fn test_display() {
        let path = RestrictedPath::new([PathElement::forward("ex:a"), PathElement::inverse("ex:b")]).unwrap();
        assert_eq!(path.to_string(), "<ex:a>/^<ex:b>");
    }

    #[test]
    fn test_nan_score_serializes_as_null() {
        let json = serde_json::to_string(&ScoredPath::unscored(two_hop())).unwrap();
        assert!(json.contains("\"score\":null"));
        let back: ScoredPath = serde_json::from_str(&json).unwrap();
        assert!(back.score.is_nan());
        assert_eq!(back.path, two_hop());
    }

    #[test]
    fn test_deserialize_rejects_overlong_path() {
        let json = r#"{"path":[
            {"property":"a","direction":"forward"},
            {"property":"b","direction":"forward"},
            {"property":"c","direction":"inverse"},
            {"property":"d","direction":"forward"}],"score":0.5}"#;
        assert!(serde_json::from_str::<ScoredPath>(json).is_err());
    }
}
