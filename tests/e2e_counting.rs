//! End-to-end tests for restricted path counting.
//!
//! Synthetic graphs with known overlaps, counted by the in-memory joins,
//! through the caching decorator and through the config-selected backend.

use copaal_rs::count::{InMemoryCountRetriever, RemoteCountRetriever, UnavailableCountRetriever};
use copaal_rs::{
    CachingCountRetriever, CountBackend, CountRetriever, CountStrategy, Direction, Error,
    MemoryGraph, PathElement, Predicate, QueryEndpoint, QuerySolution, RestrictedPath,
    TypeRestriction, iri,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;

// ============================================================================
// Helpers
// ============================================================================

fn path(elements: &[(&str, Direction)]) -> RestrictedPath {
    RestrictedPath::new(elements.iter().map(|(p, d)| PathElement::new(p, *d))).unwrap()
}

/// A and B both live somewhere located in D; only A has nationality D.
fn nationality_graph() -> MemoryGraph {
    let graph = MemoryGraph::new();
    graph.insert_iri("ex:A", "ex:livesIn", "ex:C");
    graph.insert_iri("ex:C", "ex:locatedIn", "ex:D");
    graph.insert_iri("ex:B", "ex:livesIn", "ex:D");
    graph.insert_iri("ex:B", "ex:livesIn", "ex:E");
    graph.insert_iri("ex:E", "ex:locatedIn", "ex:D");
    graph.insert_iri("ex:A", "ex:nationality", "ex:D");
    graph
}

fn nationality() -> Predicate {
    Predicate::new("ex:nationality")
        .with_domain(TypeRestriction::entities(["ex:A", "ex:B"]))
        .with_range(TypeRestriction::entities(["ex:D"]))
}

fn lives_located() -> RestrictedPath {
    path(&[("ex:livesIn", Direction::Forward), ("ex:locatedIn", Direction::Forward)])
}

struct Offline;

impl QueryEndpoint for Offline {
    fn select(&self, query: &str) -> copaal_rs::Result<Vec<QuerySolution>> {
        Err(Error::query_failure(query, "offline"))
    }
}

// ============================================================================
// 1. The nationality scenario
// ============================================================================

#[test]
fn test_nationality_counts() {
    let retriever = InMemoryCountRetriever::new(nationality_graph());
    let predicate = nationality();
    let path = lives_located();

    let occurrences = retriever
        .count_path_instances(&path, predicate.domain.as_ref(), predicate.range.as_ref())
        .unwrap();
    assert_eq!(occurrences, 2);
    assert_eq!(retriever.count_cooccurrences(&predicate, &path).unwrap(), 1);
    assert_eq!(retriever.count_predicate_instances(&predicate).unwrap(), 1);
    assert_eq!(retriever.derive_max_count(&predicate).unwrap(), 2);

    let all = retriever.count_all(&predicate, &path).unwrap();
    assert_eq!((all.occurrences, all.cooccurrences, all.max_count), (2, 1, 2));
}

#[test]
fn test_direct_edge_alone_does_not_reach() {
    // B livesIn D directly; livesIn/locatedIn needs a second hop out of D.
    let graph = MemoryGraph::new();
    graph.insert_iri("ex:A", "ex:livesIn", "ex:C");
    graph.insert_iri("ex:C", "ex:locatedIn", "ex:D");
    graph.insert_iri("ex:B", "ex:livesIn", "ex:D");
    let retriever = InMemoryCountRetriever::new(graph);
    let predicate = nationality();

    let pairs = retriever
        .path_pairs(&lives_located(), predicate.domain.as_ref(), predicate.range.as_ref())
        .unwrap();
    assert_eq!(pairs.len(), 1);
    assert!(pairs.contains(&(iri("ex:A"), iri("ex:D"))));
}

// ============================================================================
// 2. Single-hop counts against restricted candidate sets
// ============================================================================

#[test]
fn test_single_hop_overlaps() {
    let graph = MemoryGraph::new();
    for (s, o) in [("ex:a", "ex:x"), ("ex:a", "ex:y"), ("ex:b", "ex:x"), ("ex:c", "ex:z")] {
        graph.insert_iri(s, "ex:p", o);
    }
    graph.insert_iri("ex:a", copaal_rs::RDF_TYPE, "ex:T");
    graph.insert_iri("ex:c", copaal_rs::RDF_TYPE, "ex:T");
    let retriever = InMemoryCountRetriever::new(graph);
    let p = path(&[("ex:p", Direction::Forward)]);
    let typed = TypeRestriction::types(["ex:T"]);
    let xz = TypeRestriction::entities(["ex:x", "ex:z"]);

    assert_eq!(retriever.count_path_instances(&p, None, None).unwrap(), 4);
    assert_eq!(retriever.count_path_instances(&p, Some(&typed), None).unwrap(), 3);
    assert_eq!(retriever.count_path_instances(&p, Some(&typed), Some(&xz)).unwrap(), 2);

    let inverse = path(&[("ex:p", Direction::Inverse)]);
    assert_eq!(retriever.count_path_instances(&inverse, Some(&xz), Some(&typed)).unwrap(), 2);
}

// ============================================================================
// 3. Caching decorator
// ============================================================================

#[test]
fn test_cache_is_transparent() {
    let plain = InMemoryCountRetriever::new(nationality_graph());
    let cached = CachingCountRetriever::new(InMemoryCountRetriever::new(nationality_graph()));
    let predicate = nationality();
    let paths = [
        lives_located(),
        path(&[("ex:livesIn", Direction::Forward)]),
        path(&[("ex:locatedIn", Direction::Inverse), ("ex:livesIn", Direction::Inverse)]),
    ];

    for _ in 0..3 {
        for p in &paths {
            assert_eq!(
                cached.count_all(&predicate, p).unwrap(),
                plain.count_all(&predicate, p).unwrap()
            );
        }
    }
}

#[test]
fn test_unavailable_store_is_an_error_not_zero() {
    let cached = CachingCountRetriever::new(UnavailableCountRetriever::new("connection refused"));
    let err = cached.count_cooccurrences(&nationality(), &lives_located()).unwrap_err();
    assert!(err.is_query_failure());
}

// ============================================================================
// 4. Config-selected backend
// ============================================================================

#[test]
fn test_backend_from_strategy() {
    let backend: CountBackend<MemoryGraph, Offline> =
        CountBackend::from_strategy(&CountStrategy::InMemory, Some(nationality_graph()), None).unwrap();
    assert_eq!(backend.derive_max_count(&nationality()).unwrap(), 2);

    let remote: CountBackend<MemoryGraph, Offline> = CountBackend::from_strategy(
        &CountStrategy::Remote { clause_style: Default::default() },
        None,
        Some(Offline),
    )
    .unwrap();
    assert!(remote.count_predicate_instances(&nationality()).unwrap_err().is_query_failure());

    let missing = CountBackend::<MemoryGraph, Offline>::from_strategy(&CountStrategy::InMemory, None, None);
    assert!(matches!(missing, Err(Error::Config(_))));
}

// ============================================================================
// 5. Properties: joins agree with naive traversal, from either end
// ============================================================================

const ENTITIES: u8 = 6;
const LABELS: u8 = 3;

fn entity(i: u8) -> String {
    format!("ex:e{i}")
}

fn label(i: u8) -> String {
    format!("ex:p{i}")
}

/// Walk the path from `start` edge by edge.
fn naive_reach(edges: &[(u8, u8, u8)], start: u8, steps: &[(u8, bool)]) -> Vec<u8> {
    let mut frontier = vec![start];
    for &(p, inverse) in steps {
        let mut next: Vec<u8> = edges
            .iter()
            .filter(|(_, l, _)| *l == p)
            .filter_map(|&(s, _, o)| {
                let (from, to) = if inverse { (o, s) } else { (s, o) };
                frontier.contains(&from).then_some(to)
            })
            .collect();
        next.sort();
        next.dedup();
        frontier = next;
    }
    frontier
}

fn build(edges: &[(u8, u8, u8)]) -> MemoryGraph {
    let graph = MemoryGraph::new();
    for &(s, p, o) in edges {
        graph.insert_iri(&entity(s), &label(p), &entity(o));
    }
    graph
}

fn to_path(steps: &[(u8, bool)]) -> RestrictedPath {
    RestrictedPath::new(steps.iter().map(|&(p, inverse)| {
        PathElement::new(label(p), if inverse { Direction::Inverse } else { Direction::Forward })
    }))
    .unwrap()
}

fn restriction(members: &[u8]) -> TypeRestriction {
    TypeRestriction::entities(members.iter().map(|&i| entity(i)))
}

proptest! {
    #[test]
    fn join_matches_naive_traversal(
        edges in prop::collection::vec((0..ENTITIES, 0..LABELS, 0..ENTITIES), 0..24),
        steps in prop::collection::vec((0..LABELS, any::<bool>()), 1..=3),
        domain in prop::collection::vec(0..ENTITIES, 1..5),
        range in prop::collection::vec(0..ENTITIES, 1..5),
    ) {
        let retriever = InMemoryCountRetriever::new(build(&edges));
        let path = to_path(&steps);

        let mut expected = 0u64;
        let mut starts = domain.clone();
        starts.sort();
        starts.dedup();
        for s in starts {
            expected += naive_reach(&edges, s, &steps)
                .into_iter()
                .filter(|o| range.contains(o))
                .count() as u64;
        }

        let counted = retriever
            .count_path_instances(&path, Some(&restriction(&domain)), Some(&restriction(&range)))
            .unwrap();
        prop_assert_eq!(counted, expected);
    }

    #[test]
    fn reversed_path_counts_the_same(
        edges in prop::collection::vec((0..ENTITIES, 0..LABELS, 0..ENTITIES), 0..24),
        steps in prop::collection::vec((0..LABELS, any::<bool>()), 1..=3),
        domain in prop::collection::vec(0..ENTITIES, 1..5),
        range in prop::collection::vec(0..ENTITIES, 1..5),
    ) {
        let retriever = InMemoryCountRetriever::new(build(&edges));
        let path = to_path(&steps);
        let (domain, range) = (restriction(&domain), restriction(&range));

        let forward = retriever.count_path_instances(&path, Some(&domain), Some(&range)).unwrap();
        let backward = retriever
            .count_path_instances(&path.reversed(), Some(&range), Some(&domain))
            .unwrap();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn max_count_is_product_of_candidates(
        domain in prop::collection::vec(0..ENTITIES, 0..5),
        range in prop::collection::vec(0..ENTITIES, 0..5),
    ) {
        let retriever = InMemoryCountRetriever::new(MemoryGraph::new());
        let predicate = Predicate::new("ex:p")
            .with_domain(restriction(&domain))
            .with_range(restriction(&range));

        let mut distinct_domain = domain.clone();
        distinct_domain.sort();
        distinct_domain.dedup();
        let mut distinct_range = range.clone();
        distinct_range.sort();
        distinct_range.dedup();

        prop_assert_eq!(
            retriever.derive_max_count(&predicate).unwrap(),
            (distinct_domain.len() * distinct_range.len()) as u64
        );
    }
}

// ============================================================================
// 6. Remote and in-memory counting agree on the same triples
// ============================================================================

/// A SPARQL store over a triple list, just large enough for the queries
/// the remote retriever writes: triple patterns, `VALUES`, `UNION`,
/// `FILTER`, the two `COUNT` shapes and `ASK`.
struct Evaluating {
    triples: Vec<(String, String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Dot,
    Iri(String),
    Var(String),
    Word(String),
    Filter(String),
}

#[derive(Debug, Clone)]
enum Node {
    Iri(String),
    Var(String),
}

#[derive(Debug, Clone)]
enum Element {
    Pattern([Node; 3]),
    Values(String, Vec<String>),
    Union(Vec<Element>, Vec<Element>),
    Filter(String),
}

type Row = HashMap<String, String>;

fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let word_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '{' => {
                tokens.push(Token::Open);
                i += 1;
            }
            '}' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '<' => {
                let end = i + chars[i..].iter().position(|c| *c == '>').unwrap();
                tokens.push(Token::Iri(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            '?' => {
                let len = chars[i + 1..].iter().take_while(|c| word_char(**c)).count();
                tokens.push(Token::Var(chars[i + 1..i + 1 + len].iter().collect()));
                i += 1 + len;
            }
            c if word_char(c) => {
                let len = chars[i..].iter().take_while(|c| word_char(**c)).count();
                let word: String = chars[i..i + len].iter().collect();
                i += len;
                if word == "FILTER" {
                    assert_eq!(chars[i], '(');
                    let mut depth = 0;
                    let start = i + 1;
                    loop {
                        match chars[i] {
                            '(' => depth += 1,
                            ')' => depth -= 1,
                            _ => {}
                        }
                        i += 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    tokens.push(Token::Filter(chars[start..i - 1].iter().collect()));
                } else {
                    tokens.push(Token::Word(word));
                }
            }
            other => panic!("unexpected {other:?} in {text}"),
        }
    }
    tokens
}

fn node(token: &Token) -> Node {
    match token {
        Token::Iri(value) => Node::Iri(value.clone()),
        Token::Var(name) => Node::Var(name.clone()),
        other => panic!("expected a term, got {other:?}"),
    }
}

/// Parse elements up to the closing brace of the current group.
fn parse_group(tokens: &[Token], pos: &mut usize) -> Vec<Element> {
    let mut group = Vec::new();
    while *pos < tokens.len() && tokens[*pos] != Token::Close {
        match &tokens[*pos] {
            Token::Open => {
                *pos += 1;
                let left = parse_group(tokens, pos);
                *pos += 1;
                assert_eq!(tokens[*pos], Token::Word("UNION".into()));
                assert_eq!(tokens[*pos + 1], Token::Open);
                *pos += 2;
                let right = parse_group(tokens, pos);
                *pos += 1;
                group.push(Element::Union(left, right));
            }
            Token::Word(word) if word == "VALUES" => {
                let Token::Var(var) = &tokens[*pos + 1] else { panic!("VALUES needs a variable") };
                *pos += 3;
                let mut values = Vec::new();
                while let Token::Iri(value) = &tokens[*pos] {
                    values.push(value.clone());
                    *pos += 1;
                }
                *pos += 1;
                group.push(Element::Values(var.clone(), values));
            }
            Token::Filter(expr) => {
                group.push(Element::Filter(expr.clone()));
                *pos += 1;
            }
            Token::Dot => *pos += 1,
            _ => {
                let pattern = [node(&tokens[*pos]), node(&tokens[*pos + 1]), node(&tokens[*pos + 2])];
                group.push(Element::Pattern(pattern));
                *pos += 3;
            }
        }
    }
    group
}

fn bind(row: &Row, node: &Node, value: &str) -> Option<Row> {
    match node {
        Node::Iri(iri) => (iri == value).then(|| row.clone()),
        Node::Var(var) => match row.get(var) {
            Some(bound) => (bound == value).then(|| row.clone()),
            None => {
                let mut row = row.clone();
                row.insert(var.clone(), value.to_string());
                Some(row)
            }
        },
    }
}

fn passes(expr: &str, row: &Row) -> bool {
    expr.split("&&").map(str::trim).all(|clause| {
        if clause == "false" {
            false
        } else if clause.starts_with("isIRI(") {
            true
        } else if let Some((left, right)) = clause.split_once("!=") {
            let var = left.trim().trim_start_matches('?');
            let value = right.trim().trim_start_matches('<').trim_end_matches('>');
            row.get(var).is_some_and(|bound| bound != value)
        } else {
            panic!("unsupported filter {clause}")
        }
    })
}

impl Evaluating {
    fn new(triples: &[(String, String, String)]) -> Self {
        Self { triples: triples.to_vec() }
    }

    fn eval(&self, group: &[Element], seed: Row) -> Vec<Row> {
        let mut rows = vec![seed];
        let mut filters = Vec::new();
        for element in group {
            rows = match element {
                Element::Pattern([s, p, o]) => rows
                    .iter()
                    .flat_map(|row| {
                        self.triples.iter().filter_map(move |(ts, tp, to)| {
                            bind(row, s, ts).and_then(|r| bind(&r, p, tp)).and_then(|r| bind(&r, o, to))
                        })
                    })
                    .collect(),
                Element::Values(var, values) => rows
                    .iter()
                    .flat_map(|row| {
                        values.iter().filter_map(move |v| bind(row, &Node::Var(var.clone()), v))
                    })
                    .collect(),
                Element::Union(left, right) => rows
                    .into_iter()
                    .flat_map(|row| {
                        let mut out = self.eval(left, row.clone());
                        out.extend(self.eval(right, row));
                        out
                    })
                    .collect(),
                Element::Filter(expr) => {
                    filters.push(expr);
                    rows
                }
            };
        }
        rows.retain(|row| filters.iter().all(|f| passes(f, row)));
        rows
    }

    fn distinct(&self, body: &str, projection: &[&str]) -> usize {
        let tokens = tokenize(body);
        let group = parse_group(&tokens, &mut 0);
        let mut seen: Vec<Vec<String>> = self
            .eval(&group, Row::new())
            .into_iter()
            .filter_map(|row| projection.iter().map(|v| row.get(*v).cloned()).collect())
            .collect();
        seen.sort();
        seen.dedup();
        seen.len()
    }
}

impl QueryEndpoint for Evaluating {
    fn select(&self, query: &str) -> copaal_rs::Result<Vec<QuerySolution>> {
        let count = if let Some(rest) =
            query.strip_prefix("SELECT (COUNT(*) AS ?c) WHERE { SELECT DISTINCT ?s ?o WHERE {")
        {
            self.distinct(rest.strip_suffix("} }").unwrap(), &["s", "o"])
        } else if let Some(rest) = query.strip_prefix("SELECT (COUNT(DISTINCT ?") {
            let (var, rest) = rest.split_once(')').unwrap();
            let body = rest.split_once("WHERE {").unwrap().1.strip_suffix('}').unwrap();
            self.distinct(body, &[var])
        } else {
            return Err(Error::query_failure(query, "unsupported query shape"));
        };
        let mut row = QuerySolution::new();
        row.insert("c".to_string(), count.to_string());
        Ok(vec![row])
    }

    fn ask(&self, query: &str) -> copaal_rs::Result<bool> {
        let body = query.strip_prefix("ASK {").and_then(|q| q.strip_suffix('}')).unwrap();
        Ok(self.distinct(body, &[]) > 0)
    }
}

fn both_backends(
    triples: &[(String, String, String)],
) -> (InMemoryCountRetriever<MemoryGraph>, RemoteCountRetriever<Evaluating>) {
    let graph = MemoryGraph::new();
    for (s, p, o) in triples {
        graph.insert_iri(s, p, o);
    }
    (InMemoryCountRetriever::new(graph), RemoteCountRetriever::new(Evaluating::new(triples)))
}

fn owned(triples: &[(&str, &str, &str)]) -> Vec<(String, String, String)> {
    triples.iter().map(|(s, p, o)| (s.to_string(), p.to_string(), o.to_string())).collect()
}

fn assert_agree(
    memory: &impl CountRetriever,
    remote: &impl CountRetriever,
    predicate: &Predicate,
    paths: &[RestrictedPath],
) {
    assert_eq!(
        remote.count_predicate_instances(predicate).unwrap(),
        memory.count_predicate_instances(predicate).unwrap(),
        "predicate instances of {predicate}"
    );
    assert_eq!(
        remote.derive_max_count(predicate).unwrap(),
        memory.derive_max_count(predicate).unwrap(),
        "max count of {predicate}"
    );
    for path in paths {
        assert_eq!(
            remote.count_all(predicate, path).unwrap(),
            memory.count_all(predicate, path).unwrap(),
            "{predicate} over {path}"
        );
    }
}

#[test]
fn test_class_objects_are_not_candidates_in_either_backend() {
    let (memory, remote) = both_backends(&owned(&[
        ("ex:A", copaal_rs::RDF_TYPE, "ex:Person"),
        ("ex:A", "ex:p", "ex:B"),
    ]));
    let predicate = Predicate::new("ex:p");

    assert_eq!(memory.derive_max_count(&predicate).unwrap(), 4);
    assert_eq!(remote.derive_max_count(&predicate).unwrap(), 4);
}

#[test]
fn test_backends_agree_on_the_nationality_graph() {
    let triples = owned(&[
        ("ex:A", "ex:livesIn", "ex:C"),
        ("ex:C", "ex:locatedIn", "ex:D"),
        ("ex:B", "ex:livesIn", "ex:D"),
        ("ex:B", "ex:livesIn", "ex:E"),
        ("ex:E", "ex:locatedIn", "ex:D"),
        ("ex:A", "ex:nationality", "ex:D"),
        ("ex:D", "ex:capital", "ex:C"),
        ("ex:A", copaal_rs::RDF_TYPE, "ex:Person"),
        ("ex:B", copaal_rs::RDF_TYPE, "ex:Person"),
        ("ex:B", copaal_rs::RDF_TYPE, "ex:Agent"),
        ("ex:D", copaal_rs::RDF_TYPE, "ex:Country"),
    ]);
    let (memory, remote) = both_backends(&triples);

    let predicates = [
        Predicate::new("ex:nationality"),
        nationality(),
        Predicate::new("ex:nationality")
            .with_domain(TypeRestriction::types(["ex:Person"]))
            .with_range(TypeRestriction::types(["ex:Country"])),
        Predicate::new("ex:nationality").with_domain(TypeRestriction::types(["ex:Agent", "ex:Person"])),
        Predicate::new("ex:citizenOf"),
    ];
    let paths = [
        lives_located(),
        path(&[("ex:livesIn", Direction::Forward)]),
        path(&[("ex:capital", Direction::Inverse)]),
        path(&[("ex:livesIn", Direction::Forward), ("ex:capital", Direction::Inverse)]),
        path(&[
            ("ex:livesIn", Direction::Forward),
            ("ex:livesIn", Direction::Inverse),
            ("ex:nationality", Direction::Forward),
        ]),
    ];
    for predicate in &predicates {
        assert_agree(&memory, &remote, predicate, &paths);
    }

    let cached = CachingCountRetriever::new(remote);
    assert_agree(&memory, &cached, &predicates[0], &paths);
}

const CLASSES: u8 = 2;

fn class(i: u8) -> String {
    format!("ex:C{i}")
}

fn restriction_strategy() -> impl Strategy<Value = Option<TypeRestriction>> {
    prop_oneof![
        Just(None),
        prop::collection::vec(0..CLASSES, 1..=2)
            .prop_map(|cs| Some(TypeRestriction::types(cs.into_iter().map(class)))),
        prop::collection::vec(0..ENTITIES, 1..4).prop_map(|es| Some(restriction(&es))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn remote_counts_match_memory_counts(
        edges in prop::collection::vec((0..ENTITIES, 0..LABELS, 0..ENTITIES), 0..16),
        types in prop::collection::vec((0..ENTITIES, 0..CLASSES), 0..6),
        steps in prop::collection::vec((0..LABELS, any::<bool>()), 1..=3),
        property in 0..LABELS,
        domain in restriction_strategy(),
        range in restriction_strategy(),
    ) {
        let mut triples: Vec<(String, String, String)> = edges
            .iter()
            .map(|&(s, p, o)| (entity(s), label(p), entity(o)))
            .collect();
        triples.extend(types.iter().map(|&(e, c)| (entity(e), copaal_rs::RDF_TYPE.to_string(), class(c))));
        let (memory, remote) = both_backends(&triples);

        let mut predicate = Predicate::new(label(property));
        predicate.domain = domain;
        predicate.range = range;
        let path = to_path(&steps);

        prop_assert_eq!(
            remote.derive_max_count(&predicate).unwrap(),
            memory.derive_max_count(&predicate).unwrap()
        );
        prop_assert_eq!(
            remote.count_predicate_instances(&predicate).unwrap(),
            memory.count_predicate_instances(&predicate).unwrap()
        );
        prop_assert_eq!(
            remote.count_all(&predicate, &path).unwrap(),
            memory.count_all(&predicate, &path).unwrap()
        );
    }
}
