//! Path collection over many example triples.
//!
//! A collector takes example facts one at a time, derives the predicate
//! each one is evidence for, runs a `PathSearcher` on it and merges the
//! paths found into a per-property set.
//!
//! ```text
//! submit(triple) ─► budget check ─► search ─► paths[property] ∪= found
//!                                     │
//!                Parallel: bounded queue → N workers
//! ```
//!
//! `finish()` returns only after every queued search has completed or
//! failed. With fail-fast enabled the first failure cancels whatever is
//! still queued and `finish()` reports that failure.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::catalog::PredicateFactory;
use crate::config::SearchConfig;
use crate::model::*;
use crate::{Error, Result};
use super::PathSearcher;

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    /// Triples searched (or queued for search).
    pub submitted: usize,
    /// Triples not searched: literal object, budget exhausted or cancelled.
    pub skipped: usize,
    /// Searches that failed.
    pub failed: usize,
}

/// Every path found, per property.
#[derive(Debug, Clone, Default)]
pub struct CollectedPaths {
    pub paths: HashMap<Iri, HashSet<RestrictedPath>>,
    pub summary: CollectionSummary,
}

impl CollectedPaths {
    /// Properties that received at least one example.
    pub fn properties(&self) -> Vec<Iri> {
        let mut properties: Vec<Iri> = self.paths.keys().cloned().collect();
        properties.sort();
        properties
    }

    /// Paths of `property` in a stable order; empty for unknown properties.
    pub fn paths_of(&self, property: &str) -> Vec<RestrictedPath> {
        let mut paths: Vec<RestrictedPath> = self
            .paths
            .get(property)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    /// Paths of `property`, ready for scoring.
    pub fn unscored_paths_of(&self, property: &str) -> Vec<ScoredPath> {
        self.paths_of(property).into_iter().map(ScoredPath::unscored).collect()
    }
}

// ============================================================================
// PathCollector Trait
// ============================================================================

pub trait PathCollector {
    /// Offer one example triple. `Ok(false)` means it was skipped.
    ///
    /// Errors only with fail-fast enabled, once a search has failed.
    fn submit(&mut self, triple: &Triple) -> Result<bool>;

    /// Wait for outstanding searches and return everything collected.
    fn finish(self) -> Result<CollectedPaths>
    where
        Self: Sized;

    /// Submit every triple, stopping at the first error.
    fn submit_all<'a, I>(&mut self, triples: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Triple>,
    {
        for triple in triples {
            self.submit(triple)?;
        }
        Ok(())
    }
}

// ============================================================================
// Shared state
// ============================================================================

#[derive(Default)]
struct CollectState {
    paths: Mutex<HashMap<Iri, HashSet<RestrictedPath>>>,
    /// Triples admitted per property.
    admitted: Mutex<HashMap<Iri, usize>>,
    submitted: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    fail_fast: AtomicBool,
    cancelled: AtomicBool,
    first_error: Mutex<Option<Error>>,
}

impl CollectState {
    /// Decide whether `triple` gets searched, and register its property.
    fn admit(&self, triple: &Triple, budget: Option<usize>) -> Option<Iri> {
        if self.cancelled.load(Ordering::Acquire) || !triple.object.is_iri() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let property = triple.property.clone();
        {
            let mut admitted = self.admitted.lock();
            let count = admitted.entry(property.clone()).or_default();
            if budget.is_some_and(|max| *count >= max) {
                drop(admitted);
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            *count += 1;
        }
        self.paths.lock().entry(property.clone()).or_default();
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Some(property)
    }

    fn record(&self, property: &Iri, outcome: Result<HashSet<RestrictedPath>>) {
        match outcome {
            Ok(found) => {
                if !found.is_empty() {
                    self.paths.lock().entry(property.clone()).or_default().extend(found);
                }
            }
            Err(e) => {
                warn!(property = %property, error = %e, "path search failed");
                self.failed.fetch_add(1, Ordering::Relaxed);
                if self.fail_fast.load(Ordering::Acquire) {
                    self.cancelled.store(true, Ordering::Release);
                    self.first_error.lock().get_or_insert(e);
                }
            }
        }
    }

    /// The failure that cancelled collection, if any. Taken once.
    fn take_error(&self) -> Option<Error> {
        self.first_error.lock().take()
    }

    fn summary(&self) -> CollectionSummary {
        CollectionSummary {
            submitted: self.submitted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn drain(&self) -> CollectedPaths {
        let collected = CollectedPaths {
            paths: std::mem::take(&mut *self.paths.lock()),
            summary: self.summary(),
        };
        info!(
            properties = collected.paths.len(),
            submitted = collected.summary.submitted,
            skipped = collected.summary.skipped,
            failed = collected.summary.failed,
            "path collection finished"
        );
        collected
    }
}

fn search_triple<S: PathSearcher + ?Sized>(
    searcher: &S,
    triple: &Triple,
    predicate: &Predicate,
) -> Result<HashSet<RestrictedPath>> {
    let object = triple
        .object
        .as_iri()
        .ok_or_else(|| Error::Unsupported(format!("literal object in {triple}")))?;
    debug!(subject = %triple.subject, property = %triple.property, object = %object, "searching paths");
    searcher.search(&triple.subject, predicate, object)
}

// ============================================================================
// SequentialPathCollector
// ============================================================================

/// Searches each triple on the calling thread.
pub struct SequentialPathCollector<S, F> {
    searcher: S,
    factory: F,
    budget: Option<usize>,
    state: CollectState,
}

impl<S: PathSearcher, F: PredicateFactory> SequentialPathCollector<S, F> {
    pub fn new(searcher: S, factory: F, config: &SearchConfig) -> Self {
        Self {
            searcher,
            factory,
            budget: config.max_triples_per_property,
            state: CollectState::default(),
        }
    }

    /// Stop at the first failed search instead of logging and continuing.
    pub fn fail_fast(self, enabled: bool) -> Self {
        self.state.fail_fast.store(enabled, Ordering::Release);
        self
    }
}

impl<S: PathSearcher, F: PredicateFactory> PathCollector for SequentialPathCollector<S, F> {
    fn submit(&mut self, triple: &Triple) -> Result<bool> {
        if let Some(e) = self.state.take_error() {
            return Err(e);
        }
        let Some(property) = self.state.admit(triple, self.budget) else {
            return Ok(false);
        };
        let predicate = self.factory.predicate_for(triple);
        let outcome = search_triple(&self.searcher, triple, &predicate);
        self.state.record(&property, outcome);
        match self.state.take_error() {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }

    fn finish(self) -> Result<CollectedPaths> {
        if let Some(e) = self.state.take_error() {
            return Err(e);
        }
        Ok(self.state.drain())
    }
}

// ============================================================================
// ParallelPathCollector
// ============================================================================

struct SearchJob {
    triple: Triple,
    property: Iri,
    predicate: Predicate,
}

/// Searches triples on a fixed pool of worker threads.
///
/// Submission blocks while the queue is full. Dropping the collector
/// without `finish()` still waits for the workers.
pub struct ParallelPathCollector<F> {
    factory: F,
    budget: Option<usize>,
    state: Arc<CollectState>,
    sender: Option<Sender<SearchJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl<F: PredicateFactory> ParallelPathCollector<F> {
    pub fn new<S>(searcher: S, factory: F, config: &SearchConfig) -> Result<Self>
    where
        S: PathSearcher + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(config.queue_capacity.max(1));
        let searcher = Arc::new(searcher);
        let state = Arc::new(CollectState::default());

        let worker_count = config.workers();
        let (sender, workers) = start_workers(sender, worker_count, |i| {
            let receiver: Receiver<SearchJob> = receiver.clone();
            let searcher = Arc::clone(&searcher);
            let state = Arc::clone(&state);
            std::thread::Builder::new()
                .name(format!("copaal-search-{i}"))
                .spawn(move || {
                    for job in receiver.iter() {
                        if state.cancelled.load(Ordering::Acquire) {
                            state.skipped.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        let outcome = search_triple(&*searcher, &job.triple, &job.predicate);
                        state.record(&job.property, outcome);
                    }
                })
        })?;
        debug!(workers = worker_count, queue = config.queue_capacity, "path collector started");

        Ok(Self {
            factory,
            budget: config.max_triples_per_property,
            state,
            sender: Some(sender),
            workers,
        })
    }

    /// Cancel queued searches after the first failure.
    pub fn fail_fast(self, enabled: bool) -> Self {
        self.state.fail_fast.store(enabled, Ordering::Release);
        self
    }
}

impl<F> ParallelPathCollector<F> {
    /// Close the queue and wait for every worker. A panicked worker counts
    /// as a failed search.
    fn shutdown(&mut self) {
        drop(self.sender.take());
        let panicked = join_workers(self.workers.drain(..));
        self.state.failed.fetch_add(panicked, Ordering::Relaxed);
    }
}

/// Spawn `count` workers. If one cannot be started, close the queue and
/// join the ones already running before returning the error.
fn start_workers<J>(
    sender: Sender<J>,
    count: usize,
    mut spawn: impl FnMut(usize) -> std::io::Result<JoinHandle<()>>,
) -> Result<(Sender<J>, Vec<JoinHandle<()>>)> {
    let mut workers = Vec::with_capacity(count);
    for i in 0..count {
        match spawn(i) {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                drop(sender);
                join_workers(workers);
                error!(started = i, requested = count, error = %e, "could not start path search workers");
                return Err(e.into());
            }
        }
    }
    Ok((sender, workers))
}

/// Join every worker; returns how many panicked.
fn join_workers(workers: impl IntoIterator<Item = JoinHandle<()>>) -> usize {
    let mut panicked = 0;
    for worker in workers {
        if worker.join().is_err() {
            error!("path search worker panicked");
            panicked += 1;
        }
    }
    panicked
}

impl<F: PredicateFactory> PathCollector for ParallelPathCollector<F> {
    fn submit(&mut self, triple: &Triple) -> Result<bool> {
        if let Some(e) = self.state.take_error() {
            return Err(e);
        }
        let Some(sender) = &self.sender else {
            return Err(Error::Unsupported("submit after finish".into()));
        };
        let Some(property) = self.state.admit(triple, self.budget) else {
            return Ok(false);
        };
        let job = SearchJob {
            predicate: self.factory.predicate_for(triple),
            triple: triple.clone(),
            property,
        };
        sender
            .send(job)
            .map_err(|_| Error::Unsupported("path search workers have stopped".into()))?;
        Ok(true)
    }

    fn finish(mut self) -> Result<CollectedPaths> {
        self.shutdown();
        if let Some(e) = self.state.take_error() {
            return Err(e);
        }
        Ok(self.state.drain())
    }
}

impl<F> Drop for ParallelPathCollector<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
