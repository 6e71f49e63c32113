//! Caching decorator for any `CountRetriever`.
//!
//! Four independent bounded LRU caches, one per count kind. Scoring works
//! through one property at a time, so the default bounds are small.
//!
//! Backed by `moka::sync::Cache`. `try_get_with` coalesces concurrent
//! misses on one key into a single computation. Failed computations are
//! not cached.

use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tracing::debug;

use crate::config::CountCacheConfig;
use crate::model::*;
use crate::{Error, Result};
use super::CountRetriever;

type PathKey = (RestrictedPath, Option<TypeRestriction>, Option<TypeRestriction>);

/// `CountRetriever` that memoizes another one.
pub struct CachingCountRetriever<R> {
    inner: R,
    path_instances: Option<Cache<PathKey, u64>>,
    cooccurrences: Option<Cache<(Predicate, RestrictedPath), u64>>,
    predicate_instances: Option<Cache<Predicate, u64>>,
    max_counts: Option<Cache<Predicate, u64>>,
}

impl<R: CountRetriever> CachingCountRetriever<R> {
    /// Wrap `inner` with the default capacities.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, &CountCacheConfig::default())
    }

    pub fn with_config(inner: R, config: &CountCacheConfig) -> Self {
        Self {
            inner,
            path_instances: build_cache(config.path_instances),
            cooccurrences: build_cache(config.cooccurrences),
            predicate_instances: build_cache(config.predicate_instances),
            max_counts: build_cache(config.max_counts),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Drop every cached count, e.g. after the graph changed.
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.path_instances {
            cache.invalidate_all();
        }
        if let Some(cache) = &self.cooccurrences {
            cache.invalidate_all();
        }
        if let Some(cache) = &self.predicate_instances {
            cache.invalidate_all();
        }
        if let Some(cache) = &self.max_counts {
            cache.invalidate_all();
        }
    }
}

fn build_cache<K, V>(capacity: u64) -> Option<Cache<K, V>>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    (capacity > 0).then(|| {
        Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build()
    })
}

/// Look `key` up, computing and storing it on a miss.
fn cached<K>(
    cache: Option<&Cache<K, u64>>,
    key: K,
    compute: impl FnOnce() -> Result<u64>,
) -> Result<u64>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
{
    match cache {
        Some(cache) => cache.try_get_with(key, compute).map_err(unshare),
        None => compute(),
    }
}

/// moka hands back errors shared between every waiter on the key.
fn unshare(error: Arc<Error>) -> Error {
    match Arc::try_unwrap(error) {
        Ok(error) => error,
        Err(shared) => match &*shared {
            Error::InvalidPathLength(len) => Error::InvalidPathLength(*len),
            Error::QueryFailure { query, message } => Error::query_failure(query.clone(), message.clone()),
            Error::Unsupported(what) => Error::Unsupported(what.clone()),
            Error::Config(what) => Error::Config(what.clone()),
            other => Error::query_failure(String::new(), other.to_string()),
        },
    }
}

impl<R: CountRetriever> CountRetriever for CachingCountRetriever<R> {
    fn count_path_instances(
        &self,
        path: &RestrictedPath,
        domain: Option<&TypeRestriction>,
        range: Option<&TypeRestriction>,
    ) -> Result<u64> {
        let key = (path.clone(), domain.cloned(), range.cloned());
        cached(self.path_instances.as_ref(), key, || {
            debug!(path = %path, "path instance cache miss");
            self.inner.count_path_instances(path, domain, range)
        })
    }

    fn count_cooccurrences(&self, predicate: &Predicate, path: &RestrictedPath) -> Result<u64> {
        let key = (predicate.clone(), path.clone());
        cached(self.cooccurrences.as_ref(), key, || {
            debug!(property = %predicate.property, path = %path, "co-occurrence cache miss");
            self.inner.count_cooccurrences(predicate, path)
        })
    }

    fn count_predicate_instances(&self, predicate: &Predicate) -> Result<u64> {
        cached(self.predicate_instances.as_ref(), predicate.clone(), || {
            debug!(property = %predicate.property, "predicate instance cache miss");
            self.inner.count_predicate_instances(predicate)
        })
    }

    fn derive_max_count(&self, predicate: &Predicate) -> Result<u64> {
        cached(self.max_counts.as_ref(), predicate.clone(), || {
            debug!(property = %predicate.property, "max count cache miss");
            self.inner.derive_max_count(predicate)
        })
    }
}
