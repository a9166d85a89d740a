//! Read-through result cache keyed by document content hash.
//!
//! Identical re-uploads are common (a founder re-submitting the same deck),
//! and the model call is by far the most expensive step. The cache maps
//! blake3 content hash → [`AnalysisResult`] with **single-flight**
//! initialisation: when two identical documents arrive concurrently, one
//! task runs the pipeline while the other awaits the same cell, so the
//! model is called at most once per key.
//!
//! A failed run leaves its cell empty — the next identical upload retries
//! instead of being served a cached failure. Entries live for the cache's
//! lifetime; hosts that need eviction can simply drop the cache and start a
//! fresh one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::error::AnalysisError;
use crate::output::AnalysisResult;

/// Shared, concurrency-safe analysis cache.
#[derive(Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<AnalysisResult>>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a completed result without running anything.
    pub async fn get(&self, key: &str) -> Option<AnalysisResult> {
        let cell = self.entries.lock().await.get(key).cloned()?;
        cell.get().cloned()
    }

    /// Return the cached result for `key`, running `run` to produce it if
    /// absent. Returns `(result, cache_hit)`.
    ///
    /// Concurrent callers with the same key share one execution of `run`;
    /// the losers simply await the winner's cell. The outer map lock is held
    /// only long enough to clone the entry's `Arc` — never across `run`.
    pub async fn get_or_run<F, Fut>(
        &self,
        key: &str,
        run: F,
    ) -> Result<(AnalysisResult, bool), AnalysisError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AnalysisResult, AnalysisError>>,
    {
        let cell = {
            let mut entries = self.entries.lock().await;
            Arc::clone(entries.entry(key.to_string()).or_default())
        };

        let mut ran = false;
        let result = cell
            .get_or_try_init(|| {
                ran = true;
                run()
            })
            .await?;
        Ok((result.clone(), !ran))
    }

    /// Number of keys with a completed result.
    pub async fn len(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
