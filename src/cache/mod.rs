//! Shared, asynchronously populated cache of recipe rating aggregates.
//!
//! [`RatingCache`] is a cheap-to-clone handle. Build one at startup and hand
//! clones to every screen that renders or loads ratings; they all see the
//! same entries, the same in-flight fetches and the same revision counter.
//!
//! # Reads
//!
//! [`get_rating()`](RatingCache::get_rating) never blocks and never fetches.
//! Before the bulk preload has finished it returns `None` for unknown ids
//! ("not yet known"). Afterwards the preload is authoritative: an unknown id
//! has no ratings, so it is written as [`RatingAggregate::ZERO`] on first
//! read and returned.
//!
//! # Single-flight
//!
//! Each fetch runs on its own tokio task and is published as a shared
//! future keyed by recipe id. Concurrent `load_rating` calls for the same id
//! await that one future, so the backend sees one request per id per
//! loading episode. Because the task is spawned, a caller that drops its
//! future never strands an id in the pending set, and every fetch is bounded
//! by [`RatingCacheConfig::fetch_timeout`].
//!
//! # Consistency
//!
//! Writes land in completion order (last completed write wins) with two
//! exceptions: results from fetches that started before a
//! [`clear_cache()`](RatingCache::clear_cache) are dropped, and results from
//! fetches that were in flight when a bulk preload replaced the table are
//! dropped in favour of the preload's snapshot.
//!
//! # Change notification
//!
//! Every write to the table bumps [`revision()`](RatingCache::revision).
//! Compare it to decide whether to re-read, or await changes on the
//! receiver from [`subscribe()`](RatingCache::subscribe).

mod builder;

pub use builder::{RatingCacheBuilder, RatingCacheConfig};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::policy::{FailOpen, FailurePolicy, FailureResolution};
use crate::source::RatingSource;
use crate::telemetry;
use crate::types::RatingAggregate;
use crate::{RatingsError, Result};

type SharedFetch = Shared<BoxFuture<'static, RatingAggregate>>;
type SharedBulk = Shared<BoxFuture<'static, ()>>;

/// Overall state of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePhase {
    /// No bulk preload yet. Entries may hold individually loaded ratings.
    Empty,
    /// A bulk preload is in flight.
    Loading,
    /// The bulk preload settled; unknown ids read as unrated.
    Authoritative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Load,
    Refresh,
}

impl FetchKind {
    fn label(self) -> &'static str {
        match self {
            FetchKind::Load => "single",
            FetchKind::Refresh => "refresh",
        }
    }
}

struct PendingFetch {
    /// Distinguishes a fetch from a later one for the same id.
    ticket: u64,
    kind: FetchKind,
    future: SharedFetch,
}

#[derive(Default)]
struct State {
    entries: HashMap<String, RatingAggregate>,
    pending: HashMap<String, PendingFetch>,
    revision: u64,
    bulk_complete: bool,
    bulk_in_flight: Option<SharedBulk>,
    /// Bumped by `clear_cache`.
    generation: u64,
    /// Bumped by every successful bulk replace.
    snapshot: u64,
    next_ticket: u64,
}

struct Inner {
    source: Arc<dyn RatingSource>,
    policy: Arc<dyn FailurePolicy>,
    config: RatingCacheConfig,
    state: Mutex<State>,
    revision_tx: watch::Sender<u64>,
}

/// Process-wide rating cache handle.
///
/// Load operations spawn their fetches with `tokio::spawn` and must be
/// called from within a tokio runtime.
#[derive(Clone)]
pub struct RatingCache {
    inner: Arc<Inner>,
}

impl RatingCache {
    /// Create a builder for configuring the cache.
    pub fn builder() -> RatingCacheBuilder {
        RatingCacheBuilder::new()
    }

    /// Create a fail-open cache over `source` with default settings.
    pub fn new(source: Arc<dyn RatingSource>) -> Self {
        Self::from_parts(source, Arc::new(FailOpen), RatingCacheConfig::default())
    }

    pub(crate) fn from_parts(
        source: Arc<dyn RatingSource>,
        policy: Arc<dyn FailurePolicy>,
        config: RatingCacheConfig,
    ) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                source,
                policy,
                config,
                state: Mutex::new(State::default()),
                revision_tx,
            }),
        }
    }

    // ========================================================================
    // Synchronous reads
    // ========================================================================

    /// Cached aggregate for `recipe_id`.
    ///
    /// Returns `None` only while the bulk preload has not settled. Once it
    /// has, a missing id is recorded as zero (bumping the revision) and
    /// zero is returned.
    pub fn get_rating(&self, recipe_id: &str) -> Option<RatingAggregate> {
        let mut state = self.inner.lock();
        if let Some(aggregate) = state.entries.get(recipe_id) {
            return Some(*aggregate);
        }
        if !state.bulk_complete {
            return None;
        }

        state
            .entries
            .insert(recipe_id.to_owned(), RatingAggregate::ZERO);
        self.inner.bump(&mut state);
        metrics::counter!(telemetry::ZERO_FILLS_TOTAL).increment(1);
        Some(RatingAggregate::ZERO)
    }

    /// Whether a fetch for `recipe_id` is in flight.
    pub fn is_loading(&self, recipe_id: &str) -> bool {
        self.inner.lock().pending.contains_key(recipe_id)
    }

    /// Current change token. Strictly increases on every write.
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Receiver that observes every revision bump.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision_tx.subscribe()
    }

    /// Whether the bulk preload has settled (successfully or not).
    pub fn is_bulk_complete(&self) -> bool {
        self.inner.lock().bulk_complete
    }

    pub fn phase(&self) -> CachePhase {
        let state = self.inner.lock();
        if state.bulk_complete {
            CachePhase::Authoritative
        } else if state.bulk_in_flight.is_some() {
            CachePhase::Loading
        } else {
            CachePhase::Empty
        }
    }

    /// Number of cached entries, zero-filled ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached entries with at least one vote.
    pub fn rated_len(&self) -> usize {
        self.inner
            .lock()
            .entries
            .values()
            .filter(|aggregate| aggregate.has_ratings())
            .count()
    }

    // ========================================================================
    // Loads
    // ========================================================================

    /// Load the aggregate for `recipe_id`, fetching only on a cache miss.
    ///
    /// Joins an in-flight fetch for the same id instead of issuing another.
    /// Never fails: a failed fetch resolves through the failure policy and
    /// the caller receives zero at worst.
    pub async fn load_rating(&self, recipe_id: &str) -> RatingAggregate {
        let fetch = {
            let mut state = self.inner.lock();
            if let Some(aggregate) = state.entries.get(recipe_id) {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                return *aggregate;
            }
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);

            let in_flight = state.pending.get(recipe_id).map(|p| p.future.clone());
            match in_flight {
                Some(fetch) => {
                    metrics::counter!(telemetry::COALESCED_TOTAL, "operation" => "single")
                        .increment(1);
                    debug!(recipe_id, "joining in-flight rating fetch");
                    fetch
                }
                None => self.start_fetch(&mut state, recipe_id, FetchKind::Load),
            }
        };
        fetch.await
    }

    /// Load every id that is neither cached nor already being fetched.
    ///
    /// Fetches run concurrently; this returns once all of them settled.
    /// Results are observed through the cache, not returned.
    pub async fn load_multiple_ratings<I, S>(&self, recipe_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let to_load: Vec<String> = {
            let state = self.inner.lock();
            let mut seen = HashSet::new();
            recipe_ids
                .into_iter()
                .filter_map(|id| {
                    let id = id.as_ref();
                    let wanted = !state.entries.contains_key(id)
                        && !state.pending.contains_key(id)
                        && seen.insert(id.to_owned());
                    wanted.then(|| id.to_owned())
                })
                .collect()
        };
        if to_load.is_empty() {
            return;
        }

        debug!(count = to_load.len(), "loading ratings");
        future::join_all(to_load.iter().map(|id| self.load_rating(id))).await;
    }

    /// Seed the whole cache from the backend's bulk table, once.
    ///
    /// No-op when a preload already settled. A call made while one is in
    /// flight awaits that preload. On success the table replaces the
    /// entries wholesale; on failure the entries are kept. Either way the
    /// cache becomes [`CachePhase::Authoritative`].
    pub async fn load_all_ratings(&self) {
        let bulk = {
            let mut state = self.inner.lock();
            if state.bulk_complete {
                return;
            }
            if let Some(bulk) = state.bulk_in_flight.clone() {
                metrics::counter!(telemetry::COALESCED_TOTAL, "operation" => "bulk").increment(1);
                bulk
            } else {
                self.start_bulk(&mut state)
            }
        };
        bulk.await
    }

    /// Fetch `recipe_id` again regardless of what is cached.
    ///
    /// Meant for right after the user rated a recipe. An in-flight plain
    /// load may predate the rating, so it is superseded rather than joined;
    /// an in-flight refresh is joined. Both fetches commit when they finish.
    pub async fn load_and_update_rating(&self, recipe_id: &str) -> RatingAggregate {
        let fetch = {
            let mut state = self.inner.lock();
            let refresh = state
                .pending
                .get(recipe_id)
                .filter(|p| p.kind == FetchKind::Refresh)
                .map(|p| p.future.clone());
            match refresh {
                Some(fetch) => {
                    metrics::counter!(telemetry::COALESCED_TOTAL, "operation" => "refresh")
                        .increment(1);
                    fetch
                }
                None => self.start_fetch(&mut state, recipe_id, FetchKind::Refresh),
            }
        };
        fetch.await
    }

    // ========================================================================
    // Local writes
    // ========================================================================

    /// Overwrite the entry for `recipe_id` without a network call.
    pub fn update_rating(&self, recipe_id: &str, aggregate: RatingAggregate) {
        let mut state = self.inner.lock();
        state.entries.insert(recipe_id.to_owned(), aggregate);
        self.inner.bump(&mut state);
    }

    /// Drop every entry and in-flight bookkeeping and allow a new preload.
    ///
    /// Fetches still running finish, but their results are discarded.
    pub fn clear_cache(&self) {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.pending.clear();
        state.bulk_complete = false;
        state.bulk_in_flight = None;
        state.generation += 1;
        self.inner.bump(&mut state);
        debug!(generation = state.generation, "rating cache cleared");
    }

    // ========================================================================
    // Fetch plumbing
    // ========================================================================

    fn start_fetch(&self, state: &mut State, recipe_id: &str, kind: FetchKind) -> SharedFetch {
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let epoch = Epoch {
            generation: state.generation,
            snapshot: state.snapshot,
        };

        let inner = Arc::clone(&self.inner);
        let id = recipe_id.to_owned();
        let handle = tokio::spawn(async move { inner.run_fetch(id, ticket, kind, epoch).await });
        let fetch = handle
            .map(|joined| joined.unwrap_or(RatingAggregate::ZERO))
            .boxed()
            .shared();

        state.pending.insert(
            recipe_id.to_owned(),
            PendingFetch {
                ticket,
                kind,
                future: fetch.clone(),
            },
        );
        fetch
    }

    fn start_bulk(&self, state: &mut State) -> SharedBulk {
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_bulk(generation).await });
        let bulk = handle.map(|_| ()).boxed().shared();
        state.bulk_in_flight = Some(bulk.clone());
        bulk
    }
}

/// Cache state a fetch started under.
#[derive(Clone, Copy)]
struct Epoch {
    generation: u64,
    snapshot: u64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // No code path panics while holding the lock, and the state is
        // valid between statements anyway.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self, state: &mut State) {
        state.revision += 1;
        self.revision_tx.send_replace(state.revision);
    }

    /// Run `fetch` under the configured timeout, turning a panic into an error.
    async fn guarded<T>(&self, fetch: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = self.config.fetch_timeout;
        match tokio::time::timeout(limit, AssertUnwindSafe(fetch).catch_unwind()).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(RatingsError::FetchAborted(panic_message(panic.as_ref()))),
            Err(_) => Err(RatingsError::Timeout(limit)),
        }
    }

    async fn run_fetch(
        &self,
        recipe_id: String,
        ticket: u64,
        kind: FetchKind,
        epoch: Epoch,
    ) -> RatingAggregate {
        let started = Instant::now();
        let outcome = self.guarded(self.source.fetch_rating(&recipe_id)).await;
        record_fetch(kind.label(), started, outcome.is_ok());

        let mut state = self.lock();
        if state.pending.get(&recipe_id).is_some_and(|p| p.ticket == ticket) {
            state.pending.remove(&recipe_id);
        }

        if state.generation != epoch.generation {
            debug!(recipe_id = %recipe_id, "dropping rating fetched before cache clear");
            return outcome.unwrap_or(RatingAggregate::ZERO);
        }
        if state.snapshot != epoch.snapshot {
            debug!(recipe_id = %recipe_id, "dropping rating superseded by bulk preload");
            return state
                .entries
                .get(&recipe_id)
                .copied()
                .unwrap_or(RatingAggregate::ZERO);
        }

        let aggregate = match outcome {
            Ok(aggregate) => aggregate,
            Err(e) => {
                warn!(
                    recipe_id = %recipe_id,
                    source = self.source.name(),
                    policy = self.policy.name(),
                    error = %e,
                    "rating fetch failed"
                );
                match self.policy.resolve(&recipe_id, &e) {
                    FailureResolution::Store(aggregate) => aggregate,
                    FailureResolution::Skip => return RatingAggregate::ZERO,
                }
            }
        };

        state.entries.insert(recipe_id, aggregate);
        self.bump(&mut state);
        aggregate
    }

    async fn run_bulk(&self, generation: u64) {
        let started = Instant::now();
        let outcome = self.guarded(self.source.fetch_all()).await;
        record_fetch("bulk", started, outcome.is_ok());

        let mut state = self.lock();
        if state.generation != generation {
            debug!("dropping bulk preload started before cache clear");
            return;
        }
        state.bulk_in_flight = None;

        match outcome {
            Ok(rows) => {
                let count = rows.len();
                state.entries = rows
                    .into_iter()
                    .map(|row| (row.recipe_id, row.aggregate))
                    .collect();
                state.snapshot += 1;
                info!(count, "bulk rating preload complete");
            }
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    error = %e,
                    "bulk rating preload failed, unknown recipes will read as unrated"
                );
            }
        }
        state.bulk_complete = true;
        self.bump(&mut state);
    }
}

fn record_fetch(operation: &'static str, started: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::FETCHES_TOTAL, "operation" => operation, "status" => status)
        .increment(1);
    metrics::histogram!(telemetry::FETCH_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "rating source panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_str_and_string() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "rating source panicked");
    }

    #[test]
    fn fetch_kind_labels() {
        assert_eq!(FetchKind::Load.label(), "single");
        assert_eq!(FetchKind::Refresh.label(), "refresh");
    }
}
