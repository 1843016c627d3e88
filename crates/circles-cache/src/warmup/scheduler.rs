//! Startup warmup and periodic background refresh.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped ──start_periodic_refresh──→ Running ──stop──→ Stopped
//! ```
//!
//! Both transitions are idempotent. `stop` waits for the refresh loop task to
//! exit, so no refresh work is observable after it returns.
//!
//! ## Fan-out
//!
//! Each kind in a pass gets a fresh semaphore with `warmup.concurrency`
//! permits. A permit is acquired before a worker is spawned and held until it
//! finishes, so at most that many `load_entity` calls are in flight.
//! Cancellation stops dispatch; workers already spawned run to completion.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::provider::{HotDataProvider, HotKind};
use crate::aside::CacheAside;
use crate::config::{TtlConfig, WarmupConfig};
use crate::error::{CacheError, LoaderError, Result};
use crate::keys::{self, EntityKind};
use crate::store::CacheStore;

/// Per-kind counts from one warmup pass.
#[derive(Debug, Clone)]
pub struct KindReport {
    pub kind: HotKind,
    /// Identifiers returned by the provider.
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entities that no longer exist upstream.
    pub skipped: usize,
}

/// Outcome of a full warmup pass.
///
/// `last_error` is informational: the pass always runs every kind unless it
/// was cancelled.
#[derive(Debug, Default)]
pub struct WarmupSummary {
    pub kinds: Vec<KindReport>,
    pub duration: Duration,
    pub last_error: Option<CacheError>,
}

impl KindReport {
    fn new(kind: HotKind) -> Self {
        Self {
            kind,
            requested: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

impl WarmupSummary {
    pub fn total_succeeded(&self) -> usize {
        self.kinds.iter().map(|k| k.succeeded).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.kinds.iter().map(|k| k.failed).sum()
    }

    pub fn report(&self, kind: HotKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// Returns `true` if the pass stopped early because of cancellation.
    pub fn was_cancelled(&self) -> bool {
        self.last_error.as_ref().is_some_and(CacheError::is_cancelled)
    }
}

enum ItemOutcome {
    Stored,
    Skipped,
    Failed(CacheError),
}

struct WarmupRunner {
    aside: CacheAside,
    ttl: TtlConfig,
    config: WarmupConfig,
}

struct RefreshLoop {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives bulk warmup at startup and on a timer.
pub struct WarmupScheduler {
    runner: Arc<WarmupRunner>,
    state: Mutex<Option<RefreshLoop>>,
}

impl WarmupScheduler {
    /// Create a stopped scheduler. The configuration is fixed for its lifetime.
    pub fn new(aside: CacheAside, ttl: TtlConfig, config: WarmupConfig) -> Self {
        Self {
            runner: Arc::new(WarmupRunner { aside, ttl, config }),
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WarmupConfig {
        &self.runner.config
    }

    /// Run one bulk warmup pass over every hot kind.
    ///
    /// Never fails as a whole: per-identifier and per-kind failures are
    /// counted and the last one is kept in [`WarmupSummary::last_error`].
    /// If `cancel` fires, dispatch stops and the summary carries
    /// [`CacheError::Cancelled`].
    pub async fn warmup_on_startup(
        &self,
        provider: &Arc<dyn HotDataProvider>,
        cancel: &CancellationToken,
    ) -> WarmupSummary {
        if !self.runner.config.enabled {
            info!("Cache warmup disabled");
            return WarmupSummary::default();
        }
        self.runner.warm_all(provider, cancel).await
    }

    /// Start the periodic refresh loop. No-op if already running.
    ///
    /// Returns `true` if a new loop was started. Must be called from within a
    /// Tokio runtime.
    pub async fn start_periodic_refresh(&self, provider: Arc<dyn HotDataProvider>) -> bool {
        if !self.runner.config.enabled {
            info!("Cache warmup disabled, periodic refresh not started");
            return false;
        }

        let mut state = self.state.lock().await;
        if state.is_some() {
            debug!("Periodic cache refresh already running");
            return false;
        }

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.runner).refresh_loop(provider, shutdown.clone()));
        *state = Some(RefreshLoop { shutdown, handle });
        true
    }

    /// Stop the periodic refresh loop and wait for it to exit. No-op if stopped.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let Some(running) = state.take() else {
            return;
        };

        running.shutdown.cancel();
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Periodic cache refresh task ended abnormally");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Reload one entity and overwrite its cache entry.
    ///
    /// If the loader returns `None` the entity is gone upstream and its key is
    /// deleted instead.
    pub async fn refresh_entity<T, F, Fut>(&self, kind: EntityKind, id: i64, loader: F) -> Result<Option<T>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, LoaderError>>,
    {
        let key = keys::entity(kind, id);
        let aside = &self.runner.aside;

        match loader().await.map_err(|e| CacheError::loader(&key, e))? {
            Some(value) => {
                aside
                    .refresh_cache(&key, self.runner.ttl.for_kind(kind), || async move {
                        Ok::<_, LoaderError>(value)
                    })
                    .await
                    .map(Some)
            }
            None => {
                debug!(key = %key, "Entity gone upstream, deleting cache entry");
                aside.invalidate(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn refresh_post<T, F, Fut>(&self, id: i64, loader: F) -> Result<Option<T>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, LoaderError>>,
    {
        self.refresh_entity(EntityKind::Post, id, loader).await
    }

    pub async fn refresh_user<T, F, Fut>(&self, id: i64, loader: F) -> Result<Option<T>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, LoaderError>>,
    {
        self.refresh_entity(EntityKind::User, id, loader).await
    }

    pub async fn refresh_circle<T, F, Fut>(&self, id: i64, loader: F) -> Result<Option<T>>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, LoaderError>>,
    {
        self.refresh_entity(EntityKind::Circle, id, loader).await
    }
}

impl Drop for WarmupScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.state.get_mut().take() {
            running.shutdown.cancel();
        }
    }
}

impl WarmupRunner {
    async fn refresh_loop(self: Arc<Self>, provider: Arc<dyn HotDataProvider>, shutdown: CancellationToken) {
        let period = self.config.refresh_interval().max(Duration::from_millis(1));
        let timeout = self.config.refresh_timeout();
        info!(
            interval_secs = period.as_secs(),
            timeout_secs = timeout.as_secs(),
            "Periodic cache refresh started"
        );

        // The startup pass covers t=0, so the first tick is one period out.
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let cycle = shutdown.child_token();
                    if tokio::time::timeout(timeout, self.warm_all(&provider, &cycle)).await.is_err() {
                        cycle.cancel();
                        warn!(timeout_secs = timeout.as_secs(), "Periodic cache refresh timed out");
                    }
                }
            }
        }

        info!("Periodic cache refresh stopped");
    }

    async fn warm_all(&self, provider: &Arc<dyn HotDataProvider>, cancel: &CancellationToken) -> WarmupSummary {
        let started = Instant::now();
        let mut summary = WarmupSummary::default();

        for kind in HotKind::ALL {
            if cancel.is_cancelled() {
                summary.last_error = Some(CacheError::Cancelled);
                break;
            }

            let limit = kind.limit(&self.config);
            if limit == 0 {
                continue;
            }

            let (report, error) = self.warm_kind(provider, kind, limit, cancel).await;
            info!(
                kind = %kind,
                requested = report.requested,
                succeeded = report.succeeded,
                failed = report.failed,
                skipped = report.skipped,
                "Warmed cache kind"
            );
            summary.kinds.push(report);

            if let Some(e) = error {
                let cancelled = e.is_cancelled();
                summary.last_error = Some(e);
                if cancelled {
                    break;
                }
            }
        }

        summary.duration = started.elapsed();
        crate::metrics::record_warmup_duration(summary.duration);
        info!(
            succeeded = summary.total_succeeded(),
            failed = summary.total_failed(),
            duration_ms = summary.duration.as_millis() as u64,
            cancelled = summary.was_cancelled(),
            "Cache warmup finished"
        );
        summary
    }

    async fn warm_kind(
        &self,
        provider: &Arc<dyn HotDataProvider>,
        kind: HotKind,
        limit: usize,
        cancel: &CancellationToken,
    ) -> (KindReport, Option<CacheError>) {
        let mut report = KindReport::new(kind);
        let mut last_error = None;

        let mut ids = match provider.hot_identifiers(kind, limit).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to fetch hot identifiers");
                return (report, Some(CacheError::loader(kind.name(), e)));
            }
        };
        ids.truncate(limit);
        report.requested = ids.len();

        let ttl = self.ttl.for_kind(kind.entity_kind());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut workers = JoinSet::new();

        for id in ids {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    last_error = Some(CacheError::Cancelled);
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let provider = Arc::clone(provider);
            let store = self.aside.store().clone();
            workers.spawn(async move {
                let outcome = warm_identifier(provider.as_ref(), &store, kind, id, ttl).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(ItemOutcome::Stored) => report.succeeded += 1,
                Ok(ItemOutcome::Skipped) => report.skipped += 1,
                Ok(ItemOutcome::Failed(e)) => {
                    report.failed += 1;
                    if !matches!(last_error, Some(CacheError::Cancelled)) {
                        last_error = Some(e);
                    }
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Warmup worker panicked");
                    report.failed += 1;
                }
            }
        }

        (report, last_error)
    }
}

async fn warm_identifier(
    provider: &dyn HotDataProvider,
    store: &CacheStore,
    kind: HotKind,
    id: i64,
    ttl: Duration,
) -> ItemOutcome {
    let key = keys::entity(kind.entity_kind(), id);

    let outcome = match provider.load_entity(kind, id).await {
        Err(e) => {
            warn!(key = %key, error = %e, "Warmup load failed");
            ItemOutcome::Failed(CacheError::loader(&key, e))
        }
        Ok(None) | Ok(Some(serde_json::Value::Null)) => ItemOutcome::Skipped,
        Ok(Some(value)) => match store.set(&key, &value, ttl).await {
            Ok(()) => ItemOutcome::Stored,
            Err(e) => {
                warn!(key = %key, error = %e, "Warmup write failed");
                ItemOutcome::Failed(CacheError::write(&key, e))
            }
        },
    };

    let label = match &outcome {
        ItemOutcome::Stored => "stored",
        ItemOutcome::Skipped => "skipped",
        ItemOutcome::Failed(_) => "failed",
    };
    crate::metrics::record_warmup_item(kind.name(), label);
    outcome
}
