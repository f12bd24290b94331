//! Time-bounded snapshot cache.
//!
//! Readers clone the current `Arc<Snapshot>` and release the lock before doing
//! any work. Refreshes are serialized behind a separate lock so concurrent
//! callers that find the snapshot stale wait for one fetch instead of each
//! starting their own.

use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::types::MonthlyRecord;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tracing::{debug, error, info};

pub const DEFAULT_FRESHNESS_MINUTES: i64 = 60;

/// Where snapshots come from: a CSV export, a database query, a test fixture.
pub trait SnapshotSource: Send + Sync {
    fn fetch_records(&self) -> Result<Vec<MonthlyRecord>>;
}

impl<T: SnapshotSource + ?Sized> SnapshotSource for Box<T> {
    fn fetch_records(&self) -> Result<Vec<MonthlyRecord>> {
        (**self).fetch_records()
    }
}

impl<T: SnapshotSource + ?Sized> SnapshotSource for Arc<T> {
    fn fetch_records(&self) -> Result<Vec<MonthlyRecord>> {
        (**self).fetch_records()
    }
}

pub struct SnapshotCache<S> {
    source: S,
    freshness: Duration,
    current: RwLock<Option<Arc<Snapshot>>>,
    refresh_lock: Mutex<()>,
}

impl<S: SnapshotSource> SnapshotCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_freshness(source, Duration::minutes(DEFAULT_FRESHNESS_MINUTES))
    }

    pub fn with_freshness(source: S, freshness: Duration) -> Self {
        Self {
            source,
            freshness,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// The current snapshot, fetching a new one if it is missing or stale.
    pub fn get(&self) -> Result<Arc<Snapshot>> {
        self.get_at(Utc::now())
    }

    /// Same as [`get`](Self::get) with an explicit clock.
    ///
    /// A failed fetch is returned to the caller and the previous snapshot
    /// stays cached.
    pub fn get_at(&self, now: DateTime<Utc>) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.fresh(now) {
            return Ok(snapshot);
        }

        let _refreshing = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Another caller may have refreshed while we waited.
        if let Some(snapshot) = self.fresh(now) {
            debug!("snapshot refreshed by concurrent caller");
            return Ok(snapshot);
        }

        self.fetch_and_swap(now)
    }

    /// Fetch now regardless of age. On failure the cached snapshot is kept.
    pub fn refresh(&self) -> Result<Arc<Snapshot>> {
        let _refreshing = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.fetch_and_swap(Utc::now())
    }

    /// The cached snapshot regardless of age, without fetching.
    pub fn peek(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Caller must hold `refresh_lock`.
    fn fetch_and_swap(&self, now: DateTime<Utc>) -> Result<Arc<Snapshot>> {
        let started = Instant::now();
        let records = self.source.fetch_records().map_err(|e| {
            error!(error = %e, "snapshot fetch failed; keeping previous snapshot");
            e
        })?;
        let snapshot = Arc::new(Snapshot::new(records, now));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        info!(
            rows = snapshot.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot refreshed"
        );
        Ok(snapshot)
    }

    fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<Snapshot>> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current
            .as_ref()
            .filter(|s| s.age(now) < self.freshness)
            .cloned()
    }
}
