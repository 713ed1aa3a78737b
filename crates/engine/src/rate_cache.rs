//! Process-wide table of daily exchange rates.
//!
//! The table is immutable once published: a refresh builds a new table next to
//! the current one and swaps the `Arc` in a single step, so a reader either
//! sees the previous table or the new one, never a mix. Refreshes are
//! serialized through `refresh_gate`; callers that queue behind a running
//! refresh get that refresh's outcome, success or failure, without reloading.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::{CurrencyCode, EngineError, ResultEngine, store::RateSnapshotStore};

/// Rates of one day, relative to the snapshot's base currency.
pub type DayRates = Arc<BTreeMap<CurrencyCode, Decimal>>;

/// Default deadline for reloading snapshots.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct RateTable {
    days: HashMap<NaiveDate, DayRates>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Whether rates loaded at `refreshed_at` must be reloaded at `now`.
///
/// Staleness is counted in calendar days: both instants are truncated to
/// their day and the cache is stale once more than one day has elapsed.
pub fn is_stale(refreshed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now.date_naive() - refreshed_at.date_naive()).num_days() > 1
}

/// Outcome of the last finished reload, guarded by the refresh gate.
#[derive(Debug, Default)]
struct LastAttempt {
    failure: Option<String>,
}

pub struct ExchangeRateCache {
    snapshots: Arc<dyn RateSnapshotStore>,
    table: RwLock<Arc<RateTable>>,
    refresh_gate: Mutex<LastAttempt>,
    /// Number of finished reloads, successful or not.
    attempts: AtomicU64,
    refresh_timeout: Duration,
}

impl core::fmt::Debug for ExchangeRateCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let table = self.current();
        f.debug_struct("ExchangeRateCache")
            .field("days", &table.days.len())
            .field("refreshed_at", &table.refreshed_at)
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}

impl ExchangeRateCache {
    pub fn new(snapshots: Arc<dyn RateSnapshotStore>, refresh_timeout: Duration) -> Self {
        Self {
            snapshots,
            table: RwLock::new(Arc::new(RateTable::default())),
            refresh_gate: Mutex::new(LastAttempt::default()),
            attempts: AtomicU64::new(0),
            refresh_timeout,
        }
    }

    fn current(&self) -> Arc<RateTable> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, table: RateTable) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
    }

    /// Rates published for exactly `date`.
    pub fn get_rates(&self, date: NaiveDate) -> ResultEngine<DayRates> {
        self.current()
            .days
            .get(&date)
            .cloned()
            .ok_or(EngineError::RateNotFoundForDate(date))
    }

    pub fn is_empty(&self) -> bool {
        self.current().days.is_empty()
    }

    /// Instant of the last successful refresh.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.current().refreshed_at
    }

    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        let table = self.current();
        match table.refreshed_at {
            _ if table.days.is_empty() => true,
            Some(refreshed_at) => is_stale(refreshed_at, now),
            None => true,
        }
    }

    /// Reloads the table when it is empty or stale.
    pub async fn ensure_fresh(&self) -> ResultEngine<()> {
        self.ensure_fresh_at(Utc::now()).await
    }

    pub async fn ensure_fresh_at(&self, now: DateTime<Utc>) -> ResultEngine<()> {
        if !self.needs_refresh(now) {
            return Ok(());
        }
        let seen = self.attempts.load(Ordering::SeqCst);
        let mut last = self.refresh_gate.lock().await;
        if self.attempts.load(Ordering::SeqCst) != seen {
            // A reload finished while we were waiting: share its outcome.
            return match &last.failure {
                Some(message) => Err(EngineError::RefreshFailure(message.clone())),
                None => Ok(()),
            };
        }
        if !self.needs_refresh(now) {
            return Ok(());
        }
        self.attempt(&mut last, now).await
    }

    /// Reloads the table unconditionally.
    pub async fn refresh(&self) -> ResultEngine<()> {
        let mut last = self.refresh_gate.lock().await;
        self.attempt(&mut last, Utc::now()).await
    }

    async fn attempt(&self, last: &mut LastAttempt, now: DateTime<Utc>) -> ResultEngine<()> {
        let result = self.reload(now).await;
        last.failure = match &result {
            Err(EngineError::RefreshFailure(message)) => Some(message.clone()),
            Err(err) => Some(err.to_string()),
            Ok(()) => None,
        };
        self.attempts.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn reload(&self, now: DateTime<Utc>) -> ResultEngine<()> {
        let snapshots =
            match tokio::time::timeout(self.refresh_timeout, self.snapshots.list_non_deleted_snapshots())
                .await
            {
                Ok(Ok(snapshots)) => snapshots,
                Ok(Err(err)) => {
                    tracing::warn!("exchange rate refresh failed: {err}");
                    return Err(EngineError::RefreshFailure(err.to_string()));
                }
                Err(_) => {
                    tracing::warn!(
                        "exchange rate refresh timed out after {:?}",
                        self.refresh_timeout
                    );
                    return Err(EngineError::RefreshFailure(format!(
                        "timed out after {:?}",
                        self.refresh_timeout
                    )));
                }
            };

        // Dates whose snapshots disappeared upstream keep their last rates;
        // loaded snapshots overwrite whatever was cached for their date.
        let mut days = self.current().days.clone();
        let loaded = snapshots.len();
        for snapshot in snapshots {
            days.insert(snapshot.effective_on, Arc::new(snapshot.usable_rates()));
        }
        tracing::info!(
            "exchange rates refreshed: {loaded} snapshots, {} dates cached",
            days.len()
        );

        self.publish(RateTable {
            days,
            refreshed_at: Some(now),
        });
        Ok(())
    }
}
