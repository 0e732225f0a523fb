use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use dashmap::DashMap;
use sqlx::PgPool;

use super::principal::PrincipalKey;
use super::table::ResourceKind;

// key: usage-window -> current calendar month, UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageWindow {
    pub start: DateTime<Utc>,
}

impl UsageWindow {
    pub fn current_month(now: DateTime<Utc>) -> Self {
        Self {
            start: month_start(now),
        }
    }
}

fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    // Day 1 always exists, so the fallback is unreachable.
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|start| Utc.from_utc_datetime(&start))
        .unwrap_or(now)
}

#[derive(Debug, thiserror::Error)]
pub enum UsageStoreError {
    #[error("usage database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("usage store unavailable: {0}")]
    Unavailable(String),
}

// key: usage-store -> per-principal generation ledger
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Records of `kind` owned by `owner` created at or after `since`.
    async fn count_since(
        &self,
        owner: PrincipalKey,
        kind: ResourceKind,
        since: DateTime<Utc>,
    ) -> Result<u64, UsageStoreError>;

    async fn record(
        &self,
        owner: PrincipalKey,
        kind: ResourceKind,
        at: DateTime<Utc>,
    ) -> Result<(), UsageStoreError>;
}

#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn count_since(
        &self,
        owner: PrincipalKey,
        kind: ResourceKind,
        since: DateTime<Utc>,
    ) -> Result<u64, UsageStoreError> {
        let query = match owner {
            PrincipalKey::User(_) => {
                r#"
                SELECT COUNT(*) FROM usage_records
                WHERE user_id = $1
                  AND resource_kind = $2
                  AND created_at >= $3
                "#
            }
            PrincipalKey::Admin(_) => {
                r#"
                SELECT COUNT(*) FROM usage_records
                WHERE admin_id = $1
                  AND resource_kind = $2
                  AND created_at >= $3
                "#
            }
        };
        let count: i64 = sqlx::query_scalar(query)
            .bind(owner.id())
            .bind(kind.as_str())
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn record(
        &self,
        owner: PrincipalKey,
        kind: ResourceKind,
        at: DateTime<Utc>,
    ) -> Result<(), UsageStoreError> {
        let (user_id, admin_id) = match owner {
            PrincipalKey::User(id) => (Some(id), None),
            PrincipalKey::Admin(id) => (None, Some(id)),
        };
        sqlx::query(
            "INSERT INTO usage_records (user_id, admin_id, resource_kind, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(admin_id)
        .bind(kind.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// In-process ledger for tests and database-less runs.
#[derive(Default)]
pub struct MemoryUsageStore {
    records: DashMap<(PrincipalKey, ResourceKind), Vec<DateTime<Utc>>>,
    unavailable: AtomicBool,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the backing store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn insert_many(
        &self,
        owner: PrincipalKey,
        kind: ResourceKind,
        at: DateTime<Utc>,
        count: usize,
    ) {
        self.records
            .entry((owner, kind))
            .or_default()
            .extend(std::iter::repeat(at).take(count));
    }

    fn ensure_available(&self) -> Result<(), UsageStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(UsageStoreError::Unavailable(
                "memory store marked unavailable".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn count_since(
        &self,
        owner: PrincipalKey,
        kind: ResourceKind,
        since: DateTime<Utc>,
    ) -> Result<u64, UsageStoreError> {
        self.ensure_available()?;
        let count = self
            .records
            .get(&(owner, kind))
            .map(|entries| entries.iter().filter(|at| **at >= since).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn record(
        &self,
        owner: PrincipalKey,
        kind: ResourceKind,
        at: DateTime<Utc>,
    ) -> Result<(), UsageStoreError> {
        self.ensure_available()?;
        self.insert_many(owner, kind, at, 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn window_starts_on_first_of_month() {
        let window = UsageWindow::current_month(at(2024, 3, 17, 13, 45));
        assert_eq!(window.start, at(2024, 3, 1, 0, 0));
        let first = UsageWindow::current_month(at(2024, 3, 1, 0, 0));
        assert_eq!(first.start, at(2024, 3, 1, 0, 0));
    }

    #[test]
    fn window_rolls_over_at_midnight() {
        let before = UsageWindow::current_month(at(2024, 1, 31, 23, 59));
        let after = UsageWindow::current_month(at(2024, 2, 1, 0, 0));
        assert_eq!(before.start, at(2024, 1, 1, 0, 0));
        assert_eq!(after.start, at(2024, 2, 1, 0, 0));
    }

    #[tokio::test]
    async fn memory_store_counts_inclusive_of_start() {
        let store = MemoryUsageStore::new();
        let start = at(2024, 5, 1, 0, 0);
        let owner = PrincipalKey::User(7);
        store.insert_many(owner, ResourceKind::Invoice, start, 2);
        store.insert_many(owner, ResourceKind::Invoice, start - Duration::milliseconds(1), 3);
        store.insert_many(owner, ResourceKind::Resume, start, 4);
        store.insert_many(PrincipalKey::User(8), ResourceKind::Invoice, start, 5);

        let count = store
            .count_since(owner, ResourceKind::Invoice, start)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn user_records_do_not_count_for_admin_with_same_id() {
        let store = MemoryUsageStore::new();
        let start = at(2024, 5, 1, 0, 0);
        for _ in 0..5 {
            store
                .record(PrincipalKey::User(3), ResourceKind::Invoice, start)
                .await
                .unwrap();
        }
        store
            .record(PrincipalKey::Admin(3), ResourceKind::Invoice, start)
            .await
            .unwrap();

        let admin = store
            .count_since(PrincipalKey::Admin(3), ResourceKind::Invoice, start)
            .await
            .unwrap();
        let user = store
            .count_since(PrincipalKey::User(3), ResourceKind::Invoice, start)
            .await
            .unwrap();
        assert_eq!((user, admin), (5, 1));
    }

    #[tokio::test]
    async fn unavailable_memory_store_errors() {
        let store = MemoryUsageStore::new();
        store.set_unavailable(true);
        let result = store
            .record(PrincipalKey::User(1), ResourceKind::Qrcode, Utc::now())
            .await;
        assert!(matches!(result, Err(UsageStoreError::Unavailable(_))));
    }
}
