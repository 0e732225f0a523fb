use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::entitlements::Principal;
use crate::error::{AppError, AppResult};
use crate::subscriptions::{SubscriptionChange, SubscriptionRecord};

pub const ADMIN_ROLE: &str = "admin";

// key: principal-store -> authenticated caller lookup, plan changes
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Loads the caller named by a verified token. Admin tokens resolve
    /// against the admin accounts, every other role against users.
    async fn load(&self, user_id: i32, role: &str) -> AppResult<Option<Principal>>;

    /// Stores a confirmed billing event and moves the user onto the plan it
    /// grants. This is the only write path for a user's plan.
    async fn apply_subscription(&self, change: &SubscriptionChange) -> AppResult<SubscriptionRecord>;
}

#[derive(Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn load(&self, user_id: i32, role: &str) -> AppResult<Option<Principal>> {
        if role == ADMIN_ROLE {
            let row = sqlx::query(
                "SELECT id, subscription_status, is_super_admin FROM admin_users WHERE id = $1",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
            return Ok(row.map(|row| {
                let plan: Option<String> = row.get("subscription_status");
                Principal::admin(row.get("id"), plan.as_deref(), row.get("is_super_admin"))
            }));
        }

        let row = sqlx::query(
            "SELECT id, subscription_status FROM users WHERE id = $1 AND is_active = TRUE",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| {
            let plan: Option<String> = row.get("subscription_status");
            Principal::regular(row.get("id"), plan.as_deref())
        }))
    }

    async fn apply_subscription(&self, change: &SubscriptionChange) -> AppResult<SubscriptionRecord> {
        let effective_plan = change.resulting_plan();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE users SET subscription_status = $2 WHERE id = $1")
            .bind(change.user_id)
            .bind(effective_plan.as_str())
            .execute(&mut tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO subscriptions (id, user_id, plan, provider, external_id, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (provider, external_id)
            DO UPDATE SET
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING id, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(change.user_id)
        .bind(change.plan.as_str())
        .bind(&change.provider)
        .bind(&change.external_id)
        .bind(change.status.as_str())
        .fetch_one(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(SubscriptionRecord {
            id: row.get("id"),
            user_id: change.user_id,
            plan: change.plan,
            provider: change.provider.clone(),
            external_id: change.external_id.clone(),
            status: change.status,
            effective_plan,
            updated_at: row.get("updated_at"),
        })
    }
}

/// Principals held in process, keyed by (role, id).
#[derive(Default)]
pub struct MemoryPrincipalStore {
    principals: DashMap<(bool, i32), Principal>,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, principal: Principal) {
        let is_admin = matches!(principal, Principal::Admin { .. });
        self.principals
            .insert((is_admin, principal.id()), principal);
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn load(&self, user_id: i32, role: &str) -> AppResult<Option<Principal>> {
        let key = (role == ADMIN_ROLE, user_id);
        Ok(self.principals.get(&key).map(|entry| entry.value().clone()))
    }

    async fn apply_subscription(&self, change: &SubscriptionChange) -> AppResult<SubscriptionRecord> {
        let effective_plan = change.resulting_plan();
        let mut entry = self
            .principals
            .get_mut(&(false, change.user_id))
            .ok_or(AppError::NotFound)?;
        *entry = Principal::Regular {
            id: change.user_id,
            plan: effective_plan,
        };
        Ok(SubscriptionRecord {
            id: Uuid::new_v4(),
            user_id: change.user_id,
            plan: change.plan,
            provider: change.provider.clone(),
            external_id: change.external_id.clone(),
            status: change.status,
            effective_plan,
            updated_at: Utc::now(),
        })
    }
}
