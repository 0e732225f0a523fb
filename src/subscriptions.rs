use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlements::{require_super_admin, Plan};
use crate::error::{AppError, AppResult};
use crate::extractor::CurrentPrincipal;
use crate::principals::PrincipalStore;

// key: subscription-status -> provider lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    Canceled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn grants_plan(self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(AppError::BadRequest(format!("unknown subscription status `{other}`"))),
        }
    }
}

/// A billing event that has already been confirmed by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub user_id: i32,
    pub plan: Plan,
    pub provider: String,
    pub external_id: String,
    pub status: SubscriptionStatus,
}

impl SubscriptionChange {
    /// Plan the user holds once the event is applied. Lapsed subscriptions
    /// drop the user back to free.
    pub fn resulting_plan(&self) -> Plan {
        if self.status.grants_plan() {
            self.plan
        } else {
            Plan::Free
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub user_id: i32,
    pub plan: Plan,
    pub provider: String,
    pub external_id: String,
    pub status: SubscriptionStatus,
    pub effective_plan: Plan,
    pub updated_at: DateTime<Utc>,
}

// key: subscription-service -> billing events to plan changes
#[derive(Clone)]
pub struct SubscriptionService {
    principals: Arc<dyn PrincipalStore>,
}

impl SubscriptionService {
    pub fn new(principals: Arc<dyn PrincipalStore>) -> Self {
        Self { principals }
    }

    pub async fn apply(&self, change: SubscriptionChange) -> AppResult<SubscriptionRecord> {
        if change.provider.trim().is_empty() || change.external_id.trim().is_empty() {
            return Err(AppError::BadRequest(
                "provider and external_id are required".into(),
            ));
        }
        let record = self.principals.apply_subscription(&change).await?;
        tracing::info!(
            user_id = record.user_id,
            provider = %record.provider,
            status = record.status.as_str(),
            plan = %record.effective_plan,
            "subscription applied"
        );
        Ok(record)
    }
}

pub fn routes() -> Router {
    Router::new().route("/api/admin/users/:id/plan", post(change_plan))
}

#[derive(Debug, Deserialize)]
pub struct PlanChangeRequest {
    pub plan: String,
    pub provider: String,
    pub external_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn change_plan(
    Extension(service): Extension<SubscriptionService>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(user_id): Path<i32>,
    Json(payload): Json<PlanChangeRequest>,
) -> AppResult<Json<SubscriptionRecord>> {
    require_super_admin(principal.as_ref())?;
    let plan = payload
        .plan
        .parse::<Plan>()
        .map_err(|error| AppError::BadRequest(error.to_string()))?;
    let status = payload.status.as_deref().unwrap_or("active").parse()?;
    let record = service
        .apply(SubscriptionChange {
            user_id,
            plan,
            provider: payload.provider,
            external_id: payload.external_id,
            status,
        })
        .await?;
    Ok(Json(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entitlements::Principal;
    use crate::principals::MemoryPrincipalStore;

    fn change(status: SubscriptionStatus) -> SubscriptionChange {
        SubscriptionChange {
            user_id: 21,
            plan: Plan::Pro,
            provider: "razorpay".into(),
            external_id: "sub_123".into(),
            status,
        }
    }

    #[tokio::test]
    async fn active_subscription_moves_user_to_plan() {
        let store = Arc::new(MemoryPrincipalStore::new());
        store.insert(Principal::regular(21, None));
        let service = SubscriptionService::new(store.clone());

        let record = service.apply(change(SubscriptionStatus::Active)).await.unwrap();
        assert_eq!(record.effective_plan, Plan::Pro);
        let principal = store.load(21, "user").await.unwrap().unwrap();
        assert_eq!(principal.plan(), Plan::Pro);
    }

    #[tokio::test]
    async fn canceled_subscription_drops_to_free() {
        let store = Arc::new(MemoryPrincipalStore::new());
        store.insert(Principal::regular(21, Some("pro")));
        let service = SubscriptionService::new(store.clone());

        service.apply(change(SubscriptionStatus::Canceled)).await.unwrap();
        let principal = store.load(21, "user").await.unwrap().unwrap();
        assert_eq!(principal.plan(), Plan::Free);
    }

    #[tokio::test]
    async fn blank_reference_is_rejected() {
        let store = Arc::new(MemoryPrincipalStore::new());
        let service = SubscriptionService::new(store);
        let mut bad = change(SubscriptionStatus::Active);
        bad.external_id = " ".into();
        assert!(matches!(
            service.apply(bad).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn status_parsing() {
        assert_eq!(
            "trialing".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::Trialing
        );
        assert!("paused".parse::<SubscriptionStatus>().is_err());
    }
}
