use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extractor::CurrentPrincipal;

use super::gates::{require_feature, require_plan, require_template, require_usage};
use super::{
    EntitlementEvaluator, EntitlementPolicy, Feature, Plan, Principal, ResourceKind,
    TemplateStyle, UsageVerdict,
};

// key: entitlement-api -> rest endpoints
pub fn routes() -> Router {
    Router::new()
        .route("/api/entitlements", get(limits_summary))
        .route("/api/entitlements/usage", post(check_usage))
        .route("/api/entitlements/features/:feature", get(check_feature))
        .route("/api/entitlements/plans/:plan", get(check_plan))
        .route("/api/entitlements/templates/:style", get(check_template))
        .route("/api/usage", post(record_usage))
        .route("/api/usage/bulk", post(record_bulk_usage))
        .route("/api/analytics/usage", get(usage_analytics))
}

#[derive(Debug, Serialize)]
pub struct LimitsSummary {
    pub principal_id: i32,
    pub plan: Plan,
    pub unrestricted: bool,
    pub policy: &'static EntitlementPolicy,
    pub usage: Vec<UsageVerdict>,
}

#[derive(Debug, Deserialize)]
pub struct UsageRequest {
    pub resource_kind: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    pub resource_kind: String,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkGenerationRequest {
    pub resource_kind: String,
    pub count: u32,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkReceipt {
    pub resource_kind: ResourceKind,
    pub created: u32,
    pub remaining: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct UsageAnalytics {
    pub plan: Plan,
    pub usage: Vec<UsageVerdict>,
}

#[derive(Debug, Serialize)]
pub struct FeatureDecision {
    pub feature: Feature,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanDecision {
    pub required_plan: Plan,
    pub allowed: bool,
}

#[derive(Debug, Serialize)]
pub struct TemplateDecision {
    pub template: TemplateStyle,
    pub allowed: bool,
}

fn parse<T>(raw: &str) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|error| AppError::BadRequest(error.to_string()))
}

pub async fn limits_summary(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<LimitsSummary>> {
    let principal = principal.ok_or(AppError::Unauthorized)?;
    let usage = evaluator.usage_summary(Some(&principal)).await;
    Ok(Json(LimitsSummary {
        principal_id: principal.id(),
        plan: principal.plan(),
        unrestricted: principal.is_unrestricted(),
        policy: evaluator.limits_for(&principal),
        usage,
    }))
}

pub async fn check_usage(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(payload): Json<UsageRequest>,
) -> AppResult<Json<UsageVerdict>> {
    let kind: ResourceKind = parse(&payload.resource_kind)?;
    Ok(Json(evaluator.check_usage(principal.as_ref(), kind).await))
}

pub async fn check_feature(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(feature): Path<String>,
) -> AppResult<Json<FeatureDecision>> {
    let feature: Feature = parse(&feature)?;
    Ok(Json(FeatureDecision {
        feature,
        allowed: evaluator.check_feature(principal.as_ref(), feature),
    }))
}

pub async fn check_plan(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(plan): Path<String>,
) -> Json<PlanDecision> {
    let required_plan = Plan::from_stored(Some(&plan));
    Json(PlanDecision {
        required_plan,
        allowed: evaluator.check_plan(principal.as_ref(), required_plan),
    })
}

pub async fn check_template(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(style): Path<String>,
) -> AppResult<Json<TemplateDecision>> {
    let template: TemplateStyle = parse(&style)?;
    Ok(Json(TemplateDecision {
        template,
        allowed: evaluator.check_template(principal.as_ref(), template),
    }))
}

fn require_requested_template(
    evaluator: &EntitlementEvaluator,
    principal: &Principal,
    template: Option<&str>,
) -> AppResult<()> {
    match template {
        Some(raw) => require_template(evaluator, Some(principal), parse(raw)?),
        None => Ok(()),
    }
}

async fn record_many(
    evaluator: &EntitlementEvaluator,
    principal: &Principal,
    kind: ResourceKind,
    count: u32,
) -> AppResult<()> {
    // Super admins are not metered.
    if principal.is_unrestricted() {
        return Ok(());
    }
    let now = Utc::now();
    for _ in 0..count {
        evaluator
            .usage_store()
            .record(principal.key(), kind, now)
            .await?;
    }
    Ok(())
}

/// Gate-then-record entry point for the generation workflow: the template
/// and usage gates run first, and one usage record is written only when
/// both pass.
pub async fn record_usage(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(payload): Json<GenerationRequest>,
) -> AppResult<(StatusCode, Json<UsageVerdict>)> {
    let kind: ResourceKind = parse(&payload.resource_kind)?;
    let principal = principal.ok_or(AppError::Unauthorized)?;
    require_requested_template(&evaluator, &principal, payload.template.as_deref())?;
    let verdict = require_usage(&evaluator, Some(&principal), kind).await?;
    record_many(&evaluator, &principal, kind, 1).await?;
    Ok((StatusCode::CREATED, Json(verdict)))
}

/// Batch generation: needs the bulk-operations feature, and the whole batch
/// must fit in what is left of the month's quota.
pub async fn record_bulk_usage(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(payload): Json<BulkGenerationRequest>,
) -> AppResult<(StatusCode, Json<BulkReceipt>)> {
    let kind: ResourceKind = parse(&payload.resource_kind)?;
    if payload.count == 0 {
        return Err(AppError::BadRequest("count must be at least 1".into()));
    }
    let principal = principal.ok_or(AppError::Unauthorized)?;
    require_feature(&evaluator, Some(&principal), Feature::BulkOperations)?;
    require_requested_template(&evaluator, &principal, payload.template.as_deref())?;
    let verdict = require_usage(&evaluator, Some(&principal), kind).await?;

    let count = payload.count;
    let remaining = match verdict.remaining {
        Some(remaining) if remaining < u64::from(count) => {
            return Err(AppError::QuotaExceeded(format!(
                "cannot create {count} {kind}s: {remaining} remaining this month"
            )));
        }
        Some(remaining) => Some(remaining - u64::from(count)),
        None => None,
    };
    record_many(&evaluator, &principal, kind, count).await?;
    tracing::info!(owner = %principal.key(), resource_kind = %kind, count, "bulk usage recorded");
    Ok((
        StatusCode::CREATED,
        Json(BulkReceipt {
            resource_kind: kind,
            created: count,
            remaining,
        }),
    ))
}

/// Per-kind usage for the current month, for Pro subscribers and above.
pub async fn usage_analytics(
    Extension(evaluator): Extension<EntitlementEvaluator>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> AppResult<Json<UsageAnalytics>> {
    let principal = principal.ok_or(AppError::Unauthorized)?;
    require_plan(&evaluator, Some(&principal), Plan::Pro)?;
    let usage = evaluator.usage_summary(Some(&principal)).await;
    Ok(Json(UsageAnalytics {
        plan: principal.plan(),
        usage,
    }))
}
