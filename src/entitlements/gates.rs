//! Gates called by request handlers before doing gated work. Each gate
//! reads the principal, asks the evaluator and turns a denial into an
//! [`AppError`] that carries the reason shown to the caller.

use crate::error::{AppError, AppResult};

use super::evaluator::{EntitlementEvaluator, UsageVerdict, AUTHENTICATION_REQUIRED};
use super::plans::Plan;
use super::principal::Principal;
use super::table::{Feature, ResourceKind, TemplateStyle};

pub async fn require_usage(
    evaluator: &EntitlementEvaluator,
    principal: Option<&Principal>,
    kind: ResourceKind,
) -> AppResult<UsageVerdict> {
    let verdict = evaluator.check_usage(principal, kind).await;
    if verdict.allowed {
        return Ok(verdict);
    }
    if verdict.message == AUTHENTICATION_REQUIRED {
        return Err(AppError::Unauthorized);
    }
    tracing::warn!(
        owner = ?principal.map(Principal::key),
        resource_kind = %kind,
        reason = %verdict.message,
        "usage gate denied"
    );
    Err(AppError::QuotaExceeded(verdict.message))
}

pub fn require_feature(
    evaluator: &EntitlementEvaluator,
    principal: Option<&Principal>,
    feature: Feature,
) -> AppResult<()> {
    let principal = principal.ok_or(AppError::Unauthorized)?;
    if evaluator.check_feature(Some(principal), feature) {
        Ok(())
    } else {
        tracing::warn!(owner = %principal.key(), %feature, "feature gate denied");
        Err(AppError::FeatureUnavailable(feature))
    }
}

pub fn require_plan(
    evaluator: &EntitlementEvaluator,
    principal: Option<&Principal>,
    required: Plan,
) -> AppResult<()> {
    let principal = principal.ok_or(AppError::Unauthorized)?;
    if evaluator.check_plan(Some(principal), required) {
        Ok(())
    } else {
        tracing::warn!(
            owner = %principal.key(),
            plan = %principal.plan(),
            %required,
            "plan gate denied"
        );
        Err(AppError::PlanRequired(required))
    }
}

pub fn require_template(
    evaluator: &EntitlementEvaluator,
    principal: Option<&Principal>,
    style: TemplateStyle,
) -> AppResult<()> {
    let principal = principal.ok_or(AppError::Unauthorized)?;
    if evaluator.check_template(Some(principal), style) {
        Ok(())
    } else {
        Err(AppError::TemplateUnavailable(style))
    }
}

pub fn require_super_admin(principal: Option<&Principal>) -> AppResult<()> {
    match principal {
        None => Err(AppError::Unauthorized),
        Some(principal) if principal.is_unrestricted() => Ok(()),
        Some(_) => Err(AppError::Forbidden),
    }
}
