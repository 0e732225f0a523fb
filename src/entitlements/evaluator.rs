use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::plans::Plan;
use super::principal::Principal;
use super::table::{policy_for, EntitlementPolicy, Feature, Quota, ResourceKind, TemplateStyle};
use super::usage::{UsageStore, UsageWindow};

pub const AUTHENTICATION_REQUIRED: &str = "authentication required";
pub const UNLIMITED: &str = "unlimited";
pub const USAGE_UNVERIFIED: &str = "usage could not be verified; try again later";

// key: entitlement-verdict -> allow/deny plus display message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageVerdict {
    pub allowed: bool,
    pub resource_kind: ResourceKind,
    pub message: String,
    pub limit: Option<u32>,
    pub used: Option<u64>,
    pub remaining: Option<u64>,
}

impl UsageVerdict {
    fn unlimited(kind: ResourceKind) -> Self {
        Self {
            allowed: true,
            resource_kind: kind,
            message: UNLIMITED.to_string(),
            limit: None,
            used: None,
            remaining: None,
        }
    }

    fn denied(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            resource_kind: kind,
            message: message.into(),
            limit: None,
            used: None,
            remaining: None,
        }
    }
}

// key: entitlement-evaluator -> usage,feature,plan,template checks
#[derive(Clone)]
pub struct EntitlementEvaluator {
    usage: Arc<dyn UsageStore>,
}

impl EntitlementEvaluator {
    pub fn new(usage: Arc<dyn UsageStore>) -> Self {
        Self { usage }
    }

    pub fn usage_store(&self) -> &Arc<dyn UsageStore> {
        &self.usage
    }

    pub async fn check_usage(
        &self,
        principal: Option<&Principal>,
        kind: ResourceKind,
    ) -> UsageVerdict {
        self.check_usage_at(principal, kind, Utc::now()).await
    }

    pub async fn check_usage_at(
        &self,
        principal: Option<&Principal>,
        kind: ResourceKind,
        now: DateTime<Utc>,
    ) -> UsageVerdict {
        let Some(principal) = principal else {
            return UsageVerdict::denied(kind, AUTHENTICATION_REQUIRED);
        };
        if principal.is_unrestricted() {
            return UsageVerdict::unlimited(kind);
        }

        let Quota::Limited(limit) = policy_for(principal.plan()).quota_for(kind) else {
            return UsageVerdict::unlimited(kind);
        };

        let window = UsageWindow::current_month(now);
        let used = match self
            .usage
            .count_since(principal.key(), kind, window.start)
            .await
        {
            Ok(used) => used,
            Err(error) => {
                tracing::error!(
                    %error,
                    owner = %principal.key(),
                    resource_kind = %kind,
                    "usage count failed; denying"
                );
                return UsageVerdict::denied(kind, USAGE_UNVERIFIED);
            }
        };

        let limit_wide = u64::from(limit);
        let verdict = if used >= limit_wide {
            UsageVerdict {
                allowed: false,
                resource_kind: kind,
                message: format!("monthly limit of {limit} {kind}s reached; upgrade required"),
                limit: Some(limit),
                used: Some(used),
                remaining: Some(0),
            }
        } else {
            let remaining = limit_wide - used;
            UsageVerdict {
                allowed: true,
                resource_kind: kind,
                message: format!("{remaining} {kind}s remaining this month"),
                limit: Some(limit),
                used: Some(used),
                remaining: Some(remaining),
            }
        };
        tracing::debug!(
            owner = %principal.key(),
            plan = %principal.plan(),
            resource_kind = %kind,
            used,
            limit,
            allowed = verdict.allowed,
            "usage checked"
        );
        verdict
    }

    pub fn check_feature(&self, principal: Option<&Principal>, feature: Feature) -> bool {
        match principal {
            None => false,
            Some(principal) if principal.is_unrestricted() => true,
            Some(principal) => policy_for(principal.plan()).has_feature(feature),
        }
    }

    pub fn check_plan(&self, principal: Option<&Principal>, required: Plan) -> bool {
        match principal {
            None => false,
            Some(principal) if principal.is_unrestricted() => true,
            Some(principal) => principal.plan().meets(required),
        }
    }

    pub fn check_template(&self, principal: Option<&Principal>, style: TemplateStyle) -> bool {
        match principal {
            None => false,
            Some(principal) if principal.is_unrestricted() => true,
            Some(principal) => policy_for(principal.plan()).allows_template(style),
        }
    }

    /// Effective policy for display; super admins see the premium table.
    pub fn limits_for(&self, principal: &Principal) -> &'static EntitlementPolicy {
        if principal.is_unrestricted() {
            policy_for(Plan::Premium)
        } else {
            policy_for(principal.plan())
        }
    }

    pub async fn usage_summary(&self, principal: Option<&Principal>) -> Vec<UsageVerdict> {
        let now = Utc::now();
        let mut summary = Vec::with_capacity(ResourceKind::ALL.len());
        for kind in ResourceKind::ALL {
            summary.push(self.check_usage_at(principal, kind, now).await);
        }
        summary
    }
}
