use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::plans::Plan;

/// Generated document kinds that count against a monthly quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Invoice,
    Resume,
    Certificate,
    Qrcode,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Invoice,
        ResourceKind::Resume,
        ResourceKind::Certificate,
        ResourceKind::Qrcode,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Invoice => "invoice",
            ResourceKind::Resume => "resume",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Qrcode => "qrcode",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BulkOperations,
    PremiumTemplates,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::BulkOperations => "bulk_operations",
            Feature::PremiumTemplates => "premium_templates",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStyle {
    Basic,
    Professional,
    Modern,
    Executive,
}

impl TemplateStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateStyle::Basic => "basic",
            TemplateStyle::Professional => "professional",
            TemplateStyle::Modern => "modern",
            TemplateStyle::Executive => "executive",
        }
    }
}

impl fmt::Display for TemplateStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejection for names that do not map onto a known kind, feature or
/// template style.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {category} `{value}`")]
pub struct UnknownName {
    pub category: &'static str,
    pub value: String,
}

fn unknown(category: &'static str, value: &str) -> UnknownName {
    UnknownName {
        category,
        value: value.to_string(),
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| unknown("resource kind", value))
    }
}

impl FromStr for Feature {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bulk_operations" => Ok(Feature::BulkOperations),
            "premium_templates" => Ok(Feature::PremiumTemplates),
            _ => Err(unknown("feature", value)),
        }
    }
}

impl FromStr for TemplateStyle {
    type Err = UnknownName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "basic" => Ok(TemplateStyle::Basic),
            "professional" => Ok(TemplateStyle::Professional),
            "modern" => Ok(TemplateStyle::Modern),
            "executive" => Ok(TemplateStyle::Executive),
            _ => Err(unknown("template style", value)),
        }
    }
}

/// Monthly allowance for one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quota {
    Limited(u32),
    Unlimited,
}

impl Quota {
    pub fn limit(self) -> Option<u32> {
        match self {
            Quota::Limited(limit) => Some(limit),
            Quota::Unlimited => None,
        }
    }
}

// Serialized as the limit, or `null` for unlimited.
impl Serialize for Quota {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.limit().serialize(serializer)
    }
}

// key: entitlement-policy -> quotas,flags,templates per plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitlementPolicy {
    pub plan: Plan,
    pub invoices_per_month: Quota,
    pub resumes_per_month: Quota,
    pub certificates_per_month: Quota,
    pub qrcodes_per_month: Quota,
    pub bulk_operations: bool,
    pub premium_templates: bool,
    pub templates: &'static [TemplateStyle],
}

impl EntitlementPolicy {
    pub fn quota_for(&self, kind: ResourceKind) -> Quota {
        match kind {
            ResourceKind::Invoice => self.invoices_per_month,
            ResourceKind::Resume => self.resumes_per_month,
            ResourceKind::Certificate => self.certificates_per_month,
            ResourceKind::Qrcode => self.qrcodes_per_month,
        }
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::BulkOperations => self.bulk_operations,
            Feature::PremiumTemplates => self.premium_templates,
        }
    }

    pub fn allows_template(&self, style: TemplateStyle) -> bool {
        self.templates.contains(&style)
    }
}

static FREE: EntitlementPolicy = EntitlementPolicy {
    plan: Plan::Free,
    invoices_per_month: Quota::Limited(5),
    resumes_per_month: Quota::Limited(3),
    certificates_per_month: Quota::Limited(2),
    qrcodes_per_month: Quota::Limited(10),
    bulk_operations: false,
    premium_templates: false,
    templates: &[TemplateStyle::Basic],
};

static BASIC: EntitlementPolicy = EntitlementPolicy {
    plan: Plan::Basic,
    invoices_per_month: Quota::Limited(50),
    resumes_per_month: Quota::Limited(25),
    certificates_per_month: Quota::Limited(20),
    qrcodes_per_month: Quota::Limited(100),
    bulk_operations: false,
    premium_templates: false,
    templates: &[TemplateStyle::Basic, TemplateStyle::Professional],
};

static PRO: EntitlementPolicy = EntitlementPolicy {
    plan: Plan::Pro,
    invoices_per_month: Quota::Limited(200),
    resumes_per_month: Quota::Limited(100),
    certificates_per_month: Quota::Limited(100),
    qrcodes_per_month: Quota::Limited(500),
    bulk_operations: true,
    premium_templates: true,
    templates: &[
        TemplateStyle::Basic,
        TemplateStyle::Professional,
        TemplateStyle::Modern,
    ],
};

static PREMIUM: EntitlementPolicy = EntitlementPolicy {
    plan: Plan::Premium,
    invoices_per_month: Quota::Unlimited,
    resumes_per_month: Quota::Unlimited,
    certificates_per_month: Quota::Unlimited,
    qrcodes_per_month: Quota::Unlimited,
    bulk_operations: true,
    premium_templates: true,
    templates: &[
        TemplateStyle::Basic,
        TemplateStyle::Professional,
        TemplateStyle::Modern,
        TemplateStyle::Executive,
    ],
};

pub fn policy_for(plan: Plan) -> &'static EntitlementPolicy {
    match plan {
        Plan::Free => &FREE,
        Plan::Basic => &BASIC,
        Plan::Pro => &PRO,
        Plan::Premium => &PREMIUM,
    }
}
