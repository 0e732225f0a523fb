pub mod api;
pub mod evaluator;
pub mod gates;
pub mod plans;
pub mod principal;
pub mod table;
pub mod usage;

pub use api::routes as entitlement_routes;
pub use evaluator::{EntitlementEvaluator, UsageVerdict};
pub use gates::{
    require_feature, require_plan, require_super_admin, require_template, require_usage,
};
pub use plans::{meets, Plan, UnknownPlan};
pub use principal::{Principal, PrincipalKey};
pub use table::{
    policy_for, EntitlementPolicy, Feature, Quota, ResourceKind, TemplateStyle, UnknownName,
};
pub use usage::{MemoryUsageStore, PgUsageStore, UsageStore, UsageStoreError, UsageWindow};
