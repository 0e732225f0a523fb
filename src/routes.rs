use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::entitlements::{entitlement_routes, EntitlementEvaluator, UsageStore};
use crate::principals::PrincipalStore;
use crate::subscriptions::{self, SubscriptionService};

async fn root() -> &'static str {
    "Microsaas API"
}

pub fn api_routes() -> Router {
    Router::new()
        .route("/", get(root))
        .merge(entitlement_routes())
        .merge(subscriptions::routes())
}

/// Routes with the shared services attached, ready to serve.
pub fn app(principals: Arc<dyn PrincipalStore>, usage: Arc<dyn UsageStore>) -> Router {
    let evaluator = EntitlementEvaluator::new(usage);
    let subscriptions = SubscriptionService::new(principals.clone());
    api_routes()
        .layer(Extension(evaluator))
        .layer(Extension(subscriptions))
        .layer(Extension(principals))
}
