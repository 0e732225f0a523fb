use std::sync::Arc;

use axum::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use crate::entitlements::Principal;
use crate::error::AppError;
use crate::principals::PrincipalStore;

#[derive(Deserialize)]
struct Claims {
    sub: i32,
    role: String,
    #[allow(dead_code)]
    exp: usize,
}

pub struct AuthUser {
    pub user_id: i32,
    pub role: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token_opt = if let Some(cookie_header) = parts.headers.get(axum::http::header::COOKIE) {
            let cookies = cookie_header.to_str().unwrap_or("");
            cookies.split(';').find_map(|c| {
                let c = c.trim();
                c.strip_prefix("auth_token=").map(|s| s.to_string())
            })
        } else if let Some(authz) = parts.headers.get(axum::http::header::AUTHORIZATION) {
            authz
                .to_str()
                .ok()
                .and_then(|s| s.strip_prefix("Bearer ").map(|s| s.to_string()))
        } else {
            None
        };
        let token = token_opt.ok_or((StatusCode::UNAUTHORIZED, "Missing token".into()))?;
        let secret = crate::config::JWT_SECRET.as_str();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token".into()))?;
        Ok(AuthUser {
            user_id: decoded.claims.sub,
            role: decoded.claims.role,
        })
    }
}

/// The caller resolved against the principal store, or `None` when the
/// request carries no valid token or names an unknown account. Entitlement
/// checks treat `None` as deny-by-default.
pub struct CurrentPrincipal(pub Option<Principal>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(user) = AuthUser::from_request_parts(parts, state).await else {
            return Ok(CurrentPrincipal(None));
        };
        let store = parts
            .extensions
            .get::<Arc<dyn PrincipalStore>>()
            .cloned()
            .ok_or_else(|| AppError::Message("principal store not configured".into()))?;
        let principal = store.load(user.user_id, &user.role).await?;
        if principal.is_none() {
            tracing::debug!(user_id = user.user_id, role = %user.role, "token names unknown principal");
        }
        Ok(CurrentPrincipal(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principals::MemoryPrincipalStore;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: i32, role: &str) -> String {
        let claims = serde_json::json!({"sub": sub, "role": role, "exp": 9999999999u64});
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn token_parsed_from_header() {
        std::env::set_var("JWT_SECRET", "secret");
        let request = Request::builder()
            .header("Authorization", format!("Bearer {}", token(7, "user")))
            .body(axum::body::Body::empty())
            .unwrap();
        let mut parts = request.into_parts().0;
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id, 7);
        assert_eq!(user.role, "user");
    }

    #[tokio::test]
    async fn invalid_token_rejected() {
        std::env::set_var("JWT_SECRET", "secret");
        let request = Request::builder()
            .header("Authorization", "Bearer invalid")
            .body(axum::body::Body::empty())
            .unwrap();
        let mut parts = request.into_parts().0;
        let res = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn admin_token_resolves_admin_principal() {
        std::env::set_var("JWT_SECRET", "secret");
        let store = MemoryPrincipalStore::new();
        store.insert(Principal::admin(3, None, true));
        let store: Arc<dyn PrincipalStore> = Arc::new(store);

        let mut request = Request::builder()
            .header("Cookie", format!("theme=dark; auth_token={}", token(3, "admin")))
            .body(axum::body::Body::empty())
            .unwrap();
        request.extensions_mut().insert(store);
        let mut parts = request.into_parts().0;
        let CurrentPrincipal(principal) = CurrentPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(principal.unwrap().is_unrestricted());
    }

    #[tokio::test]
    async fn missing_token_yields_no_principal() {
        let request = Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        let mut parts = request.into_parts().0;
        let CurrentPrincipal(principal) = CurrentPrincipal::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert!(principal.is_none());
    }
}
