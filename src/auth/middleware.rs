use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::JwtManager;
use crate::AppState;

#[derive(Clone, Copy)]
pub struct AuthUser {
    pub principal_id: Uuid,
}

/// Nil UUID used as the dev-mode identity when auth is disabled and no
/// `X-Test-Principal` header is supplied.
const DEV_PRINCIPAL: Uuid = Uuid::nil();

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if state.config.is_auth_disabled() {
        let principal_id = request
            .headers()
            .get("X-Test-Principal")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or(DEV_PRINCIPAL);

        tracing::debug!("auth disabled - using principal {}", principal_id);
        request.extensions_mut().insert(AuthUser { principal_id });
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return Err(StatusCode::UNAUTHORIZED),
    };

    let jwt_manager = JwtManager::new(&state.config.jwt_secret, state.config.jwt_expiry_seconds);
    let claims = jwt_manager
        .verify_token(token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let principal_id = Uuid::parse_str(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(AuthUser { principal_id });

    Ok(next.run(request).await)
}
