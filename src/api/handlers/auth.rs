//! Principal registration and session issuance. Credential verification is
//! out of scope (1.'s non-goals) — a principal is identified by username
//! alone, and `/auth/login` simply re-issues a token for an existing one.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::JwtManager;
use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::principal::{Principal, PrincipalProfile};
use crate::utils::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: i64,
    pub principal: PrincipalProfile,
}

fn mint(state: &AppState, principal: &Principal) -> Result<SessionResponse, AppError> {
    let jwt = JwtManager::new(&state.config.jwt_secret, state.config.jwt_expiry_seconds);
    let token = jwt
        .generate_token(&principal.id.to_string())
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let expires_at = chrono::Utc::now().timestamp() + state.config.jwt_expiry_seconds as i64;
    Ok(SessionResponse {
        token,
        expires_at,
        principal: principal.clone().into(),
    })
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let username = req.username.trim();
    if username.is_empty() || username.len() > 64 {
        return Err(AppError::Validation("username must be 1-64 characters".into()));
    }

    let existing: Option<Principal> =
        sqlx::query_as("SELECT * FROM principals WHERE username = $1")
            .bind(username)
            .fetch_optional(&state.db.pool)
            .await?;
    if existing.is_some() {
        return Err(AppError::Validation("username already registered".into()));
    }

    let now = chrono::Utc::now();
    let principal = Principal {
        id: Uuid::new_v4(),
        username: username.to_string(),
        verified: false,
        daily_trade_cap: state.config.default_daily_trade_cap(),
        daily_withdrawal_cap: state.config.default_daily_trade_cap(),
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        r#"
        INSERT INTO principals (id, username, verified, daily_trade_cap, daily_withdrawal_cap, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(principal.id)
    .bind(&principal.username)
    .bind(principal.verified)
    .bind(principal.daily_trade_cap)
    .bind(principal.daily_withdrawal_cap)
    .bind(principal.created_at)
    .bind(principal.updated_at)
    .execute(&state.db.pool)
    .await?;

    Ok(Json(ApiResponse::success(mint(&state, &principal)?)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let principal: Principal = sqlx::query_as("SELECT * FROM principals WHERE username = $1")
        .bind(req.username.trim())
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(ApiResponse::success(mint(&state, &principal)?)))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<PrincipalProfile>>, AppError> {
    let principal: Principal = sqlx::query_as("SELECT * FROM principals WHERE id = $1")
        .bind(user.principal_id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::success(principal.into())))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<SessionResponse>>, AppError> {
    let principal: Principal = sqlx::query_as("SELECT * FROM principals WHERE id = $1")
        .bind(user.principal_id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::success(mint(&state, &principal)?)))
}
