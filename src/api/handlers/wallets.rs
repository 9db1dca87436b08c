//! Wallet binding, balances, and withdrawal surface (4.G, 4.G.1). Binding,
//! message signing, and withdrawal initiation are thin pass-throughs to the
//! external wallet oracle (1.'s non-goals): this core only records what the
//! oracle reports and asserts a bound address exists before touching
//! anything, never deriving or verifying a signature itself.

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::balance::{BalanceResponse, WalletTransaction};
use crate::models::principal::BoundWallet;
use crate::utils::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SignMessageResponse {
    pub message: String,
    pub issued_at: i64,
}

/// Hands back the nonce message a client signs with its external wallet;
/// this core never inspects the signature it comes back with.
pub async fn sign_message(
    Extension(user): Extension<AuthUser>,
) -> Json<ApiResponse<SignMessageResponse>> {
    let issued_at = Utc::now().timestamp();
    let message = format!("bind-wallet:{}:{}", user.principal_id, issued_at);
    Json(ApiResponse::success(SignMessageResponse { message, issued_at }))
}

#[derive(Debug, Deserialize)]
pub struct BindRequest {
    pub address: String,
    pub chain: String,
}

pub async fn bind(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<BindRequest>,
) -> Result<Json<ApiResponse<BoundWallet>>, AppError> {
    let wallet = BoundWallet {
        id: Uuid::new_v4(),
        principal_id: user.principal_id,
        address: req.address.to_lowercase(),
        chain: req.chain,
        verified_at: Utc::now(),
    };
    sqlx::query(
        r#"
        INSERT INTO bound_wallets (id, principal_id, address, chain, verified_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (principal_id, address) DO UPDATE SET verified_at = $5
        "#,
    )
    .bind(wallet.id)
    .bind(wallet.principal_id)
    .bind(&wallet.address)
    .bind(&wallet.chain)
    .bind(wallet.verified_at)
    .execute(&state.db.pool)
    .await?;
    Ok(Json(ApiResponse::success(wallet)))
}

pub async fn list_wallets(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<BoundWallet>>>, AppError> {
    let wallets: Vec<BoundWallet> = sqlx::query_as(
        "SELECT * FROM bound_wallets WHERE principal_id = $1 ORDER BY verified_at DESC",
    )
    .bind(user.principal_id)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(Json(ApiResponse::success(wallets)))
}

pub async fn balances(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<BalanceResponse>>>, AppError> {
    let balances = state.wallet.balances_for(user.principal_id).await?;
    Ok(Json(ApiResponse::success(balances.into_iter().map(Into::into).collect())))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub asset: String,
    pub amount: Decimal,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct WithdrawAccepted {
    pub tx_ref: String,
}

/// Asserts a bound address exists, records the withdrawal intent, and hands
/// off — this core never estimates gas or tracks confirmation state itself.
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<ApiResponse<WithdrawAccepted>>, AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be positive".into()));
    }
    let bound: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM bound_wallets WHERE principal_id = $1 AND address = $2",
    )
    .bind(user.principal_id)
    .bind(req.address.to_lowercase())
    .fetch_optional(&state.db.pool)
    .await?;
    if bound.is_none() {
        return Err(AppError::Validation("address is not bound to this principal".into()));
    }

    let tx_ref = format!("wd-{}", Uuid::new_v4());
    let tx = WalletTransaction {
        id: Uuid::new_v4(),
        principal_id: user.principal_id,
        asset: req.asset.to_uppercase(),
        amount: req.amount,
        direction: "withdrawal".to_string(),
        tx_ref: tx_ref.clone(),
        status: "pending".to_string(),
        created_at: Utc::now(),
    };
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions (id, principal_id, asset, amount, direction, tx_ref, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(tx.id)
    .bind(tx.principal_id)
    .bind(&tx.asset)
    .bind(tx.amount)
    .bind(&tx.direction)
    .bind(&tx.tx_ref)
    .bind(&tx.status)
    .bind(tx.created_at)
    .execute(&state.db.pool)
    .await?;

    Ok(Json(ApiResponse::success(WithdrawAccepted { tx_ref })))
}

pub async fn transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<WalletTransaction>>>, AppError> {
    let txs = state.wallet.transactions_for(user.principal_id, 100).await?;
    Ok(Json(ApiResponse::success(txs)))
}
