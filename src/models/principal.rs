#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The authenticated actor behind every order, trade, and subscription.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub verified: bool,
    pub daily_trade_cap: Decimal,
    pub daily_withdrawal_cap: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePrincipal {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrincipalProfile {
    pub id: Uuid,
    pub username: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Principal> for PrincipalProfile {
    fn from(p: Principal) -> Self {
        Self {
            id: p.id,
            username: p.username,
            verified: p.verified,
            created_at: p.created_at,
        }
    }
}

/// A wallet address a principal has bound through the external wallet
/// oracle. Binding and signature verification live outside this core; this
/// row only records that the oracle reported ownership.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BoundWallet {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub address: String,
    pub chain: String,
    pub verified_at: DateTime<Utc>,
}
