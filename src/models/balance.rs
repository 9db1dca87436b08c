#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A principal's ledger balance for one asset. `available` excludes
/// anything held by a live reservation; `frozen` is the sum of those
/// reservations (4.G).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Balance {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub asset: String,
    pub available: Decimal,
    pub frozen: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub asset: String,
    pub available: Decimal,
    pub frozen: Decimal,
    pub total: Decimal,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            asset: balance.asset,
            available: balance.available,
            frozen: balance.frozen,
            total: balance.available + balance.frozen,
        }
    }
}

/// A withdrawal or deposit reported by the external wallet oracle. The
/// oracle owns signing and confirmation; this row is a read-only mirror.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub asset: String,
    pub amount: Decimal,
    pub direction: String,
    pub tx_ref: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
