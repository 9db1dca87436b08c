//! Wallet/Balance Gate (component G). Reserves funds at order intake,
//! decrements the reservation as fills consume it, and releases whatever
//! is left on cancel or expiry. Blockchain confirmations and withdrawal tx
//! lifecycle live behind a separate oracle this gate never touches.

use crate::db::Database;
use crate::error::AppError;
use crate::models::balance::{Balance, WalletTransaction};
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct WalletGate {
    db: Database,
}

impl WalletGate {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Move `amount` of `asset` from available into frozen. Fails with
    /// `InsufficientBalance` rather than going negative.
    pub async fn reserve(&self, principal: Uuid, asset: &str, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        let mut tx = self.db.pool.begin().await?;

        let row: Option<(Decimal,)> = sqlx::query_as(
            "SELECT available FROM balances WHERE principal_id = $1 AND asset = $2 FOR UPDATE",
        )
        .bind(principal)
        .bind(asset)
        .fetch_optional(&mut *tx)
        .await?;

        let available = row.map(|r| r.0).unwrap_or_default();
        if available < amount {
            return Err(AppError::InsufficientBalance);
        }

        sqlx::query(
            r#"
            UPDATE balances SET available = available - $1, frozen = frozen + $1, updated_at = now()
            WHERE principal_id = $2 AND asset = $3
            "#,
        )
        .bind(amount)
        .bind(principal)
        .bind(asset)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Consume `amount` of `asset` from an existing reservation — the
    /// asset given up as a fill executes. Does not touch `available`.
    pub async fn settle(&self, principal: Uuid, asset: &str, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        sqlx::query(
            "UPDATE balances SET frozen = frozen - $1, updated_at = now() WHERE principal_id = $2 AND asset = $3",
        )
        .bind(amount)
        .bind(principal)
        .bind(asset)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    /// Credit `amount` of `asset` straight to available — the asset
    /// received from a fill's other leg.
    pub async fn credit(&self, principal: Uuid, asset: &str, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO balances (id, principal_id, asset, available, frozen, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, now(), now())
            ON CONFLICT (principal_id, asset) DO UPDATE
                SET available = balances.available + $4, updated_at = now()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(principal)
        .bind(asset)
        .bind(amount)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    /// Return the remainder of a reservation to available — cancel, expiry,
    /// or the excess held against a market order's slippage allowance.
    pub async fn release(&self, principal: Uuid, asset: &str, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE balances SET available = available + $1, frozen = frozen - $1, updated_at = now()
            WHERE principal_id = $2 AND asset = $3
            "#,
        )
        .bind(amount)
        .bind(principal)
        .bind(asset)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    pub async fn balances_for(&self, principal: Uuid) -> Result<Vec<Balance>, AppError> {
        let balances = sqlx::query_as::<_, Balance>(
            "SELECT * FROM balances WHERE principal_id = $1 ORDER BY asset",
        )
        .bind(principal)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(balances)
    }

    pub async fn transactions_for(&self, principal: Uuid, limit: i64) -> Result<Vec<WalletTransaction>, AppError> {
        let txs = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE principal_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(principal)
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(txs)
    }
}
