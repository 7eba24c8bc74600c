use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::bonus::BonusBalance,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
};

/// Points redeemable against an order: never more than 90% of the total
/// (rounded down) and never more than the current balance.
pub fn max_redeemable(order_total: i64, balance: i64) -> i64 {
    (order_total * 9 / 10).min(balance).max(0)
}

pub async fn get_balance(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<BonusBalance>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT bonus_points FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;

    let balance = match row {
        Some((balance,)) => balance,
        None => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::success(
        "OK",
        BonusBalance { balance },
        Some(Meta::empty()),
    ))
}

/// Spend `amount` points against an order of `order_total`. Runs inside
/// the checkout transaction; the user row is locked so concurrent
/// checkouts cannot double-spend.
pub async fn redeem(
    txn: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i64,
    order_total: i64,
) -> AppResult<()> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT bonus_points FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **txn)
            .await?;

    let balance = match row {
        Some((balance,)) => balance,
        None => return Err(AppError::NotFound),
    };

    if amount > balance {
        return Err(AppError::InsufficientBalance);
    }
    if amount > max_redeemable(order_total, balance) {
        return Err(AppError::ExceedsCap);
    }

    sqlx::query("UPDATE users SET bonus_points = bonus_points - $2 WHERE id = $1")
        .bind(user_id)
        .bind(amount)
        .execute(&mut **txn)
        .await?;

    Ok(())
}

/// Add points to a user's balance, e.g. when a monthly task completes.
pub async fn credit(
    txn: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    points: i64,
) -> AppResult<()> {
    sqlx::query("UPDATE users SET bonus_points = bonus_points + $2 WHERE id = $1")
        .bind(user_id)
        .bind(points)
        .execute(&mut **txn)
        .await?;

    Ok(())
}
