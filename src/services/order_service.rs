use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::orders::{DeliveryMethod, OrderItemRequest, OrderList, OrderWithItems, PlaceOrderRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, CartOwner},
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::{bonus_service, task_service},
    state::AppState,
};

/// A product row captured at checkout time. Orders keep these values
/// even when the live product is later renamed or repriced.
#[derive(Debug, Clone)]
pub struct SnapshotLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
    pub seller_id: Uuid,
}

pub fn compute_total(lines: &[SnapshotLine]) -> i64 {
    lines
        .iter()
        .map(|line| line.price * line.quantity as i64)
        .sum()
}

pub fn validate_order_request(payload: &PlaceOrderRequest) -> Result<(), AppError> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("order has no items".to_string()));
    }
    if payload.items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    if payload.used_bonus_points < 0 {
        return Err(AppError::BadRequest(
            "used_bonus_points must not be negative".to_string(),
        ));
    }
    if payload.delivery_method == DeliveryMethod::Delivery
        && payload
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .is_none()
    {
        return Err(AppError::BadRequest(
            "address is required for delivery".to_string(),
        ));
    }
    Ok(())
}

/// Collapse repeated product ids, summing quantities and keeping the
/// position of the first occurrence. Sums are widened to `i64` so
/// repeated lines near `i32::MAX` cannot wrap; the stock check later
/// bounds them back into `i32` range.
pub fn merge_items(items: &[OrderItemRequest]) -> Vec<(Uuid, i64)> {
    let mut merged: Vec<(Uuid, i64)> = Vec::new();
    for item in items {
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, qty)) => *qty += i64::from(item.quantity),
            None => merged.push((item.product_id, i64::from(item.quantity))),
        }
    }
    merged
}

#[derive(FromRow)]
struct LockedProductRow {
    name: String,
    price: i64,
    stock: i32,
    approved: bool,
    seller_id: Uuid,
}

/// Place an order from the submitted items, in one transaction: lock
/// product rows, decrement stock, recompute the total server-side,
/// redeem bonus points, snapshot line items, complete matching monthly
/// tasks and clear the purchased products from the caller's cart.
pub async fn place_order(
    state: &AppState,
    owner: &CartOwner,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    validate_order_request(&payload)?;

    if payload.used_bonus_points > 0 && owner.user_id.is_none() {
        return Err(AppError::BadRequest(
            "guests cannot redeem bonus points".to_string(),
        ));
    }

    let merged = merge_items(&payload.items);

    let mut txn = state.pool.begin().await?;

    let mut lines: Vec<SnapshotLine> = Vec::with_capacity(merged.len());
    for (product_id, quantity) in &merged {
        let row: Option<LockedProductRow> = sqlx::query_as(
            "SELECT name, price, stock, approved, seller_id FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *txn)
        .await?;

        let row = match row {
            Some(r) => r,
            None => {
                return Err(AppError::BadRequest(format!(
                    "product {product_id} not found"
                )));
            }
        };
        if !row.approved {
            return Err(AppError::BadRequest(format!(
                "product {} is not available",
                row.name
            )));
        }
        if i64::from(row.stock) < *quantity {
            return Err(AppError::OutOfStock(format!(
                "insufficient stock for {}",
                row.name
            )));
        }
        // Within stock, so the merged sum fits back into i32.
        let quantity = *quantity as i32;

        sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1")
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *txn)
            .await?;

        lines.push(SnapshotLine {
            product_id: *product_id,
            name: row.name,
            price: row.price,
            quantity,
            seller_id: row.seller_id,
        });
    }

    let total = compute_total(&lines);

    // The client may echo its expected total; it is never trusted.
    if let Some(client_total) = payload.total {
        if client_total != total {
            return Err(AppError::BadRequest(format!(
                "total mismatch: submitted {client_total}, computed {total}"
            )));
        }
    }

    if payload.used_bonus_points > 0 {
        if let Some(user_id) = owner.user_id {
            bonus_service::redeem(&mut txn, user_id, payload.used_bonus_points, total).await?;
        }
    }

    let address = payload
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (id, user_id, total, delivery_method, address, used_bonus_points)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.user_id)
    .bind(total)
    .bind(payload.delivery_method.as_str())
    .bind(address)
    .bind(payload.used_bonus_points)
    .fetch_one(&mut *txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in &lines {
        let item: OrderItem = sqlx::query_as(
            r#"
            INSERT INTO order_items (id, order_id, product_id, name, price, quantity, seller_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(line.product_id)
        .bind(&line.name)
        .bind(line.price)
        .bind(line.quantity)
        .bind(line.seller_id)
        .fetch_one(&mut *txn)
        .await?;
        order_items.push(item);
    }

    if let Some(user_id) = owner.user_id {
        for line in &lines {
            task_service::complete_for_purchase(&mut txn, user_id, line.product_id, line.quantity)
                .await?;
        }
    }

    let purchased: Vec<Uuid> = lines.iter().map(|line| line.product_id).collect();
    sqlx::query("DELETE FROM cart_items WHERE owner_id = $1 AND product_id = ANY($2)")
        .bind(owner.owner_id)
        .bind(&purchased)
        .execute(&mut *txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        owner.user_id,
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        OrderWithItems {
            order,
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = pagination.normalize();
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order =
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 AND id = $2")
            .bind(user.user_id)
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at",
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}
