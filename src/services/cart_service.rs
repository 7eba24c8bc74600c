use chrono::DateTime;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, SetQuantityRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, CartOwner},
    models::{CartItem, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    quantity: i32,
    product_id: Uuid,
    seller_id: Uuid,
    category_id: Option<Uuid>,
    subcategory_id: Option<Uuid>,
    name: String,
    description: Option<String>,
    price: i64,
    stock: i32,
    approved: bool,
    created_at: DateTime<chrono::Utc>,
}

#[derive(FromRow)]
struct ProductStockRow {
    stock: i32,
    approved: bool,
}

pub async fn list_cart(
    pool: &DbPool,
    owner: &CartOwner,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity,
               p.id AS product_id, p.seller_id, p.category_id, p.subcategory_id,
               p.name, p.description, p.price, p.stock, p.approved, p.created_at
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.owner_id = $1
        ORDER BY ci.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(owner.owner_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE owner_id = $1")
        .bind(owner.owner_id)
        .fetch_one(pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|row| CartItemDto {
            id: row.cart_id,
            product: Product {
                id: row.product_id,
                seller_id: row.seller_id,
                category_id: row.category_id,
                subcategory_id: row.subcategory_id,
                name: row.name,
                description: row.description,
                price: row.price,
                stock: row.stock,
                approved: row.approved,
                created_at: row.created_at,
            },
            quantity: row.quantity,
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

/// Add to the cart. If a row already exists for this product the
/// quantities are summed and the sum is validated against live stock;
/// an add that would exceed stock is rejected whole, never clamped.
pub async fn add_to_cart(
    pool: &DbPool,
    owner: &CartOwner,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<ProductStockRow> =
        sqlx::query_as("SELECT stock, approved FROM products WHERE id = $1")
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };
    if !product.approved {
        return Err(AppError::BadRequest("product is not available".to_string()));
    }

    let existing: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE owner_id = $1 AND product_id = $2")
            .bind(owner.owner_id)
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    let requested = existing.map(|(q,)| q).unwrap_or(0) + payload.quantity;
    if requested > product.stock {
        return Err(AppError::OutOfStock(format!(
            "requested {} exceeds stock {}",
            requested, product.stock
        )));
    }

    let cart_item: CartItem = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, owner_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (owner_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner.owner_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        owner.user_id,
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

/// Replace the stored quantity, with the same stock bound as an add.
pub async fn set_quantity(
    pool: &DbPool,
    owner: &CartOwner,
    product_id: Uuid,
    payload: SetQuantityRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<ProductStockRow> =
        sqlx::query_as("SELECT stock, approved FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };

    if payload.quantity > product.stock {
        return Err(AppError::OutOfStock(format!(
            "requested {} exceeds stock {}",
            payload.quantity, product.stock
        )));
    }

    let cart_item: Option<CartItem> = sqlx::query_as(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE owner_id = $1 AND product_id = $2
        RETURNING *
        "#,
    )
    .bind(owner.owner_id)
    .bind(product_id)
    .bind(payload.quantity)
    .fetch_optional(pool)
    .await?;

    let cart_item = match cart_item {
        Some(item) => item,
        None => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::success("OK", cart_item, None))
}

/// Idempotent: removing a product that is not in the cart still succeeds.
pub async fn remove_from_cart(
    pool: &DbPool,
    owner: &CartOwner,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND owner_id = $2")
        .bind(product_id)
        .bind(owner.owner_id)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        owner.user_id,
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<serde_json::Value>> {
    sqlx::query("DELETE FROM cart_items WHERE owner_id = $1")
        .bind(user.user_id)
        .execute(pool)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
