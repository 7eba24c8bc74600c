use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::reviews::{SubmitReviewRequest, UpdateReviewRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, Review},
    response::{ApiResponse, Meta},
};

/// A user may review a product only against an order they placed that
/// contains it in its snapshot, and only while the product is not yet
/// in the order's reviewed set.
pub fn can_review(
    order_user: Option<Uuid>,
    user_id: Uuid,
    snapshot: &[Uuid],
    reviewed: &[Uuid],
    product_id: Uuid,
) -> bool {
    order_user == Some(user_id)
        && snapshot.contains(&product_id)
        && !reviewed.contains(&product_id)
}

/// Concurrent submissions can both pass the duplicate pre-check; the
/// unique (user_id, product_id) index then rejects the loser, which is
/// still a conflict, not a server error.
pub fn duplicate_to_conflict(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("product already reviewed".to_string())
        }
        _ => err.into(),
    }
}

pub async fn submit_review(
    pool: &DbPool,
    user: &AuthUser,
    order_id: Uuid,
    product_id: Uuid,
    payload: SubmitReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    // One review per (user, product), no matter how many orders contain it.
    let duplicate: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM reviews WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    if duplicate.is_some() {
        return Err(AppError::Conflict(
            "product already reviewed".to_string(),
        ));
    }

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let snapshot: Vec<(Uuid,)> =
        sqlx::query_as("SELECT product_id FROM order_items WHERE order_id = $1")
            .bind(order_id)
            .fetch_all(pool)
            .await?;
    let snapshot: Vec<Uuid> = snapshot.into_iter().map(|(id,)| id).collect();

    if !can_review(
        order.user_id,
        user.user_id,
        &snapshot,
        &order.reviewed_items,
        product_id,
    ) {
        return Err(AppError::Forbidden);
    }

    let mut txn = pool.begin().await?;

    let review: Review = sqlx::query_as(
        r#"
        INSERT INTO reviews (id, user_id, product_id, order_id, rating, comment, image_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(product_id)
    .bind(order_id)
    .bind(payload.rating)
    .bind(payload.comment)
    .bind(payload.image_url)
    .fetch_one(&mut *txn)
    .await
    .map_err(duplicate_to_conflict)?;

    // Guarded append keeps reviewed_items a set even under a retry.
    sqlx::query(
        r#"
        UPDATE orders SET reviewed_items = array_append(reviewed_items, $2)
        WHERE id = $1 AND NOT ($2 = ANY(reviewed_items))
        "#,
    )
    .bind(order_id)
    .bind(product_id)
    .execute(&mut *txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "review_submit",
        Some("reviews"),
        Some(serde_json::json!({ "order_id": order_id, "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review submitted",
        review,
        Some(Meta::empty()),
    ))
}

pub async fn update_review(
    pool: &DbPool,
    user: &AuthUser,
    review_id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if let Some(rating) = payload.rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::BadRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }
    }

    let existing = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = $1")
        .bind(review_id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };
    if existing.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let rating = payload.rating.unwrap_or(existing.rating);
    // Absent fields keep the stored value; an explicit null clears it.
    let comment = match payload.comment {
        Some(value) => value,
        None => existing.comment,
    };
    let image_url = match payload.image_url {
        Some(value) => value,
        None => existing.image_url,
    };

    let review: Review = sqlx::query_as(
        r#"
        UPDATE reviews
        SET rating = $2, comment = $3, image_url = $4, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(review_id)
    .bind(rating)
    .bind(comment)
    .bind(image_url)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("Updated", review, Some(Meta::empty())))
}

/// Deleting a review drops its stored image reference along with the row.
pub async fn delete_review(
    pool: &DbPool,
    user: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = $1 AND user_id = $2")
        .bind(review_id)
        .bind(user.user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "review_delete",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
