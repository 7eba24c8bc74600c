use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ColumnTrait, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait, sea_query::Expr,
};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::tasks::TaskList,
    entity::{
        products::{Column as ProdCol, Entity as Products},
        user_tasks::{
            ActiveModel as TaskActive, Column as TaskCol, Entity as UserTasks, Model as TaskModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::UserTask,
    response::{ApiResponse, Meta},
    services::bonus_service,
    state::AppState,
};

/// Purchase value a whole task batch is scaled against, in cents.
pub const TASK_PRICE_BUDGET: i64 = 100_000;
pub const TASK_BATCH_SIZE: usize = 5;
pub const TASK_SAMPLE_SIZE: u64 = 20;

/// Largest quantity a task may ask for at this price: floor(budget/price),
/// clamped to 1..=5. Callers must pass a positive price.
pub fn quantity_bound(price: i64) -> i32 {
    (TASK_PRICE_BUDGET / price).clamp(1, 5) as i32
}

/// Task reward: 20% of the purchase value, rounded half-up.
pub fn task_reward(price: i64, quantity: i32) -> i64 {
    (price * quantity as i64 * 2 + 5) / 10
}

/// First instant of the calendar month containing `now`; the window a
/// task batch is scoped to.
pub fn month_start(now: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    now.date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("cannot compute month start")))
}

/// Generate this month's task batch: up to 20 approved products sampled
/// at random, the first 5 kept, each with a random quantity within
/// `quantity_bound`. At most one batch per user per calendar month.
pub async fn generate_monthly(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<TaskList>> {
    let now = Utc::now();
    let since = month_start(now)?;

    let existing = UserTasks::find()
        .filter(TaskCol::UserId.eq(user.user_id))
        .filter(TaskCol::CreatedAt.gte(since))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict(
            "tasks already generated this month".to_string(),
        ));
    }

    let sampled = Products::find()
        .filter(ProdCol::Approved.eq(true))
        .filter(ProdCol::Price.gt(0))
        .order_by(Expr::cust("RANDOM()"), Order::Asc)
        .limit(TASK_SAMPLE_SIZE)
        .all(&state.orm)
        .await?;

    // The rng is scoped so it is dropped before the next await.
    let batch: Vec<TaskActive> = {
        let mut rng = rand::thread_rng();
        sampled
            .into_iter()
            .take(TASK_BATCH_SIZE)
            .map(|product| {
                let bound = quantity_bound(product.price);
                let quantity = rng.gen_range(1..=bound);
                TaskActive {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user.user_id),
                    product_id: Set(product.id),
                    quantity: Set(quantity),
                    reward: Set(task_reward(product.price, quantity)),
                    completed: Set(false),
                    created_at: NotSet,
                }
            })
            .collect()
    };

    // Fewer than 5 approved products is fine; an empty catalog yields an
    // empty batch rather than an error.
    if !batch.is_empty() {
        let txn = state.orm.begin().await?;
        UserTasks::insert_many(batch).exec(&txn).await?;
        txn.commit().await?;
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "tasks_generate",
        Some("user_tasks"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let tasks = current_month_tasks(state, user, since).await?;
    Ok(ApiResponse::success(
        "Tasks generated",
        TaskList { items: tasks },
        Some(Meta::empty()),
    ))
}

pub async fn list_tasks(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<TaskList>> {
    let since = month_start(Utc::now())?;
    let tasks = current_month_tasks(state, user, since).await?;
    Ok(ApiResponse::success(
        "OK",
        TaskList { items: tasks },
        Some(Meta::empty()),
    ))
}

async fn current_month_tasks(
    state: &AppState,
    user: &AuthUser,
    since: DateTime<Utc>,
) -> AppResult<Vec<UserTask>> {
    let tasks = UserTasks::find()
        .filter(TaskCol::UserId.eq(user.user_id))
        .filter(TaskCol::CreatedAt.gte(since))
        .order_by_asc(TaskCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(task_from_entity)
        .collect();
    Ok(tasks)
}

/// Checkout hook: complete the oldest open task for this product whose
/// target quantity is covered by the purchase, and credit its reward.
/// Partial purchases below the target leave the task open.
pub async fn complete_for_purchase(
    txn: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    product_id: Uuid,
    purchased_qty: i32,
) -> AppResult<Option<i64>> {
    let completed: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE user_tasks SET completed = TRUE
        WHERE id = (
            SELECT id FROM user_tasks
            WHERE user_id = $1 AND product_id = $2 AND NOT completed AND quantity <= $3
            ORDER BY created_at
            LIMIT 1
        )
        RETURNING reward
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(purchased_qty)
    .fetch_optional(&mut **txn)
    .await?;

    if let Some((reward,)) = completed {
        bonus_service::credit(txn, user_id, reward).await?;
        return Ok(Some(reward));
    }
    Ok(None)
}

fn task_from_entity(model: TaskModel) -> UserTask {
    UserTask {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        quantity: model.quantity,
        reward: model.reward,
        completed: model.completed,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
