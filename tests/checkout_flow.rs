use axum_storefront_api::{
    db::{create_orm_conn, create_pool},
    dto::{
        cart::AddToCartRequest,
        orders::{DeliveryMethod, OrderItemRequest, PlaceOrderRequest},
        reviews::{SubmitReviewRequest, UpdateReviewRequest},
    },
    error::AppError,
    middleware::auth::{AuthUser, CartOwner},
    services::{bonus_service, cart_service, order_service, review_service, task_service},
    state::AppState,
};
use uuid::Uuid;

// Integration flow: cart -> checkout with bonus redemption and task
// completion -> review gate -> monthly task generation.
#[tokio::test]
async fn checkout_bonus_review_and_task_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let seller_id = create_user(&state, "seller", "seller@example.com").await?;
    let buyer_id = create_user(&state, "user", "buyer@example.com").await?;
    let second_id = create_user(&state, "user", "second@example.com").await?;

    let widget = create_product(&state, seller_id, "Widget", 1_000, 10).await?;
    let trinket = create_product(&state, seller_id, "Trinket", 300, 5).await?;

    let buyer = AuthUser {
        user_id: buyer_id,
        role: "user".into(),
    };
    let second = AuthUser {
        user_id: second_id,
        role: "user".into(),
    };
    let buyer_owner = CartOwner {
        owner_id: buyer_id,
        user_id: Some(buyer_id),
    };

    // --- cart: adds sum and are rejected whole past stock ---
    cart_service::add_to_cart(
        &state.pool,
        &buyer_owner,
        AddToCartRequest {
            product_id: widget,
            quantity: 2,
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state.pool,
        &buyer_owner,
        AddToCartRequest {
            product_id: widget,
            quantity: 3,
        },
    )
    .await?;

    let err = cart_service::add_to_cart(
        &state.pool,
        &buyer_owner,
        AddToCartRequest {
            product_id: widget,
            quantity: 6,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::OutOfStock(_)));

    let stored: (i32,) =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE owner_id = $1 AND product_id = $2")
            .bind(buyer_id)
            .bind(widget)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(stored.0, 5, "failed add must not change the stored quantity");

    // --- seed a task and a balance, then checkout ---
    sqlx::query(
        r#"
        INSERT INTO user_tasks (id, user_id, product_id, quantity, reward, completed)
        VALUES ($1, $2, $3, 2, 400, FALSE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(buyer_id)
    .bind(widget)
    .execute(&state.pool)
    .await?;
    sqlx::query("UPDATE users SET bonus_points = 500 WHERE id = $1")
        .bind(buyer_id)
        .execute(&state.pool)
        .await?;

    let placed = order_service::place_order(
        &state,
        &buyer_owner,
        PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: widget,
                quantity: 2,
            }],
            total: Some(2_000),
            delivery_method: DeliveryMethod::Delivery,
            address: Some("1 Main St".into()),
            used_bonus_points: 500,
        },
    )
    .await?;
    let placed = placed.data.unwrap();
    assert_eq!(placed.order.total, 2_000);
    assert_eq!(placed.order.used_bonus_points, 500);
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].name, "Widget");

    let stock: (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(widget)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(stock.0, 8, "checkout must decrement stock");

    let cart_left: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM cart_items WHERE owner_id = $1 AND product_id = $2")
            .bind(buyer_id)
            .bind(widget)
            .fetch_one(&state.pool)
            .await?;
    assert_eq!(cart_left.0, 0, "purchased products leave the cart");

    let task_done: (bool,) =
        sqlx::query_as("SELECT completed FROM user_tasks WHERE user_id = $1 AND product_id = $2")
            .bind(buyer_id)
            .bind(widget)
            .fetch_one(&state.pool)
            .await?;
    assert!(task_done.0, "a covered task completes at checkout");

    // 500 spent, 400 credited back by the completed task.
    let balance = bonus_service::get_balance(&state.pool, &buyer).await?;
    assert_eq!(balance.data.unwrap().balance, 400);

    // --- order totals are recomputed server-side ---
    let err = order_service::place_order(
        &state,
        &buyer_owner,
        PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: widget,
                quantity: 1,
            }],
            total: Some(999),
            delivery_method: DeliveryMethod::Pickup,
            address: None,
            used_bonus_points: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // --- bonus redemption bounds ---
    let err = order_service::place_order(
        &state,
        &buyer_owner,
        PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: widget,
                quantity: 1,
            }],
            total: None,
            delivery_method: DeliveryMethod::Pickup,
            address: None,
            used_bonus_points: 1_000,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientBalance));

    // Trinket order totals 300; the cap is 270 but the balance allows 280.
    let err = order_service::place_order(
        &state,
        &buyer_owner,
        PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: trinket,
                quantity: 1,
            }],
            total: None,
            delivery_method: DeliveryMethod::Pickup,
            address: None,
            used_bonus_points: 280,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::ExceedsCap));

    // --- review gate ---
    let order_id = placed.order.id;
    let review = review_service::submit_review(
        &state.pool,
        &buyer,
        order_id,
        widget,
        SubmitReviewRequest {
            rating: 5,
            comment: Some("great".into()),
            image_url: None,
        },
    )
    .await?;
    let review = review.data.unwrap();
    assert_eq!(review.rating, 5);

    let reviewed: (Vec<Uuid>,) = sqlx::query_as("SELECT reviewed_items FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(reviewed.0, vec![widget]);

    let err = review_service::submit_review(
        &state.pool,
        &buyer,
        order_id,
        widget,
        SubmitReviewRequest {
            rating: 4,
            comment: None,
            image_url: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // A submission racing past the pre-check is stopped by the unique
    // (user_id, product_id) index and still reads as a conflict.
    let race_err = sqlx::query(
        "INSERT INTO reviews (id, user_id, product_id, order_id, rating) VALUES ($1, $2, $3, $4, 4)",
    )
    .bind(Uuid::new_v4())
    .bind(buyer_id)
    .bind(widget)
    .bind(order_id)
    .execute(&state.pool)
    .await
    .unwrap_err();
    assert!(matches!(
        review_service::duplicate_to_conflict(race_err),
        AppError::Conflict(_)
    ));

    // Patch semantics: an absent field keeps the stored value, an
    // explicit null clears it.
    let updated = review_service::update_review(
        &state.pool,
        &buyer,
        review.id,
        UpdateReviewRequest {
            rating: Some(4),
            comment: None,
            image_url: None,
        },
    )
    .await?;
    let updated = updated.data.unwrap();
    assert_eq!(updated.rating, 4);
    assert_eq!(updated.comment.as_deref(), Some("great"));

    let cleared = review_service::update_review(
        &state.pool,
        &buyer,
        review.id,
        UpdateReviewRequest {
            rating: None,
            comment: Some(None),
            image_url: None,
        },
    )
    .await?;
    let cleared = cleared.data.unwrap();
    assert_eq!(cleared.rating, 4);
    assert_eq!(cleared.comment, None);

    // Trinket was never part of this order.
    let err = review_service::submit_review(
        &state.pool,
        &buyer,
        order_id,
        trinket,
        SubmitReviewRequest {
            rating: 3,
            comment: None,
            image_url: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // --- monthly task generation ---
    // The buyer already holds a task created this month.
    let err = task_service::generate_monthly(&state, &buyer).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let generated = task_service::generate_monthly(&state, &second).await?;
    let generated = generated.data.unwrap().items;
    assert!(!generated.is_empty());
    assert!(generated.len() <= task_service::TASK_BATCH_SIZE);
    for task in &generated {
        assert!(!task.completed);
        let price: (i64,) = sqlx::query_as("SELECT price FROM products WHERE id = $1")
            .bind(task.product_id)
            .fetch_one(&state.pool)
            .await?;
        assert!(task.quantity >= 1);
        assert!(task.quantity <= task_service::quantity_bound(price.0));
        assert_eq!(task.reward, task_service::task_reward(price.0, task.quantity));
    }

    let err = task_service::generate_monthly(&state, &second).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // --- guest checkout ---
    let guest = CartOwner {
        owner_id: Uuid::new_v4(),
        user_id: None,
    };
    let guest_order = order_service::place_order(
        &state,
        &guest,
        PlaceOrderRequest {
            items: vec![OrderItemRequest {
                product_id: trinket,
                quantity: 1,
            }],
            total: None,
            delivery_method: DeliveryMethod::Pickup,
            address: None,
            used_bonus_points: 0,
        },
    )
    .await?;
    assert_eq!(guest_order.data.unwrap().order.user_id, None);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs.
    sqlx::query(
        "TRUNCATE TABLE reviews, order_items, orders, cart_items, user_tasks, favorites, audit_logs, products, categories, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(AppState { pool, orm })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, 'dummy', $3)")
        .bind(id)
        .bind(email)
        .bind(role)
        .execute(&state.pool)
        .await?;
    Ok(id)
}

async fn create_product(
    state: &AppState,
    seller_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO products (id, seller_id, name, description, price, stock, approved)
        VALUES ($1, $2, $3, NULL, $4, $5, TRUE)
        "#,
    )
    .bind(id)
    .bind(seller_id)
    .bind(name)
    .bind(price)
    .bind(stock)
    .execute(&state.pool)
    .await?;
    Ok(id)
}
