use axum_storefront_api::dto::orders::{DeliveryMethod, OrderItemRequest, PlaceOrderRequest};
use axum_storefront_api::dto::reviews::UpdateReviewRequest;
use axum_storefront_api::error::AppError;
use axum_storefront_api::services::order_service::{
    SnapshotLine, compute_total, merge_items, validate_order_request,
};
use axum_storefront_api::services::review_service::can_review;
use uuid::Uuid;

fn request(
    delivery_method: DeliveryMethod,
    address: Option<&str>,
    quantity: i32,
) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: vec![OrderItemRequest {
            product_id: Uuid::new_v4(),
            quantity,
        }],
        total: None,
        delivery_method,
        address: address.map(str::to_string),
        used_bonus_points: 0,
    }
}

#[test]
fn delivery_requires_an_address() {
    let err = validate_order_request(&request(DeliveryMethod::Delivery, None, 1)).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = validate_order_request(&request(DeliveryMethod::Delivery, Some("  "), 1)).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert!(validate_order_request(&request(DeliveryMethod::Delivery, Some("1 Main St"), 1)).is_ok());
    assert!(validate_order_request(&request(DeliveryMethod::Pickup, None, 1)).is_ok());
}

#[test]
fn rejects_empty_and_non_positive_items() {
    let mut payload = request(DeliveryMethod::Pickup, None, 1);
    payload.items.clear();
    assert!(validate_order_request(&payload).is_err());

    assert!(validate_order_request(&request(DeliveryMethod::Pickup, None, 0)).is_err());
    assert!(validate_order_request(&request(DeliveryMethod::Pickup, None, -2)).is_err());
}

#[test]
fn merged_quantities_sum_without_wrapping() {
    let product = Uuid::new_v4();
    let other = Uuid::new_v4();
    let items = vec![
        OrderItemRequest {
            product_id: product,
            quantity: 2,
        },
        OrderItemRequest {
            product_id: other,
            quantity: 1,
        },
        OrderItemRequest {
            product_id: product,
            quantity: 3,
        },
    ];
    assert_eq!(merge_items(&items), vec![(product, 5), (other, 1)]);

    // Repeated lines near i32::MAX must widen, not wrap negative and
    // slip past the stock check.
    let items = vec![
        OrderItemRequest {
            product_id: product,
            quantity: 2_000_000_000,
        },
        OrderItemRequest {
            product_id: product,
            quantity: 2_000_000_000,
        },
    ];
    assert_eq!(merge_items(&items), vec![(product, 4_000_000_000i64)]);
}

#[test]
fn review_patch_distinguishes_missing_from_null() {
    let patch: UpdateReviewRequest = serde_json::from_str(r#"{"rating": 4}"#).unwrap();
    assert_eq!(patch.comment, None);

    let patch: UpdateReviewRequest = serde_json::from_str(r#"{"comment": null}"#).unwrap();
    assert_eq!(patch.comment, Some(None));

    let patch: UpdateReviewRequest = serde_json::from_str(r#"{"comment": "ok"}"#).unwrap();
    assert_eq!(patch.comment, Some(Some("ok".to_string())));
}

#[test]
fn total_comes_from_the_snapshot() {
    let seller = Uuid::new_v4();
    let lines = vec![
        SnapshotLine {
            product_id: Uuid::new_v4(),
            name: "a".into(),
            price: 1_000,
            quantity: 2,
            seller_id: seller,
        },
        SnapshotLine {
            product_id: Uuid::new_v4(),
            name: "b".into(),
            price: 2_499,
            quantity: 3,
            seller_id: seller,
        },
    ];
    assert_eq!(compute_total(&lines), 2_000 + 7_497);
    assert_eq!(compute_total(&[]), 0);
}

#[test]
fn review_gate_checks_ownership_snapshot_and_reviewed_set() {
    let user = Uuid::new_v4();
    let other = Uuid::new_v4();
    let product = Uuid::new_v4();
    let unrelated = Uuid::new_v4();
    let snapshot = vec![product];

    assert!(can_review(Some(user), user, &snapshot, &[], product));
    // Someone else's order.
    assert!(!can_review(Some(other), user, &snapshot, &[], product));
    // Guest orders have no reviewer.
    assert!(!can_review(None, user, &snapshot, &[], product));
    // Product absent from the snapshot.
    assert!(!can_review(Some(user), user, &snapshot, &[], unrelated));
    // Already reviewed.
    assert!(!can_review(Some(user), user, &snapshot, &[product], product));
}
