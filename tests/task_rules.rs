use axum_storefront_api::services::task_service::{
    TASK_BATCH_SIZE, month_start, quantity_bound, task_reward,
};
use chrono::{TimeZone, Utc};

#[test]
fn quantity_bound_divides_the_budget() {
    // $300 product: floor(1000 / 300) = 3.
    assert_eq!(quantity_bound(30_000), 3);
    // Cheap products are clamped at 5.
    assert_eq!(quantity_bound(100), 5);
    // Products above the budget still ask for one unit.
    assert_eq!(quantity_bound(200_000), 1);
    // Exact division.
    assert_eq!(quantity_bound(20_000), 5);
    assert_eq!(quantity_bound(25_000), 4);
}

#[test]
fn quantity_bound_stays_in_range() {
    for price in [1i64, 50, 2_499, 30_000, 99_999, 100_000, 1_000_000] {
        let bound = quantity_bound(price);
        assert!((1..=5).contains(&bound), "bound {bound} for price {price}");
    }
}

#[test]
fn reward_is_twenty_percent_rounded() {
    // $300 x 2 -> $120.
    assert_eq!(task_reward(30_000, 2), 12_000);
    assert_eq!(task_reward(1_000, 1), 200);
    // Half-cent boundaries round up.
    assert_eq!(task_reward(13, 1), 3); // 2.6 -> 3
    assert_eq!(task_reward(11, 1), 2); // 2.2 -> 2
    assert_eq!(task_reward(25, 1), 5); // 5.0 exact
}

#[test]
fn batch_size_is_five() {
    assert_eq!(TASK_BATCH_SIZE, 5);
}

#[test]
fn month_window_starts_at_midnight_on_the_first() {
    let now = Utc.with_ymd_and_hms(2026, 8, 26, 13, 45, 9).unwrap();
    let start = month_start(now).unwrap();
    assert_eq!(start, Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap());

    // The first instant of a month maps to itself.
    let first = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(month_start(first).unwrap(), first);
}
