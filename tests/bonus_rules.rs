use axum_storefront_api::services::bonus_service::max_redeemable;

#[test]
fn cap_is_ninety_percent_floored() {
    // $100 order, 200-point balance: 90 points redeemable (in cents).
    assert_eq!(max_redeemable(10_000, 20_000), 9_000);
    // Odd totals round the cap down, never up.
    assert_eq!(max_redeemable(101, 1_000), 90);
    assert_eq!(max_redeemable(1, 1_000), 0);
}

#[test]
fn cap_is_bounded_by_balance() {
    assert_eq!(max_redeemable(10_000, 500), 500);
    assert_eq!(max_redeemable(10_000, 0), 0);
}

#[test]
fn cap_is_monotonic_in_both_arguments() {
    let totals = [0i64, 1, 99, 100, 101, 1_000, 10_000, 123_456];
    let balances = [0i64, 1, 50, 500, 9_000, 100_000];

    for window in totals.windows(2) {
        for &balance in &balances {
            assert!(max_redeemable(window[0], balance) <= max_redeemable(window[1], balance));
        }
    }
    for &total in &totals {
        for window in balances.windows(2) {
            assert!(max_redeemable(total, window[0]) <= max_redeemable(total, window[1]));
        }
    }
}

#[test]
fn cap_never_exceeds_either_bound() {
    for total in [0i64, 7, 100, 999, 10_000] {
        for balance in [0i64, 3, 100, 5_000] {
            let cap = max_redeemable(total, balance);
            assert!(cap <= total * 9 / 10);
            assert!(cap <= balance);
            assert!(cap >= 0);
        }
    }
}
