//! Withdrawal reservation, approval, rejection and linking rules.

mod common;

use std::sync::Arc;

use common::{Harness, money, whole};
use greenrecycle_ledger::WithdrawalLedger;
use greenrecycle_types::{
    ErrorKind, LedgerConfig, OrderId, RecycleError, WithdrawalId, WithdrawalStatus,
};

#[tokio::test]
async fn request_reserves_and_reject_refunds() {
    let h = Harness::new();
    let user = h.user(money(10_000)).await;
    let before = h.ledger.withdrawals.funds_position(user).await.unwrap();

    let withdrawal = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(2_500), "alipay", None)
        .await
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(h.get_user(user).await.balance, money(7_500));

    let reserved = h.ledger.withdrawals.funds_position(user).await.unwrap();
    assert_eq!(reserved.reserved, money(2_500));
    before.ensure_conserved(&reserved).unwrap();

    let rejected = h
        .ledger
        .withdrawals
        .reject_withdrawal(withdrawal.id, "account details invalid")
        .await
        .unwrap();
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    assert_eq!(h.get_user(user).await.balance, money(10_000));

    let after = h.ledger.withdrawals.funds_position(user).await.unwrap();
    before.ensure_conserved(&after).unwrap();
    assert_eq!(h.recorder.titles(), vec!["Withdrawal rejected".to_string()]);
}

#[tokio::test]
async fn approval_keeps_balance() {
    let h = Harness::new();
    let user = h.user(money(10_000)).await;
    let withdrawal = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(2_500), "wechat", None)
        .await
        .unwrap();

    let approved = h
        .ledger
        .withdrawals
        .approve_withdrawal(withdrawal.id)
        .await
        .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert_eq!(h.get_user(user).await.balance, money(7_500));
    let position = h.ledger.withdrawals.funds_position(user).await.unwrap();
    assert_eq!(position.reserved, money(0));

    let err = h
        .ledger
        .withdrawals
        .reject_withdrawal(withdrawal.id, "too late")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(h.get_user(user).await.balance, money(7_500));
}

#[tokio::test]
async fn insufficient_balance_is_rejected() {
    let h = Harness::new();
    let user = h.user(money(1_000)).await;

    let err = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(1_001), "alipay", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RecycleError::InsufficientBalance { .. }));
    assert_eq!(h.get_user(user).await.balance, money(1_000));
}

#[tokio::test]
async fn ceiling_and_amount_shape_are_enforced() {
    let mut config = LedgerConfig::default();
    config.max_withdrawal_amount = money(5_000);
    let h = Harness::with_config(config);
    let user = h.user(money(100_000)).await;

    let err = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(5_001), "alipay", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);

    h.ledger
        .withdrawals
        .request_user_withdrawal(user, money(5_000), "alipay", None)
        .await
        .unwrap();

    for bad in [money(0), money(-100), rust_decimal::Decimal::new(1_001, 3)] {
        let err = h
            .ledger
            .withdrawals
            .request_user_withdrawal(user, bad, "alipay", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}

#[tokio::test]
async fn order_link_is_unique() {
    let h = Harness::new();
    let user = h.user(money(0)).await;
    let collector = h.collector(None, money(0)).await;
    let material = h.material(money(150)).await;
    let order_id = h.scheduled_order(user, material, collector).await;
    h.ledger
        .settlement
        .settle(order_id, whole(10), whole(0))
        .await
        .unwrap();

    h.ledger
        .withdrawals
        .request_user_withdrawal(user, money(500), "alipay", Some(order_id))
        .await
        .unwrap();
    let err = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(500), "alipay", Some(order_id))
        .await
        .unwrap_err();

    assert!(matches!(err, RecycleError::OrderAlreadyWithdrawn(id) if id == order_id));
    assert_eq!(err.kind(), ErrorKind::UniqueLinkViolation);
    assert_eq!(h.get_user(user).await.balance, money(1_000));
}

#[tokio::test]
async fn order_link_requires_owned_completed_order() {
    let h = Harness::new();
    let user = h.user(money(5_000)).await;
    let stranger = h.user(money(5_000)).await;
    let collector = h.collector(None, money(0)).await;
    let material = h.material(money(150)).await;
    let order_id = h.scheduled_order(user, material, collector).await;

    let err = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(100), "alipay", Some(order_id))
        .await
        .unwrap_err();
    assert!(matches!(err, RecycleError::OrderNotCompleted { .. }));

    let err = h
        .ledger
        .withdrawals
        .request_user_withdrawal(stranger, money(100), "alipay", Some(order_id))
        .await
        .unwrap_err();
    assert!(matches!(err, RecycleError::NotOwner { .. }));

    let err = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(100), "alipay", Some(OrderId::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn short_balance_is_reported_before_a_bad_order_link() {
    let h = Harness::new();
    let user = h.user(money(50)).await;
    let collector = h.collector(None, money(0)).await;
    let material = h.material(money(150)).await;
    let scheduled = h.scheduled_order(user, material, collector).await;

    for order_id in [scheduled, OrderId::new()] {
        let err = h
            .ledger
            .withdrawals
            .request_user_withdrawal(user, money(100), "alipay", Some(order_id))
            .await
            .unwrap_err();
        assert!(matches!(err, RecycleError::InsufficientBalance { .. }));
    }
    assert_eq!(h.get_user(user).await.balance, money(50));
}

#[tokio::test]
async fn collector_withdrawal_debits_wallet_and_refunds_linked_user() {
    let h = Harness::new();
    let owner = h.user(money(0)).await;
    let collector = h.collector(Some(owner), money(3_000)).await;

    let withdrawal = h
        .ledger
        .withdrawals
        .request_collector_withdrawal(collector, money(2_000), "bank")
        .await
        .unwrap();
    assert_eq!(withdrawal.user_id, owner);
    assert_eq!(withdrawal.collector_id, Some(collector));
    assert_eq!(h.get_collector(collector).await.balance, money(1_000));
    assert_eq!(h.get_user(owner).await.balance, money(0));

    h.ledger
        .withdrawals
        .reject_withdrawal(withdrawal.id, "manual review failed")
        .await
        .unwrap();
    assert_eq!(h.get_user(owner).await.balance, money(2_000));
    assert_eq!(h.get_collector(collector).await.balance, money(1_000));
}

#[tokio::test]
async fn collector_without_user_is_a_configuration_error() {
    let h = Harness::new();
    let collector = h.collector(None, money(3_000)).await;

    let err = h
        .ledger
        .withdrawals
        .request_collector_withdrawal(collector, money(1_000), "bank")
        .await
        .unwrap_err();
    assert!(matches!(err, RecycleError::CollectorWithoutUser(id) if id == collector));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(h.get_collector(collector).await.balance, money(3_000));
}

#[tokio::test]
async fn collector_wallet_must_cover_amount() {
    let h = Harness::new();
    let owner = h.user(money(0)).await;
    let collector = h.collector(Some(owner), money(500)).await;

    let err = h
        .ledger
        .withdrawals
        .request_collector_withdrawal(collector, money(501), "bank")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
}

#[tokio::test]
async fn unknown_withdrawal_is_not_found() {
    let h = Harness::new();
    let err = h
        .ledger
        .withdrawals
        .approve_withdrawal(WithdrawalId::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn concurrent_approve_and_reject_have_one_winner() {
    let h = Harness::new();
    let user = h.user(money(10_000)).await;
    let withdrawal = h
        .ledger
        .withdrawals
        .request_user_withdrawal(user, money(4_000), "alipay", None)
        .await
        .unwrap();

    let ledger = Arc::new(WithdrawalLedger::new(
        Arc::new(h.store.clone()),
        h.recorder.clone(),
        LedgerConfig::default(),
    ));
    let (approved, rejected) = tokio::join!(
        {
            let ledger = Arc::clone(&ledger);
            async move { ledger.approve_withdrawal(withdrawal.id).await }
        },
        {
            let ledger = Arc::clone(&ledger);
            async move { ledger.reject_withdrawal(withdrawal.id, "duplicate").await }
        }
    );

    assert_eq!(
        usize::from(approved.is_ok()) + usize::from(rejected.is_ok()),
        1
    );
    let stored = h.get_withdrawal(&withdrawal).await;
    let balance = h.get_user(user).await.balance;
    match stored.status {
        WithdrawalStatus::Approved => assert_eq!(balance, money(6_000)),
        WithdrawalStatus::Rejected => assert_eq!(balance, money(10_000)),
        WithdrawalStatus::Pending => panic!("withdrawal left pending"),
    }
}
