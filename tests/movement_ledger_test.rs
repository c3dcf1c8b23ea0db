mod common;

use assert_matches::assert_matches;
use common::{in_days, new_movement, TestApp};
use futures::future::join_all;
use sea_orm::ConnectionTrait;
use pharma_stock::{
    entities::movement::MovementType,
    errors::ServiceError,
    services::movements::{ApplyOutcome, MovementFilter},
};

#[tokio::test]
async fn issue_beyond_stock_leaves_lot_and_movement_untouched() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(10).await;
    let movements = &app.state.services.movements;

    let pending = movements
        .create_movement(new_movement(lot.id, MovementType::Issue, 15), None)
        .await
        .expect("movement recorded");
    let err = movements
        .apply_movement(pending.id, None)
        .await
        .expect_err("issue must be rejected");

    assert_matches!(err, ServiceError::BusinessRule { .. });
    assert_eq!(err.field(), Some("quantity"));
    assert_eq!(app.lot_stock(lot.id).await, 10);

    let stored = movements.get_movement(pending.id).await.unwrap();
    assert!(!stored.is_applied());
    assert_eq!(stored.stock_before, None);
    assert_eq!(stored.stock_after, None);
}

#[tokio::test]
async fn issue_from_expired_lot_is_rejected_on_lot() {
    let app = TestApp::new().await;
    let product = app.product("4006381333931", "Paracetamol 500mg x 16").await;
    let lot = app.lot(product.id, "EXP-1", in_days(-1), 5).await;

    let err = app
        .state
        .services
        .movements
        .create_and_apply(new_movement(lot.id, MovementType::Issue, 1), None)
        .await
        .expect_err("expired lot");

    assert_eq!(err.field(), Some("lot"));
    assert_eq!(err.status_code().as_u16(), 422);
    assert_eq!(app.lot_stock(lot.id).await, 5);
}

#[tokio::test]
async fn issue_on_expiry_day_is_allowed() {
    let app = TestApp::new().await;
    let product = app.product("4006381333931", "Paracetamol 500mg x 16").await;
    let lot = app.lot(product.id, "EXP-0", in_days(0), 5).await;

    let applied = app
        .state
        .services
        .movements
        .create_and_apply(new_movement(lot.id, MovementType::Issue, 5), None)
        .await
        .expect("lot is still valid today");

    assert_eq!(applied.movement.stock_after, Some(0));
    assert_eq!(app.lot_stock(lot.id).await, 0);
}

#[tokio::test]
async fn negative_adjustment_cannot_go_below_zero() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(20).await;

    let err = app
        .state
        .services
        .movements
        .create_and_apply(new_movement(lot.id, MovementType::Adjustment, -25), None)
        .await
        .expect_err("adjustment below zero");

    assert_matches!(err, ServiceError::BusinessRule { .. });
    assert_eq!(app.lot_stock(lot.id).await, 20);

    let applied = app
        .state
        .services
        .movements
        .create_and_apply(new_movement(lot.id, MovementType::Adjustment, -20), None)
        .await
        .expect("adjustment to exactly zero");
    assert_eq!(applied.movement.stock_after, Some(0));
}

#[tokio::test]
async fn receipt_records_before_and_after() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(0).await;

    let applied = app
        .state
        .services
        .movements
        .create_and_apply(new_movement(lot.id, MovementType::Receipt, 50), Some("pharmacist-1"))
        .await
        .unwrap();

    assert_eq!(applied.outcome, ApplyOutcome::Applied);
    let movement = applied.movement;
    assert_eq!(movement.stock_before, Some(0));
    assert_eq!(movement.stock_after, Some(50));
    assert!(movement.applied_at.is_some());
    assert_eq!(movement.applied_by.as_deref(), Some("pharmacist-1"));
    assert_eq!(app.lot_stock(lot.id).await, 50);
}

#[tokio::test]
async fn applying_twice_changes_nothing() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(10).await;
    let movements = &app.state.services.movements;

    let first = movements
        .create_and_apply(new_movement(lot.id, MovementType::Issue, 4), Some("alice"))
        .await
        .unwrap();
    let second = movements
        .apply_movement(first.movement.id, Some("bob"))
        .await
        .unwrap();

    assert_eq!(second.outcome, ApplyOutcome::AlreadyApplied);
    assert_eq!(second.movement, first.movement);
    assert_eq!(second.movement.applied_by.as_deref(), Some("alice"));
    assert_eq!(app.lot_stock(lot.id).await, 6);
}

#[tokio::test]
async fn identity_is_taken_at_apply_when_missing_at_creation() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(3).await;
    let movements = &app.state.services.movements;

    let pending = movements
        .create_movement(new_movement(lot.id, MovementType::Receipt, 2), None)
        .await
        .unwrap();
    assert_eq!(pending.applied_by, None);

    let applied = movements.apply_movement(pending.id, Some("carol")).await.unwrap();
    assert_eq!(applied.movement.applied_by.as_deref(), Some("carol"));
}

#[tokio::test]
async fn invalid_quantities_are_not_recorded() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(10).await;
    let movements = &app.state.services.movements;

    for (movement_type, quantity) in [
        (MovementType::Receipt, 0),
        (MovementType::Receipt, -3),
        (MovementType::Issue, -1),
        (MovementType::Adjustment, 0),
    ] {
        let err = movements
            .create_movement(new_movement(lot.id, movement_type, quantity), None)
            .await
            .expect_err("invalid quantity");
        assert_matches!(err, ServiceError::Validation { .. });
        assert_eq!(err.field(), Some("quantity"));
    }

    let (_, total) = movements
        .list_movements(MovementFilter::default(), 1, 50)
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn movement_for_unknown_lot_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .movements
        .create_movement(new_movement(9_999, MovementType::Receipt, 1), None)
        .await
        .expect_err("unknown lot");

    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn concurrent_receipts_add_up() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(7).await;
    let movements = app.state.services.movements.clone();

    let tasks = (1..=12).map(|quantity| {
        let movements = movements.clone();
        let lot_id = lot.id;
        tokio::spawn(async move {
            movements
                .create_and_apply(new_movement(lot_id, MovementType::Receipt, quantity), None)
                .await
        })
    });

    for result in join_all(tasks).await {
        let applied = result.expect("task").expect("receipt applied");
        let movement = applied.movement;
        assert_eq!(
            movement.stock_after,
            movement.stock_before.map(|b| b + movement.quantity)
        );
    }

    // 7 + (1 + 2 + ... + 12)
    assert_eq!(app.lot_stock(lot.id).await, 7 + 78);
}

#[tokio::test]
async fn concurrent_issues_never_oversell() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(10).await;
    let movements = app.state.services.movements.clone();

    let tasks = (0..20).map(|_| {
        let movements = movements.clone();
        let lot_id = lot.id;
        tokio::spawn(async move {
            movements
                .create_and_apply(new_movement(lot_id, MovementType::Issue, 1), None)
                .await
                .is_ok()
        })
    });

    let successes = join_all(tasks)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(true)))
        .count();

    assert_eq!(successes, 10);
    assert_eq!(app.lot_stock(lot.id).await, 0);
}

#[tokio::test]
async fn ledger_replays_to_current_stock() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(10).await;
    let movements = &app.state.services.movements;

    for (movement_type, quantity) in [
        (MovementType::Receipt, 30),
        (MovementType::Issue, 12),
        (MovementType::Adjustment, -3),
        (MovementType::Issue, 50),
        (MovementType::Adjustment, 4),
    ] {
        let _ = movements
            .create_and_apply(new_movement(lot.id, movement_type, quantity), None)
            .await;
    }

    let filter = MovementFilter {
        lot_id: Some(lot.id),
        applied: Some(true),
        ..Default::default()
    };
    let (mut applied, total) = movements.list_movements(filter, 1, 50).await.unwrap();
    assert_eq!(total, 4);

    applied.sort_by_key(|m| m.id);
    let mut stock = 10;
    for movement in &applied {
        assert_eq!(movement.stock_before, Some(stock));
        stock = movement.stock_after.expect("applied movement has stock_after");
    }
    assert_eq!(stock, 29);
    assert_eq!(app.lot_stock(lot.id).await, 29);

    let pending = MovementFilter {
        lot_id: Some(lot.id),
        applied: Some(false),
        ..Default::default()
    };
    let (rejected, _) = movements.list_movements(pending, 1, 50).await.unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].quantity, 50);
}

fn raw_movement(lot_id: i64, movement_type: &str, quantity: i32) -> String {
    format!(
        "INSERT INTO movements (lot_id, movement_type, quantity, reason, document_ref, created_at) \
         VALUES ({}, '{}', {}, '', '', '2026-01-01 00:00:00+00:00')",
        lot_id, movement_type, quantity
    )
}

#[tokio::test]
async fn database_rejects_invalid_stock_and_quantities() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(7).await;
    let db = app.state.db.as_ref();

    let negative_stock = format!("UPDATE lots SET stock = -1 WHERE id = {}", lot.id);
    assert!(db.execute_unprepared(&negative_stock).await.is_err());

    assert!(db.execute_unprepared(&raw_movement(lot.id, "RECEIPT", -3)).await.is_err());
    assert!(db.execute_unprepared(&raw_movement(lot.id, "ISSUE", -1)).await.is_err());
    assert!(db.execute_unprepared(&raw_movement(lot.id, "ADJUSTMENT", 0)).await.is_err());
    db.execute_unprepared(&raw_movement(lot.id, "ADJUSTMENT", -2))
        .await
        .expect("negative adjustments are allowed");

    assert_eq!(app.lot_stock(lot.id).await, 7);
}

#[tokio::test]
async fn failed_seal_rolls_back_the_stock_change() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(5).await;
    let movements = &app.state.services.movements;

    let pending = movements
        .create_movement(new_movement(lot.id, MovementType::Receipt, 3), None)
        .await
        .expect("movement recorded");
    app.state
        .db
        .execute_unprepared(
            "CREATE TRIGGER reject_movement_update BEFORE UPDATE ON movements \
             BEGIN SELECT RAISE(ABORT, 'sealing rejected'); END;",
        )
        .await
        .unwrap();

    let err = movements
        .apply_movement(pending.id, None)
        .await
        .expect_err("sealing fails");

    assert_matches!(err, ServiceError::DatabaseError(_));
    assert_eq!(app.lot_stock(lot.id).await, 5);
    let stored = movements.get_movement(pending.id).await.unwrap();
    assert!(!stored.is_applied());
    assert_eq!(stored.stock_after, None);
}
