mod common;

use common::{new_movement, TestApp};
use pharma_stock::entities::movement::MovementType;

#[tokio::test]
async fn one_failure_does_not_block_the_batch() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(10).await;
    let movements = &app.state.services.movements;

    let receipt = movements
        .create_movement(new_movement(lot.id, MovementType::Receipt, 5), None)
        .await
        .unwrap();
    let oversell = movements
        .create_movement(new_movement(lot.id, MovementType::Issue, 100), None)
        .await
        .unwrap();
    let issue = movements
        .create_movement(new_movement(lot.id, MovementType::Issue, 8), None)
        .await
        .unwrap();

    let report = movements
        .apply_many(&[issue.id, oversell.id, receipt.id], Some("night-batch"))
        .await
        .unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].movement_id, oversell.id);
    assert_eq!(report.failures[0].field.as_deref(), Some("quantity"));

    // Applied in id order: 10 + 5 - 8
    assert_eq!(app.lot_stock(lot.id).await, 7);

    let issue = movements.get_movement(issue.id).await.unwrap();
    assert_eq!(issue.stock_before, Some(15));
    assert_eq!(issue.applied_by.as_deref(), Some("night-batch"));
    assert!(!movements.get_movement(oversell.id).await.unwrap().is_applied());
}

#[tokio::test]
async fn applied_and_unknown_ids_are_skipped() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(10).await;
    let movements = &app.state.services.movements;

    let done = movements
        .create_and_apply(new_movement(lot.id, MovementType::Receipt, 1), None)
        .await
        .unwrap()
        .movement;
    let pending = movements
        .create_movement(new_movement(lot.id, MovementType::Issue, 2), None)
        .await
        .unwrap();

    let report = movements
        .apply_many(&[done.id, pending.id, pending.id, 424_242], None)
        .await
        .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 2);
    assert!(report.failures.is_empty());
    assert_eq!(app.lot_stock(lot.id).await, 9);
}

#[tokio::test]
async fn rerunning_a_batch_is_harmless() {
    let app = TestApp::new().await;
    let lot = app.stocked_lot(0).await;
    let movements = &app.state.services.movements;

    let mut ids = Vec::new();
    for quantity in [3, 4, 5] {
        let movement = movements
            .create_movement(new_movement(lot.id, MovementType::Receipt, quantity), None)
            .await
            .unwrap();
        ids.push(movement.id);
    }

    let first = movements.apply_many(&ids, None).await.unwrap();
    let second = movements.apply_many(&ids, None).await.unwrap();

    assert_eq!(first.applied, 3);
    assert_eq!(second.applied, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(app.lot_stock(lot.id).await, 12);
}
