//! HTTP surface: the admin UI is a pure caller, so every guard must hold
//! at the handler boundary with the documented status codes.

mod common;

use actix_web::{App, test, web};
use common::{account_draft, harness, order, tomorrow};
use harvest_settlement_rs::api;
use harvest_settlement_rs::model::Payout;
use harvest_settlement_rs::payout_fsm::PayoutStatus;
use rust_decimal_macros::dec;
use serde_json::json;

#[actix_web::test]
async fn test_lifecycle_over_http() {
    let h = harness("api_lifecycle");
    let account = h
        .service
        .register_bank_account(account_draft("prod-1", true))
        .unwrap();
    h.service.verify_bank_account(&account.id, "admin-1").unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.service.clone()))
            .configure(api::config),
    )
    .await;

    // Create a batch
    let req = test::TestRequest::post()
        .uri("/payouts")
        .set_json(json!({
            "producerId": "prod-1",
            "orders": [
                {"orderId": "o-1", "producerId": "prod-1", "amount": 600.0,
                 "orderDate": "2026-08-01T00:00:00Z"},
                {"orderId": "o-2", "producerId": "prod-1", "amount": 400.0,
                 "orderDate": "2026-08-02T00:00:00Z"}
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let payout: Payout = test::read_body_json(resp).await;
    assert_eq!(payout.status, PayoutStatus::Pending);
    assert_eq!(payout.gross_amount, dec!(1000));

    // Schedule it
    let req = test::TestRequest::post()
        .uri(&format!("/payouts/{}/schedule", payout.id))
        .set_json(json!({"scheduledFor": tomorrow(&h.clock)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // Complete it
    let req = test::TestRequest::post()
        .uri(&format!("/payouts/{}/complete", payout.id))
        .set_json(json!({
            "bankAccountId": account.id,
            "paymentReference": "SETTLE-1",
            "paymentMethod": "BANK_TRANSFER"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let settled: Payout = test::read_body_json(resp).await;
    assert_eq!(settled.status, PayoutStatus::Completed);
    assert!(settled.bank_account_snapshot.is_some());

    // Filterable listing
    let req = test::TestRequest::get()
        .uri("/payouts?producerId=prod-1&status=COMPLETED")
        .to_request();
    let listed: Vec<Payout> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, payout.id);

    h.cleanup();
}

#[actix_web::test]
async fn test_error_mapping() {
    let h = harness("api_errors");
    let account = h
        .service
        .register_bank_account(account_draft("prod-1", true))
        .unwrap();
    h.service.verify_bank_account(&account.id, "admin-1").unwrap();
    let payout = h
        .service
        .create_payout("prod-1", &[order("o-1", "prod-1", dec!(50))])
        .unwrap();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(h.service.clone()))
            .configure(api::config),
    )
    .await;

    // Unknown payout -> 404
    let req = test::TestRequest::get().uri("/payouts/missing").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    // Completing a PENDING payout -> 409 with the machine-readable code
    let req = test::TestRequest::post()
        .uri(&format!("/payouts/{}/complete", payout.id))
        .set_json(json!({
            "bankAccountId": account.id,
            "paymentReference": "REF-1",
            "paymentMethod": "BANK_TRANSFER"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "INVALID_TRANSITION");

    // Empty rejection reason -> 400
    let req = test::TestRequest::post()
        .uri(&format!("/bank-accounts/{}/reject", account.id))
        .set_json(json!({"reason": ""}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION");

    // The record is exactly as created: no partial application
    let current = h.service.payout(&payout.id).unwrap();
    assert_eq!(current.status, PayoutStatus::Pending);
    assert_eq!(current.version, 0);

    h.cleanup();
}
