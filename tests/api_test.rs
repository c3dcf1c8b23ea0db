mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{in_days, new_movement, TestApp};
use pharma_stock::entities::movement::MovementType;
use serde_json::{json, Value};

async fn create_lot(app: &TestApp, stock: i32) -> i64 {
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "gtin": "400-6381-33393-1",
                "name": "Ibuprofen 400mg x 20",
                "manufacturer": "Laboratorio Sur"
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let product_id = body["data"]["id"].as_i64().expect("product id");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/lots",
            Some(json!({
                "product_id": product_id,
                "lot_number": "A2301",
                "expiry_date": in_days(200),
                "stock": stock
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().expect("lot id")
}

async fn stock_of(app: &TestApp, lot_id: i64) -> i64 {
    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/lots/{}", lot_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["stock"].as_i64().expect("stock")
}

#[tokio::test]
async fn health_reports_database() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["checks"]["database"], "healthy");
}

#[tokio::test]
async fn product_gtin_is_stored_canonical_and_unique() {
    let app = TestApp::new().await;
    let payload = json!({ "gtin": "400 6381 33393 1", "name": "Ibuprofen 400mg x 20" });

    let (status, body) = app
        .request(Method::POST, "/api/v1/products", Some(payload.clone()), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["gtin"], "4006381333931");
    assert_eq!(body["data"]["status"], "active");

    let (status, body) = app
        .request(Method::POST, "/api/v1/products", Some(payload), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    let (status, body) = app
        .request(Method::GET, "/api/v1/products/by-gtin/4006381333931", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ibuprofen 400mg x 20");
}

#[tokio::test]
async fn bad_gtin_is_a_field_error() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "gtin": "4006381333932", "name": "Wrong check digit" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "gtin");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn malformed_body_is_reported_on_body() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/products")
        .header("content-type", "application/json")
        .body(Body::from("{\"gtin\": "))
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["field"], "body");
}

#[tokio::test]
async fn lot_for_unknown_product_is_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/lots",
            Some(json!({ "product_id": 77, "lot_number": "X1", "expiry_date": "2030-01-31" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn product_detail_lists_lots_by_expiry() {
    let app = TestApp::new().await;
    let product = app.product("4006381333931", "Ibuprofen 400mg x 20").await;
    app.lot(product.id, "LATE", in_days(400), 1).await;
    app.lot(product.id, "SOON", in_days(30), 1).await;

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/products/{}", product.id), None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    let numbers: Vec<&str> = body["data"]["lots"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|lot| lot["lot_number"].as_str())
        .collect();
    assert_eq!(numbers, ["SOON", "LATE"]);
}

#[tokio::test]
async fn rejected_issue_is_422_and_stays_pending() {
    let app = TestApp::new().await;
    let lot_id = create_lot(&app, 10).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({ "lot_id": lot_id, "movement_type": "ISSUE", "quantity": 15 })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "quantity");
    assert_eq!(stock_of(&app, lot_id).await, 10);

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/movements?lot_id={}&applied=false", lot_id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert!(body["data"]["items"][0]["applied_at"].is_null());
}

#[tokio::test]
async fn zero_quantity_is_a_validation_error() {
    let app = TestApp::new().await;
    let lot_id = create_lot(&app, 10).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({ "lot_id": lot_id, "movement_type": "RECEIPT", "quantity": 0 })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "quantity");
}

#[tokio::test]
async fn pending_movement_is_applied_once() {
    let app = TestApp::new().await;
    let lot_id = create_lot(&app, 0).await;
    let token = app.token("pharmacist-7");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/movements",
            Some(json!({
                "lot_id": lot_id,
                "movement_type": "RECEIPT",
                "quantity": 50,
                "document_ref": "PO-1001",
                "apply": false
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["applied_at"].is_null());
    assert_eq!(stock_of(&app, lot_id).await, 0);

    let id = body["data"]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/movements/{}/apply", id);

    let (status, body) = app.request(Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "applied");
    assert_eq!(body["data"]["movement"]["stock_before"], 0);
    assert_eq!(body["data"]["movement"]["stock_after"], 50);
    assert_eq!(body["data"]["movement"]["applied_by"], "pharmacist-7");

    let (status, body) = app.request(Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "already_applied");
    assert_eq!(stock_of(&app, lot_id).await, 50);
}

#[tokio::test]
async fn applying_unknown_movement_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(Method::POST, "/api/v1/movements/404/apply", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_apply_reports_counts() {
    let app = TestApp::new().await;
    let lot_id = create_lot(&app, 10).await;

    let mut ids = Vec::new();
    for (movement_type, quantity) in [("ISSUE", 4), ("ISSUE", 40), ("RECEIPT", 1)] {
        let (status, body) = app
            .request(
                Method::POST,
                "/api/v1/movements",
                Some(json!({
                    "lot_id": lot_id,
                    "movement_type": movement_type,
                    "quantity": quantity,
                    "apply": false
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(body["data"]["id"].as_i64().unwrap());
    }
    ids.push(9_999);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/admin/movements/apply",
            Some(json!({ "ids": ids })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["applied"], 2);
    assert_eq!(body["data"]["failed"], 1);
    assert_eq!(body["data"]["skipped"], 1);
    assert_eq!(body["data"]["failures"][0]["field"], "quantity");
    assert_eq!(stock_of(&app, lot_id).await, 7);
}

#[tokio::test]
async fn bulk_apply_requires_ids() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/admin/movements/apply",
            Some(json!({ "ids": [] })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "ids");
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::GET, "/api/v1/products", None, Some("not-a-jwt"))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn writes_can_require_a_token() {
    let app = TestApp::with_config(|cfg| cfg.require_auth_for_writes = true).await;
    let payload = json!({ "gtin": "4006381333931", "name": "Ibuprofen 400mg x 20" });

    let (status, _) = app
        .request(Method::POST, "/api/v1/products", Some(payload.clone()), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let token = app.token("admin");
    let (status, _) = app
        .request(Method::POST, "/api/v1/products", Some(payload), Some(&token))
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .uri("/api/v1/lots")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(response.headers().contains_key("x-request-id"));

    let response = app
        .send(
            Request::builder()
                .uri("/status")
                .header("x-request-id", "trace-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "trace-123");
}

#[tokio::test]
async fn products_are_paginated() {
    let app = TestApp::new().await;
    for (gtin, name) in [
        ("4006381333931", "Cetirizine 10mg"),
        ("5901234123457", "Amoxicillin 500mg"),
        ("9780201379624", "Benzonatate 100mg"),
    ] {
        app.product(gtin, name).await;
    }

    let (status, body) = app
        .request(Method::GET, "/api/v1/products?page=1&limit=2", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"][0]["name"], "Amoxicillin 500mg");
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);
}

fn field_values<'a>(body: &'a Value, field: &str) -> Vec<&'a str> {
    body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item[field].as_str())
        .collect()
}

#[tokio::test]
async fn lots_are_searchable_by_number_product_or_gtin() {
    let app = TestApp::new().await;
    let ibuprofen = app.product("4006381333931", "Ibuprofen 400mg x 20").await;
    let amoxicillin = app.product("5901234123457", "Amoxicillin 500mg").await;
    app.lot(ibuprofen.id, "IBU-01", in_days(100), 1).await;
    app.lot(amoxicillin.id, "AMX-01", in_days(200), 1).await;
    app.lot(amoxicillin.id, "AMX-02", in_days(300), 1).await;

    for (term, expected) in [
        ("IBU", vec!["IBU-01"]),
        ("Amoxi", vec!["AMX-01", "AMX-02"]),
        ("590123412", vec!["AMX-01", "AMX-02"]),
        ("%20%20", vec!["IBU-01", "AMX-01", "AMX-02"]),
    ] {
        let (status, body) = app
            .request(Method::GET, &format!("/api/v1/lots?search={}", term), None, None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(field_values(&body, "lot_number"), expected, "search {term}");
    }
}

#[tokio::test]
async fn movements_filter_by_actor_and_reference() {
    let app = TestApp::new().await;
    let lot_id = create_lot(&app, 0).await;
    let movements = &app.state.services.movements;
    for (document_ref, reason, actor) in [
        ("GRN-100", "supplier delivery", "pharmacist-1"),
        ("GRN-101", "supplier delivery", "pharmacist-2"),
        ("RET-7", "returned by ward 3", "pharmacist-1"),
    ] {
        let mut input = new_movement(lot_id, MovementType::Receipt, 5);
        input.document_ref = document_ref.into();
        input.reason = reason.into();
        movements.create_and_apply(input, Some(actor)).await.unwrap();
    }

    let (status, body) = app
        .request(Method::GET, "/api/v1/movements?applied_by=pharmacist-1", None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(field_values(&body, "document_ref"), ["RET-7", "GRN-100"]);

    let (_, body) = app
        .request(Method::GET, "/api/v1/movements?search=GRN-10", None, None)
        .await;
    assert_eq!(field_values(&body, "document_ref"), ["GRN-101", "GRN-100"]);

    let (_, body) = app
        .request(
            Method::GET,
            "/api/v1/movements?search=ward&applied_by=pharmacist-2",
            None,
            None,
        )
        .await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/movements/{id}/apply"]["post"].is_object());
}
