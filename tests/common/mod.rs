#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, NaiveDate, Utc};
use pharma_stock::{
    config::AppConfig,
    db,
    entities::{lot, movement::MovementType, product},
    services::{lots::NewLot, movements::NewMovement, products::NewProduct},
    AppState,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-with-plenty-of-length";

/// Application state backed by a fresh SQLite file in a temporary directory.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}/stock.db?mode=rwc", dir.path().display());

        let mut cfg = AppConfig::new(url, "127.0.0.1".into(), 18_080, "test".into());
        cfg.cors_allow_any_origin = true;
        cfg.jwt_secret = Some(TEST_SECRET.into());
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = pharma_stock::app_router(state.clone());

        Self {
            state,
            router,
            _dir: dir,
        }
    }

    pub fn token(&self, subject: &str) -> String {
        self.state
            .auth
            .issue_token(subject, None)
            .expect("token for tests")
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn product(&self, gtin: &str, name: &str) -> product::Model {
        self.state
            .services
            .products
            .create_product(NewProduct {
                gtin: gtin.into(),
                name: name.into(),
                manufacturer: "Laboratorio Sur".into(),
                status: None,
            })
            .await
            .expect("product")
    }

    pub async fn lot(&self, product_id: i64, number: &str, expiry: NaiveDate, stock: i32) -> lot::Model {
        self.state
            .services
            .lots
            .create_lot(NewLot {
                product_id,
                lot_number: number.into(),
                expiry_date: expiry,
                stock: Some(stock),
            })
            .await
            .expect("lot")
    }

    /// A product with one lot expiring next year holding `stock` units.
    pub async fn stocked_lot(&self, stock: i32) -> lot::Model {
        let product = self.product("4006381333931", "Ibuprofen 400mg x 20").await;
        self.lot(product.id, "L-001", in_days(365), stock).await
    }

    pub async fn lot_stock(&self, lot_id: i64) -> i32 {
        self.state
            .services
            .lots
            .get_lot(lot_id)
            .await
            .expect("lot exists")
            .stock
    }
}

pub fn in_days(days: i64) -> NaiveDate {
    (Utc::now() + Duration::days(days)).date_naive()
}

pub fn new_movement(lot_id: i64, movement_type: MovementType, quantity: i32) -> NewMovement {
    NewMovement {
        lot_id,
        movement_type,
        quantity,
        reason: "test".into(),
        document_ref: String::new(),
    }
}
