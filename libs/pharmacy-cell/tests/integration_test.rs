use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use pharmacy_cell::router::pharmacy_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    app: Router,
    secret: String,
}

impl TestApp {
    fn new() -> Self {
        let config = TestConfig::default().to_arc();
        Self {
            secret: config.supabase_jwt_secret.clone(),
            app: pharmacy_routes(config),
        }
    }

    async fn raw(
        &self,
        method: &str,
        uri: &str,
        user: &TestUser,
        content_type: &str,
        body: String,
    ) -> (StatusCode, axum::http::HeaderMap, String) {
        let token = JwtTestUtils::create_test_token(user, &self.secret, Some(1));
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn csv(&self, uri: &str, user: &TestUser, body: &str) -> (StatusCode, Value) {
        let (status, _, text) = self
            .raw("POST", uri, user, "text/csv", body.to_string())
            .await;
        (status, serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    async fn json(&self, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        let payload = body.map(|b| b.to_string()).unwrap_or_default();
        let (status, _, text) = self
            .raw(method, uri, user, "application/json", payload)
            .await;
        (status, serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}

fn future_date(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::test]
async fn test_preview_counts_every_row() {
    let app = TestApp::new();
    let pharmacy = TestUser::pharmacy("rx@example.com");
    let csv = format!(
        "name,stock,price,expiry\nParacetamol,100,2.50,{}\nBroken,ten,1,{}\nIbuprofen,20,3.10,{}\n",
        future_date(200),
        future_date(200),
        future_date(400)
    );

    let (status, body) = app.csv("/inventory/preview", &pharmacy, &csv).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_rows"], 3);
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["errors"][0]["line"], 3);

    // Preview never commits.
    let (_, listed) = app.json("GET", "/inventory", &pharmacy, None).await;
    assert_eq!(listed["total"], 0);
}

#[tokio::test]
async fn test_wrong_header_rejects_upload() {
    let app = TestApp::new();
    let pharmacy = TestUser::pharmacy("rx@example.com");

    let (status, body) = app
        .csv("/inventory/import", &pharmacy, "drug,qty,cost,expires\nA,1,1,2030-01-01\n")
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name,stock,price,expiry"));
}

#[tokio::test]
async fn test_import_merge_then_replace() {
    let app = TestApp::new();
    let pharmacy = TestUser::pharmacy("rx@example.com");
    let expiry = future_date(300);

    let first = format!("name,stock,price,expiry\nAspirin,10,1.00,{e}\nZinc,5,3.00,{e}\n", e = expiry);
    let (status, body) = app.csv("/inventory/import", &pharmacy, &first).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "merge");
    assert_eq!(body["added"], 2);

    let second = format!("name,stock,price,expiry\nASPIRIN,40,1.20,{e}\nCetirizine,7,2,{e}\n", e = expiry);
    let (_, body) = app.csv("/inventory/import?mode=merge", &pharmacy, &second).await;
    assert_eq!(body["added"], 1);
    assert_eq!(body["updated"], 1);
    assert_eq!(body["inventory_size"], 3);

    let third = format!("name,stock,price,expiry\nMetformin,60,4.50,{e}\n", e = expiry);
    let (_, body) = app.csv("/inventory/import?mode=replace", &pharmacy, &third).await;
    assert_eq!(body["removed"], 3);
    assert_eq!(body["inventory_size"], 1);

    let (_, listed) = app.json("GET", "/inventory", &pharmacy, None).await;
    assert_eq!(listed["items"][0]["name"], "Metformin");
}

#[tokio::test]
async fn test_export_round_trips_through_import() {
    let app = TestApp::new();
    let pharmacy = TestUser::pharmacy("rx@example.com");
    let csv = format!(
        "name,stock,price,expiry\n\"Vitamin D3, 1000 IU\",30,4.75,{}\nZinc,0,10,{}\n",
        future_date(90),
        future_date(10)
    );
    app.csv("/inventory/import", &pharmacy, &csv).await;

    let (status, headers, exported) = app
        .raw("GET", "/inventory/export", &pharmacy, "text/plain", String::new())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment; filename=\"inventory-"));

    let other = TestUser::pharmacy("other@example.com");
    let (_, body) = app.csv("/inventory/import", &other, &exported).await;
    assert_eq!(body["added"], 2);
    assert_eq!(body["errors"].as_array().unwrap().len(), 0);

    let (_, mine) = app.json("GET", "/inventory", &pharmacy, None).await;
    let (_, theirs) = app.json("GET", "/inventory", &other, None).await;
    for (a, b) in mine["items"]
        .as_array()
        .unwrap()
        .iter()
        .zip(theirs["items"].as_array().unwrap())
    {
        assert_eq!(a["name"], b["name"]);
        assert_eq!(a["stock"], b["stock"]);
        assert_eq!(a["price"], b["price"]);
        assert_eq!(a["expiry"], b["expiry"]);
    }
}

#[tokio::test]
async fn test_item_crud() {
    let app = TestApp::new();
    let pharmacy = TestUser::pharmacy("rx@example.com");

    let (status, created) = app
        .json(
            "POST",
            "/inventory",
            &pharmacy,
            Some(json!({ "name": "Aspirin", "stock": 3, "price": 1.5, "expiry": future_date(20) })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .json(
            "POST",
            "/inventory",
            &pharmacy,
            Some(json!({ "name": "aspirin", "stock": 1, "price": 1, "expiry": future_date(20) })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, updated) = app
        .json(
            "PUT",
            &format!("/inventory/{}", id),
            &pharmacy,
            Some(json!({ "stock": 80 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["stock"], 80);
    assert_eq!(updated["price"], 1.5);

    let (status, _) = app
        .json(
            "PUT",
            &format!("/inventory/{}", id),
            &pharmacy,
            Some(json!({ "price": 1.999 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json("DELETE", &format!("/inventory/{}", id), &pharmacy, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json("DELETE", &format!("/inventory/{}", id), &pharmacy, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_filters_and_summary() {
    let app = TestApp::new();
    let pharmacy = TestUser::pharmacy("rx@example.com");
    let csv = format!(
        "name,stock,price,expiry\nAmoxicillin,4,8,{}\nAspirin,200,1.50,{}\nCough Syrup,12,4.50,{}\n",
        future_date(10),
        future_date(500),
        future_date(-3)
    );
    app.csv("/inventory/import", &pharmacy, &csv).await;

    let (_, low) = app
        .json("GET", "/inventory?low_stock=true", &pharmacy, None)
        .await;
    assert_eq!(low["total"], 1);
    assert_eq!(low["items"][0]["name"], "Amoxicillin");

    let (_, expired) = app
        .json("GET", "/inventory?expired=true", &pharmacy, None)
        .await;
    assert_eq!(expired["items"][0]["name"], "Cough Syrup");

    let (_, search) = app
        .json("GET", "/inventory?search=asp", &pharmacy, None)
        .await;
    assert_eq!(search["total"], 1);

    let (status, summary) = app.json("GET", "/inventory/summary", &pharmacy, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["item_count"], 3);
    assert_eq!(summary["total_units"], 216);
    assert_eq!(summary["low_stock_count"], 1);
    assert_eq!(summary["expired_count"], 1);
    assert_eq!(summary["expiring_soon_count"], 1);
    assert_eq!(summary["stock_value"], 386.0);
}

#[tokio::test]
async fn test_doctor_cannot_touch_inventory() {
    let app = TestApp::new();
    let doctor = TestUser::doctor("doc@example.com");

    let (status, _) = app.json("GET", "/inventory", &doctor, None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_reaches_inventory() {
    let app = TestApp::new();
    let admin = TestUser::admin("admin@example.com");

    let (status, body) = app.json("GET", "/inventory/summary", &admin, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item_count"], 0);
}
