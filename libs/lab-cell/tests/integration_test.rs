use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request as StoreRequest, ResponseTemplate};

use lab_cell::router::lab_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

/// Matches store writes whose body sets `field` to a timestamp.
fn stamps(field: &'static str) -> impl Fn(&StoreRequest) -> bool + Send + Sync {
    move |request: &StoreRequest| {
        serde_json::from_slice::<Value>(&request.body)
            .map(|body| body[field].is_string())
            .unwrap_or(false)
    }
}

struct TestContext {
    mock_server: MockServer,
    app: Router,
    secret: String,
}

impl TestContext {
    async fn new() -> Self {
        let mock_server = MockServer::start().await;
        let config = TestConfig::with_store_url(mock_server.uri()).to_app_config();
        let secret = config.supabase_jwt_secret.clone();
        Self {
            app: lab_routes(Arc::new(config)),
            mock_server,
            secret,
        }
    }

    async fn send(&self, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        let token = JwtTestUtils::create_test_token(user, &self.secret, Some(1));
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn mock_report(&self, report: &Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/lab_reports"))
            .and(query_param("id", format!("eq.{}", report["id"].as_str().unwrap())))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([report])))
            .mount(&self.mock_server)
            .await;
    }
}

#[tokio::test]
async fn test_doctor_orders_test_at_lab() {
    let ctx = TestContext::new().await;
    let doctor = TestUser::doctor("doc@example.com");
    let lab = TestUser::pathology("lab@example.com");
    let patient_id = Uuid::new_v4().to_string();

    let mut stored =
        MockSupabaseResponses::lab_report_response(&Uuid::new_v4().to_string(), &lab.id, &patient_id, "requested");
    stored["doctor_id"] = json!(doctor.id);
    Mock::given(method("POST"))
        .and(path("/rest/v1/lab_reports"))
        .and(body_partial_json(json!({
            "lab_id": lab.id,
            "doctor_id": doctor.id,
            "status": "requested"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored])))
        .expect(1)
        .mount(&ctx.mock_server)
        .await;

    let (status, body) = ctx
        .send(
            "POST",
            "/reports",
            &doctor,
            Some(json!({
                "patient_id": patient_id,
                "lab_id": lab.id,
                "test_name": "Complete Blood Count"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "requested");
}

#[tokio::test]
async fn test_doctor_must_name_a_lab() {
    let ctx = TestContext::new().await;
    let doctor = TestUser::doctor("doc@example.com");

    let (status, _) = ctx
        .send(
            "POST",
            "/reports",
            &doctor,
            Some(json!({ "patient_id": Uuid::new_v4(), "test_name": "Lipid Panel" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lab_worklist_filters_by_status() {
    let ctx = TestContext::new().await;
    let lab = TestUser::pathology("lab@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_reports"))
        .and(query_param("lab_id", format!("eq.{}", lab.id)))
        .and(query_param("status", "eq.sample-collected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::lab_report_response(
                &Uuid::new_v4().to_string(),
                &lab.id,
                &Uuid::new_v4().to_string(),
                "sample-collected",
            )
        ])))
        .expect(1)
        .mount(&ctx.mock_server)
        .await;

    let (status, body) = ctx
        .send("GET", "/reports?status=sample-collected", &lab, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_collect_then_publish() {
    let ctx = TestContext::new().await;
    let lab = TestUser::pathology("lab@example.com");
    let collected = MockSupabaseResponses::lab_report_response(
        &Uuid::new_v4().to_string(),
        &lab.id,
        &Uuid::new_v4().to_string(),
        "sample-collected",
    );
    ctx.mock_report(&collected).await;

    let mut ready = collected.clone();
    ready["status"] = json!("report-ready");
    ready["result_summary"] = json!("Haemoglobin within normal range");
    ready["published_at"] = json!("2024-01-02T09:00:00Z");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/lab_reports"))
        .and(query_param("status", "eq.sample-collected"))
        .and(body_partial_json(json!({
            "status": "report-ready",
            "result_summary": "Haemoglobin within normal range"
        })))
        .and(stamps("published_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([ready])))
        .expect(1)
        .mount(&ctx.mock_server)
        .await;

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/reports/{}/publish", collected["id"].as_str().unwrap()),
            &lab,
            Some(json!({ "result_summary": "Haemoglobin within normal range" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "report-ready");
    assert_eq!(body["published_at"], "2024-01-02T09:00:00Z");
}

#[tokio::test]
async fn test_collect_stamps_collection_time() {
    let ctx = TestContext::new().await;
    let lab = TestUser::pathology("lab@example.com");
    let requested = MockSupabaseResponses::lab_report_response(
        &Uuid::new_v4().to_string(),
        &lab.id,
        &Uuid::new_v4().to_string(),
        "requested",
    );
    ctx.mock_report(&requested).await;

    let mut collected = requested.clone();
    collected["status"] = json!("sample-collected");
    collected["collected_at"] = json!("2024-01-01T10:30:00Z");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/lab_reports"))
        .and(query_param("status", "eq.requested"))
        .and(body_partial_json(json!({ "status": "sample-collected" })))
        .and(stamps("collected_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([collected])))
        .expect(1)
        .mount(&ctx.mock_server)
        .await;

    let (status, body) = ctx
        .send(
            "POST",
            &format!("/reports/{}/collect", requested["id"].as_str().unwrap()),
            &lab,
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sample-collected");
    assert_eq!(body["collected_at"], "2024-01-01T10:30:00Z");
}

#[tokio::test]
async fn test_publish_before_collection_conflicts() {
    let ctx = TestContext::new().await;
    let lab = TestUser::pathology("lab@example.com");
    let requested = MockSupabaseResponses::lab_report_response(
        &Uuid::new_v4().to_string(),
        &lab.id,
        &Uuid::new_v4().to_string(),
        "requested",
    );
    ctx.mock_report(&requested).await;

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/reports/{}/publish", requested["id"].as_str().unwrap()),
            &lab,
            Some(json!({ "result_summary": "Too early" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_other_lab_cannot_collect() {
    let ctx = TestContext::new().await;
    let owner = TestUser::pathology("owner@example.com");
    let other = TestUser::pathology("other@example.com");
    let requested = MockSupabaseResponses::lab_report_response(
        &Uuid::new_v4().to_string(),
        &owner.id,
        &Uuid::new_v4().to_string(),
        "requested",
    );
    ctx.mock_report(&requested).await;

    let (status, _) = ctx
        .send(
            "POST",
            &format!("/reports/{}/collect", requested["id"].as_str().unwrap()),
            &other,
            None,
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_patient_reads_own_reports_only() {
    let ctx = TestContext::new().await;
    let patient = TestUser::patient("p@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/lab_reports"))
        .and(query_param("patient_id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&ctx.mock_server)
        .await;

    let (status, body) = ctx
        .send("GET", &format!("/reports/patients/{}", patient.id), &patient, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, _) = ctx
        .send("GET", &format!("/reports/patients/{}", Uuid::new_v4()), &patient, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_pharmacy_is_kept_out() {
    let ctx = TestContext::new().await;
    let pharmacy = TestUser::pharmacy("rx@example.com");

    let (status, _) = ctx.send("GET", "/reports", &pharmacy, None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
