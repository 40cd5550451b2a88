use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use schoolgate_api::app::{self, services};
use schoolgate_auth::{
    ApprovalStatus, Email, NewApprovalRequest, Role, RoleRecord, SessionClaims, TeacherStatus,
};
use schoolgate_core::{RequestId, UserId};
use schoolgate_infra::InMemoryStores;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    stores: InMemoryStores,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory stores, bound to an ephemeral port.
        let (services, stores) = services::in_memory_services();
        let app = app::build_app(SECRET, services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            stores,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        req.send().await.unwrap()
    }

    async fn post(&self, path: &str, token: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    fn seed_role(&self, role: Role, email: &str) {
        let record = RoleRecord::new(Email::parse(email).unwrap());
        let record = if role == Role::Teacher {
            record.with_teacher_status(TeacherStatus::Active)
        } else {
            record
        };
        self.stores.roles.insert(role, record).unwrap();
    }

    fn seed_pending_teacher(&self, id: i64, teacher_id: &str, email: &str) {
        self.stores
            .roles
            .insert(
                Role::Teacher,
                RoleRecord::new(Email::parse(email).unwrap()).with_teacher_status(TeacherStatus::Pending),
            )
            .unwrap();
        self.stores
            .approvals
            .insert(
                NewApprovalRequest {
                    teacher_id: UserId::new(teacher_id).unwrap(),
                    teacher_email: Email::parse(email).unwrap(),
                    fullname: Some("Pending Teacher".to_string()),
                    avatar_url: None,
                    requested_at: Utc::now(),
                }
                .into_request(RequestId::new(id)),
            )
            .unwrap();
        self.stores.accounts.insert(Email::parse(email).unwrap()).unwrap();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt_with(secret: &str, sub: &str, email: &str, lifetime: ChronoDuration) -> String {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: sub.to_string(),
        email: email.to_string(),
        iat: (now - ChronoDuration::seconds(5)).timestamp(),
        exp: (now + lifetime).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn mint_jwt(sub: &str, email: &str) -> String {
    mint_jwt_with(SECRET, sub, email, ChronoDuration::minutes(10))
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.get("/health", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_session_is_unauthenticated_and_sent_to_login() {
    let srv = TestServer::spawn().await;

    let body: serde_json::Value = srv.get("/session/identity", None).await.json().await.unwrap();
    assert_eq!(body["state"], "unauthenticated");

    let body: serde_json::Value = srv
        .get("/session/route?path=/dashboard", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["decision"]["kind"], "redirect");
    assert_eq!(body["decision"]["target"], "/login");
    assert_eq!(body["decision"]["return_to"], "/dashboard");
}

#[tokio::test]
async fn bad_tokens_fail_closed() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Admin, "admin@school.org");

    let forged = mint_jwt_with("wrong-secret", "a-1", "admin@school.org", ChronoDuration::minutes(10));
    let expired = mint_jwt_with(SECRET, "a-1", "admin@school.org", ChronoDuration::seconds(-1));

    for token in [forged.as_str(), expired.as_str(), "not-a-jwt"] {
        let res = srv.get("/session/identity", Some(token)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["state"], "unauthenticated");

        let res = srv.get("/approvals", Some(token)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn hod_session_resolves_and_renders_dashboard() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Hod, "hod@school.org");
    let token = mint_jwt("h-1", "HOD@school.org");

    let body: serde_json::Value = srv
        .get("/session/identity", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"], "role_resolved");
    assert_eq!(body["role"], "hod");

    let body: serde_json::Value = srv
        .get("/session/route?path=/dashboard", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["decision"]["kind"], "render");
    assert!(body["reason"].as_str().unwrap().contains("hod"));
}

#[tokio::test]
async fn approvals_are_guarded_by_route_policy() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Student, "student@school.org");
    srv.seed_role(Role::Admin, "admin@school.org");

    assert_eq!(srv.get("/approvals", None).await.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .get("/approvals", Some(&mint_jwt("s-1", "student@school.org")))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "forbidden");

    let res = srv
        .get("/approvals?status=pending", Some(&mint_jwt("a-1", "admin@school.org")))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body.as_array().unwrap().is_empty());

    let res = srv
        .get("/approvals?status=archived", Some(&mint_jwt("a-1", "admin@school.org")))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approve_activates_teacher() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Admin, "admin@school.org");
    srv.seed_pending_teacher(42, "t-1", "teacher@x.com");
    let admin = mint_jwt("admin-7", "admin@school.org");
    let teacher = mint_jwt("t-1", "teacher@x.com");

    let body: serde_json::Value = srv
        .get("/session/route?path=/dashboard", Some(&teacher))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["decision"]["kind"], "render_pending");

    let res = srv.post("/approvals/42/approve", &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["request"]["status"], "approved");
    assert_eq!(body["request"]["decided_by"], "admin-7");
    assert!(body["warnings"].as_array().unwrap().is_empty());

    let body: serde_json::Value = srv
        .get("/session/identity", Some(&teacher))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"], "role_resolved");
    assert_eq!(body["role"], "teacher");

    let res = srv.post("/approvals/42/approve", &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "already_decided");
}

#[tokio::test]
async fn reject_requires_reason_and_reports_warnings() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Hod, "hod@school.org");
    srv.seed_pending_teacher(43, "t-2", "teacher2@x.com");
    let hod = mint_jwt("hod-3", "hod@school.org");

    let res = srv.post("/approvals/43/reject", &hod, json!({ "reason": "" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(
        srv.stores.approvals.snapshot(RequestId::new(43)).unwrap().status,
        ApprovalStatus::Pending
    );

    srv.stores.notifications.fail_writes(true);
    let res = srv
        .post("/approvals/43/reject", &hod, json!({ "reason": "missing certificates" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["request"]["status"], "rejected");
    assert_eq!(body["request"]["rejection_reason"], "missing certificates");
    assert_eq!(body["warnings"][0]["step"], "notification");

    assert!(!srv.stores.accounts.contains(&Email::parse("teacher2@x.com").unwrap()));
}

#[tokio::test]
async fn malformed_ids_and_bodies_get_json_errors() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Hod, "hod@school.org");
    srv.seed_pending_teacher(44, "t-4", "teacher4@x.com");
    let hod = mint_jwt("hod-3", "hod@school.org");

    let res = srv.post("/approvals/forty-four/approve", &hod, json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = srv
        .client
        .post(srv.url("/approvals/44/reject"))
        .bearer_auth(&hod)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"reason\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");
    assert!(body["message"].as_str().is_some());

    let res = srv
        .client
        .post(srv.url("/approvals/44/reject"))
        .bearer_auth(&hod)
        .body("reason=late")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    assert_eq!(
        srv.stores.approvals.snapshot(RequestId::new(44)).unwrap().status,
        ApprovalStatus::Pending
    );
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Admin, "admin@school.org");
    let admin = mint_jwt("a-1", "admin@school.org");

    let res = srv.post("/approvals/999/approve", &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "approval_not_found");
}

#[tokio::test]
async fn activation_retry_after_partial_failure() {
    let srv = TestServer::spawn().await;
    srv.seed_role(Role::Admin, "admin@school.org");
    srv.seed_pending_teacher(7, "t-7", "t7@x.com");
    let admin = mint_jwt("a-1", "admin@school.org");

    let res = srv.post("/approvals/7/activation", &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    srv.stores.roles.fail_writes(true);
    let res = srv.post("/approvals/7/approve", &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "partial_failure");
    assert_eq!(body["stage"], "teacher_activation");
    assert_eq!(body["status"], "approved");

    srv.stores.roles.fail_writes(false);
    let res = srv.post("/approvals/7/activation", &admin, json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let record = srv
        .stores
        .roles
        .get(Role::Teacher, &Email::parse("t7@x.com").unwrap())
        .unwrap();
    assert!(record.is_active_teacher());
}

#[tokio::test]
async fn teacher_onboarding_lifecycle() {
    let srv = TestServer::spawn().await;
    let token = mint_jwt("t-9", "new.teacher@x.com");

    let res = srv
        .post("/onboarding/teacher", &token, json!({ "fullname": "   " }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = srv
        .get("/session/route?path=/complete-profile", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["decision"]["kind"], "render");

    let res = srv
        .post(
            "/onboarding/teacher",
            &token,
            json!({ "fullname": "New Teacher", "department": "Science" }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["teacher_email"], "new.teacher@x.com");

    let body: serde_json::Value = srv
        .get("/session/identity", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["state"], "pending_approval");
    assert_eq!(body["status"], "pending");

    let res = srv
        .post("/onboarding/teacher", &token, json!({ "fullname": "New Teacher" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn onboarding_requires_a_session() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .post(srv.url("/onboarding/teacher"))
        .json(&json!({ "fullname": "Anon" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
