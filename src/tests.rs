//! Integration tests for the GIKonnect backend.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::menu::Catalog;
use crate::models::Role;
use crate::{create_router, AppState};

const ADMIN_EMAIL: &str = "dean@giki.edu.pk";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let mut config = Config::for_tests(db_path, psk.clone());
        config.admin_emails = vec![ADMIN_EMAIL.to_string()];
        config.email_domain = Some("giki.edu.pk".to_string());

        let catalog = Catalog::load(None).expect("Failed to load menu");
        let state = AppState::new(repo.clone(), config, catalog);
        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            repo,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_as(&self, uid: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("x-user-id", uid)
            .send()
            .await
            .unwrap()
    }

    async fn post_as(&self, uid: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("x-user-id", uid)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete_as(&self, uid: &str, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .header("x-user-id", uid)
            .send()
            .await
            .unwrap()
    }

    /// Register an account without verifying it.
    async fn register(&self, email: &str, faculty: &str, batch: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/api/users"))
            .json(&json!({
                "email": email,
                "displayName": email.split('@').next().unwrap(),
                "faculty": faculty,
                "batch": batch
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    /// Register and complete OTP verification, returning the UID.
    async fn sign_up(&self, email: &str, faculty: &str, batch: &str) -> String {
        let profile = self.register(email, faculty, batch).await;
        self.verify(email).await;
        profile["uid"].as_str().unwrap().to_string()
    }

    async fn verify(&self, email: &str) {
        let resp = self
            .client
            .post(self.url("/api/otp/send"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let record = self.repo.get_otp(email).await.unwrap().unwrap();
        let resp = self
            .client
            .post(self.url("/api/otp/verify"))
            .json(&json!({ "email": email, "code": record.code }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    async fn sign_up_cr(&self, email: &str, faculty: &str, batch: &str) -> String {
        let uid = self.sign_up(email, faculty, batch).await;
        self.repo.set_role(&uid, Role::Cr).await.unwrap();
        uid
    }

    async fn create_event(&self, uid: &str, body: Value) -> reqwest::Response {
        self.post_as(uid, "/api/events", body).await
    }

    async fn event_titles(&self, uid: &str, path: &str) -> Vec<String> {
        let resp = self.get_as(uid, path).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["title"].as_str().unwrap().to_string())
            .collect()
    }
}

fn event_body(title: &str, scope: &str, target: Option<(&str, &str)>) -> Value {
    let mut body = json!({
        "title": title,
        "startTime": "2030-03-10T09:00:00Z",
        "type": "class",
        "scope": scope
    });
    if let Some((faculty, batch)) = target {
        body["targetFaculty"] = json!(faculty);
        body["targetBatch"] = json!(batch);
    }
    body
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/revision"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/revision"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = Client::new()
        .get(fixture.url("/api/revision"))
        .header("authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_no_psk_configured_allows_requests() {
    let fixture = TestFixture::with_psk(None).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/revision"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["data"]["revisionId"].is_number());
}

#[tokio::test]
async fn test_session_required() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = fixture.get_as("nobody", "/api/events").await;
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_registration_and_otp_flow() {
    let fixture = TestFixture::new().await;

    let profile = fixture.register("Ali@GIKI.edu.pk", "FCSE", "32").await;
    assert_eq!(profile["email"], "ali@giki.edu.pk");
    assert_eq!(profile["role"], "student");
    assert_eq!(profile["emailVerified"], false);
    let uid = profile["uid"].as_str().unwrap();

    // Unverified accounts cannot post
    let resp = fixture
        .create_event(uid, event_body("Study", "personal", None))
        .await;
    assert_eq!(resp.status(), 403);

    // Duplicate registration is rejected
    let resp = fixture
        .client
        .post(fixture.url("/api/users"))
        .json(&json!({
            "email": "ali@giki.edu.pk",
            "displayName": "Ali again",
            "faculty": "FCSE",
            "batch": "32"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Wrong code is rejected without consuming the pending one
    let resp = fixture
        .client
        .post(fixture.url("/api/otp/send"))
        .json(&json!({ "email": "ali@giki.edu.pk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let record = fixture
        .repo
        .get_otp("ali@giki.edu.pk")
        .await
        .unwrap()
        .unwrap();
    let wrong = if record.code == "000000" { "111111" } else { "000000" };

    let resp = fixture
        .client
        .post(fixture.url("/api/otp/verify"))
        .json(&json!({ "email": "ali@giki.edu.pk", "code": wrong }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "OTP_MISMATCH");
    assert!(fixture
        .repo
        .get_otp("ali@giki.edu.pk")
        .await
        .unwrap()
        .is_some());

    let resp = fixture
        .client
        .post(fixture.url("/api/otp/verify"))
        .json(&json!({ "email": "ali@giki.edu.pk", "code": record.code }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["emailVerified"], true);

    // The code is single use
    let resp = fixture
        .client
        .post(fixture.url("/api/otp/verify"))
        .json(&json!({ "email": "ali@giki.edu.pk", "code": record.code }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "OTP_MISSING");

    let resp = fixture.get_as(uid, "/api/users/me").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["emailVerified"], true);
}

#[tokio::test]
async fn test_otp_rejects_foreign_domain_and_unknown_account() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/users"))
        .json(&json!({
            "email": "someone@gmail.com",
            "displayName": "Someone",
            "faculty": "FCSE",
            "batch": "32"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .client
        .post(fixture.url("/api/otp/send"))
        .json(&json!({ "email": "ghost@giki.edu.pk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_admin_bootstrap_and_role_change() {
    let fixture = TestFixture::new().await;

    let admin = fixture.sign_up(ADMIN_EMAIL, "Admin", "Staff").await;
    let student = fixture.sign_up("sara@giki.edu.pk", "FES", "31").await;

    let resp = fixture.get_as(&admin, "/api/users/me").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "admin");

    // Students cannot change roles
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/users/{}/role", admin)))
        .header("x-user-id", &student)
        .json(&json!({ "role": "student" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/users/{}/role", student)))
        .header("x-user-id", &admin)
        .json(&json!({ "role": "cr" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "cr");

    let resp = fixture
        .get_as(&admin, &format!("/api/users/{}", student))
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "cr");
}

#[tokio::test]
async fn test_update_profile() {
    let fixture = TestFixture::new().await;
    let uid = fixture.sign_up("hamza@giki.edu.pk", "FME", "30").await;

    let resp = fixture
        .client
        .put(fixture.url("/api/users/me"))
        .header("x-user-id", &uid)
        .json(&json!({ "batch": "31" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["batch"], "31");
    assert_eq!(body["data"]["faculty"], "FME");

    let resp = fixture
        .client
        .put(fixture.url("/api/users/me"))
        .header("x-user-id", &uid)
        .json(&json!({ "displayName": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_event_visibility_across_users() {
    let fixture = TestFixture::new().await;

    let admin = fixture.sign_up(ADMIN_EMAIL, "Admin", "Staff").await;
    let cr = fixture.sign_up_cr("cr@giki.edu.pk", "FCSE", "32").await;
    let classmate = fixture.sign_up("ali@giki.edu.pk", "fcse", "Batch 32").await;
    let outsider = fixture.sign_up("sara@giki.edu.pk", "FES", "31").await;

    let resp = fixture
        .create_event(&admin, event_body("Convocation", "global", None))
        .await;
    assert_eq!(resp.status(), 200);
    let resp = fixture
        .create_event(&cr, event_body("OOP quiz", "targeted", Some(("FCSE", "32"))))
        .await;
    assert_eq!(resp.status(), 200);
    let resp = fixture
        .create_event(&classmate, event_body("Gym", "personal", None))
        .await;
    assert_eq!(resp.status(), 200);

    let titles = fixture.event_titles(&classmate, "/api/events").await;
    assert!(titles.contains(&"Convocation".to_string()));
    assert!(titles.contains(&"OOP quiz".to_string()));
    assert!(titles.contains(&"Gym".to_string()));

    let titles = fixture.event_titles(&outsider, "/api/events").await;
    assert_eq!(titles, vec!["Convocation".to_string()]);

    // The CR does not see the classmate's personal event
    let titles = fixture.event_titles(&cr, "/api/events").await;
    assert!(!titles.contains(&"Gym".to_string()));

    // Admin previews a cohort
    let titles = fixture
        .event_titles(&admin, "/api/events?overrideFaculty=FCSE&overrideBatch=32")
        .await;
    assert!(titles.contains(&"OOP quiz".to_string()));
    let titles = fixture.event_titles(&admin, "/api/events").await;
    assert!(!titles.contains(&"OOP quiz".to_string()));

    // Overrides from non-admins are ignored
    let titles = fixture
        .event_titles(&outsider, "/api/events?overrideFaculty=FCSE&overrideBatch=32")
        .await;
    assert_eq!(titles, vec!["Convocation".to_string()]);
}

#[tokio::test]
async fn test_hidden_event_reads_as_not_found() {
    let fixture = TestFixture::new().await;

    let owner = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;
    let other = fixture.sign_up("sara@giki.edu.pk", "FCSE", "32").await;

    let resp = fixture
        .create_event(&owner, event_body("Dentist", "personal", None))
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture.get_as(&owner, &format!("/api/events/{}", id)).await;
    assert_eq!(resp.status(), 200);

    let resp = fixture.get_as(&other, &format!("/api/events/{}", id)).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_publish_rights() {
    let fixture = TestFixture::new().await;

    let cr = fixture.sign_up_cr("cr@giki.edu.pk", "FCSE", "32").await;
    let student = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;

    let resp = fixture
        .create_event(&cr, event_body("FES quiz", "targeted", Some(("FES", "32"))))
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .create_event(&cr, event_body("Holiday", "global", None))
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .create_event(&student, event_body("Quiz", "targeted", Some(("FCSE", "32"))))
        .await;
    assert_eq!(resp.status(), 403);

    let mut pinned = event_body("Pinned", "personal", None);
    pinned["isPinned"] = json!(true);
    let resp = fixture.create_event(&student, pinned.clone()).await;
    assert_eq!(resp.status(), 403);
    let resp = fixture.create_event(&cr, pinned).await;
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .create_event(&cr, event_body("Mystery", "everyone", None))
        .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_event_delete_permissions() {
    let fixture = TestFixture::new().await;

    let admin = fixture.sign_up(ADMIN_EMAIL, "Admin", "Staff").await;
    let cr = fixture.sign_up_cr("cr@giki.edu.pk", "FCSE", "32").await;
    let student = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;

    let resp = fixture
        .create_event(&cr, event_body("Lab", "targeted", Some(("FCSE", "32"))))
        .await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let revision = body["revisionId"].as_i64().unwrap();

    let resp = fixture
        .delete_as(&student, &format!("/api/events/{}", id))
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture.delete_as(&admin, &format!("/api/events/{}", id)).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["revisionId"].as_i64().unwrap() > revision);

    let resp = fixture.delete_as(&admin, &format!("/api/events/{}", id)).await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_calendar_views() {
    let fixture = TestFixture::new().await;
    let cr = fixture.sign_up_cr("cr@giki.edu.pk", "FCSE", "32").await;

    // 21:30 UTC on the 10th is the 11th on campus (UTC+5)
    let mut late = event_body("Late lab", "personal", None);
    late["startTime"] = json!("2030-03-10T21:30:00Z");
    fixture.create_event(&cr, late).await;

    let mut pinned = event_body("Pinned notice", "personal", None);
    pinned["startTime"] = json!("2030-03-20T08:00:00Z");
    pinned["isPinned"] = json!(true);
    fixture.create_event(&cr, pinned).await;

    fixture
        .create_event(&cr, event_body("Morning class", "personal", None))
        .await;

    let mut past = event_body("Old news", "personal", None);
    past["startTime"] = json!("2020-01-01T08:00:00Z");
    fixture.create_event(&cr, past).await;

    let resp = fixture
        .get_as(&cr, "/api/events/calendar?year=2030&month=3")
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let days = &body["data"]["days"];
    assert_eq!(days["10"][0]["title"], "Morning class");
    assert_eq!(days["11"][0]["title"], "Late lab");
    assert_eq!(days["20"][0]["title"], "Pinned notice");

    let titles = fixture
        .event_titles(&cr, "/api/events/day?date=2030-03-11")
        .await;
    assert_eq!(titles, vec!["Late lab".to_string()]);

    let titles = fixture.event_titles(&cr, "/api/events/upcoming").await;
    assert_eq!(
        titles,
        vec![
            "Pinned notice".to_string(),
            "Morning class".to_string(),
            "Late lab".to_string()
        ]
    );

    let resp = fixture
        .get_as(&cr, "/api/events/calendar?year=2030&month=13")
        .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_watch_events() {
    let fixture = TestFixture::new().await;
    let uid = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;

    // A first watch without a revision returns the list immediately
    let resp = fixture.get_as(&uid, "/api/events/watch").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["changed"], true);
    let current = body["data"]["eventRevision"].as_i64().unwrap();

    // Nothing changes: times out
    let resp = fixture
        .get_as(&uid, &format!("/api/events/watch?since={}", current))
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["changed"], false);
    assert_eq!(body["data"]["eventRevision"], current);

    // A change while waiting wakes the watcher
    let url = fixture.url(&format!("/api/events/watch?since={}", current));
    let client = fixture.client.clone();
    let watcher_uid = uid.clone();
    let watcher = tokio::spawn(async move {
        client
            .get(url)
            .header("x-user-id", watcher_uid)
            .send()
            .await
            .unwrap()
            .json::<Value>()
            .await
            .unwrap()
    });
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    let resp = fixture
        .create_event(&uid, event_body("Late entry", "personal", None))
        .await;
    let created: Value = resp.json().await.unwrap();

    let body = watcher.await.unwrap();
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["eventRevision"], created["revisionId"]);
    assert_eq!(body["data"]["events"][0]["title"], "Late entry");

    // A stale revision returns at once
    let resp = fixture
        .get_as(&uid, &format!("/api/events/watch?since={}", current))
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["changed"], true);
}

#[tokio::test]
async fn test_watch_ignores_writes_to_other_collections() {
    let fixture = TestFixture::new().await;
    let uid = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;

    let resp = fixture.get_as(&uid, "/api/events/watch").await;
    let body: Value = resp.json().await.unwrap();
    let current = body["data"]["eventRevision"].as_i64().unwrap();
    let global = body["revisionId"].as_i64().unwrap();

    let url = fixture.url(&format!("/api/events/watch?since={}", current));
    let client = fixture.client.clone();
    let watcher_uid = uid.clone();
    let watcher = tokio::spawn(async move {
        client
            .get(url)
            .header("x-user-id", watcher_uid)
            .send()
            .await
            .unwrap()
            .json::<Value>()
            .await
            .unwrap()
    });
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    // Review and mess comment writes bump the global revision only
    let resp = fixture
        .post_as(&uid, "/api/reviews", json!({ "itemId": "raju-chai", "rating": 4 }))
        .await;
    assert_eq!(resp.status(), 200);
    let resp = fixture
        .post_as(&uid, "/api/mess/comments", json!({ "comment": "Chai was great" }))
        .await;
    assert_eq!(resp.status(), 200);

    let body = watcher.await.unwrap();
    assert_eq!(body["data"]["changed"], false);
    assert_eq!(body["data"]["eventRevision"], current);
    assert!(body["revisionId"].as_i64().unwrap() > global);
}

#[tokio::test]
async fn test_venues_and_reviews() {
    let fixture = TestFixture::new().await;
    let ali = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;
    let sara = fixture.sign_up("sara@giki.edu.pk", "FES", "31").await;

    let resp = fixture.get_as(&ali, "/api/venues").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let resp = fixture.get_as(&ali, "/api/venues/unknown").await;
    assert_eq!(resp.status(), 404);

    for (uid, rating) in [(&ali, 5), (&sara, 4)] {
        let resp = fixture
            .post_as(
                uid,
                "/api/reviews",
                json!({ "itemId": "ayan-biryani", "rating": rating, "comment": "Good" }),
            )
            .await;
        assert_eq!(resp.status(), 200);
    }

    let resp = fixture
        .post_as(&ali, "/api/reviews", json!({ "itemId": "ayan-biryani", "rating": 6 }))
        .await;
    assert_eq!(resp.status(), 400);
    let resp = fixture
        .post_as(&ali, "/api/reviews", json!({ "itemId": "pizza", "rating": 3 }))
        .await;
    assert_eq!(resp.status(), 404);

    let resp = fixture.get_as(&ali, "/api/venues/ayan").await;
    let body: Value = resp.json().await.unwrap();
    let biryani = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["id"] == "ayan-biryani")
        .unwrap()
        .clone();
    assert_eq!(biryani["rating"]["count"], 2);
    assert_eq!(biryani["ratingLabel"], "4.5");

    let resp = fixture
        .get_as(&ali, "/api/reviews?itemId=ayan-biryani")
        .await;
    let body: Value = resp.json().await.unwrap();
    let reviews = body["data"].as_array().unwrap();
    assert_eq!(reviews.len(), 2);

    // Only the author can remove a review
    let sara_review = reviews
        .iter()
        .find(|r| r["authorId"] == sara.as_str())
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let resp = fixture
        .delete_as(&ali, &format!("/api/reviews/{}", sara_review))
        .await;
    assert_eq!(resp.status(), 403);
    let resp = fixture
        .delete_as(&sara, &format!("/api/reviews/{}", sara_review))
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_genie() {
    let fixture = TestFixture::new().await;
    let uid = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;

    fixture
        .post_as(&uid, "/api/reviews", json!({ "itemId": "ayan-biryani", "rating": 5 }))
        .await;

    let resp = fixture
        .get_as(&uid, "/api/genie?budget=500&people=2&category=Desi")
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["perPersonBudget"], 250.0);
    let suggestions = body["data"]["suggestions"].as_array().unwrap();
    let ids: Vec<&str> = suggestions
        .iter()
        .map(|s| s["itemId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["ayan-biryani", "raju-daal-chawal"]);
    assert_eq!(suggestions[1]["ratingLabel"], "New");

    // Tight budgets get the mess meal first
    let resp = fixture
        .get_as(&uid, "/api/genie?budget=280&people=2")
        .await;
    let body: Value = resp.json().await.unwrap();
    let suggestions = body["data"]["suggestions"].as_array().unwrap();
    assert_eq!(suggestions[0]["kind"], "messMeal");
    assert_eq!(suggestions[0]["price"], 120);

    let resp = fixture.get_as(&uid, "/api/genie?budget=0").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_mess_comments() {
    let fixture = TestFixture::new().await;
    let admin = fixture.sign_up(ADMIN_EMAIL, "Admin", "Staff").await;
    let ali = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;

    let resp = fixture
        .post_as(
            &ali,
            "/api/mess/comments",
            json!({ "meal": "lunch", "comment": "Daal was cold" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["meal"], "lunch");

    let resp = fixture
        .post_as(&ali, "/api/mess/comments", json!({ "comment": "   " }))
        .await;
    assert_eq!(resp.status(), 400);

    let resp = fixture.get_as(&admin, "/api/mess/comments").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let resp = fixture
        .delete_as(&admin, &format!("/api/mess/comments/{}", id))
        .await;
    assert_eq!(resp.status(), 200);
    let resp = fixture.get_as(&ali, "/api/mess/comments").await;
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_timetable() {
    let fixture = TestFixture::new().await;
    let cr = fixture.sign_up_cr("cr@giki.edu.pk", "FCSE", "32").await;
    let student = fixture.sign_up("ali@giki.edu.pk", "FCSE", "32").await;

    let resp = fixture.get_as(&student, "/api/timetable").await;
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"].is_null());

    let slots = json!([
        { "day": "tue", "start": "10:00", "end": "10:50", "course": "CS101" },
        { "day": "mon", "start": "11:00", "end": "11:50", "course": "MT101", "room": "LH3" },
        { "day": "mon", "start": "08:00", "end": "08:50", "course": "CS101" }
    ]);

    let resp = fixture
        .client
        .put(fixture.url("/api/timetable"))
        .header("x-user-id", &student)
        .json(&json!({ "slots": slots }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .client
        .put(fixture.url("/api/timetable"))
        .header("x-user-id", &cr)
        .json(&json!({ "slots": slots, "expectedVersion": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["version"], 1);

    // Stale version
    let resp = fixture
        .client
        .put(fixture.url("/api/timetable"))
        .header("x-user-id", &cr)
        .json(&json!({ "slots": [], "expectedVersion": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");
    assert_eq!(body["error"]["details"]["currentVersion"], 1);

    // Another cohort is off limits for a CR
    let resp = fixture
        .client
        .put(fixture.url("/api/timetable"))
        .header("x-user-id", &cr)
        .json(&json!({ "faculty": "FES", "batch": "32", "slots": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = fixture.get_as(&student, "/api/timetable?day=mon").await;
    let body: Value = resp.json().await.unwrap();
    let starts: Vec<&str> = body["data"]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["start"].as_str().unwrap())
        .collect();
    assert_eq!(starts, vec!["08:00", "11:00"]);

    let resp = fixture
        .client
        .put(fixture.url("/api/timetable"))
        .header("x-user-id", &cr)
        .json(&json!({ "slots": [
            { "day": "wed", "start": "12:00", "end": "11:00", "course": "CS101" }
        ] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
