pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::checkin::handlers as checkin;
use crate::judging::handlers as judging;
use crate::reconcile::handlers as profiles;
use crate::state::AppState;
use crate::teammates::handlers as teammates;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sign-in enrichment and dashboard
        .route("/api/v1/auth/sync", post(profiles::handle_auth_sync))
        .route("/api/v1/profiles/:id", get(profiles::handle_get_profile))
        .route(
            "/api/v1/profiles/:id/teammates",
            patch(profiles::handle_update_teammates),
        )
        // Teammate picker
        .route("/api/v1/teammates/search", get(teammates::handle_search))
        .route("/api/v1/teammates/status", post(teammates::handle_status))
        // Check-in console
        .route("/api/v1/checkins", post(checkin::handle_checkin))
        .route(
            "/api/v1/profiles/:id/checkins",
            get(checkin::handle_checkin_history),
        )
        // Judging console
        .route("/api/v1/judging/scores", post(judging::handle_submit_score))
        .route("/api/v1/judging/summary", get(judging::handle_summary))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::models::attendee::AttendeeRecord;
    use crate::models::profile::{AuthIdentity, ProfileRecord};
    use crate::store::MemoryStore;

    fn app(store: Arc<MemoryStore>) -> Router {
        let config = Config::with_database_url("postgres://unused".to_string()).unwrap();
        build_router(AppState::new(store, config))
    }

    fn profile(email: &str, admin: bool) -> ProfileRecord {
        let mut p = ProfileRecord::for_identity(&AuthIdentity {
            id: Uuid::new_v4(),
            email: email.to_string(),
        });
        p.first_name = Some("Jane".to_string());
        p.last_name = Some("Doe".to_string());
        p.is_admin = admin;
        p
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(Arc::default()), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_auth_sync_creates_profile() {
        let store = Arc::new(MemoryStore::default());
        store.seed_attendee(AttendeeRecord {
            email_address: Some("new@x.com".to_string()),
            school: Some("Sierra High".to_string()),
            ..Default::default()
        });
        let id = Uuid::new_v4();
        let (status, body) = send(
            app(store.clone()),
            Method::POST,
            "/api/v1/auth/sync",
            Some(json!({ "id": id, "email": "new@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "created");

        let (status, body) = send(
            app(store),
            Method::GET,
            &format!("/api/v1/profiles/{id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["school"], "Sierra High");
    }

    #[tokio::test]
    async fn test_auth_sync_store_failure_is_still_ok() {
        let store = Arc::new(MemoryStore::default());
        store.fail_on("find_attendee_by_email");
        let (status, body) = send(
            app(store),
            Method::POST,
            "/api/v1/auth/sync",
            Some(json!({ "id": Uuid::new_v4(), "email": "a@x.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "skipped");
    }

    #[tokio::test]
    async fn test_missing_profile_is_404() {
        let (status, body) = send(
            app(Arc::default()),
            Method::GET,
            &format!("/api/v1/profiles/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_teammates_normalizes_text() {
        let store = Arc::new(MemoryStore::default());
        let p = profile("a@x.com", false);
        store.seed_profile(p.clone());
        let (status, body) = send(
            app(store.clone()),
            Method::PATCH,
            &format!("/api/v1/profiles/{}/teammates", p.id),
            Some(json!({ "teammates": " Bob , ,bob@x.com, Bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["teammates"], "Bob, bob@x.com");
        assert_eq!(
            store.profile(p.id).unwrap().teammates.as_deref(),
            Some("Bob, bob@x.com")
        );
    }

    #[tokio::test]
    async fn test_teammate_search_and_status() {
        let store = Arc::new(MemoryStore::default());
        store.seed_profile(profile("jane@x.com", false));

        let (status, body) = send(
            app(store.clone()),
            Method::GET,
            "/api/v1/teammates/search?q=jane",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "found");
        assert_eq!(body["candidates"].as_array().unwrap().len(), 1);

        let (status, body) = send(
            app(store),
            Method::POST,
            "/api/v1/teammates/status",
            Some(json!({ "teammates": "jane@x.com, Nobody" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resolved"], true);
        assert_eq!(body["tokens"][0]["status"], "found");
        assert_eq!(body["tokens"][1]["status"], "unknown");
    }

    #[tokio::test]
    async fn test_checkin_requires_admin() {
        let store = Arc::new(MemoryStore::default());
        let staff = profile("staff@x.com", false);
        let attendee = profile("a@x.com", false);
        store.seed_profile(staff.clone());
        store.seed_profile(attendee.clone());

        let (status, body) = send(
            app(store),
            Method::POST,
            "/api/v1/checkins",
            Some(json!({
                "profile_id": attendee.id,
                "staff_id": staff.id,
                "meals": ["lunch"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_judging_flow() {
        let store = Arc::new(MemoryStore::default());
        let judge = profile("judge@x.com", true);
        store.seed_profile(judge.clone());

        let (status, body) = send(
            app(store.clone()),
            Method::POST,
            "/api/v1/judging/scores",
            Some(json!({
                "judge_id": judge.id,
                "project_title": "Solar Bot",
                "innovation": 10,
                "technical": 10,
                "design": 10,
                "impact": 10,
                "presentation": 10
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!((body["total"].as_f64().unwrap() - 10.0).abs() < 1e-9);

        let (status, body) = send(app(store), Method::GET, "/api/v1/judging/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Solar Bot");
        assert_eq!(body[0]["entry_count"], 1);
    }
}
