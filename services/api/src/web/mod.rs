pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_user;
use rest::{
    current_session_handler, due_words_handler, end_session_handler, record_review_handler,
    reset_progress_handler, retry_sync_handler, sign_out_handler, start_session_handler,
    stats_handler, sync_status_handler, word_progress_handler,
};
pub use state::AppState;

/// Builds the progress routes. Every route requires the `x-user-id` header.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/progress", delete(reset_progress_handler))
        .route("/progress/reviews", post(record_review_handler))
        .route("/progress/stats", get(stats_handler))
        .route("/progress/words/{word_id}", get(word_progress_handler))
        .route("/progress/due", post(due_words_handler))
        .route("/sessions", post(start_session_handler))
        .route("/sessions/end", post(end_session_handler))
        .route("/sessions/current", get(current_session_handler))
        .route("/sync/status", get(sync_status_handler))
        .route("/sync/retry", post(retry_sync_handler))
        .route("/sign-out", post(sign_out_handler))
        .layer(axum_middleware::from_fn(require_user))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ConnectivityMonitor, MemoryProgressRepository};
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    struct Harness {
        router: Router,
        repository: Arc<MemoryProgressRepository>,
        monitor: Arc<ConnectivityMonitor>,
        state: Arc<AppState>,
        user: Uuid,
    }

    fn harness() -> Harness {
        let repository = Arc::new(MemoryProgressRepository::new());
        let monitor = Arc::new(ConnectivityMonitor::new(true));
        let state = Arc::new(AppState::new(
            repository.clone(),
            monitor.clone(),
            Arc::new(Config {
                probe_interval: Duration::from_millis(10),
                ..Config::default()
            }),
        ));
        Harness {
            router: build_router(state.clone()),
            repository,
            monitor,
            state,
            user: Uuid::new_v4(),
        }
    }

    impl Harness {
        async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(middleware::USER_ID_HEADER, self.user.to_string());
            let request = match body {
                Some(body) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string())),
                None => builder.body(Body::empty()),
            }
            .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        /// Waits until background delivery has emptied the queue.
        async fn settle(&self) {
            for _ in 0..200 {
                let (_, sync) = self.call("GET", "/sync/status", None).await;
                if sync["pending_count"] == 0 && sync["queue_state"] == "empty" {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        async fn review(&self, word_id: i64, correct: bool) -> (StatusCode, Value) {
            self.call(
                "POST",
                "/progress/reviews",
                Some(json!({ "word_id": word_id, "correct": correct })),
            )
            .await
        }
    }

    #[tokio::test]
    async fn missing_user_header_is_rejected() {
        let h = harness();
        let request = Request::builder()
            .uri("/progress/stats")
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/progress/stats")
            .header(middleware::USER_ID_HEADER, "not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reviews_update_mastery_and_stats() {
        let h = harness();
        h.review(7, true).await;
        h.review(7, true).await;
        let (status, body) = h.review(7, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mastery_level"], 0);
        assert_eq!(body["correct_count"], 2);
        assert_eq!(body["wrong_count"], 1);

        let (status, body) = h.call("GET", "/progress/words/7", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["word_id"], 7);

        let (_, stats) = h.call("GET", "/progress/stats", None).await;
        assert_eq!(stats["total_studied"], 1);
        assert_eq!(stats["total_correct"], 2);
        assert_eq!(stats["total_wrong"], 1);
        assert_eq!(stats["in_progress_count"], 1);
        assert_eq!(stats["streak"], 1);
    }

    #[tokio::test]
    async fn unknown_word_is_not_found() {
        let h = harness();
        let (status, _) = h.call("GET", "/progress/words/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn due_words_put_unseen_first() {
        let h = harness();
        h.review(1, true).await;
        let (status, body) = h
            .call("POST", "/progress/due", Some(json!({ "candidate_ids": [1, 2, 3] })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["due"], json!([2, 3]));
    }

    #[tokio::test]
    async fn session_lifecycle_counts_reviews() {
        let h = harness();
        let (status, started) = h
            .call("POST", "/sessions", Some(json!({ "direction": "foreign_to_native" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(started["direction"], "foreign_to_native");

        h.review(1, true).await;
        h.review(2, false).await;

        let (_, current) = h.call("GET", "/sessions/current", None).await;
        assert_eq!(current["words_studied"], 2);
        assert_eq!(current["correct_answers"], 1);

        let (status, ended) = h.call("POST", "/sessions/end", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(ended["ended_at"].is_string());
        h.settle().await;

        let id = Uuid::parse_str(ended["id"].as_str().unwrap()).unwrap();
        let stored = h.repository.session(id).unwrap();
        assert_eq!(stored.words_studied, 2);
        assert!(stored.ended_at.is_some());

        let (status, _) = h.call("POST", "/sessions/end", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn offline_reviews_are_queued_until_retry() {
        let h = harness();
        h.monitor.set_online(false);
        h.repository.set_available(false);

        let (status, body) = h.review(5, true).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mastery_level"], 1);

        let (_, sync) = h.call("GET", "/sync/status", None).await;
        assert_eq!(sync["is_online"], false);
        assert_eq!(sync["has_offline_changes"], true);
        assert_eq!(sync["pending_count"], 1);
        assert_eq!(sync["queue_state"], "has_pending");

        h.repository.set_available(true);
        let (status, report) = h.call("POST", "/sync/retry", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["delivered"], 1);
        assert_eq!(report["pending_count"], 0);

        let (_, sync) = h.call("GET", "/sync/status", None).await;
        assert_eq!(sync["has_offline_changes"], false);
        assert_eq!(sync["queue_state"], "empty");
    }

    #[tokio::test]
    async fn reset_reports_unavailable_store() {
        let h = harness();
        h.review(1, true).await;
        h.settle().await;
        h.repository.set_available(false);
        let (status, _) = h.call("DELETE", "/progress", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        // Nothing is dropped when the store refused the delete.
        let (status, body) = h.call("GET", "/progress/words/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mastery_level"], 1);
        let (_, stats) = h.call("GET", "/progress/stats", None).await;
        assert_eq!(stats["total_studied"], 1);

        h.repository.set_available(true);
        let (status, body) = h.call("DELETE", "/progress", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);

        let (_, stats) = h.call("GET", "/progress/stats", None).await;
        assert_eq!(stats["total_studied"], 0);
    }

    #[tokio::test]
    async fn sign_out_releases_the_coordinator() {
        let h = harness();
        h.review(1, true).await;
        h.settle().await;
        assert_eq!(h.state.active_users().await, 1);

        let (status, _) = h.call("POST", "/sign-out", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(h.state.active_users().await, 0);

        let (status, _) = h.call("POST", "/sign-out", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Signing back in reloads what was persisted.
        let (status, body) = h.call("GET", "/progress/words/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mastery_level"], 1);
    }
}
