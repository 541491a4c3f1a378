pub mod batches;
pub mod health;
pub mod resumes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Upper bound on one multipart batch upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Batch API: one call per pipeline stage
        .route(
            "/api/v1/batches/parse",
            post(batches::handle_parse).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/v1/batches/standardize",
            post(batches::handle_standardize),
        )
        .route("/api/v1/batches/store", post(batches::handle_store))
        .route("/api/v1/batches/rescan", post(batches::handle_rescan))
        // Resume API
        .route("/api/v1/resumes", get(resumes::handle_list_resumes))
        .route(
            "/api/v1/resumes/search",
            post(resumes::handle_search_resumes),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, StoreBackend};
    use crate::llm_client::testing::ScriptedModel;
    use crate::parser::testing::FakeExtractor;
    use crate::parser::ResumeParser;
    use crate::pipeline::staging::StagingArea;
    use crate::pipeline::Pipeline;
    use crate::standardizer::Standardizer;
    use crate::store::memory::MemoryCollection;
    use crate::store::StoreManager;

    const BOUNDARY: &str = "resume-batch-boundary";

    fn app(model: ScriptedModel) -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FakeExtractor::default().with(
            "jane.pdf",
            "Jane Doe\njane@example.com\nGo, SQL",
            &[],
        );
        let pipeline = Pipeline::new(
            ResumeParser::new(Arc::new(extractor)),
            Standardizer::new(Arc::new(model)),
            StoreManager::new(Arc::new(MemoryCollection::default())),
            StagingArea::new(dir.path()),
            true,
        );
        let config = Config {
            store_backend: StoreBackend::Memory,
            database_url: None,
            anthropic_api_key: "test".to_string(),
            staging_dir: dir.path().to_path_buf(),
            keep_raw_responses: true,
            port: 0,
            rust_log: "debug".to_string(),
        };
        let state = AppState {
            pipeline: Arc::new(pipeline),
            config,
        };
        (build_router(state), dir)
    }

    fn multipart(files: &[(&str, &str)]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/batches/parse")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _dir) = app(ScriptedModel::default());
        let (status, body) = send(&router, get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "ok");
        assert_eq!(body["store_backend"], "memory");
        assert_eq!(body["keep_raw_responses"], true);
    }

    #[tokio::test]
    async fn test_forged_stem_in_posted_state_is_ignored() {
        let (router, dir) = app(ScriptedModel::default());
        std::fs::write(
            dir.path().join("secrets.json"),
            r#"{"name": "Mallory", "email": "m@example.com"}"#,
        )
        .unwrap();

        let forged = json!({"items": [
            {"filename": "jane.pdf", "stem": "../secrets", "status": "standardized"}
        ]});
        let (status, body) = send(&router, post_json("/api/v1/batches/store", &forged)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["items"][0]["stem"], "jane");
        assert_eq!(body["state"]["items"][0]["status"], "failed");
        assert_eq!(body["report"]["failed"][0]["kind"], "staging");

        let (_, all) = send(&router, get_req("/api/v1/resumes")).await;
        assert!(all.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_flow_over_http() {
        let model = ScriptedModel::default()
            .reply(r#"{"name": "Jane Doe", "email": "jane@example.com", "skills": ["Go", "SQL"]}"#);
        let (router, _dir) = app(model);

        let (status, parsed) = send(
            &router,
            multipart(&[("jane.pdf", "%PDF-1.5"), ("notes.txt", "hello")]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parsed["summary"]["parsed"], 1);
        assert_eq!(parsed["report"]["failed"][0]["kind"], "unsupported_type");

        let (status, standardized) =
            send(&router, post_json("/api/v1/batches/standardize", &parsed["state"])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(standardized["summary"]["standardized"], 1);

        let (status, stored) =
            send(&router, post_json("/api/v1/batches/store", &standardized["state"])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stored["summary"]["stored"], 1);
        assert_eq!(stored["state"]["items"][0]["status"], "stored");

        let (status, hits) = send(&router, get_req("/api/v1/resumes?field=skills&value=Go")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["email"], "jane@example.com");

        let (_, misses) = send(
            &router,
            post_json(
                "/api/v1/resumes/search",
                &json!({"filters": [{"path": "skills", "op": "has", "value": "Python"}]}),
            ),
        )
        .await;
        assert!(misses.as_array().unwrap().is_empty());

        let (status, rescanned) = send(
            &router,
            post_json("/api/v1/batches/rescan", &json!({"filenames": ["jane.pdf"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rescanned["items"][0]["status"], "standardized");
    }

    #[tokio::test]
    async fn test_unavailable_model_is_503() {
        let mut model = ScriptedModel::default();
        model.unready = true;
        let (router, _dir) = app(model);

        let (_, parsed) = send(&router, multipart(&[("jane.pdf", "%PDF-1.5")])).await;
        let (status, body) =
            send(&router, post_json("/api/v1/batches/standardize", &parsed["state"])).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "COLLABORATOR_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_upload_without_files_is_rejected() {
        let (router, _dir) = app(ScriptedModel::default());
        let (status, body) = send(&router, multipart(&[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_field_without_value_is_rejected() {
        let (router, _dir) = app(ScriptedModel::default());
        let (status, _) = send(&router, get_req("/api/v1/resumes?field=skills")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, all) = send(&router, get_req("/api/v1/resumes")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(all.as_array().unwrap().is_empty());
    }
}
