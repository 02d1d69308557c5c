use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    check::check_repository,
    ingest::ingest_artifact,
    probes::{live, ready},
    rag_query::rag_query,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes for k8s/systemd
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let api = Router::new()
        .route(
            "/ingest",
            post(ingest_artifact).layer(DefaultBodyLimit::max(
                app_state.config.ingest_max_body_bytes,
            )),
        )
        .route("/check", get(check_repository))
        .route("/rag_query", post(rag_query));

    probes.merge(api)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use common::{
        storage::{
            db::SurrealDbClient,
            store::{testing::FailingVectorStore, ArtifactStore, VectorStore},
        },
        utils::{
            config::AppConfig,
            embedding::{EmbeddingEngine, EmbeddingProvider},
            llm::{testing::ScriptedTextGenerator, TextGenerator},
        },
    };
    use ingestion_pipeline::{
        pipeline::DefaultPipelineServices, IngestionConfig, IngestionPipeline,
    };
    use retrieval_pipeline::{RetrievalPipeline, NO_CONTEXT_ANSWER};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    const ANNOTATION: &str =
        r#"{"summary": "Program entry point", "tags": ["go", "main"], "use_case": "start the service"}"#;

    async fn setup_db() -> Arc<SurrealDbClient> {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        db.apply_migrations()
            .await
            .expect("Failed to apply migrations");
        Arc::new(db)
    }

    fn embedder() -> Arc<dyn EmbeddingEngine> {
        Arc::new(EmbeddingProvider::new_hashed(32).expect("hashed provider"))
    }

    fn app(state: ApiState) -> Router {
        Router::new()
            .nest("/api/v1", api_routes_v1(&state))
            .with_state(state)
    }

    async fn state_with(
        generator: Arc<ScriptedTextGenerator>,
        config: &AppConfig,
    ) -> (ApiState, Arc<SurrealDbClient>) {
        let db = setup_db().await;
        let generator: Arc<dyn TextGenerator> = generator;
        let state = ApiState::new(config, Arc::clone(&db), generator, embedder());
        (state, db)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    fn ingest_body() -> Value {
        json!({
            "repo_full_name": "acme/x",
            "file_path": "f.go",
            "content": "package main"
        })
    }

    #[tokio::test]
    async fn test_ingest_then_reingest_reports_already_processed() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ANNOTATION));
        let (state, _db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        let (status, first) = send(&app, post_json("/api/v1/ingest", &ingest_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["message"], "processed");
        let id = first["id"].as_str().expect("id").to_string();

        let (status, second) = send(&app, post_json("/api/v1/ingest", &ingest_body())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["message"], "already processed");
        assert_eq!(second["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_ingest_rejects_missing_fields() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ANNOTATION));
        let (state, db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        for body in [
            json!({"file_path": "f.go", "content": "package main"}),
            json!({"repo_full_name": "acme/x", "content": "package main"}),
            json!({"repo_full_name": "acme/x", "file_path": "f.go"}),
            json!({"repo_full_name": "  ", "file_path": "f.go", "content": "x"}),
        ] {
            let (status, response) = send(&app, post_json("/api/v1/ingest", &body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(response["status"], "error");
        }

        let exists = ArtifactStore::exists_for_repo(db.as_ref(), "acme/x")
            .await
            .expect("lookup");
        assert!(!exists);
    }

    #[tokio::test]
    async fn test_ingest_rejects_malformed_json() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ANNOTATION));
        let (state, _db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/ingest")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_body_limit_is_enforced() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ANNOTATION));
        let config = AppConfig {
            ingest_max_body_bytes: 64,
            ..AppConfig::default()
        };
        let (state, _db) = state_with(generator, &config).await;
        let app = app(state);

        let body = json!({
            "repo_full_name": "acme/x",
            "file_path": "f.go",
            "content": "x".repeat(1024)
        });
        let (status, _) = send(&app, post_json("/api/v1/ingest", &body)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_vector_failure_reports_stored_artifact_id() {
        let db = setup_db().await;
        let config = AppConfig::default();
        let generator: Arc<dyn TextGenerator> =
            Arc::new(ScriptedTextGenerator::replying(ANNOTATION));
        let artifacts: Arc<dyn ArtifactStore> = Arc::clone(&db) as Arc<dyn ArtifactStore>;
        let vectors: Arc<dyn VectorStore> =
            Arc::new(FailingVectorStore::new(db.as_ref().clone()));
        let ingestion_config = IngestionConfig::from_app_config(&config);
        let services = DefaultPipelineServices::new(
            Arc::clone(&generator),
            embedder(),
            ingestion_config.clone(),
        );
        let ingestion = IngestionPipeline::with_services(
            artifacts,
            vectors,
            ingestion_config,
            Arc::new(services),
        );
        let retrieval = RetrievalPipeline::new(Arc::clone(&db), generator, embedder(), &config);
        let state =
            ApiState::with_pipelines(&config, Arc::clone(&db), Arc::new(ingestion), Arc::new(retrieval));
        let app = app(state);

        let (status, body) = send(&app, post_json("/api/v1/ingest", &ingest_body())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "vector_write_failed");
        let id = body["id"].as_str().expect("id");
        let stored = ArtifactStore::get_many(db.as_ref(), &[id.to_string()])
            .await
            .expect("lookup");
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_check_reports_exists_and_not_found() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ANNOTATION));
        let (state, _db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        let (status, body) = send(&app, get_request("/api/v1/check?repo_full_name=acme/x")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "not_found");

        let (status, _) = send(&app, post_json("/api/v1/ingest", &ingest_body())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, get_request("/api/v1/check?repo_full_name=acme/x")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "exists");
    }

    #[tokio::test]
    async fn test_check_requires_repo_parameter() {
        let generator = Arc::new(ScriptedTextGenerator::replying(ANNOTATION));
        let (state, _db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        let (status, _) = send(&app, get_request("/api/v1/check")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get_request("/api/v1/check?repo_full_name=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rag_query_on_empty_store_returns_fallback_answer() {
        let generator = Arc::new(ScriptedTextGenerator::replying("unused"));
        let (state, _db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        let (status, body) = send(
            &app,
            post_json("/api/v1/rag_query", &json!({"query": "what is main?"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], NO_CONTEXT_ANSWER);
        assert_eq!(body["sources"], json!([]));
    }

    #[tokio::test]
    async fn test_ingest_then_query_returns_answer_with_sources() {
        let generator = Arc::new(ScriptedTextGenerator::replying("It starts the program."));
        generator.push_reply(ANNOTATION).await;
        let (state, _db) = state_with(Arc::clone(&generator), &AppConfig::default()).await;
        let app = app(state);

        let (status, ingested) = send(&app, post_json("/api/v1/ingest", &ingest_body())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            post_json("/api/v1/rag_query", &json!({"query": "package main"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "It starts the program.");
        let sources = body["sources"].as_array().expect("sources");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["id"], ingested["id"]);
        assert_eq!(sources[0]["file_path"], "f.go");
        assert_eq!(sources[0]["summary"], "Program entry point");
        assert_eq!(sources[0]["use_case"], "start the service");
        assert_eq!(
            sources[0]["source_url"],
            "https://github.com/acme/x/blob/HEAD/f.go"
        );
        assert_eq!(generator.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rag_query_rejects_blank_or_missing_query() {
        let generator = Arc::new(ScriptedTextGenerator::replying("unused"));
        let (state, _db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        let (status, _) = send(&app, post_json("/api/v1/rag_query", &json!({"query": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, post_json("/api/v1/rag_query", &json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_probes_report_ok() {
        let generator = Arc::new(ScriptedTextGenerator::replying("unused"));
        let (state, _db) = state_with(generator, &AppConfig::default()).await;
        let app = app(state);

        let (status, body) = send(&app, get_request("/api/v1/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, get_request("/api/v1/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["db"], "ok");
    }
}
