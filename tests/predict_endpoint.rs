use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use iris_serve::{
    api::{
        create_router,
        types::{PredictRequest, PredictResponse},
        AppState,
    },
    config::AppConfig,
    error::Result,
    ml::{train, Classifier, Dataset, IrisPipeline, TrainConfig},
    validation::FeatureRecord,
    ModelHolder,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, OnceLock,
};
use tower::ServiceExt;

static IRIS_MODEL: OnceLock<Arc<IrisPipeline>> = OnceLock::new();

fn iris_model() -> Arc<IrisPipeline> {
    IRIS_MODEL
        .get_or_init(|| {
            let (model, _) = train(&Dataset::iris(), &TrainConfig::default())
                .expect("training on iris succeeds");
            Arc::new(model)
        })
        .clone()
}

fn app_with(model: Arc<dyn Classifier>, max_batch_size: usize) -> Router {
    let holder = ModelHolder::new();
    holder.install(model).expect("fresh holder accepts a model");
    create_router(AppState::new(holder, max_batch_size))
}

fn iris_app() -> Router {
    app_with(iris_model(), 64)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Vec<u8>>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .expect("request builds");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    (status, bytes.to_vec())
}

async fn post_predict(app: &Router, body: Value) -> (StatusCode, Value) {
    let (status, bytes) = send(
        app,
        Method::POST,
        "/predict",
        Some(serde_json::to_vec(&body).unwrap()),
    )
    .await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Wraps a classifier and counts calls into it.
struct Counting {
    inner: Arc<IrisPipeline>,
    calls: AtomicUsize,
}

impl Classifier for Counting {
    fn classes(&self) -> &[i64] {
        self.inner.classes()
    }

    fn predict(&self, batch: &[FeatureRecord]) -> Result<Vec<i64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(batch)
    }

    fn predict_proba(&self, batch: &[FeatureRecord]) -> Result<Vec<Vec<f64>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict_proba(batch)
    }
}

struct Panicking;

impl Classifier for Panicking {
    fn classes(&self) -> &[i64] {
        &[0, 1, 2]
    }

    fn predict(&self, _batch: &[FeatureRecord]) -> Result<Vec<i64>> {
        panic!("model exploded")
    }

    fn predict_proba(&self, _batch: &[FeatureRecord]) -> Result<Vec<Vec<f64>>> {
        panic!("model exploded")
    }
}

#[tokio::test]
async fn single_record_yields_one_label_and_normalized_probabilities() {
    let app = iris_app();
    let (status, body) = post_predict(&app, json!({"data": [[5.1, 3.5, 1.4, 0.2]]})).await;
    assert_eq!(status, StatusCode::OK);

    let response: PredictResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.prediction.len(), 1);
    assert!([0, 1, 2].contains(&response.prediction[0]));
    assert_eq!(response.probability.len(), 1);
    assert_eq!(response.probability[0].len(), 3);
    let sum: f64 = response.probability[0].iter().sum();
    assert!((sum - 1.0).abs() < 1e-9, "probabilities sum to {sum}");
}

#[tokio::test]
async fn short_record_is_rejected_citing_length() {
    let app = iris_app();
    let (status, body) = post_predict(&app, json!({"data": [[5.1, 3.5, 1.4]]})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["detail"][0]["kind"], "too_short");
    assert_eq!(body["detail"][0]["loc"], json!(["data", 0]));
    assert_eq!(body["detail"][0]["limit"], 4);
}

#[tokio::test]
async fn predictions_follow_submission_order() {
    let app = iris_app();
    let (status, body) = post_predict(&app, json!({"data": [[1, 2, 3, 4], [5, 6, 7, 8]]})).await;
    assert_eq!(status, StatusCode::OK);
    let batch: PredictResponse = serde_json::from_value(body).unwrap();
    assert_eq!(batch.len(), 2);

    for (i, record) in [[1, 2, 3, 4], [5, 6, 7, 8]].iter().enumerate() {
        let (_, body) = post_predict(&app, json!({ "data": [record] })).await;
        let single: PredictResponse = serde_json::from_value(body).unwrap();
        assert_eq!(single.prediction[0], batch.prediction[i]);
        assert_eq!(single.probability[0], batch.probability[i]);
    }
}

#[tokio::test]
async fn batch_length_matches_input_for_many_records() {
    let app = iris_app();
    let iris = Dataset::iris();
    let records: Vec<FeatureRecord> = iris.features.iter().step_by(7).copied().collect();

    let request = PredictRequest {
        data: records.clone(),
    };
    let (status, body) = post_predict(&app, serde_json::to_value(&request).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let response: PredictResponse = serde_json::from_value(body).unwrap();
    assert_eq!(response.prediction.len(), records.len());
    assert_eq!(response.probability.len(), records.len());

    let expected = iris_model().predict(&records).unwrap();
    assert_eq!(response.prediction, expected);
}

#[tokio::test]
async fn invalid_records_never_reach_the_model() {
    let counting = Arc::new(Counting {
        inner: iris_model(),
        calls: AtomicUsize::new(0),
    });
    let app = app_with(counting.clone(), 64);

    for bad in [
        json!({"data": [[5.1, 3.5, 1.4]]}),
        json!({"data": [[5.1, 3.5, 1.4, 0.2, 9.9]]}),
        json!({"data": [[5.1, 3.5, 1.4, 0.2], [5.1, "wide", 1.4, 0.2]]}),
        json!({"data": []}),
        json!({"rows": [[5.1, 3.5, 1.4, 0.2]]}),
    ] {
        let (status, _) = post_predict(&app, bad).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
    assert_eq!(counting.calls.load(Ordering::SeqCst), 0);

    let (status, _) = post_predict(&app, json!({"data": [[5.1, 3.5, 1.4, 0.2]]})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(counting.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn non_numeric_values_are_rejected() {
    let app = iris_app();
    let (status, body) =
        post_predict(&app, json!({"data": [[5.1, null, 1.4, 0.2], [true, 3.5, 1.4, 0.2]]})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let detail = body["detail"].as_array().unwrap();
    assert_eq!(detail.len(), 2);
    assert!(detail.iter().all(|d| d["kind"] == "type"));
    assert_eq!(detail[0]["loc"], json!(["data", 0, 1]));
    assert_eq!(detail[1]["loc"], json!(["data", 1, 0]));
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let app = iris_app();
    let (status, bytes) = send(
        &app,
        Method::POST,
        "/predict",
        Some(b"{\"data\": [[5.1, 3.5".to_vec()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["detail"][0]["kind"], "json_invalid");
}

#[tokio::test]
async fn oversized_batches_are_rejected() {
    let app = app_with(iris_model(), 2);
    let (status, body) = post_predict(&app, json!({"data": [[1, 2, 3, 4], [1, 2, 3, 4], [1, 2, 3, 4]]})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["kind"], "batch_too_large");
    assert_eq!(body["detail"][0]["limit"], 2);
}

#[tokio::test]
async fn repeated_requests_are_identical() {
    let app = iris_app();
    let request = json!({"data": [[6.3, 3.3, 6.0, 2.5], [5.7, 2.8, 4.1, 1.3], [5.0, 3.3, 1.4, 0.2]]});
    let (_, first) = post_predict(&app, request.clone()).await;
    let (_, second) = post_predict(&app, request).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_holder_yields_server_error_and_keeps_serving() {
    let app = create_router(AppState::new(ModelHolder::new(), 64));

    let (status, body) = post_predict(&app, json!({"data": [[5.1, 3.5, 1.4, 0.2]]})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "model_unavailable");

    // Validation still runs first and is still a client error.
    let (status, _) = post_predict(&app, json!({"data": [[5.1]]})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = send(&app, Method::GET, "/model", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn panicking_model_becomes_server_error() {
    let app = app_with(Arc::new(Panicking), 64);
    let (status, body) = post_predict(&app, json!({"data": [[5.1, 3.5, 1.4, 0.2]]})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "inference_failed");
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("model exploded")));

    let (status, _) = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_and_metrics_reflect_traffic() {
    let app = iris_app();
    post_predict(&app, json!({"data": [[5.1, 3.5, 1.4, 0.2], [6.2, 3.4, 5.4, 2.3]]})).await;
    post_predict(&app, json!({"data": [[5.1]]})).await;

    let (status, bytes) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["requests"]["predict_requests"], 2);
    assert_eq!(health["requests"]["records_scored"], 2);
    assert_eq!(health["requests"]["validation_failures"], 1);
    assert_eq!(health["model"]["classes"], json!([0, 1, 2]));

    let (status, bytes) = send(&app, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("iris_model_ready 1"));
    assert!(text.contains("iris_predict_requests_total 2"));
    assert!(text.contains("iris_validation_failures_total 1"));
}

#[tokio::test]
async fn bootstrapped_artifact_serves_end_to_end() {
    let dir = std::env::temp_dir().join(format!("iris-e2e-{}", uuid::Uuid::new_v4()));
    let path = dir.join("iris_v1.json");
    iris_model().to_file(&path).unwrap();

    let config = AppConfig::default_config(&path.display().to_string());
    let holder = iris_serve::bootstrap(&config).unwrap();
    let app = create_router(AppState::from_config(holder, &config));

    let (status, bytes) = send(&app, Method::GET, "/model", None).await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(info["format_version"], 1);
    assert_eq!(info["n_features"], 4);
    assert_eq!(info["target_names"], json!(["setosa", "versicolor", "virginica"]));
    assert_eq!(info["artifact_path"], path.display().to_string());

    let (status, body) = post_predict(&app, json!({"data": [[5.1, 3.5, 1.4, 0.2], [7.7, 3.0, 6.1, 2.3]]})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prediction"], json!([0, 2]));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn corrupt_artifact_is_fatal_at_bootstrap() {
    let path = std::env::temp_dir().join(format!("iris-bad-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, b"\xff\xfe\x00 definitely not a model").unwrap();
    let config = AppConfig::default_config(&path.display().to_string());
    match iris_serve::bootstrap(&config) {
        Err(iris_serve::ServeError::ArtifactCorrupt { path: reported, .. }) => {
            assert_eq!(reported, path.display().to_string());
        }
        other => panic!("expected ArtifactCorrupt, got {other:?}"),
    }
    let _ = std::fs::remove_file(&path);
}
