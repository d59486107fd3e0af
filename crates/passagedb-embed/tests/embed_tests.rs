use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use passagedb_core::config::{EmbeddingBackend, EmbeddingSettings};
use passagedb_core::error::{Error, Stage};
use passagedb_core::traits::Embedder;
use passagedb_embed::{get_default_embedder, HttpEmbedder};

fn settings(endpoint: String, dimensions: usize) -> EmbeddingSettings {
    EmbeddingSettings {
        backend: EmbeddingBackend::Http,
        endpoint,
        base_url: None,
        api_key: Some("test-key".into()),
        model: "text-embedding-v4".into(),
        dimensions,
        timeout_secs: 5,
    }
}

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}/v1/embeddings")
}

/// Echoes one 4-dim vector per input, returned in reverse index order.
async fn echo_handler(Json(body): Json<Value>) -> Json<Value> {
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let mut data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let first = i as f64;
            json!({ "index": i, "embedding": [first, 1.0, 0.0, 0.0] })
        })
        .collect();
    data.reverse();
    Json(json!({ "data": data, "usage": { "prompt_tokens": 3, "total_tokens": 3 } }))
}

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let mut s = EmbeddingSettings::default();
    s.backend = EmbeddingBackend::Fake;
    s.dimensions = 1024;
    let embedder = get_default_embedder(&s).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).await.expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[tokio::test]
async fn http_embedder_orders_batch_by_index() {
    let url = spawn_stub(Router::new().route("/v1/embeddings", post(echo_handler))).await;
    let embedder = HttpEmbedder::new(settings(url, 4)).expect("embedder");
    let texts: Vec<String> = (0..12).map(|i| format!("passage {i}")).collect();
    let out = embedder.embed_batch(&texts).await.expect("embed");
    assert_eq!(out.len(), 12);
    // second request restarts indices at 0
    assert_eq!(out[0][0], 0.0);
    assert_eq!(out[9][0], 9.0);
    assert_eq!(out[10][0], 0.0);
}

#[tokio::test]
async fn base_url_takes_precedence_over_endpoint() {
    let url = spawn_stub(Router::new().route("/v1/embeddings", post(echo_handler))).await;
    let base = url.trim_end_matches("/embeddings").to_string();
    let mut s = settings("http://127.0.0.1:9/unused".into(), 4);
    s.base_url = Some(format!("{base}/"));
    let embedder = HttpEmbedder::new(s).expect("embedder");
    let out = embedder.embed("q").await.expect("embed via base_url");
    assert_eq!(out.len(), 4);
}

#[tokio::test]
async fn http_embedder_rejects_wrong_dimension() {
    let url = spawn_stub(Router::new().route("/v1/embeddings", post(echo_handler))).await;
    let embedder = HttpEmbedder::new(settings(url, 8)).expect("embedder");
    let err = embedder.embed("q").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err}");
}

#[tokio::test]
async fn http_embedder_maps_rate_limit_to_connectivity() {
    let router = Router::new().route(
        "/v1/embeddings",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "2")], "slow down") }),
    );
    let url = spawn_stub(router).await;
    let embedder = HttpEmbedder::new(settings(url, 4)).expect("embedder");
    let err = embedder.embed("q").await.unwrap_err();
    assert!(matches!(err, Error::Connectivity { stage: Stage::Embedder, .. }), "{err}");
    assert!(err.to_string().contains("retry after 2"));
}

#[tokio::test]
async fn http_embedder_surfaces_api_error_message() {
    let router = Router::new().route(
        "/v1/embeddings",
        post(|| async {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": { "message": "model not found", "type": "invalid_request_error" } })))
        }),
    );
    let url = spawn_stub(router).await;
    let embedder = HttpEmbedder::new(settings(url, 4)).expect("embedder");
    let err = embedder.embed("q").await.unwrap_err();
    assert!(matches!(err, Error::QueryExecution { stage: Stage::Embedder, .. }), "{err}");
    assert!(err.to_string().contains("model not found"));
}

#[tokio::test]
async fn unreachable_endpoint_is_connectivity_error() {
    // bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let embedder = HttpEmbedder::new(settings(format!("http://{addr}/v1/embeddings"), 4)).expect("embedder");
    let err = embedder.embed("q").await.unwrap_err();
    assert!(matches!(err, Error::Connectivity { stage: Stage::Embedder, .. }), "{err}");
}
