//! Router-level tests: key gate, rate limits, and every route against an
//! in-memory provider.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{app_with, prediction, FakeSource, ACCESS_KEY};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot`

fn request(method: Method, uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", ACCESS_KEY)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

fn generate(prompt: &str, client: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header("x-api-key", ACCESS_KEY)
        .header("x-forwarded-for", client)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "prompt": prompt }).to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn sample_app() -> (Router, Arc<FakeSource>) {
    let source = Arc::new(
        FakeSource::with(vec![
            prediction(
                "done",
                "succeeded",
                &["https://cdn/done/out-0.png", "https://cdn/done/out-1.jpg"],
            ),
            prediction("busy", "processing", &[]),
        ])
        .file("https://cdn/done/out-0.png", b"png-bytes")
        .file("https://cdn/done/out-1.jpg", b"jpg-bytes"),
    );
    (app_with(source.clone()), source)
}

#[tokio::test]
async fn missing_or_wrong_key_is_forbidden_before_any_handler() {
    let (app, source) = sample_app();

    let no_key = Request::builder().uri("/predictions").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(no_key).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["detail"], "Invalid Key, try again.");

    let wrong_key = Request::builder()
        .method(Method::POST)
        .uri("/generate")
        .header("x-api-key", "nope")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"prompt": "TOK"}"#))
        .unwrap();
    let response = app.oneshot(wrong_key).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn root_is_limited_to_two_requests_per_five_seconds() {
    let (app, _) = sample_app();
    for _ in 0..2 {
        let response = app.clone().oneshot(request(Method::GET, "/", "10.1.1.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(request(Method::GET, "/", "10.1.1.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after <= 5);

    // Another client, and another route for the same client, are unaffected
    let response = app.clone().oneshot(request(Method::GET, "/", "10.2.2.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(request(Method::GET, "/predictions", "10.1.1.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn generate_returns_created_view() {
    let (app, source) = sample_app();
    let response = app.oneshot(generate("a photo of TOK person", "10.3.3.3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["url"], format!("/predictions/{}", id));
    assert_eq!(body["status"], "starting");
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn generate_without_trigger_word_is_a_server_error() {
    let (app, source) = sample_app();
    let response = app.oneshot(generate("a photo of a person", "10.4.4.4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["detail"], "TOK was not included");
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn generate_is_limited_to_two_per_five_seconds() {
    let (app, _) = sample_app();
    for _ in 0..2 {
        let response = app.clone().oneshot(generate("TOK", "10.5.5.5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.oneshot(generate("TOK", "10.5.5.5")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn listing_routes_filter_by_status() {
    let (app, _) = sample_app();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/predictions", "10.6.6.6"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let all = body_json(response).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/predictions?status=succeeded", "10.6.6.6"))
        .await
        .unwrap();
    let done = body_json(response).await;
    assert_eq!(done.as_array().unwrap().len(), 1);
    assert_eq!(done[0]["url"], "/predictions/done");

    let response = app.oneshot(request(Method::GET, "/processing", "10.6.6.6")).await.unwrap();
    let busy = body_json(response).await;
    assert_eq!(busy.as_array().unwrap().len(), 1);
    assert_eq!(busy[0]["id"], "busy");
    assert_eq!(busy[0]["started_at"], "2024-03-01T10:00:01Z");
}

#[tokio::test]
async fn unrecognised_status_filter_matches_exactly() {
    let source = Arc::new(FakeSource::with(vec![
        prediction("odd", "aborted", &[]),
        prediction("ok", "succeeded", &[]),
    ]));
    let app = app_with(source);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/predictions?status=bogus", "10.6.7.8"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!([]));

    let response = app
        .oneshot(request(Method::GET, "/predictions?status=aborted", "10.6.7.8"))
        .await
        .unwrap();
    let odd = body_json(response).await;
    assert_eq!(odd.as_array().unwrap().len(), 1);
    assert_eq!(odd[0]["id"], "odd");
    assert_eq!(odd[0]["status"], "aborted");
}

#[tokio::test]
async fn detail_lists_file_links() {
    let (app, _) = sample_app();
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/predictions/done", "10.7.7.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["model"], "owner/portrait");
    assert_eq!(body["num_outputs"], 2);
    assert_eq!(
        body["files"],
        serde_json::json!(["/predictions/done/files/0.png", "/predictions/done/files/1.jpg"])
    );

    let response = app
        .oneshot(request(Method::GET, "/predictions/missing", "10.7.7.7"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn detail_logs_provider_failures_but_not_misses() {
    let (app, _) = sample_app();
    let logs = LogCapture::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/predictions/missing", "10.7.8.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!String::from_utf8_lossy(&logs.0.lock().unwrap()).contains("ERROR"));

    let response = app
        .oneshot(request(Method::GET, "/predictions/boom", "10.7.8.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let output = String::from_utf8_lossy(&logs.0.lock().unwrap()).to_string();
    assert!(output.contains("ERROR"), "{}", output);
    assert!(output.contains("Failed to get prediction boom"), "{}", output);
}

#[tokio::test]
async fn file_download_streams_bytes_with_inferred_type() {
    let (app, _) = sample_app();
    let response = app
        .clone()
        .oneshot(request(Method::GET, "/predictions/done/files/0.png", "10.8.8.8"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&bytes[..], b"png-bytes");

    let response = app
        .oneshot(request(Method::GET, "/predictions/done/files/1.jpg", "10.8.8.8"))
        .await
        .unwrap();
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
}

#[tokio::test]
async fn file_download_rejects_missing_files() {
    let (app, _) = sample_app();
    for uri in [
        "/predictions/done/files/2.png",
        "/predictions/done/files/x.png",
        "/predictions/missing/files/0.png",
        "/predictions/busy/files/0.jpg",
    ] {
        let response = app.clone().oneshot(request(Method::GET, uri, "10.9.9.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn failed_file_fetch_is_a_server_error() {
    let source = Arc::new(FakeSource::with(vec![prediction(
        "gone",
        "succeeded",
        &["https://cdn/gone.png"],
    )]));
    let app = app_with(source);
    let response = app
        .oneshot(request(Method::GET, "/predictions/gone/files/0.png", "10.10.10.10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn spellings_of_one_route_share_a_bucket() {
    let (app, _) = sample_app();
    for _ in 0..1000 {
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/predictions/done/files/0.png", "10.11.11.11"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/predictions/done/files/0.PNG", "10.11.11.11"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let response = app
        .oneshot(request(Method::GET, "/predictions/busy/files/1.jpg", "10.11.11.11"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
