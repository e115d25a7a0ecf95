use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use storylight::sync::background::{Background, router};
use storylight::sync::store::LocalFsArticleStore;
use tower::ServiceExt as _;

async fn post(app: axum::Router, message: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/messages")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&message).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn messages_round_trip_through_the_local_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LocalFsArticleStore::new(dir.path()));
    let app = router(Arc::new(Background::new(store)));

    let (status, ack) = post(
        app.clone(),
        serde_json::json!({
            "type": "sendArticleContent",
            "element": {"method": ["id", "path"], "id": "story", "path": [1]},
            "url": "https://news.example/bridge",
            "title": "Bridge vote delayed",
            "author": "Ann Lee",
            "date": "April 6, 2021",
            "paragraphs": ["p1", "p2"],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack, serde_json::json!({"recieved": true}));

    let (_, ack) = post(
        app.clone(),
        serde_json::json!({
            "type": "saveArticleColors",
            "url": "https://news.example/bridge",
            "colors": ["#ff0000", "#000000"],
        }),
    )
    .await;
    assert_eq!(ack["recieved"], true);

    let (status, found) = post(
        app.clone(),
        serde_json::json!({"type": "checkArticleContent", "url": "https://news.example/bridge"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        found,
        serde_json::json!({
            "exists": true,
            "article": {
                "element": {"method": ["id", "path"], "id": "story", "path": [1]},
                "colors": ["#ff0000", "#000000"],
                "paragraphs": ["p1", "p2"],
            }
        })
    );

    let (_, ack) = post(app, serde_json::json!({"type": "colorUpdate", "color": "#ff0000"})).await;
    assert_eq!(ack, serde_json::json!({"recieved": true}));
}

#[tokio::test]
async fn unknown_message_types_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(Arc::new(Background::new(Arc::new(LocalFsArticleStore::new(
        dir.path(),
    )))));

    let (status, _) = post(app, serde_json::json!({"type": "selfDestruct"})).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn healthz_responds_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = router(Arc::new(Background::new(Arc::new(LocalFsArticleStore::new(
        dir.path(),
    )))));

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
