use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use quire_server::config::{SeedDocument, ServerConfig};
use quire_server::{AppState, router};
use quire_sync::persist::{DocumentRecord, SaveResponse};
use tower::ServiceExt;

fn state() -> AppState {
    let mut config = ServerConfig::default();
    config.storage.seed.push(SeedDocument {
        doc_id: 7,
        name: "guide".into(),
        markdown: "# Guide".into(),
    });
    AppState::new(&config)
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn save(doc_id: i64, body: &str) -> Request<Body> {
    Request::post(format!("/api/documents/{doc_id}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = router(state())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: serde_json::Value = body_json(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["documents"], 1);
    assert_eq!(health["rooms"], 0);
}

#[tokio::test]
async fn test_socket_without_document_redirects() {
    for uri in [
        "/ws/markdown",
        "/ws/markdown?DocName=&DocId=3",
        "/ws/markdown?DocName=x&DocId=0",
        "/ws/markdown?DocName=x&DocId=abc",
    ] {
        let response = router(state())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND, "{uri}");
        assert_eq!(response.headers()[header::LOCATION], "/");
    }
}

#[tokio::test]
async fn test_socket_without_upgrade_is_rejected() {
    let response = router(state())
        .oneshot(
            Request::get("/ws/markdown?DocName=guide&DocId=7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_get_document() {
    let response = router(state())
        .oneshot(Request::get("/api/documents/7").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record: DocumentRecord = body_json(response).await;
    assert_eq!(record.markdown, "# Guide");
    assert_eq!(record.version, 1);

    let missing = router(state())
        .oneshot(Request::get("/api/documents/8").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_save_then_conflict_then_cover() {
    let app = router(state());

    let response = app
        .clone()
        .oneshot(save(7, r##"{"markdown":"# Guide v2","version":1}"##))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply: SaveResponse = body_json(response).await;
    assert_eq!(reply.data.unwrap().version, 2);

    let response = app
        .clone()
        .oneshot(save(7, r#"{"markdown":"stale","version":1}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let reply: SaveResponse = body_json(response).await;
    assert_eq!(reply.errcode, 6005);
    assert_eq!(reply.data.unwrap().version, 2);

    let response = app
        .clone()
        .oneshot(save(7, r#"{"markdown":"forced","version":1,"cover":true}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/api/documents/7").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let record: DocumentRecord = body_json(response).await;
    assert_eq!(record.markdown, "forced");
    assert_eq!(record.version, 3);
}

#[tokio::test]
async fn test_save_unknown_document() {
    let response = router(state())
        .oneshot(save(99, r#"{"markdown":"x","version":1}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
