//! Local HTTP fixtures for probe tests.

use axum::{http::StatusCode, response::Redirect, routing::get, Router};
use std::time::Duration;

/// Start a throwaway server on `127.0.0.1:0` and return its base URL.
///
/// Routes: `/` (200), `/missing` (404), `/redirect` (307 to `/`),
/// `/hang` (responds after 30s).
pub async fn spawn_test_server() -> String {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "missing") }))
        .route("/redirect", get(|| async { Redirect::temporary("/") }))
        .route(
            "/hang",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// URL of a local port with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
