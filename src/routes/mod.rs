//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One page, one websocket, one health check. The board page is compiled
//! into the binary; everything it shows afterwards arrives as frames over
//! `/api/ws`.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_helpers;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn get(path: &str) -> String {
        let (state, _store) = test_helpers::test_app_state();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.expect("server failed");
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.expect("write");
        let mut response = String::new();
        stream.read_to_string(&mut response).await.expect("read");
        response
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        assert!(get("/healthz").await.starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn index_serves_board_page() {
        let response = get("/").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("/api/ws"));
    }

    #[tokio::test]
    async fn board_page_saves_title_on_blur() {
        let response = get("/").await;
        assert!(response.contains(r#"$("title-input").addEventListener("blur""#));
        assert!(!response.contains(r#"$("title-input").addEventListener("change""#));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        assert!(get("/nope").await.starts_with("HTTP/1.1 404"));
    }
}
