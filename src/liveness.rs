//! Liveness page for hosts that ping the process over HTTP to keep it running.

use crate::error::ConnectionError;
use axum::{response::Html, routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Server</title>
    <style>
        body {
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
        }
        .container {
            text-align: center;
            font-family: 'Roboto', sans-serif;
        }
        p {
            font-size: 24px;
        }
        img {
            max-width: 50%;
            height: auto;
        }
    </style>
</head>
<body>
    <div class="container">
        <p>Server online</p>
        <img src="https://media.tenor.com/Pi7beezalFkAAAAi/spinning.gif">
    </div>
</body>
</html>"#;

/// Serves the static status page on `/`.
pub fn router() -> Router {
    Router::new().route("/", get(index))
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

/// Bind the listener for [`router`]. A taken port is a startup error.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, ConnectionError> {
    TcpListener::bind(addr).await.map_err(ConnectionError::Liveness)
}

/// Serve the page until the listener fails.
pub async fn serve(listener: TcpListener) -> Result<(), ConnectionError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "liveness endpoint listening");
    }
    axum::serve(listener, router())
        .await
        .map_err(ConnectionError::Liveness)
}
