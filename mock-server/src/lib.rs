//! Stub HTTP server for exercising the fetch layer end to end.
//!
//! Every route is stateless. `/echo` reflects the request it received so
//! tests can observe exactly what the client sent.

use std::collections::BTreeMap;

use axum::{
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw. Header names are lower-case, as they arrive.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Echo {
    pub method: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/ok", get(ok))
        .route("/json", get(json))
        .route("/lines", get(lines))
        .route("/redirect", get(redirect))
        .route("/status/{code}", any(status))
        .route("/echo", any(echo))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    tracing::info!(addr = ?listener.local_addr().ok(), "stub server listening");
    axum::serve(listener, app()).await
}

async fn ok() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "pong")
}

async fn json() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "hello": "world" }))
}

async fn lines() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "first\r\nsecond\r\n\r\nfourth\r\n")
}

async fn redirect() -> Redirect {
    Redirect::temporary("/ok")
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Echo> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        seen.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    tracing::debug!(%method, headers = seen.len(), body_len = body.len(), "echoing request");
    Json(Echo {
        method: method.to_string(),
        headers: seen,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_serializes_to_json() {
        let echo = Echo {
            method: "POST".to_string(),
            headers: BTreeMap::from([(
                "content-type".to_string(),
                vec!["application/json".to_string()],
            )]),
            body: "{}".to_string(),
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["method"], "POST");
        assert_eq!(json["headers"]["content-type"][0], "application/json");
        assert_eq!(json["body"], "{}");
    }

    #[test]
    fn echo_roundtrips_through_json() {
        let echo = Echo {
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            body: String::new(),
        };
        let text = serde_json::to_string(&echo).unwrap();
        let back: Echo = serde_json::from_str(&text).unwrap();
        assert_eq!(back, echo);
    }
}
