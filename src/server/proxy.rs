use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use reqwest::Url;

use super::AppState;

const PROXY_PREFIX: &str = "/api/proxy";

const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub async fn forward_prefixed(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = path_and_query(&uri);
    let target = raw.strip_prefix(PROXY_PREFIX).unwrap_or(raw);
    forward(&state, method, target, headers, body).await
}

pub async fn forward_bare(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    forward(&state, method, path_and_query(&uri), headers, body).await
}

fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

/// Parses `/<absolute-url>` into the upstream target.
pub fn parse_target(raw: &str) -> Result<Url, String> {
    let target = raw.trim_start_matches('/');
    if target.is_empty() || !target.starts_with("http") {
        return Err("Bad Request: Target URL must start with http:// or https://".to_string());
    }

    let url = Url::parse(target).map_err(|e| format!("Bad Request: {}", e))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err("Bad Request: Target URL must start with http:// or https://".to_string()),
    }
}

async fn forward(state: &AppState, method: Method, raw_target: &str, headers: HeaderMap, body: Bytes) -> Response {
    let url = match parse_target(raw_target) {
        Ok(url) => url,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    tracing::info!("🔄 Proxying {} to: {}", method, url);

    let mut outbound = HeaderMap::new();
    for (name, value) in headers.iter() {
        if !is_hop_by_hop(name) {
            outbound.append(name.clone(), value.clone());
        }
    }
    if !outbound.contains_key(header::CONTENT_TYPE) {
        outbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    let result = state
        .http()
        .request(method, url)
        .headers(outbound)
        .body(body)
        .send()
        .await;

    let upstream = match result {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!("Proxy error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Proxy Error: {}", e)).into_response();
        }
    };

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream.headers().iter() {
        if !is_hop_by_hop(name) {
            response_headers.append(name.clone(), value.clone());
        }
    }

    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("Proxy error reading upstream body: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Proxy Error: {}", e)).into_response();
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name) || name.as_str() == "keep-alive"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::server::{proxy_router, router};
    use crate::testing::spawn_server;
    use axum::routing::any;
    use axum::Router;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Arc::new(Settings::default()), None)
    }

    async fn echo_upstream() -> std::net::SocketAddr {
        let echo = Router::new().route(
            "/x",
            any(|method: Method, uri: Uri, headers: HeaderMap, body: Bytes| async move {
                let auth = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                let reply = format!("{} {} {} {}", method, uri, auth, String::from_utf8_lossy(&body));
                (StatusCode::CREATED, [("x-upstream", "yes")], reply)
            }),
        );
        spawn_server(echo).await
    }

    #[test]
    fn test_parse_target() {
        assert!(parse_target("/not-a-url").is_err());
        assert!(parse_target("/").is_err());
        assert!(parse_target("").is_err());
        assert!(parse_target("/httpfoo").is_err());
        assert!(parse_target("/ftp://example.com").is_err());

        let url = parse_target("/http://example.com/x?y=1").unwrap();
        assert_eq!(url.as_str(), "http://example.com/x?y=1");
        assert!(parse_target("https://api.example.com/v1/chat/completions").is_ok());
    }

    #[tokio::test]
    async fn test_invalid_target_is_400() {
        let addr = spawn_server(router(state())).await;

        let response = reqwest::get(format!("http://{}/api/proxy/not-a-url", addr)).await.unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let response = reqwest::get(format!("http://{}/api/proxy/", addr)).await.unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_forwards_method_headers_body_and_relays_status() {
        let upstream = echo_upstream().await;
        let addr = spawn_server(router(state())).await;

        let response = reqwest::Client::new()
            .put(format!("http://{}/api/proxy/http://{}/x?page=2", addr, upstream))
            .header("authorization", "Bearer abc")
            .body("payload")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(response.headers()["x-upstream"], "yes");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.text().await.unwrap(), "PUT /x?page=2 Bearer abc payload");
    }

    #[tokio::test]
    async fn test_standalone_proxy_mode() {
        let upstream = echo_upstream().await;
        let addr = spawn_server(proxy_router(state())).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/http://{}/x", addr, upstream))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        assert_eq!(response.text().await.unwrap(), "POST /x  {}");

        let response = reqwest::get(format!("http://{}/nothing-here", addr)).await.unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_transport_error_is_500() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let addr = spawn_server(router(state())).await;
        let response = reqwest::get(format!("http://{}/api/proxy/http://{}/x", addr, dead)).await.unwrap();
        assert_eq!(response.status(), 500);
        assert!(response.text().await.unwrap().starts_with("Proxy Error"));
    }
}
