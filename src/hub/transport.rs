//! Streaming transport for proxied satellite traffic
//!
//! Plain HTTP exchanges are relayed as byte streams in both directions.
//! WebSocket upgrades (terminal sessions) are relayed message by message.
//! Neither path buffers a whole body.

use axum::{
    body::Body,
    extract::{
        ws::{self, WebSocket, WebSocketUpgrade},
        FromRequestParts, Request,
    },
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    protocol::{frame::coding::CloseCode, CloseFrame},
};
use url::Url;

use super::identity::USER_HEADER;
use super::HubError;

/// Headers that only apply to a single connection and are never forwarded
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Copy headers, dropping hop-by-hop headers and `Host`
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        if HOP_BY_HOP.contains(name) || name == header::HOST {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }

    forwarded
}

/// Check if the request asks for a WebSocket upgrade
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Join the request path and query onto a satellite base address
pub fn target_url(base: &Url, request: &Request) -> Result<Url, HubError> {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    base.join(path_and_query)
        .map_err(|e| HubError::Upstream(format!("invalid proxy target: {e}")))
}

// ============================================================================
// HTTP
// ============================================================================

/// Forward an HTTP exchange, streaming the request and response bodies.
///
/// `extra` headers are set on the outgoing request after the original
/// headers are copied, replacing values with the same name.
pub async fn forward_http(
    client: &reqwest::Client,
    target: Url,
    request: Request,
    extra: HeaderMap,
) -> Result<Response, HubError> {
    let (parts, body) = request.into_parts();

    let mut headers = forwardable_headers(&parts.headers);
    for (name, value) in extra {
        if let Some(name) = name {
            headers.insert(name, value);
        }
    }

    let upstream = client
        .request(parts.method, target)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .map_err(|e| HubError::Upstream(format!("proxy request failed: {e}")))?;

    let mut response = Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        *headers = forwardable_headers(upstream.headers());
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| HubError::Upstream(format!("invalid proxy response: {e}")))
}

// ============================================================================
// WebSocket
// ============================================================================

/// Accept the client's WebSocket upgrade and relay it to the satellite
pub async fn forward_websocket(
    target: Url,
    request: Request,
    extra: HeaderMap,
) -> Result<Response, HubError> {
    let mut target = target;
    let scheme = match target.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    target
        .set_scheme(scheme)
        .map_err(|_| HubError::Upstream(format!("cannot relay websocket to {target}")))?;

    let (mut parts, _body) = request.into_parts();
    let upgrade = WebSocketUpgrade::from_request_parts(&mut parts, &())
        .await
        .map_err(|e| HubError::BadRequest(format!("invalid websocket upgrade: {e}")))?;

    let mut upstream_request = target
        .as_str()
        .into_client_request()
        .map_err(|e| HubError::Upstream(format!("invalid websocket target: {e}")))?;
    for (name, value) in extra {
        if let Some(name) = name {
            upstream_request.headers_mut().insert(name, value);
        }
    }
    for name in [
        header::COOKIE,
        header::ORIGIN,
        HeaderName::from_static(USER_HEADER),
    ] {
        if let Some(value) = parts.headers.get(&name) {
            upstream_request.headers_mut().insert(name, value.clone());
        }
    }

    Ok(upgrade
        .on_upgrade(move |socket| relay(socket, upstream_request))
        .into_response())
}

async fn relay(
    client: WebSocket,
    upstream_request: tungstenite::handshake::client::Request,
) {
    let uri = upstream_request.uri().clone();

    let upstream = match tokio_tungstenite::connect_async(upstream_request).await {
        Ok((upstream, _)) => upstream,
        Err(e) => {
            tracing::error!(
                target_uri = %uri,
                error = %e,
                "Failed to connect websocket to satellite"
            );
            let mut client = client;
            let _ = client
                .send(ws::Message::Close(Some(ws::CloseFrame {
                    code: 1011,
                    reason: "satellite unreachable".into(),
                })))
                .await;
            return;
        }
    };

    tracing::debug!(target_uri = %uri, "Websocket relay established");

    let (mut client_sink, mut client_stream) = client.split();
    let (mut upstream_sink, mut upstream_stream) = upstream.split();

    let client_to_upstream = async move {
        while let Some(msg) = client_stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, "Client websocket error");
                    break;
                }
            };
            let closing = matches!(msg, ws::Message::Close(_));
            if let Err(e) = upstream_sink.send(to_upstream(msg)).await {
                tracing::debug!(error = %e, "Failed to send to satellite");
                break;
            }
            if closing {
                break;
            }
        }
    };

    let upstream_to_client = async move {
        while let Some(msg) = upstream_stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!(error = %e, "Satellite websocket error");
                    break;
                }
            };
            let Some(msg) = to_client(msg) else {
                continue;
            };
            let closing = matches!(msg, ws::Message::Close(_));
            if let Err(e) = client_sink.send(msg).await {
                tracing::debug!(error = %e, "Failed to send to client");
                break;
            }
            if closing {
                break;
            }
        }
    };

    tokio::select! {
        _ = client_to_upstream => {
            tracing::debug!(target_uri = %uri, "Client side of websocket relay ended");
        }
        _ = upstream_to_client => {
            tracing::debug!(target_uri = %uri, "Satellite side of websocket relay ended");
        }
    }
}

fn to_upstream(msg: ws::Message) -> tungstenite::Message {
    match msg {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().to_owned().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|f| CloseFrame {
            code: CloseCode::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
    }
}

fn to_client(msg: tungstenite::Message) -> Option<ws::Message> {
    let msg = match msg {
        tungstenite::Message::Text(text) => ws::Message::Text(text.as_str().to_owned().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|f| ws::CloseFrame {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    };
    Some(msg)
}

/// Build a header map from name/value pairs, skipping invalid entries
pub fn header_map(
    pairs: impl IntoIterator<Item = (&'static str, Option<HeaderValue>)>,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        if let Some(value) = value {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers
}
