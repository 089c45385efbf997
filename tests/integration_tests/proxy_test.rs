//! Satellite proxy through the HTTP API

use axum::body::Body;
use axum::http::StatusCode;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{
    client::IntoClientRequest,
    handshake::server::{
        ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
    },
    Message,
};
use tower::ServiceExt;
use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use satellite_hub::config::SatelliteConfig;
use satellite_hub::hub::User;

use super::fixtures::*;

#[tokio::test]
async fn test_proxy_preserves_method_query_and_body() {
    let sat = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/resources"))
        .and(query_param("satellite", "dev"))
        .and(query_param("cluster", "clusterX"))
        .and(query_param("name", "nginx"))
        .and(body_string(r#"{"kind":"Pod"}"#))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(header_exists("x-kobs-user"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&sat)
        .await;

    let router = hub(vec![satellite("dev", &sat, Some(TEST_TOKEN))]);
    let response = router
        .oneshot(authenticated(
            "POST",
            "/api/resources?satellite=dev&cluster=clusterX&name=nginx",
            Body::from(r#"{"kind":"Pod"}"#),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_bytes(response).await, "created");

    let received = sat.received_requests().await.unwrap();
    let user: User =
        serde_json::from_slice(received[0].headers.get("x-kobs-user").unwrap().as_bytes()).unwrap();
    assert_eq!(user.email, TEST_USER);
}

#[tokio::test]
async fn test_proxy_put_and_delete() {
    let sat = MockServer::start().await;
    for verb in ["PUT", "DELETE"] {
        Mock::given(method(verb))
            .and(path("/api/resources"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "method": verb })),
            )
            .expect(1)
            .mount(&sat)
            .await;
    }

    let router = hub(vec![satellite("dev", &sat, None)]);
    for verb in ["PUT", "DELETE"] {
        let response = router
            .clone()
            .oneshot(authenticated(
                verb,
                "/api/resources?satellite=dev&cluster=clusterX&namespace=default&name=nginx",
                Body::from("{}"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["method"], verb);
    }
}

#[tokio::test]
async fn test_proxy_passes_upstream_status_and_headers() {
    let sat = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/resources/logs"))
        .and(query_param("container", "nginx"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .insert_header("x-satellite", "dev")
                .set_body_string("line 1\nline 2\n"),
        )
        .mount(&sat)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/resources/file"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json(SAMPLE_ERROR_JSON)))
        .mount(&sat)
        .await;

    let router = hub(vec![satellite("dev", &sat, None)]);

    let response = router
        .clone()
        .oneshot(authenticated(
            "GET",
            "/api/resources/logs?satellite=dev&container=nginx",
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.headers()["x-satellite"], "dev");
    assert_eq!(body_bytes(response).await, "line 1\nline 2\n");

    let response = router
        .oneshot(authenticated(
            "GET",
            "/api/resources/file?satellite=dev&srcPath=/etc/hosts",
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "could not get resources");
}

#[tokio::test]
async fn test_proxy_unknown_satellite_is_not_found() {
    let router = hub(Vec::new());

    let response = router
        .oneshot(authenticated("GET", "/api/resources?satellite=prod", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "satellite not found: prod");
}

#[tokio::test]
async fn test_proxy_without_satellite_parameter() {
    let router = hub(Vec::new());

    let response = router
        .oneshot(authenticated("GET", "/api/resources/logs?cluster=clusterX", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_proxy_requires_user() {
    let sat = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&sat)
        .await;

    let router = hub(vec![satellite("dev", &sat, None)]);
    let response = router
        .oneshot(anonymous("GET", "/api/resources?satellite=dev"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unreachable_satellite_is_bad_gateway() {
    // Nothing listens on the port once the listener is dropped
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let router = hub(vec![SatelliteConfig {
        name: "gone".to_string(),
        address: format!("http://{addr}"),
        token: None,
        connect_timeout_secs: 1,
    }]);

    let response = router
        .oneshot(authenticated("GET", "/api/resources?satellite=gone", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

/// Satellite config for a raw TCP listener
fn raw_satellite(name: &str, addr: std::net::SocketAddr) -> SatelliteConfig {
    SatelliteConfig {
        name: name.to_string(),
        address: format!("http://{addr}"),
        token: None,
        connect_timeout_secs: 5,
    }
}

/// Read from the socket until `needle` has arrived, false on EOF
async fn read_until(stream: &mut TcpStream, buf: &mut Vec<u8>, needle: &[u8]) -> bool {
    let mut chunk = [0u8; 1024];
    while !buf.windows(needle.len()).any(|w| w == needle) {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return false;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    true
}

#[tokio::test]
async fn test_response_body_is_streamed_before_upstream_finishes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    // Satellite sends one log line, then keeps the response open
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        assert!(read_until(&mut stream, &mut buf, b"\r\n\r\n").await);

        stream
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ntransfer-encoding: chunked\r\n\r\n\
                  7\r\nline 1\n\r\n",
            )
            .await
            .unwrap();
        stream.flush().await.unwrap();

        let _ = release_rx.await;
        let _ = stream.write_all(b"7\r\nline 2\n\r\n0\r\n\r\n").await;
    });

    let router = hub(vec![raw_satellite("dev", addr)]);
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        router.oneshot(authenticated(
            "GET",
            "/api/resources/logs?satellite=dev&follow=true",
            Body::empty(),
        )),
    )
    .await
    .expect("response headers should arrive while the body is open")
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("first chunk should arrive while the body is open")
        .unwrap()
        .unwrap();
    assert_eq!(first, "line 1\n");

    // Nothing more until the satellite continues
    assert!(tokio::time::timeout(Duration::from_millis(200), body.next())
        .await
        .is_err());

    release_tx.send(()).unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(second, "line 2\n");
}

#[tokio::test]
async fn test_request_body_is_streamed_before_client_finishes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (first_tx, first_rx) = oneshot::channel::<()>();

    // Satellite reports the first part, answers once the upload is complete
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        assert!(read_until(&mut stream, &mut buf, b"first-part").await);
        let _ = first_tx.send(());

        assert!(read_until(&mut stream, &mut buf, b"\r\n0\r\n\r\n").await);
        let received = String::from_utf8_lossy(&buf).into_owned();
        let reply = if received.contains("second-part") { "ok" } else { "no" };
        let response = format!("HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\n{reply}");
        stream.write_all(response.as_bytes()).await.unwrap();
    });

    let (chunk_tx, chunk_rx) = mpsc::channel::<Bytes>(4);
    let upload = futures_util::stream::unfold(chunk_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, std::io::Error>(chunk), rx))
    });

    let router = hub(vec![raw_satellite("dev", addr)]);
    let call = tokio::spawn(router.oneshot(authenticated(
        "POST",
        "/api/resources/file?satellite=dev&destPath=/tmp",
        Body::from_stream(upload),
    )));

    chunk_tx.send(Bytes::from_static(b"first-part")).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), first_rx)
        .await
        .expect("satellite should see the first part while the upload is open")
        .unwrap();

    chunk_tx.send(Bytes::from_static(b"second-part")).await.unwrap();
    drop(chunk_tx);

    let response = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, "ok");
}

#[tokio::test]
async fn test_terminal_websocket_is_relayed() {
    // Satellite side: echo text frames and report the forwarded identity
    let satellite_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let satellite_addr = satellite_listener.local_addr().unwrap();
    let (user_tx, user_rx) = oneshot::channel::<Option<String>>();

    tokio::spawn(async move {
        let (stream, _) = satellite_listener.accept().await.unwrap();
        let callback = move |request: &HandshakeRequest,
                             response: HandshakeResponse|
              -> Result<HandshakeResponse, ErrorResponse> {
            let user = request
                .headers()
                .get("x-kobs-user")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let _ = user_tx.send(user);
            Ok(response)
        };
        let mut socket = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                let reply = format!("echo: {}", text.as_str());
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Hub in front of it, served on a real socket for the upgrade
    let router = hub(vec![SatelliteConfig {
        name: "dev".to_string(),
        address: format!("http://{satellite_addr}"),
        token: None,
        connect_timeout_secs: 5,
    }]);
    let hub_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let hub_addr = hub_listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(hub_listener, router).await.unwrap();
    });

    let mut request = format!(
        "ws://{hub_addr}/api/resources/terminal?satellite=dev&cluster=clusterX&namespace=default&name=nginx&container=nginx&shell=bash"
    )
    .into_client_request()
    .unwrap();
    request
        .headers_mut()
        .insert("x-forwarded-email", TEST_USER.parse().unwrap());

    let (mut client, _) = tokio_tungstenite::connect_async(request).await.unwrap();
    client.send(Message::Text("ls -la".into())).await.unwrap();

    let reply = tokio::time::timeout(std::time::Duration::from_secs(5), client.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply.to_text().unwrap(), "echo: ls -la");

    let user: User = serde_json::from_str(&user_rx.await.unwrap().unwrap()).unwrap();
    assert_eq!(user.email, TEST_USER);
}
