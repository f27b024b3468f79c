//! End-to-end tests against a stub HTTP server and an in-process websocket
//! server.

use crate::auth::{compute_digest, header_value, Credential, Signer};
use crate::client::{ClientConfig, KciClient, ReqwestTransport, StreamConfig};
use crate::error::KciError;
use crate::types::Body;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::Method;
use mockito::Matcher;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn test_client(base_url: &str, stream_base_url: &str) -> anyhow::Result<KciClient> {
    let config = ClientConfig::new("kci.test", "ak", "sk")
        .with_base_url(base_url)
        .with_stream_base_url(stream_base_url);
    let transport = ReqwestTransport::new(reqwest::Client::builder().no_proxy().build()?);
    Ok(KciClient::with_transport(config, transport))
}

#[derive(Debug, Deserialize, PartialEq)]
struct Build {
    number: u32,
    status: String,
}

#[derive(Serialize)]
struct NewBuild<'a> {
    branch: &'a str,
}

#[tokio::test]
async fn test_get_decodes_json_and_signs() -> anyhow::Result<()> {
    init_tracing();
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/projects/7/builds/3")
        .match_header("authorization", Matcher::Regex("^Qiniu ak:[A-Za-z0-9_=-]{28}$".into()))
        .match_header("user-agent", Matcher::Regex("^kci-client/".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"number":3,"status":"passed"}"#)
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let build: Build = client
        .get("/v1/projects/7/builds/3", &CancellationToken::new())
        .await?;

    assert_eq!(
        build,
        Build {
            number: 3,
            status: "passed".into()
        }
    );
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_escaped_path_signature_on_the_wire() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let host = server.host_with_port();
    let canonical = format!("GET /v1/info/checkname/my proj\nHost: {host}\n\n");
    let digest = compute_digest(b"sk", canonical.as_bytes())?;

    let mock = server
        .mock("GET", "/v1/info/checkname/my%20proj")
        .match_header("host", host.as_str())
        .match_header("authorization", header_value("ak", &digest).as_str())
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let _: serde_json::Value = client
        .get("/v1/info/checkname/my%20proj", &CancellationToken::new())
        .await?;
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_signature_matches_server_view() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let url = format!("{}/v1/user?page=2", server.url());

    let expected = Signer::new(Credential::new("ak", "sk"))
        .authorization(
            &http::Request::builder()
                .method("GET")
                .uri(&url)
                .body(Body::Empty)?,
        )
        .await?;

    let mock = server
        .mock("GET", "/v1/user")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .match_header("authorization", expected.as_str())
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let _: serde_json::Value = client
        .get("/v1/user?page=2", &CancellationToken::new())
        .await?;
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_not_found_message_is_body() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/projects/404")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let err = client
        .get::<serde_json::Value>("/v1/projects/404", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "not found");
    assert_eq!(err.status(), Some(404));
    Ok(())
}

#[tokio::test]
async fn test_partial_content_is_success() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/projects/7/builds/3")
        .with_status(206)
        .with_body(r#"{"number":3,"status":"running"}"#)
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let build: Build = client
        .get("/v1/projects/7/builds/3", &CancellationToken::new())
        .await?;
    assert_eq!(build.status, "running");
    Ok(())
}

#[tokio::test]
async fn test_unexpected_shape_is_decode_error() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/projects/7/builds/3")
        .with_status(200)
        .with_body(r#"{"unexpected":true}"#)
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let err = client
        .get::<Build>("/v1/projects/7/builds/3", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_decode());
    assert!(!err.is_status());
    Ok(())
}

#[tokio::test]
async fn test_post_sends_json() -> anyhow::Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/projects/7/builds")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(serde_json::json!({ "branch": "main" })))
        .with_status(201)
        .with_body(r#"{"number":4,"status":"pending"}"#)
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let build: Build = client
        .post(
            "/v1/projects/7/builds",
            &NewBuild { branch: "main" },
            &CancellationToken::new(),
        )
        .await?;
    assert_eq!(build.number, 4);
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_file_body_reaches_server() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join(format!("kci-client-upload-{}", std::process::id()));
    tokio::fs::write(&path, b"hello artifact").await?;

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/v1/artifacts/readme")
        .match_header("content-type", "text/plain")
        .match_body("hello artifact")
        .with_status(200)
        .with_body("ok")
        .create_async()
        .await;

    let client = test_client(&server.url(), "ws://127.0.0.1:1")?;
    let answer = client
        .send_body(
            Method::PUT,
            "/v1/artifacts/readme",
            Body::from_file(&path).await?,
            "text/plain",
            &CancellationToken::new(),
        )
        .await?;

    assert_eq!(answer, Bytes::from_static(b"ok"));
    mock.assert_async().await;
    tokio::fs::remove_file(&path).await?;
    Ok(())
}

/// Accept one websocket connection, report the request path and
/// `User-Agent`, then hand the socket to `serve`.
async fn ws_server<F, Fut>(serve: F) -> anyhow::Result<(SocketAddr, oneshot::Receiver<(String, String)>)>
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (seen_tx, seen_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let user_agent = request
                .headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let _ = seen_tx.send((request.uri().path().to_string(), user_agent));
            Ok(response)
        };
        let ws = tokio_tungstenite::accept_hdr_async(tcp, callback).await.unwrap();
        serve(ws).await;
    });

    Ok((addr, seen_rx))
}

async fn send_abc_then_close(mut ws: WebSocketStream<TcpStream>) {
    for text in ["a", "b", "c"] {
        ws.send(Message::text(text)).await.unwrap();
    }
    let _ = ws.close(None).await;
}

#[tokio::test]
async fn test_feed_stream_delivers_in_order_then_closes() -> anyhow::Result<()> {
    init_tracing();
    let (addr, seen) = ws_server(send_abc_then_close).await?;
    let client = test_client("http://127.0.0.1:1", &format!("ws://{addr}"))?;

    let stream = client.feed_stream(42, &CancellationToken::new()).await?;
    let received: Vec<Bytes> = stream.collect().await;

    assert_eq!(
        received,
        vec![
            Bytes::from_static(b"a"),
            Bytes::from_static(b"b"),
            Bytes::from_static(b"c"),
        ]
    );
    let (path, user_agent) = seen.await?;
    assert_eq!(path, "/ws/feed/42");
    assert!(user_agent.starts_with("kci-client/"));
    Ok(())
}

#[tokio::test]
async fn test_log_stream_path() -> anyhow::Result<()> {
    let (addr, seen) = ws_server(send_abc_then_close).await?;
    let client = test_client("http://127.0.0.1:1", &format!("ws://{addr}"))?;

    let mut stream = client.log_stream(7, 12, 1, &CancellationToken::new()).await?;
    assert_eq!(stream.next().await, Some(Bytes::from_static(b"a")));

    let (path, _) = seen.await?;
    assert_eq!(path, "/ws/log/7/12/1");
    Ok(())
}

#[tokio::test]
async fn test_keep_alive_ping_reaches_server() -> anyhow::Result<()> {
    let (ping_tx, ping_rx) = oneshot::channel();
    let (addr, _) = ws_server(move |mut ws| async move {
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Ping(payload) = message {
                let _ = ping_tx.send(payload);
                break;
            }
        }
    })
    .await?;

    let config = ClientConfig::new("kci.test", "ak", "sk")
        .with_stream_base_url(format!("ws://{addr}"))
        .with_stream_config(StreamConfig {
            keep_alive_period: Duration::from_millis(50),
            ..StreamConfig::default()
        });
    let client = KciClient::with_config(config)?;

    let _stream = client.feed_stream(1, &CancellationToken::new()).await?;
    let payload = tokio::time::timeout(Duration::from_secs(5), ping_rx).await??;
    assert!(payload.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stream_through_connect_proxy() -> anyhow::Result<()> {
    let (ws_addr, seen) = ws_server(send_abc_then_close).await?;

    // Minimal CONNECT proxy: answer 200, then splice bytes both ways.
    let proxy = TcpListener::bind("127.0.0.1:0").await?;
    let proxy_addr = proxy.local_addr()?;
    tokio::spawn(async move {
        let (mut inbound, _) = proxy.accept().await.unwrap();
        let mut head = Vec::new();
        let mut byte = [0u8; 1];
        while !head.ends_with(b"\r\n\r\n") {
            inbound.read_exact(&mut byte).await.unwrap();
            head.push(byte[0]);
        }
        let request = String::from_utf8(head).unwrap();
        let target = request.split_whitespace().nth(1).unwrap().to_string();
        let mut outbound = TcpStream::connect(target).await.unwrap();
        inbound
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await
            .unwrap();
        let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
    });

    let config = ClientConfig::new("kci.test", "ak", "sk")
        .with_stream_base_url(format!("ws://{ws_addr}"))
        .with_proxy(format!("http://{proxy_addr}"));
    let client = KciClient::with_config(config)?;

    let received: Vec<Bytes> = client
        .feed_stream(9, &CancellationToken::new())
        .await?
        .collect()
        .await;
    assert_eq!(received.len(), 3);
    assert_eq!(seen.await?.0, "/ws/feed/9");
    Ok(())
}

#[tokio::test]
async fn test_dial_failure_is_returned() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let client = test_client("http://127.0.0.1:1", &format!("ws://{addr}"))?;
    let result = client.feed_stream(1, &CancellationToken::new()).await;
    assert!(matches!(result, Err(KciError::Stream(_))));
    Ok(())
}

#[tokio::test]
async fn test_caller_close_ends_open_stream() -> anyhow::Result<()> {
    let (addr, _) = ws_server(|mut ws| async move {
        ws.send(Message::text("first")).await.unwrap();
        // Hold the connection open until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await?;
    let client = test_client("http://127.0.0.1:1", &format!("ws://{addr}"))?;
    let cancel = CancellationToken::new();

    let mut stream = client.feed_stream(1, &cancel).await?;
    assert_eq!(stream.next().await, Some(Bytes::from_static(b"first")));

    cancel.cancel();
    let rest = tokio::time::timeout(Duration::from_secs(5), stream.collect::<Vec<_>>()).await?;
    assert!(rest.is_empty());
    Ok(())
}
