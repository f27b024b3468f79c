//! Websocket message streams.
//!
//! A stream moves through three states:
//!
//! ```text
//! Connecting ──handshake ok──► Open ──read error / peer close / ping failure / cancel──► Closed
//!      │
//!      └──dial error──► error returned from `open`
//! ```
//!
//! While open, two tasks run side by side:
//!
//! - the **reader** pulls frames and pushes text/binary payloads, in order,
//!   onto a bounded queue. A full queue stalls it; that bound on memory is
//!   the accepted cost of a slow consumer.
//! - the **keep-alive pinger** sends an empty ping every period, each with a
//!   short write deadline. A failed ping cancels the stream.
//!
//! Only the reader closes the socket, exactly once, after which the queue
//! closes and drains. Consumers see `None`; they cannot tell a clean end from
//! a failure and should re-open if they want more.
//!
//! # Examples
//!
//! ```ignore
//! use kci_client::client::{StreamConfig, StreamConsumer};
//! use tokio_util::sync::CancellationToken;
//!
//! let consumer = StreamConsumer::new(StreamConfig::default());
//! let cancel = CancellationToken::new();
//! let mut stream = consumer
//!     .open("wss://kci.example.com/ws/feed/42", http::HeaderMap::new(), &cancel)
//!     .await?;
//!
//! while let Some(message) = stream.next().await {
//!     println!("{}", String::from_utf8_lossy(&message));
//! }
//! ```

use super::config::StreamConfig;
use super::utils::{http_equivalent, ProxyRules};
use crate::error::{KciError, Result};
use crate::types::StreamMessage;
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use http::header::USER_AGENT;
use http::{HeaderMap, HeaderValue, Uri};
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::proxy::matcher::Intercept;
use std::fmt::Display;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::UrlError;
use tokio_tungstenite::tungstenite::handshake::client::Request as HandshakeRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::ServiceExt;
use tracing::{debug, trace, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens message streams.
#[derive(Debug, Clone, Default)]
pub struct StreamConsumer {
    config: StreamConfig,
}

impl StreamConsumer {
    /// Create a consumer with the given settings.
    pub fn new(config: StreamConfig) -> Self {
        StreamConsumer { config }
    }

    /// The settings in use.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Dial `uri` and start the reader and the keep-alive pinger.
    ///
    /// `headers` are added to the handshake after the configured
    /// `User-Agent`, replacing it if they carry one. Cancelling `cancel`
    /// aborts the dial or, later, closes the stream.
    ///
    /// # Errors
    ///
    /// Handshake, TLS, proxy and URL errors. Nothing that happens after the
    /// stream is open is reported here.
    pub async fn open(
        &self,
        uri: &str,
        headers: HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<MessageStream> {
        let mut request = uri.into_client_request()?;
        if let Some(user_agent) = &self.config.user_agent {
            request
                .headers_mut()
                .insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
        }
        request.headers_mut().extend(headers);

        let socket = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(KciError::Cancelled),
            socket = dial(request, self.config.proxy_url.as_deref()) => socket?,
        };
        debug!(uri, "Stream open");

        let (sink, source) = socket.split();
        Ok(spawn_pumps(sink, source, &self.config, cancel.child_token()))
    }
}

/// Ordered, bounded channel of payloads from one open stream.
///
/// Yields `None` once the stream has closed and every buffered payload has
/// been delivered. Dropping it closes the stream.
pub struct MessageStream {
    receiver: ReceiverStream<StreamMessage>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl MessageStream {
    fn new(receiver: mpsc::Receiver<StreamMessage>, cancel: CancellationToken) -> Self {
        MessageStream {
            receiver: ReceiverStream::new(receiver),
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Receive the next payload, or `None` after closure.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        StreamExt::next(&mut self.receiver).await
    }

    /// Ask the stream to close. Payloads already queued can still be read.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether closure has been requested or has happened.
    pub fn is_closing(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for MessageStream {
    type Item = StreamMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

/// Start the reader and the pinger over an already split socket.
pub(crate) fn spawn_pumps<S, R, E>(
    sink: S,
    source: R,
    config: &StreamConfig,
    cancel: CancellationToken,
) -> MessageStream
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send + 'static,
    R: Stream<Item = std::result::Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let writer = Arc::new(SocketWriter::new(sink, config.write_deadline));

    tokio::spawn(read_loop(source, tx, writer.clone(), cancel.clone()));
    tokio::spawn(keep_alive(writer, config.keep_alive_period, cancel.clone()));

    MessageStream::new(rx, cancel)
}

/// Write half of the socket, shared by the pinger and the reader
/// (the single close).
struct SocketWriter<S> {
    sink: Mutex<S>,
    closed: AtomicBool,
    deadline: Duration,
}

impl<S> SocketWriter<S>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    fn new(sink: S, deadline: Duration) -> Self {
        SocketWriter {
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
            deadline,
        }
    }

    /// Send one empty ping within the write deadline.
    async fn ping(&self) -> std::result::Result<(), String> {
        if self.closed.load(Ordering::Acquire) {
            return Err("socket already closed".to_string());
        }
        let mut sink = self.sink.lock().await;
        match timeout(self.deadline, sink.send(Message::Ping(Bytes::new()))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("write deadline of {:?} exceeded", self.deadline)),
        }
    }

    /// Close the socket. Only the first call does anything.
    async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut sink = self.sink.lock().await;
        match timeout(self.deadline, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Socket close reported an error"),
            Err(_) => debug!("Socket close timed out"),
        }
        true
    }
}

async fn read_loop<R, E, S>(
    mut source: R,
    tx: mpsc::Sender<StreamMessage>,
    writer: Arc<SocketWriter<S>>,
    cancel: CancellationToken,
) where
    R: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut delivered: u64 = 0;

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stream reader cancelled");
                break;
            }
            frame = source.next() => frame,
        };

        let payload = match frame {
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Text(text))) => Bytes::from(text),
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Peer closed stream");
                break;
            }
            // Ping, pong and raw frames carry nothing for the consumer.
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(error = %e, "Stream read failed");
                break;
            }
            None => {
                debug!("Stream ended");
                break;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(payload) => {
                if sent.is_err() {
                    debug!("Stream consumer went away");
                    break;
                }
            }
        }
        delivered += 1;
    }

    cancel.cancel();
    writer.close().await;
    drop(tx);
    debug!(delivered, "Stream closed");
}

async fn keep_alive<S>(writer: Arc<SocketWriter<S>>, period: Duration, cancel: CancellationToken)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if let Err(reason) = writer.ping().await {
            warn!(%reason, "Keep-alive ping failed, closing stream");
            cancel.cancel();
            return;
        }
        trace!("Keep-alive ping sent");
    }
}

/// Handshake directly or through an HTTP `CONNECT` tunnel.
async fn dial(request: HandshakeRequest, explicit_proxy: Option<&str>) -> Result<Socket> {
    if request.uri().host().is_none() {
        return Err(KciError::Stream(UrlError::NoHostName.into()));
    }
    let rules = match explicit_proxy {
        Some(proxy) => ProxyRules::explicit(proxy)?,
        None => ProxyRules::from_env(),
    };

    match rules.intercept(request.uri()) {
        Some(proxy) => {
            let target = http_equivalent(request.uri())?;
            debug!(proxy = %proxy.uri(), %target, "Dialing stream through proxy");
            let tunnel = connect_tunnel(&proxy, target).await?;
            let (socket, _) = tokio_tungstenite::client_async_tls(request, tunnel).await?;
            Ok(socket)
        }
        None => {
            let (socket, _) = tokio_tungstenite::connect_async(request).await?;
            Ok(socket)
        }
    }
}

/// Open a TCP tunnel to `target` through an HTTP proxy.
async fn connect_tunnel(proxy: &Intercept, target: Uri) -> Result<TcpStream> {
    let mut tunnel = Tunnel::new(proxy.uri().clone(), HttpConnector::new());
    if let Some(auth) = proxy.basic_auth() {
        tunnel = tunnel.with_auth(auth.clone());
    }
    let io = tunnel
        .oneshot(target)
        .await
        .map_err(|e| KciError::Proxy(format!("CONNECT via {} failed: {e}", proxy.uri())))?;
    Ok(io.into_inner())
}
