//! The signing executor.
//!
//! [`SigningTransport`] intercepts each request right before dispatch, signs
//! it, sets `Authorization` and hands it to the wrapped transport. Signing
//! failures abort the call before any network I/O.

use super::transport::Transport;
use crate::auth::{Credential, Signer};
use crate::error::{KciError, Result};
use crate::types::Body;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Decorator that signs every request sent through it.
#[derive(Debug, Clone)]
pub struct SigningTransport<T> {
    signer: Signer,
    inner: T,
}

impl<T: Transport> SigningTransport<T> {
    /// Wrap `inner`, signing with `credential`.
    pub fn new(credential: Credential, inner: T) -> Self {
        SigningTransport {
            signer: Signer::new(credential),
            inner,
        }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The signer in use.
    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Sign and send, giving up with [`KciError::Cancelled`] as soon as
    /// `cancel` fires. A token that is already cancelled prevents any work.
    pub async fn execute(
        &self,
        request: Request<Body>,
        cancel: &CancellationToken,
    ) -> Result<Response<Bytes>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Request cancelled by caller");
                Err(KciError::Cancelled)
            }
            result = self.send(request) => result,
        }
    }
}

#[async_trait]
impl<T: Transport> Transport for SigningTransport<T> {
    async fn send(&self, mut request: Request<Body>) -> Result<Response<Bytes>> {
        self.signer.sign_request(&mut request).await?;
        self.inner.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::AUTHORIZATION;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records what reaches the network and answers 200.
    #[derive(Default)]
    struct RecordingTransport {
        calls: AtomicUsize,
        seen: Mutex<Vec<(Option<String>, Bytes)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: Request<Body>) -> Result<Response<Bytes>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let auth = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = request.body().load().await?;
            self.seen.lock().unwrap().push((auth, body));
            Ok(Response::new(Bytes::from_static(b"ok")))
        }
    }

    fn post(body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("https://kci.example.com/v1/project")
            .header("content-type", "application/json")
            .header(AUTHORIZATION, "caller-set")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_signs_then_forwards_body_intact() {
        let inner = Arc::new(RecordingTransport::default());
        let transport = SigningTransport::new(Credential::new("ak", "sk"), inner.clone());

        let expected = transport
            .signer()
            .authorization(&post(Body::from("{}")))
            .await
            .unwrap();
        let response = transport
            .execute(post(Body::from("{}")), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.body(), &Bytes::from_static(b"ok"));

        let seen = inner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.as_deref(), Some(expected.as_str()));
        assert_eq!(seen[0].1, Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn test_signing_failure_skips_network() {
        let inner = Arc::new(RecordingTransport::default());
        let transport = SigningTransport::new(Credential::new("ak", "sk"), inner.clone());

        let request = post(Body::File {
            path: std::env::temp_dir().join("kci-client-no-such-file"),
            len: 3,
        });
        let err = transport
            .execute(request, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_signing());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let inner = Arc::new(RecordingTransport::default());
        let transport = SigningTransport::new(Credential::new("ak", "sk"), inner.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = transport
            .execute(post(Body::Empty), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, KciError::Cancelled));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_layers_compose() {
        // A signing layer over another signing layer still reaches the
        // innermost transport exactly once.
        let inner = Arc::new(RecordingTransport::default());
        let outer = SigningTransport::new(
            Credential::new("outer", "sk"),
            SigningTransport::new(Credential::new("inner", "sk"), inner.clone()),
        );
        outer.send(post(Body::Empty)).await.unwrap();

        let seen = inner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].0.as_deref().unwrap().starts_with("Qiniu inner:"));
    }
}
