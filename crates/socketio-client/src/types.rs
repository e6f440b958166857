//! Public types for the socketio-client crate.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_tungstenite::tungstenite;

/// A boxed error type for token sources and event handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Supplies the bearer token sent with each connection attempt.
///
/// Called at most once per [`Client::handle_events`](crate::Client::handle_events)
/// call, before dialing. Caching and refresh are up to the implementation.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, BoxError>;
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

/// A token source backed by an async closure.
///
/// ```
/// use std::sync::Arc;
/// use socketio_client::{BoxError, Client, TokenFn};
///
/// let client = Client::new("https://example.com/socket.io/").with_token_source(Arc::new(
///     TokenFn(|| async { Ok::<_, BoxError>("fresh-token".to_string()) }),
/// ));
/// ```
#[derive(Clone)]
pub struct TokenFn<F>(pub F);

#[async_trait]
impl<F, Fut> TokenSource for TokenFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, BoxError>> + Send,
{
    async fn token(&self) -> Result<String, BoxError> {
        (self.0)().await
    }
}

impl<F> std::fmt::Debug for TokenFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenFn")
    }
}

/// A Socket.IO event received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name, the first value of the event packet.
    pub name: String,
    /// Event data as JSON text, the second value of the event packet.
    pub data: String,
}

impl Event {
    /// Deserialize [`data`](Event::data) into `T`.
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Errors returned by this crate. Each variant names the phase that failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid url: unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("get token: {0}")]
    TokenFetch(BoxError),

    #[error("websocket dial: {0}")]
    Dial(Box<tungstenite::Error>),

    #[error("websocket dial: timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("socketio connect to namespace: {0}")]
    Handshake(Box<tungstenite::Error>),

    #[error("read: {0}")]
    Read(Box<tungstenite::Error>),

    #[error("read: connection closed")]
    ConnectionClosed,

    #[error("cancelled")]
    Cancelled,

    #[error("eio pong: {0}")]
    Pong(Box<tungstenite::Error>),

    #[error(transparent)]
    Handler(BoxError),
}

impl Error {
    /// `true` when the stream stopped because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Reading {
        celsius: f64,
    }

    #[test]
    fn event_parse_data() {
        let e = Event {
            name: "temperature".to_string(),
            data: r#"{"celsius":21.5}"#.to_string(),
        };
        let r: Reading = e.parse_data().unwrap();
        assert_eq!(r, Reading { celsius: 21.5 });
    }

    #[test]
    fn event_parse_data_mismatch() {
        let e = Event {
            name: "temperature".to_string(),
            data: r#""warm""#.to_string(),
        };
        assert!(e.parse_data::<Reading>().is_err());
    }

    #[tokio::test]
    async fn static_token() {
        let t = StaticToken("abc".to_string());
        assert_eq!(t.token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn token_fn_calls_closure_each_time() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let source = TokenFn(|| {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move { Ok::<_, BoxError>(format!("token-{n}")) }
        });
        assert_eq!(source.token().await.unwrap(), "token-0");
        assert_eq!(source.token().await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn token_fn_propagates_error() {
        let source = TokenFn(|| async { Err::<String, BoxError>("vault sealed".into()) });
        let err = source.token().await.unwrap_err();
        assert_eq!(err.to_string(), "vault sealed");
    }

    #[test]
    fn handler_error_is_transparent() {
        let err = Error::Handler("stop here".into());
        assert_eq!(err.to_string(), "stop here");
        assert!(!err.is_cancelled());
        assert!(Error::Cancelled.is_cancelled());
    }
}
