//! Connection management: URL construction, dial, and the read loop.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::Error;
use crate::diagnostics::DiscardSink;
use crate::protocol::{self, CONNECT_FRAME, ENGINE_IO_VERSION, PONG_FRAME, Packet, TRANSPORT};
use crate::types::{BoxError, Event, TokenSource};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const QUERY_EIO: &str = "EIO";
const QUERY_TRANSPORT: &str = "transport";
const QUERY_TOKEN: &str = "token";

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A message-level WebSocket: what [`Session`] reads from and writes to.
pub(crate) trait Transport:
    Stream<Item = Result<Message, tungstenite::Error>>
    + Sink<Message, Error = tungstenite::Error>
    + Unpin
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin
{
}

// ---------------------------------------------------------------------------
// WebSocket URL construction
// ---------------------------------------------------------------------------

/// Build the dial address from `server`, fetching a token first when a source
/// is given.
///
/// Query parameters already on `server` are kept, except the ones this
/// function owns. `http`/`https` are rewritten to `ws`/`wss`.
pub(crate) async fn build_ws_url(
    server: &str,
    token_source: Option<&dyn TokenSource>,
) -> Result<Url, Error> {
    let mut u = Url::parse(server)?;
    let scheme = match u.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(Error::UnsupportedScheme(other.to_string())),
    };
    if u.scheme() != scheme && u.set_scheme(scheme).is_err() {
        return Err(Error::UnsupportedScheme(u.scheme().to_string()));
    }

    let token = match token_source {
        Some(source) => Some(source.token().await.map_err(Error::TokenFetch)?),
        None => None,
    };

    let retained: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| !matches!(&**k, QUERY_EIO | QUERY_TRANSPORT | QUERY_TOKEN))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut q = u.query_pairs_mut();
        q.clear();
        q.extend_pairs(retained);
        q.append_pair(QUERY_EIO, ENGINE_IO_VERSION);
        q.append_pair(QUERY_TRANSPORT, TRANSPORT);
        if let Some(token) = token {
            q.append_pair(QUERY_TOKEN, &format!("Bearer {token}"));
        }
    }
    Ok(u)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A live WebSocket plus the cancellation that governs it.
///
/// Dropping the session closes the socket immediately, without a close
/// handshake.
pub(crate) struct Session<T = WsStream> {
    ws: T,
    cancel: CancellationToken,
}

impl Session {
    /// Dial `url`, bounded by `timeout` and `cancel`.
    pub(crate) async fn connect(
        url: &Url,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<Self, Error> {
        tracing::debug!(host = url.host_str(), path = url.path(), "Dialing websocket");
        if url.scheme() == "wss" {
            ensure_crypto_provider();
        }
        let dial = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str()));
        let (ws, _resp) = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = dial => result
                .map_err(|_| Error::ConnectTimeout(timeout))?
                .map_err(|e| Error::Dial(Box::new(e)))?,
        };
        Ok(Self {
            ws,
            cancel: cancel.clone(),
        })
    }
}

impl<T: Transport> Session<T> {
    /// Write a text frame. `phase` labels a transport failure.
    pub(crate) async fn send_text(
        &mut self,
        frame: &str,
        phase: fn(Box<tungstenite::Error>) -> Error,
    ) -> Result<(), Error> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = self.ws.send(Message::text(frame.to_owned())) => {
                result.map_err(|e| phase(Box::new(e)))
            }
        }
    }

    /// Wait for the next text frame. Binary frames are skipped; control
    /// frames are answered by the transport.
    pub(crate) async fn next_text(&mut self) -> Result<String, Error> {
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                frame = self.ws.next() => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(len = data.len(), "Ignoring binary websocket frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Websocket close received");
                }
                Some(Ok(_)) => {
                    // Ping/pong control frames
                }
                Some(Err(e)) => return Err(Error::Read(Box::new(e))),
                None => return Err(Error::ConnectionClosed),
            }
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        tracing::debug!("Closing websocket connection");
    }
}

/// TLS needs a process-wide rustls provider. Install ring unless the
/// application already picked one.
fn ensure_crypto_provider() {
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        // Loses harmlessly to a concurrent install.
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
}

// ---------------------------------------------------------------------------
// Read loop
// ---------------------------------------------------------------------------

/// Send the namespace connect frame, then decode frames until a terminal
/// condition: read failure or cancellation, a failed pong, or a handler error.
pub(crate) async fn run<T, H>(
    session: &mut Session<T>,
    sink: &dyn DiscardSink,
    handler: &mut H,
) -> Result<(), Error>
where
    T: Transport,
    H: FnMut(Event) -> Result<(), BoxError>,
{
    session.send_text(CONNECT_FRAME, Error::Handshake).await?;
    tracing::debug!("Requested default namespace");

    loop {
        let frame = session.next_text().await?;
        tracing::trace!(packet = %frame, "Got websocket packet");

        match protocol::decode(&frame) {
            Ok(Packet::Ping) => {
                session.send_text(PONG_FRAME, Error::Pong).await?;
                tracing::trace!("Ponged");
            }
            Ok(Packet::Event(event)) => {
                handler(event).map_err(Error::Handler)?;
            }
            Ok(Packet::Ignored(kind)) => {
                tracing::trace!(?kind, "Ignoring Engine.IO packet");
            }
            Ok(Packet::Skipped(kind)) => {
                tracing::trace!(?kind, "Skipping non event Socket.IO packet");
            }
            Err(reason) => sink.discarded(&frame, &reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;
    use crate::diagnostics::NoopSink;
    use crate::types::StaticToken;

    struct FailingToken;

    #[async_trait::async_trait]
    impl TokenSource for FailingToken {
        async fn token(&self) -> Result<String, BoxError> {
            Err("credentials rejected".into())
        }
    }

    fn query(u: &Url, key: &str) -> Option<String> {
        u.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[tokio::test]
    async fn build_ws_url_without_token() {
        let u = build_ws_url("wss://example.com/socket.io/", None)
            .await
            .unwrap();
        assert_eq!(u.scheme(), "wss");
        assert_eq!(u.path(), "/socket.io/");
        assert_eq!(query(&u, "EIO").as_deref(), Some("4"));
        assert_eq!(query(&u, "transport").as_deref(), Some("websocket"));
        assert_eq!(query(&u, "token"), None);
    }

    #[tokio::test]
    async fn build_ws_url_with_token() {
        let token = StaticToken("abc.def".to_string());
        let u = build_ws_url("wss://example.com/socket.io/", Some(&token))
            .await
            .unwrap();
        assert_eq!(query(&u, "token").as_deref(), Some("Bearer abc.def"));
    }

    #[tokio::test]
    async fn build_ws_url_keeps_existing_query() {
        let u = build_ws_url(
            "https://sdk.example.com/socket.io/?locationId=42&EIO=3",
            None,
        )
        .await
        .unwrap();
        assert_eq!(u.scheme(), "wss");
        assert_eq!(query(&u, "locationId").as_deref(), Some("42"));
        assert_eq!(query(&u, "EIO").as_deref(), Some("4"));
        assert_eq!(u.query_pairs().filter(|(k, _)| k == "EIO").count(), 1);
    }

    #[tokio::test]
    async fn build_ws_url_maps_http() {
        let u = build_ws_url("http://127.0.0.1:8080/socket.io/", None)
            .await
            .unwrap();
        assert_eq!(u.scheme(), "ws");
        assert_eq!(u.port(), Some(8080));
    }

    #[tokio::test]
    async fn build_ws_url_invalid() {
        let err = build_ws_url("not a url", None).await.unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[tokio::test]
    async fn build_ws_url_unsupported_scheme() {
        let err = build_ws_url("ftp://example.com/", None).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(ref s) if s == "ftp"));
    }

    #[tokio::test]
    async fn build_ws_url_token_failure() {
        let err = build_ws_url("wss://example.com/", Some(&FailingToken))
            .await
            .unwrap_err();
        match err {
            Error::TokenFetch(e) => assert_eq!(e.to_string(), "credentials rejected"),
            other => panic!("expected TokenFetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn build_ws_url_checks_address_before_token() {
        let err = build_ws_url("::bad::", Some(&FailingToken))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    /// Replays `incoming` and accepts `writes_allowed` writes before failing.
    struct Scripted {
        incoming: VecDeque<Message>,
        writes_allowed: usize,
        sent: Vec<String>,
    }

    impl Scripted {
        fn new(incoming: &[&str], writes_allowed: usize) -> Self {
            Self {
                incoming: incoming.iter().map(|f| Message::text(f.to_string())).collect(),
                writes_allowed,
                sent: Vec::new(),
            }
        }
    }

    impl Stream for Scripted {
        type Item = Result<Message, tungstenite::Error>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Poll::Ready(self.incoming.pop_front().map(Ok))
        }
    }

    impl Sink<Message> for Scripted {
        type Error = tungstenite::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
            if self.sent.len() >= self.writes_allowed {
                return Err(tungstenite::Error::AlreadyClosed);
            }
            let text = item.to_text()?.to_owned();
            self.sent.push(text);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn session(transport: Scripted) -> Session<Scripted> {
        Session {
            ws: transport,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn run_fails_when_connect_frame_cannot_be_written() {
        let mut s = session(Scripted::new(&[r#"42["never",1]"#], 0));
        let mut seen = Vec::new();

        let err = run(&mut s, &NoopSink, &mut |e: Event| {
            seen.push(e);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Handshake(_)), "got {err:?}");
        assert!(err.to_string().starts_with("socketio connect to namespace"));
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn run_fails_when_pong_cannot_be_written() {
        let mut s = session(Scripted::new(&["2", r#"42["late",1]"#], 1));
        let mut seen = Vec::new();

        let err = run(&mut s, &NoopSink, &mut |e: Event| {
            seen.push(e);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Pong(_)), "got {err:?}");
        assert!(err.to_string().starts_with("eio pong"));
        assert_eq!(s.ws.sent, ["40"]);
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn run_skips_discards_with_noop_sink() {
        let mut s = session(Scripted::new(
            &["42[not json", "2", r#"42["solo"]"#, r#"42["kept",{"n":1}]"#],
            usize::MAX,
        ));
        let mut seen = Vec::new();

        let err = run(&mut s, &NoopSink, &mut |e: Event| {
            seen.push(e);
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::ConnectionClosed), "got {err:?}");
        assert_eq!(s.ws.sent, ["40", "3"]);
        assert_eq!(
            seen,
            [Event {
                name: "kept".to_string(),
                data: r#"{"n":1}"#.to_string(),
            }]
        );
    }
}
