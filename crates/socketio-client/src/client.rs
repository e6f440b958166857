//! Public entry point: [`Client`] and [`Client::handle_events`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::connection::{self, CONNECT_TIMEOUT, Session, build_ws_url};
use crate::diagnostics::{DiscardSink, TracingSink};
use crate::types::{BoxError, Error, Event, TokenSource};

/// Client for receiving events from a Socket.IO server over WebSocket.
///
/// Each [`handle_events`](Client::handle_events) call makes exactly one
/// connection attempt and joins the default namespace. There is no
/// reconnection; callers decide whether and when to call again.
#[derive(Clone)]
pub struct Client {
    server: String,
    token_source: Option<Arc<dyn TokenSource>>,
    discard_sink: Arc<dyn DiscardSink>,
    connect_timeout: Duration,
}

impl Client {
    /// `server` is the Socket.IO endpoint, e.g. `https://host/socket.io/`.
    /// Query parameters on it are sent along with the protocol parameters.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            token_source: None,
            discard_sink: Arc::new(TracingSink),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    /// Authenticate with `token=Bearer <token>` on every connection attempt.
    pub fn with_token_source(mut self, token_source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(token_source);
        self
    }

    /// Report dropped frames to `sink` instead of the `tracing` default.
    pub fn with_discard_sink(mut self, sink: Arc<dyn DiscardSink>) -> Self {
        self.discard_sink = sink;
        self
    }

    /// Upper bound on the WebSocket dial. Defaults to 30 seconds.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connect and deliver events to `handler` until the stream ends.
    ///
    /// Frames are handled in arrival order and `handler` is called inline, so
    /// a slow handler delays keepalive replies. Returning `Err` from `handler`
    /// stops the stream and that error is returned as [`Error::Handler`].
    ///
    /// This only returns with an error: the connection failed or closed, the
    /// handler stopped it, or `cancel` fired ([`Error::Cancelled`]). The
    /// connection is closed before returning.
    pub async fn handle_events<H>(
        &self,
        cancel: &CancellationToken,
        mut handler: H,
    ) -> Result<(), Error>
    where
        H: FnMut(Event) -> Result<(), BoxError>,
    {
        let url = build_ws_url(&self.server, self.token_source.as_deref()).await?;
        let mut session = Session::connect(&url, cancel, self.connect_timeout).await?;

        let result = connection::run(&mut session, self.discard_sink.as_ref(), &mut handler).await;
        if let Err(ref e) = result {
            tracing::debug!("Event stream ended: {e}");
        }
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server", &self.server)
            .field("authenticated", &self.token_source.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
