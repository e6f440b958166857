//! Receive-only Socket.IO client over WebSocket.
//!
//! Implements the subset of the Engine.IO v4 / Socket.IO protocols needed to
//! receive named events from a server on the default namespace.
//!
//! # Features
//! - Bearer token authentication via a pluggable [`TokenSource`]
//! - Engine.IO keepalive (ping/pong)
//! - Event packets decoded into [`Event`] with raw JSON data
//! - Cooperative cancellation with [`CancellationToken`](tokio_util::sync::CancellationToken)
//!
//! Not supported: long-polling, binary events, acknowledgements, custom
//! namespaces, reconnection.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), socketio_client::Error> {
//! use std::sync::Arc;
//! use socketio_client::{Client, StaticToken};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = Client::new("https://example.com/socket.io/")
//!     .with_token_source(Arc::new(StaticToken("my-token".to_string())));
//!
//! let cancel = CancellationToken::new();
//! client
//!     .handle_events(&cancel, |event| {
//!         println!("{}: {}", event.name, event.data);
//!         Ok(())
//!     })
//!     .await
//! # }
//! ```

mod client;
mod connection;
mod diagnostics;
pub mod protocol;
mod types;

pub use client::Client;
pub use diagnostics::{DiscardSink, NoopSink, TracingSink};
pub use types::{BoxError, Error, Event, StaticToken, TokenFn, TokenSource};
