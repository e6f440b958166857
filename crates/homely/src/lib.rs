//! Client for the Homely smart-home API.
//!
//! Covers the account's locations, per-location device state, and the
//! realtime device event stream (Socket.IO over WebSocket, via
//! [`socketio_client`]).
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), homely::Error> {
//! use tokio_util::sync::CancellationToken;
//!
//! let client = homely::Client::new(homely::Config {
//!     username: "me@example.com".to_string(),
//!     password: "secret".to_string(),
//!     ..Default::default()
//! })?;
//!
//! let locations = client.locations().await?;
//! if let Some(home) = locations.first() {
//!     let cancel = CancellationToken::new();
//!     client
//!         .stream(home.location_id, &cancel, |event| {
//!             println!("{}: {} changes", event.kind, event.data.changes.len());
//!         })
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod types;

pub use auth::{CredentialsTokenSource, TokenResponse};
pub use client::Client;
pub use types::{
    Change, Config, Device, Error, Event, EventData, Feature, Location, LocationDetails, State,
};
