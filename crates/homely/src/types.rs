//! Public types for the homely crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration for [`Client::new`](crate::Client::new).
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Homely account username.
    pub username: String,
    /// Homely account password.
    pub password: String,
    /// API base URL. Defaults to `"https://sdk.iotiliti.cloud"`.
    pub base_url: Option<String>,
    /// Base URL for the event stream. Defaults to `base_url`.
    pub stream_base_url: Option<String>,
}

/// A location (home) the account has access to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub name: String,
    pub location_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "gatewayserial")]
    pub gateway_serial: String,
    pub partner_code: i64,
}

/// Full state of a location, including its devices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationDetails {
    #[serde(rename = "locationID")]
    pub location_id: Uuid,
    #[serde(rename = "gatewayserial")]
    pub gateway_serial: String,
    pub name: String,
    pub alarm_state: String,
    pub user_role_at_location: String,
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    pub name: String,
    pub serial_number: String,
    pub location: String,
    pub online: bool,
    pub model_id: Uuid,
    pub model_name: String,
    pub features: HashMap<String, Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub states: HashMap<String, State>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct State {
    pub value: serde_json::Value,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A device state change pushed on the event stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventData {
    pub device_id: Uuid,
    pub gateway_id: Uuid,
    pub location_id: Uuid,
    pub model_id: Uuid,
    pub root_location_id: Uuid,
    pub changes: Vec<Change>,
    pub partner_code: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Change {
    pub feature: String,
    pub state_name: String,
    pub value: serde_json::Value,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Errors returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("execute request: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed: {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unmarshal event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stream: {0}")]
    Stream(#[from] socketio_client::Error),
}
