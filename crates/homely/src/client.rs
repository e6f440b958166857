//! REST resources and the location event stream.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::auth::CredentialsTokenSource;
use crate::types::{Config, Error, Event, Location, LocationDetails};

pub(crate) const DEFAULT_BASE_URL: &str = "https://sdk.iotiliti.cloud";
/// Socket.IO event name that carries device updates.
const STREAM_EVENT_NAME: &str = "event";

/// Join `resource` onto `base`, keeping any path `base` already has.
pub(crate) fn endpoint(base: &str, resource: &str) -> Result<Url, Error> {
    let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))?;
    Ok(base.join(resource)?)
}

/// Homely API client.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    token_source: Arc<CredentialsTokenSource>,
    base_url: String,
    stream_base_url: String,
}

impl Client {
    pub fn new(config: Config) -> Result<Self, Error> {
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let stream_base_url = config.stream_base_url.unwrap_or_else(|| base_url.clone());
        let http = reqwest::Client::builder().build()?;
        let token_source = Arc::new(CredentialsTokenSource::new(
            http.clone(),
            base_url.clone(),
            config.username,
            config.password,
        ));
        Ok(Self {
            http,
            token_source,
            base_url,
            stream_base_url,
        })
    }

    /// Locations the account has access to.
    pub async fn locations(&self) -> Result<Vec<Location>, Error> {
        self.get_json("homely/locations").await
    }

    /// Devices and alarm state of one location.
    pub async fn location_details(&self, location_id: Uuid) -> Result<LocationDetails, Error> {
        self.get_json(&format!("homely/home/{location_id}")).await
    }

    /// Stream device events for a location until the connection ends or
    /// `cancel` fires.
    ///
    /// Socket.IO events with a name other than `"event"` are skipped. An
    /// event whose data does not decode stops the stream with
    /// [`Error::Stream`].
    pub async fn stream<F>(
        &self,
        location_id: Uuid,
        cancel: &CancellationToken,
        mut handler: F,
    ) -> Result<(), Error>
    where
        F: FnMut(Event),
    {
        let server = format!(
            "{}/socket.io/?locationId={location_id}",
            self.stream_base_url.trim_end_matches('/')
        );
        let sio = socketio_client::Client::new(server).with_token_source(self.token_source.clone());

        sio.handle_events(cancel, |event| {
            if event.name != STREAM_EVENT_NAME {
                tracing::warn!(name = %event.name, "Got non event event");
                return Ok(());
            }
            let e: Event = event.parse_data().map_err(Error::Decode)?;
            handler(e);
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, resource: &str) -> Result<T, Error> {
        let url = endpoint(&self.base_url, resource)?;
        let token = self.token_source.access_token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status { status, body });
        }
        Ok(resp.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_resource() {
        let u = endpoint("https://sdk.iotiliti.cloud", "homely/locations").unwrap();
        assert_eq!(u.as_str(), "https://sdk.iotiliti.cloud/homely/locations");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let u = endpoint("http://127.0.0.1:9000/api/", "homely/oauth/token").unwrap();
        assert_eq!(u.as_str(), "http://127.0.0.1:9000/api/homely/oauth/token");
    }

    #[test]
    fn endpoint_invalid_base() {
        assert!(matches!(
            endpoint("not a url", "homely/locations"),
            Err(Error::Url(_))
        ));
    }

    #[test]
    fn client_defaults() {
        let client = Client::new(Config {
            username: "u".to_string(),
            password: "p".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.stream_base_url, DEFAULT_BASE_URL);
    }
}
