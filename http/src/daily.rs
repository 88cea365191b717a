//! Meeting room provisioning through the Daily REST API.

use call_metrics_config::DailyConfig;
use eyre::{
    eyre,
    Context as _,
    Result,
};
use serde::Deserialize;
use std::{
    future::Future,
    pin::Pin,
};
use url::Url;

/// Creates the video call rooms participants join.
pub trait RoomProvisioner: Send + Sync {
    /// Creates a new room and returns the URL participants open to join it.
    fn create_room(&self) -> Pin<Box<dyn Future<Output = Result<Url>> + Send + '_>>;
}

#[derive(Debug, Deserialize)]
struct RoomResponse {
    url: Url,
}

#[derive(Debug, Clone)]
pub struct DailyRoomProvisioner {
    client: reqwest::Client,
    rooms_url: Url,
    api_key: Option<String>,
}

impl DailyRoomProvisioner {
    pub fn new(config: &DailyConfig) -> Result<Self> {
        let rooms_url = config
            .api_url
            .join("rooms")
            .wrap_err_with(|| format!("Invalid room API URL {}", config.api_url))?;
        Ok(Self {
            client: reqwest::Client::new(),
            rooms_url,
            api_key: config.api_key.clone(),
        })
    }
}

impl RoomProvisioner for DailyRoomProvisioner {
    fn create_room(&self) -> Pin<Box<dyn Future<Output = Result<Url>> + Send + '_>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| eyre!("No API key configured for {}", self.rooms_url))?;

            let room = self
                .client
                .post(self.rooms_url.clone())
                .bearer_auth(api_key)
                .send()
                .await
                .context("Failed to reach the room API")?
                .error_for_status()
                .context("Room API rejected the request")?
                .json::<RoomResponse>()
                .await
                .context("Room API returned an unexpected response")?;

            debug!(url = %room.url, "room created");
            Ok(room.url)
        })
    }
}
