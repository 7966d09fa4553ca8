//! MBTA enhanced-JSON real-time feed provider.
//!
//! One fixed URL per feed kind, fetched with a shared client on each cache
//! miss. No retry and no auth; a transport or decode failure discards the
//! whole feed for that request.

pub mod types;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::FeedUrls;

pub use types::{AlertEntity, LiveVehicle, TripUpdateEntity};

use types::{AlertFeed, TripUpdateFeed, VehicleFeed};

/// Upper bound on a request stall; the upstream CDN answers in well under
/// a second when healthy.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Network error: {0}")]
    NetworkMessage(String),
    #[error("Feed decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    urls: FeedUrls,
}

impl FeedClient {
    pub fn new(urls: FeedUrls) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("transit-tracker/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, urls })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FeedError> {
        debug!(url, "Fetching real-time feed");
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::NetworkMessage(format!(
                "feed HTTP {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Vehicles currently running the given route, flattened.
    pub async fn vehicle_positions(&self, route_id: &str) -> Result<Vec<LiveVehicle>, FeedError> {
        let feed: VehicleFeed = self.fetch_json(&self.urls.vehicle_positions).await?;
        Ok(types::project_vehicles(feed, route_id))
    }

    /// The full alert list, unfiltered.
    pub async fn alerts(&self) -> Result<Vec<AlertEntity>, FeedError> {
        let feed: AlertFeed = self.fetch_json(&self.urls.alerts).await?;
        Ok(feed.entity)
    }

    /// Trip updates for the given route, passed through.
    pub async fn trip_updates(&self, route_id: &str) -> Result<Vec<TripUpdateEntity>, FeedError> {
        let feed: TripUpdateFeed = self.fetch_json(&self.urls.trip_updates).await?;
        Ok(types::filter_trip_updates(feed, route_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_network_message() {
        let err = FeedError::NetworkMessage("feed HTTP 503 Service Unavailable".into());
        assert_eq!(
            err.to_string(),
            "Network error: feed HTTP 503 Service Unavailable"
        );
    }

    #[test]
    fn error_from_json_error() {
        let result: Result<VehicleFeed, _> = serde_json::from_str("not json");
        let err: FeedError = result.unwrap_err().into();
        assert!(matches!(err, FeedError::Decode(_)));
        assert!(err.to_string().starts_with("Feed decode error"));
    }
}
