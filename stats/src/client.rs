//! Analytics service client.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::error::StatsError;
use crate::types::{EndpointHit, StatsQuery, ViewStats};

/// Boxed future returned by [`StatsClient`] methods.
pub type StatsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StatsError>> + Send + 'a>>;

/// Analytics collaborator.
///
/// Implementations report failures as errors; callers on the read path are
/// expected to absorb them so that the analytics service being down never
/// fails a platform operation.
pub trait StatsClient: Send + Sync {
    /// Record one access to a resource path.
    ///
    /// # Errors
    ///
    /// Returns a [`StatsError`] if the hit was not accepted.
    fn record_hit(&self, hit: EndpointHit) -> StatsFuture<'_, ()>;

    /// Count hits per path within a time window.
    ///
    /// Paths with no hits may be missing from the result.
    ///
    /// # Errors
    ///
    /// Returns a [`StatsError`] if the service could not be queried.
    fn query_hits(&self, query: StatsQuery) -> StatsFuture<'_, Vec<ViewStats>>;
}

/// HTTP implementation of [`StatsClient`].
///
/// `POST {base}/hit` with a JSON [`EndpointHit`] and
/// `GET {base}/stats?start=..&end=..&uris=..&unique=..` returning a JSON
/// array of [`ViewStats`]. Every request is bounded by the configured timeout.
#[derive(Clone, Debug)]
pub struct HttpStatsClient {
    client: Client,
    base_url: String,
}

impl HttpStatsClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidConfiguration`] if the HTTP client cannot
    /// be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StatsError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| StatsError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create an Arc-wrapped client for sharing.
    ///
    /// # Errors
    ///
    /// See [`HttpStatsClient::new`].
    pub fn shared(base_url: impl Into<String>, timeout: Duration) -> Result<Arc<dyn StatsClient>, StatsError> {
        Ok(Arc::new(Self::new(base_url, timeout)?))
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_hit(&self, hit: EndpointHit) -> Result<(), StatsError> {
        let response = self
            .client
            .post(format!("{}/hit", self.base_url))
            .json(&hit)
            .send()
            .await
            .map_err(|e| StatsError::from_reqwest(&e))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(uri = %hit.uri, "Hit recorded");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StatsError::ApiError {
                status: status.as_u16(),
                message: body,
            })
        }
    }

    async fn get_stats(&self, query: StatsQuery) -> Result<Vec<ViewStats>, StatsError> {
        let response = self
            .client
            .get(format!("{}/stats", self.base_url))
            .query(&query.to_query_pairs())
            .send()
            .await
            .map_err(|e| StatsError::from_reqwest(&e))?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<Vec<ViewStats>>()
                .await
                .map_err(|e| StatsError::ResponseParseFailed(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(StatsError::ApiError {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

impl StatsClient for HttpStatsClient {
    fn record_hit(&self, hit: EndpointHit) -> StatsFuture<'_, ()> {
        Box::pin(self.post_hit(hit))
    }

    fn query_hits(&self, query: StatsQuery) -> StatsFuture<'_, Vec<ViewStats>> {
        Box::pin(self.get_stats(query))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpStatsClient::new("http://stats.local:9090/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://stats.local:9090");
    }
}
