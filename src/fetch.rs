//! Remote fetching -- the [`Fetcher`] seam and its HTTP implementation.

use crate::error::{Error, FetchError, Result};
use std::time::Duration;

/// Abstraction over retrieving the raw bytes behind a locator, enabling testability
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the resource for `locator`, giving up after `timeout`
    async fn fetch(&self, locator: &str, timeout: Duration)
    -> std::result::Result<Vec<u8>, FetchError>;
}

/// Production [`Fetcher`] that resolves locators against a base URL over HTTP(S)
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: url::Url,
}

impl HttpFetcher {
    /// Create a fetcher rooted at `base_url`
    ///
    /// A trailing slash is added to the base when missing so that locators are
    /// appended rather than replacing the last path segment.
    pub fn new(base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = url::Url::parse(&normalized)
            .map_err(|e| Error::config("fetch.base_url", e.to_string()))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("batchpipe/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Full URL for `locator`
    pub fn url_for(&self, locator: &str) -> std::result::Result<url::Url, FetchError> {
        self.base_url
            .join(locator)
            .map_err(|e| FetchError::InvalidLocator {
                locator: locator.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        locator: &str,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let url = self.url_for(locator)?;

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;
        tracing::debug!(url = %url, bytes = body.len(), "Fetched resource");
        Ok(body.to_vec())
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else {
        FetchError::Network(err)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn url_for_appends_locator_to_base_path() {
        let fetcher = HttpFetcher::new("https://example.com/assets/imagesHQ").unwrap();
        assert_eq!(
            fetcher.url_for("001.png").unwrap().as_str(),
            "https://example.com/assets/imagesHQ/001.png"
        );

        let with_slash = HttpFetcher::new("https://example.com/assets/").unwrap();
        assert_eq!(
            with_slash.url_for("150.png").unwrap().as_str(),
            "https://example.com/assets/150.png"
        );
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        assert!(matches!(
            HttpFetcher::new("no scheme here"),
            Err(Error::Config { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/001.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&format!("{}/img", mock_server.uri())).unwrap();
        let body = fetcher
            .fetch("001.png", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, b"PNGDATA");
    }

    #[tokio::test]
    async fn fetch_maps_non_success_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/404.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&format!("{}/img", mock_server.uri())).unwrap();
        let err = fetcher
            .fetch("404.png", Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            FetchError::Status { status, url } => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/img/404.png"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_times_out_on_slow_server() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/slow.png"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&mock_server)
            .await;

        let fetcher = HttpFetcher::new(&format!("{}/img", mock_server.uri())).unwrap();
        let err = fetcher
            .fetch("slow.png", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)), "got {err:?}");
    }
}
