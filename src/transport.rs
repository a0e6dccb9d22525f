//! HTTP transport used for range reads and JSON listings

use std::time::Duration;

use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_RANGE, RANGE};
use tracing::{debug, warn};

use crate::error::TransportError;

/// Default user agent sent to package sources. Some registries reject the
/// stock client agent string.
pub const DEFAULT_USER_AGENT: &str = concat!("package-lens/", env!("CARGO_PKG_VERSION"));

/// Bytes returned by a range read together with the resource's total length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResponse {
    pub bytes: Bytes,
    pub total_length: u64,
}

/// Capability to fetch remote resources
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `length` bytes starting at `offset`
    ///
    /// Implementations must report the full resource length, which for HTTP
    /// comes from the `Content-Range` response header.
    async fn get_range(
        &self,
        url: &str,
        offset: u64,
        length: u64,
    ) -> Result<RangeResponse, TransportError>;

    /// Fetch a whole resource as text
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;
}

/// Transport backed by a shared reqwest client
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

/// Extract the total length from a `Content-Range: bytes start-end/total` value
fn parse_content_range_total(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get_range(
        &self,
        url: &str,
        offset: u64,
        length: u64,
    ) -> Result<RangeResponse, TransportError> {
        if length == 0 {
            return Err(TransportError::InvalidResponse {
                url: url.to_string(),
                reason: "empty range requested".to_string(),
            });
        }

        let end = offset + length - 1;
        debug!("GET {} bytes={}-{}", url, offset, end);

        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-{}", offset, end))
            .send()
            .await?;

        let status = response.status();

        match status {
            StatusCode::PARTIAL_CONTENT => {
                let total_length = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_content_range_total)
                    .ok_or_else(|| TransportError::InvalidResponse {
                        url: url.to_string(),
                        reason: "missing or unparseable Content-Range".to_string(),
                    })?;
                let bytes = response.bytes().await?;
                Ok(RangeResponse {
                    bytes,
                    total_length,
                })
            }
            StatusCode::OK => {
                // The body is the whole resource; dropping the response
                // closes the connection before it is downloaded
                warn!("{} ignored the Range header", url);
                Err(TransportError::InvalidResponse {
                    url: url.to_string(),
                    reason: "server does not support range requests".to_string(),
                })
            }
            _ => Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use rstest::rstest;

    fn transport() -> HttpTransport {
        HttpTransport::new(DEFAULT_USER_AGENT, Duration::from_secs(5)).unwrap()
    }

    #[rstest]
    #[case("bytes 0-1/1234", Some(1234))]
    #[case("bytes 100-121/122", Some(122))]
    #[case("bytes */1234", Some(1234))]
    #[case("bytes 0-1/*", None)]
    #[case("items 0-1/10", None)]
    #[case("", None)]
    fn parse_content_range_total_returns_expected(
        #[case] value: &str,
        #[case] expected: Option<u64>,
    ) {
        assert_eq!(parse_content_range_total(value), expected);
    }

    #[tokio::test]
    async fn get_range_sends_range_header_and_reads_total_length() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/pkg.nupkg")
            .match_header("range", "bytes=0-1")
            .match_header("user-agent", DEFAULT_USER_AGENT)
            .with_status(206)
            .with_header("content-range", "bytes 0-1/4096")
            .with_body("PK")
            .create_async()
            .await;

        let result = transport()
            .get_range(&format!("{}/pkg.nupkg", server.url()), 0, 2)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.bytes.as_ref(), b"PK");
        assert_eq!(result.total_length, 4096);
    }

    #[tokio::test]
    async fn get_range_rejects_servers_that_ignore_range() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/plain")
            .match_header("range", "bytes=3-6")
            .with_status(200)
            .with_body("0123456789")
            .create_async()
            .await;

        let result = transport()
            .get_range(&format!("{}/plain", server.url()), 3, 4)
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(TransportError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn get_range_rejects_partial_content_without_content_range() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/broken")
            .with_status(206)
            .with_body("PK")
            .create_async()
            .await;

        let result = transport()
            .get_range(&format!("{}/broken", server.url()), 0, 2)
            .await;

        assert!(matches!(
            result,
            Err(TransportError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn get_text_returns_status_error_for_missing_resource() {
        let mut server = Server::new_async().await;

        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let result = transport()
            .get_text(&format!("{}/missing", server.url()))
            .await;

        assert!(matches!(
            result,
            Err(TransportError::Status { status: 404, .. })
        ));
    }
}
