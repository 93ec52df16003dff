//! Fetch content from IPFS through an HTTP gateway.
use std::{fmt, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use error_stack::{Report, Result, ResultExt};
use exponential_backoff::Backoff;
use geo_observability::{RecordRequest, RequestMetrics};
use reqwest::StatusCode;
use tracing::{debug, warn};

pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.network.thegraph.com/api/v0/cat?arg=";

const IPFS_SCHEME: &str = "ipfs://";

#[derive(Debug)]
pub struct ContentFetchError;
impl error_stack::Context for ContentFetchError {}

impl fmt::Display for ContentFetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to fetch content")
    }
}

#[async_trait]
pub trait ContentFetcher {
    /// Fetch the content at `uri`. Only `ipfs://` uris are supported.
    async fn fetch(&self, uri: &str) -> Result<Bytes, ContentFetchError>;

    async fn fetch_text(&self, uri: &str) -> Result<String, ContentFetchError> {
        let bytes = self.fetch(uri).await?;
        String::from_utf8(bytes.to_vec())
            .change_context(ContentFetchError)
            .attach_printable("content is not valid utf-8")
            .attach_printable_lazy(|| format!("uri: {uri}"))
    }
}

#[derive(Debug, Clone)]
pub struct IpfsFetcherOptions {
    /// Prefix of the gateway url, the content id is appended to it.
    pub gateway: String,
    pub max_retries: u32,
    pub timeout: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for IpfsFetcherOptions {
    fn default() -> Self {
        Self {
            gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            max_retries: 5,
            timeout: Duration::from_secs(60),
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

pub struct IpfsFetcher {
    client: reqwest::Client,
    gateway: String,
    backoff: Backoff,
    metrics: RequestMetrics,
}

enum AttemptError {
    Retry(Report<ContentFetchError>),
    Abort(Report<ContentFetchError>),
}

impl IpfsFetcher {
    pub fn new(options: IpfsFetcherOptions) -> Result<Self, ContentFetchError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .change_context(ContentFetchError)
            .attach_printable("failed to build http client")?;

        let mut backoff = Backoff::new(
            options.max_retries,
            options.min_delay,
            Some(options.max_delay),
        );
        backoff.set_factor(2);
        backoff.set_jitter(0.3);

        Ok(Self {
            client,
            gateway: options.gateway,
            backoff,
            metrics: RequestMetrics::new("geo_sink_postgres", "ipfs.fetch"),
        })
    }

    fn gateway_url(&self, uri: &str) -> Result<String, ContentFetchError> {
        let Some(cid) = uri.strip_prefix(IPFS_SCHEME) else {
            return Err(ContentFetchError)
                .attach_printable("unsupported uri scheme")
                .attach_printable_lazy(|| format!("uri: {uri}"));
        };

        if cid.is_empty() {
            return Err(ContentFetchError).attach_printable("uri without content id");
        }

        Ok(format!("{}{}", self.gateway, cid))
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<Bytes, AttemptError> {
        let response = self.client.get(url).send().await.map_err(|err| {
            AttemptError::Retry(
                Report::new(err)
                    .change_context(ContentFetchError)
                    .attach_printable("request failed"),
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let err = Report::new(ContentFetchError)
                .attach_printable(format!("gateway responded with status {status}"));
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                return Err(AttemptError::Retry(err));
            }
            return Err(AttemptError::Abort(err));
        }

        response.bytes().await.map_err(|err| {
            AttemptError::Retry(
                Report::new(err)
                    .change_context(ContentFetchError)
                    .attach_printable("failed to read response body"),
            )
        })
    }
}

#[async_trait]
impl ContentFetcher for IpfsFetcher {
    #[tracing::instrument(skip(self), err(Debug))]
    async fn fetch(&self, uri: &str) -> Result<Bytes, ContentFetchError> {
        let url = self.gateway_url(uri)?;

        let mut retries = (&self.backoff).into_iter();
        let mut attempt = 1;
        loop {
            let err = match self
                .fetch_once(&url)
                .record_request(self.metrics.clone())
                .await
            {
                Ok(bytes) => {
                    debug!(size = bytes.len(), attempt, "content fetched");
                    return Ok(bytes);
                }
                Err(AttemptError::Abort(err)) => {
                    return Err(err.attach_printable(format!("uri: {uri}")));
                }
                Err(AttemptError::Retry(err)) => err,
            };

            let Some(delay) = retries.next() else {
                return Err(err
                    .attach_printable(format!("giving up after {attempt} attempts"))
                    .attach_printable(format!("uri: {uri}")));
            };

            warn!(err = ?err, attempt, delay = ?delay, "failed to fetch content. retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::{ContentFetchError, ContentFetcher, IpfsFetcher, IpfsFetcherOptions};

    fn new_fetcher(server: &MockServer, max_retries: u32) -> IpfsFetcher {
        IpfsFetcher::new(IpfsFetcherOptions {
            gateway: format!("{}/ipfs/", server.uri()),
            max_retries,
            timeout: Duration::from_secs(5),
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_retry_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafkcontent"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafkcontent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let fetcher = new_fetcher(&server, 5);
        let content = fetcher.fetch_text("ipfs://bafkcontent").await.unwrap();
        assert_eq!(content, "hello");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn test_give_up_after_retries() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafkcontent"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = new_fetcher(&server, 2);
        let err = fetcher.fetch("ipfs://bafkcontent").await.unwrap_err();
        assert_matches!(err.current_context(), ContentFetchError);

        let requests = server.received_requests().await.unwrap();
        assert!(requests.len() > 1);
        assert!(requests.len() <= 4);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafkmissing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = new_fetcher(&server, 5);
        assert!(fetcher.fetch("ipfs://bafkmissing").await.is_err());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafkcontent"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafkcontent"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let fetcher = new_fetcher(&server, 5);
        let content = fetcher.fetch("ipfs://bafkcontent").await.unwrap();
        assert_eq!(content.as_ref(), &[1u8, 2, 3]);
    }

    #[tokio::test]
    async fn test_reject_unsupported_uri() {
        let server = MockServer::start().await;
        let fetcher = new_fetcher(&server, 5);

        assert!(fetcher.fetch("https://example.com/content").await.is_err());
        assert!(fetcher.fetch("ipfs://").await.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
