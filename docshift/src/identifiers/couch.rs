use std::time::Duration;

use docshift_config::shared::StoreConfig;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, error};

use crate::bail;
use crate::error::{ErrorKind, TransformResult};
use crate::identifiers::IdentifierSource;
use crate::transform_error;

/// Path of the identifier endpoint, relative to the store root.
const UUIDS_PATH: &str = "/_uuids";

/// Upper bound on a single identifier round-trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response body of the identifier endpoint.
#[derive(Debug, Deserialize)]
struct UuidsResponse {
    uuids: Vec<String>,
}

/// Identifier source backed by a CouchDB-compatible `_uuids` endpoint.
///
/// Only the scheme, host and port of the configured url are used; the path, query and fragment
/// are replaced so requests always go to `<root>/_uuids?count=N`.
#[derive(Debug, Clone)]
pub struct CouchUuidSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl CouchUuidSource {
    /// Creates a source for the store described by `config`.
    pub fn new(config: &StoreConfig) -> TransformResult<Self> {
        let endpoint = uuids_endpoint(&config.url)?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, endpoint })
    }

    /// Returns the endpoint identifiers are fetched from, without the count.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl IdentifierSource for CouchUuidSource {
    fn name() -> &'static str {
        "couchdb"
    }

    async fn fetch_identifiers(&self, count: usize) -> TransformResult<Vec<String>> {
        debug!(endpoint = %self.endpoint, count, "requesting identifiers");

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("count", count)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            error!(status = %status, body = %body, "identifier request failed");
            bail!(
                ErrorKind::FetchError,
                "Identifier store rejected the request",
                format!("{} returned status {status}: {body}", self.endpoint)
            );
        }

        let body: UuidsResponse = response.json().await?;

        Ok(body.uuids)
    }
}

/// Builds the `_uuids` endpoint from a store url, keeping only its origin.
fn uuids_endpoint(url: &str) -> TransformResult<Url> {
    let mut endpoint = Url::parse(url.trim()).map_err(|err| {
        transform_error!(
            ErrorKind::ValidationError,
            "Invalid store url",
            format!("{url}: {err}"),
            source: err
        )
    })?;

    if endpoint.cannot_be_a_base() || endpoint.host_str().is_none() {
        bail!(
            ErrorKind::ValidationError,
            "Invalid store url",
            format!("{url} has no host")
        );
    }

    endpoint.set_path(UUIDS_PATH);
    endpoint.set_query(None);
    endpoint.set_fragment(None);

    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    /// Serves exactly one HTTP response and returns the request line it received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ignored/path?stale=1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();

            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_owned()
        });

        (url, handle)
    }

    fn store(url: &str) -> StoreConfig {
        StoreConfig {
            url: url.to_owned(),
        }
    }

    #[test]
    fn endpoint_keeps_only_the_origin() {
        let config = store("https://couch.example.com:6984/db/doc?x=1#frag");
        let source = CouchUuidSource::new(&config).unwrap();

        assert_eq!(source.endpoint().as_str(), "https://couch.example.com:6984/_uuids");
    }

    #[test]
    fn unparseable_urls_are_validation_errors() {
        let err = CouchUuidSource::new(&store("not a url")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn fetches_identifiers_from_the_store_root() {
        let (url, request_line) = serve_once("200 OK", r#"{"uuids": ["a1", "b2", "c3"]}"#).await;
        let source = CouchUuidSource::new(&store(&url)).unwrap();

        let identifiers = source.fetch_identifiers(3).await.unwrap();

        assert_eq!(identifiers, vec!["a1", "b2", "c3"]);
        assert_eq!(request_line.await.unwrap(), "GET /_uuids?count=3 HTTP/1.1");
    }

    #[tokio::test]
    async fn error_status_is_a_fetch_error() {
        let (url, _request_line) =
            serve_once("503 Service Unavailable", r#"{"error": "down"}"#).await;
        let source = CouchUuidSource::new(&store(&url)).unwrap();

        let err = source.fetch_identifiers(3).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FetchError);
    }

    #[tokio::test]
    async fn unexpected_body_is_a_fetch_error() {
        let (url, _request_line) = serve_once("200 OK", r#"{"ids": []}"#).await;
        let source = CouchUuidSource::new(&store(&url)).unwrap();

        let err = source.fetch_identifiers(3).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FetchError);
    }

    #[tokio::test]
    async fn unreachable_store_is_a_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let source = CouchUuidSource::new(&store(&url)).unwrap();

        let err = source.fetch_identifiers(1).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::FetchError);
    }
}
