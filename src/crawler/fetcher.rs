//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made while scraping a page:
//! - Building the HTTP client with the identifying user agent string
//! - HEAD and GET requests that follow redirects
//! - Mapping transport failures onto the synthetic 599 status

use crate::config::UserAgentConfig;
use crate::state::TRANSPORT_FAILURE_STATUS;
use reqwest::header::HeaderMap;
use reqwest::{redirect::Policy, Client, Method};
use url::Url;

/// Maximum number of redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// A response, or a stand-in for one that never arrived
#[derive(Debug)]
pub struct FetchResponse {
    /// HTTP status, or 599 if the request failed in transport
    pub status: u16,

    pub headers: HeaderMap,

    /// Body text for GET requests that completed
    pub body: Option<String>,
}

impl FetchResponse {
    fn transport_failure() -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// All values of a header joined with `", "`
    pub fn header(&self, name: &str) -> Option<String> {
        header_value(&self.headers, name)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use pagewell::config::UserAgentConfig;
/// use pagewell::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "Pagewell".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends one request and never fails
///
/// DNS, TLS, connection, redirect-limit, and body read errors all become a
/// response with status 599. The body is only read for GET.
pub async fn fetch(client: &Client, method: Method, url: &Url) -> FetchResponse {
    tracing::debug!(method = %method, url = %url, "Sending request");

    let read_body = method == Method::GET;
    let response = match client.request(method.clone(), url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(method = %method, url = %url, error = %e, "Request failed in transport");
            return FetchResponse::transport_failure();
        }
    };

    let status = response.status().as_u16();
    let headers = response.headers().clone();

    let body = if read_body && status == 200 {
        match response.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to read response body");
                return FetchResponse::transport_failure();
            }
        }
    } else {
        None
    };

    FetchResponse {
        status,
        headers,
        body,
    }
}

/// Reads every value of a header, joined with `", "`
///
/// Returns `None` when the header is absent. Values that are not valid visible
/// ASCII are skipped.
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}
