use crate::{UrlError, UrlResult};
use url::{Position, Url};

/// Builds the key that url_base prefixes are matched against: host, optional port, and path
///
/// The scheme, query, and fragment are not part of the key.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use pagewell::url::prefix_key;
///
/// let url = Url::parse("https://Example.COM/docs/intro?x=1#top").unwrap();
/// assert_eq!(prefix_key(&url).unwrap(), "example.com/docs/intro");
///
/// let url = Url::parse("https://example.com:8443/").unwrap();
/// assert_eq!(prefix_key(&url).unwrap(), "example.com:8443/");
/// ```
pub fn prefix_key(url: &Url) -> UrlResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| UrlError::MissingHost(url.to_string()))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}{}", host, port, url.path()),
        None => format!("{}{}", host, url.path()),
    })
}

/// Returns the path (and query, if any) stored in a queue row for this URL
///
/// Fragments never reach the queue, so `/a#x` and `/a#y` share one row.
pub fn queue_path(url: &Url) -> String {
    url[Position::BeforePath..Position::AfterQuery].to_string()
}

/// Rebuilds the request URL of a queue row from its base prefix and stored path
///
/// Stored paths are absolute, so they replace any path carried by the prefix.
pub fn target_url(scheme: &str, url_prefix: &str, path: &str) -> UrlResult<Url> {
    let base = Url::parse(&format!("{}://{}", scheme, url_prefix))
        .map_err(|e| UrlError::Parse(format!("{}://{}: {}", scheme, url_prefix, e)))?;

    if base.host_str().is_none() {
        return Err(UrlError::MissingHost(base.to_string()));
    }

    let url = base
        .join(path)
        .map_err(|e| UrlError::Parse(format!("{} relative to {}: {}", path, base, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    Ok(url)
}
