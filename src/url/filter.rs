use std::collections::HashSet;
use url::Url;

/// Resolves candidate hrefs against the page URL and keeps the ones worth queueing
///
/// # Filtering Rules
///
/// 1. Resolve each href against `page`; hrefs that cannot be resolved are dropped
/// 2. De-duplicate by absolute URL string, keeping first-seen order
/// 3. Drop anything that is not `https`
/// 4. Drop URLs whose path is exactly `/` (bare hosts are either disallowed or
///    already registered as url bases)
/// 5. Drop links back to the page itself
///
/// # Examples
///
/// ```
/// use pagewell::url::filter_links;
/// use url::Url;
///
/// let page = Url::parse("https://example.com/docs/").unwrap();
/// let links = filter_links(["intro", "/", "http://example.com/insecure"], &page);
/// assert_eq!(links, vec![Url::parse("https://example.com/docs/intro").unwrap()]);
/// ```
pub fn filter_links<'a, I>(hrefs: I, page: &Url) -> Vec<Url>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in hrefs {
        let resolved = match page.join(href.trim()) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping unresolvable href {:?}: {}", href, e);
                continue;
            }
        };

        if !seen.insert(resolved.as_str().to_string()) {
            continue;
        }

        if resolved.scheme() != "https" {
            continue;
        }

        if resolved.path() == "/" {
            continue;
        }

        if resolved.as_str() == page.as_str() {
            continue;
        }

        links.push(resolved);
    }

    links
}
