//! Re-scrape scheduling from HTTP cache directives

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Obsolete HTTP date forms: RFC 850 and asctime
const OBSOLETE_DATE_FORMATS: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Parses an HTTP date
///
/// Accepts the preferred form (`Wed, 21 Oct 2015 07:28:00 GMT`) as well as the
/// RFC 850 (`Wednesday, 21-Oct-15 07:28:00 GMT`) and asctime
/// (`Wed Oct 21 07:28:00 2015`) forms, all read as UTC.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    OBSOLETE_DATE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| naive.and_utc())
    })
}

/// Reads `max-age` from a `Cache-Control` value, in seconds
fn max_age(cache_control: &str) -> Option<u64> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value.trim().trim_matches('"').parse().ok()
    })
}

fn after_seconds(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Computes the earliest instant a page should be scraped again
///
/// The latest of `now + default_cache_age`, `now + max-age`, and `Expires`.
/// Directives that are missing, malformed, or out of range are ignored, so the
/// result is never earlier than the configured floor.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use pagewell::crawler::next_scrape_after;
///
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let next = next_scrape_after(now, 60, Some("public, max-age=3600"), None);
/// assert_eq!(next, now + Duration::seconds(3600));
/// ```
pub fn next_scrape_after(
    now: DateTime<Utc>,
    default_cache_age: u64,
    cache_control: Option<&str>,
    expires: Option<&str>,
) -> DateTime<Utc> {
    let floor = after_seconds(now, default_cache_age).unwrap_or(DateTime::<Utc>::MAX_UTC);

    let from_max_age = cache_control
        .and_then(max_age)
        .and_then(|seconds| after_seconds(now, seconds));
    let from_expires = expires.and_then(parse_http_date);

    [from_max_age, from_expires]
        .into_iter()
        .flatten()
        .fold(floor, |latest, candidate| latest.max(candidate))
}
