//! URL handling module for Pagewell
//!
//! This module resolves and filters links discovered on a page, and maps URLs to
//! and from the `url_prefix` + `path` form used by the queue.

mod filter;
mod prefix;

pub use filter::filter_links;
pub use prefix::{prefix_key, queue_path, target_url};
