//! State module for scrape attempts
//!
//! # Components
//!
//! - `ScrapeOutcome`: the single result of one conditional fetch
//! - `ScrapedPage`: the extracted fields of a successful fetch
//! - `PriorValidators`: caching metadata carried over from the previous scrape

mod outcome;

// Re-export main types
pub use outcome::{
    PriorValidators, ScrapeOutcome, ScrapedPage, EXCEPTION_STATUS, NOT_MODIFIED_STATUS,
    TRANSPORT_FAILURE_STATUS,
};
