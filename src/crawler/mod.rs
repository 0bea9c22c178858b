//! Crawling machinery
//!
//! This module contains the moving parts of a crawl:
//! - The frontier (breadth-first queue + visited set)
//! - The politeness governor (dispatch spacing + robots gate)
//! - The page fetcher capability and its HTTP implementation
//! - The coordinator that drives a session to a terminal state

mod coordinator;
mod fetcher;
mod frontier;
mod governor;
mod parser;

pub use coordinator::Coordinator;
pub use fetcher::{FetchError, FetchOutcome, HttpFetcher, PageFetcher};
pub use frontier::{Frontier, FrontierEntry};
pub use governor::Governor;
pub use parser::{parse_html, ExtractedPage};
