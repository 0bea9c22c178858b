//! Configuration loading and validation
//!
//! Configuration comes from a TOML file (or is constructed directly by
//! embedding callers) and is validated exactly once, before a crawl
//! session is created.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{CrawlConfig, FileConfig, OutputConfig};
pub use validation::validate;
