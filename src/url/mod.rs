//! URL handling for driftnet
//!
//! Provides URL normalization (the frontier's canonical deduplication
//! form), link resolution, and the admission filter for discovered links.

mod filter;
mod normalize;

pub use filter::UrlFilter;
pub use normalize::{normalize_link, normalize_url};

use url::{Origin, Url};

/// Returns the origin a page's discovered links are judged against
///
/// An origin is the scheme + host + port triple; two URLs share an origin
/// exactly when `url::Origin` considers them equal.
pub fn page_origin(url: &Url) -> Origin {
    url.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://example.com/a").unwrap();
        let b = Url::parse("https://example.com/b?q=1").unwrap();
        assert_eq!(page_origin(&a), page_origin(&b));
    }

    #[test]
    fn test_different_port_is_different_origin() {
        let a = Url::parse("http://example.com:8080/").unwrap();
        let b = Url::parse("http://example.com:9090/").unwrap();
        assert_ne!(page_origin(&a), page_origin(&b));
    }
}
