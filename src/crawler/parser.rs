//! HTML parser for extracting links and metadata
//!
//! Parses fetched HTML to extract the outbound links, image URLs, and page
//! metadata that feed the frontier and the per-page results.

use scraper::{Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// The page title (from <title>)
    pub title: Option<String>,

    /// The meta description, when present
    pub description: Option<String>,

    /// Visible body text, whitespace-collapsed
    pub text: Option<String>,

    /// All followable links found on the page (absolute URLs)
    pub links: Vec<String>,

    /// Image URLs referenced by the page (absolute URLs)
    pub images: Vec<String>,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document.
///
/// **Exclude:** `<a href="..." download>`, `javascript:`, `mailto:`,
/// `tel:` links, data URIs, and anything that resolves to a non-http(s)
/// URL. `rel="nofollow"` links ARE extracted; honoring nofollow is the
/// caller's policy decision, not the parser's.
///
/// Relative hrefs are resolved against `base_url`.
pub fn parse_html(html: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        text: extract_text(&document),
        links: extract_links(&document, base_url),
        images: extract_images(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts the meta description, when present
fn extract_description(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"meta[name="description"]"#).ok()?;

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts visible body text with collapsed whitespace
fn extract_text(document: &Html) -> Option<String> {
    let body_selector = Selector::parse("body").ok()?;

    let body = document.select(&body_selector).next()?;
    let text = body
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Skip downloads
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Extracts image URLs from the HTML document
fn extract_images(document: &Html, base_url: &Url) -> Vec<String> {
    let mut images = Vec::new();

    if let Ok(img_selector) = Selector::parse("img[src]") {
        for element in document.select(&img_selector) {
            if let Some(src) = element.value().attr("src") {
                if let Some(absolute_url) = resolve_link(src, base_url) {
                    images.push(absolute_url);
                }
            }
        }
    }

    images
}

/// Resolves an href to an absolute URL and validates it
///
/// Returns None for excluded links: javascript:/mailto:/tel: schemes,
/// data URIs, unparseable hrefs, and non-http(s) resolutions.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let resolved = base_url.join(href).ok()?;

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }

    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/dir/").unwrap()
    }

    #[test]
    fn test_extract_title_and_description() {
        let html = r#"<html><head>
            <title> Hello </title>
            <meta name="description" content="A test page">
            </head><body></body></html>"#;
        let parsed = parse_html(html, &base());

        assert_eq!(parsed.title, Some("Hello".to_string()));
        assert_eq!(parsed.description, Some("A test page".to_string()));
    }

    #[test]
    fn test_missing_title_is_none() {
        let parsed = parse_html("<html><body>x</body></html>", &base());
        assert_eq!(parsed.title, None);
        assert_eq!(parsed.description, None);
    }

    #[test]
    fn test_extract_links_resolves_relative() {
        let html = r#"<a href="page">rel</a><a href="/root">abs</a><a href="https://other.test/x">ext</a>"#;
        let parsed = parse_html(html, &base());

        assert_eq!(
            parsed.links,
            vec![
                "https://example.com/dir/page",
                "https://example.com/root",
                "https://other.test/x",
            ]
        );
    }

    #[test]
    fn test_skips_special_schemes() {
        let html = r#"<a href="javascript:void(0)">js</a>
            <a href="mailto:a@b.c">mail</a>
            <a href="tel:+123">tel</a>
            <a href="data:text/plain,hi">data</a>
            <a href="ftp://example.com/f">ftp</a>
            <a href="/ok">ok</a>"#;
        let parsed = parse_html(html, &base());

        assert_eq!(parsed.links, vec!["https://example.com/ok"]);
    }

    #[test]
    fn test_skips_download_links() {
        let html = r#"<a href="/file.zip" download>get</a><a href="/page">page</a>"#;
        let parsed = parse_html(html, &base());

        assert_eq!(parsed.links, vec!["https://example.com/page"]);
    }

    #[test]
    fn test_extract_images() {
        let html = r#"<img src="logo.png"><img src="/banner.jpg">"#;
        let parsed = parse_html(html, &base());

        assert_eq!(
            parsed.images,
            vec![
                "https://example.com/dir/logo.png",
                "https://example.com/banner.jpg",
            ]
        );
    }

    #[test]
    fn test_extract_text_collapses_whitespace() {
        let html = "<html><body><p>one\n  two</p><p>three</p></body></html>";
        let parsed = parse_html(html, &base());

        assert_eq!(parsed.text, Some("one two three".to_string()));
    }
}
