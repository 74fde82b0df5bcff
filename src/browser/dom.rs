//! DOM queries over a static HTML document
//!
//! These helpers answer the page queries of the HTTP renderer:
//! - page title
//! - visible text of the body or of selector scopes (scripts and styles skipped)
//! - anchor hrefs resolved to absolute form (honoring `<base href>`)
//! - declarative shadow-root text
//! - iframe sources

use crate::BrowserError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text never renders
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line in rendered text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "tr", "table", "section", "article", "header", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "address", "blockquote", "nav", "aside", "main", "form",
];

/// Parses a CSS selector, mapping failures to a browser error
pub fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector)
        .map_err(|e| BrowserError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

/// Extracts the page title, or an empty string when there is none
pub fn page_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Rendered text of an element, approximating `innerText`
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    collapse_blank_lines(&out)
}

/// Text of every element matching `selector`, one match per line
pub fn selector_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .map(visible_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// All anchor hrefs resolved against the document URL
///
/// Empty and fragment-only hrefs are dropped; every other scheme is kept so
/// the caller decides what is crawlable.
pub fn anchor_hrefs(document: &Html, document_url: &Url) -> Vec<String> {
    let base = base_url(document, document_url);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect()
}

/// Text inside declarative shadow roots (`<template shadowrootmode>`)
pub fn shadow_root_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("template[shadowrootmode], template[shadowroot]") else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|template| {
            template
                .descendants()
                .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Absolute http(s) sources of the document's iframes
pub fn iframe_sources(document: &Html, document_url: &Url) -> Vec<Url> {
    let base = base_url(document, document_url);
    let Ok(selector) = Selector::parse("iframe[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .filter_map(|src| base.join(src.trim()).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .collect()
}

/// The effective base URL: `<base href>` if present and valid, else the document URL
fn base_url(document: &Html, document_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| document_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| document_url.clone())
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                continue;
            }
            let is_block = BLOCK_ELEMENTS.contains(&name);
            if is_block {
                out.push('\n');
            }
            collect_text(child_element, out);
            if is_block {
                out.push('\n');
            }
        }
    }
}

/// Trims each line and drops empty ones
fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/about/team").unwrap()
    }

    fn body_text(html: &str) -> String {
        let document = Html::parse_document(html);
        selector_text(&document, &parse_selector("body").unwrap())
    }

    #[test]
    fn test_title() {
        let document = Html::parse_document("<html><head><title> Our Team </title></head></html>");
        assert_eq!(page_title(&document), "Our Team");
    }

    #[test]
    fn test_missing_title_is_empty() {
        let document = Html::parse_document("<html><body>hi</body></html>");
        assert_eq!(page_title(&document), "");
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let text = body_text(
            r#"<html><body><p>Email us: jane@example-biz.com</p>
            <script>var hidden = "bot@tracker.io";</script>
            <style>.x { color: red }</style></body></html>"#,
        );
        assert_eq!(text, "Email us: jane@example-biz.com");
    }

    #[test]
    fn test_block_elements_break_lines() {
        let text = body_text("<body><div>one</div><div>two <b>three</b></div></body>");
        assert_eq!(text, "one\ntwo three");
    }

    #[test]
    fn test_selector_text_joins_matches() {
        let document = Html::parse_document(
            r#"<body><footer class="c">a@x.io</footer><div class="c">b@x.io</div><p>c@x.io</p></body>"#,
        );
        let text = selector_text(&document, &parse_selector(".c").unwrap());
        assert_eq!(text, "a@x.io\nb@x.io");
    }

    #[test]
    fn test_anchor_hrefs_resolved() {
        let document = Html::parse_document(
            r##"<body>
            <a href="/contact">Contact</a>
            <a href="jobs">Jobs</a>
            <a href="https://other.com/x">Other</a>
            <a href="mailto:jane@example.com">Mail</a>
            <a href="#top">Top</a>
            <a href="  ">Empty</a>
            </body>"##,
        );
        let links = anchor_hrefs(&document, &base());
        assert_eq!(
            links,
            vec![
                "https://example.com/contact",
                "https://example.com/about/jobs",
                "https://other.com/x",
                "mailto:jane@example.com",
            ]
        );
    }

    #[test]
    fn test_base_href_respected() {
        let document = Html::parse_document(
            r#"<html><head><base href="https://cdn.example.com/site/"></head>
            <body><a href="page">P</a></body></html>"#,
        );
        assert_eq!(
            anchor_hrefs(&document, &base()),
            vec!["https://cdn.example.com/site/page"]
        );
    }

    #[test]
    fn test_shadow_root_text() {
        let document = Html::parse_document(
            r#"<body><contact-card><template shadowrootmode="open">
            <span>Reach   sam@shadow.dev</span></template></contact-card></body>"#,
        );
        assert_eq!(shadow_root_text(&document), "Reach sam@shadow.dev");
    }

    #[test]
    fn test_iframe_sources() {
        let document = Html::parse_document(
            r#"<body><iframe src="/widget"></iframe><iframe src="javascript:void(0)"></iframe></body>"#,
        );
        let sources = iframe_sources(&document, &base());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].as_str(), "https://example.com/widget");
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(parse_selector("a[["), Err(BrowserError::InvalidSelector(_))));
    }
}
