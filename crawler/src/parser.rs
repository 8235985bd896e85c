use crate::error::ParseError;
use scraper::{Html, Selector};

/// What a page tells us about its links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// Raw `href` values of anchors, in document order
    pub links: Vec<String>,

    /// `<link rel="canonical">`
    pub canonical_url: Option<String>,

    /// `<base href>`, links are relative to it when present
    pub base_url: Option<String>,
}

/// Extracts links from a page body
#[cfg_attr(test, mockall::automock)]
pub trait Parser: Send + Sync {
    fn parse(&self, body: &str) -> Result<ParsedPage, ParseError>;
}

/// HTML parser backed by scraper
#[derive(Debug, Clone)]
pub struct HtmlParser {
    anchors: Selector,
    canonical: Selector,
    base: Selector,
}

impl HtmlParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            anchors: selector("a[href]")?,
            canonical: selector("link[rel=canonical][href]")?,
            base: selector("base[href]")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError(format!("bad selector {}: {}", css, e)))
}

fn first_href(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
}

/// Empty links and in-page fragments lead nowhere new
fn acceptable_link(href: &str) -> bool {
    !href.is_empty() && !href.starts_with('#')
}

impl Parser for HtmlParser {
    fn parse(&self, body: &str) -> Result<ParsedPage, ParseError> {
        let document = Html::parse_document(body);

        let links = document
            .select(&self.anchors)
            .filter_map(|element| element.value().attr("href"))
            .map(str::trim)
            .filter(|href| acceptable_link(href))
            .map(str::to_string)
            .collect();

        Ok(ParsedPage {
            links,
            canonical_url: first_href(&document, &self.canonical),
            base_url: first_href(&document, &self.base),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <base href="http://example.com/foo/bar/">
    <link rel="canonical" href="http://example.com/foo/bar ">
    <title>Foo Bar</title>
</head>
<body>
    <a href="/">Home</a>
    <a href="page.html">Some page</a>
    <a href="..">Up</a>
    <a href="http://some.other.com">External link</a>
    <a href=" javascript:void(0)">Click here!</a>
    <a href="#top">Top</a>
    <a href="  ">Blank</a>
    <a name="anchor">No href</a>
</body>
</html>
"##;

    #[test]
    fn test_parse() {
        let page = HtmlParser::new().unwrap().parse(HTML).unwrap();

        assert_eq!(page.canonical_url.as_deref(), Some("http://example.com/foo/bar"));
        assert_eq!(page.base_url.as_deref(), Some("http://example.com/foo/bar/"));
        assert_eq!(
            page.links,
            vec![
                "/",
                "page.html",
                "..",
                "http://some.other.com",
                "javascript:void(0)",
            ]
        );
    }

    #[test]
    fn test_parse_without_head() {
        let page = HtmlParser::new()
            .unwrap()
            .parse("<p>no links <a>here</a></p>")
            .unwrap();
        assert_eq!(page, ParsedPage::default());
    }
}
