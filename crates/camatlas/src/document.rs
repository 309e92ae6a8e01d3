//! The parsed, queryable page every extractor reads from.
//!
//! Wraps a `scraper::Html` tree together with the final navigated URL. All
//! helpers are synchronous; `scraper` types are `!Send`, so a document must
//! not be held across an `.await`.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Tags whose text content is never shown to the reader.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A parsed HTML document plus the URL it was served from.
pub struct ParsedDocument {
    html: Html,
    source: String,
    final_url: String,
    base: Option<Url>,
}

impl ParsedDocument {
    /// Parse `html` as served from `final_url`.
    pub fn parse(html: &str, final_url: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            source: html.to_string(),
            final_url: final_url.to_string(),
            base: Url::parse(final_url).ok(),
        }
    }

    /// The markup as served, before parsing.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn final_url(&self) -> &str {
        &self.final_url
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// All elements matching a CSS selector. An invalid selector matches nothing.
    pub fn select<'a>(&'a self, css: &str) -> Vec<ElementRef<'a>> {
        match Selector::parse(css) {
            Ok(sel) => self.html.select(&sel).collect(),
            Err(_) => {
                tracing::debug!("invalid selector: {css}");
                Vec::new()
            }
        }
    }

    /// The first element matching a CSS selector.
    pub fn select_first<'a>(&'a self, css: &str) -> Option<ElementRef<'a>> {
        let sel = Selector::parse(css).ok()?;
        self.html.select(&sel).next()
    }

    /// `content` of the first `<meta>` whose `attr` equals `key`.
    pub fn meta_content(&self, attr: &str, key: &str) -> Option<String> {
        self.select("meta")
            .into_iter()
            .filter(|el| {
                el.value()
                    .attr(attr)
                    .map(|v| v.trim().eq_ignore_ascii_case(key))
                    .unwrap_or(false)
            })
            .find_map(|el| el.value().attr("content").map(|c| c.trim().to_string()))
            .filter(|c| !c.is_empty())
    }

    /// `content` of the first `<meta>` keyed by `key` through `property`,
    /// `name` or `itemprop`.
    pub fn meta(&self, key: &str) -> Option<String> {
        ["property", "name", "itemprop"]
            .iter()
            .find_map(|attr| self.meta_content(attr, key))
    }

    /// Text of every inline `<script>` (no `src`), in document order.
    pub fn inline_scripts(&self) -> Vec<String> {
        self.select("script")
            .into_iter()
            .filter(|el| el.value().attr("src").is_none())
            .map(|el| el.text().collect::<String>())
            .filter(|t| !t.trim().is_empty())
            .collect()
    }

    /// Raw text of every JSON-LD block, in document order.
    pub fn json_ld_blocks(&self) -> Vec<String> {
        self.select(r#"script[type="application/ld+json"]"#)
            .into_iter()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Resolve a possibly relative href against the document URL.
    ///
    /// Absolute URLs come back normalised; anything that cannot be joined is
    /// returned trimmed but otherwise unchanged.
    pub fn resolve(&self, href: &str) -> String {
        let href = href.trim();
        if href.is_empty() {
            return String::new();
        }
        if let Ok(abs) = Url::parse(href) {
            return abs.to_string();
        }
        match &self.base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None if href.starts_with("//") => format!("https:{href}"),
            None => href.to_string(),
        }
    }

    /// Number of characters of visible text, each text node trimmed.
    pub fn visible_text_len(&self) -> usize {
        self.html
            .tree
            .nodes()
            .filter_map(|node| match node.value() {
                Node::Text(text) => {
                    let hidden = node.ancestors().any(|a| {
                        a.value()
                            .as_element()
                            .map(|e| INVISIBLE_TAGS.contains(&e.name()))
                            .unwrap_or(false)
                    });
                    (!hidden).then(|| text.trim().chars().count())
                }
                _ => None,
            })
            .sum()
    }
}

/// Whitespace-collapsed text content of an element.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether an element's `class` attribute contains `needle`, ignoring case.
pub fn class_contains(el: &ElementRef<'_>, needle: &str) -> bool {
    el.value()
        .attr("class")
        .map(|c| c.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
        .unwrap_or(false)
}

/// Host of a URL string; protocol-relative URLs are accepted.
pub fn host_of(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = if raw.starts_with("//") {
        Url::parse(&format!("https:{raw}")).ok()?
    } else {
        Url::parse(raw).ok()?
    };
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

/// Whether `host` is one of `domains` or a subdomain of one.
pub fn host_in(host: &str, domains: &[String]) -> bool {
    domains.iter().any(|d| {
        let d = d.trim().to_ascii_lowercase();
        host == d || host.ends_with(&format!(".{d}"))
    })
}

/// Whether the URL's host is one of `domains` or a subdomain of one.
pub fn url_host_in(raw: &str, domains: &[String]) -> bool {
    host_of(raw).map(|h| host_in(&h, domains)).unwrap_or(false)
}
