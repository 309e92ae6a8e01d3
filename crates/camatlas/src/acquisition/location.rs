//! Country / city resolution from breadcrumbs and URL shape.

use scraper::Selector;
use url::Url;

use crate::config::LocationConfig;
use crate::document::{class_contains, element_text, ParsedDocument};
use crate::error::{AtlasError, AtlasResult};
use crate::types::{BreadcrumbTrail, CandidateField, Crumb, SourceKind};

const COUNTRY: &str = "{country}";
const CITY: &str = "{city}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Country,
    City,
    Wildcard,
}

/// A compiled hierarchy template such as `/countries/{country}/{city}`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
    country_at: usize,
    city_at: Option<usize>,
}

impl PathPattern {
    /// Compile a template. Unknown `{placeholders}` match any segment.
    pub fn parse(template: &str) -> AtlasResult<Self> {
        let segments: Vec<Segment> = split_path(template)
            .into_iter()
            .map(|seg| match seg.as_str() {
                COUNTRY => Segment::Country,
                CITY => Segment::City,
                s if s.starts_with('{') && s.ends_with('}') => Segment::Wildcard,
                s => Segment::Literal(s.to_string()),
            })
            .collect();

        let country_at = segments
            .iter()
            .position(|s| *s == Segment::Country)
            .ok_or_else(|| {
                AtlasError::Config(format!("path pattern has no {COUNTRY} segment: {template}"))
            })?;
        let city_at = segments.iter().position(|s| *s == Segment::City);
        if matches!(city_at, Some(idx) if idx < country_at) {
            return Err(AtlasError::Config(format!(
                "path pattern puts {CITY} before {COUNTRY}: {template}"
            )));
        }

        Ok(Self {
            segments,
            country_at,
            city_at,
        })
    }

    fn literals_match(&self, parts: &[String], upto: usize) -> bool {
        self.segments
            .iter()
            .zip(parts)
            .take(upto)
            .all(|(seg, part)| match seg {
                Segment::Literal(lit) => lit.eq_ignore_ascii_case(part),
                _ => true,
            })
    }

    /// The country slug when `parts` is exactly the country node's path.
    pub fn country_node(&self, parts: &[String]) -> Option<String> {
        self.node_at(parts, self.country_at, true)
    }

    /// The city slug when `parts` is exactly the city node's path.
    pub fn city_node(&self, parts: &[String]) -> Option<String> {
        self.node_at(parts, self.city_at?, true)
    }

    /// The country slug of any path at or below the country node.
    pub fn country_prefix(&self, parts: &[String]) -> Option<String> {
        self.node_at(parts, self.country_at, false)
    }

    /// The city slug of any path at or below the city node.
    pub fn city_prefix(&self, parts: &[String]) -> Option<String> {
        self.node_at(parts, self.city_at?, false)
    }

    fn node_at(&self, parts: &[String], idx: usize, exact: bool) -> Option<String> {
        let long_enough = if exact {
            parts.len() == idx + 1
        } else {
            parts.len() > idx
        };
        if !long_enough || !self.literals_match(parts, idx) {
            return None;
        }
        let slug = parts[idx].trim();
        (!slug.is_empty()).then(|| slug.to_string())
    }
}

/// Non-empty path segments of an href or URL, query and fragment ignored.
fn split_path(raw: &str) -> Vec<String> {
    let path = match Url::parse(raw) {
        Ok(url) => url.path().to_string(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// `da-nang` → `Da Nang`.
pub fn slug_to_title(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Every breadcrumb container on the page, one trail each.
pub fn breadcrumb_trails(doc: &ParsedDocument) -> Vec<BreadcrumbTrail> {
    let Ok(anchors) = Selector::parse("a") else {
        return Vec::new();
    };
    doc.select("nav, ol, ul")
        .into_iter()
        .filter(|el| class_contains(el, "breadcrumb"))
        .map(|container| BreadcrumbTrail {
            crumbs: container
                .select(&anchors)
                .map(|a| Crumb {
                    display_text: element_text(&a),
                    href: a.value().attr("href").unwrap_or_default().trim().to_string(),
                    title_attribute: a.value().attr("title").unwrap_or_default().trim().to_string(),
                })
                .collect(),
        })
        .filter(|trail| !trail.crumbs.is_empty())
        .collect()
}

/// Resolved country and city candidates.
#[derive(Debug, Clone)]
pub struct Location {
    pub country: CandidateField,
    pub city: CandidateField,
}

impl Location {
    pub fn country(&self) -> String {
        self.country.value()
    }

    /// The city, defaulting to the country when no city signal exists.
    pub fn city(&self) -> String {
        match self.city.resolve() {
            Some(c) => c.value.clone(),
            None => self.country(),
        }
    }
}

/// Resolves the place hierarchy of a listing page.
#[derive(Debug, Clone)]
pub struct LocationResolver {
    pattern: PathPattern,
}

impl LocationResolver {
    pub fn new(config: &LocationConfig) -> AtlasResult<Self> {
        Ok(Self {
            pattern: PathPattern::parse(&config.path_pattern)?,
        })
    }

    pub fn resolve(&self, doc: &ParsedDocument) -> Location {
        let trails = breadcrumb_trails(doc);
        self.resolve_from(&trails, doc.final_url())
    }

    /// Resolve from already-extracted trails and the visited URL.
    pub fn resolve_from(&self, trails: &[BreadcrumbTrail], visited_url: &str) -> Location {
        let mut country = CandidateField::new("country");
        let mut city = CandidateField::new("city");

        let crumbs = trails.iter().flat_map(|t| t.crumbs.iter());
        for crumb in crumbs {
            let parts = split_path(&crumb.href);
            if !country.is_resolved() {
                if let Some(slug) = self.pattern.country_node(&parts) {
                    country.push(SourceKind::Breadcrumb, crumb_value(crumb, &slug));
                }
            }
            if !city.is_resolved() {
                if let Some(slug) = self.pattern.city_node(&parts) {
                    city.push(SourceKind::Breadcrumb, crumb_value(crumb, &slug));
                }
            }
        }

        let visited = split_path(visited_url);
        if let Some(slug) = self.pattern.country_prefix(&visited) {
            country.push(SourceKind::PageUrl, slug_to_title(&slug));
        }
        if let Some(slug) = self.pattern.city_prefix(&visited) {
            city.push(SourceKind::PageUrl, slug_to_title(&slug));
        }

        tracing::debug!(
            "location: country={:?} city={:?}",
            country.resolve().map(|c| &c.value),
            city.resolve().map(|c| &c.value)
        );
        Location { country, city }
    }
}

fn crumb_value(crumb: &Crumb, slug: &str) -> String {
    if crumb.title_attribute.is_empty() {
        slug_to_title(slug)
    } else {
        crumb.title_attribute.clone()
    }
}
