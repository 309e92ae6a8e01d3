//! Stream URL harvesting: embed URL, content URL and thumbnail.
//!
//! Four strategies run in a fixed order and each contributes candidates to
//! the same three fields:
//!
//! 1. JSON-LD objects (`embedUrl`, `contentUrl`, `thumbnailUrl`)
//! 2. OpenGraph / Twitter video and image meta tags
//! 3. The first iframe pointing at a known video host
//! 4. A regex scan of inline scripts
//!
//! The first candidate of each field wins, so a later strategy only matters
//! for fields every earlier strategy left empty.

use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

use crate::acquisition::structured::first_string;
use crate::config::{StreamConfig, VideoHost};
use crate::document::{host_in, url_host_in, ParsedDocument};
use crate::error::{AtlasError, AtlasResult};
use crate::types::{CandidateField, SourceKind};

/// Meta keys that may carry a video URL.
const VIDEO_META_KEYS: &[&str] = &[
    "og:video",
    "og:video:url",
    "og:video:secure_url",
    "twitter:player",
    "twitter:player:stream",
];

/// Meta keys that may carry a preview image.
const IMAGE_META_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "thumbnail",
    "thumbnailUrl",
];

/// Key/value shapes in inline scripts, quoted or bare keys, plain or escaped JSON.
const SCRIPT_KEY_PATTERNS: &[(StreamField, &str)] = &[
    (
        StreamField::Embed,
        r#"\\?["']?embedUrl\\?["']?\s*[:=]\s*\\?["'](?P<value>[^"']+?)\\?["']"#,
    ),
    (
        StreamField::Content,
        r#"\\?["']?contentUrl\\?["']?\s*[:=]\s*\\?["'](?P<value>[^"']+?)\\?["']"#,
    ),
    (
        StreamField::Thumbnail,
        r#"\\?["']?thumbnailUrl\\?["']?\s*[:=]\s*\\?["'](?P<value>[^"']+?)\\?["']"#,
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamField {
    Embed,
    Content,
    Thumbnail,
}

/// Candidate values for the three stream fields.
#[derive(Debug, Clone)]
pub struct StreamCandidates {
    pub embed_url: CandidateField,
    pub content_url: CandidateField,
    pub thumbnail_url: CandidateField,
}

impl Default for StreamCandidates {
    fn default() -> Self {
        Self {
            embed_url: CandidateField::new("embedUrl"),
            content_url: CandidateField::new("contentUrl"),
            thumbnail_url: CandidateField::new("thumbnailUrl"),
        }
    }
}

impl StreamCandidates {
    fn field_mut(&mut self, field: StreamField) -> &mut CandidateField {
        match field {
            StreamField::Embed => &mut self.embed_url,
            StreamField::Content => &mut self.content_url,
            StreamField::Thumbnail => &mut self.thumbnail_url,
        }
    }
}

/// A video host with its id patterns compiled.
struct CompiledHost {
    host: VideoHost,
    id_patterns: Vec<Regex>,
}

impl CompiledHost {
    fn compile(host: &VideoHost) -> AtlasResult<Self> {
        let mut id_patterns = Vec::with_capacity(host.id_patterns.len());
        for pattern in &host.id_patterns {
            let regex = Regex::new(pattern)?;
            if regex.capture_names().flatten().all(|n| n != "id") {
                return Err(AtlasError::Config(format!(
                    "id pattern for host '{}' has no `id` group: {pattern}",
                    host.name
                )));
            }
            id_patterns.push(regex);
        }
        Ok(Self {
            host: host.clone(),
            id_patterns,
        })
    }

    fn owns(&self, url: &str) -> bool {
        url_host_in(url, &self.host.domains)
    }

    /// Whether `url` is in this host's embed form.
    fn is_embed(&self, url: &str) -> bool {
        let marker = self.host.embed_marker.as_str();
        !marker.is_empty()
            && parse_loose(url)
                .map(|u| u.path().contains(marker))
                .unwrap_or(false)
    }

    /// The content id carried by an embed URL or a short link.
    fn content_id(&self, url: &str) -> Option<String> {
        let parsed = parse_loose(url)?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let path = parsed.path();
        let tail = if host_in(&host, &self.host.short_domains) {
            path.trim_start_matches('/')
        } else {
            let marker = self.host.embed_marker.as_str();
            if marker.is_empty() {
                return None;
            }
            let idx = path.find(marker)?;
            &path[idx + marker.len()..]
        };
        let id = tail.split('/').next()?.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn watch_url(&self, id: &str) -> Option<String> {
        fill_template(&self.host.watch_template, id)
    }

    fn embed_url(&self, id: &str) -> Option<String> {
        fill_template(&self.host.embed_template, id)
    }
}

/// Extracts stream candidates from a parsed document.
pub struct Harvester {
    hosts: Vec<CompiledHost>,
    key_patterns: Vec<(StreamField, Regex)>,
    thumbnail_hosts: Vec<String>,
    max_json_depth: usize,
}

impl Harvester {
    /// Compile the host allowlist and script patterns.
    pub fn new(config: &StreamConfig) -> AtlasResult<Self> {
        let hosts = config
            .video_hosts
            .iter()
            .map(CompiledHost::compile)
            .collect::<AtlasResult<Vec<_>>>()?;
        let key_patterns = SCRIPT_KEY_PATTERNS
            .iter()
            .map(|(field, pattern)| Ok((*field, Regex::new(pattern)?)))
            .collect::<AtlasResult<Vec<_>>>()?;
        Ok(Self {
            hosts,
            key_patterns,
            thumbnail_hosts: config.thumbnail_hosts.clone(),
            max_json_depth: config.max_json_depth,
        })
    }

    pub fn max_json_depth(&self) -> usize {
        self.max_json_depth
    }

    /// Run every strategy over the document.
    ///
    /// `objects` are the document's JSON-LD objects in traversal order.
    pub fn harvest(&self, doc: &ParsedDocument, objects: &[&Map<String, Value>]) -> StreamCandidates {
        let mut out = StreamCandidates::default();
        self.from_json_ld(objects, &mut out);
        self.from_meta(doc, &mut out);
        self.from_iframes(doc, &mut out);
        self.from_scripts(doc, &mut out);
        tracing::debug!(
            "harvested {} embed / {} content / {} thumbnail candidates",
            out.embed_url.candidates().len(),
            out.content_url.candidates().len(),
            out.thumbnail_url.candidates().len()
        );
        out
    }

    fn host_for(&self, url: &str) -> Option<&CompiledHost> {
        self.hosts.iter().find(|h| h.owns(url))
    }

    // ── JSON-LD ─────────────────────────────────────────────────────────

    fn from_json_ld(&self, objects: &[&Map<String, Value>], out: &mut StreamCandidates) {
        for obj in objects {
            let fields = [
                ("embedUrl", StreamField::Embed),
                ("contentUrl", StreamField::Content),
                ("thumbnailUrl", StreamField::Thumbnail),
            ];
            for (key, field) in fields {
                if let Some(value) = obj.get(key).and_then(first_string) {
                    out.field_mut(field).push(SourceKind::JsonLd, value);
                }
            }
        }
    }

    // ── Meta tags ───────────────────────────────────────────────────────

    fn from_meta(&self, doc: &ParsedDocument, out: &mut StreamCandidates) {
        for key in VIDEO_META_KEYS {
            let Some(raw) = doc.meta(key) else { continue };
            let url = doc.resolve(&raw);
            let Some(host) = self.host_for(&url) else {
                tracing::trace!("meta {key} points off the video allowlist: {url}");
                continue;
            };
            let field = if host.is_embed(&url) {
                StreamField::Embed
            } else {
                StreamField::Content
            };
            out.field_mut(field).push(SourceKind::MetaTag, url);
        }

        for key in IMAGE_META_KEYS {
            let Some(raw) = doc.meta(key) else { continue };
            let url = doc.resolve(&raw);
            if self.thumbnail_hosts.is_empty() || url_host_in(&url, &self.thumbnail_hosts) {
                out.thumbnail_url.push(SourceKind::MetaTag, url);
            }
        }
    }

    // ── Iframes ─────────────────────────────────────────────────────────

    fn from_iframes(&self, doc: &ParsedDocument, out: &mut StreamCandidates) {
        let hit = doc.select("iframe").into_iter().find_map(|el| {
            let raw = el
                .value()
                .attr("src")
                .filter(|s| !s.trim().is_empty())
                .or_else(|| el.value().attr("data-src"))?;
            let url = doc.resolve(raw);
            self.host_for(&url).map(|host| (host, url))
        });
        let Some((host, url)) = hit else { return };

        if let Some(watch) = host.content_id(&url).and_then(|id| host.watch_url(&id)) {
            out.content_url.push(SourceKind::Iframe, watch);
        }
        out.embed_url.push(SourceKind::Iframe, url);
    }

    // ── Inline scripts ──────────────────────────────────────────────────

    fn from_scripts(&self, doc: &ParsedDocument, out: &mut StreamCandidates) {
        let scripts: Vec<String> = doc
            .inline_scripts()
            .into_iter()
            .map(|s| s.replace("\\/", "/"))
            .collect();
        if scripts.is_empty() {
            return;
        }

        for (field, regex) in &self.key_patterns {
            let found = scripts
                .iter()
                .find_map(|s| regex.captures(s).map(|c| unescape_script_value(&c["value"])));
            if let Some(value) = found {
                out.field_mut(*field)
                    .push(SourceKind::InlineScript, doc.resolve(&value));
            }
        }

        for host in &self.hosts {
            for regex in &host.id_patterns {
                let Some(id) = scripts
                    .iter()
                    .find_map(|s| regex.captures(s).map(|c| c["id"].to_string()))
                else {
                    continue;
                };
                if let Some(embed) = host.embed_url(&id) {
                    out.embed_url.push(SourceKind::InlineScript, embed);
                }
                if let Some(watch) = host.watch_url(&id) {
                    out.content_url.push(SourceKind::InlineScript, watch);
                }
            }
        }
    }
}

fn fill_template(template: &str, id: &str) -> Option<String> {
    (!template.is_empty() && template.contains("{id}")).then(|| template.replace("{id}", id))
}

/// Parse an absolute or protocol-relative URL.
fn parse_loose(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.starts_with("//") {
        Url::parse(&format!("https:{raw}")).ok()
    } else {
        Url::parse(raw).ok()
    }
}

/// Undo JSON string escaping commonly left in script-embedded URLs.
fn unescape_script_value(raw: &str) -> String {
    raw.replace("\\/", "/")
        .replace("\\u0026", "&")
        .replace("\\u002F", "/")
        .trim_end_matches('\\')
        .trim()
        .to_string()
}
