//! JSON-LD blocks and their traversal.
//!
//! Structured-data payloads are untyped: a block may be a single object, an
//! array of objects, or an object carrying an `@graph` collection, and any
//! object may nest further objects. `serde_json::Value` already models the
//! payload as a sum type; this module walks it with an explicit stack so a
//! hostile page cannot blow the call stack.

use serde_json::{Map, Value};

use crate::document::ParsedDocument;

/// Parse every JSON-LD block of the document. Malformed blocks are skipped.
pub fn parse_blocks(doc: &ParsedDocument) -> Vec<Value> {
    let mut values = Vec::new();
    for (idx, text) in doc.json_ld_blocks().iter().enumerate() {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => values.push(value),
            Err(e) => tracing::debug!("skipping malformed JSON-LD block #{idx}: {e}"),
        }
    }
    values
}

/// Every JSON object reachable from `blocks`, pre-order.
///
/// Blocks are visited in document order, array items in index order, and an
/// object is always yielded before the objects nested inside it. Nesting
/// deeper than `max_depth` is not descended into.
pub fn walk_objects(blocks: &[Value], max_depth: usize) -> Vec<&Map<String, Value>> {
    let mut out = Vec::new();
    let mut stack: Vec<(&Value, usize)> = blocks.iter().rev().map(|v| (v, 0)).collect();

    while let Some((value, depth)) = stack.pop() {
        let children: Vec<&Value> = match value {
            Value::Object(map) => {
                out.push(map);
                map.values().collect()
            }
            Value::Array(items) => items.iter().collect(),
            _ => continue,
        };
        if depth >= max_depth {
            tracing::debug!("structured data nested deeper than {max_depth}; truncating");
            continue;
        }
        for child in children.into_iter().rev() {
            if child.is_object() || child.is_array() {
                stack.push((child, depth + 1));
            }
        }
    }

    out
}

/// A URL-ish string from a JSON-LD value.
///
/// Accepts a plain string, the first usable element of a list, or an object
/// carrying `url` / `contentUrl` (e.g. an `ImageObject`).
pub fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => items.iter().find_map(first_string),
        Value::Object(map) => map
            .get("url")
            .or_else(|| map.get("contentUrl"))
            .and_then(first_string),
        _ => None,
    }
}

/// A number, or a string holding one.
pub fn number_like(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|v| v.is_finite())
}

/// The first non-empty `name` in traversal order.
pub fn first_name(objects: &[&Map<String, Value>]) -> Option<String> {
    objects
        .iter()
        .filter_map(|obj| obj.get("name").and_then(|n| n.as_str()))
        .map(str::trim)
        .find(|n| !n.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_walk_visits_graph_and_nested_objects() {
        let blocks = vec![json!({
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "WebPage", "name": "Page"},
                {"@type": "VideoObject", "publisher": {"@type": "Organization", "name": "Org"}}
            ]
        })];
        let objects = walk_objects(&blocks, 64);
        assert_eq!(objects.len(), 4);
        assert_eq!(objects[1]["name"], "Page");
        assert_eq!(objects[3]["name"], "Org");
    }

    #[test]
    fn test_walk_arrays_in_block_order() {
        let blocks = vec![
            json!([{"n": 1}, {"n": 2}]),
            json!({"n": 3}),
        ];
        let ns: Vec<_> = walk_objects(&blocks, 64)
            .iter()
            .map(|o| o["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![1, 2, 3]);
    }

    #[test]
    fn test_walk_depth_limit() {
        let mut deep = json!({"leaf": true});
        for _ in 0..200 {
            deep = json!({ "child": deep });
        }
        let blocks = vec![deep];
        let objects = walk_objects(&blocks, 10);
        assert_eq!(objects.len(), 11);
    }

    #[test]
    fn test_malformed_block_skipped() {
        let doc = ParsedDocument::parse(
            r#"<html><head>
            <script type="application/ld+json">{not valid json}</script>
            <script type="application/ld+json">{"name": "ok"}</script>
            </head></html>"#,
            "https://x.io/",
        );
        let blocks = parse_blocks(&doc);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["name"], "ok");
    }

    #[test]
    fn test_first_string_shapes() {
        assert_eq!(first_string(&json!(" a ")), Some("a".into()));
        assert_eq!(first_string(&json!(["", "b", "c"])), Some("b".into()));
        assert_eq!(
            first_string(&json!({"@type": "ImageObject", "url": "u"})),
            Some("u".into())
        );
        assert_eq!(first_string(&json!(42)), None);
    }

    #[test]
    fn test_number_like() {
        assert_eq!(number_like(&json!(16.5)), Some(16.5));
        assert_eq!(number_like(&json!(" 108.2 ")), Some(108.2));
        assert_eq!(number_like(&json!("north")), None);
    }
}
