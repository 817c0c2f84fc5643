//! Dotted header paths and nested assignment.

use super::{FieldMap, FieldValue};

/// A header label split on `.`, each segment trimmed. Always holds at least one segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderPath {
    segments: Vec<String>,
}

impl HeaderPath {
    pub fn parse(label: &str) -> Self {
        let segments = label
            .trim()
            .split('.')
            .map(|s| s.trim().to_string())
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Write `value` into `root` at `path`.
///
/// Last write wins: a final segment overwrites whatever is there (mapping included), and an
/// intermediate segment holding a scalar is replaced by an empty mapping before descending.
pub fn assign(root: &mut FieldMap, path: &HeaderPath, value: String) {
    assign_segments(root, path.segments(), value);
}

fn assign_segments(node: &mut FieldMap, segments: &[String], value: String) {
    match segments {
        [] => {}
        [last] => {
            node.insert(last.clone(), FieldValue::Scalar(value));
        }
        [head, rest @ ..] => {
            let slot = node
                .entry(head.clone())
                .or_insert_with(|| FieldValue::Mapping(FieldMap::new()));
            if !matches!(*slot, FieldValue::Mapping(_)) {
                *slot = FieldValue::Mapping(FieldMap::new());
            }
            if let FieldValue::Mapping(child) = slot {
                assign_segments(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> FieldValue {
        FieldValue::Scalar(s.to_string())
    }

    #[test]
    fn test_parse_trims_segments() {
        let path = HeaderPath::parse("  name . firstName ");
        assert_eq!(path.segments(), &["name".to_string(), "firstName".to_string()]);
        assert_eq!(HeaderPath::parse("age").len(), 1);
    }

    #[test]
    fn test_single_segment_last_write_wins() {
        let mut root = FieldMap::new();
        let path = HeaderPath::parse("age");
        assign(&mut root, &path, "30".to_string());
        assign(&mut root, &path, "31".to_string());

        assert_eq!(root.len(), 1);
        assert_eq!(root.get("age"), Some(&scalar("31")));
    }

    #[test]
    fn test_shared_prefix_merges() {
        let mut root = FieldMap::new();
        assign(&mut root, &HeaderPath::parse("name.firstName"), "Ann".to_string());
        assign(&mut root, &HeaderPath::parse("name.lastName"), "Lee".to_string());

        let name = root.get("name").and_then(FieldValue::as_mapping).unwrap();
        assert_eq!(name.get("firstName"), Some(&scalar("Ann")));
        assert_eq!(name.get("lastName"), Some(&scalar("Lee")));
        assert_eq!(root.len(), 1);
    }

    #[test]
    fn test_scalar_prefix_replaced_by_mapping() {
        let mut root = FieldMap::new();
        assign(&mut root, &HeaderPath::parse("address"), "Boston".to_string());
        assign(&mut root, &HeaderPath::parse("address.city"), "Austin".to_string());

        let address = root.get("address").and_then(FieldValue::as_mapping).unwrap();
        assert_eq!(address.get("city"), Some(&scalar("Austin")));
    }

    #[test]
    fn test_scalar_overwrites_mapping() {
        let mut root = FieldMap::new();
        assign(&mut root, &HeaderPath::parse("address.city"), "Austin".to_string());
        assign(&mut root, &HeaderPath::parse("address"), "n/a".to_string());

        assert_eq!(root.get("address"), Some(&scalar("n/a")));
    }

    #[test]
    fn test_deep_path() {
        let mut root = FieldMap::new();
        assign(&mut root, &HeaderPath::parse("a.b.c.d"), "x".to_string());

        let json = serde_json::to_string(&root).unwrap();
        assert_eq!(json, r#"{"a":{"b":{"c":{"d":"x"}}}}"#);
    }
}
