//! Row decoding: one comma-separated line -> one nested record.
//!
//! Values are split naively on the delimiter; quoting and escaping are not recognised.

use super::path::{assign, HeaderPath};
use super::{DecodedRecord, FieldMap};

pub const DELIMITER: char = ',';

/// Parse the header line into one path per column.
pub fn parse_header(line: &str) -> Vec<HeaderPath> {
    line.split(DELIMITER).map(HeaderPath::parse).collect()
}

/// Decode a data line against the header.
///
/// Returns `None` for blank lines and for lines whose value count differs from the header's
/// column count.
pub fn decode(header: &[HeaderPath], raw_line: &str) -> Option<DecodedRecord> {
    if raw_line.trim().is_empty() {
        return None;
    }

    let values: Vec<&str> = raw_line.split(DELIMITER).map(str::trim).collect();
    if values.len() != header.len() {
        return None;
    }

    let mut record = FieldMap::new();
    for (path, value) in header.iter().zip(values) {
        assign(&mut record, path, value.to_string());
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::FieldValue;

    #[test]
    fn test_decode_nested_record() {
        let header = parse_header("name.firstName, name.lastName ,age,address.city");
        let record = decode(&header, " Ann , Lee,34,Boston ").unwrap();

        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"name":{"firstName":"Ann","lastName":"Lee"},"age":"34","address":{"city":"Boston"}}"#
        );
    }

    #[test]
    fn test_blank_line_skipped() {
        let header = parse_header("a,b");
        assert!(decode(&header, "").is_none());
        assert!(decode(&header, "   \t").is_none());
    }

    #[test]
    fn test_column_mismatch_skipped() {
        let header = parse_header("name.firstName,name.lastName,age");
        assert!(decode(&header, "Ann,Lee").is_none());
        assert!(decode(&header, "Ann,Lee,34,extra").is_none());
    }

    #[test]
    fn test_empty_values_kept() {
        let header = parse_header("a,b,c");
        let record = decode(&header, "x,,").unwrap();
        assert_eq!(record.get("b"), Some(&FieldValue::Scalar(String::new())));
        assert_eq!(record.len(), 3);
    }

    #[test]
    fn test_header_order_preserved() {
        let header = parse_header("zeta,alpha,mid");
        let record = decode(&header, "1,2,3").unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }
}
