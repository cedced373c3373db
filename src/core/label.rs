//! Device label normalization, label policy and bracket range expansion.
//!
//! Labels read off physical devices or typed by users are rarely consistent
//! (`rack-05_unit--12`, `Rack 05 Unit 12`, `RACK.05.UNIT.12`). [`normalize`]
//! maps all of them onto one canonical form so they can be compared against
//! the labels stored in OpenDCIM.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Canonical separator between label tokens.
pub const SEPARATOR: char = '-';

/// Shortest trailing token treated as an embedded serial number.
pub const MIN_SERIAL_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidLabelError {
    #[error("label is empty")]
    Empty,

    #[error("label \"{0}\" cannot be made to follow the label policy")]
    Uncorrectable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedLabel {
    pub raw: String,
    pub canonical: String,
    pub extracted_serial: Option<String>,
}

impl NormalizedLabel {
    pub fn matches(&self, other: &NormalizedLabel) -> bool {
        self.canonical == other.canonical
    }

    /// 含序號的完整正規化字串
    pub fn full(&self) -> String {
        match &self.extracted_serial {
            Some(serial) => format!("{}{}{}", self.canonical, SEPARATOR, serial),
            None => self.canonical.clone(),
        }
    }
}

/// Normalize a raw device label.
///
/// Alphabetic characters are upper-cased, runs of whitespace, `-`, `_` and
/// `.` collapse into a single `-`, and separators at either end are dropped.
/// A trailing serial-shaped token (see [`MIN_SERIAL_LEN`]) is moved into
/// `extracted_serial` unless the token before it looks like a serial too.
///
/// Fails only when nothing but whitespace or separators is left.
pub fn normalize(raw: &str) -> Result<NormalizedLabel, InvalidLabelError> {
    let collapsed = collapse(raw);
    if collapsed.is_empty() {
        return Err(InvalidLabelError::Empty);
    }

    let (canonical, extracted_serial) = split_serial(&collapsed);

    Ok(NormalizedLabel {
        raw: raw.to_string(),
        canonical,
        extracted_serial,
    })
}

/// 兩個標籤正規化後是否相同；無效標籤一律不相符
pub fn labels_match(a: &str, b: &str) -> bool {
    match (normalize(a), normalize(b)) {
        (Ok(a), Ok(b)) => a.matches(&b),
        _ => false,
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '_' | '.')
}

fn collapse(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for c in raw.chars() {
        if is_separator(c) {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push(SEPARATOR);
        }
        pending_separator = false;
        out.extend(c.to_uppercase());
    }

    out
}

fn is_serial_shaped(token: &str) -> bool {
    token.len() >= MIN_SERIAL_LEN
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token.chars().any(|c| c.is_ascii_digit())
}

fn split_serial(normalized: &str) -> (String, Option<String>) {
    if let Some((head, last)) = normalized.rsplit_once(SEPARATOR) {
        // 前一個 token 也像序號時無法判斷，保留原樣（也確保冪等）
        let previous = head.rsplit(SEPARATOR).next().unwrap_or(head);
        if is_serial_shaped(last) && !is_serial_shaped(previous) {
            return (head.to_string(), Some(last.to_string()));
        }
    }
    (normalized.to_string(), None)
}

fn valid_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("label policy regex"))
}

/// OpenDCIM label policy: only `a-z`, `0-9` and single, inner `-`.
pub fn is_valid_label(label: &str) -> bool {
    valid_label_re().is_match(label)
}

/// Rewrite a label so it follows the label policy, keeping any serial.
pub fn policy_label(raw: &str) -> Result<String, InvalidLabelError> {
    let label = normalize(raw)?.full().to_lowercase();
    if is_valid_label(&label) {
        Ok(label)
    } else {
        Err(InvalidLabelError::Uncorrectable(raw.to_string()))
    }
}

fn bracket_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([0-9]+)-([0-9]+)\]").expect("bracket range regex"))
}

/// Expand `node[21-23]` into `node21`, `node22`, `node23`.
///
/// Strings without a valid numeric range come back unchanged; a reversed
/// range (`[9-7]`) expands to nothing. A zero-padded start (`[08-10]`) keeps
/// its width.
pub fn expand_brackets(input: &str) -> Vec<String> {
    let Some(caps) = bracket_range_re().captures(input) else {
        return vec![input.to_string()];
    };
    let (Some(whole), Some(start), Some(end)) = (caps.get(0), caps.get(1), caps.get(2)) else {
        return vec![input.to_string()];
    };
    let (Ok(first), Ok(last)) = (start.as_str().parse::<u64>(), end.as_str().parse::<u64>())
    else {
        return vec![input.to_string()];
    };

    let width = if start.as_str().starts_with('0') {
        start.as_str().len()
    } else {
        0
    };
    let prefix = &input[..whole.start()];
    let suffix = &input[whole.end()..];

    (first..=last)
        .map(|n| format!("{}{:0width$}{}", prefix, n, suffix, width = width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_and_uppercase() {
        let label = normalize("rack-05_unit--12").unwrap();
        assert_eq!(label.canonical, "RACK-05-UNIT-12");
        assert_eq!(label.extracted_serial, None);
        assert_eq!(label.raw, "rack-05_unit--12");
    }

    #[test]
    fn test_mixed_whitespace_and_separators() {
        let label = normalize("  Rack 05 . unit\t_12__ ").unwrap();
        assert_eq!(label.canonical, "RACK-05-UNIT-12");
    }

    #[test]
    fn test_leading_and_trailing_separators_stripped() {
        assert_eq!(normalize("--node101..").unwrap().canonical, "NODE101");
    }

    #[test]
    fn test_other_characters_are_kept() {
        assert_eq!(normalize("pdu/a#1").unwrap().canonical, "PDU/A#1");
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        assert_eq!(normalize(""), Err(InvalidLabelError::Empty));
        assert_eq!(normalize("   "), Err(InvalidLabelError::Empty));
        assert_eq!(normalize(" \t\n"), Err(InvalidLabelError::Empty));
        assert_eq!(normalize("-_."), Err(InvalidLabelError::Empty));
    }

    #[test]
    fn test_serial_extraction() {
        let label = normalize("r730-node12 5kq8xy2").unwrap();
        assert_eq!(label.canonical, "R730-NODE12");
        assert_eq!(label.extracted_serial.as_deref(), Some("5KQ8XY2"));
        assert_eq!(label.full(), "R730-NODE12-5KQ8XY2");
    }

    #[test]
    fn test_no_serial_for_short_or_single_token() {
        assert_eq!(normalize("node-12ab").unwrap().extracted_serial, None);
        assert_eq!(normalize("5KQ8XY2").unwrap().extracted_serial, None);
        // 純字母或純數字不算序號
        assert_eq!(normalize("chassis-controller").unwrap().extracted_serial, None);
        assert_eq!(normalize("node-12345678").unwrap().extracted_serial, None);
    }

    #[test]
    fn test_ambiguous_double_serial_not_extracted() {
        let label = normalize("a-ABC1234-XYZ9876").unwrap();
        assert_eq!(label.canonical, "A-ABC1234-XYZ9876");
        assert_eq!(label.extracted_serial, None);
    }

    #[test]
    fn test_idempotence() {
        let samples = [
            "rack-05_unit--12",
            "  node 101 ",
            "r730-node12 5kq8xy2",
            "a-ABC1234-XYZ9876",
            "x_ABCDEF1_y_GHIJKL2",
            "pdu/a#1",
            "straße-1",
            "...lone...",
        ];
        for raw in samples {
            let first = normalize(raw).unwrap();
            let second = normalize(&first.canonical).unwrap();
            assert_eq!(second.canonical, first.canonical, "input {:?}", raw);
            assert_eq!(second.extracted_serial, None, "input {:?}", raw);
            assert_eq!(normalize(&second.canonical).unwrap(), second);
        }
    }

    #[test]
    fn test_labels_match() {
        assert!(labels_match("node-101", "NODE_101"));
        assert!(labels_match("Rack 5", "rack.5"));
        assert!(!labels_match("node101", "node-101"));
        assert!(!labels_match("", ""));
    }

    #[test]
    fn test_label_policy() {
        assert!(is_valid_label("node101"));
        assert!(is_valid_label("rack-05-unit-12"));
        assert!(!is_valid_label("Node101"));
        assert!(!is_valid_label("node--101"));
        assert!(!is_valid_label("-node"));
        assert!(!is_valid_label("node_101"));
    }

    #[test]
    fn test_policy_label_repair() {
        assert_eq!(policy_label("Node_101").unwrap(), "node-101");
        assert_eq!(policy_label("R730 node12 5KQ8XY2").unwrap(), "r730-node12-5kq8xy2");
        assert_eq!(
            policy_label("pdu/a"),
            Err(InvalidLabelError::Uncorrectable("pdu/a".to_string()))
        );
        assert_eq!(policy_label("  "), Err(InvalidLabelError::Empty));
    }

    #[test]
    fn test_expand_no_brackets() {
        assert_eq!(expand_brackets("foobaz"), vec!["foobaz"]);
    }

    #[test]
    fn test_expand_invalid_brackets() {
        assert_eq!(expand_brackets("foo[bar123]"), vec!["foo[bar123]"]);
    }

    #[test]
    fn test_expand_valid_range() {
        assert_eq!(expand_brackets("qu[1-3]ux"), vec!["qu1ux", "qu2ux", "qu3ux"]);
    }

    #[test]
    fn test_expand_single_range() {
        assert_eq!(expand_brackets("foo[107-107]"), vec!["foo107"]);
    }

    #[test]
    fn test_expand_reversed_range() {
        assert!(expand_brackets("foo[9-7]").is_empty());
    }

    #[test]
    fn test_expand_zero_padded_range() {
        assert_eq!(expand_brackets("node[08-10]"), vec!["node08", "node09", "node10"]);
    }
}
