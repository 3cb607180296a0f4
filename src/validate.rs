//! StatsD line validator/parser.
//!
//! Grammar: `KEY ':' VALUE '|' TYPE ( '|@' RATE )?`. The key may itself
//! contain `:` (tag-encoded keys embed them), so the value separator is the
//! **last** `:` in the line, not the first — e.g.
//! `keyname.__tagname=tag:value:42.0|ms` splits the value off the final
//! colon, not the first one.

use crate::error::ValidateError;

/// Metric type tag, in the ordinal order of the source's parse table. The
/// ordinal is load-bearing: it is the identity shared between the parse
/// table and the runtime type tag stored on a sample bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetricType {
    Counter = 0,
    Timer = 1,
    KeyValue = 2,
    Gauge = 3,
    Histogram = 4,
    Set = 5,
}

impl MetricType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "c" => Some(MetricType::Counter),
            "ms" => Some(MetricType::Timer),
            "kv" => Some(MetricType::KeyValue),
            "g" => Some(MetricType::Gauge),
            "h" => Some(MetricType::Histogram),
            "s" => Some(MetricType::Set),
            _ => None,
        }
    }
}

/// A successfully parsed StatsD line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedRecord<'a> {
    pub key: &'a str,
    pub value: f64,
    pub metric_type: MetricType,
    /// Client-side sample rate already applied upstream, in `(0, 1]`.
    /// Defaults to `1.0` when the line carries no `|@rate` suffix.
    pub presampling_value: f64,
}

/// Scans the longest valid `strtod`-style prefix of `s`, returning the
/// number of bytes consumed. Returns `0` if no valid number prefix exists —
/// the source's "zero result with no consumed characters" failure mode.
fn scan_double_prefix(s: &[u8]) -> usize {
    let n = s.len();
    let mut i = 0;

    if i < n && (s[i] == b'+' || s[i] == b'-') {
        i += 1;
    }

    let int_start = i;
    while i < n && s[i].is_ascii_digit() {
        i += 1;
    }
    let mut has_digits = i > int_start;

    if i < n && s[i] == b'.' {
        let dot = i;
        let mut j = i + 1;
        let frac_start = j;
        while j < n && s[j].is_ascii_digit() {
            j += 1;
        }
        if has_digits || j > frac_start {
            has_digits = true;
            i = j;
        } else {
            // Lone '.' with no digits on either side doesn't belong to the
            // number at all.
            i = dot;
        }
    }

    if !has_digits {
        return 0;
    }

    let mark = i;
    if i < n && (s[i] == b'e' || s[i] == b'E') {
        let mut j = i + 1;
        if j < n && (s[j] == b'+' || s[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < n && s[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        } else {
            i = mark;
        }
    }

    i
}

/// Parses the longest valid double prefix of `s`. Returns `None` if no
/// digits were consumed (mirrors `strtod` returning `0` with `err == start`).
fn parse_leading_f64(s: &str) -> Option<(f64, usize)> {
    let consumed = scan_double_prefix(s.as_bytes());
    if consumed == 0 {
        return None;
    }
    s[..consumed].parse::<f64>().ok().map(|v| (v, consumed))
}

/// Parses a single StatsD line into a [`ParsedRecord`].
///
/// The input is never mutated; on any failure a [`ValidateError`] carrying
/// the original line is returned.
pub fn validate(line: &str) -> Result<ParsedRecord<'_>, ValidateError> {
    let fail = || ValidateError::new(line);

    // Search backwards: a tag-encoded key can itself contain ':'.
    let colon = line.rfind(':').ok_or_else(fail)?;
    if colon == 0 {
        return Err(fail());
    }
    let key = &line[..colon];

    let after_colon = &line[colon + 1..];
    let (value, value_len) = parse_leading_f64(after_colon).ok_or_else(fail)?;
    let after_value_pos = colon + 1 + value_len;

    let after_value = &line[after_value_pos..];
    let pipe1_rel = after_value.find('|').ok_or_else(fail)?;
    let type_field_start = after_value_pos + pipe1_rel + 1;

    let rest = &line[type_field_start..];
    let pipe2_rel = rest.find('|');
    let type_str = match pipe2_rel {
        Some(rel) => &rest[..rel],
        None => rest,
    };

    let metric_type = MetricType::from_tag(type_str).ok_or_else(fail)?;

    let mut presampling_value = 1.0;
    if let Some(rel) = pipe2_rel {
        let pipe2_pos = type_field_start + rel;
        let after_pipe2 = &line[pipe2_pos + 1..];
        let mut chars = after_pipe2.chars();
        if chars.next() != Some('@') {
            return Err(fail());
        }
        let rate_str = &after_pipe2[1..];
        if rate_str.is_empty() {
            return Err(fail());
        }
        let (rate, rate_len) = parse_leading_f64(rate_str).ok_or_else(fail)?;
        let _ = rate_len;
        presampling_value = rate;
    }

    Ok(ParsedRecord {
        key,
        value,
        metric_type,
        presampling_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_containing_colons_splits_on_last_colon() {
        let r = validate("a.b.c.__tag1=v1.__tag2=v2:v2:42.000|ms").unwrap();
        assert_eq!(r.key, "a.b.c.__tag1=v1.__tag2=v2:v2");
        assert_eq!(r.value, 42.0);
        assert_eq!(r.metric_type, MetricType::Timer);
        assert_eq!(r.presampling_value, 1.0);
    }

    #[test]
    fn presampling_rate_is_parsed() {
        let r = validate("test.srv.req:2.5|ms|@0.2").unwrap();
        assert_eq!(r.value, 2.5);
        assert_eq!(r.metric_type, MetricType::Timer);
        assert_eq!(r.presampling_value, 0.2);
    }

    #[test]
    fn missing_colon_is_rejected() {
        assert!(validate("novalue|c").is_err());
    }

    #[test]
    fn missing_pipe_is_rejected() {
        assert!(validate("key:1").is_err());
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(validate(":1|c").is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(validate("key:1|zz").is_err());
    }

    #[test]
    fn unparseable_value_is_rejected() {
        assert!(validate("key:notanumber|c").is_err());
    }

    #[test]
    fn at_sign_with_empty_rate_is_rejected() {
        assert!(validate("key:1|c|@").is_err());
    }

    #[test]
    fn at_sign_with_unparseable_rate_is_rejected() {
        assert!(validate("key:1|c|@notanumber").is_err());
    }

    #[test]
    fn trailing_pipe_without_at_sign_is_rejected() {
        assert!(validate("key:1|c|foo").is_err());
    }

    #[test]
    fn all_type_tags_map_to_stable_ordinals() {
        assert_eq!(validate("k:1|c").unwrap().metric_type as u8, 0);
        assert_eq!(validate("k:1|ms").unwrap().metric_type as u8, 1);
        assert_eq!(validate("k:1|kv").unwrap().metric_type as u8, 2);
        assert_eq!(validate("k:1|g").unwrap().metric_type as u8, 3);
        assert_eq!(validate("k:1|h").unwrap().metric_type as u8, 4);
        assert_eq!(validate("k:1|s").unwrap().metric_type as u8, 5);
    }

    #[test]
    fn negative_and_exponent_values_parse() {
        let r = validate("key:-1.5e2|g").unwrap();
        assert_eq!(r.value, -150.0);
    }

    #[test]
    fn default_presampling_is_one() {
        let r = validate("key:1|c").unwrap();
        assert_eq!(r.presampling_value, 1.0);
    }

    #[test]
    fn parser_is_pure_does_not_mutate_input() {
        let line = "a.b.c.__tag1=v1:v2:42.000|ms".to_string();
        let before = line.clone();
        let _ = validate(&line);
        assert_eq!(line, before);
        // Repeated parses of the same immutable slice are identical.
        assert_eq!(validate(&line), validate(&line));
    }

    proptest::proptest! {
        #[test]
        fn never_panics_on_arbitrary_input(s in ".{0,64}") {
            let _ = validate(&s);
        }

        #[test]
        fn valid_counter_lines_always_parse(
            key in "[a-zA-Z][a-zA-Z0-9_.]{0,31}",
            value in -1000.0f64..1000.0,
        ) {
            let line = format!("{key}:{value}|c");
            let parsed = validate(&line).expect("well-formed line must parse");
            prop_assert_eq!(parsed.key, key.as_str());
            prop_assert_eq!(parsed.metric_type, MetricType::Counter);
        }
    }
}
