//! Local observation timestamp parsing
//!
//! Patterns are written in the `yyyy-MM-dd h:mm a` letter notation used by
//! the analytics tooling that reads the curated dataset, and translated once
//! into a chrono format string.

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Quoted literals, runs of one pattern letter, or plain separators
static PATTERN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'[^']*'|y+|M+|d+|H+|h+|m+|s+|S+|a+|E+|[A-Za-z]+|[^A-Za-z']+").unwrap()
});

/// A compiled timestamp pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampPattern {
    pattern: String,
    chrono_format: String,
}

impl TimestampPattern {
    /// Compile a letter pattern such as `yyyy-MM-dd h:mm a`
    pub fn new(pattern: &str) -> Result<Self> {
        let invalid = |message: String| Error::TimestampPattern {
            pattern: pattern.to_string(),
            message,
        };

        let mut chrono_format = String::new();
        let mut consumed = 0;

        for token in PATTERN_TOKEN.find_iter(pattern) {
            if token.start() != consumed {
                return Err(invalid(format!("unterminated quote at {consumed}")));
            }
            consumed = token.end();

            let text = token.as_str();
            if let Some(literal) = text.strip_prefix('\'') {
                let literal = literal.trim_end_matches('\'');
                if literal.is_empty() {
                    chrono_format.push('\'');
                } else {
                    chrono_format.push_str(&literal.replace('%', "%%"));
                }
                continue;
            }

            if !text.starts_with(|c: char| c.is_ascii_alphabetic()) {
                chrono_format.push_str(&text.replace('%', "%%"));
                continue;
            }

            let spec = match text {
                "yyyy" | "y" => "%Y",
                "yy" => "%y",
                "MMMM" => "%B",
                "MMM" => "%b",
                "MM" | "M" => "%m",
                "dd" | "d" => "%d",
                "HH" | "H" => "%H",
                "hh" | "h" => "%I",
                "mm" | "m" => "%M",
                "ss" | "s" => "%S",
                "SSS" => "%3f",
                "a" => "%p",
                "EEE" | "E" => "%a",
                "EEEE" => "%A",
                other => return Err(invalid(format!("unsupported field '{other}'"))),
            };
            chrono_format.push_str(spec);
        }

        if consumed != pattern.len() {
            return Err(invalid(format!("unterminated quote at {consumed}")));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            chrono_format,
        })
    }

    /// The pattern as written
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The equivalent chrono format string
    pub fn chrono_format(&self) -> &str {
        &self.chrono_format
    }

    /// Parse a value; anything that does not match yields `None`
    pub fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value.trim(), &self.chrono_format).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use test_case::test_case;

    #[test]
    fn test_translates_default_pattern() {
        let pattern = TimestampPattern::new("yyyy-MM-dd h:mm a").unwrap();
        assert_eq!(pattern.chrono_format(), "%Y-%m-%d %I:%M %p");
        assert_eq!(pattern.pattern(), "yyyy-MM-dd h:mm a");
    }

    #[test_case("2023-06-15 3:45 PM", 2023, 6, 15, 15, 45 ; "afternoon")]
    #[test_case("2023-06-15 03:45 PM", 2023, 6, 15, 15, 45 ; "zero padded hour")]
    #[test_case("2024-01-01 12:05 AM", 2024, 1, 1, 0, 5 ; "just after midnight")]
    #[test_case("2024-01-01 12:30 PM", 2024, 1, 1, 12, 30 ; "noon")]
    #[test_case("2022-11-30 9:00 am", 2022, 11, 30, 9, 0 ; "lowercase meridiem")]
    fn test_parse_default_pattern(input: &str, y: i32, mo: u32, d: u32, h: u32, mi: u32) {
        let pattern = TimestampPattern::new("yyyy-MM-dd h:mm a").unwrap();
        let expected = NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap();
        assert_eq!(pattern.parse(input), Some(expected));
    }

    #[test_case("not-a-date" ; "garbage")]
    #[test_case("" ; "empty")]
    #[test_case("2023-06-15 15:45" ; "missing meridiem")]
    #[test_case("2023-13-15 3:45 PM" ; "month out of range")]
    fn test_parse_rejects(input: &str) {
        let pattern = TimestampPattern::new("yyyy-MM-dd h:mm a").unwrap();
        assert_eq!(pattern.parse(input), None);
    }

    #[test]
    fn test_quoted_literal() {
        let pattern = TimestampPattern::new("yyyy-MM-dd'T'HH:mm:ss").unwrap();
        assert_eq!(pattern.chrono_format(), "%Y-%m-%dT%H:%M:%S");
        assert!(pattern.parse("2023-06-15T15:45:10").is_some());
    }

    #[test]
    fn test_unsupported_field() {
        let err = TimestampPattern::new("yyyy-QQ").unwrap_err();
        assert!(err.to_string().contains("unsupported field 'QQ'"));
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(TimestampPattern::new("yyyy 'oops").is_err());
    }
}
