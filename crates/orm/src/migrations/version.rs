//! Migration version tokens and their ordering
//!
//! Versions compare numerically where they contain digits, so `"2" < "10"`
//! and `"2024_02" < "2024_10"` hold without zero padding. The token is split
//! into runs of ASCII digits and runs of everything else:
//! - digit runs compare by numeric value (leading zeros ignored, any length)
//! - other runs compare as plain strings
//! - a digit run sorts before a non-digit run at the same position
//!
//! Tokens that are numerically equal but spelled differently (`"1"` and
//! `"001"`) are distinct versions; the raw string breaks the tie so the order
//! stays total and agrees with equality.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A migration version token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Number(&'a str),
    Text(&'a str),
}

fn segments(raw: &str) -> Vec<Segment<'_>> {
    let bytes = raw.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;

    while start < bytes.len() {
        let numeric = bytes[start].is_ascii_digit();
        let mut end = start + 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() == numeric {
            end += 1;
        }
        // ASCII digits are single bytes, so run boundaries are char boundaries
        let run = &raw[start..end];
        out.push(if numeric {
            Segment::Number(run)
        } else {
            Segment::Text(run)
        });
        start = end;
    }

    out
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_segments(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ordering = match (l, r) {
            (Segment::Number(l), Segment::Number(r)) => compare_numeric(l, r),
            (Segment::Text(l), Segment::Text(r)) => l.cmp(r),
            (Segment::Number(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Number(_)) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    left.len().cmp(&right.len())
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_segments(&self.0, &other.0).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Version {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl PartialEq<str> for Version {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
