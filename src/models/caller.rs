use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller identity as reported by the telephony layer: either the raw
/// number/display string or the sentinel for a withheld caller id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallerId {
    Known(String),
    Unknown,
}

impl CallerId {
    /// Builds a caller id from whatever string the platform handed us.
    /// Empty, blank, and the literal "Unknown" all mean a withheld id.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
                    CallerId::Unknown
                } else {
                    CallerId::Known(trimmed.to_string())
                }
            }
            None => CallerId::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, CallerId::Known(_))
    }

    /// Normalized form used for number matching: every non-digit character
    /// is stripped except a leading `+`.
    fn normalized(&self) -> Option<String> {
        match self {
            CallerId::Known(raw) => {
                let mut out = String::with_capacity(raw.len());
                for (i, c) in raw.chars().enumerate() {
                    if c.is_ascii_digit() || (c == '+' && i == 0) {
                        out.push(c);
                    }
                }
                Some(out)
            }
            CallerId::Unknown => None,
        }
    }

    /// Matching tolerant of missing country codes: one normalized number
    /// must end with the other. A caller whose id carries no digits at all
    /// (a messenger display name) is compared by exact string instead,
    /// since every string ends with the empty suffix.
    pub fn matches(&self, other: &CallerId) -> bool {
        match (self, other) {
            (CallerId::Unknown, CallerId::Unknown) => true,
            (CallerId::Known(a), CallerId::Known(b)) => {
                let na = self.normalized().unwrap_or_default();
                let nb = other.normalized().unwrap_or_default();
                if na.is_empty() || nb.is_empty() {
                    return a == b;
                }
                na.ends_with(&nb) || nb.ends_with(&na)
            }
            _ => false,
        }
    }

    pub fn matches_number(&self, number: &str) -> bool {
        self.matches(&CallerId::Known(number.to_string()))
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallerId::Known(raw) => f.write_str(raw),
            CallerId::Unknown => f.write_str("Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_sentinel_strings_are_unknown() {
        assert_eq!(CallerId::from_raw(None), CallerId::Unknown);
        assert_eq!(CallerId::from_raw(Some("")), CallerId::Unknown);
        assert_eq!(CallerId::from_raw(Some("  ")), CallerId::Unknown);
        assert_eq!(CallerId::from_raw(Some("Unknown")), CallerId::Unknown);
        assert_eq!(
            CallerId::from_raw(Some("+1 555 123")),
            CallerId::Known("+1 555 123".into())
        );
    }

    #[test]
    fn suffix_matching_tolerates_missing_country_code() {
        let full = CallerId::Known("+15551234567".into());
        let local = CallerId::Known("555-123-4567".into());
        assert!(full.matches(&local));
        assert!(local.matches(&full));
    }

    #[test]
    fn formatting_noise_is_ignored() {
        let a = CallerId::Known("(555) 123-4567".into());
        let b = CallerId::Known("5551234567".into());
        assert!(a.matches(&b));
    }

    #[test]
    fn different_numbers_do_not_match() {
        let a = CallerId::Known("5551234567".into());
        let b = CallerId::Known("5559876543".into());
        assert!(!a.matches(&b));
    }

    #[test]
    fn display_names_compare_exactly() {
        let mom = CallerId::Known("Mom".into());
        let dad = CallerId::Known("Dad".into());
        assert!(mom.matches(&CallerId::Known("Mom".into())));
        assert!(!mom.matches(&dad));
        // A digit-free name must never swallow a real number via the
        // empty-suffix degenerate case.
        assert!(!mom.matches(&CallerId::Known("5551234567".into())));
    }

    #[test]
    fn unknown_only_matches_unknown() {
        assert!(CallerId::Unknown.matches(&CallerId::Unknown));
        assert!(!CallerId::Unknown.matches(&CallerId::Known("555".into())));
    }
}
