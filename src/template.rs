//! Metadata substitution for name patterns.
//!
//! `${key}` placeholders are replaced with the value of `key` in the message
//! metadata. Placeholders whose key is not present are left untouched.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::message::Metadata;

/// A pattern substitution function.
pub type Substitution = fn(&str, &Metadata) -> String;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([^{}]+)\}").expect("placeholder regex is valid")
    })
}

/// Replace every `${key}` in `pattern` with `metadata[key]`.
///
/// # Examples
///
/// ```
/// use relnode::{substitute, Metadata};
///
/// let mut metadata = Metadata::new();
/// metadata.insert("deviceName", "sensor-1");
/// assert_eq!(substitute("${deviceName}", &metadata), "sensor-1");
/// assert_eq!(substitute("room-${floor}", &metadata), "room-${floor}");
/// ```
#[must_use]
pub fn substitute(pattern: &str, metadata: &Metadata) -> String {
    let replaced: Cow<'_, str> = placeholder().replace_all(pattern, |caps: &Captures<'_>| {
        metadata
            .get(&caps[1])
            .map_or_else(|| caps[0].to_string(), str::to_string)
    });
    replaced.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> Metadata {
        let mut metadata = Metadata::new();
        for (k, v) in pairs {
            metadata.insert(*k, *v);
        }
        metadata
    }

    #[test]
    fn test_literal_pattern_is_unchanged() {
        assert_eq!(substitute("Building A", &Metadata::new()), "Building A");
    }

    #[test]
    fn test_multiple_placeholders() {
        let md = metadata(&[("site", "north"), ("floor", "3")]);
        assert_eq!(substitute("${site}-floor-${floor}", &md), "north-floor-3");
    }

    #[test]
    fn test_missing_key_left_in_place() {
        let md = metadata(&[("site", "north")]);
        assert_eq!(substitute("${site}/${room}", &md), "north/${room}");
    }

    #[test]
    fn test_value_is_not_resubstituted() {
        let md = metadata(&[("a", "${b}"), ("b", "x")]);
        assert_eq!(substitute("${a}", &md), "${b}");
    }

    #[test]
    fn test_empty_value() {
        let md = metadata(&[("type", "")]);
        assert_eq!(substitute("${type}", &md), "");
    }
}
