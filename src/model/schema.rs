//! Declarative field catalogs.
//!
//! A record type exposes an ordered slice of [`FieldSpec`]s. The same slice
//! drives parsing (metadata lines, CSV columns) and serialization, so the two
//! directions cannot drift apart.

use std::fmt;

/// Decoding failure for a single field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: cannot decode {:?} as a number", self.field, self.value)
    }
}

impl std::error::Error for FieldError {}

/// One entry of a field catalog.
pub struct FieldSpec<T> {
    /// Internal key, also used as the normalized CSV column label.
    pub name: &'static str,
    /// External key as it appears in raw capture metadata, if any.
    pub label: Option<&'static str>,
    pub encode: fn(&T) -> String,
    pub decode: fn(&mut T, &str) -> Result<(), FieldError>,
}

impl<T> FieldSpec<T> {
    /// Decodes `value` into `record`. On failure the field keeps its
    /// previous (default) value.
    pub fn apply(&self, record: &mut T, value: &str) -> Result<(), FieldError> {
        (self.decode)(record, value)
    }

    pub fn render(&self, record: &T) -> String {
        (self.encode)(record)
    }
}

/// Finds a field by its external (capture metadata) label.
pub fn by_label<'a, T>(fields: &'a [FieldSpec<T>], label: &str) -> Option<&'a FieldSpec<T>> {
    fields.iter().find(|f| f.label == Some(label))
}

/// Parses a numeric field value. Surrounding whitespace and a trailing
/// `kB` unit (as written by /proc/<pid>/status) are ignored.
pub fn decode_number<N: std::str::FromStr>(field: &'static str, value: &str) -> Result<N, FieldError> {
    let mut tokens = value.split_whitespace();
    let parsed = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(num), None, None) => num.parse::<N>().ok(),
        (Some(num), Some(unit), None) if unit.eq_ignore_ascii_case("kb") => num.parse::<N>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| FieldError {
        field,
        value: value.to_string(),
    })
}

/// Builds a numeric [`FieldSpec`] bound to a struct member.
macro_rules! number_field {
    ($ty:ty, $name:literal, $label:expr, $($member:ident).+) => {
        $crate::model::schema::FieldSpec::<$ty> {
            name: $name,
            label: $label,
            encode: |r| r.$($member).+.to_string(),
            decode: |r, v| {
                r.$($member).+ = $crate::model::schema::decode_number($name, v)?;
                Ok(())
            },
        }
    };
}

/// Builds a text [`FieldSpec`] bound to a `String` struct member.
macro_rules! text_field {
    ($ty:ty, $name:literal, $label:expr, $member:ident) => {
        $crate::model::schema::FieldSpec::<$ty> {
            name: $name,
            label: $label,
            encode: |r| r.$member.clone(),
            decode: |r, v| {
                r.$member = v.trim().to_string();
                Ok(())
            },
        }
    };
}

pub(crate) use number_field;
pub(crate) use text_field;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sample {
        count: u64,
        label: String,
    }

    static SAMPLE_FIELDS: &[FieldSpec<Sample>] = &[
        number_field!(Sample, "count", Some("Count"), count),
        text_field!(Sample, "label", None, label),
    ];

    #[test]
    fn test_lookup_by_label() {
        assert_eq!(by_label(SAMPLE_FIELDS, "Count").map(|f| f.name), Some("count"));
        assert!(by_label(SAMPLE_FIELDS, "label").is_none());
    }

    #[test]
    fn test_numeric_decode_failure_keeps_default() {
        let mut s = Sample::default();
        let field = &SAMPLE_FIELDS[0];
        assert!(field.apply(&mut s, " 42 ").is_ok());
        assert_eq!(s.count, 42);

        let err = field.apply(&mut s, "forty").unwrap_err();
        assert_eq!(err.field, "count");
        assert_eq!(s.count, 42);
    }

    #[test]
    fn test_numeric_decode_accepts_kb_unit() {
        assert_eq!(decode_number::<u64>("vmsize", "  1764 kB"), Ok(1764));
        assert_eq!(decode_number::<u64>("vmsize", "1764 KB"), Ok(1764));
        assert!(decode_number::<u64>("vmsize", "1764 pages").is_err());
        assert!(decode_number::<u64>("vmsize", "").is_err());
    }

    #[test]
    fn test_text_fields_are_trimmed() {
        let mut s = Sample::default();
        SAMPLE_FIELDS[1].apply(&mut s, "  /usr/lib/libc.so  ").unwrap();
        assert_eq!(SAMPLE_FIELDS[1].render(&s), "/usr/lib/libc.so");
    }
}
