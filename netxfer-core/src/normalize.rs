//! Primitive value normalizers applied to individual attributes.
//!
//! Each normalizer is total: it never fails, substitutes a best-effort value
//! and records a [`MappingWarning`] when it had to change something.

use crate::diagnostics::{Diagnostics, FieldSite, MappingWarning};

/// Orientations above this value are treated as a full turn.
const FULL_TURN_THRESHOLD: f64 = 359.9;

/// Replace an absent mandatory value with the empty string.
///
/// # Examples
/// ```
/// use netxfer_core::diagnostics::{Diagnostics, FieldSite};
/// use netxfer_core::normalize::null_to_blank;
///
/// let mut diagnostics = Diagnostics::new();
/// let value = null_to_blank(None, FieldSite::new("ch000001", "identifier"), &mut diagnostics);
/// assert_eq!(value, "");
/// assert_eq!(diagnostics.len(), 1);
/// ```
pub fn null_to_blank(
    value: Option<String>,
    site: FieldSite<'_>,
    diagnostics: &mut Diagnostics,
) -> String {
    value.unwrap_or_else(|| {
        diagnostics.record(MappingWarning::MissingMandatoryValue {
            key: site.key.to_owned(),
            field: site.field,
        });
        String::new()
    })
}

/// Replace an empty string with an absent value.
///
/// The transfer-file encoder cannot round-trip empty strings, so they are
/// written as absent instead.
pub fn blank_to_null(
    value: Option<String>,
    site: FieldSite<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    match value {
        Some(text) if text.is_empty() => {
            diagnostics.record(MappingWarning::EmptyStringCoerced {
                key: site.key.to_owned(),
                field: site.field,
            });
            None
        }
        other => other,
    }
}

/// Cut `value` to at most `max_len` characters.
///
/// Lengths are counted in Unicode scalar values, so a multi-byte character is
/// never split.
///
/// # Examples
/// ```
/// use netxfer_core::diagnostics::{Diagnostics, FieldSite};
/// use netxfer_core::normalize::truncate;
///
/// let mut diagnostics = Diagnostics::new();
/// let site = FieldSite::new("ch000001", "remark");
/// let cut = truncate(Some("Schacht Nord".into()), 7, site, &mut diagnostics);
/// assert_eq!(cut.as_deref(), Some("Schacht"));
/// ```
pub fn truncate(
    value: Option<String>,
    max_len: usize,
    site: FieldSite<'_>,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    value.map(|text| {
        if text.chars().count() <= max_len {
            return text;
        }
        let truncated = text.chars().take(max_len).collect();
        diagnostics.record(MappingWarning::ValueTruncated {
            key: site.key.to_owned(),
            field: site.field,
            original: text,
            limit: max_len,
        });
        truncated
    })
}

/// Rotate a label orientation by `offset_degrees` and wrap it into `[0, 360)`.
///
/// Results above 359.9 degrees collapse to `0`.
#[expect(
    clippy::float_arithmetic,
    reason = "orientation arithmetic is inherently floating point"
)]
pub fn normalize_angle(value: Option<f64>, offset_degrees: f64) -> Option<f64> {
    value.map(|angle| {
        let wrapped = (angle + offset_degrees).rem_euclid(360.0);
        if wrapped > FULL_TURN_THRESHOLD {
            0.0
        } else {
            wrapped
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn diagnostics() -> Diagnostics {
        Diagnostics::new()
    }

    fn site() -> FieldSite<'static> {
        FieldSite::new("ch000001", "remark")
    }

    #[rstest]
    fn null_to_blank_keeps_present_values(mut diagnostics: Diagnostics) {
        let value = null_to_blank(Some("x".into()), site(), &mut diagnostics);
        assert_eq!(value, "x");
        assert!(diagnostics.is_empty());
    }

    #[rstest]
    fn blank_to_null_ignores_absent_values(mut diagnostics: Diagnostics) {
        assert_eq!(blank_to_null(None, site(), &mut diagnostics), None);
        assert!(diagnostics.is_empty());
    }

    #[rstest]
    fn blank_round_trip_emits_two_warnings(mut diagnostics: Diagnostics) {
        let nulled = blank_to_null(Some(String::new()), site(), &mut diagnostics);
        let restored = null_to_blank(nulled, site(), &mut diagnostics);

        assert_eq!(restored, "");
        assert_eq!(diagnostics.len(), 2, "{:?}", diagnostics.warnings());
        assert!(matches!(
            diagnostics.warnings(),
            [
                MappingWarning::EmptyStringCoerced { .. },
                MappingWarning::MissingMandatoryValue { .. }
            ]
        ));
    }

    #[rstest]
    fn truncation_reports_original_and_limit(mut diagnostics: Diagnostics) {
        let cut = truncate(Some("abcdef".into()), 4, site(), &mut diagnostics);
        assert_eq!(cut.as_deref(), Some("abcd"));
        match diagnostics.warnings() {
            [
                MappingWarning::ValueTruncated {
                    original, limit, ..
                },
            ] => {
                assert_eq!(original, "abcdef");
                assert_eq!(*limit, 4);
            }
            other => panic!("expected a single truncation warning, got {other:?}"),
        }
    }

    #[rstest]
    fn truncation_respects_character_boundaries(mut diagnostics: Diagnostics) {
        let cut = truncate(Some("Überlauf".into()), 2, site(), &mut diagnostics);
        assert_eq!(cut.as_deref(), Some("Üb"));
    }

    #[rstest]
    fn truncation_passes_absent_values(mut diagnostics: Diagnostics) {
        assert_eq!(truncate(None, 3, site(), &mut diagnostics), None);
        assert!(diagnostics.is_empty());
    }

    #[rstest]
    #[case(Some(10.0), 90.0, Some(100.0))]
    #[case(Some(300.0), 90.0, Some(30.0))]
    #[case(Some(-30.0), 0.0, Some(330.0))]
    #[case(Some(359.95), 0.0, Some(0.0))]
    #[case(None, 90.0, None)]
    fn normalizes_angles(
        #[case] value: Option<f64>,
        #[case] offset: f64,
        #[case] expected: Option<f64>,
    ) {
        let actual = normalize_angle(value, offset);
        match (actual, expected) {
            (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "expected {e}, got {a}"),
            (a, e) => assert_eq!(a, e),
        }
    }

    proptest! {
        #[test]
        fn truncated_length_never_exceeds_limit(text in ".{0,64}", limit in 0usize..32) {
            let mut diagnostics = Diagnostics::new();
            let cut = truncate(Some(text.clone()), limit, site(), &mut diagnostics)
                .unwrap_or_default();
            prop_assert!(cut.chars().count() <= limit);
            if text.chars().count() <= limit {
                prop_assert_eq!(cut, text);
                prop_assert!(diagnostics.is_empty());
            } else {
                prop_assert_eq!(diagnostics.len(), 1);
            }
        }

        #[test]
        fn normalized_angles_stay_in_range(angle in -1.0e4f64..1.0e4, offset in -360.0f64..360.0) {
            let normalized = normalize_angle(Some(angle), offset).unwrap_or(f64::NAN);
            prop_assert!((0.0..=FULL_TURN_THRESHOLD).contains(&normalized));
        }
    }
}
