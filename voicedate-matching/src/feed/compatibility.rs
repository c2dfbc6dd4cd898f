//! Bidirectional compatibility test gating feed visibility.
//!
//! A candidate shows up in my feed only if I would want them AND they would
//! want me, per each profile's own stated preference, and both ages sit
//! inside the other side's stated range. Missing or malformed preference
//! data degrades toward "compatible" rather than hiding every profile;
//! the one exception is a missing gender on the evaluated side, which
//! fails that direction because there is nothing to test against.

use serde_json::Value;

use super::normalizer::{self, ANY};
use crate::models::Profile;

/// Resolve a profile's "looking for" preference, tolerating the legacy
/// field layout: the `looking_for` column wins, then
/// `preferences.partner_gender`. First non-empty value is used. Isolated
/// here so alias precedence can change without touching the match rules.
pub fn resolve_looking_for(profile: &Profile) -> Option<Vec<String>> {
    if let Some(value) = &profile.looking_for {
        if let Some(tokens) = preference_tokens(value) {
            return Some(tokens);
        }
    }
    profile
        .preferences
        .get("partner_gender")
        .and_then(preference_tokens)
}

/// Extract preference tokens from a JSON value that may be a scalar string
/// or an array of strings. Empty and non-string values yield `None`.
fn preference_tokens(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
        Value::Array(items) => {
            let tokens: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if tokens.is_empty() {
                None
            } else {
                Some(tokens)
            }
        }
        _ => None,
    }
}

/// Does `gender` satisfy `preference`?
///
/// No stated preference means open to all. An absent gender cannot be
/// evaluated and fails. A preference list matches if any element
/// normalizes equal to the normalized gender, or normalizes to `any`.
pub fn gender_matches_preference(gender: Option<&str>, preference: Option<&[String]>) -> bool {
    let Some(preference) = preference else {
        return true;
    };
    let Some(gender) = gender else {
        return false;
    };

    let gender = normalizer::normalize(gender);
    preference.iter().any(|token| {
        let token = normalizer::normalize(token);
        token == ANY || token == gender
    })
}

/// Stated partner age range, `(min, max)`, from `preferences.partner_age_range`.
fn partner_age_range(profile: &Profile) -> (Option<i64>, Option<i64>) {
    let Some(range) = profile.preferences.get("partner_age_range") else {
        return (None, None);
    };
    (
        range.get("min").and_then(Value::as_i64),
        range.get("max").and_then(Value::as_i64),
    )
}

/// Inclusive bounds; an absent bound is no constraint.
fn age_within_range(age: i32, range: (Option<i64>, Option<i64>)) -> bool {
    let age = age as i64;
    match range {
        (Some(min), _) if age < min => false,
        (_, Some(max)) if age > max => false,
        _ => true,
    }
}

/// Mutual visibility test. Pure and infallible: re-evaluating unchanged
/// inputs always yields the same result, and no input can make it error.
/// Deliberately not symmetric in general, since each direction is judged
/// from that profile's own stated preference.
pub fn is_compatible(me: &Profile, other: &Profile) -> bool {
    let my_preference = resolve_looking_for(me);
    let their_preference = resolve_looking_for(other);

    let i_want_them =
        gender_matches_preference(other.gender.as_deref(), my_preference.as_deref());
    let they_want_me =
        gender_matches_preference(me.gender.as_deref(), their_preference.as_deref());

    let age_compatible = age_within_range(other.age, partner_age_range(me))
        && age_within_range(me.age, partner_age_range(other));

    i_want_them && they_want_me && age_compatible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn profile(age: i32, gender: Option<&str>, looking_for: Option<Value>, preferences: Value) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: "test".into(),
            age,
            gender: gender.map(str::to_string),
            location_city: None,
            location_region: None,
            bio: None,
            profile_photo_url: None,
            tags: json!([]),
            looking_for,
            preferences,
            cloned_voice_id: None,
            cloned_agent_id: None,
            voice_cloning_consent: true,
            onboarding_completed: true,
            agent_ready: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn woman_seeking_men_matches_man_seeking_women() {
        let me = profile(28, Some("Woman"), Some(json!("Men")), json!({}));
        let candidate = profile(30, Some("man"), Some(json!("women")), json!({}));
        assert!(is_compatible(&me, &candidate));
    }

    #[test]
    fn absent_preference_is_open_to_all() {
        let me = profile(30, Some("male"), None, json!({}));
        let candidate = profile(27, Some("female"), Some(json!("men")), json!({}));
        assert!(is_compatible(&me, &candidate));
    }

    #[test]
    fn missing_gender_on_candidate_fails_that_direction() {
        let me = profile(30, Some("female"), Some(json!("men")), json!({}));
        let candidate = profile(27, None, None, json!({}));
        assert!(!is_compatible(&me, &candidate));
    }

    #[test]
    fn preference_list_matches_any_element() {
        let me = profile(25, Some("woman"), Some(json!(["men", "non-binary"])), json!({}));
        let enby = profile(26, Some("enby"), Some(json!("everyone")), json!({}));
        assert!(is_compatible(&me, &enby));
    }

    #[test]
    fn any_preference_matches_unrecognized_gender() {
        let me = profile(25, Some("woman"), Some(json!("anyone")), json!({}));
        let candidate = profile(26, Some("genderfluid"), None, json!({}));
        assert!(is_compatible(&me, &candidate));
    }

    #[test]
    fn unrecognized_preference_matches_nothing() {
        let me = profile(25, Some("woman"), Some(json!("xyzzy")), json!({}));
        let candidate = profile(26, Some("man"), None, json!({}));
        assert!(!is_compatible(&me, &candidate));
    }

    #[test]
    fn legacy_partner_gender_is_the_fallback() {
        let me = profile(
            25,
            Some("man"),
            None,
            json!({ "partner_gender": "women" }),
        );
        let candidate = profile(24, Some("female"), None, json!({}));
        assert!(is_compatible(&me, &candidate));

        // looking_for wins when both are set
        let me = profile(
            25,
            Some("man"),
            Some(json!("men")),
            json!({ "partner_gender": "women" }),
        );
        assert!(!is_compatible(&me, &candidate));
    }

    #[test]
    fn age_range_bounds_are_inclusive() {
        let range = json!({ "partner_age_range": { "min": 25, "max": 35 } });
        let me = profile(30, Some("woman"), Some(json!("men")), range);

        for (age, expected) in [(25, true), (35, true), (24, false), (36, false)] {
            let candidate = profile(age, Some("man"), None, json!({}));
            assert_eq!(is_compatible(&me, &candidate), expected, "age {age}");
        }
    }

    #[test]
    fn age_range_applies_in_both_directions() {
        let me = profile(45, Some("man"), Some(json!("women")), json!({}));
        let candidate = profile(
            30,
            Some("woman"),
            Some(json!("men")),
            json!({ "partner_age_range": { "min": 25, "max": 40 } }),
        );
        assert!(!is_compatible(&me, &candidate));
    }

    #[test]
    fn malformed_preferences_degrade_to_permissive() {
        let me = profile(30, Some("woman"), Some(json!(42)), json!({ "partner_age_range": "oops" }));
        let candidate = profile(31, Some("man"), Some(json!([])), json!({}));
        assert!(is_compatible(&me, &candidate));
    }

    #[test]
    fn not_required_to_be_symmetric() {
        // A wants any, B wants women; A is a man, B is a woman.
        // A→B compatible either way evaluated from A, and from B's side the
        // same inputs give the same verdict, but the per-direction flags
        // differ by construction.
        let a = profile(30, Some("man"), Some(json!("any")), json!({}));
        let b = profile(30, Some("woman"), Some(json!("women")), json!({}));
        assert!(!is_compatible(&a, &b));
        assert!(!is_compatible(&b, &a));
        // Purity: repeated evaluation is stable.
        assert_eq!(is_compatible(&a, &b), is_compatible(&a, &b));
    }
}
