//! Canonicalization of free-text gender and preference tokens.
//!
//! Onboarding stores whatever the user said ("Women", "guys", "enby", ...).
//! Every comparison goes through `normalize` so the evaluator only ever
//! reasons about the closed vocabulary below. Unrecognized tokens pass
//! through unchanged; callers treat them as matching nothing except `any`.

pub const FEMALE: &str = "female";
pub const MALE: &str = "male";
pub const NON_BINARY: &str = "non-binary";
pub const ANY: &str = "any";

const FEMALE_TOKENS: &[&str] = &[
    "woman", "women", "female", "f", "girl", "girls", "lady", "ladies",
];
const MALE_TOKENS: &[&str] = &[
    "man", "men", "male", "m", "boy", "guy", "guys", "gentleman", "gentlemen",
];
const NON_BINARY_TOKENS: &[&str] = &["non-binary", "nonbinary", "nb", "enby", "non binary", "other"];
const ANY_TOKENS: &[&str] = &[
    "any", "everyone", "all", "both", "anyone", "everybody", "open", "no preference",
];

/// Map a raw gender/preference token onto the canonical vocabulary.
///
/// Lower-cases and trims, then checks the synonym tables. Unrecognized
/// values come back as-is (lower-cased), never as an error.
pub fn normalize(raw: &str) -> String {
    let token = raw.trim().to_lowercase();

    if FEMALE_TOKENS.contains(&token.as_str()) {
        return FEMALE.to_string();
    }
    if MALE_TOKENS.contains(&token.as_str()) {
        return MALE.to_string();
    }
    if NON_BINARY_TOKENS.contains(&token.as_str()) {
        return NON_BINARY.to_string();
    }
    if ANY_TOKENS.contains(&token.as_str()) {
        return ANY.to_string();
    }

    if !token.is_empty() && token != FEMALE && token != MALE && token != NON_BINARY && token != ANY {
        tracing::debug!(token = %token, "unrecognized gender token, passing through");
    }

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn female_synonyms() {
        for raw in ["Woman", "WOMEN", " female ", "f", "girls", "Ladies"] {
            assert_eq!(normalize(raw), FEMALE, "{raw}");
        }
    }

    #[test]
    fn male_synonyms() {
        for raw in ["Man", "men", "M", "guys", "Gentlemen", "boy"] {
            assert_eq!(normalize(raw), MALE, "{raw}");
        }
    }

    #[test]
    fn non_binary_synonyms() {
        for raw in ["non-binary", "Nonbinary", "NB", "enby", "non binary", "other"] {
            assert_eq!(normalize(raw), NON_BINARY, "{raw}");
        }
    }

    #[test]
    fn any_synonyms() {
        for raw in ["any", "Everyone", "both", "no preference", "Open"] {
            assert_eq!(normalize(raw), ANY, "{raw}");
        }
    }

    #[test]
    fn unrecognized_passes_through() {
        assert_eq!(normalize("Genderfluid"), "genderfluid");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn idempotent_over_known_vocabulary() {
        for raw in ["Women", "guys", "enby", "everyone", "genderfluid"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }
}
