//! Stateful browsing sequence over compatible, agent-ready profiles.
//!
//! A `FeedSession` is a snapshot, not a live subscription: loading again
//! replaces the snapshot, `reset` only rewinds the cursor. Sessions live
//! in the service's `DashMap` keyed by viewer, one per signed-in user.

use serde::Serialize;
use uuid::Uuid;

use super::compatibility::is_compatible;
use super::normalizer::{self, FEMALE, NON_BINARY};
use crate::models::Profile;

const FEMALE_AVATARS: &[&str] = &[
    "/avatars/female-1.webp",
    "/avatars/female-2.webp",
    "/avatars/female-3.webp",
];
const MALE_AVATARS: &[&str] = &[
    "/avatars/male-1.webp",
    "/avatars/male-2.webp",
    "/avatars/male-3.webp",
];
const NON_BINARY_AVATARS: &[&str] = &["/avatars/non-binary-1.webp"];

/// FNV-1a, 64-bit. Stable across processes, unlike `DefaultHasher`,
/// so the same user keeps the same stock avatar across reloads.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Deterministic stock avatar for a profile without a real photo:
/// hash of the user id modulo the bucket size for the normalized gender.
/// Unrecognized genders fall into the male bucket.
pub fn stock_avatar(user_id: Uuid, gender: Option<&str>) -> &'static str {
    let bucket = match gender.map(normalizer::normalize).as_deref() {
        Some(FEMALE) => FEMALE_AVATARS,
        Some(NON_BINARY) => NON_BINARY_AVATARS,
        _ => MALE_AVATARS,
    };
    let index = (fnv1a_64(user_id.as_bytes()) % bucket.len() as u64) as usize;
    bucket[index]
}

/// One browsable card: the candidate plus a resolved picture and the agent
/// id the client needs to open a voice session.
#[derive(Debug, Clone, Serialize)]
pub struct FeedCard {
    pub user_id: Uuid,
    pub display_name: String,
    pub age: i32,
    pub gender: Option<String>,
    pub location_city: Option<String>,
    pub bio: Option<String>,
    pub tags: serde_json::Value,
    pub photo_url: String,
    pub agent_id: Option<String>,
}

impl FeedCard {
    pub fn from_profile(profile: &Profile) -> Self {
        let photo_url = profile
            .profile_photo_url
            .clone()
            .unwrap_or_else(|| stock_avatar(profile.user_id, profile.gender.as_deref()).to_string());

        Self {
            user_id: profile.user_id,
            display_name: profile.display_name.clone(),
            age: profile.age,
            gender: profile.gender.clone(),
            location_city: profile.location_city.clone(),
            bio: profile.bio.clone(),
            tags: profile.tags.clone(),
            photo_url,
            agent_id: profile.cloned_agent_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedPhase {
    Browsing,
    Exhausted,
}

#[derive(Debug)]
pub struct FeedSession {
    cards: Vec<FeedCard>,
    cursor: usize,
}

impl FeedSession {
    /// Build a fresh snapshot: filter `candidates` (already agent-ready,
    /// self excluded, newest first from the query) through the
    /// compatibility evaluator against `me`.
    pub fn build(me: &Profile, candidates: &[Profile]) -> Self {
        let cards = candidates
            .iter()
            .filter(|candidate| is_compatible(me, candidate))
            .map(FeedCard::from_profile)
            .collect();

        Self { cards, cursor: 0 }
    }

    /// The card at the cursor. `None` means either an empty feed or an
    /// exhausted one; `is_empty` tells those apart.
    pub fn current(&self) -> Option<&FeedCard> {
        self.cards.get(self.cursor)
    }

    /// Move forward one card; stays put once past the end.
    pub fn advance(&mut self) {
        if self.cursor < self.cards.len() {
            self.cursor += 1;
        }
    }

    /// Start over on the same snapshot. No re-fetch.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn phase(&self) -> FeedPhase {
        if self.cursor < self.cards.len() {
            FeedPhase::Browsing
        } else {
            FeedPhase::Exhausted
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn candidate(name: &str, age: i32, gender: &str, looking_for: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: name.into(),
            age,
            gender: Some(gender.into()),
            location_city: None,
            location_region: None,
            bio: None,
            profile_photo_url: None,
            tags: json!([]),
            looking_for: Some(json!(looking_for)),
            preferences: json!({}),
            cloned_voice_id: None,
            cloned_agent_id: Some("agent-123".into()),
            voice_cloning_consent: true,
            onboarding_completed: true,
            agent_ready: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn build_filters_incompatible_candidates() {
        let me = candidate("me", 28, "woman", "men");
        let ok = candidate("alex", 30, "man", "women");
        let wrong_gender = candidate("sam", 30, "woman", "women");
        let not_into_me = candidate("kim", 30, "man", "men");

        let session = FeedSession::build(&me, &[ok.clone(), wrong_gender, not_into_me]);
        assert_eq!(session.len(), 1);
        assert_eq!(session.current().unwrap().user_id, ok.user_id);
    }

    #[test]
    fn cursor_advances_and_exhausts() {
        let me = candidate("me", 28, "woman", "men");
        let a = candidate("a", 30, "man", "women");
        let b = candidate("b", 31, "man", "any");

        let mut session = FeedSession::build(&me, &[a, b]);
        assert_eq!(session.phase(), FeedPhase::Browsing);

        session.advance();
        assert!(session.current().is_some());
        session.advance();
        assert!(session.current().is_none());
        assert_eq!(session.phase(), FeedPhase::Exhausted);

        // Advancing past the end is a no-op.
        session.advance();
        assert_eq!(session.position(), 2);
    }

    #[test]
    fn reset_rewinds_without_refetch() {
        let me = candidate("me", 28, "woman", "men");
        let a = candidate("a", 30, "man", "women");

        let mut session = FeedSession::build(&me, &[a]);
        session.advance();
        assert_eq!(session.phase(), FeedPhase::Exhausted);

        session.reset();
        assert_eq!(session.position(), 0);
        assert_eq!(session.phase(), FeedPhase::Browsing);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn empty_feed_is_distinguishable_from_exhausted() {
        let me = candidate("me", 28, "woman", "men");
        let incompatible = candidate("sam", 30, "woman", "women");

        let session = FeedSession::build(&me, &[incompatible]);
        assert!(session.current().is_none());
        assert!(session.is_empty());

        let mut exhausted = FeedSession::build(&me, &[candidate("a", 30, "man", "women")]);
        exhausted.advance();
        assert!(exhausted.current().is_none());
        assert!(!exhausted.is_empty());
    }

    #[test]
    fn stock_avatar_is_deterministic_per_user() {
        let id = Uuid::new_v4();
        let first = stock_avatar(id, Some("Women"));
        for _ in 0..10 {
            assert_eq!(stock_avatar(id, Some("Women")), first);
        }
        assert!(first.starts_with("/avatars/female-"));
    }

    #[test]
    fn stock_avatar_buckets_by_normalized_gender() {
        let id = Uuid::new_v4();
        assert!(stock_avatar(id, Some("guys")).starts_with("/avatars/male-"));
        assert_eq!(stock_avatar(id, Some("enby")), "/avatars/non-binary-1.webp");
        // Unrecognized gender defaults to the male bucket.
        assert!(stock_avatar(id, Some("genderfluid")).starts_with("/avatars/male-"));
        assert!(stock_avatar(id, None).starts_with("/avatars/male-"));
    }

    #[test]
    fn card_prefers_real_photo() {
        let mut p = candidate("a", 30, "man", "women");
        p.profile_photo_url = Some("https://cdn.example/photo.jpg".into());
        let card = FeedCard::from_profile(&p);
        assert_eq!(card.photo_url, "https://cdn.example/photo.jpg");
        assert_eq!(card.agent_id.as_deref(), Some("agent-123"));
    }
}
