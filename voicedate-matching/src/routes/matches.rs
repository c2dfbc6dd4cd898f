use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use voicedate_shared::errors::{AppError, AppResult};
use voicedate_shared::types::api::ApiResponse;
use voicedate_shared::types::auth::AuthUser;

use crate::feed::selector::FeedCard;
use crate::models::{Like, Profile};
use crate::schema::{likes, profiles};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MatchSummary {
    pub matched_user: FeedCard,
    pub matched_at: DateTime<Utc>,
    pub my_call_duration_secs: i32,
    pub their_call_duration_secs: i32,
    pub total_call_duration_secs: i32,
    pub conversation_id: Option<Uuid>,
    pub unread_count: i64,
}

/// Pair reciprocal likes into match summaries, newest match first.
///
/// A match exists exactly when both directed edges exist; its time is the
/// later of the two like timestamps (the triggering like). Partners whose
/// profile is missing from the lookup are skipped.
pub fn build_match_summaries(
    my_likes: &[Like],
    likes_to_me: &[Like],
    profiles_by_user: &HashMap<Uuid, Profile>,
) -> Vec<MatchSummary> {
    let reverse_by_sender: HashMap<Uuid, &Like> =
        likes_to_me.iter().map(|l| (l.from_user_id, l)).collect();

    let mut summaries: Vec<MatchSummary> = my_likes
        .iter()
        .filter_map(|mine| {
            let theirs = reverse_by_sender.get(&mine.to_user_id)?;
            let profile = profiles_by_user.get(&mine.to_user_id)?;

            Some(MatchSummary {
                matched_user: FeedCard::from_profile(profile),
                matched_at: mine.created_at.max(theirs.created_at),
                my_call_duration_secs: mine.call_duration_secs,
                their_call_duration_secs: theirs.call_duration_secs,
                total_call_duration_secs: mine.call_duration_secs + theirs.call_duration_secs,
                conversation_id: None,
                unread_count: 0,
            })
        })
        .collect();

    summaries.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
    summaries
}

/// GET /matches - every mutual like involving the caller
pub async fn list_matches(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<MatchSummary>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let my_likes: Vec<Like> = likes::table
        .filter(likes::from_user_id.eq(user.id))
        .load::<Like>(&mut conn)?;

    if my_likes.is_empty() {
        return Ok(Json(ApiResponse::ok(vec![])));
    }

    let target_ids: Vec<Uuid> = my_likes.iter().map(|l| l.to_user_id).collect();

    let likes_to_me: Vec<Like> = likes::table
        .filter(likes::to_user_id.eq(user.id))
        .filter(likes::from_user_id.eq_any(&target_ids))
        .load::<Like>(&mut conn)?;

    let partner_profiles: Vec<Profile> = profiles::table
        .filter(profiles::user_id.eq_any(likes_to_me.iter().map(|l| l.from_user_id).collect::<Vec<_>>()))
        .load::<Profile>(&mut conn)?;

    let profiles_by_user: HashMap<Uuid, Profile> = partner_profiles
        .into_iter()
        .map(|p| (p.user_id, p))
        .collect();

    let mut summaries = build_match_summaries(&my_likes, &likes_to_me, &profiles_by_user);

    enrich_with_conversations(&state, user.id, &mut summaries).await;

    Ok(Json(ApiResponse::ok(summaries)))
}

#[derive(Debug, serde::Deserialize)]
struct ConversationInfo {
    partner_id: Uuid,
    conversation_id: Uuid,
    unread_count: i64,
}

/// Attach conversation ids and unread counts from the messaging service.
/// Degrades gracefully: a messaging outage leaves the summaries bare
/// rather than failing the match list.
async fn enrich_with_conversations(state: &AppState, user_id: Uuid, summaries: &mut [MatchSummary]) {
    if summaries.is_empty() {
        return;
    }

    let partner_ids: Vec<Uuid> = summaries.iter().map(|s| s.matched_user.user_id).collect();
    let url = format!(
        "{}/internal/conversations/batch",
        state.config.messaging_service_url
    );

    let infos: Vec<ConversationInfo> = match state
        .http_client
        .post(&url)
        .json(&serde_json::json!({ "user_id": user_id, "partner_ids": partner_ids }))
        .send()
        .await
    {
        Ok(resp) => resp.json().await.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to fetch conversation info from messaging");
            vec![]
        }
    };

    let by_partner: HashMap<Uuid, &ConversationInfo> =
        infos.iter().map(|i| (i.partner_id, i)).collect();

    for summary in summaries.iter_mut() {
        if let Some(info) = by_partner.get(&summary.matched_user.user_id) {
            summary.conversation_id = Some(info.conversation_id);
            summary.unread_count = info.unread_count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn like(from: Uuid, to: Uuid, secs: i32, at: DateTime<Utc>) -> Like {
        Like {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            call_duration_secs: secs,
            created_at: at,
        }
    }

    fn profile(user_id: Uuid, name: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            user_id,
            display_name: name.into(),
            age: 30,
            gender: Some("woman".into()),
            location_city: None,
            location_region: None,
            bio: None,
            profile_photo_url: None,
            tags: json!([]),
            looking_for: None,
            preferences: json!({}),
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
    fn one_sided_likes_are_not_matches() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let my_likes = vec![like(me, other, 60, Utc::now())];
        let profiles: HashMap<_, _> = [(other, profile(other, "sam"))].into();

        let summaries = build_match_summaries(&my_likes, &[], &profiles);
        assert!(summaries.is_empty());
    }

    #[test]
    fn mutual_likes_sum_durations() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let t0 = Utc::now();

        let my_likes = vec![like(me, other, 120, t0)];
        let likes_to_me = vec![like(other, me, 90, t0 + Duration::minutes(5))];
        let profiles: HashMap<_, _> = [(other, profile(other, "sam"))].into();

        let summaries = build_match_summaries(&my_likes, &likes_to_me, &profiles);
        assert_eq!(summaries.len(), 1);

        let m = &summaries[0];
        assert_eq!(m.my_call_duration_secs, 120);
        assert_eq!(m.their_call_duration_secs, 90);
        assert_eq!(m.total_call_duration_secs, 210);
        // The second (triggering) like's time is the match time.
        assert_eq!(m.matched_at, t0 + Duration::minutes(5));
    }

    #[test]
    fn sorted_most_recent_first() {
        let me = Uuid::new_v4();
        let old_friend = Uuid::new_v4();
        let new_friend = Uuid::new_v4();
        let t0 = Utc::now();

        let my_likes = vec![
            like(me, old_friend, 10, t0 - Duration::days(3)),
            like(me, new_friend, 20, t0),
        ];
        let likes_to_me = vec![
            like(old_friend, me, 10, t0 - Duration::days(2)),
            like(new_friend, me, 20, t0 + Duration::hours(1)),
        ];
        let profiles: HashMap<_, _> = [
            (old_friend, profile(old_friend, "old")),
            (new_friend, profile(new_friend, "new")),
        ]
        .into();

        let summaries = build_match_summaries(&my_likes, &likes_to_me, &profiles);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].matched_user.display_name, "new");
        assert_eq!(summaries[1].matched_user.display_name, "old");
    }

    #[test]
    fn missing_partner_profile_is_skipped() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let my_likes = vec![like(me, other, 1, Utc::now())];
        let likes_to_me = vec![like(other, me, 1, Utc::now())];

        let summaries = build_match_summaries(&my_likes, &likes_to_me, &HashMap::new());
        assert!(summaries.is_empty());
    }
}
