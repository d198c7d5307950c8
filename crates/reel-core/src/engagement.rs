//! Locally mocked social proof: likes, comments and the visitor profile
//!
//! Nothing here is authoritative. All state lives in on-device storage and
//! is read fresh on every call, so two widgets sharing storage agree.

use crate::{
    config::EngagementConfig,
    storage::{keys, load_json, save_json, KeyValueStore},
    Error, Result,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

const ANONYMOUS_VISITOR: &str = "anon";
const REPLY_SUFFIX: &str = " (reply)";
const REPLY_TEXT: &str = "Same here, it worked for me too";
const SEED_COMMENTS_PER_STORY: usize = 12;

const SEED_TEXTS: [&str; 10] = [
    "Results in 5 weeks, loved it!",
    "No irritation at all, super gentle",
    "Recommended it to my mom and she loved it",
    "Saw a difference in 3 weeks",
    "Worth every penny",
    "My lashes finally have some volume",
    "Bought a second one to be safe",
    "My mascara looks perfect now",
    "Arrived fast",
    "Support over chat worked great",
];

const SEED_NAMES: [&str; 20] = [
    "Ana", "Beatriz", "Carla", "Duda", "Erika", "Fernanda", "Gi", "Helena", "Iasmin", "Julia",
    "Karen", "Lu", "Mari", "Nana", "Olivia", "Paula", "Quezia", "Rafa", "Sofia", "Tati",
];

/// Visitor identity required before liking or commenting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorProfile {
    pub name: String,
    /// Messaging contact; doubles as the visitor id for liked flags
    #[serde(rename = "whats")]
    pub contact: String,
}

impl VisitorProfile {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.contact.trim().is_empty()
    }
}

/// A comment on a story
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "name")]
    pub author: String,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Liked { count: u64 },
    Unliked { count: u64 },
    /// No complete profile; the host should show the profile prompt
    ProfileRequired,
}

/// Result of posting a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentOutcome {
    Posted(Comment),
    ProfileRequired,
    /// Blank after trimming
    Empty,
}

type StoryMap<T> = HashMap<String, T>;

fn story_key(story: usize) -> String {
    format!("story-{story}")
}

/// Human-readable age of a timestamp: `Ns`, `Nm`, `Nh` or `Nd`
pub fn relative_age(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - ts).num_seconds().max(1);
    if secs < 60 {
        return format!("{secs}s");
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{mins}m");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours}h");
    }
    format!("{}d", hours / 24)
}

/// Likes, comments and the visitor profile over a key-value store
#[derive(Debug, Clone)]
pub struct EngagementStore<S> {
    store: S,
    config: EngagementConfig,
}

impl<S: KeyValueStore> EngagementStore<S> {
    pub fn new(store: S, config: EngagementConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngagementConfig {
        &self.config
    }

    /// Stored profile, if complete
    pub fn profile(&self) -> Option<VisitorProfile> {
        load_json::<_, VisitorProfile>(&self.store, keys::PROFILE).filter(VisitorProfile::is_complete)
    }

    /// Persist a profile; both fields are trimmed and must be non-empty
    pub fn save_profile(&self, name: &str, contact: &str) -> Result<VisitorProfile> {
        let profile = VisitorProfile {
            name: name.trim().to_string(),
            contact: contact.trim().to_string(),
        };
        if !profile.is_complete() {
            return Err(Error::IncompleteProfile);
        }
        save_json(&self.store, keys::PROFILE, &profile);
        info!(name = %profile.name, "Visitor profile saved");
        Ok(profile)
    }

    fn visitor_id(&self) -> String {
        self.profile()
            .map(|p| p.contact)
            .unwrap_or_else(|| ANONYMOUS_VISITOR.to_string())
    }

    pub fn likes(&self, story: usize) -> u64 {
        load_json::<_, StoryMap<u64>>(&self.store, keys::LIKES)
            .and_then(|all| all.get(&story_key(story)).copied())
            .unwrap_or(0)
    }

    pub fn has_liked(&self, story: usize) -> bool {
        let all: HashMap<String, StoryMap<u8>> =
            load_json(&self.store, keys::LIKED).unwrap_or_default();
        all.get(&self.visitor_id())
            .and_then(|per| per.get(&story_key(story)))
            .is_some_and(|flag| *flag != 0)
    }

    /// Flip the visitor's like on a story
    pub fn toggle_like(&self, story: usize) -> LikeOutcome {
        if self.profile().is_none() {
            return LikeOutcome::ProfileRequired;
        }
        let key = story_key(story);
        let liked = self.has_liked(story);
        let mut count = self.likes(story);
        count = if liked { count.saturating_sub(1) } else { count + 1 };

        let mut counts: StoryMap<u64> = load_json(&self.store, keys::LIKES).unwrap_or_default();
        counts.insert(key.clone(), count);
        save_json(&self.store, keys::LIKES, &counts);

        let mut flags: HashMap<String, StoryMap<u8>> =
            load_json(&self.store, keys::LIKED).unwrap_or_default();
        flags
            .entry(self.visitor_id())
            .or_default()
            .insert(key, u8::from(!liked));
        save_json(&self.store, keys::LIKED, &flags);

        debug!(story, liked = !liked, count, "Like toggled");
        if liked {
            LikeOutcome::Unliked { count }
        } else {
            LikeOutcome::Liked { count }
        }
    }

    /// All comments of a story, oldest first as stored
    pub fn comments(&self, story: usize) -> Vec<Comment> {
        load_json::<_, StoryMap<Vec<Comment>>>(&self.store, keys::COMMENTS)
            .and_then(|mut all| all.remove(&story_key(story)))
            .unwrap_or_default()
    }

    /// The most recent comments that the panel renders
    pub fn visible_comments(&self, story: usize) -> Vec<Comment> {
        let mut all = self.comments(story);
        let skip = all.len().saturating_sub(self.config.visible_comments);
        all.drain(..skip);
        all
    }

    /// Append a visitor comment, truncated to the configured length
    pub fn add_comment(&self, story: usize, text: &str, now: DateTime<Utc>) -> CommentOutcome {
        let Some(profile) = self.profile() else {
            return CommentOutcome::ProfileRequired;
        };
        let text: String = text.trim().chars().take(self.config.comment_max_chars).collect();
        if text.is_empty() {
            return CommentOutcome::Empty;
        }
        let author = if profile.name.is_empty() {
            self.config.anonymous_name.clone()
        } else {
            profile.name
        };
        let comment = Comment { author, text, ts: now };

        let mut all: StoryMap<Vec<Comment>> =
            load_json(&self.store, keys::COMMENTS).unwrap_or_default();
        all.entry(story_key(story)).or_default().push(comment.clone());
        save_json(&self.store, keys::COMMENTS, &all);

        debug!(story, "Comment posted");
        CommentOutcome::Posted(comment)
    }

    /// Draft comment with `glyph` appended after a space
    ///
    /// The draft comes back unchanged when the result would exceed the
    /// comment length cap.
    pub fn append_emoji(&self, draft: &str, glyph: &str) -> String {
        let glyph = glyph.trim();
        if glyph.is_empty() {
            return draft.to_string();
        }
        let appended = if draft.is_empty() {
            glyph.to_string()
        } else {
            format!("{draft} {glyph}")
        };
        if appended.chars().count() > self.config.comment_max_chars {
            debug!("Emoji dropped at the comment length cap");
            return draft.to_string();
        }
        appended
    }

    /// Seed comments and like counts once per device
    ///
    /// Returns true when seeding ran.
    pub fn seed_if_needed(&self, now: DateTime<Utc>) -> bool {
        if load_json::<_, u8>(&self.store, keys::SEEDED).unwrap_or(0) != 0 {
            return false;
        }

        let mut comments: StoryMap<Vec<Comment>> = HashMap::new();
        let mut likes: StoryMap<u64> = HashMap::new();
        for s in 0..self.config.seed_story_count {
            let mut list = Vec::with_capacity(SEED_COMMENTS_PER_STORY + 3);
            for i in 0..SEED_COMMENTS_PER_STORY {
                let name = SEED_NAMES[(s * 3 + i) % SEED_NAMES.len()];
                let hours = i as i64 + 1;
                list.push(Comment {
                    author: name.to_string(),
                    text: SEED_TEXTS[(i + s) % SEED_TEXTS.len()].to_string(),
                    ts: now - ChronoDuration::hours(hours),
                });
                if i % 5 == 0 {
                    list.push(Comment {
                        author: format!("{name}{REPLY_SUFFIX}"),
                        text: REPLY_TEXT.to_string(),
                        ts: now - ChronoDuration::seconds(hours * 3500),
                    });
                }
            }
            comments.insert(story_key(s), list);
            likes.insert(story_key(s), self.config.seed_like_count);
        }

        save_json(&self.store, keys::COMMENTS, &comments);
        save_json(&self.store, keys::LIKES, &likes);
        save_json(&self.store, keys::SEEDED, &1u8);
        info!(stories = self.config.seed_story_count, "Engagement seeded");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn store() -> EngagementStore<MemoryStore> {
        EngagementStore::new(MemoryStore::new(), EngagementConfig::default())
    }

    #[test]
    fn test_relative_age_units() {
        let n = now();
        assert_eq!(relative_age(n, n), "1s");
        assert_eq!(relative_age(n - ChronoDuration::seconds(59), n), "59s");
        assert_eq!(relative_age(n - ChronoDuration::seconds(61), n), "1m");
        assert_eq!(relative_age(n - ChronoDuration::hours(5), n), "5h");
        assert_eq!(relative_age(n - ChronoDuration::hours(49), n), "2d");
        // Future timestamps clamp to one second
        assert_eq!(relative_age(n + ChronoDuration::hours(1), n), "1s");
    }

    #[test]
    fn test_profile_gates_likes_and_comments() {
        let e = store();
        assert_eq!(e.toggle_like(0), LikeOutcome::ProfileRequired);
        assert_eq!(e.add_comment(0, "hi", now()), CommentOutcome::ProfileRequired);
        assert!(matches!(e.save_profile("  ", "123"), Err(Error::IncompleteProfile)));
        assert!(e.profile().is_none());

        let p = e.save_profile(" Bia ", " 5511 ").unwrap();
        assert_eq!(p.name, "Bia");
        assert_eq!(e.profile(), Some(p));
    }

    #[test]
    fn test_toggle_like_round_trip() {
        let e = store();
        e.seed_if_needed(now());
        e.save_profile("Bia", "5511").unwrap();

        assert_eq!(e.toggle_like(2), LikeOutcome::Liked { count: 87 });
        assert!(e.has_liked(2));
        assert!(!e.has_liked(3));
        assert_eq!(e.toggle_like(2), LikeOutcome::Unliked { count: 86 });
        assert!(!e.has_liked(2));
    }

    #[test]
    fn test_add_comment_trims_and_truncates() {
        let e = store();
        e.save_profile("Bia", "5511").unwrap();
        assert_eq!(e.add_comment(1, "   ", now()), CommentOutcome::Empty);

        let long = "x".repeat(200);
        let CommentOutcome::Posted(c) = e.add_comment(1, &format!("  {long}  "), now()) else {
            panic!("comment should post");
        };
        assert_eq!(c.text.len(), 140);
        assert_eq!(c.author, "Bia");
        assert_eq!(e.comments(1), vec![c]);
    }

    #[test]
    fn test_append_emoji_respects_cap() {
        let e = store();
        assert_eq!(e.append_emoji("", "😍"), "😍");
        assert_eq!(e.append_emoji("love it", "😍"), "love it 😍");
        assert_eq!(e.append_emoji("love it", "  "), "love it");

        let full = "x".repeat(139);
        assert_eq!(e.append_emoji(&full, "😍"), full);
        let room = "x".repeat(137);
        assert_eq!(e.append_emoji(&room, "😍").chars().count(), 139);
    }

    #[test]
    fn test_seed_runs_once() {
        let e = store();
        assert!(e.seed_if_needed(now()));
        assert!(!e.seed_if_needed(now()));

        // 12 comments plus replies at i = 0, 5, 10
        let comments = e.comments(0);
        assert_eq!(comments.len(), 15);
        assert_eq!(comments[0].author, "Ana");
        assert_eq!(comments[1].author, "Ana (reply)");
        assert_eq!(e.likes(6), 86);
        assert_eq!(e.likes(7), 0);
        assert!(e.comments(7).is_empty());
    }

    #[test]
    fn test_visible_comments_keeps_latest() {
        let mut config = EngagementConfig::default();
        config.visible_comments = 2;
        let e = EngagementStore::new(MemoryStore::new(), config);
        e.save_profile("Bia", "5511").unwrap();
        for text in ["a", "b", "c"] {
            e.add_comment(0, text, now());
        }
        let texts: Vec<String> = e.visible_comments(0).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[test]
    fn test_blocked_storage_degrades_to_defaults() {
        let e = EngagementStore::new(MemoryStore::unavailable(), EngagementConfig::default());
        assert_eq!(e.likes(0), 0);
        assert!(e.comments(0).is_empty());
        assert!(e.profile().is_none());
        assert!(!e.has_liked(0));
    }

    #[test]
    fn test_comment_wire_format() {
        let c: Comment =
            serde_json::from_str(r#"{"name":"Ana","text":"ok","ts":1740830400000}"#).unwrap();
        assert_eq!(c.author, "Ana");
        assert_eq!(c.ts, Utc.timestamp_millis_opt(1_740_830_400_000).unwrap());
    }
}
