//! Cache key generation.
//!
//! ## Key Format
//!
//! - Simple entities: `{prefix}:{id}`, e.g. `post:42`
//! - Composite keys: `{prefix}:{subprefix}:{id}`, e.g. `count:post:42`,
//!   `timeline:circle:3`
//!
//! Keys are read directly by operational tooling, so the prefixes below are
//! part of the external contract and must not change.

use std::fmt::{self, Display};
use std::str::FromStr;

/// Domain category that selects a key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    UserProfile,
    UserStats,
    Post,
    Comment,
    Circle,
    Count,
    Timeline,
    Session,
    Code,
    Token,
    Notification,
    Conversation,
}

impl EntityKind {
    /// All kinds, in prefix-table order.
    pub const ALL: [EntityKind; 13] = [
        EntityKind::User,
        EntityKind::UserProfile,
        EntityKind::UserStats,
        EntityKind::Post,
        EntityKind::Comment,
        EntityKind::Circle,
        EntityKind::Count,
        EntityKind::Timeline,
        EntityKind::Session,
        EntityKind::Code,
        EntityKind::Token,
        EntityKind::Notification,
        EntityKind::Conversation,
    ];

    /// Fixed key prefix for this kind.
    pub const fn prefix(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::UserProfile => "user_profile",
            EntityKind::UserStats => "user_stats",
            EntityKind::Post => "post",
            EntityKind::Comment => "comment",
            EntityKind::Circle => "circle",
            EntityKind::Count => "count",
            EntityKind::Timeline => "timeline",
            EntityKind::Session => "session",
            EntityKind::Code => "code",
            EntityKind::Token => "token",
            EntityKind::Notification => "notification",
            EntityKind::Conversation => "conversation",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.prefix() == s)
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

/// Build a simple `{prefix}:{id}` key.
#[inline]
pub fn entity(kind: EntityKind, id: impl Display) -> String {
    format!("{}:{id}", kind.prefix())
}

/// Build a composite `{prefix}:{subprefix}:{id}` key.
#[inline]
pub fn composite(kind: EntityKind, subprefix: &str, id: impl Display) -> String {
    format!("{}:{subprefix}:{id}", kind.prefix())
}

pub fn user(id: i64) -> String {
    entity(EntityKind::User, id)
}

pub fn user_profile(id: i64) -> String {
    entity(EntityKind::UserProfile, id)
}

pub fn user_stats(id: i64) -> String {
    entity(EntityKind::UserStats, id)
}

/// Username → user lookup key.
pub fn user_by_username(username: &str) -> String {
    composite(EntityKind::User, "username", username)
}

pub fn post(id: i64) -> String {
    entity(EntityKind::Post, id)
}

pub fn comment(id: i64) -> String {
    entity(EntityKind::Comment, id)
}

pub fn circle(id: i64) -> String {
    entity(EntityKind::Circle, id)
}

/// Vote and comment counters for a post.
pub fn post_count(post_id: i64) -> String {
    composite(EntityKind::Count, "post", post_id)
}

/// Member counter for a circle.
pub fn circle_count(circle_id: i64) -> String {
    composite(EntityKind::Count, "circle", circle_id)
}

/// Follower/post counters for a user.
pub fn user_count(user_id: i64) -> String {
    composite(EntityKind::Count, "user", user_id)
}

/// Unread notification counter for a user.
pub fn notification_count(user_id: i64) -> String {
    composite(EntityKind::Count, "notification", user_id)
}

/// Posts authored by a user.
pub fn user_timeline(user_id: i64) -> String {
    composite(EntityKind::Timeline, "user", user_id)
}

/// Posts published in a circle.
pub fn circle_timeline(circle_id: i64) -> String {
    composite(EntityKind::Timeline, "circle", circle_id)
}

/// Aggregated home feed for a user.
pub fn home_timeline(user_id: i64) -> String {
    composite(EntityKind::Timeline, "home", user_id)
}

/// Notification list for a user.
pub fn notifications(user_id: i64) -> String {
    entity(EntityKind::Notification, user_id)
}

pub fn conversation(id: i64) -> String {
    entity(EntityKind::Conversation, id)
}

/// Conversation list for a user.
pub fn user_conversations(user_id: i64) -> String {
    composite(EntityKind::Conversation, "user", user_id)
}

pub fn session(token: &str) -> String {
    entity(EntityKind::Session, token)
}

/// Verification code sent to an email address or phone number.
pub fn verification_code(target: &str) -> String {
    composite(EntityKind::Code, "verify", target)
}

pub fn activation_token(token: &str) -> String {
    composite(EntityKind::Token, "activation", token)
}

pub fn password_reset_token(token: &str) -> String {
    composite(EntityKind::Token, "reset", token)
}
