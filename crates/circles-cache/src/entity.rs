//! Entity-level cache facade.
//!
//! Maps domain entities to their canonical key and TTL class, and computes
//! the related-key sets that must be dropped together when an entity is
//! written. Also manages short-lived values (sessions, verification codes,
//! one-time tokens) that are set directly rather than loaded.
//!
//! ## Invalidation Sets
//!
//! | Write            | Keys dropped                                                        |
//! |------------------|---------------------------------------------------------------------|
//! | post             | `post`, `count:post`, `count:user:{author}`, author/circle timelines |
//! | user             | `user`, `user_profile`, `user_stats`, `count:user`, own timelines   |
//! | circle           | `circle`, `count:circle`, `timeline:circle`                         |
//! | comment          | `comment`, `count:post:{post}`                                      |
//! | notification     | `notification:{user}`, `count:notification:{user}`                  |
//! | conversation     | `conversation`, `conversation:user:{participant}` per participant   |

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::aside::CacheAside;
use crate::config::TtlConfig;
use crate::error::{LoaderError, Result};
use crate::keys::{self, EntityKind};
use crate::store::KeyTtl;

/// A cacheable entity or derived view, identified by kind and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef<'a> {
    User(i64),
    UserProfile(i64),
    UserStats(i64),
    UserByUsername(&'a str),
    Post(i64),
    Comment(i64),
    Circle(i64),
    PostCount(i64),
    CircleCount(i64),
    UserCount(i64),
    NotificationCount(i64),
    UserTimeline(i64),
    CircleTimeline(i64),
    HomeTimeline(i64),
    Notifications(i64),
    Conversation(i64),
    UserConversations(i64),
}

impl EntityRef<'_> {
    /// Canonical cache key.
    pub fn key(&self) -> String {
        match *self {
            EntityRef::User(id) => keys::user(id),
            EntityRef::UserProfile(id) => keys::user_profile(id),
            EntityRef::UserStats(id) => keys::user_stats(id),
            EntityRef::UserByUsername(name) => keys::user_by_username(name),
            EntityRef::Post(id) => keys::post(id),
            EntityRef::Comment(id) => keys::comment(id),
            EntityRef::Circle(id) => keys::circle(id),
            EntityRef::PostCount(id) => keys::post_count(id),
            EntityRef::CircleCount(id) => keys::circle_count(id),
            EntityRef::UserCount(id) => keys::user_count(id),
            EntityRef::NotificationCount(id) => keys::notification_count(id),
            EntityRef::UserTimeline(id) => keys::user_timeline(id),
            EntityRef::CircleTimeline(id) => keys::circle_timeline(id),
            EntityRef::HomeTimeline(id) => keys::home_timeline(id),
            EntityRef::Notifications(id) => keys::notifications(id),
            EntityRef::Conversation(id) => keys::conversation(id),
            EntityRef::UserConversations(id) => keys::user_conversations(id),
        }
    }

    /// Kind whose TTL class applies.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::User(_) | EntityRef::UserByUsername(_) => EntityKind::User,
            EntityRef::UserProfile(_) => EntityKind::UserProfile,
            EntityRef::UserStats(_) => EntityKind::UserStats,
            EntityRef::Post(_) => EntityKind::Post,
            EntityRef::Comment(_) => EntityKind::Comment,
            EntityRef::Circle(_) => EntityKind::Circle,
            EntityRef::PostCount(_)
            | EntityRef::CircleCount(_)
            | EntityRef::UserCount(_)
            | EntityRef::NotificationCount(_) => EntityKind::Count,
            EntityRef::UserTimeline(_)
            | EntityRef::CircleTimeline(_)
            | EntityRef::HomeTimeline(_) => EntityKind::Timeline,
            EntityRef::Notifications(_) => EntityKind::Notification,
            EntityRef::Conversation(_) | EntityRef::UserConversations(_) => {
                EntityKind::Conversation
            }
        }
    }
}

/// Keys dropped when a post is created, edited or deleted.
pub fn post_related_keys(post_id: i64, author_id: i64, circle_id: Option<i64>) -> Vec<String> {
    let mut keys = vec![
        keys::post(post_id),
        keys::post_count(post_id),
        keys::user_count(author_id),
        keys::user_timeline(author_id),
    ];
    if let Some(circle_id) = circle_id {
        keys.push(keys::circle_timeline(circle_id));
    }
    keys
}

/// Keys dropped when a user changes.
pub fn user_related_keys(user_id: i64, username: Option<&str>) -> Vec<String> {
    let mut keys = vec![
        keys::user(user_id),
        keys::user_profile(user_id),
        keys::user_stats(user_id),
        keys::user_count(user_id),
        keys::user_timeline(user_id),
        keys::home_timeline(user_id),
    ];
    if let Some(username) = username {
        keys.push(keys::user_by_username(username));
    }
    keys
}

/// Keys dropped when a circle or its membership changes.
pub fn circle_related_keys(circle_id: i64) -> Vec<String> {
    vec![
        keys::circle(circle_id),
        keys::circle_count(circle_id),
        keys::circle_timeline(circle_id),
    ]
}

/// Keys dropped when a comment changes.
pub fn comment_related_keys(comment_id: i64, post_id: i64) -> Vec<String> {
    vec![keys::comment(comment_id), keys::post_count(post_id)]
}

/// Keys dropped when a user's notifications change.
pub fn notification_related_keys(user_id: i64) -> Vec<String> {
    vec![keys::notifications(user_id), keys::notification_count(user_id)]
}

/// Keys dropped when a conversation receives a message.
pub fn conversation_related_keys(conversation_id: i64, participant_ids: &[i64]) -> Vec<String> {
    std::iter::once(keys::conversation(conversation_id))
        .chain(participant_ids.iter().map(|id| keys::user_conversations(*id)))
        .collect()
}

/// Per-entity cache operations.
#[derive(Clone, Debug)]
pub struct EntityCache {
    aside: CacheAside,
    ttl: TtlConfig,
}

impl EntityCache {
    pub fn new(aside: CacheAside, ttl: TtlConfig) -> Self {
        Self { aside, ttl }
    }

    pub fn aside(&self) -> &CacheAside {
        &self.aside
    }

    /// TTL applied to an entity.
    pub fn ttl_for(&self, entity: EntityRef<'_>) -> Duration {
        self.ttl.for_kind(entity.kind())
    }

    /// Read-through an entity with its kind's TTL.
    pub async fn get_or_load<T, F, Fut>(&self, entity: EntityRef<'_>, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        self.aside
            .get_or_load(&entity.key(), self.ttl_for(entity), loader)
            .await
    }

    /// Write a freshly persisted entity straight into the cache.
    pub async fn put<T: Serialize + ?Sized>(&self, entity: EntityRef<'_>, value: &T) -> Result<()> {
        self.aside
            .store()
            .set(&entity.key(), value, self.ttl_for(entity))
            .await
    }

    /// Drop a single entity key.
    pub async fn invalidate(&self, entity: EntityRef<'_>) -> Result<()> {
        self.aside.invalidate(&entity.key()).await
    }

    pub async fn get_user<T, F, Fut>(&self, id: i64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        self.get_or_load(EntityRef::User(id), loader).await
    }

    pub async fn get_user_profile<T, F, Fut>(&self, id: i64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        self.get_or_load(EntityRef::UserProfile(id), loader).await
    }

    pub async fn get_post<T, F, Fut>(&self, id: i64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        self.get_or_load(EntityRef::Post(id), loader).await
    }

    pub async fn get_comment<T, F, Fut>(&self, id: i64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        self.get_or_load(EntityRef::Comment(id), loader).await
    }

    pub async fn get_circle<T, F, Fut>(&self, id: i64, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, LoaderError>>,
    {
        self.get_or_load(EntityRef::Circle(id), loader).await
    }

    pub async fn invalidate_user(&self, id: i64) -> Result<()> {
        self.invalidate(EntityRef::User(id)).await
    }

    pub async fn invalidate_post(&self, id: i64) -> Result<()> {
        self.invalidate(EntityRef::Post(id)).await
    }

    pub async fn invalidate_circle(&self, id: i64) -> Result<()> {
        self.invalidate(EntityRef::Circle(id)).await
    }

    pub async fn invalidate_post_related(
        &self,
        post_id: i64,
        author_id: i64,
        circle_id: Option<i64>,
    ) -> Result<()> {
        self.aside
            .invalidate_multiple(post_related_keys(post_id, author_id, circle_id))
            .await
    }

    pub async fn invalidate_user_related(&self, user_id: i64, username: Option<&str>) -> Result<()> {
        self.aside
            .invalidate_multiple(user_related_keys(user_id, username))
            .await
    }

    pub async fn invalidate_circle_related(&self, circle_id: i64) -> Result<()> {
        self.aside
            .invalidate_multiple(circle_related_keys(circle_id))
            .await
    }

    pub async fn invalidate_comment_related(&self, comment_id: i64, post_id: i64) -> Result<()> {
        self.aside
            .invalidate_multiple(comment_related_keys(comment_id, post_id))
            .await
    }

    pub async fn invalidate_notification_related(&self, user_id: i64) -> Result<()> {
        self.aside
            .invalidate_multiple(notification_related_keys(user_id))
            .await
    }

    pub async fn invalidate_conversation_related(
        &self,
        conversation_id: i64,
        participant_ids: &[i64],
    ) -> Result<()> {
        self.aside
            .invalidate_multiple(conversation_related_keys(conversation_id, participant_ids))
            .await
    }

    // ==================== Sessions ====================

    pub async fn set_session<T: Serialize + ?Sized>(&self, token: &str, session: &T) -> Result<()> {
        self.aside
            .store()
            .set(&keys::session(token), session, self.ttl.for_kind(EntityKind::Session))
            .await
    }

    pub async fn get_session<T: DeserializeOwned>(&self, token: &str) -> Result<Option<T>> {
        self.aside.store().get_optional(&keys::session(token)).await
    }

    /// Extend a live session by a full session TTL. Returns `false` if it expired.
    pub async fn touch_session(&self, token: &str) -> Result<bool> {
        self.aside
            .store()
            .expire(&keys::session(token), self.ttl.for_kind(EntityKind::Session))
            .await
    }

    pub async fn session_ttl(&self, token: &str) -> Result<KeyTtl> {
        self.aside.store().ttl(&keys::session(token)).await
    }

    pub async fn delete_session(&self, token: &str) -> Result<()> {
        self.aside.store().delete(&keys::session(token)).await
    }

    // ==================== Verification codes ====================

    pub async fn set_verification_code(&self, target: &str, code: &str) -> Result<()> {
        self.aside
            .store()
            .set(&keys::verification_code(target), code, self.ttl.for_kind(EntityKind::Code))
            .await
    }

    /// Store a code unless one is still pending for `target`.
    ///
    /// Returns `false` if a code already exists; callers use this to throttle
    /// resends.
    pub async fn set_verification_code_if_absent(&self, target: &str, code: &str) -> Result<bool> {
        self.aside
            .store()
            .set_if_absent(&keys::verification_code(target), code, self.ttl.for_kind(EntityKind::Code))
            .await
    }

    pub async fn get_verification_code(&self, target: &str) -> Result<Option<String>> {
        self.aside
            .store()
            .get_optional(&keys::verification_code(target))
            .await
    }

    /// Check `code` against the pending one and consume it on match.
    pub async fn verify_code(&self, target: &str, code: &str) -> Result<bool> {
        match self.get_verification_code(target).await? {
            Some(stored) if stored == code => {
                self.delete_verification_code(target).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn delete_verification_code(&self, target: &str) -> Result<()> {
        self.aside
            .store()
            .delete(&keys::verification_code(target))
            .await
    }

    // ==================== One-time tokens ====================

    pub async fn set_activation_token(&self, token: &str, user_id: i64) -> Result<()> {
        self.aside
            .store()
            .set(&keys::activation_token(token), &user_id, self.ttl.for_kind(EntityKind::Token))
            .await
    }

    pub async fn get_activation_token(&self, token: &str) -> Result<Option<i64>> {
        self.aside
            .store()
            .get_optional(&keys::activation_token(token))
            .await
    }

    /// Read and delete an activation token.
    pub async fn take_activation_token(&self, token: &str) -> Result<Option<i64>> {
        self.take(&keys::activation_token(token)).await
    }

    pub async fn delete_activation_token(&self, token: &str) -> Result<()> {
        self.aside
            .store()
            .delete(&keys::activation_token(token))
            .await
    }

    pub async fn set_password_reset_token(&self, token: &str, user_id: i64) -> Result<()> {
        self.aside
            .store()
            .set(&keys::password_reset_token(token), &user_id, self.ttl.for_kind(EntityKind::Token))
            .await
    }

    pub async fn get_password_reset_token(&self, token: &str) -> Result<Option<i64>> {
        self.aside
            .store()
            .get_optional(&keys::password_reset_token(token))
            .await
    }

    /// Read and delete a password reset token.
    pub async fn take_password_reset_token(&self, token: &str) -> Result<Option<i64>> {
        self.take(&keys::password_reset_token(token)).await
    }

    pub async fn delete_password_reset_token(&self, token: &str) -> Result<()> {
        self.aside
            .store()
            .delete(&keys::password_reset_token(token))
            .await
    }

    async fn take<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let store = self.aside.store();
        let value = store.get_optional(key).await?;
        if value.is_some() {
            store.delete(key).await?;
        }
        Ok(value)
    }
}
