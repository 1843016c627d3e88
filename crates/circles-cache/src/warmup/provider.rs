//! Source of "hot" identifiers for warmup.

use std::fmt;

use async_trait::async_trait;

use crate::config::WarmupConfig;
use crate::error::LoaderError;
use crate::keys::EntityKind;

/// Category of entities warmed in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotKind {
    /// Posts with the most recent engagement.
    HotPosts,
    /// Recently active users.
    ActiveUsers,
    /// Circles with the most members or activity.
    PopularCircles,
}

impl HotKind {
    /// Warm order within a pass.
    pub const ALL: [HotKind; 3] = [HotKind::HotPosts, HotKind::ActiveUsers, HotKind::PopularCircles];

    /// Entity kind whose key prefix and TTL are used for loaded values.
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            HotKind::HotPosts => EntityKind::Post,
            HotKind::ActiveUsers => EntityKind::User,
            HotKind::PopularCircles => EntityKind::Circle,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            HotKind::HotPosts => "hot_posts",
            HotKind::ActiveUsers => "active_users",
            HotKind::PopularCircles => "popular_circles",
        }
    }

    /// Configured per-pass limit for this kind.
    pub fn limit(self, config: &WarmupConfig) -> usize {
        match self {
            HotKind::HotPosts => config.hot_posts_limit,
            HotKind::ActiveUsers => config.active_users_limit,
            HotKind::PopularCircles => config.popular_circles_limit,
        }
    }
}

impl fmt::Display for HotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Supplied by domain services to tell warmup what to load and how.
///
/// Implementations must be safe to call concurrently: one pass issues up to
/// `warmup.concurrency` `load_entity` calls at once.
#[async_trait]
pub trait HotDataProvider: Send + Sync {
    /// Up to `limit` identifiers worth warming for `kind`, hottest first.
    async fn hot_identifiers(&self, kind: HotKind, limit: usize) -> Result<Vec<i64>, LoaderError>;

    /// Load one entity from the system of record.
    ///
    /// `Ok(None)` means the entity no longer exists and is skipped.
    async fn load_entity(
        &self,
        kind: HotKind,
        id: i64,
    ) -> Result<Option<serde_json::Value>, LoaderError>;
}
