use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::keys::EntityKind;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Redis connection configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Expiration per TTL class
    #[serde(default)]
    pub ttl: TtlConfig,
    /// Startup and periodic warmup
    #[serde(default)]
    pub warmup: WarmupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.redis.url.is_empty() {
            return Err("redis.url must not be empty".into());
        }
        if self.redis.pool_size == 0 {
            return Err("redis.pool_size must be > 0".into());
        }
        if self.redis.timeout_ms == 0 {
            return Err("redis.timeout_ms must be > 0".into());
        }
        if self.ttl.default == 0 {
            return Err("ttl.default must be > 0".into());
        }
        if self.warmup.concurrency == 0 {
            return Err("warmup.concurrency must be > 0".into());
        }
        if self.warmup.refresh_interval_secs == 0 {
            return Err("warmup.refresh_interval_secs must be > 0".into());
        }
        if self.warmup.refresh_timeout_secs == 0 {
            return Err("warmup.refresh_timeout_secs must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Expiration in seconds per TTL class.
///
/// Slow-churning data (profiles, circles) lives longer than counters and feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Store-wide default used when a caller passes a zero TTL
    pub default: u64,
    pub user: u64,
    pub user_profile: u64,
    pub user_stats: u64,
    pub post: u64,
    pub comment: u64,
    pub circle: u64,
    pub count: u64,
    pub timeline: u64,
    pub notification: u64,
    pub conversation: u64,
    pub session: u64,
    pub verification_code: u64,
    pub activation_token: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default: 600,
            user: 3600,
            user_profile: 3600,
            user_stats: 300,
            post: 900,
            comment: 600,
            circle: 1800,
            count: 60,
            timeline: 120,
            notification: 120,
            conversation: 300,
            session: 86400,
            verification_code: 600,
            activation_token: 86400,
        }
    }
}

impl TtlConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default)
    }

    /// TTL class for an entity kind.
    pub fn for_kind(&self, kind: EntityKind) -> Duration {
        let secs = match kind {
            EntityKind::User => self.user,
            EntityKind::UserProfile => self.user_profile,
            EntityKind::UserStats => self.user_stats,
            EntityKind::Post => self.post,
            EntityKind::Comment => self.comment,
            EntityKind::Circle => self.circle,
            EntityKind::Count => self.count,
            EntityKind::Timeline => self.timeline,
            EntityKind::Notification => self.notification,
            EntityKind::Conversation => self.conversation,
            EntityKind::Session => self.session,
            EntityKind::Code => self.verification_code,
            EntityKind::Token => self.activation_token,
        };
        Duration::from_secs(secs)
    }
}

/// Warmup configuration.
///
/// Handed to the scheduler by value; changing it means building a new scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupConfig {
    /// Run warmup at startup and on the refresh timer
    pub enabled: bool,
    /// Maximum hot posts to warm per pass
    pub hot_posts_limit: usize,
    /// Maximum active users to warm per pass
    pub active_users_limit: usize,
    /// Maximum popular circles to warm per pass
    pub popular_circles_limit: usize,
    /// Seconds between periodic refresh passes
    pub refresh_interval_secs: u64,
    /// Maximum in-flight loader calls during one pass
    pub concurrency: usize,
    /// Upper bound on a single periodic pass
    pub refresh_timeout_secs: u64,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hot_posts_limit: 100,
            active_users_limit: 50,
            popular_circles_limit: 20,
            refresh_interval_secs: 600,
            concurrency: 10,
            refresh_timeout_secs: 300,
        }
    }
}

impl WarmupConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::CacheConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<CacheConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("circles-cache.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., CIRCLES_CACHE__WARMUP__CONCURRENCY=4
        builder = builder.add_source(
            Environment::with_prefix("CIRCLES_CACHE")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: CacheConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = CacheConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.warmup.concurrency, 10);
        assert_eq!(cfg.ttl.default_ttl(), Duration::from_secs(600));
    }

    #[test]
    fn test_ttl_classes_follow_churn() {
        let ttl = TtlConfig::default();
        assert!(ttl.for_kind(EntityKind::UserProfile) > ttl.for_kind(EntityKind::Count));
        assert_eq!(ttl.for_kind(EntityKind::Post), Duration::from_secs(900));
        assert_eq!(ttl.for_kind(EntityKind::Code), Duration::from_secs(600));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut cfg = CacheConfig::default();
        cfg.warmup.concurrency = 0;
        assert_eq!(
            cfg.validate().unwrap_err(),
            "warmup.concurrency must be > 0"
        );
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut cfg = CacheConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[redis]
url = "redis://cache.internal:6380"

[ttl]
post = 30

[warmup]
concurrency = 4
hot_posts_limit = 5
"#
        )
        .unwrap();

        let cfg = loader::load_config(file.path().to_str()).unwrap();
        assert_eq!(cfg.redis.url, "redis://cache.internal:6380");
        assert_eq!(cfg.redis.pool_size, 10);
        assert_eq!(cfg.ttl.post, 30);
        assert_eq!(cfg.ttl.user, 3600);
        assert_eq!(cfg.warmup.concurrency, 4);
        assert_eq!(cfg.warmup.hot_posts_limit, 5);
        assert_eq!(cfg.warmup.active_users_limit, 50);
    }
}
