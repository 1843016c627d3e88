//! Entity facade tests: TTL classes, invalidation sets and ephemeral values.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use circles_cache::{CacheAside, EntityCache, EntityRef, KeyTtl, LoaderError, TtlConfig};
use common::{Post, memory_store};
use serde::{Deserialize, Serialize};

fn entity_cache() -> (circles_cache::MemoryBackend, circles_cache::CacheStore, EntityCache) {
    let (backend, store) = memory_store();
    let cache = EntityCache::new(CacheAside::new(store.clone()), TtlConfig::default());
    (backend, store, cache)
}

fn within(actual: Duration, expected_secs: u64) -> bool {
    actual <= Duration::from_secs(expected_secs)
        && actual > Duration::from_secs(expected_secs.saturating_sub(5))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: i64,
    device: String,
}

#[tokio::test]
async fn test_get_post_caches_with_post_ttl() {
    let (_, store, cache) = entity_cache();
    let calls = AtomicUsize::new(0);

    for _ in 0..3 {
        let post = cache
            .get_post(42, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, LoaderError>(Post::new(42, "Hello"))
            })
            .await
            .unwrap();
        assert_eq!(post.title, "Hello");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let ttl = store.ttl("post:42").await.unwrap().remaining().unwrap();
    assert!(within(ttl, 900), "{ttl:?}");
}

#[tokio::test]
async fn test_each_getter_uses_its_ttl_class() {
    let (_, store, cache) = entity_cache();

    cache
        .get_user(1, || async { Ok::<_, LoaderError>("u".to_string()) })
        .await
        .unwrap();
    cache
        .get_user_profile(1, || async { Ok::<_, LoaderError>("p".to_string()) })
        .await
        .unwrap();
    cache
        .get_comment(1, || async { Ok::<_, LoaderError>("c".to_string()) })
        .await
        .unwrap();
    cache
        .get_circle(1, || async { Ok::<_, LoaderError>("o".to_string()) })
        .await
        .unwrap();
    cache
        .get_or_load(EntityRef::PostCount(1), || async { Ok::<_, LoaderError>(17_u64) })
        .await
        .unwrap();

    for (key, secs) in [
        ("user:1", 3600),
        ("user_profile:1", 3600),
        ("comment:1", 600),
        ("circle:1", 1800),
        ("count:post:1", 60),
    ] {
        let ttl = store.ttl(key).await.unwrap().remaining().unwrap();
        assert!(within(ttl, secs), "{key}: {ttl:?}");
    }
}

#[tokio::test]
async fn test_put_then_get_skips_loader() {
    let (_, _, cache) = entity_cache();
    let post = Post::new(5, "just written");
    cache.put(EntityRef::Post(5), &post).await.unwrap();

    let cached: Post = cache
        .get_post(5, || async { Err::<Post, LoaderError>("should not load".into()) })
        .await
        .unwrap();
    assert_eq!(cached, post);
}

#[tokio::test]
async fn test_invalidate_post_related_leaves_unrelated_keys() {
    let (backend, store, cache) = entity_cache();
    let ttl = Duration::from_secs(60);
    for key in [
        "post:1",
        "count:post:1",
        "count:user:9",
        "timeline:user:9",
        "timeline:circle:3",
        "post:2",
        "user:9",
        "timeline:circle:4",
    ] {
        store.set(key, &0, ttl).await.unwrap();
    }

    cache.invalidate_post_related(1, 9, Some(3)).await.unwrap();

    assert_eq!(backend.keys(), vec!["post:2", "timeline:circle:4", "user:9"]);
}

#[tokio::test]
async fn test_invalidate_user_related_includes_username_lookup() {
    let (backend, store, cache) = entity_cache();
    let ttl = Duration::from_secs(60);
    for key in [
        "user:9",
        "user_profile:9",
        "user_stats:9",
        "count:user:9",
        "timeline:user:9",
        "timeline:home:9",
        "user:username:ada",
        "user:10",
    ] {
        store.set(key, &0, ttl).await.unwrap();
    }

    cache.invalidate_user_related(9, Some("ada")).await.unwrap();

    assert_eq!(backend.keys(), vec!["user:10"]);
}

#[tokio::test]
async fn test_invalidate_other_related_sets() {
    let (backend, store, cache) = entity_cache();
    let ttl = Duration::from_secs(60);
    for key in [
        "circle:3",
        "count:circle:3",
        "timeline:circle:3",
        "comment:8",
        "count:post:1",
        "notification:9",
        "count:notification:9",
        "conversation:4",
        "conversation:user:9",
        "conversation:user:10",
        "conversation:user:11",
    ] {
        store.set(key, &0, ttl).await.unwrap();
    }

    cache.invalidate_circle_related(3).await.unwrap();
    cache.invalidate_comment_related(8, 1).await.unwrap();
    cache.invalidate_notification_related(9).await.unwrap();
    cache.invalidate_conversation_related(4, &[9, 10]).await.unwrap();

    assert_eq!(backend.keys(), vec!["conversation:user:11"]);
}

#[tokio::test]
async fn test_single_invalidations() {
    let (backend, store, cache) = entity_cache();
    for key in ["user:1", "post:1", "circle:1", "comment:1"] {
        store.set(key, &0, Duration::from_secs(60)).await.unwrap();
    }

    cache.invalidate_user(1).await.unwrap();
    cache.invalidate_post(1).await.unwrap();
    cache.invalidate_circle(1).await.unwrap();

    assert_eq!(backend.keys(), vec!["comment:1"]);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (_, _, cache) = entity_cache();
    let session = Session {
        user_id: 7,
        device: "phone".into(),
    };

    cache.set_session("tok", &session).await.unwrap();
    assert_eq!(cache.get_session::<Session>("tok").await.unwrap(), Some(session));

    let ttl = cache.session_ttl("tok").await.unwrap();
    assert!(within(ttl.remaining().unwrap(), 86400));
    assert!(cache.touch_session("tok").await.unwrap());

    cache.delete_session("tok").await.unwrap();
    assert_eq!(cache.get_session::<Session>("tok").await.unwrap(), None);
    assert_eq!(cache.session_ttl("tok").await.unwrap(), KeyTtl::Missing);
    assert!(!cache.touch_session("tok").await.unwrap());
}

#[tokio::test]
async fn test_verification_code_throttle_and_consume() {
    let (_, store, cache) = entity_cache();

    assert!(cache.set_verification_code_if_absent("a@b.c", "123456").await.unwrap());
    assert!(!cache.set_verification_code_if_absent("a@b.c", "999999").await.unwrap());
    assert_eq!(
        cache.get_verification_code("a@b.c").await.unwrap().as_deref(),
        Some("123456")
    );
    let ttl = store.ttl("code:verify:a@b.c").await.unwrap().remaining().unwrap();
    assert!(within(ttl, 600));

    assert!(!cache.verify_code("a@b.c", "000000").await.unwrap());
    assert!(cache.verify_code("a@b.c", "123456").await.unwrap());
    // Consumed on match.
    assert!(!cache.verify_code("a@b.c", "123456").await.unwrap());

    cache.set_verification_code("a@b.c", "222222").await.unwrap();
    cache.delete_verification_code("a@b.c").await.unwrap();
    assert_eq!(cache.get_verification_code("a@b.c").await.unwrap(), None);
}

#[tokio::test]
async fn test_one_time_tokens_are_taken_once() {
    let (_, _, cache) = entity_cache();

    cache.set_activation_token("act", 7).await.unwrap();
    assert_eq!(cache.get_activation_token("act").await.unwrap(), Some(7));
    assert_eq!(cache.take_activation_token("act").await.unwrap(), Some(7));
    assert_eq!(cache.take_activation_token("act").await.unwrap(), None);

    cache.set_activation_token("act2", 8).await.unwrap();
    cache.delete_activation_token("act2").await.unwrap();
    assert_eq!(cache.get_activation_token("act2").await.unwrap(), None);

    cache.set_password_reset_token("reset", 9).await.unwrap();
    assert_eq!(cache.get_password_reset_token("reset").await.unwrap(), Some(9));
    assert_eq!(cache.take_password_reset_token("reset").await.unwrap(), Some(9));
    assert_eq!(cache.take_password_reset_token("reset").await.unwrap(), None);

    cache.set_password_reset_token("reset2", 10).await.unwrap();
    cache.delete_password_reset_token("reset2").await.unwrap();
    assert_eq!(cache.get_password_reset_token("reset2").await.unwrap(), None);
}
