use anyhow::Result;
use circles_cache::entity::{circle_related_keys, post_related_keys, user_related_keys};
use circles_cache::{CacheAside, EntityCache};
use colored::Colorize;

use crate::cli::RelatedTarget;
use crate::output::{print_error, print_success};

pub async fn invalidate(aside: &CacheAside, keys: &[String]) -> Result<()> {
    let mut failed = 0;
    for key in keys {
        match aside.invalidate(key).await {
            Ok(()) => print_success(&format!("Deleted {key}")),
            Err(e) => {
                failed += 1;
                print_error(&format!("{key}: {e}"));
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} keys could not be deleted", keys.len());
    }
    Ok(())
}

pub async fn invalidate_related(
    entities: &EntityCache,
    target: &RelatedTarget,
    dry_run: bool,
) -> Result<()> {
    let keys = match target {
        RelatedTarget::Post { id, author, circle } => post_related_keys(*id, *author, *circle),
        RelatedTarget::User { id, username } => user_related_keys(*id, username.as_deref()),
        RelatedTarget::Circle { id } => circle_related_keys(*id),
    };

    for key in &keys {
        println!("  {}", key.cyan());
    }
    if dry_run {
        return Ok(());
    }

    match target {
        RelatedTarget::Post { id, author, circle } => {
            entities.invalidate_post_related(*id, *author, *circle).await?
        }
        RelatedTarget::User { id, username } => {
            entities
                .invalidate_user_related(*id, username.as_deref())
                .await?
        }
        RelatedTarget::Circle { id } => entities.invalidate_circle_related(*id).await?,
    }
    print_success(&format!("Invalidated {} keys", keys.len()));
    Ok(())
}
