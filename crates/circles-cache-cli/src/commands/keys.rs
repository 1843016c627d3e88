use circles_cache::keys;
use circles_cache::{CacheConfig, EntityKind};
use serde_json::json;

use crate::cli::{KeyArgs, OutputFormat};
use crate::output::{print_table, print_value};

pub fn key(args: &KeyArgs) {
    let key = match &args.sub {
        Some(sub) => keys::composite(args.kind, sub, &args.id),
        None => keys::entity(args.kind, &args.id),
    };
    println!("{key}");
}

pub fn kinds(config: &CacheConfig, format: OutputFormat) {
    match format {
        OutputFormat::Table => print_table(
            ["Kind", "Prefix", "TTL (s)"],
            EntityKind::ALL.iter().map(|kind| {
                [
                    format!("{kind:?}"),
                    kind.prefix().to_string(),
                    config.ttl.for_kind(*kind).as_secs().to_string(),
                ]
            }),
        ),
        OutputFormat::Json => {
            let kinds: serde_json::Map<String, serde_json::Value> = EntityKind::ALL
                .iter()
                .map(|kind| {
                    (
                        kind.prefix().to_string(),
                        json!(config.ttl.for_kind(*kind).as_secs()),
                    )
                })
                .collect();
            print_value(&serde_json::Value::Object(kinds), format);
        }
    }
}
