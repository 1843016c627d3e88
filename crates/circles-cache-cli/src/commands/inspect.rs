use anyhow::Result;
use circles_cache::{CacheStore, KeyTtl};
use colored::Colorize;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::output::{print_table, print_value};

pub async fn inspect(store: &CacheStore, key: &str, format: OutputFormat) -> Result<()> {
    let ttl = store.ttl(key).await?;
    if !ttl.exists() {
        println!("{} {} not found", "✗".red(), key.cyan());
        return Ok(());
    }

    // Values are JSON on the wire; anything else was written by another client.
    let value = match store.get_optional::<Value>(key).await {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(e) => json!({ "undecodable": e.to_string() }),
    };

    match format {
        OutputFormat::Json => {
            let report = json!({
                "key": key,
                "ttl_secs": ttl.remaining().map(|d| d.as_secs()),
                "persistent": ttl == KeyTtl::Persistent,
                "value": value,
            });
            print_value(&report, format);
        }
        OutputFormat::Table => {
            print_table(
                ["Key", "TTL"],
                [[key.to_string(), describe_ttl(ttl)]],
            );
            print_value(&value, format);
        }
    }
    Ok(())
}

fn describe_ttl(ttl: KeyTtl) -> String {
    match ttl {
        KeyTtl::Missing => "missing".to_string(),
        KeyTtl::Persistent => "no expiry".to_string(),
        KeyTtl::Expires(d) => format!("{}s", d.as_secs()),
    }
}
