//! Records a cat's most recent hairballs in a file-backed store.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use recent_rs::{
    Attachment, FileRecordStore, RecentConfig, RecentOptions, RecentPolicy, Record, RecordKey,
    Revision, StoredList, StructFieldAccessor,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Command-line options for the hairballs demo.
#[derive(Parser)]
#[command(name = "hairballs", version)]
struct Cli {
    /// Directory holding one JSON file per cat
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Optional recent.json5 config with a `hairball` attachment
    #[arg(long)]
    config: Option<PathBuf>,
    /// Key of the cat to update
    #[arg(long, default_value = "fang")]
    cat: String,
    /// Display name used when the cat is created
    #[arg(long, default_value = "Fang")]
    name: String,
    /// Hairballs to record, oldest first
    #[arg(default_values = ["eveningHairball", "morningHairball"])]
    hairballs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Cat {
    key: RecordKey,
    #[serde(default)]
    revision: Revision,
    name: String,
    #[serde(default)]
    recent_hairballs: StoredList,
}

impl Record for Cat {
    fn key(&self) -> &RecordKey {
        &self.key
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

fn hairball_options(config: Option<&PathBuf>) -> Result<RecentOptions> {
    let Some(path) = config else {
        return Ok(RecentOptions::new().name("hairball"));
    };
    let config = RecentConfig::load_from_path(path).context("failed to load config")?;
    config
        .attachment_options("hairball")
        .with_context(|| format!("{} has no hairball attachment", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("recent-rs-hairballs"));
    info!(
        "starting hairballs demo (data_dir={}, config_set={}, hairballs={})",
        data_dir.display(),
        cli.config.is_some(),
        cli.hairballs.len()
    );

    let options = hairball_options(cli.config.as_ref())?;
    let policy = RecentPolicy::<String>::resolve(&options).context("invalid hairball options")?;
    let accessor = StructFieldAccessor::from_policy(
        &policy,
        |cat: &Cat| &cat.recent_hairballs,
        |cat: &mut Cat| &mut cat.recent_hairballs,
    );
    let hairballs = Attachment::new(policy, accessor);
    let store = FileRecordStore::<Cat>::new(&data_dir).context("failed to open store")?;

    let key = RecordKey::new(cli.cat.clone());
    let mut kitty = match recent_rs::core::AsyncRecordStore::find_by_key(&store, &key).await? {
        Some(cat) => cat,
        None => {
            debug!("creating cat (key={key})");
            Cat {
                key: key.clone(),
                revision: 0,
                name: cli.name.clone(),
                recent_hairballs: StoredList::new(),
            }
        }
    };

    for hairball in cli.hairballs {
        kitty = hairballs
            .record_recent_async(&store, kitty, hairball)
            .await
            .context("failed to record hairball")?;
        let list = hairballs.list(&kitty).context("failed to read hairballs")?;
        if let Some(newest) = list.newest() {
            println!(
                "{}: {} at {}",
                kitty.name,
                newest.value,
                newest.timestamp.to_rfc3339()
            );
        }
    }

    let policy = hairballs.policy();
    println!(
        "{} keeps {} {} (revision {}):",
        kitty.name,
        policy.capacity(),
        policy.label(),
        kitty.revision
    );
    for entry in &hairballs.list(&kitty).context("failed to read hairballs")? {
        println!("  {} {}", entry.timestamp.to_rfc3339(), entry.value);
    }
    Ok(())
}
