mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crumble_core::{logging, service::MetadataManager, source::AddonRegistry, Config};

use commands::Context;

#[derive(Parser, Debug)]
#[command(name = "crumble")]
#[command(about = "Crumble media center addon aggregator", long_about = None)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, short, env = "CRUMBLE_CONFIG", default_value = "crumble.toml")]
    config: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage installed addons
    #[command(subcommand)]
    Addons(AddonsCommand),

    /// Browse a catalog
    Catalog {
        /// Content type (movie, series)
        content_type: String,
        /// Catalog id
        #[arg(long, default_value = "top")]
        id: String,
        /// Genre filter
        #[arg(long)]
        genre: Option<String>,
    },

    /// Genres offered by the installed addons for a content type
    Genres { content_type: String },

    /// Show metadata for one item
    Meta { content_type: String, id: String },

    /// List streams for an item
    Streams { content_type: String, id: String },

    /// List subtitle tracks for an item
    Subtitles {
        content_type: String,
        id: String,
        /// Episode id (replaces the item id)
        #[arg(long)]
        video_id: Option<String>,
        /// Download the first track and print the cue showing at this second
        #[arg(long)]
        at: Option<f64>,
    },

    /// Watch progress
    #[command(subcommand)]
    Progress(ProgressCommand),

    /// Print external player links for a stream URL
    Links {
        url: String,
        #[arg(long)]
        title: Option<String>,
        /// User agent used to pick recommended players
        #[arg(long, default_value = "")]
        user_agent: String,
    },

    /// Check an API key against the primary addon
    ValidateKey {
        /// Key to check (defaults to the configured one)
        key: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AddonsCommand {
    /// List installed addons
    List,
    /// Install an addon by manifest URL
    Install { manifest_url: String },
    /// Remove an addon by id
    Remove { id: String },
    /// Re-fetch manifests (all addons when no id is given)
    Refresh { ids: Vec<String> },
}

#[derive(Subcommand, Debug)]
pub enum ProgressCommand {
    /// List every entry
    List,
    /// Unfinished items, most recent first
    Continue {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Finished items
    Completed,
    /// Record a playback position
    Set {
        id: String,
        /// Seconds watched
        current_time: f64,
        /// Total seconds
        duration: f64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        content_type: Option<String>,
        #[arg(long)]
        video_id: Option<String>,
        #[arg(long)]
        season: Option<u32>,
        #[arg(long)]
        episode: Option<u32>,
    },
    /// Remove one entry
    Remove {
        id: String,
        /// Episode id the entry was recorded with
        #[arg(long)]
        video_id: Option<String>,
    },
    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load configuration
    let config = Config::load(Some(&args.config))?;

    // 1.5. Validate configuration (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;

    // 3. Load addons
    let registry = Arc::new(AddonRegistry::from_config(&config)?);
    let loaded = registry.load().await;
    info!(
        loaded,
        path = %registry.config_path().display(),
        "Addon registry ready"
    );

    // 4. Metadata aggregation
    let manager = MetadataManager::from_config(&config, registry.sources())?;
    let shutdown = CancellationToken::new();
    let sweeper = manager.start_sweeper(config.cache.sweep_interval(), shutdown.clone());

    let ctx = Context {
        config,
        registry,
        manager,
        json: args.json,
    };
    let result = commands::run(&ctx, args.command).await;

    // 5. Stop background tasks
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Cache sweeper task failed: {e}");
    }
    result
}
