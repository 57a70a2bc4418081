// Command handlers

use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use serde::Serialize;

use crumble_addons::{AddonClient, ContentType, MetaItem};
use crumble_core::deep_links::{detect_platform, player_links, recommended_players};
use crumble_core::progress::{progress_key, ProgressStore, ProgressUpdate, WatchProgress};
use crumble_core::service::MetadataManager;
use crumble_core::source::AddonRegistry;
use crumble_core::{subtitles, Config};

use crate::{AddonsCommand, Command, ProgressCommand};

pub struct Context {
    pub config: Config,
    pub registry: Arc<AddonRegistry>,
    pub manager: MetadataManager,
    pub json: bool,
}

impl Context {
    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn warn_if_unauthorized(&self) {
        if self.manager.auth_required() {
            eprintln!("The primary addon rejected the API key. Set tmdb.api_key (CRUMBLE_TMDB__API_KEY).");
        }
    }
}

pub async fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Addons(cmd) => addons(ctx, cmd).await,
        Command::Catalog {
            content_type,
            id,
            genre,
        } => {
            let items = ctx
                .manager
                .get_catalog(&content_type, &id, genre.as_deref())
                .await;
            ctx.warn_if_unauthorized();
            if ctx.json {
                return ctx.print_json(&items);
            }
            for item in &items {
                print_meta_line(item);
            }
            Ok(())
        }
        Command::Genres { content_type } => {
            let mut genres: Vec<String> = Vec::new();
            for source in ctx.registry.sources() {
                for genre in source.manifest().genres(&content_type) {
                    if !genres.contains(&genre) {
                        genres.push(genre);
                    }
                }
            }
            if ctx.json {
                return ctx.print_json(&genres);
            }
            for genre in &genres {
                println!("{genre}");
            }
            Ok(())
        }
        Command::Meta { content_type, id } => {
            let meta = ctx
                .manager
                .get_meta(&content_type, &id)
                .await
                .ok_or_else(|| anyhow!("No metadata found for {content_type} {id}"))?;
            ctx.warn_if_unauthorized();
            if ctx.json {
                return ctx.print_json(&meta);
            }
            print_meta_details(&meta);
            Ok(())
        }
        Command::Streams { content_type, id } => {
            let streams = ctx.manager.get_streams(&content_type, &id).await;
            if ctx.json {
                return ctx.print_json(&streams);
            }
            for stream in &streams {
                let quality = stream.detected_quality().unwrap_or_default();
                let url = stream.playable_url().unwrap_or_default();
                println!("{:<40} {:>6}  {url}", stream.label(), quality);
            }
            Ok(())
        }
        Command::Subtitles {
            content_type,
            id,
            video_id,
            at,
        } => {
            let tracks = ctx
                .manager
                .get_subtitles(&content_type, &id, video_id.as_deref())
                .await;
            let Some(time) = at else {
                if ctx.json {
                    return ctx.print_json(&tracks);
                }
                for track in &tracks {
                    println!("{:<6} {}", track.lang, track.url);
                }
                return Ok(());
            };

            let track = tracks
                .first()
                .ok_or_else(|| anyhow!("No subtitles found for {content_type} {id}"))?;
            let content = ctx.manager.load_subtitle_content(track).await?;
            let cues = subtitles::parse(&content);
            let text = subtitles::cue_at(&cues, time).unwrap_or("");
            if ctx.json {
                return ctx.print_json(&serde_json::json!({
                    "lang": track.lang,
                    "cues": cues.len(),
                    "time": subtitles::format_time(time),
                    "text": text,
                }));
            }
            println!("[{}] {}", subtitles::format_time(time), text);
            Ok(())
        }
        Command::Progress(cmd) => progress(ctx, cmd).await,
        Command::Links {
            url,
            title,
            user_agent,
        } => {
            let links = player_links(&url, title.as_deref());
            let platform = detect_platform(&user_agent);
            let players = recommended_players(platform);
            if ctx.json {
                return ctx.print_json(&serde_json::json!({
                    "links": links,
                    "platform": platform,
                    "recommended": players,
                }));
            }
            for link in &links {
                println!("{:<10} {}", link.name, link.scheme);
                println!("{:<10} {}", "", link.fallback);
            }
            println!();
            println!("Recommended players ({platform}):");
            for player in players {
                println!("  {:<14} {}", player.name, player.url);
            }
            Ok(())
        }
        Command::ValidateKey { key } => validate_key(ctx, key).await,
    }
}

async fn addons(ctx: &Context, command: AddonsCommand) -> Result<()> {
    match command {
        AddonsCommand::List => {
            let sources = ctx.registry.sources();
            if ctx.json {
                let manifests: Vec<_> = sources.iter().map(|s| s.manifest()).collect();
                return ctx.print_json(&manifests);
            }
            let primary = ctx.registry.primary();
            for source in &sources {
                let marker = match &primary {
                    Some(p) if Arc::ptr_eq(p, source) => "*",
                    _ => " ",
                };
                println!(
                    "{marker} {:<32} {:<28} {}",
                    source.id(),
                    source.name(),
                    source.manifest().types.join(",")
                );
            }
            let configured = ctx.registry.entries().len();
            if configured > sources.len() {
                eprintln!("{} configured addon(s) failed to load", configured - sources.len());
            }
            Ok(())
        }
        AddonsCommand::Install { manifest_url } => {
            let source = ctx.registry.install(&manifest_url).await?;
            ctx.manager.update_sources(ctx.registry.sources());
            ctx.manager.invalidate_catalogs();
            println!("Installed {} ({})", source.name(), source.id());
            Ok(())
        }
        AddonsCommand::Remove { id } => {
            if !ctx.registry.remove(&id).await? {
                return Err(anyhow!("Addon not installed: {id}"));
            }
            ctx.manager.update_sources(ctx.registry.sources());
            ctx.manager.clear_cache();
            println!("Removed {id}");
            Ok(())
        }
        AddonsCommand::Refresh { ids } => {
            let ids = (!ids.is_empty()).then_some(ids);
            let refreshed = ctx.registry.refresh(ids.as_deref()).await;
            ctx.manager.update_sources(ctx.registry.sources());
            ctx.manager.clear_cache();
            println!("Refreshed {refreshed} addon(s)");
            Ok(())
        }
    }
}

async fn progress(ctx: &Context, command: ProgressCommand) -> Result<()> {
    let store = ProgressStore::from_config(&ctx.config.progress).await;
    match command {
        ProgressCommand::List => print_progress(ctx, &store.list()),
        ProgressCommand::Continue { limit } => print_progress(ctx, &store.continue_watching(limit)),
        ProgressCommand::Completed => print_progress(ctx, &store.completed()),
        ProgressCommand::Set {
            id,
            current_time,
            duration,
            title,
            content_type,
            video_id,
            season,
            episode,
        } => {
            let mut update = ProgressUpdate::new(id).position(current_time, duration);
            update.title = title;
            update.content_type = content_type.as_deref().map(ContentType::parse);
            update.video_id = video_id;
            update.season = season;
            update.episode = episode;
            let entry = store
                .update(update)
                .await
                .with_context(|| format!("Failed to save {}", store.path().display()))?;
            print_progress(ctx, std::slice::from_ref(&entry))
        }
        ProgressCommand::Remove { id, video_id } => {
            let key = progress_key(&id, video_id.as_deref());
            if !store.remove(&key).await? {
                return Err(anyhow!("No progress recorded for {key}"));
            }
            Ok(())
        }
        ProgressCommand::Clear => Ok(store.clear().await?),
    }
}

async fn validate_key(ctx: &Context, key: Option<String>) -> Result<()> {
    let key = key
        .or_else(|| ctx.config.tmdb_api_key().map(str::to_string))
        .ok_or_else(|| anyhow!("No API key given and tmdb.api_key is not set"))?;
    let primary = ctx
        .registry
        .primary()
        .ok_or_else(|| anyhow!("No primary addon installed (id containing '{}')", ctx.registry.primary_prefix()))?;
    let manifest_url = primary
        .manifest()
        .manifest_url
        .clone()
        .ok_or_else(|| anyhow!("Primary addon has no manifest URL"))?;

    let http = crumble_addons::build_http_client(ctx.config.request_timeout())?;
    let client = AddonClient::with_http_client(&manifest_url, http)?;
    let valid = client.validate_api_key(&key).await?;
    if ctx.json {
        return ctx.print_json(&serde_json::json!({ "valid": valid }));
    }
    if valid {
        println!("API key is valid");
        Ok(())
    } else {
        Err(anyhow!("API key was rejected by {}", primary.name()))
    }
}

fn print_meta_line(item: &MetaItem) {
    let year = item.year.map(|y| y.to_string()).unwrap_or_default();
    let rating = item.imdb_rating.map(|r| format!("{r:.1}")).unwrap_or_default();
    println!("{:<16} {:<40} {:>4} {:>4}", item.id, item.name, year, rating);
}

fn print_meta_details(meta: &MetaItem) {
    let content_type = meta.content_type.unwrap_or_default();
    println!("{} ({content_type}, {})", meta.name, meta.id);
    if !meta.release_info.is_empty() {
        println!("Released: {}", meta.release_info);
    }
    if let Some(rating) = meta.imdb_rating {
        println!("IMDb:     {rating:.1}");
    }
    if !meta.genres.is_empty() {
        println!("Genres:   {}", meta.genres.join(", "));
    }
    if !meta.director.is_empty() {
        println!("Director: {}", meta.director.join(", "));
    }
    if !meta.cast.is_empty() {
        println!("Cast:     {}", meta.cast.join(", "));
    }
    if !meta.description.is_empty() {
        println!();
        println!("{}", meta.description);
    }
    for video in meta.videos.iter().flatten() {
        let episode = match (video.season, video.episode) {
            (Some(s), Some(e)) => format!("S{s:02}E{e:02}"),
            _ => String::new(),
        };
        println!("  {episode:<7} {:<24} {}", video.id, video.title);
    }
}

fn print_progress(ctx: &Context, entries: &[WatchProgress]) -> Result<()> {
    if ctx.json {
        return ctx.print_json(entries);
    }
    for entry in entries {
        let done = if entry.completed { "done" } else { "" };
        println!(
            "{:<24} {:<32} {:>9} / {:<9} {:>5.1}% {done}",
            entry.id,
            entry.title,
            subtitles::format_time(entry.current_time),
            subtitles::format_time(entry.duration),
            entry.fraction() * 100.0
        );
    }
    Ok(())
}
