use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use tracing::debug;

use agora_core::auth::CredentialStore;
use agora_core::models::{Event, UserProfile};
use agora_core::{
    BlobCache, CacheStore, Config, ConnectivityObserver, HttpPollMonitor, ManualMonitor,
    NetworkMonitor, Repository, RestRemote, TagNavigator,
};

/// Environment overrides for the backend location and key
const BACKEND_URL_ENV: &str = "AGORA_BACKEND_URL";
const API_KEY_ENV: &str = "AGORA_API_KEY";

fn backend_url(config: &Config) -> Result<String> {
    std::env::var(BACKEND_URL_ENV)
        .ok()
        .or_else(|| config.backend_url.clone())
        .ok_or_else(|| anyhow!("No backend configured. Set {} or backend_url in config.json", BACKEND_URL_ENV))
}

fn api_key(backend_url: &str) -> Result<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        return Ok(key);
    }
    CredentialStore::api_key(backend_url)?
        .ok_or_else(|| anyhow!("No API key. Set {} or run `agora set-key <key>`", API_KEY_ENV))
}

/// The `<user>` argument at `index`, falling back to the last user seen.
/// An explicit user becomes the new default.
fn user_arg(config: &Config, args: &[String], index: usize) -> Result<String> {
    match args.get(index) {
        Some(user_id) => {
            if config.last_user_id.as_deref() != Some(user_id.as_str()) {
                let mut updated = config.clone();
                updated.last_user_id = Some(user_id.clone());
                updated.save()?;
            }
            Ok(user_id.clone())
        }
        None => config
            .last_user_id
            .clone()
            .ok_or_else(|| anyhow!("Missing argument: <user> (no previous user to default to)")),
    }
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("Missing argument: <{}>", name))
}

async fn build_repository(config: &Config, cache_dir: &Path) -> Result<Arc<Repository>> {
    let url = backend_url(config)?;
    let remote = RestRemote::new(&url, &api_key(&url)?)?;

    let monitor: Arc<dyn NetworkMonitor> = if config.offline_mode {
        debug!("Offline mode - skipping reachability check");
        Arc::new(ManualMonitor::new(false))
    } else {
        HttpPollMonitor::start(&url, config.poll_interval()).await?
    };

    let cache = CacheStore::new(cache_dir.join("data"))?;
    Ok(Arc::new(Repository::new(
        Arc::new(remote),
        Arc::new(cache),
        Arc::new(ConnectivityObserver::new(monitor)),
        config.sync_settings(),
    )))
}

pub async fn run(config: &Config, cache_dir: &Path, args: &[String]) -> Result<()> {
    match args[0].as_str() {
        "set-key" => {
            let url = backend_url(config)?;
            CredentialStore::store_api_key(&url, arg(args, 1, "key")?)?;
            println!("API key stored for {}", url);
            Ok(())
        }
        "forget-key" => {
            let url = backend_url(config)?;
            CredentialStore::delete(&url)?;
            println!("API key removed for {}", url);
            Ok(())
        }
        "blob" => blob(&config.blob_dir()?, &args[1..]).await,
        _ => {
            let repo = build_repository(config, cache_dir).await?;
            let result = dispatch(&repo, config, args).await;
            repo.settle().await;
            repo.connectivity().shutdown();
            result
        }
    }
}

async fn dispatch(repo: &Arc<Repository>, config: &Config, args: &[String]) -> Result<()> {
    match args[0].as_str() {
        "event" => {
            let event = repo.get_event(arg(args, 1, "id")?).await?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        "events" => {
            let show_past = match &config.last_user_id {
                Some(user_id) => repo.get_preferences(user_id).await.show_past_events,
                None => true,
            };
            let now = Utc::now();
            let mut events = repo.get_all_events().await?;
            events.retain(|e| show_past || !e.is_past(now));
            events.sort_by_key(|e| e.start_date);
            for event in &events {
                print_event_line(event);
            }
        }
        "join" => {
            let event_id = arg(args, 1, "event")?;
            let event = repo.join_event(&user_arg(config, args, 2)?, event_id).await?;
            println!("Joined {} ({} spots left)", event.title, event.spots_left());
        }
        "leave" => {
            let event_id = arg(args, 1, "event")?;
            let event = repo.leave_event(&user_arg(config, args, 2)?, event_id).await?;
            println!("Left {} ({} spots left)", event.title, event.spots_left());
        }
        "joined" => {
            for event in &repo.get_joined_events(&user_arg(config, args, 1)?).await? {
                print_event_line(event);
            }
        }
        "tags" => print_tag_tree(repo).await?,
        "prefetch" => {
            let user_id = user_arg(config, args, 1)?;
            repo.prefetch_for_offline(&user_id).await?;
            let user: UserProfile = repo.get_user(&user_id).await?;
            println!("Cached data for offline use by {}", user.name);
        }
        "sweep" => {
            let report = repo.sweep(Utc::now()).await;
            println!(
                "Replayed {} pending writes, evicted {} rows (events {}, associations {}, tags {}, users {}, views {})",
                report.replayed,
                report.total_removed(),
                report.events,
                report.associations,
                report.tags,
                report.users,
                report.views
            );
        }
        "status" => {
            let ages = repo.cache().cache_ages().await;
            println!("Online: {}", repo.is_online());
            println!("Events cached: {}", ages.events_age());
            println!("Last updated: {}", ages.last_updated());
            let stale = repo.cache().any_stale(repo.settings().stale_window).await;
            println!("Stale: {}", stale);
        }
        other => bail!("Unknown command: {}", other),
    }
    Ok(())
}

fn print_event_line(event: &Event) {
    println!(
        "{:<12} {:<40} {:<28} {}/{}",
        event.id,
        event.title,
        event.formatted_date(),
        event.participant_count,
        event.max_participants
    );
}

/// Depth-first walk of the tag tree, bounded by the navigator's max depth.
async fn print_tag_tree(repo: &Arc<Repository>) -> Result<()> {
    let navigator = TagNavigator::new(repo.clone());
    let mut stack = vec![navigator.start().await?];

    while let Some(state) = stack.pop() {
        if state.can_ascend() {
            println!("{}", state.breadcrumb());
        } else {
            println!("{}", state.current());
        }
        if state.can_descend() {
            for tag in state.displayed().iter().rev() {
                stack.push(navigator.descend(&state, tag).await?);
            }
        } else {
            for tag in state.displayed() {
                println!("{} > {}", state.breadcrumb(), tag);
            }
        }
    }
    Ok(())
}

async fn blob(blob_dir: &Path, args: &[String]) -> Result<()> {
    let cache = BlobCache::new(blob_dir.to_path_buf())?;
    match args.first().map(String::as_str) {
        Some("put") => {
            let name = arg(args, 1, "name")?;
            let path = arg(args, 2, "file")?;
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path))?;
            cache.set(name, &bytes).await?;
            println!("Stored {} ({} bytes)", name, bytes.len());
        }
        Some("get") => {
            let name = arg(args, 1, "name")?;
            let path = arg(args, 2, "file")?;
            let bytes = cache
                .get(name)
                .await?
                .ok_or_else(|| anyhow!("No blob named {}", name))?;
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path))?;
            println!("Wrote {} ({} bytes)", path, bytes.len());
        }
        Some("rm") => {
            let name = arg(args, 1, "name")?;
            cache.delete(name).await?;
            println!("Deleted {}", name);
        }
        _ => bail!("Usage: agora blob put|get|rm <name> [file]"),
    }
    Ok(())
}
