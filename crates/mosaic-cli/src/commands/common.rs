use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use mosaic_core::models::SyncStatus;
use mosaic_core::sync::{Reconciler, SupabaseRemoteStore};
use mosaic_core::{Collection, Item, ItemId, LibraryService, ReconcilerConfig, RemoteConfig};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ItemListItem {
    pub id: String,
    pub preview: String,
    pub text: Option<String>,
    pub source_url: Option<String>,
    pub source_domain: Option<String>,
    pub image_url: Option<String>,
    pub note: Option<String>,
    pub collection_id: Option<String>,
    pub sync_status: String,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionListItem {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub selected: bool,
    pub sync_status: String,
    pub created_at: i64,
}

pub fn item_to_list_item(item: &Item) -> ItemListItem {
    let now_ms = Utc::now().timestamp_millis();
    ItemListItem {
        id: item.id.to_string(),
        preview: item_preview(item, 80),
        text: item.text.clone(),
        source_url: item.source_url.clone(),
        source_domain: item.source_domain.clone(),
        image_url: item.image_url.clone(),
        note: item.note.clone(),
        collection_id: item.collection_id.map(|id| id.to_string()),
        sync_status: item.sync_status.as_str().to_string(),
        last_error: item.last_error.clone(),
        created_at: item.created_at,
        updated_at: item.updated_at,
        relative_time: format_relative_time(item.updated_at, now_ms),
    }
}

pub fn collection_to_list_item(collection: &Collection, selected: bool) -> CollectionListItem {
    CollectionListItem {
        id: collection.id.to_string(),
        name: collection.name.clone(),
        is_default: collection.is_default,
        selected,
        sync_status: collection.sync_status.as_str().to_string(),
        created_at: collection.created_at,
    }
}

pub fn format_item_lines(items: &[Item]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    items
        .iter()
        .map(|item| {
            let short_id = short_id(&item.id.to_string());
            let preview = item_preview(item, 40);
            let relative_time = format_relative_time(item.updated_at, now_ms);
            let marker = sync_marker(item);

            if marker.is_empty() {
                format!("{short_id:<13}  {preview:<40}  {relative_time}")
            } else {
                format!("{short_id:<13}  {preview:<40}  {relative_time:<10}  {marker}")
            }
        })
        .collect()
}

pub fn format_collection_lines(collections: &[Collection], selected: Option<&Collection>) -> Vec<String> {
    collections
        .iter()
        .map(|collection| {
            let short_id = short_id(&collection.id.to_string());
            let is_selected = selected.is_some_and(|active| active.id == collection.id);
            let mut flags = Vec::new();
            if is_selected {
                flags.push("selected");
            }
            if collection.is_default {
                flags.push("default");
            }
            if flags.is_empty() {
                format!("{short_id:<13}  {}", collection.name)
            } else {
                format!("{short_id:<13}  {:<30}  [{}]", collection.name, flags.join(", "))
            }
        })
        .collect()
}

fn sync_marker(item: &Item) -> String {
    match item.sync_status {
        SyncStatus::Synced => String::new(),
        SyncStatus::Pending | SyncStatus::PendingRetry => "(pending)".to_string(),
        SyncStatus::Failed => item.last_error.as_deref().map_or_else(
            || "(sync failed)".to_string(),
            |error| format!("(sync failed: {error})"),
        ),
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn item_preview(item: &Item, max_chars: usize) -> String {
    let first_line = item.preview(usize::MAX);
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Content from the arguments, falling back to piped stdin.
pub fn resolve_item_content(content_parts: &[String]) -> Result<Option<String>, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(Some(content));
    }
    read_piped_stdin()
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn resolve_item_id(query: &str, library: &LibraryService) -> Result<ItemId, CliError> {
    let query = normalize_identifier(query)?;
    Ok(library.resolve_item_id(&query)?)
}

pub fn resolve_collection(query: &str, library: &LibraryService) -> Result<Collection, CliError> {
    let query = normalize_identifier(query)?;
    let collections = library.list_collections()?;
    match_collection(&query, &collections).cloned()
}

/// Pick the collection named by a full id, a unique id prefix, or an exact
/// (case-insensitive) name.
pub fn match_collection<'a>(
    query: &str,
    collections: &'a [Collection],
) -> Result<&'a Collection, CliError> {
    if let Some(exact) = collections
        .iter()
        .find(|collection| collection.id.to_string() == query)
    {
        return Ok(exact);
    }

    let by_prefix = collections
        .iter()
        .filter(|collection| collection.id.to_string().starts_with(query))
        .collect::<Vec<_>>();
    let matches = if by_prefix.is_empty() {
        collections
            .iter()
            .filter(|collection| collection.name.eq_ignore_ascii_case(query))
            .collect::<Vec<_>>()
    } else {
        by_prefix
    };

    match matches.as_slice() {
        [] => Err(CliError::CollectionNotFound(query.to_string())),
        [collection] => Ok(collection),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|collection| format!("{} ({})", short_id(&collection.id.to_string()), collection.name))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousCollection(format!(
                "Collection '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("MOSAIC_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mosaic")
        .join("mosaic.db")
}

pub fn open_library(path: &Path) -> Result<LibraryService, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(LibraryService::open_path(path)?)
}

/// Reconciler wired to the remote store named by the environment.
pub fn open_reconciler(library: &LibraryService) -> Result<Reconciler, CliError> {
    let Some(remote_config) = RemoteConfig::from_env()? else {
        return Err(CliError::SyncNotConfigured);
    };
    let config = ReconcilerConfig::from_env()?;
    let remote = SupabaseRemoteStore::new(remote_config)?;

    tracing::info!("Remote sync enabled");
    Ok(Reconciler::new(
        library.database().clone(),
        Arc::new(remote),
        config,
    ))
}
