use clap::Parser;
use mosaic_core::models::SyncStatus;
use mosaic_core::{Collection, Item, NewItem};
use pretty_assertions::assert_eq;

use crate::cli::{Cli, CollectionCommands, Commands, SyncCommands};
use crate::commands::common::{
    format_collection_lines, format_item_lines, format_relative_time, format_sync_timestamp,
    item_preview, item_to_list_item, match_collection, normalize_content, normalize_identifier,
    resolve_db_path,
};
use crate::commands::sync::{format_sync_status_lines, ParkedEntryItem, SyncStatusReport};
use crate::error::CliError;

fn item(content: &str) -> Item {
    Item::create("guest", NewItem::from_content(content)).unwrap()
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_identifier_rejects_blank() {
    assert_eq!(normalize_identifier(" 0190abcd ").unwrap(), "0190abcd");
    assert!(matches!(normalize_identifier("   "), Err(CliError::EmptyId)));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn format_sync_timestamp_renders_utc() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn item_preview_collapses_and_truncates() {
    let short = item("hello   there\nsecond line");
    assert_eq!(item_preview(&short, 40), "hello there");

    let long = item(&"a".repeat(60));
    let preview = item_preview(&long, 10);
    assert_eq!(preview, "aaaaaaa...");
}

#[test]
fn url_items_preview_their_link() {
    let link = item("https://www.example.com/article");
    assert_eq!(item_preview(&link, 80), "https://www.example.com/article");

    let json = item_to_list_item(&link);
    assert_eq!(json.source_domain.as_deref(), Some("example.com"));
    assert_eq!(json.text, None);
    assert_eq!(json.sync_status, "pending");
}

#[test]
fn item_lines_flag_unsynced_items() {
    let mut synced = item("synced");
    synced.sync_status = SyncStatus::Synced;
    let mut failed = item("failed");
    failed.sync_status = SyncStatus::Failed;
    failed.last_error = Some("rejected".into());

    let lines = format_item_lines(&[synced, failed]);
    assert!(!lines[0].contains("pending"));
    assert!(lines[1].ends_with("(sync failed: rejected)"));
}

#[test]
fn match_collection_by_id_prefix_or_name() {
    let reading = Collection::create("guest", "Reading").unwrap();
    let recipes = Collection::create("guest", "Recipes").unwrap();
    let collections = vec![reading.clone(), recipes.clone()];

    let full_id = reading.id.to_string();
    assert_eq!(match_collection(&full_id, &collections).unwrap().id, reading.id);
    assert_eq!(match_collection("recipes", &collections).unwrap().id, recipes.id);
    assert!(matches!(
        match_collection("Nope", &collections),
        Err(CliError::CollectionNotFound(_))
    ));
}

#[test]
fn match_collection_reports_duplicate_names() {
    let collections = vec![
        Collection::create("guest", "Reading").unwrap(),
        Collection::create("guest", "reading").unwrap(),
    ];
    assert!(matches!(
        match_collection("Reading", &collections),
        Err(CliError::AmbiguousCollection(_))
    ));
}

#[test]
fn collection_lines_mark_selection_and_default() {
    let inbox = Collection::default_for("guest");
    let reading = Collection::create("guest", "Reading").unwrap();
    let lines = format_collection_lines(&[inbox, reading.clone()], Some(&reading));

    assert!(lines[0].ends_with("[default]"));
    assert!(lines[1].ends_with("[selected]"));
}

#[test]
fn sync_status_lines_list_parked_entries() {
    let report = SyncStatusReport {
        pending: 2,
        parked: 1,
        next_attempt_at: None,
        parked_entries: vec![ParkedEntryItem {
            sequence: 7,
            operation: "create".into(),
            entity_type: "item".into(),
            target_id: "abc".into(),
            attempts: 5,
            last_error: Some("timed out".into()),
        }],
    };

    let lines = format_sync_status_lines(&report);
    assert_eq!(lines[0], "2 pending, 1 failed");
    assert!(lines[1].contains("attempts=5"));
    assert!(lines[1].ends_with("timed out"));
}

#[test]
fn explicit_db_path_wins() {
    let path = resolve_db_path(Some("/tmp/mosaic-test.db".into()));
    assert_eq!(path, std::path::PathBuf::from("/tmp/mosaic-test.db"));
}

#[test]
fn parses_quick_capture() {
    let cli = Cli::try_parse_from(["mosaic", "https://example.com"]).unwrap();
    assert!(cli.command.is_none());
    assert_eq!(cli.content, vec!["https://example.com".to_string()]);
}

#[test]
fn parses_add_with_options() {
    let cli = Cli::try_parse_from([
        "mosaic",
        "add",
        "some",
        "text",
        "--note",
        "remember",
        "-c",
        "Reading",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Add {
            content,
            note,
            collection,
            image,
        }) => {
            assert_eq!(content, vec!["some".to_string(), "text".to_string()]);
            assert_eq!(note.as_deref(), Some("remember"));
            assert_eq!(collection.as_deref(), Some("Reading"));
            assert_eq!(image, None);
        }
        _ => panic!("expected add"),
    }
}

#[test]
fn parses_collection_and_sync_subcommands() {
    let cli = Cli::try_parse_from(["mosaic", "collection", "select"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Collection {
            command: CollectionCommands::Select { id: None }
        })
    ));

    let cli = Cli::try_parse_from(["mosaic", "sync", "status", "--json"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            pull: false,
            command: Some(SyncCommands::Status { json: true })
        })
    ));

    let cli = Cli::try_parse_from(["mosaic", "sync", "--pull"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            pull: true,
            command: None
        })
    ));
}
