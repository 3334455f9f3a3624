use std::path::Path;

use mosaic_core::models::ItemUpdate;

use crate::commands::common::{normalize_content, open_library, resolve_collection, resolve_item_id};
use crate::error::CliError;

pub fn run_move(id: &str, collection: Option<&str>, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path)?;
    let item_id = resolve_item_id(id, &library)?;
    let collection_id = collection
        .map(|query| resolve_collection(query, &library))
        .transpose()?
        .map(|collection| collection.id);

    let item = library.update_item(
        &item_id,
        ItemUpdate {
            collection_id: Some(collection_id),
            ..ItemUpdate::default()
        },
    )?;

    println!("{}", item.id);
    Ok(())
}

pub fn run_note(id: &str, text_parts: &[String], db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path)?;
    let item_id = resolve_item_id(id, &library)?;

    let item = library.update_item(
        &item_id,
        ItemUpdate {
            note: Some(normalize_content(&text_parts.join(" "))),
            ..ItemUpdate::default()
        },
    )?;

    println!("{}", item.id);
    Ok(())
}
