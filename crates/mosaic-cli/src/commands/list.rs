use std::path::Path;

use mosaic_core::db::ItemFilter;

use crate::commands::common::{
    format_item_lines, item_to_list_item, open_library, resolve_collection, ItemListItem,
};
use crate::error::CliError;

pub fn run_list(
    collection: Option<&str>,
    unfiled: bool,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let library = open_library(db_path)?;
    let filter = match (collection, unfiled) {
        (Some(_), true) => return Err(CliError::ConflictingFilter),
        (Some(query), false) => ItemFilter::Collection(resolve_collection(query, &library)?.id),
        (None, true) => ItemFilter::Unfiled,
        (None, false) => ItemFilter::All,
    };

    let mut items = library.list_items(filter)?;
    items.truncate(limit);

    if as_json {
        let json_items = items
            .iter()
            .map(item_to_list_item)
            .collect::<Vec<ItemListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_item_lines(&items) {
            println!("{line}");
        }
    }

    Ok(())
}
