use std::path::Path;

use mosaic_core::NewItem;

use crate::commands::common::{normalize_content, open_library, resolve_collection, resolve_item_content};
use crate::error::CliError;

pub fn run_add(
    content_parts: &[String],
    image: Option<&str>,
    note: Option<&str>,
    collection: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let content = resolve_item_content(content_parts)?;
    let image = image.and_then(normalize_content);
    if content.is_none() && image.is_none() {
        return Err(CliError::EmptyContent);
    }

    let library = open_library(db_path)?;
    let collection_id = collection
        .map(|query| resolve_collection(query, &library))
        .transpose()?
        .map(|collection| collection.id);

    let draft = NewItem {
        content,
        image_url: image,
        note: note.and_then(normalize_content),
        collection_id,
    };
    let item = library.create_item(draft)?;

    println!("{}", item.id);
    Ok(())
}
