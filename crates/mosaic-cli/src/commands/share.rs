use std::path::Path;

use mosaic_core::ShareInput;

use crate::commands::common::{normalize_content, open_library};
use crate::error::CliError;

pub fn run_share(
    url: Option<&str>,
    text: Option<&str>,
    image: Option<&str>,
    note: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let input = ShareInput {
        url: url.and_then(normalize_content),
        text: text.and_then(normalize_content),
        image_url: image.and_then(normalize_content),
    };
    if input.url.is_none() && input.text.is_none() && input.image_url.is_none() {
        return Err(CliError::EmptyContent);
    }

    let library = open_library(db_path)?;
    let item = library.save_shared(input, note.and_then(normalize_content))?;

    if let Some(collection_id) = item.collection_id {
        let collection = library.get_collection(&collection_id)?;
        println!("{}  -> {}", item.id, collection.name);
    } else {
        println!("{}", item.id);
    }
    Ok(())
}
