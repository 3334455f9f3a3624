use std::path::Path;

use crate::commands::common::{open_library, resolve_item_id};
use crate::error::CliError;

pub fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path)?;
    let item_id = resolve_item_id(id, &library)?;

    library.delete_item(&item_id)?;
    println!("{item_id}");
    Ok(())
}
