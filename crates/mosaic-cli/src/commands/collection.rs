use std::path::Path;

use crate::cli::CollectionCommands;
use crate::commands::common::{
    collection_to_list_item, format_collection_lines, open_library, resolve_collection,
    CollectionListItem,
};
use crate::error::CliError;

pub fn run_collection(command: CollectionCommands, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path)?;

    match command {
        CollectionCommands::Add { name } => {
            let collection = library.create_collection(&name.join(" "))?;
            println!("{}", collection.id);
        }
        CollectionCommands::List { json } => {
            let collections = library.list_collections()?;
            let selected = library.active_collection()?;

            if json {
                let json_items = collections
                    .iter()
                    .map(|collection| {
                        let is_selected = selected
                            .as_ref()
                            .is_some_and(|active| active.id == collection.id);
                        collection_to_list_item(collection, is_selected)
                    })
                    .collect::<Vec<CollectionListItem>>();
                println!("{}", serde_json::to_string_pretty(&json_items)?);
            } else if collections.is_empty() {
                println!("No collections yet.");
            } else {
                for line in format_collection_lines(&collections, selected.as_ref()) {
                    println!("{line}");
                }
            }
        }
        CollectionCommands::Rename { id, name } => {
            let target = resolve_collection(&id, &library)?;
            let renamed = library.rename_collection(&target.id, &name.join(" "))?;
            println!("{}  {}", renamed.id, renamed.name);
        }
        CollectionCommands::Delete { id } => {
            let target = resolve_collection(&id, &library)?;
            library.delete_collection(&target.id)?;
            println!("{}", target.id);
        }
        CollectionCommands::Select { id: Some(id) } => {
            let target = resolve_collection(&id, &library)?;
            library.select_active_collection(Some(&target.id))?;
            println!("Selected {}", target.name);
        }
        CollectionCommands::Select { id: None } => {
            library.select_active_collection(None)?;
            println!("Selection cleared");
        }
    }

    Ok(())
}
