use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mosaic")]
#[command(about = "Clip links, text and images into collections from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Quick capture: mosaic "https://example.com/article"
    #[arg(trailing_var_arg = true)]
    pub content: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a new item
    #[command(alias = "new")]
    Add {
        /// Text or URL to save
        content: Vec<String>,
        /// Image reference to attach
        #[arg(long, value_name = "URL")]
        image: Option<String>,
        /// Personal note for the item
        #[arg(long)]
        note: Option<String>,
        /// Collection ID, unique ID prefix or name
        #[arg(short, long)]
        collection: Option<String>,
    },
    /// Save content handed over by another app into the share target collection
    Share {
        /// Shared URL
        #[arg(long)]
        url: Option<String>,
        /// Shared text
        #[arg(long)]
        text: Option<String>,
        /// Shared image reference
        #[arg(long, value_name = "URL")]
        image: Option<String>,
        /// Personal note for the item
        #[arg(long)]
        note: Option<String>,
    },
    /// List saved items, newest first
    List {
        /// Only items in this collection (ID, prefix or name)
        #[arg(short, long)]
        collection: Option<String>,
        /// Only items that belong to no collection
        #[arg(long)]
        unfiled: bool,
        /// Number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move an item into a collection, or out of any collection when omitted
    Move {
        /// Item ID or unique ID prefix
        id: String,
        /// Target collection (ID, prefix or name)
        #[arg(short, long)]
        collection: Option<String>,
    },
    /// Set or clear an item's note
    Note {
        /// Item ID or unique ID prefix
        id: String,
        /// New note text; clears the note when omitted
        text: Vec<String>,
    },
    /// Delete an item
    Delete {
        /// Item ID or unique ID prefix
        id: String,
    },
    /// Manage collections
    #[command(alias = "collections")]
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },
    /// Push queued changes to the remote store
    Sync {
        /// Pull the remote state after pushing
        #[arg(long)]
        pull: bool,
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
}

#[derive(Subcommand)]
pub enum CollectionCommands {
    /// Create a collection
    Add {
        /// Collection name
        name: Vec<String>,
    },
    /// List collections, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename a collection
    Rename {
        /// Collection ID, unique ID prefix or name
        id: String,
        /// New name
        name: Vec<String>,
    },
    /// Delete a collection; its items stay in the library
    Delete {
        /// Collection ID, unique ID prefix or name
        id: String,
    },
    /// Choose the collection shared content lands in; clears the choice when omitted
    Select {
        /// Collection ID, unique ID prefix or name
        id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show queued and parked changes
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Requeue changes that failed permanently or ran out of attempts
    Retry,
}
