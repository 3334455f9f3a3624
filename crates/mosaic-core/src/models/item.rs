//! Item (tessera) model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{CollectionId, SyncStatus};
use crate::error::{Error, Result};
use super::{non_blank, now_millis};

/// Domain recorded when a URL cannot be parsed.
pub const FALLBACK_DOMAIN: &str = "link";

/// A unique identifier for an item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Create a new unique item ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Content readiness of an item. Independent from its sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    PendingUpload,
    #[default]
    Ready,
    PendingRetry,
    Failed,
}

impl ItemStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingUpload => "pending_upload",
            Self::Ready => "ready",
            Self::PendingRetry => "pending_retry",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending_upload" => Ok(Self::PendingUpload),
            "ready" => Ok(Self::Ready),
            "pending_retry" => Ok(Self::PendingRetry),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Database(format!("unknown item status '{other}'"))),
        }
    }
}

/// A saved piece of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Client-generated identifier, shared with the remote copy
    pub id: ItemId,
    /// Owning account (may be a guest account)
    pub owner_id: String,
    /// Collection the item is filed in; `None` means unfiled
    pub collection_id: Option<CollectionId>,
    /// Free-form text. Never set together with `source_url`.
    pub text: Option<String>,
    /// Saved link
    pub source_url: Option<String>,
    /// Host derived from `source_url`
    pub source_domain: Option<String>,
    /// Image reference (URL or device URI)
    pub image_url: Option<String>,
    /// Optional annotation
    pub note: Option<String>,
    pub status: ItemStatus,
    pub sync_status: SyncStatus,
    /// Last sync failure message, if any
    pub last_error: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

/// Input for creating an item.
///
/// `content` is stored as `source_url` when it starts with `http://` or
/// `https://`, otherwise as `text`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewItem {
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub note: Option<String>,
    pub collection_id: Option<CollectionId>,
}

impl NewItem {
    /// Item draft from a single line of user input.
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    #[must_use]
    pub const fn in_collection(mut self, collection_id: CollectionId) -> Self {
        self.collection_id = Some(collection_id);
        self
    }
}

/// Field changes applied by an item update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    /// `Some(None)` clears the note
    pub note: Option<Option<String>>,
    /// `Some(None)` unfiles the item
    pub collection_id: Option<Option<CollectionId>>,
}

impl ItemUpdate {
    pub const fn is_empty(&self) -> bool {
        self.note.is_none() && self.collection_id.is_none()
    }
}

impl Item {
    /// Build a new, not yet synced item for `owner_id`.
    ///
    /// Fails with `InvalidInput` when the draft carries no text, URL or image.
    pub fn create(owner_id: &str, draft: NewItem) -> Result<Self> {
        let content = non_blank(draft.content);
        let image_url = non_blank(draft.image_url);

        if content.is_none() && image_url.is_none() {
            return Err(Error::InvalidInput(
                "an item needs text, a URL or an image".to_string(),
            ));
        }

        let (text, source_url, source_domain) = match content {
            Some(value) if is_http_url(&value) => {
                let domain = extract_domain(&value);
                (None, Some(value), Some(domain))
            }
            Some(value) => (Some(value), None, None),
            None => (None, None, None),
        };

        let now = now_millis();
        Ok(Self {
            id: ItemId::new(),
            owner_id: owner_id.to_string(),
            collection_id: draft.collection_id,
            text,
            source_url,
            source_domain,
            image_url,
            note: non_blank(draft.note),
            status: ItemStatus::Ready,
            sync_status: SyncStatus::Pending,
            last_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an update in place, refreshing `updated_at` when a field changed.
    ///
    /// Returns whether anything changed.
    pub fn apply(&mut self, update: ItemUpdate) -> bool {
        let mut changed = false;

        if let Some(note) = update.note {
            let note = non_blank(note);
            if note != self.note {
                self.note = note;
                changed = true;
            }
        }

        if let Some(collection_id) = update.collection_id {
            if collection_id != self.collection_id {
                self.collection_id = collection_id;
                changed = true;
            }
        }

        if changed {
            self.updated_at = now_millis().max(self.updated_at);
            self.sync_status = SyncStatus::Pending;
        }
        changed
    }

    /// Whether the item still holds some content.
    pub fn has_content(&self) -> bool {
        [&self.text, &self.source_url, &self.image_url]
            .iter()
            .any(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    /// Short one-line preview: the text, the URL, or the image reference.
    #[must_use]
    pub fn preview(&self, max_len: usize) -> String {
        self.text
            .as_deref()
            .or(self.source_url.as_deref())
            .or(self.image_url.as_deref())
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}

/// Whether `value` is stored as a link rather than as text.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Host of `url` without a leading `www.`, or [`FALLBACK_DOMAIN`].
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .map_or_else(
            || FALLBACK_DOMAIN.to_string(),
            |host| host.strip_prefix("www.").unwrap_or(&host).to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_http_schemes_are_links() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn test_item_id_parse() {
        let id = ItemId::new();
        let parsed: ItemId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_text_item() {
        let item = Item::create("guest", NewItem::from_content("hello")).unwrap();
        assert_eq!(item.text.as_deref(), Some("hello"));
        assert!(item.source_url.is_none());
        assert!(item.collection_id.is_none());
        assert_eq!(item.status, ItemStatus::Ready);
        assert_eq!(item.sync_status, SyncStatus::Pending);
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_url_item_derives_domain() {
        let item = Item::create("guest", NewItem::from_content("https://example.com/a")).unwrap();
        assert!(item.text.is_none());
        assert_eq!(item.source_url.as_deref(), Some("https://example.com/a"));
        assert_eq!(item.source_domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_url_detection_is_prefix_based() {
        let item = Item::create("guest", NewItem::from_content("example.com/a")).unwrap();
        assert_eq!(item.text.as_deref(), Some("example.com/a"));

        let item = Item::create("guest", NewItem::from_content("httpbin is neat")).unwrap();
        assert_eq!(item.text.as_deref(), Some("httpbin is neat"));
    }

    #[test]
    fn test_image_only_item() {
        let draft = NewItem::default().with_image("content://media/42");
        let item = Item::create("guest", draft).unwrap();
        assert!(item.text.is_none());
        assert!(item.source_url.is_none());
        assert_eq!(item.image_url.as_deref(), Some("content://media/42"));
        assert!(item.has_content());
    }

    #[test]
    fn test_empty_item_rejected() {
        let err = Item::create("guest", NewItem::from_content("   ").with_note("x")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.rust-lang.org/learn"), "rust-lang.org");
        assert_eq!(extract_domain("http://localhost:8080"), "localhost");
        assert_eq!(extract_domain("https://"), FALLBACK_DOMAIN);
    }

    #[test]
    fn test_apply_update() {
        let mut item = Item::create("guest", NewItem::from_content("hello")).unwrap();
        item.sync_status = SyncStatus::Synced;
        let collection = CollectionId::new();

        let changed = item.apply(ItemUpdate {
            note: Some(Some(" remember ".into())),
            collection_id: Some(Some(collection)),
        });

        assert!(changed);
        assert_eq!(item.note.as_deref(), Some("remember"));
        assert_eq!(item.collection_id, Some(collection));
        assert_eq!(item.sync_status, SyncStatus::Pending);
        assert!(item.updated_at >= item.created_at);

        assert!(!item.apply(ItemUpdate {
            note: Some(Some("remember".into())),
            collection_id: None,
        }));
    }

    #[test]
    fn test_preview() {
        let item = Item::create("guest", NewItem::from_content("First line\nSecond")).unwrap();
        assert_eq!(item.preview(50), "First line");
        assert_eq!(item.preview(5), "First");
    }
}
