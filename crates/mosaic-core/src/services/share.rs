//! Share-sheet payloads.

use serde::{Deserialize, Serialize};

use crate::models::NewItem;
use crate::models::non_blank;

/// What the OS share sheet hands over. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareInput {
    pub url: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

impl ShareInput {
    /// Turn the payload into an item draft.
    ///
    /// A shared URL becomes the item's content. Text shared alongside a URL
    /// is kept as the note unless the user typed one.
    pub fn into_draft(self, note: Option<String>) -> NewItem {
        let url = non_blank(self.url);
        let text = non_blank(self.text);
        let note = non_blank(note);

        let (content, note) = match (url, text) {
            (Some(url), Some(text)) => (Some(url), note.or(Some(text))),
            (Some(url), None) => (Some(url), note),
            (None, text) => (text, note),
        };

        NewItem {
            content,
            image_url: non_blank(self.image_url),
            note,
            collection_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn url_with_text_keeps_text_as_note() {
        let draft = ShareInput {
            url: Some("https://example.com/a".into()),
            text: Some("Look at this".into()),
            image_url: None,
        }
        .into_draft(None);
        assert_eq!(draft.content.as_deref(), Some("https://example.com/a"));
        assert_eq!(draft.note.as_deref(), Some("Look at this"));
    }

    #[test]
    fn typed_note_wins_over_shared_text() {
        let draft = ShareInput {
            url: Some("https://example.com/a".into()),
            text: Some("Look at this".into()),
            image_url: None,
        }
        .into_draft(Some("read later".into()));
        assert_eq!(draft.note.as_deref(), Some("read later"));
    }

    #[test]
    fn text_only_and_image_only() {
        let draft = ShareInput {
            text: Some("  plain words ".into()),
            ..ShareInput::default()
        }
        .into_draft(None);
        assert_eq!(draft.content.as_deref(), Some("plain words"));
        assert_eq!(draft.note, None);

        let draft = ShareInput {
            image_url: Some("file:///tmp/photo.jpg".into()),
            url: Some("   ".into()),
            ..ShareInput::default()
        }
        .into_draft(None);
        assert_eq!(draft.content, None);
        assert_eq!(draft.image_url.as_deref(), Some("file:///tmp/photo.jpg"));
    }

    #[test]
    fn deserializes_share_sheet_shape() {
        let input: ShareInput =
            serde_json::from_str(r#"{"url":"https://example.com","imageUrl":"content://1"}"#)
                .unwrap();
        assert_eq!(input.image_url.as_deref(), Some("content://1"));
        assert_eq!(input.text, None);
    }
}
