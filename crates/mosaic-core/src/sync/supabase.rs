//! Remote store backed by a Supabase project's PostgREST API.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::remote::{RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;
use crate::models::{Collection, Entity, EntityType, Item, ItemStatus, SyncStatus};

const ITEMS_TABLE: &str = "tesserae";
const COLLECTIONS_TABLE: &str = "mosaics";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

/// `PostgREST` client for the `tesserae` and `mosaics` tables.
#[derive(Clone)]
pub struct SupabaseRemoteStore {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl SupabaseRemoteStore {
    pub fn new(config: RemoteConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder().build().map_err(|error| {
            crate::Error::InvalidInput(format!("failed to build HTTP client: {error}"))
        })?;
        Ok(Self { config, client })
    }

    fn table_url(&self, entity_type: EntityType) -> String {
        let table = match entity_type {
            EntityType::Item => ITEMS_TABLE,
            EntityType::Collection => COLLECTIONS_TABLE,
        };
        format!("{}/rest/v1/{table}", self.config.url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorize(request).send().await.map_err(map_http_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::from_status(
            status.as_u16(),
            parse_api_error(status, &body),
        ))
    }

    async fn list<R>(&self, entity_type: EntityType, owner_id: &str) -> RemoteResult<Vec<R>>
    where
        R: for<'de> Deserialize<'de>,
    {
        let request = self.client.get(self.table_url(entity_type)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{owner_id}")),
            ("order", "created_at.desc".to_string()),
        ]);
        let response = self.send(request).await?;
        response
            .json::<Vec<R>>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))
    }
}

#[async_trait]
impl RemoteStore for SupabaseRemoteStore {
    async fn upsert(&self, entity: &Entity) -> RemoteResult<()> {
        let body = match entity {
            Entity::Item(item) => serde_json::to_value([ItemRow::from(item)]),
            Entity::Collection(collection) => serde_json::to_value([CollectionRow::from(collection)]),
        }
        .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;

        let request = self
            .client
            .post(self.table_url(entity.entity_type()))
            .query(&[("on_conflict", "id")])
            .header("Prefer", UPSERT_PREFERENCE)
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, entity_type: EntityType, id: &str) -> RemoteResult<()> {
        let request = self
            .client
            .delete(self.table_url(entity_type))
            .query(&[("id", format!("eq.{id}"))]);

        // A filter that matches nothing is still a successful delete
        match self.send(request).await {
            Ok(_) | Err(RemoteError::NotFound(_)) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn list_items(&self, owner_id: &str) -> RemoteResult<Vec<Item>> {
        self.list::<ItemRow>(EntityType::Item, owner_id)
            .await?
            .into_iter()
            .map(Item::try_from)
            .collect()
    }

    async fn list_collections(&self, owner_id: &str) -> RemoteResult<Vec<Collection>> {
        self.list::<CollectionRow>(EntityType::Collection, owner_id)
            .await?
            .into_iter()
            .map(Collection::try_from)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Wire rows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct ItemRow {
    id: String,
    user_id: String,
    #[serde(default)]
    mosaic_id: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    source_domain: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    thumb_path: Option<String>,
    status: ItemStatus,
    #[serde(default)]
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<&Item> for ItemRow {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.to_string(),
            user_id: item.owner_id.clone(),
            mosaic_id: item.collection_id.map(|id| id.to_string()),
            source_url: item.source_url.clone(),
            source_domain: item.source_domain.clone(),
            text: item.text.clone(),
            note: item.note.clone(),
            thumb_path: item.image_url.clone(),
            status: item.status,
            last_error: None,
            created_at: format_timestamp(item.created_at),
            updated_at: format_timestamp(item.updated_at),
        }
    }
}

impl TryFrom<ItemRow> for Item {
    type Error = RemoteError;

    fn try_from(row: ItemRow) -> RemoteResult<Self> {
        let collection_id = row
            .mosaic_id
            .as_deref()
            .map(|id| id.parse())
            .transpose()
            .map_err(|_| invalid_field("mosaic_id", row.mosaic_id.as_deref().unwrap_or_default()))?;

        Ok(Self {
            id: row.id.parse().map_err(|_| invalid_field("id", &row.id))?,
            owner_id: row.user_id,
            collection_id,
            // The backend stores an empty string for link-only rows
            text: row.text.filter(|text| !text.is_empty()),
            source_url: row.source_url,
            source_domain: row.source_domain,
            image_url: row.thumb_path,
            note: row.note,
            status: row.status,
            sync_status: SyncStatus::Synced,
            last_error: None,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CollectionRow {
    id: String,
    user_id: String,
    name: String,
    created_at: String,
}

impl From<&Collection> for CollectionRow {
    fn from(collection: &Collection) -> Self {
        Self {
            id: collection.id.to_string(),
            user_id: collection.owner_id.clone(),
            name: collection.name.clone(),
            created_at: format_timestamp(collection.created_at),
        }
    }
}

impl TryFrom<CollectionRow> for Collection {
    type Error = RemoteError;

    fn try_from(row: CollectionRow) -> RemoteResult<Self> {
        Ok(Self {
            id: row.id.parse().map_err(|_| invalid_field("id", &row.id))?,
            owner_id: row.user_id,
            name: row.name,
            is_default: false,
            sync_status: SyncStatus::Synced,
            last_error: None,
            created_at: parse_timestamp("created_at", &row.created_at)?,
        })
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(field: &str, value: &str) -> RemoteResult<i64> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.timestamp_millis())
        .map_err(|_| invalid_field(field, value))
}

fn invalid_field(field: &str, value: &str) -> RemoteError {
    RemoteError::InvalidPayload(format!("invalid {field} '{}'", compact(value)))
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    error: Option<String>,
    hint: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.hint {
                Some(hint) => format!("{} ({hint})", message.trim()),
                None => message.trim().to_string(),
            };
        }
    }

    let trimmed = compact(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

/// Error text cut down for `last_error` columns and log lines.
fn compact(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

fn map_http_error(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::Timeout
    } else if error.is_decode() {
        RemoteError::InvalidPayload(error.to_string())
    } else {
        RemoteError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionId, NewItem};
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{
        body_partial_json, header, header_exists, method, path, query_param,
    };
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> SupabaseRemoteStore {
        SupabaseRemoteStore::new(RemoteConfig {
            url: server.uri(),
            anon_key: "anon".to_string(),
            access_token: "token".to_string(),
        })
        .unwrap()
    }

    fn item() -> Item {
        let mut item = Item::create(
            "user-1",
            NewItem::from_content("https://www.example.com/post").with_note("later"),
        )
        .unwrap();
        item.created_at = 1_700_000_000_123;
        item.updated_at = 1_700_000_000_123;
        item
    }

    #[test]
    fn api_error_falls_back_to_compacted_body() {
        let body = format!("  {}  ", "x".repeat(400));
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, &body).len(), 180);
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }

    #[tokio::test]
    async fn upsert_posts_mapped_row_with_merge_preference() {
        let server = MockServer::start().await;
        let item = item();

        Mock::given(method("POST"))
            .and(path("/rest/v1/tesserae"))
            .and(query_param("on_conflict", "id"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer token"))
            .and(header_exists("prefer"))
            .and(body_partial_json(serde_json::json!([{
                "id": item.id.to_string(),
                "user_id": "user-1",
                "source_domain": "example.com",
                "note": "later",
                "status": "ready",
                "created_at": "2023-11-14T22:13:20.123Z",
            }])))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).upsert(&Entity::Item(item)).await.unwrap();
    }

    #[tokio::test]
    async fn delete_filters_by_id_and_tolerates_missing_rows() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/rest/v1/mosaics"))
            .and(query_param("id", "eq.abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/mosaics"))
            .and(query_param("id", "eq.gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let remote = store(&server);
        remote.delete(EntityType::Collection, "abc").await.unwrap();
        remote.delete(EntityType::Collection, "gone").await.unwrap();
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/mosaics"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/tesserae"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": "23502",
                "message": "null value in column \"user_id\"",
            })))
            .mount(&server)
            .await;

        let remote = store(&server);
        let collection = Collection::create("user-1", "Reading").unwrap();
        let transient = remote
            .upsert(&Entity::Collection(collection))
            .await
            .unwrap_err();
        assert!(transient.is_transient());

        let permanent = remote.upsert(&Entity::Item(item())).await.unwrap_err();
        assert!(!permanent.is_transient());
        assert!(permanent.to_string().contains("user_id"));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let server = MockServer::start().await;
        let remote = store(&server);
        drop(server);

        let error = remote
            .delete(EntityType::Item, "abc")
            .await
            .unwrap_err();
        assert!(error.is_transient());
    }

    #[tokio::test]
    async fn list_items_maps_rows_back() {
        let server = MockServer::start().await;
        let id = crate::models::ItemId::new();
        let collection_id = CollectionId::new();

        Mock::given(method("GET"))
            .and(path("/rest/v1/tesserae"))
            .and(query_param("user_id", "eq.user-1"))
            .and(query_param("order", "created_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": id.to_string(),
                "user_id": "user-1",
                "mosaic_id": collection_id.to_string(),
                "source_url": "https://example.com",
                "source_domain": "example.com",
                "text": "",
                "note": null,
                "thumb_path": null,
                "status": "ready",
                "created_at": "2024-05-01T10:00:00.5+00:00",
                "updated_at": "2024-05-01T10:00:00.5+00:00",
            }])))
            .mount(&server)
            .await;

        let items = store(&server).list_items("user-1").await.unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, id);
        assert_eq!(item.collection_id, Some(collection_id));
        assert_eq!(item.text, None);
        assert_eq!(item.sync_status, SyncStatus::Synced);
        assert_eq!(item.created_at, 1_714_557_600_500);
    }

    #[tokio::test]
    async fn list_rejects_malformed_rows() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/mosaics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": "not-a-uuid",
                "user_id": "user-1",
                "name": "Reading",
                "created_at": "2024-05-01T10:00:00Z",
            }])))
            .mount(&server)
            .await;

        let error = store(&server).list_collections("user-1").await.unwrap_err();
        assert!(matches!(error, RemoteError::InvalidPayload(_)));
    }
}
