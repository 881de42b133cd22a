//! REST client for the hosted document store and its identity service.
//!
//! `FirestoreClient` implements `RemoteStore` over the document store's REST
//! API and provides password sign-in and token refresh for `Session`.

use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::value::{encode_fields, WireDocument};
use super::StoreError;
use crate::auth::SessionData;
use crate::models::RecordId;
use crate::store::{auto_id, Direction, Document, RemoteStore, WriteRequest};

// ============================================================================
// Constants
// ============================================================================

/// Base URL for document store endpoints
const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Base URL for password sign-in
const IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Endpoint exchanging a refresh token for a new id token
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Lifetime assumed when the identity service omits `expiresIn`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    expires_in: Option<String>,
}

/// The token endpoint answers in snake_case.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<WireDocument>,
}

/// Client for one project's document database.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct FirestoreClient {
    client: Client,
    project_id: String,
    api_key: String,
    token: Option<String>,
}

impl FirestoreClient {
    pub fn new(project_id: &str, api_key: &str) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            project_id: project_id.to_string(),
            api_key: api_key.to_string(),
            token: None,
        })
    }

    /// Create a new client with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            project_id: self.project_id.clone(),
            api_key: self.api_key.clone(),
            token: Some(token),
        }
    }

    /// Sign in with email and password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SessionData, StoreError> {
        let url = format!(
            "{}/accounts:signInWithPassword?key={}",
            IDENTITY_BASE_URL, self.api_key
        );
        let body = json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let response = Self::check_response(response).await?;
        let auth: SignInResponse = response.json().await?;

        Ok(SessionData {
            id_token: auth.id_token,
            refresh_token: auth.refresh_token,
            uid: auth.local_id,
            email: auth.email.unwrap_or_else(|| email.to_string()),
            display_name: auth.display_name.filter(|name| !name.is_empty()),
            expires_at: Utc::now() + chrono::Duration::seconds(parse_lifetime(auth.expires_in.as_deref())),
        })
    }

    /// Exchange the session's refresh token for a fresh id token.
    pub async fn refresh_session(&self, session: &SessionData) -> Result<SessionData, StoreError> {
        let url = format!("{}?key={}", SECURE_TOKEN_URL, self.api_key);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await?;
        let response = Self::check_response(response).await?;
        let refreshed: RefreshResponse = response.json().await?;

        Ok(SessionData {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            uid: refreshed.user_id,
            email: session.email.clone(),
            display_name: session.display_name.clone(),
            expires_at: Utc::now()
                + chrono::Duration::seconds(parse_lifetime(refreshed.expires_in.as_deref())),
        })
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn document_name(&self, collection: &str, id: &RecordId) -> String {
        format!("{}/{}/{}", self.database_path(), collection, id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", FIRESTORE_BASE_URL, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, StoreError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::from_status(status, &body))
        }
    }

    /// Apply one write atomically.
    async fn commit(&self, write: serde_json::Value) -> Result<(), StoreError> {
        let url = self.url(&format!("{}:commit", self.database_path()));
        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({ "writes": [write] }))
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

fn parse_lifetime(expires_in: Option<&str>) -> i64 {
    expires_in
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

/// Quote a field name for use in masks and transforms when it is not a
/// plain identifier.
fn field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn server_transforms(write: &WriteRequest) -> Vec<serde_json::Value> {
    write
        .server_timestamps
        .iter()
        .map(|name| json!({ "fieldPath": field_path(name), "setToServerValue": "REQUEST_TIME" }))
        .collect()
}

impl RemoteStore for FirestoreClient {
    async fn list_all(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> Result<Vec<Document>, StoreError> {
        let url = self.url(&format!("{}:runQuery", self.database_path()));
        let direction = match direction {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        };
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "orderBy": [{ "field": { "fieldPath": field_path(order_by) }, "direction": direction }],
            }
        });

        let response = self.authorized(self.client.post(&url)).json(&body).send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        let items: Vec<RunQueryItem> = serde_json::from_str(&text)
            .map_err(|e| StoreError::InvalidResponse(format!("runQuery on {}: {}", collection, e)))?;

        let docs: Vec<Document> = items
            .into_iter()
            .filter_map(|item| item.document)
            .map(WireDocument::into_document)
            .collect();
        debug!(collection = collection, count = docs.len(), "Listed collection");
        Ok(docs)
    }

    async fn fetch(&self, collection: &str, id: &RecordId) -> Result<Option<Document>, StoreError> {
        let url = self.url(&self.document_name(collection, id));
        let response = self.authorized(self.client.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        let wire: WireDocument = serde_json::from_str(&text)
            .map_err(|e| StoreError::InvalidResponse(format!("document {}/{}: {}", collection, id, e)))?;
        Ok(Some(wire.into_document()))
    }

    async fn insert(&self, collection: &str, write: &WriteRequest) -> Result<RecordId, StoreError> {
        let id = auto_id();
        self.commit(json!({
            "update": {
                "name": self.document_name(collection, &id),
                "fields": encode_fields(&write.fields),
            },
            "updateTransforms": server_transforms(write),
            "currentDocument": { "exists": false },
        }))
        .await?;
        debug!(collection = collection, id = %id, "Inserted document");
        Ok(id)
    }

    async fn patch(
        &self,
        collection: &str,
        id: &RecordId,
        write: &WriteRequest,
    ) -> Result<(), StoreError> {
        let mask: Vec<String> = write.fields.keys().map(|k| field_path(k)).collect();
        self.commit(json!({
            "update": {
                "name": self.document_name(collection, id),
                "fields": encode_fields(&write.fields),
            },
            "updateMask": { "fieldPaths": mask },
            "updateTransforms": server_transforms(write),
            "currentDocument": { "exists": true },
        }))
        .await?;
        debug!(collection = collection, id = %id, "Patched document");
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &RecordId) -> Result<(), StoreError> {
        let url = self.url(&self.document_name(collection, id));
        let response = self.authorized(self.client.delete(&url)).send().await?;
        Self::check_response(response).await?;
        debug!(collection = collection, id = %id, "Removed document");
        Ok(())
    }
}
