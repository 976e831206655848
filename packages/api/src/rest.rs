//! # Hosted table store — PostgREST
//!
//! [`RestStore`] implements [`TableStore`] over the project's `/rest/v1`
//! endpoint. Every request carries the project `apikey` and the signed-in
//! user's bearer token, and every query carries the `user_id=eq.<owner>`
//! filter taken from the [`OwnerFilter`].
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `select` | `GET /{table}?select=*&user_id=eq.{owner}[&id=eq.{id}]&order=created_at.desc` |
//! | `insert` | `POST /{table}` with `Prefer: return=representation` |
//! | `update` | `PATCH /{table}?id=eq.{id}&user_id=eq.{owner}` with `Prefer: return=representation` |
//! | `delete` | `DELETE /{table}?id=eq.{id}&user_id=eq.{owner}` with `Prefer: return=representation` |
//!
//! Status mapping: 401 and 403 become [`StoreError::Unauthorized`], any other
//! failure (including transport errors) becomes
//! [`StoreError::StoreUnavailable`]. A body that is not an array of objects is
//! [`StoreError::MalformedRow`].

use std::fmt;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use store::table::OWNER_COLUMN;
use store::{OwnerFilter, Row, Session, StoreError, Table, TableStore};
use tracing::debug;

use crate::settings::Settings;

/// Columns the server owns; never sent in a patch.
const SERVER_COLUMNS: [&str; 3] = ["id", OWNER_COLUMN, "created_at"];

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
}

impl fmt::Debug for RestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStore")
            .field("rest_url", &self.rest_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[HIDDEN]"))
            .finish()
    }
}

impl RestStore {
    /// Store acting on behalf of `session`.
    pub fn new(settings: &Settings, session: &Session) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(settings.http.timeout())
            .build()
            .map_err(unavailable)?;
        Ok(Self::with_client(
            client,
            settings.supabase.rest_url(),
            settings.supabase.anon_key.clone(),
            session.access_token().map(str::to_string),
        ))
    }

    pub fn with_client(
        client: Client,
        rest_url: String,
        anon_key: String,
        access_token: Option<String>,
    ) -> Self {
        Self {
            client,
            rest_url,
            anon_key,
            access_token,
        }
    }

    fn request(&self, builder: RequestBuilder, filter: &OwnerFilter) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        let mut query = vec![(OWNER_COLUMN, format!("eq.{}", filter.owner()))];
        if let Some(id) = filter.id() {
            query.push(("id", format!("eq.{id}")));
        }
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
            .query(&query)
    }

    fn url(&self, table: Table) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    async fn rows(&self, builder: RequestBuilder) -> Result<Vec<Row>, StoreError> {
        let response = builder.send().await.map_err(unavailable)?;
        let body: Value = check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::MalformedRow(e.to_string()))?;
        into_rows(body)
    }
}

fn unavailable(e: impl fmt::Display) -> StoreError {
    StoreError::StoreUnavailable(e.to_string())
}

async fn check(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Unauthorized(format!("{status}: {body}"))
        }
        _ => StoreError::StoreUnavailable(format!("{status}: {body}")),
    })
}

fn into_rows(body: Value) -> Result<Vec<Row>, StoreError> {
    let Value::Array(items) = body else {
        return Err(StoreError::MalformedRow("expected a JSON array".into()));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(StoreError::MalformedRow(format!("expected an object, got {other}"))),
        })
        .collect()
}

impl TableStore for RestStore {
    async fn select(&self, table: Table, filter: &OwnerFilter) -> Result<Vec<Row>, StoreError> {
        debug!(%table, owner = %filter.owner(), "select");
        let builder = self
            .request(self.client.get(self.url(table)), filter)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.rows(builder).await
    }

    async fn insert(
        &self,
        table: Table,
        filter: &OwnerFilter,
        mut row: Row,
    ) -> Result<Row, StoreError> {
        debug!(%table, owner = %filter.owner(), "insert");
        row.insert(
            OWNER_COLUMN.to_string(),
            Value::String(filter.owner().to_string()),
        );
        let builder = self
            .client
            .post(self.url(table))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.access_token.as_deref().unwrap_or(&self.anon_key))
            .header("Prefer", "return=representation")
            .json(&row);
        self.rows(builder)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::MalformedRow("insert returned no row".into()))
    }

    async fn update(
        &self,
        table: Table,
        filter: &OwnerFilter,
        mut patch: Row,
    ) -> Result<Option<Row>, StoreError> {
        debug!(%table, owner = %filter.owner(), id = ?filter.id(), "update");
        for column in SERVER_COLUMNS {
            patch.remove(column);
        }
        let builder = self
            .request(self.client.patch(self.url(table)), filter)
            .header("Prefer", "return=representation")
            .json(&patch);
        Ok(self.rows(builder).await?.into_iter().next())
    }

    async fn delete(&self, table: Table, filter: &OwnerFilter) -> Result<usize, StoreError> {
        debug!(%table, owner = %filter.owner(), id = ?filter.id(), "delete");
        let builder = self
            .request(self.client.delete(self.url(table)), filter)
            .header("Prefer", "return=representation");
        Ok(self.rows(builder).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use store::{NoteDraft, NotesRepository, OwnerId, UserInfo};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rest_store(server: &MockServer) -> RestStore {
        RestStore::with_client(
            Client::new(),
            format!("{}/rest/v1", server.uri()),
            "anon".into(),
            Some("jwt".into()),
        )
    }

    fn session() -> Session {
        Session::new(
            UserInfo {
                id: "u1".into(),
                email: "u1@example.com".into(),
                name: None,
            },
            Some("jwt".into()),
        )
    }

    fn note_row(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "user_id": "u1",
            "title": title,
            "description": "",
            "priority": "medium",
            "due_date": null,
            "completed": false,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_select_sends_owner_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .and(query_param("user_id", "eq.u1"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer jwt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([note_row("n1", "first")])))
            .mount(&server)
            .await;

        let rows = rest_store(&server)
            .select(Table::Notes, &OwnerFilter::owned_by(&OwnerId::new("u1")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "first");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/passwords"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = rest_store(&server);
        let filter = OwnerFilter::owned_by(&OwnerId::new("u1"));
        assert!(matches!(
            store.select(Table::Notes, &filter).await,
            Err(StoreError::Unauthorized(_))
        ));
        assert!(matches!(
            store.select(Table::Passwords, &filter).await,
            Err(StoreError::StoreUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"not": "an array"})))
            .mount(&server)
            .await;

        let result = rest_store(&server)
            .select(Table::Notes, &OwnerFilter::owned_by(&OwnerId::new("u1")))
            .await;
        assert!(matches!(result, Err(StoreError::MalformedRow(_))));
    }

    #[tokio::test]
    async fn test_update_strips_server_columns() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/notes"))
            .and(query_param("id", "eq.n1"))
            .and(query_param("user_id", "eq.u1"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!({"completed": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([note_row("n1", "first")])))
            .mount(&server)
            .await;

        let mut patch = Row::new();
        patch.insert("completed".into(), json!(true));
        patch.insert("user_id".into(), json!("someone-else"));
        patch.insert("id".into(), json!("n2"));

        let filter = OwnerFilter::owned_by(&OwnerId::new("u1")).with_id("n1");
        let updated = rest_store(&server)
            .update(Table::Notes, &filter, patch)
            .await
            .unwrap();
        assert!(updated.is_some());
    }

    #[tokio::test]
    async fn test_notes_repository_over_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([note_row("n1", "first")])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/notes"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([note_row("n2", "second")])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/notes"))
            .and(query_param("id", "eq.gone"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let notes = NotesRepository::new(rest_store(&server), session());
        assert_eq!(notes.list().await.unwrap().len(), 1);

        let created = notes.create(NoteDraft::new("second")).await.unwrap();
        assert_eq!(created.id, "n2");
        let titles: Vec<String> = notes.snapshot().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, ["second", "first"]);

        let err = notes.delete("gone").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(notes.snapshot().len(), 2);
    }
}
