use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{from_value, json};
use tracing::debug;

use crate::dao::{game_store::GameStore, models::UserEntity, storage::StorageResult};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, CouchSnapshotDocument, CouchUserDocument, END_SUFFIX, FindRequest,
        FindResponse, USER_PREFIX, snapshot_doc_id, user_doc_id,
    },
};

const ALL_DOCS: &str = "_all_docs";
const FIND: &str = "_find";

/// Snapshots and the user directory kept as documents of one CouchDB database.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchGameStore {
    /// Build the HTTP client and create the database when it does not exist yet.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            database: Arc::from(config.database),
            auth: config
                .username
                .zip(config.password)
                .map(|(user, pass)| (Arc::from(user), Arc::from(pass))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn document(&self, method: Method, path: &str) -> RequestBuilder {
        self.request(method, format!("{}/{}", self.database_url(), path))
    }

    async fn send(builder: RequestBuilder, path: &str) -> CouchResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> CouchResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let url = self.database_url();
        let status = Self::send(self.request(Method::GET, url.clone()), &self.database)
            .await?
            .status();

        let status = if status == StatusCode::NOT_FOUND {
            debug!(database = %self.database, "creating CouchDB database");
            Self::send(self.request(Method::PUT, url), &self.database)
                .await?
                .status()
        } else {
            status
        };

        // 412: created concurrently by another game server.
        if status.is_success() || status == StatusCode::PRECONDITION_FAILED {
            Ok(())
        } else {
            Err(CouchDaoError::DatabaseStatus {
                database: self.database.to_string(),
                status,
            })
        }
    }

    async fn get_document<T: DeserializeOwned>(&self, doc_id: &str) -> CouchResult<Option<T>> {
        let response = Self::send(self.document(Method::GET, doc_id), doc_id).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Self::decode(response, doc_id).await.map(Some),
            status => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status,
            }),
        }
    }

    async fn put_document<T: Serialize>(&self, doc_id: &str, document: &T) -> CouchResult<()> {
        let response = Self::send(self.document(Method::PUT, doc_id).json(document), doc_id).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                path: doc_id.to_string(),
            }),
            status => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status,
            }),
        }
    }

    /// Every document whose id starts with `prefix`.
    async fn list_documents<T: DeserializeOwned>(&self, prefix: &str) -> CouchResult<Vec<T>> {
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{prefix}\"")),
            ("endkey", format!("\"{prefix}{END_SUFFIX}\"")),
        ];
        let response = Self::send(self.document(Method::GET, ALL_DOCS).query(&query), ALL_DOCS).await?;
        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload: AllDocsResponse = Self::decode(response, ALL_DOCS).await?;
        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc.map(|doc| (row.id, doc)))
            .map(|(id, doc)| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue { path: id, source })
            })
            .collect()
    }

    /// Mango lookup of the user document carrying `username`.
    async fn find_user_document(&self, username: &str) -> CouchResult<Option<CouchUserDocument>> {
        let query = FindRequest {
            selector: json!({
                "_id": { "$gt": USER_PREFIX, "$lt": format!("{USER_PREFIX}{END_SUFFIX}") },
                "username": username,
            }),
            limit: 1,
        };
        let response = Self::send(self.document(Method::POST, FIND).json(&query), FIND).await?;
        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: FIND.to_string(),
                status: response.status(),
            });
        }

        let found: FindResponse<CouchUserDocument> = Self::decode(response, FIND).await?;
        Ok(found.docs.into_iter().next())
    }

    async fn write_snapshot(&self, doc_id: &str, bytes: &[u8]) -> CouchResult<()> {
        let rev = self
            .get_document::<CouchSnapshotDocument>(doc_id)
            .await?
            .and_then(|existing| existing.rev);
        let doc = CouchSnapshotDocument {
            id: doc_id.to_string(),
            rev,
            data: bytes.to_vec(),
        };
        self.put_document(doc_id, &doc).await
    }

    async fn increment_wins(&self, id: &str, username: &str) -> CouchResult<()> {
        let doc_id = user_doc_id(id);
        let doc = match self.get_document::<CouchUserDocument>(&doc_id).await? {
            Some(mut existing) => {
                existing.wins += 1;
                existing
            }
            None => CouchUserDocument::from_entity(UserEntity {
                wins: 1,
                ..UserEntity::new(id, username)
            }),
        };
        self.put_document(&doc_id, &doc).await
    }
}

/// Run `attempt` again once when CouchDB reports a revision conflict.
async fn retry_on_conflict<F, Fut>(mut attempt: F) -> CouchResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CouchResult<()>>,
{
    match attempt().await {
        Err(CouchDaoError::Conflict { path }) => {
            debug!(%path, "CouchDB revision conflict; retrying with a fresh revision");
            attempt().await
        }
        other => other,
    }
}

impl GameStore for CouchGameStore {
    fn load_snapshot(&self, key: String) -> BoxFuture<'static, StorageResult<Option<Vec<u8>>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store
                .get_document::<CouchSnapshotDocument>(&snapshot_doc_id(&key))
                .await?;
            Ok(doc.map(|doc| doc.data))
        })
    }

    fn save_snapshot(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = snapshot_doc_id(&key);
            retry_on_conflict(|| store.write_snapshot(&doc_id, &bytes))
                .await
                .map_err(Into::into)
        })
    }

    fn find_user(&self, username: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc = store.find_user_document(&username).await?;
            Ok(doc.map(CouchUserDocument::into_entity))
        })
    }

    fn record_win(&self, id: String, username: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            retry_on_conflict(|| store.increment_wins(&id, &username))
                .await
                .map_err(Into::into)
        })
    }

    fn leaderboard(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut users: Vec<UserEntity> = store
                .list_documents::<CouchUserDocument>(USER_PREFIX)
                .await?
                .into_iter()
                .map(CouchUserDocument::into_entity)
                .collect();
            users.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.username.cmp(&b.username)));
            Ok(users)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = format!("{}/_up", store.base_url);
            let response = Self::send(store.request(Method::GET, url), "_up").await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: "_up".to_string(),
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
