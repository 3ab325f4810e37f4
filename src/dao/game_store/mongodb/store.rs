//! [`GameStore`] backed by MongoDB.

use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::MongoConnection,
    error::{MongoDaoError, MongoResult},
    models::{MongoSnapshotDocument, MongoUserDocument, doc_id},
};
use crate::dao::{game_store::GameStore, models::UserEntity, storage::StorageResult};

const SNAPSHOT_COLLECTION_NAME: &str = "snapshots";
const USER_COLLECTION_NAME: &str = "users";

/// Snapshots and the user directory kept in two MongoDB collections.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    connection: RwLock<MongoConnection>,
    config: MongoConfig,
}

impl MongoInner {
    async fn current(&self) -> MongoConnection {
        self.connection.read().await.clone()
    }

    async fn ping(&self) -> MongoResult<()> {
        self.current()
            .await
            .ping()
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    /// Swap in a fresh client; the old one stays in use until the new one answers.
    async fn reconnect(&self) -> MongoResult<()> {
        let fresh = MongoConnection::open(&self.config).await?;
        *self.connection.write().await = fresh;
        Ok(())
    }
}

impl MongoGameStore {
    /// Open a connection to MongoDB and ensure the user index is present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let connection = MongoConnection::open(&config).await?;
        let store = Self {
            inner: Arc::new(MongoInner {
                connection: RwLock::new(connection),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.user_collection().await;
        let index = IndexModel::builder()
            .keys(doc! {"username": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("user_username_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: USER_COLLECTION_NAME,
                index: "username",
                source,
            })?;

        Ok(())
    }

    async fn snapshot_collection(&self) -> Collection<MongoSnapshotDocument> {
        self.inner.current().await.collection(SNAPSHOT_COLLECTION_NAME)
    }

    async fn user_collection(&self) -> Collection<MongoUserDocument> {
        self.inner.current().await.collection(USER_COLLECTION_NAME)
    }

    async fn load_snapshot(&self, key: String) -> MongoResult<Option<Vec<u8>>> {
        let collection = self.snapshot_collection().await;
        let document = collection
            .find_one(doc_id(&key))
            .await
            .map_err(|source| MongoDaoError::LoadSnapshot { key, source })?;
        Ok(document.map(|doc| doc.data.bytes))
    }

    async fn save_snapshot(&self, key: String, bytes: Vec<u8>) -> MongoResult<()> {
        let collection = self.snapshot_collection().await;
        let document = MongoSnapshotDocument::new(key.clone(), bytes);
        collection
            .replace_one(doc_id(&key), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSnapshot { key, source })?;
        Ok(())
    }

    async fn find_user(&self, username: String) -> MongoResult<Option<UserEntity>> {
        let collection = self.user_collection().await;
        let document = collection
            .find_one(doc! {"username": username.as_str()})
            .await
            .map_err(|source| MongoDaoError::FindUser { username, source })?;
        Ok(document.map(Into::into))
    }

    async fn record_win(&self, id: String, username: String) -> MongoResult<()> {
        let collection = self.user_collection().await;
        collection
            .update_one(
                doc_id(&id),
                doc! {
                    "$inc": {"wins": 1},
                    "$setOnInsert": {"username": username.as_str(), "score": 0},
                },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::RecordWin { id, source })?;
        Ok(())
    }

    async fn leaderboard(&self) -> MongoResult<Vec<UserEntity>> {
        let collection = self.user_collection().await;
        let documents: Vec<MongoUserDocument> = collection
            .find(doc! {})
            .sort(doc! {"wins": -1})
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl GameStore for MongoGameStore {
    fn load_snapshot(&self, key: String) -> BoxFuture<'static, StorageResult<Option<Vec<u8>>>> {
        let store = self.clone();
        Box::pin(async move { store.load_snapshot(key).await.map_err(Into::into) })
    }

    fn save_snapshot(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_snapshot(key, bytes).await.map_err(Into::into) })
    }

    fn find_user(&self, username: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(username).await.map_err(Into::into) })
    }

    fn record_win(&self, id: String, username: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.record_win(id, username).await.map_err(Into::into) })
    }

    fn leaderboard(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.leaderboard().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
