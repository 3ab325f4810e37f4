//! Process-local storage backend used when no database is configured and in tests.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::{game_store::GameStore, models::UserEntity, storage::StorageResult};

/// [`GameStore`] kept in process memory; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    snapshots: Arc<DashMap<String, Vec<u8>>>,
    /// Users keyed by id.
    users: Arc<DashMap<String, UserEntity>>,
}

impl MemoryGameStore {
    /// Empty store with no users.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store whose directory already knows `users`.
    pub fn with_users(users: impl IntoIterator<Item = UserEntity>) -> Self {
        let store = Self::new();
        for user in users {
            store.users.insert(user.id.clone(), user);
        }
        store
    }

    /// Insert or replace a user record.
    pub fn upsert_user(&self, user: UserEntity) {
        self.users.insert(user.id.clone(), user);
    }
}

impl GameStore for MemoryGameStore {
    fn load_snapshot(&self, key: String) -> BoxFuture<'static, StorageResult<Option<Vec<u8>>>> {
        let snapshot = self.snapshots.get(&key).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(snapshot) })
    }

    fn save_snapshot(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>> {
        self.snapshots.insert(key, bytes);
        Box::pin(async { Ok(()) })
    }

    fn find_user(&self, username: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let user = self
            .users
            .iter()
            .find(|entry| entry.username == username)
            .map(|entry| entry.value().clone());
        Box::pin(async move { Ok(user) })
    }

    fn record_win(&self, id: String, username: String) -> BoxFuture<'static, StorageResult<()>> {
        self.users
            .entry(id.clone())
            .and_modify(|user| user.wins += 1)
            .or_insert_with(|| UserEntity {
                wins: 1,
                ..UserEntity::new(id, username)
            });
        Box::pin(async { Ok(()) })
    }

    fn leaderboard(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>> {
        let mut users: Vec<UserEntity> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then_with(|| a.username.cmp(&b.username))
        });
        Box::pin(async move { Ok(users) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_round_trips_by_key() {
        let store = MemoryGameStore::new();
        assert_eq!(store.load_snapshot("game_state".into()).await.unwrap(), None);

        store
            .save_snapshot("game_state".into(), b"{}".to_vec())
            .await
            .unwrap();
        assert_eq!(
            store.load_snapshot("game_state".into()).await.unwrap(),
            Some(b"{}".to_vec())
        );
    }

    #[tokio::test]
    async fn record_win_creates_then_increments() {
        let store = MemoryGameStore::with_users([UserEntity::new("u1", "alice")]);

        store.record_win("u1".into(), "alice".into()).await.unwrap();
        store.record_win("u2".into(), "bob".into()).await.unwrap();
        store.record_win("u1".into(), "alice".into()).await.unwrap();

        let board = store.leaderboard().await.unwrap();
        let summary: Vec<_> = board.iter().map(|u| (u.username.as_str(), u.wins)).collect();
        assert_eq!(summary, vec![("alice", 2), ("bob", 1)]);
    }

    #[tokio::test]
    async fn find_user_matches_username() {
        let store = MemoryGameStore::with_users([UserEntity::new("u1", "alice")]);
        let found = store.find_user("alice".into()).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("u1".to_string()));
        assert!(store.find_user("mallory".into()).await.unwrap().is_none());
    }
}
