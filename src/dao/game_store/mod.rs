/// CouchDB backend over its HTTP API.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// Process-local backend.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::UserEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer: opaque snapshot blobs plus the user directory.
pub trait GameStore: Send + Sync {
    /// Read the blob stored under `key`, `None` when nothing was ever written.
    fn load_snapshot(&self, key: String) -> BoxFuture<'static, StorageResult<Option<Vec<u8>>>>;
    /// Replace the blob stored under `key`.
    fn save_snapshot(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a user of the directory by username.
    fn find_user(&self, username: String) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Increment the wins counter of `id`, creating the record when it does not exist yet.
    fn record_win(&self, id: String, username: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Users ordered by wins, highest first.
    fn leaderboard(&self) -> BoxFuture<'static, StorageResult<Vec<UserEntity>>>;
    /// Cheap liveness check polled by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection in place after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
