use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::UserEntity;

pub const SNAPSHOT_PREFIX: &str = "snapshot::";
pub const USER_PREFIX: &str = "user::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub id: String,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Body of a Mango `_find` query.
#[derive(Debug, Serialize)]
pub struct FindRequest {
    pub selector: Value,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct FindResponse<T> {
    pub docs: Vec<T>,
}

/// Opaque snapshot blob stored as a byte array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchSnapshotDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchUserDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub username: String,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub score: u32,
}

impl CouchUserDocument {
    pub fn from_entity(user: UserEntity) -> Self {
        Self {
            id: user_doc_id(&user.id),
            rev: None,
            username: user.username,
            wins: user.wins,
            score: user.score,
        }
    }

    pub fn into_entity(self) -> UserEntity {
        let id = self
            .id
            .strip_prefix(USER_PREFIX)
            .unwrap_or(&self.id)
            .to_string();
        UserEntity {
            id,
            username: self.username,
            wins: self.wins,
            score: self.score,
        }
    }
}

pub fn snapshot_doc_id(key: &str) -> String {
    format!("{SNAPSHOT_PREFIX}{key}")
}

pub fn user_doc_id(id: &str) -> String {
    format!("{USER_PREFIX}{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_document_strips_prefix_on_the_way_back() {
        let doc = CouchUserDocument::from_entity(UserEntity::new("42", "alice"));
        assert_eq!(doc.id, "user::42");
        assert_eq!(doc.into_entity().id, "42");
    }
}
