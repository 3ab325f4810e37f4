use mongodb::bson::{Binary, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};

use crate::dao::models::UserEntity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSnapshotDocument {
    #[serde(rename = "_id")]
    pub key: String,
    pub data: Binary,
}

impl MongoSnapshotDocument {
    pub fn new(key: String, bytes: Vec<u8>) -> Self {
        Self {
            key,
            data: Binary {
                subtype: BinarySubtype::Generic,
                bytes,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    #[serde(default)]
    wins: u32,
    #[serde(default)]
    score: u32,
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            username: value.username,
            wins: value.wins,
            score: value.score,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}
