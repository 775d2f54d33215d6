use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection, Database};
use tokio::time::timeout;
use tracing::info;

use banter_core::Message;

use crate::error::StoreError;
use crate::MessageStore;

const COLLECTION: &str = "messages";
const OP_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// MongoDB-backed message log.
///
/// The client connects lazily: `connect` only parses and validates the URI,
/// the first operation establishes the pooled connection, which is then
/// reused. Every operation is capped by a timeout on top of the driver's
/// server-selection timeout.
#[derive(Debug)]
pub struct MongoStore {
    database: Database,
    collection: Collection<Document>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Unavailable(format!("bad store uri: {e}")))?;
        options.server_selection_timeout = Some(OP_TIMEOUT);
        options.connect_timeout = Some(OP_TIMEOUT);

        let client = Client::with_options(options)?;
        let database = client.database(database);
        let collection = database.collection::<Document>(COLLECTION);

        info!(database = %database.name(), "message store configured");

        Ok(Self {
            database,
            collection,
        })
    }

    fn document_to_message(doc: &Document) -> Result<Message, StoreError> {
        let id = doc
            .get_object_id("_id")
            .map_err(|e| StoreError::Malformed(format!("_id: {e}")))?
            .to_hex();
        Ok(Message {
            id,
            uid: doc.get_str("uid").unwrap_or_default().to_owned(),
            text: doc.get_str("text").unwrap_or_default().to_owned(),
            ..Message::default()
        })
    }
}

#[async_trait]
impl MessageStore for MongoStore {
    async fn append(&self, message: &Message) -> Result<String, StoreError> {
        // Display fields are not stored; they are re-resolved on read.
        let doc = doc! { "uid": &message.uid, "text": &message.text };
        let result = timeout(OP_TIMEOUT, self.collection.insert_one(doc, None))
            .await
            .map_err(|_| StoreError::Timeout(OP_TIMEOUT))??;
        result
            .inserted_id
            .as_object_id()
            .map(|id| id.to_hex())
            .ok_or_else(|| StoreError::Malformed("insert returned a non-ObjectId id".into()))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": -1 })
            .limit(limit as i64)
            .build();
        let cursor = timeout(READ_TIMEOUT, self.collection.find(doc! {}, options))
            .await
            .map_err(|_| StoreError::Timeout(READ_TIMEOUT))??;
        let documents: Vec<Document> = timeout(READ_TIMEOUT, cursor.try_collect())
            .await
            .map_err(|_| StoreError::Timeout(READ_TIMEOUT))??;
        documents.iter().map(Self::document_to_message).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        timeout(OP_TIMEOUT, self.database.run_command(doc! { "ping": 1 }, None))
            .await
            .map_err(|_| StoreError::Timeout(OP_TIMEOUT))??;
        Ok(())
    }
}
