//! MongoDB-backed store gateway
//!
//! Connection setup fails fast with a ping so connectivity problems
//! surface as a distinguished connection error before any batch is
//! produced. Duplicate-key rejections (E11000) are mapped to
//! [`StoreError::Duplicate`] so the sync engine can treat insert races
//! as recoverable per-record failures.

use crate::gateway::{StoreError, StoreGateway, StoreResult};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use docsync_common::{DocsyncError, Result};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

/// Store gateway backed by a MongoDB collection
#[derive(Debug, Clone)]
pub struct MongoGateway {
    client: Client,
    collection: Collection<Document>,
}

impl MongoGateway {
    /// Connect and verify the endpoint with a ping.
    ///
    /// Any failure here is fatal for the run; callers must still release
    /// resources on their other paths.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| DocsyncError::Connection(e.to_string()))?;
        options.app_name = Some("docsync".to_string());

        let client =
            Client::with_options(options).map_err(|e| DocsyncError::Connection(e.to_string()))?;

        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| DocsyncError::Connection(e.to_string()))?;

        info!(database, collection, "Connected to document store");
        Ok(Self {
            collection: db.collection(collection),
            client,
        })
    }
}

fn map_error(e: mongodb::error::Error) -> StoreError {
    let is_duplicate = match *e.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) => write_error.code == 11000,
        ErrorKind::Command(ref command_error) => command_error.code == 11000,
        _ => false,
    };
    if is_duplicate {
        StoreError::Duplicate(e.to_string())
    } else {
        StoreError::Query(e.to_string())
    }
}

#[async_trait]
impl StoreGateway for MongoGateway {
    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        self.collection
            .find_one(filter, None)
            .await
            .map_err(map_error)
    }

    async fn insert_one(&self, doc: Document) -> StoreResult<Bson> {
        let result = self
            .collection
            .insert_one(doc, None)
            .await
            .map_err(map_error)?;
        Ok(result.inserted_id)
    }

    async fn update_one(
        &self,
        filter: Document,
        fields: Document,
        upsert: bool,
        multi: bool,
    ) -> StoreResult<u64> {
        let update = doc! { "$set": fields };
        let options = UpdateOptions::builder().upsert(upsert).build();
        let result = if multi {
            self.collection
                .update_many(filter, update, options)
                .await
                .map_err(map_error)?
        } else {
            self.collection
                .update_one(filter, update, options)
                .await
                .map_err(map_error)?
        };
        let written = result.modified_count + u64::from(result.upserted_id.is_some());
        debug!(written, "Applied update");
        Ok(written)
    }

    async fn count(&self, filter: Document) -> StoreResult<u64> {
        self.collection
            .count_documents(filter, None)
            .await
            .map_err(map_error)
    }

    async fn create_index(&self, field: &str, unique: bool) -> StoreResult<()> {
        let mut keys = Document::new();
        keys.insert(field, 1i32);
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(unique).build())
            .build();
        self.collection
            .create_index(model, None)
            .await
            .map_err(map_error)?;
        debug!(field, unique, "Index ensured");
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.client.clone().shutdown().await;
        info!("Document store connection released");
        Ok(())
    }
}
