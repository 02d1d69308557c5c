use super::types::{artifact_embedding::ArtifactEmbedding, code_artifact::CodeArtifact, StoredObject};
use std::ops::Deref;
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Surreal,
};
use tracing::debug;

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    /// # Initialize a new database client
    ///
    /// # Returns
    /// * `SurrealDbClient` signed in and scoped to `namespace`/`database`
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        // Sign in to database
        db.signin(Root { username, password }).await?;

        // Set namespace
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Defines the artifact and embedding tables with their indexes. Safe to run on every
    /// start.
    ///
    /// The composite unique index on `code_artifact` is the deduplication key; the
    /// embedding table reuses the artifact id as its record key, so at most one entry
    /// exists per artifact.
    pub async fn apply_migrations(&self) -> Result<(), Error> {
        let schema = format!(
            "DEFINE TABLE IF NOT EXISTS {artifacts} SCHEMALESS;
             DEFINE INDEX IF NOT EXISTS idx_code_artifact_dedup ON TABLE {artifacts} FIELDS repo_full_name, file_path, content_hash UNIQUE;
             DEFINE INDEX IF NOT EXISTS idx_code_artifact_repo ON TABLE {artifacts} FIELDS repo_full_name;
             DEFINE TABLE IF NOT EXISTS {embeddings} SCHEMALESS;",
            artifacts = CodeArtifact::table_name(),
            embeddings = ArtifactEmbedding::table_name(),
        );

        self.client.query(schema).await?.check()?;
        debug!("schema migrations applied");

        Ok(())
    }

    /// Operation to store a object in SurrealDB, requires the struct to implement StoredObject
    ///
    /// Fails if a record with the same id exists or a unique index rejects it.
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    /// Creates the record, or overwrites the one already stored under its id.
    pub async fn upsert_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .upsert((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    /// Operation to retrieve all objects from a certain table, requires the struct to implement StoredObject
    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    /// Operation to retrieve a single object by its ID, requires the struct to implement StoredObject
    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}
