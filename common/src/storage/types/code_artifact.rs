use std::collections::{BTreeSet, HashMap};

use surrealdb::RecordId;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(CodeArtifact, "code_artifact", {
    repo_full_name: String,
    file_path: String,
    source_url: String,
    content_hash: String,
    content_snippet: String,
    ai_summary: String,
    ai_tags: Vec<String>,
    ai_use_case: String
});

/// The deduplication key: unique across all artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub repo_full_name: String,
    pub file_path: String,
    pub content_hash: String,
}

impl DedupKey {
    pub fn new(
        repo_full_name: impl Into<String>,
        file_path: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            repo_full_name: repo_full_name.into(),
            file_path: file_path.into(),
            content_hash: content_hash.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
}

impl CodeArtifact {
    pub fn new(
        id: String,
        key: DedupKey,
        source_url: String,
        content_snippet: String,
        ai_summary: String,
        ai_tags: Vec<String>,
        ai_use_case: String,
    ) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            repo_full_name: key.repo_full_name,
            file_path: key.file_path,
            source_url,
            content_hash: key.content_hash,
            content_snippet,
            ai_summary,
            ai_tags: normalize_tags(ai_tags),
            ai_use_case,
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.repo_full_name, &self.file_path, &self.content_hash)
    }

    /// `{base}/{repo}/blob/HEAD/{path}`, informational only.
    pub fn source_url_for(base: &str, repo_full_name: &str, file_path: &str) -> String {
        format!(
            "{}/{}/blob/HEAD/{}",
            base.trim_end_matches('/'),
            repo_full_name.trim_matches('/'),
            file_path.trim_start_matches('/')
        )
    }

    pub async fn find_by_key(
        key: &DedupKey,
        db: &SurrealDbClient,
    ) -> Result<Option<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM type::table($table_name)
                 WHERE repo_full_name = $repo_full_name
                   AND file_path = $file_path
                   AND content_hash = $content_hash
                 LIMIT 1",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("repo_full_name", key.repo_full_name.clone()))
            .bind(("file_path", key.file_path.clone()))
            .bind(("content_hash", key.content_hash.clone()))
            .await?;

        let found: Vec<Self> = response.take(0)?;
        Ok(found.into_iter().next())
    }

    pub async fn exists_for_repo(
        repo_full_name: &str,
        db: &SurrealDbClient,
    ) -> Result<bool, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT id FROM type::table($table_name) WHERE repo_full_name = $repo_full_name LIMIT 1",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("repo_full_name", repo_full_name.to_owned()))
            .await?;

        let existing: Vec<IdRow> = response.take(0)?;
        Ok(!existing.is_empty())
    }

    /// Fetches the artifacts for `ids`, returned in the order of `ids`. Unknown ids are
    /// skipped.
    pub async fn get_by_ids(ids: &[String], db: &SurrealDbClient) -> Result<Vec<Self>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let things: Vec<RecordId> = ids
            .iter()
            .map(|id| RecordId::from_table_key(Self::table_name(), id.as_str()))
            .collect();

        let mut response = db
            .client
            .query("SELECT * FROM type::table($table_name) WHERE id INSIDE $ids")
            .bind(("table_name", Self::table_name()))
            .bind(("ids", things))
            .await?;

        let rows: Vec<Self> = response.take(0)?;
        let mut by_id: HashMap<String, Self> =
            rows.into_iter().map(|row| (row.id.clone(), row)).collect();

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Stable page over all artifacts, oldest first.
    pub async fn list_page(
        start: usize,
        limit: usize,
        db: &SurrealDbClient,
    ) -> Result<Vec<Self>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM type::table($table_name) ORDER BY created_at ASC, id ASC LIMIT $limit START $start",
            )
            .bind(("table_name", Self::table_name()))
            .bind(("limit", limit))
            .bind(("start", start))
            .await?;

        Ok(response.take(0)?)
    }
}

/// Tags are a set: trimmed, deduplicated, stored sorted.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn setup_test_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, &database)
            .await
            .expect("Failed to start in-memory surrealdb");

        db.apply_migrations()
            .await
            .expect("Failed to apply migrations");

        db
    }

    fn artifact(repo: &str, path: &str, hash: &str) -> CodeArtifact {
        CodeArtifact::new(
            Uuid::new_v4().to_string(),
            DedupKey::new(repo, path, hash),
            CodeArtifact::source_url_for("https://github.com", repo, path),
            "snippet".into(),
            "summary".into(),
            vec!["rust".into()],
            "use case".into(),
        )
    }

    #[test]
    fn test_normalize_tags_is_set_like() {
        let tags = normalize_tags([" http ", "cli", "http", "", "cli"]);
        assert_eq!(tags, vec!["cli".to_string(), "http".to_string()]);
    }

    #[test]
    fn test_source_url_for_trims_separators() {
        assert_eq!(
            CodeArtifact::source_url_for("https://github.com/", "acme/x", "/src/main.rs"),
            "https://github.com/acme/x/blob/HEAD/src/main.rs"
        );
    }

    #[tokio::test]
    async fn test_find_by_key_matches_all_three_fields() {
        let db = setup_test_db().await;
        let stored = artifact("acme/x", "f.go", "h1");
        db.store_item(stored.clone()).await.expect("store");

        let hit = CodeArtifact::find_by_key(&DedupKey::new("acme/x", "f.go", "h1"), &db)
            .await
            .expect("lookup");
        assert_eq!(hit.map(|a| a.id), Some(stored.id));

        for key in [
            DedupKey::new("acme/x", "f.go", "h2"),
            DedupKey::new("acme/x", "g.go", "h1"),
            DedupKey::new("acme/y", "f.go", "h1"),
        ] {
            let miss = CodeArtifact::find_by_key(&key, &db).await.expect("lookup");
            assert!(miss.is_none(), "unexpected match for {key:?}");
        }
    }

    #[tokio::test]
    async fn test_exists_for_repo() {
        let db = setup_test_db().await;
        db.store_item(artifact("acme/x", "f.go", "h1"))
            .await
            .expect("store");

        assert!(CodeArtifact::exists_for_repo("acme/x", &db)
            .await
            .expect("check"));
        assert!(!CodeArtifact::exists_for_repo("acme/other", &db)
            .await
            .expect("check"));
    }

    #[tokio::test]
    async fn test_get_by_ids_preserves_requested_order_and_skips_unknown() {
        let db = setup_test_db().await;
        let a = artifact("acme/x", "a.rs", "ha");
        let b = artifact("acme/x", "b.rs", "hb");
        let c = artifact("acme/x", "c.rs", "hc");
        for item in [a.clone(), b.clone(), c.clone()] {
            db.store_item(item).await.expect("store");
        }

        let ids = vec![
            c.id.clone(),
            "missing".to_string(),
            a.id.clone(),
            b.id.clone(),
        ];
        let fetched = CodeArtifact::get_by_ids(&ids, &db).await.expect("fetch");
        let fetched_ids: Vec<String> = fetched.into_iter().map(|x| x.id).collect();

        assert_eq!(fetched_ids, vec![c.id, a.id, b.id]);
    }

    #[tokio::test]
    async fn test_list_page_walks_all_rows() {
        let db = setup_test_db().await;
        for idx in 0..5 {
            db.store_item(artifact("acme/x", &format!("f{idx}.rs"), "h"))
                .await
                .expect("store");
        }

        let first = CodeArtifact::list_page(0, 3, &db).await.expect("page");
        let second = CodeArtifact::list_page(3, 3, &db).await.expect("page");

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        let mut seen: Vec<String> = first.into_iter().chain(second).map(|a| a.id).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }
}
