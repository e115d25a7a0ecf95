use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use sha2::{Digest as _, Sha256};
use tokio::fs;
use tokio::sync::RwLock;

use crate::formats::ArticleRecord;

/// Content-addressed store key for an article URL: hex SHA-256 of the URL with
/// its fragment removed. Strings that do not parse as URLs are hashed trimmed.
pub fn article_key(url: &str) -> String {
    let canonical = match url::Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    };
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Outcome of [`ArticleStore::update_colors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorUpdate {
    Saved,
    Missing,
    /// The vector does not have one colour per stored paragraph; nothing was written.
    LengthMismatch { paragraphs: usize, colors: usize },
}

fn apply_colors(record: &mut ArticleRecord, colors: Vec<String>) -> ColorUpdate {
    if colors.len() != record.paragraphs.len() {
        return ColorUpdate::LengthMismatch {
            paragraphs: record.paragraphs.len(),
            colors: colors.len(),
        };
    }
    record.colors = Some(colors);
    ColorUpdate::Saved
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ArticleRecord>>;
    /// Stores `record` unless the key is taken. Returns whether it was stored.
    async fn create(&self, record: &ArticleRecord) -> anyhow::Result<bool>;
    /// Replaces the stored colours, which must match the stored paragraph count.
    async fn update_colors(&self, key: &str, colors: Vec<String>) -> anyhow::Result<ColorUpdate>;
}

#[derive(Debug, Clone)]
pub struct LocalFsArticleStore {
    base_dir: PathBuf,
}

impl LocalFsArticleStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn articles_dir(&self) -> PathBuf {
        self.base_dir.join("articles")
    }

    fn article_json_path(&self, key: &str) -> PathBuf {
        self.articles_dir().join(format!("{key}.json"))
    }
}

#[async_trait]
impl ArticleStore for LocalFsArticleStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ArticleRecord>> {
        let path = self.article_json_path(key);
        read_json(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))
    }

    async fn create(&self, record: &ArticleRecord) -> anyhow::Result<bool> {
        let path = self.article_json_path(&record.id);
        write_json_if_absent(&path, record)
            .await
            .with_context(|| format!("create: {}", path.display()))
    }

    async fn update_colors(&self, key: &str, colors: Vec<String>) -> anyhow::Result<ColorUpdate> {
        let path = self.article_json_path(key);
        let Some(mut record) = read_json::<ArticleRecord>(&path)
            .await
            .with_context(|| format!("read: {}", path.display()))?
        else {
            return Ok(ColorUpdate::Missing);
        };
        let outcome = apply_colors(&mut record, colors);
        if outcome == ColorUpdate::Saved {
            write_json_atomic(&path, &record)
                .await
                .context("write article json")?;
        }
        Ok(outcome)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryArticleStore {
    records: RwLock<HashMap<String, ArticleRecord>>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ArticleRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn create(&self, record: &ArticleRecord) -> anyhow::Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Ok(false);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    async fn update_colors(&self, key: &str, colors: Vec<String>) -> anyhow::Result<ColorUpdate> {
        let mut records = self.records.write().await;
        Ok(match records.get_mut(key) {
            Some(record) => apply_colors(record, colors),
            None => ColorUpdate::Missing,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_tmp<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    Ok(tmp_path)
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let tmp_path = write_tmp(path, value).await?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

/// Links a fully written temp file into place. The link fails if another
/// writer got there first, so readers never see a partial record.
async fn write_json_if_absent<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<bool> {
    let tmp_path = write_tmp(path, value).await?;
    let linked = fs::hard_link(&tmp_path, path).await;
    fs::remove_file(&tmp_path)
        .await
        .with_context(|| format!("remove tmp: {}", tmp_path.display()))?;
    match linked {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => {
            Err(anyhow::Error::new(err).context(format!("link tmp to final: {}", path.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::ContainerLocator;

    fn record(url: &str, paragraphs: &[&str]) -> ArticleRecord {
        ArticleRecord {
            id: article_key(url),
            element: ContainerLocator::default(),
            title: "Title".to_string(),
            author: "Unknown author".to_string(),
            date: "Unknown date".to_string(),
            published_at: None,
            url: url.to_string(),
            paragraphs: paragraphs.iter().map(|p| (*p).to_string()).collect(),
            colors: None,
        }
    }

    #[test]
    fn key_ignores_fragments_and_surrounding_space() {
        let key = article_key("https://news.example/a?x=1");
        assert_eq!(key.len(), 64);
        assert_eq!(article_key(" https://news.example/a?x=1#comments "), key);
        assert_ne!(article_key("https://news.example/b"), key);
        assert_eq!(article_key("u"), article_key(" u "));
    }

    #[tokio::test]
    async fn local_fs_store_creates_once_and_updates_colors() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsArticleStore::new(dir.path());
        let first = record("https://a.example/story", &["p1", "p2"]);

        assert!(store.get(&first.id).await.unwrap().is_none());
        assert!(store.create(&first).await.unwrap());

        let second = record("https://a.example/story", &["other"]);
        assert!(!store.create(&second).await.unwrap());
        assert_eq!(store.get(&first.id).await.unwrap().unwrap(), first);

        let colors = vec!["#111111".to_string(), "#222222".to_string()];
        assert_eq!(
            store.update_colors(&first.id, colors.clone()).await.unwrap(),
            ColorUpdate::Saved
        );
        let stored = store.get(&first.id).await.unwrap().unwrap();
        assert_eq!(stored.colors, Some(colors));
        assert_eq!(
            store.update_colors("missing", Vec::new()).await.unwrap(),
            ColorUpdate::Missing
        );

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("articles"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_store_keeps_the_first_record() {
        let store = InMemoryArticleStore::new();
        let first = record("u", &["p1", "p2"]);
        assert!(store.create(&first).await.unwrap());
        assert!(!store.create(&record("u", &["p3"])).await.unwrap());
        assert_eq!(
            store.get(&article_key("u")).await.unwrap().unwrap().paragraphs,
            vec!["p1", "p2"]
        );
    }

    #[tokio::test]
    async fn colours_must_cover_every_stored_paragraph() {
        let dir = tempfile::tempdir().unwrap();
        let fs_store = LocalFsArticleStore::new(dir.path());
        let memory_store = InMemoryArticleStore::new();
        let stores: [&dyn ArticleStore; 2] = [&fs_store, &memory_store];

        for store in stores {
            let stored = record("u", &["p1", "p2"]);
            assert!(store.create(&stored).await.unwrap());

            let outcome = store
                .update_colors(&stored.id, vec!["#fff".to_string()])
                .await
                .unwrap();
            assert_eq!(
                outcome,
                ColorUpdate::LengthMismatch {
                    paragraphs: 2,
                    colors: 1
                }
            );
            assert_eq!(store.get(&stored.id).await.unwrap().unwrap().colors, None);
        }
    }
}
