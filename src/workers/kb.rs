//! Knowledge base of embedded PDF chunks, stored in Postgres.

use crate::config::KbConfig;
use crate::llm::LlmClient;
use crate::output::{file_stem, pdf};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Texts per embedding request.
const EMBED_BATCH: usize = 100;

/// One chunk of a document with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A document in the knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct KbEntry {
    pub name: String,
    pub chunks: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Where chunks are kept.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn name_exists(&self, name: &str) -> Result<bool>;

    async fn insert(&self, name: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete every chunk of `name`, returning how many went.
    async fn delete(&self, name: &str) -> Result<u64>;

    /// Swap the chunks of `name` for `chunks`.
    async fn replace(&self, name: &str, chunks: &[Chunk]) -> Result<()> {
        self.delete(name).await?;
        self.insert(name, chunks).await
    }

    async fn entries(&self) -> Result<Vec<KbEntry>>;
}

/// Postgres table with one row per chunk; embeddings are `REAL[]`.
pub struct PgStore {
    pool: PgPool,
    table: String,
}

impl PgStore {
    /// Connect and make sure the table exists.
    pub async fn connect(config: &KbConfig) -> Result<Self> {
        config.validate()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&config.pg_url)
            .await
            .context("Failed to connect to the knowledge base database")?;

        let store = Self {
            pool,
            table: config.table.clone(),
        };
        store.ensure_table().await?;
        Ok(store)
    }

    async fn ensure_table(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                chunk_index INT NOT NULL,
                content TEXT NOT NULL,
                embedding REAL[] NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            self.table
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to create table {}", self.table))?;
        Ok(())
    }

    async fn insert_rows(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        name: &str,
        chunks: &[Chunk],
    ) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (name, chunk_index, content, embedding) VALUES ($1, $2, $3, $4)",
            self.table
        );
        for chunk in chunks {
            sqlx::query(&sql)
                .bind(name)
                .bind(chunk.index as i32)
                .bind(&chunk.content)
                .bind(&chunk.embedding)
                .execute(&mut **tx)
                .await
                .with_context(|| format!("Failed to insert chunk {} of {}", chunk.index, name))?;
        }
        Ok(())
    }

    async fn delete_rows(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        name: &str,
    ) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE name = $1", self.table);
        let result = sqlx::query(&sql)
            .bind(name)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to delete {}", name))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl VectorStore for PgStore {
    async fn name_exists(&self, name: &str) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE name = $1)", self.table);
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("Failed to look up entry")?;
        Ok(exists)
    }

    async fn insert(&self, name: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.insert_rows(&mut tx, name, chunks).await?;
        tx.commit().await.context("Failed to commit insert")?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = self.delete_rows(&mut tx, name).await?;
        tx.commit().await.context("Failed to commit delete")?;
        Ok(removed)
    }

    async fn replace(&self, name: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let removed = self.delete_rows(&mut tx, name).await?;
        debug!("Replacing {} old chunks of {}", removed, name);
        self.insert_rows(&mut tx, name, chunks).await?;
        tx.commit().await.context("Failed to commit refresh")?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<KbEntry>> {
        let sql = format!(
            "SELECT name, COUNT(*) AS chunks, MIN(created_at) AS created_at
             FROM {} GROUP BY name ORDER BY name",
            self.table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list entries")?;

        rows.iter()
            .map(|row| -> Result<KbEntry> {
                Ok(KbEntry {
                    name: row.try_get("name")?,
                    chunks: row.try_get("chunks")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

/// Split `text` into chunks of about `size` characters.
///
/// Paragraphs are kept together where they fit; a paragraph longer than
/// `size` is cut on character boundaries.
pub fn chunk_text(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let len = paragraph.chars().count();

        if len > size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = paragraph.chars().collect();
            chunks.extend(chars.chunks(size).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let joined = if current.is_empty() { len } else { current.chars().count() + 2 + len };
        if joined > size {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Knowledge base operations over a store and an embedding model.
pub struct KnowledgeBase<S: VectorStore> {
    store: S,
    embedder: Arc<dyn LlmClient>,
    chunk_size: usize,
}

impl<S: VectorStore> KnowledgeBase<S> {
    pub fn new(store: S, embedder: Arc<dyn LlmClient>, chunk_size: usize) -> Self {
        Self {
            store,
            embedder,
            chunk_size,
        }
    }

    async fn embed_chunks(&self, text: &str) -> Result<Vec<Chunk>> {
        let pieces = chunk_text(text, self.chunk_size);
        if pieces.is_empty() {
            bail!("Document has no text to embed");
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        for batch in pieces.chunks(EMBED_BATCH) {
            let vectors = self
                .embedder
                .embed(batch)
                .await
                .context("Failed to embed document chunks")?;
            if vectors.len() != batch.len() {
                bail!(
                    "Embedding model returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            for (content, embedding) in batch.iter().zip(vectors) {
                chunks.push(Chunk {
                    index: chunks.len(),
                    content: content.clone(),
                    embedding,
                });
            }
        }
        Ok(chunks)
    }

    /// Embed `text` as `name`. Without `upsert`, an existing entry is left alone.
    ///
    /// Returns the number of chunks stored, `None` when the entry existed.
    pub async fn ingest(&self, name: &str, text: &str, upsert: bool) -> Result<Option<usize>> {
        if !upsert && self.store.name_exists(name).await? {
            println!("Entry already exists: {} (use `kb refresh` to replace it)", name);
            return Ok(None);
        }

        let chunks = self.embed_chunks(text).await?;
        if upsert {
            self.store.replace(name, &chunks).await?;
        } else {
            self.store.insert(name, &chunks).await?;
        }

        info!("Stored {} chunks for {}", chunks.len(), name);
        Ok(Some(chunks.len()))
    }

    async fn load(&self, file: &Path, upsert: bool) -> Result<Option<usize>> {
        let name = file_stem(&file.to_string_lossy());
        if !upsert && self.store.name_exists(&name).await? {
            println!("Entry already exists: {} (use `kb refresh` to replace it)", name);
            return Ok(None);
        }

        let text = pdf::extract_text(file)?;
        self.ingest(&name, &text, upsert).await
    }

    pub async fn create(&self, file: &Path) -> Result<Option<usize>> {
        self.load(file, false).await
    }

    pub async fn refresh(&self, file: &Path) -> Result<Option<usize>> {
        self.load(file, true).await
    }

    /// Returns false when there was no such entry.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        if !self.store.name_exists(name).await? {
            println!("No such entry: {}", name);
            return Ok(false);
        }
        let removed = self.store.delete(name).await?;
        info!("Removed {} chunks of {}", removed, name);
        Ok(true)
    }

    pub async fn list(&self) -> Result<Vec<KbEntry>> {
        self.store.entries().await
    }
}

/// Render entries as a fixed-width table.
pub fn format_entries(entries: &[KbEntry]) -> String {
    if entries.is_empty() {
        return "Knowledge base is empty.".to_string();
    }

    let width = entries
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut table = format!("{:<width$}  {:>6}  {}\n", "NAME", "CHUNKS", "CREATED", width = width);
    for entry in entries {
        let created = entry
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.push_str(&format!(
            "{:<width$}  {:>6}  {}\n",
            entry.name,
            entry.chunks,
            created,
            width = width
        ));
    }
    table.trim_end().to_string()
}

/// What to do with the knowledge base.
#[derive(Debug, Clone)]
pub enum KbAction {
    Create(PathBuf),
    Refresh(PathBuf),
    Remove(String),
    List,
}

pub async fn run(embedder: Arc<dyn LlmClient>, config: &KbConfig, action: KbAction) -> Result<()> {
    let store = PgStore::connect(config).await?;
    let kb = KnowledgeBase::new(store, embedder, config.chunk_size);

    match action {
        KbAction::Create(file) => {
            if let Some(n) = kb.create(&file).await? {
                println!("✅ Added {} ({} chunks)", file.display(), n);
            }
        }
        KbAction::Refresh(file) => {
            if let Some(n) = kb.refresh(&file).await? {
                println!("✅ Refreshed {} ({} chunks)", file.display(), n);
            }
        }
        KbAction::Remove(name) => {
            if kb.remove(&name).await? {
                println!("🗑️  Removed {}", name);
            }
        }
        KbAction::List => println!("{}", format_entries(&kb.list().await?)),
    }
    Ok(())
}
