//! Per-tier similarity search over embedded chunks

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::difficulty::DifficultyTier;
use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::errors::TierRagError;
use crate::models::Chunk;
use crate::models::Metadata;
use crate::models::SearchResult;

const SNAPSHOT_VERSION: u32 = 1;

/// Equality constraints on metadata keys; all must hold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    equals: Vec<(String, Value)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.equals
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// Three independent collections (`basic`, `intermediate`, `advanced`)
/// searched by similarity, most similar first.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        tier: DifficultyTier,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Index a batch of chunks produced by `tier`'s chunking policy
    async fn add_documents(&self, chunks: Vec<Chunk>, tier: DifficultyTier) -> Result<usize>;

    async fn stats(&self, tier: DifficultyTier) -> Result<usize>;

    async fn clear(&self, tier: DifficultyTier) -> Result<()>;

    /// Flush to durable storage, if the index has any
    async fn persist(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedChunk {
    content: String,
    metadata: Metadata,
    embedding: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    model: String,
    collections: BTreeMap<String, Vec<IndexedChunk>>,
}

/// In-memory index over an [`EmbeddingService`] with optional JSON snapshot
pub struct EmbeddingIndex {
    embedder: Arc<dyn EmbeddingService>,
    collections: DashMap<DifficultyTier, Vec<IndexedChunk>>,
    batch_size: usize,
    snapshot_path: Option<PathBuf>,
}

impl EmbeddingIndex {
    pub fn new(embedder: Arc<dyn EmbeddingService>, batch_size: usize) -> Self {
        Self {
            embedder,
            collections: DashMap::new(),
            batch_size: batch_size.max(1),
            snapshot_path: None,
        }
    }

    /// Open an index persisted at `path`, loading the snapshot when it exists
    pub async fn open(
        embedder: Arc<dyn EmbeddingService>,
        batch_size: usize,
        path: impl Into<PathBuf>,
    ) -> Result<Self> {
        let mut index = Self::new(embedder, batch_size);
        let path = path.into();
        index.load(&path).await?;
        index.snapshot_path = Some(path);
        Ok(index)
    }

    /// Replace the collections with the snapshot at `path`. Snapshots written
    /// by another embedding model or format version are discarded.
    pub async fn load(&self, path: &Path) -> Result<()> {
        if !tokio::fs::try_exists(path).await? {
            debug!("No index snapshot at {}", path.display());
            return Ok(());
        }

        let data = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = match serde_json::from_str(&data) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unreadable index snapshot {}: {}", path.display(), e);
                return Ok(());
            }
        };

        let model = self.embedder.model_name();
        if snapshot.model != model {
            warn!(
                "Embedding model changed from '{}' to '{}'. The index must be rebuilt.",
                snapshot.model, model
            );
            return Ok(());
        }
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                "Index snapshot version {} is not supported (expected {}). The index must be rebuilt.",
                snapshot.version, SNAPSHOT_VERSION
            );
            return Ok(());
        }

        self.collections.clear();
        for (name, chunks) in snapshot.collections {
            let tier: DifficultyTier = name.parse()?;
            info!("Loaded {} {} chunks from snapshot", chunks.len(), tier);
            self.collections.insert(tier, chunks);
        }
        Ok(())
    }

    /// Write every collection to `path` as a versioned JSON snapshot
    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            model: self.embedder.model_name(),
            collections: self
                .collections
                .iter()
                .map(|entry| (entry.key().as_str().to_string(), entry.value().clone()))
                .collect(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_string(&snapshot)?;
        tokio::fs::write(path, data).await?;
        debug!("Saved index snapshot to {}", path.display());
        Ok(())
    }

    fn count(&self, tier: DifficultyTier) -> usize {
        self.collections.get(&tier).map_or(0, |c| c.len())
    }
}

#[async_trait]
impl RetrievalIndex for EmbeddingIndex {
    async fn search(
        &self,
        query: &str,
        tier: DifficultyTier,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 || self.count(tier) == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_one(query).await?;

        let Some(collection) = self.collections.get(&tier) else {
            return Ok(Vec::new());
        };
        let mut scored: Vec<(f32, &IndexedChunk)> = collection
            .iter()
            .filter(|chunk| filter.map_or(true, |f| f.matches(&chunk.metadata)))
            .map(|chunk| (1.0 - cosine_similarity(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(distance, chunk)| SearchResult {
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                distance: Some(distance),
            })
            .collect())
    }

    async fn add_documents(&self, chunks: Vec<Chunk>, tier: DifficultyTier) -> Result<usize> {
        if let Some(stray) = chunks
            .iter()
            .find(|c| c.chunk_type() != Some(tier.as_str()))
        {
            return Err(TierRagError::InvalidConfiguration(format!(
                "chunk of type {:?} cannot be added to the {} index",
                stray.chunk_type().unwrap_or("none"),
                tier
            )));
        }

        let mut indexed = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(TierRagError::upstream(
                    "embeddings",
                    format!(
                        "expected {} embeddings, received {}",
                        batch.len(),
                        embeddings.len()
                    ),
                ));
            }
            debug!("Embedded {} batch {} ({} chunks)", tier, batch_no + 1, batch.len());

            indexed.extend(batch.iter().zip(embeddings).map(|(chunk, embedding)| IndexedChunk {
                content: chunk.content.clone(),
                metadata: chunk.metadata.clone(),
                embedding,
            }));
        }

        let added = indexed.len();
        self.collections.entry(tier).or_default().extend(indexed);
        info!("Indexed {} chunks into the {} collection", added, tier);
        Ok(added)
    }

    async fn stats(&self, tier: DifficultyTier) -> Result<usize> {
        Ok(self.count(tier))
    }

    async fn clear(&self, tier: DifficultyTier) -> Result<()> {
        self.collections.remove(&tier);
        info!("Cleared the {} collection", tier);
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        match &self.snapshot_path {
            Some(path) => self.save(path).await,
            None => Ok(()),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::models::keys;
    use crate::models::Document;
    use serde_json::json;
    use tempfile::TempDir;

    fn chunk(content: &str, source: &str, tier: DifficultyTier) -> Chunk {
        let mut metadata = Metadata::new();
        metadata.insert(keys::SOURCE.to_string(), json!(source));
        metadata.insert(keys::CHUNK_TYPE.to_string(), json!(tier.as_str()));
        Document::new(content, metadata)
    }

    fn index() -> EmbeddingIndex {
        EmbeddingIndex::new(Arc::new(HashingEmbedder::new(256)), 2)
    }

    #[tokio::test]
    async fn test_search_orders_by_distance() {
        let index = index();
        let tier = DifficultyTier::Basic;
        index
            .add_documents(
                vec![
                    chunk("weather forecast for tomorrow", "w.txt", tier),
                    chunk("signalling budget 2025 approved", "b.txt", tier),
                    chunk("the signalling upgrade", "s.txt", tier),
                ],
                tier,
            )
            .await
            .unwrap();

        let hits = index.search("signalling budget 2025", tier, 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source(), "b.txt");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let index = index();
        index
            .add_documents(vec![chunk("alpha", "a.txt", DifficultyTier::Basic)], DifficultyTier::Basic)
            .await
            .unwrap();

        assert_eq!(index.stats(DifficultyTier::Basic).await.unwrap(), 1);
        assert_eq!(index.stats(DifficultyTier::Advanced).await.unwrap(), 0);
        assert!(index
            .search("alpha", DifficultyTier::Advanced, 5, None)
            .await
            .unwrap()
            .is_empty());

        index.clear(DifficultyTier::Basic).await.unwrap();
        assert_eq!(index.stats(DifficultyTier::Basic).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cross_tier_chunks_are_rejected() {
        let index = index();
        let err = index
            .add_documents(
                vec![chunk("alpha", "a.txt", DifficultyTier::Intermediate)],
                DifficultyTier::Basic,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TierRagError::InvalidConfiguration(_)));
        assert_eq!(index.stats(DifficultyTier::Basic).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_metadata_filter() {
        let index = index();
        let tier = DifficultyTier::Advanced;
        index
            .add_documents(
                vec![chunk("rail plan", "a.txt", tier), chunk("rail plan", "b.txt", tier)],
                tier,
            )
            .await
            .unwrap();

        let filter = MetadataFilter::new().eq("source", "b.txt");
        let hits = index.search("rail plan", tier, 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source(), "b.txt");
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_and_model_change() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("index.json");
        let tier = DifficultyTier::Intermediate;

        let index = EmbeddingIndex::open(Arc::new(HashingEmbedder::new(64)), 10, &path)
            .await
            .unwrap();
        index
            .add_documents(vec![chunk("section text", "a.txt", tier)], tier)
            .await
            .unwrap();
        index.persist().await.unwrap();

        let reopened = EmbeddingIndex::open(Arc::new(HashingEmbedder::new(64)), 10, &path)
            .await
            .unwrap();
        assert_eq!(reopened.stats(tier).await.unwrap(), 1);

        let other_model = EmbeddingIndex::open(Arc::new(HashingEmbedder::new(32)), 10, &path)
            .await
            .unwrap();
        assert_eq!(other_model.stats(tier).await.unwrap(), 0);
    }

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
