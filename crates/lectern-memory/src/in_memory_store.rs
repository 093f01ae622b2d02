use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::vector_store::{BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

#[derive(Serialize, Deserialize)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, serde_json::Value>,
}

/// Points kept in insertion order so equal scores rank deterministically.
#[derive(Serialize, Deserialize)]
struct InMemoryCollection {
    vector_size: u64,
    points: Vec<StoredPoint>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl InMemoryCollection {
    fn new(vector_size: u64) -> Self {
        Self {
            vector_size,
            points: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn reindex(&mut self) {
        self.positions = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
    }

    fn insert(&mut self, point: StoredPoint) {
        if let Some(&pos) = self.positions.get(&point.id) {
            self.points[pos] = point;
        } else {
            self.positions.insert(point.id.clone(), self.points.len());
            self.points.push(point);
        }
    }
}

/// Process-local vector store. With a persist directory, every collection is
/// mirrored to `<dir>/<collection>.json` and reloaded on construction.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
    persist_dir: Option<PathBuf>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            persist_dir: None,
        }
    }

    /// Open a store backed by snapshot files in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a snapshot cannot be parsed.
    pub fn persistent(dir: impl Into<PathBuf>) -> Result<Self, VectorStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| VectorStoreError::Persistence(e.to_string()))?;

        let mut collections = HashMap::new();
        let entries =
            std::fs::read_dir(&dir).map_err(|e| VectorStoreError::Persistence(e.to_string()))?;
        for entry in entries {
            let path = entry
                .map_err(|e| VectorStoreError::Persistence(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes =
                std::fs::read(&path).map_err(|e| VectorStoreError::Persistence(e.to_string()))?;
            let mut collection: InMemoryCollection = serde_json::from_slice(&bytes)
                .map_err(|e| VectorStoreError::Serialization(format!("{}: {e}", path.display())))?;
            collection.reindex();
            tracing::debug!(collection = name, points = collection.points.len(), "loaded snapshot");
            collections.insert(name.to_owned(), collection);
        }

        Ok(Self {
            collections: RwLock::new(collections),
            persist_dir: Some(dir),
        })
    }

    #[must_use]
    pub fn persist_dir(&self) -> Option<&Path> {
        self.persist_dir.as_deref()
    }

    fn snapshot_path(&self, collection: &str) -> Option<PathBuf> {
        self.persist_dir
            .as_ref()
            .map(|dir| dir.join(format!("{collection}.json")))
    }

    fn serialize_collection(&self, collection: &str) -> Result<Option<Vec<u8>>, VectorStoreError> {
        if self.persist_dir.is_none() {
            return Ok(None);
        }
        let cols = self
            .collections
            .read()
            .map_err(|e| VectorStoreError::Persistence(e.to_string()))?;
        let Some(col) = cols.get(collection) else {
            return Ok(None);
        };
        serde_json::to_vec(col)
            .map(Some)
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))
    }

    async fn write_snapshot(&self, collection: &str) -> Result<(), VectorStoreError> {
        let (Some(path), Some(bytes)) = (
            self.snapshot_path(collection),
            self.serialize_collection(collection)?,
        ) else {
            return Ok(());
        };
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| VectorStoreError::Persistence(format!("{}: {e}", path.display())))
    }

    async fn remove_snapshot(&self, collection: &str) -> Result<(), VectorStoreError> {
        let Some(path) = self.snapshot_path(collection) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VectorStoreError::Persistence(format!(
                "{}: {e}",
                path.display()
            ))),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("persist_dir", &self.persist_dir)
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for InMemoryVectorStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let created = {
                let mut cols = self
                    .collections
                    .write()
                    .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
                if cols.contains_key(&collection) {
                    false
                } else {
                    cols.insert(collection.clone(), InMemoryCollection::new(vector_size));
                    true
                }
            };
            if created {
                self.write_snapshot(&collection).await?;
            }
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            Ok(cols.contains_key(&collection))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            {
                let mut cols = self
                    .collections
                    .write()
                    .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
                cols.remove(&collection);
            }
            self.remove_snapshot(&collection).await
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            {
                let mut cols = self
                    .collections
                    .write()
                    .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
                let col = cols
                    .get_mut(&collection)
                    .ok_or_else(|| VectorStoreError::MissingCollection(collection.clone()))?;
                if let Some(bad) = points
                    .iter()
                    .find(|p| p.vector.len() as u64 != col.vector_size)
                {
                    return Err(VectorStoreError::DimensionMismatch {
                        collection,
                        expected: col.vector_size,
                        actual: bad.vector.len(),
                    });
                }
                for p in points {
                    col.insert(StoredPoint {
                        id: p.id,
                        vector: p.vector,
                        payload: p.payload,
                    });
                }
            }
            self.write_snapshot(&collection).await
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            let col = cols
                .get(&collection)
                .ok_or_else(|| VectorStoreError::MissingCollection(collection.clone()))?;
            if vector.len() as u64 != col.vector_size {
                return Err(VectorStoreError::DimensionMismatch {
                    collection,
                    expected: col.vector_size,
                    actual: vector.len(),
                });
            }

            let mut scored: Vec<ScoredVectorPoint> = col
                .points
                .iter()
                .map(|sp| ScoredVectorPoint {
                    id: sp.id.clone(),
                    score: cosine_similarity(&vector, &sp.vector),
                    payload: sp.payload.clone(),
                })
                .collect();

            // Stable sort: ties keep insertion order.
            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            Ok(scored)
        })
    }
}
