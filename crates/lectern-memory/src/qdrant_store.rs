//! [`VectorStore`] backed by a Qdrant server, one collection per embedding model.
//!
//! Chunk payloads only carry strings and integers, so conversion between
//! `serde_json` values and Qdrant values is explicit and rejects anything else.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, ScoredPoint, SearchPointsBuilder,
    UpsertPointsBuilder, Value, VectorParamsBuilder,
};

use crate::vector_store::{BoxFuture, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

type Payload = HashMap<String, serde_json::Value>;

/// Remote chunk store. Collections use cosine distance.
#[derive(Clone)]
pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Configure a client for `url`. No request is made until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::Connection`] if the client cannot be configured.
    pub fn connect(url: &str) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(format!("{url}: {e}")))?;
        Ok(Self {
            client,
            url: url.to_owned(),
        })
    }

    async fn exists(&self, collection: &str) -> Result<bool, VectorStoreError> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(|e| VectorStoreError::Connection(format!("{}: {e}", self.url)))
    }
}

impl VectorStore for QdrantStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if self.exists(&collection).await? {
                return Ok(());
            }
            let request = CreateCollectionBuilder::new(collection.as_str())
                .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine));
            self.client
                .create_collection(request)
                .await
                .map_err(|e| VectorStoreError::Collection(format!("create {collection}: {e}")))?;
            tracing::debug!(%collection, vector_size, "created qdrant collection");
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move { self.exists(&collection).await })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            if !self.exists(&collection).await? {
                return Ok(());
            }
            self.client
                .delete_collection(collection.as_str())
                .await
                .map_err(|e| VectorStoreError::Collection(format!("delete {collection}: {e}")))?;
            tracing::debug!(%collection, "dropped qdrant collection");
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let count = points.len();
            let points = points
                .into_iter()
                .map(|p| Ok(PointStruct::new(p.id, p.vector, encode_payload(p.payload)?)))
                .collect::<Result<Vec<_>, VectorStoreError>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(collection.as_str(), points).wait(true))
                .await
                .map_err(|e| VectorStoreError::Upsert(format!("{collection}: {e}")))?;
            tracing::debug!(%collection, count, "stored chunk vectors");
            Ok(())
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
            if limit == 0 {
                return Ok(Vec::new());
            }
            let request =
                SearchPointsBuilder::new(collection.as_str(), vector, limit).with_payload(true);
            let response = self
                .client
                .search_points(request)
                .await
                .map_err(|e| VectorStoreError::Search(format!("{collection}: {e}")))?;
            Ok(response.result.into_iter().map(decode_point).collect())
        })
    }
}

fn encode_payload(payload: Payload) -> Result<HashMap<String, Value>, VectorStoreError> {
    payload
        .into_iter()
        .map(|(key, value)| {
            let encoded = match value {
                serde_json::Value::String(s) => Value::from(s),
                serde_json::Value::Bool(b) => Value::from(b),
                serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Value::from(i),
                    (None, Some(f)) => Value::from(f),
                    (None, None) => {
                        return Err(VectorStoreError::Serialization(format!(
                            "`{key}`: number {n} is not representable"
                        )));
                    }
                },
                other => {
                    return Err(VectorStoreError::Serialization(format!(
                        "`{key}`: unsupported payload value {other}"
                    )));
                }
            };
            Ok((key, encoded))
        })
        .collect()
}

/// Unsupported payload kinds are skipped; the index reports missing fields.
fn decode_point(point: ScoredPoint) -> ScoredVectorPoint {
    let payload = point
        .payload
        .into_iter()
        .filter_map(|(key, value)| {
            let decoded = match value.kind? {
                Kind::StringValue(s) => serde_json::Value::from(s),
                Kind::IntegerValue(i) => serde_json::Value::from(i),
                Kind::BoolValue(b) => serde_json::Value::from(b),
                Kind::DoubleValue(d) => serde_json::Number::from_f64(d)?.into(),
                _ => return None,
            };
            Some((key, decoded))
        })
        .collect();

    ScoredVectorPoint {
        id: point.id.map(point_id_string).unwrap_or_default(),
        score: point.score,
        payload,
    }
}

fn point_id_string(id: PointId) -> String {
    match id.point_id_options {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}
