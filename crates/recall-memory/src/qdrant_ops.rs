//! Qdrant-backed [`VectorEngine`].
//!
//! Record ids are mapped to UUIDv5 point ids and also kept in the payload under `id`, so
//! deletes and lookups go through a keyword payload index. The exact index is expressed as
//! a collection with the HNSW graph disabled (`m = 0`) and searched with `exact = true`.

use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CollectionStatus, Condition, CountPointsBuilder, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance, FieldType, Filter,
    GetPointsBuilder, HnswConfigDiff, PointId, PointStruct, RetrievedPoint, ScoredPoint,
    SearchParamsBuilder, SearchPointsBuilder, UpdateCollectionBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, point_id::PointIdOptions, value::Kind, vectors_config,
};

use crate::collection::CollectionSchema;
use crate::engine::{
    BoxFuture, CollectionDescription, Metric, ScoredVectorPoint, VectorEngine, VectorPoint,
    VectorStoreError,
};
use crate::filter::{FieldCondition, FieldValue, VectorFilter};
use crate::types::FIELD_ID;

type QdrantResult<T> = Result<T, Box<qdrant_client::QdrantError>>;

/// Thin wrapper over the [`Qdrant`] client.
#[derive(Clone)]
pub struct QdrantOps {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantOps").finish_non_exhaustive()
    }
}

/// Stable point id for a record id.
#[must_use]
pub fn point_id_for(record_id: &str) -> String {
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

impl QdrantOps {
    /// Create a client for the given gRPC URL. No request is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed into a client configuration.
    pub fn new(url: &str) -> QdrantResult<Self> {
        let client = Qdrant::from_url(url).build().map_err(Box::new)?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn client(&self) -> &Qdrant {
        &self.client
    }

    /// # Errors
    ///
    /// Returns an error if Qdrant cannot be reached.
    pub async fn collection_exists(&self, collection: &str) -> QdrantResult<bool> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(Box::new)
    }

    /// Create a collection with Euclid distance vectors of `schema.dimension`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists or creation fails.
    pub async fn create_collection(&self, schema: &CollectionSchema) -> QdrantResult<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&schema.name)
                    .vectors_config(VectorParamsBuilder::new(schema.dimension, Distance::Euclid)),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Read vector size and distance of an existing collection.
    ///
    /// Returns `None` for the fields Qdrant does not report (named vector maps).
    ///
    /// # Errors
    ///
    /// Returns an error if the collection info request fails.
    pub async fn describe(&self, collection: &str) -> QdrantResult<Option<(u64, Metric)>> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(Box::new)?;
        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        let Some(vectors_config::Config::Params(params)) = params else {
            return Ok(None);
        };
        let metric = match Distance::try_from(params.distance) {
            Ok(Distance::Euclid) => Metric::L2,
            Ok(Distance::Cosine) => Metric::Cosine,
            Ok(Distance::Dot) => Metric::Dot,
            _ => Metric::Other,
        };
        Ok(Some((params.size, metric)))
    }

    /// Whether HNSW is disabled and the `id` keyword index exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection info request fails.
    pub async fn has_exact_index(&self, collection: &str) -> QdrantResult<bool> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(Box::new)?;
        let Some(result) = info.result else {
            return Ok(false);
        };
        let flat = result
            .config
            .and_then(|c| c.hnsw_config)
            .is_some_and(|h| h.m == Some(0));
        Ok(flat && result.payload_schema.contains_key(FIELD_ID))
    }

    /// Disable the HNSW graph and index the `id` payload field.
    ///
    /// # Errors
    ///
    /// Returns an error if either update fails.
    pub async fn create_exact_index(&self, collection: &str) -> QdrantResult<()> {
        self.client
            .update_collection(UpdateCollectionBuilder::new(collection).hnsw_config(
                HnswConfigDiff {
                    m: Some(0),
                    ..Default::default()
                },
            ))
            .await
            .map_err(Box::new)?;
        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(collection, FIELD_ID, FieldType::Keyword)
                    .wait(true),
            )
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Qdrant keeps collections resident; loading checks the collection is serviceable.
    ///
    /// # Errors
    ///
    /// Returns an error if the info request fails or the collection reports `Red`.
    pub async fn ensure_serviceable(&self, collection: &str) -> QdrantResult<bool> {
        let info = self
            .client
            .collection_info(collection)
            .await
            .map_err(Box::new)?;
        Ok(info
            .result
            .is_some_and(|r| r.status != CollectionStatus::Red as i32))
    }

    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn upsert(&self, collection: &str, points: Vec<PointStruct>) -> QdrantResult<()> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// Exact search returning scored points with payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub async fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> QdrantResult<Vec<ScoredPoint>> {
        let builder = SearchPointsBuilder::new(collection, vector, limit)
            .with_payload(true)
            .params(SearchParamsBuilder::default().exact(true));
        let results = self.client.search_points(builder).await.map_err(Box::new)?;
        Ok(results.result)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get(&self, collection: &str, ids: Vec<PointId>) -> QdrantResult<Vec<RetrievedPoint>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, ids)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(Box::new)?;
        Ok(response.result)
    }

    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    pub async fn delete_by_filter(&self, collection: &str, filter: Filter) -> QdrantResult<()> {
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(filter).wait(true))
            .await
            .map_err(Box::new)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the count request fails.
    pub async fn count(&self, collection: &str) -> QdrantResult<Option<u64>> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Box::new)?;
        Ok(response.result.map(|r| r.count))
    }

    /// Convert a JSON object into a Qdrant payload map.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if a value has no payload representation.
    pub fn json_to_payload(
        value: serde_json::Value,
    ) -> Result<HashMap<String, qdrant_client::qdrant::Value>, serde_json::Error> {
        serde_json::from_value(value)
    }
}

impl VectorEngine for QdrantOps {
    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Connection(e.to_string()))
        })
    }

    fn create_collection(
        &self,
        schema: &CollectionSchema,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let schema = schema.clone();
        Box::pin(async move {
            self.create_collection(&schema)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn describe_collection(
        &self,
        collection: &str,
    ) -> BoxFuture<'_, Result<CollectionDescription, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let described = self
                .describe(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            let (dimension, metric) = described.ok_or_else(|| {
                VectorStoreError::Collection(format!(
                    "collection {collection} has no single unnamed vector field"
                ))
            })?;
            Ok(CollectionDescription { dimension, metric })
        })
    }

    fn has_index(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.has_exact_index(&collection)
                .await
                .map_err(|e| VectorStoreError::Index(e.to_string()))
        })
    }

    fn create_index(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.create_exact_index(&collection)
                .await
                .map_err(|e| VectorStoreError::Index(e.to_string()))
        })
    }

    fn load_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let ok = self
                .ensure_serviceable(&collection)
                .await
                .map_err(|e| VectorStoreError::Load(e.to_string()))?;
            if ok {
                Ok(())
            } else {
                Err(VectorStoreError::Load(format!(
                    "collection {collection} is not serviceable"
                )))
            }
        })
    }

    fn insert(
        &self,
        collection: &str,
        point: VectorPoint,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let payload = Self::json_to_payload(serde_json::Value::Object(
                point.payload.into_iter().collect(),
            ))
            .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
            let point = PointStruct::new(point_id_for(&point.id), point.vector, payload);
            self.upsert(&collection, vec![point])
                .await
                .map_err(|e| VectorStoreError::Insert(e.to_string()))
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
            let results = self
                .search(&collection, vector, limit)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;
            Ok(results.into_iter().map(scored_point_to_vector).collect())
        })
    }

    fn retrieve(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<VectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let point_ids: Vec<PointId> = ids
                .iter()
                .map(|id| PointId::from(point_id_for(id)))
                .collect();
            let points = self
                .get(&collection, point_ids)
                .await
                .map_err(|e| VectorStoreError::Retrieve(e.to_string()))?;
            Ok(points.into_iter().map(retrieved_point_to_vector).collect())
        })
    }

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.delete_by_filter(&collection, vector_filter_to_qdrant(filter))
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))
        })
    }

    fn row_count(&self, collection: &str) -> BoxFuture<'_, Result<Option<u64>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.count(&collection)
                .await
                .map_err(|e| VectorStoreError::Count(e.to_string()))
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            // The gRPC channel is released when the last clone of the client drops.
            tracing::debug!("qdrant client closed");
            Ok(())
        })
    }
}

fn vector_filter_to_qdrant(filter: VectorFilter) -> Filter {
    let must: Vec<_> = filter
        .must
        .into_iter()
        .map(field_condition_to_qdrant)
        .collect();
    let must_not: Vec<_> = filter
        .must_not
        .into_iter()
        .map(field_condition_to_qdrant)
        .collect();

    let mut f = Filter::default();
    if !must.is_empty() {
        f.must = must;
    }
    if !must_not.is_empty() {
        f.must_not = must_not;
    }
    f
}

fn field_condition_to_qdrant(cond: FieldCondition) -> Condition {
    match cond.value {
        FieldValue::Integer(v) => Condition::matches(cond.field, v),
        FieldValue::Text(v) => Condition::matches(cond.field, v),
    }
}

fn payload_to_json(
    payload: HashMap<String, qdrant_client::qdrant::Value>,
) -> HashMap<String, serde_json::Value> {
    payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json_val = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::Number(i.into()),
                Kind::DoubleValue(d) => {
                    serde_json::Number::from_f64(d).map(serde_json::Value::Number)?
                }
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json_val))
        })
        .collect()
}

/// Prefer the record id stored in the payload over the derived point id.
fn record_id(point_id: Option<PointId>, payload: &HashMap<String, serde_json::Value>) -> String {
    if let Some(id) = payload.get(FIELD_ID).and_then(serde_json::Value::as_str) {
        return id.to_owned();
    }
    match point_id.and_then(|pid| pid.point_id_options) {
        Some(PointIdOptions::Uuid(u)) => u,
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn scored_point_to_vector(point: ScoredPoint) -> ScoredVectorPoint {
    let payload = payload_to_json(point.payload);
    let id = record_id(point.id, &payload);
    ScoredVectorPoint {
        id,
        distance: point.score,
        payload,
    }
}

fn retrieved_point_to_vector(point: RetrievedPoint) -> VectorPoint {
    let payload = payload_to_json(point.payload);
    let id = record_id(point.id, &payload);
    VectorPoint {
        id,
        vector: Vec::new(),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid_url() {
        assert!(QdrantOps::new("http://localhost:6334").is_ok());
    }

    #[test]
    fn new_invalid_url() {
        assert!(QdrantOps::new("not a valid url").is_err());
    }

    #[test]
    fn debug_format() {
        let ops = QdrantOps::new("http://localhost:6334").unwrap();
        assert!(format!("{ops:?}").contains("QdrantOps"));
    }

    #[test]
    fn point_id_is_stable_uuid() {
        let a = point_id_for("abc");
        assert_eq!(a, point_id_for("abc"));
        assert_ne!(a, point_id_for("abd"));
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn filter_conversion_keeps_conditions() {
        let f = vector_filter_to_qdrant(VectorFilter::id_equals("x' or '1'='1"));
        assert_eq!(f.must.len(), 1);
        assert!(f.must_not.is_empty());
    }

    #[test]
    fn payload_conversion_drops_unsupported_kinds() {
        let payload = QdrantOps::json_to_payload(serde_json::json!({
            "id": "a",
            "n": 3,
            "list": [1, 2],
        }))
        .unwrap();
        let json = payload_to_json(payload);
        assert_eq!(json["id"], "a");
        assert_eq!(json["n"], 3);
        assert!(!json.contains_key("list"));
    }

    #[test]
    fn record_id_prefers_payload() {
        let payload = HashMap::from([("id".to_owned(), serde_json::json!("mine"))]);
        let pid = Some(PointId::from(point_id_for("mine")));
        assert_eq!(record_id(pid, &payload), "mine");
    }

    #[test]
    fn record_id_falls_back_to_point_id() {
        let uuid = point_id_for("x");
        let pid = Some(PointId::from(uuid.clone()));
        assert_eq!(record_id(pid, &HashMap::new()), uuid);
    }
}
