//! Dense-vector backend: thin adapter around `qdrant-client`.
//!
//! All Qdrant interactions live here, hiding the builder API from the rest of
//! the crate. Every call is bounded by the configured timeout.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    GetCollectionInfoResponse, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QValue, VectorParamsBuilder, point_id::PointIdOptions,
    value::Kind, vectors_config,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::backend::{IndexAction, IndexBackend, plan_index};
use crate::config::{BackendKind, IndexPolicy, QdrantSettings};
use crate::errors::VectorStoreError;
use crate::record::{IndexEntry, RawHit, ScoreScale};

const NAME: &str = "qdrant";
const GRPC_DEADLINE_EXCEEDED: i32 = 4;
const GRPC_UNAVAILABLE: i32 = 14;

/// Qdrant adapter. Cosine distance only.
pub struct QdrantBackend {
    client: Qdrant,
    upsert_batch: usize,
    timeout: Duration,
}

impl QdrantBackend {
    /// Builds the client; the gRPC channel connects lazily on first call.
    pub fn new(
        settings: &QdrantSettings,
        upsert_batch: usize,
        timeout: Duration,
    ) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&settings.url).timeout(timeout);
        if let Some(key) = &settings.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Config(format!("qdrant client: {e}")))?;

        Ok(Self {
            client,
            upsert_batch: upsert_batch.max(1),
            timeout,
        })
    }

    async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T, VectorStoreError>
    where
        F: Future<Output = Result<T, QdrantError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Err(_) => Err(VectorStoreError::BackendTimeout {
                backend: NAME,
                op,
                after: self.timeout,
            }),
            Ok(Err(e)) => Err(map_qdrant_error(op, e)),
            Ok(Ok(v)) => Ok(v),
        }
    }

    async fn create(&self, name: &str, dimension: usize) -> Result<(), VectorStoreError> {
        self.call(
            "create_collection",
            self.client.create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            ),
        )
        .await?;
        info!(collection = name, dimension, "collection created");
        Ok(())
    }
}

impl IndexBackend for QdrantBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    fn score_scale(&self) -> ScoreScale {
        ScoreScale::Cosine
    }

    fn ensure_index<'a>(
        &'a self,
        name: &'a str,
        dimension: usize,
        policy: IndexPolicy,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let exists = self
                .call("collection_exists", self.client.collection_exists(name))
                .await?;

            match plan_index(exists, policy) {
                IndexAction::Create => self.create(name, dimension).await,
                IndexAction::DropAndCreate => {
                    warn!(collection = name, "recreating collection; existing points are dropped");
                    self.call("delete_collection", self.client.delete_collection(name))
                        .await?;
                    self.create(name, dimension).await
                }
                IndexAction::VerifyExisting => {
                    let info = self
                        .call("collection_info", self.client.collection_info(name))
                        .await?;
                    check_reusable(name, &info, dimension)?;
                    debug!(collection = name, dimension, "collection reused");
                    Ok(())
                }
            }
        })
    }

    fn upsert<'a>(
        &'a self,
        name: &'a str,
        entries: &'a [IndexEntry],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            for batch in entries.chunks(self.upsert_batch) {
                let mut points = Vec::with_capacity(batch.len());
                for e in batch {
                    let payload = Payload::try_from(json!({ "text": e.text }))
                        .map_err(|err| VectorStoreError::SchemaDrift(err.to_string()))?;
                    points.push(PointStruct::new(e.id, e.vector.clone(), payload));
                }
                debug!(collection = name, points = points.len(), "upsert batch");
                self.call(
                    "upsert_points",
                    self.client
                        .upsert_points(UpsertPointsBuilder::new(name, points).wait(true)),
                )
                .await?;
            }
            Ok(())
        })
    }

    fn search<'a>(
        &'a self,
        name: &'a str,
        vector: &'a [f32],
        top_k: usize,
    ) -> BoxFuture<'a, Result<Vec<RawHit>, VectorStoreError>> {
        Box::pin(async move {
            let res = self
                .call(
                    "search_points",
                    self.client.search_points(
                        SearchPointsBuilder::new(name, vector.to_vec(), top_k as u64)
                            .with_payload(true),
                    ),
                )
                .await?;

            let mut out = Vec::with_capacity(res.result.len());
            for p in res.result {
                out.push(RawHit {
                    id: point_id_to_u64(p.id)?,
                    score: p.score,
                    text: payload_text(&p.payload)?,
                });
            }
            Ok(out)
        })
    }

    fn delete<'a>(
        &'a self,
        name: &'a str,
        ids: &'a [u64],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let Some(list) = delete_selector(ids) else {
                return Ok(());
            };
            self.call(
                "delete_points",
                self.client
                    .delete_points(DeletePointsBuilder::new(name).points(list).wait(true)),
            )
            .await?;
            Ok(())
        })
    }

    fn drop_index<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let exists = self
                .call("collection_exists", self.client.collection_exists(name))
                .await?;
            if exists {
                self.call("delete_collection", self.client.delete_collection(name))
                    .await?;
                warn!(collection = name, "collection dropped");
            }
            Ok(())
        })
    }

    fn count<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<u64, VectorStoreError>> {
        Box::pin(async move {
            let res = self
                .call(
                    "count",
                    self.client.count(CountPointsBuilder::new(name).exact(true)),
                )
                .await?;
            Ok(res.result.map(|r| r.count).unwrap_or(0))
        })
    }
}

fn map_qdrant_error(op: &'static str, err: QdrantError) -> VectorStoreError {
    if let QdrantError::ResponseError { status, .. } = &err {
        let code = status.code() as i32;
        if code == GRPC_UNAVAILABLE {
            return VectorStoreError::BackendUnavailable {
                backend: NAME,
                op,
                reason: status.message().to_string(),
            };
        }
        if code == GRPC_DEADLINE_EXCEEDED {
            return VectorStoreError::BackendTimeout {
                backend: NAME,
                op,
                after: Duration::ZERO,
            };
        }
        return VectorStoreError::BackendRejected {
            backend: NAME,
            op,
            reason: status.message().to_string(),
        };
    }
    VectorStoreError::BackendUnavailable {
        backend: NAME,
        op,
        reason: err.to_string(),
    }
}

/// `(size, distance)` of a collection with a single unnamed vector.
fn stored_vector_params(info: &GetCollectionInfoResponse) -> Option<(u64, i32)> {
    let cfg = info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?;
    match cfg {
        vectors_config::Config::Params(p) => Some((p.size, p.distance)),
        vectors_config::Config::ParamsMap(_) => None,
    }
}

/// An existing collection is reusable only with cosine distance and the
/// embedder's dimension; other metrics would invert the score ordering.
fn check_reusable(
    name: &str,
    info: &GetCollectionInfoResponse,
    dimension: usize,
) -> Result<(), VectorStoreError> {
    let (size, distance) = stored_vector_params(info).ok_or_else(|| {
        VectorStoreError::SchemaDrift(format!(
            "collection '{name}' has no single unnamed vector config"
        ))
    })?;
    if distance != Distance::Cosine as i32 {
        let metric = Distance::try_from(distance)
            .map(|d| d.as_str_name().to_string())
            .unwrap_or_else(|_| distance.to_string());
        return Err(VectorStoreError::SchemaDrift(format!(
            "collection '{name}' uses {metric} distance, expected Cosine"
        )));
    }
    if size != dimension as u64 {
        return Err(VectorStoreError::DimensionMismatch {
            got: dimension,
            want: size as usize,
        });
    }
    Ok(())
}

/// Explicit id list for `delete_points`; `None` for no ids, since an empty
/// selector must never be sent.
fn delete_selector(ids: &[u64]) -> Option<PointsIdsList> {
    if ids.is_empty() {
        return None;
    }
    Some(PointsIdsList {
        ids: ids.iter().map(|&id| PointId::from(id)).collect(),
    })
}

/// Numeric point ids map directly; UUID ids are not written by this crate.
fn point_id_to_u64(id: Option<PointId>) -> Result<u64, VectorStoreError> {
    match id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Num(n)) => Ok(n),
        Some(PointIdOptions::Uuid(u)) => Err(VectorStoreError::SchemaDrift(format!(
            "point id '{u}' is a UUID, expected an integer"
        ))),
        None => Err(VectorStoreError::SchemaDrift("point without id".into())),
    }
}

fn payload_text(payload: &HashMap<String, QValue>) -> Result<String, VectorStoreError> {
    match payload.get("text").and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => Ok(s.clone()),
        _ => Err(VectorStoreError::SchemaDrift(
            "point payload has no string field 'text'".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::{
        CollectionConfig, CollectionInfo, CollectionParams, VectorParams, VectorsConfig,
    };

    #[test]
    fn numeric_ids_are_accepted() {
        let id = Some(PointId::from(42u64));
        assert_eq!(point_id_to_u64(id).unwrap(), 42);
    }

    #[test]
    fn uuid_and_missing_ids_are_schema_drift() {
        let uuid = Some(PointId {
            point_id_options: Some(PointIdOptions::Uuid(
                "5c56c793-69f3-4fbf-87e6-c4bf54c28c26".into(),
            )),
        });
        assert!(matches!(
            point_id_to_u64(uuid),
            Err(VectorStoreError::SchemaDrift(_))
        ));
        assert!(matches!(
            point_id_to_u64(None),
            Err(VectorStoreError::SchemaDrift(_))
        ));
    }

    #[test]
    fn payload_text_requires_string() {
        let mut p = HashMap::new();
        p.insert("text".to_string(), QValue::from("section 4(b)"));
        assert_eq!(payload_text(&p).unwrap(), "section 4(b)");

        let mut bad = HashMap::new();
        bad.insert("text".to_string(), QValue::from(7i64));
        assert!(payload_text(&bad).is_err());
        assert!(payload_text(&HashMap::new()).is_err());
    }

    fn info_with(params: VectorParams) -> GetCollectionInfoResponse {
        GetCollectionInfoResponse {
            result: Some(CollectionInfo {
                config: Some(CollectionConfig {
                    params: Some(CollectionParams {
                        vectors_config: Some(VectorsConfig {
                            config: Some(vectors_config::Config::Params(params)),
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn params(size: u64, distance: Distance) -> VectorParams {
        VectorParams {
            size,
            distance: distance as i32,
            ..Default::default()
        }
    }

    #[test]
    fn cosine_collection_with_same_size_is_reusable() {
        let info = info_with(params(384, Distance::Cosine));
        assert!(check_reusable("docs", &info, 384).is_ok());
    }

    #[test]
    fn non_cosine_collection_is_schema_drift() {
        for d in [Distance::Euclid, Distance::Manhattan, Distance::Dot] {
            let info = info_with(params(384, d));
            let err = check_reusable("docs", &info, 384).unwrap_err();
            match err {
                VectorStoreError::SchemaDrift(msg) => assert!(msg.contains("expected Cosine")),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn size_drift_is_dimension_mismatch() {
        let info = info_with(params(768, Distance::Cosine));
        assert!(matches!(
            check_reusable("docs", &info, 384),
            Err(VectorStoreError::DimensionMismatch { got: 384, want: 768 })
        ));
    }

    #[test]
    fn named_or_missing_vector_config_is_schema_drift() {
        let empty = GetCollectionInfoResponse::default();
        assert!(matches!(
            check_reusable("docs", &empty, 384),
            Err(VectorStoreError::SchemaDrift(_))
        ));
    }

    #[test]
    fn delete_selector_lists_exactly_the_ids() {
        assert!(delete_selector(&[]).is_none());
        let list = delete_selector(&[3, 9]).unwrap();
        assert_eq!(list.ids, vec![PointId::from(3u64), PointId::from(9u64)]);
    }

    #[test]
    fn client_builds_without_network() {
        let backend = QdrantBackend::new(&QdrantSettings::default(), 0, Duration::from_secs(1));
        let backend = backend.unwrap();
        assert_eq!(backend.upsert_batch, 1);
        assert_eq!(backend.score_scale(), ScoreScale::Cosine);
    }
}
