//! Text-search backend: OpenSearch REST with scripted cosine scoring.
//!
//! The index stores `{embedding: dense_vector, text: text}`. Relevance is a
//! `script_score` over `match_all` computing
//! `cosineSimilarity(params.query_vector, 'embedding') + 1.0`, so raw scores
//! live in `[0, 2]`.
//!
//! Request bodies and response parsing are plain functions so they can be
//! tested without a cluster.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::backend::{IndexAction, IndexBackend, plan_index};
use crate::config::{BackendKind, IndexPolicy, OpenSearchSettings};
use crate::errors::VectorStoreError;
use crate::record::{IndexEntry, RawHit, ScoreScale};

const NAME: &str = "opensearch";
const COSINE_SCRIPT: &str = "cosineSimilarity(params.query_vector, 'embedding') + 1.0";

/// OpenSearch adapter over `reqwest`.
pub struct OpenSearchBackend {
    client: reqwest::Client,
    base: String,
    username: Option<String>,
    password: Option<String>,
    refresh: String,
    upsert_batch: usize,
    timeout: Duration,
}

impl OpenSearchBackend {
    pub fn new(
        settings: &OpenSearchSettings,
        upsert_batch: usize,
        timeout: Duration,
    ) -> Result<Self, VectorStoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VectorStoreError::Config(format!("opensearch client: {e}")))?;

        Ok(Self {
            client,
            base: settings.url.trim().trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            refresh: settings.refresh.clone(),
            upsert_batch: upsert_batch.max(1),
            timeout,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let rb = self.client.request(method, format!("{}/{}", self.base, path));
        match &self.username {
            Some(user) => rb.basic_auth(user, self.password.as_deref()),
            None => rb,
        }
    }

    /// Sends and returns `(status, body)`; transport failures are mapped here.
    #[instrument(skip_all, fields(op = op))]
    async fn send(
        &self,
        op: &'static str,
        rb: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), VectorStoreError> {
        let resp = rb
            .send()
            .await
            .map_err(|e| map_transport_error(op, e, self.timeout))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| map_transport_error(op, e, self.timeout))?;
        Ok((status, body))
    }

    /// Sends, requires 2xx and decodes JSON.
    async fn send_json(
        &self,
        op: &'static str,
        rb: reqwest::RequestBuilder,
    ) -> Result<Value, VectorStoreError> {
        let (status, body) = self.send(op, rb).await?;
        if !status.is_success() {
            return Err(status_error(op, status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| VectorStoreError::SchemaDrift(format!("{op}: invalid JSON response: {e}")))
    }

    async fn exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        let (status, body) = self
            .send("index_exists", self.request(Method::HEAD, name))
            .await?;
        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(status_error("index_exists", s, &body)),
        }
    }

    async fn create(&self, name: &str, dimension: usize) -> Result<(), VectorStoreError> {
        self.send_json(
            "create_index",
            self.request(Method::PUT, name).json(&index_mapping(dimension)),
        )
        .await?;
        info!(index = name, dimension, "index created");
        Ok(())
    }

    async fn bulk(&self, op: &'static str, ndjson: String) -> Result<(), VectorStoreError> {
        let rb = self
            .request(Method::POST, &format!("_bulk?refresh={}", self.refresh))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(ndjson);
        let resp = self.send_json(op, rb).await?;
        check_bulk_response(op, &resp)
    }
}

impl IndexBackend for OpenSearchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::TextSearch
    }

    fn score_scale(&self) -> ScoreScale {
        ScoreScale::CosinePlusOne
    }

    fn ensure_index<'a>(
        &'a self,
        name: &'a str,
        dimension: usize,
        policy: IndexPolicy,
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let exists = self.exists(name).await?;
            match plan_index(exists, policy) {
                IndexAction::Create => self.create(name, dimension).await,
                IndexAction::DropAndCreate => {
                    warn!(index = name, "recreating index; existing documents are dropped");
                    self.send_json("delete_index", self.request(Method::DELETE, name))
                        .await?;
                    self.create(name, dimension).await
                }
                IndexAction::VerifyExisting => {
                    let mapping = self
                        .send_json(
                            "get_mapping",
                            self.request(Method::GET, &format!("{name}/_mapping")),
                        )
                        .await?;
                    let stored = mapping_dimension(&mapping)?;
                    if stored != dimension {
                        return Err(VectorStoreError::DimensionMismatch {
                            got: dimension,
                            want: stored,
                        });
                    }
                    debug!(index = name, dimension, "index reused");
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
                debug!(index = name, docs = batch.len(), "bulk index");
                self.bulk("bulk_index", bulk_index_body(name, batch)?).await?;
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
            let resp = self
                .send_json(
                    "search",
                    self.request(Method::POST, &format!("{name}/_search"))
                        .json(&search_body(vector, top_k)),
                )
                .await?;
            parse_search_response(&resp)
        })
    }

    fn delete<'a>(
        &'a self,
        name: &'a str,
        ids: &'a [u64],
    ) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            for batch in ids.chunks(self.upsert_batch) {
                self.bulk("bulk_delete", bulk_delete_body(name, batch)?).await?;
            }
            Ok(())
        })
    }

    fn drop_index<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let (status, body) = self
                .send("delete_index", self.request(Method::DELETE, name))
                .await?;
            match status {
                s if s.is_success() => {
                    warn!(index = name, "index dropped");
                    Ok(())
                }
                StatusCode::NOT_FOUND => Ok(()),
                s => Err(status_error("delete_index", s, &body)),
            }
        })
    }

    fn count<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<u64, VectorStoreError>> {
        Box::pin(async move {
            let resp = self
                .send_json("count", self.request(Method::GET, &format!("{name}/_count")))
                .await?;
            resp.get("count")
                .and_then(Value::as_u64)
                .ok_or_else(|| VectorStoreError::SchemaDrift("_count response without 'count'".into()))
        })
    }
}

/* ------------------------------------------------------------------------- */
/* Bodies                                                                    */
/* ------------------------------------------------------------------------- */

pub(crate) fn index_mapping(dimension: usize) -> Value {
    json!({
        "mappings": {
            "properties": {
                "embedding": { "type": "dense_vector", "dims": dimension },
                "text": { "type": "text" }
            }
        }
    })
}

pub(crate) fn search_body(vector: &[f32], top_k: usize) -> Value {
    json!({
        "size": top_k,
        "_source": ["text"],
        "query": {
            "script_score": {
                "query": { "match_all": {} },
                "script": {
                    "source": COSINE_SCRIPT,
                    "params": { "query_vector": vector }
                }
            }
        }
    })
}

/// NDJSON for `_bulk` index actions; ids are written as strings.
pub(crate) fn bulk_index_body(index: &str, entries: &[IndexEntry]) -> Result<String, VectorStoreError> {
    let mut out = String::new();
    for e in entries {
        let action = json!({ "index": { "_index": index, "_id": e.id.to_string() } });
        let doc = json!({ "embedding": e.vector, "text": e.text });
        push_line(&mut out, &action)?;
        push_line(&mut out, &doc)?;
    }
    Ok(out)
}

pub(crate) fn bulk_delete_body(index: &str, ids: &[u64]) -> Result<String, VectorStoreError> {
    let mut out = String::new();
    for id in ids {
        push_line(&mut out, &json!({ "delete": { "_index": index, "_id": id.to_string() } }))?;
    }
    Ok(out)
}

fn push_line(out: &mut String, v: &Value) -> Result<(), VectorStoreError> {
    let line = serde_json::to_string(v)
        .map_err(|e| VectorStoreError::SchemaDrift(format!("unserializable bulk line: {e}")))?;
    out.push_str(&line);
    out.push('\n');
    Ok(())
}

/* ------------------------------------------------------------------------- */
/* Responses                                                                 */
/* ------------------------------------------------------------------------- */

/// Raw hits from a `_search` response. `_id` must be an integer string.
pub(crate) fn parse_search_response(resp: &Value) -> Result<Vec<RawHit>, VectorStoreError> {
    let hits = resp
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| VectorStoreError::SchemaDrift("search response without hits.hits".into()))?;

    let mut out = Vec::with_capacity(hits.len());
    for h in hits {
        let id = match h.get("_id") {
            Some(Value::String(s)) => s.parse::<u64>().map_err(|_| {
                VectorStoreError::SchemaDrift(format!("document id '{s}' is not an integer"))
            })?,
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
                VectorStoreError::SchemaDrift(format!("document id {n} is not a u64"))
            })?,
            _ => return Err(VectorStoreError::SchemaDrift("hit without _id".into())),
        };
        let score = h
            .get("_score")
            .and_then(Value::as_f64)
            .ok_or_else(|| VectorStoreError::SchemaDrift(format!("hit {id} without _score")))?
            as f32;
        let text = h
            .pointer("/_source/text")
            .and_then(Value::as_str)
            .ok_or_else(|| VectorStoreError::SchemaDrift(format!("hit {id} without _source.text")))?
            .to_string();
        out.push(RawHit { id, score, text });
    }
    Ok(out)
}

/// Fails on the first bulk item error. `not_found` deletes are not errors.
/// A top-level `errors: true` without any item error still fails.
pub(crate) fn check_bulk_response(op: &'static str, resp: &Value) -> Result<(), VectorStoreError> {
    if !resp.get("errors").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(());
    }
    let items = resp.get("items").and_then(Value::as_array);
    let failed = items.into_iter().flatten().find_map(|item| {
        let (_, result) = item.as_object()?.iter().next()?;
        let error = result.get("error")?;
        let id = result.get("_id").and_then(Value::as_str).unwrap_or("?");
        let reason = error
            .get("reason")
            .and_then(Value::as_str)
            .or_else(|| error.get("type").and_then(Value::as_str))
            .unwrap_or("unknown error");
        Some(format!("document {id}: {reason}"))
    });
    match failed {
        Some(reason) => Err(VectorStoreError::BackendRejected {
            backend: NAME,
            op,
            reason,
        }),
        None => Err(VectorStoreError::BackendRejected {
            backend: NAME,
            op,
            reason: "bulk request reported errors without item details".to_string(),
        }),
    }
}

/// Stored `dims` of the `embedding` field from a `_mapping` response.
pub(crate) fn mapping_dimension(resp: &Value) -> Result<usize, VectorStoreError> {
    resp.as_object()
        .and_then(|m| m.values().next())
        .and_then(|idx| idx.pointer("/mappings/properties/embedding"))
        .and_then(|f| f.get("dims").or_else(|| f.get("dimension")))
        .and_then(Value::as_u64)
        .map(|d| d as usize)
        .ok_or_else(|| VectorStoreError::SchemaDrift("index mapping has no embedding dims".into()))
}

fn map_transport_error(op: &'static str, e: reqwest::Error, after: Duration) -> VectorStoreError {
    if e.is_timeout() {
        VectorStoreError::BackendTimeout {
            backend: NAME,
            op,
            after,
        }
    } else {
        VectorStoreError::BackendUnavailable {
            backend: NAME,
            op,
            reason: e.to_string(),
        }
    }
}

fn status_error(op: &'static str, status: StatusCode, body: &str) -> VectorStoreError {
    let snippet: String = body.trim().chars().take(240).collect();
    let reason = format!("HTTP {status}: {snippet}");
    if status.is_server_error() {
        VectorStoreError::BackendUnavailable {
            backend: NAME,
            op,
            reason,
        }
    } else {
        VectorStoreError::BackendRejected {
            backend: NAME,
            op,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_declares_dense_vector_dims() {
        let m = index_mapping(384);
        assert_eq!(m.pointer("/mappings/properties/embedding/type").unwrap(), "dense_vector");
        assert_eq!(m.pointer("/mappings/properties/embedding/dims").unwrap(), 384);
        assert_eq!(m.pointer("/mappings/properties/text/type").unwrap(), "text");
    }

    #[test]
    fn search_body_uses_offset_cosine_script() {
        let b = search_body(&[0.5, -0.5], 3);
        assert_eq!(b["size"], 3);
        assert!(b.pointer("/query/script_score/query/match_all").is_some());
        assert_eq!(b.pointer("/query/script_score/script/source").unwrap(), COSINE_SCRIPT);
        assert_eq!(
            b.pointer("/query/script_score/script/params/query_vector").unwrap(),
            &json!([0.5, -0.5])
        );
    }

    #[test]
    fn bulk_index_body_is_action_then_source_per_entry() {
        let entries = vec![
            IndexEntry { id: 1, vector: vec![1.0], text: "cat".into() },
            IndexEntry { id: 2, vector: vec![0.0], text: "dog".into() },
        ];
        let body = bulk_index_body("docs", &entries).unwrap();
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));
        assert_eq!(lines[0], json!({"index": {"_index": "docs", "_id": "1"}}));
        assert_eq!(lines[1]["text"], "cat");
        assert_eq!(lines[3]["embedding"], json!([0.0]));
    }

    #[test]
    fn bulk_delete_targets_each_id() {
        let body = bulk_delete_body("docs", &[7, 9]).unwrap();
        assert!(body.ends_with('\n'));
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({"delete": {"_index": "docs", "_id": "7"}}),
                json!({"delete": {"_index": "docs", "_id": "9"}}),
            ]
        );
    }

    #[test]
    fn string_ids_are_parsed() {
        let resp = json!({"hits": {"hits": [
            {"_id": "2", "_score": 1.8, "_source": {"text": "foo"}},
            {"_id": 3, "_score": 1.1, "_source": {"text": "bar"}}
        ]}});
        let hits = parse_search_response(&resp).unwrap();
        assert_eq!(hits[0], RawHit { id: 2, score: 1.8, text: "foo".into() });
        assert_eq!(hits[1].id, 3);
    }

    #[test]
    fn non_numeric_ids_and_missing_text_are_schema_drift() {
        let bad_id = json!({"hits": {"hits": [{"_id": "abc", "_score": 1.0, "_source": {"text": "x"}}]}});
        assert!(matches!(parse_search_response(&bad_id), Err(VectorStoreError::SchemaDrift(_))));

        let no_text = json!({"hits": {"hits": [{"_id": "1", "_score": 1.0, "_source": {}}]}});
        assert!(matches!(parse_search_response(&no_text), Err(VectorStoreError::SchemaDrift(_))));
    }

    #[test]
    fn empty_hits_are_not_an_error() {
        let resp = json!({"hits": {"total": {"value": 0}, "hits": []}});
        assert!(parse_search_response(&resp).unwrap().is_empty());
    }

    #[test]
    fn bulk_item_errors_surface_as_rejected() {
        let resp = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 400, "error": {"type": "mapper_parsing_exception", "reason": "dims mismatch"}}}
            ]
        });
        let err = check_bulk_response("bulk_index", &resp).unwrap_err();
        match err {
            VectorStoreError::BackendRejected { reason, .. } => assert!(reason.contains("document 2: dims mismatch")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bulk_errors_flag_without_item_error_is_rejected() {
        let resp = json!({
            "errors": true,
            "items": [{"index": {"_id": "1", "status": 201}}]
        });
        assert!(matches!(
            check_bulk_response("bulk_index", &resp),
            Err(VectorStoreError::BackendRejected { op: "bulk_index", .. })
        ));
    }

    #[test]
    fn not_found_deletes_pass() {
        let resp = json!({
            "errors": false,
            "items": [{"delete": {"_id": "9", "status": 404, "result": "not_found"}}]
        });
        assert!(check_bulk_response("bulk_delete", &resp).is_ok());
    }

    #[test]
    fn mapping_dimension_is_read_from_first_index() {
        let resp = json!({"docs": {"mappings": {"properties": {"embedding": {"type": "dense_vector", "dims": 768}}}}});
        assert_eq!(mapping_dimension(&resp).unwrap(), 768);
        assert!(mapping_dimension(&json!({"docs": {"mappings": {}}})).is_err());
    }

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        assert!(status_error("search", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(!status_error("search", StatusCode::BAD_REQUEST, "bad").is_transient());
    }
}
