//! Qdrant adapter over the REST API.
//!
//! Transport failures and 5xx responses surface as `StoreUnavailable`, other
//! unexpected statuses and undecodable bodies as `StoreProtocol`. A missing
//! collection reads as empty for search, exists and delete.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use dockbay_core::{
    CollectionInfo, CollectionSchema, Distance, EmbeddingChunk, Error, FilterSpec, Metadata, PointId,
    Result, SearchHit, VectorIndex,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdrantSettings {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self { url: default_url(), api_key: None, timeout_secs: default_timeout_secs() }
    }
}

enum Reply {
    Body(Value),
    Missing,
}

pub struct QdrantVectorStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    schema: Arc<dyn CollectionSchema>,
    ensured: Mutex<HashSet<String>>,
}

impl QdrantVectorStore {
    pub fn new(settings: &QdrantSettings, schema: Arc<dyn CollectionSchema>) -> Result<Self> {
        let url = settings.url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(Error::InvalidConfig("qdrant.url is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("qdrant http client: {e}")))?;
        let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty());
        Ok(Self { http, base_url: url.to_string(), api_key, schema, ensured: Mutex::new(HashSet::new()) })
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Reply> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        if let Some(body) = &body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{method} {path}: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{method} {path}: reading body: {e}")))?;

        if status == StatusCode::NOT_FOUND {
            debug!(%method, path, "qdrant resource missing");
            return Ok(Reply::Missing);
        }
        if status.is_server_error() {
            warn!(%method, path, status = status.as_u16(), "qdrant server error");
            return Err(Error::StoreUnavailable(format!("{method} {path}: {status}: {text}")));
        }
        if !status.is_success() {
            return Err(Error::StoreProtocol(format!("{method} {path}: {status}: {text}")));
        }
        if text.trim().is_empty() {
            return Ok(Reply::Body(Value::Null));
        }
        serde_json::from_str(&text)
            .map(Reply::Body)
            .map_err(|e| Error::StoreProtocol(format!("{method} {path}: undecodable body: {e}")))
    }

    fn collection_path(&self, collection_key: &str) -> String {
        format!("/collections/{}", self.schema.physical_name(collection_key))
    }

    async fn ensure_collection(&self, collection_key: &str) -> Result<()> {
        if self.ensured.lock().contains(collection_key) {
            return Ok(());
        }
        match self.request(Method::GET, &self.collection_path(collection_key), None).await? {
            Reply::Body(_) => {
                self.ensured.lock().insert(collection_key.to_string());
                Ok(())
            }
            Reply::Missing => self.create_collection(collection_key).await,
        }
    }
}

/// `FilterSpec` → Qdrant filter JSON. `None` when the spec is empty.
pub fn build_filter(spec: &FilterSpec) -> Option<Value> {
    if spec.is_empty() {
        return None;
    }
    let conditions = |group: &dockbay_core::filter::Conditions| -> Vec<Value> {
        group
            .iter()
            .map(|(key, value)| match value {
                Value::Array(values) => json!({"key": key, "match": {"any": values}}),
                scalar => json!({"key": key, "match": {"value": scalar}}),
            })
            .collect()
    };
    let mut filter = serde_json::Map::new();
    for (name, group) in [("must", &spec.must), ("should", &spec.any), ("must_not", &spec.must_not)] {
        if !group.is_empty() {
            filter.insert(name.to_string(), Value::Array(conditions(group)));
        }
    }
    Some(Value::Object(filter))
}

fn point_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn protocol(path: &str, what: &str) -> Error {
    Error::StoreProtocol(format!("{path}: missing {what} in response"))
}

#[async_trait]
impl VectorIndex for QdrantVectorStore {
    async fn upsert(&self, chunk: EmbeddingChunk) -> Result<PointId> {
        let size = self.schema.vector_size(&chunk.collection_key);
        if chunk.vector.len() != size {
            return Err(Error::Validation(format!(
                "vector length {} does not match collection '{}' size {size}",
                chunk.vector.len(),
                chunk.collection_key
            )));
        }
        self.ensure_collection(&chunk.collection_key).await?;
        let id = Uuid::new_v4().to_string();
        let payload = chunk.payload();
        let body = json!({
            "points": [{
                "id": id,
                "vector": chunk.vector,
                "payload": payload,
            }]
        });
        let path = format!("{}/points?wait=true", self.collection_path(&chunk.collection_key));
        match self.request(Method::PUT, &path, Some(body)).await? {
            Reply::Body(_) => Ok(id),
            Reply::Missing => {
                self.ensured.lock().remove(&chunk.collection_key);
                Err(Error::StoreProtocol(format!("collection for '{}' vanished during upsert", chunk.collection_key)))
            }
        }
    }

    async fn exists_by_filter(&self, collection_key: &str, filter: &FilterSpec) -> Result<bool> {
        let mut body = json!({"limit": 1, "with_payload": false, "with_vector": false});
        if let Some(f) = build_filter(filter) {
            body["filter"] = f;
        }
        let path = format!("{}/points/scroll", self.collection_path(collection_key));
        match self.request(Method::POST, &path, Some(body)).await? {
            Reply::Missing => Ok(false),
            Reply::Body(v) => {
                let points = v["result"]["points"].as_array().ok_or_else(|| protocol(&path, "result.points"))?;
                Ok(!points.is_empty())
            }
        }
    }

    async fn delete_by_filter(&self, collection_key: &str, filter: &FilterSpec) -> Result<usize> {
        let qfilter = build_filter(filter).unwrap_or_else(|| json!({}));
        let base = self.collection_path(collection_key);
        let count_path = format!("{base}/points/count");
        let count = match self
            .request(Method::POST, &count_path, Some(json!({"filter": qfilter, "exact": true})))
            .await?
        {
            Reply::Missing => return Ok(0),
            Reply::Body(v) => v["result"]["count"].as_u64().ok_or_else(|| protocol(&count_path, "result.count"))?,
        };
        if count == 0 {
            return Ok(0);
        }
        let delete_path = format!("{base}/points/delete?wait=true");
        match self.request(Method::POST, &delete_path, Some(json!({"filter": qfilter}))).await? {
            Reply::Missing => Ok(0),
            Reply::Body(_) => {
                debug!(collection = collection_key, removed = count, "deleted points by filter");
                Ok(count as usize)
            }
        }
    }

    async fn search(
        &self,
        collection_key: &str,
        vector: &[f32],
        limit: usize,
        min_score: Option<f32>,
        filter: Option<&FilterSpec>,
    ) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut body = json!({"vector": vector, "limit": limit, "with_payload": true});
        if let Some(min) = min_score {
            body["score_threshold"] = json!(min);
        }
        if let Some(f) = filter.and_then(build_filter) {
            body["filter"] = f;
        }
        let path = format!("{}/points/search", self.collection_path(collection_key));
        let v = match self.request(Method::POST, &path, Some(body)).await? {
            Reply::Missing => return Ok(Vec::new()),
            Reply::Body(v) => v,
        };
        let points = v["result"].as_array().ok_or_else(|| protocol(&path, "result"))?;
        points
            .iter()
            .map(|p| {
                let id = point_id(&p["id"]).ok_or_else(|| protocol(&path, "point id"))?;
                let score = p["score"].as_f64().ok_or_else(|| protocol(&path, "score"))? as f32;
                let payload: Metadata = match &p["payload"] {
                    Value::Null => Metadata::new(),
                    other => serde_json::from_value(other.clone())
                        .map_err(|e| Error::StoreProtocol(format!("{path}: bad payload: {e}")))?,
                };
                Ok(SearchHit { id, score, payload })
            })
            .collect()
    }

    async fn create_collection(&self, collection_key: &str) -> Result<()> {
        let body = json!({
            "vectors": {
                "size": self.schema.vector_size(collection_key),
                "distance": self.schema.distance(collection_key).as_str(),
            }
        });
        let path = self.collection_path(collection_key);
        match self.request(Method::PUT, &path, Some(body)).await? {
            Reply::Body(_) => {
                info!(collection = collection_key, name = %self.schema.physical_name(collection_key), "created qdrant collection");
                self.ensured.lock().insert(collection_key.to_string());
                Ok(())
            }
            Reply::Missing => Err(Error::StoreProtocol(format!("PUT {path}: 404 creating collection"))),
        }
    }

    async fn delete_collection(&self, collection_key: &str) -> Result<()> {
        self.ensured.lock().remove(collection_key);
        self.request(Method::DELETE, &self.collection_path(collection_key), None).await?;
        Ok(())
    }

    async fn get_info(&self, collection_key: &str) -> Result<CollectionInfo> {
        let path = self.collection_path(collection_key);
        let v = match self.request(Method::GET, &path, None).await? {
            Reply::Missing => return Err(Error::NotFound(format!("collection '{collection_key}'"))),
            Reply::Body(v) => v,
        };
        let result = &v["result"];
        if !result.is_object() {
            return Err(protocol(&path, "result"));
        }
        let params = &result["config"]["params"]["vectors"];
        let vector_size = params["size"]
            .as_u64()
            .map_or_else(|| self.schema.vector_size(collection_key), |s| s as usize);
        let distance = params["distance"]
            .as_str()
            .and_then(Distance::parse)
            .unwrap_or_else(|| self.schema.distance(collection_key));
        let count = result["points_count"].as_u64().unwrap_or(0) as usize;
        Ok(CollectionInfo {
            collection_key: collection_key.to_string(),
            name: self.schema.physical_name(collection_key),
            vector_size,
            distance,
            count,
        })
    }
}
