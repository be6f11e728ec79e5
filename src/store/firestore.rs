//! Firestore REST (v1) backend.
//!
//! Documents travel as Firestore typed values (`{"stringValue": ...}`, `{"mapValue": ...}`);
//! `encode_fields`/`decode_fields` translate to and from plain JSON objects.
//! Auth is a bearer access token; with FIRESTORE_EMULATOR_HOST set we talk plain HTTP
//! to the emulator and send no token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::{json, Map, Number, Value};
use tracing::{debug, instrument};

use super::{DocumentStore, StoreError};
use crate::config::StoreSettings;
use crate::util::trunc_for_log;

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

#[derive(Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    access_token: Option<String>,
}

impl FirestoreStore {
    /// Needs a project id, plus either an access token or an emulator host.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, StoreError> {
        let project_id = settings
            .firestore_project_id
            .clone()
            .ok_or_else(|| StoreError::Backend("FIRESTORE_PROJECT_ID is not set".into()))?;

        let (base_url, access_token) = match &settings.firestore_emulator_host {
            Some(host) => (format!("http://{}/v1", host.trim_end_matches('/')), None),
            None => {
                let token = settings
                    .firestore_access_token
                    .clone()
                    .ok_or_else(|| StoreError::Backend("FIRESTORE_ACCESS_TOKEN is not set".into()))?;
                (FIRESTORE_BASE.to_string(), Some(token))
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self { client, base_url, project_id, access_token })
    }

    fn url(&self, collection: &str, id: Option<&str>) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| StoreError::Backend(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Backend("invalid Firestore base URL".into()))?;
            segments.extend(["projects", self.project_id.as_str(), "databases", "(default)", "documents", collection]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        self.authorized(req).send().await.map_err(|e| StoreError::Transport(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    #[instrument(level = "debug", skip(self, doc), fields(%collection, %id))]
    async fn set(&self, collection: &str, id: &str, doc: Value) -> Result<(), StoreError> {
        let body = json!({ "fields": encode_fields(&doc)? });
        // PATCH without an update mask replaces the whole document, creating it if absent.
        let res = self.send(self.client.patch(self.url(collection, Some(id))?).json(&body)).await?;
        ensure_success(res).await.map(|_| ())
    }

    #[instrument(level = "debug", skip(self, doc), fields(%collection))]
    async fn add(&self, collection: &str, doc: Value) -> Result<String, StoreError> {
        let body = json!({ "fields": encode_fields(&doc)? });
        let res = self.send(self.client.post(self.url(collection, None)?).json(&body)).await?;
        let created: Value = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        let id = created
            .get("name")
            .and_then(Value::as_str)
            .and_then(document_id)
            .ok_or_else(|| StoreError::Encoding("Firestore response has no document name".into()))?;
        debug!(target: "store", %collection, %id, "Firestore document created");
        Ok(id)
    }

    #[instrument(level = "debug", skip(self), fields(%collection, %id))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let res = self.send(self.client.get(self.url(collection, Some(id))?)).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc: Value = ensure_success(res)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Encoding(e.to_string()))?;
        match doc.get("fields") {
            Some(fields) => decode_fields(fields).map(Some),
            None => Ok(Some(Value::Object(Map::new()))),
        }
    }

    fn describe(&self) -> String {
        format!("firestore({})", self.project_id)
    }
}

async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| trunc_for_log(&body, 200));
    Err(StoreError::Backend(format!("Firestore HTTP {}: {}", status.as_u16(), message)))
}

/// "projects/p/databases/(default)/documents/exam_results/AbC" -> "AbC"
fn document_id(name: &str) -> Option<String> {
    name.rsplit('/').next().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Encode a JSON object as a Firestore `fields` map.
pub fn encode_fields(doc: &Value) -> Result<Value, StoreError> {
    match doc {
        Value::Object(map) => Ok(Value::Object(
            map.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect(),
        )),
        _ => Err(StoreError::Encoding("documents must be JSON objects".into())),
    }
}

pub fn encode_value(v: &Value) -> Value {
    match v {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(v).unwrap_or_default() } }),
    }
}

/// Decode a Firestore `fields` map into a plain JSON object.
pub fn decode_fields(fields: &Value) -> Result<Value, StoreError> {
    let map = fields
        .as_object()
        .ok_or_else(|| StoreError::Encoding("Firestore fields must be an object".into()))?;
    let mut out = Map::with_capacity(map.len());
    for (k, v) in map {
        out.insert(k.clone(), decode_value(v)?);
    }
    Ok(Value::Object(out))
}

pub fn decode_value(v: &Value) -> Result<Value, StoreError> {
    let obj = v
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| StoreError::Encoding(format!("not a Firestore value: {}", trunc_for_log(&v.to_string(), 80))))?;
    let (kind, inner) = obj.iter().next().ok_or_else(|| StoreError::Encoding("empty value".into()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or(false))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|n| Value::Number(n.into()))
                .ok_or_else(|| StoreError::Encoding(format!("bad integerValue: {inner}")))
        }
        // Firestore sends NaN/Infinity as strings; JSON cannot carry them.
        "doubleValue" => Ok(inner.as_f64().and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner.get("values").and_then(Value::as_array).cloned().unwrap_or_default();
            values.iter().map(decode_value).collect::<Result<Vec<_>, _>>().map(Value::Array)
        }
        "mapValue" => match inner.get("fields") {
            Some(fields) => decode_fields(fields),
            None => Ok(Value::Object(Map::new())),
        },
        other => Err(StoreError::Encoding(format!("unsupported Firestore value type: {other}"))),
    }
}
