//! Generic client for the record store's HTTP API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config;
use crate::models::Scalar;

/// Failure while talking to the record store.
#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("record store returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("record store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("record store returned a malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    #[allow(dead_code)]
    Post,
}

/// Query parameters understood by the record store.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filter: Option<Value>,
    fields: Vec<&'static str>,
    sort: Option<&'static str>,
    limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn fields(mut self, fields: &[&'static str]) -> Self {
        self.fields = fields.to_vec();
        self
    }

    pub fn sort(mut self, sort: &'static str) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string form used by GET requests. Structured filters are
    /// JSON-encoded into a single parameter.
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.to_string()));
        }
        if !self.fields.is_empty() {
            pairs.push(("fields", self.fields.join(",")));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }

    /// JSON body form used by POST requests.
    fn to_body(&self) -> Value {
        let mut body = serde_json::Map::new();
        if let Some(filter) = &self.filter {
            body.insert("filter".to_string(), filter.clone());
        }
        if !self.fields.is_empty() {
            body.insert("fields".to_string(), Value::from(self.fields.clone()));
        }
        if let Some(sort) = self.sort {
            body.insert("sort".to_string(), Value::from(sort));
        }
        if let Some(limit) = self.limit {
            body.insert("limit".to_string(), Value::from(limit));
        }
        Value::Object(body)
    }
}

/// Equality filter in the record store's nested-operator form.
pub fn eq_filter(field: &str, value: impl Serialize) -> Value {
    let mut op = serde_json::Map::new();
    op.insert(
        "_eq".to_string(),
        serde_json::to_value(value).unwrap_or(Value::Null),
    );
    let mut filter = serde_json::Map::new();
    filter.insert(field.to_string(), Value::Object(op));
    Value::Object(filter)
}

/// Boundary to the record store, kept narrow so that the aggregation logic
/// can be exercised against an in-memory double.
#[async_trait]
pub trait Records: Send + Sync {
    async fn request(
        &self,
        endpoint: &str,
        method: Method,
        query: &Query,
    ) -> Result<Value, RecordsError>;
}

pub struct Directus {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl Directus {
    pub fn new(config: &config::Directus, client: reqwest::Client) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        }
    }

    /// Public URL of a file stored in the record store.
    pub fn asset_url(&self, file_id: &str) -> String {
        format!("{}/assets/{}", self.base_url, file_id)
    }
}

#[async_trait]
impl Records for Directus {
    async fn request(
        &self,
        endpoint: &str,
        method: Method,
        query: &Query,
    ) -> Result<Value, RecordsError> {
        let url =
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        log::debug!("{method:?} {url}");
        let request = match method {
            Method::Get => self.client.get(&url).query(&query.to_pairs()),
            Method::Post => self.client.post(&url).json(&query.to_body()),
        };
        let response = match request.bearer_auth(&self.token).send().await {
            Ok(response) => response,
            Err(e) => {
                crate::metrics::update_service("directus", false);
                return Err(e.into());
            }
        };
        let status = response.status();
        if !status.is_success() {
            crate::metrics::update_service("directus", false);
            let body = response.text().await.unwrap_or_default();
            return Err(RecordsError::Status { status, body });
        }
        crate::metrics::update_service("directus", true);
        Ok(response.json().await?)
    }
}

/// Fetch the first record of a filtered collection query.
pub async fn fetch_first<T, R>(
    records: &R,
    endpoint: &str,
    query: Query,
) -> Result<Option<T>, RecordsError>
where
    T: DeserializeOwned,
    R: Records + ?Sized,
{
    let response = records.request(endpoint, Method::Get, &query).await?;
    match response
        .get("data")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
    {
        Some(item) => Ok(Some(serde_json::from_value(item.clone())?)),
        None => Ok(None),
    }
}

/// Fetch every record matched by a collection query.
pub async fn fetch_all<T, R>(
    records: &R,
    endpoint: &str,
    query: Query,
) -> Result<Vec<T>, RecordsError>
where
    T: DeserializeOwned,
    R: Records + ?Sized,
{
    let response = records.request(endpoint, Method::Get, &query).await?;
    match response.get("data").and_then(Value::as_array) {
        Some(items) => Ok(items
            .iter()
            .map(|item| serde_json::from_value(item.clone()))
            .collect::<Result<_, _>>()?),
        None => Ok(Vec::new()),
    }
}

/// Fetch a single record by primary key. The store answers 403 for ids it
/// does not know, so both 403 and 404 count as "no such record".
pub async fn fetch_by_id<T, R>(
    records: &R,
    collection: &str,
    id: &Scalar,
    fields: &[&'static str],
) -> Result<Option<T>, RecordsError>
where
    T: DeserializeOwned,
    R: Records + ?Sized,
{
    let endpoint = format!("{collection}/{id}");
    let query = Query::new().fields(fields);
    match records.request(&endpoint, Method::Get, &query).await {
        Ok(response) => match response.get("data") {
            Some(data) if !data.is_null() => {
                Ok(Some(serde_json::from_value(data.clone())?))
            }
            _ => Ok(None),
        },
        Err(RecordsError::Status { status, .. })
            if status == StatusCode::NOT_FOUND
                || status == StatusCode::FORBIDDEN =>
        {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// In-memory stand-in for the record store, keyed by endpoint path.
    /// Unknown endpoints answer 403 like the real store does.
    #[derive(Default)]
    pub struct FakeRecords {
        responses: HashMap<String, Value>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeRecords {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `data` under `endpoint`.
        pub fn with(mut self, endpoint: &str, data: Value) -> Self {
            self.responses
                .insert(endpoint.to_string(), json!({ "data": data }));
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Records for FakeRecords {
        async fn request(
            &self,
            endpoint: &str,
            _method: Method,
            _query: &Query,
        ) -> Result<Value, RecordsError> {
            self.requests.lock().unwrap().push(endpoint.to_string());
            match self.responses.get(endpoint) {
                Some(response) => Ok(response.clone()),
                None => Err(RecordsError::Status {
                    status: StatusCode::FORBIDDEN,
                    body: String::new(),
                }),
            }
        }
    }
}
