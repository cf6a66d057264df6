//! Weaviate-flavored HTTP backend
//!
//! Talks to the index over its REST surface for schema and batch
//! operations and over GraphQL for queries. Batch upserts are chunked
//! and run through a bounded set of in-flight requests; the index
//! reports per-object outcomes which are folded into a [`BatchOutcome`]
//! instead of failing the call.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::schema::{ClassSchema, PropertySpec, PropertyType};
use super::{
    similarity_score, BatchOutcome, DocumentUpsert, FailedItem, FilterNode, IndexError,
    IndexResult, Operator, Predicate, QueryHit, QueryRequest, SchemaStatus, VectorIndex,
};

/// Objects per batch request.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Concurrent in-flight batch requests.
const DEFAULT_WORKERS: usize = 4;

pub struct HttpVectorIndex {
    client: reqwest::Client,
    base_url: String,
    batch_size: usize,
    workers: usize,
}

impl HttpVectorIndex {
    pub fn new(base_url: &str) -> Self {
        Self::with_batching(base_url, DEFAULT_BATCH_SIZE, DEFAULT_WORKERS)
    }

    pub fn with_batching(base_url: &str, batch_size: usize, workers: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            batch_size: batch_size.max(1),
            workers: workers.max(1),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    /// Upsert one chunk, mapping the index's per-object results.
    async fn upsert_chunk(
        &self,
        class_name: &str,
        chunk: Vec<DocumentUpsert>,
    ) -> IndexResult<BatchOutcome> {
        let ids: Vec<Uuid> = chunk.iter().map(|d| d.id).collect();
        let objects: Vec<Value> = chunk
            .into_iter()
            .map(|document| {
                json!({
                    "class": class_name,
                    "id": document.id.to_string(),
                    "vector": document.vector,
                    "properties": Value::Object(document.properties),
                })
            })
            .collect();

        let response = self
            .client
            .post(self.url("/batch/objects"))
            .json(&json!({ "objects": objects }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Backend(format!(
                "batch upsert returned {status}: {body}"
            )));
        }

        let results: Vec<Value> = response.json().await?;

        let mut outcome = BatchOutcome::default();
        for (position, result) in results.iter().enumerate() {
            match object_error(result) {
                Some(reason) => {
                    outcome.failed += 1;
                    outcome.failed_items.push(FailedItem {
                        id: ids.get(position).copied().unwrap_or_else(Uuid::nil),
                        reason,
                    });
                }
                None => outcome.successful += 1,
            }
        }

        // The index answered with fewer results than objects sent;
        // count the silent remainder as failed rather than lost.
        for id in ids.iter().skip(results.len()) {
            outcome.failed += 1;
            outcome.failed_items.push(FailedItem {
                id: *id,
                reason: "no result reported by index".to_string(),
            });
        }

        Ok(outcome)
    }

    async fn delete_where(&self, class_name: &str, filter: &FilterNode) -> IndexResult<u64> {
        let response = self
            .client
            .delete(self.url("/batch/objects"))
            .json(&json!({
                "match": {
                    "class": class_name,
                    "where": filter.to_where_json(),
                },
                "output": "minimal",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Backend(format!(
                "batch delete returned {status}: {body}"
            )));
        }

        let body: Value = response.json().await?;
        let results = &body["results"];
        let failed = results["failed"].as_u64().unwrap_or(0);
        if failed > 0 {
            return Err(IndexError::Backend(format!(
                "batch delete failed for {failed} objects"
            )));
        }

        Ok(results["successful"].as_u64().unwrap_or(0))
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn ensure_schema(&self, schema: &ClassSchema) -> IndexResult<SchemaStatus> {
        if let Some(live) = self.get_schema(&schema.class_name).await? {
            let problems = schema.incompatibilities(&live);
            if problems.is_empty() {
                debug!(class = %schema.class_name, "Index class already exists");
                return Ok(SchemaStatus::Exists);
            }
            return Ok(SchemaStatus::Incompatible {
                details: problems.join("; "),
            });
        }

        let response = self
            .client
            .post(self.url("/schema"))
            .json(&class_to_json(schema))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Backend(format!(
                "schema creation returned {status}: {body}"
            )));
        }

        info!(class = %schema.class_name, "Created index class");
        Ok(SchemaStatus::Created)
    }

    async fn get_schema(&self, class_name: &str) -> IndexResult<Option<ClassSchema>> {
        let response = self
            .client
            .get(self.url(&format!("/schema/{class_name}")))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: Value = response.json().await?;
                Ok(Some(class_from_json(&body)?))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(IndexError::Backend(format!(
                    "schema fetch returned {status}: {body}"
                )))
            }
        }
    }

    async fn upsert_batch(
        &self,
        class_name: &str,
        documents: Vec<DocumentUpsert>,
    ) -> IndexResult<BatchOutcome> {
        if documents.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let mut chunks = Vec::new();
        let mut documents = documents;
        while !documents.is_empty() {
            let take = self.batch_size.min(documents.len());
            chunks.push(documents.drain(..take).collect::<Vec<_>>());
        }

        let mut outcome = BatchOutcome::default();
        for window in chunks.chunks(self.workers) {
            let futures: Vec<_> = window
                .iter()
                .map(|chunk| self.upsert_chunk(class_name, chunk.clone()))
                .collect();
            for result in futures::future::join_all(futures).await {
                outcome.merge(result?);
            }
        }

        if outcome.failed > 0 {
            warn!(
                class = class_name,
                failed = outcome.failed,
                "Index rejected documents during batch upsert"
            );
        }
        Ok(outcome)
    }

    async fn delete_where_in(
        &self,
        class_name: &str,
        property: &str,
        values: &[i64],
    ) -> IndexResult<u64> {
        if values.is_empty() {
            return Ok(0);
        }

        let filter = FilterNode::or(
            values
                .iter()
                .map(|value| {
                    FilterNode::Leaf(Predicate::new(property, Operator::Equal, *value))
                })
                .collect(),
        );
        let removed = self.delete_where(class_name, &filter).await?;
        debug!(class = class_name, property, removed, "Deleted index documents");
        Ok(removed)
    }

    async fn query(&self, class_name: &str, request: QueryRequest) -> IndexResult<Vec<QueryHit>> {
        let properties = if request.return_properties.is_empty() {
            "_additional { id distance }".to_string()
        } else {
            format!(
                "{} _additional {{ id distance }}",
                request.return_properties.join(" ")
            )
        };

        let mut arguments = vec![format!("limit: {}", request.limit)];
        if let Some(vector) = &request.vector {
            let vector = vector
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            arguments.push(format!("nearVector: {{vector: [{vector}]}}"));
        }
        if let Some(filter) = &request.filter {
            arguments.push(format!("where: {}", filter.to_graphql()));
        }

        let query = format!(
            "{{ Get {{ {class_name}({}) {{ {properties} }} }} }}",
            arguments.join(", ")
        );

        let response = self
            .client
            .post(self.url("/graphql"))
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(IndexError::Backend(format!("query failed: {errors}")));
        }

        let hits = body["data"]["Get"][class_name]
            .as_array()
            .ok_or_else(|| {
                IndexError::InvalidResponse(format!("no result set for class {class_name}"))
            })?
            .iter()
            .map(|hit| hit_from_json(hit, request.vector.is_some()))
            .collect::<IndexResult<Vec<_>>>()?;

        Ok(hits)
    }

    async fn delete_all_documents(&self, class_name: &str) -> IndexResult<u64> {
        // Match everything: id >= 0 holds for every stored document.
        let filter = FilterNode::Leaf(Predicate::new(
            crate::domain::document::props::REPORT_ID,
            Operator::GreaterThanEqual,
            0,
        ));
        let removed = self.delete_where(class_name, &filter).await?;
        info!(class = class_name, removed, "Cleared index class");
        Ok(removed)
    }
}

fn object_error(result: &Value) -> Option<String> {
    let errors = &result["result"]["errors"]["error"];
    let messages: Vec<String> = errors
        .as_array()?
        .iter()
        .filter_map(|e| e["message"].as_str().map(str::to_string))
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

fn class_to_json(schema: &ClassSchema) -> Value {
    json!({
        "class": schema.class_name,
        "vectorizer": "none",
        "properties": schema
            .properties
            .iter()
            .map(|p| json!({ "name": p.name, "dataType": [p.data_type.as_str()] }))
            .collect::<Vec<_>>(),
    })
}

fn class_from_json(body: &Value) -> IndexResult<ClassSchema> {
    let class_name = body["class"]
        .as_str()
        .ok_or_else(|| IndexError::InvalidResponse("class definition without name".to_string()))?
        .to_string();

    let mut properties = Vec::new();
    if let Some(definitions) = body["properties"].as_array() {
        for definition in definitions {
            let name = definition["name"].as_str().ok_or_else(|| {
                IndexError::InvalidResponse("property without name".to_string())
            })?;
            let data_type = definition["dataType"]
                .as_array()
                .and_then(|types| types.first())
                .and_then(Value::as_str)
                .unwrap_or("text");
            properties.push(PropertySpec::new(name, parse_property_type(data_type)));
        }
    }

    Ok(ClassSchema {
        class_name,
        properties,
        dimension: 0,
    })
}

fn parse_property_type(name: &str) -> PropertyType {
    match name {
        "int" => PropertyType::Int,
        "number" => PropertyType::Number,
        "boolean" => PropertyType::Boolean,
        "date" => PropertyType::Date,
        "blob" => PropertyType::Blob,
        _ => PropertyType::Text,
    }
}

fn hit_from_json(hit: &Value, scored: bool) -> IndexResult<QueryHit> {
    let additional = &hit["_additional"];
    let id = additional["id"]
        .as_str()
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| IndexError::InvalidResponse("hit without an id".to_string()))?;

    let score = if scored {
        additional["distance"].as_f64().map(similarity_score)
    } else {
        None
    };

    let mut properties = Map::new();
    if let Some(object) = hit.as_object() {
        for (key, value) in object {
            if key != "_additional" {
                properties.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(QueryHit {
        id,
        score,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_error_extraction() {
        let failed = json!({
            "result": { "errors": { "error": [{ "message": "vector length mismatch" }] } }
        });
        assert_eq!(
            object_error(&failed),
            Some("vector length mismatch".to_string())
        );

        let succeeded = json!({ "result": { "status": "SUCCESS" } });
        assert_eq!(object_error(&succeeded), None);
    }

    #[test]
    fn test_class_json_round_trip() {
        let schema = super::super::schema::report_class("ReportImage", 512);
        let parsed = class_from_json(&class_to_json(&schema)).unwrap();
        assert_eq!(parsed.class_name, schema.class_name);
        assert_eq!(parsed.properties, schema.properties);
    }

    #[test]
    fn test_hit_parsing() {
        let id = Uuid::new_v4();
        let hit = json!({
            "breed": "Labrador",
            "_additional": { "id": id.to_string(), "distance": 0.25 }
        });

        let parsed = hit_from_json(&hit, true).unwrap();
        assert_eq!(parsed.id, id);
        assert_eq!(parsed.score, Some(0.75));
        assert_eq!(parsed.properties["breed"], json!("Labrador"));

        let unscored = hit_from_json(&hit, false).unwrap();
        assert_eq!(unscored.score, None);
    }
}
