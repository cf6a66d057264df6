//! Embedded in-memory backend
//!
//! A brute-force cosine scan over a map of stored documents. Used for
//! development and tests; it honors the same contract as the HTTP
//! backend, including the vector-length check per item and local
//! evaluation of the filter grammar.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::schema::ClassSchema;
use super::{
    similarity_score, BatchOutcome, DocumentUpsert, FailedItem, IndexError, IndexResult,
    QueryHit, QueryRequest, SchemaStatus, VectorIndex,
};

#[derive(Debug, Clone)]
struct StoredDocument {
    vector: Vec<f32>,
    properties: Map<String, Value>,
}

#[derive(Default)]
struct Class {
    schema: Option<ClassSchema>,
    documents: HashMap<Uuid, StoredDocument>,
}

#[derive(Default)]
pub struct MemoryVectorIndex {
    classes: RwLock<HashMap<String, Class>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents, for assertions in tests.
    pub async fn document_count(&self, class_name: &str) -> usize {
        self.classes
            .read()
            .await
            .get(class_name)
            .map(|class| class.documents.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_schema(&self, schema: &ClassSchema) -> IndexResult<SchemaStatus> {
        let mut classes = self.classes.write().await;
        let class = classes.entry(schema.class_name.clone()).or_default();

        match &class.schema {
            None => {
                class.schema = Some(schema.clone());
                Ok(SchemaStatus::Created)
            }
            Some(live) => {
                let problems = schema.incompatibilities(live);
                if problems.is_empty() {
                    Ok(SchemaStatus::Exists)
                } else {
                    Ok(SchemaStatus::Incompatible {
                        details: problems.join("; "),
                    })
                }
            }
        }
    }

    async fn get_schema(&self, class_name: &str) -> IndexResult<Option<ClassSchema>> {
        Ok(self
            .classes
            .read()
            .await
            .get(class_name)
            .and_then(|class| class.schema.clone()))
    }

    async fn upsert_batch(
        &self,
        class_name: &str,
        documents: Vec<DocumentUpsert>,
    ) -> IndexResult<BatchOutcome> {
        let mut classes = self.classes.write().await;
        let class = classes
            .get_mut(class_name)
            .ok_or_else(|| IndexError::MissingClass(class_name.to_string()))?;

        let dimension = class.schema.as_ref().map(|s| s.dimension).unwrap_or(0);

        let mut outcome = BatchOutcome::default();
        for document in documents {
            if dimension > 0 && document.vector.len() != dimension {
                outcome.failed += 1;
                outcome.failed_items.push(FailedItem {
                    id: document.id,
                    reason: format!(
                        "vector length {} does not match dimension {dimension}",
                        document.vector.len()
                    ),
                });
                continue;
            }

            class.documents.insert(
                document.id,
                StoredDocument {
                    vector: document.vector,
                    properties: document.properties,
                },
            );
            outcome.successful += 1;
        }

        Ok(outcome)
    }

    async fn delete_where_in(
        &self,
        class_name: &str,
        property: &str,
        values: &[i64],
    ) -> IndexResult<u64> {
        let mut classes = self.classes.write().await;
        let class = classes
            .get_mut(class_name)
            .ok_or_else(|| IndexError::MissingClass(class_name.to_string()))?;

        let before = class.documents.len();
        class.documents.retain(|_, document| {
            !document
                .properties
                .get(property)
                .and_then(Value::as_i64)
                .map(|stored| values.contains(&stored))
                .unwrap_or(false)
        });

        Ok((before - class.documents.len()) as u64)
    }

    async fn query(&self, class_name: &str, request: QueryRequest) -> IndexResult<Vec<QueryHit>> {
        let classes = self.classes.read().await;
        let class = classes
            .get(class_name)
            .ok_or_else(|| IndexError::MissingClass(class_name.to_string()))?;

        let mut hits: Vec<QueryHit> = class
            .documents
            .iter()
            .filter(|(_, document)| {
                request
                    .filter
                    .as_ref()
                    .map(|filter| filter.matches(&document.properties))
                    .unwrap_or(true)
            })
            .map(|(id, document)| {
                let score = request
                    .vector
                    .as_ref()
                    .map(|query| similarity_score(cosine_distance(query, &document.vector)));
                QueryHit {
                    id: *id,
                    score,
                    properties: select_properties(
                        &document.properties,
                        &request.return_properties,
                    ),
                }
            })
            .collect();

        if request.vector.is_some() {
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn delete_all_documents(&self, class_name: &str) -> IndexResult<u64> {
        let mut classes = self.classes.write().await;
        let class = classes
            .get_mut(class_name)
            .ok_or_else(|| IndexError::MissingClass(class_name.to_string()))?;

        let removed = class.documents.len() as u64;
        class.documents.clear();
        Ok(removed)
    }
}

fn select_properties(stored: &Map<String, Value>, wanted: &[String]) -> Map<String, Value> {
    if wanted.is_empty() {
        return stored.clone();
    }
    wanted
        .iter()
        .filter_map(|name| stored.get(name).map(|value| (name.clone(), value.clone())))
        .collect()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::vector::filter::eq;
    use crate::infrastructure::vector::schema::report_class;
    use serde_json::json;

    const CLASS: &str = "ReportImage";

    fn upsert(id: Uuid, vector: Vec<f32>, pairs: &[(&str, Value)]) -> DocumentUpsert {
        let mut properties = Map::new();
        for (key, value) in pairs {
            properties.insert(key.to_string(), value.clone());
        }
        DocumentUpsert {
            id,
            vector,
            properties,
        }
    }

    async fn index_with_schema(dimension: usize) -> MemoryVectorIndex {
        let index = MemoryVectorIndex::new();
        index
            .ensure_schema(&report_class(CLASS, dimension))
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_id() {
        let index = index_with_schema(2).await;
        let id = Uuid::new_v4();

        for _ in 0..2 {
            let outcome = index
                .upsert_batch(CLASS, vec![upsert(id, vec![1.0, 0.0], &[])])
                .await
                .unwrap();
            assert_eq!(outcome.successful, 1);
        }
        assert_eq!(index.document_count(CLASS).await, 1);
    }

    #[tokio::test]
    async fn test_wrong_dimension_fails_only_that_item() {
        let index = index_with_schema(2).await;
        let bad = Uuid::new_v4();

        let outcome = index
            .upsert_batch(
                CLASS,
                vec![
                    upsert(bad, vec![1.0], &[]),
                    upsert(Uuid::new_v4(), vec![0.0, 1.0], &[]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.successful, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.failed_items[0].id, bad);
    }

    #[tokio::test]
    async fn test_delete_where_in_by_report_id() {
        let index = index_with_schema(2).await;
        for report_id in [1, 1, 2] {
            index
                .upsert_batch(
                    CLASS,
                    vec![upsert(
                        Uuid::new_v4(),
                        vec![1.0, 0.0],
                        &[("reportId", json!(report_id))],
                    )],
                )
                .await
                .unwrap();
        }

        let removed = index.delete_where_in(CLASS, "reportId", &[1]).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(index.document_count(CLASS).await, 1);
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity_and_filters() {
        let index = index_with_schema(2).await;
        let close = Uuid::new_v4();
        let far = Uuid::new_v4();
        let filtered_out = Uuid::new_v4();

        index
            .upsert_batch(
                CLASS,
                vec![
                    upsert(close, vec![1.0, 0.0], &[("resolved", json!(false))]),
                    upsert(far, vec![0.0, 1.0], &[("resolved", json!(false))]),
                    upsert(filtered_out, vec![1.0, 0.0], &[("resolved", json!(true))]),
                ],
            )
            .await
            .unwrap();

        let hits = index
            .query(
                CLASS,
                QueryRequest {
                    vector: Some(vec![1.0, 0.0]),
                    filter: Some(eq("resolved", false)),
                    limit: 10,
                    return_properties: vec![],
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, close);
        assert_eq!(hits[0].score, Some(1.0));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_attribute_only_query_carries_no_score() {
        let index = index_with_schema(2).await;
        index
            .upsert_batch(
                CLASS,
                vec![upsert(
                    Uuid::new_v4(),
                    vec![1.0, 0.0],
                    &[("breed", json!("Labrador"))],
                )],
            )
            .await
            .unwrap();

        let hits = index
            .query(
                CLASS,
                QueryRequest {
                    vector: None,
                    filter: Some(eq("breed", "Labrador")),
                    limit: 10,
                    return_properties: vec!["breed".to_string()],
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, None);
        assert_eq!(hits[0].properties.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_class_is_an_error() {
        let index = MemoryVectorIndex::new();
        let result = index.delete_all_documents("Nope").await;
        assert!(matches!(result, Err(IndexError::MissingClass(_))));
    }
}
