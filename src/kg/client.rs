//! Knowledge-graph REST client

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::{header, Client};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::types::*;
use crate::config::KnowledgeGraphConfig;
use crate::error::{Error, Result};

/// Read-only client for the knowledge-graph API
#[derive(Clone)]
pub struct KnowledgeGraphClient {
    /// HTTP client with auth headers preset
    client: Client,
    /// Base URL, normalized; empty when unconfigured
    base_url: String,
    /// Outcome of the last `stats()` call
    reachable: Arc<AtomicBool>,
}

impl KnowledgeGraphClient {
    /// Create a client from configuration
    pub fn new(config: &KnowledgeGraphConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.token.expose_secret()))
                .map_err(|e| Error::Config(format!("Invalid knowledge graph token: {}", e)))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(KnowledgeGraphClient {
            client,
            base_url: config.normalized_url(),
            reachable: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    /// Whether the last `stats()` call succeeded
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Row counts; also updates reachability
    pub async fn stats(&self) -> Result<KgStats> {
        let result = match self.endpoint("/api/stats") {
            Ok(url) => self.get(url).await,
            Err(e) => Err(e),
        };
        self.reachable.store(result.is_ok(), Ordering::Relaxed);
        result
    }

    /// Entities, optionally limited to one type
    pub async fn entities(&self, entity_type: Option<&str>) -> Result<Vec<Entity>> {
        let mut url = self.endpoint("/api/entities")?;
        if let Some(entity_type) = entity_type {
            url.query_pairs_mut().append_pair("type", entity_type);
        }
        self.get(url).await
    }

    /// One entity with its facts, relationships, events and tasks
    pub async fn entity(&self, name: &str) -> Result<Entity> {
        let mut url = self.endpoint("/api/entity")?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.clone()))?
            .push(name);
        self.get(url).await
    }

    /// Tasks, optionally limited to one status
    pub async fn tasks(&self, status: Option<&str>) -> Result<Vec<AgentTask>> {
        let mut url = self.endpoint("/api/tasks")?;
        if let Some(status) = status {
            url.query_pairs_mut().append_pair("status", status);
        }
        self.get(url).await
    }

    /// Relationships touching an entity
    pub async fn relationships(&self, entity: &str) -> Result<Vec<Relationship>> {
        let mut url = self.endpoint("/api/relationships")?;
        url.query_pairs_mut().append_pair("entity", entity);
        self.get(url).await
    }

    /// The whole graph as nodes and edges
    pub async fn graph(&self) -> Result<GraphData> {
        let url = self.endpoint("/api/graph")?;
        self.get(url).await
    }

    /// Full-text search. An empty query returns nothing without a request.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let mut url = self.endpoint("/api/search")?;
        url.query_pairs_mut().append_pair("q", query);
        self.get(url).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        if self.base_url.is_empty() {
            return Err(Error::NotConfigured("knowledge graph URL".to_string()));
        }
        Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Knowledge graph error: status={}, url={}", status, url);
            return Err(Error::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Decode(format!("{}: {}", url.path(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> KnowledgeGraphClient {
        let config = KnowledgeGraphConfig {
            url: format!("{}/", server.uri()),
            token: SecretString::from("kg-token".to_string()),
            timeout: Duration::from_secs(5),
        };
        KnowledgeGraphClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_stats_sends_bearer_and_marks_reachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .and(header("authorization", "Bearer kg-token"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entity_count": 3, "task_count": 1
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(!client.is_reachable());

        let stats = client.stats().await.unwrap();
        assert_eq!(stats.entity_count, Some(3));
        assert!(client.is_reachable());
    }

    #[tokio::test]
    async fn test_stats_failure_marks_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.stats().await.unwrap_err();
        assert!(matches!(err, Error::Remote { status: 503, ref body } if body == "down"));
        assert_eq!(err.to_string(), "HTTP 503: down");
        assert!(!client.is_reachable());
    }

    #[tokio::test]
    async fn test_entities_with_type_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/entities"))
            .and(query_param("type", "person"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "type": "person", "name": "Ada"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let entities = client
            .entities(EntityTypeFilter::People.api_value())
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].name, "Ada");
    }

    #[tokio::test]
    async fn test_entity_name_is_path_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/entity/Ada%20Lovelace%2FAI"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1, "type": "person", "name": "Ada Lovelace/AI",
                "facts": [{"id": 9, "key": "born", "value": "1815"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let entity = client.entity("Ada Lovelace/AI").await.unwrap();
        assert_eq!(entity.fact_count(), 1);
    }

    #[tokio::test]
    async fn test_tasks_relationships_and_graph() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tasks"))
            .and(query_param("status", "in_progress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "name": "ship", "status": "in_progress", "priority": "high"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/relationships"))
            .and(query_param("entity", "Acme & Co"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 4, "relation_type": "owns", "source_entity": "Acme & Co"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/graph"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": [{"id": 1, "name": "Ada", "type": "person", "fact_count": 2}],
                "edges": [{"id": 5, "source": 1, "target": 1, "relation_type": "self"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let tasks = client.tasks(TaskFilter::InProgress.api_value()).await.unwrap();
        assert_eq!(tasks[0].priority_level(), 3);

        let relationships = client.relationships("Acme & Co").await.unwrap();
        assert_eq!(relationships[0].relation_type, "owns");

        let graph = client.graph().await.unwrap();
        assert_eq!(graph.nodes[0].fact_count, Some(2));
        assert_eq!(graph.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("q", "graph db"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 2, "name": "Neo", "type": "technology", "score": 0.8}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.search("").await.unwrap().is_empty());

        let results = client.search("graph db").await.unwrap();
        assert_eq!(results[0].result_type, "technology");
    }

    #[tokio::test]
    async fn test_bad_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/graph"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(client.graph().await, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let client = KnowledgeGraphClient::new(&KnowledgeGraphConfig::default()).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(client.graph().await, Err(Error::NotConfigured(_))));
        assert!(matches!(client.stats().await, Err(Error::NotConfigured(_))));
        assert!(!client.is_reachable());
    }
}
