//! Knowledge-graph API models
//!
//! Field names follow the API's snake_case JSON.

use serde::{Deserialize, Serialize};

/// A node of the knowledge graph with optional detail collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub facts: Option<Vec<Fact>>,
    #[serde(default)]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default)]
    pub events: Option<Vec<EntityEvent>>,
    #[serde(default)]
    pub tasks: Option<Vec<AgentTask>>,
}

impl Entity {
    pub fn fact_count(&self) -> usize {
        self.facts.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: i64,
    #[serde(default)]
    pub entity_id: Option<i64>,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    #[serde(default)]
    pub source_entity_id: Option<i64>,
    #[serde(default)]
    pub target_entity_id: Option<i64>,
    pub relation_type: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub strength: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Source entity name, when the API resolves it
    #[serde(default)]
    pub source_entity: Option<String>,
    /// Target entity name, when the API resolves it
    #[serde(default)]
    pub target_entity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEvent {
    pub id: i64,
    #[serde(default)]
    pub entity_id: Option<i64>,
    pub event_type: String,
    pub description: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A task tracked by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub linked_entities: Option<Vec<String>>,
    #[serde(default)]
    pub parent_task_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl AgentTask {
    /// Sort key for priority: critical 4, high 3, medium 2, low 1, unknown 0.
    /// A missing priority counts as medium.
    pub fn priority_level(&self) -> u8 {
        match self.priority.as_deref().unwrap_or("medium").to_lowercase().as_str() {
            "critical" => 4,
            "high" => 3,
            "medium" => 2,
            "low" => 1,
            _ => 0,
        }
    }

    pub fn linked_entity_count(&self) -> usize {
        self.linked_entities.as_ref().map_or(0, Vec::len)
    }

    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("completed")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub fact_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    pub relation_type: String,
    #[serde(default)]
    pub strength: Option<f64>,
}

/// Row counts reported by `/api/stats`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KgStats {
    #[serde(default)]
    pub entity_count: Option<i64>,
    #[serde(default)]
    pub fact_count: Option<i64>,
    #[serde(default)]
    pub relationship_count: Option<i64>,
    #[serde(default)]
    pub event_count: Option<i64>,
    #[serde(default)]
    pub task_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub result_type: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Task list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    InProgress,
    Pending,
    Completed,
}

impl TaskFilter {
    pub const ALL: [TaskFilter; 4] = [
        TaskFilter::All,
        TaskFilter::InProgress,
        TaskFilter::Pending,
        TaskFilter::Completed,
    ];

    /// Value of the `status` query parameter; `None` means no filter
    pub fn api_value(self) -> Option<&'static str> {
        match self {
            TaskFilter::All => None,
            TaskFilter::InProgress => Some("in_progress"),
            TaskFilter::Pending => Some("pending"),
            TaskFilter::Completed => Some("completed"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskFilter::All => "All",
            TaskFilter::InProgress => "In Progress",
            TaskFilter::Pending => "Pending",
            TaskFilter::Completed => "Completed",
        }
    }
}

/// Entity list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityTypeFilter {
    #[default]
    All,
    People,
    Companies,
    Projects,
}

impl EntityTypeFilter {
    pub const ALL: [EntityTypeFilter; 4] = [
        EntityTypeFilter::All,
        EntityTypeFilter::People,
        EntityTypeFilter::Companies,
        EntityTypeFilter::Projects,
    ];

    /// Value of the `type` query parameter; `None` means no filter
    pub fn api_value(self) -> Option<&'static str> {
        match self {
            EntityTypeFilter::All => None,
            EntityTypeFilter::People => Some("person"),
            EntityTypeFilter::Companies => Some("company"),
            EntityTypeFilter::Projects => Some("project"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityTypeFilter::All => "All",
            EntityTypeFilter::People => "People",
            EntityTypeFilter::Companies => "Companies",
            EntityTypeFilter::Projects => "Projects",
        }
    }
}
