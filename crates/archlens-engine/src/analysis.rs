//! Result types produced by the analyzer. All of them serialize, and all of
//! them are cacheable.

use archlens_cache::{estimate_json_size, CacheSizeEstimator, CacheStats};
use archlens_concurrent::SchedulerMetrics;
use archlens_core::{Component, ComponentCategory, ComponentId, Query};
use archlens_graph::{ImpactReport, RelationshipGraph, ValidationReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::time::Duration;

/// Fan-in/fan-out figures for one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplingMetrics {
    /// Incoming edges.
    pub afferent: usize,
    /// Outgoing edges.
    pub efferent: usize,
    /// `efferent / (afferent + efferent)`, 0 for an isolated component.
    pub instability: f64,
    /// Mean strength over outgoing edges, 0 when there are none.
    pub average_strength: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentAnalysis {
    pub component: Component,
    pub layer: String,
    /// Declared capabilities merged with the category defaults.
    pub capabilities: BTreeSet<String>,
    pub constraints: Vec<String>,
    pub dependencies: Vec<ComponentId>,
    pub dependents: Vec<ComponentId>,
    pub coupling: CouplingMetrics,
    pub in_cycle: bool,
    /// Components reachable in either direction.
    pub impact_radius: usize,
    /// Dependencies whose category this component's category may not use.
    pub layer_violations: Vec<ComponentId>,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub id: ComponentId,
    pub name: String,
    pub category: ComponentCategory,
    pub layer: String,
}

impl From<&Component> for ComponentSummary {
    fn from(component: &Component) -> Self {
        Self {
            id: component.id.clone(),
            name: component.name.clone(),
            category: component.category,
            layer: component.layer().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedComponent {
    pub id: ComponentId,
    pub hops: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedComponent {
    pub id: ComponentId,
    pub degree: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureOverview {
    pub component_count: usize,
    pub relationship_count: usize,
    pub implied_relationship_count: usize,
    pub by_category: BTreeMap<ComponentCategory, usize>,
    pub by_layer: BTreeMap<String, usize>,
    pub cycle_count: usize,
    pub most_connected: Vec<ConnectedComponent>,
}

/// Answer to a structured [`Query`], one variant per intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum QueryResponse {
    Component(ComponentAnalysis),
    Components(Vec<ComponentSummary>),
    Dependencies {
        component: ComponentId,
        related: Vec<RelatedComponent>,
    },
    Dependents {
        component: ComponentId,
        related: Vec<RelatedComponent>,
    },
    Impact(ImpactReport),
    Cycles(Vec<Vec<ComponentId>>),
    MostConnected(Vec<ConnectedComponent>),
    Overview(ArchitectureOverview),
    Validation(ValidationReport),
}

impl CacheSizeEstimator for ComponentAnalysis {
    fn estimate_size(&self) -> usize {
        estimate_json_size(self)
    }
}

impl CacheSizeEstimator for QueryResponse {
    fn estimate_size(&self) -> usize {
        estimate_json_size(self)
    }
}

/// A named query with ordering constraints, run through the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub name: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub query: Query,
}

impl FeatureDefinition {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            query,
        }
    }

    pub fn depends_on(mut self, feature: impl Into<String>) -> Self {
        self.dependencies.push(feature.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub components: usize,
    pub relationships: usize,
    pub implied_relationships: usize,
    pub cycles: usize,
    pub generation: u64,
    pub duration: Duration,
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub entity_cache: CacheStats,
    pub query_cache: CacheStats,
    pub scheduler: SchedulerMetrics,
    pub component_count: usize,
    pub relationship_count: usize,
    pub graph_generation: u64,
}

/// A built graph tagged with the registry generation it reflects.
#[derive(Debug)]
pub struct GraphSnapshot {
    pub generation: u64,
    pub graph: RelationshipGraph,
}

impl Deref for GraphSnapshot {
    type Target = RelationshipGraph;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}
