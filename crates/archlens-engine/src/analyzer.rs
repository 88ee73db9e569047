use crate::analysis::{
    ArchitectureOverview, ComponentAnalysis, ComponentSummary, ConnectedComponent,
    CouplingMetrics, DiscoveryReport, EngineMetrics, FeatureDefinition, GraphSnapshot,
    QueryResponse, RelatedComponent,
};
use arc_swap::ArcSwapOption;
use archlens_cache::{CacheConfig, ComponentResultCache, QueryResultCache};
use archlens_concurrent::{
    ConcurrentScheduler, Operation, ScheduledTask, SchedulerConfig, TaskResult,
};
use archlens_core::{
    params, ArchLensConfig, ArchLensError, Component, ComponentCategory, ComponentId,
    DiscoverySource, Query, QueryIntent, Result,
};
use archlens_graph::{
    validate, ComponentRegistry, ImpliedRelationshipStrategy, NameMatchStrategy,
    RelationshipGraph, ValidationReport,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

const DEFAULT_MOST_CONNECTED: usize = 5;
const DEFAULT_DEPENDENCY_DEPTH: usize = 1;

/// Entry point wiring registry, graph, caches and scheduler together.
///
/// Construct one per process and share it behind an `Arc`. The graph is
/// rebuilt lazily whenever the registry generation moves, and every rebuild
/// empties both caches. A result is only cached if the registry generation it
/// was computed from is still current when it is stored.
pub struct ArchitectureAnalyzer {
    registry: ComponentRegistry,
    discovery: Box<dyn DiscoverySource>,
    strategy: Box<dyn ImpliedRelationshipStrategy>,
    graph: ArcSwapOption<GraphSnapshot>,
    entity_cache: ComponentResultCache<Arc<ComponentAnalysis>>,
    query_cache: QueryResultCache<Arc<QueryResponse>>,
    scheduler: ConcurrentScheduler,
    /// Held shared by cache writes, exclusively by graph rebuilds.
    cache_gate: RwLock<()>,
}

impl ArchitectureAnalyzer {
    pub fn new<D>(config: &ArchLensConfig, discovery: D) -> Self
    where
        D: DiscoverySource + 'static,
    {
        Self {
            registry: ComponentRegistry::new(),
            discovery: Box::new(discovery),
            strategy: Box::new(NameMatchStrategy::default()),
            graph: ArcSwapOption::empty(),
            entity_cache: ComponentResultCache::new(CacheConfig::from(&config.cache.entity)),
            query_cache: QueryResultCache::new(CacheConfig::from(&config.cache.query)),
            scheduler: ConcurrentScheduler::new(SchedulerConfig::from(&config.scheduler)),
            cache_gate: RwLock::new(()),
        }
    }

    /// Replace the implied-relationship heuristic. Takes effect on the next
    /// graph build.
    pub fn with_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ImpliedRelationshipStrategy + 'static,
    {
        self.strategy = Box::new(strategy);
        self.graph.store(None);
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &ConcurrentScheduler {
        &self.scheduler
    }

    /// Replace the registry contents with a fresh discovery pass.
    ///
    /// A failing discovery source leaves the previous component set intact.
    pub async fn discover(&self) -> Result<DiscoveryReport> {
        let start = Instant::now();
        let components = self.discovery.discover().await?;

        self.registry.clear();
        let count = self.registry.register_all(components);
        let snapshot = self.rebuild_graph(self.registry.generation());

        let report = DiscoveryReport {
            components: count,
            relationships: snapshot.relationship_count(),
            implied_relationships: snapshot.relationships().iter().filter(|r| r.implied).count(),
            cycles: snapshot.detect_cycles().len(),
            generation: snapshot.generation,
            duration: start.elapsed(),
            discovered_at: Utc::now(),
        };
        info!(
            components = report.components,
            relationships = report.relationships,
            implied = report.implied_relationships,
            cycles = report.cycles,
            elapsed_ms = report.duration.as_millis() as u64,
            "discovery pass complete"
        );
        Ok(report)
    }

    /// Graph for the current registry contents.
    pub fn graph(&self) -> Arc<GraphSnapshot> {
        let generation = self.registry.generation();
        match self.graph.load_full() {
            Some(current) if current.generation == generation => current,
            _ => self.rebuild_graph(generation),
        }
    }

    fn rebuild_graph(&self, generation: u64) -> Arc<GraphSnapshot> {
        let _gate = self.cache_gate.write();
        if let Some(current) = self.graph.load_full() {
            if current.generation >= generation {
                return current;
            }
        }

        let dropped = self.entity_cache.invalidate_all() + self.query_cache.invalidate_all();
        let components = self.registry.get_all();
        let snapshot = Arc::new(GraphSnapshot {
            generation,
            graph: RelationshipGraph::build_with(&components, self.strategy.as_ref()),
        });
        self.graph.store(Some(Arc::clone(&snapshot)));

        debug!(generation, dropped, "graph snapshot replaced");
        snapshot
    }

    /// Run `store` unless the registry moved past `generation`.
    fn cache_if_current(&self, generation: u64, store: impl FnOnce()) -> bool {
        let _gate = self.cache_gate.read();
        let current = self.registry.generation();
        if current != generation {
            trace!(generation, current, "result computed from an outdated graph, not cached");
            return false;
        }
        store();
        true
    }

    pub fn component(&self, id: &str) -> Option<Component> {
        self.registry.get(id)
    }

    pub fn components(&self) -> Vec<Component> {
        self.registry.get_all()
    }

    pub fn analyze_component(&self, id: &str) -> Result<Arc<ComponentAnalysis>> {
        let graph = self.graph();
        if let Some(hit) = self.entity_cache.get(id) {
            trace!(id, "component analysis served from cache");
            return Ok(hit);
        }

        let component = self
            .registry
            .get(id)
            .ok_or_else(|| ArchLensError::ComponentNotFound(id.to_string()))?;
        let analysis = Arc::new(self.build_analysis(&graph, component));
        self.cache_if_current(graph.generation, || {
            self.entity_cache.put(id, Arc::clone(&analysis));
        });
        Ok(analysis)
    }

    fn build_analysis(&self, graph: &RelationshipGraph, component: Component) -> ComponentAnalysis {
        let id = component.id.as_str();
        let profile = component.category.profile();

        let outgoing = graph.relationships_of(id);
        let afferent = graph.in_degree(id);
        let efferent = outgoing.len();
        let coupling = CouplingMetrics {
            afferent,
            efferent,
            instability: if afferent + efferent == 0 {
                0.0
            } else {
                efferent as f64 / (afferent + efferent) as f64
            },
            average_strength: if efferent == 0 {
                0.0
            } else {
                outgoing.iter().map(|r| r.strength).sum::<f64>() / efferent as f64
            },
        };

        let mut capabilities: BTreeSet<String> = profile
            .default_capabilities
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut constraints: Vec<String> = profile
            .default_constraints
            .iter()
            .map(|c| c.to_string())
            .collect();
        if let Some(metadata) = &component.metadata {
            capabilities.extend(metadata.provided_capabilities.iter().cloned());
            for constraint in &metadata.constraints {
                if !constraints.contains(constraint) {
                    constraints.push(constraint.clone());
                }
            }
        }

        let dependencies = graph.dependencies_of(id);
        let layer_violations = dependencies
            .iter()
            .filter(|dep| dep.as_str() != id && component.category != ComponentCategory::Unknown)
            .filter(|dep| {
                self.registry
                    .get(dep)
                    .map(|target| {
                        target.category != ComponentCategory::Unknown
                            && !profile.allows_dependency_on(target.category)
                    })
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        ComponentAnalysis {
            layer: component.layer().to_string(),
            capabilities,
            constraints,
            dependents: graph.dependents_of(id),
            dependencies,
            coupling,
            in_cycle: graph
                .detect_cycles()
                .iter()
                .any(|cycle| cycle.iter().any(|member| member == id)),
            impact_radius: graph.impact_of(id, 0).total_affected(),
            layer_violations,
            analyzed_at: Utc::now(),
            component,
        }
    }

    /// Answer a structured query, serving repeats from the query cache.
    pub fn handle_query(&self, query: &Query) -> Result<Arc<QueryResponse>> {
        if query.intent == QueryIntent::Unknown {
            return Err(ArchLensError::UnsupportedQuery(query.cache_key()));
        }

        let graph = self.graph();
        if let Some(hit) = self.query_cache.get_query(query) {
            trace!(intent = %query.intent, "query served from cache");
            return Ok(hit);
        }

        let response = Arc::new(self.answer(&graph, query)?);
        self.cache_if_current(graph.generation, || {
            self.query_cache.put_query(query, Arc::clone(&response));
        });
        Ok(response)
    }

    fn answer(&self, graph: &RelationshipGraph, query: &Query) -> Result<QueryResponse> {
        let response = match query.intent {
            QueryIntent::DescribeComponent => {
                let id = self.resolve_component(graph, query)?;
                QueryResponse::Component(self.analyze_component(&id)?.as_ref().clone())
            }
            QueryIntent::ListComponents => {
                let category: Option<ComponentCategory> =
                    query.param(params::CATEGORY).and_then(|c| c.parse().ok());
                QueryResponse::Components(
                    self.registry
                        .get_all()
                        .iter()
                        .filter(|c| category.map_or(true, |wanted| c.category == wanted))
                        .map(ComponentSummary::from)
                        .collect(),
                )
            }
            QueryIntent::FindDependencies => {
                let id = self.resolve_component(graph, query)?;
                let depth = query
                    .usize_param(params::DEPTH)
                    .unwrap_or(DEFAULT_DEPENDENCY_DEPTH);
                QueryResponse::Dependencies {
                    related: related(graph.transitive_dependencies(&id, depth)),
                    component: id,
                }
            }
            QueryIntent::FindDependents => {
                let id = self.resolve_component(graph, query)?;
                let depth = query
                    .usize_param(params::DEPTH)
                    .unwrap_or(DEFAULT_DEPENDENCY_DEPTH);
                QueryResponse::Dependents {
                    related: related(graph.transitive_dependents(&id, depth)),
                    component: id,
                }
            }
            QueryIntent::ImpactAnalysis => {
                let id = self.resolve_component(graph, query)?;
                QueryResponse::Impact(
                    graph.impact_of(&id, query.usize_param(params::DEPTH).unwrap_or(0)),
                )
            }
            QueryIntent::DetectCycles => QueryResponse::Cycles(graph.detect_cycles()),
            QueryIntent::MostConnected => QueryResponse::MostConnected(connected(
                graph,
                query
                    .usize_param(params::LIMIT)
                    .unwrap_or(DEFAULT_MOST_CONNECTED),
            )),
            QueryIntent::ArchitectureOverview => QueryResponse::Overview(self.overview(graph)),
            QueryIntent::Validate => {
                QueryResponse::Validation(validate(graph, &self.registry.get_all()))
            }
            QueryIntent::Unknown => {
                return Err(ArchLensError::UnsupportedQuery(query.cache_key()));
            }
        };
        Ok(response)
    }

    /// Match the `component` parameter by id, then by name (ignoring case),
    /// then against graph-only nodes such as dangling targets.
    fn resolve_component(&self, graph: &RelationshipGraph, query: &Query) -> Result<ComponentId> {
        let raw = query.param(params::COMPONENT).ok_or_else(|| {
            ArchLensError::InvalidOperation(format!(
                "{} requires the '{}' parameter",
                query.intent,
                params::COMPONENT
            ))
        })?;

        if self.registry.contains(raw) {
            return Ok(raw.to_string());
        }
        if let Some(found) = self
            .registry
            .get_all()
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(raw) || c.id.eq_ignore_ascii_case(raw))
        {
            return Ok(found.id);
        }
        if graph.contains(raw) {
            return Ok(raw.to_string());
        }
        Err(ArchLensError::ComponentNotFound(raw.to_string()))
    }

    fn overview(&self, graph: &RelationshipGraph) -> ArchitectureOverview {
        let components = self.registry.get_all();
        let mut by_category = BTreeMap::new();
        let mut by_layer = BTreeMap::new();
        for component in &components {
            *by_category.entry(component.category).or_insert(0) += 1;
            *by_layer.entry(component.layer().to_string()).or_insert(0) += 1;
        }

        ArchitectureOverview {
            component_count: components.len(),
            relationship_count: graph.relationship_count(),
            implied_relationship_count: graph.relationships().iter().filter(|r| r.implied).count(),
            by_category,
            by_layer,
            cycle_count: graph.detect_cycles().len(),
            most_connected: connected(graph, DEFAULT_MOST_CONNECTED),
        }
    }

    /// Drop the component's cached analysis and every cached query whose
    /// key mentions its id or name.
    pub fn invalidate_component(&self, id: &str) -> usize {
        let mut removed = usize::from(self.entity_cache.invalidate(id));
        removed += self.query_cache.invalidate_by_pattern(&format!("*{}*", id));
        if let Some(component) = self.registry.get(id) {
            if !component.name.eq_ignore_ascii_case(id) {
                removed += self
                    .query_cache
                    .invalidate_by_pattern(&format!("*{}*", component.name));
            }
        }
        debug!(id, removed, "component invalidated");
        removed
    }

    /// Analyze every registered component across the worker pool.
    pub async fn analyze_all(self: &Arc<Self>) -> Result<Vec<TaskResult<Arc<ComponentAnalysis>>>> {
        self.graph();
        let operations = self
            .registry
            .get_all()
            .into_iter()
            .map(|component| {
                let analyzer = Arc::clone(self);
                let id = component.id;
                Operation::new(id.clone(), move || async move {
                    Ok(analyzer.analyze_component(&id)?)
                })
            })
            .collect();
        self.scheduler.execute_balanced(operations).await
    }

    /// Run each feature's query as a scheduler task, honouring the declared
    /// feature dependencies.
    pub async fn run_features(
        self: &Arc<Self>,
        features: Vec<FeatureDefinition>,
    ) -> Result<Vec<TaskResult<Arc<QueryResponse>>>> {
        let tasks = features
            .into_iter()
            .map(
                |FeatureDefinition {
                     name,
                     dependencies,
                     query,
                 }| {
                    let analyzer = Arc::clone(self);
                    ScheduledTask::new(name, move || async move {
                        Ok(analyzer.handle_query(&query)?)
                    })
                    .with_dependencies(dependencies)
                },
            )
            .collect();
        self.scheduler.execute_with_dependencies(tasks).await
    }

    pub fn validate(&self) -> ValidationReport {
        validate(&self.graph(), &self.registry.get_all())
    }

    pub fn metrics(&self) -> EngineMetrics {
        let graph = self.graph();
        EngineMetrics {
            entity_cache: self.entity_cache.stats(),
            query_cache: self.query_cache.stats(),
            scheduler: self.scheduler.metrics(),
            component_count: self.registry.len(),
            relationship_count: graph.relationship_count(),
            graph_generation: graph.generation,
        }
    }
}

fn related(found: Vec<(ComponentId, usize)>) -> Vec<RelatedComponent> {
    found
        .into_iter()
        .map(|(id, hops)| RelatedComponent { id, hops })
        .collect()
}

fn connected(graph: &RelationshipGraph, limit: usize) -> Vec<ConnectedComponent> {
    graph
        .most_connected(limit)
        .into_iter()
        .map(|(id, degree)| ConnectedComponent { id, degree })
        .collect()
}
