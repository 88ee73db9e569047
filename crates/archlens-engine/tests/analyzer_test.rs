use approx::assert_relative_eq;
use archlens_core::{
    params, ArchLensConfig, ArchLensError, ArchitecturalMetadata, Component, ComponentCategory,
    DiscoverySource, FnDiscovery, Query, QueryIntent, Relationship, RelationshipKind,
    StaticDiscovery,
};
use archlens_engine::{ArchitectureAnalyzer, FeatureDefinition, QueryResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn config() -> ArchLensConfig {
    let mut config = ArchLensConfig::default();
    config.scheduler.worker_count = 2;
    config
}

fn sample_components() -> Vec<Component> {
    vec![
        Component::new("user-view", "UserView", ComponentCategory::View),
        Component::new("user-context", "UserContext", ComponentCategory::Context).with_metadata(
            ArchitecturalMetadata::new("coordinates user flows")
                .requires("user-state")
                .with_relationship(
                    Relationship::new("user-context", "user-client", RelationshipKind::Orchestrates)
                        .with_strength(0.8),
                ),
        ),
        Component::new("user-client", "UserClient", ComponentCategory::Client).with_metadata(
            ArchitecturalMetadata::new("owns user state")
                .provides("user-state")
                .with_constraint("no-ui-imports")
                .with_relationship(
                    Relationship::new("user-client", "user-model", RelationshipKind::Owns)
                        .with_strength(0.6),
                ),
        ),
        Component::new("user-model", "User", ComponentCategory::DomainModel),
    ]
}

async fn analyzer() -> Arc<ArchitectureAnalyzer> {
    let analyzer = Arc::new(ArchitectureAnalyzer::new(
        &config(),
        StaticDiscovery::new(sample_components()),
    ));
    analyzer.discover().await.unwrap();
    analyzer
}

fn find_dependents(component: &str) -> Query {
    Query::new(QueryIntent::FindDependents).with_param(params::COMPONENT, component)
}

#[tokio::test]
async fn test_discovery_builds_graph_with_implied_edge() {
    let analyzer = Arc::new(ArchitectureAnalyzer::new(
        &config(),
        StaticDiscovery::new(sample_components()),
    ));
    let report = analyzer.discover().await.unwrap();

    assert_eq!(report.components, 4);
    assert_eq!(report.relationships, 3);
    assert_eq!(report.implied_relationships, 1);
    assert_eq!(report.cycles, 0);

    let graph = analyzer.graph();
    assert_eq!(graph.dependents_of("user-context"), vec!["user-view".to_string()]);
    assert!(analyzer.validate().is_valid());
}

#[tokio::test]
async fn test_component_analysis() {
    let analyzer = analyzer().await;
    let analysis = analyzer.analyze_component("user-client").unwrap();

    assert_eq!(analysis.layer, "service");
    assert_eq!(analysis.dependencies, vec!["user-model".to_string()]);
    assert_eq!(analysis.dependents, vec!["user-context".to_string()]);
    assert_eq!(analysis.coupling.afferent, 1);
    assert_eq!(analysis.coupling.efferent, 1);
    assert_relative_eq!(analysis.coupling.instability, 0.5);
    assert_relative_eq!(analysis.coupling.average_strength, 0.6);
    assert_eq!(analysis.impact_radius, 3);
    assert!(!analysis.in_cycle);
    assert!(analysis.layer_violations.is_empty());
    assert!(analysis.capabilities.contains("user-state"));
    assert!(analysis.capabilities.contains("state-management"));
    assert!(analysis.constraints.contains(&"no-ui-imports".to_string()));

    let again = analyzer.analyze_component("user-client").unwrap();
    assert!(Arc::ptr_eq(&analysis, &again));
    assert_eq!(analyzer.metrics().entity_cache.hits, 1);

    assert!(matches!(
        analyzer.analyze_component("ghost"),
        Err(ArchLensError::ComponentNotFound(id)) if id == "ghost"
    ));
}

#[tokio::test]
async fn test_queries_are_cached_by_normalized_key() {
    let analyzer = analyzer().await;

    let first = analyzer.handle_query(&find_dependents("UserContext")).unwrap();
    match first.as_ref() {
        QueryResponse::Dependents { component, related } => {
            assert_eq!(component, "user-context");
            assert_eq!(related.len(), 1);
            assert_eq!(related[0].id, "user-view");
            assert_eq!(related[0].hops, 1);
        }
        other => panic!("unexpected response {:?}", other),
    }

    let second = analyzer
        .handle_query(&find_dependents("usercontext").with_confidence(0.3))
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let metrics = analyzer.metrics();
    assert_eq!(metrics.query_cache.hits, 1);
    assert_eq!(metrics.query_cache.item_count, 1);

    let json = serde_json::to_value(first.as_ref()).unwrap();
    assert_eq!(json["type"], "dependents");
}

#[tokio::test]
async fn test_query_dispatch() {
    let analyzer = analyzer().await;

    let views = analyzer
        .handle_query(
            &Query::new(QueryIntent::ListComponents).with_param(params::CATEGORY, "view"),
        )
        .unwrap();
    assert!(matches!(views.as_ref(), QueryResponse::Components(list) if list.len() == 1));

    let deps = analyzer
        .handle_query(
            &Query::new(QueryIntent::FindDependencies)
                .with_param(params::COMPONENT, "user-view")
                .with_param(params::DEPTH, "0"),
        )
        .unwrap();
    match deps.as_ref() {
        QueryResponse::Dependencies { related, .. } => assert_eq!(related.len(), 3),
        other => panic!("unexpected response {:?}", other),
    }

    let top = analyzer
        .handle_query(&Query::new(QueryIntent::MostConnected).with_param(params::LIMIT, "1"))
        .unwrap();
    match top.as_ref() {
        QueryResponse::MostConnected(list) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].id, "user-client");
            assert_eq!(list[0].degree, 2);
        }
        other => panic!("unexpected response {:?}", other),
    }

    let overview = analyzer
        .handle_query(&Query::new(QueryIntent::ArchitectureOverview))
        .unwrap();
    match overview.as_ref() {
        QueryResponse::Overview(o) => {
            assert_eq!(o.component_count, 4);
            assert_eq!(o.implied_relationship_count, 1);
            assert_eq!(o.by_category[&ComponentCategory::View], 1);
            assert_eq!(o.by_layer["domain"], 1);
        }
        other => panic!("unexpected response {:?}", other),
    }

    let impact = analyzer
        .handle_query(
            &Query::new(QueryIntent::ImpactAnalysis).with_param(params::COMPONENT, "User"),
        )
        .unwrap();
    assert!(matches!(impact.as_ref(), QueryResponse::Impact(r) if r.upstream.len() == 3));
}

#[tokio::test]
async fn test_query_errors() {
    let analyzer = analyzer().await;

    assert!(matches!(
        analyzer.handle_query(&Query::new(QueryIntent::Unknown)),
        Err(ArchLensError::UnsupportedQuery(_))
    ));
    assert!(matches!(
        analyzer.handle_query(&Query::new(QueryIntent::DescribeComponent)),
        Err(ArchLensError::InvalidOperation(_))
    ));
    assert!(matches!(
        analyzer.handle_query(&find_dependents("Nobody")),
        Err(ArchLensError::ComponentNotFound(_))
    ));
    assert_eq!(analyzer.metrics().query_cache.item_count, 0);
}

#[tokio::test]
async fn test_invalidate_component_drops_entity_and_query_entries() {
    let analyzer = analyzer().await;
    analyzer.handle_query(&find_dependents("UserContext")).unwrap();
    analyzer
        .handle_query(&Query::new(QueryIntent::DetectCycles))
        .unwrap();
    analyzer.analyze_component("user-context").unwrap();

    assert_eq!(analyzer.invalidate_component("user-context"), 2);

    let metrics = analyzer.metrics();
    assert_eq!(metrics.entity_cache.item_count, 0);
    assert_eq!(metrics.query_cache.item_count, 1);
}

#[tokio::test]
async fn test_registry_change_rebuilds_graph_and_clears_caches() {
    let analyzer = analyzer().await;
    let before = analyzer.graph().generation;
    analyzer.analyze_component("user-view").unwrap();

    analyzer.registry().register(
        Component::new("audit", "AuditTrail", ComponentCategory::Analysis).with_metadata(
            ArchitecturalMetadata::new("records changes").with_relationship(Relationship::new(
                "audit",
                "user-client",
                RelationshipKind::Observes,
            )),
        ),
    );

    let metrics = analyzer.metrics();
    assert!(metrics.graph_generation > before);
    assert_eq!(metrics.entity_cache.item_count, 0);
    assert_eq!(metrics.component_count, 5);
    assert_eq!(metrics.relationship_count, 4);
}

#[tokio::test]
async fn test_cycles_surface_in_queries_and_validation() {
    let discovery = FnDiscovery(|| {
        let edge = |s: &str, t: &str| Relationship::new(s, t, RelationshipKind::DependsOn);
        vec![
            Component::new("a", "Alpha", ComponentCategory::DomainModel)
                .with_metadata(ArchitecturalMetadata::new("a").with_relationship(edge("a", "b"))),
            Component::new("b", "Beta", ComponentCategory::DomainModel)
                .with_metadata(ArchitecturalMetadata::new("b").with_relationship(edge("b", "a"))),
        ]
    });
    let analyzer = ArchitectureAnalyzer::new(&config(), discovery);
    assert_eq!(analyzer.discover().await.unwrap().cycles, 1);

    let cycles = analyzer
        .handle_query(&Query::new(QueryIntent::DetectCycles))
        .unwrap();
    assert_eq!(
        cycles.as_ref(),
        &QueryResponse::Cycles(vec![vec!["a".to_string(), "b".to_string()]])
    );
    assert!(analyzer.analyze_component("a").unwrap().in_cycle);
    assert!(!analyzer.validate().is_valid());
}

struct FlakyDiscovery {
    calls: AtomicUsize,
}

#[async_trait]
impl DiscoverySource for FlakyDiscovery {
    async fn discover(&self) -> archlens_core::Result<Vec<Component>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(sample_components())
        } else {
            Err(ArchLensError::Discovery("instrumentation unavailable".into()))
        }
    }
}

#[tokio::test]
async fn test_failed_discovery_keeps_previous_components() {
    let analyzer = ArchitectureAnalyzer::new(
        &config(),
        FlakyDiscovery {
            calls: AtomicUsize::new(0),
        },
    );
    analyzer.discover().await.unwrap();

    let err = analyzer.discover().await.unwrap_err();
    assert!(matches!(err, ArchLensError::Discovery(_)));
    assert_eq!(analyzer.components().len(), 4);
    assert!(analyzer.component("user-model").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_analyze_all_fans_out() {
    let analyzer = analyzer().await;
    let results = analyzer.analyze_all().await.unwrap();

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.is_success()));
    assert!(results
        .iter()
        .all(|r| r.worker_index.map_or(false, |i| i < 2)));
    assert_eq!(analyzer.metrics().entity_cache.item_count, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_features_in_dependency_order() {
    let analyzer = analyzer().await;
    let features = vec![
        FeatureDefinition::new("components", Query::new(QueryIntent::ListComponents)),
        FeatureDefinition::new(
            "deps",
            Query::new(QueryIntent::FindDependencies).with_param(params::COMPONENT, "user-client"),
        )
        .depends_on("components"),
        FeatureDefinition::new("overview", Query::new(QueryIntent::ArchitectureOverview))
            .depends_on("deps"),
        FeatureDefinition::new(
            "ghost",
            Query::new(QueryIntent::DescribeComponent).with_param(params::COMPONENT, "ghost"),
        ),
        FeatureDefinition::new("after-ghost", Query::new(QueryIntent::Validate))
            .depends_on("ghost"),
    ];

    let results = analyzer.run_features(features).await.unwrap();
    assert_eq!(results.len(), 5);

    let by_name: HashMap<&str, _> = results.iter().map(|r| (r.name.as_str(), r)).collect();
    assert_eq!(by_name["components"].wave, 1);
    assert_eq!(by_name["deps"].wave, 2);
    assert_eq!(by_name["overview"].wave, 3);
    assert!(by_name["overview"].is_success());
    assert_eq!(by_name["ghost"].error(), Some("Component not found: ghost"));
    assert_eq!(by_name["after-ghost"].error(), Some("dependency ghost failed"));

    let err = analyzer
        .run_features(vec![FeatureDefinition::new(
            "orphan",
            Query::new(QueryIntent::Validate),
        )
        .depends_on("missing")])
        .await
        .unwrap_err();
    assert!(err.is_configuration_error());
}

#[test]
fn test_concurrent_readers_never_keep_an_outdated_analysis() {
    let analyzer = Arc::new(ArchitectureAnalyzer::new(&config(), StaticDiscovery::new(vec![])));
    analyzer
        .registry()
        .register(Component::new("a", "v0", ComponentCategory::DomainModel));
    let describe = Query::new(QueryIntent::DescribeComponent).with_param(params::COMPONENT, "a");

    let stop = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let analyzer = Arc::clone(&analyzer);
            let stop = Arc::clone(&stop);
            let describe = describe.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let _ = analyzer.analyze_component("a");
                    let _ = analyzer.handle_query(&describe);
                }
            })
        })
        .collect();

    for i in 1..=60 {
        let name = format!("v{}", i);
        analyzer
            .registry()
            .register(Component::new("a", name.clone(), ComponentCategory::DomainModel));
        analyzer.graph();
        thread::sleep(Duration::from_millis(2));

        let analysis = analyzer.analyze_component("a").unwrap();
        assert_eq!(analysis.component.name, name, "entity cache after update {}", i);
        match analyzer.handle_query(&describe).unwrap().as_ref() {
            QueryResponse::Component(answer) => {
                assert_eq!(answer.component.name, name, "query cache after update {}", i)
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }
}
