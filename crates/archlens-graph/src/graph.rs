use crate::implied::{ImpliedRelationshipStrategy, NameMatchStrategy};
use archlens_core::{Component, ComponentId, Relationship};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Immutable relationship graph built from one component snapshot.
///
/// Nodes are every component id plus every edge target, so dangling
/// targets stay queryable. Edges are stored once and indexed by position
/// from both ends.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    relationships: Vec<Relationship>,
    outgoing: HashMap<ComponentId, Vec<usize>>,
    incoming: HashMap<ComponentId, Vec<usize>>,
    nodes: BTreeSet<ComponentId>,
}

impl RelationshipGraph {
    /// Build with the default view/context naming heuristic.
    pub fn build(components: &[Component]) -> Self {
        Self::build_with(components, &NameMatchStrategy::default())
    }

    /// Declared edges are kept verbatim; inferred edges that repeat a
    /// declared source/target pair are dropped.
    pub fn build_with(
        components: &[Component],
        strategy: &dyn ImpliedRelationshipStrategy,
    ) -> Self {
        let mut relationships: Vec<Relationship> = components
            .iter()
            .flat_map(|c| c.declared_relationships().iter().cloned())
            .collect();
        let declared = relationships.len();

        let declared_pairs: HashSet<(ComponentId, ComponentId)> = relationships
            .iter()
            .map(|r| (r.source.clone(), r.target.clone()))
            .collect();

        relationships.extend(
            strategy
                .infer(components)
                .into_iter()
                .filter(|r| !declared_pairs.contains(&(r.source.clone(), r.target.clone()))),
        );

        let graph = Self::from_parts(components.iter().map(|c| c.id.clone()), relationships);
        debug!(
            nodes = graph.node_count(),
            declared,
            implied = graph.relationship_count() - declared,
            "relationship graph built"
        );
        graph
    }

    /// Assemble a graph from explicit nodes and edges. Edge endpoints are
    /// added to the node set.
    pub fn from_parts<I>(nodes: I, relationships: Vec<Relationship>) -> Self
    where
        I: IntoIterator<Item = ComponentId>,
    {
        let mut nodes: BTreeSet<ComponentId> = nodes.into_iter().collect();
        let mut outgoing: HashMap<ComponentId, Vec<usize>> = HashMap::new();
        let mut incoming: HashMap<ComponentId, Vec<usize>> = HashMap::new();

        for (index, rel) in relationships.iter().enumerate() {
            nodes.insert(rel.source.clone());
            nodes.insert(rel.target.clone());
            outgoing.entry(rel.source.clone()).or_default().push(index);
            incoming.entry(rel.target.clone()).or_default().push(index);
        }

        Self {
            relationships,
            outgoing,
            incoming,
            nodes,
        }
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = &ComponentId> {
        self.nodes.iter()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Outgoing edges of `id`.
    pub fn relationships_of(&self, id: &str) -> Vec<&Relationship> {
        self.edges(&self.outgoing, id).collect()
    }

    /// Edges that target `id`.
    pub fn incoming_relationships(&self, id: &str) -> Vec<&Relationship> {
        self.edges(&self.incoming, id).collect()
    }

    /// Distinct ids of components with an edge into `id`, ascending.
    pub fn dependents_of(&self, id: &str) -> Vec<ComponentId> {
        let ids: BTreeSet<&ComponentId> = self.edges(&self.incoming, id).map(|r| &r.source).collect();
        ids.into_iter().cloned().collect()
    }

    /// Distinct ids `id` has an edge to, ascending.
    pub fn dependencies_of(&self, id: &str) -> Vec<ComponentId> {
        let ids: BTreeSet<&ComponentId> = self.edges(&self.outgoing, id).map(|r| &r.target).collect();
        ids.into_iter().cloned().collect()
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.outgoing.get(id).map_or(0, Vec::len)
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.incoming.get(id).map_or(0, Vec::len)
    }

    pub fn degree(&self, id: &str) -> usize {
        self.in_degree(id) + self.out_degree(id)
    }

    /// Top `limit` nodes by in+out degree, ties broken by id ascending.
    pub fn most_connected(&self, limit: usize) -> Vec<(ComponentId, usize)> {
        let mut ranked: Vec<(&ComponentId, usize)> =
            self.nodes.iter().map(|id| (id, self.degree(id))).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
            .into_iter()
            .take(limit)
            .map(|(id, degree)| (id.clone(), degree))
            .collect()
    }

    /// Cycles found as back-edges of an iterative depth-first scan.
    ///
    /// Roots and neighbours are visited in ascending id order, so the
    /// output is deterministic. Each cycle starts at the node the back-edge
    /// re-entered and does not repeat it at the end. A node is expanded at
    /// most once across the whole scan.
    pub fn detect_cycles(&self) -> Vec<Vec<ComponentId>> {
        let adjacency: HashMap<&str, Vec<&str>> = self
            .outgoing
            .keys()
            .map(|source| {
                let targets: BTreeSet<&str> = self
                    .edges(&self.outgoing, source)
                    .map(|r| r.target.as_str())
                    .collect();
                (source.as_str(), targets.into_iter().collect())
            })
            .collect();

        let mut cycles = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();

        for root in &self.nodes {
            if !visited.insert(root.as_str()) {
                continue;
            }

            let mut path: Vec<&str> = vec![root.as_str()];
            let mut on_path: HashMap<&str, usize> = HashMap::from([(root.as_str(), 0)]);
            // (node, index of the next neighbour to try)
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                let next = adjacency.get(node).and_then(|n| n.get(frame.1)).copied();
                frame.1 += 1;

                match next {
                    Some(next) => {
                        if let Some(&start) = on_path.get(next) {
                            cycles.push(path[start..].iter().map(|s| s.to_string()).collect());
                        } else if visited.insert(next) {
                            on_path.insert(next, path.len());
                            path.push(next);
                            stack.push((next, 0));
                        }
                    }
                    None => {
                        stack.pop();
                        path.pop();
                        on_path.remove(node);
                    }
                }
            }
        }

        cycles
    }

    fn edges<'a>(
        &'a self,
        index: &'a HashMap<ComponentId, Vec<usize>>,
        id: &str,
    ) -> impl Iterator<Item = &'a Relationship> + 'a {
        index
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&i| &self.relationships[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archlens_core::{ArchitecturalMetadata, ComponentCategory, RelationshipKind};

    fn edge(source: &str, target: &str) -> Relationship {
        Relationship::new(source, target, RelationshipKind::DependsOn)
    }

    fn graph(edges: &[(&str, &str)]) -> RelationshipGraph {
        RelationshipGraph::from_parts(
            std::iter::empty(),
            edges.iter().map(|(s, t)| edge(s, t)).collect(),
        )
    }

    #[test]
    fn test_declared_edges_kept_including_dangling() {
        let components = vec![Component::new("a", "A", ComponentCategory::Client)
            .with_metadata(ArchitecturalMetadata::new("a").with_relationship(edge("a", "ghost")))];
        let g = RelationshipGraph::build(&components);

        assert_eq!(g.relationship_count(), 1);
        assert!(g.contains("ghost"));
        assert_eq!(g.dependencies_of("a"), vec!["ghost".to_string()]);
        assert_eq!(g.dependents_of("ghost"), vec!["a".to_string()]);
    }

    #[test]
    fn test_implied_edge_not_duplicated_when_declared() {
        let components = vec![
            Component::new("v", "UserView", ComponentCategory::View).with_metadata(
                ArchitecturalMetadata::new("ui").with_relationship(edge("v", "c").with_strength(0.5)),
            ),
            Component::new("c", "UserContext", ComponentCategory::Context),
        ];
        let g = RelationshipGraph::build(&components);

        assert_eq!(g.relationship_count(), 1);
        assert!(!g.relationships()[0].implied);
        assert_eq!(g.relationships()[0].strength, 0.5);
    }

    #[test]
    fn test_build_is_idempotent() {
        let components = vec![
            Component::new("v", "UserView", ComponentCategory::View),
            Component::new("c", "UserContext", ComponentCategory::Context),
        ];
        let first = RelationshipGraph::build(&components);
        let second = RelationshipGraph::build(&components);
        assert_eq!(first.relationships(), second.relationships());
    }

    #[test]
    fn test_most_connected_ties_by_id() {
        let g = graph(&[("b", "hub"), ("a", "hub"), ("hub", "c"), ("x", "y")]);
        let top = g.most_connected(3);
        assert_eq!(
            top,
            vec![
                ("hub".to_string(), 3),
                ("a".to_string(), 1),
                ("b".to_string(), 1)
            ]
        );
        assert!(g.most_connected(0).is_empty());
        assert_eq!(g.most_connected(100).len(), g.node_count());
    }

    #[test]
    fn test_three_cycle() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(g.detect_cycles(), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn test_self_loop_is_single_node_cycle() {
        let g = graph(&[("a", "a"), ("a", "b")]);
        assert_eq!(g.detect_cycles(), vec![vec!["a"]]);
    }

    #[test]
    fn test_diamond_is_acyclic() {
        let g = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "e")]);
        assert!(g.detect_cycles().is_empty());
    }

    #[test]
    fn test_cycle_reached_from_tail() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "b")]);
        assert_eq!(g.detect_cycles(), vec![vec!["b", "c"]]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let ids: Vec<String> = (0..50_000).map(|i| format!("n{:05}", i)).collect();
        let edges: Vec<Relationship> = ids.windows(2).map(|w| edge(&w[0], &w[1])).collect();
        let g = RelationshipGraph::from_parts(ids.clone(), edges);
        assert!(g.detect_cycles().is_empty());
    }

    #[test]
    fn test_unknown_id_queries_are_empty() {
        let g = graph(&[("a", "b")]);
        assert!(g.relationships_of("zzz").is_empty());
        assert!(g.dependents_of("zzz").is_empty());
        assert_eq!(g.degree("zzz"), 0);
    }
}
