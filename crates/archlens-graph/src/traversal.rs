//! Breadth-first walks over a [`RelationshipGraph`].
//!
//! Depth limits follow one convention throughout: `0` means unlimited.

use crate::RelationshipGraph;
use archlens_core::{ComponentId, RelationshipKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// How far a change travels, derived from hop distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactSeverity {
    /// 1 hop
    Direct,
    /// 2-3 hops
    Transitive,
    /// 4+ hops
    Distant,
}

impl ImpactSeverity {
    pub fn from_hops(hops: usize) -> Self {
        match hops {
            0 | 1 => ImpactSeverity::Direct,
            2 | 3 => ImpactSeverity::Transitive,
            _ => ImpactSeverity::Distant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactSeverity::Direct => "direct",
            ImpactSeverity::Transitive => "transitive",
            ImpactSeverity::Distant => "distant",
        }
    }
}

impl fmt::Display for ImpactSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDirection {
    /// Components that depend on the target.
    Upstream,
    /// Components the target depends on.
    Downstream,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedComponent {
    pub id: ComponentId,
    pub hop_distance: usize,
    pub severity: ImpactSeverity,
    /// Kind of the edge through which this component was first reached.
    pub via: RelationshipKind,
    pub direction: ImpactDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub target: ComponentId,
    pub upstream: Vec<AffectedComponent>,
    pub downstream: Vec<AffectedComponent>,
    pub max_depth: usize,
}

impl ImpactReport {
    pub fn total_affected(&self) -> usize {
        self.upstream.len() + self.downstream.len()
    }

    /// Upstream and downstream merged, ordered by severity, hops, then id.
    pub fn all_affected(&self) -> Vec<&AffectedComponent> {
        let mut all: Vec<&AffectedComponent> =
            self.upstream.iter().chain(self.downstream.iter()).collect();
        all.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.hop_distance.cmp(&b.hop_distance))
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    pub fn count_by_severity(&self, severity: ImpactSeverity) -> usize {
        self.upstream
            .iter()
            .chain(self.downstream.iter())
            .filter(|c| c.severity == severity)
            .count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} affected (direct: {}, transitive: {}, distant: {})",
            self.target,
            self.total_affected(),
            self.count_by_severity(ImpactSeverity::Direct),
            self.count_by_severity(ImpactSeverity::Transitive),
            self.count_by_severity(ImpactSeverity::Distant),
        )
    }
}

impl RelationshipGraph {
    /// Everything that reaches `id` through incoming edges, with hop
    /// distance. The start node is never included.
    pub fn transitive_dependents(&self, id: &str, max_depth: usize) -> Vec<(ComponentId, usize)> {
        self.walk(id, max_depth, ImpactDirection::Upstream)
            .into_iter()
            .map(|a| (a.id, a.hop_distance))
            .collect()
    }

    /// Everything `id` reaches through outgoing edges, with hop distance.
    pub fn transitive_dependencies(
        &self,
        id: &str,
        max_depth: usize,
    ) -> Vec<(ComponentId, usize)> {
        self.walk(id, max_depth, ImpactDirection::Downstream)
            .into_iter()
            .map(|a| (a.id, a.hop_distance))
            .collect()
    }

    pub fn impact_of(&self, id: &str, max_depth: usize) -> ImpactReport {
        ImpactReport {
            target: id.to_string(),
            upstream: self.walk(id, max_depth, ImpactDirection::Upstream),
            downstream: self.walk(id, max_depth, ImpactDirection::Downstream),
            max_depth,
        }
    }

    /// Fewest-hop path along outgoing edges, endpoints included.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<ComponentId>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut queue = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut parent: HashMap<String, String> = HashMap::new();

        queue.push_back(from.to_string());
        visited.insert(from.to_string());

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current.clone()];
                let mut node = current;
                while let Some(prev) = parent.get(&node) {
                    path.push(prev.clone());
                    node = prev.clone();
                }
                path.reverse();
                return Some(path);
            }

            for neighbor in self.dependencies_of(&current) {
                if visited.insert(neighbor.clone()) {
                    parent.insert(neighbor.clone(), current.clone());
                    queue.push_back(neighbor);
                }
            }
        }

        None
    }

    fn walk(&self, id: &str, max_depth: usize, direction: ImpactDirection) -> Vec<AffectedComponent> {
        let mut affected = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(id.to_string(), 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth > 0 && depth >= max_depth {
                continue;
            }

            let edges = match direction {
                ImpactDirection::Upstream => self.incoming_relationships(&current),
                ImpactDirection::Downstream => self.relationships_of(&current),
            };

            for edge in edges {
                let next = match direction {
                    ImpactDirection::Upstream => &edge.source,
                    ImpactDirection::Downstream => &edge.target,
                };
                if !visited.insert(next.clone()) {
                    continue;
                }
                let hops = depth + 1;
                affected.push(AffectedComponent {
                    id: next.clone(),
                    hop_distance: hops,
                    severity: ImpactSeverity::from_hops(hops),
                    via: edge.kind.clone(),
                    direction,
                });
                queue.push_back((next.clone(), hops));
            }
        }

        affected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archlens_core::Relationship;

    fn chain() -> RelationshipGraph {
        // a -> b -> c -> d -> e, plus x -> c
        let edges = [("a", "b"), ("b", "c"), ("c", "d"), ("d", "e"), ("x", "c")]
            .iter()
            .map(|(s, t)| Relationship::new(*s, *t, RelationshipKind::DependsOn))
            .collect();
        RelationshipGraph::from_parts(std::iter::empty(), edges)
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(ImpactSeverity::from_hops(1), ImpactSeverity::Direct);
        assert_eq!(ImpactSeverity::from_hops(3), ImpactSeverity::Transitive);
        assert_eq!(ImpactSeverity::from_hops(4), ImpactSeverity::Distant);
    }

    #[test]
    fn test_transitive_dependents_with_depth() {
        let g = chain();
        let all = g.transitive_dependents("d", 0);
        assert_eq!(all.len(), 4);
        assert!(all.contains(&("c".to_string(), 1)));
        assert!(all.contains(&("a".to_string(), 3)));

        let near = g.transitive_dependents("d", 1);
        assert_eq!(near, vec![("c".to_string(), 1)]);
    }

    #[test]
    fn test_impact_report() {
        let report = chain().impact_of("c", 0);
        assert_eq!(report.upstream.len(), 3);
        assert_eq!(report.downstream.len(), 2);
        assert_eq!(report.count_by_severity(ImpactSeverity::Direct), 3);
        assert_eq!(report.all_affected()[0].severity, ImpactSeverity::Direct);
        assert!(report.summary().starts_with("c: 5 affected"));
    }

    #[test]
    fn test_shortest_path() {
        let g = chain();
        assert_eq!(
            g.shortest_path("a", "d"),
            Some(vec!["a".into(), "b".into(), "c".into(), "d".into()])
        );
        assert_eq!(g.shortest_path("d", "a"), None);
        assert_eq!(g.shortest_path("a", "missing"), None);
        assert_eq!(g.shortest_path("e", "e"), Some(vec!["e".to_string()]));
    }
}
