use crate::RelationshipGraph;
use archlens_core::{Component, ComponentCategory, ComponentId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    DanglingTarget {
        source: ComponentId,
        target: ComponentId,
    },
    SelfReference {
        id: ComponentId,
    },
    StrengthOutOfRange {
        source: ComponentId,
        target: ComponentId,
        strength: f64,
    },
    UnprovidedCapability {
        component: ComponentId,
        capability: String,
    },
    RequiredCycle {
        cycle: Vec<ComponentId>,
    },
    DisallowedDependency {
        source: ComponentId,
        target: ComponentId,
        source_category: ComponentCategory,
        target_category: ComponentCategory,
    },
}

impl ValidationIssue {
    pub fn severity(&self) -> IssueSeverity {
        match self {
            ValidationIssue::DanglingTarget { .. }
            | ValidationIssue::StrengthOutOfRange { .. }
            | ValidationIssue::RequiredCycle { .. } => IssueSeverity::Error,
            ValidationIssue::SelfReference { .. }
            | ValidationIssue::UnprovidedCapability { .. }
            | ValidationIssue::DisallowedDependency { .. } => IssueSeverity::Warning,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DanglingTarget { source, target } => {
                write!(f, "{} references unknown component {}", source, target)
            }
            ValidationIssue::SelfReference { id } => write!(f, "{} references itself", id),
            ValidationIssue::StrengthOutOfRange {
                source,
                target,
                strength,
            } => write!(
                f,
                "{} -> {} has strength {} outside [0, 1]",
                source, target, strength
            ),
            ValidationIssue::UnprovidedCapability {
                component,
                capability,
            } => write!(
                f,
                "{} requires capability '{}' that no component provides",
                component, capability
            ),
            ValidationIssue::RequiredCycle { cycle } => {
                write!(f, "required dependency cycle: {}", cycle.join(" -> "))
            }
            ValidationIssue::DisallowedDependency {
                source,
                target,
                source_category,
                target_category,
            } => write!(
                f,
                "{} ({}) may not depend on {} ({})",
                source, source_category, target, target_category
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// No error-level issues. Warnings are allowed.
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity() == IssueSeverity::Warning)
    }
}

/// Check a built graph against the component snapshot it came from.
///
/// Dependency-direction rules come from each category's profile; edges
/// touching an `Unknown` component are not judged.
pub fn validate(graph: &RelationshipGraph, components: &[Component]) -> ValidationReport {
    let by_id: HashMap<&str, &Component> =
        components.iter().map(|c| (c.id.as_str(), c)).collect();
    let mut issues = Vec::new();

    for rel in graph.relationships() {
        if rel.source == rel.target {
            issues.push(ValidationIssue::SelfReference {
                id: rel.source.clone(),
            });
        }
        if !(0.0..=1.0).contains(&rel.strength) {
            issues.push(ValidationIssue::StrengthOutOfRange {
                source: rel.source.clone(),
                target: rel.target.clone(),
                strength: rel.strength,
            });
        }

        let Some(target) = by_id.get(rel.target.as_str()) else {
            issues.push(ValidationIssue::DanglingTarget {
                source: rel.source.clone(),
                target: rel.target.clone(),
            });
            continue;
        };

        if let Some(source) = by_id.get(rel.source.as_str()) {
            let judged = source.category != ComponentCategory::Unknown
                && target.category != ComponentCategory::Unknown
                && rel.source != rel.target;
            if judged && !source.category.profile().allows_dependency_on(target.category) {
                issues.push(ValidationIssue::DisallowedDependency {
                    source: rel.source.clone(),
                    target: rel.target.clone(),
                    source_category: source.category,
                    target_category: target.category,
                });
            }
        }
    }

    let provided: BTreeSet<&str> = components
        .iter()
        .filter_map(|c| c.metadata.as_ref())
        .flat_map(|m| m.provided_capabilities.iter().map(String::as_str))
        .collect();
    for component in components {
        let Some(metadata) = component.metadata.as_ref() else {
            continue;
        };
        for capability in &metadata.required_capabilities {
            if !provided.contains(capability.as_str()) {
                issues.push(ValidationIssue::UnprovidedCapability {
                    component: component.id.clone(),
                    capability: capability.clone(),
                });
            }
        }
    }

    let required_only = RelationshipGraph::from_parts(
        graph.nodes().cloned(),
        graph
            .relationships()
            .iter()
            .filter(|r| r.required)
            .cloned()
            .collect(),
    );
    issues.extend(
        required_only
            .detect_cycles()
            .into_iter()
            .map(|cycle| ValidationIssue::RequiredCycle { cycle }),
    );

    ValidationReport { issues }
}
