//! Heuristic inference of relationships nobody declared.

use archlens_core::{Component, ComponentCategory, Relationship, RelationshipKind};

/// Produces inferred edges from a component snapshot.
///
/// Implementations must be pure over their input. Any
/// `Fn(&[Component]) -> Vec<Relationship>` closure qualifies.
pub trait ImpliedRelationshipStrategy: Send + Sync {
    fn infer(&self, components: &[Component]) -> Vec<Relationship>;
}

impl<F> ImpliedRelationshipStrategy for F
where
    F: Fn(&[Component]) -> Vec<Relationship> + Send + Sync,
{
    fn infer(&self, components: &[Component]) -> Vec<Relationship> {
        self(components)
    }
}

/// Strategy that never infers anything.
pub struct NoImpliedRelationships;

impl ImpliedRelationshipStrategy for NoImpliedRelationships {
    fn infer(&self, _components: &[Component]) -> Vec<Relationship> {
        Vec::new()
    }
}

/// One naming convention that pairs components of two categories.
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatchRule {
    pub source_category: ComponentCategory,
    pub target_category: ComponentCategory,
    pub source_suffix: String,
    pub target_suffix: String,
    pub kind: RelationshipKind,
    pub strength: f64,
}

impl NameMatchRule {
    /// `UserView` pairs with `UserContext`.
    pub fn view_to_context() -> Self {
        Self {
            source_category: ComponentCategory::View,
            target_category: ComponentCategory::Context,
            source_suffix: "View".to_string(),
            target_suffix: "Context".to_string(),
            kind: RelationshipKind::DependsOn,
            strength: 1.0,
        }
    }

    /// A target matches when its stem equals the source stem, or when the
    /// (non-empty) target stem occurs anywhere in the source name.
    pub fn matches(&self, source: &Component, target: &Component) -> bool {
        let source_stem = strip(&source.name, &self.source_suffix);
        let target_stem = strip(&target.name, &self.target_suffix);

        target_stem == source_stem
            || (!target_stem.is_empty() && source.name.contains(target_stem))
    }
}

fn strip<'a>(name: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() {
        return name;
    }
    name.strip_suffix(suffix).unwrap_or(name)
}

/// Rule-table driven name matching.
///
/// For each source component, candidates are scanned in id order and the
/// first match wins, so every source gets at most one edge per rule.
#[derive(Debug, Clone)]
pub struct NameMatchStrategy {
    rules: Vec<NameMatchRule>,
}

impl Default for NameMatchStrategy {
    fn default() -> Self {
        Self {
            rules: vec![NameMatchRule::view_to_context()],
        }
    }
}

impl NameMatchStrategy {
    pub fn new(rules: Vec<NameMatchRule>) -> Self {
        Self { rules }
    }

    pub fn with_rule(mut self, rule: NameMatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[NameMatchRule] {
        &self.rules
    }
}

impl ImpliedRelationshipStrategy for NameMatchStrategy {
    fn infer(&self, components: &[Component]) -> Vec<Relationship> {
        let mut ordered: Vec<&Component> = components.iter().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut inferred = Vec::new();
        for rule in &self.rules {
            let candidates: Vec<&Component> = ordered
                .iter()
                .copied()
                .filter(|c| c.category == rule.target_category)
                .collect();

            for source in ordered
                .iter()
                .filter(|c| c.category == rule.source_category)
            {
                let found = candidates
                    .iter()
                    .find(|target| target.id != source.id && rule.matches(source, target));

                if let Some(target) = found {
                    inferred.push(
                        Relationship::new(source.id.clone(), target.id.clone(), rule.kind.clone())
                            .with_strength(rule.strength)
                            .with_description(format!(
                                "{} inferred from naming convention",
                                rule.kind
                            ))
                            .implied(),
                    );
                }
            }
        }
        inferred
    }
}
