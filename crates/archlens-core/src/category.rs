//! Per-category defaults used by analysis.
//!
//! Behaviour that differs by category lives in one static table instead of
//! `match` arms scattered across crates.

use crate::ComponentCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryProfile {
    pub category: ComponentCategory,
    pub layer: &'static str,
    pub default_capabilities: &'static [&'static str],
    pub default_constraints: &'static [&'static str],
    /// Categories this category may depend on. Empty means unrestricted.
    pub allowed_dependencies: &'static [ComponentCategory],
}

impl CategoryProfile {
    pub fn allows_dependency_on(&self, target: ComponentCategory) -> bool {
        self.allowed_dependencies.is_empty() || self.allowed_dependencies.contains(&target)
    }
}

static PROFILES: [CategoryProfile; 8] = [
    CategoryProfile {
        category: ComponentCategory::Client,
        layer: "service",
        default_capabilities: &["state-management", "action-processing"],
        default_constraints: &["single-ownership", "serialized-state-mutation"],
        allowed_dependencies: &[
            ComponentCategory::Capability,
            ComponentCategory::DomainModel,
            ComponentCategory::Infrastructure,
        ],
    },
    CategoryProfile {
        category: ComponentCategory::Context,
        layer: "orchestration",
        default_capabilities: &["client-orchestration", "state-observation"],
        default_constraints: &["orchestrates-clients-only"],
        allowed_dependencies: &[
            ComponentCategory::Client,
            ComponentCategory::DomainModel,
            ComponentCategory::Capability,
        ],
    },
    CategoryProfile {
        category: ComponentCategory::View,
        layer: "presentation",
        default_capabilities: &["rendering", "user-interaction"],
        default_constraints: &["one-to-one-context-binding"],
        allowed_dependencies: &[ComponentCategory::Context, ComponentCategory::DomainModel],
    },
    CategoryProfile {
        category: ComponentCategory::DomainModel,
        layer: "domain",
        default_capabilities: &["business-rules", "validation"],
        default_constraints: &["immutable-value-semantics"],
        allowed_dependencies: &[ComponentCategory::DomainModel],
    },
    CategoryProfile {
        category: ComponentCategory::Capability,
        layer: "capability",
        default_capabilities: &["runtime-availability-check"],
        default_constraints: &["graceful-degradation"],
        allowed_dependencies: &[ComponentCategory::Infrastructure],
    },
    CategoryProfile {
        category: ComponentCategory::Infrastructure,
        layer: "infrastructure",
        default_capabilities: &["resource-access"],
        default_constraints: &[],
        allowed_dependencies: &[ComponentCategory::Infrastructure],
    },
    CategoryProfile {
        category: ComponentCategory::Analysis,
        layer: "introspection",
        default_capabilities: &["component-discovery", "relationship-mapping"],
        default_constraints: &["read-only-access"],
        allowed_dependencies: &[],
    },
    CategoryProfile {
        category: ComponentCategory::Unknown,
        layer: "unknown",
        default_capabilities: &[],
        default_constraints: &[],
        allowed_dependencies: &[],
    },
];

impl ComponentCategory {
    pub fn profile(&self) -> &'static CategoryProfile {
        let index = ComponentCategory::ALL
            .iter()
            .position(|c| c == self)
            .unwrap_or(PROFILES.len() - 1);
        &PROFILES[index]
    }
}
