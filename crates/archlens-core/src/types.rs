use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub type ComponentId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentCategory {
    Client,
    Context,
    View,
    DomainModel,
    Capability,
    Infrastructure,
    Analysis,
    Unknown,
}

impl ComponentCategory {
    pub const ALL: [ComponentCategory; 8] = [
        ComponentCategory::Client,
        ComponentCategory::Context,
        ComponentCategory::View,
        ComponentCategory::DomainModel,
        ComponentCategory::Capability,
        ComponentCategory::Infrastructure,
        ComponentCategory::Analysis,
        ComponentCategory::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentCategory::Client => "client",
            ComponentCategory::Context => "context",
            ComponentCategory::View => "view",
            ComponentCategory::DomainModel => "domain-model",
            ComponentCategory::Capability => "capability",
            ComponentCategory::Infrastructure => "infrastructure",
            ComponentCategory::Analysis => "analysis",
            ComponentCategory::Unknown => "unknown",
        }
    }
}

impl Default for ComponentCategory {
    fn default() -> Self {
        ComponentCategory::Unknown
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentCategory {
    type Err = String;

    /// Unrecognised names map to `Unknown` rather than failing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Ok(match normalized.as_str() {
            "client" => ComponentCategory::Client,
            "context" => ComponentCategory::Context,
            "view" => ComponentCategory::View,
            "domain-model" | "domainmodel" | "model" => ComponentCategory::DomainModel,
            "capability" => ComponentCategory::Capability,
            "infrastructure" => ComponentCategory::Infrastructure,
            "analysis" => ComponentCategory::Analysis,
            _ => ComponentCategory::Unknown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    DependsOn,
    Orchestrates,
    Owns,
    Observes,
    Uses,
    Implements,
    Other(String),
}

impl Default for RelationshipKind {
    fn default() -> Self {
        RelationshipKind::DependsOn
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationshipKind::DependsOn => "dependsOn",
            RelationshipKind::Orchestrates => "orchestrates",
            RelationshipKind::Owns => "owns",
            RelationshipKind::Observes => "observes",
            RelationshipKind::Uses => "uses",
            RelationshipKind::Implements => "implements",
            RelationshipKind::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RelationshipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dependson" | "depends_on" | "depends-on" => Ok(RelationshipKind::DependsOn),
            "orchestrates" => Ok(RelationshipKind::Orchestrates),
            "owns" => Ok(RelationshipKind::Owns),
            "observes" => Ok(RelationshipKind::Observes),
            "uses" => Ok(RelationshipKind::Uses),
            "implements" => Ok(RelationshipKind::Implements),
            other => Ok(RelationshipKind::Other(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationPattern {
    Sync,
    Async,
}

impl Default for CommunicationPattern {
    fn default() -> Self {
        CommunicationPattern::Sync
    }
}

/// A directed relationship between two components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: ComponentId,
    pub target: ComponentId,
    pub kind: RelationshipKind,
    /// Coupling strength in `[0, 1]`.
    pub strength: f64,
    pub required: bool,
    pub pattern: CommunicationPattern,
    pub description: Option<String>,
    /// Set for edges inferred by a strategy rather than declared.
    #[serde(default)]
    pub implied: bool,
}

impl Relationship {
    pub fn new(
        source: impl Into<ComponentId>,
        target: impl Into<ComponentId>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            strength: 1.0,
            required: true,
            pattern: CommunicationPattern::Sync,
            description: None,
            implied: false,
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_pattern(mut self, pattern: CommunicationPattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn implied(mut self) -> Self {
        self.implied = true;
        self
    }
}

/// Architectural annotations a component may carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchitecturalMetadata {
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    #[serde(default)]
    pub provided_capabilities: BTreeSet<String>,
}

impl ArchitecturalMetadata {
    pub fn new(purpose: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            ..Default::default()
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn requires(mut self, capability: impl Into<String>) -> Self {
        self.required_capabilities.insert(capability.into());
        self
    }

    pub fn provides(mut self, capability: impl Into<String>) -> Self {
        self.provided_capabilities.insert(capability.into());
        self
    }
}

/// Rule used to pick a cache victim once a ceiling is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    Lru,
    Fifo,
    Lfu,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        EvictionPolicy::Lru
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EvictionPolicy::Lru => "lru",
            EvictionPolicy::Fifo => "fifo",
            EvictionPolicy::Lfu => "lfu",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lru" => Ok(EvictionPolicy::Lru),
            "fifo" => Ok(EvictionPolicy::Fifo),
            "lfu" => Ok(EvictionPolicy::Lfu),
            other => Err(format!("unknown eviction policy: {}", other)),
        }
    }
}
