use crate::{ArchitecturalMetadata, ComponentCategory, ComponentId, Relationship};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A structural unit discovered in the analysed application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub category: ComponentCategory,
    pub type_label: String,
    pub metadata: Option<ArchitecturalMetadata>,
    pub discovered_at: DateTime<Utc>,
}

impl Component {
    pub fn new(
        id: impl Into<ComponentId>,
        name: impl Into<String>,
        category: ComponentCategory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            type_label: String::new(),
            metadata: None,
            discovered_at: Utc::now(),
        }
    }

    pub fn with_type_label(mut self, type_label: impl Into<String>) -> Self {
        self.type_label = type_label.into();
        self
    }

    pub fn with_metadata(mut self, metadata: ArchitecturalMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Explicitly declared outgoing relationships.
    pub fn declared_relationships(&self) -> &[Relationship] {
        self.metadata
            .as_ref()
            .map(|m| m.relationships.as_slice())
            .unwrap_or(&[])
    }

    /// Declared layer, falling back to the category's default.
    pub fn layer(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.layer.as_deref())
            .unwrap_or_else(|| self.category.profile().layer)
    }
}
