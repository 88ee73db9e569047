use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// What a structured query asks for. Produced by an external parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    DescribeComponent,
    ListComponents,
    FindDependencies,
    FindDependents,
    ImpactAnalysis,
    DetectCycles,
    MostConnected,
    ArchitectureOverview,
    Validate,
    Unknown,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryIntent::DescribeComponent => "describe_component",
            QueryIntent::ListComponents => "list_components",
            QueryIntent::FindDependencies => "find_dependencies",
            QueryIntent::FindDependents => "find_dependents",
            QueryIntent::ImpactAnalysis => "impact_analysis",
            QueryIntent::DetectCycles => "detect_cycles",
            QueryIntent::MostConnected => "most_connected",
            QueryIntent::ArchitectureOverview => "architecture_overview",
            QueryIntent::Validate => "validate",
            QueryIntent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "describe_component" => QueryIntent::DescribeComponent,
            "list_components" => QueryIntent::ListComponents,
            "find_dependencies" => QueryIntent::FindDependencies,
            "find_dependents" => QueryIntent::FindDependents,
            "impact_analysis" => QueryIntent::ImpactAnalysis,
            "detect_cycles" => QueryIntent::DetectCycles,
            "most_connected" => QueryIntent::MostConnected,
            "architecture_overview" => QueryIntent::ArchitectureOverview,
            "validate" => QueryIntent::Validate,
            _ => QueryIntent::Unknown,
        })
    }
}

/// Well-known parameter names.
pub mod params {
    pub const COMPONENT: &str = "component";
    pub const CATEGORY: &str = "category";
    pub const LIMIT: &str = "limit";
    pub const DEPTH: &str = "depth";
}

/// Structured query handed to the engine by an external intent parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub intent: QueryIntent,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Query {
    pub fn new(intent: QueryIntent) -> Self {
        Self {
            intent,
            parameters: BTreeMap::new(),
            confidence: default_confidence(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn usize_param(&self, key: &str) -> Option<usize> {
        self.param(key).and_then(|v| v.trim().parse().ok())
    }

    /// Normalized cache key: `intent?k1=v1&k2=v2`, parameters sorted.
    ///
    /// Confidence is not part of the key; two parses of the same question
    /// share one cached answer.
    pub fn cache_key(&self) -> String {
        let params = self
            .parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let raw = if params.is_empty() {
            self.intent.as_str().to_string()
        } else {
            format!("{}?{}", self.intent, params)
        };
        normalize_query_key(&raw)
    }
}

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_query_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_ignores_parameter_order_and_case() {
        let a = Query::new(QueryIntent::FindDependents)
            .with_param("component", "UserView")
            .with_param("depth", "2");
        let b = Query::new(QueryIntent::FindDependents)
            .with_param("depth", "2")
            .with_param("component", "userview")
            .with_confidence(0.4);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "find_dependents?component=userview&depth=2");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_query_key("  Show   ALL\tviews "), "show all views");
    }

    #[test]
    fn unknown_intent_names_parse_to_unknown() {
        assert_eq!("teleport".parse::<QueryIntent>().unwrap(), QueryIntent::Unknown);
        assert_eq!(
            "Detect_Cycles".parse::<QueryIntent>().unwrap(),
            QueryIntent::DetectCycles
        );
    }
}
