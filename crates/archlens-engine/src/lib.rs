//! Architectural analysis over a discovered component set.
//!
//! [`ArchitectureAnalyzer`] owns one component registry, a lazily rebuilt
//! relationship graph, an entity cache, a query cache and a scheduler. Build
//! it once at startup from an [`ArchLensConfig`] and a discovery source:
//!
//! ```no_run
//! use archlens_core::{ConfigManager, Query, QueryIntent, StaticDiscovery};
//! use archlens_engine::ArchitectureAnalyzer;
//! use std::sync::Arc;
//!
//! # async fn run() -> archlens_core::Result<()> {
//! let config = ConfigManager::load()?.into_config();
//! archlens_engine::logging::init_tracing(&config.logging)?;
//!
//! let analyzer = Arc::new(ArchitectureAnalyzer::new(&config, StaticDiscovery::new(vec![])));
//! analyzer.discover().await?;
//! let overview = analyzer.handle_query(&Query::new(QueryIntent::ArchitectureOverview))?;
//! println!("{:?}", overview);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod analyzer;
pub mod logging;

pub use analysis::*;
pub use analyzer::*;

pub use archlens_core::{ArchLensConfig, ArchLensError, Query, QueryIntent, Result};
