pub mod graph;
pub mod implied;
pub mod registry;
pub mod traversal;
pub mod validation;

pub use graph::*;
pub use implied::*;
pub use registry::*;
pub use traversal::*;
pub use validation::*;

pub use archlens_core::{ArchLensError, Component, ComponentId, Relationship, Result};
