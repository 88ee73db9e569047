pub mod cache;
pub mod entity_cache;
pub mod invalidation;
pub mod query_cache;

pub use cache::*;
pub use entity_cache::*;
pub use invalidation::*;
pub use query_cache::*;
