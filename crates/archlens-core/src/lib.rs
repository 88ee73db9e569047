pub mod category;
pub mod component;
pub mod config;
pub mod error;
pub mod query;
pub mod traits;
pub mod types;

pub use category::*;
pub use component::*;
pub use config::*;
pub use error::*;
pub use query::*;
pub use traits::*;
pub use types::*;
