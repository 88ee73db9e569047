pub mod balancer;
pub mod scheduler;

pub use balancer::*;
pub use scheduler::*;
