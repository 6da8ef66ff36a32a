//! Infrastructure layer - Store, scheduling and execution implementations

pub mod cache;
pub mod executor;
pub mod logging;
pub mod observability;
pub mod scheduler;
pub mod semantic_cache;
pub mod worker;
