//! research-cache
//!
//! Caching and parallel execution for research workloads:
//! - Bounded in-memory, durable on-disk and tiered caches
//! - A registry of independently sized cache classes
//! - A semantic request cache for model calls
//! - A resource-aware scheduler and a priority-ordered parallel executor

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
